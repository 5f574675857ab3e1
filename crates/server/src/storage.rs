//! Hosted object storage client
//!
//! Avatar bytes never pass through this server. Clients ask for a signed
//! upload token, upload straight to the storage platform, and store the
//! returned public URL on their profile.

use anyhow::{Context, Result};
use reqwest::{Client, Url};
use serde::Deserialize;
use shared::{SignedUpload, MAX_FILENAME_CHARS};
use uuid::Uuid;

use crate::config::StorageConfig;
use crate::validation::{self, ValidationError};

/// Response of the upload signing endpoint
#[derive(Debug, Deserialize)]
struct SignResponse {
    /// Relative URL carrying the token as a `token` query parameter
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    token: Option<String>,
}

#[derive(Clone)]
pub struct StorageClient {
    client: Client,
    base_url: String,
    service_key: String,
    avatar_bucket: String,
}

impl StorageClient {
    pub fn new(config: &StorageConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.url.trim_end_matches('/').to_string(),
            service_key: config.service_key.clone(),
            avatar_bucket: config.avatar_bucket.clone(),
        }
    }

    /// Request a signed upload for a new avatar object owned by `user_id`
    pub async fn sign_avatar_upload(&self, user_id: Uuid, filename: &str) -> Result<SignedUpload> {
        if self.base_url.is_empty() {
            anyhow::bail!("storage url is not configured");
        }

        let path = object_path(user_id, filename, chrono::Utc::now().timestamp_millis());
        let url = self.object_url(&["upload", "sign"], &path)?;

        let response = self
            .client
            .post(url)
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
            .json(&serde_json::json!({}))
            .send()
            .await
            .context("Failed to send upload signing request")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            let truncated: String = error_text.chars().take(500).collect();
            anyhow::bail!("Upload signing failed ({}): {}", status, truncated);
        }

        let data: SignResponse = response
            .json()
            .await
            .context("Failed to parse upload signing response")?;

        let token = data
            .token
            .or_else(|| data.url.as_deref().and_then(token_from_signed_url))
            .context("Upload signing response has no token")?;

        tracing::info!("Signed avatar upload {} for user {}", path, user_id);

        Ok(SignedUpload {
            bucket: self.avatar_bucket.clone(),
            public_url: self.public_url(&path)?,
            path,
            token,
        })
    }

    /// Publicly readable URL of an object in the avatar bucket
    pub fn public_url(&self, path: &str) -> Result<String> {
        Ok(self.object_url(&["public"], path)?.to_string())
    }

    /// `{base}/storage/v1/object/{kind..}/{bucket}/{path}` with each segment encoded
    fn object_url(&self, kind: &[&str], path: &str) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)
            .with_context(|| format!("Invalid storage url: {}", self.base_url))?;
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| anyhow::anyhow!("Storage url cannot be a base: {}", self.base_url))?;
            segments.pop_if_empty();
            segments.extend(["storage", "v1", "object"]);
            segments.extend(kind);
            segments.push(&self.avatar_bucket);
            segments.extend(path.split('/'));
        }
        Ok(url)
    }
}

/// `<user_id>/<unix_millis>-<filename>`
pub fn object_path(user_id: Uuid, filename: &str, millis: i64) -> String {
    format!("{}/{}-{}", user_id, millis, filename)
}

/// Plain file name: 1..=255 characters, no path separators
pub fn validate_filename(filename: &str) -> Result<(), ValidationError> {
    validation::require_text("filename", filename, MAX_FILENAME_CHARS)?;
    if filename.contains(|c: char| c == '/' || c == '\\') {
        return Err(ValidationError::InvalidFormat {
            field: "filename",
            reason: "must not contain path separators",
        });
    }
    Ok(())
}

fn token_from_signed_url(signed: &str) -> Option<String> {
    let url = Url::parse("http://storage.invalid").ok()?.join(signed).ok()?;
    url.query_pairs()
        .find(|(key, _)| key == "token")
        .map(|(_, value)| value.into_owned())
}
