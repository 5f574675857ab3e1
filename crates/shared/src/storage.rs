use serde::{Deserialize, Serialize};

pub const MAX_FILENAME_CHARS: usize = 255;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SignedUploadQuery {
    pub filename: String,
}

/// Where and how the client should upload an avatar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedUpload {
    pub bucket: String,
    pub path: String,
    pub token: String,
    pub public_url: String,
}
