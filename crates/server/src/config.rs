use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Extra mount point for every route, e.g. "/api". Empty disables it.
    #[serde(default = "default_api_prefix")]
    pub api_prefix: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// HS256 secret shared with the hosted auth service
    pub jwt_secret: String,
    /// Expected `aud` claim; audience is not checked when unset
    #[serde(default)]
    pub audience: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Base URL of the hosted storage platform
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub service_key: String,
    #[serde(default = "default_avatar_bucket")]
    pub avatar_bucket: String,
}

fn default_api_prefix() -> String { "/api".to_string() }
fn default_max_connections() -> u32 { 5 }
fn default_avatar_bucket() -> String { "avatars".to_string() }

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            url: "".to_string(),
            service_key: "".to_string(),
            avatar_bucket: default_avatar_bucket(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
                api_prefix: default_api_prefix(),
            },
            database: DatabaseConfig {
                url: "sqlite:./data/bemore.db?mode=rwc".to_string(),
                max_connections: default_max_connections(),
            },
            auth: AuthConfig {
                jwt_secret: "change-me-in-production".to_string(),
                audience: Some("authenticated".to_string()),
            },
            storage: StorageConfig::default(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let mut config = Self::load_file()?;
        config.apply_env_overrides();
        Ok(config)
    }

    fn load_file() -> Result<Self> {
        // Try to load from environment variable
        if let Ok(path) = std::env::var("BEMORE_CONFIG") {
            return Self::load_from_path(&PathBuf::from(path));
        }

        // Try to load from default locations
        let default_paths = vec![
            PathBuf::from("bemore-server.toml"),
            PathBuf::from("config/bemore-server.toml"),
            PathBuf::from("/etc/bemore/server.toml"),
        ];

        for path in default_paths {
            if path.exists() {
                return Self::load_from_path(&path);
            }
        }

        // Return default config if no file found
        tracing::warn!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_path(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    /// Secrets usually arrive through the environment (or `.env`), not the file
    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("BEMORE_DATABASE_URL") {
            self.database.url = url;
        }
        if let Ok(secret) = std::env::var("BEMORE_JWT_SECRET") {
            self.auth.jwt_secret = secret;
        }
        if let Ok(url) = std::env::var("BEMORE_STORAGE_URL") {
            self.storage.url = url;
        }
        if let Ok(key) = std::env::var("BEMORE_STORAGE_SERVICE_KEY") {
            self.storage.service_key = key;
        }
    }
}
