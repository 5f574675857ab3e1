use crate::{config::Config, db::Database, storage::StorageClient};

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub config: Config,
    pub storage: StorageClient,
}

impl AppState {
    pub fn new(db: Database, config: Config) -> Self {
        let storage = StorageClient::new(&config.storage);
        if config.storage.url.is_empty() {
            tracing::warn!("Storage url not configured, avatar uploads will fail");
        }

        Self { db, config, storage }
    }
}
