use std::sync::Arc;

use anyhow::Context;
use tracing::warn;

use crate::config::{AppConfig, StoreBackend};
use crate::store::{MemoryStore, PgStore, Store};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub async fn init(config: AppConfig) -> anyhow::Result<Self> {
        let store = match config.store {
            StoreBackend::Postgres => {
                let url = config
                    .database_url
                    .as_deref()
                    .context("DATABASE_URL is not set")?;
                let pg = PgStore::connect(url, config.db_max_connections).await?;
                pg.migrate().await;
                Arc::new(pg) as Arc<dyn Store>
            }
            StoreBackend::Memory => {
                warn!("using the in-memory store; data is lost on restart");
                Arc::new(MemoryStore::new()) as Arc<dyn Store>
            }
        };

        Ok(Self::from_parts(store, Arc::new(config)))
    }

    pub fn from_parts(store: Arc<dyn Store>, config: Arc<AppConfig>) -> Self {
        Self { store, config }
    }

    #[cfg(test)]
    pub fn fake() -> Self {
        Self::with_store(Arc::new(MemoryStore::new()))
    }

    #[cfg(test)]
    pub fn with_store(store: Arc<dyn Store>) -> Self {
        let config = Arc::new(AppConfig {
            store: StoreBackend::Memory,
            database_url: None,
            db_max_connections: 1,
            host: "127.0.0.1".into(),
            port: 0,
        });
        Self::from_parts(store, config)
    }
}
