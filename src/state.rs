use std::sync::Arc;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;

use crate::config::AppConfig;
use crate::storage::{Storage, StorageClient};
use crate::users::repo::{PgUserStore, UserStore};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub users: Arc<dyn UserStore>,
    pub storage: Arc<dyn StorageClient>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let db = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .connect(&config.database_url)
            .await
            .context("connect to database")?;

        if let Err(e) = sqlx::migrate!("./migrations").run(&db).await {
            tracing::warn!(error = %e, "migration failed; continuing");
        }

        let storage = Arc::new(
            Storage::new(&config.storage)
                .await
                .context("init object storage")?,
        ) as Arc<dyn StorageClient>;
        let users = Arc::new(PgUserStore::new(db)) as Arc<dyn UserStore>;

        Ok(Self::from_parts(config, users, storage))
    }

    pub fn from_parts(
        config: Arc<AppConfig>,
        users: Arc<dyn UserStore>,
        storage: Arc<dyn StorageClient>,
    ) -> Self {
        Self {
            config,
            users,
            storage,
        }
    }

    #[cfg(test)]
    pub fn fake() -> Self {
        crate::testing::Harness::new().state
    }
}
