use std::sync::Arc;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;

use crate::auth::session::SessionManager;
use crate::config::AppConfig;
use crate::users::repo::{PgUserStore, UserStore};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn UserStore>,
    pub sessions: SessionManager,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let db = PgPoolOptions::new()
            .max_connections(10)
            .connect(&config.database_url)
            .await
            .context("connect to database")?;

        if let Err(e) = sqlx::migrate!("./migrations").run(&db).await {
            tracing::warn!(error = %e, "migration failed; continuing");
        }

        let store = Arc::new(PgUserStore::new(db)) as Arc<dyn UserStore>;
        Ok(Self::from_parts(config, store))
    }

    pub fn from_parts(config: Arc<AppConfig>, store: Arc<dyn UserStore>) -> Self {
        let sessions = SessionManager::new(store.clone(), &config.jwt);
        Self {
            config,
            store,
            sessions,
        }
    }

    #[cfg(test)]
    pub(crate) fn with_store(store: Arc<dyn UserStore>) -> Self {
        Self::from_parts(Arc::new(AppConfig::for_tests()), store)
    }

    #[cfg(test)]
    pub(crate) fn fake() -> Self {
        Self::with_store(Arc::new(crate::users::memory::MemoryUserStore::new()))
    }
}
