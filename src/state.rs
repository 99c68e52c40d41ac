use std::sync::Arc;

use crate::{
    ai::LlmClient,
    config::AppConfig,
    db::{DbPool, OrmConn},
    email::Mailer,
    storage::ImageStorage,
};

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub orm: OrmConn,
    pub config: Arc<AppConfig>,
    pub llm: LlmClient,
    pub mailer: Mailer,
    pub storage: ImageStorage,
}

impl AppState {
    pub fn new(pool: DbPool, orm: OrmConn, config: AppConfig) -> anyhow::Result<Self> {
        let llm = LlmClient::new(&config.llm)?;
        let mailer = Mailer::new(&config.email)?;
        let storage = ImageStorage::new(&config.storage)?;
        Ok(Self {
            pool,
            orm,
            config: Arc::new(config),
            llm,
            mailer,
            storage,
        })
    }
}
