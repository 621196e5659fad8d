pub mod ai;
pub mod api;
pub mod config;
pub mod db;
pub mod error;

use ai::agent::Orchestrator;
use ai::openrouter::OpenRouterClient;
use config::Config;
use db::query::PgQueryExecutor;
use db::schema::SchemaCatalog;
use sqlx::PgPool;
use std::sync::Arc;

/// Shared, read-only application state. Everything mutable is per-request.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub catalog: Arc<SchemaCatalog>,
    pub orchestrator: Arc<Orchestrator>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(pool: PgPool, config: Config) -> Self {
        let config = Arc::new(config);
        let catalog = Arc::new(SchemaCatalog::banking());
        let executor = Arc::new(PgQueryExecutor::new(pool.clone(), &config));
        let llm = Arc::new(OpenRouterClient::new(
            config.llm_api_key.clone(),
            config.llm_model.clone(),
        ));

        let orchestrator = Arc::new(Orchestrator::new(
            llm,
            executor,
            catalog.clone(),
            config.clone(),
        ));

        Self {
            pool,
            catalog,
            orchestrator,
            config,
        }
    }
}
