use crate::error::{AppError, AppResult};
use std::env;
use std::net::{Ipv4Addr, SocketAddr};

/// Runtime configuration, read once from the environment at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub llm_api_key: String,
    pub llm_model: String,
    pub bind_addr: SocketAddr,
    pub allowed_origins: Vec<String>,
    pub debug: bool,
    pub db_pool_size: u32,
    pub db_max_overflow: u32,
    pub query_timeout_seconds: u64,
    pub max_result_rows: usize,
    pub max_query_length: usize,
    pub max_retries: u8,
    pub default_limit: u64,
    pub max_limit: u64,
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from((Ipv4Addr::UNSPECIFIED, 8000))
}

fn var_or<T: std::str::FromStr>(name: &str, default: T) -> AppResult<T> {
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| AppError::ConfigError(format!("{} is not a valid value: {}", name, raw))),
        Err(_) => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> AppResult<Self> {
        let database_url = env::var("DATABASE_URL")
            .map_err(|_| AppError::ConfigError("DATABASE_URL is required".into()))?;
        let llm_api_key = env::var("LLM_API_KEY")
            .map_err(|_| AppError::ConfigError("LLM_API_KEY is required".into()))?;

        let allowed_origins = env::var("ALLOWED_ORIGINS")
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();

        Ok(Self {
            database_url,
            llm_api_key,
            llm_model: env::var("LLM_MODEL")
                .unwrap_or_else(|_| "openai/gpt-4o-mini".to_string()),
            bind_addr: var_or("BIND_ADDR", default_bind_addr())?,
            allowed_origins,
            debug: var_or("DEBUG", false)?,
            db_pool_size: var_or("DB_POOL_SIZE", 5)?,
            db_max_overflow: var_or("DB_MAX_OVERFLOW", 10)?,
            query_timeout_seconds: var_or("QUERY_TIMEOUT_SECONDS", 30)?,
            max_result_rows: var_or("MAX_RESULT_ROWS", 1000)?,
            max_query_length: var_or("MAX_QUERY_LENGTH", 5000)?,
            max_retries: var_or("MAX_RETRIES", 2)?,
            default_limit: var_or("DEFAULT_LIMIT", 100)?,
            max_limit: var_or("MAX_LIMIT", 1000)?,
        })
    }
}

impl Default for Config {
    /// Defaults used by tests; real startup goes through `from_env`.
    fn default() -> Self {
        Self {
            database_url: String::new(),
            llm_api_key: String::new(),
            llm_model: "openai/gpt-4o-mini".to_string(),
            bind_addr: default_bind_addr(),
            allowed_origins: Vec::new(),
            debug: false,
            db_pool_size: 5,
            db_max_overflow: 10,
            query_timeout_seconds: 30,
            max_result_rows: 1000,
            max_query_length: 5000,
            max_retries: 2,
            default_limit: 100,
            max_limit: 1000,
        }
    }
}
