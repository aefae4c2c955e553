use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;

use crate::{config::AppConfig, db::build_pool, error::AppError};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db_pool: Option<sqlx::PgPool>,
    pub http_client: reqwest::Client,
    /// Login account id -> linked customer id. `None` caches "not linked".
    pub customer_link_cache: Cache<String, Option<String>>,
}

impl AppState {
    pub fn build(config: AppConfig) -> Result<Self, AppError> {
        let db_pool = build_pool(&config)?;

        let http_client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .user_agent(format!("{}/{}", config.app_name, env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|error| AppError::Internal(format!("Could not build HTTP client: {error}")))?;

        let customer_link_cache = Cache::builder()
            .max_capacity(config.customer_link_cache_max_entries)
            .time_to_live(Duration::from_secs(config.customer_link_cache_ttl_seconds))
            .build();

        Ok(Self {
            config: Arc::new(config),
            db_pool,
            http_client,
            customer_link_cache,
        })
    }
}
