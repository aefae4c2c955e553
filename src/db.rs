use std::time::Duration;

use sqlx::postgres::PgPoolOptions;

use crate::{config::AppConfig, error::AppError, state::AppState};

/// Lazily connecting pool; `None` when no database URL is configured.
pub fn build_pool(config: &AppConfig) -> Result<Option<sqlx::PgPool>, AppError> {
    let Some(url) = config.supabase_db_url.as_deref() else {
        tracing::warn!("SUPABASE_DB_URL is not set; data endpoints will be unavailable");
        return Ok(None);
    };

    let pool = PgPoolOptions::new()
        .max_connections(config.db_pool_max_connections.max(1))
        .min_connections(config.db_pool_min_connections)
        .acquire_timeout(Duration::from_secs(config.db_pool_acquire_timeout_seconds))
        .idle_timeout(Duration::from_secs(config.db_pool_idle_timeout_seconds))
        .connect_lazy(url)
        .map_err(|error| AppError::Internal(format!("Invalid database URL: {error}")))?;

    Ok(Some(pool))
}

pub fn db_pool(state: &AppState) -> Result<&sqlx::PgPool, AppError> {
    state.db_pool.as_ref().ok_or_else(|| {
        AppError::Dependency(
            "Supabase database is not configured. Set SUPABASE_DB_URL or DATABASE_URL.".to_string(),
        )
    })
}
