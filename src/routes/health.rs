use std::time::{Duration, Instant};

use axum::{extract::State, Json};
use chrono::Utc;
use serde_json::{json, Value};

use crate::state::AppState;

const DB_PROBE_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DbProbe {
    NotConfigured,
    Reachable,
    Failed,
    TimedOut,
}

impl DbProbe {
    fn as_str(self) -> &'static str {
        match self {
            Self::NotConfigured => "not_configured",
            Self::Reachable => "ok",
            Self::Failed => "error",
            Self::TimedOut => "timeout",
        }
    }

    fn healthy(self) -> bool {
        matches!(self, Self::NotConfigured | Self::Reachable)
    }
}

async fn probe_database(pool: &sqlx::PgPool) -> DbProbe {
    let query = sqlx::query("SELECT 1").fetch_one(pool);
    match tokio::time::timeout(DB_PROBE_TIMEOUT, query).await {
        Ok(Ok(_)) => DbProbe::Reachable,
        Ok(Err(error)) => {
            tracing::error!(error = %error, "Database probe failed");
            DbProbe::Failed
        }
        Err(_) => {
            tracing::error!(
                timeout_seconds = DB_PROBE_TIMEOUT.as_secs(),
                "Database probe timed out"
            );
            DbProbe::TimedOut
        }
    }
}

pub async fn health(State(state): State<AppState>) -> Json<Value> {
    let started = Instant::now();
    let db = match &state.db_pool {
        Some(pool) => probe_database(pool).await,
        None => DbProbe::NotConfigured,
    };

    let config = &state.config;
    Json(json!({
        "status": if db.healthy() { "ok" } else { "degraded" },
        "service": config.app_name,
        "environment": config.environment,
        "now": Utc::now().with_timezone(&config.business_timezone).to_rfc3339(),
        "db": db.as_str(),
        "db_probe_ms": u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        "assist_enabled": config.openai_api_key.is_some(),
        "push_enabled": config.push_function_url().is_some(),
    }))
}

#[cfg(test)]
mod tests {
    use super::DbProbe;

    #[test]
    fn only_probe_failures_degrade() {
        assert!(DbProbe::NotConfigured.healthy());
        assert!(DbProbe::Reachable.healthy());
        assert!(!DbProbe::Failed.healthy());
        assert!(!DbProbe::TimedOut.healthy());
        assert_eq!(DbProbe::TimedOut.as_str(), "timeout");
    }
}
