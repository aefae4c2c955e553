use axum::http::HeaderMap;
use serde_json::{Map, Value};

use crate::{
    auth::{require_customer, SupabaseUser},
    db::db_pool,
    error::{AppError, AppResult},
    repository::table_service::{get_row, list_rows},
    state::AppState,
};

/// The customer profile a signed-in customer account may see.
pub struct LinkedCustomer {
    pub user: SupabaseUser,
    pub customer_id: String,
    pub profile: Value,
}

pub async fn require_linked_customer(
    state: &AppState,
    headers: &HeaderMap,
) -> AppResult<LinkedCustomer> {
    let user = require_customer(state, headers).await?;
    let pool = db_pool(state)?;

    let customer_id = linked_customer_id(state, pool, &user.id)
        .await?
        .ok_or_else(|| {
            AppError::Forbidden(
                "Forbidden: this account is not linked to a customer profile.".to_string(),
            )
        })?;

    let profile = match get_row(pool, "customers", &customer_id, "id").await {
        Ok(profile) => profile,
        Err(AppError::NotFound(_)) => {
            // Profile was deleted after the link was cached.
            forget_customer_link(state, &user.id).await;
            return Err(AppError::Forbidden(
                "Forbidden: this account is not linked to a customer profile.".to_string(),
            ));
        }
        Err(error) => return Err(error),
    };

    Ok(LinkedCustomer {
        user,
        customer_id,
        profile,
    })
}

pub async fn linked_customer_id(
    state: &AppState,
    pool: &sqlx::PgPool,
    user_id: &str,
) -> AppResult<Option<String>> {
    if let Some(cached) = state.customer_link_cache.get(user_id).await {
        return Ok(cached);
    }

    let mut filters = Map::new();
    filters.insert("user_id".to_string(), Value::String(user_id.to_string()));
    let rows = list_rows(pool, "customers", Some(&filters), 1, 0, "created_at", true).await?;
    let customer_id = rows
        .first()
        .and_then(|row| row.get("id"))
        .and_then(Value::as_str)
        .map(ToOwned::to_owned);

    state
        .customer_link_cache
        .insert(user_id.to_string(), customer_id.clone())
        .await;
    Ok(customer_id)
}

pub async fn forget_customer_link(state: &AppState, user_id: &str) {
    state.customer_link_cache.invalidate(user_id).await;
}
