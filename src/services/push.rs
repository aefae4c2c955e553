use std::time::Duration;

use chrono::NaiveDate;
use serde::Serialize;
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};

use crate::{
    error::{AppError, AppResult},
    repository::table_service::list_rows,
    schemas::PushSubscriptionInput,
    state::AppState,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PushMessage {
    pub title: String,
    pub body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl PushMessage {
    pub fn delivery_recorded(date: NaiveDate, bottles: i64) -> Self {
        let noun = if bottles == 1 { "bottle" } else { "bottles" };
        Self {
            title: "Delivery recorded".to_string(),
            body: format!("{bottles} {noun} delivered on {}.", date.format("%d %b %Y")),
            url: Some("/portal".to_string()),
        }
    }
}

/// Stable key for an endpoint URL; endpoints are too long for a unique index.
pub fn endpoint_hash(endpoint: &str) -> String {
    let digest = Sha256::digest(endpoint.trim().as_bytes());
    format!("{digest:x}")
}

pub fn subscription_row(customer_id: &str, input: &PushSubscriptionInput) -> Map<String, Value> {
    let mut row = Map::new();
    row.insert(
        "customer_id".to_string(),
        Value::String(customer_id.to_string()),
    );
    row.insert(
        "endpoint".to_string(),
        Value::String(input.endpoint.trim().to_string()),
    );
    row.insert(
        "endpoint_hash".to_string(),
        Value::String(endpoint_hash(&input.endpoint)),
    );
    row.insert(
        "subscription".to_string(),
        serde_json::to_value(input).unwrap_or(Value::Null),
    );
    row
}

/// Sends `message` to every stored subscription of the customer. Returns the
/// number of subscriptions handed to the push function.
pub async fn notify_customer(
    state: &AppState,
    pool: &sqlx::PgPool,
    customer_id: &str,
    message: &PushMessage,
) -> AppResult<usize> {
    let mut filters = Map::new();
    filters.insert(
        "customer_id".to_string(),
        Value::String(customer_id.to_string()),
    );
    let rows = list_rows(
        pool,
        "push_subscriptions",
        Some(&filters),
        50,
        0,
        "created_at",
        false,
    )
    .await?;

    let subscriptions = rows
        .iter()
        .filter_map(|row| row.get("subscription"))
        .filter(|subscription| subscription.is_object())
        .cloned()
        .collect::<Vec<_>>();
    if subscriptions.is_empty() {
        tracing::debug!(customer_id = %customer_id, "No push subscriptions for customer");
        return Ok(0);
    }

    let count = subscriptions.len();
    dispatch(state, dispatch_payload(subscriptions, message)).await?;
    Ok(count)
}

/// Like [`notify_customer`] but only logs failures.
pub async fn notify_customer_best_effort(
    state: &AppState,
    pool: &sqlx::PgPool,
    customer_id: &str,
    message: &PushMessage,
) {
    match notify_customer(state, pool, customer_id, message).await {
        Ok(sent) => {
            tracing::debug!(customer_id = %customer_id, sent, "Push notification dispatched");
        }
        Err(error) => {
            tracing::warn!(customer_id = %customer_id, error = %error, "Push notification failed");
        }
    }
}

fn dispatch_payload(subscriptions: Vec<Value>, message: &PushMessage) -> Value {
    json!({
        "subscriptions": subscriptions,
        "notification": message,
    })
}

async fn dispatch(state: &AppState, payload: Value) -> AppResult<()> {
    let url = state.config.push_function_url().ok_or_else(|| {
        AppError::ServiceUnavailable("Push is not configured. Set SUPABASE_URL.".to_string())
    })?;
    let service_key = state
        .config
        .supabase_service_role_key
        .as_deref()
        .ok_or_else(|| {
            AppError::ServiceUnavailable(
                "Push is not configured. Set SUPABASE_SERVICE_ROLE_KEY.".to_string(),
            )
        })?;

    let response = state
        .http_client
        .post(url)
        .header("Authorization", format!("Bearer {service_key}"))
        .header("apikey", service_key)
        .timeout(Duration::from_secs(state.config.push_timeout_seconds))
        .json(&payload)
        .send()
        .await
        .map_err(|error| {
            tracing::error!(error = %error, "Push function is unreachable");
            AppError::Dependency("Push function is unreachable.".to_string())
        })?;

    if !response.status().is_success() {
        return Err(AppError::Dependency(format!(
            "Push function request failed ({}).",
            response.status().as_u16()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use serde_json::json;

    use super::{dispatch_payload, endpoint_hash, subscription_row, PushMessage};
    use crate::schemas::PushSubscriptionInput;

    #[test]
    fn endpoint_hash_is_stable_hex() {
        let first = endpoint_hash("https://push.example.com/abc");
        assert_eq!(first, endpoint_hash("  https://push.example.com/abc "));
        assert_eq!(first.len(), 64);
        assert!(first.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(first, endpoint_hash("https://push.example.com/abd"));
    }

    #[test]
    fn subscription_row_keeps_browser_shape() {
        let input = PushSubscriptionInput {
            endpoint: "https://push.example.com/abc".to_string(),
            expiration_time: None,
            keys: json!({ "p256dh": "key", "auth": "secret" }),
        };
        let row = subscription_row("c1", &input);
        assert_eq!(row.get("customer_id"), Some(&json!("c1")));
        assert_eq!(
            row.get("subscription"),
            Some(&json!({
                "endpoint": "https://push.example.com/abc",
                "expirationTime": null,
                "keys": { "p256dh": "key", "auth": "secret" }
            }))
        );
    }

    #[test]
    fn delivery_message_and_payload() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 5).expect("valid date");
        let message = PushMessage::delivery_recorded(date, 1);
        assert_eq!(message.body, "1 bottle delivered on 05 Jan 2024.");

        let payload = dispatch_payload(vec![json!({ "endpoint": "e" })], &message);
        assert_eq!(payload["notification"]["title"], json!("Delivery recorded"));
        assert_eq!(payload["subscriptions"].as_array().map(Vec::len), Some(1));
    }
}
