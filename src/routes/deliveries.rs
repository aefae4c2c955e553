use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    response::IntoResponse,
    Json,
};
use chrono::NaiveDate;
use serde_json::{json, Map, Value};

use crate::{
    auth::require_admin,
    db::db_pool,
    error::{AppError, AppResult},
    repository::table_service::{create_row, delete_row, get_row, list_rows, update_row},
    schemas::{
        clamp_limit_in_range, validate_input, CreateDeliveryInput, DeliveriesQuery, DeliveryPath,
        UpdateDeliveryInput,
    },
    services::{
        ledger::optional_period,
        push::{notify_customer_best_effort, PushMessage},
    },
    state::AppState,
};

pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route(
            "/deliveries",
            axum::routing::get(list_deliveries).post(create_delivery),
        )
        .route(
            "/deliveries/{delivery_id}",
            axum::routing::get(get_delivery)
                .patch(update_delivery)
                .delete(delete_delivery),
        )
}

async fn list_deliveries(
    State(state): State<AppState>,
    Query(query): Query<DeliveriesQuery>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    validate_input(&query)?;
    require_admin(&state, &headers).await?;
    let pool = db_pool(&state)?;

    let filters = delivery_list_filters(&query)?;
    let rows = list_rows(
        pool,
        "deliveries",
        Some(&filters),
        clamp_limit_in_range(query.limit, 1, 5000),
        0,
        "date",
        false,
    )
    .await?;
    Ok(Json(json!({ "data": rows })))
}

async fn create_delivery(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateDeliveryInput>,
) -> AppResult<impl IntoResponse> {
    validate_input(&payload)?;
    require_admin(&state, &headers).await?;
    let pool = db_pool(&state)?;

    let customer = get_row(pool, "customers", &payload.customer_id, "id").await?;
    let customer_id = customer
        .get("id")
        .and_then(Value::as_str)
        .unwrap_or(payload.customer_id.as_str())
        .to_string();

    let mut record = Map::new();
    record.insert("customer_id".to_string(), Value::String(customer_id.clone()));
    record.insert("date".to_string(), Value::String(payload.date.to_string()));
    record.insert("bottles".to_string(), Value::from(payload.bottles));

    let created = create_row(pool, "deliveries", &record).await?;
    tracing::info!(
        customer_id = %customer_id,
        date = %payload.date,
        bottles = payload.bottles,
        "Delivery recorded"
    );

    if payload.notify_customer {
        let message = PushMessage::delivery_recorded(payload.date, payload.bottles);
        let task_state = state.clone();
        let task_pool = pool.clone();
        tokio::spawn(async move {
            notify_customer_best_effort(&task_state, &task_pool, &customer_id, &message).await;
        });
    }

    Ok((axum::http::StatusCode::CREATED, Json(created)))
}

async fn get_delivery(
    State(state): State<AppState>,
    Path(path): Path<DeliveryPath>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    require_admin(&state, &headers).await?;
    let pool = db_pool(&state)?;

    let record = get_row(pool, "deliveries", &path.delivery_id, "id").await?;
    Ok(Json(record))
}

async fn update_delivery(
    State(state): State<AppState>,
    Path(path): Path<DeliveryPath>,
    headers: HeaderMap,
    Json(payload): Json<UpdateDeliveryInput>,
) -> AppResult<Json<Value>> {
    validate_input(&payload)?;
    require_admin(&state, &headers).await?;
    let pool = db_pool(&state)?;

    let mut patch = Map::new();
    if let Some(date) = payload.date {
        patch.insert("date".to_string(), Value::String(date.to_string()));
    }
    if let Some(bottles) = payload.bottles {
        patch.insert("bottles".to_string(), Value::from(bottles));
    }
    if patch.is_empty() {
        return Err(AppError::BadRequest("No fields to update.".to_string()));
    }

    let updated = update_row(pool, "deliveries", &path.delivery_id, &patch, "id").await?;
    Ok(Json(updated))
}

async fn delete_delivery(
    State(state): State<AppState>,
    Path(path): Path<DeliveryPath>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    require_admin(&state, &headers).await?;
    let pool = db_pool(&state)?;

    let deleted = delete_row(pool, "deliveries", &path.delivery_id, "id").await?;
    tracing::info!(delivery_id = %path.delivery_id, "Delivery deleted");
    Ok(Json(deleted))
}

/// Date range and month selector are intersected when both are given.
fn delivery_list_filters(query: &DeliveriesQuery) -> AppResult<Map<String, Value>> {
    let period = optional_period(query.month, query.year)?;

    let mut lower = query.date_from;
    let mut upper = query.date_to;
    if let Some(period) = period {
        lower = later(lower, period.first_day());
        upper = earlier(upper, period.last_day());
    }
    if let (Some(from), Some(to)) = (lower, upper) {
        if from > to && period.is_none() {
            return Err(AppError::BadRequest(
                "date_from must not be after date_to.".to_string(),
            ));
        }
    }

    let mut filters = Map::new();
    if let Some(customer_id) = query
        .customer_id
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
    {
        filters.insert(
            "customer_id".to_string(),
            Value::String(customer_id.to_string()),
        );
    }
    if let Some(from) = lower {
        filters.insert("date__gte".to_string(), Value::String(from.to_string()));
    }
    if let Some(to) = upper {
        filters.insert("date__lte".to_string(), Value::String(to.to_string()));
    }
    Ok(filters)
}

fn later(left: Option<NaiveDate>, right: Option<NaiveDate>) -> Option<NaiveDate> {
    match (left, right) {
        (Some(left), Some(right)) => Some(left.max(right)),
        (left, right) => left.or(right),
    }
}

fn earlier(left: Option<NaiveDate>, right: Option<NaiveDate>) -> Option<NaiveDate> {
    match (left, right) {
        (Some(left), Some(right)) => Some(left.min(right)),
        (left, right) => left.or(right),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::delivery_list_filters;
    use crate::schemas::DeliveriesQuery;

    fn query(value: serde_json::Value) -> DeliveriesQuery {
        match serde_json::from_value(value) {
            Ok(parsed) => parsed,
            Err(error) => panic!("invalid test query: {error}"),
        }
    }

    #[test]
    fn month_selector_narrows_date_range() {
        let filters = delivery_list_filters(&query(json!({
            "customer_id": "c1",
            "date_from": "2024-01-10",
            "month": 0,
            "year": 2024
        })))
        .ok();
        let Some(filters) = filters else {
            panic!("filters should build");
        };
        assert_eq!(filters.get("date__gte"), Some(&json!("2024-01-10")));
        assert_eq!(filters.get("date__lte"), Some(&json!("2024-01-31")));
        assert_eq!(filters.get("customer_id"), Some(&json!("c1")));
    }

    #[test]
    fn reversed_range_is_rejected() {
        assert!(delivery_list_filters(&query(json!({
            "date_from": "2024-02-01",
            "date_to": "2024-01-01"
        })))
        .is_err());
    }

    #[test]
    fn month_without_year_is_rejected() {
        assert!(delivery_list_filters(&query(json!({ "month": 3 }))).is_err());
    }
}
