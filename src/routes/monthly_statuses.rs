use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    Json,
};
use chrono::Utc;
use serde_json::{json, Map, Value};

use crate::{
    auth::require_admin,
    db::db_pool,
    error::AppResult,
    repository::table_service::{delete_row, get_row, list_rows, upsert_row, MAX_LIST_LIMIT},
    schemas::{validate_input, MonthlyStatusPath, MonthlyStatusesQuery, SetMonthlyStatusInput},
    state::AppState,
};

pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route(
            "/monthly-statuses",
            axum::routing::get(list_monthly_statuses).put(set_monthly_status),
        )
        .route(
            "/monthly-statuses/{status_id}",
            axum::routing::delete(delete_monthly_status),
        )
}

async fn list_monthly_statuses(
    State(state): State<AppState>,
    Query(query): Query<MonthlyStatusesQuery>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    validate_input(&query)?;
    require_admin(&state, &headers).await?;
    let pool = db_pool(&state)?;

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
    if let Some(month) = query.month {
        filters.insert("month".to_string(), Value::from(month));
    }
    if let Some(year) = query.year {
        filters.insert("year".to_string(), Value::from(year));
    }

    let rows = list_rows(
        pool,
        "monthly_statuses",
        Some(&filters),
        MAX_LIST_LIMIT,
        0,
        "updated_at",
        false,
    )
    .await?;
    Ok(Json(json!({ "data": rows })))
}

/// One status per (customer, month, year); setting it again overwrites.
async fn set_monthly_status(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<SetMonthlyStatusInput>,
) -> AppResult<Json<Value>> {
    validate_input(&payload)?;
    require_admin(&state, &headers).await?;
    let pool = db_pool(&state)?;

    get_row(pool, "customers", &payload.customer_id, "id").await?;

    let mut record = Map::new();
    record.insert(
        "customer_id".to_string(),
        Value::String(payload.customer_id.trim().to_string()),
    );
    record.insert("month".to_string(), Value::from(payload.month));
    record.insert("year".to_string(), Value::from(payload.year));
    record.insert(
        "status".to_string(),
        Value::String(payload.status.as_str().to_string()),
    );
    record.insert(
        "updated_at".to_string(),
        Value::String(Utc::now().to_rfc3339()),
    );

    let saved = upsert_row(
        pool,
        "monthly_statuses",
        &record,
        &["customer_id", "month", "year"],
    )
    .await?;
    tracing::info!(
        customer_id = %payload.customer_id,
        month = payload.month,
        year = payload.year,
        status = payload.status.as_str(),
        "Monthly status set"
    );
    Ok(Json(saved))
}

async fn delete_monthly_status(
    State(state): State<AppState>,
    Path(path): Path<MonthlyStatusPath>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    require_admin(&state, &headers).await?;
    let pool = db_pool(&state)?;

    let deleted = delete_row(pool, "monthly_statuses", &path.status_id, "id").await?;
    Ok(Json(deleted))
}
