use axum::{
    extract::{Query, State},
    http::HeaderMap,
    response::IntoResponse,
    Json,
};
use serde_json::{json, Map, Value};

use crate::{
    accounts::require_linked_customer,
    db::db_pool,
    error::AppResult,
    repository::table_service::{delete_rows, list_all_rows, list_rows, upsert_row},
    routes::{billing::shape_billing_record, customers::shape_customer, invoices::shape_invoice},
    schemas::{
        validate_input, PeriodQuery, PushSubscriptionInput, RemovePushSubscriptionInput,
    },
    services::{
        ledger::{customer_periods, delivery_filters, optional_period, period_filters},
        push::{endpoint_hash, subscription_row},
    },
    state::AppState,
};

pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route("/portal/me", axum::routing::get(portal_me))
        .route("/portal/deliveries", axum::routing::get(portal_deliveries))
        .route("/portal/bills", axum::routing::get(portal_bills))
        .route(
            "/portal/billing-records",
            axum::routing::get(portal_billing_records),
        )
        .route("/portal/invoices", axum::routing::get(portal_invoices))
        .route(
            "/portal/push-subscriptions",
            axum::routing::post(register_push_subscription).delete(remove_push_subscription),
        )
}

async fn portal_me(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Json<Value>> {
    let linked = require_linked_customer(&state, &headers).await?;
    let mut profile = shape_customer(linked.profile, state.config.default_bottle_price);
    if let Some(obj) = profile.as_object_mut() {
        // Link is internal to the admin screens.
        obj.remove("user_id");
        obj.insert(
            "email".to_string(),
            linked.user.email.map_or(Value::Null, Value::String),
        );
        obj.insert(
            "currency_code".to_string(),
            Value::String(state.config.currency_code.clone()),
        );
    }
    Ok(Json(profile))
}

async fn portal_deliveries(
    State(state): State<AppState>,
    Query(query): Query<PeriodQuery>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    validate_input(&query)?;
    let linked = require_linked_customer(&state, &headers).await?;
    let pool = db_pool(&state)?;

    let period = optional_period(query.month, query.year)?;
    let filters = delivery_filters(Some(linked.customer_id.as_str()), period);
    let rows = list_all_rows(pool, "deliveries", Some(&filters), "date", false).await?;
    Ok(Json(json!({ "data": rows })))
}

async fn portal_bills(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Json<Value>> {
    let linked = require_linked_customer(&state, &headers).await?;
    let pool = db_pool(&state)?;

    let periods = customer_periods(&state, pool, &linked.profile).await?;
    Ok(Json(json!({ "data": periods })))
}

async fn portal_billing_records(
    State(state): State<AppState>,
    Query(query): Query<PeriodQuery>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    validate_input(&query)?;
    let linked = require_linked_customer(&state, &headers).await?;
    let pool = db_pool(&state)?;

    let period = optional_period(query.month, query.year)?;
    let filters = period_filters(Some(linked.customer_id.as_str()), period);
    let rows =
        list_all_rows(pool, "billing_records", Some(&filters), "created_at", false).await?;
    let data = rows.into_iter().map(shape_billing_record).collect::<Vec<_>>();
    Ok(Json(json!({ "data": data })))
}

async fn portal_invoices(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    let linked = require_linked_customer(&state, &headers).await?;
    let pool = db_pool(&state)?;

    let mut filters = Map::new();
    filters.insert(
        "customer_id".to_string(),
        Value::String(linked.customer_id.clone()),
    );
    let rows = list_rows(
        pool,
        "invoices",
        Some(&filters),
        500,
        0,
        "created_at",
        false,
    )
    .await?;
    let data = rows.into_iter().map(shape_invoice).collect::<Vec<_>>();
    Ok(Json(json!({ "data": data })))
}

async fn register_push_subscription(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<PushSubscriptionInput>,
) -> AppResult<impl IntoResponse> {
    validate_input(&payload)?;
    let linked = require_linked_customer(&state, &headers).await?;
    let pool = db_pool(&state)?;

    let record = subscription_row(&linked.customer_id, &payload);
    let saved = upsert_row(
        pool,
        "push_subscriptions",
        &record,
        &["customer_id", "endpoint_hash"],
    )
    .await?;
    tracing::info!(customer_id = %linked.customer_id, "Push subscription registered");
    Ok((
        axum::http::StatusCode::CREATED,
        Json(json!({
            "id": saved.get("id").cloned().unwrap_or(Value::Null),
            "endpoint": payload.endpoint,
        })),
    ))
}

async fn remove_push_subscription(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<RemovePushSubscriptionInput>,
) -> AppResult<Json<Value>> {
    validate_input(&payload)?;
    let linked = require_linked_customer(&state, &headers).await?;
    let pool = db_pool(&state)?;

    let mut filters = Map::new();
    filters.insert(
        "customer_id".to_string(),
        Value::String(linked.customer_id.clone()),
    );
    filters.insert(
        "endpoint_hash".to_string(),
        Value::String(endpoint_hash(&payload.endpoint)),
    );
    let removed = delete_rows(pool, "push_subscriptions", &filters).await?;
    Ok(Json(json!({ "removed": removed })))
}
