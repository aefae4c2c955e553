use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    response::IntoResponse,
    Json,
};
use serde_json::{json, Map, Value};

use crate::{
    accounts::forget_customer_link,
    auth::require_admin,
    db::db_pool,
    error::{AppError, AppResult},
    money::{expose_minor, Money},
    repository::table_service::{create_row, delete_row, get_row, list_rows, update_row},
    schemas::{
        clamp_limit_in_range, validate_input, CreateCustomerInput, CustomerPath, CustomersQuery,
        LinkCustomerAccountInput, UpdateCustomerInput, UpdateCustomerRatesInput,
    },
    services::billing::effective_bottle_price,
    state::AppState,
};

pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route(
            "/customers",
            axum::routing::get(list_customers).post(create_customer),
        )
        .route(
            "/customers/{customer_id}",
            axum::routing::get(get_customer)
                .patch(update_customer)
                .delete(delete_customer),
        )
        .route(
            "/customers/{customer_id}/rates",
            axum::routing::put(update_customer_rates),
        )
        .route(
            "/customers/{customer_id}/account",
            axum::routing::put(link_customer_account),
        )
}

async fn list_customers(
    State(state): State<AppState>,
    Query(query): Query<CustomersQuery>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    require_admin(&state, &headers).await?;
    let pool = db_pool(&state)?;

    let mut filters = Map::new();
    if let Some(search) = non_empty_opt(query.search.as_deref()) {
        filters.insert(
            "name__ilike".to_string(),
            Value::String(format!("%{}%", escape_like(&search))),
        );
    }
    if let Some(linked) = query.linked {
        filters.insert("user_id__is_null".to_string(), Value::Bool(!linked));
    }

    let rows = list_rows(
        pool,
        "customers",
        Some(&filters),
        clamp_limit_in_range(query.limit, 1, 2000),
        0,
        "name",
        true,
    )
    .await?;

    let default_price = state.config.default_bottle_price;
    let data = rows
        .into_iter()
        .map(|row| shape_customer(row, default_price))
        .collect::<Vec<_>>();
    Ok(Json(json!({ "data": data })))
}

async fn create_customer(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateCustomerInput>,
) -> AppResult<impl IntoResponse> {
    validate_input(&payload)?;
    require_admin(&state, &headers).await?;
    let pool = db_pool(&state)?;

    let name = payload.name.trim();
    if name.is_empty() {
        return Err(AppError::BadRequest("name is required.".to_string()));
    }

    let mut record = Map::new();
    record.insert("name".to_string(), Value::String(name.to_string()));
    if let Some(phone) = non_empty_opt(payload.phone.as_deref()) {
        record.insert("phone".to_string(), Value::String(phone));
    }
    if let Some(address) = non_empty_opt(payload.address.as_deref()) {
        record.insert("address".to_string(), Value::String(address));
    }
    insert_rate_fields(
        &mut record,
        payload.bottle_price_minor,
        payload.deposit_bottles,
        payload.deposit_amount_minor,
    );

    let created = create_row(pool, "customers", &record).await?;
    tracing::info!(customer_id = %value_str(&created, "id"), "Customer created");
    Ok((
        axum::http::StatusCode::CREATED,
        Json(shape_customer(created, state.config.default_bottle_price)),
    ))
}

async fn get_customer(
    State(state): State<AppState>,
    Path(path): Path<CustomerPath>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    require_admin(&state, &headers).await?;
    let pool = db_pool(&state)?;

    let record = get_row(pool, "customers", &path.customer_id, "id").await?;
    Ok(Json(shape_customer(record, state.config.default_bottle_price)))
}

async fn update_customer(
    State(state): State<AppState>,
    Path(path): Path<CustomerPath>,
    headers: HeaderMap,
    Json(payload): Json<UpdateCustomerInput>,
) -> AppResult<Json<Value>> {
    validate_input(&payload)?;
    require_admin(&state, &headers).await?;
    let pool = db_pool(&state)?;

    let mut patch = Map::new();
    if let Some(name) = non_empty_opt(payload.name.as_deref()) {
        patch.insert("name".to_string(), Value::String(name));
    }
    // Blank strings clear the optional contact fields.
    if let Some(phone) = payload.phone.as_deref() {
        patch.insert("phone".to_string(), optional_text(phone));
    }
    if let Some(address) = payload.address.as_deref() {
        patch.insert("address".to_string(), optional_text(address));
    }
    if patch.is_empty() {
        return Err(AppError::BadRequest("No fields to update.".to_string()));
    }

    let updated = update_row(pool, "customers", &path.customer_id, &patch, "id").await?;
    Ok(Json(shape_customer(updated, state.config.default_bottle_price)))
}

async fn delete_customer(
    State(state): State<AppState>,
    Path(path): Path<CustomerPath>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    require_admin(&state, &headers).await?;
    let pool = db_pool(&state)?;

    let deleted = delete_row(pool, "customers", &path.customer_id, "id").await?;
    if let Some(user_id) = non_empty_opt(deleted.get("user_id").and_then(Value::as_str)) {
        forget_customer_link(&state, &user_id).await;
    }
    tracing::info!(customer_id = %path.customer_id, "Customer deleted");
    Ok(Json(shape_customer(deleted, state.config.default_bottle_price)))
}

async fn update_customer_rates(
    State(state): State<AppState>,
    Path(path): Path<CustomerPath>,
    headers: HeaderMap,
    Json(payload): Json<UpdateCustomerRatesInput>,
) -> AppResult<Json<Value>> {
    validate_input(&payload)?;
    require_admin(&state, &headers).await?;
    let pool = db_pool(&state)?;

    let mut patch = Map::new();
    insert_rate_fields(
        &mut patch,
        payload.bottle_price_minor,
        payload.deposit_bottles,
        payload.deposit_amount_minor,
    );
    if patch.is_empty() {
        return Err(AppError::BadRequest("No fields to update.".to_string()));
    }

    let updated = update_row(pool, "customers", &path.customer_id, &patch, "id").await?;
    tracing::info!(customer_id = %path.customer_id, "Customer rates updated");
    Ok(Json(shape_customer(updated, state.config.default_bottle_price)))
}

async fn link_customer_account(
    State(state): State<AppState>,
    Path(path): Path<CustomerPath>,
    headers: HeaderMap,
    Json(payload): Json<LinkCustomerAccountInput>,
) -> AppResult<Json<Value>> {
    require_admin(&state, &headers).await?;
    let pool = db_pool(&state)?;

    let current = get_row(pool, "customers", &path.customer_id, "id").await?;
    let previous_user_id = non_empty_opt(current.get("user_id").and_then(Value::as_str));

    let next_user_id = match non_empty_opt(payload.user_id.as_deref()) {
        Some(user_id) => {
            uuid::Uuid::parse_str(&user_id)
                .map_err(|_| AppError::BadRequest("Invalid user_id format.".to_string()))?;

            let mut filters = Map::new();
            filters.insert("user_id".to_string(), Value::String(user_id.clone()));
            let existing = list_rows(pool, "customers", Some(&filters), 1, 0, "created_at", true)
                .await?;
            let taken_elsewhere = existing
                .first()
                .is_some_and(|row| value_str(row, "id") != path.customer_id);
            if taken_elsewhere {
                return Err(AppError::Conflict(
                    "This account is already linked to another customer.".to_string(),
                ));
            }
            Some(user_id)
        }
        None => None,
    };

    let mut patch = Map::new();
    patch.insert(
        "user_id".to_string(),
        next_user_id.clone().map_or(Value::Null, Value::String),
    );
    let updated = update_row(pool, "customers", &path.customer_id, &patch, "id").await?;

    for user_id in previous_user_id.iter().chain(next_user_id.iter()) {
        forget_customer_link(&state, user_id).await;
    }
    tracing::info!(
        customer_id = %path.customer_id,
        linked = next_user_id.is_some(),
        "Customer account link changed"
    );
    Ok(Json(shape_customer(updated, state.config.default_bottle_price)))
}

/// Customer row as the API returns it: amounts in minor units plus the price
/// billing will actually use.
pub fn shape_customer(row: Value, default_price: Money) -> Value {
    let configured = row.get("bottle_price").and_then(Money::from_db);
    let mut shaped = expose_minor(row, &["bottle_price", "deposit_amount"]);
    if let Some(obj) = shaped.as_object_mut() {
        obj.insert(
            "effective_bottle_price_minor".to_string(),
            Value::from(effective_bottle_price(configured, default_price).minor()),
        );
    }
    shaped
}

fn insert_rate_fields(
    record: &mut Map<String, Value>,
    bottle_price_minor: Option<i64>,
    deposit_bottles: Option<i64>,
    deposit_amount_minor: Option<i64>,
) {
    if let Some(price) = bottle_price_minor {
        record.insert(
            "bottle_price".to_string(),
            Money::from_minor(price).to_db(),
        );
    }
    if let Some(bottles) = deposit_bottles {
        record.insert("deposit_bottles".to_string(), Value::from(bottles));
    }
    if let Some(amount) = deposit_amount_minor {
        record.insert(
            "deposit_amount".to_string(),
            Money::from_minor(amount).to_db(),
        );
    }
}

fn optional_text(raw: &str) -> Value {
    non_empty_opt(Some(raw)).map_or(Value::Null, Value::String)
}

pub fn escape_like(raw: &str) -> String {
    raw.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

fn value_str(row: &Value, key: &str) -> String {
    row.as_object()
        .and_then(|obj| obj.get(key))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned)
        .unwrap_or_default()
}

fn non_empty_opt(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(ToOwned::to_owned)
}
