use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    response::IntoResponse,
    Json,
};
use serde_json::{json, Map, Value};

use crate::{
    auth::require_admin,
    db::db_pool,
    error::{AppError, AppResult},
    money::{expose_minor, Money},
    repository::table_service::{create_row, delete_row, get_row, list_rows, update_row},
    routes::customers::shape_customer,
    schemas::{
        clamp_limit_in_range, validate_input, BillingRecordPath, BillingRecordsQuery,
        CreateBillingRecordInput, CustomerPath, PeriodQuery, UpdateBillingRecordInput,
    },
    services::{
        billing::{billing_balance, summarize_period, ReconciledPeriod},
        ledger::{
            customer_periods, load_billing_records, load_customers, optional_period,
            period_board, period_filters, resolve_period,
        },
    },
    state::AppState,
};

pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route(
            "/customers/{customer_id}/billing",
            axum::routing::get(customer_billing),
        )
        .route("/billing/board", axum::routing::get(billing_board))
        .route("/billing/summary", axum::routing::get(billing_summary))
        .route(
            "/billing-records",
            axum::routing::get(list_billing_records).post(create_billing_record),
        )
        .route(
            "/billing-records/{record_id}",
            axum::routing::get(get_billing_record)
                .patch(update_billing_record)
                .delete(delete_billing_record),
        )
}

async fn customer_billing(
    State(state): State<AppState>,
    Path(path): Path<CustomerPath>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    require_admin(&state, &headers).await?;
    let pool = db_pool(&state)?;

    let customer = get_row(pool, "customers", &path.customer_id, "id").await?;
    let periods = customer_periods(&state, pool, &customer).await?;
    Ok(Json(json!({
        "customer": shape_customer(customer, state.config.default_bottle_price),
        "data": periods,
    })))
}

/// Bill-status board: every customer with deliveries in the month, with
/// the computed bill and the resolved payment status.
async fn billing_board(
    State(state): State<AppState>,
    Query(query): Query<PeriodQuery>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    validate_input(&query)?;
    require_admin(&state, &headers).await?;
    let pool = db_pool(&state)?;

    let period = resolve_period(query.month, query.year, state.config.business_timezone)?;
    let customers = load_customers(pool).await?;
    let board = period_board(&state, pool, period, &customers).await?;

    let names = customer_names(&customers);
    let data = board
        .iter()
        .map(|entry| board_row(entry, &names))
        .collect::<Vec<_>>();
    Ok(Json(json!({
        "month": period.month,
        "year": period.year,
        "month_label": period.label(),
        "data": data,
    })))
}

async fn billing_summary(
    State(state): State<AppState>,
    Query(query): Query<PeriodQuery>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    validate_input(&query)?;
    require_admin(&state, &headers).await?;
    let pool = db_pool(&state)?;

    let period = resolve_period(query.month, query.year, state.config.business_timezone)?;
    let customers = load_customers(pool).await?;
    let board = period_board(&state, pool, period, &customers).await?;
    let records = load_billing_records(pool, None, Some(period)).await?;

    let summary = summarize_period(period, &board, &records);
    let mut body = serde_json::to_value(summary)
        .map_err(|error| AppError::Internal(format!("Could not encode summary: {error}")))?;
    if let Some(obj) = body.as_object_mut() {
        obj.insert("customers_total".to_string(), Value::from(customers.len()));
    }
    Ok(Json(body))
}

async fn list_billing_records(
    State(state): State<AppState>,
    Query(query): Query<BillingRecordsQuery>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    validate_input(&query)?;
    require_admin(&state, &headers).await?;
    let pool = db_pool(&state)?;

    let period = optional_period(query.month, query.year)?;
    let customer_id = query
        .customer_id
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty());
    let filters = period_filters(customer_id, period);

    let rows = list_rows(
        pool,
        "billing_records",
        Some(&filters),
        clamp_limit_in_range(query.limit, 1, 2000),
        0,
        "created_at",
        false,
    )
    .await?;
    let data = rows.into_iter().map(shape_billing_record).collect::<Vec<_>>();
    Ok(Json(json!({ "data": data })))
}

async fn create_billing_record(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateBillingRecordInput>,
) -> AppResult<impl IntoResponse> {
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
        "amount_paid".to_string(),
        Money::from_minor(payload.amount_paid_minor).to_db(),
    );
    record.insert(
        "total_bill".to_string(),
        Money::from_minor(payload.total_bill_minor).to_db(),
    );

    let created = create_row(pool, "billing_records", &record).await?;
    tracing::info!(
        customer_id = %payload.customer_id,
        month = payload.month,
        year = payload.year,
        "Billing record created"
    );
    Ok((
        axum::http::StatusCode::CREATED,
        Json(shape_billing_record(created)),
    ))
}

async fn get_billing_record(
    State(state): State<AppState>,
    Path(path): Path<BillingRecordPath>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    require_admin(&state, &headers).await?;
    let pool = db_pool(&state)?;

    let record = get_row(pool, "billing_records", &path.record_id, "id").await?;
    Ok(Json(shape_billing_record(record)))
}

async fn update_billing_record(
    State(state): State<AppState>,
    Path(path): Path<BillingRecordPath>,
    headers: HeaderMap,
    Json(payload): Json<UpdateBillingRecordInput>,
) -> AppResult<Json<Value>> {
    validate_input(&payload)?;
    require_admin(&state, &headers).await?;
    let pool = db_pool(&state)?;

    let mut patch = Map::new();
    if let Some(month) = payload.month {
        patch.insert("month".to_string(), Value::from(month));
    }
    if let Some(year) = payload.year {
        patch.insert("year".to_string(), Value::from(year));
    }
    if let Some(amount_paid) = payload.amount_paid_minor {
        patch.insert(
            "amount_paid".to_string(),
            Money::from_minor(amount_paid).to_db(),
        );
    }
    if let Some(total_bill) = payload.total_bill_minor {
        patch.insert(
            "total_bill".to_string(),
            Money::from_minor(total_bill).to_db(),
        );
    }
    if patch.is_empty() {
        return Err(AppError::BadRequest("No fields to update.".to_string()));
    }

    let updated = update_row(pool, "billing_records", &path.record_id, &patch, "id").await?;
    Ok(Json(shape_billing_record(updated)))
}

async fn delete_billing_record(
    State(state): State<AppState>,
    Path(path): Path<BillingRecordPath>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    require_admin(&state, &headers).await?;
    let pool = db_pool(&state)?;

    let deleted = delete_row(pool, "billing_records", &path.record_id, "id").await?;
    Ok(Json(shape_billing_record(deleted)))
}

/// Billing record with minor-unit amounts and the signed balance.
pub fn shape_billing_record(row: Value) -> Value {
    let total_bill = row.get("total_bill").and_then(Money::from_db).unwrap_or_default();
    let amount_paid = row.get("amount_paid").and_then(Money::from_db).unwrap_or_default();
    let mut shaped = expose_minor(row, &["amount_paid", "total_bill"]);
    if let Some(obj) = shaped.as_object_mut() {
        obj.insert(
            "balance_minor".to_string(),
            Value::from(billing_balance(total_bill, amount_paid).minor()),
        );
    }
    shaped
}

fn customer_names(customers: &[Value]) -> HashMap<String, String> {
    customers
        .iter()
        .filter_map(|row| {
            let id = row.get("id").and_then(Value::as_str)?;
            let name = row.get("name").and_then(Value::as_str).unwrap_or_default();
            Some((id.to_string(), name.to_string()))
        })
        .collect()
}

fn board_row(entry: &ReconciledPeriod, names: &HashMap<String, String>) -> Value {
    let mut row = serde_json::to_value(entry).unwrap_or_else(|_| Value::Object(Map::new()));
    if let Some(obj) = row.as_object_mut() {
        obj.insert(
            "customer_name".to_string(),
            names
                .get(&entry.totals.customer_id)
                .map_or(Value::Null, |name| Value::String(name.clone())),
        );
    }
    row
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use serde_json::json;

    use super::{board_row, shape_billing_record};
    use crate::{
        money::Money,
        services::billing::{PeriodTotal, ReconciledPeriod, ResolvedStatus},
    };

    #[test]
    fn billing_record_balance_is_signed() {
        let owing = shape_billing_record(json!({
            "id": "r1", "amount_paid": "300", "total_bill": "500"
        }));
        assert_eq!(owing["balance_minor"], json!(20_000));
        assert_eq!(owing["amount_paid_minor"], json!(30_000));

        let overpaid = shape_billing_record(json!({
            "id": "r2", "amount_paid": 600, "total_bill": 500
        }));
        assert_eq!(overpaid["balance_minor"], json!(-10_000));
    }

    #[test]
    fn board_row_flattens_totals_and_names_customer() {
        let entry = ReconciledPeriod {
            totals: PeriodTotal {
                customer_id: "c1".to_string(),
                month: 0,
                year: 2024,
                month_label: "January 2024".to_string(),
                total_bottles: 5,
                total_bill: Money::from_units(500),
            },
            status: ResolvedStatus::Pending,
            status_recorded: false,
        };
        let names = HashMap::from([("c1".to_string(), "Ali".to_string())]);
        let row = board_row(&entry, &names);
        assert_eq!(row["customer_name"], json!("Ali"));
        assert_eq!(row["total_bill_minor"], json!(50_000));
        assert_eq!(row["status"], json!("pending"));
    }
}
