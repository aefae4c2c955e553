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
    repository::table_service::{create_row, delete_row, get_row, list_rows},
    routes::customers::escape_like,
    schemas::{
        clamp_limit_in_range, validate_input, CreateInvoiceInput, InvoicePath, InvoicesQuery,
    },
    services::{
        billing::effective_bottle_price,
        invoices::{build_snapshot, render_share_text, NewInvoice},
        ledger::{load_deliveries, resolve_period},
    },
    state::AppState,
};

const INVOICES_TABLE: &str = "invoices";

pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route(
            "/invoices",
            axum::routing::get(list_invoices).post(create_invoice),
        )
        .route(
            "/invoices/{invoice_id}",
            axum::routing::get(get_invoice).delete(delete_invoice),
        )
        .route(
            "/invoices/{invoice_id}/share-text",
            axum::routing::get(invoice_share_text),
        )
}

async fn list_invoices(
    State(state): State<AppState>,
    Query(query): Query<InvoicesQuery>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    require_admin(&state, &headers).await?;
    let pool = db_pool(&state)?;

    let filters = invoice_list_filters(&query);
    let rows = list_rows(
        pool,
        INVOICES_TABLE,
        Some(&filters),
        clamp_limit_in_range(query.limit, 1, 1000),
        0,
        "created_at",
        false,
    )
    .await?;
    let data = rows.into_iter().map(shape_invoice).collect::<Vec<_>>();
    Ok(Json(json!({ "data": data })))
}

fn invoice_list_filters(query: &InvoicesQuery) -> Map<String, Value> {
    let mut filters = Map::new();
    if let Some(customer_id) = non_empty_opt(query.customer_id.as_deref()) {
        filters.insert("customer_id".to_string(), Value::String(customer_id));
    }
    if let Some(customer_name) = non_empty_opt(query.customer_name.as_deref()) {
        filters.insert(
            "customer_name__ilike".to_string(),
            Value::String(format!("%{}%", escape_like(&customer_name))),
        );
    }
    filters
}

async fn get_invoice(
    State(state): State<AppState>,
    Path(path): Path<InvoicePath>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    require_admin(&state, &headers).await?;
    let pool = db_pool(&state)?;

    let record = get_row(pool, "invoices", &path.invoice_id, "id").await?;
    Ok(Json(shape_invoice(record)))
}

async fn create_invoice(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateInvoiceInput>,
) -> AppResult<impl IntoResponse> {
    validate_input(&payload)?;
    require_admin(&state, &headers).await?;
    let pool = db_pool(&state)?;

    let customer_id = non_empty_opt(payload.customer_id.as_deref());
    let customer = match customer_id.as_deref() {
        Some(id) => Some(get_row(pool, "customers", id, "id").await?),
        None => None,
    };

    let customer_name = non_empty_opt(payload.customer_name.as_deref())
        .or_else(|| {
            customer
                .as_ref()
                .and_then(|row| non_empty_opt(row.get("name").and_then(Value::as_str)))
        })
        .ok_or_else(|| {
            AppError::BadRequest("customer_name or customer_id is required.".to_string())
        })?;

    let timezone = state.config.business_timezone;
    let period = resolve_period(payload.month, payload.year, timezone)?;

    let snapshot = if payload.include_deliveries {
        let (Some(id), Some(customer)) = (customer_id.as_deref(), customer.as_ref()) else {
            return Err(AppError::BadRequest(
                "include_deliveries needs a customer_id.".to_string(),
            ));
        };
        let price = effective_bottle_price(
            customer.get("bottle_price").and_then(Money::from_db),
            state.config.default_bottle_price,
        );
        let deliveries = load_deliveries(pool, timezone, Some(id), Some(period)).await?;
        Some(build_snapshot(&deliveries, id, period, price))
    } else {
        None
    };

    let record = NewInvoice {
        customer_id: customer_id.as_deref(),
        customer_name: &customer_name,
        amount: Money::from_minor(payload.amount_minor),
        payment_method: payload.payment_method,
        recipient_phone: &payload.recipient_phone,
        month_label: period.label(),
        snapshot,
    }
    .into_row();

    let created = create_row(pool, INVOICES_TABLE, &record).await?;
    tracing::info!(
        invoice_id = %value_str(&created, "id"),
        customer_name = %customer_name,
        payment_method = payload.payment_method.as_str(),
        "Invoice created"
    );
    Ok((axum::http::StatusCode::CREATED, Json(shape_invoice(created))))
}

/// Removes only the invoice row; deliveries and billing records stay as
/// they were.
async fn delete_invoice(
    State(state): State<AppState>,
    Path(path): Path<InvoicePath>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    require_admin(&state, &headers).await?;
    let pool = db_pool(&state)?;

    let deleted = delete_row(pool, INVOICES_TABLE, &path.invoice_id, "id").await?;
    tracing::info!(invoice_id = %path.invoice_id, "Invoice deleted");
    Ok(Json(shape_invoice(deleted)))
}

async fn invoice_share_text(
    State(state): State<AppState>,
    Path(path): Path<InvoicePath>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    require_admin(&state, &headers).await?;
    let pool = db_pool(&state)?;

    let record = get_row(pool, "invoices", &path.invoice_id, "id").await?;
    let text = render_share_text(
        &record,
        &state.config.currency_code,
        &state.config.business_name,
    );
    Ok(Json(json!({
        "text": text,
        "recipient_phone": record.get("recipient_phone").cloned().unwrap_or(Value::Null),
    })))
}

pub fn shape_invoice(row: Value) -> Value {
    expose_minor(row, &["amount"])
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

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use serde_json::json;

    use super::{invoice_list_filters, shape_invoice, INVOICES_TABLE};
    use crate::{
        money::Money,
        repository::table_service::{delete_by_id_query, insert_query, ALLOWED_TABLES},
        services::{
            billing::{DeliveryEntry, Period},
            invoices::{build_snapshot, NewInvoice, PaymentMethod},
        },
        schemas::InvoicesQuery,
    };

    fn tables_in(sql: &str) -> Vec<&'static str> {
        let mut tables = sql
            .split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .filter_map(|token| ALLOWED_TABLES.iter().copied().find(|table| *table == token))
            .collect::<Vec<_>>();
        tables.sort_unstable();
        tables.dedup();
        tables
    }

    #[test]
    fn invoice_create_and_delete_write_only_the_invoice_table() {
        let period = Period { month: 0, year: 2024 };
        let deliveries = vec![DeliveryEntry {
            id: "d1".to_string(),
            customer_id: "c1".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 1, 5).expect("valid date"),
            bottles: 3,
        }];
        let record = NewInvoice {
            customer_id: Some("c1"),
            customer_name: "Ali",
            amount: Money::from_units(300),
            payment_method: PaymentMethod::JazzCash,
            recipient_phone: "0300 1234567",
            month_label: period.label(),
            snapshot: Some(build_snapshot(
                &deliveries,
                "c1",
                period,
                Money::from_units(100),
            )),
        }
        .into_row();
        assert!(record.contains_key("deliveries_snapshot"));

        let insert = insert_query(INVOICES_TABLE, &record).expect("insert renders");
        assert_eq!(tables_in(insert.sql()), vec!["invoices"]);

        let delete =
            delete_by_id_query(INVOICES_TABLE, "id", "550e8400-e29b-41d4-a716-446655440000");
        let sql = delete.sql();
        assert!(sql.starts_with("DELETE FROM invoices t WHERE"), "unexpected SQL: {sql}");
        assert_eq!(tables_in(sql), vec!["invoices"]);
    }

    #[test]
    fn invoice_amount_is_exposed_in_minor_units() {
        let shaped = shape_invoice(json!({
            "id": "i1",
            "amount": "1250.00",
            "deliveries_snapshot": { "bottle_price_minor": 10000 }
        }));
        assert_eq!(shaped["amount_minor"], json!(125_000));
        assert!(shaped.get("amount").is_none());
        assert_eq!(shaped["deliveries_snapshot"]["bottle_price_minor"], json!(10000));
    }

    #[test]
    fn name_search_treats_wildcards_literally() {
        let query = InvoicesQuery {
            customer_id: Some("  ".to_string()),
            customer_name: Some(" 50%_off ".to_string()),
            limit: 500,
        };
        let filters = invoice_list_filters(&query);
        assert!(!filters.contains_key("customer_id"));
        assert_eq!(
            filters.get("customer_name__ilike"),
            Some(&json!("%50\\%\\_off%"))
        );
    }
}
