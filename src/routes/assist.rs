use axum::{extract::State, http::HeaderMap, Json};
use serde_json::{json, Value};

use crate::{
    auth::require_admin,
    db::db_pool,
    error::AppResult,
    money::Money,
    repository::table_service::list_rows,
    routes::invoices::shape_invoice,
    schemas::{validate_input, ParseDeliveryTextInput, SuggestInvoiceInput},
    services::{
        assist::{parse_delivery_text, suggest_invoice, CustomerCandidate, InvoiceDraft},
        invoices::PaymentMethod,
        ledger::load_customers,
    },
    state::AppState,
};

const SUGGESTION_HISTORY_LIMIT: i64 = 50;

pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route(
            "/assist/parse-delivery",
            axum::routing::post(parse_delivery),
        )
        .route(
            "/assist/suggest-invoice",
            axum::routing::post(suggest_invoice_fields),
        )
}

async fn parse_delivery(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<ParseDeliveryTextInput>,
) -> AppResult<Json<Value>> {
    validate_input(&payload)?;
    require_admin(&state, &headers).await?;
    let pool = db_pool(&state)?;

    let customers = load_customers(pool)
        .await?
        .iter()
        .filter_map(|row| {
            Some(CustomerCandidate {
                id: row.get("id").and_then(Value::as_str)?.to_string(),
                name: row.get("name").and_then(Value::as_str)?.to_string(),
            })
        })
        .collect::<Vec<_>>();

    let parsed = parse_delivery_text(&state, &payload.text, &customers).await?;
    tracing::debug!(
        bottles = parsed.bottles,
        matched = parsed.customer.is_some(),
        "Parsed spoken delivery"
    );
    Ok(Json(json!(parsed)))
}

async fn suggest_invoice_fields(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<SuggestInvoiceInput>,
) -> AppResult<Json<Value>> {
    validate_input(&payload)?;
    require_admin(&state, &headers).await?;
    let pool = db_pool(&state)?;

    let draft = InvoiceDraft {
        customer_name: payload
            .customer_name
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(ToOwned::to_owned),
        payment_method: payload
            .payment_method
            .as_deref()
            .and_then(PaymentMethod::parse_loose),
        amount: payload
            .amount_minor
            .map(Money::from_minor)
            .filter(|amount| amount.is_positive()),
    };

    let history = list_rows(
        pool,
        "invoices",
        None,
        SUGGESTION_HISTORY_LIMIT,
        0,
        "created_at",
        false,
    )
    .await?;
    let suggestion = suggest_invoice(&state, &draft, &history).await?;
    Ok(Json(json!({
        "suggestion": suggestion,
        "recent_invoices": history.into_iter().take(5).map(shape_invoice).collect::<Vec<_>>(),
    })))
}
