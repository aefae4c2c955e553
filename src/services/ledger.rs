//! Row loading for the billing views. Each call reads fresh rows and hands
//! them to the pure functions in [`crate::services::billing`].

use chrono::Utc;
use chrono_tz::Tz;
use serde_json::{Map, Value};

use crate::{
    error::{AppError, AppResult},
    repository::table_service::list_all_rows,
    services::billing::{
        aggregate_for_period, aggregate_periods, reconcile_statuses, BillingRecordEntry,
        DeliveryEntry, MonthlyStatusEntry, Period, PriceBook, ReconciledPeriod,
    },
    state::AppState,
};

/// Month of "now" in the business timezone.
pub fn current_period(timezone: Tz) -> Period {
    Period::of(Utc::now().with_timezone(&timezone).date_naive())
}

/// Both omitted selects the current month; giving only one is an error.
pub fn resolve_period(month: Option<u32>, year: Option<i32>, timezone: Tz) -> AppResult<Period> {
    match (month, year) {
        (None, None) => Ok(current_period(timezone)),
        (Some(month), Some(year)) => Period::new(month, year).ok_or_else(|| {
            AppError::BadRequest("month must be between 0 and 11.".to_string())
        }),
        _ => Err(AppError::BadRequest(
            "month and year must be given together.".to_string(),
        )),
    }
}

pub fn optional_period(month: Option<u32>, year: Option<i32>) -> AppResult<Option<Period>> {
    match (month, year) {
        (None, None) => Ok(None),
        (Some(month), Some(year)) => Period::new(month, year)
            .map(Some)
            .ok_or_else(|| AppError::BadRequest("month must be between 0 and 11.".to_string())),
        _ => Err(AppError::BadRequest(
            "month and year must be given together.".to_string(),
        )),
    }
}

/// Filters for `deliveries` restricted to one customer and/or one month.
pub fn delivery_filters(customer_id: Option<&str>, period: Option<Period>) -> Map<String, Value> {
    let mut filters = Map::new();
    if let Some(customer_id) = customer_id {
        filters.insert(
            "customer_id".to_string(),
            Value::String(customer_id.to_string()),
        );
    }
    if let Some(period) = period {
        if let (Some(first), Some(last)) = (period.first_day(), period.last_day()) {
            filters.insert("date__gte".to_string(), Value::String(first.to_string()));
            filters.insert("date__lte".to_string(), Value::String(last.to_string()));
        }
    }
    filters
}

pub fn period_filters(customer_id: Option<&str>, period: Option<Period>) -> Map<String, Value> {
    let mut filters = Map::new();
    if let Some(customer_id) = customer_id {
        filters.insert(
            "customer_id".to_string(),
            Value::String(customer_id.to_string()),
        );
    }
    if let Some(period) = period {
        filters.insert("month".to_string(), Value::from(period.month));
        filters.insert("year".to_string(), Value::from(period.year));
    }
    filters
}

pub async fn load_deliveries(
    pool: &sqlx::PgPool,
    timezone: Tz,
    customer_id: Option<&str>,
    period: Option<Period>,
) -> AppResult<Vec<DeliveryEntry>> {
    let filters = delivery_filters(customer_id, period);
    let rows = list_all_rows(pool, "deliveries", Some(&filters), "date", true).await?;
    Ok(rows
        .iter()
        .filter_map(|row| DeliveryEntry::from_row(row, timezone))
        .collect())
}

pub async fn load_statuses(
    pool: &sqlx::PgPool,
    customer_id: Option<&str>,
    period: Option<Period>,
) -> AppResult<Vec<MonthlyStatusEntry>> {
    let filters = period_filters(customer_id, period);
    let rows =
        list_all_rows(pool, "monthly_statuses", Some(&filters), "updated_at", true).await?;
    Ok(rows.iter().filter_map(MonthlyStatusEntry::from_row).collect())
}

pub async fn load_billing_records(
    pool: &sqlx::PgPool,
    customer_id: Option<&str>,
    period: Option<Period>,
) -> AppResult<Vec<BillingRecordEntry>> {
    let filters = period_filters(customer_id, period);
    let rows =
        list_all_rows(pool, "billing_records", Some(&filters), "created_at", true).await?;
    Ok(rows.iter().filter_map(BillingRecordEntry::from_row).collect())
}

pub async fn load_customers(pool: &sqlx::PgPool) -> AppResult<Vec<Value>> {
    list_all_rows(pool, "customers", None, "name", true).await
}

/// Every month a customer received water in, newest first, with statuses.
pub async fn customer_periods(
    state: &AppState,
    pool: &sqlx::PgPool,
    customer: &Value,
) -> AppResult<Vec<ReconciledPeriod>> {
    let customer_id = customer
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| AppError::Internal("Customer row has no id.".to_string()))?;
    let timezone = state.config.business_timezone;
    let deliveries = load_deliveries(pool, timezone, Some(customer_id), None).await?;
    let prices = PriceBook::from_customer_rows(
        std::slice::from_ref(customer),
        state.config.default_bottle_price,
    );
    let statuses = load_statuses(pool, Some(customer_id), None).await?;
    Ok(reconcile_statuses(
        aggregate_periods(&deliveries, &prices),
        &statuses,
    ))
}

/// One month across all customers who received deliveries in it.
pub async fn period_board(
    state: &AppState,
    pool: &sqlx::PgPool,
    period: Period,
    customers: &[Value],
) -> AppResult<Vec<ReconciledPeriod>> {
    let timezone = state.config.business_timezone;
    let deliveries = load_deliveries(pool, timezone, None, Some(period)).await?;
    let prices = PriceBook::from_customer_rows(customers, state.config.default_bottle_price);
    let statuses = load_statuses(pool, None, Some(period)).await?;
    Ok(reconcile_statuses(
        aggregate_for_period(&deliveries, &prices, period),
        &statuses,
    ))
}
