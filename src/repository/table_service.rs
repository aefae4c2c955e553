//! Generic row access against the hosted Postgres.
//!
//! Rows travel as `serde_json::Value` produced by `row_to_json`, and writes go
//! through `jsonb_populate_record` so Postgres resolves column types from the
//! table definition. Table and column names are allow-listed / validated
//! before they are spliced into SQL.

use std::future::Future;

use chrono::{DateTime, FixedOffset, NaiveDate};
use serde_json::{Map, Value};
use sqlx::{postgres::PgRow, Postgres, QueryBuilder, Row};

use crate::error::AppError;

pub(crate) const ALLOWED_TABLES: &[&str] = &[
    "billing_records",
    "customers",
    "deliveries",
    "invoices",
    "monthly_statuses",
    "push_subscriptions",
];

pub const MAX_LIST_LIMIT: i64 = 5000;

pub async fn list_rows(
    pool: &sqlx::PgPool,
    table: &str,
    filters: Option<&Map<String, Value>>,
    limit: i64,
    offset: i64,
    order_by: &str,
    ascending: bool,
) -> Result<Vec<Value>, AppError> {
    let table_name = validate_table(table)?;
    let order_name = if order_by.trim().is_empty() {
        "created_at"
    } else {
        validate_identifier(order_by)?
    };

    let mut query = QueryBuilder::<Postgres>::new("SELECT row_to_json(t) AS row FROM ");
    query.push(table_name).push(" t WHERE 1=1");
    push_filters(&mut query, filters)?;

    query
        .push(" ORDER BY t.")
        .push(order_name)
        .push(if ascending { " ASC" } else { " DESC" })
        .push(", t.id ASC");
    query
        .push(" LIMIT ")
        .push_bind(limit.clamp(1, MAX_LIST_LIMIT))
        .push(" OFFSET ")
        .push_bind(offset.max(0));

    let rows = query.build().fetch_all(pool).await.map_err(map_db_error)?;
    Ok(read_rows(rows))
}

/// Every matching row, fetched in `MAX_LIST_LIMIT` pages. Ordering ties are
/// broken by `id`, so pages do not overlap.
pub async fn list_all_rows(
    pool: &sqlx::PgPool,
    table: &str,
    filters: Option<&Map<String, Value>>,
    order_by: &str,
    ascending: bool,
) -> Result<Vec<Value>, AppError> {
    collect_pages(MAX_LIST_LIMIT, move |offset| {
        list_rows(
            pool,
            table,
            filters,
            MAX_LIST_LIMIT,
            offset,
            order_by,
            ascending,
        )
    })
    .await
}

/// Calls `fetch_page` with growing offsets until a page comes back short.
async fn collect_pages<F, Fut>(page_size: i64, mut fetch_page: F) -> Result<Vec<Value>, AppError>
where
    F: FnMut(i64) -> Fut,
    Fut: Future<Output = Result<Vec<Value>, AppError>>,
{
    let mut rows = Vec::new();
    let mut offset = 0_i64;
    loop {
        let page = fetch_page(offset).await?;
        let fetched = i64::try_from(page.len()).unwrap_or(i64::MAX);
        rows.extend(page);
        if fetched < page_size {
            return Ok(rows);
        }
        offset = offset.saturating_add(fetched);
    }
}

pub async fn get_row(
    pool: &sqlx::PgPool,
    table: &str,
    row_id: &str,
    id_field: &str,
) -> Result<Value, AppError> {
    let table_name = validate_table(table)?;
    let id_name = validate_identifier(id_field)?;

    let mut query = QueryBuilder::<Postgres>::new("SELECT row_to_json(t) AS row FROM ");
    query.push(table_name).push(" t WHERE ");
    push_scalar_filter(
        &mut query,
        id_name,
        FilterOperator::Eq,
        &infer_scalar_filter(id_name, &Value::String(row_id.to_string())),
    );
    query.push(" LIMIT 1");

    let row = query
        .build()
        .fetch_optional(pool)
        .await
        .map_err(map_db_error)?;

    row.and_then(|value| value.try_get::<Option<Value>, _>("row").ok().flatten())
        .ok_or_else(|| AppError::NotFound(format!("{} record not found.", singular(table_name))))
}

pub async fn create_row(
    pool: &sqlx::PgPool,
    table: &str,
    payload: &Map<String, Value>,
) -> Result<Value, AppError> {
    let table_name = validate_table(table)?;
    if payload.is_empty() {
        return Err(AppError::BadRequest(format!(
            "Could not create {} record.",
            singular(table_name)
        )));
    }

    let query = insert_query(table_name, payload)?;
    fetch_single_row(query, pool, || {
        AppError::Internal(format!("Could not create {} record.", singular(table_name)))
    })
    .await
}

/// Insert, or update the existing row that collides on `conflict_columns`.
/// Every conflict column must be present in `payload`.
pub async fn upsert_row(
    pool: &sqlx::PgPool,
    table: &str,
    payload: &Map<String, Value>,
    conflict_columns: &[&str],
) -> Result<Value, AppError> {
    let table_name = validate_table(table)?;
    if conflict_columns.is_empty() {
        return Err(AppError::Internal("Upsert needs conflict columns.".to_string()));
    }
    for column in conflict_columns {
        if !payload.contains_key(*column) {
            return Err(AppError::BadRequest(format!("{column} is required.")));
        }
    }

    let keys = sorted_columns(payload)?;
    let mut query = QueryBuilder::<Postgres>::new("INSERT INTO ");
    query.push(table_name);
    push_populated_insert(&mut query, table_name, &keys, payload);

    query.push(" ON CONFLICT (");
    {
        let mut separated = query.separated(", ");
        for column in conflict_columns {
            separated.push(validate_identifier(column)?);
        }
    }
    query.push(") DO UPDATE SET ");
    {
        let mut separated = query.separated(", ");
        let updatable = keys
            .iter()
            .filter(|key| !conflict_columns.contains(&key.as_str()))
            .collect::<Vec<_>>();
        if updatable.is_empty() {
            // Touch a conflict column so RETURNING still yields the row.
            let column = validate_identifier(conflict_columns[0])?;
            separated.push(column);
            separated.push_unseparated(" = EXCLUDED.");
            separated.push_unseparated(column);
        }
        for key in updatable {
            separated.push(key.as_str());
            separated.push_unseparated(" = EXCLUDED.");
            separated.push_unseparated(key.as_str());
        }
    }
    query
        .push(" RETURNING row_to_json(")
        .push(table_name)
        .push(".*) AS row");

    fetch_single_row(query, pool, || {
        AppError::Internal(format!("Could not save {} record.", singular(table_name)))
    })
    .await
}

pub async fn update_row(
    pool: &sqlx::PgPool,
    table: &str,
    row_id: &str,
    payload: &Map<String, Value>,
    id_field: &str,
) -> Result<Value, AppError> {
    let table_name = validate_table(table)?;
    let id_name = validate_identifier(id_field)?;
    if payload.is_empty() {
        return Err(AppError::BadRequest("No fields to update.".to_string()));
    }

    let keys = sorted_columns(payload)?;
    let mut query = QueryBuilder::<Postgres>::new("UPDATE ");
    query.push(table_name).push(" t SET ");
    {
        let mut separated = query.separated(", ");
        for key in &keys {
            separated.push(key.as_str());
            separated.push_unseparated(" = r.");
            separated.push_unseparated(key.as_str());
        }
    }
    query
        .push(" FROM jsonb_populate_record(NULL::")
        .push(table_name)
        .push(", ");
    query.push_bind(Value::Object(payload.clone()));
    query.push(") r WHERE ");
    push_scalar_filter(
        &mut query,
        id_name,
        FilterOperator::Eq,
        &infer_scalar_filter(id_name, &Value::String(row_id.to_string())),
    );
    query.push(" RETURNING row_to_json(t) AS row");

    fetch_single_row(query, pool, || {
        AppError::NotFound(format!("{} record not found.", singular(table_name)))
    })
    .await
}

/// Deletes one row and hands back what was removed.
pub async fn delete_row(
    pool: &sqlx::PgPool,
    table: &str,
    row_id: &str,
    id_field: &str,
) -> Result<Value, AppError> {
    let table_name = validate_table(table)?;
    let id_name = validate_identifier(id_field)?;

    let query = delete_by_id_query(table_name, id_name, row_id);
    fetch_single_row(query, pool, || {
        AppError::NotFound(format!("{} record not found.", singular(table_name)))
    })
    .await
}

/// Deletes every row matching `filters`; refuses to run without a filter.
pub async fn delete_rows(
    pool: &sqlx::PgPool,
    table: &str,
    filters: &Map<String, Value>,
) -> Result<u64, AppError> {
    let table_name = validate_table(table)?;
    if filters.values().all(Value::is_null) {
        return Err(AppError::BadRequest(
            "Refusing to delete without a filter.".to_string(),
        ));
    }

    let mut query = QueryBuilder::<Postgres>::new("DELETE FROM ");
    query.push(table_name).push(" t WHERE 1=1");
    push_filters(&mut query, Some(filters))?;

    let result = query.build().execute(pool).await.map_err(map_db_error)?;
    Ok(result.rows_affected())
}

async fn fetch_single_row<F>(
    mut query: QueryBuilder<'_, Postgres>,
    pool: &sqlx::PgPool,
    missing: F,
) -> Result<Value, AppError>
where
    F: FnOnce() -> AppError,
{
    let row = query
        .build()
        .fetch_optional(pool)
        .await
        .map_err(map_db_error)?;

    row.and_then(|value| value.try_get::<Option<Value>, _>("row").ok().flatten())
        .ok_or_else(missing)
}

pub(crate) fn insert_query(
    table_name: &str,
    payload: &Map<String, Value>,
) -> Result<QueryBuilder<'static, Postgres>, AppError> {
    let keys = sorted_columns(payload)?;
    let mut query = QueryBuilder::<Postgres>::new("INSERT INTO ");
    query.push(table_name);
    push_populated_insert(&mut query, table_name, &keys, payload);
    query
        .push(" RETURNING row_to_json(")
        .push(table_name)
        .push(".*) AS row");
    Ok(query)
}

pub(crate) fn delete_by_id_query(
    table_name: &str,
    id_name: &str,
    row_id: &str,
) -> QueryBuilder<'static, Postgres> {
    let mut query = QueryBuilder::<Postgres>::new("DELETE FROM ");
    query.push(table_name).push(" t WHERE ");
    push_scalar_filter(
        &mut query,
        id_name,
        FilterOperator::Eq,
        &infer_scalar_filter(id_name, &Value::String(row_id.to_string())),
    );
    query.push(" RETURNING row_to_json(t) AS row");
    query
}

fn push_populated_insert(
    query: &mut QueryBuilder<'_, Postgres>,
    table_name: &str,
    keys: &[String],
    payload: &Map<String, Value>,
) {
    query.push(" (");
    {
        let mut separated = query.separated(", ");
        for key in keys {
            separated.push(key.as_str());
        }
    }
    query.push(") SELECT ");
    {
        let mut separated = query.separated(", ");
        for key in keys {
            separated.push("r.");
            separated.push_unseparated(key.as_str());
        }
    }
    query
        .push(" FROM jsonb_populate_record(NULL::")
        .push(table_name)
        .push(", ");
    query.push_bind(Value::Object(payload.clone()));
    query.push(") r");
}

fn sorted_columns(payload: &Map<String, Value>) -> Result<Vec<String>, AppError> {
    let mut keys = Vec::with_capacity(payload.len());
    for key in payload.keys() {
        keys.push(validate_identifier(key)?.to_string());
    }
    keys.sort_unstable();
    Ok(keys)
}

fn read_rows(rows: Vec<PgRow>) -> Vec<Value> {
    rows.into_iter()
        .filter_map(|row| row.try_get::<Option<Value>, _>("row").ok().flatten())
        .collect()
}

fn singular(table: &str) -> &str {
    match table {
        "billing_records" => "Billing",
        "customers" => "Customer",
        "deliveries" => "Delivery",
        "invoices" => "Invoice",
        "monthly_statuses" => "Monthly status",
        "push_subscriptions" => "Push subscription",
        other => other,
    }
}

fn validate_table(table: &str) -> Result<&str, AppError> {
    let normalized = validate_identifier(table)?;
    if ALLOWED_TABLES.contains(&normalized) {
        return Ok(normalized);
    }
    Err(AppError::Forbidden(format!(
        "Table '{normalized}' is not allowed."
    )))
}

fn validate_identifier(identifier: &str) -> Result<&str, AppError> {
    let trimmed = identifier.trim();
    if trimmed.is_empty() {
        return Err(AppError::BadRequest(
            "Identifier cannot be empty.".to_string(),
        ));
    }
    let valid_chars = trimmed.chars().all(|character| {
        character.is_ascii_lowercase() || character.is_ascii_digit() || character == '_'
    });
    let starts_with_digit = trimmed
        .chars()
        .next()
        .is_some_and(|first| first.is_ascii_digit());
    if !valid_chars || starts_with_digit {
        return Err(AppError::BadRequest(format!(
            "Invalid identifier '{trimmed}'."
        )));
    }
    Ok(trimmed)
}

#[derive(Debug, Clone, PartialEq)]
enum ScalarFilter {
    Text(String),
    Uuid(uuid::Uuid),
    Bool(bool),
    I64(i64),
    F64(f64),
    Date(NaiveDate),
    Timestamp(DateTime<FixedOffset>),
}

#[derive(Debug, Clone, PartialEq)]
enum ArrayFilter {
    Text(Vec<String>),
    Uuid(Vec<uuid::Uuid>),
    I64(Vec<i64>),
}

impl ArrayFilter {
    fn is_empty(&self) -> bool {
        match self {
            Self::Text(values) => values.is_empty(),
            Self::Uuid(values) => values.is_empty(),
            Self::I64(values) => values.is_empty(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FilterOperator {
    Eq,
    Gt,
    Gte,
    Lt,
    Lte,
    ILike,
    IsNull,
}

impl FilterOperator {
    fn sql(self) -> &'static str {
        match self {
            Self::Eq => " = ",
            Self::Gt => " > ",
            Self::Gte => " >= ",
            Self::Lt => " < ",
            Self::Lte => " <= ",
            Self::ILike => " ILIKE ",
            Self::IsNull => " IS NULL",
        }
    }
}

/// `column`, `column__gte`, `column__lte`, `column__ilike`, `column__is_null`...
fn parse_filter_key(filter_key: &str) -> Result<(&str, FilterOperator), AppError> {
    let Some((column, suffix)) = filter_key.rsplit_once("__") else {
        return Ok((validate_identifier(filter_key)?, FilterOperator::Eq));
    };

    let operator = match suffix {
        "gt" => FilterOperator::Gt,
        "gte" => FilterOperator::Gte,
        "lt" => FilterOperator::Lt,
        "lte" => FilterOperator::Lte,
        "ilike" => FilterOperator::ILike,
        "is_null" => FilterOperator::IsNull,
        "in" | "eq" => FilterOperator::Eq,
        _ => return Ok((validate_identifier(filter_key)?, FilterOperator::Eq)),
    };
    Ok((validate_identifier(column)?, operator))
}

fn push_filters(
    query: &mut QueryBuilder<'_, Postgres>,
    filters: Option<&Map<String, Value>>,
) -> Result<(), AppError> {
    if let Some(filter_map) = filters {
        for (key, value) in filter_map {
            push_filter_clause(query, key, value)?;
        }
    }
    Ok(())
}

fn push_filter_clause(
    query: &mut QueryBuilder<'_, Postgres>,
    filter_key: &str,
    value: &Value,
) -> Result<(), AppError> {
    let (column, operator) = parse_filter_key(filter_key)?;

    if operator == FilterOperator::IsNull {
        let should_be_null = value.as_bool().unwrap_or(true);
        query.push(" AND t.").push(column);
        query.push(if should_be_null { " IS NULL" } else { " IS NOT NULL" });
        return Ok(());
    }

    match value {
        Value::Null => Ok(()),
        Value::Array(items) => {
            if operator != FilterOperator::Eq {
                return Err(AppError::BadRequest(format!(
                    "Filter '{filter_key}' does not support array values."
                )));
            }
            let filter = infer_array_filter(column, items);
            if filter.is_empty() {
                // An empty IN-list matches nothing.
                query.push(" AND FALSE");
                return Ok(());
            }
            query.push(" AND ");
            push_array_filter(query, column, &filter);
            Ok(())
        }
        _ => {
            query.push(" AND ");
            let filter = infer_scalar_filter(column, value);
            push_scalar_filter(query, column, operator, &filter);
            Ok(())
        }
    }
}

fn push_scalar_filter(
    query: &mut QueryBuilder<'_, Postgres>,
    column: &str,
    operator: FilterOperator,
    value: &ScalarFilter,
) {
    query.push("t.").push(column);
    if operator == FilterOperator::ILike {
        let pattern = match value {
            ScalarFilter::Text(text) => text.clone(),
            other => scalar_to_text(other),
        };
        query.push("::text ILIKE ").push_bind(pattern);
        return;
    }

    let sql_operator = operator.sql();
    match value {
        ScalarFilter::Text(text) => {
            query.push("::text").push(sql_operator).push_bind(text.clone());
        }
        ScalarFilter::Uuid(id) => {
            query.push(sql_operator).push_bind(*id);
        }
        ScalarFilter::Bool(flag) => {
            query.push(sql_operator).push_bind(*flag);
        }
        ScalarFilter::I64(number) => {
            query.push(sql_operator).push_bind(*number);
        }
        ScalarFilter::F64(number) => {
            query.push(sql_operator).push_bind(*number);
        }
        ScalarFilter::Date(date) => {
            query.push(sql_operator).push_bind(*date);
        }
        ScalarFilter::Timestamp(timestamp) => {
            query.push(sql_operator).push_bind(*timestamp);
        }
    }
}

fn push_array_filter(query: &mut QueryBuilder<'_, Postgres>, column: &str, value: &ArrayFilter) {
    query.push("t.").push(column);
    match value {
        ArrayFilter::Text(values) => {
            query.push("::text = ANY(").push_bind(values.clone()).push(")");
        }
        ArrayFilter::Uuid(values) => {
            query.push(" = ANY(").push_bind(values.clone()).push(")");
        }
        ArrayFilter::I64(values) => {
            query.push(" = ANY(").push_bind(values.clone()).push(")");
        }
    }
}

fn scalar_to_text(value: &ScalarFilter) -> String {
    match value {
        ScalarFilter::Text(text) => text.clone(),
        ScalarFilter::Uuid(id) => id.to_string(),
        ScalarFilter::Bool(flag) => flag.to_string(),
        ScalarFilter::I64(number) => number.to_string(),
        ScalarFilter::F64(number) => number.to_string(),
        ScalarFilter::Date(date) => date.to_string(),
        ScalarFilter::Timestamp(timestamp) => timestamp.to_rfc3339(),
    }
}

fn infer_scalar_filter(column: &str, value: &Value) -> ScalarFilter {
    match value {
        Value::Bool(flag) => ScalarFilter::Bool(*flag),
        Value::Number(number) => number
            .as_i64()
            .map(ScalarFilter::I64)
            .or_else(|| number.as_f64().map(ScalarFilter::F64))
            .unwrap_or_else(|| ScalarFilter::Text(number.to_string())),
        Value::String(text) => {
            let trimmed = text.trim();
            if is_uuid_column(column) {
                if let Ok(parsed) = uuid::Uuid::parse_str(trimmed) {
                    return ScalarFilter::Uuid(parsed);
                }
            }
            if is_timestamp_column(column) {
                if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
                    return ScalarFilter::Timestamp(parsed);
                }
            }
            if is_date_column(column) {
                if let Ok(parsed) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
                    return ScalarFilter::Date(parsed);
                }
            }
            ScalarFilter::Text(text.clone())
        }
        other => ScalarFilter::Text(other.to_string()),
    }
}

fn infer_array_filter(column: &str, values: &[Value]) -> ArrayFilter {
    if is_uuid_column(column) {
        let parsed = values
            .iter()
            .map(|value| value.as_str().and_then(|text| uuid::Uuid::parse_str(text.trim()).ok()))
            .collect::<Option<Vec<_>>>();
        if let Some(ids) = parsed {
            return ArrayFilter::Uuid(ids);
        }
    }

    if let Some(numbers) = values.iter().map(Value::as_i64).collect::<Option<Vec<_>>>() {
        if !numbers.is_empty() {
            return ArrayFilter::I64(numbers);
        }
    }

    ArrayFilter::Text(
        values
            .iter()
            .map(|value| match value {
                Value::String(text) => text.clone(),
                other => other.to_string(),
            })
            .collect(),
    )
}

fn is_uuid_column(column: &str) -> bool {
    column == "id" || column.ends_with("_id")
}

fn is_date_column(column: &str) -> bool {
    column == "date" || column.ends_with("_date")
}

fn is_timestamp_column(column: &str) -> bool {
    column.ends_with("_at")
}

fn map_db_error(error: sqlx::Error) -> AppError {
    let message = error.to_string();
    tracing::error!(db_error = %message, "Database query failed");

    let is_unique_violation = error
        .as_database_error()
        .and_then(|db_error| db_error.code())
        .is_some_and(|code| code == "23505");
    if is_unique_violation {
        return AppError::Conflict("Duplicate value violates a unique constraint.".to_string());
    }
    AppError::Dependency(format!("Database operation failed: {message}"))
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Map, Value};
    use sqlx::{Postgres, QueryBuilder};

    use super::{
        collect_pages, infer_array_filter, infer_scalar_filter, parse_filter_key,
        push_filter_clause, validate_identifier, validate_table, ArrayFilter, FilterOperator,
        ScalarFilter,
    };
    use crate::error::AppError;

    fn stored_rows(count: usize) -> Vec<Value> {
        (0..count).map(|index| json!({ "id": index })).collect()
    }

    async fn page_through(stored: &[Value], page_size: i64) -> (Vec<Value>, Vec<i64>) {
        let mut offsets = Vec::new();
        let rows = collect_pages(page_size, |offset| {
            offsets.push(offset);
            let start = usize::try_from(offset).unwrap_or(usize::MAX).min(stored.len());
            let end = (start + usize::try_from(page_size).unwrap_or(0)).min(stored.len());
            let page = stored[start..end].to_vec();
            async move { Ok::<_, AppError>(page) }
        })
        .await
        .expect("paging succeeds");
        (rows, offsets)
    }

    #[tokio::test]
    async fn paging_returns_rows_past_a_single_page() {
        let stored = stored_rows(12);
        let (rows, offsets) = page_through(&stored, 5).await;
        assert_eq!(rows, stored);
        assert_eq!(offsets, vec![0, 5, 10]);
    }

    #[tokio::test]
    async fn paging_stops_on_empty_page_after_exact_multiple() {
        let stored = stored_rows(10);
        let (rows, offsets) = page_through(&stored, 5).await;
        assert_eq!(rows.len(), 10);
        assert_eq!(offsets, vec![0, 5, 10]);
    }

    #[tokio::test]
    async fn paging_propagates_errors() {
        let result = collect_pages(5, |_| async {
            Err::<Vec<Value>, _>(AppError::Dependency("down".to_string()))
        })
        .await;
        assert!(result.is_err());
    }

    #[test]
    fn rejects_unknown_tables_and_bad_identifiers() {
        assert!(validate_table("deliveries").is_ok());
        assert!(validate_table("organizations").is_err());
        assert!(validate_identifier("bottle_price").is_ok());
        assert!(validate_identifier("1bottles").is_err());
        assert!(validate_identifier("name; drop table customers").is_err());
        assert!(validate_identifier("  ").is_err());
    }

    #[test]
    fn filter_suffixes_map_to_operators() {
        assert_eq!(
            parse_filter_key("date__gte").ok(),
            Some(("date", FilterOperator::Gte))
        );
        assert_eq!(
            parse_filter_key("name__ilike").ok(),
            Some(("name", FilterOperator::ILike))
        );
        assert_eq!(
            parse_filter_key("customer_id").ok(),
            Some(("customer_id", FilterOperator::Eq))
        );
        assert_eq!(
            parse_filter_key("user_id__is_null").ok(),
            Some(("user_id", FilterOperator::IsNull))
        );
    }

    #[test]
    fn infers_column_types_from_names() {
        assert_eq!(
            infer_scalar_filter("date", &json!("2024-01-05")),
            ScalarFilter::Date(chrono::NaiveDate::from_ymd_opt(2024, 1, 5).expect("valid date"))
        );
        assert!(matches!(
            infer_scalar_filter("customer_id", &json!("550e8400-e29b-41d4-a716-446655440000")),
            ScalarFilter::Uuid(_)
        ));
        assert_eq!(
            infer_scalar_filter("customer_id", &json!("legacy-7")),
            ScalarFilter::Text("legacy-7".to_string())
        );
        assert_eq!(infer_scalar_filter("month", &json!(0)), ScalarFilter::I64(0));
    }

    #[test]
    fn array_filters_prefer_uuid_then_integer() {
        assert!(matches!(
            infer_array_filter("id", &[json!("550e8400-e29b-41d4-a716-446655440000")]),
            ArrayFilter::Uuid(_)
        ));
        assert_eq!(
            infer_array_filter("year", &[json!(2023), json!(2024)]),
            ArrayFilter::I64(vec![2023, 2024])
        );
        assert_eq!(
            infer_array_filter("status", &[json!("paid")]),
            ArrayFilter::Text(vec!["paid".to_string()])
        );
    }

    #[test]
    fn empty_in_list_matches_nothing() {
        let mut query = QueryBuilder::<Postgres>::new("SELECT 1 FROM deliveries t WHERE 1=1");
        let result = push_filter_clause(&mut query, "customer_id", &Value::Array(Vec::new()));
        assert!(result.is_ok());
        assert!(query.sql().ends_with(" AND FALSE"));
    }

    #[test]
    fn range_filters_render_comparison_sql() {
        let mut filters = Map::new();
        filters.insert("date__gte".to_string(), json!("2024-01-01"));
        filters.insert("date__lte".to_string(), json!("2024-01-31"));

        let mut query = QueryBuilder::<Postgres>::new("SELECT 1 FROM deliveries t WHERE 1=1");
        for (key, value) in &filters {
            assert!(push_filter_clause(&mut query, key, value).is_ok());
        }
        let sql = query.sql();
        assert!(sql.contains("t.date >= $1"), "unexpected SQL: {sql}");
        assert!(sql.contains("t.date <= $2"), "unexpected SQL: {sql}");
    }

    #[test]
    fn array_value_with_range_operator_is_rejected() {
        let mut query = QueryBuilder::<Postgres>::new("SELECT 1");
        assert!(push_filter_clause(&mut query, "date__gte", &json!(["2024-01-01"])).is_err());
    }
}
