use axum::{
    extract::{Path, State},
    http::HeaderMap,
    Json,
};
use serde_json::{json, Value};

use crate::{
    auth::require_admin,
    db::db_pool,
    error::AppResult,
    repository::table_service::get_row,
    schemas::{validate_input, CustomerPath, SendNotificationInput},
    services::push::{notify_customer, PushMessage},
    state::AppState,
};

pub fn router() -> axum::Router<AppState> {
    axum::Router::new().route(
        "/customers/{customer_id}/notify",
        axum::routing::post(send_customer_notification),
    )
}

async fn send_customer_notification(
    State(state): State<AppState>,
    Path(path): Path<CustomerPath>,
    headers: HeaderMap,
    Json(payload): Json<SendNotificationInput>,
) -> AppResult<Json<Value>> {
    validate_input(&payload)?;
    require_admin(&state, &headers).await?;
    let pool = db_pool(&state)?;

    get_row(pool, "customers", &path.customer_id, "id").await?;

    let message = PushMessage {
        title: payload.title.trim().to_string(),
        body: payload.body.trim().to_string(),
        url: payload.url,
    };
    let sent = notify_customer(&state, pool, &path.customer_id, &message).await?;
    tracing::info!(customer_id = %path.customer_id, sent, "Admin notification sent");
    Ok(Json(json!({ "sent": sent })))
}
