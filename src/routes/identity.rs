use axum::{extract::State, http::HeaderMap, Json};
use serde_json::{json, Value};

use crate::{
    accounts::linked_customer_id,
    auth::{require_supabase_user, resolve_role, SessionRole},
    error::AppResult,
    state::AppState,
};

/// Who is signed in and which screens they get. Customers also learn whether
/// their account is linked to a profile yet.
pub async fn me(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Json<Value>> {
    let user = require_supabase_user(&state, &headers).await?;
    let role = resolve_role(&user, state.config.admin_email.as_deref());

    let customer_id = match (role, state.db_pool.as_ref()) {
        (Some(SessionRole::Customer), Some(pool)) => {
            linked_customer_id(&state, pool, &user.id).await?
        }
        _ => None,
    };

    Ok(Json(json!({
        "id": user.id,
        "email": user.email,
        "role": role.map(SessionRole::as_str),
        "customer_id": customer_id,
    })))
}
