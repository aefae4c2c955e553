use axum::http::{header::AUTHORIZATION, HeaderMap};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use serde_json::Value;

use crate::{
    error::{AppError, AppResult},
    state::AppState,
};

const DEV_USER_ID_HEADER: &str = "x-user-id";
const DEV_USER_EMAIL_HEADER: &str = "x-user-email";

/// The signed-in account as the hosted auth service describes it.
#[derive(Debug, Clone, Deserialize)]
pub struct SupabaseUser {
    pub id: String,
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: Option<Value>,
    #[serde(default)]
    pub app_metadata: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct SupabaseClaims {
    sub: String,
    email: Option<String>,
    #[serde(default)]
    user_metadata: Option<Value>,
    #[serde(default)]
    app_metadata: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionRole {
    Admin,
    Customer,
}

impl SessionRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Customer => "customer",
        }
    }
}

pub async fn require_supabase_user(state: &AppState, headers: &HeaderMap) -> AppResult<SupabaseUser> {
    if state.config.auth_dev_overrides_enabled() {
        if let Some(user) = dev_override_user(headers) {
            tracing::debug!(user_id = %user.id, "Using dev auth override");
            return Ok(user);
        }
    }

    let token = bearer_token(headers).ok_or_else(|| {
        AppError::Unauthorized("Unauthorized: missing bearer token.".to_string())
    })?;

    if let Some(secret) = state.config.supabase_jwt_secret.as_deref() {
        return verify_jwt(token, secret);
    }

    fetch_user_over_http(state, token).await
}

pub async fn require_admin(state: &AppState, headers: &HeaderMap) -> AppResult<SupabaseUser> {
    let user = require_supabase_user(state, headers).await?;
    match resolve_role(&user, state.config.admin_email.as_deref()) {
        Some(SessionRole::Admin) => Ok(user),
        _ => Err(AppError::Forbidden(
            "Forbidden: admin access required.".to_string(),
        )),
    }
}

pub async fn require_customer(state: &AppState, headers: &HeaderMap) -> AppResult<SupabaseUser> {
    let user = require_supabase_user(state, headers).await?;
    match resolve_role(&user, state.config.admin_email.as_deref()) {
        Some(SessionRole::Customer) => Ok(user),
        Some(SessionRole::Admin) => Err(AppError::Forbidden(
            "Forbidden: the customer portal is for customer accounts.".to_string(),
        )),
        None => Err(AppError::Forbidden(
            "Forbidden: account is not a customer account.".to_string(),
        )),
    }
}

/// Admin wins over the customer flag so the configured admin account can
/// never be demoted by metadata.
pub fn resolve_role(user: &SupabaseUser, admin_email: Option<&str>) -> Option<SessionRole> {
    let email = user
        .email
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty());

    let is_admin_email = matches!(
        (email, admin_email),
        (Some(email), Some(admin)) if email.eq_ignore_ascii_case(admin.trim())
    );
    let is_admin_role = metadata_str(user.app_metadata.as_ref(), "role")
        .is_some_and(|role| role.eq_ignore_ascii_case("admin"));
    if is_admin_email || is_admin_role {
        return Some(SessionRole::Admin);
    }

    if metadata_flag(user.user_metadata.as_ref(), "is_customer") {
        return Some(SessionRole::Customer);
    }

    None
}

fn verify_jwt(token: &str, secret: &str) -> AppResult<SupabaseUser> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_audience(&["authenticated"]);

    let data = decode::<SupabaseClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|error| {
        tracing::debug!(error = %error, "JWT verification failed");
        AppError::Unauthorized("Unauthorized: invalid or expired session.".to_string())
    })?;

    Ok(SupabaseUser {
        id: data.claims.sub,
        email: data.claims.email,
        user_metadata: data.claims.user_metadata,
        app_metadata: data.claims.app_metadata,
    })
}

async fn fetch_user_over_http(state: &AppState, token: &str) -> AppResult<SupabaseUser> {
    let base_url = state.config.supabase_url.as_deref().ok_or_else(|| {
        AppError::Dependency(
            "Supabase auth is not configured. Set SUPABASE_URL or SUPABASE_JWT_SECRET.".to_string(),
        )
    })?;
    let api_key = state
        .config
        .supabase_anon_key
        .as_deref()
        .or(state.config.supabase_service_role_key.as_deref())
        .ok_or_else(|| {
            AppError::Dependency("Supabase API key is not configured.".to_string())
        })?;

    let response = state
        .http_client
        .get(format!("{base_url}/auth/v1/user"))
        .header("apikey", api_key)
        .header(AUTHORIZATION, format!("Bearer {token}"))
        .send()
        .await
        .map_err(|error| {
            tracing::error!(error = %error, "Supabase auth is unreachable");
            AppError::Dependency("Supabase auth is unreachable.".to_string())
        })?;

    if response.status() == reqwest::StatusCode::UNAUTHORIZED
        || response.status() == reqwest::StatusCode::FORBIDDEN
    {
        return Err(AppError::Unauthorized(
            "Unauthorized: invalid or expired session.".to_string(),
        ));
    }
    if !response.status().is_success() {
        return Err(AppError::Dependency(format!(
            "Supabase auth request failed ({}).",
            response.status().as_u16()
        )));
    }

    response
        .json::<SupabaseUser>()
        .await
        .map_err(|_| AppError::Dependency("Supabase auth returned an invalid user.".to_string()))
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer ").or_else(|| value.strip_prefix("bearer ")))
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

fn dev_override_user(headers: &HeaderMap) -> Option<SupabaseUser> {
    let id = header_str(headers, DEV_USER_ID_HEADER)?;
    let email = header_str(headers, DEV_USER_EMAIL_HEADER);
    let user_metadata = serde_json::json!({ "is_customer": email.is_none() });
    Some(SupabaseUser {
        id,
        email,
        user_metadata: Some(user_metadata),
        app_metadata: None,
    })
}

fn header_str(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned)
}

fn metadata_str<'a>(metadata: Option<&'a Value>, key: &str) -> Option<&'a str> {
    metadata
        .and_then(Value::as_object)
        .and_then(|obj| obj.get(key))
        .and_then(Value::as_str)
        .map(str::trim)
}

fn metadata_flag(metadata: Option<&Value>, key: &str) -> bool {
    match metadata.and_then(Value::as_object).and_then(|obj| obj.get(key)) {
        Some(Value::Bool(flag)) => *flag,
        Some(Value::String(text)) => text.trim().eq_ignore_ascii_case("true"),
        _ => false,
    }
}
