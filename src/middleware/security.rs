use axum::{
    extract::{Request, State},
    http::header::HOST,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::{error::AppError, state::AppState};

pub async fn enforce_trusted_hosts(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let host = request
        .headers()
        .get(HOST)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();

    if is_trusted_host(host, &state.config.trusted_hosts) {
        return next.run(request).await;
    }

    tracing::warn!(host = %host, "Rejected request for untrusted host");
    AppError::BadRequest("Invalid host header.".to_string()).into_response()
}

fn is_trusted_host(host_header: &str, trusted_hosts: &[String]) -> bool {
    if trusted_hosts.iter().any(|item| item.trim() == "*") {
        return true;
    }

    let host = strip_port(host_header.trim()).to_ascii_lowercase();
    if host.is_empty() {
        return false;
    }

    trusted_hosts.iter().any(|trusted| {
        let trusted = trusted.trim().to_ascii_lowercase();
        match trusted.strip_prefix("*.") {
            Some(suffix) => host.ends_with(&format!(".{suffix}")),
            None => host == trusted,
        }
    })
}

fn strip_port(host: &str) -> &str {
    if host.starts_with('[') {
        return host.split(']').next().map_or(host, |v| v.trim_start_matches('['));
    }
    host.rsplit_once(':').map_or(host, |(name, _)| name)
}
