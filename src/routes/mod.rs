use axum::{routing::get, Router};

use crate::state::AppState;

pub mod assist;
pub mod billing;
pub mod customers;
pub mod deliveries;
pub mod health;
pub mod identity;
pub mod invoices;
pub mod monthly_statuses;
pub mod portal;
pub mod push;

pub fn v1_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .route("/me", get(identity::me))
        .merge(customers::router())
        .merge(deliveries::router())
        .merge(monthly_statuses::router())
        .merge(billing::router())
        .merge(invoices::router())
        .merge(assist::router())
        .merge(push::router())
        .merge(portal::router())
}
