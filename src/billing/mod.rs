use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

pub mod client;
pub mod dto;
pub mod handlers;
pub mod plans;
pub mod query;
pub mod repo;
pub mod repo_types;
pub mod sync;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/account", get(handlers::get_account))
        .route("/plans", get(handlers::get_plans))
        .route("/billing/customer", post(handlers::create_customer))
        .route(
            "/billing/subscription",
            post(handlers::create_free_subscription),
        )
        .route(
            "/billing/subscription/sync",
            post(handlers::sync_subscription),
        )
        .route("/billing/checkout", post(handlers::create_checkout))
        .route("/billing/portal", post(handlers::create_portal))
}
