use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

pub mod dto;
pub mod extractors;
pub mod handlers;
pub mod password;
pub mod providers;
pub mod repo;
pub mod repo_types;
pub mod service;
pub mod session;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/providers", get(handlers::list_providers))
        .route("/auth/register", post(handlers::register))
        .route("/auth/login", post(handlers::login))
        .route("/auth/logout", post(handlers::logout))
        .route("/auth/reset-password", post(handlers::reset_password))
        .route(
            "/auth/oauth/:provider/callback",
            post(handlers::oauth_callback),
        )
        .route("/me", get(handlers::get_me).delete(handlers::delete_me))
}
