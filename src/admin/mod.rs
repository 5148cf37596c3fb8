//! Administrative API, mounted under `/api/admin` and gated to admin or above.

pub mod handlers;

use axum::{
    middleware,
    routing::{get, patch, post},
    Router,
};

use crate::auth::context::require_admin;
use crate::http::server::AppState;
use self::handlers::*;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/status", get(get_status))
        .route("/analytics", get(get_analytics))
        .route("/users/{id}/role", patch(update_role))
        .route("/users/{id}/avatar", post(upload_avatar))
        .route_layer(middleware::from_fn(require_admin))
}
