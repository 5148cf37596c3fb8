//! Diagnostics for development and test deployments.

use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::auth::MaybeIdentity;
use crate::http::server::AppState;

pub async fn ping(State(state): State<AppState>) -> Json<Value> {
    let config = state.config.load();
    Json(json!({ "pong": true, "environment": config.environment }))
}

pub async fn session(MaybeIdentity(identity): MaybeIdentity) -> Json<Value> {
    match identity {
        Some(user) => Json(json!({
            "authenticated": true,
            "user": {
                "id": user.id,
                "email": user.email,
                "role": user.raw_role,
                "organizationId": user.organization_id,
            }
        })),
        None => Json(json!({ "authenticated": false })),
    }
}
