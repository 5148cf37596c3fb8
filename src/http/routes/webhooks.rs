use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    Json,
};
use serde_json::{json, Value};

use crate::http::response::ApiResult;
use crate::http::server::AppState;
use crate::webhooks::WebhookOutcome;

/// `POST /api/webhooks/stripe`. The raw body is verified before parsing.
pub async fn stripe(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> ApiResult<Json<Value>> {
    let config = state.config.load_full();
    let signature = headers.get("stripe-signature").and_then(|v| v.to_str().ok());

    match state
        .webhooks
        .handle(state.store.as_ref(), &config.stripe, signature, &body)
        .await?
    {
        WebhookOutcome::Processed { .. } => Ok(Json(json!({ "received": true }))),
        WebhookOutcome::Duplicate { .. } => Ok(Json(json!({ "received": true, "duplicate": true }))),
    }
}
