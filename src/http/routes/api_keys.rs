//! Organization API keys. The plaintext key is returned only by `create`.

use axum::{extract::State, response::Response};
use serde::Serialize;
use serde_json::json;

use crate::auth::{Permission, TenantContext};
use crate::db::models::{ApiKey, NewApiKey};
use crate::db::repo;
use crate::http::extract::{Json, Path};
use crate::http::response::{created, ApiError, ApiResponse, ApiResult};
use crate::http::routes::required;
use crate::http::server::AppState;

#[derive(Serialize)]
struct CreatedKey {
    #[serde(flatten)]
    key: ApiKey,
    /// Shown once.
    secret: String,
}

pub async fn list(State(state): State<AppState>, ctx: TenantContext) -> ApiResult<ApiResponse<Vec<ApiKey>>> {
    ctx.auth.require(Permission::ManageApiKeys)?;
    let keys = repo::list_api_keys(state.store.as_ref(), &ctx.organization_id).await?;
    Ok(ApiResponse::ok(keys))
}

pub async fn create(
    State(state): State<AppState>,
    ctx: TenantContext,
    Json(input): Json<NewApiKey>,
) -> ApiResult<Response> {
    ctx.auth.require(Permission::ManageApiKeys)?;
    required("name", &input.name)?;

    let (key, secret) = repo::create_api_key(state.store.as_ref(), &ctx.organization_id, ctx.user_id(), &input).await?;
    tracing::info!(key_id = %key.id, prefix = %key.prefix, "API key created");
    Ok(created(CreatedKey { key, secret }))
}

pub async fn revoke(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(id): Path<String>,
) -> ApiResult<ApiResponse<serde_json::Value>> {
    ctx.auth.require(Permission::ManageApiKeys)?;
    if !repo::revoke_api_key(state.store.as_ref(), &ctx.organization_id, &id).await? {
        return Err(ApiError::not_found("API key"));
    }
    tracing::info!(key_id = %id, "API key revoked");
    Ok(ApiResponse::ok(json!({ "id": id, "revoked": true })))
}
