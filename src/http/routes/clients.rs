use axum::{extract::State, response::Response};

use crate::auth::{Permission, TenantContext};
use crate::db::models::{Client, NewClient};
use crate::db::repo;
use crate::http::extract::{Json, Path};
use crate::http::response::{created, ApiError, ApiResponse, ApiResult};
use crate::http::routes::{check_email, required};
use crate::http::server::AppState;

pub async fn list(State(state): State<AppState>, ctx: TenantContext) -> ApiResult<ApiResponse<Vec<Client>>> {
    ctx.auth.require(Permission::ViewClients)?;
    let clients = repo::list_clients(state.store.as_ref(), &ctx.organization_id).await?;
    Ok(ApiResponse::ok(clients))
}

/// Clients of other organizations are reported as missing.
pub async fn fetch(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(id): Path<String>,
) -> ApiResult<ApiResponse<Client>> {
    ctx.auth.require(Permission::ViewClients)?;
    repo::get_client(state.store.as_ref(), &ctx.organization_id, &id)
        .await?
        .map(ApiResponse::ok)
        .ok_or_else(|| ApiError::not_found("Client"))
}

pub async fn create(
    State(state): State<AppState>,
    ctx: TenantContext,
    Json(input): Json<NewClient>,
) -> ApiResult<Response> {
    ctx.auth.require(Permission::ManageClients)?;
    required("name", &input.name)?;
    if let Some(email) = &input.email {
        check_email("email", email)?;
    }

    let client = repo::create_client(state.store.as_ref(), &ctx.organization_id, ctx.user_id(), &input).await?;
    tracing::info!(client_id = %client.id, organization_id = %ctx.organization_id, "Client created");
    Ok(created(client))
}
