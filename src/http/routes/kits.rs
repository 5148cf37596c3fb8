use axum::{extract::State, response::Response};

use crate::auth::{Permission, TenantContext};
use crate::db::models::{Kit, NewKit};
use crate::db::repo;
use crate::http::extract::Json;
use crate::http::response::{created, ApiResponse, ApiResult};
use crate::http::routes::required;
use crate::http::server::AppState;

pub async fn list(State(state): State<AppState>, ctx: TenantContext) -> ApiResult<ApiResponse<Vec<Kit>>> {
    ctx.auth.require(Permission::ViewKits)?;
    let kits = repo::list_kits(state.store.as_ref(), &ctx.organization_id).await?;
    Ok(ApiResponse::ok(kits))
}

pub async fn create(
    State(state): State<AppState>,
    ctx: TenantContext,
    Json(input): Json<NewKit>,
) -> ApiResult<Response> {
    ctx.auth.require(Permission::ManageKits)?;
    required("name", &input.name)?;

    let kit = repo::create_kit(state.store.as_ref(), &ctx.organization_id, ctx.user_id(), &input).await?;
    tracing::info!(kit_id = %kit.id, organization_id = %ctx.organization_id, "Kit created");
    Ok(created(kit))
}
