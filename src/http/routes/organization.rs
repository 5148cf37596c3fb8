use axum::extract::State;

use crate::auth::{Permission, TenantContext};
use crate::db::models::Profile;
use crate::db::repo;
use crate::http::response::{ApiResponse, ApiResult};
use crate::http::server::AppState;

pub async fn users(State(state): State<AppState>, ctx: TenantContext) -> ApiResult<ApiResponse<Vec<Profile>>> {
    ctx.auth.require(Permission::ViewOrganizationUsers)?;
    let users = repo::list_organization_users(state.store.as_ref(), &ctx.organization_id).await?;
    Ok(ApiResponse::ok(users))
}
