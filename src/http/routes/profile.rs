//! The caller's own profile. Needs an identity but no organization.

use axum::extract::State;

use crate::auth::AuthContext;
use crate::db::models::{Profile, ProfileUpdate};
use crate::db::repo;
use crate::http::extract::Json;
use crate::http::response::{ApiError, ApiResponse, ApiResult};
use crate::http::routes::required;
use crate::http::server::AppState;

pub async fn fetch(State(state): State<AppState>, ctx: AuthContext) -> ApiResult<ApiResponse<Profile>> {
    repo::get_profile(state.store.as_ref(), &ctx.user.id)
        .await?
        .map(ApiResponse::ok)
        .ok_or_else(|| ApiError::not_found("Profile"))
}

pub async fn update(
    State(state): State<AppState>,
    ctx: AuthContext,
    Json(update): Json<ProfileUpdate>,
) -> ApiResult<ApiResponse<Profile>> {
    if let Some(name) = &update.full_name {
        required("full_name", name)?;
    }
    repo::update_profile(state.store.as_ref(), &ctx.user.id, &update)
        .await?
        .map(ApiResponse::ok)
        .ok_or_else(|| ApiError::not_found("Profile"))
}
