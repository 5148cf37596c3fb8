use std::sync::atomic::Ordering;

use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, State};
use serde::{Deserialize, Serialize};

use crate::auth::{AuthContext, Permission, Role};
use crate::db::models::{Profile, CLIENTS, EXPERIMENTS, KITS, PROFILES};
use crate::db::repo;
use crate::http::extract::{Json, Path, Query};
use crate::http::response::{ApiError, ApiResponse, ApiResult};
use crate::http::server::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnalyticsParams {
    pub organization_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RoleChange {
    pub role: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub environment: String,
    pub uptime_secs: u64,
    pub total_requests: u64,
    pub rate_limit: RateLimitStatus,
    pub integrations: IntegrationStatus,
}

#[derive(Serialize)]
pub struct RateLimitStatus {
    pub enforcing: bool,
    pub limit: u32,
}

#[derive(Serialize)]
pub struct IntegrationStatus {
    pub stripe: bool,
    pub boldsign: bool,
    pub slack: bool,
    pub twilio: bool,
    pub email: bool,
    pub nylas: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsSummary {
    pub organization_id: String,
    pub users: usize,
    pub clients: usize,
    pub kits: usize,
    pub experiments: usize,
    pub active_api_keys: usize,
    pub subscription_status: Option<String>,
}

/// Load `user_id`'s profile if the caller may manage it. Profiles outside
/// the caller's organization look missing, except to global admins.
async fn managed_profile(state: &AppState, ctx: &AuthContext, user_id: &str) -> ApiResult<Profile> {
    let profile = repo::get_profile(state.store.as_ref(), user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("User"))?;

    let same_org = profile.organization_id.is_some() && profile.organization_id == ctx.user.organization_id;
    if same_org || ctx.user.role == Role::GlobalAdmin {
        Ok(profile)
    } else {
        Err(ApiError::not_found("User"))
    }
}

/// `PATCH /api/admin/users/{id}/role`. The submitted literal must be a known
/// role and is stored exactly as sent.
pub async fn update_role(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(user_id): Path<String>,
    Json(change): Json<RoleChange>,
) -> ApiResult<ApiResponse<Profile>> {
    ctx.require(Permission::ManageRoles)?;

    let target: Role = change
        .role
        .parse()
        .map_err(|e: crate::auth::roles::UnknownRole| ApiError::validation(e.to_string()))?;
    if !ctx.user.role.at_least(target) {
        return Err(ApiError::forbidden("Cannot grant a role above your own"));
    }

    let current = managed_profile(&state, &ctx, &user_id).await?;
    if let Ok(current_role) = current.role.parse::<Role>() {
        if !ctx.user.role.at_least(current_role) {
            return Err(ApiError::forbidden("Cannot change the role of a higher-ranked user"));
        }
    }

    let updated = repo::update_role(state.store.as_ref(), &user_id, &change.role)
        .await?
        .ok_or_else(|| ApiError::not_found("User"))?;

    tracing::info!(
        actor = %ctx.user.id,
        user_id = %user_id,
        from = %current.role,
        to = %change.role,
        "Role updated"
    );
    Ok(ApiResponse::ok(updated))
}

fn extension_for(content_type: &str) -> Option<&'static str> {
    match content_type {
        "image/png" => Some("png"),
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/gif" => Some("gif"),
        "image/webp" => Some("webp"),
        _ => None,
    }
}

/// `POST /api/admin/users/{id}/avatar` with a multipart `file` field.
pub async fn upload_avatar(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(user_id): Path<String>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<ApiResponse<Profile>> {
    ctx.require(Permission::ManageUsers)?;
    managed_profile(&state, &ctx, &user_id).await?;
    let mut multipart = multipart?;

    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::validation(format!("invalid multipart body: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let content_type = field.content_type().unwrap_or_default().to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::validation(format!("invalid file: {}", e)))?;
        upload = Some((content_type, bytes));
        break;
    }

    let (content_type, bytes) = upload.ok_or_else(|| ApiError::validation("file is required"))?;
    let ext = extension_for(&content_type)
        .ok_or_else(|| ApiError::validation("file must be a PNG, JPEG, GIF or WebP image"))?;
    if bytes.is_empty() {
        return Err(ApiError::validation("file is empty"));
    }

    let config = state.config.load_full();
    let path = format!("{}/avatar-{}.{}", user_id, uuid::Uuid::new_v4(), ext);
    let url = state
        .storage
        .upload(&config.supabase.avatar_bucket, &path, &content_type, bytes.to_vec())
        .await?;

    let profile = repo::set_avatar_url(state.store.as_ref(), &user_id, &url)
        .await?
        .ok_or_else(|| ApiError::not_found("User"))?;
    tracing::info!(actor = %ctx.user.id, user_id = %user_id, size = bytes.len(), "Avatar uploaded");
    Ok(ApiResponse::ok(profile))
}

pub async fn get_status(State(state): State<AppState>, _ctx: AuthContext) -> ApiResult<ApiResponse<SystemStatus>> {
    let config = state.config.load_full();
    let integrations = state.integrations.load_full();
    let limiter = state.rate_limit.limiter.load_full();

    Ok(ApiResponse::ok(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        environment: format!("{:?}", config.environment).to_lowercase(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        total_requests: state.request_count.load(Ordering::Relaxed),
        rate_limit: RateLimitStatus { enforcing: limiter.is_enforcing(), limit: limiter.limit() },
        integrations: IntegrationStatus {
            stripe: integrations.stripe.is_some(),
            boldsign: integrations.boldsign.is_some(),
            slack: integrations.slack.is_some(),
            twilio: integrations.twilio.is_some(),
            email: integrations.email.is_some(),
            nylas: integrations.nylas.is_some(),
        },
    }))
}

/// Counts for the caller's organization. Holders of the system permission
/// may name any organization with `?organizationId=`.
pub async fn get_analytics(
    State(state): State<AppState>,
    ctx: AuthContext,
    Query(params): Query<AnalyticsParams>,
) -> ApiResult<ApiResponse<AnalyticsSummary>> {
    let own = ctx.user.organization_id.clone();
    let organization_id = match (params.organization_id, own) {
        (Some(requested), own) if own.as_deref() != Some(requested.as_str()) => {
            ctx.require(Permission::ViewSystem)?;
            requested
        }
        (_, Some(own)) => own,
        (_, None) => return Err(ApiError::forbidden("No organization associated with this account")),
    };
    let store = state.store.as_ref();

    let company = repo::get_company(store, &organization_id).await?;
    Ok(ApiResponse::ok(AnalyticsSummary {
        users: repo::count_in_organization(store, PROFILES, &organization_id).await?,
        clients: repo::count_in_organization(store, CLIENTS, &organization_id).await?,
        kits: repo::count_in_organization(store, KITS, &organization_id).await?,
        experiments: repo::count_in_organization(store, EXPERIMENTS, &organization_id).await?,
        active_api_keys: repo::count_active_api_keys(store, &organization_id).await?,
        subscription_status: company.and_then(|c| c.subscription_status),
        organization_id,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_avatar_types() {
        assert_eq!(extension_for("image/png"), Some("png"));
        assert_eq!(extension_for("image/jpeg"), Some("jpg"));
        assert_eq!(extension_for("image/svg+xml"), None);
        assert_eq!(extension_for("application/pdf"), None);
    }
}
