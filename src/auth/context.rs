//! Protected-route plumbing.
//!
//! `resolve_session` attaches the caller's [`Identity`] to the request when a
//! valid token is present. Handlers opt into protection by taking an
//! [`AuthContext`] (or [`TenantContext`]) argument: without an identity the
//! extractor rejects with 401 before the handler body runs. Role gates are
//! middleware layered on whole routers.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{FromRequestParts, RawPathParams, State},
    http::{request::Parts, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::auth::roles::{Permission, Role};
use crate::auth::session::{token_from_headers, Identity, SessionAdapter, SessionError};
use crate::http::response::ApiError;

/// Context injected into protected handlers.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user: Identity,
    /// Route parameters by name.
    pub params: HashMap<String, String>,
}

impl AuthContext {
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    pub fn require(&self, permission: Permission) -> Result<(), ApiError> {
        if self.user.role.has_permission(permission) {
            Ok(())
        } else {
            Err(ApiError::forbidden("Insufficient permissions"))
        }
    }

    pub fn require_role(&self, min: Role) -> Result<(), ApiError> {
        if self.user.role.at_least(min) {
            Ok(())
        } else {
            Err(ApiError::forbidden("Insufficient permissions"))
        }
    }
}

impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = parts
            .extensions
            .get::<Identity>()
            .cloned()
            .ok_or(ApiError::Unauthorized)?;

        let params = RawPathParams::from_request_parts(parts, state)
            .await
            .map(|raw| raw.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect())
            .unwrap_or_default();

        Ok(Self { user, params })
    }
}

/// The caller's identity when one was resolved; never rejects.
#[derive(Debug, Clone, Default)]
pub struct MaybeIdentity(pub Option<Identity>);

impl<S> FromRequestParts<S> for MaybeIdentity
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(parts.extensions.get::<Identity>().cloned()))
    }
}

/// [`AuthContext`] for a caller that belongs to an organization.
#[derive(Debug, Clone)]
pub struct TenantContext {
    pub auth: AuthContext,
    pub organization_id: String,
}

impl TenantContext {
    pub fn user_id(&self) -> &str {
        &self.auth.user.id
    }
}

impl<S> FromRequestParts<S> for TenantContext
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let auth = AuthContext::from_request_parts(parts, state).await?;
        let organization_id = auth
            .user
            .organization_id
            .clone()
            .ok_or_else(|| ApiError::forbidden("No organization associated with this account"))?;
        Ok(Self { auth, organization_id })
    }
}

/// Attach the caller's identity when the request carries a valid session token.
///
/// Invalid or expired tokens leave the request anonymous; protected handlers
/// reject it later. Only auth-service or database failures abort here.
pub async fn resolve_session(
    State(sessions): State<Arc<SessionAdapter>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    if let Some(token) = token_from_headers(request.headers()) {
        match sessions.resolve(&token).await {
            Ok(identity) => {
                tracing::debug!(user_id = %identity.id, role = %identity.role, "Session resolved");
                request.extensions_mut().insert(identity);
            }
            Err(e @ (SessionError::Database(_) | SessionError::Upstream(_))) => {
                return ApiError::from(e).into_response();
            }
            Err(e) => {
                tracing::debug!(error = %e, "Ignoring invalid session token");
            }
        }
    }
    next.run(request).await
}

fn gate(min: Role, request: &Request<Body>) -> Result<(), ApiError> {
    let identity = request
        .extensions()
        .get::<Identity>()
        .ok_or(ApiError::Unauthorized)?;
    if identity.role.at_least(min) {
        Ok(())
    } else {
        tracing::warn!(user_id = %identity.id, role = %identity.role, required = %min, "Role gate denied");
        Err(ApiError::forbidden("Insufficient permissions"))
    }
}

/// Router-level gate: admin or above.
pub async fn require_admin(request: Request<Body>, next: Next) -> Response {
    match gate(Role::Admin, &request) {
        Ok(()) => next.run(request).await,
        Err(e) => e.into_response(),
    }
}

/// Router-level gate: owner or above.
pub async fn require_owner(request: Request<Body>, next: Next) -> Response {
    match gate(Role::Owner, &request) {
        Ok(()) => next.run(request).await,
        Err(e) => e.into_response(),
    }
}
