//! Route table.
//!
//! Handlers opt into authentication by extractor ([`AuthContext`],
//! [`TenantContext`]); role gates are `route_layer`s on groups.
//!
//! [`AuthContext`]: crate::auth::AuthContext
//! [`TenantContext`]: crate::auth::TenantContext

mod api_keys;
mod billing;
mod calendar;
mod clients;
mod debug;
mod documents;
mod experiments;
mod graphql;
mod health;
mod kits;
mod messages;
mod organization;
mod profile;
mod session;
mod webhooks;

use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};

use crate::auth::context::{require_admin, require_owner};
use crate::config::AppConfig;
use crate::http::response::ApiError;
use crate::http::server::AppState;

/// All non-admin routes. Debug routes are left out in production.
pub fn router(config: &AppConfig) -> Router<AppState> {
    let tenant = Router::new()
        .route("/kits", get(kits::list).post(kits::create))
        .route("/experiments", get(experiments::list).post(experiments::create))
        .route("/clients", get(clients::list).post(clients::create))
        .route("/clients/{id}", get(clients::fetch))
        .route("/profile", get(profile::fetch).patch(profile::update))
        .route("/calendar/events", get(calendar::events))
        .route("/contacts", get(calendar::contacts));

    let admin = Router::new()
        .route("/api-keys", get(api_keys::list).post(api_keys::create))
        .route("/api-keys/{id}", delete(api_keys::revoke))
        .route("/organization/users", get(organization::users))
        .route("/documents", post(documents::send))
        .route("/documents/{id}", get(documents::status))
        .route("/messages/slack", post(messages::slack))
        .route("/messages/sms", post(messages::sms))
        .route("/emails", post(messages::email))
        .route_layer(middleware::from_fn(require_admin));

    let owner = Router::new()
        .route("/billing/checkout", post(billing::checkout))
        .route("/billing/subscriptions", post(billing::subscribe))
        .route_layer(middleware::from_fn(require_owner));

    let mut router = Router::new()
        .route("/health", get(health::health))
        .route("/api/auth/logout", post(session::logout))
        .route("/api/auth/signout", post(session::logout))
        .route("/api/graphql", get(graphql::query).post(graphql::execute))
        .route("/api/webhooks/stripe", post(webhooks::stripe))
        .nest("/api/v1", tenant.merge(admin).merge(owner));

    if config.environment.is_production() {
        tracing::info!("Debug routes disabled in production");
    } else {
        router = router
            .route("/api/test/ping", get(debug::ping))
            .route("/api/test/session", get(debug::session));
    }

    router.fallback(|| async { ApiError::not_found("Route") })
}

/// Trimmed, non-empty `value` or a validation error naming `field`.
pub(crate) fn required<'a>(field: &str, value: &'a str) -> Result<&'a str, ApiError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(ApiError::validation(format!("{} is required", field)))
    } else {
        Ok(trimmed)
    }
}

pub(crate) fn check_email(field: &str, value: &str) -> Result<(), ApiError> {
    match value.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(()),
        _ => Err(ApiError::validation(format!("{} must be an email address", field))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required() {
        assert_eq!(required("name", "  Acme ").unwrap(), "Acme");
        assert!(matches!(required("name", "   "), Err(ApiError::Validation(_))));
    }

    #[test]
    fn test_check_email() {
        assert!(check_email("email", "a@b.co").is_ok());
        assert!(check_email("email", "ab.co").is_err());
        assert!(check_email("email", "@b.co").is_err());
        assert!(check_email("email", "a@localhost").is_err());
    }
}
