//! JSON envelope and error mapping.
//!
//! Every API response has the shape `{ "success": bool, "data"?, "error"? }`.
//! Errors carry `{ code, message, statusCode }`. Internal failures are
//! logged in full and answered with a generic message.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::auth::session::SessionError;
use crate::db::DbError;
use crate::integrations::IntegrationError;
use crate::webhooks::WebhookError;

/// Successful envelope.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self { success: true, data }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

/// `201 Created` with the success envelope.
pub fn created<T: Serialize>(data: T) -> Response {
    (StatusCode::CREATED, ApiResponse::ok(data)).into_response()
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
    pub status_code: u16,
}

#[derive(Debug, Serialize)]
struct ErrorEnvelope {
    success: bool,
    error: ErrorBody,
}

/// Errors returned by route handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Rate limit exceeded")]
    RateLimited,

    #[error(transparent)]
    Integration(#[from] IntegrationError),

    #[error(transparent)]
    Database(#[from] DbError),

    #[error(transparent)]
    Webhook(#[from] WebhookError),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiError::Forbidden(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::Validation(message.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        ApiError::NotFound(what.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Integration(IntegrationError::NotConfigured(_)) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Integration(_) => StatusCode::BAD_GATEWAY,
            ApiError::Database(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Webhook(WebhookError::Signature(_) | WebhookError::Payload(_)) => StatusCode::BAD_REQUEST,
            ApiError::Webhook(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Unauthorized => "UNAUTHORIZED",
            ApiError::Forbidden(_) => "FORBIDDEN",
            ApiError::Validation(_) => "VALIDATION_ERROR",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::RateLimited => "RATE_LIMITED",
            ApiError::Integration(IntegrationError::NotConfigured(_)) => "INTEGRATION_NOT_CONFIGURED",
            ApiError::Integration(_) => "UPSTREAM_ERROR",
            ApiError::Database(_) | ApiError::Internal(_) => "INTERNAL_ERROR",
            ApiError::Webhook(WebhookError::NotConfigured) => "WEBHOOK_NOT_CONFIGURED",
            ApiError::Webhook(WebhookError::Signature(_)) => "INVALID_SIGNATURE",
            ApiError::Webhook(WebhookError::Payload(_)) => "VALIDATION_ERROR",
            ApiError::Webhook(WebhookError::Database(_)) => "INTERNAL_ERROR",
        }
    }

    /// Message safe to show the caller.
    fn public_message(&self) -> String {
        match self {
            ApiError::Database(_) | ApiError::Internal(_) | ApiError::Webhook(WebhookError::Database(_)) => {
                "Internal server error".to_string()
            }
            ApiError::Integration(IntegrationError::NotConfigured(vendor)) => {
                format!("{} integration is not configured", vendor)
            }
            ApiError::Integration(e) => format!("{} request failed", e.vendor()),
            other => other.to_string(),
        }
    }

    pub fn body(&self) -> ErrorBody {
        ErrorBody {
            code: self.code(),
            message: self.public_message(),
            status_code: self.status_code().as_u16(),
        }
    }
}

impl From<SessionError> for ApiError {
    fn from(e: SessionError) -> Self {
        match e {
            SessionError::Database(db) => ApiError::Database(db),
            SessionError::Upstream(msg) => ApiError::Internal(format!("auth service: {}", msg)),
            _ => ApiError::Unauthorized,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, code = self.code(), "Request failed");
        } else {
            tracing::debug!(error = %self, code = self.code(), "Request rejected");
        }

        let envelope = ErrorEnvelope {
            success: false,
            error: self.body(),
        };
        (status, Json(envelope)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
