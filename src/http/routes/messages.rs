//! Outbound Slack, SMS and email.

use axum::{extract::State, response::Response};
use serde::Deserialize;

use crate::auth::{Permission, TenantContext};
use crate::http::extract::Json;
use crate::http::response::{created, ApiError, ApiResult};
use crate::http::routes::{check_email, required};
use crate::http::server::AppState;
use crate::integrations::EmailMessage;

#[derive(Debug, Deserialize)]
pub struct SlackBody {
    pub channel: Option<String>,
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct SmsBody {
    pub to: String,
    pub body: String,
}

pub async fn slack(
    State(state): State<AppState>,
    ctx: TenantContext,
    Json(body): Json<SlackBody>,
) -> ApiResult<Response> {
    ctx.auth.require(Permission::SendMessages)?;
    let text = required("text", &body.text)?;

    let integrations = state.integrations.load_full();
    let posted = integrations.slack()?.post_message(body.channel.as_deref(), text).await?;
    Ok(created(posted))
}

/// E.164: `+` followed by 8 to 15 digits.
fn check_phone(value: &str) -> Result<(), ApiError> {
    let digits = value.strip_prefix('+').unwrap_or("");
    if (8..=15).contains(&digits.len()) && digits.chars().all(|c| c.is_ascii_digit()) {
        Ok(())
    } else {
        Err(ApiError::validation("to must be an E.164 phone number"))
    }
}

pub async fn sms(
    State(state): State<AppState>,
    ctx: TenantContext,
    Json(body): Json<SmsBody>,
) -> ApiResult<Response> {
    ctx.auth.require(Permission::SendMessages)?;
    check_phone(body.to.trim())?;
    let text = required("body", &body.body)?;

    let integrations = state.integrations.load_full();
    let sent = integrations.twilio()?.send_sms(body.to.trim(), text).await?;
    tracing::info!(sid = %sent.sid, "SMS queued");
    Ok(created(sent))
}

pub async fn email(
    State(state): State<AppState>,
    ctx: TenantContext,
    Json(message): Json<EmailMessage>,
) -> ApiResult<Response> {
    ctx.auth.require(Permission::SendMessages)?;
    if message.to.is_empty() {
        return Err(ApiError::validation("at least one recipient is required"));
    }
    for to in &message.to {
        check_email("to", to)?;
    }
    required("subject", &message.subject)?;
    required("html", &message.html)?;

    let integrations = state.integrations.load_full();
    let sent = integrations.email()?.send(&message).await?;
    tracing::info!(id = %sent.id, provider = sent.provider, "Email sent");
    Ok(created(sent))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_phone() {
        assert!(check_phone("+14155550100").is_ok());
        assert!(check_phone("14155550100").is_err());
        assert!(check_phone("+1415abc0100").is_err());
        assert!(check_phone("+123").is_err());
    }
}
