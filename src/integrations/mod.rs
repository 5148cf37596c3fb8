//! Third-party integration clients.
//!
//! Each client is a thin, stateless wrapper over a vendor REST API: build
//! the request, send it with a timeout, map the outcome into
//! [`IntegrationError`] and shape the response into a small typed struct.
//! A vendor without credentials has no client; handlers answer 503.

pub mod boldsign;
pub mod email;
pub mod nylas;
pub mod sigv4;
pub mod slack;
pub mod stripe;
pub mod twilio;

use std::time::Duration;

use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::config::AppConfig;
use crate::observability::metrics;
use crate::resilience::retries::{is_retryable_status, Transient};

pub use boldsign::BoldSignClient;
pub use email::{EmailClient, EmailMessage};
pub use nylas::NylasClient;
pub use slack::SlackClient;
pub use stripe::StripeClient;
pub use twilio::TwilioClient;

#[derive(Debug, Error)]
pub enum IntegrationError {
    #[error("{0} integration is not configured")]
    NotConfigured(&'static str),

    #[error("{vendor} transport error: {message}")]
    Transport { vendor: &'static str, message: String },

    #[error("{vendor} returned {status}: {body}")]
    Api { vendor: &'static str, status: u16, body: String },

    #[error("{vendor} response could not be decoded: {message}")]
    Decode { vendor: &'static str, message: String },
}

impl IntegrationError {
    pub fn vendor(&self) -> &'static str {
        match self {
            IntegrationError::NotConfigured(v) => v,
            IntegrationError::Transport { vendor, .. }
            | IntegrationError::Api { vendor, .. }
            | IntegrationError::Decode { vendor, .. } => vendor,
        }
    }
}

impl Transient for IntegrationError {
    fn is_transient(&self) -> bool {
        match self {
            IntegrationError::Transport { .. } => is_retryable_status(None),
            IntegrationError::Api { status, .. } => is_retryable_status(Some(*status)),
            _ => false,
        }
    }
}

/// HTTP client bound to one vendor, used for error labelling and metrics.
#[derive(Clone)]
pub(crate) struct VendorHttp {
    vendor: &'static str,
    client: reqwest::Client,
}

impl VendorHttp {
    pub(crate) fn new(vendor: &'static str, timeout: Duration) -> Result<Self, IntegrationError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| IntegrationError::Transport { vendor, message: e.to_string() })?;
        Ok(Self { vendor, client })
    }

    pub(crate) fn client(&self) -> &reqwest::Client {
        &self.client
    }

    /// Send `request` and decode a 2xx JSON body into `T`.
    pub(crate) async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, IntegrationError> {
        let vendor = self.vendor;
        let response = match request.send().await {
            Ok(r) => r,
            Err(e) => {
                metrics::record_integration_call(vendor, "transport_error");
                tracing::warn!(vendor, error = %e, "Vendor request failed");
                return Err(IntegrationError::Transport { vendor, message: e.to_string() });
            }
        };

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| IntegrationError::Transport { vendor, message: e.to_string() })?;

        if !status.is_success() {
            metrics::record_integration_call(vendor, "api_error");
            tracing::warn!(vendor, status = %status, "Vendor returned an error");
            return Err(IntegrationError::Api { vendor, status: status.as_u16(), body });
        }

        metrics::record_integration_call(vendor, "ok");
        let body = if body.trim().is_empty() { "null" } else { body.as_str() };
        serde_json::from_str(body).map_err(|e| IntegrationError::Decode { vendor, message: e.to_string() })
    }
}

/// Configured vendor clients.
#[derive(Default)]
pub struct Integrations {
    pub stripe: Option<StripeClient>,
    pub boldsign: Option<BoldSignClient>,
    pub slack: Option<SlackClient>,
    pub twilio: Option<TwilioClient>,
    pub email: Option<EmailClient>,
    pub nylas: Option<NylasClient>,
}

impl Integrations {
    /// Build a client for every vendor that has credentials.
    pub fn from_config(config: &AppConfig) -> Result<Self, IntegrationError> {
        let timeout = Duration::from_secs(config.timeouts.upstream_secs);
        let retry = config.retries.clone();

        let stripe = match &config.stripe.secret_key {
            Some(key) => Some(StripeClient::new(&config.stripe.api_base, key.clone(), retry.clone(), timeout)?),
            None => None,
        };
        let boldsign = match &config.boldsign.api_key {
            Some(key) => Some(BoldSignClient::new(&config.boldsign.api_base, key.clone(), timeout)?),
            None => None,
        };
        let slack = match &config.slack.bot_token {
            Some(token) => Some(SlackClient::new(
                &config.slack.api_base,
                token.clone(),
                config.slack.default_channel.clone(),
                timeout,
            )?),
            None => None,
        };
        let twilio = match (&config.twilio.account_sid, &config.twilio.auth_token, &config.twilio.from_number) {
            (Some(sid), Some(token), Some(from)) => Some(TwilioClient::new(
                &config.twilio.api_base,
                sid.clone(),
                token.clone(),
                from.clone(),
                timeout,
            )?),
            _ => None,
        };
        let email = EmailClient::from_config(&config.email, timeout)?;
        let nylas = match (&config.nylas.api_key, &config.nylas.grant_id) {
            (Some(key), Some(grant)) => Some(NylasClient::new(
                &config.nylas.api_base,
                key.clone(),
                grant.clone(),
                retry,
                timeout,
            )?),
            _ => None,
        };

        let integrations = Self { stripe, boldsign, slack, twilio, email, nylas };
        tracing::info!(
            stripe = integrations.stripe.is_some(),
            boldsign = integrations.boldsign.is_some(),
            slack = integrations.slack.is_some(),
            twilio = integrations.twilio.is_some(),
            email = integrations.email.is_some(),
            nylas = integrations.nylas.is_some(),
            "Integrations configured"
        );
        Ok(integrations)
    }

    pub fn stripe(&self) -> Result<&StripeClient, IntegrationError> {
        self.stripe.as_ref().ok_or(IntegrationError::NotConfigured("Stripe"))
    }

    pub fn boldsign(&self) -> Result<&BoldSignClient, IntegrationError> {
        self.boldsign.as_ref().ok_or(IntegrationError::NotConfigured("BoldSign"))
    }

    pub fn slack(&self) -> Result<&SlackClient, IntegrationError> {
        self.slack.as_ref().ok_or(IntegrationError::NotConfigured("Slack"))
    }

    pub fn twilio(&self) -> Result<&TwilioClient, IntegrationError> {
        self.twilio.as_ref().ok_or(IntegrationError::NotConfigured("Twilio"))
    }

    pub fn email(&self) -> Result<&EmailClient, IntegrationError> {
        self.email.as_ref().ok_or(IntegrationError::NotConfigured("Email"))
    }

    pub fn nylas(&self) -> Result<&NylasClient, IntegrationError> {
        self.nylas.as_ref().ok_or(IntegrationError::NotConfigured("Nylas"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unconfigured_vendors() {
        let integrations = Integrations::from_config(&AppConfig::default()).unwrap();
        assert!(matches!(integrations.stripe(), Err(IntegrationError::NotConfigured("Stripe"))));
        assert!(integrations.email().is_err());
    }

    #[test]
    fn test_configured_vendors() {
        let mut config = AppConfig::default();
        config.stripe.secret_key = Some("sk_test".into());
        config.slack.bot_token = Some("xoxb".into());
        config.twilio.account_sid = Some("AC1".into());
        config.twilio.auth_token = Some("t".into());

        let integrations = Integrations::from_config(&config).unwrap();
        assert!(integrations.stripe().is_ok());
        assert!(integrations.slack().is_ok());
        // No sender number, no client
        assert!(integrations.twilio().is_err());
    }

    #[test]
    fn test_transient_classification() {
        let api = |status| IntegrationError::Api { vendor: "Stripe", status, body: String::new() };
        assert!(api(503).is_transient());
        assert!(api(429).is_transient());
        assert!(!api(402).is_transient());
        assert!(IntegrationError::Transport { vendor: "Slack", message: "reset".into() }.is_transient());
        assert!(!IntegrationError::NotConfigured("Slack").is_transient());
    }
}
