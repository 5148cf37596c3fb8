//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, windows > 0)
//! - Check that paired credentials are configured together
//! - Refuse debug-friendly settings in production
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AppConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::{AppConfig, EmailProvider};

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self { field, message: message.into() }
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be greater than 0"));
    }
    if config.timeouts.upstream_secs == 0 {
        errors.push(ValidationError::new("timeouts.upstream_secs", "must be greater than 0"));
    }

    let rl = &config.rate_limit;
    if rl.window_secs == 0 {
        errors.push(ValidationError::new("rate_limit.window_secs", "must be greater than 0"));
    }
    if rl.enabled && rl.requests == 0 {
        errors.push(ValidationError::new("rate_limit.requests", "must be greater than 0"));
    }
    if rl.upstash_url.is_some() != rl.upstash_token.is_some() {
        errors.push(ValidationError::new(
            "rate_limit.upstash_token",
            "upstash_url and upstash_token must be set together",
        ));
    }
    if let Some(u) = &rl.upstash_url {
        if url::Url::parse(u).is_err() {
            errors.push(ValidationError::new("rate_limit.upstash_url", "invalid URL"));
        }
    }

    if config.retries.enabled && config.retries.max_attempts == 0 {
        errors.push(ValidationError::new("retries.max_attempts", "must be at least 1"));
    }

    let supabase = &config.supabase;
    if let Some(u) = &supabase.url {
        if url::Url::parse(u).is_err() {
            errors.push(ValidationError::new("supabase.url", "invalid URL"));
        }
        if supabase.service_role_key.is_none() {
            errors.push(ValidationError::new(
                "supabase.service_role_key",
                "required when supabase.url is set",
            ));
        }
        if supabase.jwt_secret.is_none() && supabase.anon_key.is_none() {
            errors.push(ValidationError::new(
                "supabase.jwt_secret",
                "jwt_secret or anon_key is required to verify sessions",
            ));
        }
    }

    if config.email.provider == EmailProvider::Ses {
        let email = &config.email;
        if email.ses_access_key_id.is_some() != email.ses_secret_access_key.is_some() {
            errors.push(ValidationError::new(
                "email.ses_secret_access_key",
                "SES access key id and secret must be set together",
            ));
        }
    }

    if config.twilio.account_sid.is_some() != config.twilio.auth_token.is_some() {
        errors.push(ValidationError::new(
            "twilio.auth_token",
            "account_sid and auth_token must be set together",
        ));
    }

    if config.environment.is_production() {
        if config.supabase.url.is_none() {
            errors.push(ValidationError::new("supabase.url", "required in production"));
        }
        if rl.enabled && rl.in_memory {
            errors.push(ValidationError::new(
                "rate_limit.in_memory",
                "process-local counters are not shared between instances; configure Upstash",
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
