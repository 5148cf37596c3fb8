//! Configuration loading from disk and the process environment.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::{AppConfig, EmailProvider};
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid {var}: {message}")]
    Env { var: &'static str, message: String },

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}

/// Load and validate configuration from a TOML file, then apply environment overrides.
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parse TOML file contents, apply environment overrides and validate.
pub fn parse_config(content: &str) -> Result<AppConfig, ConfigError> {
    let mut config: AppConfig = toml::from_str(content)?;

    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Build configuration from defaults and the environment only.
/// Used when no config file is present.
pub fn load_from_env() -> Result<AppConfig, ConfigError> {
    let mut config = AppConfig::default();
    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Apply environment variable overrides. `lookup` returns the value of a variable, if set.
pub fn apply_env_overrides<F>(config: &mut AppConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(v) = get("APP_ENV") {
        config.environment = v
            .parse()
            .map_err(|message| ConfigError::Env { var: "APP_ENV", message })?;
    }
    if let Some(v) = get("BIND_ADDRESS") {
        config.listener.bind_address = v;
    }
    if let Some(v) = get("APP_URL").or_else(|| get("NEXT_PUBLIC_APP_URL")) {
        config.app.url = v;
    }
    if let Some(v) = get("APP_NAME") {
        config.app.name = v;
    }

    // Hosted backend
    override_opt(&mut config.supabase.url, get("SUPABASE_URL").or_else(|| get("NEXT_PUBLIC_SUPABASE_URL")));
    override_opt(&mut config.supabase.anon_key, get("SUPABASE_ANON_KEY").or_else(|| get("NEXT_PUBLIC_SUPABASE_ANON_KEY")));
    override_opt(&mut config.supabase.service_role_key, get("SUPABASE_SERVICE_ROLE_KEY"));
    override_opt(&mut config.supabase.jwt_secret, get("SUPABASE_JWT_SECRET").or_else(|| get("JWT_SECRET")));

    // Rate limit store
    override_opt(&mut config.rate_limit.upstash_url, get("UPSTASH_REDIS_REST_URL"));
    override_opt(&mut config.rate_limit.upstash_token, get("UPSTASH_REDIS_REST_TOKEN"));

    // Vendors
    override_opt(&mut config.stripe.secret_key, get("STRIPE_SECRET_KEY"));
    override_opt(&mut config.stripe.webhook_secret, get("STRIPE_WEBHOOK_SECRET"));
    override_opt(&mut config.stripe.default_price_id, get("STRIPE_PRICE_ID"));

    if let Some(v) = get("EMAIL_PROVIDER") {
        config.email.provider = match v.to_ascii_lowercase().as_str() {
            "resend" => EmailProvider::Resend,
            "ses" => EmailProvider::Ses,
            other => {
                return Err(ConfigError::Env {
                    var: "EMAIL_PROVIDER",
                    message: format!("unknown provider '{}'", other),
                })
            }
        };
    }
    override_opt(&mut config.email.from, get("EMAIL_FROM"));
    override_opt(&mut config.email.resend_api_key, get("RESEND_API_KEY"));
    override_opt(&mut config.email.ses_region, get("AWS_REGION"));
    override_opt(&mut config.email.ses_access_key_id, get("AWS_ACCESS_KEY_ID"));
    override_opt(&mut config.email.ses_secret_access_key, get("AWS_SECRET_ACCESS_KEY"));

    override_opt(&mut config.slack.bot_token, get("SLACK_BOT_TOKEN"));
    override_opt(&mut config.slack.default_channel, get("SLACK_CHANNEL_ID"));

    override_opt(&mut config.twilio.account_sid, get("TWILIO_ACCOUNT_SID"));
    override_opt(&mut config.twilio.auth_token, get("TWILIO_AUTH_TOKEN"));
    override_opt(&mut config.twilio.from_number, get("TWILIO_FROM_NUMBER").or_else(|| get("TWILIO_PHONE_NUMBER")));

    override_opt(&mut config.boldsign.api_key, get("BOLDSIGN_API_KEY"));

    override_opt(&mut config.nylas.api_key, get("NYLAS_API_KEY"));
    override_opt(&mut config.nylas.grant_id, get("NYLAS_GRANT_ID"));

    Ok(())
}

fn override_opt(slot: &mut Option<String>, value: Option<String>) {
    if value.is_some() {
        *slot = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use crate::config::schema::Environment;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_env_overrides_file_values() {
        let mut config = AppConfig::default();
        config.stripe.secret_key = Some("sk_file".into());

        let vars = env(&[
            ("STRIPE_SECRET_KEY", "sk_env"),
            ("NEXT_PUBLIC_SUPABASE_URL", "https://demo.supabase.co"),
            ("APP_ENV", "production"),
            ("EMAIL_PROVIDER", "ses"),
            ("SLACK_BOT_TOKEN", "   "),
        ]);
        apply_env_overrides(&mut config, |k| vars.get(k).cloned()).unwrap();

        assert_eq!(config.stripe.secret_key.as_deref(), Some("sk_env"));
        assert_eq!(config.supabase.url.as_deref(), Some("https://demo.supabase.co"));
        assert_eq!(config.environment, Environment::Production);
        assert_eq!(config.email.provider, EmailProvider::Ses);
        // Blank values are ignored
        assert!(config.slack.bot_token.is_none());
    }

    #[test]
    fn test_env_rejects_unknown_provider() {
        let mut config = AppConfig::default();
        let vars = env(&[("EMAIL_PROVIDER", "pigeon")]);
        let err = apply_env_overrides(&mut config, |k| vars.get(k).cloned()).unwrap_err();
        assert!(err.to_string().contains("EMAIL_PROVIDER"));
    }

    #[test]
    fn test_validation_error_lists_every_field() {
        let err = ConfigError::Validation(vec![
            ValidationError { field: "rate_limit.window_secs", message: "must be greater than 0".into() },
            ValidationError { field: "supabase.url", message: "invalid URL".into() },
        ]);
        assert_eq!(
            err.to_string(),
            "Validation failed: rate_limit.window_secs: must be greater than 0, supabase.url: invalid URL"
        );
    }

    #[test]
    fn test_load_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            [listener]
            bind_address = "127.0.0.1:9999"

            [rate_limit]
            requests = 5
            window_secs = 10
            "#
        )
        .unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.rate_limit.requests, 5);
        assert_eq!(config.rate_limit.window_secs, 10);
    }

    #[test]
    fn test_load_config_reports_validation_errors() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[rate_limit]\nwindow_secs = 0").unwrap();

        match load_config(file.path()) {
            Err(ConfigError::Validation(errors)) => assert!(!errors.is_empty()),
            other => panic!("expected validation error, got {:?}", other.map(|_| ())),
        }
    }
}
