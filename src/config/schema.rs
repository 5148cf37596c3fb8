//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the service.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the onboarding API.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Deployment environment.
    pub environment: Environment,

    /// Listener configuration (bind address, TLS).
    pub listener: ListenerConfig,

    /// Public application settings (URL, branding).
    pub app: AppSettings,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Rate limiting configuration.
    pub rate_limit: RateLimitConfig,

    /// Retry configuration for outbound vendor calls.
    pub retries: RetryConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Hosted database / auth / storage settings.
    pub supabase: SupabaseConfig,

    pub stripe: StripeConfig,

    pub email: EmailConfig,

    pub slack: SlackConfig,

    pub twilio: TwilioConfig,

    pub boldsign: BoldSignConfig,

    pub nylas: NylasConfig,

    pub security: SecurityConfig,
}

/// Deployment environment. Debug routes are never mounted in production.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Test,
    Production,
}

impl Environment {
    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "test" => Ok(Environment::Test),
            "production" | "prod" => Ok(Environment::Production),
            other => Err(format!("unknown environment '{}'", other)),
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Optional TLS configuration.
    pub tls: Option<TlsConfig>,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            tls: None,
        }
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

/// Public application settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AppSettings {
    /// Public base URL of the dashboard (used for redirect links).
    pub url: String,

    /// Product name used in outbound emails and messages.
    pub name: String,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            url: "http://localhost:3000".to_string(),
            name: "Onboard Hero".to_string(),
        }
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Inbound request timeout in seconds.
    pub request_secs: u64,

    /// Timeout for calls to the hosted backend and vendor APIs, in seconds.
    pub upstream_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_secs: 30,
            upstream_secs: 10,
        }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Requests allowed per identity within one window.
    pub requests: u32,

    /// Window length in seconds.
    pub window_secs: u64,

    /// Upstash Redis REST endpoint for the shared counter store.
    pub upstash_url: Option<String>,

    /// Upstash Redis REST token.
    pub upstash_token: Option<String>,

    /// Keep counters in process memory when no hosted store is configured.
    pub in_memory: bool,

    /// Key anonymous callers by the first `X-Forwarded-For` hop.
    pub trust_forwarded_for: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            requests: 60,
            window_secs: 60,
            upstash_url: None,
            upstash_token: None,
            in_memory: false,
            trust_forwarded_for: false,
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Enable retries.
    pub enabled: bool,

    /// Maximum number of attempts (including the first).
    pub max_attempts: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: 3,
            base_delay_ms: 100,
            max_delay_ms: 2000,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit JSON log lines instead of the human-readable format.
    pub json_logs: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Hosted Postgres / auth / storage settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SupabaseConfig {
    /// Project URL (e.g., "https://xyz.supabase.co").
    pub url: Option<String>,

    /// Public anon key, sent as `apikey` on user-scoped calls.
    pub anon_key: Option<String>,

    /// Service role key used for server-side table access.
    pub service_role_key: Option<String>,

    /// JWT secret; when set, session tokens are verified locally.
    pub jwt_secret: Option<String>,

    /// Storage bucket for profile avatars.
    pub avatar_bucket: String,
}

impl Default for SupabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            anon_key: None,
            service_role_key: None,
            jwt_secret: None,
            avatar_bucket: "avatars".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StripeConfig {
    pub secret_key: Option<String>,
    /// Endpoint signing secret (`whsec_...`).
    pub webhook_secret: Option<String>,
    /// Maximum age of a signed webhook timestamp, in seconds.
    pub webhook_tolerance_secs: u64,
    /// Default price for checkout sessions.
    pub default_price_id: Option<String>,
    pub api_base: String,
}

impl Default for StripeConfig {
    fn default() -> Self {
        Self {
            secret_key: None,
            webhook_secret: None,
            webhook_tolerance_secs: 300,
            default_price_id: None,
            api_base: "https://api.stripe.com".to_string(),
        }
    }
}

/// Outbound email provider selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EmailProvider {
    #[default]
    Resend,
    Ses,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EmailConfig {
    pub provider: EmailProvider,
    /// Sender address, e.g. "Onboard Hero <hello@example.com>".
    pub from: Option<String>,
    pub resend_api_key: Option<String>,
    pub resend_api_base: String,
    pub ses_region: Option<String>,
    pub ses_access_key_id: Option<String>,
    pub ses_secret_access_key: Option<String>,
    /// Overrides the regional SES endpoint (used against local mocks).
    pub ses_endpoint: Option<String>,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            provider: EmailProvider::Resend,
            from: None,
            resend_api_key: None,
            resend_api_base: "https://api.resend.com".to_string(),
            ses_region: None,
            ses_access_key_id: None,
            ses_secret_access_key: None,
            ses_endpoint: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SlackConfig {
    pub bot_token: Option<String>,
    pub default_channel: Option<String>,
    pub api_base: String,
}

impl Default for SlackConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            default_channel: None,
            api_base: "https://slack.com/api".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TwilioConfig {
    pub account_sid: Option<String>,
    pub auth_token: Option<String>,
    pub from_number: Option<String>,
    pub api_base: String,
}

impl Default for TwilioConfig {
    fn default() -> Self {
        Self {
            account_sid: None,
            auth_token: None,
            from_number: None,
            api_base: "https://api.twilio.com".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BoldSignConfig {
    pub api_key: Option<String>,
    pub api_base: String,
}

impl Default for BoldSignConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base: "https://api.boldsign.com".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct NylasConfig {
    pub api_key: Option<String>,
    /// Grant identifying the connected calendar/contacts account.
    pub grant_id: Option<String>,
    pub api_base: String,
}

impl Default for NylasConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            grant_id: None,
            api_base: "https://api.us.nylas.com".to_string(),
        }
    }
}

/// Security hardening configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Enable security headers.
    pub enable_headers: bool,
    /// Maximum body size in bytes.
    pub max_body_size: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            enable_headers: true,
            max_body_size: 5 * 1024 * 1024, // 5MB, avatars included
        }
    }
}
