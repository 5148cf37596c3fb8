//! Signed inbound webhooks.

pub mod replay;
pub mod signature;
pub mod stripe;

pub use replay::ReplayGuard;
pub use signature::SignatureError;
pub use stripe::{StripeWebhook, WebhookError, WebhookOutcome};
