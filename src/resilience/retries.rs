//! Retry logic for outbound vendor calls.
//!
//! # Design Decisions
//! - Only operations the caller marks idempotent are retried
//! - Transport errors, 429 and 5xx are retryable; other 4xx are not
//! - Jittered exponential backoff between attempts

use std::future::Future;

use crate::config::RetryConfig;
use crate::resilience::backoff::calculate_backoff;

/// Whether an HTTP outcome is worth retrying. `status` is `None` for transport errors.
pub fn is_retryable_status(status: Option<u16>) -> bool {
    match status {
        None => true,
        Some(429) => true,
        Some(s) => (500..600).contains(&s),
    }
}

/// Errors that can say whether another attempt might succeed.
pub trait Transient {
    fn is_transient(&self) -> bool;
}

/// Run `op` until it succeeds, fails permanently or attempts run out.
pub async fn with_retries<T, E, F, Fut>(config: &RetryConfig, label: &str, mut op: F) -> Result<T, E>
where
    E: Transient + std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let max_attempts = if config.enabled { config.max_attempts.max(1) } else { 1 };
    let mut attempt = 0;

    loop {
        attempt += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < max_attempts && e.is_transient() => {
                let delay = calculate_backoff(attempt, config.base_delay_ms, config.max_delay_ms);
                tracing::info!(operation = %label, attempt, delay = ?delay, error = %e, "Retrying vendor call");
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}
