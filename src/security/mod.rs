//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → body size limit (tower-http, configured in http/server.rs)
//!     → rate_limit.rs (sliding-window budget per identity or IP)
//!     → handler
//! Outgoing response:
//!     → headers.rs (security headers)
//! ```

pub mod headers;
pub mod rate_limit;

pub use rate_limit::{RateLimitDecision, RateLimitState, RateLimiter};
