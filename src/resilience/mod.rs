//! Resilience helpers for outbound calls.
//!
//! # Data Flow
//! ```text
//! Vendor call:
//!     → client timeout (reqwest, timeouts.upstream_secs)
//!     → On transient failure: retries.rs (retry idempotent calls with backoff.rs delays)
//! ```

pub mod backoff;
pub mod retries;

pub use retries::{with_retries, Transient};
