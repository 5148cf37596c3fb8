//! Subscription state driven by Stripe events.
//!
//! # Data Flow
//! ```text
//! verified webhook payload
//!     → types.rs (StripeEvent → BillingUpdate)
//!     → processor.rs (apply to companies table)
//! ```

pub mod processor;
pub mod types;

pub use processor::{process_event, Applied};
pub use types::{BillingUpdate, StripeEvent};
