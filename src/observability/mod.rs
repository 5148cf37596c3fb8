//! Logs and metrics.
//!
//! Every request runs inside a trace span carrying its `x-request-id`, so
//! handler and vendor-client log lines can be joined per request. Metrics
//! cover request latency, rate-limit rejections, webhook outcomes and vendor
//! calls, and are exported for Prometheus when enabled.

pub mod logging;
pub mod metrics;
