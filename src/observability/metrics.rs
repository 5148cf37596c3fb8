//! Metrics collection and exposition.
//!
//! # Metrics
//! - `onboard_requests_total` (counter): requests by method, route, status
//! - `onboard_request_duration_seconds` (histogram): latency distribution
//! - `onboard_rate_limited_total` (counter): denied requests by reason
//! - `onboard_webhook_events_total` (counter): Stripe events by type and outcome
//! - `onboard_integration_calls_total` (counter): vendor calls by vendor and outcome
//!
//! Recording is a no-op until a recorder is installed, so tests need no setup.

use std::net::SocketAddr;
use std::time::Instant;

use axum::{body::Body, extract::MatchedPath, http::Request, middleware::Next, response::Response};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, route: &str, status: u16, start: Instant) {
    let status = status.to_string();
    metrics::counter!(
        "onboard_requests_total",
        "method" => method.to_string(),
        "route" => route.to_string(),
        "status" => status
    )
    .increment(1);
    metrics::histogram!(
        "onboard_request_duration_seconds",
        "method" => method.to_string(),
        "route" => route.to_string()
    )
    .record(start.elapsed().as_secs_f64());
}

pub fn record_rate_limited(reason: &'static str) {
    metrics::counter!("onboard_rate_limited_total", "reason" => reason).increment(1);
}

pub fn record_webhook_event(event_type: &str, outcome: &'static str) {
    metrics::counter!(
        "onboard_webhook_events_total",
        "type" => event_type.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

pub fn record_integration_call(vendor: &'static str, outcome: &'static str) {
    metrics::counter!(
        "onboard_integration_calls_total",
        "vendor" => vendor,
        "outcome" => outcome
    )
    .increment(1);
}

/// Middleware recording request count and latency per matched route.
pub async fn track_requests(request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());

    let response = next.run(request).await;
    record_request(&method, &route, response.status().as_u16(), start);
    response
}
