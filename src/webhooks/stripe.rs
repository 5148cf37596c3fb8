//! Inbound Stripe webhook processing: verify, deduplicate, dispatch.

use thiserror::Error;

use crate::billing::{self, Applied, StripeEvent};
use crate::config::schema::StripeConfig;
use crate::db::{DataStore, DbError};
use crate::observability::metrics;
use crate::webhooks::replay::ReplayGuard;
use crate::webhooks::signature::{self, SignatureError};

#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("webhook secret is not configured")]
    NotConfigured,

    #[error(transparent)]
    Signature(#[from] SignatureError),

    #[error("invalid event payload: {0}")]
    Payload(String),

    #[error(transparent)]
    Database(#[from] DbError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    Processed { event_type: String, applied: Applied },
    Duplicate { event_id: String },
}

/// Verifies and dispatches Stripe events. Holds the replay guard shared by all requests.
#[derive(Clone, Default)]
pub struct StripeWebhook {
    replay: ReplayGuard,
}

impl StripeWebhook {
    pub fn new(replay: ReplayGuard) -> Self {
        Self { replay }
    }

    pub fn replay(&self) -> &ReplayGuard {
        &self.replay
    }

    pub async fn handle(
        &self,
        store: &dyn DataStore,
        config: &StripeConfig,
        signature_header: Option<&str>,
        payload: &[u8],
    ) -> Result<WebhookOutcome, WebhookError> {
        self.handle_at(store, config, signature_header, payload, chrono::Utc::now().timestamp())
            .await
    }

    pub async fn handle_at(
        &self,
        store: &dyn DataStore,
        config: &StripeConfig,
        signature_header: Option<&str>,
        payload: &[u8],
        now: i64,
    ) -> Result<WebhookOutcome, WebhookError> {
        let secret = config.webhook_secret.as_deref().ok_or(WebhookError::NotConfigured)?;

        if let Err(e) = signature::verify(payload, signature_header, secret, config.webhook_tolerance_secs, now) {
            metrics::record_webhook_event("unknown", "rejected");
            tracing::warn!(error = %e, "Rejected Stripe webhook");
            return Err(e.into());
        }

        let event: StripeEvent =
            serde_json::from_slice(payload).map_err(|e| WebhookError::Payload(e.to_string()))?;

        if !self.replay.first_delivery(&event.id) {
            metrics::record_webhook_event(&event.event_type, "duplicate");
            tracing::info!(event_id = %event.id, "Duplicate Stripe event skipped");
            return Ok(WebhookOutcome::Duplicate { event_id: event.id });
        }

        match billing::process_event(store, &event).await {
            Ok(applied) => {
                let outcome = match applied {
                    Applied::Updated => "processed",
                    Applied::NoMatch => "unmatched",
                    Applied::Ignored => "ignored",
                };
                metrics::record_webhook_event(&event.event_type, outcome);
                Ok(WebhookOutcome::Processed { event_type: event.event_type, applied })
            }
            Err(e) => {
                // Let Stripe's redelivery try again
                self.replay.forget(&event.id);
                metrics::record_webhook_event(&event.event_type, "failed");
                Err(e.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::COMPANIES;
    use crate::db::store::Query;
    use crate::db::MemoryStore;
    use serde_json::json;

    const NOW: i64 = 1_700_000_000;

    fn config() -> StripeConfig {
        StripeConfig { webhook_secret: Some("whsec_test".into()), ..StripeConfig::default() }
    }

    fn payload(id: &str) -> Vec<u8> {
        serde_json::to_vec(&json!({
            "id": id,
            "type": "customer.subscription.updated",
            "data": { "object": { "customer": "cus_1", "status": "past_due" } }
        }))
        .unwrap()
    }

    async fn store() -> MemoryStore {
        let store = MemoryStore::new();
        store
            .insert(COMPANIES, json!({ "id": "org-1", "name": "Acme", "stripe_customer_id": "cus_1" }))
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_missing_secret() {
        let store = store().await;
        let err = StripeWebhook::default()
            .handle_at(&store, &StripeConfig::default(), None, b"{}", NOW)
            .await
            .unwrap_err();
        assert!(matches!(err, WebhookError::NotConfigured));
    }

    #[tokio::test]
    async fn test_bad_signature_does_not_dispatch() {
        let store = store().await;
        let body = payload("evt_1");
        let header = signature::sign(&body, "whsec_wrong", NOW);

        let err = StripeWebhook::default()
            .handle_at(&store, &config(), Some(&header), &body, NOW)
            .await
            .unwrap_err();
        assert!(matches!(err, WebhookError::Signature(SignatureError::Mismatch)));

        let rows = store.select(COMPANIES, &Query::new()).await.unwrap();
        assert!(rows[0].get("subscription_status").map_or(true, |v| v.is_null()));
    }

    #[tokio::test]
    async fn test_dispatch_then_duplicate() {
        let store = store().await;
        let webhook = StripeWebhook::default();
        let body = payload("evt_1");
        let header = signature::sign(&body, "whsec_test", NOW);

        let first = webhook.handle_at(&store, &config(), Some(&header), &body, NOW).await.unwrap();
        assert_eq!(
            first,
            WebhookOutcome::Processed { event_type: "customer.subscription.updated".into(), applied: Applied::Updated }
        );

        let rows = store.select(COMPANIES, &Query::new()).await.unwrap();
        assert_eq!(rows[0]["subscription_status"], "past_due");

        let second = webhook.handle_at(&store, &config(), Some(&header), &body, NOW).await.unwrap();
        assert_eq!(second, WebhookOutcome::Duplicate { event_id: "evt_1".into() });
    }
}
