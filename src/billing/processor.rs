use serde_json::{json, Value};
use tracing::{info, warn};

use crate::billing::types::{BillingUpdate, StripeEvent};
use crate::db::{repo, DataStore, DbResult};

/// What applying an event did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Updated,
    /// The event referenced no known company.
    NoMatch,
    Ignored,
}

/// Apply a verified Stripe event to the companies table.
pub async fn process_event(store: &dyn DataStore, event: &StripeEvent) -> DbResult<Applied> {
    let update = BillingUpdate::from_event(event);
    info!(event_id = %event.id, event_type = %event.event_type, "Processing billing event");

    match update {
        BillingUpdate::CheckoutCompleted { organization_id, customer_id, subscription_id } => {
            // Ids the event leaves out keep their stored values
            let mut patch = serde_json::Map::new();
            if let Some(id) = customer_id {
                patch.insert("stripe_customer_id".into(), json!(id));
            }
            if let Some(id) = subscription_id {
                patch.insert("stripe_subscription_id".into(), json!(id));
            }
            patch.insert("subscription_status".into(), json!("active"));

            match repo::update_company(store, &organization_id, Value::Object(patch)).await? {
                Some(_) => {
                    info!(organization_id = %organization_id, "Checkout linked to company");
                    Ok(Applied::Updated)
                }
                None => {
                    warn!(organization_id = %organization_id, "Checkout for unknown company");
                    Ok(Applied::NoMatch)
                }
            }
        }
        BillingUpdate::SubscriptionStatus { customer_id, status } => {
            let matched =
                repo::update_company_by_customer(store, &customer_id, json!({ "subscription_status": status })).await?;
            if matched == 0 {
                warn!(customer_id = %customer_id, "No company billed under customer");
                return Ok(Applied::NoMatch);
            }
            info!(customer_id = %customer_id, status = %status, "Subscription status updated");
            Ok(Applied::Updated)
        }
        BillingUpdate::Ignored { reason } => {
            info!(event_type = %event.event_type, reason, "Billing event ignored");
            Ok(Applied::Ignored)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::COMPANIES;
    use crate::db::store::Query;
    use crate::db::MemoryStore;

    async fn seed(store: &MemoryStore) {
        store
            .insert(COMPANIES, json!({ "id": "org-1", "name": "Acme", "stripe_customer_id": "cus_1" }))
            .await
            .unwrap();
    }

    fn event(event_type: &str, object: serde_json::Value) -> StripeEvent {
        serde_json::from_value(json!({ "id": "evt_1", "type": event_type, "data": { "object": object } })).unwrap()
    }

    async fn status(store: &MemoryStore) -> serde_json::Value {
        let rows = store.select(COMPANIES, &Query::new().eq("id", "org-1")).await.unwrap();
        rows[0]["subscription_status"].clone()
    }

    #[tokio::test]
    async fn test_checkout_then_failure() {
        let store = MemoryStore::new();
        seed(&store).await;

        let applied = process_event(
            &store,
            &event(
                "checkout.session.completed",
                json!({ "client_reference_id": "org-1", "customer": "cus_2", "subscription": "sub_2" }),
            ),
        )
        .await
        .unwrap();
        assert_eq!(applied, Applied::Updated);
        assert_eq!(status(&store).await, "active");

        let applied = process_event(&store, &event("invoice.payment_failed", json!({ "customer": "cus_2" })))
            .await
            .unwrap();
        assert_eq!(applied, Applied::Updated);
        assert_eq!(status(&store).await, "past_due");
    }

    #[tokio::test]
    async fn test_checkout_without_ids_keeps_stored_customer() {
        let store = MemoryStore::new();
        seed(&store).await;

        let applied = process_event(
            &store,
            &event("checkout.session.completed", json!({ "client_reference_id": "org-1", "subscription": "sub_3" })),
        )
        .await
        .unwrap();
        assert_eq!(applied, Applied::Updated);

        let rows = store.select(COMPANIES, &Query::new().eq("id", "org-1")).await.unwrap();
        assert_eq!(rows[0]["stripe_customer_id"], "cus_1");
        assert_eq!(rows[0]["stripe_subscription_id"], "sub_3");
        assert_eq!(rows[0]["subscription_status"], "active");
    }

    #[tokio::test]
    async fn test_unknown_customer() {
        let store = MemoryStore::new();
        seed(&store).await;
        let applied = process_event(&store, &event("customer.subscription.deleted", json!({ "customer": "cus_x" })))
            .await
            .unwrap();
        assert_eq!(applied, Applied::NoMatch);
    }
}
