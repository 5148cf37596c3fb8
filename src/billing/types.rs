//! Stripe event payloads and the billing changes they imply.

use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Clone, Deserialize)]
pub struct StripeEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: EventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventData {
    pub object: Value,
}

/// A change to a company's subscription state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BillingUpdate {
    /// Checkout finished: link the Stripe customer and subscription to the company.
    CheckoutCompleted {
        organization_id: String,
        customer_id: Option<String>,
        subscription_id: Option<String>,
    },
    /// Set the subscription status of whichever company is billed under `customer_id`.
    SubscriptionStatus { customer_id: String, status: String },
    /// Event type with no billing effect, or one missing the fields needed to act.
    Ignored { reason: &'static str },
}

fn string_field(object: &Value, key: &str) -> Option<String> {
    match object.get(key) {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        // Expanded objects carry the id inside
        Some(Value::Object(inner)) => inner.get("id").and_then(Value::as_str).map(str::to_string),
        _ => None,
    }
}

fn status_for_customer(object: &Value, status: Option<String>) -> BillingUpdate {
    match (string_field(object, "customer"), status) {
        (Some(customer_id), Some(status)) => BillingUpdate::SubscriptionStatus { customer_id, status },
        (None, _) => BillingUpdate::Ignored { reason: "missing customer" },
        (_, None) => BillingUpdate::Ignored { reason: "missing status" },
    }
}

impl BillingUpdate {
    pub fn from_event(event: &StripeEvent) -> Self {
        let object = &event.data.object;
        match event.event_type.as_str() {
            "checkout.session.completed" => match string_field(object, "client_reference_id") {
                Some(organization_id) => BillingUpdate::CheckoutCompleted {
                    organization_id,
                    customer_id: string_field(object, "customer"),
                    subscription_id: string_field(object, "subscription"),
                },
                None => BillingUpdate::Ignored { reason: "missing client_reference_id" },
            },
            "customer.subscription.created" | "customer.subscription.updated" => {
                status_for_customer(object, string_field(object, "status"))
            }
            "customer.subscription.deleted" => status_for_customer(object, Some("canceled".to_string())),
            "invoice.payment_failed" => status_for_customer(object, Some("past_due".to_string())),
            "invoice.payment_succeeded" => status_for_customer(object, Some("active".to_string())),
            _ => BillingUpdate::Ignored { reason: "unhandled event type" },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event(event_type: &str, object: Value) -> StripeEvent {
        serde_json::from_value(json!({
            "id": "evt_1",
            "type": event_type,
            "created": 1_700_000_000,
            "data": { "object": object }
        }))
        .unwrap()
    }

    #[test]
    fn test_checkout_completed() {
        let e = event(
            "checkout.session.completed",
            json!({ "client_reference_id": "org-1", "customer": "cus_1", "subscription": "sub_1" }),
        );
        assert_eq!(
            BillingUpdate::from_event(&e),
            BillingUpdate::CheckoutCompleted {
                organization_id: "org-1".into(),
                customer_id: Some("cus_1".into()),
                subscription_id: Some("sub_1".into()),
            }
        );
    }

    #[test]
    fn test_subscription_status_mapping() {
        let update = |t: &str, obj: Value| BillingUpdate::from_event(&event(t, obj));

        assert_eq!(
            update("customer.subscription.updated", json!({ "customer": "cus_1", "status": "trialing" })),
            BillingUpdate::SubscriptionStatus { customer_id: "cus_1".into(), status: "trialing".into() }
        );
        assert_eq!(
            update("customer.subscription.deleted", json!({ "customer": { "id": "cus_1" }, "status": "active" })),
            BillingUpdate::SubscriptionStatus { customer_id: "cus_1".into(), status: "canceled".into() }
        );
        assert_eq!(
            update("invoice.payment_failed", json!({ "customer": "cus_1" })),
            BillingUpdate::SubscriptionStatus { customer_id: "cus_1".into(), status: "past_due".into() }
        );
        assert_eq!(
            update("invoice.payment_succeeded", json!({ "customer": "cus_1" })),
            BillingUpdate::SubscriptionStatus { customer_id: "cus_1".into(), status: "active".into() }
        );
    }

    #[test]
    fn test_ignored_events() {
        let e = event("charge.refunded", json!({}));
        assert!(matches!(BillingUpdate::from_event(&e), BillingUpdate::Ignored { .. }));

        let e = event("checkout.session.completed", json!({ "customer": "cus_1" }));
        assert_eq!(
            BillingUpdate::from_event(&e),
            BillingUpdate::Ignored { reason: "missing client_reference_id" }
        );
    }
}
