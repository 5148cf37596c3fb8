//! Stripe REST client: customers, subscriptions and checkout sessions.
//!
//! Stripe takes form-encoded bodies. Every create call carries an
//! `Idempotency-Key` generated once per logical call, so a retried attempt
//! cannot create a second object.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::RetryConfig;
use crate::integrations::{IntegrationError, VendorHttp};
use crate::resilience::with_retries;

const VENDOR: &str = "Stripe";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub customer: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    #[serde(default)]
    pub url: Option<String>,
}

/// Parameters for a subscription checkout.
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub price_id: String,
    /// Echoed back on `checkout.session.completed` as `client_reference_id`.
    pub organization_id: String,
    pub customer_email: Option<String>,
    pub customer_id: Option<String>,
    pub success_url: String,
    pub cancel_url: String,
}

#[derive(Clone)]
pub struct StripeClient {
    http: VendorHttp,
    api_base: String,
    secret_key: String,
    retry: RetryConfig,
}

impl StripeClient {
    pub fn new(
        api_base: &str,
        secret_key: String,
        retry: RetryConfig,
        timeout: Duration,
    ) -> Result<Self, IntegrationError> {
        Ok(Self {
            http: VendorHttp::new(VENDOR, timeout)?,
            api_base: api_base.trim_end_matches('/').to_string(),
            secret_key,
            retry,
        })
    }

    pub async fn create_customer(
        &self,
        email: &str,
        name: Option<&str>,
        organization_id: &str,
    ) -> Result<Customer, IntegrationError> {
        let mut form = vec![
            ("email".to_string(), email.to_string()),
            ("metadata[organization_id]".to_string(), organization_id.to_string()),
        ];
        if let Some(name) = name {
            form.push(("name".to_string(), name.to_string()));
        }
        self.post_form("/v1/customers", form).await
    }

    pub async fn create_subscription(&self, customer_id: &str, price_id: &str) -> Result<Subscription, IntegrationError> {
        let form = vec![
            ("customer".to_string(), customer_id.to_string()),
            ("items[0][price]".to_string(), price_id.to_string()),
        ];
        self.post_form("/v1/subscriptions", form).await
    }

    pub async fn create_checkout_session(&self, request: &CheckoutRequest) -> Result<CheckoutSession, IntegrationError> {
        self.post_form("/v1/checkout/sessions", checkout_form(request)).await
    }

    async fn post_form<T>(&self, path: &str, form: Vec<(String, String)>) -> Result<T, IntegrationError>
    where
        T: for<'de> Deserialize<'de>,
    {
        let url = format!("{}{}", self.api_base, path);
        let idempotency_key = uuid::Uuid::new_v4().to_string();

        with_retries(&self.retry, path, || {
            let request = self
                .http
                .client()
                .post(&url)
                .bearer_auth(&self.secret_key)
                .header("Idempotency-Key", &idempotency_key)
                .form(&form);
            self.http.send_json(request)
        })
        .await
    }
}

fn checkout_form(request: &CheckoutRequest) -> Vec<(String, String)> {
    let mut form = vec![
        ("mode".to_string(), "subscription".to_string()),
        ("line_items[0][price]".to_string(), request.price_id.clone()),
        ("line_items[0][quantity]".to_string(), "1".to_string()),
        ("client_reference_id".to_string(), request.organization_id.clone()),
        ("success_url".to_string(), request.success_url.clone()),
        ("cancel_url".to_string(), request.cancel_url.clone()),
    ];
    match (&request.customer_id, &request.customer_email) {
        (Some(id), _) => form.push(("customer".to_string(), id.clone())),
        (None, Some(email)) => form.push(("customer_email".to_string(), email.clone())),
        (None, None) => {}
    }
    form
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> CheckoutRequest {
        CheckoutRequest {
            price_id: "price_123".into(),
            organization_id: "org-1".into(),
            customer_email: Some("owner@acme.test".into()),
            customer_id: None,
            success_url: "http://localhost:3000/billing?ok=1".into(),
            cancel_url: "http://localhost:3000/billing".into(),
        }
    }

    fn value<'a>(form: &'a [(String, String)], key: &str) -> Option<&'a str> {
        form.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    #[test]
    fn test_checkout_form_references_organization() {
        let form = checkout_form(&request());
        assert_eq!(value(&form, "client_reference_id"), Some("org-1"));
        assert_eq!(value(&form, "mode"), Some("subscription"));
        assert_eq!(value(&form, "line_items[0][price]"), Some("price_123"));
        assert_eq!(value(&form, "customer_email"), Some("owner@acme.test"));
    }

    #[test]
    fn test_existing_customer_wins_over_email() {
        let mut req = request();
        req.customer_id = Some("cus_9".into());
        let form = checkout_form(&req);
        assert_eq!(value(&form, "customer"), Some("cus_9"));
        assert!(value(&form, "customer_email").is_none());
    }
}
