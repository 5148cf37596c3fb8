//! Nylas v3 client for calendar events and contacts.
//!
//! Results are passed through as JSON; only the `data` array is unwrapped.

use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;

use crate::config::RetryConfig;
use crate::integrations::{IntegrationError, VendorHttp};
use crate::resilience::with_retries;

const VENDOR: &str = "Nylas";

#[derive(Debug, Deserialize)]
struct Page {
    #[serde(default)]
    data: Vec<Value>,
}

#[derive(Clone)]
pub struct NylasClient {
    http: VendorHttp,
    api_base: String,
    api_key: String,
    grant_id: String,
    retry: RetryConfig,
}

impl NylasClient {
    pub fn new(
        api_base: &str,
        api_key: String,
        grant_id: String,
        retry: RetryConfig,
        timeout: Duration,
    ) -> Result<Self, IntegrationError> {
        Ok(Self {
            http: VendorHttp::new(VENDOR, timeout)?,
            api_base: api_base.trim_end_matches('/').to_string(),
            api_key,
            grant_id,
            retry,
        })
    }

    pub async fn list_events(&self, calendar_id: &str, limit: u32) -> Result<Vec<Value>, IntegrationError> {
        let limit = limit.to_string();
        self.get_page("events", &[("calendar_id", calendar_id), ("limit", limit.as_str())]).await
    }

    pub async fn list_contacts(&self, limit: u32) -> Result<Vec<Value>, IntegrationError> {
        let limit = limit.to_string();
        self.get_page("contacts", &[("limit", limit.as_str())]).await
    }

    async fn get_page(&self, resource: &str, query: &[(&str, &str)]) -> Result<Vec<Value>, IntegrationError> {
        let url = format!("{}/v3/grants/{}/{}", self.api_base, self.grant_id, resource);
        let page: Page = with_retries(&self.retry, resource, || {
            let req = self.http.client().get(&url).bearer_auth(&self.api_key).query(query);
            self.http.send_json(req)
        })
        .await?;
        Ok(page.data)
    }
}
