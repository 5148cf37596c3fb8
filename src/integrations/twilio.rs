//! Twilio SMS client.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::integrations::{IntegrationError, VendorHttp};

const VENDOR: &str = "Twilio";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentSms {
    pub sid: String,
    pub status: String,
}

#[derive(Clone)]
pub struct TwilioClient {
    http: VendorHttp,
    api_base: String,
    account_sid: String,
    auth_token: String,
    from_number: String,
}

impl TwilioClient {
    pub fn new(
        api_base: &str,
        account_sid: String,
        auth_token: String,
        from_number: String,
        timeout: Duration,
    ) -> Result<Self, IntegrationError> {
        Ok(Self {
            http: VendorHttp::new(VENDOR, timeout)?,
            api_base: api_base.trim_end_matches('/').to_string(),
            account_sid,
            auth_token,
            from_number,
        })
    }

    pub async fn send_sms(&self, to: &str, body: &str) -> Result<SentSms, IntegrationError> {
        let url = format!("{}/2010-04-01/Accounts/{}/Messages.json", self.api_base, self.account_sid);
        let req = self
            .http
            .client()
            .post(url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&[("To", to), ("From", self.from_number.as_str()), ("Body", body)]);
        self.http.send_json(req).await
    }
}
