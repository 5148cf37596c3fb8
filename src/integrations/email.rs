//! Transactional email through Resend or Amazon SES (v2 API).

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::schema::{EmailConfig, EmailProvider};
use crate::integrations::sigv4::{self, Credentials};
use crate::integrations::{IntegrationError, VendorHttp};

const SES_PATH: &str = "/v2/email/outbound-emails";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailMessage {
    pub to: Vec<String>,
    pub subject: String,
    pub html: String,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SentEmail {
    pub id: String,
    pub provider: &'static str,
}

#[derive(Clone)]
pub struct ResendClient {
    http: VendorHttp,
    api_base: String,
    api_key: String,
    from: String,
}

#[derive(Clone)]
pub struct SesClient {
    http: VendorHttp,
    endpoint: String,
    region: String,
    access_key_id: String,
    secret_access_key: String,
    from: String,
}

/// The configured email provider.
#[derive(Clone)]
pub enum EmailClient {
    Resend(ResendClient),
    Ses(SesClient),
}

impl EmailClient {
    /// `None` when the selected provider lacks credentials or a sender address.
    pub fn from_config(config: &EmailConfig, timeout: Duration) -> Result<Option<Self>, IntegrationError> {
        let Some(from) = config.from.clone() else {
            return Ok(None);
        };

        match config.provider {
            EmailProvider::Resend => {
                let Some(api_key) = config.resend_api_key.clone() else {
                    return Ok(None);
                };
                Ok(Some(EmailClient::Resend(ResendClient {
                    http: VendorHttp::new("Resend", timeout)?,
                    api_base: config.resend_api_base.trim_end_matches('/').to_string(),
                    api_key,
                    from,
                })))
            }
            EmailProvider::Ses => {
                let (Some(region), Some(key_id), Some(secret)) = (
                    config.ses_region.clone(),
                    config.ses_access_key_id.clone(),
                    config.ses_secret_access_key.clone(),
                ) else {
                    return Ok(None);
                };
                let endpoint = config
                    .ses_endpoint
                    .clone()
                    .unwrap_or_else(|| format!("https://email.{}.amazonaws.com", region));
                Ok(Some(EmailClient::Ses(SesClient {
                    http: VendorHttp::new("SES", timeout)?,
                    endpoint: endpoint.trim_end_matches('/').to_string(),
                    region,
                    access_key_id: key_id,
                    secret_access_key: secret,
                    from,
                })))
            }
        }
    }

    pub fn provider(&self) -> &'static str {
        match self {
            EmailClient::Resend(_) => "resend",
            EmailClient::Ses(_) => "ses",
        }
    }

    pub async fn send(&self, message: &EmailMessage) -> Result<SentEmail, IntegrationError> {
        if message.to.is_empty() {
            return Err(IntegrationError::Api {
                vendor: self.vendor(),
                status: 400,
                body: "at least one recipient is required".to_string(),
            });
        }
        match self {
            EmailClient::Resend(client) => client.send(message).await,
            EmailClient::Ses(client) => client.send(message).await,
        }
    }

    fn vendor(&self) -> &'static str {
        match self {
            EmailClient::Resend(_) => "Resend",
            EmailClient::Ses(_) => "SES",
        }
    }
}

#[derive(Deserialize)]
struct ResendReply {
    id: String,
}

impl ResendClient {
    async fn send(&self, message: &EmailMessage) -> Result<SentEmail, IntegrationError> {
        let mut body = serde_json::json!({
            "from": self.from,
            "to": message.to,
            "subject": message.subject,
            "html": message.html,
        });
        if let Some(text) = &message.text {
            body["text"] = serde_json::Value::String(text.clone());
        }

        let req = self
            .http
            .client()
            .post(format!("{}/emails", self.api_base))
            .bearer_auth(&self.api_key)
            .json(&body);
        let reply: ResendReply = self.http.send_json(req).await?;
        Ok(SentEmail { id: reply.id, provider: "resend" })
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SesReply {
    message_id: String,
}

pub(crate) fn ses_body(from: &str, message: &EmailMessage) -> serde_json::Value {
    let mut body = serde_json::json!({ "Html": { "Data": message.html, "Charset": "UTF-8" } });
    if let Some(text) = &message.text {
        body["Text"] = serde_json::json!({ "Data": text, "Charset": "UTF-8" });
    }
    serde_json::json!({
        "FromEmailAddress": from,
        "Destination": { "ToAddresses": message.to },
        "Content": {
            "Simple": {
                "Subject": { "Data": message.subject, "Charset": "UTF-8" },
                "Body": body,
            }
        }
    })
}

impl SesClient {
    async fn send(&self, message: &EmailMessage) -> Result<SentEmail, IntegrationError> {
        let payload = serde_json::to_vec(&ses_body(&self.from, message))
            .map_err(|e| IntegrationError::Decode { vendor: "SES", message: e.to_string() })?;

        let url = url::Url::parse(&format!("{}{}", self.endpoint, SES_PATH))
            .map_err(|e| IntegrationError::Transport { vendor: "SES", message: e.to_string() })?;
        let host = match (url.host_str(), url.port()) {
            (Some(h), Some(p)) => format!("{}:{}", h, p),
            (Some(h), None) => h.to_string(),
            (None, _) => {
                return Err(IntegrationError::Transport { vendor: "SES", message: "endpoint has no host".into() })
            }
        };

        let creds = Credentials {
            access_key_id: &self.access_key_id,
            secret_access_key: &self.secret_access_key,
            region: &self.region,
            service: "ses",
        };
        let signed = sigv4::sign_post(&creds, &host, SES_PATH, &payload, chrono::Utc::now());

        let req = self
            .http
            .client()
            .post(url)
            .header("content-type", "application/json")
            .header("host", host)
            .header("x-amz-date", signed.amz_date)
            .header("authorization", signed.authorization)
            .body(payload);
        let reply: SesReply = self.http.send_json(req).await?;
        Ok(SentEmail { id: reply.message_id, provider: "ses" })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message() -> EmailMessage {
        EmailMessage {
            to: vec!["client@acme.test".into()],
            subject: "Welcome".into(),
            html: "<p>Hi</p>".into(),
            text: None,
        }
    }

    #[test]
    fn test_provider_selection() {
        let mut config = EmailConfig::default();
        assert!(EmailClient::from_config(&config, Duration::from_secs(1)).unwrap().is_none());

        config.from = Some("hello@onboard.test".into());
        config.resend_api_key = Some("re_123".into());
        let client = EmailClient::from_config(&config, Duration::from_secs(1)).unwrap().unwrap();
        assert_eq!(client.provider(), "resend");

        config.provider = EmailProvider::Ses;
        assert!(EmailClient::from_config(&config, Duration::from_secs(1)).unwrap().is_none());
        config.ses_region = Some("eu-west-1".into());
        config.ses_access_key_id = Some("AKID".into());
        config.ses_secret_access_key = Some("secret".into());
        let client = EmailClient::from_config(&config, Duration::from_secs(1)).unwrap().unwrap();
        assert_eq!(client.provider(), "ses");
    }

    #[test]
    fn test_ses_body_shape() {
        let body = ses_body("hello@onboard.test", &message());
        assert_eq!(body["FromEmailAddress"], "hello@onboard.test");
        assert_eq!(body["Destination"]["ToAddresses"][0], "client@acme.test");
        assert_eq!(body["Content"]["Simple"]["Subject"]["Data"], "Welcome");
        assert!(body["Content"]["Simple"]["Body"].get("Text").is_none());
    }

    #[tokio::test]
    async fn test_empty_recipients_rejected_before_sending() {
        let mut config = EmailConfig::default();
        config.from = Some("hello@onboard.test".into());
        config.resend_api_key = Some("re_123".into());
        config.resend_api_base = "http://127.0.0.1:1".into();
        let client = EmailClient::from_config(&config, Duration::from_secs(1)).unwrap().unwrap();

        let mut msg = message();
        msg.to.clear();
        assert!(matches!(client.send(&msg).await, Err(IntegrationError::Api { status: 400, .. })));
    }
}
