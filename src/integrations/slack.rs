//! Slack Web API client (`chat.postMessage`).

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::integrations::{IntegrationError, VendorHttp};

const VENDOR: &str = "Slack";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostedMessage {
    pub channel: String,
    pub ts: String,
}

/// Slack answers 200 even for failures; `ok` tells them apart.
#[derive(Debug, Deserialize)]
struct SlackReply {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    channel: Option<String>,
    #[serde(default)]
    ts: Option<String>,
}

#[derive(Clone)]
pub struct SlackClient {
    http: VendorHttp,
    api_base: String,
    bot_token: String,
    default_channel: Option<String>,
}

impl SlackClient {
    pub fn new(
        api_base: &str,
        bot_token: String,
        default_channel: Option<String>,
        timeout: Duration,
    ) -> Result<Self, IntegrationError> {
        Ok(Self {
            http: VendorHttp::new(VENDOR, timeout)?,
            api_base: api_base.trim_end_matches('/').to_string(),
            bot_token,
            default_channel,
        })
    }

    /// Post `text` to `channel`, or to the configured default channel.
    pub async fn post_message(&self, channel: Option<&str>, text: &str) -> Result<PostedMessage, IntegrationError> {
        let channel = channel
            .or(self.default_channel.as_deref())
            .ok_or(IntegrationError::Api {
                vendor: VENDOR,
                status: 400,
                body: "no channel given and no default channel configured".to_string(),
            })?;

        let req = self
            .http
            .client()
            .post(format!("{}/chat.postMessage", self.api_base))
            .bearer_auth(&self.bot_token)
            .json(&serde_json::json!({ "channel": channel, "text": text }));
        let reply: SlackReply = self.http.send_json(req).await?;
        into_posted(reply, channel)
    }
}

fn into_posted(reply: SlackReply, channel: &str) -> Result<PostedMessage, IntegrationError> {
    if !reply.ok {
        return Err(IntegrationError::Api {
            vendor: VENDOR,
            status: 200,
            body: reply.error.unwrap_or_else(|| "unknown_error".to_string()),
        });
    }
    Ok(PostedMessage {
        channel: reply.channel.unwrap_or_else(|| channel.to_string()),
        ts: reply.ts.unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_ok_reply_is_an_error() {
        let reply: SlackReply = serde_json::from_str(r#"{"ok":false,"error":"channel_not_found"}"#).unwrap();
        match into_posted(reply, "C1") {
            Err(IntegrationError::Api { body, .. }) => assert_eq!(body, "channel_not_found"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_ok_reply() {
        let reply: SlackReply = serde_json::from_str(r#"{"ok":true,"channel":"C1","ts":"1700.01"}"#).unwrap();
        let posted = into_posted(reply, "general").unwrap();
        assert_eq!(posted.channel, "C1");
        assert_eq!(posted.ts, "1700.01");
    }
}
