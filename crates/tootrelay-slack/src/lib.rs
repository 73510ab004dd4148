//! Slack incoming-webhook adapter.
//!
//! Implements the `tootrelay-core` NotificationSink: every notification is
//! posted once as a single attachment under the relay's name and icon.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use tootrelay_core::{
    config::RelayIdentity, domain::Notification, errors::Error, ports::NotificationSink, Result,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Serialize, PartialEq)]
pub struct WebhookPayload {
    pub username: String,
    pub icon_emoji: String,
    pub attachments: Vec<Attachment>,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct Attachment {
    pub fallback: String,
    pub author_name: String,
    pub author_link: String,
    pub text: String,
    pub footer: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ts: Option<i64>,
}

impl WebhookPayload {
    pub fn new(identity: &RelayIdentity, n: &Notification) -> Self {
        let author_name = format!("@{}", n.display_name);
        Self {
            username: identity.username.clone(),
            icon_emoji: identity.icon_emoji.clone(),
            attachments: vec![Attachment {
                fallback: format!("{author_name}: {}", n.content),
                author_name,
                author_link: n.profile_url(),
                text: n.content.clone(),
                footer: n.url.clone(),
                ts: n.posted_at.map(|t| t.timestamp()),
            }],
        }
    }
}

#[derive(Clone, Debug)]
pub struct SlackWebhook {
    url: String,
    identity: RelayIdentity,
    http: reqwest::Client,
}

impl SlackWebhook {
    pub fn new(url: impl Into<String>, identity: RelayIdentity) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| Error::External(format!("http client build failed: {e}")))?;
        Ok(Self {
            url: url.into(),
            identity,
            http,
        })
    }

    pub async fn post(&self, payload: &WebhookPayload) -> Result<()> {
        let resp = self
            .http
            .post(&self.url)
            .json(payload)
            .send()
            .await
            .map_err(|e| Error::External(format!("slack request error: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::External(format!(
                "slack webhook failed: {status} {}",
                body.chars().take(200).collect::<String>()
            )));
        }

        Ok(())
    }
}

#[async_trait]
impl NotificationSink for SlackWebhook {
    async fn deliver(&self, notification: Notification) {
        let payload = WebhookPayload::new(&self.identity, &notification);
        if let Err(e) = self.post(&payload).await {
            tracing::warn!(
                author = %notification.display_name,
                url = %notification.url,
                error = %e,
                "notification not delivered"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;

    fn notification() -> Notification {
        Notification {
            display_name: "amy".to_string(),
            content: "hello\nworld".to_string(),
            url: "https://a.example/@amy/110".to_string(),
            server_url: "https://a.example/".to_string(),
            posted_at: DateTime::parse_from_rfc3339("2024-05-01T12:30:00Z").ok(),
        }
    }

    #[test]
    fn builds_attachment_payload() {
        let payload = WebhookPayload::new(&RelayIdentity::default(), &notification());
        let v = serde_json::to_value(&payload).unwrap();

        assert_eq!(v["username"], "makepadon");
        assert_eq!(v["icon_emoji"], ":elephant:");
        let a = &v["attachments"][0];
        assert_eq!(a["author_name"], "@amy");
        assert_eq!(a["author_link"], "https://a.example/@amy");
        assert_eq!(a["text"], "hello\nworld");
        assert_eq!(a["fallback"], "@amy: hello\nworld");
        assert_eq!(a["footer"], "https://a.example/@amy/110");
        assert_eq!(a["ts"], 1_714_566_600);
    }

    #[test]
    fn omits_missing_timestamp() {
        let mut n = notification();
        n.posted_at = None;
        let identity = RelayIdentity {
            username: "relay".to_string(),
            icon_emoji: ":robot_face:".to_string(),
        };
        let v = serde_json::to_value(WebhookPayload::new(&identity, &n)).unwrap();
        assert_eq!(v["username"], "relay");
        assert!(v["attachments"][0].get("ts").is_none());
    }

    #[tokio::test]
    async fn delivery_failure_is_swallowed() {
        // Nothing listens on port 9 (discard); the post fails and deliver still returns.
        let hook = SlackWebhook::new("http://127.0.0.1:9/hook", RelayIdentity::default()).unwrap();
        hook.deliver(notification()).await;
        assert!(hook.post(&WebhookPayload::new(&hook.identity, &notification())).await.is_err());
    }
}
