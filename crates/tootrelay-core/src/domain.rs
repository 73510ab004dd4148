use chrono::{DateTime, FixedOffset};
use serde::Deserialize;

use crate::extract::extract_text;

/// OAuth bearer token for one server.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(pub String);

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AccessToken(***)")
    }
}

/// Author of a status (subset of the Mastodon account entity).
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
pub struct Account {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub acct: String,
    #[serde(default)]
    pub display_name: String,
}

/// A post as delivered by the streaming API (only the fields we relay).
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
pub struct Status {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub uri: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub account: Account,
}

impl Status {
    /// Canonical web URL; remote statuses without one fall back to the ActivityPub uri.
    pub fn canonical_url(&self) -> &str {
        match self.url.as_deref() {
            Some(u) if !u.is_empty() => u,
            _ => &self.uri,
        }
    }
}

/// Server-pushed event on a streaming connection.
#[derive(Clone, Debug, PartialEq)]
pub enum StreamEvent {
    /// A new post.
    Update(Status),
    /// An edited post.
    StatusUpdate(Status),
    Notification,
    Delete { id: String },
    Conversation,
    Announcement,
    FiltersChanged,
    Unknown { event: String },
}

impl StreamEvent {
    pub fn kind(&self) -> &str {
        match self {
            StreamEvent::Update(_) => "update",
            StreamEvent::StatusUpdate(_) => "status.update",
            StreamEvent::Notification => "notification",
            StreamEvent::Delete { .. } => "delete",
            StreamEvent::Conversation => "conversation",
            StreamEvent::Announcement => "announcement",
            StreamEvent::FiltersChanged => "filters_changed",
            StreamEvent::Unknown { event } => event,
        }
    }
}

/// Display-ready representation of one new post.
#[derive(Clone, Debug, PartialEq)]
pub struct Notification {
    pub display_name: String,
    pub content: String,
    pub url: String,
    pub server_url: String,
    pub posted_at: Option<DateTime<FixedOffset>>,
}

impl Notification {
    /// Build a notification for a status received from `server_url`.
    pub fn from_status(status: &Status, server_url: &str) -> Self {
        Self {
            display_name: status.account.username.clone(),
            content: extract_text(&status.content),
            url: status.canonical_url().to_string(),
            server_url: server_url.to_string(),
            posted_at: status
                .created_at
                .as_deref()
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok()),
        }
    }

    /// Author profile link on the source server: `{server}/@{name}`.
    pub fn profile_url(&self) -> String {
        format!(
            "{}/@{}",
            self.server_url.trim_end_matches('/'),
            self.display_name
        )
    }
}
