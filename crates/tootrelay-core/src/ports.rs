use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::{
    domain::{AccessToken, Notification, StreamEvent},
    Result,
};

/// Single-pass, in-order sequence of events from one open connection.
///
/// It ends when the connection drops; transport errors end it too.
pub type EventStream = BoxStream<'static, StreamEvent>;

/// Hexagonal port for a real-time streaming server.
///
/// One implementation instance is bound to one configured server.
#[async_trait]
pub trait StreamingTransport: Send + Sync {
    /// Obtain an access token with the account credentials.
    async fn authenticate(&self) -> Result<AccessToken>;

    /// Subscribe to the public timeline stream.
    async fn open_public_stream(&self, token: &AccessToken) -> Result<EventStream>;
}

/// Outgoing notification channel (chat webhook).
///
/// Delivery is best-effort: implementations report their own failures and
/// must tolerate concurrent calls from several supervisors.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn deliver(&self, notification: Notification);
}
