//! Drains one event stream and forwards new posts, in arrival order.

use futures::StreamExt;

use crate::{
    domain::{Notification, StreamEvent},
    ports::{EventStream, NotificationSink},
};

/// Counts reported when a stream ends.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WatchSummary {
    pub events: u64,
    pub delivered: u64,
}

pub struct StreamWatcher<'a> {
    server_url: &'a str,
    sink: &'a dyn NotificationSink,
}

impl<'a> StreamWatcher<'a> {
    pub fn new(server_url: &'a str, sink: &'a dyn NotificationSink) -> Self {
        Self { server_url, sink }
    }

    /// Consume `events` until the connection ends.
    ///
    /// Each `update` is delivered (and awaited) before the next event is read;
    /// everything else is dropped. Returning is the only end-of-stream signal.
    pub async fn watch(&self, mut events: EventStream) -> WatchSummary {
        let mut summary = WatchSummary::default();

        while let Some(event) = events.next().await {
            summary.events += 1;
            match event {
                StreamEvent::Update(status) => {
                    let notification = Notification::from_status(&status, self.server_url);
                    self.sink.deliver(notification).await;
                    summary.delivered += 1;
                }
                other => {
                    tracing::debug!(server = self.server_url, kind = other.kind(), "skipping event");
                }
            }
        }

        summary
    }
}
