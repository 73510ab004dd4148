//! Per-server connection lifecycle.
//!
//! authenticate → open stream → watch until it ends → reconnect, forever.
//! A stream that ends is reopened immediately; a connect attempt that fails
//! is handled by the server's [`FailurePolicy`] without touching other servers.

use std::{convert::Infallible, sync::Arc, time::Duration};

use tokio::time::{sleep, timeout};

use crate::{
    config::{FailurePolicy, ServerConfig, Settings},
    errors::Error,
    ports::{EventStream, NotificationSink, StreamingTransport},
    watcher::{StreamWatcher, WatchSummary},
    Result,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BackoffConfig {
    pub initial: Duration,
    pub max: Duration,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial: Duration::from_secs(1),
            max: Duration::from_secs(300),
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct SupervisorOptions {
    pub auth_timeout: Duration,
    pub on_failure: FailurePolicy,
    pub backoff: BackoffConfig,
}

impl Default for SupervisorOptions {
    fn default() -> Self {
        Self {
            auth_timeout: Duration::from_secs(15),
            on_failure: FailurePolicy::Retry,
            backoff: BackoffConfig::default(),
        }
    }
}

impl SupervisorOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            auth_timeout: settings.auth_timeout(),
            on_failure: settings.on_auth_failure,
            backoff: BackoffConfig::default(),
        }
    }
}

/// Doubling delay between failed connect attempts, capped at `max`.
#[derive(Debug)]
struct Backoff {
    cfg: BackoffConfig,
    next: Duration,
}

impl Backoff {
    fn new(cfg: BackoffConfig) -> Self {
        Self {
            cfg,
            next: cfg.initial,
        }
    }

    fn next_delay(&mut self) -> Duration {
        let delay = self.next;
        self.next = self.next.saturating_mul(2).min(self.cfg.max);
        delay
    }

    fn reset(&mut self) {
        self.next = self.cfg.initial;
    }
}

pub struct ConnectionSupervisor {
    server: ServerConfig,
    transport: Arc<dyn StreamingTransport>,
    sink: Arc<dyn NotificationSink>,
    opts: SupervisorOptions,
}

impl ConnectionSupervisor {
    pub fn new(
        server: ServerConfig,
        transport: Arc<dyn StreamingTransport>,
        sink: Arc<dyn NotificationSink>,
        opts: SupervisorOptions,
    ) -> Self {
        Self {
            server,
            transport,
            sink,
            opts,
        }
    }

    pub fn server(&self) -> &ServerConfig {
        &self.server
    }

    /// Keep a stream alive for this server.
    ///
    /// Only returns when a connect attempt fails under [`FailurePolicy::Stop`].
    pub async fn run(&self) -> Result<Infallible> {
        let server = self.server.server_url.as_str();
        let mut backoff = Backoff::new(self.opts.backoff);
        let mut attempt: u64 = 0;

        loop {
            attempt += 1;
            tracing::info!(server, attempt, "connecting");

            match self.connect_once().await {
                Ok(summary) => {
                    backoff.reset();
                    tracing::info!(
                        server,
                        events = summary.events,
                        delivered = summary.delivered,
                        "stream ended; reconnecting"
                    );
                }
                Err(e) => match self.opts.on_failure {
                    FailurePolicy::Stop => {
                        tracing::error!(server, error = %e, "connect failed; giving up on server");
                        return Err(e);
                    }
                    FailurePolicy::Retry => {
                        let delay = backoff.next_delay();
                        tracing::warn!(server, error = %e, retry_in = ?delay, "connect failed");
                        sleep(delay).await;
                    }
                },
            }
        }
    }

    /// One full iteration: open a session and watch it until the stream ends.
    pub async fn connect_once(&self) -> Result<WatchSummary> {
        let events = self.open_session().await?;
        tracing::info!(server = %self.server.server_url, "stream open");

        let watcher = StreamWatcher::new(&self.server.server_url, self.sink.as_ref());
        Ok(watcher.watch(events).await)
    }

    /// A fresh token per attempt; it is only needed to open the stream.
    async fn open_session(&self) -> Result<EventStream> {
        let token = timeout(self.opts.auth_timeout, self.transport.authenticate())
            .await
            .map_err(|_| Error::Timeout(self.opts.auth_timeout))??;

        // No timeout: the handshake may legitimately take as long as the server needs.
        self.transport.open_public_stream(&token).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AccessToken, Account, Notification, Status, StreamEvent};
    use async_trait::async_trait;
    use futures::{stream, StreamExt};
    use std::sync::Mutex;
    use tokio::{sync::mpsc, time::Instant};

    fn server(url: &str) -> ServerConfig {
        ServerConfig {
            server_url: url.to_string(),
            streaming_server_url: None,
            client_id: "id".to_string(),
            client_secret: "secret".to_string(),
            account: "bot@example.com".to_string(),
            password: "pw".to_string(),
            local_only: false,
        }
    }

    fn post(n: usize) -> StreamEvent {
        StreamEvent::Update(Status {
            id: n.to_string(),
            url: Some(format!("https://x.example/@u/{n}")),
            content: format!("<p>post {n}</p>"),
            account: Account {
                username: "u".to_string(),
                ..Default::default()
            },
            ..Default::default()
        })
    }

    #[derive(Default)]
    struct RecordingSink {
        delivered: Mutex<Vec<Notification>>,
    }

    #[async_trait]
    impl NotificationSink for RecordingSink {
        async fn deliver(&self, notification: Notification) {
            self.delivered.lock().unwrap().push(notification);
        }
    }

    /// Serves `sessions` streams of `per_stream` posts, then reports and hangs.
    struct ScriptedTransport {
        sessions: usize,
        per_stream: usize,
        auth_calls: Mutex<Vec<Instant>>,
        opens: Mutex<usize>,
        exhausted: mpsc::UnboundedSender<()>,
    }

    #[async_trait]
    impl StreamingTransport for ScriptedTransport {
        async fn authenticate(&self) -> Result<AccessToken> {
            let calls = {
                let mut guard = self.auth_calls.lock().unwrap();
                guard.push(Instant::now());
                guard.len()
            };
            if calls > self.sessions {
                let _ = self.exhausted.send(());
                std::future::pending::<()>().await;
            }
            Ok(AccessToken(format!("token-{calls}")))
        }

        async fn open_public_stream(&self, token: &AccessToken) -> Result<EventStream> {
            assert!(token.0.starts_with("token-"));
            *self.opens.lock().unwrap() += 1;
            Ok(stream::iter((0..self.per_stream).map(post)).boxed())
        }
    }

    struct FailingTransport {
        auth_calls: Mutex<Vec<Instant>>,
    }

    #[async_trait]
    impl StreamingTransport for FailingTransport {
        async fn authenticate(&self) -> Result<AccessToken> {
            self.auth_calls.lock().unwrap().push(Instant::now());
            Err(Error::Auth("invalid_grant".to_string()))
        }

        async fn open_public_stream(&self, _token: &AccessToken) -> Result<EventStream> {
            unreachable!("never authenticated")
        }
    }

    struct HangingAuth;

    #[async_trait]
    impl StreamingTransport for HangingAuth {
        async fn authenticate(&self) -> Result<AccessToken> {
            std::future::pending().await
        }

        async fn open_public_stream(&self, _token: &AccessToken) -> Result<EventStream> {
            unreachable!("never authenticated")
        }
    }

    #[tokio::test(start_paused = true)]
    async fn reconnects_once_per_stream_end_without_delay() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let transport = Arc::new(ScriptedTransport {
            sessions: 4,
            per_stream: 3,
            auth_calls: Mutex::new(Vec::new()),
            opens: Mutex::new(0),
            exhausted: tx,
        });
        let sink = Arc::new(RecordingSink::default());
        let sup = ConnectionSupervisor::new(
            server("https://a.example"),
            transport.clone(),
            sink.clone(),
            SupervisorOptions::default(),
        );

        let start = Instant::now();
        let task = tokio::spawn(async move { sup.run().await });
        rx.recv().await.unwrap();

        // 4 streams ended → 4 reconnects → 5 auth attempts, the last one left pending.
        assert_eq!(transport.auth_calls.lock().unwrap().len(), 5);
        assert_eq!(*transport.opens.lock().unwrap(), 4);
        assert_eq!(sink.delivered.lock().unwrap().len(), 12);
        assert_eq!(start.elapsed(), Duration::ZERO);
        task.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn failed_connects_back_off_exponentially() {
        let transport = Arc::new(FailingTransport {
            auth_calls: Mutex::new(Vec::new()),
        });
        let sup = ConnectionSupervisor::new(
            server("https://a.example"),
            transport.clone(),
            Arc::new(RecordingSink::default()),
            SupervisorOptions::default(),
        );

        let task = tokio::spawn(async move { sup.run().await });
        tokio::time::sleep(Duration::from_millis(7_500)).await;
        task.abort();

        let calls = transport.auth_calls.lock().unwrap().clone();
        let gaps: Vec<_> = calls.windows(2).map(|w| w[1] - w[0]).collect();
        assert_eq!(
            gaps,
            [
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(4)
            ]
        );
    }

    #[tokio::test]
    async fn stop_policy_returns_the_error() {
        let sup = ConnectionSupervisor::new(
            server("https://a.example"),
            Arc::new(FailingTransport {
                auth_calls: Mutex::new(Vec::new()),
            }),
            Arc::new(RecordingSink::default()),
            SupervisorOptions {
                on_failure: FailurePolicy::Stop,
                ..Default::default()
            },
        );

        let err = sup.run().await.unwrap_err();
        assert!(matches!(err, Error::Auth(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn authentication_is_bounded_by_timeout() {
        let sup = ConnectionSupervisor::new(
            server("https://a.example"),
            Arc::new(HangingAuth),
            Arc::new(RecordingSink::default()),
            SupervisorOptions::default(),
        );

        let err = sup.connect_once().await.unwrap_err();
        assert!(matches!(err, Error::Timeout(d) if d == Duration::from_secs(15)));
    }

    #[test]
    fn backoff_caps_and_resets() {
        let mut b = Backoff::new(BackoffConfig {
            initial: Duration::from_secs(1),
            max: Duration::from_secs(5),
        });
        let delays: Vec<_> = (0..5).map(|_| b.next_delay().as_secs()).collect();
        assert_eq!(delays, [1, 2, 4, 5, 5]);
        b.reset();
        assert_eq!(b.next_delay(), Duration::from_secs(1));
    }
}
