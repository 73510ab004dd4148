use std::time::Duration;

/// Core error type for the relay.
///
/// Adapter crates map their library errors (HTTP, WebSocket) into this type so
/// supervisors can apply one failure policy regardless of transport.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("stream error: {0}")]
    Stream(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("external error: {0}")]
    External(String),
}

pub type Result<T> = std::result::Result<T, Error>;
