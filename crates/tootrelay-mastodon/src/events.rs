//! Streaming API frame decoding.
//!
//! Each WebSocket text frame is a JSON envelope:
//! `{"stream": ["public"], "event": "update", "payload": "<json-encoded status>"}`.

use serde::Deserialize;

use tootrelay_core::domain::{Status, StreamEvent};

#[derive(Debug, Deserialize)]
struct Frame {
    #[serde(default)]
    event: Option<String>,
    #[serde(default)]
    payload: Option<serde_json::Value>,
    #[serde(default)]
    error: Option<String>,
}

/// Decode one text frame. Returns `None` for frames that carry no usable event.
pub fn decode_frame(text: &str) -> Option<StreamEvent> {
    let frame: Frame = match serde_json::from_str(text) {
        Ok(f) => f,
        Err(e) => {
            tracing::warn!(error = %e, frame = %truncate_text(text, 200), "undecodable stream frame");
            return None;
        }
    };

    if let Some(err) = frame.error {
        tracing::warn!(error = %err, "streaming server reported an error");
        return None;
    }

    let event = frame.event?;
    let ev = match event.as_str() {
        "update" => StreamEvent::Update(parse_status(&event, frame.payload)?),
        "status.update" => StreamEvent::StatusUpdate(parse_status(&event, frame.payload)?),
        "delete" => StreamEvent::Delete {
            id: payload_string(frame.payload).unwrap_or_default(),
        },
        "notification" => StreamEvent::Notification,
        "conversation" => StreamEvent::Conversation,
        "announcement" | "announcement.reaction" | "announcement.delete" => {
            StreamEvent::Announcement
        }
        "filters_changed" => StreamEvent::FiltersChanged,
        other => StreamEvent::Unknown {
            event: other.to_string(),
        },
    };
    Some(ev)
}

/// Payloads are usually JSON-encoded strings; some servers inline the object.
fn parse_status(event: &str, payload: Option<serde_json::Value>) -> Option<Status> {
    let parsed = match payload? {
        serde_json::Value::String(s) => serde_json::from_str::<Status>(&s),
        other => serde_json::from_value::<Status>(other),
    };
    match parsed {
        Ok(status) => Some(status),
        Err(e) => {
            tracing::warn!(event, error = %e, "malformed status payload");
            None
        }
    }
}

fn payload_string(payload: Option<serde_json::Value>) -> Option<String> {
    match payload? {
        serde_json::Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

fn truncate_text(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }
    let mut out = s.chars().take(max_len).collect::<String>();
    out.push_str("...");
    out
}
