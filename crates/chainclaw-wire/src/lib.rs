//! Wire DTOs for the illustrative WebSocket web channel adapter (spec.md §6).
//!
//! These are intentionally thin `serde` value types shared between
//! `chainclaw-server`'s websocket handler and any future native client —
//! the adapter itself (rendering, transport wiring) is an external
//! collaborator per spec.md §1.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Client -> server frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    Message { text: String },
    Confirm { id: String, value: bool },
}

/// Server -> client frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    Reply { text: String },
    ConfirmRequest { id: String, prompt: String },
}

/// Confirmation IDs are opaque and carry a 2-minute TTL (spec.md §6).
pub const CONFIRMATION_TTL_SECS: u64 = 120;

/// Tracks one outstanding confirmation request issued to a web client.
#[derive(Debug, Clone)]
pub struct PendingConfirmation {
    pub id: String,
    pub prompt: String,
    pub issued_at: DateTime<Utc>,
}

impl PendingConfirmation {
    pub fn new(id: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self { id: id.into(), prompt: prompt.into(), issued_at: Utc::now() }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        (now - self.issued_at).num_seconds() as u64 >= CONFIRMATION_TTL_SECS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_frame_round_trips_through_json() {
        let frame = ClientFrame::Confirm { id: "abc".into(), value: true };
        let json = serde_json::to_string(&frame).unwrap();
        assert_eq!(json, r#"{"type":"confirm","id":"abc","value":true}"#);
        let parsed: ClientFrame = serde_json::from_str(&json).unwrap();
        assert!(matches!(parsed, ClientFrame::Confirm { value: true, .. }));
    }

    #[test]
    fn pending_confirmation_expires_after_ttl() {
        let now = Utc::now();
        let pending = PendingConfirmation {
            id: "x".into(),
            prompt: "ok?".into(),
            issued_at: now - chrono::Duration::seconds(121),
        };
        assert!(pending.is_expired(now));
    }
}
