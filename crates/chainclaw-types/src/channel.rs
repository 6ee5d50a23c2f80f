//! Channel adapter boundary (spec.md §4.4, §6).
//!
//! Every chat transport (Telegram/Discord/Slack/WhatsApp/WebSocket) is an
//! external collaborator (spec.md §1); this crate only defines the thin
//! interface the Command Router dispatches through.

use async_trait::async_trait;
use std::fmt;

/// Context an inbound channel adapter builds for one message (spec.md §4.4,
/// §6). `sendReply`/`requestConfirmation` are modelled as an async trait so
/// concrete adapters (out of scope here) can implement delivery however
/// their transport requires.
#[async_trait]
pub trait ChannelContext: Send + Sync {
    fn user_id(&self) -> &str;
    fn channel_id(&self) -> &str;
    fn platform(&self) -> &str;

    async fn send_reply(&self, text: &str) -> anyhow::Result<()>;

    /// `None` if this adapter cannot prompt for confirmation; skills treat
    /// that the same as "no confirmation available" (spec.md §4.1).
    async fn request_confirmation(&self, _prompt: &str) -> Option<bool> {
        None
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelMessage {
    pub user_id: String,
    pub channel_id: String,
    pub platform: String,
    pub text: String,
}

impl fmt::Display for ChannelMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}:{}] {}", self.platform, self.user_id, self.text)
    }
}
