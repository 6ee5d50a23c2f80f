//! Headless collaborators for background tickers (Cron Scheduler, DCA
//! Scheduler, Alert Engine) that must invoke a skill or notify a user with
//! no live channel adapter attached to the triggering event (spec.md §4.5,
//! §4.6).
//!
//! Grounded on `chainclaw_types::channel::ChannelContext`'s default
//! `request_confirmation -> None`: a headless context carries that same
//! "no confirmation available" semantics, and renders replies to the log
//! instead of a transport, since spec.md never specifies how a background
//! tick reaches a user's live session.

use async_trait::async_trait;
use chainclaw_types::channel::ChannelContext;

/// A [`ChannelContext`] for skill invocations with no attached adapter
/// (cron jobs, DCA runs). `send_reply` is logged rather than delivered.
pub struct HeadlessChannel {
    user_id: String,
}

impl HeadlessChannel {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self { user_id: user_id.into() }
    }
}

#[async_trait]
impl ChannelContext for HeadlessChannel {
    fn user_id(&self) -> &str {
        &self.user_id
    }

    fn channel_id(&self) -> &str {
        "headless"
    }

    fn platform(&self) -> &str {
        "headless"
    }

    async fn send_reply(&self, text: &str) -> anyhow::Result<()> {
        tracing::info!(user_id = %self.user_id, reply = %text, "headless skill reply (no live channel)");
        Ok(())
    }
}

/// Notifies a user outside of any in-flight turn (spec.md §4.6: "invoke the
/// injected notifier `(userId, message)`"). Concrete channel adapters
/// implement delivery; this crate only defines the boundary plus a
/// log-only default for environments with no adapter wired yet.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, user_id: &str, message: &str) -> anyhow::Result<()>;
}

pub struct LoggingNotifier;

#[async_trait]
impl Notifier for LoggingNotifier {
    async fn notify(&self, user_id: &str, message: &str) -> anyhow::Result<()> {
        tracing::info!(user_id = %user_id, message = %message, "notification (no channel adapter wired)");
        Ok(())
    }
}
