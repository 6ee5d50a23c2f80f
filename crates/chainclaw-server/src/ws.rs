//! Illustrative WebSocket web channel adapter (spec.md §6): client↔server
//! JSON frames, a per-connection [`ChannelContext`], and confirmation
//! round-trips with the wire protocol's 2-minute TTL.
//!
//! Grounded on `tandem-server`'s axum websocket route (split sink/stream,
//! an outbound `mpsc` fanned through a forwarding task), generalized from
//! the teacher's engine-event stream to the `ClientFrame`/`ServerFrame`
//! pair `chainclaw-wire` defines. Confirmation correlation by opaque id is
//! new: the teacher has no analogous request/response handshake over its
//! event stream.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use async_trait::async_trait;
use chainclaw_types::channel::ChannelContext;
use chainclaw_wire::{ClientFrame, ServerFrame, CONFIRMATION_TTL_SECS};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::{mpsc, oneshot, Mutex};
use uuid::Uuid;

use crate::command_router::CommandRouter;

pub struct WsState {
    router: Arc<CommandRouter>,
}

impl WsState {
    pub fn new(router: Arc<CommandRouter>) -> Self {
        Self { router }
    }
}

pub fn routes(state: Arc<WsState>) -> Router {
    Router::new().route("/ws", get(ws_handler)).with_state(state)
}

#[derive(Debug, Deserialize)]
struct ConnectParams {
    /// Stable per-end-user identity (spec.md §6); authentication itself is
    /// the transport adapter's concern and out of scope here, so a caller
    /// with no identity yet is assigned a fresh one.
    user_id: Option<String>,
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<WsState>>, Query(params): Query<ConnectParams>) -> impl IntoResponse {
    let user_id = params.user_id.unwrap_or_else(|| Uuid::new_v4().to_string());
    ws.on_upgrade(move |socket| handle_socket(socket, state, user_id))
}

async fn handle_socket(socket: WebSocket, state: Arc<WsState>, user_id: String) {
    let (mut sink, mut stream) = socket.split();
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<ServerFrame>();

    let forward = tokio::spawn(async move {
        while let Some(frame) = out_rx.recv().await {
            let Ok(text) = serde_json::to_string(&frame) else { continue };
            if sink.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    let channel: Arc<WsChannel> = Arc::new(WsChannel {
        user_id: user_id.clone(),
        channel_id: Uuid::new_v4().to_string(),
        out: out_tx.clone(),
        pending: Mutex::new(HashMap::new()),
    });

    while let Some(message) = stream.next().await {
        let Ok(message) = message else { break };
        match message {
            Message::Text(text) => handle_frame(&state, &channel, &text).await,
            Message::Close(_) => break,
            _ => {}
        }
    }

    forward.abort();
}

async fn handle_frame(state: &Arc<WsState>, channel: &Arc<WsChannel>, text: &str) {
    match serde_json::from_str::<ClientFrame>(text) {
        Ok(ClientFrame::Message { text }) => {
            let reply = state.router.handle(channel.clone(), vec![1], &text).await;
            let _ = channel.out.send(ServerFrame::Reply { text: reply });
        }
        Ok(ClientFrame::Confirm { id, value }) => {
            if let Some(sender) = channel.pending.lock().await.remove(&id) {
                let _ = sender.send(value);
            }
        }
        Err(err) => {
            tracing::debug!(error = %err, "ws: ignoring unparseable client frame");
        }
    }
}

/// A [`ChannelContext`] for one live websocket connection. `send_reply`
/// and confirmation requests are pushed through the outbound `mpsc`; the
/// forwarding task owns the actual socket write half.
struct WsChannel {
    user_id: String,
    channel_id: String,
    out: mpsc::UnboundedSender<ServerFrame>,
    pending: Mutex<HashMap<String, oneshot::Sender<bool>>>,
}

#[async_trait]
impl ChannelContext for WsChannel {
    fn user_id(&self) -> &str {
        &self.user_id
    }

    fn channel_id(&self) -> &str {
        &self.channel_id
    }

    fn platform(&self) -> &str {
        "websocket"
    }

    async fn send_reply(&self, text: &str) -> anyhow::Result<()> {
        self.out
            .send(ServerFrame::Reply { text: text.to_string() })
            .map_err(|_| anyhow::anyhow!("websocket connection closed"))
    }

    /// Issues a `confirm_request` and waits up to the wire protocol's TTL
    /// (spec.md §6) for the matching `confirm` frame. A timeout (or a
    /// closed socket) is reported as `None`, which callers treat as "no
    /// confirmation available".
    async fn request_confirmation(&self, prompt: &str) -> Option<bool> {
        let id = Uuid::new_v4().to_string();
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id.clone(), tx);

        if self.out.send(ServerFrame::ConfirmRequest { id: id.clone(), prompt: prompt.to_string() }).is_err() {
            self.pending.lock().await.remove(&id);
            return None;
        }

        match tokio::time::timeout(StdDuration::from_secs(CONFIRMATION_TTL_SECS), rx).await {
            Ok(Ok(value)) => Some(value),
            _ => {
                self.pending.lock().await.remove(&id);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_reply_delivers_frame_to_outbound_channel() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let channel = WsChannel { user_id: "u1".into(), channel_id: "c1".into(), out: tx, pending: Mutex::new(HashMap::new()) };
        channel.send_reply("hi").await.unwrap();
        match rx.recv().await.unwrap() {
            ServerFrame::Reply { text } => assert_eq!(text, "hi"),
            other => panic!("unexpected frame: {other:?}"),
        }
    }

    #[tokio::test]
    async fn request_confirmation_resolves_from_matching_confirm_frame() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let channel = Arc::new(WsChannel { user_id: "u1".into(), channel_id: "c1".into(), out: tx, pending: Mutex::new(HashMap::new()) });
        let waiter = tokio::spawn({
            let channel = channel.clone();
            async move { channel.request_confirmation("proceed?").await }
        });

        let id = match rx.recv().await.unwrap() {
            ServerFrame::ConfirmRequest { id, .. } => id,
            other => panic!("unexpected frame: {other:?}"),
        };
        let sender = channel.pending.lock().await.remove(&id).unwrap();
        sender.send(true).unwrap();

        assert_eq!(waiter.await.unwrap(), Some(true));
    }
}
