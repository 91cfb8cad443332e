//! WebSocket command channel.
//!
//! The persistent transport, and the only one on which pin-change
//! subscriptions are usable. Frames are JSON envelopes:
//!
//! ```json
//! {"event": "command", "data": "<JSON-stringified action>"}
//! {"event": "reply",   "data": "<JSON-stringified reply action>"}
//! ```
//!
//! On connect the server emits `{"event": "hello", "data": "world"}` as
//! a liveness signal; it is not part of the command protocol. Replies to
//! subscription commands come back like any other, and the subscribed
//! pin's readings are then pushed through the same connection as
//! additional `reply` frames, one per board-reported change.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::action::Action;
use crate::bridge::Bridge;
use crate::commands::dispatch_with_listener;
use crate::registry::Listener;
use crate::traits::Board;

/// One frame on the socket channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocketFrame {
    /// Frame kind: `hello`, `command` or `reply`.
    pub event: String,
    /// Frame payload; for `command`/`reply` a JSON-stringified action.
    pub data: String,
}

impl SocketFrame {
    /// The greeting sent once per connection.
    pub fn hello() -> Self {
        Self {
            event: "hello".into(),
            data: "world".into(),
        }
    }

    /// A `command` frame carrying the action.
    pub fn command(action: &Action) -> serde_json::Result<Self> {
        Ok(Self {
            event: "command".into(),
            data: serde_json::to_string(action)?,
        })
    }

    /// A `reply` frame carrying the action.
    pub fn reply(action: &Action) -> serde_json::Result<Self> {
        Ok(Self {
            event: "reply".into(),
            data: serde_json::to_string(action)?,
        })
    }
}

/// GET /socket - upgrade to the command channel.
pub async fn upgrade_handler<B: Board + 'static>(
    ws: WebSocketUpgrade,
    State(bridge): State<Arc<Bridge<B>>>,
) -> axum::response::Response {
    ws.on_upgrade(|socket| client_loop(socket, bridge))
}

async fn send_frame(socket: &mut WebSocket, frame: &SocketFrame) -> bool {
    match serde_json::to_string(frame) {
        Ok(text) => socket.send(Message::Text(text)).await.is_ok(),
        Err(err) => {
            warn!(error = %err, "failed to serialize socket frame");
            true
        }
    }
}

async fn client_loop<B: Board + 'static>(mut socket: WebSocket, bridge: Arc<Bridge<B>>) {
    let (reply_tx, mut reply_rx) = mpsc::unbounded_channel::<Action>();
    let listener = Listener {
        id: bridge.next_listener_id(),
        tx: reply_tx,
    };
    debug!(listener = listener.id.0, "socket client connected");

    if !send_frame(&mut socket, &SocketFrame::hello()).await {
        bridge.drop_listener(listener.id);
        return;
    }

    loop {
        tokio::select! {
            // Out-of-band replies: subscription readings pushed by the
            // event pump.
            pushed = reply_rx.recv() => {
                // The sender lives in this scope, so the queue cannot close.
                let Some(action) = pushed else { break };
                let Ok(frame) = SocketFrame::reply(&action) else { continue };
                if !send_frame(&mut socket, &frame).await {
                    break;
                }
            }
            message = socket.recv() => {
                let Some(Ok(message)) = message else { break };
                match message {
                    Message::Text(text) => {
                        let action = match decode_command(&text) {
                            Some(action) => action,
                            None => {
                                warn!("ignoring malformed socket command");
                                continue;
                            }
                        };
                        let reply = dispatch_with_listener(&bridge, action, &listener).await;
                        let Ok(frame) = SocketFrame::reply(&reply) else { continue };
                        if !send_frame(&mut socket, &frame).await {
                            break;
                        }
                    }
                    Message::Ping(payload) => {
                        if socket.send(Message::Pong(payload)).await.is_err() {
                            break;
                        }
                    }
                    Message::Pong(_) | Message::Binary(_) => {}
                    Message::Close(_) => break,
                }
            }
        }
    }

    // Release any reporting this connection was holding.
    bridge.drop_listener(listener.id);
    debug!(listener = listener.id.0, "socket client disconnected");
}

/// Parse a `command` frame's action. Frames with a different event or
/// undecodable data are dropped.
fn decode_command(text: &str) -> Option<Action> {
    let frame: SocketFrame = serde_json::from_str(text).ok()?;
    if frame.event != "command" {
        return None;
    }
    serde_json::from_str(&frame.data).ok()
}
