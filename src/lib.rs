//! # pin-bridge
//!
//! A bridge process exposing a microcontroller's digital I/O pins to
//! network clients through a uniform command/reply protocol.
//!
//! Clients send typed actions (`pinMode`, `digitalWrite`, `digitalRead`,
//! `digitalReadSubscribe`, `digitalReadUnsubscribe`) over HTTP or a
//! persistent WebSocket channel; the bridge validates each command
//! against the live capability model of the attached board, applies it,
//! and answers with a structured reply or a structured error. Identical
//! command semantics on every transport.
//!
//! ## Architecture
//!
//! The crate is structured so the whole protocol runs against an
//! in-memory board, no hardware required:
//!
//! - `traits` - the minimal board capability (pin table, mode/write/read
//!   primitives, change-event stream)
//! - `action` - the message model and the one reply-construction rule
//! - `validate` - pure pin/mode/output checks against live board state
//! - `commands` - one handler per command plus the shared dispatcher
//! - `registry` - per-pin subscriber bookkeeping gating change-reporting
//! - `bridge` - the explicit context tying board, registry and event
//!   pump together
//! - `hal` - board backends (mock today)
//! - `services` - HTTP and WebSocket transports (feature `web`)
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use pin_bridge::action::pin_mode_action;
//! use pin_bridge::bridge::Bridge;
//! use pin_bridge::commands::dispatch;
//! use pin_bridge::hal::MockBoard;
//! use pin_bridge::traits::PinMode;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let bridge = Arc::new(Bridge::new(MockBoard::new()));
//! bridge.spawn_event_pump();
//!
//! let reply = dispatch(&bridge, pin_mode_action(13, PinMode::OUTPUT)).await;
//! assert_eq!(reply.kind, "pinMode_reply");
//! # }
//! ```

#![warn(missing_docs)]

/// Action message model, request builders and reply construction.
pub mod action;
/// Shared bridge context: board, registry and the event pump.
pub mod bridge;
/// Command handlers and the transport-agnostic dispatcher.
pub mod commands;
/// Bridge configuration with environment loading.
pub mod config;
/// Board backends (mock for testing and desktop development).
pub mod hal;
/// Per-pin subscription bookkeeping.
pub mod registry;
/// Core traits and types for hardware abstraction.
pub mod traits;
/// Pure command validation against live board state.
pub mod validate;

/// Network transports for HTTP and WebSocket clients.
#[cfg(feature = "web")]
pub mod services;

// Re-exports for convenience
pub use action::{Action, ActionError, ErrorCode};
pub use bridge::Bridge;
pub use config::BridgeConfig;
pub use hal::MockBoard;
pub use registry::{Listener, ListenerId, SubscriptionRegistry};
pub use traits::{Board, BoardError, PinEvent, PinMode, PinState};
