//! Network transports for the bridge (feature `web`).
//!
//! Both surfaces feed the same dispatcher in [`crate::commands`]:
//!
//! - [`web`] - HTTP POST `/command` with JSON actions, plus plain-text
//!   GET convenience routes.
//! - [`socket`] - a WebSocket channel carrying `command`/`reply` frames,
//!   the only transport on which subscriptions are usable.

pub mod socket;
pub mod web;

pub use web::{build_router, run_server, WebServerConfig};
