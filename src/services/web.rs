//! Axum-based HTTP server for the bridge command API.
//!
//! Two error-reporting conventions live side by side, one per surface:
//!
//! - POST `/command` - body and response are JSON actions; validation
//!   failures ride in-band as error-reply actions and the HTTP status is
//!   always 200.
//! - GET convenience routes (`/pinMode/:pin/:mode`,
//!   `/digitalWrite/:pin/:output`, `/digitalRead/:pin`, `/digitalPins`) -
//!   human-readable plain text, with a 400 status on validation errors.
//!
//! Both assemble an action and feed it through the same dispatcher as
//! every other transport; the GET routes merely re-render the reply.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::Value;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::action::{
    digital_read_action, digital_write_action, pin_mode_action, Action, ErrorCode,
};
use crate::bridge::Bridge;
use crate::commands::dispatch;
use crate::config::BridgeConfig;
use crate::traits::{Board, PinMode};

use super::socket;

// ============================================================================
// Route Handlers
// ============================================================================

/// POST /command - dispatch a JSON action, reply in-band.
async fn post_command<B: Board + 'static>(
    State(bridge): State<Arc<Bridge<B>>>,
    Json(action): Json<Action>,
) -> Json<Action> {
    Json(dispatch(&bridge, action).await)
}

/// Path parameter parsed the lenient way: anything non-numeric simply
/// fails validation downstream instead of 404ing the route.
fn param(raw: &str) -> Option<i64> {
    raw.parse().ok()
}

fn param_value(raw: &str) -> Value {
    param(raw).map_or(Value::Null, Value::from)
}

/// GET /pinMode/:pin/:mode - set a pin's mode, plain-text reply.
async fn get_pin_mode<B: Board + 'static>(
    State(bridge): State<Arc<Bridge<B>>>,
    Path((pin, mode)): Path<(String, String)>,
) -> impl IntoResponse {
    let mut action = pin_mode_action(0, PinMode::UNKNOWN);
    if let Some(payload) = action.payload.as_mut() {
        payload.insert("pin".into(), param_value(&pin));
        payload.insert("mode".into(), param_value(&mode));
    }

    match dispatch(&bridge, action).await.error {
        None => (StatusCode::OK, format!("Pin {pin} set to {mode} mode")),
        Some(err) if err.code == ErrorCode::BadMode => (
            StatusCode::BAD_REQUEST,
            format!("Invalid mode {mode} for pin {pin}"),
        ),
        Some(_) => (StatusCode::BAD_REQUEST, format!("Invalid Pin {pin}")),
    }
}

/// GET /digitalWrite/:pin/:output - write a value, plain-text reply.
async fn get_digital_write<B: Board + 'static>(
    State(bridge): State<Arc<Bridge<B>>>,
    Path((pin, output)): Path<(String, String)>,
) -> impl IntoResponse {
    let mut action = digital_write_action(0, 0);
    if let Some(payload) = action.payload.as_mut() {
        payload.insert("pin".into(), param_value(&pin));
        payload.insert("output".into(), param_value(&output));
    }

    match dispatch(&bridge, action).await.error {
        None => (StatusCode::OK, format!("Pin {pin} set to {output}")),
        Some(err) if err.code == ErrorCode::BadOutput => (
            StatusCode::BAD_REQUEST,
            format!("Invalid output {output} for pin {pin}"),
        ),
        Some(_) => (StatusCode::BAD_REQUEST, format!("Invalid Pin {pin}")),
    }
}

/// GET /digitalRead/:pin - one-shot read, plain-text reply.
async fn get_digital_read<B: Board + 'static>(
    State(bridge): State<Arc<Bridge<B>>>,
    Path(pin): Path<String>,
) -> impl IntoResponse {
    let mut action = digital_read_action(0);
    if let Some(payload) = action.payload.as_mut() {
        payload.insert("pin".into(), param_value(&pin));
    }

    let reply = dispatch(&bridge, action).await;
    if reply.error.is_some() {
        return (StatusCode::BAD_REQUEST, format!("Invalid Pin {pin}"));
    }
    let value = reply
        .payload
        .as_ref()
        .and_then(|p| p.get("value"))
        .cloned()
        .unwrap_or(Value::Null);
    (StatusCode::OK, format!("Pin {pin} returned {value}"))
}

/// GET /digitalPins - pin count summary.
async fn get_digital_pins<B: Board + 'static>(
    State(bridge): State<Arc<Bridge<B>>>,
) -> impl IntoResponse {
    let count = bridge.with_board(|board| board.pin_count());
    format!("There are {count} pins in this board")
}

/// GET /digitalPins/:pin - one pin's live state as JSON.
async fn get_digital_pin<B: Board + 'static>(
    State(bridge): State<Arc<Bridge<B>>>,
    Path(pin): Path<String>,
) -> axum::response::Response {
    let Some(index) = param(&pin).and_then(|p| usize::try_from(p).ok()) else {
        return (StatusCode::BAD_REQUEST, format!("Invalid Pin {pin}")).into_response();
    };
    match bridge.with_board(|board| board.pin(index).cloned()) {
        Some(state) => Json(state).into_response(),
        None => (StatusCode::BAD_REQUEST, format!("Invalid Pin {pin}")).into_response(),
    }
}

/// Fallback handler for 404.
async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "Not found")
}

// ============================================================================
// Server Builder
// ============================================================================

/// Configuration for the web server.
#[derive(Debug, Clone)]
pub struct WebServerConfig {
    /// Address to bind to.
    pub addr: SocketAddr,
    /// Whether to enable CORS for all origins.
    pub cors_permissive: bool,
}

impl Default for WebServerConfig {
    fn default() -> Self {
        Self {
            addr: ([0, 0, 0, 0], 8000).into(),
            cors_permissive: true,
        }
    }
}

impl WebServerConfig {
    /// Create a new config with the given address.
    pub fn new(addr: impl Into<SocketAddr>) -> Self {
        Self {
            addr: addr.into(),
            ..Default::default()
        }
    }

    /// Set whether CORS should be permissive.
    pub fn cors(mut self, permissive: bool) -> Self {
        self.cors_permissive = permissive;
        self
    }

    /// Create from the shared bridge config.
    pub fn from_config(config: &BridgeConfig) -> Self {
        Self {
            addr: ([0, 0, 0, 0], config.http_port).into(),
            cors_permissive: config.cors_permissive,
        }
    }
}

/// Build the axum router with all routes.
pub fn build_router<B: Board + 'static>(
    bridge: Arc<Bridge<B>>,
    config: &WebServerConfig,
) -> Router {
    let mut router = Router::new()
        // Command surface
        .route("/command", post(post_command::<B>))
        // Convenience GET surface
        .route("/pinMode/:pin/:mode", get(get_pin_mode::<B>))
        .route("/digitalWrite/:pin/:output", get(get_digital_write::<B>))
        .route("/digitalRead/:pin", get(get_digital_read::<B>))
        .route("/digitalPins", get(get_digital_pins::<B>))
        .route("/digitalPins/:pin", get(get_digital_pin::<B>))
        // Socket channel
        .route("/socket", get(socket::upgrade_handler::<B>))
        // Fallback
        .fallback(not_found)
        .with_state(bridge);

    if config.cors_permissive {
        router = router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );
    }

    router
}

/// Start the web server.
///
/// Blocks until the server shuts down. The caller is responsible for
/// having spawned the bridge's event pump.
pub async fn run_server<B: Board + 'static>(
    bridge: Arc<Bridge<B>>,
    config: WebServerConfig,
) -> Result<(), std::io::Error> {
    let router = build_router(bridge, &config);
    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    info!(address = %listener.local_addr()?, "bridge listening");
    axum::serve(listener, router).await
}
