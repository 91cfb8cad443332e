//! Bridge configuration.
//!
//! Builder-style config with environment-variable loading. Defaults
//! match the long-standing bridge conventions: port 8000, board on
//! `/dev/ttyACM0`.
//!
//! # Example
//!
//! ```rust
//! use pin_bridge::config::BridgeConfig;
//!
//! let config = BridgeConfig::default()
//!     .with_http_port(3000)
//!     .with_usb_path("/dev/ttyUSB0");
//!
//! assert_eq!(config.http_port, 3000);
//! ```

use serde::{Deserialize, Serialize};

/// Environment variable naming the HTTP port.
pub const HTTP_PORT_VAR: &str = "HTTP_PORT";
/// Environment variable naming the board's serial device.
pub const USB_PATH_VAR: &str = "USB_PATH";

/// Complete bridge configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Port the HTTP/WebSocket server listens on.
    pub http_port: u16,
    /// Serial device the board is attached to.
    pub usb_path: String,
    /// Whether to allow CORS from any origin.
    pub cors_permissive: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            http_port: 8000,
            usb_path: "/dev/ttyACM0".into(),
            cors_permissive: true,
        }
    }
}

impl BridgeConfig {
    /// Defaults overridden by `HTTP_PORT` and `USB_PATH` environment
    /// variables where present. Unparseable ports fall back to the
    /// default.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(port) = std::env::var(HTTP_PORT_VAR) {
            if let Ok(port) = port.parse() {
                config.http_port = port;
            }
        }
        if let Ok(path) = std::env::var(USB_PATH_VAR) {
            config.usb_path = path;
        }
        config
    }

    /// Set the HTTP port.
    pub fn with_http_port(mut self, port: u16) -> Self {
        self.http_port = port;
        self
    }

    /// Set the serial device path.
    pub fn with_usb_path(mut self, path: impl Into<String>) -> Self {
        self.usb_path = path.into();
        self
    }

    /// Set CORS mode.
    pub fn with_cors(mut self, permissive: bool) -> Self {
        self.cors_permissive = permissive;
        self
    }
}
