//! Action message model and reply construction.
//!
//! Every command and reply crossing a transport is an [`Action`]: a typed
//! message in the Flux-Standard-Action shape with `type`, `payload`,
//! `meta` and `error` fields. Requests carry no `error`; replies derive
//! their `type` from the request by suffixing `_reply` or `_error`.
//!
//! The builders here produce well-formed requests for each command the
//! bridge understands, and [`make_reply`] implements the one reply rule
//! shared by every handler: merge the request payload/meta with whatever
//! the handler adds, stamp an ISO-8601 timestamp, and never mutate the
//! original request.
//!
//! # Example
//!
//! ```
//! use pin_bridge::action::{digital_write_action, make_reply, ReplyExtra};
//!
//! let request = digital_write_action(13, 1);
//! let reply = make_reply(&request, ReplyExtra::default());
//!
//! assert_eq!(reply.kind, "digitalWrite_reply");
//! assert_eq!(reply.payload, request.payload);
//! assert!(reply.meta.unwrap().contains_key("date"));
//! ```

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::traits::PinMode;

/// Open key/value mapping used for action payloads and metadata.
pub type Fields = Map<String, Value>;

// ============================================================================
// Error taxonomy
// ============================================================================

/// Closed set of command error codes, in wire order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum ErrorCode {
    /// The action `type` is not a recognized command.
    BadActionType = 1,
    /// The pin index is out of range for the board.
    BadPin = 2,
    /// The requested mode is not supported by the pin.
    BadMode = 3,
    /// The output value is not the board's LOW/HIGH sentinel.
    BadOutput = 4,
}

impl From<ErrorCode> for u8 {
    fn from(code: ErrorCode) -> u8 {
        code as u8
    }
}

impl TryFrom<u8> for ErrorCode {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, String> {
        match code {
            1 => Ok(ErrorCode::BadActionType),
            2 => Ok(ErrorCode::BadPin),
            3 => Ok(ErrorCode::BadMode),
            4 => Ok(ErrorCode::BadOutput),
            other => Err(format!("unknown error code {other}")),
        }
    }
}

/// Error attached to an error-reply action.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActionError {
    /// Numeric error code from the closed taxonomy.
    pub code: ErrorCode,
    /// Human-readable message.
    pub msg: String,
}

// ============================================================================
// Action
// ============================================================================

/// A command, reply or error-reply message.
///
/// `payload` and `meta` are open mappings rather than typed structs:
/// reply construction is a superset merge over whatever shape the client
/// sent, and unrecognized commands must be echoed back verbatim.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Action {
    /// Command tag (`pinMode`, `digitalWrite`, ...) or, for replies, the
    /// request tag suffixed with `_reply`/`_error`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Command parameters; shape depends on `kind`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Fields>,
    /// Side-channel metadata. Replies always carry a `date` entry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Fields>,
    /// Present on error replies only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ActionError>,
}

impl Action {
    /// Build a request with the given payload and no meta or error.
    pub fn request(kind: impl Into<String>, payload: Fields) -> Self {
        Self {
            kind: kind.into(),
            payload: Some(payload),
            meta: None,
            error: None,
        }
    }

    /// The `pin` payload field, if present and integral.
    pub fn pin(&self) -> Option<i64> {
        self.payload_i64("pin")
    }

    /// The `mode` payload field, if present and integral.
    pub fn mode(&self) -> Option<i64> {
        self.payload_i64("mode")
    }

    /// The `output` payload field, if present and integral.
    pub fn output(&self) -> Option<i64> {
        self.payload_i64("output")
    }

    fn payload_i64(&self, key: &str) -> Option<i64> {
        self.payload.as_ref()?.get(key)?.as_i64()
    }

    /// Echo this action with an error attached and the `type` unchanged.
    ///
    /// This is the unknown-command form: unlike [`make_reply`], the tag is
    /// not suffixed, so the client sees its own invalid `type` verbatim.
    pub fn with_error(mut self, code: ErrorCode, msg: impl Into<String>) -> Self {
        self.error = Some(ActionError {
            code,
            msg: msg.into(),
        });
        self
    }
}

// ============================================================================
// Request builders
// ============================================================================

fn pin_payload(pin: i64) -> Fields {
    let mut payload = Fields::new();
    payload.insert("pin".into(), Value::from(pin));
    payload
}

/// Build a `pinMode` request.
pub fn pin_mode_action(pin: i64, mode: PinMode) -> Action {
    let mut payload = pin_payload(pin);
    payload.insert("mode".into(), Value::from(mode.0));
    Action::request("pinMode", payload)
}

/// Build a `digitalWrite` request.
pub fn digital_write_action(pin: i64, output: i64) -> Action {
    let mut payload = pin_payload(pin);
    payload.insert("output".into(), Value::from(output));
    Action::request("digitalWrite", payload)
}

/// Build a `digitalRead` request.
pub fn digital_read_action(pin: i64) -> Action {
    Action::request("digitalRead", pin_payload(pin))
}

/// Build a `digitalReadSubscribe` request.
pub fn digital_read_subscribe_action(pin: i64) -> Action {
    Action::request("digitalReadSubscribe", pin_payload(pin))
}

/// Build a `digitalReadUnsubscribe` request.
pub fn digital_read_unsubscribe_action(pin: i64) -> Action {
    Action::request("digitalReadUnsubscribe", pin_payload(pin))
}

// ============================================================================
// Reply construction
// ============================================================================

/// Extra fields a handler layers onto a reply.
#[derive(Clone, Debug, Default)]
pub struct ReplyExtra {
    /// Payload entries merged over the request payload (new keys win).
    pub payload: Option<Fields>,
    /// Meta entries merged over the request meta.
    pub meta: Option<Fields>,
    /// Error, turning the reply into an error-reply.
    pub error: Option<ActionError>,
}

impl ReplyExtra {
    /// Extra carrying only an error.
    pub fn error(code: ErrorCode, msg: impl Into<String>) -> Self {
        Self {
            error: Some(ActionError {
                code,
                msg: msg.into(),
            }),
            ..Self::default()
        }
    }

    /// Extra carrying a single payload field.
    pub fn payload_field(key: &str, value: impl Into<Value>) -> Self {
        let mut payload = Fields::new();
        payload.insert(key.into(), value.into());
        Self {
            payload: Some(payload),
            ..Self::default()
        }
    }

    /// Extra carrying a single meta field.
    pub fn meta_field(key: &str, value: impl Into<Value>) -> Self {
        let mut meta = Fields::new();
        meta.insert(key.into(), value.into());
        Self {
            meta: Some(meta),
            ..Self::default()
        }
    }
}

/// Current timestamp in the ISO-8601 form stamped onto replies.
pub fn iso_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Derive a reply (or error-reply) action from a request.
///
/// `type` becomes `<request type>_error` when `extra.error` is set and
/// `<request type>_reply` otherwise. The reply payload is the request
/// payload with `extra.payload` merged on top (extra keys win, request
/// keys survive); when `extra.payload` is absent the request payload is
/// carried over untouched. Meta is merged the same way and always gains
/// a `date` timestamp. The request itself is never mutated.
pub fn make_reply(request: &Action, extra: ReplyExtra) -> Action {
    let suffix = if extra.error.is_some() {
        "_error"
    } else {
        "_reply"
    };

    let payload = match extra.payload {
        Some(added) => {
            let mut merged = request.payload.clone().unwrap_or_default();
            for (key, value) in added {
                merged.insert(key, value);
            }
            Some(merged)
        }
        None => request.payload.clone(),
    };

    let mut meta = request.meta.clone().unwrap_or_default();
    if let Some(added) = extra.meta {
        for (key, value) in added {
            meta.insert(key, value);
        }
    }
    meta.insert("date".into(), Value::String(iso_now()));

    Action {
        kind: format!("{}{}", request.kind, suffix),
        payload,
        meta: Some(meta),
        error: extra.error,
    }
}

/// Shorthand for an error reply with no extra payload.
pub fn error_reply(request: &Action, code: ErrorCode, msg: impl Into<String>) -> Action {
    make_reply(request, ReplyExtra::error(code, msg))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // =========================================================================
    // Builders
    // =========================================================================

    #[test]
    fn pin_mode_action_shape() {
        let action = pin_mode_action(13, PinMode::OUTPUT);
        assert_eq!(action.kind, "pinMode");
        assert_eq!(action.pin(), Some(13));
        assert_eq!(action.mode(), Some(1));
        assert!(action.meta.is_none());
        assert!(action.error.is_none());
    }

    #[test]
    fn digital_write_action_shape() {
        let action = digital_write_action(13, 1);
        assert_eq!(action.kind, "digitalWrite");
        assert_eq!(action.pin(), Some(13));
        assert_eq!(action.output(), Some(1));
    }

    #[test]
    fn digital_read_action_shape() {
        let action = digital_read_action(2);
        assert_eq!(action.kind, "digitalRead");
        assert_eq!(action.pin(), Some(2));
        assert_eq!(action.mode(), None);
    }

    #[test]
    fn subscribe_builders_shape() {
        assert_eq!(digital_read_subscribe_action(2).kind, "digitalReadSubscribe");
        assert_eq!(
            digital_read_unsubscribe_action(2).kind,
            "digitalReadUnsubscribe"
        );
    }

    // =========================================================================
    // Field extraction
    // =========================================================================

    #[test]
    fn missing_payload_fields_are_none() {
        let action = Action {
            kind: "digitalRead".into(),
            payload: None,
            meta: None,
            error: None,
        };
        assert_eq!(action.pin(), None);
    }

    #[test]
    fn non_integer_pin_is_none() {
        let action: Action =
            serde_json::from_value(json!({"type": "digitalRead", "payload": {"pin": 1.5}}))
                .unwrap();
        assert_eq!(action.pin(), None);
    }

    // =========================================================================
    // make_reply
    // =========================================================================

    #[test]
    fn plain_reply_suffix_and_payload() {
        let request = pin_mode_action(13, PinMode::OUTPUT);
        let reply = make_reply(&request, ReplyExtra::default());

        assert_eq!(reply.kind, "pinMode_reply");
        assert_eq!(reply.payload, request.payload);
        assert!(reply.error.is_none());
        assert!(reply.meta.unwrap().contains_key("date"));
    }

    #[test]
    fn error_reply_suffix() {
        let request = pin_mode_action(999, PinMode::OUTPUT);
        let reply = error_reply(&request, ErrorCode::BadPin, "Invalid pin");

        assert_eq!(reply.kind, "pinMode_error");
        let err = reply.error.unwrap();
        assert_eq!(err.code, ErrorCode::BadPin);
        assert_eq!(err.msg, "Invalid pin");
        // Payload is still a superset of the request payload.
        assert_eq!(reply.payload, request.payload);
    }

    #[test]
    fn payload_merge_keeps_request_fields() {
        let request = digital_read_action(2);
        let reply = make_reply(&request, ReplyExtra::payload_field("value", 1));

        let payload = reply.payload.unwrap();
        assert_eq!(payload.get("pin"), Some(&json!(2)));
        assert_eq!(payload.get("value"), Some(&json!(1)));
    }

    #[test]
    fn payload_merge_extra_wins_on_conflict() {
        let request = digital_read_action(2);
        let reply = make_reply(&request, ReplyExtra::payload_field("pin", 7));

        assert_eq!(reply.payload.unwrap().get("pin"), Some(&json!(7)));
        // Original request untouched.
        assert_eq!(request.pin(), Some(2));
    }

    #[test]
    fn meta_merge_preserves_request_meta() {
        let mut request = digital_read_action(2);
        let mut meta = Fields::new();
        meta.insert("tag".into(), json!("abc"));
        request.meta = Some(meta);

        let reply = make_reply(&request, ReplyExtra::meta_field("alreadySubscribed", true));
        let meta = reply.meta.unwrap();
        assert_eq!(meta.get("tag"), Some(&json!("abc")));
        assert_eq!(meta.get("alreadySubscribed"), Some(&json!(true)));
        assert!(meta.contains_key("date"));
    }

    #[test]
    fn absent_request_payload_stays_absent() {
        let request = Action {
            kind: "digitalRead".into(),
            payload: None,
            meta: None,
            error: None,
        };
        let reply = make_reply(&request, ReplyExtra::default());
        assert!(reply.payload.is_none());
    }

    #[test]
    fn date_is_iso8601() {
        let stamp = iso_now();
        assert!(stamp.ends_with('Z'));
        assert!(chrono::DateTime::parse_from_rfc3339(&stamp).is_ok());
    }

    // =========================================================================
    // Serde
    // =========================================================================

    #[test]
    fn action_round_trips_type_field() {
        let action = pin_mode_action(13, PinMode::OUTPUT);
        let json = serde_json::to_value(&action).unwrap();
        assert_eq!(json["type"], "pinMode");
        assert_eq!(json["payload"]["pin"], 13);

        let back: Action = serde_json::from_value(json).unwrap();
        assert_eq!(back, action);
    }

    #[test]
    fn empty_payload_round_trips_as_empty_object() {
        let action: Action =
            serde_json::from_str(r#"{"type": "nonsense", "payload": {}}"#).unwrap();
        assert_eq!(action.payload, Some(Fields::new()));

        let json = serde_json::to_value(&action).unwrap();
        assert_eq!(json["payload"], json!({}));
    }

    #[test]
    fn absent_fields_are_omitted() {
        let action = Action {
            kind: "digitalRead".into(),
            payload: None,
            meta: None,
            error: None,
        };
        let json = serde_json::to_string(&action).unwrap();
        assert!(!json.contains("payload"));
        assert!(!json.contains("meta"));
        assert!(!json.contains("error"));
    }

    #[test]
    fn error_code_serializes_as_number() {
        let err = ActionError {
            code: ErrorCode::BadActionType,
            msg: "Invalid command".into(),
        };
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["code"], 1);

        let back: ActionError = serde_json::from_value(json).unwrap();
        assert_eq!(back.code, ErrorCode::BadActionType);
    }

    #[test]
    fn unknown_error_code_is_rejected() {
        let result: Result<ErrorCode, _> = serde_json::from_str("9");
        assert!(result.is_err());
    }

    #[test]
    fn with_error_keeps_type_verbatim() {
        let action: Action =
            serde_json::from_str(r#"{"type": "nonsense", "payload": {}}"#).unwrap();
        let echoed = action.clone().with_error(ErrorCode::BadActionType, "Invalid command");

        assert_eq!(echoed.kind, "nonsense");
        assert_eq!(echoed.payload, action.payload);
        assert_eq!(echoed.error.unwrap().code, ErrorCode::BadActionType);
    }
}
