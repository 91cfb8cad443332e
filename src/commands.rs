//! Command handlers and the transport-agnostic dispatcher.
//!
//! One handler per command kind. Every handler takes the shared
//! [`Bridge`] context plus the request action and returns a reply
//! action; validation failures come back as error replies, never as
//! `Err` - no failure crosses into a transport as anything but a
//! well-formed action.
//!
//! The dispatcher is shared by every transport: HTTP POST bodies, GET
//! path parameters assembled into actions, and socket frames all go
//! through the same tables. Transports with a persistent connection use
//! [`dispatch_with_listener`], which adds the two subscription commands
//! on top of the plain command table.

use tracing::debug;

use crate::action::{error_reply, make_reply, Action, ErrorCode, ReplyExtra};
use crate::bridge::Bridge;
use crate::registry::{Listener, SubscribeOutcome};
use crate::traits::{Board, PinMode};
use crate::validate::{valid_mode, valid_output, valid_pin};

/// Extract the action's pin, or the BAD_PIN error reply if it fails
/// range validation.
fn checked_pin<B: Board>(bridge: &Bridge<B>, action: &Action) -> Result<usize, Action> {
    let pin = action.pin();
    if bridge.with_board(|board| valid_pin(board, pin)) {
        Ok(pin.unwrap_or_default() as usize)
    } else {
        Err(error_reply(action, ErrorCode::BadPin, "Invalid pin"))
    }
}

/// Set a pin's operating mode.
///
/// Checks pin range, then mode support, then instructs the board.
pub fn pin_mode<B: Board>(bridge: &Bridge<B>, action: &Action) -> Action {
    let pin = match checked_pin(bridge, action) {
        Ok(pin) => pin,
        Err(reply) => return reply,
    };

    let mode = action.mode();
    if !bridge.with_board(|board| valid_mode(board, pin, mode)) {
        return error_reply(action, ErrorCode::BadMode, "Invalid mode for pin");
    }
    let mode = PinMode(mode.unwrap_or_default() as u8);

    match bridge.with_board(|board| board.set_mode(pin, mode)) {
        Ok(()) => make_reply(action, ReplyExtra::default()),
        Err(_) => error_reply(action, ErrorCode::BadPin, "Invalid pin"),
    }
}

/// Write a digital value to a pin.
///
/// Checks pin range, then that the value is the LOW/HIGH sentinel.
pub fn digital_write<B: Board>(bridge: &Bridge<B>, action: &Action) -> Action {
    let pin = match checked_pin(bridge, action) {
        Ok(pin) => pin,
        Err(reply) => return reply,
    };

    let output = action.output();
    if !bridge.with_board(|board| valid_output(board, output)) {
        return error_reply(action, ErrorCode::BadOutput, "Invalid output for pin");
    }
    let value = output.unwrap_or_default() as u8;

    match bridge.with_board(|board| board.write(pin, value)) {
        Ok(()) => make_reply(action, ReplyExtra::default()),
        Err(_) => error_reply(action, ErrorCode::BadPin, "Invalid pin"),
    }
}

/// Read a pin's current value once.
///
/// The BAD_PIN error path returns without touching the board; the
/// success path waits for the board's next report of the pin and carries
/// the value in `payload.value`. Completing the read releases
/// change-reporting only when the pin has no active subscription.
pub async fn digital_read<B: Board>(bridge: &Bridge<B>, action: &Action) -> Action {
    let pin = match checked_pin(bridge, action) {
        Ok(pin) => pin,
        Err(reply) => return reply,
    };

    match bridge.read_pin(pin).await {
        Ok(value) => make_reply(action, ReplyExtra::payload_field("value", value)),
        Err(_) => error_reply(action, ErrorCode::BadPin, "Invalid pin"),
    }
}

/// Subscribe the listener to a pin's value reports.
///
/// The reply comes back immediately; readings arrive later through the
/// listener's queue, once per board-reported change. Subscribing an id
/// that is already on the pin changes nothing and is reported back via
/// `meta.alreadySubscribed`.
pub fn digital_read_subscribe<B: Board>(
    bridge: &Bridge<B>,
    action: &Action,
    listener: &Listener,
) -> Action {
    let pin = match checked_pin(bridge, action) {
        Ok(pin) => pin,
        Err(reply) => return reply,
    };

    match bridge.subscribe(pin, listener.clone()) {
        Ok(SubscribeOutcome::AlreadySubscribed) => {
            make_reply(action, ReplyExtra::meta_field("alreadySubscribed", true))
        }
        Ok(SubscribeOutcome::Added { .. }) => make_reply(action, ReplyExtra::default()),
        Err(_) => error_reply(action, ErrorCode::BadPin, "Invalid pin"),
    }
}

/// Remove the listener's subscription from a pin.
///
/// Unsubscribing a pin the listener never subscribed to is a no-op
/// reply, not an error, as long as the pin itself is valid.
pub fn digital_read_unsubscribe<B: Board>(
    bridge: &Bridge<B>,
    action: &Action,
    listener: &Listener,
) -> Action {
    let pin = match checked_pin(bridge, action) {
        Ok(pin) => pin,
        Err(reply) => return reply,
    };

    match bridge.unsubscribe(pin, listener.id) {
        Ok(_) => make_reply(action, ReplyExtra::default()),
        Err(_) => error_reply(action, ErrorCode::BadPin, "Invalid pin"),
    }
}

/// Dispatch a plain command (the table every transport shares).
///
/// Unknown types are echoed back with a BAD_ACTION_TYPE error and the
/// `type` left untouched - deliberately not the `_error` suffix form, so
/// the client sees its own invalid tag verbatim.
pub async fn dispatch<B: Board>(bridge: &Bridge<B>, action: Action) -> Action {
    debug!(kind = %action.kind, "dispatching command");
    match action.kind.as_str() {
        "pinMode" => pin_mode(bridge, &action),
        "digitalWrite" => digital_write(bridge, &action),
        "digitalRead" => digital_read(bridge, &action).await,
        _ => action.with_error(ErrorCode::BadActionType, "Invalid command"),
    }
}

/// Dispatch a command on behalf of a persistent connection.
///
/// Adds the subscription commands to the plain table; everything else
/// falls through to [`dispatch`]. Connectionless transports never see
/// the subscription commands as known types, matching their table.
pub async fn dispatch_with_listener<B: Board>(
    bridge: &Bridge<B>,
    action: Action,
    listener: &Listener,
) -> Action {
    match action.kind.as_str() {
        "digitalReadSubscribe" => digital_read_subscribe(bridge, &action, listener),
        "digitalReadUnsubscribe" => digital_read_unsubscribe(bridge, &action, listener),
        _ => dispatch(bridge, action).await,
    }
}
