//! Integration tests for the command handlers and dispatcher running
//! against the mock board.

use std::sync::Arc;

use serde_json::json;
use tokio::sync::mpsc;

use pin_bridge::action::{
    digital_read_action, digital_read_subscribe_action, digital_read_unsubscribe_action,
    digital_write_action, pin_mode_action, Action,
};
use pin_bridge::commands::{dispatch, dispatch_with_listener};
use pin_bridge::{Board, Bridge, ErrorCode, Listener, MockBoard, PinMode};

const BAD_PIN: i64 = 999;

fn bridge() -> Arc<Bridge<MockBoard>> {
    let bridge = Arc::new(Bridge::new(MockBoard::new()));
    bridge.spawn_event_pump();
    bridge
}

fn listener(bridge: &Bridge<MockBoard>) -> (Listener, mpsc::UnboundedReceiver<Action>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        Listener {
            id: bridge.next_listener_id(),
            tx,
        },
        rx,
    )
}

// ============================================================================
// Scenario A: mode then write
// ============================================================================

#[tokio::test]
async fn scenario_set_mode_then_write_high() {
    let bridge = bridge();

    let reply = dispatch(&bridge, pin_mode_action(13, PinMode::OUTPUT)).await;
    assert_eq!(reply.kind, "pinMode_reply");
    assert_eq!(reply.pin(), Some(13));
    assert_eq!(reply.mode(), Some(1));
    assert!(reply.error.is_none());

    let reply = dispatch(&bridge, digital_write_action(13, 1)).await;
    assert_eq!(reply.kind, "digitalWrite_reply");
    assert_eq!(bridge.with_board(|b| b.pin(13).unwrap().value), 1);
}

#[tokio::test]
async fn mode_is_visible_after_pin_mode() {
    let bridge = bridge();
    assert!(bridge.with_board(|b| b.pin(2).unwrap().mode.is_none()));

    dispatch(&bridge, pin_mode_action(2, PinMode::PULLUP)).await;
    assert_eq!(
        bridge.with_board(|b| b.pin(2).unwrap().mode),
        Some(PinMode::PULLUP)
    );
}

// ============================================================================
// Scenario B: bad pin on every command
// ============================================================================

#[tokio::test]
async fn scenario_bad_pin_everywhere() {
    let bridge = bridge();

    for action in [
        pin_mode_action(BAD_PIN, PinMode::OUTPUT),
        digital_write_action(BAD_PIN, 1),
        digital_read_action(BAD_PIN),
    ] {
        let kind = action.kind.clone();
        let reply = dispatch(&bridge, action).await;
        assert_eq!(reply.kind, format!("{kind}_error"));
        assert_eq!(reply.error.unwrap().code, ErrorCode::BadPin);
    }

    let (l, _rx) = listener(&bridge);
    for action in [
        digital_read_subscribe_action(BAD_PIN),
        digital_read_unsubscribe_action(BAD_PIN),
    ] {
        let kind = action.kind.clone();
        let reply = dispatch_with_listener(&bridge, action, &l).await;
        assert_eq!(reply.kind, format!("{kind}_error"));
        assert_eq!(reply.error.unwrap().code, ErrorCode::BadPin);
    }
}

#[tokio::test]
async fn negative_pin_is_bad_pin() {
    let bridge = bridge();
    let reply = dispatch(&bridge, digital_write_action(-1, 1)).await;
    assert_eq!(reply.error.unwrap().code, ErrorCode::BadPin);
}

// ============================================================================
// Mode and output validation
// ============================================================================

#[tokio::test]
async fn unsupported_mode_is_bad_mode() {
    let bridge = bridge();
    // Pin 13 has no analog channel, so ANALOG is unsupported.
    let reply = dispatch(&bridge, pin_mode_action(13, PinMode::ANALOG)).await;
    assert_eq!(reply.kind, "pinMode_error");
    assert_eq!(reply.error.unwrap().code, ErrorCode::BadMode);
}

#[tokio::test]
async fn out_of_range_output_is_bad_output() {
    let bridge = bridge();
    dispatch(&bridge, pin_mode_action(13, PinMode::OUTPUT)).await;

    for output in [2, -1, 999] {
        let reply = dispatch(&bridge, digital_write_action(13, output)).await;
        assert_eq!(reply.kind, "digitalWrite_error");
        assert_eq!(reply.error.unwrap().code, ErrorCode::BadOutput);
    }
}

#[tokio::test]
async fn sentinel_outputs_update_the_pin() {
    let bridge = bridge();
    dispatch(&bridge, pin_mode_action(13, PinMode::OUTPUT)).await;

    dispatch(&bridge, digital_write_action(13, 1)).await;
    assert_eq!(bridge.with_board(|b| b.pin(13).unwrap().value), 1);

    dispatch(&bridge, digital_write_action(13, 0)).await;
    assert_eq!(bridge.with_board(|b| b.pin(13).unwrap().value), 0);
}

// ============================================================================
// One-shot reads
// ============================================================================

#[tokio::test]
async fn read_returns_current_value() {
    let bridge = bridge();
    dispatch(&bridge, pin_mode_action(2, PinMode::PULLUP)).await;
    bridge.with_board(|b| b.simulate_change(2, 1));

    let reply = dispatch(&bridge, digital_read_action(2)).await;
    assert_eq!(reply.kind, "digitalRead_reply");
    let payload = reply.payload.unwrap();
    assert_eq!(payload.get("pin"), Some(&json!(2)));
    assert_eq!(payload.get("value"), Some(&json!(1)));
}

#[tokio::test]
async fn read_leaves_reporting_off_without_subscribers() {
    let bridge = bridge();
    dispatch(&bridge, digital_read_action(2)).await;
    assert!(!bridge.with_board(|b| b.pin(2).unwrap().report));
}

#[tokio::test]
async fn read_during_subscription_keeps_reporting_on() {
    let bridge = bridge();
    let (l, mut rx) = listener(&bridge);

    dispatch_with_listener(&bridge, digital_read_subscribe_action(2), &l).await;
    let reply = dispatch(&bridge, digital_read_action(2)).await;
    assert_eq!(reply.kind, "digitalRead_reply");

    // The concurrent subscriber's reporting state is untouched.
    assert!(bridge.with_board(|b| b.pin(2).unwrap().report));
    assert_eq!(bridge.subscriber_count(2), 1);

    // And the subscriber still receives readings afterwards.
    let _ = rx.recv().await.unwrap();
}

// ============================================================================
// Scenario C: subscription lifecycle
// ============================================================================

#[tokio::test]
async fn scenario_subscribe_report_unsubscribe() {
    let bridge = bridge();
    let (l, mut rx) = listener(&bridge);

    let reply = dispatch_with_listener(&bridge, digital_read_subscribe_action(2), &l).await;
    assert_eq!(reply.kind, "digitalReadSubscribe_reply");
    assert!(reply.meta.unwrap().get("alreadySubscribed").is_none());

    // Enabling reporting produces an initial reading for the subscriber.
    let initial = rx.recv().await.unwrap();
    assert_eq!(initial.kind, "digitalRead_reply");
    assert_eq!(initial.payload.as_ref().unwrap().get("value"), Some(&json!(0)));

    // The board reports HIGH; the subscriber sees it.
    bridge.with_board(|b| b.simulate_change(2, 1));
    let reading = rx.recv().await.unwrap();
    assert_eq!(reading.kind, "digitalRead_reply");
    assert_eq!(reading.payload.as_ref().unwrap().get("pin"), Some(&json!(2)));
    assert_eq!(
        reading.payload.as_ref().unwrap().get("value"),
        Some(&json!(1))
    );

    let reply = dispatch_with_listener(&bridge, digital_read_unsubscribe_action(2), &l).await;
    assert_eq!(reply.kind, "digitalReadUnsubscribe_reply");
    assert_eq!(bridge.subscriber_count(2), 0);
    assert!(!bridge.with_board(|b| b.pin(2).unwrap().report));
}

#[tokio::test]
async fn double_subscribe_is_idempotent() {
    let bridge = bridge();
    let (l, _rx) = listener(&bridge);

    dispatch_with_listener(&bridge, digital_read_subscribe_action(2), &l).await;
    let second = dispatch_with_listener(&bridge, digital_read_subscribe_action(2), &l).await;

    assert_eq!(second.kind, "digitalReadSubscribe_reply");
    assert_eq!(
        second.meta.unwrap().get("alreadySubscribed"),
        Some(&json!(true))
    );
    assert_eq!(bridge.subscriber_count(2), 1);
    assert_eq!(bridge.with_board(|b| b.reporting_enables(2)), 1);
}

#[tokio::test]
async fn two_listeners_share_one_hardware_registration() {
    let bridge = bridge();
    let (a, mut rxa) = listener(&bridge);
    let (b, mut rxb) = listener(&bridge);

    dispatch_with_listener(&bridge, digital_read_subscribe_action(2), &a).await;
    dispatch_with_listener(&bridge, digital_read_subscribe_action(2), &b).await;

    assert_eq!(bridge.subscriber_count(2), 2);
    assert_eq!(bridge.with_board(|b| b.reporting_enables(2)), 1);

    // Drain the initial reading the first enable produced.
    let _ = rxa.recv().await.unwrap();

    bridge.with_board(|b| b.simulate_change(2, 1));
    assert_eq!(rxa.recv().await.unwrap().pin(), Some(2));
    assert_eq!(rxb.recv().await.unwrap().pin(), Some(2));

    // Dropping one listener keeps reporting alive for the other.
    dispatch_with_listener(&bridge, digital_read_unsubscribe_action(2), &a).await;
    assert!(bridge.with_board(|b| b.pin(2).unwrap().report));

    // Dropping the last releases it.
    dispatch_with_listener(&bridge, digital_read_unsubscribe_action(2), &b).await;
    assert!(!bridge.with_board(|b| b.pin(2).unwrap().report));
    assert_eq!(bridge.with_board(|b| b.reporting_disables(2)), 1);
}

#[tokio::test]
async fn unsubscribe_when_never_subscribed_is_noop_reply() {
    let bridge = bridge();
    let (l, _rx) = listener(&bridge);

    let reply = dispatch_with_listener(&bridge, digital_read_unsubscribe_action(2), &l).await;
    assert_eq!(reply.kind, "digitalReadUnsubscribe_reply");
    assert!(reply.error.is_none());
    // No stray disable was issued.
    assert_eq!(bridge.with_board(|b| b.reporting_disables(2)), 0);
}

// ============================================================================
// Scenario D: unknown command
// ============================================================================

#[tokio::test]
async fn scenario_unknown_type_echoes_action() {
    let bridge = bridge();
    let action: Action = serde_json::from_value(json!({"type": "nonsense", "payload": {}}))
        .unwrap();

    let reply = dispatch(&bridge, action).await;
    let wire = serde_json::to_value(&reply).unwrap();
    assert_eq!(
        wire,
        json!({
            "type": "nonsense",
            "payload": {},
            "error": {"code": 1, "msg": "Invalid command"}
        })
    );
}

// ============================================================================
// Reply correlation
// ============================================================================

#[tokio::test]
async fn replies_preserve_client_meta() {
    let bridge = bridge();
    let mut action = pin_mode_action(13, PinMode::OUTPUT);
    let mut meta = serde_json::Map::new();
    meta.insert("requestId".into(), json!("abc-123"));
    action.meta = Some(meta);

    let reply = dispatch(&bridge, action).await;
    let meta = reply.meta.unwrap();
    assert_eq!(meta.get("requestId"), Some(&json!("abc-123")));
    assert!(meta.contains_key("date"));
}
