//! Shared bridge context tying the board to the subscription registry.
//!
//! `Bridge` is the one explicitly-constructed context passed into the
//! command handlers and transports; there are no module-level board or
//! registry singletons, so tests can run any number of independent
//! bridges. A single mutex serializes every board and registry mutation,
//! which is what gives the command handlers their event-loop semantics:
//! no two commands interleave inside a board call, and registry
//! transitions are applied in arrival order.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use pin_bridge::bridge::Bridge;
//! use pin_bridge::hal::MockBoard;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let bridge = Arc::new(Bridge::new(MockBoard::new()));
//! bridge.spawn_event_pump();
//!
//! let count = bridge.with_board(|board| {
//!     use pin_bridge::traits::Board;
//!     board.pin_count()
//! });
//! assert_eq!(count, 20);
//! # }
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tokio::sync::{broadcast, oneshot};
use tracing::{debug, warn};

use crate::registry::{
    Listener, ListenerId, SubscribeOutcome, SubscriptionRegistry, UnsubscribeOutcome,
};
use crate::traits::{Board, PinEvent};

/// Why a one-shot read could not complete.
#[derive(Debug, Error)]
pub enum ReadError<E> {
    /// The board rejected the read request.
    #[error("board rejected read: {0}")]
    Board(#[source] E),
    /// The bridge shut down while the read was pending.
    #[error("bridge closed while read was pending")]
    Closed,
}

struct Inner<B: Board> {
    board: B,
    registry: SubscriptionRegistry,
}

/// Shared context over one board and its subscription registry.
///
/// All mutation goes through the internal mutex via the closure accessors,
/// mirroring the single-threaded event-loop model: the lock is never held
/// across an await point.
pub struct Bridge<B: Board> {
    inner: Mutex<Inner<B>>,
    next_listener: AtomicU64,
}

impl<B: Board> Bridge<B> {
    /// Wrap a board in a fresh bridge context with an empty registry.
    pub fn new(board: B) -> Self {
        Self {
            inner: Mutex::new(Inner {
                board,
                registry: SubscriptionRegistry::new(),
            }),
            next_listener: AtomicU64::new(1),
        }
    }

    /// Allocate an identity for a new transport connection.
    pub fn next_listener_id(&self) -> ListenerId {
        ListenerId(self.next_listener.fetch_add(1, Ordering::Relaxed))
    }

    /// Access the board under the bridge lock.
    ///
    /// The closure pattern keeps the lock from being held across awaits.
    pub fn with_board<R>(&self, f: impl FnOnce(&mut B) -> R) -> R {
        let mut inner = self.inner.lock().unwrap();
        f(&mut inner.board)
    }

    /// Number of active subscribers on a pin.
    pub fn subscriber_count(&self, pin: usize) -> usize {
        self.inner.lock().unwrap().registry.listener_count(pin)
    }

    /// Whether the id currently holds a subscription on the pin.
    pub fn is_subscribed(&self, pin: usize, id: ListenerId) -> bool {
        self.inner.lock().unwrap().registry.is_subscribed(pin, id)
    }

    /// Register a listener on a pin, enabling hardware change-reporting
    /// on the pin's 0-to-1 listener transition.
    pub fn subscribe(&self, pin: usize, listener: Listener) -> Result<SubscribeOutcome, B::Error> {
        let mut inner = self.inner.lock().unwrap();
        let id = listener.id;
        let outcome = inner.registry.subscribe(pin, listener);
        if let SubscribeOutcome::Added { first: true } = outcome {
            if let Err(err) = inner.board.set_reporting(pin, true) {
                // Roll back so a failed enable leaves the pin unsubscribed.
                inner.registry.unsubscribe(pin, id);
                return Err(err);
            }
        }
        Ok(outcome)
    }

    /// Remove a listener from a pin, disabling hardware change-reporting
    /// on the 1-to-0 listener transition.
    pub fn unsubscribe(&self, pin: usize, id: ListenerId) -> Result<UnsubscribeOutcome, B::Error> {
        let mut inner = self.inner.lock().unwrap();
        let outcome = inner.registry.unsubscribe(pin, id);
        if outcome.last {
            inner.board.set_reporting(pin, false)?;
        }
        Ok(outcome)
    }

    /// Drop every subscription held by a connection that went away,
    /// releasing reporting on pins left without listeners.
    pub fn drop_listener(&self, id: ListenerId) {
        let mut inner = self.inner.lock().unwrap();
        for pin in inner.registry.remove_listener(id) {
            if let Err(err) = inner.board.set_reporting(pin, false) {
                warn!(pin, error = %err, "failed to release reporting for dropped listener");
            }
        }
    }

    /// One-shot read: ask the board for the pin's current value and wait
    /// for the first report that follows.
    ///
    /// Other commands are free to run while the read is pending. There is
    /// no timeout: a pin that never reports leaves the future pending.
    pub async fn read_pin(&self, pin: usize) -> Result<u8, ReadError<B::Error>> {
        let rx = {
            let mut inner = self.inner.lock().unwrap();
            let (tx, rx) = oneshot::channel();
            inner.registry.add_pending(pin, tx);
            if let Err(err) = inner.board.read_once(pin) {
                // Drop the waiter we just queued; the read never started.
                inner.registry.pop_pending(pin);
                return Err(ReadError::Board(err));
            }
            rx
        };
        rx.await.map_err(|_| ReadError::Closed)
    }

    /// Apply one board event to the registry.
    ///
    /// Resolves pending one-shot reads, fans the value out to
    /// subscribers, and releases change-reporting when a one-shot read
    /// completed on a pin with no remaining subscription. Events are
    /// handled strictly in order, so an unsubscribe applied between two
    /// events is honored before the second is delivered.
    pub fn handle_event(&self, event: PinEvent) {
        let mut inner = self.inner.lock().unwrap();
        let delivery = inner.registry.deliver(event);
        debug!(
            pin = event.pin,
            value = event.value,
            resolved = delivery.resolved_reads,
            notified = delivery.notified,
            "pin event delivered"
        );
        if (delivery.resolved_reads > 0 || delivery.dropped > 0)
            && inner.registry.listener_count(event.pin) == 0
        {
            if let Err(err) = inner.board.set_reporting(event.pin, false) {
                warn!(pin = event.pin, error = %err, "failed to release reporting");
            }
        }
    }
}

impl<B: Board + 'static> Bridge<B> {
    /// Spawn the event pump: a task draining the board's change-event
    /// stream into [`handle_event`](Self::handle_event).
    ///
    /// The pump must be running for one-shot reads and subscriptions to
    /// make progress. It exits when the board's event channel closes.
    pub fn spawn_event_pump(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let bridge = Arc::clone(self);
        let mut events = bridge.with_board(|board| board.events());
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => bridge.handle_event(event),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "event pump lagged; pin reports dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }
}
