//! Per-pin subscription bookkeeping.
//!
//! The registry is the bridge-side table that decides when hardware
//! change-reporting is switched on and off. Each pin holds a list of
//! listeners (one per logical subscriber, identified by a
//! [`ListenerId`]) plus any pending one-shot reads. Reporting follows
//! the listener count: enabled exactly on the 0-to-1 transition,
//! disabled exactly on the 1-to-0 transition. Re-subscribing an id that
//! is already on the pin touches neither the table nor the hardware.
//!
//! The registry never talks to the board itself; it reports transitions
//! to the caller ([`crate::bridge::Bridge`]), which owns the board handle.

use std::collections::HashMap;

use tokio::sync::{mpsc, oneshot};

use crate::action::{digital_read_action, make_reply, Action, ReplyExtra};
use crate::traits::PinEvent;

/// Identity of a logical subscriber (one per transport connection).
///
/// Two subscriptions with the same id on the same pin are the same
/// subscription; the second is reported back as `alreadySubscribed`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

/// A registered subscriber: its identity plus the queue its out-of-band
/// replies are pushed into.
#[derive(Clone, Debug)]
pub struct Listener {
    /// Subscriber identity.
    pub id: ListenerId,
    /// Destination for asynchronous `digitalRead_reply` actions.
    pub tx: mpsc::UnboundedSender<Action>,
}

/// Result of a subscribe call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubscribeOutcome {
    /// The listener was added; `first` is true on the 0-to-1 transition,
    /// when the caller must enable hardware reporting.
    Added {
        /// Whether this was the pin's first listener.
        first: bool,
    },
    /// The same id was already registered on this pin; nothing changed.
    AlreadySubscribed,
}

/// Result of an unsubscribe call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UnsubscribeOutcome {
    /// Whether a registration was actually removed.
    pub removed: bool,
    /// True on the 1-to-0 transition, when the caller must disable
    /// hardware reporting.
    pub last: bool,
}

/// What a delivered board event did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Delivery {
    /// One-shot reads resolved by this event.
    pub resolved_reads: usize,
    /// Subscribers the value was forwarded to.
    pub notified: usize,
    /// Subscribers pruned because their reply queue was closed.
    pub dropped: usize,
}

/// Per-pin listener table with pending one-shot reads.
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    listeners: HashMap<usize, Vec<Listener>>,
    pending: HashMap<usize, Vec<oneshot::Sender<u8>>>,
}

impl SubscriptionRegistry {
    /// Create an empty registry; every pin starts unsubscribed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of active listeners on a pin.
    pub fn listener_count(&self, pin: usize) -> usize {
        self.listeners.get(&pin).map_or(0, Vec::len)
    }

    /// Whether the given id is registered on the pin.
    pub fn is_subscribed(&self, pin: usize, id: ListenerId) -> bool {
        self.listeners
            .get(&pin)
            .is_some_and(|list| list.iter().any(|l| l.id == id))
    }

    /// Register a listener on a pin.
    pub fn subscribe(&mut self, pin: usize, listener: Listener) -> SubscribeOutcome {
        let list = self.listeners.entry(pin).or_default();
        if list.iter().any(|l| l.id == listener.id) {
            return SubscribeOutcome::AlreadySubscribed;
        }
        list.push(listener);
        SubscribeOutcome::Added {
            first: list.len() == 1,
        }
    }

    /// Remove a listener from a pin.
    ///
    /// Removing an id that is not registered is a no-op, not an error.
    pub fn unsubscribe(&mut self, pin: usize, id: ListenerId) -> UnsubscribeOutcome {
        let Some(list) = self.listeners.get_mut(&pin) else {
            return UnsubscribeOutcome {
                removed: false,
                last: false,
            };
        };
        let before = list.len();
        list.retain(|l| l.id != id);
        let removed = list.len() < before;
        let last = removed && list.is_empty();
        if list.is_empty() {
            self.listeners.remove(&pin);
        }
        UnsubscribeOutcome { removed, last }
    }

    /// Drop every registration held by `id`, across all pins.
    ///
    /// Returns the pins whose listener count reached zero, so the caller
    /// can disable reporting on them. Used when a connection goes away.
    pub fn remove_listener(&mut self, id: ListenerId) -> Vec<usize> {
        let mut emptied = Vec::new();
        self.listeners.retain(|&pin, list| {
            let before = list.len();
            list.retain(|l| l.id != id);
            if list.is_empty() && before > 0 {
                emptied.push(pin);
                false
            } else {
                true
            }
        });
        emptied
    }

    /// Queue a one-shot read waiting for the pin's next reported value.
    pub fn add_pending(&mut self, pin: usize, tx: oneshot::Sender<u8>) {
        self.pending.entry(pin).or_default().push(tx);
    }

    /// Number of one-shot reads pending on a pin.
    pub fn pending_count(&self, pin: usize) -> usize {
        self.pending.get(&pin).map_or(0, Vec::len)
    }

    /// Drop the most recently queued one-shot read for a pin.
    ///
    /// Used when the board rejects a read request after the waiter was
    /// queued, so the failed read does not linger.
    pub fn pop_pending(&mut self, pin: usize) {
        if let Some(waiters) = self.pending.get_mut(&pin) {
            waiters.pop();
            if waiters.is_empty() {
                self.pending.remove(&pin);
            }
        }
    }

    /// Apply one board event: resolve pending one-shot reads and forward
    /// the value to every subscriber of the pin.
    ///
    /// Subscribers whose reply queue is gone are pruned here; the caller
    /// checks [`listener_count`](Self::listener_count) afterwards to
    /// decide whether reporting should be released.
    pub fn deliver(&mut self, event: PinEvent) -> Delivery {
        let mut delivery = Delivery::default();

        if let Some(waiters) = self.pending.remove(&event.pin) {
            for waiter in waiters {
                // The reader may have gone away; resolution is best-effort.
                if waiter.send(event.value).is_ok() {
                    delivery.resolved_reads += 1;
                }
            }
        }

        if let Some(list) = self.listeners.get_mut(&event.pin) {
            let reply = subscription_reply(event);
            list.retain(|listener| {
                if listener.tx.send(reply.clone()).is_ok() {
                    delivery.notified += 1;
                    true
                } else {
                    delivery.dropped += 1;
                    false
                }
            });
            if list.is_empty() {
                self.listeners.remove(&event.pin);
            }
        }

        delivery
    }
}

/// The out-of-band reply pushed to subscribers on each reported change:
/// a `digitalRead_reply` carrying the pin and its new value.
fn subscription_reply(event: PinEvent) -> Action {
    make_reply(
        &digital_read_action(event.pin as i64),
        ReplyExtra::payload_field("value", event.value),
    )
}
