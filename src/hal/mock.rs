//! Mock board for testing without hardware.
//!
//! `MockBoard` implements the full [`Board`] capability in memory,
//! recording every reporting transition so tests can assert the
//! enable-exactly-once invariants of the subscription registry.
//!
//! # Example
//!
//! ```rust
//! use pin_bridge::hal::MockBoard;
//! use pin_bridge::traits::{Board, PinMode};
//!
//! let mut board = MockBoard::new();
//! board.set_mode(13, PinMode::OUTPUT).unwrap();
//! board.write(13, 1).unwrap();
//!
//! assert_eq!(board.pin(13).unwrap().mode, Some(PinMode::OUTPUT));
//! assert_eq!(board.pin(13).unwrap().value, 1);
//! ```

use tokio::sync::broadcast;

use crate::traits::{Board, BoardError, PinEvent, PinMode, PinState};

const EVENT_CAPACITY: usize = 64;

/// In-memory board with an Uno-like default pin layout.
///
/// Behavior mirrors a firmata-driven controller where it matters to the
/// bridge:
///
/// - [`read_once`](Board::read_once) always emits the pin's current value
///   as a [`PinEvent`], reporting flag or not.
/// - Enabling change-reporting emits the current value immediately, so a
///   fresh subscriber gets an initial reading before any change.
/// - [`simulate_change`](MockBoard::simulate_change) flips a pin from the
///   outside and reports it only while reporting is on, like a real input
///   pin would.
#[derive(Debug)]
pub struct MockBoard {
    pins: Vec<PinState>,
    events: broadcast::Sender<PinEvent>,
    /// Every `set_reporting` call in order (pin, on).
    pub reporting_calls: Vec<(usize, bool)>,
    /// Number of `read_once` calls.
    pub read_once_count: usize,
}

impl MockBoard {
    /// An Uno-like board: 14 digital pins plus 6 analog-capable pins.
    pub fn new() -> Self {
        let mut pins: Vec<PinState> = (0..14).map(|_| PinState::digital()).collect();
        for channel in 0..6 {
            let mut pin = PinState::with_modes(&[
                PinMode::INPUT,
                PinMode::OUTPUT,
                PinMode::PULLUP,
                PinMode::ANALOG,
            ]);
            pin.analog_channel = Some(channel);
            pins.push(pin);
        }
        Self::with_pins(pins)
    }

    /// A board with `count` plain digital pins.
    pub fn with_pin_count(count: usize) -> Self {
        Self::with_pins((0..count).map(|_| PinState::digital()).collect())
    }

    /// A board with an explicit pin table.
    pub fn with_pins(pins: Vec<PinState>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            pins,
            events,
            reporting_calls: Vec::new(),
            read_once_count: 0,
        }
    }

    /// Number of times reporting was enabled for a pin.
    pub fn reporting_enables(&self, pin: usize) -> usize {
        self.reporting_calls
            .iter()
            .filter(|(p, on)| *p == pin && *on)
            .count()
    }

    /// Number of times reporting was disabled for a pin.
    pub fn reporting_disables(&self, pin: usize) -> usize {
        self.reporting_calls
            .iter()
            .filter(|(p, on)| *p == pin && !*on)
            .count()
    }

    /// Change a pin's value from the outside, as the attached circuit
    /// would. The change is reported only while reporting is on.
    pub fn simulate_change(&mut self, pin: usize, value: u8) {
        if let Some(state) = self.pins.get_mut(pin) {
            state.value = value;
            if state.report {
                let _ = self.events.send(PinEvent { pin, value });
            }
        }
    }

    fn state_mut(&mut self, pin: usize) -> Result<&mut PinState, BoardError> {
        self.pins.get_mut(pin).ok_or(BoardError::NoSuchPin(pin))
    }
}

impl Default for MockBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl Board for MockBoard {
    type Error = BoardError;

    fn pin_count(&self) -> usize {
        self.pins.len()
    }

    fn pin(&self, pin: usize) -> Option<&PinState> {
        self.pins.get(pin)
    }

    fn set_mode(&mut self, pin: usize, mode: PinMode) -> Result<(), BoardError> {
        self.state_mut(pin)?.mode = Some(mode);
        Ok(())
    }

    fn write(&mut self, pin: usize, value: u8) -> Result<(), BoardError> {
        let state = self.state_mut(pin)?;
        state.value = value;
        let report = state.report;
        if report {
            let _ = self.events.send(PinEvent { pin, value });
        }
        Ok(())
    }

    fn read_once(&mut self, pin: usize) -> Result<(), BoardError> {
        self.read_once_count += 1;
        let value = self.state_mut(pin)?.value;
        let _ = self.events.send(PinEvent { pin, value });
        Ok(())
    }

    fn set_reporting(&mut self, pin: usize, on: bool) -> Result<(), BoardError> {
        self.reporting_calls.push((pin, on));
        let state = self.state_mut(pin)?;
        state.report = on;
        let value = state.value;
        if on {
            // A freshly reported pin sends its current value right away.
            let _ = self.events.send(PinEvent { pin, value });
        }
        Ok(())
    }

    fn events(&self) -> broadcast::Receiver<PinEvent> {
        self.events.subscribe()
    }
}
