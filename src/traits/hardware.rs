//! Hardware abstraction for the attached microcontroller board.
//!
//! This module defines the minimal board capability the bridge needs:
//! the live pin table, mode/write/read primitives, and a change-event
//! source for pins under reporting.
//!
//! # Key Types
//!
//! | Type | Purpose |
//! |------|---------|
//! | [`Board`] | Capability trait over the physical controller |
//! | [`PinMode`] | Firmata-style pin operating mode |
//! | [`PinState`] | Live per-pin state (modes, value, report flag) |
//! | [`PinEvent`] | Value report pushed by the board |
//!
//! # Implementation
//!
//! For testing and desktop development, use [`MockBoard`].
//! A serial firmata backend can implement the same trait without the
//! rest of the crate changing.
//!
//! [`MockBoard`]: crate::hal::MockBoard

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::broadcast;

/// Operating mode of a pin.
///
/// The numeric values follow the firmata convention so actions carrying
/// raw mode numbers map directly onto the wire protocol.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PinMode(pub u8);

impl PinMode {
    /// Digital input.
    pub const INPUT: PinMode = PinMode(0);
    /// Digital output.
    pub const OUTPUT: PinMode = PinMode(1);
    /// Analog input.
    pub const ANALOG: PinMode = PinMode(2);
    /// PWM output.
    pub const PWM: PinMode = PinMode(3);
    /// Servo control.
    pub const SERVO: PinMode = PinMode(4);
    /// Shift register interface.
    pub const SHIFT: PinMode = PinMode(5);
    /// I2C bus member.
    pub const I2C: PinMode = PinMode(6);
    /// OneWire bus member.
    pub const ONEWIRE: PinMode = PinMode(7);
    /// Stepper motor control.
    pub const STEPPER: PinMode = PinMode(8);
    /// Serial passthrough.
    pub const SERIAL: PinMode = PinMode(10);
    /// Digital input with internal pull-up.
    pub const PULLUP: PinMode = PinMode(11);
    /// Mode not yet reported by the firmware.
    pub const UNKNOWN: PinMode = PinMode(16);
    /// Pin ignored by the firmware.
    pub const IGNORE: PinMode = PinMode(127);
}

/// Live state of a single pin as tracked by the board.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PinState {
    /// Modes this pin supports.
    pub supported_modes: Vec<PinMode>,
    /// Current mode; unset until the first mode-set command.
    pub mode: Option<PinMode>,
    /// Current digital value.
    pub value: u8,
    /// Whether change-reporting is currently enabled for this pin.
    pub report: bool,
    /// Analog channel mapping, if any. Passthrough only; the bridge
    /// does not exercise analog I/O.
    pub analog_channel: Option<u8>,
}

impl PinState {
    /// A digital-only pin supporting the common input/output modes.
    pub fn digital() -> Self {
        Self {
            supported_modes: vec![PinMode::INPUT, PinMode::OUTPUT, PinMode::PULLUP],
            mode: None,
            value: 0,
            report: false,
            analog_channel: None,
        }
    }

    /// A pin with an explicit supported-mode set.
    pub fn with_modes(modes: &[PinMode]) -> Self {
        Self {
            supported_modes: modes.to_vec(),
            ..Self::digital()
        }
    }
}

/// A value report pushed by the board for one pin.
///
/// Fired whenever a pin under change-reporting changes, and once per
/// [`Board::read_once`] request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PinEvent {
    /// Pin the value belongs to.
    pub pin: usize,
    /// The reported digital value.
    pub value: u8,
}

/// Errors raised by board primitives.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BoardError {
    /// The pin index does not exist on this board.
    #[error("no such pin: {0}")]
    NoSuchPin(usize),
    /// The transport to the physical board failed.
    #[error("board transport failure: {0}")]
    Transport(String),
}

/// Board capability trait - abstracts the physical microcontroller.
///
/// The bridge validates every command against the live pin table exposed
/// here and mutates pins only through these primitives. Reads are
/// event-driven: [`read_once`](Board::read_once) and change-reporting
/// both surface values through the receiver returned by
/// [`events`](Board::events), never through a return value.
///
/// # Implementation Notes
///
/// - `pin()` must return `None` past the last pin rather than panic;
///   validation deliberately admits one index past the end (see
///   [`crate::validate::valid_pin`]) and relies on this.
/// - `read_once` must produce an event carrying the pin's current value
///   even when change-reporting is off for that pin.
pub trait Board: Send {
    /// Error type for board operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Logical low sentinel.
    const LOW: u8 = 0;
    /// Logical high sentinel.
    const HIGH: u8 = 1;

    /// Number of pins on the board.
    fn pin_count(&self) -> usize;

    /// Live state of one pin, or `None` if the index is out of range.
    fn pin(&self, pin: usize) -> Option<&PinState>;

    /// Set the operating mode of a pin.
    fn set_mode(&mut self, pin: usize, mode: PinMode) -> Result<(), Self::Error>;

    /// Write a digital value to a pin.
    fn write(&mut self, pin: usize, value: u8) -> Result<(), Self::Error>;

    /// Ask the board to report the pin's current value once.
    ///
    /// The value arrives as a [`PinEvent`], not as a return value.
    fn read_once(&mut self, pin: usize) -> Result<(), Self::Error>;

    /// Enable or disable change-reporting for a pin.
    fn set_reporting(&mut self, pin: usize, on: bool) -> Result<(), Self::Error>;

    /// Subscribe to the board's change-event stream.
    fn events(&self) -> broadcast::Receiver<PinEvent>;
}
