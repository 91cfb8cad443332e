//! Core traits and types for hardware abstraction.

mod hardware;

pub use hardware::{Board, BoardError, PinEvent, PinMode, PinState};
