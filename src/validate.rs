//! Command validation against live board state.
//!
//! Pure functions with no side effects; each reads the board's current
//! pin table and nothing else. Handlers call these in a fixed order:
//! pin first, then mode or output, so that the mode check can assume the
//! pin check already passed.

use crate::traits::Board;

/// Whether `pin` names a pin on the board.
///
/// The upper bound is intentionally inclusive of the pin count, one past
/// the last real index. Existing clients depend on that boundary, so it
/// is kept for wire compatibility; [`valid_mode`] rejects the phantom
/// index because it has no supported modes.
///
/// A missing or non-integral pin field arrives as `None` and fails.
pub fn valid_pin<B: Board>(board: &B, pin: Option<i64>) -> bool {
    match pin {
        Some(pin) => pin >= 0 && pin <= board.pin_count() as i64,
        None => false,
    }
}

/// Whether `mode` is in the pin's supported-mode set.
///
/// Callers must have checked [`valid_pin`] first; an index with no pin
/// behind it (including the inclusive-bound phantom) is reported as
/// unsupported rather than panicking.
pub fn valid_mode<B: Board>(board: &B, pin: usize, mode: Option<i64>) -> bool {
    let Some(mode) = mode else {
        return false;
    };
    board
        .pin(pin)
        .is_some_and(|state| state.supported_modes.iter().any(|m| i64::from(m.0) == mode))
}

/// Whether `output` is exactly the board's LOW or HIGH sentinel.
pub fn valid_output<B: Board>(_board: &B, output: Option<i64>) -> bool {
    matches!(output, Some(v) if v == i64::from(B::LOW) || v == i64::from(B::HIGH))
}
