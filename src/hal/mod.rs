//! Concrete board backends.
//!
//! Only the in-memory [`MockBoard`] ships today; a serial firmata
//! backend would live here as another implementation of
//! [`crate::traits::Board`].

mod mock;

pub use mock::MockBoard;
