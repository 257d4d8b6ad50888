#![cfg_attr(not(test), no_std)]

// Shared crate for the moteOS time subsystem
// Value types that cross crate boundaries: timestamps, clock identifiers and
// the interrupted register state handed to tick callbacks.

pub mod clock;
pub mod registers;
pub mod time;

pub use clock::{ClockId, TimePrecision};
pub use registers::RegisterState;
pub use time::{Timespec, Timeval, NANOS_PER_SECOND};
