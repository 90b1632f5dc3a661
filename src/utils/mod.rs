//! Utility functions and helpers
//!
//! This module contains atomic file writes and timestamp helpers.

pub mod atomic;
pub mod time;

pub use atomic::{atomic_write, atomic_write_with_backup, read_optional};
pub use time::millis_since;
