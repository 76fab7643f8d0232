//! Timeout values for the blocking queue operations
//!
//! Two sentinels plus any finite duration, carried as a [`Duration`].

use core::time::Duration;

/// How long a blocking queue operation may suspend the caller.
///
/// A multi-byte transfer applies the same value to every byte-level
/// attempt, not to the transfer as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timeout {
    /// Do not suspend; report `Timeout` right away if the transfer cannot
    /// proceed.
    Immediate,
    /// Suspend for at most this long per attempt.
    Bounded(Duration),
    /// Suspend until woken, however long that takes.
    Infinite,
}

impl Timeout {
    /// Bounded timeout in microseconds.
    pub const fn micros(us: u64) -> Self {
        Timeout::Bounded(Duration::from_micros(us))
    }

    /// Bounded timeout in milliseconds.
    pub const fn millis(ms: u64) -> Self {
        Timeout::Bounded(Duration::from_millis(ms))
    }
}
