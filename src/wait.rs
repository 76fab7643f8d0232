//! Wait queue: suspend/resume substrate for the blocking tier
//!
//! This is the narrow scheduler contract the queues consume: park the
//! calling thread with a timeout while releasing the queue lock, wake one
//! parked caller when a byte or slot becomes available, wake all of them
//! when the queue is reset. Here the substrate is `std` threads with a
//! condition variable; the queues never touch it beyond this interface.
//!
//! Bookkeeping ([`WaitList`]) lives inside the queue's own lock, so every
//! wake decision is made with the lock held and there is no window between
//! "checked the queue" and "went to sleep" for a wake to fall into.

use core::fmt;
use std::sync::{Condvar, LockResult, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use crate::time::Timeout;

/// Why a parked caller resumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeReason {
    /// A byte or slot was handed to this caller; re-check the queue.
    Proceed,
    /// The caller's timeout expired first.
    Timeout,
    /// The queue was reset while the caller was parked.
    Reset,
}

/// Why a blocking queue operation returned without transferring a byte.
///
/// These are ordinary control-flow outcomes, not faults: the caller
/// decides whether to retry, give up, or escalate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitError {
    /// The timeout expired before the transfer could proceed.
    Timeout,
    /// The queue was reset while waiting.
    Reset,
}

impl fmt::Display for WaitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WaitError::Timeout => f.write_str("timed out waiting on queue"),
            WaitError::Reset => f.write_str("queue was reset while waiting"),
        }
    }
}

impl std::error::Error for WaitError {}

/// Per-queue waiter bookkeeping, kept inside the queue lock.
#[derive(Debug, Default)]
pub struct WaitList {
    /// Callers currently suspended in [`WaitQueue::park`].
    parked: usize,
    /// `Proceed` wakes issued but not yet claimed by a parked caller.
    grants: usize,
    /// Bumped by every reset; parked callers compare against the value
    /// they captured when they went to sleep.
    reset_epoch: u64,
}

impl WaitList {
    /// Create an empty wait list.
    pub const fn new() -> Self {
        Self {
            parked: 0,
            grants: 0,
            reset_epoch: 0,
        }
    }

    /// Number of callers currently suspended.
    pub fn parked(&self) -> usize {
        self.parked
    }
}

/// Ordered collection of suspended callers, woken one at a time or all at
/// once.
///
/// Which parked thread claims a `Proceed` grant follows the platform's
/// condition-variable wake order; the queue layer treats all waiters as
/// equivalent, and a caller that claims a grant only to find the queue
/// drained simply parks again.
pub struct WaitQueue {
    cv: Condvar,
}

impl WaitQueue {
    /// Create an empty wait queue.
    pub const fn new() -> Self {
        Self { cv: Condvar::new() }
    }

    /// Suspend the current thread until woken or timed out.
    ///
    /// Must be called with the queue lock held; the lock is released for
    /// the duration of the suspension and re-held when this returns.
    /// `list` projects the [`WaitList`] out of the locked state.
    ///
    /// `Timeout::Immediate` returns [`WakeReason::Timeout`] without ever
    /// suspending.
    pub fn park<'a, T, F>(
        &self,
        mut guard: MutexGuard<'a, T>,
        mut list: F,
        timeout: Timeout,
    ) -> (MutexGuard<'a, T>, WakeReason)
    where
        F: FnMut(&mut T) -> &mut WaitList,
    {
        let deadline = match timeout {
            Timeout::Immediate => return (guard, WakeReason::Timeout),
            Timeout::Bounded(d) => Some(Instant::now() + d),
            Timeout::Infinite => None,
        };

        let epoch = {
            let wl = list(&mut *guard);
            wl.parked += 1;
            wl.reset_epoch
        };

        loop {
            let timed_out = match deadline {
                None => {
                    guard = relock(self.cv.wait(guard));
                    false
                }
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        true
                    } else {
                        let (g, result) =
                            relock(self.cv.wait_timeout(guard, deadline - now));
                        guard = g;
                        result.timed_out()
                    }
                }
            };

            // Reset trumps a pending grant: the data a grant promised is
            // gone. A timeout never trumps either.
            let reason = {
                let wl = list(&mut *guard);
                if wl.reset_epoch != epoch {
                    wl.parked -= 1;
                    // Grants issued after the reset were counted against a
                    // population that included this waiter. Clamp them to
                    // the survivors and hand the notification on, or a
                    // leftover grant blocks every future wake_one.
                    if wl.grants > wl.parked {
                        wl.grants = wl.parked;
                    }
                    if wl.grants > 0 {
                        self.cv.notify_one();
                    }
                    Some(WakeReason::Reset)
                } else if wl.grants > 0 {
                    wl.grants -= 1;
                    wl.parked -= 1;
                    Some(WakeReason::Proceed)
                } else if timed_out {
                    wl.parked -= 1;
                    Some(WakeReason::Timeout)
                } else {
                    None
                }
            };

            if let Some(reason) = reason {
                return (guard, reason);
            }
        }
    }

    /// Resume at most one parked caller with [`WakeReason::Proceed`].
    ///
    /// No-op when nobody is parked or every parked caller already holds a
    /// grant. Never blocks; callable with the queue lock held, including
    /// from interrupt-class code.
    pub fn wake_one(&self, list: &mut WaitList) {
        if list.grants < list.parked {
            list.grants += 1;
            self.cv.notify_one();
        }
    }

    /// Resume every parked caller with [`WakeReason::Reset`].
    ///
    /// Outstanding `Proceed` grants are withdrawn; the data they promised
    /// no longer exists. Used exclusively by the reset operations.
    pub fn wake_all(&self, list: &mut WaitList) {
        list.reset_epoch = list.reset_epoch.wrapping_add(1);
        list.grants = 0;
        if list.parked > 0 {
            self.cv.notify_all();
        }
    }
}

/// Take the queue lock, disregarding poisoning.
///
/// Queue state mutations are straight-line between lock and unlock, so a
/// peer thread that panicked (in a notify hook, say) always left the
/// protected state consistent.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn relock<G>(result: LockResult<G>) -> G {
    result.unwrap_or_else(PoisonError::into_inner)
}
