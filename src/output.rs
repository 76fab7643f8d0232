//! Output queue: thread-side producer, interrupt-side consumer
//!
//! The mirror image of [`crate::input`]: threads push with
//! [`OutputQueue::put`] / [`OutputQueue::write`] and may suspend while
//! every slot is taken; the interrupt side drains through [`OutputGuard`]
//! and never blocks. Occupancy polarity is inverted: the core counts free
//! slots.

use std::sync::{Mutex, MutexGuard};

use crate::ring::OutputCore;
use crate::time::Timeout;
use crate::wait::{lock, WaitError, WaitList, WaitQueue, WakeReason};

/// Notify hook: runs under the queue lock with the locked-tier view, so it
/// may drain bytes or kick hardware, but must never call a blocking
/// operation on the same queue (self-deadlock).
pub type OutputNotify<const N: usize> =
    Box<dyn Fn(&mut OutputGuard<'_, N>) + Send + Sync>;

struct Shared<const N: usize> {
    core: OutputCore<N>,
    wl: WaitList,
}

fn waitlist<const N: usize>(shared: &mut Shared<N>) -> &mut WaitList {
    &mut shared.wl
}

/// Bounded byte queue filled by threads and drained by interrupt-class
/// code.
pub struct OutputQueue<const N: usize> {
    shared: Mutex<Shared<N>>,
    waiters: WaitQueue,
    notify: Option<OutputNotify<N>>,
}

impl<const N: usize> OutputQueue<N> {
    /// Create an empty output queue (every slot free).
    pub const fn new() -> Self {
        Self {
            shared: Mutex::new(Shared {
                core: OutputCore::new(),
                wl: WaitList::new(),
            }),
            waiters: WaitQueue::new(),
            notify: None,
        }
    }

    /// Create an output queue with a notify hook.
    ///
    /// The hook fires under the lock after each byte of a [`put`] or
    /// [`write`] has been stored. It is the point where a driver starts
    /// (or keeps) the hardware transmitting.
    ///
    /// [`put`]: OutputQueue::put
    /// [`write`]: OutputQueue::write
    pub fn with_notify(
        notify: impl Fn(&mut OutputGuard<'_, N>) + Send + Sync + 'static,
    ) -> Self {
        Self {
            shared: Mutex::new(Shared {
                core: OutputCore::new(),
                wl: WaitList::new(),
            }),
            waiters: WaitQueue::new(),
            notify: Some(Box::new(notify)),
        }
    }

    /// Take the queue lock and enter the locked-context tier.
    pub fn lock(&self) -> OutputGuard<'_, N> {
        OutputGuard {
            shared: lock(&self.shared),
            waiters: &self.waiters,
        }
    }

    /// Write one byte, suspending up to `timeout` while the queue is full.
    ///
    /// The notify hook (if any) fires after the byte is stored. Returns
    /// the wake reason as an error when the wait ends without the byte
    /// being stored; a resumed caller re-checks fullness in a loop, since
    /// another writer may have claimed the slot that woke it.
    pub fn put(&self, byte: u8, timeout: Timeout) -> Result<(), WaitError> {
        let mut guard = lock(&self.shared);

        loop {
            if guard.core.push(byte) {
                drop(self.run_notify(guard));
                return Ok(());
            }

            let (resumed, reason) = self.waiters.park(guard, waitlist, timeout);
            guard = resumed;
            match reason {
                WakeReason::Proceed => continue,
                WakeReason::Timeout => return Err(WaitError::Timeout),
                WakeReason::Reset => return Err(WaitError::Reset),
            }
        }
    }

    /// Write up to `data.len()` bytes, suspending per byte as in [`put`].
    ///
    /// Returns the number of bytes stored; the first timeout or reset
    /// stops the transfer without an error. The lock is dropped after
    /// every byte, so the transfer is not atomic.
    ///
    /// # Panics
    ///
    /// An empty `data` is a contract violation.
    ///
    /// [`put`]: OutputQueue::put
    pub fn write(&self, data: &[u8], timeout: Timeout) -> usize {
        assert!(!data.is_empty(), "zero-length transfer");

        let mut done = 0;
        let mut guard = lock(&self.shared);
        loop {
            while !guard.core.push(data[done]) {
                let (resumed, reason) = self.waiters.park(guard, waitlist, timeout);
                guard = resumed;
                if reason != WakeReason::Proceed {
                    return done;
                }
            }

            guard = self.run_notify(guard);
            done += 1;

            // Preemption chance at a controlled point.
            drop(guard);
            if done == data.len() {
                return done;
            }
            guard = lock(&self.shared);
        }
    }

    fn run_notify<'a>(
        &'a self,
        guard: MutexGuard<'a, Shared<N>>,
    ) -> MutexGuard<'a, Shared<N>> {
        match &self.notify {
            Some(hook) => {
                let mut view = OutputGuard {
                    shared: guard,
                    waiters: &self.waiters,
                };
                hook(&mut view);
                view.shared
            }
            None => guard,
        }
    }
}

/// Locked-context view of an [`OutputQueue`]: the lock is held for the
/// guard's lifetime and nothing here can suspend.
pub struct OutputGuard<'a, const N: usize> {
    shared: MutexGuard<'a, Shared<N>>,
    waiters: &'a WaitQueue,
}

impl<const N: usize> OutputGuard<'_, N> {
    /// Take the oldest byte from the low end of the queue.
    ///
    /// Returns None if nothing has been written. On success the byte's
    /// slot is freed and one waiting writer (if any) is resumed.
    pub fn get(&mut self) -> Option<u8> {
        let byte = self.shared.core.pop()?;
        self.waiters.wake_one(&mut self.shared.wl);
        Some(byte)
    }

    /// Discard all buffered bytes, free every slot, and resume every
    /// waiter with `Reset`.
    pub fn reset(&mut self) {
        let dropped = self.shared.core.len();
        let aborted = self.shared.wl.parked();
        self.shared.core.clear();
        self.waiters.wake_all(&mut self.shared.wl);

        if dropped > 0 || aborted > 0 {
            log::debug!(
                "output queue reset: {dropped} byte(s) dropped, {aborted} waiter(s) aborted"
            );
        }
    }

    /// Number of written-but-undelivered bytes.
    pub fn len(&self) -> usize {
        self.shared.core.len()
    }

    /// Number of free slots.
    pub fn space(&self) -> usize {
        self.shared.core.space()
    }

    /// Is there nothing to deliver?
    pub fn is_empty(&self) -> bool {
        self.shared.core.is_empty()
    }

    /// Is every slot occupied?
    pub fn is_full(&self) -> bool {
        self.shared.core.is_full()
    }

    /// Total slot count.
    pub fn capacity(&self) -> usize {
        self.shared.core.capacity()
    }
}
