//! Input queue: interrupt-side producer, thread-side consumer
//!
//! The interrupt side pushes through [`InputGuard`] and never blocks;
//! threads pull with [`InputQueue::get`] / [`InputQueue::read`] and may
//! suspend. The tiers are separate types, so code that must not suspend
//! cannot reach a blocking entry point.

use std::sync::{Mutex, MutexGuard};

use crate::ring::InputCore;
use crate::time::Timeout;
use crate::wait::{lock, WaitError, WaitList, WaitQueue, WakeReason};

/// Notify hook: runs under the queue lock with the locked-tier view, so it
/// may feed bytes or kick hardware, but must never call a blocking
/// operation on the same queue (self-deadlock).
pub type InputNotify<const N: usize> =
    Box<dyn Fn(&mut InputGuard<'_, N>) + Send + Sync>;

struct Shared<const N: usize> {
    core: InputCore<N>,
    wl: WaitList,
}

fn waitlist<const N: usize>(shared: &mut Shared<N>) -> &mut WaitList {
    &mut shared.wl
}

/// Bounded byte queue written by interrupt-class code and drained by
/// threads.
///
/// For the consumer side an empty queue means waiting; for the producer
/// side a full queue means the byte is refused on the spot.
pub struct InputQueue<const N: usize> {
    shared: Mutex<Shared<N>>,
    waiters: WaitQueue,
    notify: Option<InputNotify<N>>,
}

impl<const N: usize> InputQueue<N> {
    /// Create an empty input queue.
    pub const fn new() -> Self {
        Self {
            shared: Mutex::new(Shared {
                core: InputCore::new(),
                wl: WaitList::new(),
            }),
            waiters: WaitQueue::new(),
            notify: None,
        }
    }

    /// Create an input queue with a notify hook.
    ///
    /// The hook fires under the lock at the start of every [`get`] and
    /// before each byte of a [`read`], before the queue is examined. It is
    /// the "about to consume" signal a driver uses to start producing.
    ///
    /// [`get`]: InputQueue::get
    /// [`read`]: InputQueue::read
    pub fn with_notify(
        notify: impl Fn(&mut InputGuard<'_, N>) + Send + Sync + 'static,
    ) -> Self {
        Self {
            shared: Mutex::new(Shared {
                core: InputCore::new(),
                wl: WaitList::new(),
            }),
            waiters: WaitQueue::new(),
            notify: Some(Box::new(notify)),
        }
    }

    /// Take the queue lock and enter the locked-context tier.
    ///
    /// This is the entry point for interrupt handlers and for code already
    /// serialized with the producer; every operation on the returned guard
    /// completes without suspending.
    pub fn lock(&self) -> InputGuard<'_, N> {
        InputGuard {
            shared: lock(&self.shared),
            waiters: &self.waiters,
        }
    }

    /// Read one byte, suspending up to `timeout` while the queue is empty.
    ///
    /// Returns the wake reason as an error when the wait ends without a
    /// byte: [`WaitError::Timeout`] (including `Timeout::Immediate` on an
    /// empty queue) or [`WaitError::Reset`].
    pub fn get(&self, timeout: Timeout) -> Result<u8, WaitError> {
        let mut guard = lock(&self.shared);
        guard = self.run_notify(guard);

        loop {
            if let Some(byte) = guard.core.pop() {
                return Ok(byte);
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

    /// Read up to `out.len()` bytes, suspending per byte as in [`get`].
    ///
    /// Returns the number of bytes transferred; the first timeout or
    /// reset stops the transfer without an error. The lock is dropped
    /// after every byte, so the transfer is not atomic.
    ///
    /// # Panics
    ///
    /// An empty `out` is a contract violation.
    ///
    /// [`get`]: InputQueue::get
    pub fn read(&self, out: &mut [u8], timeout: Timeout) -> usize {
        assert!(!out.is_empty(), "zero-length transfer");

        let mut done = 0;
        let mut guard = lock(&self.shared);
        loop {
            guard = self.run_notify(guard);

            let byte = loop {
                if let Some(byte) = guard.core.pop() {
                    break byte;
                }

                let (resumed, reason) = self.waiters.park(guard, waitlist, timeout);
                guard = resumed;
                if reason != WakeReason::Proceed {
                    return done;
                }
            };

            out[done] = byte;
            done += 1;

            // Preemption chance at a controlled point.
            drop(guard);
            if done == out.len() {
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
                let mut view = InputGuard {
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

/// Locked-context view of an [`InputQueue`]: the lock is held for the
/// guard's lifetime and nothing here can suspend.
pub struct InputGuard<'a, const N: usize> {
    shared: MutexGuard<'a, Shared<N>>,
    waiters: &'a WaitQueue,
}

impl<const N: usize> InputGuard<'_, N> {
    /// Append one byte at the low end of the queue.
    ///
    /// Returns false if the queue is full, leaving it untouched. On
    /// success one waiting consumer (if any) is resumed.
    pub fn put(&mut self, byte: u8) -> bool {
        if !self.shared.core.push(byte) {
            return false;
        }

        self.waiters.wake_one(&mut self.shared.wl);
        true
    }

    /// Discard all buffered bytes and resume every waiter with `Reset`.
    ///
    /// Lower-level drivers use this to demand immediate attention from the
    /// upper layer (e.g. after a bus error); the data loss is the point.
    pub fn reset(&mut self) {
        let dropped = self.shared.core.len();
        let aborted = self.shared.wl.parked();
        self.shared.core.clear();
        self.waiters.wake_all(&mut self.shared.wl);

        if dropped > 0 || aborted > 0 {
            log::debug!(
                "input queue reset: {dropped} byte(s) dropped, {aborted} waiter(s) aborted"
            );
        }
    }

    /// Number of unread bytes.
    pub fn len(&self) -> usize {
        self.shared.core.len()
    }

    /// Is there nothing to read?
    pub fn is_empty(&self) -> bool {
        self.shared.core.is_empty()
    }

    /// Is there no room left to write?
    pub fn is_full(&self) -> bool {
        self.shared.core.is_full()
    }

    /// Total slot count.
    pub fn capacity(&self) -> usize {
        self.shared.core.capacity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::{Duration, Instant};

    fn parked<const N: usize>(q: &InputQueue<N>) -> usize {
        lock(&q.shared).wl.parked()
    }

    fn spin_until_parked<const N: usize>(q: &InputQueue<N>, n: usize) {
        while parked(q) < n {
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn test_fifo_order() {
        let q = InputQueue::<8>::new();
        for b in 1..=5 {
            assert!(q.lock().put(b));
        }
        for b in 1..=5 {
            assert_eq!(q.get(Timeout::Immediate), Ok(b));
        }
    }

    #[test]
    fn test_full_put_rejected_without_state_change() {
        let q = InputQueue::<4>::new();
        for b in 0..4 {
            assert!(q.lock().put(b));
        }

        let (rd, wr) = {
            let shared = lock(&q.shared);
            (shared.core.ring().read_cursor(), shared.core.ring().write_cursor())
        };

        assert!(!q.lock().put(99));

        let shared = lock(&q.shared);
        assert_eq!(shared.core.len(), 4);
        assert_eq!(shared.core.ring().read_cursor(), rd);
        assert_eq!(shared.core.ring().write_cursor(), wr);
    }

    #[test]
    fn test_immediate_get_on_empty_times_out() {
        let q = InputQueue::<4>::new();
        assert_eq!(q.get(Timeout::Immediate), Err(WaitError::Timeout));
        assert!(q.lock().is_empty());
        assert_eq!(parked(&q), 0);
    }

    #[test]
    fn test_bounded_get_times_out_after_deadline() {
        let q = InputQueue::<4>::new();
        let start = Instant::now();
        assert_eq!(q.get(Timeout::millis(15)), Err(WaitError::Timeout));
        assert!(start.elapsed() >= Duration::from_millis(15));
    }

    #[test]
    fn test_partial_read_reports_transferred_count() {
        let q = InputQueue::<8>::new();
        for b in [10, 11, 12] {
            assert!(q.lock().put(b));
        }

        let mut buf = [0u8; 5];
        let n = q.read(&mut buf, Timeout::Immediate);
        assert_eq!(n, 3);
        assert_eq!(&buf[..3], &[10, 11, 12]);
        assert!(q.lock().is_empty());
    }

    #[test]
    #[should_panic(expected = "zero-length transfer")]
    fn test_zero_length_read_is_a_contract_violation() {
        let q = InputQueue::<4>::new();
        let mut buf = [0u8; 0];
        q.read(&mut buf, Timeout::Immediate);
    }

    #[test]
    fn test_blocked_get_woken_by_put() {
        let q = InputQueue::<4>::new();

        thread::scope(|s| {
            let consumer = s.spawn(|| q.get(Timeout::Infinite));

            spin_until_parked(&q, 1);
            assert!(q.lock().put(7));

            assert_eq!(consumer.join().unwrap(), Ok(7));
        });
    }

    #[test]
    fn test_reset_wakes_all_blocked_getters() {
        let q = InputQueue::<4>::new();

        thread::scope(|s| {
            let consumers: Vec<_> = (0..2)
                .map(|_| s.spawn(|| q.get(Timeout::Infinite)))
                .collect();

            spin_until_parked(&q, 2);
            q.lock().reset();

            for consumer in consumers {
                assert_eq!(consumer.join().unwrap(), Err(WaitError::Reset));
            }
            assert!(q.lock().is_empty());
        });
    }

    #[test]
    fn test_get_still_wakes_after_reset_then_put() {
        let q = InputQueue::<4>::new();

        thread::scope(|s| {
            let first = s.spawn(|| q.get(Timeout::Infinite));
            spin_until_parked(&q, 1);

            // A driver resetting and immediately refilling in one critical
            // section: the parked consumer leaves with Reset while the new
            // byte stays buffered.
            {
                let mut g = q.lock();
                g.reset();
                assert!(g.put(1));
            }
            assert_eq!(first.join().unwrap(), Err(WaitError::Reset));
            assert_eq!(q.get(Timeout::Immediate), Ok(1));

            // The queue must still deliver single wakes afterwards.
            let second = s.spawn(|| q.get(Timeout::Infinite));
            spin_until_parked(&q, 1);
            assert!(q.lock().put(2));
            assert_eq!(second.join().unwrap(), Ok(2));
        });
    }

    #[test]
    fn test_wraparound_preserves_order() {
        let q = InputQueue::<4>::new();
        // Ten single-byte cycles walk the cursors past the top twice.
        for b in 0..10 {
            assert!(q.lock().put(b));
            assert_eq!(q.get(Timeout::Immediate), Ok(b));
        }
    }

    #[test]
    fn test_read_spans_multiple_puts() {
        let q = InputQueue::<4>::new();

        thread::scope(|s| {
            let producer = s.spawn(|| {
                for b in [1, 2, 3] {
                    spin_until_parked(&q, 1);
                    assert!(q.lock().put(b));
                }
            });

            let mut buf = [0u8; 3];
            let n = q.read(&mut buf, Timeout::Infinite);
            assert_eq!(n, 3);
            assert_eq!(buf, [1, 2, 3]);

            producer.join().unwrap();
        });
    }

    #[test]
    fn test_notify_can_feed_the_queue() {
        // An "about to consume" hook that lazily produces, the way an ADC
        // driver starts a conversion when the upper layer asks for data.
        let q = InputQueue::<4>::with_notify(|g| {
            let _ = g.put(9);
        });

        assert_eq!(q.get(Timeout::Immediate), Ok(9));
    }

    #[test]
    fn test_notify_fires_per_read_attempt() {
        static CALLS: AtomicUsize = AtomicUsize::new(0);
        let q = InputQueue::<8>::with_notify(|_| {
            CALLS.fetch_add(1, Ordering::Relaxed);
        });

        q.lock().put(1);
        q.lock().put(2);

        let mut buf = [0u8; 2];
        assert_eq!(q.read(&mut buf, Timeout::Immediate), 2);
        assert_eq!(CALLS.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn test_guard_queries() {
        let q = InputQueue::<4>::new();
        let mut g = q.lock();
        assert_eq!(g.capacity(), 4);
        assert!(g.is_empty());
        g.put(1);
        assert_eq!(g.len(), 1);
        assert!(!g.is_full());
    }
}
