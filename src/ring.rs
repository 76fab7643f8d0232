//! Circular byte storage for the I/O queues
//!
//! One fixed-size ring, two occupancy polarities: [`InputCore`] counts the
//! bytes it holds, [`OutputCore`] the slots it has free. These types are
//! unsynchronized; the blocking wrappers in [`crate::input`] and
//! [`crate::output`] only touch them through the queue lock.

/// Fixed-capacity byte ring with independent read/write cursors.
/// Occupancy lives in the owning core; the cursors alone cannot tell full
/// from empty.
pub struct Ring<const N: usize> {
    /// Ring buffer storage
    buf: [u8; N],
    /// Next slot to read from
    rd: usize,
    /// Next slot to write to
    wr: usize,
}

impl<const N: usize> Ring<N> {
    /// Create an empty ring, both cursors at slot 0.
    pub const fn new() -> Self {
        assert!(N > 0, "ring capacity must be non-zero");

        Self {
            buf: [0u8; N],
            rd: 0,
            wr: 0,
        }
    }

    /// Advance a cursor by one slot, wrapping at the top.
    #[inline]
    const fn advance(cursor: usize) -> usize {
        if cursor + 1 == N {
            0
        } else {
            cursor + 1
        }
    }

    /// Store a byte at the write cursor and advance it.
    ///
    /// The caller must have checked occupancy; storing into a full ring
    /// silently overwrites the oldest unread byte.
    pub fn store(&mut self, byte: u8) {
        self.buf[self.wr] = byte;
        self.wr = Self::advance(self.wr);
    }

    /// Load the byte at the read cursor and advance it.
    ///
    /// The caller must have checked occupancy.
    pub fn load(&mut self) -> u8 {
        let byte = self.buf[self.rd];
        self.rd = Self::advance(self.rd);
        byte
    }

    /// Move both cursors back to slot 0. Stored bytes become unreachable.
    pub fn rewind(&mut self) {
        self.rd = 0;
        self.wr = 0;
    }

    /// Slot the next load will read from.
    pub fn read_cursor(&self) -> usize {
        self.rd
    }

    /// Slot the next store will write to.
    pub fn write_cursor(&self) -> usize {
        self.wr
    }
}

/// Input-queue core: interrupt side writes, thread side reads.
///
/// `count` is the number of unread bytes. Empty at `0`, full at `N`.
pub struct InputCore<const N: usize> {
    ring: Ring<N>,
    count: usize,
}

impl<const N: usize> InputCore<N> {
    /// Create an empty input core.
    pub const fn new() -> Self {
        Self {
            ring: Ring::new(),
            count: 0,
        }
    }

    /// Append a byte (producer side).
    ///
    /// Returns false if the core is full; no state changes in that case.
    pub fn push(&mut self, byte: u8) -> bool {
        if self.count == N {
            return false;
        }

        self.count += 1;
        self.ring.store(byte);
        debug_assert!(self.count <= N);
        true
    }

    /// Take the oldest byte (consumer side).
    ///
    /// Returns None if the core is empty.
    pub fn pop(&mut self) -> Option<u8> {
        if self.count == 0 {
            return None;
        }

        self.count -= 1;
        Some(self.ring.load())
    }

    /// Discard all stored bytes and rewind the cursors.
    pub fn clear(&mut self) {
        self.ring.rewind();
        self.count = 0;
    }

    /// Number of unread bytes.
    pub fn len(&self) -> usize {
        self.count
    }

    /// Is there nothing to read?
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Is there no room left to write?
    pub fn is_full(&self) -> bool {
        self.count == N
    }

    /// Total slot count.
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Shared geometry view (cursor positions).
    pub fn ring(&self) -> &Ring<N> {
        &self.ring
    }
}

/// Output-queue core: thread side writes, interrupt side reads.
///
/// `free` is the number of free slots, the inverted polarity of
/// [`InputCore`]: empty at `N` (all slots free), full at `0`.
pub struct OutputCore<const N: usize> {
    ring: Ring<N>,
    free: usize,
}

impl<const N: usize> OutputCore<N> {
    /// Create an empty output core (every slot free).
    pub const fn new() -> Self {
        Self {
            ring: Ring::new(),
            free: N,
        }
    }

    /// Append a byte (producer side).
    ///
    /// Returns false if no slot is free; no state changes in that case.
    pub fn push(&mut self, byte: u8) -> bool {
        if self.free == 0 {
            return false;
        }

        self.free -= 1;
        self.ring.store(byte);
        true
    }

    /// Take the oldest byte, freeing its slot (consumer side).
    ///
    /// Returns None if nothing has been written.
    pub fn pop(&mut self) -> Option<u8> {
        if self.free == N {
            return None;
        }

        self.free += 1;
        debug_assert!(self.free <= N);
        Some(self.ring.load())
    }

    /// Discard all stored bytes, rewind the cursors, free every slot.
    pub fn clear(&mut self) {
        self.ring.rewind();
        self.free = N;
    }

    /// Number of written-but-unread bytes.
    pub fn len(&self) -> usize {
        N - self.free
    }

    /// Number of free slots.
    pub fn space(&self) -> usize {
        self.free
    }

    /// Is there nothing to deliver?
    pub fn is_empty(&self) -> bool {
        self.free == N
    }

    /// Is every slot occupied?
    pub fn is_full(&self) -> bool {
        self.free == 0
    }

    /// Total slot count.
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Shared geometry view (cursor positions).
    pub fn ring(&self) -> &Ring<N> {
        &self.ring
    }
}
