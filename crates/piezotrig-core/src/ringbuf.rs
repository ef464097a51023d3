//! Fixed-capacity byte ring buffer
//!
//! The bus transport is built on two of these: one filled by the receive
//! interrupt and drained by the main loop, one filled by the main loop and
//! drained by the transmit interrupt. With a single writer and a single
//! reader per buffer the index arithmetic needs no interrupt masking.
//!
//! One slot is kept unused to disambiguate full from empty:
//! `head == tail` means empty, `(head + 1) % N == tail` means full, so the
//! usable capacity is `N - 1`. Writes to a full buffer are dropped - the
//! protocol has no backpressure and a torn frame fails its checksum anyway.

/// Bounded FIFO over `N` bytes with `N - 1` usable slots.
#[derive(Debug, Clone)]
pub struct RingBuffer<const N: usize> {
    buf: [u8; N],
    /// Next write position (owned by the producer)
    head: usize,
    /// Next read position (owned by the consumer)
    tail: usize,
}

impl<const N: usize> RingBuffer<N> {
    /// Create an empty buffer.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            buf: [0u8; N],
            head: 0,
            tail: 0,
        }
    }

    /// Usable capacity in bytes (`N - 1`).
    #[must_use]
    pub const fn capacity(&self) -> usize {
        N - 1
    }

    /// Number of buffered bytes.
    #[must_use]
    pub const fn len(&self) -> usize {
        (self.head + N - self.tail) % N
    }

    /// Remaining free slots.
    #[must_use]
    pub const fn free(&self) -> usize {
        self.capacity() - self.len()
    }

    /// `true` when no bytes are buffered.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.head == self.tail
    }

    /// `true` when no further byte can be accepted.
    #[must_use]
    pub const fn is_full(&self) -> bool {
        (self.head + 1) % N == self.tail
    }

    /// Append one byte. Returns `false` (byte dropped) when full.
    #[inline]
    pub fn push(&mut self, byte: u8) -> bool {
        if self.is_full() {
            return false;
        }
        self.buf[self.head] = byte;
        self.head = (self.head + 1) % N;
        true
    }

    /// Remove and return the oldest byte.
    #[inline]
    pub fn pop(&mut self) -> Option<u8> {
        if self.is_empty() {
            return None;
        }
        let byte = self.buf[self.tail];
        self.tail = (self.tail + 1) % N;
        Some(byte)
    }

    /// Read the byte `offset` positions past the tail without consuming it.
    #[must_use]
    pub fn peek(&self, offset: usize) -> Option<u8> {
        if offset >= self.len() {
            return None;
        }
        Some(self.buf[(self.tail + offset) % N])
    }

    /// Drop up to `count` bytes from the tail.
    pub fn advance(&mut self, count: usize) {
        let n = count.min(self.len());
        self.tail = (self.tail + n) % N;
    }

    /// Discard everything.
    pub fn clear(&mut self) {
        self.tail = self.head;
    }
}

impl<const N: usize> Default for RingBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================
