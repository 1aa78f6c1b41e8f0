//! Reusable scratch buffers for batching hot paths.
//!
//! The coalescer assembles every batch into freshly checked-out `Vec`s and
//! the worker returns them once the broker has acked, so steady-state
//! batching allocates nothing. Returned buffers are cleared; a buffer that
//! grew past the configured bound is dropped instead of kept, which keeps a
//! single oversized batch from pinning memory for the life of the pool.

use crossbeam_channel::{bounded, Receiver, Sender};

/// A free list of `Vec<T>` scratch buffers.
pub struct SlicePool<T> {
    slots: (Sender<Vec<T>>, Receiver<Vec<T>>),
    capacity: usize,
}

impl<T> SlicePool<T> {
    /// Create a pool handing out buffers pre-sized to `capacity` elements,
    /// keeping at most `slots` idle buffers around.
    pub fn new(capacity: usize, slots: usize) -> Self {
        Self {
            slots: bounded(slots),
            capacity,
        }
    }

    /// Check out a buffer. Empty, with at least the pool's capacity
    /// reserved.
    pub fn get(&self) -> Vec<T> {
        self.slots
            .1
            .try_recv()
            .unwrap_or_else(|_| Vec::with_capacity(self.capacity))
    }

    /// Return a buffer. Cleared before it is kept; dropped when it grew past
    /// the pool's capacity or the free list is full.
    pub fn put(&self, mut buf: Vec<T>) {
        if buf.capacity() > self.capacity {
            return;
        }
        buf.clear();
        let _ = self.slots.0.try_send(buf);
    }

    /// Number of idle buffers currently held.
    pub fn idle(&self) -> usize {
        self.slots.1.len()
    }
}
