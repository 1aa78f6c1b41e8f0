//! Sliding window that turns out-of-order confirmation into in-order
//! release.
//!
//! Many workers process a strictly ordered offset stream in parallel and
//! confirm offsets in whatever order they finish; one consumer reads the
//! offsets back in exactly the order they were admitted. The window is a
//! fixed power-of-two ring: a slot is unconfirmed from the moment its
//! offset is written until some worker confirms it, and the read cursor
//! only ever moves across confirmed slots, so the reader observes a
//! gap-free sequence.
//!
//! A confirmed slot stores its own offset value (self-tag). Writes are
//! strictly sequential and the ring is bounded, so no two live slots at the
//! same index can hold the same offset; the self-tag therefore doubles as
//! the generation marker and no separate valid bit is needed.
//!
//! Threading contract: one writer, one reader, any number of confirmers.
//! Contract violations - confirming outside the window, writing an offset
//! ahead of the cursor - are caller bugs and panic. The window is
//! freestanding and synchronous: one mutex guards the ring and the
//! condition variable, cursor loads go through atomics so [`read_pos`] and
//! [`write_pos`] never touch the lock.
//!
//! [`read_pos`]: OffsetWindow::read_pos
//! [`write_pos`]: OffsetWindow::write_pos

use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicU64, Ordering};

/// Slot marker for an admitted-but-unconfirmed offset.
const UNCONFIRMED: u64 = u64::MAX;

/// Ring-buffer coordinator for parallel processing of an ordered offset
/// stream. See the module docs for the full contract.
pub struct OffsetWindow {
    ring: Mutex<Box<[u64]>>,
    cond: Condvar,
    len: u64,
    mask: u64,
    /// Next offset to be written. Always `>= r_pos`.
    w_pos: AtomicU64,
    /// Next offset to be released to the reader.
    r_pos: AtomicU64,
}

impl OffsetWindow {
    /// Create a window of `len` slots starting at `next_pos`.
    ///
    /// # Panics
    ///
    /// Panics unless `len` is a non-zero power of two.
    pub fn new(len: u64, next_pos: u64) -> Self {
        assert!(
            len > 0 && len & (len - 1) == 0,
            "window length must be a power of two, got {len}"
        );

        Self {
            ring: Mutex::new(vec![UNCONFIRMED; len as usize].into_boxed_slice()),
            cond: Condvar::new(),
            len,
            mask: len - 1,
            w_pos: AtomicU64::new(next_pos),
            r_pos: AtomicU64::new(next_pos),
        }
    }

    /// Admit the next offset to the ring, blocking while the window is
    /// full. Single-writer only.
    ///
    /// An offset below the write cursor is a duplicate delivery and is
    /// silently ignored.
    ///
    /// # Panics
    ///
    /// Panics when `offset` is ahead of the write cursor - that gap means
    /// the caller lost data.
    pub fn write(&self, offset: u64) {
        let expected = self.w_pos.load(Ordering::Acquire);
        if offset < expected {
            return;
        }
        assert!(
            offset == expected,
            "offset gap on write: expected {expected}, got {offset}"
        );

        let mut ring = self.ring.lock();
        while self.w_pos.load(Ordering::Relaxed) - self.r_pos.load(Ordering::Relaxed) == self.len {
            self.cond.wait(&mut ring);
        }

        ring[(offset & self.mask) as usize] = UNCONFIRMED;
        self.w_pos.store(offset + 1, Ordering::Release);
        self.cond.notify_all();
    }

    /// Mark a previously written offset as processed. Safe to call from any
    /// number of threads.
    ///
    /// # Panics
    ///
    /// Panics when `offset` lies outside `[read_pos, write_pos)` - either
    /// it was never written or it has already been released.
    pub fn confirm(&self, offset: u64) {
        let w = self.w_pos.load(Ordering::Acquire);
        let r = self.r_pos.load(Ordering::Acquire);
        assert!(
            offset < w,
            "confirm of unwritten offset {offset} (write cursor {w}, read cursor {r})"
        );
        assert!(
            offset >= r,
            "confirm of released offset {offset} (write cursor {w}, read cursor {r})"
        );

        let mut ring = self.ring.lock();
        ring[(offset & self.mask) as usize] = offset;
        self.cond.notify_all();
    }

    /// Release the next confirmed offset, blocking until it has been both
    /// written and confirmed. Single-reader only.
    pub fn read(&self) -> u64 {
        let next = self.r_pos.load(Ordering::Acquire);

        let mut ring = self.ring.lock();
        while !(self.w_pos.load(Ordering::Relaxed) > next
            && ring[(next & self.mask) as usize] == next)
        {
            self.cond.wait(&mut ring);
        }

        self.r_pos.store(next + 1, Ordering::Release);
        self.cond.notify_all();
        next
    }

    /// Non-blocking [`read`](OffsetWindow::read): `None` when the window is
    /// empty or the next offset has not been confirmed yet.
    pub fn try_read(&self) -> Option<u64> {
        if self.len() == 0 {
            return None;
        }

        let mut ring = self.ring.lock();
        let next = self.r_pos.load(Ordering::Relaxed);
        if self.w_pos.load(Ordering::Relaxed) == next
            || ring[(next & self.mask) as usize] != next
        {
            return None;
        }

        self.r_pos.store(next + 1, Ordering::Release);
        self.cond.notify_all();
        Some(next)
    }

    /// Next offset to be released.
    pub fn read_pos(&self) -> u64 {
        self.r_pos.load(Ordering::Acquire)
    }

    /// Next offset to be written.
    pub fn write_pos(&self) -> u64 {
        self.w_pos.load(Ordering::Acquire)
    }

    /// Offsets currently held in the window (written, not yet released).
    pub fn len(&self) -> u64 {
        let w = self.w_pos.load(Ordering::Acquire);
        let r = self.r_pos.load(Ordering::Acquire);
        w.saturating_sub(r)
    }

    /// Whether the window currently holds no offsets.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Slot count.
    pub fn capacity(&self) -> u64 {
        self.len
    }
}
