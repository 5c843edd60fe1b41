//! Lock-protected FIFO hand-off between the capture callback and the writer.
//!
//! The capture-notification context must return immediately after enqueueing,
//! so the queue never blocks beyond list manipulation under a single lock.
//! Backpressure is handled by letting the queue grow; producers are never
//! stalled.
//!
//! Every `clear()` bumps a generation counter. The writer records the
//! generation when it pops an entry and passes it back if the entry has to be
//! requeued (no bracketing anchors yet); a clear in between means the entry
//! belonged to a session that has ended, and the requeue is refused instead
//! of leaking a stale frame into the next session's files.

use crate::frame::PendingFrame;
use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

#[derive(Debug)]
struct QueueInner {
    items: VecDeque<PendingFrame>,
    accepting: bool,
    generation: u64,
}

/// Thread-safe FIFO of pending frame-write jobs.
#[derive(Debug)]
pub struct FrameQueue {
    inner: Mutex<QueueInner>,
}

impl Default for FrameQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameQueue {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(QueueInner {
                items: VecDeque::new(),
                accepting: true,
                generation: 0,
            }),
        }
    }

    /// Append an entry. Returns false once the pipeline has been stopped.
    pub fn push(&self, item: PendingFrame) -> bool {
        let mut inner = self.lock();
        if !inner.accepting {
            return false;
        }
        inner.items.push_back(item);
        true
    }

    /// Non-blocking pop; `None` when empty.
    pub fn pop_front(&self) -> Option<PendingFrame> {
        self.lock().items.pop_front()
    }

    /// Return an entry to the head of the queue, preserving FIFO order.
    ///
    /// Refused (entry dropped, returns false) when the queue was cleared or
    /// closed since `generation` was observed.
    pub fn requeue_front(&self, item: PendingFrame, generation: u64) -> bool {
        let mut inner = self.lock();
        if !inner.accepting || inner.generation != generation {
            return false;
        }
        inner.items.push_front(item);
        true
    }

    /// Drop all queued entries. Returns the number dropped.
    pub fn clear(&self) -> usize {
        let mut inner = self.lock();
        inner.generation += 1;
        let dropped = inner.items.len();
        inner.items.clear();
        dropped
    }

    /// Reject all further pushes.
    pub fn close(&self) {
        let mut inner = self.lock();
        inner.accepting = false;
        inner.generation += 1;
    }

    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().items.is_empty()
    }

    pub fn generation(&self) -> u64 {
        self.lock().generation
    }

    /// Arrival time of the oldest queued entry, if any.
    pub fn oldest_arrival(&self) -> Option<i64> {
        self.lock().items.front().map(|item| item.arrival_time)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, QueueInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(arrival_time: i64) -> PendingFrame {
        PendingFrame::new(arrival_time, None, 75)
    }

    #[test]
    fn pops_in_fifo_order() {
        let queue = FrameQueue::new();
        assert!(queue.push(entry(1)));
        assert!(queue.push(entry(2)));
        assert!(queue.push(entry(3)));

        assert_eq!(queue.pop_front().map(|e| e.arrival_time), Some(1));
        assert_eq!(queue.pop_front().map(|e| e.arrival_time), Some(2));
        assert_eq!(queue.pop_front().map(|e| e.arrival_time), Some(3));
        assert!(queue.pop_front().is_none());
    }

    #[test]
    fn requeue_front_preserves_order() {
        let queue = FrameQueue::new();
        queue.push(entry(1));
        queue.push(entry(2));

        let generation = queue.generation();
        let head = queue.pop_front().unwrap();
        assert!(queue.requeue_front(head, generation));

        assert_eq!(queue.pop_front().map(|e| e.arrival_time), Some(1));
        assert_eq!(queue.pop_front().map(|e| e.arrival_time), Some(2));
    }

    #[test]
    fn requeue_refused_after_clear() {
        let queue = FrameQueue::new();
        queue.push(entry(1));

        let generation = queue.generation();
        let head = queue.pop_front().unwrap();
        assert_eq!(queue.clear(), 0);

        assert!(!queue.requeue_front(head, generation));
        assert!(queue.is_empty());
    }

    #[test]
    fn clear_drops_everything() {
        let queue = FrameQueue::new();
        queue.push(entry(1));
        queue.push(entry(2));

        assert_eq!(queue.clear(), 2);
        assert!(queue.is_empty());

        // Still accepting after a clear.
        assert!(queue.push(entry(3)));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn push_rejected_after_close() {
        let queue = FrameQueue::new();
        queue.close();
        assert!(!queue.push(entry(1)));
        assert!(queue.is_empty());
    }

    #[test]
    fn oldest_arrival_tracks_head() {
        let queue = FrameQueue::new();
        assert_eq!(queue.oldest_arrival(), None);
        queue.push(entry(7));
        queue.push(entry(9));
        assert_eq!(queue.oldest_arrival(), Some(7));
    }
}
