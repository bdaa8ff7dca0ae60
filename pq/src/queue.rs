//! SafeQueue - a mutex-guarded unbounded FIFO shared by producers and consumers

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;
use tracing::debug;

/// Counters kept alongside the queue contents
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct QueueStats {
    pub enqueued: u64,
    pub dequeued: u64,
    pub peak_len: usize,
}

/// Internal state protected by mutex
struct QueueInner<T> {
    items: VecDeque<T>,
    stats: QueueStats,
}

/// Thread-safe FIFO queue
///
/// Every operation takes the same lock, so enqueue order across all producers
/// is exactly the order consumers see. `is_empty` and `len` are snapshots and
/// may be stale as soon as they return.
pub struct SafeQueue<T> {
    inner: Mutex<QueueInner<T>>,
    notify: Notify,
}

impl<T> SafeQueue<T> {
    pub fn new() -> Self {
        debug!("SafeQueue::new: called");
        Self {
            inner: Mutex::new(QueueInner {
                items: VecDeque::new(),
                stats: QueueStats::default(),
            }),
            notify: Notify::new(),
        }
    }

    // No operation can leave the deque half-updated, so a poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, QueueInner<T>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a value to the tail
    pub fn enqueue(&self, value: T) {
        let mut inner = self.lock();
        inner.items.push_back(value);
        inner.stats.enqueued += 1;
        inner.stats.peak_len = inner.stats.peak_len.max(inner.items.len());
        drop(inner);

        // Wake one blocked consumer, or leave a permit for the next one
        self.notify.notify_one();
    }

    /// Remove and return the head, or `None` when empty
    pub fn try_dequeue(&self) -> Option<T> {
        let mut inner = self.lock();
        let value = inner.items.pop_front();
        if value.is_some() {
            inner.stats.dequeued += 1;
        }
        value
    }

    /// Wait until a value is available and remove it
    ///
    /// Cancel-safe: a value is only taken on the poll that returns it, so
    /// dropping this future never loses an item.
    pub async fn dequeue(&self) -> T {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(value) = self.try_dequeue() {
                return value;
            }

            notified.await;
        }
    }

    pub fn is_empty(&self) -> bool {
        self.lock().items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn stats(&self) -> QueueStats {
        self.lock().stats
    }

    /// Remove every queued value, oldest first
    pub fn drain(&self) -> Vec<T> {
        let mut inner = self.lock();
        let drained: Vec<T> = inner.items.drain(..).collect();
        inner.stats.dequeued += drained.len() as u64;
        debug!(count = drained.len(), "SafeQueue::drain: drained");
        drained
    }
}

impl<T> Default for SafeQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for SafeQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("SafeQueue")
            .field("len", &inner.items.len())
            .field("stats", &inner.stats)
            .finish()
    }
}
