//! Bounded FIFO between the UDP listener and the dispatcher.
//!
//! On overflow the oldest unread datagram is evicted: under sustained load the
//! freshest device state wins, and every push carries full field values.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::Notify;

/// Counters of the ingestion pipeline of one device.
#[derive(Debug, Default)]
pub struct IngestStats {
    received: AtomicU64,
    dropped_overflow: AtomicU64,
    malformed: AtomicU64,
    foreign: AtomicU64,
    dispatched: AtomicU64,
}

/// Point-in-time copy of [`IngestStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestSnapshot {
    pub received: u64,
    pub dropped_overflow: u64,
    pub malformed: u64,
    pub foreign: u64,
    pub dispatched: u64,
}

impl IngestStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_overflow(&self) {
        self.dropped_overflow.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_malformed(&self) {
        self.malformed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_foreign(&self) {
        self.foreign.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dispatched(&self) {
        self.dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> IngestSnapshot {
        IngestSnapshot {
            received: self.received.load(Ordering::Relaxed),
            dropped_overflow: self.dropped_overflow.load(Ordering::Relaxed),
            malformed: self.malformed.load(Ordering::Relaxed),
            foreign: self.foreign.load(Ordering::Relaxed),
            dispatched: self.dispatched.load(Ordering::Relaxed),
        }
    }
}

/// Bounded drop-oldest queue of raw datagrams.
pub struct EventQueue {
    messages: Mutex<VecDeque<Bytes>>,
    notify: Notify,
    capacity: usize,
    stats: Arc<IngestStats>,
}

impl EventQueue {
    /// Creates a queue holding at most `capacity` messages (minimum 1).
    pub fn new(capacity: usize, stats: Arc<IngestStats>) -> Self {
        let capacity = capacity.max(1);
        Self {
            messages: Mutex::new(VecDeque::with_capacity(capacity)),
            notify: Notify::new(),
            capacity,
            stats,
        }
    }

    /// Enqueues a datagram. Returns false if an older message was evicted.
    pub fn push(&self, message: Bytes) -> bool {
        self.stats.record_received();
        let evicted = {
            let mut messages = self.messages.lock();
            let evicted = if messages.len() >= self.capacity {
                messages.pop_front().is_some()
            } else {
                false
            };
            messages.push_back(message);
            evicted
        };
        if evicted {
            self.stats.record_overflow();
            log::warn!("[EventQueue] Queue full, dropped oldest message");
        }
        self.notify.notify_one();
        !evicted
    }

    pub fn try_pop(&self) -> Option<Bytes> {
        self.messages.lock().pop_front()
    }

    /// Waits for and removes the next message.
    ///
    /// Only one consumer is expected; a stored wake-up permit covers pushes
    /// that land between the empty check and the wait.
    pub async fn pop(&self) -> Bytes {
        loop {
            if let Some(message) = self.try_pop() {
                return message;
            }
            self.notify.notified().await;
        }
    }

    pub fn len(&self) -> usize {
        self.messages.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.lock().is_empty()
    }

    pub fn stats(&self) -> &Arc<IngestStats> {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn queue(capacity: usize) -> EventQueue {
        EventQueue::new(capacity, Arc::new(IngestStats::new()))
    }

    #[test]
    fn fifo_order() {
        let q = queue(4);
        q.push(Bytes::from_static(b"a"));
        q.push(Bytes::from_static(b"b"));
        assert_eq!(q.try_pop().as_deref(), Some(&b"a"[..]));
        assert_eq!(q.try_pop().as_deref(), Some(&b"b"[..]));
        assert!(q.try_pop().is_none());
    }

    #[test]
    fn overflow_drops_oldest() {
        let q = queue(2);
        assert!(q.push(Bytes::from_static(b"1")));
        assert!(q.push(Bytes::from_static(b"2")));
        assert!(!q.push(Bytes::from_static(b"3")));

        assert_eq!(q.len(), 2);
        assert_eq!(q.try_pop().as_deref(), Some(&b"2"[..]));
        assert_eq!(q.try_pop().as_deref(), Some(&b"3"[..]));

        let stats = q.stats().snapshot();
        assert_eq!(stats.received, 3);
        assert_eq!(stats.dropped_overflow, 1);
    }

    #[tokio::test]
    async fn pop_waits_for_push() {
        let q = Arc::new(queue(8));
        let consumer = {
            let q = Arc::clone(&q);
            tokio::spawn(async move { q.pop().await })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        q.push(Bytes::from_static(b"late"));

        let message = tokio::time::timeout(Duration::from_secs(1), consumer)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(&message[..], b"late");
    }
}
