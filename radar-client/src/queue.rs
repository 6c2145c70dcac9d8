//! A bounded, multi-producer/single-consumer queue with a drop-oldest
//! overflow policy.
//!
//! Spec §9 Open Question #3 leaves the overflow behavior of the
//! outbound-from-client queue unspecified — the queue `on_receive`
//! fills with decoded frames for the rest of the client to drain. This
//! picks drop-oldest: under sustained backpressure a slow consumer
//! loses the *oldest* buffered messages rather than the newest, so the
//! upper layer always eventually sees current server state instead of
//! stale state stuck behind a full buffer.

use std::collections::VecDeque;
use std::sync::Mutex;

use tokio::sync::Notify;

pub struct DroppingQueue<T> {
    inner: Mutex<VecDeque<T>>,
    capacity: usize,
    notify: Notify,
}

impl<T> DroppingQueue<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            notify: Notify::new(),
        }
    }

    /// Push an item, dropping the oldest buffered item if the queue is
    /// already at capacity.
    pub fn push(&self, item: T) {
        let mut guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if guard.len() >= self.capacity {
            guard.pop_front();
        }
        guard.push_back(item);
        drop(guard);
        self.notify.notify_one();
    }

    pub fn try_pop(&self) -> Option<T> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).pop_front()
    }

    /// Wait for and return the next item, parking the caller when empty.
    pub async fn pop(&self) -> T {
        loop {
            let notified = self.notify.notified();
            if let Some(item) = self.try_pop() {
                return item;
            }
            notified.await;
        }
    }
}
