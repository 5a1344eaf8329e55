//! FIFO supply of pending URLs shared by every fetch worker.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::Mutex;

/// FIFO multiset of URLs waiting to be fetched.
///
/// The queue is seeded once during startup and then only drained: each URL
/// is handed to exactly one caller of [`TaskQueue::try_dequeue`], and the
/// queue is never refilled, so workers treat "empty" as the signal to shut
/// their browser session down.
#[derive(Debug, Default)]
pub struct TaskQueue {
    inner: Mutex<VecDeque<String>>,
    dequeues: AtomicUsize,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a queue pre-populated with `urls`, preserving input order.
    pub fn seeded<I>(urls: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        Self {
            inner: Mutex::new(urls.into_iter().collect()),
            dequeues: AtomicUsize::new(0),
        }
    }

    /// Add a URL to the back of the queue. Setup phase only; never called
    /// once workers are running.
    pub async fn enqueue(&self, url: String) {
        self.inner.lock().await.push_back(url);
    }

    /// Claim the oldest pending URL, or `None` once the queue has drained.
    pub async fn try_dequeue(&self) -> Option<String> {
        let url = self.inner.lock().await.pop_front();
        if url.is_some() {
            self.dequeues.fetch_add(1, Ordering::Relaxed);
        }
        url
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.is_empty()
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    /// Number of successful dequeues so far. Together with [`len`](Self::len)
    /// this lets callers verify that no URL was handed out twice.
    pub fn dequeue_count(&self) -> usize {
        self.dequeues.load(Ordering::Relaxed)
    }
}
