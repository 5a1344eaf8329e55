//! Shared buffer of measurements between fetch workers and the batch writer.

use std::collections::VecDeque;

use tokio::sync::Mutex;

use crate::measure::Measurement;

/// How much of the buffer a single drain may remove.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainLimit {
    /// Remove up to `n` of the oldest entries. Used by the polling writer.
    AtMost(usize),
    /// Remove everything. Used by the one final flush after all workers
    /// have terminated.
    All,
}

/// Ordered sequence of measurements, appended by workers and drained from
/// the front by the batch writer.
///
/// Appends and drains are atomic with respect to each other; no reader can
/// observe a partially removed batch. A measurement that enters the buffer
/// leaves it exactly once, via [`ResultBuffer::drain`].
#[derive(Debug, Default)]
pub struct ResultBuffer {
    inner: Mutex<VecDeque<Measurement>>,
}

impl ResultBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn append(&self, measurement: Measurement) {
        self.inner.lock().await.push_back(measurement);
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.is_empty()
    }

    /// Atomically remove the oldest entries, bounded by `limit`.
    pub async fn drain(&self, limit: DrainLimit) -> Vec<Measurement> {
        let mut inner = self.inner.lock().await;
        let take = match limit {
            DrainLimit::AtMost(n) => n.min(inner.len()),
            DrainLimit::All => inner.len(),
        };
        inner.drain(..take).collect()
    }

    /// Return a drained batch to the front of the buffer, preserving its
    /// order. Used by the writer when persisting a batch fails, so the
    /// entries stay eligible for the next drain instead of being lost.
    pub async fn restore(&self, batch: Vec<Measurement>) {
        let mut inner = self.inner.lock().await;
        for measurement in batch.into_iter().rev() {
            inner.push_front(measurement);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn measurement(url: &str, height: u64) -> Measurement {
        Measurement {
            url: url.to_string(),
            height,
        }
    }

    #[tokio::test]
    async fn drain_at_most_removes_oldest_first() {
        let buffer = ResultBuffer::new();
        buffer.append(measurement("a", 1)).await;
        buffer.append(measurement("b", 2)).await;
        buffer.append(measurement("c", 3)).await;

        let batch = buffer.drain(DrainLimit::AtMost(2)).await;
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0].url, "a");
        assert_eq!(batch[1].url, "b");
        assert_eq!(buffer.len().await, 1);
    }

    #[tokio::test]
    async fn drain_at_most_caps_at_buffer_len() {
        let buffer = ResultBuffer::new();
        buffer.append(measurement("a", 1)).await;

        let batch = buffer.drain(DrainLimit::AtMost(50)).await;
        assert_eq!(batch.len(), 1);
        assert!(buffer.is_empty().await);
    }

    #[tokio::test]
    async fn restore_puts_a_batch_back_in_order() {
        let buffer = ResultBuffer::new();
        buffer.append(measurement("a", 1)).await;
        buffer.append(measurement("b", 2)).await;
        buffer.append(measurement("c", 3)).await;

        let batch = buffer.drain(DrainLimit::AtMost(2)).await;
        buffer.restore(batch).await;

        let all = buffer.drain(DrainLimit::All).await;
        let urls: Vec<&str> = all.iter().map(|m| m.url.as_str()).collect();
        assert_eq!(urls, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn drain_all_empties_the_buffer() {
        let buffer = ResultBuffer::new();
        for i in 0..7 {
            buffer.append(measurement(&format!("u{i}"), i)).await;
        }

        let batch = buffer.drain(DrainLimit::All).await;
        assert_eq!(batch.len(), 7);
        assert!(buffer.is_empty().await);
        assert!(buffer.drain(DrainLimit::All).await.is_empty());
    }
}
