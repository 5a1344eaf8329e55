//! Batching CSV writer draining the shared result buffer.

use std::borrow::Cow;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::buffer::{DrainLimit, ResultBuffer};
use crate::crawler::CrawlProgress;
use crate::error::Result;
use crate::measure::Measurement;

/// Header row of the output file.
pub const OUTPUT_HEADER: &str = "URL,Height in Pixels";

/// Converts buffered measurements into persisted CSV rows.
///
/// During the run the writer polls the buffer on a fixed interval and only
/// drains once the buffered count reaches the batch size, which bounds file
/// I/O frequency while capping memory use. [`BatchWriter::flush_all`] is
/// the one unconditional drain, invoked after every worker has terminated.
#[derive(Debug)]
pub struct BatchWriter {
    buffer: Arc<ResultBuffer>,
    output_path: PathBuf,
    progress_tx: mpsc::Sender<CrawlProgress>,
}

impl BatchWriter {
    pub fn new(
        buffer: Arc<ResultBuffer>,
        output_path: PathBuf,
        progress_tx: mpsc::Sender<CrawlProgress>,
    ) -> Self {
        Self {
            buffer,
            output_path,
            progress_tx,
        }
    }

    /// Create or truncate the output file and write the header row.
    pub fn initialize(&self) -> Result<()> {
        let mut file = File::create(&self.output_path)?;
        writeln!(file, "{}", OUTPUT_HEADER)?;
        Ok(())
    }

    /// Poll the buffer until cancelled. A failed append is logged, its
    /// batch is returned to the buffer for the next tick, and the loop
    /// keeps running.
    pub async fn run(
        &self,
        poll_interval: Duration,
        batch_size: usize,
        mut cancel_rx: mpsc::Receiver<()>,
    ) {
        let mut ticker = tokio::time::interval(poll_interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if self.buffer.len().await >= batch_size {
                        if let Err(e) = self.drain(DrainLimit::AtMost(batch_size)).await {
                            warn!("Batch write failed: {}", e);
                        }
                    }
                }
                _ = cancel_rx.recv() => break,
            }
        }
        debug!("Batch writer stopped");
    }

    /// Unconditionally persist everything still buffered. Called exactly
    /// once, after all fetch workers have terminated; afterwards the buffer
    /// is guaranteed empty.
    pub async fn flush_all(&self) -> Result<usize> {
        self.drain(DrainLimit::All).await
    }

    async fn drain(&self, limit: DrainLimit) -> Result<usize> {
        let batch = self.buffer.drain(limit).await;
        if batch.is_empty() {
            return Ok(0);
        }

        // An I/O failure must not drop the batch: restore it to the front
        // of the buffer so the next drain (or the final flush) sees it.
        if let Err(e) = self.append_rows(&batch) {
            let lost = batch.len();
            self.buffer.restore(batch).await;
            warn!("Returned {} rows to the buffer after a write failure", lost);
            return Err(e.into());
        }

        let remaining = self.buffer.len().await;
        debug!("Flushed {} rows ({} still buffered)", batch.len(), remaining);
        let _ = self
            .progress_tx
            .send(CrawlProgress::BatchFlushed {
                rows: batch.len(),
                remaining,
            })
            .await;
        Ok(batch.len())
    }

    /// Encode the whole batch and append it with one write, so a failure
    /// cannot leave half a batch in the file.
    fn append_rows(&self, batch: &[Measurement]) -> std::io::Result<()> {
        let mut rows = String::new();
        for measurement in batch {
            rows.push_str(&format!(
                "{},{}\n",
                encode_field(&measurement.url),
                measurement.height
            ));
        }
        let mut file = OpenOptions::new().append(true).open(&self.output_path)?;
        file.write_all(rows.as_bytes())
    }
}

/// Minimal CSV quoting: a field containing a comma, quote or newline is
/// wrapped in double quotes with embedded quotes doubled. Keeps arbitrary
/// URL strings one-row-one-record.
fn encode_field(field: &str) -> Cow<'_, str> {
    if field.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(field)
    }
}
