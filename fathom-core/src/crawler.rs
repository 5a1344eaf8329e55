//! Orchestrator: seeds the queue, runs the workers and the batch writer,
//! and guarantees the final flush.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::stream::Stream;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::browser::BrowserEngine;
use crate::buffer::ResultBuffer;
use crate::error::{CrawlError, Result};
use crate::queue::TaskQueue;
use crate::worker::run_fetch_worker;
use crate::writer::BatchWriter;

/// Progress events emitted during a crawl.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CrawlProgress {
    /// Crawl has started; queue is seeded and workers are launching.
    CrawlStarted {
        total_urls: usize,
        num_workers: usize,
    },
    /// A page was measured and its result buffered.
    PageMeasured {
        worker_id: usize,
        url: String,
        height: u64,
    },
    /// A response declared a non-HTML content type and was skipped.
    PageSkipped {
        worker_id: usize,
        url: String,
        content_type: Option<String>,
    },
    /// A per-URL fetch or evaluation failure; the worker continues.
    PageFailed {
        worker_id: usize,
        url: String,
        error: String,
    },
    /// The batch writer appended rows to the output file.
    BatchFlushed { rows: usize, remaining: usize },
    /// A worker terminated; `clean` is false for session-level failures.
    WorkerStopped { worker_id: usize, clean: bool },
    /// Crawl has completed and the final flush has run.
    CrawlCompleted {
        measured: usize,
        skipped: usize,
        failed: usize,
        workers_failed: usize,
        unclaimed_urls: usize,
        duration_secs: u64,
    },
}

/// Tuning knobs for a crawl run.
#[derive(Debug, Clone)]
pub struct CrawlOptions {
    /// Number of concurrent fetch workers, one browser session each.
    pub num_workers: usize,
    /// Writer flush threshold and per-drain batch size.
    pub batch_size: usize,
    /// Writer polling interval.
    pub poll_interval: Duration,
    /// Progress channel buffer size.
    pub progress_buffer: usize,
}

impl Default for CrawlOptions {
    fn default() -> Self {
        Self {
            num_workers: 4,
            batch_size: 50,
            poll_interval: Duration::from_secs(5),
            progress_buffer: 1024,
        }
    }
}

/// Counters shared by the workers; folded into the summary at the end.
#[derive(Debug, Default)]
pub struct CrawlStats {
    pub measured: usize,
    pub skipped: usize,
    pub failed: usize,
    pub workers_failed: usize,
}

/// Summary of a completed crawl.
#[derive(Debug, Clone, serde::Serialize)]
pub struct CrawlSummary {
    pub measured: usize,
    pub skipped: usize,
    pub failed: usize,
    pub workers_failed: usize,
    /// URLs never claimed because every worker died first. These are lost;
    /// the run reports them instead of masking the gap.
    pub unclaimed_urls: usize,
    pub duration: Duration,
}

/// Handle to a running crawl.
#[derive(Debug)]
pub struct CrawlHandle {
    pub progress_rx: mpsc::Receiver<CrawlProgress>,
    join_handle: JoinHandle<Result<CrawlSummary>>,
}

impl CrawlHandle {
    /// Wait for the crawl to complete and return the summary.
    pub async fn wait(self) -> Result<CrawlSummary> {
        let CrawlHandle {
            progress_rx,
            join_handle,
        } = self;
        // Unread progress must not backpressure the pipeline: close the
        // channel so sends fail fast instead of filling it up.
        drop(progress_rx);
        join_handle
            .await
            .map_err(|e| CrawlError::Internal(format!("Crawl task failed: {}", e)))?
    }

    /// Convert the progress receiver into a Stream.
    pub fn progress_stream(self) -> impl Stream<Item = CrawlProgress> {
        tokio_stream::wrappers::ReceiverStream::new(self.progress_rx)
    }
}

/// Concurrent page-height crawler.
///
/// Wires a seeded [`TaskQueue`] through N fetch workers into a shared
/// [`ResultBuffer`] drained by a polling [`BatchWriter`]. Once every worker
/// has joined, the writer is cancelled and one unconditional flush empties
/// the buffer, so no buffered measurement is ever lost at shutdown.
pub struct Crawler {
    engine: Arc<dyn BrowserEngine>,
    options: CrawlOptions,
}

impl std::fmt::Debug for Crawler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Crawler")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Crawler {
    pub fn new(engine: Arc<dyn BrowserEngine>) -> Self {
        Self::with_options(engine, CrawlOptions::default())
    }

    pub fn with_options(engine: Arc<dyn BrowserEngine>, options: CrawlOptions) -> Self {
        Self { engine, options }
    }

    /// Start a crawl over `urls`, writing rows to `output_path`.
    ///
    /// Results may be written in any order relative to the input; callers
    /// wanting deterministic output must sort afterwards.
    pub fn start(&self, urls: Vec<String>, output_path: PathBuf) -> CrawlHandle {
        let (progress_tx, progress_rx) = mpsc::channel(self.options.progress_buffer);
        let engine = self.engine.clone();
        let options = self.options.clone();

        let join_handle =
            tokio::spawn(run_crawl(engine, options, urls, output_path, progress_tx));

        CrawlHandle {
            progress_rx,
            join_handle,
        }
    }
}

async fn run_crawl(
    engine: Arc<dyn BrowserEngine>,
    options: CrawlOptions,
    urls: Vec<String>,
    output_path: PathBuf,
    progress_tx: mpsc::Sender<CrawlProgress>,
) -> Result<CrawlSummary> {
    let start_time = Instant::now();

    let queue = Arc::new(TaskQueue::seeded(urls));
    let total_urls = queue.len().await;
    let buffer = Arc::new(ResultBuffer::new());
    let stats = Arc::new(Mutex::new(CrawlStats::default()));

    let writer = Arc::new(BatchWriter::new(
        buffer.clone(),
        output_path,
        progress_tx.clone(),
    ));
    writer.initialize()?;

    info!(
        "Crawl started: {} URLs, {} workers, batch size {}",
        total_urls, options.num_workers, options.batch_size
    );
    let _ = progress_tx
        .send(CrawlProgress::CrawlStarted {
            total_urls,
            num_workers: options.num_workers,
        })
        .await;

    let (cancel_tx, cancel_rx) = mpsc::channel(1);
    let writer_task = {
        let writer = writer.clone();
        let poll_interval = options.poll_interval;
        let batch_size = options.batch_size;
        tokio::spawn(async move {
            writer.run(poll_interval, batch_size, cancel_rx).await;
        })
    };

    let mut workers = Vec::new();
    for worker_id in 0..options.num_workers {
        workers.push(tokio::spawn(run_fetch_worker(
            worker_id,
            engine.clone(),
            queue.clone(),
            buffer.clone(),
            progress_tx.clone(),
            stats.clone(),
        )));
    }

    for worker in workers {
        let _ = worker.await;
    }

    // Workers are done; stop the polling loop before the final flush so
    // the two cannot race on the buffer.
    let _ = cancel_tx.send(()).await;
    let _ = writer_task.await;

    let flushed = writer.flush_all().await?;
    debug!("Final flush wrote {} rows", flushed);

    let unclaimed_urls = queue.len().await;
    if unclaimed_urls > 0 {
        warn!(
            "{} URLs were never claimed; every fetch worker stopped early",
            unclaimed_urls
        );
    }

    let final_stats = stats.lock().await;
    let duration = start_time.elapsed();
    let summary = CrawlSummary {
        measured: final_stats.measured,
        skipped: final_stats.skipped,
        failed: final_stats.failed,
        workers_failed: final_stats.workers_failed,
        unclaimed_urls,
        duration,
    };

    let _ = progress_tx
        .send(CrawlProgress::CrawlCompleted {
            measured: summary.measured,
            skipped: summary.skipped,
            failed: summary.failed,
            workers_failed: summary.workers_failed,
            unclaimed_urls: summary.unclaimed_urls,
            duration_secs: duration.as_secs(),
        })
        .await;

    info!(
        "Crawl complete: {} measured, {} skipped, {} failed in {:?}",
        summary.measured, summary.skipped, summary.failed, duration
    );
    Ok(summary)
}
