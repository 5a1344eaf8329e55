//! Fetch worker: drains the task queue through one browser session.

use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};
use tracing::{debug, info, warn};

use crate::browser::{BrowserEngine, BrowserPage, BrowserSession};
use crate::buffer::ResultBuffer;
use crate::crawler::{CrawlProgress, CrawlStats};
use crate::error::Result;
use crate::measure::Measurement;
use crate::queue::TaskQueue;

/// Per-URL result inside a worker.
enum FetchOutcome {
    Measured(u64),
    /// Response declared a non-HTML content type; nothing is recorded.
    Skipped(Option<String>),
}

/// Run one fetch worker to completion.
///
/// The worker launches its own browser session, claims URLs from the queue
/// until it reports empty, and appends one measurement per successfully
/// probed HTML page. Per-URL failures are logged and skipped; a session
/// that fails to launch terminates only this worker and leaves remaining
/// URLs to the others.
pub async fn run_fetch_worker(
    worker_id: usize,
    engine: Arc<dyn BrowserEngine>,
    queue: Arc<TaskQueue>,
    buffer: Arc<ResultBuffer>,
    progress_tx: mpsc::Sender<CrawlProgress>,
    stats: Arc<Mutex<CrawlStats>>,
) {
    debug!("Fetch worker {} started", worker_id);

    let session = match engine.launch().await {
        Ok(session) => session,
        Err(e) => {
            warn!("[Worker {}] Browser session failed to launch: {}", worker_id, e);
            stats.lock().await.workers_failed += 1;
            let _ = progress_tx
                .send(CrawlProgress::WorkerStopped {
                    worker_id,
                    clean: false,
                })
                .await;
            return;
        }
    };

    while let Some(url) = queue.try_dequeue().await {
        match fetch_one(session.as_ref(), &url).await {
            Ok(FetchOutcome::Measured(height)) => {
                debug!("[Worker {}] Crawled {}, height: {}px", worker_id, url, height);
                buffer
                    .append(Measurement {
                        url: url.clone(),
                        height,
                    })
                    .await;
                stats.lock().await.measured += 1;
                let _ = progress_tx
                    .send(CrawlProgress::PageMeasured {
                        worker_id,
                        url,
                        height,
                    })
                    .await;
            }
            Ok(FetchOutcome::Skipped(content_type)) => {
                info!(
                    "[Worker {}] Skipping {} due to non-HTML content type: {:?}",
                    worker_id, url, content_type
                );
                stats.lock().await.skipped += 1;
                let _ = progress_tx
                    .send(CrawlProgress::PageSkipped {
                        worker_id,
                        url,
                        content_type,
                    })
                    .await;
            }
            Err(e) => {
                warn!("[Worker {}] Error accessing {}: {}", worker_id, url, e);
                stats.lock().await.failed += 1;
                let _ = progress_tx
                    .send(CrawlProgress::PageFailed {
                        worker_id,
                        url,
                        error: e.to_string(),
                    })
                    .await;
            }
        }
    }

    if let Err(e) = session.close().await {
        debug!("[Worker {}] Session close failed: {}", worker_id, e);
    }
    let _ = progress_tx
        .send(CrawlProgress::WorkerStopped {
            worker_id,
            clean: true,
        })
        .await;
    debug!("Fetch worker {} completed", worker_id);
}

/// Process a single URL: open a page, navigate, gate on content type,
/// probe the height candidates. The page is closed on every path; a close
/// failure never masks the fetch outcome.
async fn fetch_one(session: &dyn BrowserSession, url: &str) -> Result<FetchOutcome> {
    let mut page = session.open_page().await?;
    let outcome = probe_page(page.as_mut(), url).await;
    if let Err(e) = page.close().await {
        debug!("Failed to close page for {}: {}", url, e);
    }
    outcome
}

async fn probe_page(page: &mut dyn BrowserPage, url: &str) -> Result<FetchOutcome> {
    let response = page.navigate(url).await?;
    if !response.is_html() {
        return Ok(FetchOutcome::Skipped(response.content_type));
    }
    let metrics = page.height_metrics().await?;
    Ok(FetchOutcome::Measured(metrics.max_candidate()))
}
