//! # fathom
//!
//! CLI that concurrently measures the rendered pixel height of every URL
//! in an input list and appends the results to a CSV file while the crawl
//! is still running.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use fathom_config::CrawlSettings;
use fathom_core::browser::ChromiumEngine;
use fathom_core::crawler::{CrawlProgress, Crawler};
use fathom_core::input::read_url_list;
use tracing::{debug, info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "fathom")]
#[command(about = "Measure rendered page heights for a list of URLs with headless Chromium")]
struct Cli {
    /// Settings file (TOML or JSON). Falls back to $FATHOM_CONFIG_PATH,
    /// $FATHOM_CONFIG_JSON, then built-in defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Input file: one URL per line, first comma-separated field.
    #[arg(long)]
    input: Option<PathBuf>,

    /// Output CSV file; created or truncated at start.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Number of concurrent fetch workers (one browser session each).
    #[arg(long)]
    workers: Option<usize>,

    /// Writer flush threshold.
    #[arg(long)]
    batch_size: Option<usize>,

    /// Writer polling interval in milliseconds.
    #[arg(long)]
    poll_interval_ms: Option<u64>,

    /// Per-navigation timeout in seconds.
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Run the browser with a visible window instead of headless.
    #[arg(long)]
    headed: bool,
}

impl Cli {
    fn apply_overrides(&self, settings: &mut CrawlSettings) {
        if let Some(input) = &self.input {
            settings.input_file = input.clone();
        }
        if let Some(output) = &self.output {
            settings.output_file = output.clone();
        }
        if let Some(workers) = self.workers {
            settings.num_workers = workers;
        }
        if let Some(batch_size) = self.batch_size {
            settings.batch_size = batch_size;
        }
        if let Some(poll_interval_ms) = self.poll_interval_ms {
            settings.poll_interval_ms = poll_interval_ms;
        }
        if let Some(timeout_secs) = self.timeout_secs {
            settings.navigation_timeout_secs = timeout_secs;
        }
        if self.headed {
            settings.headless = false;
        }
    }
}

fn render_progress(event: CrawlProgress) {
    match event {
        CrawlProgress::CrawlStarted {
            total_urls,
            num_workers,
        } => info!("Crawling {} URLs with {} workers", total_urls, num_workers),
        CrawlProgress::PageMeasured {
            worker_id,
            url,
            height,
        } => info!("[Worker {}] {} -> {}px", worker_id, url, height),
        CrawlProgress::PageSkipped { url, .. } => debug!("Skipped {}", url),
        CrawlProgress::PageFailed { url, error, .. } => debug!("Failed {}: {}", url, error),
        CrawlProgress::BatchFlushed { rows, remaining } => {
            debug!("Flushed {} rows ({} buffered)", rows, remaining)
        }
        CrawlProgress::WorkerStopped { worker_id, clean } => {
            if clean {
                debug!("Worker {} finished", worker_id);
            } else {
                warn!("Worker {} died; remaining URLs fall to the other workers", worker_id);
            }
        }
        CrawlProgress::CrawlCompleted { .. } => {}
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let (mut settings, source) = CrawlSettings::load(cli.config.as_deref())?;
    cli.apply_overrides(&mut settings);
    settings.validate()?;
    debug!("Settings loaded from {:?}", source);

    // Input load failure is the one fatal error: abort before any
    // concurrent work starts.
    let urls = read_url_list(&settings.input_file)
        .with_context(|| format!("Cannot load URL list from {}", settings.input_file.display()))?;
    info!("Loaded {} URLs from {}", urls.len(), settings.input_file.display());

    let engine = Arc::new(ChromiumEngine::new(settings.launch_options()));
    let crawler = Crawler::with_options(engine, settings.crawl_options());
    let mut handle = crawler.start(urls, settings.output_file.clone());

    while let Some(event) = handle.progress_rx.recv().await {
        render_progress(event);
    }

    let summary = handle.wait().await?;
    info!(
        "Done: {} measured, {} skipped, {} failed, {} URLs unclaimed, output at {}",
        summary.measured,
        summary.skipped,
        summary.failed,
        summary.unclaimed_urls,
        settings.output_file.display()
    );
    Ok(())
}
