//! # fathom-core
//!
//! Concurrent rendered-page height measurement pipeline.
//!
//! A bounded set of fetch workers drains a FIFO [`queue::TaskQueue`] of
//! URLs, drives one headless browser session each, and appends
//! `(URL, height)` measurements to a shared [`buffer::ResultBuffer`]. A
//! polling [`writer::BatchWriter`] persists buffered measurements to a CSV
//! file in batches, and the [`crawler::Crawler`] orchestrator guarantees
//! one final unconditional flush after every worker has terminated, so no
//! measurement is lost at shutdown.
//!
//! The browser engine is an external collaborator behind the traits in
//! [`browser`]; production runs use the chromiumoxide adapter.

pub mod browser;
pub mod buffer;
pub mod crawler;
pub mod error;
pub mod input;
pub mod measure;
pub mod queue;
pub mod worker;
pub mod writer;

pub use browser::{
    BrowserEngine, BrowserPage, BrowserSession, ChromiumEngine, LaunchOptions, PageResponse,
};
pub use buffer::{DrainLimit, ResultBuffer};
pub use crawler::{
    CrawlHandle, CrawlOptions, CrawlProgress, CrawlStats, CrawlSummary, Crawler,
};
pub use error::{CrawlError, Result};
pub use input::read_url_list;
pub use measure::{HeightMetrics, Measurement};
pub use queue::TaskQueue;
pub use writer::{BatchWriter, OUTPUT_HEADER};
