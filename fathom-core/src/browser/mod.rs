//! Seam between the crawl pipeline and the browser engine.
//!
//! Workers only ever see these traits; the chromiumoxide adapter in
//! [`chromium`] is the production implementation, and tests drive the
//! pipeline with a scripted stand-in.

pub mod chromium;

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;
use crate::measure::HeightMetrics;

pub use chromium::ChromiumEngine;

/// Launch-time options for a browser session.
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    pub headless: bool,
    /// Fixed viewport applied to every page so height results are
    /// reproducible across runs for the same page content.
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub navigation_timeout: Duration,
    /// Explicit browser binary; autodetected when `None`.
    pub executable: Option<PathBuf>,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self {
            headless: true,
            viewport_width: 1200,
            viewport_height: 800,
            navigation_timeout: Duration::from_secs(30),
            executable: None,
        }
    }
}

/// Response metadata surfaced by navigation, before any in-page evaluation.
#[derive(Debug, Clone, Default)]
pub struct PageResponse {
    /// Declared content type of the navigation response, when the engine
    /// reported one.
    pub content_type: Option<String>,
}

impl PageResponse {
    /// Content-type gate for the skip policy: only documents declaring an
    /// HTML type get measured. A missing content type counts as non-HTML.
    pub fn is_html(&self) -> bool {
        self.content_type.as_deref().is_some_and(|ct| {
            let ct = ct.to_ascii_lowercase();
            ct.contains("text/html") || ct.contains("application/xhtml+xml")
        })
    }
}

/// One page/tab inside a browser session.
#[async_trait]
pub trait BrowserPage: Send {
    /// Navigate to `url` and surface the response's declared content type.
    async fn navigate(&mut self, url: &str) -> Result<PageResponse>;

    /// Run the in-page height probe. Only meaningful after a successful
    /// [`navigate`](Self::navigate).
    async fn height_metrics(&self) -> Result<HeightMetrics>;

    async fn close(self: Box<Self>) -> Result<()>;
}

/// A running browser instance, exclusively owned by one fetch worker.
///
/// `Sync` is required: workers hold a session reference across awaits
/// inside a spawned task.
#[async_trait]
pub trait BrowserSession: Send + Sync {
    async fn open_page(&self) -> Result<Box<dyn BrowserPage>>;

    async fn close(self: Box<Self>) -> Result<()>;
}

/// Factory for browser sessions; one engine is shared by all workers, each
/// worker launches its own session from it.
#[async_trait]
pub trait BrowserEngine: Send + Sync {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(content_type: Option<&str>) -> PageResponse {
        PageResponse {
            content_type: content_type.map(str::to_string),
        }
    }

    #[test]
    fn html_content_types_pass_the_gate() {
        assert!(response(Some("text/html")).is_html());
        assert!(response(Some("text/html; charset=utf-8")).is_html());
        assert!(response(Some("Text/HTML")).is_html());
        assert!(response(Some("application/xhtml+xml")).is_html());
    }

    #[test]
    fn non_html_content_types_are_skipped() {
        assert!(!response(Some("application/json")).is_html());
        assert!(!response(Some("application/pdf")).is_html());
        assert!(!response(Some("")).is_html());
        assert!(!response(None).is_html());
    }

    #[test]
    fn session_and_page_objects_cross_task_boundaries() {
        fn assert_send<T: Send + ?Sized>() {}
        fn assert_sync<T: Sync + ?Sized>() {}
        assert_send::<dyn BrowserSession>();
        assert_sync::<dyn BrowserSession>();
        assert_send::<dyn BrowserPage>();
        assert_send::<dyn BrowserEngine>();
        assert_sync::<dyn BrowserEngine>();
    }
}
