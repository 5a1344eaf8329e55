//! Scripted browser engine used to drive the pipeline in tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use fathom_core::browser::{BrowserEngine, BrowserPage, BrowserSession, PageResponse};
use fathom_core::error::{CrawlError, Result};
use fathom_core::measure::HeightMetrics;

/// Scripted behaviour for one URL.
#[derive(Debug, Clone)]
pub enum PageScript {
    /// HTML response with the given probe metrics.
    Html(HeightMetrics),
    /// Response declaring a non-HTML content type.
    NonHtml(&'static str),
    /// Navigation fails.
    NavigationError(&'static str),
    /// Navigation succeeds as HTML but the height probe fails.
    EvaluationError(&'static str),
}

/// HTML page whose only nonzero candidate is the body scroll height.
pub fn html_page(height: u64) -> PageScript {
    PageScript::Html(HeightMetrics {
        body_scroll_height: height,
        ..Default::default()
    })
}

/// Counters shared across every session the engine launches.
#[derive(Debug, Default)]
pub struct EngineCounters {
    pub launches: AtomicUsize,
    pub sessions_closed: AtomicUsize,
    pub pages_opened: AtomicUsize,
    pub pages_closed: AtomicUsize,
}

/// [`BrowserEngine`] that replays scripted responses instead of driving a
/// real browser.
#[derive(Debug)]
pub struct ScriptedEngine {
    scripts: Arc<HashMap<String, PageScript>>,
    fail_launches: AtomicUsize,
    pub counters: Arc<EngineCounters>,
}

impl ScriptedEngine {
    pub fn new<I>(scripts: I) -> Self
    where
        I: IntoIterator<Item = (&'static str, PageScript)>,
    {
        Self {
            scripts: Arc::new(
                scripts
                    .into_iter()
                    .map(|(url, script)| (url.to_string(), script))
                    .collect(),
            ),
            fail_launches: AtomicUsize::new(0),
            counters: Arc::new(EngineCounters::default()),
        }
    }

    /// Make the first `n` launches fail with a session-level error.
    pub fn with_failing_launches(self, n: usize) -> Self {
        self.fail_launches.store(n, Ordering::SeqCst);
        self
    }
}

#[async_trait]
impl BrowserEngine for ScriptedEngine {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>> {
        self.counters.launches.fetch_add(1, Ordering::SeqCst);
        let failed = self
            .fail_launches
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            return Err(CrawlError::Browser("scripted launch failure".to_string()));
        }
        Ok(Box::new(ScriptedSession {
            scripts: self.scripts.clone(),
            counters: self.counters.clone(),
        }))
    }
}

struct ScriptedSession {
    scripts: Arc<HashMap<String, PageScript>>,
    counters: Arc<EngineCounters>,
}

#[async_trait]
impl BrowserSession for ScriptedSession {
    async fn open_page(&self) -> Result<Box<dyn BrowserPage>> {
        self.counters.pages_opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedPage {
            scripts: self.scripts.clone(),
            counters: self.counters.clone(),
            current: None,
        }))
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.counters.sessions_closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct ScriptedPage {
    scripts: Arc<HashMap<String, PageScript>>,
    counters: Arc<EngineCounters>,
    current: Option<PageScript>,
}

#[async_trait]
impl BrowserPage for ScriptedPage {
    async fn navigate(&mut self, url: &str) -> Result<PageResponse> {
        let script = self
            .scripts
            .get(url)
            .cloned()
            .unwrap_or(PageScript::NavigationError("no script for URL"));
        match script {
            PageScript::Html(_) | PageScript::EvaluationError(_) => {
                self.current = Some(script);
                Ok(PageResponse {
                    content_type: Some("text/html; charset=utf-8".to_string()),
                })
            }
            PageScript::NonHtml(content_type) => Ok(PageResponse {
                content_type: Some(content_type.to_string()),
            }),
            PageScript::NavigationError(message) => {
                Err(CrawlError::Browser(message.to_string()))
            }
        }
    }

    async fn height_metrics(&self) -> Result<HeightMetrics> {
        match &self.current {
            Some(PageScript::Html(metrics)) => Ok(*metrics),
            Some(PageScript::EvaluationError(message)) => {
                Err(CrawlError::Browser(message.to_string()))
            }
            _ => Err(CrawlError::Internal(
                "height probe without a navigated page".to_string(),
            )),
        }
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.counters.pages_closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
