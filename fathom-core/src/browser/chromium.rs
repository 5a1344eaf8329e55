//! chromiumoxide-backed browser engine.
//!
//! Each session is one headless Chromium process with its own CDP handler
//! loop. Navigation content types are taken from the first `Document`
//! network response on the page, so the skip policy sees the declared
//! header before any in-page evaluation runs.

use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::{
    EnableParams, EventResponseReceived, ResourceType,
};
use chromiumoxide::handler::viewport::Viewport;
use chromiumoxide::page::Page;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::debug;

use super::{BrowserEngine, BrowserPage, BrowserSession, LaunchOptions, PageResponse};
use crate::error::{CrawlError, Result};
use crate::measure::{HEIGHT_PROBE, HeightMetrics};

/// Flags for running inside containers and other restricted environments
/// where the Chromium sandbox cannot be set up.
const CHROME_ARGS: [&str; 3] = [
    "--no-sandbox",
    "--disable-setuid-sandbox",
    "--disable-web-security",
];

/// How long to wait for the navigation response event after `goto` has
/// settled. The event almost always arrives during navigation itself.
const CONTENT_TYPE_WAIT: Duration = Duration::from_secs(2);

/// [`BrowserEngine`] launching headless Chromium via the DevTools protocol.
#[derive(Debug, Clone)]
pub struct ChromiumEngine {
    options: LaunchOptions,
}

impl ChromiumEngine {
    pub fn new(options: LaunchOptions) -> Self {
        Self { options }
    }
}

#[async_trait]
impl BrowserEngine for ChromiumEngine {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>> {
        let mut builder = BrowserConfig::builder()
            .viewport(Viewport {
                width: self.options.viewport_width,
                height: self.options.viewport_height,
                ..Viewport::default()
            })
            .args(CHROME_ARGS);
        if !self.options.headless {
            builder = builder.with_head();
        }
        if let Some(executable) = &self.options.executable {
            builder = builder.chrome_executable(executable);
        }
        let config = builder.build().map_err(CrawlError::Browser)?;

        let (browser, mut handler) = Browser::launch(config).await?;

        // The handler must be polled for the whole session lifetime or
        // every CDP call stalls.
        let handler_loop = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        Ok(Box::new(ChromiumSession {
            browser,
            handler_loop,
            navigation_timeout: self.options.navigation_timeout,
        }))
    }
}

struct ChromiumSession {
    browser: Browser,
    handler_loop: JoinHandle<()>,
    navigation_timeout: Duration,
}

#[async_trait]
impl BrowserSession for ChromiumSession {
    async fn open_page(&self) -> Result<Box<dyn BrowserPage>> {
        let page = self.browser.new_page("about:blank").await?;
        // Network events carry the response headers we gate on.
        page.execute(EnableParams::default()).await?;
        Ok(Box::new(ChromiumPage {
            page,
            navigation_timeout: self.navigation_timeout,
        }))
    }

    async fn close(mut self: Box<Self>) -> Result<()> {
        let closed = self.browser.close().await;
        if let Err(e) = self.browser.wait().await {
            debug!("Browser process did not exit cleanly: {}", e);
        }
        self.handler_loop.abort();
        closed?;
        Ok(())
    }
}

struct ChromiumPage {
    page: Page,
    navigation_timeout: Duration,
}

#[async_trait]
impl BrowserPage for ChromiumPage {
    async fn navigate(&mut self, url: &str) -> Result<PageResponse> {
        let mut responses = self.page.event_listener::<EventResponseReceived>().await?;

        // Scan for the navigation response concurrently with the navigation
        // itself: the first Document-type response on this target is the
        // navigation response, redirects included. Running the scan up front
        // means a page with no Document event only costs the grace period
        // when the event genuinely never arrived, not on every navigation.
        let mut scan = tokio::spawn(async move {
            while let Some(event) = responses.next().await {
                if event.r#type == ResourceType::Document {
                    return Some(event.response.mime_type.clone());
                }
            }
            None
        });

        let navigated = timeout(self.navigation_timeout, self.page.goto(url))
            .await
            .map_err(|_| CrawlError::NavigationTimeout(self.navigation_timeout));
        if let Err(e) = navigated.and_then(|goto| goto.map_err(CrawlError::from)) {
            scan.abort();
            return Err(e);
        }

        let content_type = match timeout(CONTENT_TYPE_WAIT, &mut scan).await {
            Ok(Ok(content_type)) => content_type,
            Ok(Err(_)) => None,
            Err(_) => {
                scan.abort();
                None
            }
        };

        Ok(PageResponse { content_type })
    }

    async fn height_metrics(&self) -> Result<HeightMetrics> {
        let evaluated = timeout(self.navigation_timeout, self.page.evaluate(HEIGHT_PROBE))
            .await
            .map_err(|_| CrawlError::NavigationTimeout(self.navigation_timeout))??;
        Ok(evaluated.into_value()?)
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.page.close().await?;
        Ok(())
    }
}
