//! Settings for the fathom crawler.
//!
//! One serde-deserializable struct covers every knob the pipeline exposes.
//! Load order: an explicit file path wins, then `$FATHOM_CONFIG_PATH`
//! (TOML or JSON file), then `$FATHOM_CONFIG_JSON` (inline JSON), then
//! built-in defaults. CLI flag overrides are applied by the binary after
//! loading.

use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{env, fs};

use anyhow::{Context, anyhow};
use fathom_core::browser::LaunchOptions;
use fathom_core::crawler::CrawlOptions;
use serde::{Deserialize, Serialize};

/// Source that produced the crawl settings.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SettingsSource {
    #[default]
    Default,
    Explicit(PathBuf),
    EnvPath(PathBuf),
    EnvInline,
}

/// Top-level crawl settings: where the URL list lives, where rows go, and
/// how hard to drive the browser pool and the batch writer.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CrawlSettings {
    /// Tabular input file; one URL per line, first column.
    pub input_file: PathBuf,
    /// CSV output file. Created or truncated at crawl start.
    pub output_file: PathBuf,
    /// Concurrency degree: one browser session per worker. Raise to crawl
    /// faster, but each session is a full Chromium process.
    pub num_workers: usize,
    /// Writer flush threshold. The writer only appends once this many
    /// measurements are buffered; lower values flush more often.
    pub batch_size: usize,
    /// Writer polling interval in milliseconds.
    pub poll_interval_ms: u64,
    /// Per-navigation (and per-probe) timeout in seconds. Expired
    /// navigations count as per-URL failures, not fatal errors.
    pub navigation_timeout_secs: u64,
    /// Fixed viewport so height results are reproducible across runs.
    pub viewport_width: u32,
    pub viewport_height: u32,
    /// Headless unless explicitly disabled.
    pub headless: bool,
    /// Explicit Chromium binary; autodetected when unset.
    pub chrome_executable: Option<PathBuf>,
}

impl Default for CrawlSettings {
    fn default() -> Self {
        Self {
            input_file: PathBuf::new(),
            output_file: PathBuf::new(),
            num_workers: 4,
            batch_size: 50,
            poll_interval_ms: 5_000,
            navigation_timeout_secs: 30,
            viewport_width: 1200,
            viewport_height: 800,
            headless: true,
            chrome_executable: None,
        }
    }
}

impl CrawlSettings {
    /// Load settings. Evaluation order:
    /// 1) `explicit` path argument,
    /// 2) `$FATHOM_CONFIG_PATH` (TOML or JSON file),
    /// 3) `$FATHOM_CONFIG_JSON` (inline JSON),
    /// 4) defaults if none is set.
    pub fn load(explicit: Option<&Path>) -> anyhow::Result<(Self, SettingsSource)> {
        if let Some(path) = explicit {
            let settings = Self::from_file(path)?;
            return Ok((settings, SettingsSource::Explicit(path.to_path_buf())));
        }

        if let Ok(path_str) = env::var("FATHOM_CONFIG_PATH")
            && !path_str.trim().is_empty()
        {
            let path = PathBuf::from(path_str);
            let settings = Self::from_file(&path)?;
            return Ok((settings, SettingsSource::EnvPath(path)));
        }

        if let Ok(inline) = env::var("FATHOM_CONFIG_JSON")
            && !inline.trim().is_empty()
        {
            let settings = serde_json::from_str(&inline)
                .context("Failed to parse FATHOM_CONFIG_JSON")?;
            return Ok((settings, SettingsSource::EnvInline));
        }

        Ok((Self::default(), SettingsSource::Default))
    }

    /// Parse a settings file as TOML, falling back to JSON for `.json`
    /// extensions.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file {}", path.display()))?;
        if path.extension().is_some_and(|ext| ext == "json") {
            serde_json::from_str(&contents)
                .with_context(|| format!("Invalid JSON settings in {}", path.display()))
        } else {
            toml::from_str(&contents)
                .with_context(|| format!("Invalid TOML settings in {}", path.display()))
        }
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.input_file.as_os_str().is_empty() {
            return Err(anyhow!("input_file must be set (settings file or --input)"));
        }
        if self.output_file.as_os_str().is_empty() {
            return Err(anyhow!("output_file must be set (settings file or --output)"));
        }
        if self.num_workers == 0 {
            return Err(anyhow!("num_workers must be at least 1"));
        }
        if self.batch_size == 0 {
            return Err(anyhow!("batch_size must be at least 1"));
        }
        if self.poll_interval_ms == 0 {
            return Err(anyhow!("poll_interval_ms must be at least 1"));
        }
        if self.viewport_width == 0 || self.viewport_height == 0 {
            return Err(anyhow!("viewport dimensions must be nonzero"));
        }
        Ok(())
    }

    /// Browser launch options for the engine.
    pub fn launch_options(&self) -> LaunchOptions {
        LaunchOptions {
            headless: self.headless,
            viewport_width: self.viewport_width,
            viewport_height: self.viewport_height,
            navigation_timeout: Duration::from_secs(self.navigation_timeout_secs),
            executable: self.chrome_executable.clone(),
        }
    }

    /// Pipeline tuning options for the orchestrator.
    pub fn crawl_options(&self) -> CrawlOptions {
        CrawlOptions {
            num_workers: self.num_workers,
            batch_size: self.batch_size,
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            ..CrawlOptions::default()
        }
    }
}
