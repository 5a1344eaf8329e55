use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CrawlError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to read URL list {path}: {source}")]
    Input {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("Navigation timed out after {0:?}")]
    NavigationTimeout(Duration),

    #[error("Height probe result could not be decoded: {0}")]
    Probe(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<chromiumoxide::error::CdpError> for CrawlError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        CrawlError::Browser(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CrawlError>;
