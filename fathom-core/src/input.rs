//! Input list loading.

use std::path::Path;

use crate::error::{CrawlError, Result};

/// Read the URL list from a tabular file: one record per line, first
/// comma-separated field, no header row assumed. Blank lines are skipped.
///
/// An unreadable file is fatal to the run; it aborts before any concurrent
/// work starts.
pub fn read_url_list(path: &Path) -> Result<Vec<String>> {
    let contents = std::fs::read_to_string(path).map_err(|source| CrawlError::Input {
        path: path.to_path_buf(),
        source,
    })?;

    Ok(contents
        .lines()
        .filter_map(|line| {
            let first = match line.split(',').next() {
                Some(field) => field.trim().trim_matches('"'),
                None => "",
            };
            (!first.is_empty()).then(|| first.to_string())
        })
        .collect())
}
