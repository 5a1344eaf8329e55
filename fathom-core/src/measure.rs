//! Height measurement model and the in-page probe.

use serde::Deserialize;

/// One successfully measured page: the URL and its rendered height in
/// pixels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Measurement {
    pub url: String,
    pub height: u64,
}

/// Raw height candidates reported by the in-page probe.
///
/// No single DOM metric is reliable across page layouts: short documents
/// report their height through the viewport client height, long ones
/// through scroll height, and offset height catches borders the others
/// miss. The recorded height is always the maximum of all five.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct HeightMetrics {
    pub body_scroll_height: u64,
    pub body_offset_height: u64,
    pub document_client_height: u64,
    pub document_scroll_height: u64,
    pub document_offset_height: u64,
}

impl HeightMetrics {
    /// Max-of-candidates policy for the recorded height.
    pub fn max_candidate(&self) -> u64 {
        self.body_scroll_height
            .max(self.body_offset_height)
            .max(self.document_client_height)
            .max(self.document_scroll_height)
            .max(self.document_offset_height)
    }
}

/// Expression evaluated in the page after navigation. Field names line up
/// with [`HeightMetrics`] so the result deserializes directly.
pub const HEIGHT_PROBE: &str = r#"({
    body_scroll_height: document.body.scrollHeight,
    body_offset_height: document.body.offsetHeight,
    document_client_height: document.documentElement.clientHeight,
    document_scroll_height: document.documentElement.scrollHeight,
    document_offset_height: document.documentElement.offsetHeight
})"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_page_beats_viewport_height() {
        let metrics = HeightMetrics {
            body_scroll_height: 2000,
            document_client_height: 800,
            ..Default::default()
        };
        assert_eq!(metrics.max_candidate(), 2000);
    }

    #[test]
    fn short_page_falls_back_to_client_height() {
        let metrics = HeightMetrics {
            body_scroll_height: 120,
            body_offset_height: 120,
            document_client_height: 800,
            document_scroll_height: 120,
            document_offset_height: 120,
        };
        assert_eq!(metrics.max_candidate(), 800);
    }

    #[test]
    fn empty_metrics_measure_zero() {
        assert_eq!(HeightMetrics::default().max_candidate(), 0);
    }

    #[test]
    fn probe_result_deserializes() {
        let metrics: HeightMetrics = serde_json::from_str(
            r#"{
                "body_scroll_height": 1500,
                "body_offset_height": 1500,
                "document_client_height": 800,
                "document_scroll_height": 1500,
                "document_offset_height": 1502
            }"#,
        )
        .expect("probe JSON should decode");
        assert_eq!(metrics.max_candidate(), 1502);
    }
}
