//! Feed Metrics and Performance Monitoring
//!
//! Per-request metrics for page quality and latency. Counters and histograms
//! go through the `metrics` facade; with the `prometheus` feature the binary
//! installs an exporter, otherwise they are no-ops.

use serde::Serialize;
use std::collections::HashSet;
use std::time::Instant;

use super::engine::RankedPage;
use super::types::ContentKind;

/// Metrics for a single discover request
#[derive(Debug, Clone, Serialize)]
pub struct FeedMetrics {
    pub request_id: String,
    pub timestamp: i64,

    // Performance
    pub total_duration_ms: u64,
    pub candidate_fetch_ms: u64,
    pub ranking_duration_ms: u64,

    // Supply
    pub collections_fetched: usize,
    pub units_fetched: usize,
    pub recycled_items: usize,

    // Page quality
    pub items_returned: usize,
    pub limit: usize,
    pub unique_authors: usize,
    pub collections_returned: usize,
    pub fallback_used: bool,
    pub attempt_index: usize,
    pub base_cap: usize,
    pub applied_cap: usize,
    pub effective_window: String,
}

impl Default for FeedMetrics {
    fn default() -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            timestamp: chrono::Utc::now().timestamp(),
            total_duration_ms: 0,
            candidate_fetch_ms: 0,
            ranking_duration_ms: 0,
            collections_fetched: 0,
            units_fetched: 0,
            recycled_items: 0,
            items_returned: 0,
            limit: 0,
            unique_authors: 0,
            collections_returned: 0,
            fallback_used: false,
            attempt_index: 0,
            base_cap: 0,
            applied_cap: 0,
            effective_window: String::new(),
        }
    }
}

impl FeedMetrics {
    /// Fill the page-derived fields from a ranked page.
    pub fn record_page(&mut self, page: &RankedPage, limit: usize, base_cap: usize) {
        self.limit = limit;
        self.base_cap = base_cap;
        self.items_returned = page.entries.len();
        self.unique_authors = page
            .entries
            .iter()
            .map(|e| e.item.author_id.as_str())
            .collect::<HashSet<_>>()
            .len();
        self.collections_returned = page
            .entries
            .iter()
            .filter(|e| e.item.kind == ContentKind::Collection)
            .count();
        self.fallback_used = page.meta.fallback_used;
        self.attempt_index = page.meta.attempt_index;
        self.applied_cap = page.meta.applied_cap;
        self.effective_window = page.meta.effective_window.clone();
    }

    /// Push to the metrics recorder.
    pub fn emit(&self) {
        metrics::counter!("feed_requests_total").increment(1);
        if self.fallback_used {
            metrics::counter!(
                "feed_fallback_total",
                "attempt" => self.attempt_index.to_string()
            )
            .increment(1);
        }
        metrics::histogram!("feed_page_size").record(self.items_returned as f64);
        metrics::histogram!("feed_ranking_duration_ms").record(self.ranking_duration_ms as f64);
        metrics::histogram!("feed_candidate_fetch_ms").record(self.candidate_fetch_ms as f64);
    }
}

/// Timer for tracking operation duration
pub struct PerformanceTimer {
    start: Instant,
    label: &'static str,
}

impl PerformanceTimer {
    pub fn new(label: &'static str) -> Self {
        Self {
            start: Instant::now(),
            label,
        }
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    pub fn log_if_slow(&self, threshold_ms: u64) {
        let elapsed = self.elapsed_ms();
        if elapsed > threshold_ms {
            tracing::warn!(
                operation = self.label,
                elapsed_ms = elapsed,
                threshold_ms,
                "Slow operation"
            );
        }
    }
}

impl Drop for PerformanceTimer {
    fn drop(&mut self) {
        tracing::trace!(operation = self.label, elapsed_ms = self.elapsed_ms(), "Timer done");
    }
}

/// Share of distinct authors on the page (0-1, higher is better)
pub fn author_diversity(unique_authors: usize, items_returned: usize) -> f64 {
    if items_returned == 0 {
        return 0.0;
    }
    unique_authors as f64 / items_returned as f64
}

/// Flag pages worth a look in the logs.
pub fn detect_issues(metrics: &FeedMetrics) -> Vec<String> {
    let mut issues = Vec::new();

    if metrics.items_returned < metrics.limit {
        issues.push(format!(
            "Short page: {}/{} items",
            metrics.items_returned, metrics.limit
        ));
    }

    let diversity = author_diversity(metrics.unique_authors, metrics.items_returned);
    if metrics.items_returned > 0 && diversity < 0.3 {
        issues.push(format!("Low author diversity: {:.2}", diversity));
    }

    if metrics.total_duration_ms > 200 {
        issues.push(format!("Slow response: {}ms", metrics.total_duration_ms));
    }

    if metrics.fallback_used && metrics.effective_window == "all-time" {
        issues.push("Served from unrestricted fallback".to_string());
    }

    if metrics.applied_cap > metrics.base_cap {
        issues.push(format!(
            "Author cap relaxed: {} -> {}",
            metrics.base_cap, metrics.applied_cap
        ));
    }

    if metrics.recycled_items > 0 {
        issues.push(format!("Recycled {} items", metrics.recycled_items));
    }

    issues
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_author_diversity() {
        assert_eq!(author_diversity(0, 0), 0.0);
        assert_eq!(author_diversity(10, 10), 1.0);
        assert!(author_diversity(2, 10) < 0.3);
    }

    #[test]
    fn test_request_ids_unique() {
        let a = FeedMetrics::default();
        let b = FeedMetrics::default();
        assert_ne!(a.request_id, b.request_id);
    }

    #[test]
    fn test_detect_issues() {
        let metrics = FeedMetrics {
            limit: 20,
            items_returned: 10,
            unique_authors: 2,
            total_duration_ms: 250,
            fallback_used: true,
            effective_window: "all-time".to_string(),
            base_cap: 2,
            applied_cap: 4,
            ..Default::default()
        };

        let issues = detect_issues(&metrics);
        assert!(issues.iter().any(|i| i.contains("Short page")));
        assert!(issues.iter().any(|i| i.contains("Low author diversity")));
        assert!(issues.iter().any(|i| i.contains("Slow response")));
        assert!(issues.iter().any(|i| i.contains("unrestricted")));
        assert!(issues.iter().any(|i| i.contains("2 -> 4")));
    }

    #[test]
    fn test_healthy_page_has_no_issues() {
        let metrics = FeedMetrics {
            limit: 20,
            items_returned: 20,
            unique_authors: 15,
            total_duration_ms: 12,
            base_cap: 2,
            applied_cap: 2,
            effective_window: "0-7d".to_string(),
            ..Default::default()
        };
        assert!(detect_issues(&metrics).is_empty());
    }

    #[test]
    fn test_emit_without_recorder_is_noop() {
        let metrics = FeedMetrics {
            fallback_used: true,
            attempt_index: 2,
            ..Default::default()
        };
        metrics.emit();
    }
}
