//! Time window planning.
//!
//! Page `n` looks at `[n * stride, n * stride + length]` days back, where
//! consecutive windows overlap by at least one day. When a window comes back
//! too thin, the fallback sequence widens it step by step and finally drops
//! the time restriction altogether.

use crate::config::FeedConfig;

use super::types::{AttemptWindow, FallbackAttempt, TimeWindow};

/// Primary window for a page at `page_depth`.
pub fn build_primary_window(limit: usize, page_depth: u32, config: &FeedConfig) -> TimeWindow {
    let needed_days = (limit as f64 / config.items_per_day_target).ceil();
    let window_length = config.min_window_days.max(needed_days.min(u32::MAX as f64) as u32);

    let overlap_days = ((window_length as f64 * config.overlap_ratio).floor() as u32).max(1);
    let stride = window_length.saturating_sub(overlap_days).max(1);

    let start_days = page_depth.saturating_mul(stride);
    let end_days = start_days.saturating_add(window_length);

    TimeWindow {
        start_days,
        end_days,
        max_age_days: end_days.max(config.default_max_age_days),
    }
}

/// Ordered attempts: the primary window, one widened window per configured
/// step, then an unrestricted attempt.
pub fn build_fallback_sequence(primary: TimeWindow, config: &FeedConfig) -> Vec<FallbackAttempt> {
    let mut attempts = Vec::with_capacity(config.fallback_window_steps.len() + 2);
    attempts.push(FallbackAttempt {
        window: AttemptWindow::Bounded(primary),
        min_age_fallback: primary.max_age_days,
    });

    let mut end_days = primary.end_days;
    let mut max_age_days = primary.max_age_days;

    for step in &config.fallback_window_steps {
        end_days = end_days.max(primary.end_days.saturating_add(step.expand_end_days));
        max_age_days = max_age_days.max(step.max_age_days);

        attempts.push(FallbackAttempt {
            window: AttemptWindow::Bounded(TimeWindow {
                start_days: 0,
                end_days,
                max_age_days,
            }),
            min_age_fallback: max_age_days,
        });
    }

    attempts.push(FallbackAttempt {
        window: AttemptWindow::Unrestricted,
        min_age_fallback: max_age_days,
    });

    attempts
}
