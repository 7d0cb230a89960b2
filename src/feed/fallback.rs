//! Fallback orchestration
//!
//! Walks the widening attempt sequence and accepts the first attempt whose
//! diversified selection clears that attempt's minimum. The final attempt is
//! unrestricted and always accepted, so ranking always terminates with a
//! (possibly empty) selection.

use chrono::{DateTime, Utc};
use std::collections::HashSet;
use tracing::debug;

use crate::config::FeedConfig;

use super::diversify::relax_pools;
use super::rng::{attempt_seed, SeededRng};
use super::scorer::ContentScorer;
use super::types::{
    AttemptWindow, ContentItem, DiversificationResult, FallbackAttempt, RequestContext,
};
use super::window::{build_fallback_sequence, build_primary_window};

/// Minimum acceptable combined count for an attempt. Expectations drop as the
/// window widens: 100%, 80%, 60%, then 40% of `limit`, never below one.
pub fn minimum_target(limit: usize, attempt_index: usize) -> usize {
    let percent = match attempt_index {
        0 => 100,
        1 => 80,
        2 => 60,
        _ => 40,
    };
    // integer ceil; float shares misround (15 * 0.4 > 6.0)
    (limit.saturating_mul(percent).div_ceil(100)).max(1)
}

/// The accepted attempt and its selection
#[derive(Debug, Clone)]
pub struct FallbackOutcome<'a> {
    pub selection: DiversificationResult<'a>,
    pub attempt_index: usize,
    pub window: AttemptWindow,
    pub minimum_target: usize,
}

impl FallbackOutcome<'_> {
    pub fn fallback_used(&self) -> bool {
        self.attempt_index > 0
    }

    pub fn effective_window(&self) -> String {
        self.window.label()
    }
}

pub struct FallbackOrchestrator<'c> {
    scorer: &'c ContentScorer,
    config: &'c FeedConfig,
}

impl<'c> FallbackOrchestrator<'c> {
    pub fn new(scorer: &'c ContentScorer, config: &'c FeedConfig) -> Self {
        Self { scorer, config }
    }

    /// Attempt list for a request: primary window first, unrestricted last.
    pub fn plan(&self, ctx: &RequestContext) -> Vec<FallbackAttempt> {
        let primary = build_primary_window(ctx.limit, ctx.page_depth, self.config);
        build_fallback_sequence(primary, self.config)
    }

    /// Plan the attempts for `ctx` and run them.
    pub fn run<'a>(
        &self,
        collections: &'a [ContentItem],
        units: &'a [ContentItem],
        exemptions: &HashSet<String>,
        ctx: &RequestContext,
        now: DateTime<Utc>,
    ) -> FallbackOutcome<'a> {
        let attempts = self.plan(ctx);
        self.run_attempts(&attempts, collections, units, exemptions, ctx, now)
    }

    /// Evaluate attempts in order until one is accepted.
    pub fn run_attempts<'a>(
        &self,
        attempts: &[FallbackAttempt],
        collections: &'a [ContentItem],
        units: &'a [ContentItem],
        exemptions: &HashSet<String>,
        ctx: &RequestContext,
        now: DateTime<Utc>,
    ) -> FallbackOutcome<'a> {
        let Some((last, leading)) = attempts.split_last() else {
            return FallbackOutcome {
                selection: DiversificationResult {
                    selected_collections: Vec::new(),
                    selected_units: Vec::new(),
                    applied_cap: ctx.per_author_cap.max(1),
                    combined_count: 0,
                },
                attempt_index: 0,
                window: AttemptWindow::Unrestricted,
                minimum_target: minimum_target(ctx.limit, 0),
            };
        };

        for (index, attempt) in leading.iter().enumerate() {
            let outcome = self.evaluate(index, attempt, collections, units, exemptions, ctx, now);
            if outcome.selection.combined_count >= outcome.minimum_target {
                return outcome;
            }
            debug!(
                attempt = index,
                window = %attempt.window.label(),
                selected = outcome.selection.combined_count,
                target = outcome.minimum_target,
                "Fallback attempt below target, widening"
            );
        }

        self.evaluate(leading.len(), last, collections, units, exemptions, ctx, now)
    }

    #[allow(clippy::too_many_arguments)]
    fn evaluate<'a>(
        &self,
        index: usize,
        attempt: &FallbackAttempt,
        collections: &'a [ContentItem],
        units: &'a [ContentItem],
        exemptions: &HashSet<String>,
        ctx: &RequestContext,
        now: DateTime<Utc>,
    ) -> FallbackOutcome<'a> {
        let target = minimum_target(ctx.limit, index);
        let mut rng =
            SeededRng::from_seed(attempt_seed(ctx.random_seed, index, self.config.seed_step));

        let ranked_collections = self
            .scorer
            .rank_pool(collections, attempt, now, &mut rng, exemptions);
        let ranked_units = self
            .scorer
            .rank_pool(units, attempt, now, &mut rng, exemptions);

        let selection = relax_pools(
            &ranked_collections,
            &ranked_units,
            ctx.per_author_cap,
            self.config.max_relaxation_steps,
            target,
        );

        debug!(
            attempt = index,
            window = %attempt.window.label(),
            scored_collections = ranked_collections.len(),
            scored_units = ranked_units.len(),
            selected = selection.combined_count,
            applied_cap = selection.applied_cap,
            "Evaluated fallback attempt"
        );

        FallbackOutcome {
            selection,
            attempt_index: index,
            window: attempt.window,
            minimum_target: target,
        }
    }
}
