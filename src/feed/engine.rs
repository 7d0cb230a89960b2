//! Feed Engine
//!
//! Pure ranking pipeline over already-fetched candidates:
//! fallback attempts (score, filter, diversify) -> collection/unit split ->
//! interleave. No I/O, no shared state; safe to run per request.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;
use tracing::debug;

use crate::config::FeedConfig;
use crate::error::Result;

use super::allocate::{allocate, RatioTargets};
use super::fallback::FallbackOrchestrator;
use super::interleave::Interleaver;
use super::scorer::{ContentScorer, ScoringWeights};
use super::types::{ContentItem, RequestContext, ScoredItem};

/// A ranked item as it appears on the page
#[derive(Debug, Clone, Serialize)]
pub struct RankedEntry {
    #[serde(flatten)]
    pub item: ContentItem,
    pub score: f64,
}

/// How the page was produced
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankingMeta {
    pub effective_window: String,
    pub attempt_index: usize,
    pub fallback_used: bool,
    pub applied_cap: usize,
    pub minimum_target: usize,
    pub selected_collections: usize,
    pub selected_units: usize,
    #[serde(flatten)]
    pub targets: RatioTargets,
    pub page_depth: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct RankedPage {
    pub entries: Vec<RankedEntry>,
    pub meta: RankingMeta,
}

#[derive(Debug, Clone)]
pub struct FeedEngine {
    config: FeedConfig,
    scorer: ContentScorer,
    interleaver: Interleaver,
}

impl FeedEngine {
    /// Build an engine; rejects invalid configuration.
    pub fn new(config: FeedConfig) -> Result<Self> {
        config.validate()?;
        let scorer = ContentScorer::new(ScoringWeights::from(&config));
        let interleaver = Interleaver::new(config.interleave_pattern.clone())?;
        Ok(Self {
            config,
            scorer,
            interleaver,
        })
    }

    pub fn config(&self) -> &FeedConfig {
        &self.config
    }

    /// Rank one page. Always returns a page; it may be empty.
    pub fn rank(
        &self,
        collections: &[ContentItem],
        units: &[ContentItem],
        exemptions: &HashSet<String>,
        ctx: &RequestContext,
        now: DateTime<Utc>,
    ) -> RankedPage {
        let orchestrator = FallbackOrchestrator::new(&self.scorer, &self.config);
        let outcome = orchestrator.run(collections, units, exemptions, ctx, now);
        let selection = &outcome.selection;

        let targets = allocate(
            selection.selected_collections.len(),
            ctx.limit,
            self.config.collection_max_share,
        );

        let page_collections = take_entries(&selection.selected_collections, targets.target_collections);
        let page_units = take_entries(&selection.selected_units, targets.target_units);
        let entries = self
            .interleaver
            .interleave(page_collections, page_units, ctx.limit);

        let meta = RankingMeta {
            effective_window: outcome.effective_window(),
            attempt_index: outcome.attempt_index,
            fallback_used: outcome.fallback_used(),
            applied_cap: selection.applied_cap,
            minimum_target: outcome.minimum_target,
            selected_collections: selection.selected_collections.len(),
            selected_units: selection.selected_units.len(),
            targets,
            page_depth: ctx.page_depth,
        };

        debug!(
            entries = entries.len(),
            window = %meta.effective_window,
            fallback_used = meta.fallback_used,
            applied_cap = meta.applied_cap,
            "Ranked feed page"
        );

        RankedPage { entries, meta }
    }
}

fn take_entries(selected: &[ScoredItem<'_>], count: usize) -> Vec<RankedEntry> {
    selected
        .iter()
        .take(count)
        .map(|scored| RankedEntry {
            item: scored.item.clone(),
            score: scored.combined_score,
        })
        .collect()
}
