//! Content scoring
//!
//! Combined score for one item within one fallback attempt:
//! - Time filter: bounded windows exclude items created outside
//!   `[now - end_days, now - start_days]` unless the item is exempt
//!   (recycled or supplemental supply)
//! - Time decay: linear fade to zero at the attempt's max age
//! - Recency boost: first matching tier multiplier
//! - Video boost for video units
//! - Seeded random term so equal-popularity items still rotate

use chrono::{DateTime, Utc};
use std::collections::HashSet;

use crate::config::{FeedConfig, RecencyTier};

use super::rng::SeededRng;
use super::types::{ContentItem, FallbackAttempt, ScoredItem};

/// Scoring weights (tunable through `FeedConfig`)
#[derive(Debug, Clone, PartialEq)]
pub struct ScoringWeights {
    pub score_weight: f64,
    pub random_scale: f64,
    pub video_boost_multiplier: f64,
    pub recency_tiers: Vec<RecencyTier>,
}

impl From<&FeedConfig> for ScoringWeights {
    fn from(config: &FeedConfig) -> Self {
        Self {
            score_weight: config.score_weight,
            random_scale: config.random_weight,
            video_boost_multiplier: config.video_boost_multiplier,
            recency_tiers: config.recency_boost_tiers.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ContentScorer {
    weights: ScoringWeights,
}

impl ContentScorer {
    pub fn new(weights: ScoringWeights) -> Self {
        Self { weights }
    }

    /// Score a single item, or `None` when it is excluded from this attempt.
    ///
    /// Excluded items do not consume a random draw.
    pub fn score(
        &self,
        item: &ContentItem,
        attempt: &FallbackAttempt,
        now: DateTime<Utc>,
        rng: &mut SeededRng,
        exemptions: &HashSet<String>,
    ) -> Option<f64> {
        let age_days = item.age_days(now)?;

        if let Some(window) = attempt.window.as_bounded() {
            let inside =
                age_days >= window.start_days as f64 && age_days <= window.end_days as f64;
            if !inside && !exemptions.contains(&item.id) {
                return None;
            }
        }

        let recency_multiplier = self.recency_multiplier(age_days);
        let horizon = (attempt.effective_max_age_days() as f64).max(1.0);
        let time_decay = (1.0 - age_days / horizon).max(0.0);

        // Non-finite popularity would turn the product into NaN or infinity
        let popularity = if item.popularity.is_finite() {
            item.popularity.max(0.0)
        } else {
            0.0
        };

        let mut base_score = popularity * time_decay * recency_multiplier;
        if item.is_video_unit() {
            base_score *= self.weights.video_boost_multiplier;
        }

        Some(base_score * self.weights.score_weight + rng.next_f64() * self.weights.random_scale)
    }

    /// Score every item in a pool and sort descending by combined score.
    /// Ties keep input order.
    pub fn rank_pool<'a>(
        &self,
        items: &'a [ContentItem],
        attempt: &FallbackAttempt,
        now: DateTime<Utc>,
        rng: &mut SeededRng,
        exemptions: &HashSet<String>,
    ) -> Vec<ScoredItem<'a>> {
        let mut scored: Vec<ScoredItem<'a>> = items
            .iter()
            .filter_map(|item| {
                self.score(item, attempt, now, rng, exemptions)
                    .map(|combined_score| ScoredItem {
                        item,
                        combined_score,
                    })
            })
            .collect();

        scored.sort_by(|a, b| b.combined_score.total_cmp(&a.combined_score));

        scored
    }

    fn recency_multiplier(&self, age_days: f64) -> f64 {
        self.weights
            .recency_tiers
            .iter()
            .find(|tier| age_days <= tier.max_age_days)
            .map(|tier| tier.multiplier)
            .unwrap_or(1.0)
    }
}
