//! Feed Service
//!
//! Request-level orchestration around the pure engine: limits and seeds,
//! continuation tokens, candidate fetching with wrap-around recycling,
//! ranking, soft shuffle and metrics.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::config::FeedConfig;
use crate::error::{Error, Result};

use super::cursor::ContinuationToken;
use super::engine::{FeedEngine, RankedEntry, RankingMeta};
use super::metrics::{detect_issues, FeedMetrics, PerformanceTimer};
use super::shuffle::{soft_shuffle, JitterShuffle, SoftShuffle};
use super::store::CandidateStore;
use super::types::{ContentItem, ContentKind, RequestContext};

const SLOW_FETCH_MS: u64 = 100;
const SLOW_RANKING_MS: u64 = 50;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FeedRequest {
    pub limit: Option<usize>,
    pub per_author_cap: Option<usize>,
    pub seed: Option<f64>,
    pub collections_cursor: Option<String>,
    pub units_cursor: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NextCursors {
    pub collections_cursor: String,
    pub units_cursor: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PageMeta {
    #[serde(flatten)]
    pub ranking: RankingMeta,
    pub request_id: String,
    pub limit: usize,
    pub per_author_cap: usize,
    pub seed: f64,
    pub recycled_items: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct FeedPage {
    pub items: Vec<RankedEntry>,
    pub next: NextCursors,
    pub meta: PageMeta,
}

/// Candidates for one pool plus where to resume
struct PoolFetch {
    items: Vec<ContentItem>,
    exempt: Vec<String>,
    next: ContinuationToken,
}

pub struct FeedService {
    engine: FeedEngine,
    store: Arc<dyn CandidateStore>,
    shuffler: Arc<dyn SoftShuffle>,
}

impl FeedService {
    pub fn new(config: FeedConfig, store: Arc<dyn CandidateStore>) -> Result<Self> {
        Ok(Self {
            engine: FeedEngine::new(config)?,
            store,
            shuffler: Arc::new(JitterShuffle),
        })
    }

    /// Replace the default soft shuffle strategy.
    pub fn with_shuffle(mut self, shuffler: Arc<dyn SoftShuffle>) -> Self {
        self.shuffler = shuffler;
        self
    }

    pub fn config(&self) -> &FeedConfig {
        self.engine.config()
    }

    pub async fn discover(&self, request: FeedRequest) -> Result<FeedPage> {
        self.discover_at(request, Utc::now()).await
    }

    /// Serve one page as of `now`.
    #[instrument(skip(self, request), fields(limit = ?request.limit, seed = ?request.seed))]
    pub async fn discover_at(&self, request: FeedRequest, now: DateTime<Utc>) -> Result<FeedPage> {
        let total_timer = PerformanceTimer::new("discover");
        let mut metrics = FeedMetrics::default();
        let config = self.engine.config();

        let limit = resolve_limit(request.limit, config)?;
        let per_author_cap = match request.per_author_cap {
            Some(0) => return Err(Error::bad_request("per_author_cap must be at least 1")),
            Some(cap) => cap,
            None => config.default_per_author_cap,
        };
        let seed = resolve_seed(request.seed)?;

        let collections_token =
            ContinuationToken::decode(ContentKind::Collection, request.collections_cursor.as_deref())?;
        let units_token = ContinuationToken::decode(ContentKind::Unit, request.units_cursor.as_deref())?;
        let page_depth = collections_token.page_depth.max(units_token.page_depth);

        let fetch_timer = PerformanceTimer::new("candidate_fetch");
        let (collections, units) = tokio::try_join!(
            self.fetch_pool(ContentKind::Collection, limit, page_depth, &collections_token),
            self.fetch_pool(ContentKind::Unit, limit, page_depth, &units_token),
        )?;
        metrics.candidate_fetch_ms = fetch_timer.elapsed_ms();
        fetch_timer.log_if_slow(SLOW_FETCH_MS);

        metrics.collections_fetched = collections.items.len();
        metrics.units_fetched = units.items.len();
        metrics.recycled_items = collections.exempt.len() + units.exempt.len();

        let exemptions: HashSet<String> = collections
            .exempt
            .iter()
            .chain(units.exempt.iter())
            .cloned()
            .collect();

        let ctx = RequestContext {
            limit,
            per_author_cap,
            page_depth,
            random_seed: seed,
        };

        let ranking_timer = PerformanceTimer::new("ranking");
        let ranked = self
            .engine
            .rank(&collections.items, &units.items, &exemptions, &ctx, now);
        metrics.ranking_duration_ms = ranking_timer.elapsed_ms();
        ranking_timer.log_if_slow(SLOW_RANKING_MS);

        metrics.record_page(&ranked, limit, per_author_cap);
        let items = soft_shuffle(
            self.shuffler.as_ref(),
            ranked.entries,
            config.shuffle_softness,
            seed,
        );

        let next = NextCursors {
            collections_cursor: collections.next.encode()?,
            units_cursor: units.next.encode()?,
        };

        metrics.total_duration_ms = total_timer.elapsed_ms();
        metrics.emit();
        let issues = detect_issues(&metrics);
        if !issues.is_empty() {
            warn!(request_id = %metrics.request_id, ?issues, "Feed page quality issues");
        }

        info!(
            request_id = %metrics.request_id,
            items = items.len(),
            page_depth,
            window = %ranked.meta.effective_window,
            fallback_used = ranked.meta.fallback_used,
            duration_ms = metrics.total_duration_ms,
            "Served discover page"
        );

        Ok(FeedPage {
            items,
            next,
            meta: PageMeta {
                ranking: ranked.meta,
                request_id: metrics.request_id,
                limit,
                per_author_cap,
                seed,
                recycled_items: metrics.recycled_items,
            },
        })
    }

    async fn fetch_pool(
        &self,
        kind: ContentKind,
        limit: usize,
        page_depth: u32,
        token: &ContinuationToken,
    ) -> Result<PoolFetch> {
        let config = self.engine.config();
        let want = fetch_size(limit, config.fetch_multipliers.for_kind(kind));

        let page = self
            .store
            .fetch(kind, want, token.store_cursor.as_deref())
            .await?;

        let mut items = page.items;
        // A recycled lineage only ever sees items that were already served
        let mut exempt: Vec<String> = if token.recycled {
            items.iter().map(|item| item.id.clone()).collect()
        } else {
            Vec::new()
        };
        let mut recycled = token.recycled;
        let mut next_cursor = page.next_cursor;

        let exhausted = next_cursor.is_none() && items.len() < want;
        if exhausted && token.store_cursor.is_some() {
            let refill = self.store.fetch(kind, want - items.len(), None).await?;
            let mut seen: HashSet<String> = items.iter().map(|item| item.id.clone()).collect();
            for item in refill.items {
                if seen.insert(item.id.clone()) {
                    exempt.push(item.id.clone());
                    items.push(item);
                }
            }
            debug!(
                %kind,
                recycled = exempt.len(),
                "Pool exhausted, recycling from the start"
            );
            recycled = true;
            next_cursor = refill.next_cursor;
        }

        Ok(PoolFetch {
            items,
            exempt,
            next: ContinuationToken::following(page_depth, next_cursor, recycled),
        })
    }
}

fn resolve_limit(requested: Option<usize>, config: &FeedConfig) -> Result<usize> {
    match requested {
        Some(0) => Err(Error::bad_request("limit must be at least 1")),
        Some(limit) => Ok(limit.min(config.max_limit)),
        None => Ok(config.default_limit.min(config.max_limit)),
    }
}

fn resolve_seed(requested: Option<f64>) -> Result<f64> {
    match requested {
        Some(seed) if seed.is_finite() && (0.0..1.0).contains(&seed) => Ok(seed),
        Some(seed) => Err(Error::bad_request(format!(
            "seed must be in [0, 1), got {}",
            seed
        ))),
        None => Ok(rand::random::<f64>()),
    }
}

fn fetch_size(limit: usize, multiplier: f64) -> usize {
    ((limit as f64 * multiplier).ceil() as usize).max(limit)
}
