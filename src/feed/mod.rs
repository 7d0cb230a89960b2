//! Feed Module
//!
//! Ranks a page of the discovery feed from two candidate pools: collections
//! (album-like groupings) and units (single media items).
//!
//! ## Pipeline
//!
//! 1. **Window** - Sliding time window per page depth, plus widening fallbacks
//! 2. **Scorer** - Popularity x time decay x recency/video boosts, plus a seeded random term
//! 3. **Diversify** - Per-author cap, relaxed step by step when supply is thin
//! 4. **Fallback** - Walks the window sequence until enough items survive
//! 5. **Allocate** - Caps collections at a share of the page
//! 6. **Interleave** - Type-biased merge of the two lists
//! 7. **Shuffle** - Bounded-displacement reorder of the final page
//!
//! Everything from `window` to `shuffle` is pure and deterministic for a given
//! seed and clock. `service` adds the store, continuation tokens and metrics.

pub mod allocate;
pub mod cursor;
pub mod diversify;
pub mod engine;
pub mod fallback;
pub mod interleave;
pub mod metrics;
pub mod rng;
pub mod scorer;
pub mod service;
pub mod shuffle;
pub mod store;
pub mod types;
pub mod window;

pub use cursor::ContinuationToken;
pub use engine::{FeedEngine, RankedEntry, RankedPage, RankingMeta};
pub use service::{FeedPage, FeedRequest, FeedService};
pub use shuffle::{JitterShuffle, SoftShuffle};
pub use store::{CandidatePage, CandidateStore, InMemoryCandidateStore, PgCandidateStore};
pub use types::{ContentItem, ContentKind};
