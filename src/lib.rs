//! Discovery feed library crate
//!
//! Re-exports core modules for integration tests and embedding.

pub mod api;
pub mod config;
pub mod database;
pub mod error;
pub mod feed;

// Re-export commonly used types
pub use config::Config;
pub use database::Database;
pub use error::{Error, Result};
pub use feed::{
    CandidateStore, ContentItem, ContentKind, FeedEngine, FeedPage, FeedRequest, FeedService,
    InMemoryCandidateStore, PgCandidateStore,
};
