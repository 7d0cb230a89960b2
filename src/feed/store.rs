//! Candidate stores
//!
//! Cursor-paginated access to the two candidate pools, newest first. A page
//! without `next_cursor` means the pool is exhausted. Cursors are opaque to
//! callers; both stores here use row offsets.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::PgPool;
use tracing::instrument;

use crate::error::{Error, Result};

use super::types::{ContentItem, ContentKind};

/// One page of candidates
#[derive(Debug, Clone, Default)]
pub struct CandidatePage {
    pub items: Vec<ContentItem>,
    pub next_cursor: Option<String>,
}

#[async_trait]
pub trait CandidateStore: Send + Sync {
    async fn fetch_collections(&self, limit: usize, cursor: Option<&str>) -> Result<CandidatePage>;

    async fn fetch_units(&self, limit: usize, cursor: Option<&str>) -> Result<CandidatePage>;

    async fn fetch(
        &self,
        kind: ContentKind,
        limit: usize,
        cursor: Option<&str>,
    ) -> Result<CandidatePage> {
        match kind {
            ContentKind::Collection => self.fetch_collections(limit, cursor).await,
            ContentKind::Unit => self.fetch_units(limit, cursor).await,
        }
    }
}

// ============================================================================
// PostgreSQL
// ============================================================================

#[derive(Debug, sqlx::FromRow)]
struct CandidateRow {
    id: String,
    author_id: String,
    created_at: Option<String>,
    popularity: Option<f64>,
    media_type: Option<String>,
}

impl CandidateRow {
    fn into_item(self, kind: ContentKind) -> ContentItem {
        ContentItem {
            id: self.id,
            author_id: self.author_id,
            created_at: self.created_at.as_deref().and_then(parse_timestamp),
            popularity: self
                .popularity
                .filter(|p| p.is_finite())
                .unwrap_or(0.0)
                .max(0.0),
            kind,
            media_type: self.media_type,
        }
    }
}

const COLLECTIONS_QUERY: &str = r#"
    SELECT id::text AS id, author_id::text AS author_id, created_at::text AS created_at,
           popularity::float8 AS popularity, NULL::text AS media_type
    FROM collections
    WHERE is_public = true AND deleted_at IS NULL
    ORDER BY created_at DESC NULLS LAST, id DESC
    LIMIT $1 OFFSET $2
"#;

const UNITS_QUERY: &str = r#"
    SELECT id::text AS id, author_id::text AS author_id, created_at::text AS created_at,
           popularity::float8 AS popularity, media_type::text AS media_type
    FROM units
    WHERE is_public = true AND deleted_at IS NULL
    ORDER BY created_at DESC NULLS LAST, id DESC
    LIMIT $1 OFFSET $2
"#;

/// Candidate store backed by the `collections` and `units` tables
#[derive(Clone)]
pub struct PgCandidateStore {
    pool: PgPool,
}

impl PgCandidateStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[instrument(skip(self, query), fields(kind = %kind))]
    async fn fetch_page(
        &self,
        query: &'static str,
        kind: ContentKind,
        limit: usize,
        cursor: Option<&str>,
    ) -> Result<CandidatePage> {
        let offset = parse_offset(cursor)?;
        if limit == 0 {
            return Ok(CandidatePage {
                items: Vec::new(),
                next_cursor: cursor.map(str::to_string),
            });
        }

        let rows = sqlx::query_as::<_, CandidateRow>(query)
            .bind(limit as i64)
            .bind(offset as i64)
            .fetch_all(&self.pool)
            .await?;

        let fetched = rows.len();
        let items = rows.into_iter().map(|row| row.into_item(kind)).collect();
        // A full page may have more behind it
        let next_cursor = (fetched == limit).then(|| (offset + fetched).to_string());

        Ok(CandidatePage { items, next_cursor })
    }
}

#[async_trait]
impl CandidateStore for PgCandidateStore {
    async fn fetch_collections(&self, limit: usize, cursor: Option<&str>) -> Result<CandidatePage> {
        self.fetch_page(COLLECTIONS_QUERY, ContentKind::Collection, limit, cursor)
            .await
    }

    async fn fetch_units(&self, limit: usize, cursor: Option<&str>) -> Result<CandidatePage> {
        self.fetch_page(UNITS_QUERY, ContentKind::Unit, limit, cursor)
            .await
    }
}

// ============================================================================
// In-memory
// ============================================================================

/// Store over fixed item lists, with the same ordering and cursor semantics
/// as the database store. Used for tests and embedding.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCandidateStore {
    collections: Vec<ContentItem>,
    units: Vec<ContentItem>,
}

impl InMemoryCandidateStore {
    pub fn new(mut collections: Vec<ContentItem>, mut units: Vec<ContentItem>) -> Self {
        sort_newest_first(&mut collections);
        sort_newest_first(&mut units);
        Self { collections, units }
    }

    fn page(items: &[ContentItem], limit: usize, cursor: Option<&str>) -> Result<CandidatePage> {
        let offset = parse_offset(cursor)?.min(items.len());
        let end = offset.saturating_add(limit).min(items.len());
        let next_cursor = (end < items.len()).then(|| end.to_string());

        Ok(CandidatePage {
            items: items[offset..end].to_vec(),
            next_cursor,
        })
    }
}

#[async_trait]
impl CandidateStore for InMemoryCandidateStore {
    async fn fetch_collections(&self, limit: usize, cursor: Option<&str>) -> Result<CandidatePage> {
        Self::page(&self.collections, limit, cursor)
    }

    async fn fetch_units(&self, limit: usize, cursor: Option<&str>) -> Result<CandidatePage> {
        Self::page(&self.units, limit, cursor)
    }
}

fn sort_newest_first(items: &mut [ContentItem]) {
    // None sorts below any timestamp, so undated rows go last
    items.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| b.id.cmp(&a.id))
    });
}

fn parse_offset(cursor: Option<&str>) -> Result<usize> {
    match cursor {
        None => Ok(0),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| Error::bad_request(format!("Invalid store cursor '{}'", raw))),
    }
}

/// Parse RFC 3339 or PostgreSQL's text rendering of `timestamptz`.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f%#z") {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn unit(id: &str, hours_ago: Option<i64>) -> ContentItem {
        ContentItem {
            id: id.to_string(),
            author_id: "a".to_string(),
            created_at: hours_ago.map(|h| Utc::now() - Duration::hours(h)),
            popularity: 1.0,
            kind: ContentKind::Unit,
            media_type: None,
        }
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let expected = Utc.with_ymd_and_hms(2024, 5, 1, 12, 34, 56).unwrap();
        assert_eq!(parse_timestamp("2024-05-01T12:34:56Z"), Some(expected));
        assert_eq!(parse_timestamp("2024-05-01 14:34:56+02"), Some(expected));
        assert_eq!(parse_timestamp("2024-05-01 12:34:56"), Some(expected));
        assert!(parse_timestamp("2024-05-01 12:34:56.123456+00").is_some());
        assert_eq!(parse_timestamp("yesterday"), None);
        assert_eq!(parse_timestamp(""), None);
    }

    #[test]
    fn test_row_with_bad_timestamp_keeps_item_undated() {
        let row = CandidateRow {
            id: "u1".to_string(),
            author_id: "a1".to_string(),
            created_at: Some("not a date".to_string()),
            popularity: Some(-3.0),
            media_type: Some("video".to_string()),
        };
        let item = row.into_item(ContentKind::Unit);
        assert!(item.created_at.is_none());
        assert_eq!(item.popularity, 0.0);
        assert!(item.is_video_unit());
    }

    #[test]
    fn test_row_with_infinite_popularity_is_zeroed() {
        for popularity in [f64::INFINITY, f64::NEG_INFINITY, f64::NAN] {
            let row = CandidateRow {
                id: "c1".to_string(),
                author_id: "a1".to_string(),
                created_at: Some("2024-05-01T12:34:56Z".to_string()),
                popularity: Some(popularity),
                media_type: None,
            };
            assert_eq!(row.into_item(ContentKind::Collection).popularity, 0.0);
        }
    }

    #[tokio::test]
    async fn test_in_memory_pages_newest_first() {
        let store = InMemoryCandidateStore::new(
            Vec::new(),
            vec![
                unit("old", Some(48)),
                unit("undated", None),
                unit("new", Some(1)),
                unit("mid", Some(10)),
            ],
        );

        let first = store.fetch_units(2, None).await.unwrap();
        let ids: Vec<&str> = first.items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["new", "mid"]);
        assert_eq!(first.next_cursor.as_deref(), Some("2"));

        let second = store
            .fetch(ContentKind::Unit, 5, first.next_cursor.as_deref())
            .await
            .unwrap();
        let ids: Vec<&str> = second.items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["old", "undated"]);
        assert!(second.next_cursor.is_none());
    }

    #[tokio::test]
    async fn test_in_memory_cursor_past_end() {
        let store = InMemoryCandidateStore::new(vec![], vec![unit("a", Some(1))]);
        let page = store.fetch_units(10, Some("50")).await.unwrap();
        assert!(page.items.is_empty());
        assert!(page.next_cursor.is_none());

        let empty = store.fetch_collections(10, None).await.unwrap();
        assert!(empty.items.is_empty());
        assert!(empty.next_cursor.is_none());
    }

    #[test]
    fn test_invalid_store_cursor() {
        let store = InMemoryCandidateStore::default();
        tokio_test::assert_err!(tokio_test::block_on(store.fetch_units(10, Some("abc"))));
        tokio_test::assert_ok!(tokio_test::block_on(store.fetch_units(10, Some(" 3 "))));
    }

    #[tokio::test]
    async fn test_pg_store_fetch() {
        // Requires a running database with the feed tables
        let Ok(url) = std::env::var("DATABASE_URL") else {
            return;
        };
        let pool = match PgPool::connect(&url).await {
            Ok(pool) => pool,
            Err(_) => return,
        };

        let store = PgCandidateStore::new(pool);
        if let Ok(page) = store.fetch_units(5, None).await {
            assert!(page.items.len() <= 5);
            assert!(page.items.iter().all(|i| i.kind == ContentKind::Unit));
        }
    }
}
