//! Per-pool continuation tokens.
//!
//! A token carries the page depth of its pagination lineage, the opaque
//! store cursor to resume from, and whether the pool has wrapped around to
//! recycled supply. Tokens are JSON, hex-encoded for transport.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

use super::types::ContentKind;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContinuationToken {
    #[serde(rename = "d")]
    pub page_depth: u32,
    /// Store cursor; `None` restarts the pool from its newest item
    #[serde(rename = "c", default, skip_serializing_if = "Option::is_none")]
    pub store_cursor: Option<String>,
    /// Set once the pool was exhausted and refilled from the start
    #[serde(rename = "r", default)]
    pub recycled: bool,
}

impl ContinuationToken {
    /// Token for the page after one served at `served_depth`. Both pools get
    /// the same depth so their lineages never drift apart.
    pub fn following(served_depth: u32, store_cursor: Option<String>, recycled: bool) -> Self {
        Self {
            page_depth: served_depth.saturating_add(1),
            store_cursor,
            recycled,
        }
    }

    pub fn encode(&self) -> Result<String> {
        Ok(hex::encode(serde_json::to_vec(self)?))
    }

    /// Decode a token for `kind`; absent or empty means the first page.
    pub fn decode(kind: ContentKind, raw: Option<&str>) -> Result<Self> {
        let raw = match raw.map(str::trim) {
            None | Some("") => return Ok(Self::default()),
            Some(raw) => raw,
        };

        let pool = pool_name(kind);
        let bytes = hex::decode(raw).map_err(|e| Error::invalid_cursor(pool, e.to_string()))?;
        serde_json::from_slice(&bytes).map_err(|e| Error::invalid_cursor(pool, e.to_string()))
    }
}

fn pool_name(kind: ContentKind) -> &'static str {
    match kind {
        ContentKind::Collection => "collections",
        ContentKind::Unit => "units",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_cursor_is_first_page() {
        let token = ContinuationToken::decode(ContentKind::Unit, None).unwrap();
        assert_eq!(token, ContinuationToken::default());
        let token = ContinuationToken::decode(ContentKind::Unit, Some("  ")).unwrap();
        assert_eq!(token.page_depth, 0);
    }

    #[test]
    fn test_next_increments_depth() {
        let second = ContinuationToken::following(0, Some("60".to_string()), false);
        assert_eq!(second.page_depth, 1);

        let encoded = second.encode().unwrap();
        let decoded = ContinuationToken::decode(ContentKind::Collection, Some(&encoded)).unwrap();
        assert_eq!(decoded.page_depth, 1);
        assert_eq!(decoded.store_cursor.as_deref(), Some("60"));
        assert!(!decoded.recycled);
    }

    #[test]
    fn test_following_saturates() {
        let token = ContinuationToken::following(u32::MAX, None, true);
        assert_eq!(token.page_depth, u32::MAX);
        assert!(token.recycled);
    }

    #[test]
    fn test_page_depth_is_reinsertable() {
        // Callers may construct tokens themselves, e.g. to jump to a depth
        let raw = hex::encode(br#"{"d":7}"#);
        let token = ContinuationToken::decode(ContentKind::Unit, Some(&raw)).unwrap();
        assert_eq!(token.page_depth, 7);
        assert_eq!(token.store_cursor, None);
    }

    #[test]
    fn test_garbage_rejected_with_pool_name() {
        match ContinuationToken::decode(ContentKind::Collection, Some("zz-not-hex")) {
            Err(Error::InvalidCursor { pool, .. }) => assert_eq!(pool, "collections"),
            other => panic!("expected InvalidCursor, got {:?}", other),
        }
        let not_json = hex::encode(b"hello");
        assert!(ContinuationToken::decode(ContentKind::Unit, Some(&not_json)).is_err());
    }
}
