//! Core data model shared by every ranking stage.
//!
//! All of these live for the duration of one ranking call and are owned by
//! the request that created them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Milliseconds in one day, the unit all window and age math is expressed in.
pub const DAY_LENGTH_MS: f64 = 86_400_000.0;

/// Which candidate pool an item came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    /// Album-like item grouping several units
    Collection,
    /// Single media item
    Unit,
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentKind::Collection => write!(f, "collection"),
            ContentKind::Unit => write!(f, "unit"),
        }
    }
}

impl FromStr for ContentKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "collection" => Ok(ContentKind::Collection),
            "unit" => Ok(ContentKind::Unit),
            other => Err(format!("unknown content kind '{}'", other)),
        }
    }
}

/// A candidate as fetched from the store. Never mutated by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentItem {
    pub id: String,
    pub author_id: String,
    /// `None` when the source timestamp was missing or unparseable
    pub created_at: Option<DateTime<Utc>>,
    pub popularity: f64,
    pub kind: ContentKind,
    pub media_type: Option<String>,
}

impl ContentItem {
    pub fn is_video_unit(&self) -> bool {
        self.kind == ContentKind::Unit && self.media_type.as_deref() == Some("video")
    }

    /// Fractional age in days relative to `now`; negative under clock skew.
    pub fn age_days(&self, now: DateTime<Utc>) -> Option<f64> {
        self.created_at
            .map(|created| (now - created).num_milliseconds() as f64 / DAY_LENGTH_MS)
    }
}

/// Bounded time window, in whole days back from "now".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start_days: u32,
    pub end_days: u32,
    pub max_age_days: u32,
}

impl TimeWindow {
    pub fn label(&self) -> String {
        format!("{}-{}d", self.start_days, self.end_days)
    }
}

/// Window of a fallback attempt: either bounded or all-time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptWindow {
    Bounded(TimeWindow),
    Unrestricted,
}

impl AttemptWindow {
    pub fn label(&self) -> String {
        match self {
            AttemptWindow::Bounded(window) => window.label(),
            AttemptWindow::Unrestricted => "all-time".to_string(),
        }
    }

    pub fn as_bounded(&self) -> Option<&TimeWindow> {
        match self {
            AttemptWindow::Bounded(window) => Some(window),
            AttemptWindow::Unrestricted => None,
        }
    }
}

/// One step of the widening sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FallbackAttempt {
    pub window: AttemptWindow,
    /// Decay horizon used when `window` is unrestricted
    pub min_age_fallback: u32,
}

impl FallbackAttempt {
    /// Age horizon the time-decay term is computed against.
    pub fn effective_max_age_days(&self) -> u32 {
        match self.window {
            AttemptWindow::Bounded(window) => window.max_age_days,
            AttemptWindow::Unrestricted => self.min_age_fallback,
        }
    }
}

/// An item with its score for one attempt.
#[derive(Debug, Clone, Copy)]
pub struct ScoredItem<'a> {
    pub item: &'a ContentItem,
    pub combined_score: f64,
}

/// Per-request ranking parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RequestContext {
    pub limit: usize,
    pub per_author_cap: usize,
    pub page_depth: u32,
    /// Base seed in `[0, 1)`
    pub random_seed: f64,
}

/// Outcome of diversifying both pools under a shared cap.
#[derive(Debug, Clone)]
pub struct DiversificationResult<'a> {
    pub selected_collections: Vec<ScoredItem<'a>>,
    pub selected_units: Vec<ScoredItem<'a>>,
    pub applied_cap: usize,
    pub combined_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn item(kind: ContentKind, media_type: Option<&str>) -> ContentItem {
        ContentItem {
            id: "i1".to_string(),
            author_id: "a1".to_string(),
            created_at: Some(Utc::now()),
            popularity: 1.0,
            kind,
            media_type: media_type.map(str::to_string),
        }
    }

    #[test]
    fn test_content_kind_parse() {
        assert_eq!("unit".parse::<ContentKind>(), Ok(ContentKind::Unit));
        assert_eq!(" Collection ".parse::<ContentKind>(), Ok(ContentKind::Collection));
        assert!("album".parse::<ContentKind>().is_err());
    }

    #[test]
    fn test_video_unit_detection() {
        assert!(item(ContentKind::Unit, Some("video")).is_video_unit());
        assert!(!item(ContentKind::Unit, Some("image")).is_video_unit());
        assert!(!item(ContentKind::Collection, Some("video")).is_video_unit());
    }

    #[test]
    fn test_age_days() {
        let now = Utc::now();
        let mut it = item(ContentKind::Unit, None);
        it.created_at = Some(now - Duration::hours(36));
        let age = it.age_days(now).unwrap();
        assert!((age - 1.5).abs() < 1e-9);

        it.created_at = None;
        assert!(it.age_days(now).is_none());
    }

    #[test]
    fn test_window_labels() {
        let window = TimeWindow {
            start_days: 3,
            end_days: 10,
            max_age_days: 30,
        };
        assert_eq!(AttemptWindow::Bounded(window).label(), "3-10d");
        assert_eq!(AttemptWindow::Unrestricted.label(), "all-time");
    }
}
