//! Configuration management for the discovery feed engine
//!
//! Strongly-typed configuration loaded from environment variables, with a
//! named default for every knob and validation at startup. An invalid feed
//! configuration is a fatal startup error, never a per-request failure.
//!
//! # Example
//! ```no_run
//! use discovery_feed::Config;
//! let config = Config::from_env().expect("failed to load config");
//! println!("Interleave pattern: {:?}", config.feed.interleave_pattern);
//! ```

use crate::error::{Error, Result};
use crate::feed::types::ContentKind;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

/// Main application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Candidate store database
    pub database: DatabaseConfig,
    /// API server configuration
    pub api: ApiConfig,
    /// Feed ranking configuration
    pub feed: FeedConfig,
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,
    /// Maximum connections in pool
    pub max_connections: u32,
    /// Minimum connections to keep open
    pub min_connections: u32,
    /// Connection timeout
    pub connect_timeout: Duration,
    /// Idle timeout for connections
    pub idle_timeout: Duration,
    /// Maximum lifetime for connections
    pub max_lifetime: Duration,
    /// Prepared statement cache size
    pub statement_cache_size: usize,
}

/// API server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub port: u16,
    pub host: String,
    pub request_timeout: Duration,
    pub cors_enabled: bool,
}

/// One recency boost tier: items no older than `max_age_days` get `multiplier`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecencyTier {
    pub max_age_days: f64,
    pub multiplier: f64,
}

/// One widening step of the fallback sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FallbackStep {
    /// Days added to the primary window's end
    pub expand_end_days: u32,
    pub max_age_days: u32,
}

/// How many candidates to fetch per requested slot, per pool.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FetchMultipliers {
    pub collections: f64,
    pub units: f64,
}

impl FetchMultipliers {
    pub fn for_kind(&self, kind: ContentKind) -> f64 {
        match kind {
            ContentKind::Collection => self.collections,
            ContentKind::Unit => self.units,
        }
    }
}

/// Feed ranking configuration
#[derive(Debug, Clone, PartialEq)]
pub struct FeedConfig {
    /// Expected items published per day; sizes the primary window
    pub items_per_day_target: f64,
    /// Lower bound on the primary window length
    pub min_window_days: u32,
    /// Fraction of a window shared with the previous page
    pub overlap_ratio: f64,
    /// Upper bound on the collection share of a page (0.0-1.0)
    pub collection_max_share: f64,
    /// Cyclic type-bias pattern for interleaving
    pub interleave_pattern: Vec<ContentKind>,
    /// Maximum positional displacement applied by the soft shuffle
    pub shuffle_softness: usize,
    /// Weight of the decayed popularity term
    pub score_weight: f64,
    /// Scale of the uniform random term
    pub random_weight: f64,
    /// Seed offset between consecutive fallback attempts
    pub seed_step: f64,
    /// Minimum decay horizon for the primary window
    pub default_max_age_days: u32,
    /// Multiplier applied to video units
    pub video_boost_multiplier: f64,
    /// Ascending recency tiers
    pub recency_boost_tiers: Vec<RecencyTier>,
    pub fetch_multipliers: FetchMultipliers,
    /// How far the per-author cap may be raised when results are sparse
    pub max_relaxation_steps: usize,
    /// Ordered widening steps tried after the primary window
    pub fallback_window_steps: Vec<FallbackStep>,
    /// Per-author cap when the request does not set one
    pub default_per_author_cap: usize,
    /// Page size when the request does not set one
    pub default_limit: usize,
    /// Hard upper bound on page size
    pub max_limit: usize,
}

// ============================================================================
// Feed defaults
// ============================================================================

pub const DEFAULT_ITEMS_PER_DAY_TARGET: f64 = 4.0;
pub const DEFAULT_MIN_WINDOW_DAYS: u32 = 7;
pub const DEFAULT_OVERLAP_RATIO: f64 = 0.25;
pub const DEFAULT_COLLECTION_MAX_SHARE: f64 = 0.3;
pub const DEFAULT_INTERLEAVE_PATTERN: &str = "unit,unit,collection";
pub const DEFAULT_SHUFFLE_SOFTNESS: usize = 2;
pub const DEFAULT_SCORE_WEIGHT: f64 = 0.7;
pub const DEFAULT_RANDOM_WEIGHT: f64 = 30.0;
pub const DEFAULT_SEED_STEP: f64 = 0.1337;
pub const DEFAULT_MAX_AGE_DAYS: u32 = 30;
pub const DEFAULT_VIDEO_BOOST_MULTIPLIER: f64 = 1.2;
pub const DEFAULT_RECENCY_TIERS: &str = "1:2.0,3:1.5,7:1.2";
pub const DEFAULT_FETCH_MULTIPLIERS: &str = "2.0,3.0";
pub const DEFAULT_MAX_RELAXATION_STEPS: usize = 3;
pub const DEFAULT_FALLBACK_STEPS: &str = "14:60,60:180,180:365";
pub const DEFAULT_PER_AUTHOR_CAP: usize = 2;
pub const DEFAULT_LIMIT: usize = 20;
pub const DEFAULT_MAX_LIMIT: usize = 100;

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Try to load .env file (ignore if not found)
        dotenvy::dotenv().ok();

        let config = Self {
            database: DatabaseConfig::from_env()?,
            api: ApiConfig::from_env()?,
            feed: FeedConfig::from_env()?,
        };

        config.validate()?;
        config.log_summary();

        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.database.max_connections < self.database.min_connections {
            return Err(Error::InvalidConfig {
                key: "DB_MAX_CONNECTIONS",
                message: "max_connections must be >= min_connections".into(),
            });
        }

        self.feed.validate()
    }

    /// Log configuration summary (without sensitive data)
    fn log_summary(&self) {
        info!("Configuration loaded:");
        info!("  Database:");
        info!("    URL: {}", mask_url(&self.database.url));
        info!(
            "    Pool Size: {}-{}",
            self.database.min_connections, self.database.max_connections
        );
        info!("  API:");
        info!("    Listening on: {}:{}", self.api.host, self.api.port);
        info!("  Feed:");
        info!(
            "    Window: min {}d, {} items/day, overlap {:.2}",
            self.feed.min_window_days, self.feed.items_per_day_target, self.feed.overlap_ratio
        );
        info!(
            "    Fallback steps: {}, relaxation steps: {}",
            self.feed.fallback_window_steps.len(),
            self.feed.max_relaxation_steps
        );
        info!(
            "    Interleave pattern: {:?}, collection share <= {:.2}",
            self.feed.interleave_pattern, self.feed.collection_max_share
        );
    }
}

impl DatabaseConfig {
    fn from_env() -> Result<Self> {
        let url = get_env("DATABASE_URL").unwrap_or_else(|_| {
            let user = std::env::var("USER").unwrap_or_else(|_| "postgres".to_string());
            format!("postgres://{}@localhost/discovery_feed_dev", user)
        });

        Ok(Self {
            url,
            max_connections: get_env_or("DB_MAX_CONNECTIONS", "20").parse().unwrap_or(20),
            min_connections: get_env_or("DB_MIN_CONNECTIONS", "2").parse().unwrap_or(2),
            connect_timeout: Duration::from_secs(
                get_env_or("DB_CONNECT_TIMEOUT_SECS", "30")
                    .parse()
                    .unwrap_or(30),
            ),
            idle_timeout: Duration::from_secs(
                get_env_or("DB_IDLE_TIMEOUT_SECS", "600")
                    .parse()
                    .unwrap_or(600),
            ),
            max_lifetime: Duration::from_secs(
                get_env_or("DB_MAX_LIFETIME_SECS", "3600")
                    .parse()
                    .unwrap_or(3600),
            ),
            statement_cache_size: get_env_or("DB_STATEMENT_CACHE_SIZE", "100")
                .parse()
                .unwrap_or(100),
        })
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            host: "0.0.0.0".to_string(),
            request_timeout: Duration::from_secs(10),
            cors_enabled: true,
        }
    }
}

impl ApiConfig {
    fn from_env() -> Result<Self> {
        Ok(Self {
            port: get_env_or("API_PORT", "8080").parse().unwrap_or(8080),
            host: get_env_or("API_HOST", "0.0.0.0"),
            request_timeout: Duration::from_secs(
                get_env_or("API_REQUEST_TIMEOUT_SECS", "10")
                    .parse()
                    .unwrap_or(10),
            ),
            cors_enabled: get_env_or("API_CORS_ENABLED", "true")
                .parse()
                .unwrap_or(true),
        })
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            items_per_day_target: DEFAULT_ITEMS_PER_DAY_TARGET,
            min_window_days: DEFAULT_MIN_WINDOW_DAYS,
            overlap_ratio: DEFAULT_OVERLAP_RATIO,
            collection_max_share: DEFAULT_COLLECTION_MAX_SHARE,
            interleave_pattern: vec![
                ContentKind::Unit,
                ContentKind::Unit,
                ContentKind::Collection,
            ],
            shuffle_softness: DEFAULT_SHUFFLE_SOFTNESS,
            score_weight: DEFAULT_SCORE_WEIGHT,
            random_weight: DEFAULT_RANDOM_WEIGHT,
            seed_step: DEFAULT_SEED_STEP,
            default_max_age_days: DEFAULT_MAX_AGE_DAYS,
            video_boost_multiplier: DEFAULT_VIDEO_BOOST_MULTIPLIER,
            recency_boost_tiers: vec![
                RecencyTier {
                    max_age_days: 1.0,
                    multiplier: 2.0,
                },
                RecencyTier {
                    max_age_days: 3.0,
                    multiplier: 1.5,
                },
                RecencyTier {
                    max_age_days: 7.0,
                    multiplier: 1.2,
                },
            ],
            fetch_multipliers: FetchMultipliers {
                collections: 2.0,
                units: 3.0,
            },
            max_relaxation_steps: DEFAULT_MAX_RELAXATION_STEPS,
            fallback_window_steps: vec![
                FallbackStep {
                    expand_end_days: 14,
                    max_age_days: 60,
                },
                FallbackStep {
                    expand_end_days: 60,
                    max_age_days: 180,
                },
                FallbackStep {
                    expand_end_days: 180,
                    max_age_days: 365,
                },
            ],
            default_per_author_cap: DEFAULT_PER_AUTHOR_CAP,
            default_limit: DEFAULT_LIMIT,
            max_limit: DEFAULT_MAX_LIMIT,
        }
    }
}

impl FeedConfig {
    fn from_env() -> Result<Self> {
        Ok(Self {
            items_per_day_target: get_env_parsed_or(
                "FEED_ITEMS_PER_DAY_TARGET",
                DEFAULT_ITEMS_PER_DAY_TARGET,
            )?,
            min_window_days: get_env_parsed_or("FEED_MIN_WINDOW_DAYS", DEFAULT_MIN_WINDOW_DAYS)?,
            overlap_ratio: get_env_parsed_or("FEED_OVERLAP_RATIO", DEFAULT_OVERLAP_RATIO)?,
            collection_max_share: get_env_parsed_or(
                "FEED_COLLECTION_MAX_SHARE",
                DEFAULT_COLLECTION_MAX_SHARE,
            )?,
            interleave_pattern: parse_interleave_pattern(&get_env_or(
                "FEED_INTERLEAVE_PATTERN",
                DEFAULT_INTERLEAVE_PATTERN,
            ))?,
            shuffle_softness: get_env_parsed_or("FEED_SHUFFLE_SOFTNESS", DEFAULT_SHUFFLE_SOFTNESS)?,
            score_weight: get_env_parsed_or("FEED_SCORE_WEIGHT", DEFAULT_SCORE_WEIGHT)?,
            random_weight: get_env_parsed_or("FEED_RANDOM_WEIGHT", DEFAULT_RANDOM_WEIGHT)?,
            seed_step: get_env_parsed_or("FEED_SEED_STEP", DEFAULT_SEED_STEP)?,
            default_max_age_days: get_env_parsed_or(
                "FEED_DEFAULT_MAX_AGE_DAYS",
                DEFAULT_MAX_AGE_DAYS,
            )?,
            video_boost_multiplier: get_env_parsed_or(
                "FEED_VIDEO_BOOST_MULTIPLIER",
                DEFAULT_VIDEO_BOOST_MULTIPLIER,
            )?,
            recency_boost_tiers: parse_recency_tiers(&get_env_or(
                "FEED_RECENCY_TIERS",
                DEFAULT_RECENCY_TIERS,
            ))?,
            fetch_multipliers: parse_fetch_multipliers(&get_env_or(
                "FEED_FETCH_MULTIPLIERS",
                DEFAULT_FETCH_MULTIPLIERS,
            ))?,
            max_relaxation_steps: get_env_parsed_or(
                "FEED_MAX_RELAXATION_STEPS",
                DEFAULT_MAX_RELAXATION_STEPS,
            )?,
            fallback_window_steps: parse_fallback_steps(&get_env_or(
                "FEED_FALLBACK_STEPS",
                DEFAULT_FALLBACK_STEPS,
            ))?,
            default_per_author_cap: get_env_parsed_or(
                "FEED_PER_AUTHOR_CAP",
                DEFAULT_PER_AUTHOR_CAP,
            )?,
            default_limit: get_env_parsed_or("FEED_DEFAULT_LIMIT", DEFAULT_LIMIT)?,
            max_limit: get_env_parsed_or("FEED_MAX_LIMIT", DEFAULT_MAX_LIMIT)?,
        })
    }

    /// Reject configurations the ranking pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.interleave_pattern.is_empty() {
            return Err(invalid("FEED_INTERLEAVE_PATTERN", "pattern cannot be empty"));
        }
        if !(self.items_per_day_target > 0.0) {
            return Err(invalid("FEED_ITEMS_PER_DAY_TARGET", "must be > 0"));
        }
        if self.min_window_days == 0 {
            return Err(invalid("FEED_MIN_WINDOW_DAYS", "must be >= 1"));
        }
        if !(0.0..1.0).contains(&self.overlap_ratio) {
            return Err(invalid("FEED_OVERLAP_RATIO", "must be in [0, 1)"));
        }
        if !(0.0..=1.0).contains(&self.collection_max_share) {
            return Err(invalid("FEED_COLLECTION_MAX_SHARE", "must be in [0, 1]"));
        }
        for (key, value) in [
            ("FEED_SCORE_WEIGHT", self.score_weight),
            ("FEED_RANDOM_WEIGHT", self.random_weight),
            ("FEED_SEED_STEP", self.seed_step),
            ("FEED_VIDEO_BOOST_MULTIPLIER", self.video_boost_multiplier),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(invalid(key, "must be a finite, non-negative number"));
            }
        }
        if self
            .recency_boost_tiers
            .windows(2)
            .any(|pair| pair[0].max_age_days >= pair[1].max_age_days)
        {
            return Err(invalid(
                "FEED_RECENCY_TIERS",
                "tiers must be strictly ascending by max age",
            ));
        }
        if self
            .recency_boost_tiers
            .iter()
            .any(|tier| !tier.multiplier.is_finite() || tier.multiplier < 0.0)
        {
            return Err(invalid("FEED_RECENCY_TIERS", "multipliers must be >= 0"));
        }
        if self.fetch_multipliers.collections < 1.0 || self.fetch_multipliers.units < 1.0 {
            return Err(invalid("FEED_FETCH_MULTIPLIERS", "multipliers must be >= 1"));
        }
        if self.default_per_author_cap == 0 {
            return Err(invalid("FEED_PER_AUTHOR_CAP", "must be >= 1"));
        }
        if self.default_limit == 0 || self.default_limit > self.max_limit {
            return Err(invalid(
                "FEED_DEFAULT_LIMIT",
                "must be >= 1 and <= FEED_MAX_LIMIT",
            ));
        }
        Ok(())
    }
}

// ============================================================================
// List parsers
// ============================================================================

/// Parse `"unit,unit,collection"`
fn parse_interleave_pattern(raw: &str) -> Result<Vec<ContentKind>> {
    raw.split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(|token| {
            token
                .parse::<ContentKind>()
                .map_err(|e| invalid("FEED_INTERLEAVE_PATTERN", e))
        })
        .collect()
}

/// Parse `"1:2.0,3:1.5"` as `max_age_days:multiplier` pairs
fn parse_recency_tiers(raw: &str) -> Result<Vec<RecencyTier>> {
    parse_pairs(raw, "FEED_RECENCY_TIERS")?
        .into_iter()
        .map(|(age, multiplier)| {
            Ok(RecencyTier {
                max_age_days: parse_field("FEED_RECENCY_TIERS", age)?,
                multiplier: parse_field("FEED_RECENCY_TIERS", multiplier)?,
            })
        })
        .collect()
}

/// Parse `"14:60,60:180"` as `expand_end_days:max_age_days` pairs
fn parse_fallback_steps(raw: &str) -> Result<Vec<FallbackStep>> {
    parse_pairs(raw, "FEED_FALLBACK_STEPS")?
        .into_iter()
        .map(|(expand, max_age)| {
            Ok(FallbackStep {
                expand_end_days: parse_field("FEED_FALLBACK_STEPS", expand)?,
                max_age_days: parse_field("FEED_FALLBACK_STEPS", max_age)?,
            })
        })
        .collect()
}

/// Parse `"collections,units"`
fn parse_fetch_multipliers(raw: &str) -> Result<FetchMultipliers> {
    let parts: Vec<&str> = raw.split(',').map(str::trim).collect();
    match parts.as_slice() {
        [collections, units] => Ok(FetchMultipliers {
            collections: parse_field("FEED_FETCH_MULTIPLIERS", collections)?,
            units: parse_field("FEED_FETCH_MULTIPLIERS", units)?,
        }),
        _ => Err(invalid(
            "FEED_FETCH_MULTIPLIERS",
            format!("expected 'collections,units', got '{}'", raw),
        )),
    }
}

fn parse_pairs<'a>(raw: &'a str, key: &'static str) -> Result<Vec<(&'a str, &'a str)>> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            entry
                .split_once(':')
                .map(|(a, b)| (a.trim(), b.trim()))
                .ok_or_else(|| invalid(key, format!("expected 'a:b', got '{}'", entry)))
        })
        .collect()
}

fn parse_field<T: FromStr>(key: &'static str, raw: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    raw.parse()
        .map_err(|e: T::Err| invalid(key, format!("Invalid value '{}': {}", raw, e)))
}

// ============================================================================
// Helper functions
// ============================================================================

fn invalid(key: &'static str, message: impl Into<std::borrow::Cow<'static, str>>) -> Error {
    Error::InvalidConfig {
        key,
        message: message.into(),
    }
}

/// Get required environment variable
fn get_env(key: &'static str) -> Result<String> {
    std::env::var(key).map_err(|_| Error::MissingEnvVar { var: key })
}

/// Get environment variable with default
fn get_env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an environment variable, falling back to `default` when unset.
/// A value that is set but unparseable is a configuration error.
fn get_env_parsed_or<T: FromStr>(key: &'static str, default: T) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(value) => parse_field(key, value.trim()),
        Err(_) => Ok(default),
    }
}

/// Mask sensitive parts of URL
fn mask_url(url: &str) -> String {
    if let Some(at_pos) = url.find('@') {
        if let Some(colon_pos) = url[..at_pos].rfind(':') {
            let (before, after) = url.split_at(colon_pos + 1);
            let (_, rest) = after.split_at(at_pos - colon_pos - 1);
            return format!("{}****{}", before, rest);
        }
    }
    url.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_feed_config_is_valid() {
        assert!(FeedConfig::default().validate().is_ok());
    }

    #[test]
    fn test_defaults_match_default_strings() {
        let config = FeedConfig::default();
        assert_eq!(
            parse_interleave_pattern(DEFAULT_INTERLEAVE_PATTERN).unwrap(),
            config.interleave_pattern
        );
        assert_eq!(
            parse_recency_tiers(DEFAULT_RECENCY_TIERS).unwrap(),
            config.recency_boost_tiers
        );
        assert_eq!(
            parse_fallback_steps(DEFAULT_FALLBACK_STEPS).unwrap(),
            config.fallback_window_steps
        );
        assert_eq!(
            parse_fetch_multipliers(DEFAULT_FETCH_MULTIPLIERS).unwrap(),
            config.fetch_multipliers
        );
    }

    #[test]
    fn test_empty_interleave_pattern_rejected() {
        let mut config = FeedConfig::default();
        config.interleave_pattern.clear();
        match config.validate() {
            Err(Error::InvalidConfig { key, .. }) => assert_eq!(key, "FEED_INTERLEAVE_PATTERN"),
            other => panic!("expected InvalidConfig, got {:?}", other),
        }
        assert!(parse_interleave_pattern(" , ").unwrap().is_empty());
    }

    #[test]
    fn test_unknown_pattern_token_rejected() {
        assert!(parse_interleave_pattern("unit,album").is_err());
    }

    #[test]
    fn test_non_ascending_tiers_rejected() {
        let mut config = FeedConfig::default();
        config.recency_boost_tiers = parse_recency_tiers("3:1.5,1:2.0").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_malformed_pairs_rejected() {
        assert!(parse_fallback_steps("14-60").is_err());
        assert!(parse_recency_tiers("1:fast").is_err());
        assert!(parse_fetch_multipliers("2.0").is_err());
    }

    #[test]
    fn test_out_of_range_values_rejected() {
        let mut config = FeedConfig::default();
        config.overlap_ratio = 1.0;
        assert!(config.validate().is_err());

        let mut config = FeedConfig::default();
        config.collection_max_share = 1.5;
        assert!(config.validate().is_err());

        let mut config = FeedConfig::default();
        config.default_per_author_cap = 0;
        assert!(config.validate().is_err());

        let mut config = FeedConfig::default();
        config.fetch_multipliers.units = 0.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_fallback_steps_allowed() {
        let mut config = FeedConfig::default();
        config.fallback_window_steps = parse_fallback_steps("").unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_mask_url() {
        assert_eq!(
            mask_url("postgres://feed:secret@db:5432/feed"),
            "postgres://feed:****@db:5432/feed"
        );
        assert_eq!(mask_url("postgres://localhost/feed"), "postgres://localhost/feed");
    }
}
