//! Cache configuration
//!
//! Holds the settings a [`Cache`](crate::Cache) is built from: where entries live,
//! whether bypass mode may be triggered, and the default TTL applied when a call
//! does not supply its own.

use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Bypass keyword used when none is configured
pub const DEFAULT_BYPASS_KEYWORD: &str = "disablecache";

/// How long an entry stays fresh after its last write or touch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ttl {
    /// Valid for as long as the file exists
    #[default]
    Never,
    /// Valid while younger than this many minutes. Zero expires immediately.
    Minutes(u64),
}

impl Ttl {
    /// Returns the TTL as a chrono duration, or `None` for [`Ttl::Never`]
    pub fn as_duration(&self) -> Option<chrono::Duration> {
        match self {
            Ttl::Never => None,
            // Saturate rather than overflow for absurdly large minute counts
            Ttl::Minutes(m) => Some(
                i64::try_from(*m)
                    .ok()
                    .and_then(chrono::Duration::try_minutes)
                    .unwrap_or(chrono::Duration::MAX),
            ),
        }
    }
}

/// Error returned when a TTL string cannot be parsed
#[derive(Debug, Error, PartialEq, Eq)]
#[error("Invalid TTL: '{0}'. Expected a number of minutes or 'never'")]
pub struct TtlParseError(String);

impl FromStr for Ttl {
    type Err = TtlParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("never") || trimmed.eq_ignore_ascii_case("none") {
            return Ok(Ttl::Never);
        }
        trimmed
            .parse::<u64>()
            .map(Ttl::Minutes)
            .map_err(|_| TtlParseError(s.to_string()))
    }
}

impl fmt::Display for Ttl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ttl::Never => write!(f, "never"),
            Ttl::Minutes(m) => write!(f, "{m}m"),
        }
    }
}

/// Settings for a cache instance
///
/// A cache never mutates its configuration. Reconfiguring means building a new
/// cache from a new `CacheConfig`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Root directory holding every entry
    pub cache_path: PathBuf,
    /// Whether the bypass signal is honoured at all
    pub allow_cache_bypass: bool,
    /// Name of the signal looked up to detect bypass mode
    pub cache_bypass_keyword: String,
    /// TTL used when a call passes no override
    pub default_ttl: Ttl,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cache_path: default_cache_path(),
            allow_cache_bypass: false,
            cache_bypass_keyword: DEFAULT_BYPASS_KEYWORD.to_string(),
            default_ttl: Ttl::Never,
        }
    }
}

impl CacheConfig {
    /// Creates a default configuration rooted at `cache_path`
    pub fn with_path(cache_path: impl Into<PathBuf>) -> Self {
        Self {
            cache_path: cache_path.into(),
            ..Self::default()
        }
    }

    /// Replaces the default TTL
    pub fn with_default_ttl(mut self, ttl: Ttl) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// Allows bypass mode, triggered by the signal named `keyword`
    pub fn with_bypass(mut self, keyword: impl Into<String>) -> Self {
        self.allow_cache_bypass = true;
        self.cache_bypass_keyword = keyword.into();
        self
    }

    /// Creates a configuration from environment variables.
    ///
    /// # Environment Variables
    /// - `FSCACHE_PATH` - Cache root directory (default: platform cache dir)
    /// - `FSCACHE_ALLOW_BYPASS` - `1`, `true` or `yes` to allow bypass (default: off)
    /// - `FSCACHE_BYPASS_KEYWORD` - Bypass signal name (default: `disablecache`)
    /// - `FSCACHE_DEFAULT_TTL` - Minutes, or `never` (default: never)
    ///
    /// Values that fail to parse fall back to their defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            cache_path: env::var_os("FSCACHE_PATH")
                .filter(|v| !v.is_empty())
                .map(PathBuf::from)
                .unwrap_or(defaults.cache_path),
            allow_cache_bypass: env::var("FSCACHE_ALLOW_BYPASS")
                .ok()
                .map(|v| parse_flag(&v))
                .unwrap_or(defaults.allow_cache_bypass),
            cache_bypass_keyword: env::var("FSCACHE_BYPASS_KEYWORD")
                .ok()
                .filter(|v| !v.is_empty())
                .unwrap_or(defaults.cache_bypass_keyword),
            default_ttl: env::var("FSCACHE_DEFAULT_TTL")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.default_ttl),
        }
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Picks a writable location for the cache root
///
/// Uses the XDG cache directory (`~/.cache/fscache/` on Linux, or the platform
/// equivalent), falling back to `fscache` under the system temp directory when
/// no home directory can be determined.
pub fn default_cache_path() -> PathBuf {
    ProjectDirs::from("", "", "fscache")
        .map(|dirs| dirs.cache_dir().to_path_buf())
        .unwrap_or_else(|| env::temp_dir().join("fscache"))
}
