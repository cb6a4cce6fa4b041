//! fscache - a filesystem-backed read-through cache
//!
//! Payloads are stored as JSON files under a cache root, one file per key, and
//! considered fresh for a configurable number of minutes after their last
//! write. [`Cache::get`] recomputes missing or expired entries with a
//! caller-supplied producer and falls back to the expired copy when the
//! producer fails.
//!
//! ```no_run
//! use fscache::{Cache, CacheConfig, Produced, Ttl};
//!
//! let cache = Cache::new(CacheConfig::with_path("/tmp/fscache"));
//! let score: Option<u32> = cache.get("scores.today", || Produced::Value(42), Some(Ttl::Minutes(10)));
//! assert_eq!(score, Some(42));
//! ```

pub mod cache;
pub mod cli;
pub mod config;
pub mod shared;

pub use cache::{Cache, Produced};
pub use config::{CacheConfig, Ttl};
