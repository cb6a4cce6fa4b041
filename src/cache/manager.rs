//! Read-through cache over the filesystem
//!
//! Provides a `Cache` that serves payloads from disk while they are fresh and,
//! through [`Cache::get`], recomputes them with a caller-supplied producer when
//! they are not. When recomputation fails the last stored payload is served
//! instead, unless bypass mode is active.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, error, warn};

use super::{path, store, validity};
use crate::config::{CacheConfig, Ttl};

/// Error type producers report failures with
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Decides, given the configured keyword, whether the bypass signal is present
pub type BypassProbe = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Called when a producer fails while bypass mode is active. Not expected to return.
pub type FatalHook = Arc<dyn Fn(&str) + Send + Sync>;

/// Outcome of a producer invoked by [`Cache::get`]
#[derive(Debug)]
pub enum Produced<T> {
    /// Fresh data, to be stored and returned
    Value(T),
    /// The producer ran but had nothing to offer
    Empty,
    /// The producer failed
    Failed(BoxError),
}

impl<T> From<Option<T>> for Produced<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => Produced::Value(v),
            None => Produced::Empty,
        }
    }
}

impl<T, E> From<Result<Option<T>, E>> for Produced<T>
where
    E: Into<BoxError>,
{
    fn from(result: Result<Option<T>, E>) -> Self {
        match result {
            Ok(value) => value.into(),
            Err(e) => Produced::Failed(e.into()),
        }
    }
}

/// Default bypass probe: the signal is an environment variable named after the keyword
pub fn env_bypass_probe() -> BypassProbe {
    Arc::new(|keyword: &str| !keyword.is_empty() && std::env::var_os(keyword).is_some())
}

/// Default fatal hook: report on stderr and exit with status 1
pub fn exit_fatal_hook() -> FatalHook {
    Arc::new(|message: &str| {
        eprintln!("{message}");
        std::process::exit(1);
    })
}

/// Filesystem-backed cache keyed by dotted string identifiers
///
/// Stateless between calls: every freshness decision is made from the files on
/// disk. Concurrent writers to the same key are not coordinated; the last write
/// wins.
#[derive(Clone)]
pub struct Cache {
    config: CacheConfig,
    bypass_probe: BypassProbe,
    fatal_hook: FatalHook,
}

impl fmt::Debug for Cache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cache")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Default for Cache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

impl Cache {
    /// Creates a cache with the environment-variable bypass probe and the
    /// process-exiting fatal hook
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            bypass_probe: env_bypass_probe(),
            fatal_hook: exit_fatal_hook(),
        }
    }

    /// Creates a default-configured cache rooted at `cache_dir`
    pub fn with_dir(cache_dir: impl Into<PathBuf>) -> Self {
        Self::new(CacheConfig::with_path(cache_dir))
    }

    /// Replaces how the bypass signal is detected
    pub fn with_bypass_probe<F>(mut self, probe: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        self.bypass_probe = Arc::new(probe);
        self
    }

    /// Replaces what happens when a producer fails in bypass mode
    pub fn with_fatal_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.fatal_hook = Arc::new(hook);
        self
    }

    /// Returns the configuration this cache was built with
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Returns the file backing `key`
    pub fn path(&self, key: &str) -> PathBuf {
        path::resolve(&self.config.cache_path, key)
    }

    /// Whether bypass mode is active for the current call
    pub fn bypassing(&self) -> bool {
        self.config.allow_cache_bypass && (self.bypass_probe)(&self.config.cache_bypass_keyword)
    }

    fn is_valid(&self, path: &Path, ttl: Option<Ttl>) -> bool {
        let ttl = ttl.unwrap_or(self.config.default_ttl);
        validity::is_valid(path, ttl, self.bypassing())
    }

    /// Reads `key` if it is fresh under `ttl` (or the default TTL), else
    /// returns `fallback`
    ///
    /// Expired entries are not served here; see [`Cache::get`] for stale
    /// recovery.
    pub fn read<T: DeserializeOwned>(
        &self,
        key: &str,
        ttl: Option<Ttl>,
        fallback: Option<T>,
    ) -> Option<T> {
        let path = self.path(key);
        if self.is_valid(&path, ttl) {
            if let Some(payload) = store::read(&path) {
                return Some(payload);
            }
        }
        debug!(key, "cache read miss");
        fallback
    }

    /// Stores `payload` under `key`, returning whether it was persisted
    pub fn write<T: Serialize + ?Sized>(&self, key: &str, payload: &T) -> bool {
        let success = store::write(&self.path(key), payload);
        debug!(key, success, "cache write");
        success
    }

    /// Removes `key`
    ///
    /// With `also_delete_directory`, the directory named after the key is
    /// removed when it exists. For a nested key without such a directory, the
    /// directory holding the key's file is removed instead, taking sibling keys
    /// with it. The cache root itself is never removed. Absent entries count as
    /// deleted.
    pub fn delete(&self, key: &str, also_delete_directory: bool) -> bool {
        let path = self.path(key);
        let root = self.config.cache_path.as_path();

        if also_delete_directory && !path::key_dir(&path).is_some_and(|d| d.is_dir()) {
            if let Some(parent) = path.parent().filter(|p| *p != root && p.starts_with(root)) {
                debug!(key, dir = %parent.display(), "cache delete folder");
                return store::remove_dir_tree(parent);
            }
        }

        debug!(key, also_delete_directory, "cache delete");
        store::delete(&path, also_delete_directory)
    }

    /// Seconds since `key` was last written or touched, if it exists
    pub fn age(&self, key: &str) -> Option<u64> {
        validity::entry_age(&self.path(key)).map(|age| age.num_seconds().max(0) as u64)
    }

    /// Whether `key` is fresh under `ttl` (or the default TTL)
    pub fn has(&self, key: &str, ttl: Option<Ttl>) -> bool {
        self.is_valid(&self.path(key), ttl)
    }

    /// Returns the payload for `key`, recomputing it with `producer` when the
    /// stored one is missing or expired.
    ///
    /// - Fresh entry: returned as is, the producer is not called.
    /// - Producer yields a value: it is stored (a failed write is only logged)
    ///   and returned.
    /// - Producer fails or yields [`Produced::Empty`]: the stored payload,
    ///   however old, is touched so it counts as fresh for another TTL period
    ///   and returned. Without any stored payload the result is `None`.
    /// - Producer fails while bypass mode is active: the fatal hook runs, which
    ///   by default exits the process.
    pub fn get<T, F, P>(&self, key: &str, producer: F, ttl: Option<Ttl>) -> Option<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> P,
        P: Into<Produced<T>>,
    {
        let path = self.path(key);

        if self.is_valid(&path, ttl) {
            if let Some(payload) = store::read(&path) {
                debug!(key, "cache get hit");
                return Some(payload);
            }
        }

        let outcome: Produced<T> = producer().into();
        match outcome {
            Produced::Value(data) => {
                debug!(key, "cache get refilled");
                if !store::write(&path, &data) {
                    warn!(key, "fresh value could not be persisted");
                }
                Some(data)
            }
            Produced::Failed(e) if self.bypassing() => {
                let message = format!("fatal: unable to load {key} with the cache bypassed: {e}");
                error!(key, error = %e, "producer failed in bypass mode");
                (self.fatal_hook)(&message);
                None
            }
            Produced::Failed(e) => {
                warn!(key, error = %e, "producer failed, serving expired entry");
                self.recover_stale(key, &path)
            }
            Produced::Empty => {
                warn!(key, "producer returned nothing, serving expired entry");
                self.recover_stale(key, &path)
            }
        }
    }

    /// Serves whatever is stored at `path`, pushing its expiry out by a full
    /// TTL period so a failing producer is retried at most once per period
    fn recover_stale<T: DeserializeOwned>(&self, key: &str, path: &Path) -> Option<T> {
        if !path.is_file() {
            debug!(key, "no stored entry to fall back to");
            return None;
        }
        store::touch(path);
        store::read(path)
    }
}
