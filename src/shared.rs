//! Process-wide shared cache
//!
//! A single [`Cache`] created on first use and handed out as an `Arc`. Calling
//! [`fresh`] swaps in a new instance; anyone still holding the previous `Arc`
//! keeps using the previous configuration.

use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use serde::{de::DeserializeOwned, Serialize};
use tracing::debug;

use crate::cache::{Cache, Produced};
use crate::config::{CacheConfig, Ttl};

fn slot() -> &'static RwLock<Option<Arc<Cache>>> {
    static SHARED: OnceLock<RwLock<Option<Arc<Cache>>>> = OnceLock::new();
    SHARED.get_or_init(|| RwLock::new(None))
}

/// Returns the shared cache, creating it from [`CacheConfig::from_env`] if needed
pub fn instance() -> Arc<Cache> {
    if let Some(cache) = slot()
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .as_ref()
    {
        return Arc::clone(cache);
    }

    let mut guard = slot().write().unwrap_or_else(PoisonError::into_inner);
    // Another caller may have initialised it between the two locks
    Arc::clone(guard.get_or_insert_with(|| {
        debug!("creating shared cache");
        Arc::new(Cache::new(CacheConfig::from_env()))
    }))
}

/// Replaces the shared cache with one built from `config` and returns it
pub fn fresh(config: CacheConfig) -> Arc<Cache> {
    install(Cache::new(config))
}

/// Replaces the shared cache with `cache` and returns it
pub fn install(cache: Cache) -> Arc<Cache> {
    let cache = Arc::new(cache);
    *slot().write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&cache));
    debug!(path = %cache.config().cache_path.display(), "shared cache replaced");
    cache
}

/// [`Cache::read`] on the shared instance
pub fn read<T: DeserializeOwned>(key: &str, ttl: Option<Ttl>, fallback: Option<T>) -> Option<T> {
    instance().read(key, ttl, fallback)
}

/// [`Cache::write`] on the shared instance
pub fn write<T: Serialize + ?Sized>(key: &str, payload: &T) -> bool {
    instance().write(key, payload)
}

/// [`Cache::delete`] on the shared instance
pub fn delete(key: &str, also_delete_directory: bool) -> bool {
    instance().delete(key, also_delete_directory)
}

/// [`Cache::age`] on the shared instance
pub fn age(key: &str) -> Option<u64> {
    instance().age(key)
}

/// [`Cache::has`] on the shared instance
pub fn has(key: &str, ttl: Option<Ttl>) -> bool {
    instance().has(key, ttl)
}

/// [`Cache::get`] on the shared instance
pub fn get<T, F, P>(key: &str, producer: F, ttl: Option<Ttl>) -> Option<T>
where
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> P,
    P: Into<Produced<T>>,
{
    instance().get(key, producer, ttl)
}
