//! Entry validity checks
//!
//! An entry's only staleness signal is its file modification time.

use std::fs;
use std::path::Path;

use chrono::{DateTime, Duration, Utc};

use crate::config::Ttl;

/// Returns when the entry at `path` was last written or touched
pub fn modified_at(path: &Path) -> Option<DateTime<Utc>> {
    let meta = fs::metadata(path).ok()?;
    if !meta.is_file() {
        return None;
    }
    meta.modified().ok().map(DateTime::<Utc>::from)
}

/// Returns how long ago the entry at `path` was last written or touched.
///
/// A modification time in the future counts as zero age.
pub fn entry_age(path: &Path) -> Option<Duration> {
    let modified = modified_at(path)?;
    let age = Utc::now().signed_duration_since(modified);
    Some(age.max(Duration::zero()))
}

/// Decides whether the entry at `path` may be served
///
/// Bypass mode fails every check. Otherwise the entry must exist and, unless the
/// TTL is [`Ttl::Never`], be strictly younger than the TTL.
pub fn is_valid(path: &Path, ttl: Ttl, bypass_active: bool) -> bool {
    if bypass_active {
        return false;
    }
    let Some(age) = entry_age(path) else {
        return false;
    };
    match ttl.as_duration() {
        None => true,
        Some(limit) => age < limit,
    }
}
