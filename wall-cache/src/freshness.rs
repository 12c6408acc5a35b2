//! Freshness contracts for cached reads.
//!
//! Every query declares how long its result may be served without
//! recontacting the service, and reads return [`CacheRead<T>`] which carries
//! where the value came from and how old it is.

use chrono::{DateTime, Utc};
use std::time::Duration;

/// Caching policy declared by a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryPolicy {
    /// Age after which a cached result must be refetched.
    pub stale_time: Duration,
    /// Inactivity window after which an idle entry is collected.
    pub gc_time: Duration,
    /// Keep showing the last resolved sibling while this key loads.
    pub keep_previous_data: bool,
}

impl Default for QueryPolicy {
    /// Always stale, collected after five minutes of inactivity.
    fn default() -> Self {
        Self {
            stale_time: Duration::ZERO,
            gc_time: Duration::from_secs(5 * 60),
            keep_previous_data: false,
        }
    }
}

impl QueryPolicy {
    pub fn new(stale_time: Duration, gc_time: Duration) -> Self {
        Self {
            stale_time,
            gc_time,
            keep_previous_data: false,
        }
    }

    pub fn with_keep_previous_data(mut self, keep: bool) -> Self {
        self.keep_previous_data = keep;
        self
    }

    /// Whether a value fetched at `fetched_at` may still be served at `now`.
    pub fn is_fresh(&self, fetched_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        age(fetched_at, now) < self.stale_time
    }

    /// Whether an entry last touched at `last_accessed` is collectable at `now`.
    pub fn is_collectable(&self, last_accessed: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        age(last_accessed, now) > self.gc_time
    }
}

pub(crate) fn age(since: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    now.signed_duration_since(since)
        .to_std()
        .unwrap_or(Duration::ZERO)
}

/// Result of a cached query, carrying provenance metadata.
#[derive(Debug, Clone)]
pub struct CacheRead<T> {
    value: T,
    fetched_at: DateTime<Utc>,
    was_cache_hit: bool,
}

impl<T> CacheRead<T> {
    /// A value served from the cache without a remote call.
    pub fn from_cache(value: T, fetched_at: DateTime<Utc>) -> Self {
        Self {
            value,
            fetched_at,
            was_cache_hit: true,
        }
    }

    /// A value just returned by the remote service.
    pub fn from_remote(value: T) -> Self {
        Self {
            value,
            fetched_at: Utc::now(),
            was_cache_hit: false,
        }
    }

    pub fn into_value(self) -> T {
        self.value
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn fetched_at(&self) -> DateTime<Utc> {
        self.fetched_at
    }

    /// Time elapsed since the value was fetched from the service.
    pub fn staleness(&self) -> Duration {
        age(self.fetched_at, Utc::now())
    }

    pub fn was_cache_hit(&self) -> bool {
        self.was_cache_hit
    }

    pub fn was_cache_miss(&self) -> bool {
        !self.was_cache_hit
    }

    pub fn map<U, F>(self, f: F) -> CacheRead<U>
    where
        F: FnOnce(T) -> U,
    {
        CacheRead {
            value: f(self.value),
            fetched_at: self.fetched_at,
            was_cache_hit: self.was_cache_hit,
        }
    }
}

impl<T> AsRef<T> for CacheRead<T> {
    fn as_ref(&self) -> &T {
        &self.value
    }
}

/// What a view should display for a key right now, without fetching.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot<T> {
    pub value: T,
    pub fetched_at: DateTime<Utc>,
    /// The value belongs to a sibling key and is shown while this key loads.
    pub is_placeholder: bool,
    /// The value is past its staleness window or was invalidated.
    pub is_stale: bool,
    /// A fetch for this key is in flight.
    pub is_fetching: bool,
}
