//! Query cache store.
//!
//! Reads go through [`QueryCache::query`], which serves a fresh cached value
//! or issues the supplied fetch. Writes never touch entries directly; they
//! invalidate key prefixes so the next read recontacts the service.
//!
//! # Ordering
//!
//! A read takes a [`FetchTicket`] at the moment `query` is called, not when
//! its future is first polled. When it resolves, its result is written only
//! if no later-initiated read has already resolved for the same key and no
//! invalidation of the key happened after it was initiated. A discarded
//! reader receives the newer cached value when one exists.
//!
//! Entries remember the ticket they were created at. Reads initiated before
//! an entry was dropped (`clear`, `remove`, collection) never write into or
//! account against the entry that replaces it.
//!
//! The state lock is never held across an `.await`.

use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use futures_util::future::{self, BoxFuture, FutureExt};
use wall_core::{CacheError, WallError, WallResult};

use crate::freshness::{CacheRead, QueryPolicy, Snapshot};
use crate::key::QueryKey;
use crate::stats::CacheStats;
use crate::ticket::{FetchTicket, TicketClock};

type StoredValue = Arc<dyn Any + Send + Sync>;

#[derive(Clone)]
struct Resolved {
    value: StoredValue,
    fetched_at: DateTime<Utc>,
    ticket: FetchTicket,
}

struct Failed {
    error: WallError,
    ticket: FetchTicket,
}

struct CacheEntry {
    /// Ticket issued when this entry was created.
    epoch: FetchTicket,
    policy: QueryPolicy,
    data: Option<Resolved>,
    error: Option<Failed>,
    invalidated_at: Option<FetchTicket>,
    in_flight: usize,
    last_accessed: DateTime<Utc>,
}

impl CacheEntry {
    fn new(epoch: FetchTicket, policy: QueryPolicy, now: DateTime<Utc>) -> Self {
        Self {
            epoch,
            policy,
            data: None,
            error: None,
            invalidated_at: None,
            in_flight: 0,
            last_accessed: now,
        }
    }

    fn resolved_ticket(&self) -> Option<FetchTicket> {
        let data = self.data.as_ref().map(|d| d.ticket);
        let error = self.error.as_ref().map(|e| e.ticket);
        data.max(error)
    }

    /// Data exists but an invalidation happened after it was fetched.
    fn is_invalidated(&self) -> bool {
        match (&self.invalidated_at, &self.data) {
            (Some(invalidated), Some(data)) => invalidated.is_newer_than(&data.ticket),
            (Some(_), None) => true,
            (None, _) => false,
        }
    }

    fn fresh_value(&self, now: DateTime<Utc>) -> Option<&Resolved> {
        let data = self.data.as_ref()?;
        if self.is_invalidated() || !self.policy.is_fresh(data.fetched_at, now) {
            return None;
        }
        match &self.error {
            Some(failed) if failed.ticket.is_newer_than(&data.ticket) => None,
            _ => Some(data),
        }
    }
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<QueryKey, CacheEntry>,
    stats: CacheStats,
}

struct CacheInner {
    state: Mutex<CacheState>,
    tickets: TicketClock,
}

enum Lookup {
    Fresh(Resolved),
    Fetch(FetchTicket),
}

enum Completion {
    Stored,
    Superseded(Resolved),
    Discarded,
}

/// Process-wide store of cached query results.
///
/// Cloning is cheap; clones share the same entries.
#[derive(Clone)]
pub struct QueryCache {
    inner: Arc<CacheInner>,
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for QueryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryCache")
            .field("entries", &self.len())
            .finish()
    }
}

impl QueryCache {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(CacheInner {
                state: Mutex::new(CacheState::default()),
                tickets: TicketClock::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Serve `key` from the cache or fetch it.
    ///
    /// The cache lookup and ticket issue happen before this returns, so the
    /// call order of `query` defines initiation order.
    pub fn query<T, F, Fut>(
        &self,
        key: QueryKey,
        policy: QueryPolicy,
        fetch: F,
    ) -> BoxFuture<'static, WallResult<CacheRead<T>>>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = WallResult<T>> + Send + 'static,
    {
        match self.lookup_or_begin(&key, policy) {
            Lookup::Fresh(resolved) => {
                tracing::debug!(%key, "query cache hit");
                let read = downcast::<T>(&key, &resolved)
                    .map(|value| CacheRead::from_cache(value, resolved.fetched_at));
                future::ready(read).boxed()
            }
            Lookup::Fetch(ticket) => {
                tracing::debug!(%key, ticket = ticket.sequence(), "query cache miss");
                let request = fetch();
                let cache = self.clone();
                async move {
                    let result = request.await;
                    cache.resolve(key, ticket, result)
                }
                .boxed()
            }
        }
    }

    fn lookup_or_begin(&self, key: &QueryKey, policy: QueryPolicy) -> Lookup {
        let now = Utc::now();
        let mut guard = self.lock();
        let state = &mut *guard;
        let entry = state
            .entries
            .entry(key.clone())
            .or_insert_with(|| CacheEntry::new(self.inner.tickets.issue(), policy, now));
        entry.policy = policy;
        entry.last_accessed = now;

        if let Some(resolved) = entry.fresh_value(now) {
            state.stats.hits += 1;
            return Lookup::Fresh(resolved.clone());
        }

        let ticket = self.inner.tickets.issue();
        entry.in_flight += 1;
        state.stats.misses += 1;
        Lookup::Fetch(ticket)
    }

    fn resolve<T>(
        &self,
        key: QueryKey,
        ticket: FetchTicket,
        result: WallResult<T>,
    ) -> WallResult<CacheRead<T>>
    where
        T: Clone + Send + Sync + 'static,
    {
        let shared = result.map(Arc::new);
        let stored = shared.clone().map(|value| value as StoredValue);

        match self.complete(&key, ticket, stored) {
            Completion::Stored => {
                tracing::trace!(%key, ticket = ticket.sequence(), "query result stored");
                shared.map(|value| CacheRead::from_remote((*value).clone()))
            }
            Completion::Superseded(newer) => {
                tracing::debug!(
                    %key,
                    ticket = ticket.sequence(),
                    newer = newer.ticket.sequence(),
                    "query result superseded by a later read"
                );
                downcast::<T>(&key, &newer)
                    .map(|value| CacheRead::from_cache(value, newer.fetched_at))
            }
            Completion::Discarded => {
                tracing::debug!(%key, ticket = ticket.sequence(), "query result discarded");
                shared.map(|value| CacheRead::from_remote((*value).clone()))
            }
        }
    }

    fn complete(
        &self,
        key: &QueryKey,
        ticket: FetchTicket,
        result: WallResult<StoredValue>,
    ) -> Completion {
        let now = Utc::now();
        let mut guard = self.lock();
        let state = &mut *guard;
        let entry = state
            .entries
            .get_mut(key)
            .filter(|entry| ticket.is_newer_than(&entry.epoch));
        let Some(entry) = entry else {
            state.stats.discarded += 1;
            return Completion::Discarded;
        };
        entry.in_flight = entry.in_flight.saturating_sub(1);
        entry.last_accessed = now;

        let pre_invalidation = entry
            .invalidated_at
            .is_some_and(|invalidated| invalidated.is_newer_than(&ticket));
        let superseded = entry
            .resolved_ticket()
            .is_some_and(|resolved| resolved.is_newer_than(&ticket));

        if pre_invalidation || superseded {
            state.stats.discarded += 1;
            return match &entry.data {
                Some(data) if data.ticket.is_newer_than(&ticket) && !entry.is_invalidated() => {
                    Completion::Superseded(data.clone())
                }
                _ => Completion::Discarded,
            };
        }

        match result {
            Ok(value) => {
                entry.data = Some(Resolved {
                    value,
                    fetched_at: now,
                    ticket,
                });
                entry.error = None;
            }
            Err(error) => {
                entry.error = Some(Failed { error, ticket });
            }
        }
        Completion::Stored
    }

    /// Cached value for `key` regardless of its staleness window.
    ///
    /// Values fetched before the last invalidation of `key` are not returned.
    pub fn peek<T>(&self, key: &QueryKey) -> Option<T>
    where
        T: Clone + 'static,
    {
        let guard = self.lock();
        let entry = guard.entries.get(key)?;
        if entry.is_invalidated() {
            return None;
        }
        let data = entry.data.as_ref()?;
        (*data.value).downcast_ref::<T>().cloned()
    }

    /// Last error recorded for `key`, if it is newer than the cached value.
    pub fn last_error(&self, key: &QueryKey) -> Option<WallError> {
        let guard = self.lock();
        let entry = guard.entries.get(key)?;
        let failed = entry.error.as_ref()?;
        match &entry.data {
            Some(data) if data.ticket.is_newer_than(&failed.ticket) => None,
            _ => Some(failed.error.clone()),
        }
    }

    /// What to display for `key` right now, without fetching.
    ///
    /// Falls back to the most recently resolved sibling (same parent key)
    /// when the entry has no value yet and its policy keeps previous data.
    /// `policy` applies only when the key has never been requested.
    pub fn snapshot<T>(&self, key: &QueryKey, policy: QueryPolicy) -> Option<Snapshot<T>>
    where
        T: Clone + 'static,
    {
        let now = Utc::now();
        let guard = self.lock();
        let entry = guard.entries.get(key);
        let is_fetching = entry.is_some_and(|entry| entry.in_flight > 0);

        if let Some((entry, data)) = entry.and_then(|e| e.data.as_ref().map(|d| (e, d))) {
            let value = (*data.value).downcast_ref::<T>().cloned()?;
            return Some(Snapshot {
                value,
                fetched_at: data.fetched_at,
                is_placeholder: false,
                is_stale: entry.fresh_value(now).is_none(),
                is_fetching,
            });
        }

        let keep_previous_data = entry.map_or(policy.keep_previous_data, |entry| {
            entry.policy.keep_previous_data
        });
        if !keep_previous_data {
            return None;
        }
        let parent = key.parent()?;
        let previous = guard
            .entries
            .iter()
            .filter(|(sibling, _)| *sibling != key && sibling.parent().as_ref() == Some(&parent))
            .filter_map(|(_, sibling)| sibling.data.as_ref())
            .max_by_key(|data| data.ticket)?;
        let value = (*previous.value).downcast_ref::<T>().cloned()?;
        Some(Snapshot {
            value,
            fetched_at: previous.fetched_at,
            is_placeholder: true,
            is_stale: true,
            is_fetching,
        })
    }

    /// Mark every entry under `prefix` stale.
    ///
    /// Values are kept for placeholder display but are never served as
    /// fresh again, and reads initiated before this call can no longer
    /// write their results. Returns the number of entries affected.
    pub fn invalidate(&self, prefix: &QueryKey) -> u64 {
        let mut guard = self.lock();
        let state = &mut *guard;
        let ticket = self.inner.tickets.issue();
        let mut count = 0u64;
        for (key, entry) in state.entries.iter_mut() {
            if key.starts_with(prefix) {
                entry.invalidated_at = Some(ticket);
                count += 1;
            }
        }
        state.stats.invalidated += count;
        tracing::debug!(%prefix, count, "invalidated cache prefix");
        count
    }

    /// Drop a single entry. In-flight reads of it resolve without writing.
    pub fn remove(&self, key: &QueryKey) -> bool {
        self.lock().entries.remove(key).is_some()
    }

    /// Drop every entry. In-flight reads resolve without writing.
    pub fn clear(&self) {
        let mut guard = self.lock();
        let count = guard.entries.len();
        guard.entries.clear();
        tracing::debug!(count, "query cache cleared");
    }

    /// Evict idle entries past their gc window.
    pub fn collect_garbage(&self) -> usize {
        self.collect_garbage_at(Utc::now())
    }

    /// Evict entries idle at `now` for longer than their gc window.
    ///
    /// Entries with reads in flight are never evicted.
    pub fn collect_garbage_at(&self, now: DateTime<Utc>) -> usize {
        let mut guard = self.lock();
        let state = &mut *guard;
        let before = state.entries.len();
        state.entries.retain(|key, entry| {
            let keep =
                entry.in_flight > 0 || !entry.policy.is_collectable(entry.last_accessed, now);
            if !keep {
                tracing::trace!(%key, "collecting idle cache entry");
            }
            keep
        });
        let removed = before - state.entries.len();
        state.stats.evictions += removed as u64;
        removed
    }

    pub fn contains(&self, key: &QueryKey) -> bool {
        self.lock().entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let guard = self.lock();
        let mut stats = guard.stats.clone();
        stats.entry_count = guard.entries.len() as u64;
        stats
    }
}

fn downcast<T>(key: &QueryKey, resolved: &Resolved) -> WallResult<T>
where
    T: Clone + 'static,
{
    (*resolved.value)
        .downcast_ref::<T>()
        .cloned()
        .ok_or_else(|| {
            CacheError::TypeMismatch {
                key: key.to_string(),
                expected: std::any::type_name::<T>(),
            }
            .into()
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::oneshot;
    use wall_core::RemoteFailure;

    fn minute_policy() -> QueryPolicy {
        QueryPolicy::new(Duration::from_secs(60), Duration::from_secs(90))
    }

    fn page_key(page: u64) -> QueryKey {
        QueryKey::new("messages").with("recent").with(page)
    }

    async fn fetch_counted(
        cache: &QueryCache,
        key: QueryKey,
        calls: &Arc<AtomicUsize>,
        value: &str,
    ) -> WallResult<CacheRead<String>> {
        let calls = Arc::clone(calls);
        let value = value.to_string();
        cache
            .query(key, minute_policy(), move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, WallError>(value)
            })
            .await
    }

    #[tokio::test]
    async fn test_fresh_value_served_without_fetch() {
        let cache = QueryCache::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let first = fetch_counted(&cache, page_key(1), &calls, "page one").await.unwrap();
        let second = fetch_counted(&cache, page_key(1), &calls, "ignored").await.unwrap();

        assert!(first.was_cache_miss());
        assert!(second.was_cache_hit());
        assert_eq!(second.value(), "page one");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[tokio::test]
    async fn test_zero_stale_time_always_refetches() {
        let cache = QueryCache::new();
        let calls = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let calls = Arc::clone(&calls);
            cache
                .query(QueryKey::new("detail"), QueryPolicy::default(), move || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, WallError>(1u8)
                })
                .await
                .unwrap();
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_later_initiated_read_wins_when_resolving_first() {
        let cache = QueryCache::new();
        let key = page_key(1);

        let (old_tx, old_rx) = oneshot::channel::<String>();
        let (new_tx, new_rx) = oneshot::channel::<String>();
        let first = cache.query(key.clone(), minute_policy(), move || async move {
            Ok::<_, WallError>(old_rx.await.unwrap())
        });
        let second = cache.query(key.clone(), minute_policy(), move || async move {
            Ok::<_, WallError>(new_rx.await.unwrap())
        });

        new_tx.send("new".to_string()).unwrap();
        let second = second.await.unwrap();
        old_tx.send("old".to_string()).unwrap();
        let first = first.await.unwrap();

        assert_eq!(second.value(), "new");
        assert_eq!(first.value(), "new");
        assert_eq!(cache.peek::<String>(&key).as_deref(), Some("new"));
        assert_eq!(cache.stats().discarded, 1);
    }

    #[tokio::test]
    async fn test_later_initiated_read_overwrites_when_resolving_last() {
        let cache = QueryCache::new();
        let key = page_key(1);

        let (old_tx, old_rx) = oneshot::channel::<String>();
        let (new_tx, new_rx) = oneshot::channel::<String>();
        let first = cache.query(key.clone(), minute_policy(), move || async move {
            Ok::<_, WallError>(old_rx.await.unwrap())
        });
        let second = cache.query(key.clone(), minute_policy(), move || async move {
            Ok::<_, WallError>(new_rx.await.unwrap())
        });

        old_tx.send("old".to_string()).unwrap();
        assert_eq!(first.await.unwrap().value(), "old");
        new_tx.send("new".to_string()).unwrap();
        assert_eq!(second.await.unwrap().value(), "new");

        assert_eq!(cache.peek::<String>(&key).as_deref(), Some("new"));
    }

    #[tokio::test]
    async fn test_invalidation_forces_refetch_under_prefix_only() {
        let cache = QueryCache::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let votes = QueryKey::new("votes");

        fetch_counted(&cache, page_key(1), &calls, "before").await.unwrap();
        fetch_counted(&cache, page_key(2), &calls, "before").await.unwrap();
        fetch_counted(&cache, votes.clone(), &calls, "votes").await.unwrap();
        assert_eq!(cache.invalidate(&QueryKey::new("messages")), 2);
        assert_eq!(cache.peek::<String>(&page_key(2)), None);
        assert_eq!(cache.peek::<String>(&votes).as_deref(), Some("votes"));

        let page = fetch_counted(&cache, page_key(1), &calls, "after").await.unwrap();
        assert!(page.was_cache_miss());
        assert_eq!(page.value(), "after");

        let cached_votes = fetch_counted(&cache, votes, &calls, "refetched").await.unwrap();
        assert!(cached_votes.was_cache_hit());
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_read_initiated_before_invalidation_cannot_write() {
        let cache = QueryCache::new();
        let key = page_key(1);
        let (tx, rx) = oneshot::channel::<String>();
        let in_flight = cache.query(key.clone(), minute_policy(), move || async move {
            Ok::<_, WallError>(rx.await.unwrap())
        });

        cache.invalidate(&QueryKey::new("messages"));
        tx.send("pre-invalidation".to_string()).unwrap();
        let own = in_flight.await.unwrap();

        assert_eq!(own.value(), "pre-invalidation");
        assert_eq!(cache.peek::<String>(&key), None);

        let calls = Arc::new(AtomicUsize::new(0));
        let next = fetch_counted(&cache, key, &calls, "post-invalidation").await.unwrap();
        assert_eq!(next.value(), "post-invalidation");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_errors_are_returned_and_not_served_fresh() {
        let cache = QueryCache::new();
        let key = QueryKey::new("homework");
        let calls = Arc::new(AtomicUsize::new(0));

        fetch_counted(&cache, key.clone(), &calls, "list").await.unwrap();
        cache.invalidate(&key);
        let failed = cache
            .query(key.clone(), minute_policy(), || async {
                Err::<String, _>(WallError::Remote(RemoteFailure::new("boom")))
            })
            .await;
        assert_eq!(failed.unwrap_err(), WallError::Remote(RemoteFailure::new("boom")));
        assert!(cache.last_error(&key).is_some());

        let retried = fetch_counted(&cache, key.clone(), &calls, "list again").await.unwrap();
        assert!(retried.was_cache_miss());
        assert!(cache.last_error(&key).is_none());
    }

    #[tokio::test]
    async fn test_snapshot_uses_sibling_placeholder_when_keeping_previous_data() {
        let cache = QueryCache::new();
        let policy = minute_policy().with_keep_previous_data(true);

        cache
            .query(page_key(1), policy, || async { Ok::<_, WallError>("one".to_string()) })
            .await
            .unwrap();

        let (tx, rx) = oneshot::channel::<String>();
        let loading = cache.query(page_key(2), policy, move || async move {
            Ok::<_, WallError>(rx.await.unwrap())
        });

        let snapshot = cache.snapshot::<String>(&page_key(2), policy).unwrap();
        assert_eq!(snapshot.value, "one");
        assert!(snapshot.is_placeholder);
        assert!(snapshot.is_fetching);

        tx.send("two".to_string()).unwrap();
        loading.await.unwrap();
        let snapshot = cache.snapshot::<String>(&page_key(2), policy).unwrap();
        assert_eq!(snapshot.value, "two");
        assert!(!snapshot.is_placeholder);
        assert!(!snapshot.is_stale);
        assert!(!snapshot.is_fetching);
    }

    #[tokio::test]
    async fn test_snapshot_of_unrequested_key_uses_given_policy() {
        let cache = QueryCache::new();
        let policy = minute_policy().with_keep_previous_data(true);
        cache
            .query(page_key(3), policy, || async { Ok::<_, WallError>("three".to_string()) })
            .await
            .unwrap();

        let snapshot = cache.snapshot::<String>(&page_key(4), policy).unwrap();
        assert_eq!(snapshot.value, "three");
        assert!(snapshot.is_placeholder);
        assert!(!snapshot.is_fetching);
        assert!(cache.snapshot::<String>(&page_key(4), minute_policy()).is_none());
        assert!(cache.snapshot::<String>(&QueryKey::new("votes"), policy).is_none());
    }

    #[tokio::test]
    async fn test_snapshot_without_keep_previous_data_is_empty_while_loading() {
        let cache = QueryCache::new();
        cache
            .query(page_key(1), minute_policy(), || async {
                Ok::<_, WallError>("one".to_string())
            })
            .await
            .unwrap();
        let (_tx, rx) = oneshot::channel::<String>();
        let _loading = cache.query(page_key(2), minute_policy(), move || async move {
            Ok::<_, WallError>(rx.await.unwrap_or_default())
        });
        assert!(cache
            .snapshot::<String>(&page_key(2), minute_policy())
            .is_none());
    }

    #[tokio::test]
    async fn test_garbage_collection_skips_in_flight_and_recent() {
        let cache = QueryCache::new();
        let calls = Arc::new(AtomicUsize::new(0));
        fetch_counted(&cache, page_key(1), &calls, "idle").await.unwrap();

        let (_tx, rx) = oneshot::channel::<String>();
        let _pending = cache.query(page_key(2), minute_policy(), move || async move {
            Ok::<_, WallError>(rx.await.unwrap_or_default())
        });

        assert_eq!(cache.collect_garbage(), 0);
        let later = Utc::now() + chrono::Duration::seconds(120);
        assert_eq!(cache.collect_garbage_at(later), 1);
        assert!(!cache.contains(&page_key(1)));
        assert!(cache.contains(&page_key(2)));
        assert_eq!(cache.stats().evictions, 1);
    }

    #[tokio::test]
    async fn test_clear_discards_in_flight_results() {
        let cache = QueryCache::new();
        let (tx, rx) = oneshot::channel::<String>();
        let pending = cache.query(QueryKey::new("votes"), minute_policy(), move || async move {
            Ok::<_, WallError>(rx.await.unwrap())
        });
        cache.clear();
        tx.send("previous caller".to_string()).unwrap();
        pending.await.unwrap();
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_read_from_before_clear_cannot_fill_the_new_entry() {
        let cache = QueryCache::new();
        let key = QueryKey::new("votes");
        let (old_tx, old_rx) = oneshot::channel::<String>();
        let stale = cache.query(key.clone(), minute_policy(), move || async move {
            Ok::<_, WallError>(old_rx.await.unwrap())
        });
        cache.clear();
        let (new_tx, new_rx) = oneshot::channel::<String>();
        let current = cache.query(key.clone(), minute_policy(), move || async move {
            Ok::<_, WallError>(new_rx.await.unwrap())
        });

        old_tx.send("previous caller votes".to_string()).unwrap();
        assert_eq!(stale.await.unwrap().value(), "previous caller votes");
        assert_eq!(cache.peek::<String>(&key), None);
        let snapshot = cache.snapshot::<String>(&key, minute_policy());
        assert!(snapshot.is_none());

        let later = Utc::now() + chrono::Duration::seconds(120);
        assert_eq!(cache.collect_garbage_at(later), 0);
        assert!(cache.contains(&key));

        new_tx.send("current caller votes".to_string()).unwrap();
        assert_eq!(current.await.unwrap().value(), "current caller votes");
        assert_eq!(
            cache.peek::<String>(&key).as_deref(),
            Some("current caller votes")
        );
    }

    #[tokio::test]
    async fn test_read_from_before_remove_is_discarded() {
        let cache = QueryCache::new();
        let key = page_key(1);
        let (tx, rx) = oneshot::channel::<String>();
        let stale = cache.query(key.clone(), minute_policy(), move || async move {
            Ok::<_, WallError>(rx.await.unwrap())
        });
        assert!(cache.remove(&key));
        let (_pending_tx, pending_rx) = oneshot::channel::<String>();
        let _current = cache.query(key.clone(), minute_policy(), move || async move {
            Ok::<_, WallError>(pending_rx.await.unwrap_or_default())
        });

        tx.send("removed".to_string()).unwrap();
        stale.await.unwrap();
        assert_eq!(cache.peek::<String>(&key), None);
        assert_eq!(cache.stats().discarded, 1);
        let snapshot = cache.snapshot::<String>(&key, minute_policy());
        assert!(snapshot.is_none());
    }

    #[tokio::test]
    async fn test_type_mismatch_is_reported() {
        let cache = QueryCache::new();
        let key = QueryKey::new("count");
        cache
            .query(key.clone(), minute_policy(), || async { Ok::<_, WallError>(3u64) })
            .await
            .unwrap();
        let read = cache
            .query(key, minute_policy(), || async { Ok::<_, WallError>("three".to_string()) })
            .await;
        assert!(matches!(read, Err(WallError::Cache(CacheError::TypeMismatch { .. }))));
    }
}
