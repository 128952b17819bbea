//! TTL cache with single-flight resolution
//!
//! At most one fetch per key is ever in flight. The fetch runs on a detached
//! task outside of any map lock, and its outcome is published back under a
//! short re-acquired lock before every waiter is woken through a per-key
//! `watch` channel.

use crate::error::ResolveError;
use dashmap::DashMap;
use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

/// What a read does with an entry whose TTL has passed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StalePolicy {
    /// Serve the stale value and refresh it on a background task
    #[default]
    Background,
    /// Treat the stale entry as a miss and wait for the refresh
    Blocking,
}

impl FromStr for StalePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "background" => Ok(Self::Background),
            "blocking" => Ok(Self::Blocking),
            other => Err(format!("unknown stale policy `{}`", other)),
        }
    }
}

/// Lifecycle state of a key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    Absent,
    Pending,
    Fresh,
    Stale,
}

/// Copy of a cached value handed to readers
#[derive(Debug, Clone, PartialEq)]
pub struct Cached<V> {
    pub value: V,
    pub fresh: bool,
}

/// Cache statistics for monitoring
#[derive(Debug, Default, Clone, PartialEq)]
pub struct CacheStats {
    pub hits: u64,
    pub stale_hits: u64,
    pub misses: u64,
    pub coalesced: u64,
    pub fetches: u64,
    pub fetch_errors: u64,
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    stale_hits: AtomicU64,
    misses: AtomicU64,
    coalesced: AtomicU64,
    fetches: AtomicU64,
    fetch_errors: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            stale_hits: self.stale_hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            coalesced: self.coalesced.load(Ordering::Relaxed),
            fetches: self.fetches.load(Ordering::Relaxed),
            fetch_errors: self.fetch_errors.load(Ordering::Relaxed),
        }
    }
}

/// `None` until the leader publishes
type Outcome<V> = Option<Result<V, ResolveError>>;

struct Stored<V> {
    value: V,
    expires_at: Instant,
}

impl<V> Stored<V> {
    fn is_fresh(&self, now: Instant) -> bool {
        now <= self.expires_at
    }
}

struct Slot<V> {
    /// Last successful value; a failed fetch never touches it
    stored: Option<Stored<V>>,
    /// Completion signal of the fetch currently in flight
    inflight: Option<watch::Receiver<Outcome<V>>>,
}

impl<V> Default for Slot<V> {
    fn default() -> Self {
        Self {
            stored: None,
            inflight: None,
        }
    }
}

impl<V> Slot<V> {
    fn is_vacant(&self) -> bool {
        self.stored.is_none() && self.inflight.is_none()
    }
}

/// Resolution cache keyed by canonical URL
pub struct CacheStore<V> {
    entries: Arc<DashMap<String, Slot<V>>>,
    ttl: Duration,
    stale_policy: StalePolicy,
    counters: Arc<Counters>,
}

impl<V> CacheStore<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Create a new cache with the default (background) stale policy
    pub fn new(ttl: Duration) -> Self {
        Self::with_policy(ttl, StalePolicy::default())
    }

    pub fn with_policy(ttl: Duration, stale_policy: StalePolicy) -> Self {
        tracing::info!(
            ttl_secs = ttl.as_secs(),
            stale_policy = ?stale_policy,
            "Creating resolution cache"
        );

        Self {
            entries: Arc::new(DashMap::new()),
            ttl,
            stale_policy,
            counters: Arc::new(Counters::default()),
        }
    }

    /// Whatever is known locally for `key`. Never waits on a fetch.
    pub fn get(&self, key: &str) -> Option<Cached<V>> {
        let slot = self.entries.get(key)?;
        let stored = slot.stored.as_ref()?;
        Some(Cached {
            value: stored.value.clone(),
            fresh: stored.is_fresh(Instant::now()),
        })
    }

    pub fn state(&self, key: &str) -> EntryState {
        let Some(slot) = self.entries.get(key) else {
            return EntryState::Absent;
        };
        if slot.inflight.is_some() {
            return EntryState::Pending;
        }
        match &slot.stored {
            None => EntryState::Absent,
            Some(stored) if stored.is_fresh(Instant::now()) => EntryState::Fresh,
            Some(_) => EntryState::Stale,
        }
    }

    /// Resolve `key`, calling `fetch` only if no usable value exists and no
    /// other caller is already fetching it.
    ///
    /// A failed fetch falls back to the previous value, except for the caller
    /// that started the fetch with `force_refresh`, which gets the error.
    pub async fn resolve<F, Fut>(
        &self,
        key: &str,
        fetch: F,
        force_refresh: bool,
    ) -> Result<V, ResolveError>
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<V, ResolveError>> + Send + 'static,
    {
        let (mut rx, leader) = {
            let mut slot = self.entries.entry(key.to_string()).or_default();

            if !force_refresh {
                if let Some(stored) = slot.stored.as_ref() {
                    if stored.is_fresh(Instant::now()) {
                        Counters::bump(&self.counters.hits);
                        tracing::trace!(key = %key, "Resolution cache hit");
                        return Ok(stored.value.clone());
                    }

                    if self.stale_policy == StalePolicy::Background {
                        let value = stored.value.clone();
                        Counters::bump(&self.counters.stale_hits);
                        if slot.inflight.is_none() {
                            tracing::debug!(key = %key, "Serving stale entry, refreshing in background");
                            slot.inflight = Some(self.launch(key, fetch()));
                        }
                        return Ok(value);
                    }
                }
            }

            Counters::bump(&self.counters.misses);
            if let Some(rx) = slot.inflight.clone() {
                Counters::bump(&self.counters.coalesced);
                tracing::debug!(key = %key, "Fetch already in flight, waiting for it");
                (rx, false)
            } else {
                tracing::debug!(key = %key, force_refresh, "Resolution cache miss, fetching");
                let rx = self.launch(key, fetch());
                slot.inflight = Some(rx.clone());
                (rx, true)
            }
        };

        let published = rx.wait_for(Option::is_some).await.map(|o| (*o).clone());
        let outcome = match published {
            Ok(Some(outcome)) => outcome,
            _ => Err(ResolveError::aborted("resolution task ended without a result")),
        };

        match outcome {
            Ok(value) => Ok(value),
            Err(e) if leader && force_refresh => Err(e),
            Err(e) => match self.get(key) {
                Some(previous) => {
                    tracing::warn!(
                        key = %key,
                        error = %e,
                        "Refresh failed, serving previous value"
                    );
                    Ok(previous.value)
                }
                None => Err(e),
            },
        }
    }

    /// Run `fetch` on a detached task and publish its outcome for `key`.
    ///
    /// Must be called with the slot for `key` locked; the caller records the
    /// returned receiver as the in-flight marker.
    fn launch<Fut>(&self, key: &str, fetch: Fut) -> watch::Receiver<Outcome<V>>
    where
        Fut: Future<Output = Result<V, ResolveError>> + Send + 'static,
    {
        let (tx, rx) = watch::channel(None);
        let entries = Arc::clone(&self.entries);
        let counters = Arc::clone(&self.counters);
        let ttl = self.ttl;
        let key = key.to_string();
        Counters::bump(&counters.fetches);

        tokio::spawn(async move {
            let outcome = AssertUnwindSafe(fetch)
                .catch_unwind()
                .await
                .unwrap_or_else(|_| Err(ResolveError::aborted("resolution task panicked")));

            {
                let mut slot = entries.entry(key.clone()).or_default();
                match &outcome {
                    Ok(value) => {
                        slot.stored = Some(Stored {
                            value: value.clone(),
                            expires_at: Instant::now() + ttl,
                        });
                        tracing::debug!(key = %key, "Stored fresh entry");
                    }
                    Err(e) => {
                        Counters::bump(&counters.fetch_errors);
                        tracing::warn!(
                            key = %key,
                            error = %e,
                            had_previous = slot.stored.is_some(),
                            "Fetch failed, cache entry left unchanged"
                        );
                    }
                }
                slot.inflight = None;
            }
            entries.remove_if(&key, |_, slot| slot.is_vacant());

            // no receivers left is fine: every caller may have gone away
            let _ = tx.send(Some(outcome));
        });

        rx
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        self.counters.snapshot()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop entries that have been stale for longer than `retention`.
    ///
    /// Keys with a fetch in flight are always kept.
    pub fn cleanup_stale(&self, retention: Duration) -> usize {
        let now = Instant::now();
        let initial = self.entries.len();

        self.entries.retain(|_, slot| {
            slot.inflight.is_some()
                || slot
                    .stored
                    .as_ref()
                    .is_some_and(|stored| stored.expires_at + retention > now)
        });

        let removed = initial.saturating_sub(self.entries.len());
        if removed > 0 {
            tracing::info!(
                removed = removed,
                remaining = self.entries.len(),
                "Cleaned up expired resolution cache entries"
            );
        }
        removed
    }

    /// Log cache statistics (for periodic monitoring)
    pub fn log_stats(&self) {
        let stats = self.stats();
        let lookups = stats.hits + stats.stale_hits + stats.misses;

        let hit_rate = if lookups > 0 {
            ((stats.hits + stats.stale_hits) as f32 / lookups as f32 * 100.0) as u32
        } else {
            0
        };

        tracing::info!(
            entries = self.len(),
            hit_rate = hit_rate,
            stale_hits = stats.stale_hits,
            coalesced = stats.coalesced,
            fetches = stats.fetches,
            fetch_errors = stats.fetch_errors,
            "Resolution cache statistics"
        );
    }
}
