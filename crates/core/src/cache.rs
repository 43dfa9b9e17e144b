use crate::domain::{Range, Series};
use crate::error::DashboardError;
use crate::source::{fetch_with_timeout, DataSource};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// What to do when a refetch fails but an older entry is still held.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StalePolicy {
    #[default]
    ServeStale,
    Propagate,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub symbol: String,
    pub range: Range,
}

impl CacheKey {
    pub fn new(symbol: impl Into<String>, range: Range) -> Self {
        Self {
            symbol: symbol.into(),
            range,
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.symbol, self.range)
    }
}

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub key: CacheKey,
    pub series: Arc<Series>,
    pub fetched_at: DateTime<Utc>,
    pub ttl: Duration,
}

impl CacheEntry {
    pub fn expires_at(&self) -> DateTime<Utc> {
        chrono::Duration::from_std(self.ttl)
            .ok()
            .and_then(|ttl| self.fetched_at.checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// An entry is served only strictly before `fetched_at + ttl`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at()
    }
}

#[derive(Debug, Clone)]
pub struct CachedSeries {
    pub series: Arc<Series>,
    pub fetched_at: DateTime<Utc>,
    /// True when a refetch failed and an expired entry was served instead.
    pub stale: bool,
}

impl CachedSeries {
    fn from_entry(entry: &CacheEntry, stale: bool) -> Self {
        Self {
            series: entry.series.clone(),
            fetched_at: entry.fetched_at,
            stale,
        }
    }
}

type SharedFetch = Shared<BoxFuture<'static, Result<CacheEntry, DashboardError>>>;

#[derive(Default)]
struct Slot {
    entry: Option<CacheEntry>,
    inflight: Option<SharedFetch>,
}

type SlotRef = Arc<Mutex<Slot>>;

fn lock(slot: &SlotRef) -> MutexGuard<'_, Slot> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct MetricCache {
    source: Arc<dyn DataSource>,
    clock: Arc<dyn Clock>,
    slots: DashMap<CacheKey, SlotRef>,
    fetch_timeout: Duration,
    stale_policy: StalePolicy,
}

impl MetricCache {
    pub fn new(source: Arc<dyn DataSource>, fetch_timeout: Duration) -> Self {
        Self {
            source,
            clock: Arc::new(SystemClock),
            slots: DashMap::new(),
            fetch_timeout,
            stale_policy: StalePolicy::default(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_stale_policy(mut self, policy: StalePolicy) -> Self {
        self.stale_policy = policy;
        self
    }

    /// Returns the cached series for `(symbol, range)` while it is fresh, otherwise
    /// fetches it. Concurrent callers for one key share a single fetch, and the
    /// entry keeps the `ttl` of the caller that started it.
    pub async fn get_or_fetch(
        &self,
        symbol: &str,
        range: Range,
        ttl: Duration,
    ) -> Result<CachedSeries, DashboardError> {
        self.lookup(CacheKey::new(symbol, range), ttl, false).await
    }

    /// Like `get_or_fetch` but ignores a fresh entry. Still single-flight.
    pub async fn refresh(
        &self,
        symbol: &str,
        range: Range,
        ttl: Duration,
    ) -> Result<CachedSeries, DashboardError> {
        self.lookup(CacheKey::new(symbol, range), ttl, true).await
    }

    pub fn peek(&self, key: &CacheKey) -> Result<CacheEntry, DashboardError> {
        self.slots
            .get(key)
            .and_then(|slot| {
                let guard = lock(slot.value());
                guard.entry.clone()
            })
            .ok_or_else(|| DashboardError::CacheMiss {
                key: key.to_string(),
            })
    }

    pub fn invalidate(&self, key: &CacheKey) {
        if let Some(slot) = self.slots.get(key) {
            lock(slot.value()).entry = None;
        }
    }

    pub fn clear(&self) {
        for slot in self.slots.iter() {
            lock(slot.value()).entry = None;
        }
    }

    pub fn len(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| lock(slot.value()).entry.is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn slot(&self, key: &CacheKey) -> SlotRef {
        self.slots.entry(key.clone()).or_default().value().clone()
    }

    async fn lookup(
        &self,
        key: CacheKey,
        ttl: Duration,
        force: bool,
    ) -> Result<CachedSeries, DashboardError> {
        let slot = self.slot(&key);

        let (fetch, previous) = {
            let mut guard = lock(&slot);
            if !force {
                if let Some(entry) = guard.entry.as_ref() {
                    if !entry.is_expired_at(self.clock.now()) {
                        tracing::trace!(%key, "metric cache hit");
                        return Ok(CachedSeries::from_entry(entry, false));
                    }
                }
            }

            let fetch = match guard.inflight.as_ref() {
                Some(inflight) => {
                    tracing::debug!(%key, "joining in-flight fetch");
                    inflight.clone()
                }
                None => {
                    let fetch = self.start_fetch(key.clone(), ttl, slot.clone());
                    guard.inflight = Some(fetch.clone());
                    fetch
                }
            };
            (fetch, guard.entry.clone())
        };

        match fetch.await {
            Ok(entry) => Ok(CachedSeries::from_entry(&entry, false)),
            Err(err) => match (self.stale_policy, previous) {
                (StalePolicy::ServeStale, Some(entry)) => {
                    let stale = entry.is_expired_at(self.clock.now());
                    tracing::warn!(
                        %key,
                        error = %err,
                        fetched_at = %entry.fetched_at,
                        stale,
                        "fetch failed; serving previous entry"
                    );
                    Ok(CachedSeries::from_entry(&entry, stale))
                }
                _ => Err(err),
            },
        }
    }

    fn start_fetch(&self, key: CacheKey, ttl: Duration, slot: SlotRef) -> SharedFetch {
        let source = self.source.clone();
        let clock = self.clock.clone();
        let timeout = self.fetch_timeout;

        async move {
            let res = fetch_with_timeout(source.as_ref(), &key.symbol, key.range, timeout).await;

            let mut guard = lock(&slot);
            guard.inflight = None;
            match res {
                Ok(series) => {
                    let entry = CacheEntry {
                        key,
                        series: Arc::new(series),
                        fetched_at: clock.now(),
                        ttl,
                    };
                    tracing::debug!(key = %entry.key, points = entry.series.len(), "metric cache filled");
                    guard.entry = Some(entry.clone());
                    Ok(entry)
                }
                Err(err) => {
                    tracing::warn!(%key, error = %err, retryable = err.is_retryable(), "metric fetch failed");
                    Err(err)
                }
            }
        }
        .boxed()
        .shared()
    }
}
