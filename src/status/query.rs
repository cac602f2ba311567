//! Cached status query with stale-while-revalidate semantics.
//!
//! The query keeps one snapshot per identity in a small LRU and publishes
//! the active identity's state on a `watch` channel. Consumers (the
//! navigation guard) see `{ data, is_loading, is_error, error }` and are
//! re-triggered on every change.
//!
//! ## Freshness
//!
//! - A snapshot younger than `stale_after` (default 5 minutes) is served
//!   from cache by [`StatusQuery::ensure_fresh`].
//! - A stale or invalidated snapshot stays visible while a refetch runs.
//! - Failed fetches are never retried automatically.
//! - When two fetches overlap, the one issued last wins. An older fetch
//!   that resolves afterwards is discarded.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use lru::LruCache;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::time::Instant;

use super::{StatusError, StatusSource, UserStatus};
use crate::backend::{Identity, IdentityProvider};

/// Default freshness window.
pub const DEFAULT_STALE_AFTER: Duration = Duration::from_secs(5 * 60);
/// Default number of identities kept in the cache.
pub const DEFAULT_CACHE_CAPACITY: usize = 8;

/// Observable state of the status query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryState {
    /// Identity the state belongs to
    pub identity: Option<String>,
    /// Last successful snapshot (possibly stale)
    pub data: Option<UserStatus>,
    /// Error from the most recent fetch
    pub error: Option<StatusError>,
    /// A fetch is in flight
    pub is_fetching: bool,
    /// When `data` was fetched
    pub fetched_at: Option<DateTime<Utc>>,
    /// Fetch that produced this state. Two errors with different
    /// generations come from separate fetch attempts.
    pub generation: u64,
}

impl QueryState {
    /// State holding a settled snapshot.
    pub fn ready(status: UserStatus) -> Self {
        Self {
            data: Some(status),
            fetched_at: Some(Utc::now()),
            ..Default::default()
        }
    }

    /// State holding a fetch error.
    pub fn failed(error: StatusError) -> Self {
        Self {
            error: Some(error),
            ..Default::default()
        }
    }

    /// No snapshot and no error yet.
    pub fn is_loading(&self) -> bool {
        self.data.is_none() && self.error.is_none()
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    status: UserStatus,
    fetched: Instant,
    fetched_at: DateTime<Utc>,
    invalidated: bool,
}

struct Inner {
    cache: LruCache<String, CacheEntry>,
    /// Identity whose state is currently published
    active: Option<String>,
    /// Last generation handed to a fetch
    issued: u64,
    /// Newest generation whose result was applied
    applied: u64,
}

/// Status query shared by the guard and by state-changing screens.
pub struct StatusQuery {
    source: StatusSource,
    identity: Arc<dyn IdentityProvider>,
    stale_after: Duration,
    inner: Mutex<Inner>,
    tx: watch::Sender<QueryState>,
}

impl StatusQuery {
    pub fn new(source: StatusSource, identity: Arc<dyn IdentityProvider>) -> Self {
        let (tx, _rx) = watch::channel(QueryState::default());
        Self {
            source,
            identity,
            stale_after: DEFAULT_STALE_AFTER,
            inner: Mutex::new(Inner {
                cache: LruCache::new(cache_capacity(DEFAULT_CACHE_CAPACITY)),
                active: None,
                issued: 0,
                applied: 0,
            }),
            tx,
        }
    }

    pub fn with_stale_after(mut self, stale_after: Duration) -> Self {
        self.stale_after = stale_after;
        self
    }

    pub fn with_capacity(self, capacity: usize) -> Self {
        self.inner.lock().cache.resize(cache_capacity(capacity));
        self
    }

    /// Subscribe to state changes.
    pub fn subscribe(&self) -> watch::Receiver<QueryState> {
        self.tx.subscribe()
    }

    /// Current state snapshot.
    pub fn state(&self) -> QueryState {
        self.tx.borrow().clone()
    }

    /// Serve the cached snapshot if fresh, otherwise fetch.
    pub async fn ensure_fresh(&self) -> Result<UserStatus, StatusError> {
        let identity = self.resolve_identity().await?;

        let (hit, generation) = {
            let mut inner = self.inner.lock();
            inner.active = Some(identity.id.clone());
            let hit = inner
                .cache
                .get(&identity.id)
                .filter(|e| !e.invalidated && e.fetched.elapsed() < self.stale_after)
                .cloned();
            (hit, inner.issued)
        };

        match hit {
            Some(entry) => {
                tracing::debug!(identity = %identity.id, "Status cache hit");
                self.publish(QueryState {
                    identity: Some(identity.id),
                    data: Some(entry.status.clone()),
                    error: None,
                    is_fetching: false,
                    fetched_at: Some(entry.fetched_at),
                    generation,
                });
                Ok(entry.status)
            }
            None => {
                tracing::debug!(identity = %identity.id, "Status cache miss");
                self.fetch_for(identity).await
            }
        }
    }

    /// Fetch unconditionally.
    pub async fn refetch(&self) -> Result<UserStatus, StatusError> {
        let identity = self.resolve_identity().await?;
        self.inner.lock().active = Some(identity.id.clone());
        self.fetch_for(identity).await
    }

    /// Mark the active identity's snapshot stale.
    pub fn invalidate(&self) {
        let mut inner = self.inner.lock();
        let Some(active) = inner.active.clone() else {
            return;
        };
        if let Some(entry) = inner.cache.get_mut(&active) {
            entry.invalidated = true;
            tracing::debug!(identity = %active, "Status cache invalidated");
        }
    }

    /// Invalidate and fetch again. Called after purchases and onboarding
    /// submissions.
    pub async fn invalidate_and_refetch(&self) -> Result<UserStatus, StatusError> {
        self.invalidate();
        self.refetch().await
    }

    /// Drop every cached snapshot. In-flight fetches are discarded when they
    /// resolve. The published state is left untouched.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.cache.clear();
        inner.active = None;
        inner.applied = inner.issued;
        tracing::debug!("Status cache cleared");
    }

    async fn resolve_identity(&self) -> Result<Identity, StatusError> {
        let resolved = match self.identity.current_identity().await {
            Ok(Some(identity)) => Ok(identity),
            Ok(None) => Err(StatusError::NoIdentity),
            Err(e) => Err(StatusError::from(e)),
        };
        if let Err(e) = &resolved {
            tracing::warn!("Could not resolve identity: {}", e);
            let generation = {
                let mut inner = self.inner.lock();
                inner.active = None;
                inner.issued
            };
            self.publish(QueryState {
                generation,
                ..QueryState::failed(e.clone())
            });
        }
        resolved
    }

    async fn fetch_for(&self, identity: Identity) -> Result<UserStatus, StatusError> {
        let (generation, stale) = {
            let mut inner = self.inner.lock();
            inner.issued += 1;
            let stale = inner.cache.peek(&identity.id).cloned();
            (inner.issued, stale)
        };

        self.publish(QueryState {
            identity: Some(identity.id.clone()),
            data: stale.as_ref().map(|e| e.status.clone()),
            error: None,
            is_fetching: true,
            fetched_at: stale.as_ref().map(|e| e.fetched_at),
            generation,
        });

        let result = self.source.fetch(&identity).await;

        let mut inner = self.inner.lock();
        if generation <= inner.applied {
            tracing::debug!(
                identity = %identity.id,
                generation,
                "Discarding superseded status fetch"
            );
            return result;
        }
        inner.applied = generation;
        let is_active = inner.active.as_deref() == Some(identity.id.as_str());

        match &result {
            Ok(status) => {
                let fetched_at = Utc::now();
                inner.cache.put(
                    identity.id.clone(),
                    CacheEntry {
                        status: status.clone(),
                        fetched: Instant::now(),
                        fetched_at,
                        invalidated: false,
                    },
                );
                drop(inner);
                if is_active {
                    self.publish(QueryState {
                        identity: Some(identity.id),
                        data: Some(status.clone()),
                        error: None,
                        is_fetching: false,
                        fetched_at: Some(fetched_at),
                        generation,
                    });
                }
            }
            Err(e) => {
                let stale = inner.cache.peek(&identity.id).cloned();
                drop(inner);
                tracing::warn!(identity = %identity.id, "Status fetch failed: {}", e);
                if is_active {
                    self.publish(QueryState {
                        identity: Some(identity.id),
                        data: stale.as_ref().map(|e| e.status.clone()),
                        error: Some(e.clone()),
                        is_fetching: false,
                        fetched_at: stale.as_ref().map(|e| e.fetched_at),
                        generation,
                    });
                }
            }
        }
        result
    }

    fn publish(&self, state: QueryState) {
        self.tx.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state;
                true
            }
        });
    }
}

fn cache_capacity(capacity: usize) -> NonZeroUsize {
    NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN)
}
