//! TTL memoization for wrapped callables
//!
//! What this module provides
//! - `TtlCache<V>`: a per-callable result store keyed by `InvocationKey`,
//!   each entry carrying an absolute expiry instant
//! - `CacheLayer`/`CacheService`: Tower middleware applying the store to any
//!   callable service; every wrapped service owns its own store, created at
//!   wrap time
//!
//! Implementation strategy
//! - Two-level locking: a short-lived map lock hands out one async slot lock
//!   per key, and the slot lock is held across the whole
//!   check-expiry/compute/populate region. A miss computes exactly once even
//!   under concurrent callers of the same key; distinct keys proceed on
//!   their own slots without contending
//! - An entry is live only while `expires_at` is strictly in the future; an
//!   entry exactly at its expiry instant is already stale
//! - Populate and refresh are one code path: every successful compute stamps
//!   the value and a fresh `expires_at` together
//! - A failed compute leaves the slot untouched and propagates the error
//! - Nothing is evicted automatically; `clear` and `purge_expired` are the
//!   manual pressure valves
//!
//! Composition
//! - `ServiceBuilder::new().layer(with_ttl_cache(ttl)).service(callable)`
//! - Cache outside retry memoizes the eventual success once; retry outside
//!   cache re-consults the store on every attempt
//!
//! Testing strategy
//! - Counted fake callables assert compute-once on hits, recompute after
//!   expiry, and untouched entries after failures

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::sync::Mutex;
use tower::{Layer, Service, ServiceExt};
use tracing::debug;

use crate::callable::CallArgs;
use crate::error::Result;
use crate::key::InvocationKey;

/// A memoized result and the instant it stops being served.
#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

type Slot<V> = Arc<Mutex<Option<CacheEntry<V>>>>;

/// Result store for one wrapped callable.
///
/// Memory grows with the number of distinct keys ever seen; this is a
/// bounded-use assumption, not an eviction policy.
pub struct TtlCache<V> {
    slots: Mutex<HashMap<InvocationKey, Slot<V>>>,
}

impl<V: Clone> TtlCache<V> {
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Serve a live entry for `key`, or run `compute` and store its result
    /// with an expiry of `ttl` from now.
    ///
    /// The slot for `key` is held exclusively across the whole
    /// check/compute/populate sequence, so concurrent callers of one key
    /// compute once while other keys proceed independently. A zero `ttl`
    /// still returns the freshly computed value; the entry is stale by the
    /// time anyone looks again.
    pub async fn get_or_compute<F, Fut>(
        &self,
        key: InvocationKey,
        ttl: Duration,
        compute: F,
    ) -> Result<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>>,
    {
        let slot = {
            let mut slots = self.slots.lock().await;
            Arc::clone(slots.entry(key).or_default())
        };

        let mut entry = slot.lock().await;
        let now = Instant::now();
        match entry.as_ref() {
            Some(cached) if cached.expires_at > now => return Ok(cached.value.clone()),
            Some(_) => debug!("cache entry expired, recomputing"),
            None => debug!("cache miss, computing"),
        }

        let value = compute().await?;
        *entry = Some(CacheEntry {
            value: value.clone(),
            expires_at: now + ttl,
        });
        Ok(value)
    }

    /// Drop every entry. In-flight computations finish against detached
    /// slots and are not stored.
    pub async fn clear(&self) {
        self.slots.lock().await.clear();
    }

    /// Remove entries that are already stale. Slots currently being
    /// computed are left alone.
    pub async fn purge_expired(&self) {
        let now = Instant::now();
        let mut slots = self.slots.lock().await;
        slots.retain(|_, slot| match slot.try_lock() {
            Ok(entry) => match entry.as_ref() {
                Some(cached) => cached.expires_at > now,
                None => false,
            },
            Err(_) => true,
        });
    }

    /// Number of keys ever populated and not yet purged or cleared.
    pub async fn len(&self) -> usize {
        self.slots.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.slots.lock().await.is_empty()
    }
}

impl<V: Clone> Default for TtlCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

/// Layer applying TTL memoization to a callable service.
///
/// Each `layer()` call creates a fresh store, so separately wrapped
/// callables never share entries and can be torn down independently.
#[derive(Debug, Clone, Copy)]
pub struct CacheLayer {
    ttl: Duration,
}

impl CacheLayer {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl }
    }
}

impl<S> Layer<S> for CacheLayer {
    type Service = CacheService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        CacheService {
            inner: Arc::new(Mutex::new(inner)),
            cache: Arc::new(TtlCache::new()),
            ttl: self.ttl,
        }
    }
}

/// Service wrapper that memoizes results by invocation key.
pub struct CacheService<S> {
    inner: Arc<Mutex<S>>,
    cache: Arc<TtlCache<Value>>,
    ttl: Duration,
}

impl<S> CacheService<S> {
    /// Handle to the underlying store, for explicit teardown.
    pub fn cache(&self) -> Arc<TtlCache<Value>> {
        Arc::clone(&self.cache)
    }
}

impl<S> Service<CallArgs> for CacheService<S>
where
    S: Service<CallArgs, Response = Value, Error = crate::error::CallError> + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Value;
    type Error = crate::error::CallError;
    type Future = Pin<Box<dyn Future<Output = Result<Value>> + Send>>;

    fn poll_ready(
        &mut self,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<()>> {
        std::task::Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: CallArgs) -> Self::Future {
        let ttl = self.ttl;
        let cache = Arc::clone(&self.cache);
        let inner = Arc::clone(&self.inner);
        Box::pin(async move {
            // Key building failures propagate before the callable is ever
            // consulted; nothing is cached for them.
            let key = InvocationKey::for_args(&req)?;
            cache
                .get_or_compute(key, ttl, || async move {
                    let mut guard = inner.lock().await;
                    ServiceExt::ready(&mut *guard).await?.call(req).await
                })
                .await
        })
    }
}
