//! Wrapper constructors and stack assembly
//!
//! Free functions produce the individual execution-control layers;
//! `WrapStack` assembles a configured combination around a callable.
//! Composition order is the caller's choice and changes observable
//! behavior: a cache outside retry memoizes the eventual success once,
//! while retry outside a cache re-consults the store on every attempt.
//! With the timeout inner to retry, every attempt gets a fresh deadline;
//! an outer timeout bounds all attempts together.

use std::collections::HashSet;
use std::time::Duration;

use serde_json::Value;
use tower::util::BoxService;
use tower::{Layer, Service};

use crate::cache::CacheLayer;
use crate::callable::{BoxCallable, CallArgs};
use crate::config::WrapConfig;
use crate::error::{CallError, ErrorKind};
use crate::retry::{RetryLayer, RetryPolicy};
use crate::timeout::TimeoutLayer;

/// Memoize results for `ttl` per distinct argument set.
pub fn with_ttl_cache(ttl: Duration) -> CacheLayer {
    CacheLayer::new(ttl)
}

/// Retry failures of the given kinds up to `max_attempts` total attempts,
/// pausing `delay` between them.
pub fn with_retry(
    max_attempts: usize,
    delay: Duration,
    retryable_error_kinds: HashSet<ErrorKind>,
) -> RetryLayer {
    RetryLayer::new(RetryPolicy::new(max_attempts, delay, retryable_error_kinds))
}

/// Bound each invocation's wall-clock duration by `limit`.
pub fn with_timeout(limit: Duration) -> TimeoutLayer {
    TimeoutLayer::new(limit)
}

/// Assembles configured layers around a callable in a fixed order: cache
/// over retry over timeout, each section optional.
pub struct WrapStack {
    config: WrapConfig,
}

impl WrapStack {
    pub fn from_config(config: WrapConfig) -> Self {
        Self { config }
    }

    /// Wrap `callable` with the configured layers.
    pub fn wrap<S>(&self, callable: S) -> BoxCallable
    where
        S: Service<CallArgs, Response = Value, Error = CallError> + Send + 'static,
        S::Future: Send + 'static,
    {
        let mut svc: BoxCallable = BoxService::new(callable);
        if let Some(timeout) = &self.config.timeout {
            svc = BoxService::new(TimeoutLayer::new(timeout.limit).layer(svc));
        }
        if let Some(retry) = &self.config.retry {
            svc = BoxService::new(RetryLayer::new(RetryPolicy::from(retry)).layer(svc));
        }
        if let Some(cache) = &self.config.cache {
            svc = BoxService::new(CacheLayer::new(cache.ttl).layer(svc));
        }
        svc
    }
}
