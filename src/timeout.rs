//! Deadline guard for wrapped callables
//!
//! What this module provides
//! - `TimeoutLayer`/`Timeout`: middleware bounding the wall-clock duration
//!   of exactly one invocation
//!
//! Implementation strategy
//! - Every call arms its own timer via `tokio::time::timeout`; deadline
//!   state is local to the call's future, never shared process state, so
//!   concurrent independently-timed invocations cannot interfere
//! - Natural completion disarms the timer by scope: the timer is part of
//!   the call's future and is dropped with it, so no stale deadline can
//!   fire after the call returns or errors
//! - When the timer fires first, the in-flight attempt is abandoned (its
//!   future is dropped) and the caller receives `DeadlineExceeded`; any
//!   partial side effects of the attempt are the caller's to reason about
//!
//! Composition
//! - Inner to retry (recommended): every attempt gets a fresh deadline
//! - Outer to retry: one deadline bounds all attempts together

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::timeout;
use tower::{Layer, Service};
use tracing::warn;

use crate::error::CallError;

/// Wall-clock bound applied to each guarded invocation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TimeoutPolicy {
    pub limit: Duration,
}

impl TimeoutPolicy {
    pub fn new(limit: Duration) -> Self {
        Self { limit }
    }
}

/// Layer applying a per-invocation deadline to a callable service.
#[derive(Debug, Clone, Copy)]
pub struct TimeoutLayer {
    policy: TimeoutPolicy,
}

impl TimeoutLayer {
    pub fn new(limit: Duration) -> Self {
        Self {
            policy: TimeoutPolicy::new(limit),
        }
    }
}

/// Service wrapper that races each call against its deadline.
pub struct Timeout<S> {
    inner: S,
    policy: TimeoutPolicy,
}

impl<S> Layer<S> for TimeoutLayer {
    type Service = Timeout<S>;

    fn layer(&self, inner: S) -> Self::Service {
        Timeout {
            inner,
            policy: self.policy,
        }
    }
}

impl<S, Req> Service<Req> for Timeout<S>
where
    S: Service<Req, Error = CallError> + Send + 'static,
    S::Future: Send + 'static,
    S::Response: Send + 'static,
{
    type Response = S::Response;
    type Error = CallError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(
        &mut self,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Req) -> Self::Future {
        let limit = self.policy.limit;
        let fut = self.inner.call(req);
        Box::pin(async move {
            match timeout(limit, fut).await {
                Ok(result) => result,
                Err(_) => {
                    warn!(?limit, "deadline elapsed, abandoning attempt");
                    Err(CallError::DeadlineExceeded { limit })
                }
            }
        })
    }
}
