//! Retry mechanism for wrapped callables
//!
//! Repeats a callable until success or the attempt budget runs out, pacing
//! attempts with the policy's delay. The inter-attempt delay suspends the
//! calling task; nothing proceeds in the background while it sleeps.

use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::sleep;
use tower::{Layer, Service, ServiceExt};
use tracing::{debug, warn};

use crate::error::{CallError, ErrorKind};

/// Delay schedule between attempts.
#[derive(Debug, Clone, Copy)]
pub enum BackoffKind {
    Fixed,
    Exponential,
}

#[derive(Debug, Clone, Copy)]
pub struct Backoff {
    kind: BackoffKind,
    initial: Duration,
    factor: f32,
    max: Duration,
}

impl Backoff {
    pub fn fixed(delay: Duration) -> Self {
        Self {
            kind: BackoffKind::Fixed,
            initial: delay,
            factor: 1.0,
            max: delay,
        }
    }

    pub fn exponential(initial: Duration, factor: f32, max: Duration) -> Self {
        Self {
            kind: BackoffKind::Exponential,
            initial,
            factor,
            max,
        }
    }

    /// Delay after `completed` failed attempts.
    pub fn delay_for_attempt(&self, completed: usize) -> Duration {
        match self.kind {
            BackoffKind::Fixed => self.initial,
            BackoffKind::Exponential => {
                let mult = self.factor.powi(completed as i32);
                let d = self.initial.mul_f32(mult);
                if d > self.max {
                    self.max
                } else {
                    d
                }
            }
        }
    }
}

/// Immutable retry policy, shared read-only by every invocation of the
/// wrapped callable.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: usize,
    backoff: Backoff,
    retryable: HashSet<ErrorKind>,
    jitter: bool,
}

impl RetryPolicy {
    /// Fixed-delay policy. `max_attempts` is clamped to at least one.
    pub fn new(max_attempts: usize, delay: Duration, retryable: HashSet<ErrorKind>) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff: Backoff::fixed(delay),
            retryable,
            jitter: false,
        }
    }

    /// Replace the fixed delay with another schedule.
    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Add up to 30% random spread on each delay.
    pub fn with_jitter(mut self, enabled: bool) -> Self {
        self.jitter = enabled;
        self
    }

    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    /// Whether a failure of `kind` consumes a retry. Unhashable arguments
    /// never do; retrying cannot change the arguments.
    pub fn is_retryable(&self, kind: ErrorKind) -> bool {
        match kind {
            ErrorKind::UnhashableArgument => false,
            _ => self.retryable.contains(&kind),
        }
    }

    fn delay_after(&self, completed: usize) -> Duration {
        let mut delay = self.backoff.delay_for_attempt(completed);
        if self.jitter {
            use rand::Rng;
            let spread = rand::thread_rng().gen_range(0.0..0.3);
            let extra = (delay.as_millis() as f64 * spread) as u64;
            delay += Duration::from_millis(extra);
        }
        delay
    }
}

/// Layer applying a retry policy to a callable service.
pub struct RetryLayer {
    policy: RetryPolicy,
}

impl RetryLayer {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }
}

/// Service wrapper that re-invokes the inner service per its policy.
pub struct Retry<S> {
    inner: Arc<Mutex<S>>,
    policy: RetryPolicy,
}

impl<S> Layer<S> for RetryLayer {
    type Service = Retry<S>;

    fn layer(&self, inner: S) -> Self::Service {
        Retry {
            inner: Arc::new(Mutex::new(inner)),
            policy: self.policy.clone(),
        }
    }
}

impl<S, Req> Service<Req> for Retry<S>
where
    Req: Clone + Send + 'static,
    S: Service<Req, Error = CallError> + Send + 'static,
    S::Future: Send + 'static,
    S::Response: Send + 'static,
{
    type Response = S::Response;
    type Error = CallError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(
        &mut self,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        std::task::Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Req) -> Self::Future {
        let policy = self.policy.clone();
        let inner = Arc::clone(&self.inner);
        Box::pin(async move {
            let mut attempt: usize = 0;
            loop {
                attempt += 1;
                let result = {
                    let mut guard = inner.lock().await;
                    ServiceExt::ready(&mut *guard)
                        .await?
                        .call(req.clone())
                        .await
                };
                match result {
                    Ok(resp) => {
                        if attempt > 1 {
                            debug!(attempt, "call succeeded after retry");
                        }
                        return Ok(resp);
                    }
                    Err(error) => {
                        if !policy.is_retryable(error.kind()) {
                            debug!(%error, "non-retryable error");
                            return Err(error);
                        }
                        if attempt >= policy.max_attempts() {
                            warn!(attempts = attempt, %error, "retry budget exhausted");
                            return Err(CallError::RetriesExhausted {
                                attempts: attempt,
                                source: Box::new(error),
                            });
                        }
                        let delay = policy.delay_after(attempt - 1);
                        debug!(attempt, ?delay, %error, "attempt failed, retrying");
                        sleep(delay).await;
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;
    use tower::service_fn;

    fn retry_on_computation(max_attempts: usize, delay: Duration) -> RetryLayer {
        RetryLayer::new(RetryPolicy::new(
            max_attempts,
            delay,
            HashSet::from([ErrorKind::Computation]),
        ))
    }

    #[test]
    fn exponential_backoff_caps_at_max() {
        let backoff =
            Backoff::exponential(Duration::from_millis(100), 2.0, Duration::from_millis(300));
        assert_eq!(backoff.delay_for_attempt(0), Duration::from_millis(100));
        let second = backoff.delay_for_attempt(1);
        assert!((second.as_millis() as i64 - 200).abs() <= 1);
        assert_eq!(backoff.delay_for_attempt(3), Duration::from_millis(300));
    }

    #[test]
    fn policy_clamps_attempts_and_rejects_unhashable() {
        let policy = RetryPolicy::new(0, Duration::ZERO, HashSet::from([ErrorKind::Computation]));
        assert_eq!(policy.max_attempts(), 1);

        let greedy = RetryPolicy::new(
            3,
            Duration::ZERO,
            HashSet::from([ErrorKind::UnhashableArgument, ErrorKind::Computation]),
        );
        assert!(!greedy.is_retryable(ErrorKind::UnhashableArgument));
        assert!(greedy.is_retryable(ErrorKind::Computation));
        assert!(!greedy.is_retryable(ErrorKind::DeadlineExceeded));
    }

    #[tokio::test]
    async fn succeeds_on_second_attempt_with_one_delay() {
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let svc = service_fn(move |()| {
            let c = c.clone();
            async move {
                if c.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(CallError::computation("transient"))
                } else {
                    Ok(42u32)
                }
            }
        });

        let delay = Duration::from_millis(20);
        let mut svc = retry_on_computation(3, delay).layer(svc);
        let start = Instant::now();
        let out = ServiceExt::ready(&mut svc)
            .await
            .unwrap()
            .call(())
            .await
            .unwrap();

        assert_eq!(out, 42);
        assert_eq!(count.load(Ordering::SeqCst), 2);
        assert!(start.elapsed() >= delay);
    }

    #[tokio::test]
    async fn exhausts_after_max_attempts() {
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let svc = service_fn(move |()| {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err::<u32, _>(CallError::computation("always down"))
            }
        });

        let mut svc = retry_on_computation(3, Duration::from_millis(1)).layer(svc);
        let err = ServiceExt::ready(&mut svc)
            .await
            .unwrap()
            .call(())
            .await
            .unwrap_err();

        assert_eq!(count.load(Ordering::SeqCst), 3);
        match err {
            CallError::RetriesExhausted { attempts, source } => {
                assert_eq!(attempts, 3);
                assert_eq!(source.kind(), ErrorKind::Computation);
            }
            other => panic!("expected RetriesExhausted, got {other}"),
        }
    }

    #[tokio::test]
    async fn non_retryable_error_short_circuits() {
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let svc = service_fn(move |()| {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err::<u32, _>(CallError::DeadlineExceeded {
                    limit: Duration::from_millis(5),
                })
            }
        });

        // only Computation is retryable here
        let mut svc = retry_on_computation(5, Duration::from_millis(1)).layer(svc);
        let err = ServiceExt::ready(&mut svc)
            .await
            .unwrap()
            .call(())
            .await
            .unwrap_err();

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(err.kind(), ErrorKind::DeadlineExceeded);
    }

    #[tokio::test]
    async fn single_attempt_policy_never_sleeps() {
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let svc = service_fn(move |()| {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err::<u32, _>(CallError::computation("down"))
            }
        });

        let mut svc = retry_on_computation(1, Duration::from_millis(250)).layer(svc);
        let start = Instant::now();
        let err = ServiceExt::ready(&mut svc)
            .await
            .unwrap()
            .call(())
            .await
            .unwrap_err();

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(matches!(err, CallError::RetriesExhausted { attempts: 1, .. }));
        assert!(start.elapsed() < Duration::from_millis(200));
    }

    #[tokio::test]
    async fn unhashable_is_never_retried_even_if_configured() {
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let svc = service_fn(move |()| {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err::<u32, _>(CallError::UnhashableArgument {
                    argument: "#0".to_string(),
                    reason: "opaque values cannot be keyed".to_string(),
                })
            }
        });

        let policy = RetryPolicy::new(
            4,
            Duration::from_millis(1),
            HashSet::from([ErrorKind::UnhashableArgument]),
        );
        let mut svc = RetryLayer::new(policy).layer(svc);
        let err = ServiceExt::ready(&mut svc)
            .await
            .unwrap()
            .call(())
            .await
            .unwrap_err();

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(err.kind(), ErrorKind::UnhashableArgument);
    }
}
