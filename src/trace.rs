//! Tracing around wrapped calls
//!
//! Wraps a callable in a span carrying its name, and logs arguments,
//! outcome, and wall-clock duration at debug level. Observation only; the
//! call's result and error pass through untouched.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use tower::{Layer, Service};
use tracing::{debug, info_span, warn, Instrument};

use crate::callable::CallArgs;
use crate::error::CallError;

/// Layer that adds a span and duration logging around each invocation.
#[derive(Debug, Clone)]
pub struct TraceLayer {
    name: Arc<str>,
}

impl TraceLayer {
    /// `name` identifies the wrapped callable in spans and log lines.
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self { name: name.into() }
    }
}

pub struct Traced<S> {
    inner: S,
    name: Arc<str>,
}

impl<S> Layer<S> for TraceLayer {
    type Service = Traced<S>;

    fn layer(&self, inner: S) -> Self::Service {
        Traced {
            inner,
            name: Arc::clone(&self.name),
        }
    }
}

impl<S> Service<CallArgs> for Traced<S>
where
    S: Service<CallArgs, Response = Value, Error = CallError> + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Value;
    type Error = CallError;
    type Future = Pin<Box<dyn Future<Output = Result<Value, CallError>> + Send>>;

    fn poll_ready(
        &mut self,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: CallArgs) -> Self::Future {
        let name = Arc::clone(&self.name);
        let span = info_span!("invoke", callable = %name);
        debug!(parent: &span, args = ?req, "calling");

        let start = Instant::now();
        let fut = self.inner.call(req).instrument(span.clone());
        Box::pin(
            async move {
                let result = fut.await;
                let elapsed_ms = start.elapsed().as_secs_f64() * 1_000.0;
                match &result {
                    Ok(value) => debug!(elapsed_ms, result = %value, "returned"),
                    Err(error) => warn!(elapsed_ms, %error, "failed"),
                }
                result
            }
            .instrument(span),
        )
    }
}
