//! Zero-interference tap for observing calls through the wrapper stack.
//!
//! A lightweight Tower `Layer` that wraps any callable service and invokes
//! user-provided hooks on the argument, result, and error paths without
//! altering the primary signal flow. Hooks are synchronous, cheap, and
//! receive references to the in-flight values; attach logging, counters, or
//! forward owned copies to a side channel from inside the hook.
//!
//! Hooks cannot perturb results: the value or error the caller sees is
//! exactly what the inner service produced.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;
use tower::{Layer, Service};

use crate::callable::CallArgs;
use crate::error::CallError;

type ArgsHook = Arc<dyn Fn(&CallArgs) + Send + Sync>;
type ResultHook = Arc<dyn Fn(&Value) + Send + Sync>;
type ErrorHook = Arc<dyn Fn(&CallError) + Send + Sync>;

/// Builder for a tap over a callable service.
#[derive(Clone, Default)]
pub struct TapLayer {
    on_args: Option<ArgsHook>,
    on_result: Option<ResultHook>,
    on_error: Option<ErrorHook>,
}

impl TapLayer {
    /// An empty tap with no hooks.
    pub fn new() -> Self {
        Self::default()
    }

    /// Observe the arguments of every call.
    pub fn on_args<F>(mut self, f: F) -> Self
    where
        F: Fn(&CallArgs) + Send + Sync + 'static,
    {
        self.on_args = Some(Arc::new(f));
        self
    }

    /// Observe every successful result.
    pub fn on_result<F>(mut self, f: F) -> Self
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.on_result = Some(Arc::new(f));
        self
    }

    /// Observe every error.
    pub fn on_error<F>(mut self, f: F) -> Self
    where
        F: Fn(&CallError) + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(f));
        self
    }
}

/// Service wrapper that invokes tap hooks around `call`.
pub struct Tap<S> {
    inner: S,
    on_args: Option<ArgsHook>,
    on_result: Option<ResultHook>,
    on_error: Option<ErrorHook>,
}

impl<S> Layer<S> for TapLayer {
    type Service = Tap<S>;

    fn layer(&self, inner: S) -> Self::Service {
        Tap {
            inner,
            on_args: self.on_args.clone(),
            on_result: self.on_result.clone(),
            on_error: self.on_error.clone(),
        }
    }
}

impl<S> Service<CallArgs> for Tap<S>
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
        if let Some(f) = &self.on_args {
            f(&req);
        }

        let on_result = self.on_result.clone();
        let on_error = self.on_error.clone();
        let fut = self.inner.call(req);

        Box::pin(async move {
            match fut.await {
                Ok(value) => {
                    if let Some(f) = &on_result {
                        f(&value);
                    }
                    Ok(value)
                }
                Err(err) => {
                    if let Some(f) = &on_error {
                        f(&err);
                    }
                    Err(err)
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callable::callable_fn;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tower::ServiceExt;

    #[tokio::test]
    async fn tap_invokes_args_and_result_hooks() {
        let args_count = Arc::new(AtomicUsize::new(0));
        let result_count = Arc::new(AtomicUsize::new(0));

        let ac = args_count.clone();
        let rc = result_count.clone();
        let layer = TapLayer::new()
            .on_args(move |_a: &CallArgs| {
                ac.fetch_add(1, Ordering::Relaxed);
            })
            .on_result(move |_v: &Value| {
                rc.fetch_add(1, Ordering::Relaxed);
            });

        let inner = callable_fn(|_args: CallArgs| async move { Ok(json!("ok")) });
        let mut svc = layer.layer(inner);

        let out = ServiceExt::ready(&mut svc)
            .await
            .unwrap()
            .call(CallArgs::new().arg(1))
            .await
            .unwrap();

        assert_eq!(out, json!("ok"));
        assert_eq!(args_count.load(Ordering::Relaxed), 1);
        assert_eq!(result_count.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn tap_invokes_error_hook_and_passes_error_through() {
        let err_count = Arc::new(AtomicUsize::new(0));
        let ec = err_count.clone();

        let layer = TapLayer::new().on_error(move |_e: &CallError| {
            ec.fetch_add(1, Ordering::Relaxed);
        });

        let inner =
            callable_fn(|_args: CallArgs| async move { Err(CallError::computation("boom")) });
        let mut svc = layer.layer(inner);

        let err = ServiceExt::ready(&mut svc)
            .await
            .unwrap()
            .call(CallArgs::new())
            .await
            .unwrap_err();

        assert_eq!(err_count.load(Ordering::Relaxed), 1);
        assert!(err.to_string().contains("boom"));
    }

    #[tokio::test]
    async fn tap_with_no_hooks_is_transparent() {
        let inner = callable_fn(|_args: CallArgs| async move { Ok(json!(41)) });
        let mut svc = TapLayer::new().layer(inner);
        let out = ServiceExt::ready(&mut svc)
            .await
            .unwrap()
            .call(CallArgs::new())
            .await
            .unwrap();
        assert_eq!(out, json!(41));
    }
}
