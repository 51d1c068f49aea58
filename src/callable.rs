//! The callable boundary: argument bags and service lifting
//!
//! A wrapped callable is any `tower::Service` over [`CallArgs`] returning a
//! `serde_json::Value`. Execution-control layers compose around that shape
//! without knowing anything else about the callable. Argument values are
//! either structured JSON (keyable, loggable) or opaque handles that only
//! the callable itself can interpret; opaque values flow through untouched
//! but cannot participate in cache keys.

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use serde_json::Value;
use tower::util::{BoxService, ServiceFn};

use crate::error::Result;

/// A single argument value.
#[derive(Clone)]
pub enum ArgValue {
    /// Structured value; participates in invocation keys.
    Json(Value),
    /// Caller-supplied handle (a connection, a buffer, a closure result);
    /// usable by the callable, never keyable.
    Opaque(Arc<dyn Any + Send + Sync>),
}

impl ArgValue {
    /// The structured form, if this value has one.
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            ArgValue::Json(v) => Some(v),
            ArgValue::Opaque(_) => None,
        }
    }

    /// Downcast an opaque value to a concrete type.
    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        match self {
            ArgValue::Json(_) => None,
            ArgValue::Opaque(v) => Arc::clone(v).downcast::<T>().ok(),
        }
    }
}

impl fmt::Debug for ArgValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgValue::Json(v) => write!(f, "{}", v),
            ArgValue::Opaque(_) => f.write_str("<opaque>"),
        }
    }
}

impl From<Value> for ArgValue {
    fn from(value: Value) -> Self {
        ArgValue::Json(value)
    }
}

/// One invocation's arguments: an ordered positional sequence plus named
/// values. Named values are held sorted by name, so two bags built from the
/// same name/value pairs compare equal regardless of insertion order;
/// positional order is significant.
#[derive(Debug, Clone, Default)]
pub struct CallArgs {
    positional: Vec<ArgValue>,
    named: BTreeMap<String, ArgValue>,
}

impl CallArgs {
    /// An empty argument bag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a positional argument.
    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.positional.push(ArgValue::Json(value.into()));
        self
    }

    /// Append an opaque positional argument.
    pub fn opaque_arg(mut self, value: Arc<dyn Any + Send + Sync>) -> Self {
        self.positional.push(ArgValue::Opaque(value));
        self
    }

    /// Set a named argument. A repeated name replaces the earlier value.
    pub fn named(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.named.insert(name.into(), ArgValue::Json(value.into()));
        self
    }

    /// Set an opaque named argument.
    pub fn opaque_named(
        mut self,
        name: impl Into<String>,
        value: Arc<dyn Any + Send + Sync>,
    ) -> Self {
        self.named.insert(name.into(), ArgValue::Opaque(value));
        self
    }

    /// Positional arguments in call order.
    pub fn positional(&self) -> &[ArgValue] {
        &self.positional
    }

    /// Named arguments, sorted by name.
    pub fn named_args(&self) -> impl Iterator<Item = (&str, &ArgValue)> {
        self.named.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Positional argument by index.
    pub fn get(&self, index: usize) -> Option<&ArgValue> {
        self.positional.get(index)
    }

    /// Named argument by name.
    pub fn get_named(&self, name: &str) -> Option<&ArgValue> {
        self.named.get(name)
    }

    /// Structured positional argument by index.
    pub fn json(&self, index: usize) -> Option<&Value> {
        self.get(index).and_then(ArgValue::as_json)
    }

    /// Structured named argument by name.
    pub fn named_json(&self, name: &str) -> Option<&Value> {
        self.get_named(name).and_then(ArgValue::as_json)
    }
}

/// Type-erased callable, the common currency of composed stacks.
pub type BoxCallable = BoxService<CallArgs, Value, crate::error::CallError>;

/// Lift an async closure into the callable service shape.
pub fn callable_fn<F, Fut>(f: F) -> ServiceFn<F>
where
    F: FnMut(CallArgs) -> Fut,
    Fut: Future<Output = Result<Value>>,
{
    tower::service_fn(f)
}
