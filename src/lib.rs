//! # tower-wrap
//!
//! Composable Tower layers for execution control around any callable:
//! time-to-live memoization, retry on failure, and per-call deadline
//! guards, plus zero-interference observation taps.
//!
//! ## Core Concepts
//!
//! - **Callable**: a Tower service over [`CallArgs`] returning a JSON value
//! - **Layers**: Tower middleware for cross-cutting concerns (cache, retry,
//!   timeout, observation) that never touch the callable itself
//! - **Composition order is behavior**: wrappers nest in the order applied;
//!   a cache outside retry memoizes the eventual success once, a timeout
//!   inside retry gives every attempt a fresh deadline
//!
//! ## Getting Started
//!
//! ```rust
//! use std::collections::HashSet;
//! use std::time::Duration;
//!
//! use serde_json::json;
//! use tower_wrap::{
//!     callable_fn, with_retry, with_timeout, with_ttl_cache, CallArgs, ErrorKind, Layer,
//!     Service, ServiceExt,
//! };
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), tower_wrap::CallError> {
//! let lookup = callable_fn(|args: CallArgs| async move {
//!     let user = args.json(0).and_then(|v| v.as_str()).unwrap_or("anonymous");
//!     Ok(json!({ "user": user, "plan": "basic" }))
//! });
//!
//! // Innermost deadline, then retry, then memoization: each retry attempt
//! // gets its own deadline, and the eventual success is cached for 30s.
//! let guarded = with_timeout(Duration::from_secs(1)).layer(lookup);
//! let retried = with_retry(
//!     3,
//!     Duration::from_millis(50),
//!     HashSet::from([ErrorKind::Computation]),
//! )
//! .layer(guarded);
//! let mut cached = with_ttl_cache(Duration::from_secs(30)).layer(retried);
//!
//! let args = CallArgs::new().arg("ada").named("verbose", true);
//! let profile = cached.ready().await?.call(args).await?;
//! assert_eq!(profile["plan"], "basic");
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod callable;
pub mod config;
pub mod error;
pub mod key;
pub mod retry;
pub mod stack;
pub mod tap;
pub mod timeout;
pub mod trace;

pub use cache::{CacheLayer, CacheService, TtlCache};
pub use callable::{callable_fn, ArgValue, BoxCallable, CallArgs};
pub use config::{CacheConfig, ConfigBuilder, RetryConfig, TimeoutConfig, WrapConfig};
pub use error::{CallError, ErrorKind, Result};
pub use key::InvocationKey;
pub use retry::{Backoff, Retry, RetryLayer, RetryPolicy};
pub use stack::{with_retry, with_timeout, with_ttl_cache, WrapStack};
pub use tap::{Tap, TapLayer};
pub use timeout::{Timeout, TimeoutLayer, TimeoutPolicy};
pub use trace::{TraceLayer, Traced};

// Re-export Tower traits that users need
pub use tower::{Layer, Service, ServiceExt};
