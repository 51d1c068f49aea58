//! Configuration for wrapper stacks
//!
//! Serde-backed settings for the cache, retry, and timeout layers, loadable
//! from defaults, a builder, environment variables, or a TOML file.

use std::collections::HashSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ErrorKind;
use crate::retry::{Backoff, RetryPolicy};

/// TTL cache settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// How long a computed result stays live
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(60),
        }
    }
}

/// Retry settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempt budget, including the first call
    pub max_attempts: usize,

    /// Delay between attempts
    pub delay: Duration,

    /// Multiplier above 1.0 switches the delay to exponential backoff
    pub backoff_multiplier: f32,

    /// Ceiling for backed-off delays
    pub max_delay: Duration,

    /// Add random spread to each delay
    pub jitter: bool,

    /// Error categories treated as transient
    pub retry_on: HashSet<ErrorKind>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_millis(100),
            backoff_multiplier: 1.0,
            max_delay: Duration::from_secs(10),
            jitter: false,
            retry_on: HashSet::from([ErrorKind::Computation]),
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        let backoff = if config.backoff_multiplier > 1.0 {
            Backoff::exponential(config.delay, config.backoff_multiplier, config.max_delay)
        } else {
            Backoff::fixed(config.delay)
        };
        RetryPolicy::new(config.max_attempts, config.delay, config.retry_on.clone())
            .with_backoff(backoff)
            .with_jitter(config.jitter)
    }
}

/// Timeout settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Per-invocation wall-clock limit
    pub limit: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            limit: Duration::from_secs(30),
        }
    }
}

/// Full wrapper-stack configuration. Absent sections mean the matching
/// layer is not applied.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WrapConfig {
    pub cache: Option<CacheConfig>,
    pub retry: Option<RetryConfig>,
    pub timeout: Option<TimeoutConfig>,
}

/// Configuration builder
#[derive(Default)]
pub struct ConfigBuilder {
    config: WrapConfig,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.config.cache = Some(CacheConfig { ttl });
        self
    }

    pub fn max_attempts(mut self, attempts: usize) -> Self {
        self.config.retry.get_or_insert_with(Default::default).max_attempts = attempts;
        self
    }

    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.config.retry.get_or_insert_with(Default::default).delay = delay;
        self
    }

    pub fn retry_on(mut self, kinds: HashSet<ErrorKind>) -> Self {
        self.config.retry.get_or_insert_with(Default::default).retry_on = kinds;
        self
    }

    pub fn jitter(mut self, enabled: bool) -> Self {
        self.config.retry.get_or_insert_with(Default::default).jitter = enabled;
        self
    }

    pub fn timeout(mut self, limit: Duration) -> Self {
        self.config.timeout = Some(TimeoutConfig { limit });
        self
    }

    pub fn build(self) -> WrapConfig {
        self.config
    }
}

/// Load configuration from environment variables
pub fn from_env() -> WrapConfig {
    let mut config = WrapConfig::default();

    if let Ok(ttl) = std::env::var("WRAP_CACHE_TTL_MS") {
        if let Ok(ms) = ttl.parse::<u64>() {
            config.cache = Some(CacheConfig {
                ttl: Duration::from_millis(ms),
            });
        }
    }

    if let Ok(attempts) = std::env::var("WRAP_RETRY_MAX_ATTEMPTS") {
        if let Ok(n) = attempts.parse::<usize>() {
            config.retry.get_or_insert_with(Default::default).max_attempts = n;
        }
    }

    if let Ok(delay) = std::env::var("WRAP_RETRY_DELAY_MS") {
        if let Ok(ms) = delay.parse::<u64>() {
            config.retry.get_or_insert_with(Default::default).delay = Duration::from_millis(ms);
        }
    }

    if let Ok(limit) = std::env::var("WRAP_TIMEOUT_MS") {
        if let Ok(ms) = limit.parse::<u64>() {
            config.timeout = Some(TimeoutConfig {
                limit: Duration::from_millis(ms),
            });
        }
    }

    config
}

/// Load configuration from a TOML file
pub fn from_file(
    path: impl AsRef<std::path::Path>,
) -> Result<WrapConfig, Box<dyn std::error::Error>> {
    let contents = std::fs::read_to_string(path)?;
    let config: WrapConfig = toml::from_str(&contents)?;
    Ok(config)
}
