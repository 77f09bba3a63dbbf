//! Ordered fallback over asynchronous read strategies.
//!
//! Each strategy is started only when every earlier one has failed or timed
//! out. A timed-out attempt is dropped, so a late answer can never be used.
//! When every strategy fails the caller's default is returned; nothing here
//! returns an error.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tokio::time::timeout;
use crate::AppError;

/// Per-attempt budget used by the community data-access paths.
pub const DEFAULT_ATTEMPT_TIMEOUT_MS: u64 = 8000;

/// Configuration for fallback reads
#[derive(Debug, Clone)]
pub struct FallbackConfig {
    pub attempt_timeout: Duration,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            attempt_timeout: Duration::from_millis(DEFAULT_ATTEMPT_TIMEOUT_MS),
        }
    }
}

impl FallbackConfig {
    pub fn from_millis(attempt_timeout_ms: u64) -> Self {
        Self {
            attempt_timeout: Duration::from_millis(attempt_timeout_ms),
        }
    }
}

type AttemptFuture<'a, T> = Pin<Box<dyn Future<Output = crate::Result<T>> + Send + 'a>>;

/// One way of obtaining the value. The closure runs only if the strategy is reached.
pub struct Strategy<'a, T> {
    name: &'static str,
    timeout: Option<Duration>,
    start: Box<dyn FnOnce() -> AttemptFuture<'a, T> + Send + 'a>,
}

impl<'a, T: 'a> Strategy<'a, T> {
    pub fn new<F, Fut>(name: &'static str, start: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'a,
        Fut: Future<Output = crate::Result<T>> + Send + 'a,
    {
        Self {
            name,
            timeout: None,
            start: Box::new(move || Box::pin(start()) as AttemptFuture<'a, T>),
        }
    }

    /// Override the configured per-attempt timeout for this strategy only.
    pub fn with_timeout(mut self, limit: Duration) -> Self {
        self.timeout = Some(limit);
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

/// Why a strategy was skipped over.
#[derive(Debug)]
pub struct AttemptFailure {
    pub strategy: &'static str,
    pub error: AppError,
}

/// Outcome of a fallback read.
#[derive(Debug)]
pub struct Resolved<T> {
    pub value: T,
    /// Strategy that produced `value`; `None` when the default was used.
    pub source: Option<&'static str>,
    pub failures: Vec<AttemptFailure>,
}

impl<T> Resolved<T> {
    pub fn is_default(&self) -> bool {
        self.source.is_none()
    }

    pub fn into_value(self) -> T {
        self.value
    }
}

/// Run strategies in order, returning the first success or `default`.
pub async fn resolve_with_fallback<'a, T>(
    strategies: Vec<Strategy<'a, T>>,
    config: &FallbackConfig,
    default: T,
) -> Resolved<T> {
    let total = strategies.len();
    let mut failures = Vec::new();

    for (index, strategy) in strategies.into_iter().enumerate() {
        let name = strategy.name;
        let limit = strategy.timeout.unwrap_or(config.attempt_timeout);
        tracing::debug!("🔄 FALLBACK: Attempt {}/{} via '{}' (timeout {}ms)",
                        index + 1, total, name, limit.as_millis());

        match timeout(limit, (strategy.start)()).await {
            Ok(Ok(value)) => {
                if index > 0 {
                    tracing::info!("✅ FALLBACK: Served by '{}' after {} failed attempt(s)", name, index);
                }
                return Resolved { value, source: Some(name), failures };
            }
            Ok(Err(error)) => {
                tracing::warn!("⚠️ FALLBACK: '{}' failed: {}", name, error);
                failures.push(AttemptFailure { strategy: name, error });
            }
            Err(_) => {
                tracing::warn!("⏰ FALLBACK: '{}' exceeded {}ms, abandoning it", name, limit.as_millis());
                failures.push(AttemptFailure {
                    strategy: name,
                    error: AppError::Timeout(format!("{} exceeded {}ms", name, limit.as_millis())),
                });
            }
        }
    }

    if total > 0 {
        tracing::error!("❌ FALLBACK: All {} strategies failed, returning default", total);
    }
    Resolved { value: default, source: None, failures }
}

/// Bound a single fallible operation, turning an overrun into `AppError::Timeout`.
pub async fn with_deadline<T, Fut>(limit: Duration, label: &str, operation: Fut) -> crate::Result<T>
where
    Fut: Future<Output = crate::Result<T>>,
{
    match timeout(limit, operation).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!("⏰ DEADLINE: '{}' exceeded {}ms", label, limit.as_millis());
            Err(AppError::Timeout(format!("{} exceeded {}ms", label, limit.as_millis())))
        }
    }
}

/// Convenience wrapper when the caller only needs the value.
pub async fn first_success_or<'a, T>(
    strategies: Vec<Strategy<'a, T>>,
    config: &FallbackConfig,
    default: T,
) -> T {
    resolve_with_fallback(strategies, config, default).await.into_value()
}
