//! Counter store contract used by the rate limiter.
//!
//! The store owns every per-key window and is the single source of truth for
//! counts and window timing. The limiter only ever calls `incr` and `reset`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Errors returned by a counter store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The key has never been seen, or its window expired and was purged.
    ///
    /// This is a signal to start a fresh window rather than a failure.
    #[error("no such key")]
    NoSuchKey,

    /// The store could not be reached or is malfunctioning.
    #[error("counter store unavailable: {0}")]
    Unavailable(String),

    /// A store call did not complete in time.
    #[error("counter store call timed out after {0:?}")]
    Timeout(Duration),
}

/// The state of a key's active window, as reported by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowState {
    /// Number of requests counted in the window, including the current one
    pub count: u64,
    /// Whole seconds left in the window; zero or less means it has elapsed
    pub remaining_secs: i64,
}

/// Storage for per-key request counters.
///
/// Implementations must make `incr` and `reset` atomic and linearizable per
/// key, since concurrent requests for the same key are not serialized by the
/// limiter.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Increment the counter for `key` and return the new window state.
    ///
    /// Returns [`StoreError::NoSuchKey`] when the key has no window.
    async fn incr(&self, key: &str, window: Duration) -> Result<WindowState, StoreError>;

    /// Start a fresh window for `key` with a count of 1.
    async fn reset(&self, key: &str, window: Duration) -> Result<(), StoreError>;
}

#[async_trait]
impl<S: CounterStore + ?Sized> CounterStore for Arc<S> {
    async fn incr(&self, key: &str, window: Duration) -> Result<WindowState, StoreError> {
        (**self).incr(key, window).await
    }

    async fn reset(&self, key: &str, window: Duration) -> Result<(), StoreError> {
        (**self).reset(key, window).await
    }
}

/// A store wrapper that fails calls taking longer than a deadline.
///
/// Timed out calls surface as [`StoreError::Timeout`].
#[derive(Debug)]
pub struct TimeoutStore<S> {
    inner: S,
    timeout: Duration,
}

impl<S: CounterStore> TimeoutStore<S> {
    /// Wrap `inner`, bounding every call by `timeout`.
    pub fn new(inner: S, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    /// Get the wrapped store.
    pub fn inner(&self) -> &S {
        &self.inner
    }
}

#[async_trait]
impl<S: CounterStore> CounterStore for TimeoutStore<S> {
    async fn incr(&self, key: &str, window: Duration) -> Result<WindowState, StoreError> {
        tokio::time::timeout(self.timeout, self.inner.incr(key, window))
            .await
            .map_err(|_| StoreError::Timeout(self.timeout))?
    }

    async fn reset(&self, key: &str, window: Duration) -> Result<(), StoreError> {
        tokio::time::timeout(self.timeout, self.inner.reset(key, window))
            .await
            .map_err(|_| StoreError::Timeout(self.timeout))?
    }
}
