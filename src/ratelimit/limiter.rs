//! Fixed-window rate limiter.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, instrument, trace, warn};

use super::backend::Limiter;
use super::methods::MethodFilter;
use super::quota::Quota;
use super::request::RequestInfo;
use super::store::{CounterStore, StoreError};
use super::vary::{ByClientAddress, ByPathAndClientAddress, KeyPolicy, KeyPolicyKind};
use crate::config::LimiterConfig;
use crate::error::Result;

/// Limits requests to a [`Quota`] per key, counting in a [`CounterStore`].
///
/// A window starts with the first request for a key that has no active
/// window, and ends when the store reports no time remaining. The limiter
/// holds only immutable configuration, so it can be shared across tasks
/// without locking; all per-key synchronization happens in the store.
pub struct RateLimiter {
    /// Requests allowed per window
    quota: Quota,
    /// Methods subject to limiting
    methods: MethodFilter,
    /// Groups requests into keys
    vary: Arc<dyn KeyPolicy>,
    /// Holds counts and window timing
    store: Arc<dyn CounterStore>,
}

impl fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateLimiter")
            .field("quota", &self.quota)
            .field("methods", &self.methods)
            .finish_non_exhaustive()
    }
}

impl RateLimiter {
    /// Create a new rate limiter.
    pub fn new(
        quota: Quota,
        methods: MethodFilter,
        vary: Arc<dyn KeyPolicy>,
        store: Arc<dyn CounterStore>,
    ) -> Self {
        if methods.is_empty() {
            warn!("No methods configured for rate limiting, all requests will be allowed");
        }

        debug!(
            requests = quota.requests(),
            window_secs = quota.window().as_secs(),
            methods = ?methods,
            "Creating rate limiter"
        );

        Self {
            quota,
            methods,
            vary,
            store,
        }
    }

    /// Create a rate limiter from configuration, counting in `store`.
    pub fn from_config(config: &LimiterConfig, store: Arc<dyn CounterStore>) -> Self {
        let header = config.header_name.clone().unwrap_or_default();
        let vary: Arc<dyn KeyPolicy> = match config.key_policy {
            KeyPolicyKind::ClientAddress => Arc::new(
                ByClientAddress::new(header).strip_header_port(config.strip_header_port),
            ),
            KeyPolicyKind::PathAndClientAddress => Arc::new(
                ByPathAndClientAddress::new(header).strip_header_port(config.strip_header_port),
            ),
        };

        Self::new(
            config.quota(),
            MethodFilter::new(config.methods.iter().cloned()),
            vary,
            store,
        )
    }

    /// Get the quota.
    pub fn quota(&self) -> Quota {
        self.quota
    }

    /// Get the method filter.
    pub fn methods(&self) -> &MethodFilter {
        &self.methods
    }

    /// Count one request against `key` and decide whether it is admitted.
    ///
    /// Store errors are returned unchanged and mean no decision was made.
    /// This awaits the store, which may block on I/O.
    pub async fn check(&self, key: &str) -> Result<bool> {
        let (limit, window) = self.quota.parts();

        let state = match self.store.incr(key, window).await {
            Ok(state) if state.remaining_secs > 0 => state,
            Ok(state) => {
                debug!(key = %key, remaining_secs = state.remaining_secs, "Window elapsed, starting new window");
                return self.start_window(key).await;
            }
            Err(StoreError::NoSuchKey) => {
                debug!(key = %key, "No active window, starting new window");
                return self.start_window(key).await;
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Failed to increment rate limit counter");
                return Err(e.into());
            }
        };

        trace!(
            key = %key,
            count = state.count,
            limit = limit,
            remaining_secs = state.remaining_secs,
            "Checked rate limit"
        );

        if state.count > limit {
            debug!(key = %key, count = state.count, limit = limit, "Rate limit exceeded");
            return Ok(false);
        }
        Ok(true)
    }

    /// Reset `key` to a fresh window holding this request.
    async fn start_window(&self, key: &str) -> Result<bool> {
        self.store
            .reset(key, self.quota.window())
            .await
            .map_err(|e| {
                warn!(key = %key, error = %e, "Failed to reset rate limit window");
                e
            })?;
        Ok(true)
    }
}

#[async_trait]
impl Limiter for RateLimiter {
    #[instrument(skip(self, request), fields(method = %request.method, path = %request.path))]
    async fn limit(&self, request: &RequestInfo) -> Result<bool> {
        if !self.methods.matches(&request.method) {
            trace!("Method not rate limited");
            return Ok(true);
        }

        let key = self.vary.key(request);
        self.check(&key).await
    }
}
