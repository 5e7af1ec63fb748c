//! Limiter trait and store error policies.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::request::RequestInfo;
use crate::error::Result;

/// What to do with a request when the limiter could not decide.
///
/// There is no default. Failing closed keeps the limit enforced while the
/// store is down, at the cost of availability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorPolicy {
    /// Admit the request.
    FailOpen,
    /// Reject the request, keeping the limit enforced during store outages.
    FailClosed,
}

impl ErrorPolicy {
    /// Turn a limiter result into an admit/reject answer.
    pub fn resolve(self, result: Result<bool>) -> bool {
        match result {
            Ok(allowed) => allowed,
            Err(e) => {
                let allowed = self == ErrorPolicy::FailOpen;
                warn!(error = %e, allowed = allowed, policy = ?self, "Rate limit check failed");
                allowed
            }
        }
    }
}

/// Trait for request limiters.
///
/// Implementations decide per request whether it may go through. Errors mean
/// no decision was made.
#[async_trait]
pub trait Limiter: Send + Sync {
    /// Check whether `request` is admitted.
    async fn limit(&self, request: &RequestInfo) -> Result<bool>;

    /// Check `request`, using `policy` when no decision could be made.
    async fn allow(&self, request: &RequestInfo, policy: ErrorPolicy) -> bool {
        policy.resolve(self.limit(request).await)
    }
}
