//! Request quotas for fixed-window rate limiting.

use std::time::Duration;

/// Smallest window a quota may use.
const MIN_WINDOW: Duration = Duration::from_secs(1);

/// The number of requests allowed per fixed time window.
///
/// A quota is clamped on construction: fewer than one request becomes one
/// request, and a window shorter than one second becomes one second.
/// Fractions of seconds are truncated, so a 1.9s window behaves as 1s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Quota {
    /// Maximum requests admitted in one window
    requests: u64,
    /// Length of the window, in whole seconds
    window: Duration,
}

impl Quota {
    /// Create a quota of `requests` per `window`.
    pub fn new(requests: u64, window: Duration) -> Self {
        let window = Duration::from_secs(window.as_secs()).max(MIN_WINDOW);

        Self {
            requests: requests.max(1),
            window,
        }
    }

    /// `requests` per second.
    pub fn per_second(requests: u64) -> Self {
        Self::new(requests, Duration::from_secs(1))
    }

    /// `requests` per minute.
    pub fn per_minute(requests: u64) -> Self {
        Self::new(requests, Duration::from_secs(60))
    }

    /// `requests` per hour.
    pub fn per_hour(requests: u64) -> Self {
        Self::new(requests, Duration::from_secs(3600))
    }

    /// `requests` per day.
    pub fn per_day(requests: u64) -> Self {
        Self::new(requests, Duration::from_secs(86400))
    }

    /// Get the maximum number of requests per window.
    pub fn requests(&self) -> u64 {
        self.requests
    }

    /// Get the window duration.
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Get the `(requests, window)` pair.
    pub fn parts(&self) -> (u64, Duration) {
        (self.requests, self.window)
    }
}
