//! In-memory counter store.

use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use super::clock::{Clock, SystemClock};
use super::store::{CounterStore, StoreError, WindowState};

/// A single key's window.
#[derive(Debug, Clone, Copy)]
struct Window {
    /// Requests counted since the window started
    count: u64,
    /// When the window started
    started: Instant,
    /// Window length given at reset, used for purging
    length: Duration,
}

/// A process-local [`CounterStore`] backed by a sharded map.
///
/// Each key's counter is updated under its shard lock, so `incr` and `reset`
/// are atomic per key. Expired windows keep counting (and report no time
/// remaining) until they are reset or purged.
#[derive(Debug)]
pub struct MemoryStore {
    windows: DashMap<String, Window>,
    clock: Arc<dyn Clock>,
}

impl MemoryStore {
    /// Create a store using the system clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create a store using the given clock.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            windows: DashMap::new(),
            clock,
        }
    }

    /// Get the number of tracked keys.
    pub fn len(&self) -> usize {
        self.windows.len()
    }

    /// Check whether the store tracks no keys.
    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    /// Remove every window that has fully elapsed.
    ///
    /// Returns the number of removed keys.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let before = self.windows.len();

        self.windows
            .retain(|_, w| now.saturating_duration_since(w.started) < w.length);

        let purged = before.saturating_sub(self.windows.len());
        if purged > 0 {
            debug!(purged = purged, remaining = self.windows.len(), "Purged expired windows");
        }
        purged
    }

    /// Spawn a task that purges expired windows every `interval`.
    ///
    /// The task stops on its own once the store is dropped.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let store: Weak<Self> = Arc::downgrade(self);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;

            loop {
                ticker.tick().await;
                match store.upgrade() {
                    Some(store) => {
                        store.purge_expired();
                    }
                    None => {
                        trace!("Counter store dropped, stopping sweeper");
                        break;
                    }
                }
            }
        })
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Whole seconds left in a window, rounded up while any time remains.
fn remaining_secs(started: Instant, window: Duration, now: Instant) -> i64 {
    let elapsed = now.saturating_duration_since(started);

    match window.checked_sub(elapsed) {
        Some(left) if !left.is_zero() => {
            let secs = left.as_secs() + u64::from(left.subsec_nanos() > 0);
            i64::try_from(secs).unwrap_or(i64::MAX)
        }
        _ => {
            let over = elapsed.saturating_sub(window).as_secs();
            -i64::try_from(over).unwrap_or(i64::MAX)
        }
    }
}

#[async_trait]
impl CounterStore for MemoryStore {
    async fn incr(&self, key: &str, window: Duration) -> Result<WindowState, StoreError> {
        let mut entry = self.windows.get_mut(key).ok_or(StoreError::NoSuchKey)?;

        entry.count += 1;
        let state = WindowState {
            count: entry.count,
            remaining_secs: remaining_secs(entry.started, window, self.clock.now()),
        };

        trace!(key = %key, count = state.count, remaining_secs = state.remaining_secs, "Incremented counter");
        Ok(state)
    }

    async fn reset(&self, key: &str, window: Duration) -> Result<(), StoreError> {
        self.windows.insert(
            key.to_string(),
            Window {
                count: 1,
                started: self.clock.now(),
                length: window,
            },
        );
        Ok(())
    }
}
