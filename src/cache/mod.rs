//! TTL-gated snapshot cell shared by the notice and service caches.
//!
//! Readers clone an `Arc` to the current snapshot and never see a partially
//! built value. Refreshes build a new value off to the side and publish it
//! with a single swap; a separate mutex serialises refreshes so that callers
//! arriving while a refresh is running wait for it and then reuse its result.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
#[cfg(test)]
use std::sync::Mutex;

use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::{Mutex as AsyncMutex, RwLock};

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Settable clock for tests.
#[cfg(test)]
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

#[cfg(test)]
impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: TimeDelta) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = to;
    }
}

#[cfg(test)]
impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Load time that is always judged stale.
pub fn stale_sentinel() -> DateTime<Utc> {
    DateTime::<Utc>::MIN_UTC
}

/// A freshly built value and the instant it counts as loaded.
#[derive(Debug)]
pub struct Loaded<T> {
    pub value: T,
    pub loaded_at: DateTime<Utc>,
}

/// The value a cell holds and the load time it was published with.
#[derive(Debug)]
pub struct Published<T> {
    pub value: Arc<T>,
    pub loaded_at: DateTime<Utc>,
}

impl<T> Clone for Published<T> {
    fn clone(&self) -> Self {
        Self {
            value: self.value.clone(),
            loaded_at: self.loaded_at,
        }
    }
}

/// Holds the current snapshot of one cache.
pub struct SnapshotCell<T> {
    current: RwLock<Published<T>>,
    refresh_lock: AsyncMutex<()>,
    ttl: TimeDelta,
    clock: Arc<dyn Clock>,
    refreshes: AtomicU64,
}

impl<T> SnapshotCell<T> {
    /// Start with `initial` at the stale sentinel so the first read loads.
    pub fn new(initial: T, ttl: std::time::Duration, clock: Arc<dyn Clock>) -> Self {
        let ttl = TimeDelta::from_std(ttl).unwrap_or(TimeDelta::MAX);
        Self {
            current: RwLock::new(Published {
                value: Arc::new(initial),
                loaded_at: stale_sentinel(),
            }),
            refresh_lock: AsyncMutex::new(()),
            ttl,
            clock,
            refreshes: AtomicU64::new(0),
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Number of reloads attempted so far.
    pub fn refresh_count(&self) -> u64 {
        self.refreshes.load(Ordering::Relaxed)
    }

    pub async fn loaded_at(&self) -> DateTime<Utc> {
        self.current.read().await.loaded_at
    }

    fn is_stale(&self, loaded_at: DateTime<Utc>) -> bool {
        self.clock.now().signed_duration_since(loaded_at) > self.ttl
    }

    /// Current snapshot, reloading first if the TTL has elapsed.
    ///
    /// `reload` returns `None` to keep the prior snapshot in place.
    pub async fn read_fresh<F, Fut>(&self, reload: F) -> Arc<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Option<Loaded<T>>>,
    {
        {
            let current = self.current.read().await;
            if !self.is_stale(current.loaded_at) {
                return current.value.clone();
            }
        }

        let _guard = self.refresh_lock.lock().await;

        // Another caller may have published while we waited for the lock.
        {
            let current = self.current.read().await;
            if !self.is_stale(current.loaded_at) {
                return current.value.clone();
            }
        }

        self.run_reload(reload).await.value
    }

    /// Reload unconditionally.
    ///
    /// Returns what this reload left in the cell, read before the refresh
    /// lock is released so a concurrent refresh cannot be observed instead.
    pub async fn refresh<F, Fut>(&self, reload: F) -> Published<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Option<Loaded<T>>>,
    {
        let _guard = self.refresh_lock.lock().await;
        self.run_reload(reload).await
    }

    async fn run_reload<F, Fut>(&self, reload: F) -> Published<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Option<Loaded<T>>>,
    {
        self.refreshes.fetch_add(1, Ordering::Relaxed);

        match reload().await {
            Some(loaded) => {
                let published = Published {
                    value: Arc::new(loaded.value),
                    loaded_at: loaded.loaded_at,
                };
                *self.current.write().await = published.clone();
                published
            }
            None => self.current.read().await.clone(),
        }
    }
}
