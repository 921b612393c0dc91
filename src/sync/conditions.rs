use crate::config::ServiceConfig;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{Level, event};
use uuid::Uuid;

/// How a wait ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Signaled,
    TimedOut,
}

/// One generation of a key: created by the first waiter, retired by a
/// release or by the last waiter leaving.
#[derive(Debug, Default)]
struct Entry {
    signaled: AtomicBool,
    notify: Notify,
    // guarded by the table lock
    waiters: AtomicUsize,
}

#[derive(Debug)]
struct RegistryInner {
    table: Mutex<HashMap<Uuid, Arc<Entry>>>,
    default_timeout: Option<Duration>,
}

impl RegistryInner {
    // every critical section is a single insert or remove
    fn table(&self) -> MutexGuard<'_, HashMap<Uuid, Arc<Entry>>> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Wait/notify primitives keyed by entity identifier.
///
/// A key is absent until someone subscribes to it. `release` wakes every
/// current waiter of the key and retires the entry; a release with nobody
/// subscribed is a no-op, so a waiter that arrives after it blocks until the
/// next release (or its timeout). Callers that cannot afford a missed signal
/// should subscribe first and then check the entity state, see
/// [`TaskRunner::wait_for_completion`](super::TaskRunner::wait_for_completion).
///
/// Cloning is cheap and clones share the table.
#[derive(Debug, Clone)]
pub struct ConditionRegistry {
    inner: Arc<RegistryInner>,
}

impl ConditionRegistry {
    pub fn new(default_timeout: Option<Duration>) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                table: Mutex::new(HashMap::new()),
                default_timeout,
            }),
        }
    }

    pub fn from_config(config: &ServiceConfig) -> Self {
        Self::new(config.wait_timeout)
    }

    pub fn default_timeout(&self) -> Option<Duration> {
        self.inner.default_timeout
    }

    /// Register interest in `key` without suspending.
    ///
    /// Any release of `key` after this call returns is observed by the
    /// returned waiter, even if it is awaited later.
    pub fn subscribe(&self, key: Uuid) -> ConditionWaiter {
        let mut table = self.inner.table();
        let entry = Arc::clone(table.entry(key).or_default());
        entry.waiters.fetch_add(1, Ordering::SeqCst);
        drop(table);

        event!(Level::TRACE, key = %key, "waiter registered");
        ConditionWaiter {
            key,
            entry,
            registry: Arc::clone(&self.inner),
        }
    }

    /// Block until `key` is released or the default timeout passes.
    pub async fn wait(&self, key: Uuid) -> WaitOutcome {
        self.wait_timeout(key, self.inner.default_timeout).await
    }

    /// Block until `key` is released; `None` waits without a bound.
    pub async fn wait_timeout(&self, key: Uuid, timeout: Option<Duration>) -> WaitOutcome {
        self.subscribe(key).wait(timeout).await
    }

    /// Wake all current waiters of `key` and retire its entry.
    ///
    /// Returns false when nobody was subscribed.
    pub fn release(&self, key: Uuid) -> bool {
        let Some(entry) = self.inner.table().remove(&key) else {
            event!(Level::DEBUG, key = %key, "release without waiters");
            return false;
        };

        entry.signaled.store(true, Ordering::SeqCst);
        entry.notify.notify_waiters();
        event!(
            Level::DEBUG,
            key = %key,
            waiters = entry.waiters.load(Ordering::SeqCst),
            "released"
        );
        true
    }

    pub fn is_registered(&self, key: Uuid) -> bool {
        self.inner.table().contains_key(&key)
    }

    /// Waiters currently subscribed to `key`.
    pub fn waiters(&self, key: Uuid) -> usize {
        self.inner
            .table()
            .get(&key)
            .map_or(0, |entry| entry.waiters.load(Ordering::SeqCst))
    }

    /// Number of keys with outstanding waiters.
    pub fn len(&self) -> usize {
        self.inner.table().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ConditionRegistry {
    fn default() -> Self {
        Self::from_config(&ServiceConfig::default())
    }
}

/// A registered interest in one key.
///
/// Dropping the waiter, awaited or not, unregisters it. The entry is retired
/// with its last waiter unless a release already retired it.
#[derive(Debug)]
pub struct ConditionWaiter {
    key: Uuid,
    entry: Arc<Entry>,
    registry: Arc<RegistryInner>,
}

impl ConditionWaiter {
    pub fn key(&self) -> Uuid {
        self.key
    }

    pub fn is_signaled(&self) -> bool {
        self.entry.signaled.load(Ordering::SeqCst)
    }

    pub async fn wait(self, timeout: Option<Duration>) -> WaitOutcome {
        let outcome = match timeout {
            Some(limit) => match tokio::time::timeout(limit, self.signaled()).await {
                Ok(()) => WaitOutcome::Signaled,
                Err(_) => WaitOutcome::TimedOut,
            },
            None => {
                self.signaled().await;
                WaitOutcome::Signaled
            }
        };

        event!(Level::DEBUG, key = %self.key, outcome = ?outcome, "wait finished");
        outcome
    }

    async fn signaled(&self) {
        loop {
            // Notified futures see notify_waiters() from creation on, so the
            // flag check below cannot miss a release.
            let notified = self.entry.notify.notified();
            if self.is_signaled() {
                return;
            }
            notified.await;
        }
    }
}

impl Drop for ConditionWaiter {
    fn drop(&mut self) {
        let mut table = self.registry.table();
        let remaining = self.entry.waiters.fetch_sub(1, Ordering::SeqCst) - 1;
        if remaining == 0
            && table
                .get(&self.key)
                .is_some_and(|current| Arc::ptr_eq(current, &self.entry))
        {
            table.remove(&self.key);
            event!(Level::TRACE, key = %self.key, "entry retired by last waiter");
        }
    }
}
