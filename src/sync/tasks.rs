use super::conditions::{ConditionRegistry, WaitOutcome};
use crate::core::Result;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{Instrument, Level, event, info_span};
use uuid::Uuid;

/// How a completion wait ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// The entity state showed the work finished before waiting.
    AlreadyDone,
    Signaled,
    TimedOut,
}

/// Releases the key when dropped, however the task ends.
struct ReleaseGuard {
    registry: ConditionRegistry,
    key: Uuid,
}

impl Drop for ReleaseGuard {
    fn drop(&mut self) {
        self.registry.release(self.key);
    }
}

/// Runs background work attached to an entity and signals its completion
/// through a [`ConditionRegistry`].
#[derive(Debug, Clone)]
pub struct TaskRunner {
    registry: ConditionRegistry,
}

impl TaskRunner {
    pub fn new(registry: ConditionRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ConditionRegistry {
        &self.registry
    }

    /// Spawn `task` for the entity `key`.
    ///
    /// `key` is released exactly once when the task ends: on success, on
    /// error, on panic and on abort. Errors are logged, not returned.
    pub fn spawn<F, T, E>(&self, key: Uuid, task: F) -> JoinHandle<()>
    where
        F: Future<Output = std::result::Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Display + Send + 'static,
    {
        let guard = ReleaseGuard {
            registry: self.registry.clone(),
            key,
        };
        let span = info_span!("task", key = %key);

        tokio::spawn(
            async move {
                let _guard = guard;
                match task.await {
                    Ok(_) => event!(Level::INFO, "task finished"),
                    Err(e) => event!(Level::ERROR, error = %e, "task failed"),
                }
            }
            .instrument(span),
        )
    }

    /// Wait for the work on `key` without missing a release that races
    /// with the caller.
    ///
    /// The waiter is registered first, then `is_done` inspects the entity.
    /// A release between the two is still observed by the waiter.
    pub async fn wait_for_completion<F, Fut>(
        &self,
        key: Uuid,
        timeout: Option<Duration>,
        is_done: F,
    ) -> Result<Completion>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<bool>>,
    {
        let waiter = self.registry.subscribe(key);
        if is_done().await? {
            return Ok(Completion::AlreadyDone);
        }

        Ok(match waiter.wait(timeout).await {
            WaitOutcome::Signaled => Completion::Signaled,
            WaitOutcome::TimedOut => Completion::TimedOut,
        })
    }
}
