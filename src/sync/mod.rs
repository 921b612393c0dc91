//! Completion signaling for background work attached to entities.

pub mod conditions;
pub mod tasks;

pub use conditions::{ConditionRegistry, ConditionWaiter, WaitOutcome};
pub use tasks::{Completion, TaskRunner};
