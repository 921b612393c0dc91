// ============================================================================
// EntityDB Library
// ============================================================================

//! Persistence and retrieval layer for document-oriented entities.
//!
//! Loosely typed keyword filters are compiled into typed predicates, scoped
//! by tenant, owner and soft-delete visibility, and run against a
//! [`DocumentStore`]. A [`ConditionRegistry`] lets callers wait for
//! background work attached to an entity.
//!
//! ```
//! use entitydb::{DataType, EntityKind, FilterCompiler, FilterRequest, Scope};
//!
//! let kind = EntityKind::builder("order")
//!     .tenant_scoped()
//!     .field("status", DataType::Text)
//!     .build()?;
//!
//! let filters = FilterRequest::new().with("status", "open").with("color", "red");
//! let predicate = FilterCompiler::lenient().compile(&kind, &Scope::new().tenant("acme"), None, &filters)?;
//!
//! // is_deleted, tenant_name, status
//! assert_eq!(predicate.len(), 3);
//! assert_eq!(predicate.dropped()[0].key, "color");
//! # Ok::<(), entitydb::DbError>(())
//! ```

pub mod config;
pub mod core;
pub mod entity;
pub mod facade;
pub mod query;
pub mod storage;
pub mod sync;

// Re-export main types for convenience
pub use config::ServiceConfig;
pub use core::{DataType, DbError, Result, Value};
pub use entity::{Capabilities, Entity, EntityKind, KindDescriptor};
pub use facade::{EntityService, Page, PageRequest, Statistics};
pub use query::{CompileMode, CompiledPredicate, Condition, FilterCompiler, FilterRequest, Scope};
pub use storage::{DocumentStore, InMemoryDocumentStore};
pub use sync::{Completion, ConditionRegistry, TaskRunner, WaitOutcome};
