use crate::core::Result;
use crate::entity::Entity;
use crate::query::{CompiledPredicate, SortKey};
use async_trait::async_trait;
use uuid::Uuid;

/// A bounded, sorted read against one collection.
#[derive(Debug, Clone, Copy)]
pub struct FindQuery<'a> {
    pub predicate: &'a CompiledPredicate,
    pub sort: &'a [SortKey],
    pub offset: usize,
    pub limit: Option<usize>,
}

impl<'a> FindQuery<'a> {
    pub fn new(predicate: &'a CompiledPredicate, sort: &'a [SortKey]) -> Self {
        Self {
            predicate,
            sort,
            offset: 0,
            limit: None,
        }
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Document store driver - allows pluggable storage backends.
///
/// Collections are addressed by entity kind name. The driver enforces
/// uniqueness of `identifier` and evaluates compiled predicates; the layer
/// above never touches documents directly.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert a new document; fails with `DuplicateKey` on a repeated identifier.
    async fn insert(&self, kind: &str, entity: Entity) -> Result<()>;

    /// Replace the stored document with the same identifier; `NotFound` when absent.
    async fn replace(&self, kind: &str, entity: Entity) -> Result<()>;

    /// Matching documents, sorted, then windowed.
    async fn find(&self, kind: &str, query: &FindQuery<'_>) -> Result<Vec<Entity>>;

    /// Number of matching documents.
    async fn count(&self, kind: &str, predicate: &CompiledPredicate) -> Result<u64>;

    /// Unscoped lookup by identifier, deleted documents included.
    async fn find_by_identifier(&self, kind: &str, identifier: Uuid) -> Result<Option<Entity>>;
}
