use super::collection::Collection;
use super::engine::{DocumentStore, FindQuery};
use crate::core::Result;
use crate::entity::Entity;
use crate::query::{CompiledPredicate, SortKey};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Process-local document store.
///
/// Each collection has its own lock; the outer lock only guards the set of
/// collection names. Collections are created on first insert and a missing
/// collection reads as empty.
pub struct InMemoryDocumentStore {
    collections: RwLock<HashMap<String, Arc<RwLock<Collection>>>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
        }
    }

    async fn collection(&self, kind: &str) -> Option<Arc<RwLock<Collection>>> {
        self.collections.read().await.get(kind).cloned()
    }

    async fn collection_or_create(&self, kind: &str) -> Arc<RwLock<Collection>> {
        if let Some(collection) = self.collection(kind).await {
            return collection;
        }
        let mut collections = self.collections.write().await;
        collections
            .entry(kind.to_string())
            .or_insert_with(|| Arc::new(RwLock::new(Collection::new(kind))))
            .clone()
    }

    /// Collection names, unordered.
    pub async fn list_collections(&self) -> Vec<String> {
        self.collections.read().await.keys().cloned().collect()
    }

    /// Stored documents of a kind, deleted ones included.
    pub async fn document_count(&self, kind: &str) -> usize {
        match self.collection(kind).await {
            Some(collection) => collection.read().await.len(),
            None => 0,
        }
    }
}

impl Default for InMemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn insert(&self, kind: &str, entity: Entity) -> Result<()> {
        let collection = self.collection_or_create(kind).await;
        let mut collection = collection.write().await;
        collection.insert(entity)
    }

    async fn replace(&self, kind: &str, entity: Entity) -> Result<()> {
        let collection = self.collection_or_create(kind).await;
        let mut collection = collection.write().await;
        collection.replace(entity)
    }

    async fn find(&self, kind: &str, query: &FindQuery<'_>) -> Result<Vec<Entity>> {
        let Some(collection) = self.collection(kind).await else {
            return Ok(Vec::new());
        };
        let collection = collection.read().await;

        let mut matched: Vec<&Entity> = collection.scan(query.predicate).collect();
        // stable: equal keys keep natural order
        matched.sort_by(|a, b| SortKey::compare(query.sort, a, b));

        let limit = query.limit.unwrap_or(usize::MAX);
        Ok(matched
            .into_iter()
            .skip(query.offset)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn count(&self, kind: &str, predicate: &CompiledPredicate) -> Result<u64> {
        let Some(collection) = self.collection(kind).await else {
            return Ok(0);
        };
        let collection = collection.read().await;
        Ok(u64::try_from(collection.scan(predicate).count()).unwrap_or(u64::MAX))
    }

    async fn find_by_identifier(&self, kind: &str, identifier: Uuid) -> Result<Option<Entity>> {
        let Some(collection) = self.collection(kind).await else {
            return Ok(None);
        };
        let collection = collection.read().await;
        Ok(collection.get(&identifier).cloned())
    }
}
