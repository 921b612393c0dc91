use crate::core::{DbError, Result};
use crate::entity::Entity;
use crate::query::CompiledPredicate;
use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

/// Documents of one kind, kept in insertion order with a unique index on
/// `identifier`.
#[derive(Debug, Clone)]
pub struct Collection {
    name: String,
    documents: BTreeMap<u64, Entity>,
    next_seq: u64,
    by_identifier: HashMap<Uuid, u64>,
}

impl Collection {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            documents: BTreeMap::new(),
            next_seq: 0,
            by_identifier: HashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn insert(&mut self, entity: Entity) -> Result<()> {
        if self.by_identifier.contains_key(&entity.identifier) {
            return Err(DbError::DuplicateKey(format!(
                "{}.identifier already contains {}",
                self.name, entity.identifier
            )));
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        self.by_identifier.insert(entity.identifier, seq);
        self.documents.insert(seq, entity);
        Ok(())
    }

    /// Swaps the stored document with the same identifier, keeping its
    /// position in natural order.
    pub fn replace(&mut self, entity: Entity) -> Result<()> {
        let seq = self.by_identifier.get(&entity.identifier).copied().ok_or_else(|| {
            DbError::NotFound(format!("{} document {}", self.name, entity.identifier))
        })?;
        self.documents.insert(seq, entity);
        Ok(())
    }

    pub fn get(&self, identifier: &Uuid) -> Option<&Entity> {
        self.by_identifier
            .get(identifier)
            .and_then(|seq| self.documents.get(seq))
    }

    /// Matching documents in natural (insertion) order.
    pub fn scan<'a>(
        &'a self,
        predicate: &'a CompiledPredicate,
    ) -> impl Iterator<Item = &'a Entity> + 'a {
        self.documents
            .values()
            .filter(move |entity| predicate.matches(entity))
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}
