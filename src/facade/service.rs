use super::pagination::{Page, PageRequest, PageWindow, Statistics};
use crate::config::ServiceConfig;
use crate::core::{DbError, Result, Value};
use crate::entity::kind::{IS_DELETED, METADATA};
use crate::entity::{Entity, EntityKind, FieldPolicy};
use crate::query::{
    CompileMode, CompiledPredicate, FilterCompiler, FilterRequest, Scope, SortKey,
};
use crate::storage::{DocumentStore, FindQuery};
use serde_json::{Map, Value as JsonValue};
use std::sync::Arc;
use tracing::{Instrument, Level, event, info_span};
use uuid::Uuid;

/// JSON object received for create and update.
pub type Payload = Map<String, JsonValue>;

/// CRUD, listing and counting over a [`DocumentStore`].
///
/// Every read goes through the filter compiler, so scope (tenant, owner,
/// soft-delete) is applied uniformly. Page windows are clamped here, once
/// per request.
pub struct EntityService<S: ?Sized> {
    store: Arc<S>,
    config: ServiceConfig,
    compiler: FilterCompiler,
}

impl<S: ?Sized> Clone for EntityService<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            config: self.config.clone(),
            compiler: self.compiler,
        }
    }
}

impl<S: DocumentStore + ?Sized> EntityService<S> {
    pub fn new(store: Arc<S>, config: ServiceConfig) -> Self {
        let mode = if config.strict_filters {
            CompileMode::Strict
        } else {
            CompileMode::Lenient
        };
        Self {
            store,
            config,
            compiler: FilterCompiler::new(mode),
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Compile with this service's mode, reporting ignored filters.
    pub fn compile(
        &self,
        kind: &EntityKind,
        scope: &Scope,
        identifier: Option<Uuid>,
        filters: &FilterRequest,
    ) -> Result<CompiledPredicate> {
        let predicate = self.compiler.compile(kind, scope, identifier, filters)?;
        if !predicate.dropped().is_empty() {
            let keys: Vec<&str> = predicate.dropped().iter().map(|d| d.key.as_str()).collect();
            event!(Level::WARN, kind = %kind.name(), ignored = ?keys, "filters ignored");
        }
        event!(Level::DEBUG, kind = %kind.name(), predicate = %predicate, "filters compiled");
        Ok(predicate)
    }

    async fn find_window(
        &self,
        kind: &EntityKind,
        predicate: &CompiledPredicate,
        window: PageWindow,
    ) -> Result<Vec<Entity>> {
        let sort = SortKey::default_order();
        let query = FindQuery::new(predicate, &sort)
            .offset(window.offset)
            .limit(window.limit);
        self.store.find(kind.name(), &query).await
    }

    pub async fn list(
        &self,
        kind: &EntityKind,
        scope: &Scope,
        page: PageRequest,
        filters: &FilterRequest,
    ) -> Result<Vec<Entity>> {
        let span = info_span!("entity.list", kind = %kind.name());
        async {
            let window = self.config.window(page);
            let predicate = self.compile(kind, scope, None, filters)?;
            self.find_window(kind, &predicate, window).await
        }
        .instrument(span)
        .await
    }

    pub async fn count(
        &self,
        kind: &EntityKind,
        scope: &Scope,
        filters: &FilterRequest,
    ) -> Result<u64> {
        let span = info_span!("entity.count", kind = %kind.name());
        async {
            let predicate = self.compile(kind, scope, None, filters)?;
            self.store.count(kind.name(), &predicate).await
        }
        .instrument(span)
        .await
    }

    /// Page and total over one compiled predicate. The two reads are
    /// independent, so under concurrent writes they may disagree.
    pub async fn list_and_count(
        &self,
        kind: &EntityKind,
        scope: &Scope,
        page: PageRequest,
        filters: &FilterRequest,
    ) -> Result<(Vec<Entity>, u64)> {
        let (items, total, _) = self.list_and_count_windowed(kind, scope, page, filters).await?;
        Ok((items, total))
    }

    async fn list_and_count_windowed(
        &self,
        kind: &EntityKind,
        scope: &Scope,
        page: PageRequest,
        filters: &FilterRequest,
    ) -> Result<(Vec<Entity>, u64, PageWindow)> {
        let span = info_span!("entity.list_and_count", kind = %kind.name());
        async {
            let window = self.config.window(page);
            let predicate = self.compile(kind, scope, None, filters)?;
            let (items, total) = futures::try_join!(
                self.find_window(kind, &predicate, window),
                self.store.count(kind.name(), &predicate),
            )?;
            event!(Level::DEBUG, returned = items.len(), total, "listed");
            Ok::<_, DbError>((items, total, window))
        }
        .instrument(span)
        .await
    }

    /// [`list_and_count`](Self::list_and_count) wrapped with the effective window.
    pub async fn list_page(
        &self,
        kind: &EntityKind,
        scope: &Scope,
        page: PageRequest,
        filters: &FilterRequest,
    ) -> Result<Page<Entity>> {
        let (items, total, window) = self.list_and_count_windowed(kind, scope, page, filters).await?;
        Ok(Page {
            items,
            total,
            offset: window.offset,
            limit: window.limit,
        })
    }

    pub async fn statistics(
        &self,
        kind: &EntityKind,
        scope: &Scope,
        filters: &FilterRequest,
    ) -> Result<Statistics> {
        let total = self.count(kind, scope, filters).await?;
        Ok(Statistics {
            total,
            filters: filters.clone(),
        })
    }

    /// Scoped lookup of one entity. Owned kinds need an owner unless the
    /// scope bypasses ownership. More than one match is an integrity error.
    pub async fn get_item(
        &self,
        kind: &EntityKind,
        scope: &Scope,
        identifier: Uuid,
    ) -> Result<Option<Entity>> {
        let span = info_span!("entity.get", kind = %kind.name(), identifier = %identifier);
        async {
            if kind.capabilities().owned && scope.owner_id.is_none() && !scope.ignore_owner {
                return Err(DbError::Validation(format!(
                    "owner_id is required to fetch a {}",
                    kind.name()
                )));
            }

            let predicate = self.compile(kind, scope, Some(identifier), &FilterRequest::new())?;
            let sort = SortKey::default_order();
            let query = FindQuery::new(&predicate, &sort).limit(2);
            let mut matches = self.store.find(kind.name(), &query).await?;

            match matches.len() {
                0 => Ok(None),
                1 => Ok(matches.pop()),
                _ => {
                    event!(Level::ERROR, "identifier matched more than one document");
                    Err(DbError::Integrity(format!(
                        "multiple {} documents match identifier {}",
                        kind.name(),
                        identifier
                    )))
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Unscoped lookup, deleted entities included. Meant for background
    /// workers that already own the identifier.
    pub async fn get_by_identifier(
        &self,
        kind: &EntityKind,
        identifier: Uuid,
    ) -> Result<Option<Entity>> {
        self.store.find_by_identifier(kind.name(), identifier).await
    }

    pub async fn create(
        &self,
        kind: &EntityKind,
        scope: &Scope,
        payload: Payload,
    ) -> Result<Entity> {
        let span = info_span!("entity.create", kind = %kind.name());
        async {
            let capabilities = kind.capabilities();
            let mut entity = Entity::new();

            if capabilities.tenant_scoped {
                let tenant = scope.tenant_name.clone().ok_or_else(|| {
                    DbError::Validation(format!("tenant_name is required to create a {}", kind.name()))
                })?;
                entity.tenant_name = Some(tenant);
            }
            if capabilities.owned {
                let owner = scope.owner_id.ok_or_else(|| {
                    DbError::Validation(format!("owner_id is required to create a {}", kind.name()))
                })?;
                entity.owner_id = Some(owner);
            }

            apply_payload(kind, &mut entity, payload, kind.create_policy())?;
            self.store.insert(kind.name(), entity.clone()).await?;

            event!(Level::DEBUG, identifier = %entity.identifier, "entity created");
            Ok::<_, DbError>(entity)
        }
        .instrument(span)
        .await
    }

    /// Applies the permitted payload keys and persists. `updated_at` is
    /// refreshed even when nothing changed.
    pub async fn update(
        &self,
        kind: &EntityKind,
        mut entity: Entity,
        payload: Payload,
    ) -> Result<Entity> {
        let span = info_span!("entity.update", kind = %kind.name(), identifier = %entity.identifier);
        async {
            kind.capabilities().ensure_mutable(kind.name(), "updated")?;

            apply_payload(kind, &mut entity, payload, kind.update_policy())?;
            entity.touch();
            self.store.replace(kind.name(), entity.clone()).await?;

            event!(Level::DEBUG, "entity updated");
            Ok::<_, DbError>(entity)
        }
        .instrument(span)
        .await
    }

    /// Logical delete: flags the document, never removes it.
    pub async fn delete(&self, kind: &EntityKind, mut entity: Entity) -> Result<Entity> {
        let span = info_span!("entity.delete", kind = %kind.name(), identifier = %entity.identifier);
        async {
            kind.capabilities().ensure_mutable(kind.name(), "deleted")?;

            entity.is_deleted = true;
            entity.touch();
            self.store.replace(kind.name(), entity.clone()).await?;

            event!(Level::DEBUG, "entity deleted");
            Ok::<_, DbError>(entity)
        }
        .instrument(span)
        .await
    }
}

/// Copies permitted payload keys onto the entity, coercing each value to its
/// attribute type. Keys that are not attributes or not permitted are skipped;
/// a value of the wrong type is an error.
fn apply_payload(
    kind: &EntityKind,
    entity: &mut Entity,
    payload: Payload,
    policy: &FieldPolicy,
) -> Result<()> {
    for (key, raw) in payload {
        if !policy.allows(&key) {
            event!(Level::DEBUG, key = %key, "payload key not permitted");
            continue;
        }

        if key == METADATA {
            entity.metadata = match raw {
                JsonValue::Null => None,
                JsonValue::Object(map) => Some(map),
                other => {
                    return Err(DbError::TypeMismatch(format!(
                        "metadata must be an object, got {}",
                        other
                    )));
                }
            };
            continue;
        }

        let Some(data_type) = kind.attribute_type(&key) else {
            event!(Level::DEBUG, key = %key, "payload key is not an attribute");
            continue;
        };

        let value = data_type
            .coerce(Value::from_json(raw.clone()))
            .ok_or_else(|| {
                DbError::TypeMismatch(format!(
                    "attribute '{}' of {} expects {}, got {}",
                    key,
                    kind.name(),
                    data_type,
                    raw
                ))
            })?;

        if key == IS_DELETED {
            match value {
                Value::Boolean(flag) => entity.is_deleted = flag,
                _ => {
                    return Err(DbError::TypeMismatch(format!(
                        "{} cannot be null",
                        IS_DELETED
                    )));
                }
            }
        } else if value.is_null() {
            entity.fields.remove(&key);
        } else {
            entity.fields.insert(key, value);
        }
    }
    Ok(())
}
