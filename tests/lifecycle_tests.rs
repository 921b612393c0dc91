/// Entity lifecycle tests
///
/// Create/update/delete through the service: field policies, coercion,
/// soft delete, immutability and scoped lookups.
/// Run with: cargo test --test lifecycle_tests

use async_trait::async_trait;
use entitydb::facade::Payload;
use entitydb::query::CompiledPredicate;
use entitydb::storage::FindQuery;
use entitydb::{
    DataType, DbError, DocumentStore, Entity, EntityKind, EntityService, FilterRequest,
    InMemoryDocumentStore, PageRequest, Scope, ServiceConfig, Value,
};
use serde_json::{Value as JsonValue, json};
use std::sync::Arc;
use uuid::Uuid;

fn payload(value: JsonValue) -> Payload {
    value.as_object().cloned().unwrap()
}

fn service() -> EntityService<InMemoryDocumentStore> {
    EntityService::new(Arc::new(InMemoryDocumentStore::new()), ServiceConfig::default())
}

fn order_kind() -> EntityKind {
    EntityKind::builder("order")
        .tenant_scoped()
        .field("status", DataType::Text)
        .field("total", DataType::Integer)
        .field("reference", DataType::Text)
        .update_exclude(["reference"])
        .build()
        .unwrap()
}

fn note_kind() -> EntityKind {
    EntityKind::builder("note")
        .owner_required()
        .field("title", DataType::Text)
        .build()
        .unwrap()
}

fn receipt_kind() -> EntityKind {
    EntityKind::builder("receipt")
        .owned()
        .tenant_scoped()
        .immutable()
        .field("amount", DataType::Float)
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_create_requires_tenant() {
    let service = service();
    let err = service
        .create(&order_kind(), &Scope::new(), payload(json!({"status": "open"})))
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::Validation(_)));
    assert_eq!(service.store().document_count("order").await, 0);
}

#[tokio::test]
async fn test_create_applies_policy_and_coercion() {
    let service = service();
    let kind = order_kind();
    let forged = Uuid::new_v4();

    let entity = service
        .create(
            &kind,
            &Scope::new().tenant("acme"),
            payload(json!({
                "identifier": forged.to_string(),
                "is_deleted": true,
                "tenant_name": "other",
                "status": "open",
                "total": "42",
                "color": "red",
                "metadata": {"source": "import"},
            })),
        )
        .await
        .unwrap();

    assert_ne!(entity.identifier, forged);
    assert!(!entity.is_deleted);
    assert_eq!(entity.tenant_name.as_deref(), Some("acme"));
    assert_eq!(entity.attribute("status"), Value::from("open"));
    assert_eq!(entity.attribute("total"), Value::Integer(42));
    assert_eq!(entity.attribute("color"), Value::Null);
    assert_eq!(entity.metadata, Some(payload(json!({"source": "import"}))));
    assert_eq!(entity.created_at, entity.updated_at);

    let stored = service
        .get_item(&kind, &Scope::new().tenant("acme"), entity.identifier)
        .await
        .unwrap();
    assert_eq!(stored, Some(entity));
}

#[tokio::test]
async fn test_create_rejects_wrong_type() {
    let service = service();
    let err = service
        .create(
            &order_kind(),
            &Scope::new().tenant("acme"),
            payload(json!({"total": "forty-two"})),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::TypeMismatch(_)));
    assert!(err.is_client_error());
}

#[tokio::test]
async fn test_update_respects_policy() {
    let service = service();
    let kind = order_kind();
    let scope = Scope::new().tenant("acme");
    let created = service
        .create(&kind, &scope, payload(json!({"status": "open", "reference": "R-1"})))
        .await
        .unwrap();

    let updated = service
        .update(
            &kind,
            created.clone(),
            payload(json!({
                "status": "paid",
                "reference": "R-2",
                "created_at": "2000-01-01T00:00:00Z",
                "unknown": 1,
            })),
        )
        .await
        .unwrap();

    assert_eq!(updated.attribute("status"), Value::from("paid"));
    assert_eq!(updated.attribute("reference"), Value::from("R-1"));
    assert_eq!(updated.created_at, created.created_at);
    assert!(updated.updated_at >= created.updated_at);

    let stored = service.get_item(&kind, &scope, created.identifier).await.unwrap().unwrap();
    assert_eq!(stored, updated);
}

#[tokio::test]
async fn test_soft_delete() {
    let service = service();
    let kind = order_kind();
    let scope = Scope::new().tenant("acme");
    let created = service
        .create(&kind, &scope, payload(json!({"status": "open", "total": 7})))
        .await
        .unwrap();

    service.delete(&kind, created.clone()).await.unwrap();

    assert_eq!(service.get_item(&kind, &scope, created.identifier).await.unwrap(), None);
    let (items, total) = service
        .list_and_count(&kind, &scope, PageRequest::default(), &FilterRequest::new())
        .await
        .unwrap();
    assert!(items.is_empty());
    assert_eq!(total, 0);

    let deleted_scope = scope.clone().deleted(true);
    let visible = service
        .get_item(&kind, &deleted_scope, created.identifier)
        .await
        .unwrap()
        .unwrap();
    assert!(visible.is_deleted);

    let raw = service
        .get_by_identifier(&kind, created.identifier)
        .await
        .unwrap()
        .unwrap();
    assert!(raw.is_deleted);
    assert_eq!(raw.fields, created.fields);
    assert_eq!(raw.tenant_name, created.tenant_name);
    assert_eq!(raw.created_at, created.created_at);
    assert_eq!(service.store().document_count("order").await, 1);
}

#[tokio::test]
async fn test_immutable_kind() {
    let service = service();
    let kind = receipt_kind();
    let owner = Uuid::new_v4();
    let scope = Scope::new().tenant("acme").owner(owner);

    let created = service
        .create(&kind, &scope, payload(json!({"amount": 12})))
        .await
        .unwrap();
    assert_eq!(created.attribute("amount"), Value::Float(12.0));
    assert_eq!(created.owner_id, Some(owner));

    let err = service
        .update(&kind, created.clone(), payload(json!({"amount": 99.5})))
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::Immutable(_)));

    let err = service.delete(&kind, created.clone()).await.unwrap_err();
    assert!(matches!(err, DbError::Immutable(_)));

    let stored = service.get_by_identifier(&kind, created.identifier).await.unwrap();
    assert_eq!(stored, Some(created));
}

#[tokio::test]
async fn test_owned_lookup() {
    let service = service();
    let kind = note_kind();
    let owner = Uuid::new_v4();

    let err = service
        .create(&kind, &Scope::new(), payload(json!({"title": "x"})))
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::Validation(_)));

    let note = service
        .create(&kind, &Scope::new().owner(owner), payload(json!({"title": "x"})))
        .await
        .unwrap();

    let err = service.get_item(&kind, &Scope::new(), note.identifier).await.unwrap_err();
    assert!(matches!(err, DbError::Validation(_)));

    let stranger = Scope::new().owner(Uuid::new_v4());
    assert_eq!(service.get_item(&kind, &stranger, note.identifier).await.unwrap(), None);

    let admin = Scope::new().bypass_owner();
    let found = service.get_item(&kind, &admin, note.identifier).await.unwrap();
    assert_eq!(found.map(|n| n.owner_id), Some(Some(owner)));
}

#[tokio::test]
async fn test_restore_through_update() {
    let service = service();
    let kind = order_kind();
    let scope = Scope::new().tenant("acme");
    let created = service.create(&kind, &scope, Payload::new()).await.unwrap();
    let deleted = service.delete(&kind, created).await.unwrap();

    let restored = service
        .update(&kind, deleted, payload(json!({"is_deleted": false})))
        .await
        .unwrap();
    assert!(!restored.is_deleted);
    assert!(service.get_item(&kind, &scope, restored.identifier).await.unwrap().is_some());
}

/// Returns every match twice, as a store with a broken unique index would.
struct DuplicatingStore {
    inner: InMemoryDocumentStore,
}

#[async_trait]
impl DocumentStore for DuplicatingStore {
    async fn insert(&self, kind: &str, entity: Entity) -> entitydb::Result<()> {
        self.inner.insert(kind, entity).await
    }

    async fn replace(&self, kind: &str, entity: Entity) -> entitydb::Result<()> {
        self.inner.replace(kind, entity).await
    }

    async fn find(&self, kind: &str, query: &FindQuery<'_>) -> entitydb::Result<Vec<Entity>> {
        let found = self.inner.find(kind, query).await?;
        Ok(found.iter().chain(found.iter()).cloned().collect())
    }

    async fn count(&self, kind: &str, predicate: &CompiledPredicate) -> entitydb::Result<u64> {
        self.inner.count(kind, predicate).await
    }

    async fn find_by_identifier(
        &self,
        kind: &str,
        identifier: Uuid,
    ) -> entitydb::Result<Option<Entity>> {
        self.inner.find_by_identifier(kind, identifier).await
    }
}

#[tokio::test]
async fn test_ambiguous_lookup_is_integrity_error() {
    let store = Arc::new(DuplicatingStore {
        inner: InMemoryDocumentStore::new(),
    });
    let service = EntityService::new(store, ServiceConfig::default());
    let kind = order_kind();
    let scope = Scope::new().tenant("acme");

    let created = service.create(&kind, &scope, Payload::new()).await.unwrap();
    let err = service.get_item(&kind, &scope, created.identifier).await.unwrap_err();
    assert!(matches!(err, DbError::Integrity(_)));
}

#[tokio::test]
async fn test_service_over_trait_object() {
    let store: Arc<dyn DocumentStore> = Arc::new(InMemoryDocumentStore::new());
    let service = EntityService::new(store, ServiceConfig::default());
    let kind = order_kind();
    let scope = Scope::new().tenant("acme");

    service.create(&kind, &scope, payload(json!({"status": "open"}))).await.unwrap();
    service.create(&kind, &Scope::new().tenant("other"), Payload::new()).await.unwrap();

    assert_eq!(service.count(&kind, &scope, &FilterRequest::new()).await.unwrap(), 1);
}
