/// Pagination and counting tests
///
/// Window clamping, deterministic ordering and list/count consistency.
/// Run with: cargo test --test pagination_tests

use chrono::{TimeZone, Utc};
use entitydb::{
    DataType, DocumentStore, Entity, EntityKind, EntityService, FilterRequest,
    InMemoryDocumentStore, PageRequest, Scope, ServiceConfig, Value,
};
use std::collections::HashSet;
use std::sync::Arc;

fn item_kind() -> EntityKind {
    EntityKind::builder("item")
        .field("n", DataType::Integer)
        .field("color", DataType::Text)
        .build()
        .unwrap()
}

async fn seeded_service(count: i64) -> EntityService<InMemoryDocumentStore> {
    let store = Arc::new(InMemoryDocumentStore::new());
    let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    for n in 0..count {
        let entity = Entity {
            created_at: base + chrono::Duration::minutes(n),
            updated_at: base + chrono::Duration::minutes(n),
            ..Entity::new()
        }
        .with_field("n", n)
        .with_field("color", if n % 2 == 0 { "red" } else { "blue" });
        store.insert("item", entity).await.unwrap();
    }
    EntityService::new(store, ServiceConfig::default())
}

#[tokio::test]
async fn test_empty_collection() {
    let service = seeded_service(0).await;
    let (items, total) = service
        .list_and_count(&item_kind(), &Scope::new(), PageRequest::default(), &FilterRequest::new())
        .await
        .unwrap();

    assert!(items.is_empty());
    assert_eq!(total, 0);
}

#[tokio::test]
async fn test_limit_and_offset_are_clamped() {
    let service = seeded_service(150).await;
    let kind = item_kind();
    let scope = Scope::new();
    let filters = FilterRequest::new();

    let (items, total) = service
        .list_and_count(&kind, &scope, PageRequest::new(0, 10_000), &filters)
        .await
        .unwrap();
    assert_eq!(items.len(), 100);
    assert_eq!(total, 150);

    let items = service.list(&kind, &scope, PageRequest::new(0, 0), &filters).await.unwrap();
    assert_eq!(items.len(), 1);

    let shifted = service.list(&kind, &scope, PageRequest::new(-5, 3), &filters).await.unwrap();
    let first = service.list(&kind, &scope, PageRequest::new(0, 3), &filters).await.unwrap();
    assert_eq!(shifted, first);

    let defaulted = service.list(&kind, &scope, PageRequest::default(), &filters).await.unwrap();
    assert_eq!(defaulted.len(), 10);
}

#[tokio::test]
async fn test_newest_first() {
    let service = seeded_service(5).await;
    let items = service
        .list(&item_kind(), &Scope::new(), PageRequest::first(5), &FilterRequest::new())
        .await
        .unwrap();

    let ns: Vec<Value> = items.iter().map(|e| e.attribute("n")).collect();
    assert_eq!(ns, [4, 3, 2, 1, 0].map(Value::from));
}

#[tokio::test]
async fn test_pages_tile_on_equal_timestamps() {
    let store = Arc::new(InMemoryDocumentStore::new());
    let stamp = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
    for n in 0..25 {
        let entity = Entity {
            created_at: stamp,
            updated_at: stamp,
            ..Entity::new()
        }
        .with_field("n", n);
        store.insert("item", entity).await.unwrap();
    }
    let service = EntityService::new(store, ServiceConfig::default());
    let kind = item_kind();

    let mut seen = Vec::new();
    for offset in (0..25).step_by(10) {
        let page = service
            .list(&kind, &Scope::new(), PageRequest::new(offset, 10), &FilterRequest::new())
            .await
            .unwrap();
        seen.extend(page.into_iter().map(|e| e.identifier));
    }

    let unique: HashSet<_> = seen.iter().collect();
    assert_eq!(seen.len(), 25);
    assert_eq!(unique.len(), 25);

    let mut sorted = seen.clone();
    sorted.sort();
    assert_eq!(seen, sorted);
}

#[tokio::test]
async fn test_filtered_count_and_page() {
    let service = seeded_service(30).await;
    let kind = item_kind();
    let filters = FilterRequest::new().with("color", "red").with("n_from", 10);

    assert_eq!(service.count(&kind, &Scope::new(), &filters).await.unwrap(), 10);

    let page = service
        .list_page(&kind, &Scope::new(), PageRequest::new(0, 4), &filters)
        .await
        .unwrap();
    assert_eq!(page.total, 10);
    assert_eq!((page.offset, page.limit), (0, 4));
    assert_eq!(page.items.len(), 4);
    assert!(page.has_more());
    assert!(page.items.iter().all(|e| e.attribute("color") == Value::from("red")));

    let stats = service.statistics(&kind, &Scope::new(), &filters).await.unwrap();
    assert_eq!(stats.total, 10);
    assert_eq!(stats.filters, filters);
}

#[tokio::test]
async fn test_configured_ceiling() {
    let store = Arc::new(InMemoryDocumentStore::new());
    for n in 0..20 {
        store.insert("item", Entity::new().with_field("n", n)).await.unwrap();
    }
    let config = ServiceConfig::new().page_max_limit(5).default_page_limit(5);
    let service = EntityService::new(store, config);

    let page = service
        .list_page(&item_kind(), &Scope::new(), PageRequest::new(0, 50), &FilterRequest::new())
        .await
        .unwrap();
    assert_eq!(page.limit, 5);
    assert_eq!(page.items.len(), 5);
    assert_eq!(page.total, 20);
}
