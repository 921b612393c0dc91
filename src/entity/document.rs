use super::kind::{CREATED_AT, IDENTIFIER, IS_DELETED, OWNER_ID, TENANT_NAME, UPDATED_AT};
use crate::core::{Result, Value};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value as JsonValue};
use std::collections::BTreeMap;
use uuid::Uuid;

/// One stored document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Entity {
    pub identifier: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_deleted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, JsonValue>>,
    #[serde(flatten)]
    pub fields: BTreeMap<String, Value>,
}

impl Entity {
    /// Fresh identifier, both timestamps set to now, not deleted.
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            identifier: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
            is_deleted: false,
            owner_id: None,
            tenant_name: None,
            metadata: None,
            fields: BTreeMap::new(),
        }
    }

    pub fn with_owner(mut self, owner_id: Uuid) -> Self {
        self.owner_id = Some(owner_id);
        self
    }

    pub fn with_tenant(mut self, tenant_name: impl Into<String>) -> Self {
        self.tenant_name = Some(tenant_name.into());
        self
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Attribute value by name; `Null` when the document does not carry it.
    pub fn attribute(&self, name: &str) -> Value {
        match name {
            IDENTIFIER => Value::Uuid(self.identifier),
            CREATED_AT => Value::Timestamp(self.created_at),
            UPDATED_AT => Value::Timestamp(self.updated_at),
            IS_DELETED => Value::Boolean(self.is_deleted),
            OWNER_ID => self.owner_id.map(Value::Uuid).unwrap_or(Value::Null),
            TENANT_NAME => self
                .tenant_name
                .clone()
                .map(Value::Text)
                .unwrap_or(Value::Null),
            _ => self.fields.get(name).cloned().unwrap_or(Value::Null),
        }
    }

    /// Refresh `updated_at`, never moving it before `created_at`.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now().max(self.created_at);
    }

    /// True when the entity has not been written for more than `days` days.
    pub fn expired(&self, days: i64) -> bool {
        (Utc::now() - self.updated_at).num_days() > days
    }

    pub fn to_json(&self) -> Result<JsonValue> {
        Ok(serde_json::to_value(self)?)
    }
}

impl Default for Entity {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_attribute_lookup() {
        let owner = Uuid::new_v4();
        let entity = Entity::new()
            .with_owner(owner)
            .with_tenant("acme")
            .with_field("status", "open");

        assert_eq!(entity.attribute("owner_id"), Value::Uuid(owner));
        assert_eq!(entity.attribute("tenant_name"), Value::from("acme"));
        assert_eq!(entity.attribute("status"), Value::from("open"));
        assert_eq!(entity.attribute("is_deleted"), Value::Boolean(false));
        assert_eq!(entity.attribute("missing"), Value::Null);
    }

    #[test]
    fn test_touch_keeps_timestamps_ordered() {
        let mut entity = Entity::new();
        entity.created_at = Utc::now() + Duration::hours(1);
        entity.touch();
        assert!(entity.created_at <= entity.updated_at);
    }

    #[test]
    fn test_expired() {
        let mut entity = Entity::new();
        assert!(!entity.expired(3));
        entity.updated_at = Utc::now() - Duration::days(5);
        assert!(entity.expired(3));
    }

    #[test]
    fn test_serializes_flat_document() {
        let entity = Entity::new().with_tenant("acme").with_field("total", 12.5);
        let json = entity.to_json().unwrap();
        assert_eq!(json["tenant_name"], "acme");
        assert_eq!(json["total"], 12.5);
        assert_eq!(json["is_deleted"], false);
        assert!(json.get("owner_id").is_none());
    }
}
