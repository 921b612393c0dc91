use crate::core::Value;
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::{Map, Value as JsonValue};
use uuid::Uuid;

/// Ordered keyword filters as received from a caller.
///
/// Keys are attribute names, optionally suffixed with `_from`, `_to`, `_in`
/// or `_nin`. Values stay loosely typed until compilation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterRequest {
    pairs: Vec<(String, Value)>,
}

impl FilterRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push(key, value);
        self
    }

    pub fn push(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.pairs.push((key.into(), value.into()));
    }

    /// From a decoded JSON object (request body or parsed query), in the
    /// object's key order.
    pub fn from_json_map(map: Map<String, JsonValue>) -> Self {
        map.into_iter()
            .map(|(key, value)| (key, Value::from_json(value)))
            .collect()
    }

    /// From raw `key=value` query pairs; every value stays text.
    pub fn from_query_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        pairs
            .into_iter()
            .map(|(key, value)| (key.into(), Value::Text(value.into())))
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.pairs.iter().map(|(key, value)| (key, value))
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

impl FromIterator<(String, Value)> for FilterRequest {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Self {
            pairs: iter.into_iter().collect(),
        }
    }
}

impl Serialize for FilterRequest {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.pairs.len()))?;
        for (key, value) in &self.pairs {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// Tenant, owner and soft-delete restrictions applied to every query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scope {
    pub owner_id: Option<Uuid>,
    pub tenant_name: Option<String>,
    pub include_deleted: bool,
    /// Administrative bypass of owner-required checks.
    pub ignore_owner: bool,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn owner(mut self, owner_id: Uuid) -> Self {
        self.owner_id = Some(owner_id);
        self
    }

    pub fn tenant(mut self, tenant_name: impl Into<String>) -> Self {
        self.tenant_name = Some(tenant_name.into());
        self
    }

    /// Query logically deleted documents instead of live ones.
    pub fn deleted(mut self, include_deleted: bool) -> Self {
        self.include_deleted = include_deleted;
        self
    }

    pub fn bypass_owner(mut self) -> Self {
        self.ignore_owner = true;
        self
    }
}
