use crate::core::{DataType, DbError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

pub const IDENTIFIER: &str = "identifier";
pub const CREATED_AT: &str = "created_at";
pub const UPDATED_AT: &str = "updated_at";
pub const IS_DELETED: &str = "is_deleted";
pub const OWNER_ID: &str = "owner_id";
pub const TENANT_NAME: &str = "tenant_name";
pub const METADATA: &str = "metadata";

/// Attribute names managed by the layer itself, never declared by a kind.
pub const SYSTEM_ATTRIBUTES: [&str; 7] = [
    IDENTIFIER,
    CREATED_AT,
    UPDATED_AT,
    IS_DELETED,
    OWNER_ID,
    TENANT_NAME,
    METADATA,
];

/// Suffixes the filter compiler strips to find an operator.
pub const FILTER_SUFFIXES: [&str; 4] = ["_from", "_to", "_in", "_nin"];

/// What a kind can do, resolved once when the kind is built.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Capabilities {
    /// Documents carry an `owner_id`.
    pub owned: bool,
    /// Queries without an owner are rejected unless the scope bypasses ownership.
    pub owner_required: bool,
    /// Documents carry a `tenant_name` and every query must name a tenant.
    pub tenant_scoped: bool,
    /// Updates and deletes are refused.
    pub immutable: bool,
}

impl Capabilities {
    pub fn ensure_mutable(&self, kind: &str, operation: &str) -> Result<()> {
        if self.immutable {
            return Err(DbError::Immutable(format!(
                "{} items cannot be {}",
                kind, operation
            )));
        }
        Ok(())
    }
}

/// Allow-list plus deny-list over attribute names. An empty allow-list admits
/// every name the deny-list does not exclude.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldPolicy {
    allow: BTreeSet<String>,
    deny: BTreeSet<String>,
}

impl FieldPolicy {
    pub fn allows(&self, name: &str) -> bool {
        (self.allow.is_empty() || self.allow.contains(name)) && !self.deny.contains(name)
    }

    pub fn allow_list(&self) -> &BTreeSet<String> {
        &self.allow
    }

    pub fn deny_list(&self) -> &BTreeSet<String> {
        &self.deny
    }

    pub fn is_allow_listed(&self, name: &str) -> bool {
        self.allow.is_empty() || self.allow.contains(name)
    }

    pub fn is_denied(&self, name: &str) -> bool {
        self.deny.contains(name)
    }
}

/// Static descriptor of one entity kind: attributes, capabilities and the
/// field policies for search, create and update.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityKind {
    name: String,
    capabilities: Capabilities,
    attributes: BTreeMap<String, DataType>,
    search: FieldPolicy,
    create: FieldPolicy,
    update: FieldPolicy,
}

impl EntityKind {
    pub fn builder(name: impl Into<String>) -> EntityKindBuilder {
        EntityKindBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    /// Declared (non-system) attributes.
    pub fn fields(&self) -> &BTreeMap<String, DataType> {
        &self.attributes
    }

    /// Type of any recognized attribute, system ones included. `metadata` is
    /// not an attribute in this sense: it is never filterable.
    pub fn attribute_type(&self, name: &str) -> Option<DataType> {
        match name {
            IDENTIFIER => Some(DataType::Uuid),
            OWNER_ID if self.capabilities.owned => Some(DataType::Uuid),
            CREATED_AT | UPDATED_AT => Some(DataType::Timestamp),
            IS_DELETED => Some(DataType::Boolean),
            TENANT_NAME if self.capabilities.tenant_scoped => Some(DataType::Text),
            _ => self.attributes.get(name).copied(),
        }
    }

    /// Scope attributes only travel through a [`Scope`](crate::query::Scope).
    pub fn is_scope_attribute(name: &str) -> bool {
        matches!(name, IS_DELETED | OWNER_ID | TENANT_NAME)
    }

    pub fn search_policy(&self) -> &FieldPolicy {
        &self.search
    }

    pub fn create_policy(&self) -> &FieldPolicy {
        &self.create
    }

    pub fn update_policy(&self) -> &FieldPolicy {
        &self.update
    }
}

#[derive(Debug, Clone)]
pub struct EntityKindBuilder {
    name: String,
    capabilities: Capabilities,
    attributes: Vec<(String, DataType)>,
    search_fields: Vec<String>,
    search_exclude: Vec<String>,
    create_fields: Vec<String>,
    create_exclude: Vec<String>,
    update_fields: Vec<String>,
    update_exclude: Vec<String>,
}

impl EntityKindBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            capabilities: Capabilities::default(),
            attributes: Vec::new(),
            search_fields: Vec::new(),
            search_exclude: Vec::new(),
            create_fields: Vec::new(),
            create_exclude: Vec::new(),
            update_fields: Vec::new(),
            update_exclude: Vec::new(),
        }
    }

    pub fn capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn owned(mut self) -> Self {
        self.capabilities.owned = true;
        self
    }

    /// Owned, and queries must name an owner.
    pub fn owner_required(mut self) -> Self {
        self.capabilities.owned = true;
        self.capabilities.owner_required = true;
        self
    }

    pub fn tenant_scoped(mut self) -> Self {
        self.capabilities.tenant_scoped = true;
        self
    }

    pub fn immutable(mut self) -> Self {
        self.capabilities.immutable = true;
        self
    }

    pub fn field(mut self, name: impl Into<String>, data_type: DataType) -> Self {
        self.attributes.push((name.into(), data_type));
        self
    }

    pub fn searchable<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.search_fields.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn search_exclude<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.search_exclude.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn creatable<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.create_fields.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn create_exclude<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.create_exclude.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn updatable<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.update_fields.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn update_exclude<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.update_exclude.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn build(self) -> Result<EntityKind> {
        if self.name.trim().is_empty() {
            return Err(DbError::Validation("entity kind name cannot be empty".into()));
        }
        if self.capabilities.owner_required && !self.capabilities.owned {
            return Err(DbError::Validation(format!(
                "kind '{}' requires an owner but is not owned",
                self.name
            )));
        }

        let mut attributes = BTreeMap::new();
        for (name, data_type) in self.attributes {
            if SYSTEM_ATTRIBUTES.contains(&name.as_str()) {
                return Err(DbError::Validation(format!(
                    "kind '{}' redeclares system attribute '{}'",
                    self.name, name
                )));
            }
            if FILTER_SUFFIXES.iter().any(|suffix| name.ends_with(suffix)) {
                return Err(DbError::Validation(format!(
                    "attribute '{}' of kind '{}' ends with a filter suffix",
                    name, self.name
                )));
            }
            if attributes.insert(name.clone(), data_type).is_some() {
                return Err(DbError::Validation(format!(
                    "kind '{}' declares attribute '{}' twice",
                    self.name, name
                )));
            }
        }

        let mut kind = EntityKind {
            name: self.name,
            capabilities: self.capabilities,
            attributes,
            search: FieldPolicy::default(),
            create: FieldPolicy::default(),
            update: FieldPolicy::default(),
        };

        let search_deny = self.search_exclude.into_iter().chain([METADATA.to_string()]);
        kind.search = kind.policy(self.search_fields, search_deny)?;

        let create_deny = self.create_exclude.into_iter().chain(
            [IDENTIFIER, CREATED_AT, UPDATED_AT, IS_DELETED, OWNER_ID, TENANT_NAME]
                .map(String::from),
        );
        kind.create = kind.policy(self.create_fields, create_deny)?;

        let update_deny = self.update_exclude.into_iter().chain(
            [IDENTIFIER, CREATED_AT, UPDATED_AT, OWNER_ID, TENANT_NAME].map(String::from),
        );
        kind.update = kind.policy(self.update_fields, update_deny)?;

        Ok(kind)
    }
}

impl EntityKind {
    fn policy(
        &self,
        allow: Vec<String>,
        deny: impl Iterator<Item = String>,
    ) -> Result<FieldPolicy> {
        let allow: BTreeSet<String> = allow.into_iter().collect();
        for name in &allow {
            if self.attribute_type(name).is_none() && name != METADATA {
                return Err(DbError::Validation(format!(
                    "kind '{}' lists unknown attribute '{}'",
                    self.name, name
                )));
            }
        }
        Ok(FieldPolicy {
            allow,
            deny: deny.collect(),
        })
    }
}

/// Serializable form of an [`EntityKind`], used by tooling that loads kinds
/// from JSON.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KindDescriptor {
    pub name: String,
    pub capabilities: Capabilities,
    pub fields: BTreeMap<String, DataType>,
    pub search_fields: Vec<String>,
    pub search_exclude: Vec<String>,
    pub create_fields: Vec<String>,
    pub create_exclude: Vec<String>,
    pub update_fields: Vec<String>,
    pub update_exclude: Vec<String>,
}

impl TryFrom<KindDescriptor> for EntityKind {
    type Error = DbError;

    fn try_from(descriptor: KindDescriptor) -> Result<Self> {
        let mut builder = EntityKind::builder(descriptor.name)
            .capabilities(descriptor.capabilities)
            .searchable(descriptor.search_fields)
            .search_exclude(descriptor.search_exclude)
            .creatable(descriptor.create_fields)
            .create_exclude(descriptor.create_exclude)
            .updatable(descriptor.update_fields)
            .update_exclude(descriptor.update_exclude);
        for (name, data_type) in descriptor.fields {
            builder = builder.field(name, data_type);
        }
        builder.build()
    }
}
