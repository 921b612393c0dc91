use super::array_param::{dedupe, parse_array_parameter};
use super::filter::{FilterRequest, Scope};
use super::predicate::{CompiledPredicate, Condition, DropReason, DroppedFilter};
use crate::core::{DataType, DbError, Result, Value};
use crate::entity::EntityKind;
use crate::entity::kind::{IDENTIFIER, IS_DELETED, OWNER_ID, TENANT_NAME};
use log::debug;
use uuid::Uuid;

/// How the compiler treats filters it cannot use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CompileMode {
    /// Drop the filter, log it and record it in the predicate.
    #[default]
    Lenient,
    /// Reject the whole request.
    Strict,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Suffix {
    From,
    To,
    In,
    Nin,
}

fn split_suffix(key: &str) -> (&str, Option<Suffix>) {
    if let Some(base) = key.strip_suffix("_from") {
        (base, Some(Suffix::From))
    } else if let Some(base) = key.strip_suffix("_to") {
        (base, Some(Suffix::To))
    } else if let Some(base) = key.strip_suffix("_nin") {
        (base, Some(Suffix::Nin))
    } else if let Some(base) = key.strip_suffix("_in") {
        (base, Some(Suffix::In))
    } else {
        (key, None)
    }
}

/// Null, blank text, and an empty list outside `_in`/`_nin` carry no filter.
fn is_absent(key: &str, value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Text(text) => text.trim().is_empty(),
        Value::Array(items) => {
            items.is_empty() && !matches!(split_suffix(key).1, Some(Suffix::In | Suffix::Nin))
        }
        _ => false,
    }
}

/// Compiles keyword filters into a [`CompiledPredicate`].
///
/// Conditions come out in a fixed order: soft-delete, tenant, owner,
/// identifier, then the caller's filters in request order. Missing mandatory
/// scope is the only error in lenient mode.
#[derive(Debug, Clone, Copy, Default)]
pub struct FilterCompiler {
    mode: CompileMode,
}

impl FilterCompiler {
    pub fn new(mode: CompileMode) -> Self {
        Self { mode }
    }

    pub fn lenient() -> Self {
        Self::new(CompileMode::Lenient)
    }

    pub fn strict() -> Self {
        Self::new(CompileMode::Strict)
    }

    pub fn mode(&self) -> CompileMode {
        self.mode
    }

    pub fn compile(
        &self,
        kind: &EntityKind,
        scope: &Scope,
        identifier: Option<Uuid>,
        filters: &FilterRequest,
    ) -> Result<CompiledPredicate> {
        let capabilities = kind.capabilities();
        let mut conditions = vec![Condition::eq(IS_DELETED, scope.include_deleted)];

        if capabilities.tenant_scoped {
            let tenant = scope.tenant_name.as_deref().ok_or_else(|| {
                DbError::Validation(format!("tenant_name is required for kind '{}'", kind.name()))
            })?;
            conditions.push(Condition::eq(TENANT_NAME, tenant));
        }

        if capabilities.owned {
            match scope.owner_id {
                Some(owner_id) => conditions.push(Condition::eq(OWNER_ID, owner_id)),
                None if capabilities.owner_required && !scope.ignore_owner => {
                    return Err(DbError::Validation(format!(
                        "owner_id is required for kind '{}'",
                        kind.name()
                    )));
                }
                None => {}
            }
        }

        if let Some(identifier) = identifier {
            conditions.push(Condition::eq(IDENTIFIER, identifier));
        }

        let mut dropped = Vec::new();
        for (key, value) in filters.iter() {
            if is_absent(key, value) {
                continue;
            }
            match self.resolve(kind, key, value.clone()) {
                Ok(condition) => conditions.push(condition),
                Err(reason) => {
                    if self.mode == CompileMode::Strict {
                        return Err(DbError::Validation(format!(
                            "filter '{}' rejected for kind '{}': {}",
                            key,
                            kind.name(),
                            reason
                        )));
                    }
                    debug!("dropping filter '{}' for kind '{}': {}", key, kind.name(), reason);
                    dropped.push(DroppedFilter {
                        key: key.clone(),
                        reason,
                    });
                }
            }
        }

        Ok(CompiledPredicate::new(conditions, dropped))
    }

    fn resolve(
        &self,
        kind: &EntityKind,
        key: &str,
        value: Value,
    ) -> std::result::Result<Condition, DropReason> {
        let (base, suffix) = split_suffix(key);

        if EntityKind::is_scope_attribute(base) {
            return Err(DropReason::ScopeAttribute);
        }
        let search = kind.search_policy();
        if !search.is_allow_listed(base) {
            return Err(DropReason::NotSearchable);
        }
        if search.is_denied(base) {
            return Err(DropReason::Excluded);
        }
        let data_type = kind
            .attribute_type(base)
            .ok_or(DropReason::UnknownAttribute)?;

        match suffix {
            Some(bound @ (Suffix::From | Suffix::To)) => {
                if !value.is_range_comparable() {
                    return Err(DropReason::InvalidRangeValue);
                }
                let value = data_type.coerce(value).ok_or(DropReason::Uncoercible)?;
                Ok(if bound == Suffix::From {
                    Condition::gte(base, value)
                } else {
                    Condition::lte(base, value)
                })
            }
            Some(membership @ (Suffix::In | Suffix::Nin)) => {
                let values = self.coerce_all(kind, key, data_type, parse_array_parameter(value))?;
                Ok(if membership == Suffix::In {
                    Condition::is_in(base, values)
                } else {
                    Condition::not_in(base, values)
                })
            }
            None => data_type
                .coerce(value)
                .map(|value| Condition::eq(base, value))
                .ok_or(DropReason::Uncoercible),
        }
    }

    fn coerce_all(
        &self,
        kind: &EntityKind,
        key: &str,
        data_type: DataType,
        values: Vec<Value>,
    ) -> std::result::Result<Vec<Value>, DropReason> {
        let mut coerced = Vec::with_capacity(values.len());
        for value in values {
            match data_type.coerce(value.clone()) {
                Some(value) => coerced.push(value),
                None if self.mode == CompileMode::Strict => return Err(DropReason::Uncoercible),
                None => debug!(
                    "discarding '{}' from filter '{}' for kind '{}': not a {}",
                    value,
                    key,
                    kind.name(),
                    data_type
                ),
            }
        }
        // "1" and "1.0" may coerce to the same value
        Ok(dedupe(coerced))
    }
}
