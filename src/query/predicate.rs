use crate::core::Value;
use crate::entity::Entity;
use crate::entity::kind::{CREATED_AT, IDENTIFIER};
use serde::Serialize;
use std::cmp::Ordering;
use std::fmt;

/// Comparison applied to one attribute.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", content = "value", rename_all = "snake_case")]
pub enum Operator {
    Eq(Value),
    Gte(Value),
    Lte(Value),
    In(Vec<Value>),
    Nin(Vec<Value>),
}

/// One atomic condition of a compiled predicate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Condition {
    pub field: String,
    #[serde(flatten)]
    pub op: Operator,
}

impl Condition {
    pub fn new(field: impl Into<String>, op: Operator) -> Self {
        Self {
            field: field.into(),
            op,
        }
    }

    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, Operator::Eq(value.into()))
    }

    pub fn gte(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, Operator::Gte(value.into()))
    }

    pub fn lte(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, Operator::Lte(value.into()))
    }

    pub fn is_in(field: impl Into<String>, values: Vec<Value>) -> Self {
        Self::new(field, Operator::In(values))
    }

    pub fn not_in(field: impl Into<String>, values: Vec<Value>) -> Self {
        Self::new(field, Operator::Nin(values))
    }

    /// Evaluates the condition against a document. A missing attribute reads
    /// as `Null`, which never satisfies a range bound.
    pub fn matches(&self, entity: &Entity) -> bool {
        let actual = entity.attribute(&self.field);
        match &self.op {
            Operator::Eq(expected) => actual == *expected,
            Operator::Gte(bound) => {
                !actual.is_null()
                    && matches!(actual.compare(bound), Ok(Ordering::Greater | Ordering::Equal))
            }
            Operator::Lte(bound) => {
                !actual.is_null()
                    && matches!(actual.compare(bound), Ok(Ordering::Less | Ordering::Equal))
            }
            Operator::In(values) => values.contains(&actual),
            Operator::Nin(values) => !values.contains(&actual),
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.op {
            Operator::Eq(v) => write!(f, "{} = {}", self.field, v),
            Operator::Gte(v) => write!(f, "{} >= {}", self.field, v),
            Operator::Lte(v) => write!(f, "{} <= {}", self.field, v),
            Operator::In(vs) => write!(f, "{} IN {}", self.field, Value::Array(vs.clone())),
            Operator::Nin(vs) => write!(f, "{} NOT IN {}", self.field, Value::Array(vs.clone())),
        }
    }
}

/// Why a filter key did not make it into the predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    ScopeAttribute,
    NotSearchable,
    Excluded,
    UnknownAttribute,
    InvalidRangeValue,
    Uncoercible,
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            Self::ScopeAttribute => "scope attributes are set through the scope",
            Self::NotSearchable => "attribute is not in the searchable set",
            Self::Excluded => "attribute is excluded from search",
            Self::UnknownAttribute => "unknown attribute",
            Self::InvalidRangeValue => "value cannot bound a range",
            Self::Uncoercible => "value does not match the attribute type",
        };
        write!(f, "{}", reason)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DroppedFilter {
    pub key: String,
    pub reason: DropReason,
}

/// AND-conjunction of conditions, in compilation order, plus the filter keys
/// that were ignored while compiling.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CompiledPredicate {
    conditions: Vec<Condition>,
    dropped: Vec<DroppedFilter>,
}

impl CompiledPredicate {
    pub fn new(conditions: Vec<Condition>, dropped: Vec<DroppedFilter>) -> Self {
        Self { conditions, dropped }
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn dropped(&self) -> &[DroppedFilter] {
        &self.dropped
    }

    pub fn len(&self) -> usize {
        self.conditions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn matches(&self, entity: &Entity) -> bool {
        self.conditions.iter().all(|condition| condition.matches(entity))
    }
}

impl fmt::Display for CompiledPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, condition) in self.conditions.iter().enumerate() {
            if i > 0 {
                write!(f, " AND ")?;
            }
            write!(f, "{}", condition)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SortKey {
    pub field: String,
    pub direction: SortDirection,
}

impl SortKey {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Ascending,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Descending,
        }
    }

    /// Newest first, identifier as the tie-break.
    pub fn default_order() -> Vec<SortKey> {
        vec![SortKey::desc(CREATED_AT), SortKey::asc(IDENTIFIER)]
    }

    /// Lexicographic comparison over a list of keys; incomparable values
    /// count as equal.
    pub fn compare(keys: &[SortKey], a: &Entity, b: &Entity) -> Ordering {
        for key in keys {
            let ordering = a
                .attribute(&key.field)
                .compare(&b.attribute(&key.field))
                .unwrap_or(Ordering::Equal);
            let ordering = match key.direction {
                SortDirection::Ascending => ordering,
                SortDirection::Descending => ordering.reverse(),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }
}
