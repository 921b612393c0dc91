use crate::core::{DbError, Result};
use chrono::{DateTime, NaiveDate, NaiveTime, SecondsFormat, Utc};
use serde::{Serialize, Serializer};
use serde_json::Value as JsonValue;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use uuid::Uuid;

/// A loosely-typed attribute or filter value.
///
/// Filter input arrives as text, numbers, dates or collections; stored
/// attributes are coerced to their declared [`DataType`](crate::core::DataType)
/// before they reach a document.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Integer(i64),
    Float(f64),
    Text(String),
    Boolean(bool),
    Timestamp(DateTime<Utc>),
    Date(NaiveDate),
    Uuid(Uuid),
    Array(Vec<Value>),
    Json(JsonValue),
}

impl Value {
    pub fn compare(&self, other: &Value) -> Result<Ordering> {
        match (self, other) {
            // ========================================
            // NULL handling: NULL is "greater" than all values (NULL LAST)
            // ========================================
            (Value::Null, Value::Null) => Ok(Ordering::Equal),
            (Value::Null, _) => Ok(Ordering::Greater),
            (_, Value::Null) => Ok(Ordering::Less),

            // ========================================
            // Same type comparisons
            // ========================================
            (Value::Integer(a), Value::Integer(b)) => Ok(a.cmp(b)),
            (Value::Float(a), Value::Float(b)) => Ok(compare_floats(*a, *b)),
            (Value::Text(a), Value::Text(b)) => Ok(a.cmp(b)),
            (Value::Boolean(a), Value::Boolean(b)) => Ok(a.cmp(b)),
            (Value::Timestamp(a), Value::Timestamp(b)) => Ok(a.cmp(b)),
            (Value::Date(a), Value::Date(b)) => Ok(a.cmp(b)),
            (Value::Uuid(a), Value::Uuid(b)) => Ok(a.cmp(b)),

            // ========================================
            // Implicit coercion: mixed numerics, dates against timestamps
            // ========================================
            (Value::Integer(a), Value::Float(b)) => Ok(compare_floats(*a as f64, *b)),
            (Value::Float(a), Value::Integer(b)) => Ok(compare_floats(*a, *b as f64)),
            (Value::Date(a), Value::Timestamp(b)) => Ok(start_of_day(a).cmp(b)),
            (Value::Timestamp(a), Value::Date(b)) => Ok(a.cmp(&start_of_day(b))),

            _ => Err(DbError::TypeMismatch(format!(
                "Cannot compare incompatible types: {} and {}",
                self.type_name(),
                other.type_name()
            ))),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "NULL",
            Self::Integer(_) => "INTEGER",
            Self::Float(_) => "FLOAT",
            Self::Text(_) => "TEXT",
            Self::Boolean(_) => "BOOLEAN",
            Self::Timestamp(_) => "TIMESTAMP",
            Self::Date(_) => "DATE",
            Self::Uuid(_) => "UUID",
            Self::Array(_) => "ARRAY",
            Self::Json(_) => "JSON",
        }
    }

    /// Values that may bound a `_from`/`_to` range.
    pub fn is_range_comparable(&self) -> bool {
        matches!(
            self,
            Self::Integer(_) | Self::Float(_) | Self::Text(_) | Self::Timestamp(_) | Self::Date(_)
        )
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            Self::Float(f) => {
                if f.is_finite() && *f >= i64::MIN as f64 && *f <= i64::MAX as f64 {
                    Some(*f as i64)
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Integer(_) | Self::Float(_))
    }

    pub fn from_json(json: JsonValue) -> Self {
        match json {
            JsonValue::Null => Self::Null,
            JsonValue::Bool(b) => Self::Boolean(b),
            JsonValue::Number(n) => match n.as_i64() {
                Some(i) => Self::Integer(i),
                None => n.as_f64().map(Self::Float).unwrap_or(Self::Null),
            },
            JsonValue::String(s) => Self::Text(s),
            JsonValue::Array(items) => Self::Array(items.into_iter().map(Self::from_json).collect()),
            object @ JsonValue::Object(_) => Self::Json(object),
        }
    }

    pub fn to_json(&self) -> JsonValue {
        match self {
            Self::Null => JsonValue::Null,
            Self::Integer(i) => JsonValue::from(*i),
            Self::Float(f) => serde_json::Number::from_f64(*f)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            Self::Text(s) => JsonValue::String(s.clone()),
            Self::Boolean(b) => JsonValue::Bool(*b),
            Self::Timestamp(ts) => JsonValue::String(ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            Self::Date(d) => JsonValue::String(d.format("%Y-%m-%d").to_string()),
            Self::Uuid(u) => JsonValue::String(u.to_string()),
            Self::Array(items) => JsonValue::Array(items.iter().map(Value::to_json).collect()),
            Self::Json(json) => json.clone(),
        }
    }
}

fn compare_floats(a: f64, b: f64) -> Ordering {
    // NaN is equal to NaN and greater than every other value
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
    }
}

pub(crate) fn start_of_day(date: &NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

fn integral(f: f64) -> Option<i64> {
    if f.is_finite() && f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Integer(a), Self::Integer(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b || (a.is_nan() && b.is_nan()),
            // only integral floats equal an integer, matching `hash`
            (Self::Integer(i), Self::Float(f)) | (Self::Float(f), Self::Integer(i)) => {
                integral(*f) == Some(*i)
            }
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::Boolean(a), Self::Boolean(b)) => a == b,
            (Self::Timestamp(a), Self::Timestamp(b)) => a == b,
            (Self::Date(a), Self::Date(b)) => a == b,
            (Self::Uuid(a), Self::Uuid(b)) => a == b,
            (Self::Array(a), Self::Array(b)) => a == b,
            (Self::Json(a), Self::Json(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.compare(other).ok()
    }
}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Self::Null => 0u8.hash(state),
            Self::Integer(i) => {
                1u8.hash(state);
                i.hash(state);
            }
            // integral floats hash like the integer they equal
            Self::Float(f) => match integral(*f) {
                Some(i) => {
                    1u8.hash(state);
                    i.hash(state);
                }
                None if f.is_nan() => {
                    2u8.hash(state);
                    f64::NAN.to_bits().hash(state);
                }
                None => {
                    2u8.hash(state);
                    f.to_bits().hash(state);
                }
            },
            Self::Text(s) => {
                3u8.hash(state);
                s.hash(state);
            }
            Self::Boolean(b) => {
                4u8.hash(state);
                b.hash(state);
            }
            Self::Timestamp(ts) => {
                5u8.hash(state);
                ts.hash(state);
            }
            Self::Date(d) => {
                6u8.hash(state);
                d.hash(state);
            }
            Self::Uuid(u) => {
                7u8.hash(state);
                u.hash(state);
            }
            Self::Array(items) => {
                8u8.hash(state);
                items.hash(state);
            }
            Self::Json(json) => {
                9u8.hash(state);
                json.to_string().hash(state);
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::Integer(i) => write!(f, "{}", i),
            Self::Float(fl) => {
                if fl.is_nan() {
                    write!(f, "NaN")
                } else if fl.is_infinite() {
                    if *fl > 0.0 {
                        write!(f, "Infinity")
                    } else {
                        write!(f, "-Infinity")
                    }
                } else {
                    write!(f, "{}", fl)
                }
            }
            Self::Text(s) => write!(f, "{}", s),
            Self::Boolean(b) => write!(f, "{}", b),
            Self::Timestamp(ts) => write!(f, "{}", ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            Self::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Self::Uuid(u) => write!(f, "{}", u),
            Self::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Self::Json(json) => write!(f, "{}", json),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Integer(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Self::Integer(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(ts: DateTime<Utc>) -> Self {
        Self::Timestamp(ts)
    }
}

impl From<NaiveDate> for Value {
    fn from(d: NaiveDate) -> Self {
        Self::Date(d)
    }
}

impl From<Uuid> for Value {
    fn from(u: Uuid) -> Self {
        Self::Uuid(u)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Self::Array(items.into_iter().map(Into::into).collect())
    }
}

impl From<JsonValue> for Value {
    fn from(json: JsonValue) -> Self {
        Self::from_json(json)
    }
}
