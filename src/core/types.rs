use super::Value;
use super::value::start_of_day;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Declared type of an entity attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    Integer,
    Float,
    Text,
    Boolean,
    Timestamp,
    Date,
    Uuid,
    /// Unchecked: arrays, nested objects, anything JSON can carry.
    Any,
}

impl DataType {
    pub fn is_compatible(&self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) => true,
            (Self::Any, _) => true,
            (Self::Integer, Value::Integer(_)) => true,
            (Self::Float, Value::Float(_)) => true,
            (Self::Float, Value::Integer(_)) => true,
            (Self::Text, Value::Text(_)) => true,
            (Self::Boolean, Value::Boolean(_)) => true,
            (Self::Timestamp, Value::Timestamp(_)) => true,
            (Self::Date, Value::Date(_)) => true,
            (Self::Uuid, Value::Uuid(_)) => true,
            _ => false,
        }
    }

    /// Converts loosely-typed input to this type.
    ///
    /// Query strings deliver everything as text, so text is parsed into
    /// numbers, booleans, UUIDs, dates and timestamps. Returns `None` when
    /// the value cannot represent this type.
    pub fn coerce(&self, value: Value) -> Option<Value> {
        if self.is_compatible(&value) {
            return Some(match (self, value) {
                (Self::Float, Value::Integer(i)) => Value::Float(i as f64),
                (_, v) => v,
            });
        }

        match (self, value) {
            (Self::Integer, Value::Float(f)) => {
                if f.fract() == 0.0 {
                    Value::Float(f).as_i64().map(Value::Integer)
                } else {
                    None
                }
            }
            (Self::Integer, Value::Text(s)) => s.trim().parse::<i64>().ok().map(Value::Integer),
            (Self::Float, Value::Text(s)) => s.trim().parse::<f64>().ok().map(Value::Float),
            (Self::Boolean, Value::Text(s)) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" => Some(Value::Boolean(true)),
                "false" | "0" => Some(Value::Boolean(false)),
                _ => None,
            },
            (Self::Boolean, Value::Integer(i)) => match i {
                0 => Some(Value::Boolean(false)),
                1 => Some(Value::Boolean(true)),
                _ => None,
            },
            (Self::Uuid, Value::Text(s)) => Uuid::parse_str(s.trim()).ok().map(Value::Uuid),
            (Self::Timestamp, Value::Date(d)) => Some(Value::Timestamp(start_of_day(&d))),
            (Self::Timestamp, Value::Text(s)) => parse_timestamp(s.trim()).map(Value::Timestamp),
            (Self::Date, Value::Timestamp(ts)) => Some(Value::Date(ts.date_naive())),
            (Self::Date, Value::Text(s)) => parse_date(s.trim()).map(Value::Date),
            _ => None,
        }
    }
}

fn parse_date(text: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(text, "%Y-%m-%d").ok()
}

fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
        return Some(ts.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Some(naive.and_utc());
        }
    }
    parse_date(text).map(|d| start_of_day(&d))
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer => write!(f, "INTEGER"),
            Self::Float => write!(f, "FLOAT"),
            Self::Text => write!(f, "TEXT"),
            Self::Boolean => write!(f, "BOOLEAN"),
            Self::Timestamp => write!(f, "TIMESTAMP"),
            Self::Date => write!(f, "DATE"),
            Self::Uuid => write!(f, "UUID"),
            Self::Any => write!(f, "ANY"),
        }
    }
}
