//! Property values held by entity instances

use super::entity::{Entity, SerializeMode};
use chrono::{DateTime, FixedOffset, Utc};
use rust_decimal::Decimal;
use serde_json::json;

/// Wire format for DateTime values in JSON bodies: UTC, millisecond precision, no zone suffix
pub const JSON_DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f";

#[derive(Debug, Clone)]
pub enum Value {
    Null,
    String(String),
    Int(i64),
    Decimal(Decimal),
    Double(f64),
    Bool(bool),
    DateTime(DateTime<FixedOffset>),
    /// A complex value or a single related entity
    Entity(Entity),
    /// A collection navigation property
    Entities(Vec<Entity>),
    /// `Collection(T)` of primitives or complex values
    List(Vec<Value>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            Value::Decimal(d) => Some(*d),
            Value::Int(i) => Some(Decimal::from(*i)),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Double(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<&DateTime<FixedOffset>> {
        match self {
            Value::DateTime(dt) => Some(dt),
            _ => None,
        }
    }

    pub fn as_entity(&self) -> Option<&Entity> {
        match self {
            Value::Entity(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_entities(&self) -> Option<&[Entity]> {
        match self {
            Value::Entities(entities) => Some(entities),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(values) => Some(values),
            _ => None,
        }
    }

    /// OData URI literal: integers bare, strings quoted with `'` doubled
    pub fn to_literal(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::String(s) => format!("'{}'", s.replace('\'', "''")),
            Value::Int(i) => i.to_string(),
            Value::Decimal(d) => format!("{}M", d),
            Value::Double(f) => format!("{}", f),
            Value::Bool(b) => b.to_string(),
            Value::DateTime(dt) => format!(
                "datetime'{}'",
                dt.with_timezone(&Utc).format("%Y-%m-%dT%H:%M:%S")
            ),
            Value::Entity(e) => e.uri().unwrap_or_default(),
            Value::Entities(_) | Value::List(_) => String::new(),
        }
    }

    pub(crate) fn to_json(&self, mode: SerializeMode) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::String(s) => json!(s),
            Value::Int(i) => json!(i),
            Value::Decimal(d) => json!(d.to_string()),
            Value::Double(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Bool(b) => json!(b),
            Value::DateTime(dt) => {
                json!(dt.with_timezone(&Utc).format(JSON_DATETIME_FORMAT).to_string())
            }
            Value::Entity(e) => e.to_json(mode),
            Value::Entities(entities) => serde_json::Value::Array(
                entities.iter().map(|e| e.to_json(mode)).collect(),
            ),
            Value::List(values) => {
                serde_json::Value::Array(values.iter().map(|v| v.to_json(mode)).collect())
            }
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Decimal(a), Value::Decimal(b)) => a == b,
            (Value::Double(a), Value::Double(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::DateTime(a), Value::DateTime(b)) => a == b,
            (Value::Entity(a), Value::Entity(b)) => a.ptr_eq(b),
            (Value::Entities(a), Value::Entities(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.ptr_eq(y))
            }
            (Value::List(a), Value::List(b)) => a == b,
            _ => false,
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(value as i64)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Double(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<Decimal> for Value {
    fn from(value: Decimal) -> Self {
        Value::Decimal(value)
    }
}

impl From<DateTime<FixedOffset>> for Value {
    fn from(value: DateTime<FixedOffset>) -> Self {
        Value::DateTime(value)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(value: DateTime<Utc>) -> Self {
        Value::DateTime(value.fixed_offset())
    }
}

impl From<Entity> for Value {
    fn from(value: Entity) -> Self {
        Value::Entity(value)
    }
}

impl From<Vec<Entity>> for Value {
    fn from(value: Vec<Entity>) -> Self {
        Value::Entities(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}
