//! Parameter values handed to the database layer.
//!
//! `Value` is the bind-side representation of every scalar Storm can map.
//! Enum values travel as [`Value::Enum`] until they are bound, at which point
//! they are coerced to their integer form.

use std::fmt;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Represents a SQL value that can be bound to a command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Decimal(Decimal),
    Text(String),
    Uuid(Uuid),
    DateTime(NaiveDateTime),
    DateTimeOffset(DateTime<FixedOffset>),
    Date(NaiveDate),
    Time(NaiveTime),
    Bytes(Vec<u8>),
    Json(serde_json::Value),
    /// Enum member with its discriminant
    Enum { type_name: String, value: i64 },
    /// Array-valued parameter (membership tests)
    Array(Vec<Value>),
    /// User-defined database type (geometry, geography, hierarchyid)
    Udt { udt_name: String, value: Box<Value> },
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Coerce to the form handed to the database: enums become integers,
    /// recursively through arrays.
    pub fn into_parameter(self) -> Value {
        match self {
            Value::Enum { value, .. } => Value::Int(value),
            Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::into_parameter).collect())
            }
            other => other,
        }
    }

    /// Elements of an array value; a scalar is a one-element sequence and
    /// `Null` is empty.
    pub fn into_elements(self) -> Vec<Value> {
        match self {
            Value::Array(items) => items,
            Value::Null => Vec::new(),
            other => vec![other],
        }
    }

    /// SQL literal rendering for values that can be inlined safely.
    pub fn to_sql_literal(&self) -> Option<String> {
        match self {
            Value::Bool(b) => Some(if *b { "1" } else { "0" }.to_string()),
            Value::Int(i) => Some(i.to_string()),
            Value::UInt(u) => Some(u.to_string()),
            Value::Float(f) if f.is_finite() => Some(f.to_string()),
            Value::Decimal(d) => Some(d.to_string()),
            Value::Enum { value, .. } => Some(value.to_string()),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::UInt(u) => write!(f, "{}", u),
            Value::Float(v) => write!(f, "{}", v),
            Value::Decimal(d) => write!(f, "{}", d),
            Value::Text(s) => f.write_str(s),
            Value::Uuid(u) => write!(f, "{}", u),
            Value::DateTime(dt) => write!(f, "{}", dt),
            Value::DateTimeOffset(dt) => write!(f, "{}", dt.to_rfc3339()),
            Value::Date(d) => write!(f, "{}", d),
            Value::Time(t) => write!(f, "{}", t),
            Value::Bytes(bytes) => {
                for byte in bytes {
                    write!(f, "{:02x}", byte)?;
                }
                Ok(())
            }
            Value::Json(json) => write!(f, "{}", json),
            Value::Enum { value, .. } => write!(f, "{}", value),
            Value::Array(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{}", item)?;
                }
                Ok(())
            }
            Value::Udt { value, .. } => write!(f, "{}", value),
        }
    }
}

// ============================================================================
// Conversions
// ============================================================================

macro_rules! value_from {
    ($($ty:ty => |$v:ident| $body:expr),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from($v: $ty) -> Self {
                    $body
                }
            }
        )*
    };
}

value_from! {
    bool => |v| Value::Bool(v),
    i8 => |v| Value::Int(i64::from(v)),
    i16 => |v| Value::Int(i64::from(v)),
    i32 => |v| Value::Int(i64::from(v)),
    i64 => |v| Value::Int(v),
    u8 => |v| Value::UInt(u64::from(v)),
    u16 => |v| Value::UInt(u64::from(v)),
    u32 => |v| Value::UInt(u64::from(v)),
    u64 => |v| Value::UInt(v),
    f32 => |v| Value::Float(f64::from(v)),
    f64 => |v| Value::Float(v),
    char => |v| Value::Text(v.to_string()),
    String => |v| Value::Text(v),
    &str => |v| Value::Text(v.to_string()),
    Decimal => |v| Value::Decimal(v),
    Uuid => |v| Value::Uuid(v),
    NaiveDateTime => |v| Value::DateTime(v),
    DateTime<Utc> => |v| Value::DateTimeOffset(v.fixed_offset()),
    DateTime<FixedOffset> => |v| Value::DateTimeOffset(v),
    NaiveDate => |v| Value::Date(v),
    NaiveTime => |v| Value::Time(v),
    serde_json::Value => |v| Value::Json(v),
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(values: Vec<T>) -> Self {
        Value::Array(values.into_iter().map(Into::into).collect())
    }
}
