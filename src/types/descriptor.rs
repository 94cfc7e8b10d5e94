//! Explicit type descriptions.
//!
//! Rust has no runtime reflection, so every type that appears as an entity
//! member describes itself through [`DescribeType`]. A [`TypeDescriptor`]
//! carries the type's identity, its structural shape and an encoder that turns
//! a type-erased reference into a bind [`Value`].

use std::any::{Any, TypeId, type_name};
use std::fmt;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use super::handler::TypeHandlerRegistry;
use super::value::Value;
use crate::error::{Result, StormError};
use crate::metadata::{Entity, EntityShape};

/// Converts a type-erased value of the described type into a bind value.
pub type Encoder = fn(&dyn Any, &TypeHandlerRegistry) -> Result<Value>;

/// Reads a named member off a type-erased record.
pub type MemberReader = for<'a> fn(&'a dyn Any, &str) -> Option<&'a dyn Any>;

/// Unwraps a type-erased nullable value; `None` when the value is absent.
pub type Unwrapper = for<'a> fn(&'a dyn Any) -> Option<&'a dyn Any>;

/// Types with a built-in database mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveType {
    Bool,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
    Char,
    String,
    Decimal,
    Uuid,
    DateTime,
    DateTimeOffset,
    Date,
    Time,
    Json,
}

/// Accessors for a record (struct) type.
#[derive(Clone, Copy)]
pub struct RecordShape {
    pub shape: fn() -> EntityShape,
    pub member: MemberReader,
}

/// Structural shape of a described type.
#[derive(Clone)]
pub enum TypeShape {
    Primitive(PrimitiveType),
    /// Fieldless enum stored by discriminant
    Enum,
    /// `Option<T>`
    Nullable {
        inner: Box<TypeDescriptor>,
        unwrap: Unwrapper,
    },
    /// `Vec<T>`
    Sequence(Box<TypeDescriptor>),
    /// Struct with members of its own
    Record(RecordShape),
    /// Type without members Storm can see (spatial types, wrappers)
    Opaque,
}

/// Runtime description of a Rust type.
#[derive(Clone)]
pub struct TypeDescriptor {
    id: TypeId,
    name: &'static str,
    shape: TypeShape,
    encode: Encoder,
}

impl TypeDescriptor {
    pub fn primitive<T: 'static>(primitive: PrimitiveType, encode: Encoder) -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
            shape: TypeShape::Primitive(primitive),
            encode,
        }
    }

    /// Descriptor for a fieldless enum; used by `#[derive(SqlEnum)]`.
    pub fn enumeration<T: 'static>(name: &'static str, encode: Encoder) -> Self {
        Self {
            id: TypeId::of::<T>(),
            name,
            shape: TypeShape::Enum,
            encode,
        }
    }

    /// Descriptor for an entity-shaped struct; used by `#[derive(Entity)]`.
    pub fn record<T: Entity>(name: &'static str) -> Self {
        Self {
            id: TypeId::of::<T>(),
            name,
            shape: TypeShape::Record(RecordShape {
                shape: T::shape,
                member: read_member::<T>,
            }),
            encode: encode_composite,
        }
    }

    /// Descriptor for a type with no visible members. Such types are only
    /// mappable through a registered type handler.
    pub fn opaque<T: 'static>(name: &'static str, encode: Encoder) -> Self {
        Self {
            id: TypeId::of::<T>(),
            name,
            shape: TypeShape::Opaque,
            encode,
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn shape(&self) -> &TypeShape {
        &self.shape
    }

    pub fn encoder(&self) -> Encoder {
        self.encode
    }

    /// The described type with one nullable wrapper removed.
    pub fn data_type(&self) -> &TypeDescriptor {
        match &self.shape {
            TypeShape::Nullable { inner, .. } => inner.as_ref(),
            _ => self,
        }
    }

    pub fn is_nullable(&self) -> bool {
        matches!(self.shape, TypeShape::Nullable { .. })
    }

    /// True for `Vec<u8>` and `Option<Vec<u8>>`.
    pub fn is_byte_sequence(&self) -> bool {
        match &self.data_type().shape {
            TypeShape::Sequence(element) => {
                matches!(element.shape, TypeShape::Primitive(PrimitiveType::U8))
            }
            _ => false,
        }
    }

    /// Record accessors when the (non-null) type is a struct.
    pub fn record_shape(&self) -> Option<RecordShape> {
        match &self.data_type().shape {
            TypeShape::Record(record) => Some(*record),
            _ => None,
        }
    }

    /// Peel the nullable wrapper off a value of this type.
    pub fn unwrap_value<'a>(&self, value: &'a dyn Any) -> Option<&'a dyn Any> {
        match &self.shape {
            TypeShape::Nullable { unwrap, .. } => unwrap(value),
            _ => Some(value),
        }
    }
}

impl PartialEq for TypeDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeDescriptor {}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shape = match &self.shape {
            TypeShape::Primitive(p) => format!("Primitive({:?})", p),
            TypeShape::Enum => "Enum".to_string(),
            TypeShape::Nullable { inner, .. } => format!("Nullable({})", inner.name),
            TypeShape::Sequence(element) => format!("Sequence({})", element.name),
            TypeShape::Record(_) => "Record".to_string(),
            TypeShape::Opaque => "Opaque".to_string(),
        };
        f.debug_struct("TypeDescriptor")
            .field("name", &self.name)
            .field("shape", &shape)
            .finish()
    }
}

/// Implemented by every type that can appear as an entity member.
pub trait DescribeType: 'static {
    fn describe() -> TypeDescriptor;
}

// ============================================================================
// Encoders
// ============================================================================

fn type_mismatch<T>() -> StormError {
    StormError::handler(type_name::<T>(), "value does not have the described type")
}

/// Encoder for types with a `Value` conversion.
pub fn encode_as<T>(value: &dyn Any, _handlers: &TypeHandlerRegistry) -> Result<Value>
where
    T: Clone + Into<Value> + 'static,
{
    value
        .downcast_ref::<T>()
        .cloned()
        .map(Into::into)
        .ok_or_else(|| type_mismatch::<T>())
}

fn encode_composite(_value: &dyn Any, _handlers: &TypeHandlerRegistry) -> Result<Value> {
    Err(StormError::UnsupportedParameterType {
        member: String::new(),
        type_name: "composite".to_string(),
    })
}

fn encode_option<T: DescribeType>(value: &dyn Any, handlers: &TypeHandlerRegistry) -> Result<Value> {
    match value.downcast_ref::<Option<T>>() {
        Some(Some(inner)) => handlers.encode(&T::describe(), inner),
        Some(None) => Ok(Value::Null),
        None => Err(type_mismatch::<Option<T>>()),
    }
}

fn unwrap_option<'a, T: 'static>(value: &'a dyn Any) -> Option<&'a dyn Any> {
    value
        .downcast_ref::<Option<T>>()?
        .as_ref()
        .map(|inner| inner as &dyn Any)
}

fn encode_sequence<T: DescribeType>(value: &dyn Any, handlers: &TypeHandlerRegistry) -> Result<Value> {
    if let Some(bytes) = value.downcast_ref::<Vec<u8>>() {
        return Ok(Value::Bytes(bytes.clone()));
    }

    let items = value
        .downcast_ref::<Vec<T>>()
        .ok_or_else(|| type_mismatch::<Vec<T>>())?;
    let element = T::describe();
    items
        .iter()
        .map(|item| handlers.encode(&element, item))
        .collect::<Result<Vec<_>>>()
        .map(Value::Array)
}

fn read_member<'a, T: Entity>(value: &'a dyn Any, name: &str) -> Option<&'a dyn Any> {
    value.downcast_ref::<T>()?.member(name)
}

// ============================================================================
// Built-in descriptions
// ============================================================================

macro_rules! describe_primitives {
    ($($ty:ty => $primitive:ident),* $(,)?) => {
        $(
            impl DescribeType for $ty {
                fn describe() -> TypeDescriptor {
                    TypeDescriptor::primitive::<$ty>(PrimitiveType::$primitive, encode_as::<$ty>)
                }
            }
        )*
    };
}

describe_primitives! {
    bool => Bool,
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
    f32 => F32,
    f64 => F64,
    char => Char,
    String => String,
    Decimal => Decimal,
    Uuid => Uuid,
    NaiveDateTime => DateTime,
    DateTime<Utc> => DateTimeOffset,
    DateTime<FixedOffset> => DateTimeOffset,
    NaiveDate => Date,
    NaiveTime => Time,
    serde_json::Value => Json,
}

impl<T: DescribeType> DescribeType for Option<T> {
    fn describe() -> TypeDescriptor {
        TypeDescriptor {
            id: TypeId::of::<Option<T>>(),
            name: type_name::<Option<T>>(),
            shape: TypeShape::Nullable {
                inner: Box::new(T::describe()),
                unwrap: unwrap_option::<T>,
            },
            encode: encode_option::<T>,
        }
    }
}

impl<T: DescribeType> DescribeType for Vec<T> {
    fn describe() -> TypeDescriptor {
        TypeDescriptor {
            id: TypeId::of::<Vec<T>>(),
            name: type_name::<Vec<T>>(),
            shape: TypeShape::Sequence(Box::new(T::describe())),
            encode: encode_sequence::<T>,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nullable_unwraps_to_data_type() {
        let descriptor = <Option<i32>>::describe();
        assert!(descriptor.is_nullable());
        assert_eq!(descriptor.data_type(), &i32::describe());
        assert_eq!(descriptor.data_type().id(), TypeId::of::<i32>());
    }

    #[test]
    fn test_byte_sequence() {
        assert!(<Vec<u8>>::describe().is_byte_sequence());
        assert!(<Option<Vec<u8>>>::describe().is_byte_sequence());
        assert!(!<Vec<i32>>::describe().is_byte_sequence());
    }

    #[test]
    fn test_encoders() {
        let handlers = TypeHandlerRegistry::new();

        let value: Option<i32> = Some(5);
        let descriptor = <Option<i32>>::describe();
        assert_eq!(handlers.encode(&descriptor, &value).unwrap(), Value::Int(5));

        let missing: Option<i32> = None;
        assert_eq!(handlers.encode(&descriptor, &missing).unwrap(), Value::Null);

        let bytes = vec![1u8, 2, 3];
        assert_eq!(
            handlers.encode(&<Vec<u8>>::describe(), &bytes).unwrap(),
            Value::Bytes(vec![1, 2, 3])
        );

        let names = vec!["a".to_string(), "b".to_string()];
        assert_eq!(
            handlers.encode(&<Vec<String>>::describe(), &names).unwrap(),
            Value::Array(vec![Value::from("a"), Value::from("b")])
        );
    }

    #[test]
    fn test_encoder_type_mismatch() {
        let handlers = TypeHandlerRegistry::new();
        let wrong = "text".to_string();
        assert!(handlers.encode(&i64::describe(), &wrong).is_err());
    }

    #[test]
    fn test_unwrap_value() {
        let descriptor = <Option<String>>::describe();
        let present = Some("x".to_string());
        let absent: Option<String> = None;

        let inner = descriptor.unwrap_value(&present).unwrap();
        assert_eq!(inner.downcast_ref::<String>().map(String::as_str), Some("x"));
        assert!(descriptor.unwrap_value(&absent).is_none());
    }
}
