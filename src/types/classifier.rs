//! Type classification and parameter kinds.
//!
//! Decides whether a member maps to a column (scalar), to nothing directly
//! (a sequence of scalars) or to a nested entity (composite), and which
//! database parameter kind a scalar binds as.

use serde::{Deserialize, Serialize};

use super::descriptor::{PrimitiveType, TypeDescriptor, TypeShape};
use super::handler::{TypeHandlerRegistry, well_known_udt};
use crate::error::{Result, StormError};

/// Classification of a member type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeClass {
    /// Maps directly to a column
    Scalar,
    /// `Vec<T>` of a scalar `T` (other than bytes)
    EnumerableOfScalar,
    /// Struct or opaque type without a handler
    Composite,
}

/// Abstract database parameter kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParameterKind {
    Boolean,
    SByte,
    Byte,
    Int16,
    Int32,
    Int64,
    UInt16,
    UInt32,
    UInt64,
    Single,
    Double,
    Decimal,
    String,
    StringFixedLength,
    Guid,
    DateTime,
    DateTimeOffset,
    Date,
    Time,
    Binary,
    /// Opaque value, typically handled by a type handler
    Object,
}

fn primitive_kind(primitive: PrimitiveType) -> ParameterKind {
    match primitive {
        PrimitiveType::Bool => ParameterKind::Boolean,
        PrimitiveType::I8 => ParameterKind::SByte,
        PrimitiveType::I16 => ParameterKind::Int16,
        PrimitiveType::I32 => ParameterKind::Int32,
        PrimitiveType::I64 => ParameterKind::Int64,
        PrimitiveType::U8 => ParameterKind::Byte,
        PrimitiveType::U16 => ParameterKind::UInt16,
        PrimitiveType::U32 => ParameterKind::UInt32,
        PrimitiveType::U64 => ParameterKind::UInt64,
        PrimitiveType::F32 => ParameterKind::Single,
        PrimitiveType::F64 => ParameterKind::Double,
        PrimitiveType::Char => ParameterKind::StringFixedLength,
        PrimitiveType::String => ParameterKind::String,
        PrimitiveType::Decimal => ParameterKind::Decimal,
        PrimitiveType::Uuid => ParameterKind::Guid,
        PrimitiveType::DateTime => ParameterKind::DateTime,
        PrimitiveType::DateTimeOffset => ParameterKind::DateTimeOffset,
        PrimitiveType::Date => ParameterKind::Date,
        PrimitiveType::Time => ParameterKind::Time,
        PrimitiveType::Json => ParameterKind::String,
    }
}

/// True when the type (nullable wrapper removed) maps to a single column.
pub fn is_scalar(ty: &TypeDescriptor, handlers: &TypeHandlerRegistry) -> bool {
    let data = ty.data_type();
    if handlers.contains(data.id()) {
        return true;
    }

    match data.shape() {
        TypeShape::Primitive(_) | TypeShape::Enum => true,
        TypeShape::Sequence(_) => data.is_byte_sequence(),
        _ => false,
    }
}

/// Classify a member type. `None` for sequences of non-scalar elements,
/// which Storm never maps.
pub fn classify(ty: &TypeDescriptor, handlers: &TypeHandlerRegistry) -> Option<TypeClass> {
    if is_scalar(ty, handlers) {
        return Some(TypeClass::Scalar);
    }

    match ty.data_type().shape() {
        TypeShape::Sequence(element) if is_scalar(element, handlers) => {
            Some(TypeClass::EnumerableOfScalar)
        }
        TypeShape::Record(_) | TypeShape::Opaque => Some(TypeClass::Composite),
        _ => None,
    }
}

/// Resolve the parameter kind for a scalar type.
///
/// Unknown types fall back to [`ParameterKind::Object`] unless `demand` is
/// set, in which case they fail with `UnsupportedParameterType`. Well-known
/// spatial and hierarchical provider types get a UDT handler registered on
/// first lookup.
pub fn lookup_parameter_kind(
    ty: &TypeDescriptor,
    member: &str,
    demand: bool,
    handlers: &TypeHandlerRegistry,
) -> Result<ParameterKind> {
    let mut data = ty.data_type();

    if let TypeShape::Sequence(element) = data.shape() {
        if data.is_byte_sequence() {
            return Ok(ParameterKind::Binary);
        }
        data = element.data_type();
    }

    match data.shape() {
        TypeShape::Primitive(primitive) => return Ok(primitive_kind(*primitive)),
        TypeShape::Enum => return Ok(ParameterKind::Int32),
        _ => {}
    }

    if handlers.contains(data.id()) {
        return Ok(ParameterKind::Object);
    }

    if let Some(udt_name) = well_known_udt(data.name()) {
        handlers.register_udt(data, udt_name);
        return Ok(ParameterKind::Object);
    }

    if demand {
        return Err(StormError::UnsupportedParameterType {
            member: member.to_string(),
            type_name: data.name().to_string(),
        });
    }

    Ok(ParameterKind::Object)
}
