//! Type Classifier
//!
//! Value model, explicit type descriptions, classification into
//! scalar/sequence/composite and the custom type-handler registry.

mod classifier;
mod descriptor;
mod handler;
mod value;

pub use classifier::{ParameterKind, TypeClass, classify, is_scalar, lookup_parameter_kind};
pub use descriptor::{
    DescribeType, Encoder, MemberReader, PrimitiveType, RecordShape, TypeDescriptor, TypeShape,
    Unwrapper, encode_as,
};
pub use handler::{ErasedTypeHandler, TypeHandler, TypeHandlerRegistry, UdtTypeHandler};
pub use value::Value;
