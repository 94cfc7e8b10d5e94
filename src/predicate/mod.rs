//! Predicate compilation
//!
//! Predicate trees in, `(sql, parameters)` out.

mod compiler;
mod expr;
mod mapping;

pub use compiler::{CompilationContext, CompiledPredicate, compile};
pub use expr::{BinaryOp, Captured, Expr, StringMethod};
pub use mapping::{PropertyMappings, TypeMappings, map_property_path};
