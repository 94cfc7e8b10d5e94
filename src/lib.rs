//! Storm - a micro ORM
//!
//! Compiles typed predicate trees into parameterized SQL and resolves entity
//! metadata (tables, columns, keys, owned entities) once per type.
//!
//! ```ignore
//! use storm::{Entity, Expr, Storm};
//!
//! #[derive(Entity)]
//! pub struct Category {
//!     pub id: i32,
//!     pub name: String,
//! }
//!
//! let storm = Storm::new();
//! let filter = Expr::subject::<Category>()
//!     .member::<String>("name")
//!     .starts_with(Expr::constant("Book"));
//! let command = storm.select::<Category>(Some(&filter))?;
//! // SELECT id, name FROM [Categories] WHERE (name LIKE @p0)
//! ```

extern crate self as storm;

pub mod commands;
pub mod config;
pub mod error;
pub mod metadata;
pub mod predicate;
pub mod types;

mod registry;

pub use commands::{CommandDefinition, inline_literals};
pub use config::{IdentifierQuote, StormSettings};
pub use error::{Result, StormError};
pub use metadata::{
    Entity, EntityMetadata, EntityShape, EntityTypeBuilder, GeneratedPolicy, MemberDescriptor,
    OwnedEntity, PropertyMetadata,
};
pub use predicate::{CompiledPredicate, Expr, PropertyMappings, TypeMappings, map_property_path};
pub use registry::Storm;
pub use types::{DescribeType, TypeDescriptor, TypeHandler, Value};

/// Derive [`Entity`] and [`DescribeType`] for a struct.
pub use storm_macros::Entity;
/// Derive [`DescribeType`] and `From<E> for Value` for a fieldless enum.
pub use storm_macros::SqlEnum;
