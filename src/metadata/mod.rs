//! Entity metadata
//!
//! Declared shapes, explicit configuration, the resolved model, the resolver
//! and the write-once cache.

mod cache;
mod configuration;
mod model;
mod resolver;
mod shape;

pub use cache::MetadataCache;
pub use configuration::{
    EntityConfiguration, EntityTypeBuilder, OwnedEntityBuilder, PropertyBuilder,
    PropertyConfiguration, TableName,
};
pub use model::{
    ConfigurationSource, EntityMetadata, GeneratedPolicy, MappedColumn, OwnedEntity,
    PropertyMetadata,
};
pub(crate) use resolver::Resolver;
pub use resolver::pluralize;
pub use shape::{Entity, EntityShape, MemberAttributes, MemberDescriptor, TableAttribute};
