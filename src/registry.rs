//! The shared Storm registry.
//!
//! Owns the settings, the type-handler registry, explicit entity
//! configuration and the metadata cache. Construct one per database and share
//! it (`Arc<Storm>`) across threads; it outlives every compilation.

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::config::StormSettings;
use crate::error::Result;
use crate::metadata::{
    Entity, EntityConfiguration, EntityMetadata, EntityShape, EntityTypeBuilder, MetadataCache,
    Resolver,
};
use crate::predicate::{CompiledPredicate, Expr, PropertyMappings, TypeMappings, compile};
use crate::types::{TypeHandler, TypeHandlerRegistry};

#[derive(Debug, Default)]
pub struct Storm {
    settings: StormSettings,
    handlers: TypeHandlerRegistry,
    configurations: RwLock<HashMap<TypeId, EntityConfiguration>>,
    cache: MetadataCache,
    type_mappings: TypeMappings,
}

impl Storm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_settings(settings: StormSettings) -> Self {
        Self {
            settings,
            ..Self::default()
        }
    }

    pub fn settings(&self) -> &StormSettings {
        &self.settings
    }

    pub fn handlers(&self) -> &TypeHandlerRegistry {
        &self.handlers
    }

    /// Types substituted by fixed SQL fragments in every compiled predicate
    pub fn type_mappings_mut(&mut self) -> &mut TypeMappings {
        &mut self.type_mappings
    }

    /// Register a custom type handler; the first registration for a type wins.
    pub fn register_type_handler<T, H>(&self, handler: H) -> bool
    where
        T: Send + 'static,
        H: TypeHandler<T>,
    {
        self.handlers.register::<T, H>(handler)
    }

    /// Record explicit configuration for `T` and resolve it right away.
    ///
    /// Configuration must precede the first use of `T`; once `T` is cached
    /// later configuration is ignored.
    pub fn configure<T, F>(&self, f: F) -> Result<Arc<EntityMetadata>>
    where
        T: Entity,
        F: FnOnce(&mut EntityTypeBuilder<T>),
    {
        let type_id = TypeId::of::<T>();
        if let Some(cached) = self.cache.get(type_id) {
            warn!(
                entity = %cached.type_name(),
                "Entity already resolved; ignoring late configuration"
            );
            return Ok(cached);
        }

        let existing = self.configurations.read().get(&type_id).cloned();
        let mut builder = EntityTypeBuilder::<T>::new(existing.unwrap_or_default());
        f(&mut builder);
        self.configurations.write().insert(type_id, builder.build());
        debug!(entity = std::any::type_name::<T>(), "Registered entity configuration");

        self.resolve::<T>()
    }

    /// Metadata for `T`, resolved on first use and cached thereafter.
    pub fn resolve<T: Entity>(&self) -> Result<Arc<EntityMetadata>> {
        if let Some(cached) = self.cache.get(TypeId::of::<T>()) {
            return Ok(cached);
        }
        self.resolve_shape(&T::shape())
    }

    /// Resolve a hand-built shape through the same cache.
    pub fn resolve_shape(&self, shape: &EntityShape) -> Result<Arc<EntityMetadata>> {
        if let Some(cached) = self.cache.get(shape.type_id) {
            return Ok(cached);
        }

        let config = self.configurations.read().get(&shape.type_id).cloned();
        let metadata = Resolver::new(&self.settings, &self.handlers).resolve(shape, config.as_ref())?;
        Ok(self.cache.publish(metadata))
    }

    pub fn table_name<T: Entity>(&self) -> Result<String> {
        Ok(self.resolve::<T>()?.table_name().to_string())
    }

    /// Compile with caller-supplied path mappings.
    pub fn compile(&self, predicate: &Expr, mappings: &PropertyMappings) -> CompiledPredicate {
        compile(predicate, mappings, &self.type_mappings)
    }

    /// Compile against `T`'s columns, optionally qualified by a table alias.
    pub fn compile_for<T: Entity>(
        &self,
        predicate: &Expr,
        alias: Option<&str>,
    ) -> Result<CompiledPredicate> {
        let metadata = self.resolve::<T>()?;
        let mappings = PropertyMappings::for_entity(&metadata, alias);
        Ok(compile(predicate, &mappings, &self.type_mappings))
    }
}
