//! Entity Metadata Resolver
//!
//! Turns a declared [`EntityShape`] plus optional explicit configuration into
//! [`EntityMetadata`]: column names, keys, generation policies, owned
//! entities and the table name. Resolution is pure; caching is the caller's
//! concern.

use tracing::debug;

use super::configuration::{EntityConfiguration, PropertyConfiguration};
use super::model::{
    ConfigurationSource, EntityMetadata, GeneratedPolicy, OwnedEntity, PropertyMetadata,
};
use super::shape::{EntityShape, MemberDescriptor};
use crate::config::StormSettings;
use crate::error::{Result, StormError};
use crate::types::{TypeClass, TypeHandlerRegistry, classify, lookup_parameter_kind};

pub(crate) struct Resolver<'a> {
    settings: &'a StormSettings,
    handlers: &'a TypeHandlerRegistry,
}

impl<'a> Resolver<'a> {
    pub fn new(settings: &'a StormSettings, handlers: &'a TypeHandlerRegistry) -> Self {
        Self { settings, handlers }
    }

    pub fn resolve(
        &self,
        shape: &EntityShape,
        config: Option<&EntityConfiguration>,
    ) -> Result<EntityMetadata> {
        let mut properties = self.resolve_members(shape, config)?;

        if !properties.iter().any(|p| p.is_primary_key && !p.is_ignored) {
            Self::apply_key_convention(shape.name, &mut properties);
        }

        let table_name = self.table_name(shape, config);
        debug!(
            entity = shape.name,
            table = %table_name,
            properties = properties.len(),
            "Resolved entity metadata"
        );

        Ok(EntityMetadata {
            type_id: shape.type_id,
            type_name: shape.name.to_string(),
            table_name,
            properties,
            column_separator: self.settings.owned_column_separator.clone(),
        })
    }

    fn resolve_members(
        &self,
        shape: &EntityShape,
        config: Option<&EntityConfiguration>,
    ) -> Result<Vec<PropertyMetadata>> {
        if let Some(config) = config {
            for name in config.configured_members() {
                if shape.find_member(name).is_none() {
                    return Err(StormError::UnknownMember {
                        entity: shape.name.to_string(),
                        member: name.to_string(),
                    });
                }
            }
        }

        let mut properties = Vec::with_capacity(shape.members.len());
        for member in &shape.members {
            if !member.is_accessible() {
                continue;
            }
            let explicit = config.and_then(|c| c.property(member.name));
            if let Some(property) = self.resolve_member(shape.name, member, explicit)? {
                properties.push(property);
            }
        }
        Ok(properties)
    }

    fn resolve_member(
        &self,
        entity: &str,
        member: &MemberDescriptor,
        explicit: Option<&PropertyConfiguration>,
    ) -> Result<Option<PropertyMetadata>> {
        let owned_requested = explicit.is_some_and(|p| p.owned.is_some()) || member.attributes.owned;

        if owned_requested {
            return self.resolve_owned(entity, member, explicit).map(Some);
        }

        match classify(&member.ty, self.handlers) {
            Some(TypeClass::Scalar) => self.resolve_scalar(entity, member, explicit).map(Some),
            Some(TypeClass::Composite) => {
                // Spatial provider types pick up a handler here
                lookup_parameter_kind(&member.ty, member.name, false, self.handlers)?;
                if self.handlers.contains(member.ty.data_type().id()) {
                    return self.resolve_scalar(entity, member, explicit).map(Some);
                }
                debug!(
                    entity,
                    member = member.name,
                    type_name = member.ty.name(),
                    "Skipping composite member without owned designation or handler"
                );
                Ok(None)
            }
            Some(TypeClass::EnumerableOfScalar) | None => {
                debug!(entity, member = member.name, "Skipping sequence member");
                Ok(None)
            }
        }
    }

    fn column_name(member: &MemberDescriptor, explicit: Option<&PropertyConfiguration>) -> String {
        explicit
            .and_then(|p| p.column.clone())
            .or_else(|| member.attributes.column.map(str::to_string))
            .unwrap_or_else(|| member.name.to_string())
    }

    fn explicit_generation(
        member: &MemberDescriptor,
        explicit: Option<&PropertyConfiguration>,
    ) -> Option<(GeneratedPolicy, ConfigurationSource)> {
        match explicit.and_then(|p| p.generated) {
            Some(policy) => Some((policy, ConfigurationSource::Explicit)),
            None => member
                .attributes
                .generated
                .map(|policy| (policy, ConfigurationSource::Annotation)),
        }
    }

    fn resolve_scalar(
        &self,
        entity: &str,
        member: &MemberDescriptor,
        explicit: Option<&PropertyConfiguration>,
    ) -> Result<PropertyMetadata> {
        let mut property = PropertyMetadata::new(
            member.name,
            member.ty.clone(),
            Self::column_name(member, explicit),
        );
        property.is_ignored = explicit.is_some_and(|p| p.ignored) || member.attributes.not_mapped;
        property.parameter_kind = Some(lookup_parameter_kind(
            &member.ty,
            member.name,
            false,
            self.handlers,
        )?);

        if explicit.is_some_and(|p| p.key) {
            property.mark_key(ConfigurationSource::Explicit);
        } else if member.attributes.key {
            property.mark_key(ConfigurationSource::Annotation);
        }

        match Self::explicit_generation(member, explicit) {
            Some((policy, source)) => property.set_generated(entity, policy, source)?,
            None if property.is_primary_key => property.set_generated(
                entity,
                self.settings.default_key_generation,
                ConfigurationSource::Convention,
            )?,
            None => {}
        }

        Ok(property)
    }

    fn resolve_owned(
        &self,
        entity: &str,
        member: &MemberDescriptor,
        explicit: Option<&PropertyConfiguration>,
    ) -> Result<PropertyMetadata> {
        let record = member.ty.record_shape().ok_or_else(|| {
            StormError::invalid_configuration(
                entity,
                member.name,
                format!("{} is not an entity type and cannot be owned", member.ty.name()),
            )
        })?;

        let is_key = explicit.is_some_and(|p| p.key) || member.attributes.key;
        if is_key {
            return Err(StormError::invalid_configuration(
                entity,
                member.name,
                "an owned property cannot be part of the primary key",
            ));
        }

        let owned_shape = (record.shape)();
        let owned_config = explicit.and_then(|p| p.owned.as_ref());
        let owned = OwnedEntity {
            type_id: owned_shape.type_id,
            type_name: owned_shape.name.to_string(),
            properties: self.resolve_members(&owned_shape, owned_config)?,
        };

        let mut property = PropertyMetadata::new(
            member.name,
            member.ty.clone(),
            Self::column_name(member, explicit),
        );
        property.is_ignored = explicit.is_some_and(|p| p.ignored) || member.attributes.not_mapped;
        property.set_owned(owned);

        if let Some((policy, source)) = Self::explicit_generation(member, explicit) {
            property.set_generated(entity, policy, source)?;
        }

        Ok(property)
    }

    /// Adopt a mapped scalar member named `Id` (any case) as the key.
    ///
    /// Generation was settled while scanning members, so a key found here
    /// keeps whatever its own annotations say (`None` by default).
    fn apply_key_convention(entity: &str, properties: &mut [PropertyMetadata]) {
        let Some(property) = properties
            .iter_mut()
            .find(|p| !p.is_owned() && !p.is_ignored() && p.name.eq_ignore_ascii_case("id"))
        else {
            debug!(entity, "No primary key declared or found by convention");
            return;
        };

        property.mark_key(ConfigurationSource::Convention);
    }

    fn table_name(&self, shape: &EntityShape, config: Option<&EntityConfiguration>) -> String {
        let quote = self.settings.identifier_quote;

        if let Some(table) = config.and_then(|c| c.table.as_ref()) {
            return match &table.schema {
                Some(schema) => format!("{}.{}", quote.quote(schema), quote.quote(&table.name)),
                None => quote.quote(&table.name),
            };
        }

        if let Some(table) = &shape.table {
            return match table.schema {
                Some(schema) => format!("{}.{}", quote.quote(schema), quote.quote(table.name)),
                None => quote.quote(table.name),
            };
        }

        quote.quote(&pluralize(shape.name))
    }
}

/// Table naming convention: `Category` → `Categories`, `Box` → `Boxes`,
/// `Order` → `Orders`.
pub fn pluralize(name: &str) -> String {
    let lower = name.to_ascii_lowercase();
    if let Some(stem) = name.strip_suffix(['y', 'Y']) {
        format!("{}ies", stem)
    } else if lower.ends_with('s') || lower.ends_with('x') {
        format!("{}es", name)
    } else {
        format!("{}s", name)
    }
}
