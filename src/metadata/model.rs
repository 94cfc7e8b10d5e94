//! Entity Metadata Model
//!
//! The resolved, immutable description of one entity type. Built once by the
//! resolver and shared through the metadata cache.

use std::any::TypeId;

use serde::{Deserialize, Serialize};

use crate::error::{Result, StormError};
use crate::types::{ParameterKind, TypeDescriptor};

/// When a column's value is produced by the database.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeneratedPolicy {
    /// Always supplied by the caller
    #[default]
    None,
    /// Produced by the database on insert (identity columns)
    OnInsert,
    /// Produced on insert and on every update (computed columns)
    OnInsertAndUpdate,
}

impl GeneratedPolicy {
    pub(crate) fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "none" => Some(GeneratedPolicy::None),
            "on_insert" => Some(GeneratedPolicy::OnInsert),
            "on_insert_and_update" | "computed" => Some(GeneratedPolicy::OnInsertAndUpdate),
            _ => None,
        }
    }

    pub fn is_generated(&self) -> bool {
        !matches!(self, GeneratedPolicy::None)
    }
}

/// Where a resolved fact came from. Explicit facts win over annotations,
/// annotations over conventions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigurationSource {
    Explicit,
    Annotation,
    Convention,
}

/// A value object embedded in its parent's table.
#[derive(Debug, Clone)]
pub struct OwnedEntity {
    pub(crate) type_id: TypeId,
    pub(crate) type_name: String,
    pub(crate) properties: Vec<PropertyMetadata>,
}

impl OwnedEntity {
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn properties(&self) -> &[PropertyMetadata] {
        &self.properties
    }
}

/// One mapped member of an entity.
#[derive(Debug, Clone)]
pub struct PropertyMetadata {
    pub(crate) name: String,
    pub(crate) declared_type: TypeDescriptor,
    pub(crate) column_name: String,
    pub(crate) is_primary_key: bool,
    pub(crate) key_source: Option<ConfigurationSource>,
    pub(crate) generated: GeneratedPolicy,
    pub(crate) generated_source: Option<ConfigurationSource>,
    pub(crate) owned: Option<Box<OwnedEntity>>,
    pub(crate) is_ignored: bool,
    pub(crate) parameter_kind: Option<ParameterKind>,
}

impl PropertyMetadata {
    pub(crate) fn new(name: &str, declared_type: TypeDescriptor, column_name: String) -> Self {
        Self {
            name: name.to_string(),
            declared_type,
            column_name,
            is_primary_key: false,
            key_source: None,
            generated: GeneratedPolicy::None,
            generated_source: None,
            owned: None,
            is_ignored: false,
            parameter_kind: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn declared_type(&self) -> &TypeDescriptor {
        &self.declared_type
    }

    pub fn column_name(&self) -> &str {
        &self.column_name
    }

    pub fn is_primary_key(&self) -> bool {
        self.is_primary_key
    }

    pub fn key_source(&self) -> Option<ConfigurationSource> {
        self.key_source
    }

    pub fn generated(&self) -> GeneratedPolicy {
        self.generated
    }

    pub fn is_owned(&self) -> bool {
        self.owned.is_some()
    }

    pub fn owned_entity(&self) -> Option<&OwnedEntity> {
        self.owned.as_deref()
    }

    pub fn is_ignored(&self) -> bool {
        self.is_ignored
    }

    /// Parameter kind of scalar columns; `None` for owned properties
    pub fn parameter_kind(&self) -> Option<ParameterKind> {
        self.parameter_kind
    }

    pub(crate) fn mark_key(&mut self, source: ConfigurationSource) {
        self.is_primary_key = true;
        self.key_source = Some(source);
    }

    /// Attach an owned entity. Owned properties are never generated.
    pub(crate) fn set_owned(&mut self, owned: OwnedEntity) {
        self.generated = GeneratedPolicy::None;
        self.generated_source = None;
        self.owned = Some(Box::new(owned));
    }

    pub(crate) fn set_generated(
        &mut self,
        entity: &str,
        policy: GeneratedPolicy,
        source: ConfigurationSource,
    ) -> Result<()> {
        if self.owned.is_some() && policy.is_generated() {
            return Err(StormError::invalid_configuration(
                entity,
                &self.name,
                "an owned property cannot be auto-generated",
            ));
        }
        self.generated = policy;
        self.generated_source = Some(source);
        Ok(())
    }
}

/// A flattened, insertable column: a scalar property, possibly reached
/// through a chain of owned properties.
#[derive(Debug, Clone)]
pub struct MappedColumn<'a> {
    /// Owned properties walked from the entity root, outermost first
    pub owners: Vec<&'a PropertyMetadata>,
    pub property: &'a PropertyMetadata,
    /// Physical column name, prefixed by the owners' names
    pub column: String,
    /// Parameter name, prefixed the same way
    pub parameter: String,
    /// Logical property path, e.g. `.Address.City`
    pub path: String,
}

/// Resolved metadata for one entity type.
#[derive(Debug, Clone)]
pub struct EntityMetadata {
    pub(crate) type_id: TypeId,
    pub(crate) type_name: String,
    pub(crate) table_name: String,
    pub(crate) properties: Vec<PropertyMetadata>,
    pub(crate) column_separator: String,
}

impl EntityMetadata {
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Quoted table name, e.g. `[dbo].[People]`
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Properties in declaration order, ignored ones included
    pub fn properties(&self) -> &[PropertyMetadata] {
        &self.properties
    }

    pub fn property(&self, name: &str) -> Option<&PropertyMetadata> {
        self.properties.iter().find(|p| p.name == name)
    }

    /// Mapped key properties; an ignored key never reaches SQL.
    pub fn primary_keys(&self) -> impl Iterator<Item = &PropertyMetadata> {
        self.properties
            .iter()
            .filter(|p| p.is_primary_key && !p.is_ignored)
    }

    pub fn has_primary_key(&self) -> bool {
        self.primary_keys().next().is_some()
    }

    /// True when any key column is produced by the database
    pub fn has_auto_generated_key(&self) -> bool {
        self.primary_keys().any(|p| p.generated.is_generated())
    }

    /// Fail with `MissingPrimaryKey` unless at least one key exists.
    pub fn require_primary_key(&self, operation: &str) -> Result<()> {
        if self.has_primary_key() {
            Ok(())
        } else {
            Err(StormError::MissingPrimaryKey {
                entity: self.type_name.clone(),
                operation: operation.to_string(),
            })
        }
    }

    /// All mapped columns with owned entities flattened, ignored members
    /// left out.
    pub fn columns(&self) -> Vec<MappedColumn<'_>> {
        let mut columns = Vec::new();
        flatten(
            &self.properties,
            &mut Vec::new(),
            &self.column_separator,
            &mut columns,
        );
        columns
    }
}

fn flatten<'a>(
    properties: &'a [PropertyMetadata],
    owners: &mut Vec<&'a PropertyMetadata>,
    separator: &str,
    out: &mut Vec<MappedColumn<'a>>,
) {
    for property in properties.iter().filter(|p| !p.is_ignored) {
        if let Some(owned) = property.owned_entity() {
            owners.push(property);
            flatten(&owned.properties, owners, separator, out);
            owners.pop();
            continue;
        }

        let mut column = String::new();
        let mut parameter = String::new();
        let mut path = String::new();
        for owner in owners.iter() {
            column.push_str(&owner.name);
            column.push_str(separator);
            parameter.push_str(&owner.name);
            parameter.push_str(separator);
            path.push('.');
            path.push_str(&owner.name);
        }
        column.push_str(&property.column_name);
        parameter.push_str(&property.name);
        path.push('.');
        path.push_str(&property.name);

        out.push(MappedColumn {
            owners: owners.clone(),
            property,
            column,
            parameter,
            path,
        });
    }
}
