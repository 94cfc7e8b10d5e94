//! Property path and type mappings used during compilation.
//!
//! Logical paths are dotted member chains rooted at the predicate subject,
//! e.g. `.Name` or `.Address.City`. The key `"."` holds the default prefix.

use std::any::TypeId;
use std::collections::HashMap;

use crate::metadata::EntityMetadata;

/// Logical property path → physical column reference.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertyMappings {
    entries: HashMap<String, String>,
}

impl PropertyMappings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<String>, column: impl Into<String>) -> &mut Self {
        self.entries.insert(path.into(), column.into());
        self
    }

    /// Prefix applied to unmapped paths, e.g. a table alias
    pub fn with_default_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.entries.insert(".".to_string(), prefix.into());
        self
    }

    pub fn get(&self, path: &str) -> Option<&str> {
        self.entries.get(path).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Mappings for every column of an entity, owned members flattened.
    /// With an alias, columns are qualified and the alias becomes the
    /// default prefix.
    pub fn for_entity(metadata: &EntityMetadata, alias: Option<&str>) -> Self {
        let mut mappings = Self::new();
        for column in metadata.columns() {
            let physical = match alias {
                Some(alias) => format!("{}.{}", alias, column.column),
                None => column.column,
            };
            mappings.insert(column.path, physical);
        }
        if let Some(alias) = alias {
            mappings.insert(".", alias);
        }
        mappings
    }
}

/// Resolve a logical path to its physical column reference.
///
/// Paths that are empty or do not start with `.` are already physical. Other
/// paths use their explicit mapping, else the default prefix, else lose the
/// leading separator.
pub fn map_property_path(mappings: &PropertyMappings, path: &str) -> String {
    if path.is_empty() || !path.starts_with('.') {
        return path.to_string();
    }

    if let Some(column) = mappings.get(path) {
        return column.to_string();
    }

    match mappings.get(".") {
        Some(prefix) => format!("{}{}", prefix, path),
        None => path[1..].to_string(),
    }
}

/// Types whose values are substituted by a fixed SQL fragment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeMappings {
    entries: HashMap<TypeId, String>,
}

impl TypeMappings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<T: 'static>(&mut self, fragment: impl Into<String>) -> &mut Self {
        self.entries.insert(TypeId::of::<T>(), fragment.into());
        self
    }

    pub fn get(&self, type_id: TypeId) -> Option<&str> {
        self.entries.get(&type_id).map(String::as_str)
    }
}
