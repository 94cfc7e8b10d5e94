//! Fluent entity configuration.
//!
//! Explicit facts registered here are authoritative over annotations and
//! conventions. Member names are checked against the entity's shape when the
//! entity is resolved.

use std::collections::HashMap;
use std::marker::PhantomData;

use super::model::GeneratedPolicy;
use super::shape::Entity;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableName {
    pub name: String,
    pub schema: Option<String>,
}

/// Explicit configuration of one member.
#[derive(Debug, Clone, Default)]
pub struct PropertyConfiguration {
    pub column: Option<String>,
    pub key: bool,
    pub generated: Option<GeneratedPolicy>,
    pub owned: Option<EntityConfiguration>,
    pub ignored: bool,
}

/// Explicit configuration of an entity or owned entity.
#[derive(Debug, Clone, Default)]
pub struct EntityConfiguration {
    pub table: Option<TableName>,
    pub properties: HashMap<String, PropertyConfiguration>,
}

impl EntityConfiguration {
    pub fn property(&self, name: &str) -> Option<&PropertyConfiguration> {
        self.properties.get(name)
    }

    fn property_mut(&mut self, name: &str) -> &mut PropertyConfiguration {
        self.properties.entry(name.to_string()).or_default()
    }

    /// Names with explicit configuration, sorted for stable error reporting
    pub(crate) fn configured_members(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.properties.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// Builder passed to [`Storm::configure`](crate::Storm::configure).
///
/// ```ignore
/// storm.configure::<Person>(|b| {
///     b.to_table("People")
///         .has_key(&["id"])
///         .owns_one("address", |a| {
///             a.property("city").has_column_name("Town");
///         });
///     b.property("name").has_column_name("FullName");
/// })?;
/// ```
pub struct EntityTypeBuilder<T> {
    config: EntityConfiguration,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Entity> EntityTypeBuilder<T> {
    pub(crate) fn new(config: EntityConfiguration) -> Self {
        Self {
            config,
            _marker: PhantomData,
        }
    }

    pub(crate) fn build(self) -> EntityConfiguration {
        self.config
    }

    pub fn to_table(&mut self, name: &str) -> &mut Self {
        self.config.table = Some(TableName {
            name: name.to_string(),
            schema: None,
        });
        self
    }

    pub fn to_table_in_schema(&mut self, schema: &str, name: &str) -> &mut Self {
        self.config.table = Some(TableName {
            name: name.to_string(),
            schema: Some(schema.to_string()),
        });
        self
    }

    /// Declare the key members; suppresses the `Id` convention.
    pub fn has_key(&mut self, members: &[&str]) -> &mut Self {
        for member in members {
            self.config.property_mut(member).key = true;
        }
        self
    }

    pub fn property(&mut self, name: &str) -> PropertyBuilder<'_> {
        PropertyBuilder {
            config: self.config.property_mut(name),
        }
    }

    pub fn ignore(&mut self, name: &str) -> &mut Self {
        self.config.property_mut(name).ignored = true;
        self
    }

    /// Map a struct-typed member inline, configuring its members through `f`.
    pub fn owns_one<F>(&mut self, name: &str, f: F) -> &mut Self
    where
        F: FnOnce(&mut OwnedEntityBuilder<'_>),
    {
        let property = self.config.property_mut(name);
        let owned = property.owned.get_or_insert_with(EntityConfiguration::default);
        f(&mut OwnedEntityBuilder { config: owned });
        self
    }
}

/// Configuration of the members of an owned entity.
pub struct OwnedEntityBuilder<'a> {
    config: &'a mut EntityConfiguration,
}

impl OwnedEntityBuilder<'_> {
    pub fn property(&mut self, name: &str) -> PropertyBuilder<'_> {
        PropertyBuilder {
            config: self.config.property_mut(name),
        }
    }

    pub fn ignore(&mut self, name: &str) -> &mut Self {
        self.config.property_mut(name).ignored = true;
        self
    }

    pub fn owns_one<F>(&mut self, name: &str, f: F) -> &mut Self
    where
        F: FnOnce(&mut OwnedEntityBuilder<'_>),
    {
        let property = self.config.property_mut(name);
        let owned = property.owned.get_or_insert_with(EntityConfiguration::default);
        f(&mut OwnedEntityBuilder { config: owned });
        self
    }
}

/// Configuration of a single member.
pub struct PropertyBuilder<'a> {
    config: &'a mut PropertyConfiguration,
}

impl<'a> PropertyBuilder<'a> {
    pub fn has_column_name(self, column: &str) -> Self {
        self.config.column = Some(column.to_string());
        self
    }

    pub fn value_generated(self, policy: GeneratedPolicy) -> Self {
        self.config.generated = Some(policy);
        self
    }

    pub fn value_generated_never(self) -> Self {
        self.value_generated(GeneratedPolicy::None)
    }

    pub fn is_key(self) -> Self {
        self.config.key = true;
        self
    }

    pub fn ignore(self) -> Self {
        self.config.ignored = true;
        self
    }
}
