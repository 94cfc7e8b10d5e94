//! Command assembly
//!
//! Builds parameterized INSERT, UPDATE, DELETE and SELECT commands from
//! resolved entity metadata. Commands are plain text plus an ordered
//! parameter bag; executing them is the caller's business.

mod literals;

use std::any::Any;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::Storm;
use crate::error::{Result, StormError};
use crate::metadata::{Entity, EntityMetadata, MappedColumn};
use crate::predicate::{Expr, PropertyMappings};
use crate::types::{MemberReader, Value};

pub use literals::inline_literals;

/// A command ready to execute.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommandDefinition {
    pub sql: String,
    pub parameters: Vec<(String, Value)>,
}

impl CommandDefinition {
    pub fn parameter(&self, name: &str) -> Option<&Value> {
        self.parameters
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, value)| value)
    }

    /// Inline `{=name}` tokens; see [`inline_literals`].
    pub fn with_inlined_literals(self) -> Self {
        let (sql, parameters) = inline_literals(&self.sql, self.parameters);
        Self { sql, parameters }
    }
}

fn read_root<'a, T: Entity>(value: &'a dyn Any, name: &str) -> Option<&'a dyn Any> {
    value.downcast_ref::<T>()?.member(name)
}

impl Storm {
    /// `INSERT` of every column the database does not generate, followed by
    /// a statement returning the key.
    pub fn insert<T: Entity>(&self, entity: &T) -> Result<CommandDefinition> {
        let metadata = self.resolve::<T>()?;
        metadata.require_primary_key("insert")?;

        let mut names = Vec::new();
        let mut values = Vec::new();
        let mut parameters = Vec::new();
        for column in metadata.columns() {
            if column.property.generated().is_generated() {
                continue;
            }
            names.push(column.column.clone());
            values.push(format!("@{}", column.parameter));
            let value = self.read_column(entity, &metadata, &column)?;
            parameters.push((column.parameter, value));
        }

        let mut sql = String::new();
        sql.push_str(&format!(
            "INSERT INTO {}({})\n",
            metadata.table_name(),
            names.join(",")
        ));
        sql.push_str(&format!("VALUES ({});\n", values.join(",")));

        if metadata.has_auto_generated_key() {
            sql.push_str("SELECT SCOPE_IDENTITY();\n");
        } else if let Some(key) = metadata.primary_keys().next() {
            sql.push_str(&format!("SELECT @{};\n", key.name()));
        }

        debug!(entity = %metadata.type_name(), parameters = parameters.len(), "Assembled insert");
        Ok(CommandDefinition { sql, parameters })
    }

    /// `UPDATE` of every non-key, non-generated column, matched on the keys.
    pub fn update<T: Entity>(&self, entity: &T) -> Result<CommandDefinition> {
        let metadata = self.resolve::<T>()?;
        metadata.require_primary_key("update")?;

        let columns: Vec<MappedColumn<'_>> = metadata
            .columns()
            .into_iter()
            .filter(|c| !c.property.is_primary_key() && !c.property.generated().is_generated())
            .collect();
        if columns.is_empty() {
            return Err(StormError::NothingToUpdate {
                entity: metadata.type_name().to_string(),
            });
        }

        let mut sql = String::new();
        sql.push_str(&format!("UPDATE {}\n", metadata.table_name()));
        sql.push_str(" SET\n");

        let mut parameters = Vec::new();
        let mut first = true;
        for column in columns {
            sql.push('\t');
            sql.push_str(if first { " " } else { "," });
            first = false;
            sql.push_str(&format!("{} = @{}\n", column.column, column.parameter));

            let value = self.read_column(entity, &metadata, &column)?;
            parameters.push((column.parameter, value));
        }

        self.append_key_condition(entity, &metadata, &mut sql, &mut parameters)?;

        debug!(entity = %metadata.type_name(), parameters = parameters.len(), "Assembled update");
        Ok(CommandDefinition { sql, parameters })
    }

    /// `DELETE` matched on the keys.
    pub fn delete<T: Entity>(&self, entity: &T) -> Result<CommandDefinition> {
        let metadata = self.resolve::<T>()?;
        metadata.require_primary_key("delete")?;

        let mut sql = format!("DELETE FROM {}\n", metadata.table_name());
        let mut parameters = Vec::new();
        self.append_key_condition(entity, &metadata, &mut sql, &mut parameters)?;

        debug!(entity = %metadata.type_name(), "Assembled delete");
        Ok(CommandDefinition { sql, parameters })
    }

    /// `SELECT` of every column, filtered by an optional predicate.
    pub fn select<T: Entity>(&self, predicate: Option<&Expr>) -> Result<CommandDefinition> {
        let metadata = self.resolve::<T>()?;

        let columns: Vec<String> = metadata.columns().into_iter().map(|c| c.column).collect();
        let mut sql = format!("SELECT {} FROM {}", columns.join(", "), metadata.table_name());

        let mut parameters = Vec::new();
        if let Some(predicate) = predicate {
            let mappings = PropertyMappings::for_entity(&metadata, None);
            let compiled = self.compile(predicate, &mappings);
            if !compiled.is_empty() {
                sql.push_str(" WHERE ");
                sql.push_str(&compiled.sql);
            }
            parameters = compiled.parameters;
        }

        debug!(entity = %metadata.type_name(), parameters = parameters.len(), "Assembled select");
        Ok(CommandDefinition { sql, parameters })
    }

    fn append_key_condition<T: Entity>(
        &self,
        entity: &T,
        metadata: &EntityMetadata,
        sql: &mut String,
        parameters: &mut Vec<(String, Value)>,
    ) -> Result<()> {
        sql.push_str("WHERE ");
        let keys = metadata
            .columns()
            .into_iter()
            .filter(|c| c.owners.is_empty() && c.property.is_primary_key());

        for (i, column) in keys.enumerate() {
            if i > 0 {
                sql.push_str("AND ");
            }
            sql.push_str(&format!(
                "{}.{} = @{}\n",
                metadata.table_name(),
                column.property.column_name(),
                column.property.name()
            ));
            let value = self.read_column(entity, metadata, &column)?;
            parameters.push((column.property.name().to_string(), value));
        }
        Ok(())
    }

    /// Read a column's value off the entity, walking owned members. An absent
    /// owned value reads as `NULL`.
    fn read_column<T: Entity>(
        &self,
        entity: &T,
        metadata: &EntityMetadata,
        column: &MappedColumn<'_>,
    ) -> Result<Value> {
        let unknown = |member: &str| StormError::UnknownMember {
            entity: metadata.type_name().to_string(),
            member: member.to_string(),
        };

        let mut current: &dyn Any = entity;
        let mut reader: MemberReader = read_root::<T>;

        for owner in &column.owners {
            let value = reader(current, owner.name()).ok_or_else(|| unknown(owner.name()))?;
            let Some(inner) = owner.declared_type().unwrap_value(value) else {
                return Ok(Value::Null);
            };
            let record = owner.declared_type().record_shape().ok_or_else(|| {
                StormError::invalid_configuration(
                    metadata.type_name(),
                    owner.name(),
                    "owned member is not an entity type",
                )
            })?;
            current = inner;
            reader = record.member;
        }

        let property = column.property;
        let value = reader(current, property.name()).ok_or_else(|| unknown(property.name()))?;
        let encoded = self
            .handlers()
            .encode(property.declared_type(), value)
            .map_err(|err| match err {
                StormError::UnsupportedParameterType { type_name, .. } => {
                    StormError::UnsupportedParameterType {
                        member: property.name().to_string(),
                        type_name,
                    }
                }
                other => other,
            })?;
        Ok(encoded.into_parameter())
    }
}
