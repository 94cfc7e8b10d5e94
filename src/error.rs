//! Error taxonomy for metadata resolution, type mapping and command assembly.
//!
//! Every variant is raised synchronously and never retried internally.
//! Silent-skip conditions (unsupported predicate nodes, unannotated composite
//! members) are not errors and never reach this type.

use thiserror::Error;

/// Errors raised by Storm.
#[derive(Debug, Error)]
pub enum StormError {
    /// A type required to be a scalar has no database mapping and no handler.
    #[error("The member {member} of type {type_name} cannot be used as a parameter value")]
    UnsupportedParameterType { member: String, type_name: String },

    /// Contradictory declarative configuration, detected while resolving.
    #[error("Invalid configuration for {entity}.{member}: {reason}")]
    InvalidEntityConfiguration {
        entity: String,
        member: String,
        reason: String,
    },

    /// Configuration refers to a member the entity does not declare.
    #[error("Entity {entity} has no member named {member}")]
    UnknownMember { entity: String, member: String },

    /// A key-dependent command was requested for an entity without a key.
    #[error("At least one key column property must be defined for {entity} ({operation})")]
    MissingPrimaryKey { entity: String, operation: String },

    /// An update was requested for an entity whose mapped columns are all
    /// keys or database-generated.
    #[error("Entity {entity} has no columns that can be updated")]
    NothingToUpdate { entity: String },

    /// A custom type handler could not convert a value.
    #[error("Type handler for {type_name} failed: {reason}")]
    TypeHandler { type_name: String, reason: String },
}

impl StormError {
    pub(crate) fn invalid_configuration(
        entity: impl Into<String>,
        member: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        StormError::InvalidEntityConfiguration {
            entity: entity.into(),
            member: member.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn handler(type_name: impl Into<String>, reason: impl Into<String>) -> Self {
        StormError::TypeHandler {
            type_name: type_name.into(),
            reason: reason.into(),
        }
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StormError>;
