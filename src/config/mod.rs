//! Storm configuration management
//!
//! Settings are owned by a [`Storm`](crate::Storm) instance; nothing here is
//! process-global. They can be built in code, loaded from environment
//! variables or deserialized from JSON.

use std::env;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::metadata::GeneratedPolicy;

/// How table and schema identifiers are quoted in generated SQL.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentifierQuote {
    /// `[name]` (SQL Server style)
    #[default]
    Brackets,
    /// `"name"` (ANSI)
    DoubleQuotes,
    /// `` `name` `` (MySQL)
    Backticks,
}

impl IdentifierQuote {
    /// Wrap an identifier in delimiters
    pub fn quote(&self, identifier: &str) -> String {
        match self {
            IdentifierQuote::Brackets => format!("[{}]", identifier),
            IdentifierQuote::DoubleQuotes => format!("\"{}\"", identifier),
            IdentifierQuote::Backticks => format!("`{}`", identifier),
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "brackets" => Some(IdentifierQuote::Brackets),
            "double_quotes" => Some(IdentifierQuote::DoubleQuotes),
            "backticks" => Some(IdentifierQuote::Backticks),
            _ => None,
        }
    }
}

/// Global defaults applied while resolving entity metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StormSettings {
    /// Generation policy for key properties that declare none
    pub default_key_generation: GeneratedPolicy,

    /// Identifier delimiters for table names
    pub identifier_quote: IdentifierQuote,

    /// Placed between an owning property's name and an owned column
    pub owned_column_separator: String,
}

impl Default for StormSettings {
    fn default() -> Self {
        Self {
            default_key_generation: GeneratedPolicy::OnInsert,
            identifier_quote: IdentifierQuote::Brackets,
            owned_column_separator: "_".to_string(),
        }
    }
}

impl StormSettings {
    /// Load settings from environment variables, falling back to defaults
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let default_key_generation = match env::var("STORM_DEFAULT_KEY_GENERATION") {
            Ok(value) => GeneratedPolicy::parse(&value)
                .with_context(|| format!("Invalid STORM_DEFAULT_KEY_GENERATION: {}", value))?,
            Err(_) => defaults.default_key_generation,
        };

        let identifier_quote = match env::var("STORM_IDENTIFIER_QUOTE") {
            Ok(value) => IdentifierQuote::parse(&value)
                .with_context(|| format!("Invalid STORM_IDENTIFIER_QUOTE: {}", value))?,
            Err(_) => defaults.identifier_quote,
        };

        Ok(Self {
            default_key_generation,
            identifier_quote,
            owned_column_separator: env::var("STORM_OWNED_COLUMN_SEPARATOR")
                .unwrap_or(defaults.owned_column_separator),
        })
    }

    /// Load settings from a JSON document; missing fields keep their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Invalid Storm settings document")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = StormSettings::default();
        assert_eq!(settings.default_key_generation, GeneratedPolicy::OnInsert);
        assert_eq!(settings.identifier_quote.quote("Orders"), "[Orders]");
        assert_eq!(settings.owned_column_separator, "_");
    }

    #[test]
    fn test_from_json_partial() {
        let settings = StormSettings::from_json(
            r#"{ "identifier_quote": "double_quotes", "default_key_generation": "none" }"#,
        )
        .unwrap();
        assert_eq!(settings.identifier_quote, IdentifierQuote::DoubleQuotes);
        assert_eq!(settings.default_key_generation, GeneratedPolicy::None);
        assert_eq!(settings.owned_column_separator, "_");
    }

    #[test]
    fn test_from_json_rejects_unknown_policy() {
        assert!(StormSettings::from_json(r#"{ "default_key_generation": "sometimes" }"#).is_err());
    }

    #[test]
    fn test_quote_styles() {
        assert_eq!(IdentifierQuote::DoubleQuotes.quote("Boxes"), "\"Boxes\"");
        assert_eq!(IdentifierQuote::Backticks.quote("Boxes"), "`Boxes`");
        assert_eq!(IdentifierQuote::parse(" Brackets "), Some(IdentifierQuote::Brackets));
        assert_eq!(IdentifierQuote::parse("parens"), None);
    }
}
