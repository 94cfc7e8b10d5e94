//! Literal tokens
//!
//! `{=name}` in command text is replaced by the SQL literal of parameter
//! `name`, which is then removed from the parameter bag. Only numbers,
//! booleans and enum values are inlined; anything else stays a token.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::types::Value;

static LITERAL_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\{=([a-z0-9_]+)\}").unwrap_or_else(|err| {
        unreachable!("literal token pattern is valid: {}", err)
    })
});

fn follows_identifier(sql: &str, start: usize) -> bool {
    sql[..start]
        .chars()
        .next_back()
        .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Inline literal tokens, returning the rewritten SQL and remaining
/// parameters.
pub fn inline_literals(
    sql: &str,
    parameters: Vec<(String, Value)>,
) -> (String, Vec<(String, Value)>) {
    if !sql.contains("{=") {
        return (sql.to_string(), parameters);
    }

    let mut inlined: Vec<String> = Vec::new();
    let rewritten = LITERAL_TOKEN.replace_all(sql, |caps: &Captures<'_>| {
        let start = caps.get(0).map_or(0, |m| m.start());
        if follows_identifier(sql, start) {
            return caps[0].to_string();
        }

        let name = &caps[1];
        let literal = parameters
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .and_then(|(n, value)| value.to_sql_literal().map(|literal| (n, literal)));

        match literal {
            Some((n, literal)) => {
                inlined.push(n.clone());
                literal
            }
            None => caps[0].to_string(),
        }
    });

    let remaining = parameters
        .into_iter()
        .filter(|(n, _)| !inlined.contains(n))
        .collect();
    (rewritten.into_owned(), remaining)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn params() -> Vec<(String, Value)> {
        vec![
            ("Top".to_string(), Value::Int(10)),
            ("Active".to_string(), Value::Bool(true)),
            ("Name".to_string(), Value::from("x")),
        ]
    }

    #[test]
    fn test_inlines_numeric_and_boolean() {
        let (sql, remaining) = inline_literals(
            "SELECT TOP {=top} * FROM T WHERE Active = {=Active} AND Name = @Name",
            params(),
        );
        assert_eq!(sql, "SELECT TOP 10 * FROM T WHERE Active = 1 AND Name = @Name");
        assert_eq!(remaining, vec![("Name".to_string(), Value::from("x"))]);
    }

    #[test]
    fn test_leaves_non_literal_and_unknown_tokens() {
        let (sql, remaining) = inline_literals("{=Name} {=Missing} a{=Top}", params());
        assert_eq!(sql, "{=Name} {=Missing} a{=Top}");
        assert_eq!(remaining.len(), 3);
    }

    #[test]
    fn test_adjacent_tokens() {
        let (sql, remaining) = inline_literals("({=Top}{=Active})", params());
        assert_eq!(sql, "(101)");
        assert_eq!(remaining.len(), 1);
    }
}
