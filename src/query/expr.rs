//! Query Expressions
//!
//! The small expression form understood by the reference cluster:
//! `*:*`, `field:value`, `field:"quoted value"`, `field:*`, and conjunctions
//! of those joined with ` AND `. Anything else is rejected.

use crate::codec::types::Document;
use crate::error::{BridgeError, Result};

use regex::Regex;
use std::sync::LazyLock;

static FIELD_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_.]*$").expect("field name pattern is valid")
});

pub const MATCH_ALL: &str = "*:*";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryExpr {
    MatchAll,
    Term { field: String, value: String },
    Exists { field: String },
    And(Vec<QueryExpr>),
}

impl QueryExpr {
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();
        if input.is_empty() {
            return Err(BridgeError::QueryExecution("empty query expression".into()));
        }

        let mut clauses = split_conjunction(input)
            .into_iter()
            .map(parse_clause)
            .collect::<Result<Vec<_>>>()?;

        if clauses.len() == 1 {
            return Ok(clauses.remove(0));
        }
        Ok(QueryExpr::And(clauses))
    }

    pub fn matches(&self, doc: &Document) -> bool {
        match self {
            QueryExpr::MatchAll => true,
            QueryExpr::Term { field, value } => doc
                .get(field)
                .is_some_and(|field_value| field_value.matches_term(value)),
            QueryExpr::Exists { field } => doc.get(field).is_some(),
            QueryExpr::And(clauses) => clauses.iter().all(|clause| clause.matches(doc)),
        }
    }
}

const AND: &str = " AND ";

/// Splits on ` AND ` occurring outside double quotes.
fn split_conjunction(input: &str) -> Vec<&str> {
    let mut clauses = Vec::new();
    let mut start = 0;
    let mut quoted = false;
    let mut chars = input.char_indices();

    while let Some((i, c)) = chars.next() {
        if c == '"' {
            quoted = !quoted;
        } else if !quoted && input[i..].starts_with(AND) {
            clauses.push(&input[start..i]);
            start = i + AND.len();
            // ` AND ` is ASCII; skip the rest of it
            for _ in 1..AND.len() {
                chars.next();
            }
        }
    }
    clauses.push(&input[start..]);
    clauses
}

fn parse_clause(clause: &str) -> Result<QueryExpr> {
    let clause = clause.trim();
    if clause == MATCH_ALL {
        return Ok(QueryExpr::MatchAll);
    }

    let (field, value) = clause.split_once(':').ok_or_else(|| {
        BridgeError::QueryExecution(format!("expected 'field:value' but got '{}'", clause))
    })?;

    if !FIELD_NAME.is_match(field) {
        return Err(BridgeError::QueryExecution(format!(
            "invalid field name '{}'",
            field
        )));
    }

    let value = value.trim();
    if value == "*" {
        return Ok(QueryExpr::Exists {
            field: field.to_string(),
        });
    }

    let value = match value.strip_prefix('"') {
        Some(quoted) => quoted.strip_suffix('"').ok_or_else(|| {
            BridgeError::QueryExecution(format!("unterminated quote in '{}'", clause))
        })?,
        None if value.is_empty() || value.contains(char::is_whitespace) => {
            return Err(BridgeError::QueryExecution(format!(
                "invalid term value in '{}'",
                clause
            )));
        }
        None => value,
    };

    Ok(QueryExpr::Term {
        field: field.to_string(),
        value: value.to_string(),
    })
}
