// searchplan-core/src/path.rs
//! Condition key grammar
//!
//! ```text
//! key       := field_expr ( "." operator )?
//! field_expr:= segment ( ("$" | ".") segment )*
//! segment   := any run of characters other than "." and "$"
//! ```
//!
//! The operator is the segment after the LAST dot of a key. Every separator
//! before it, `$` or `.`, splits relation names from the field, so
//! `posts$id.gte`, `posts.id.gte` and a positional `{"field": "posts.id"}`
//! all address field `id` through relation `posts`.
//!
//! Positional fields may carry a JSON column suffix (`meta->color`), which is
//! dropped before parsing.

use std::fmt;

use serde::Serialize;

use crate::error::{Result, SearchError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token<'a> {
    Segment(&'a str),
    Dot,
    Dollar,
}

fn tokenize(input: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut start = 0;

    for (idx, ch) in input.char_indices() {
        let sep = match ch {
            '.' => Token::Dot,
            '$' => Token::Dollar,
            _ => continue,
        };
        tokens.push(Token::Segment(&input[start..idx]));
        tokens.push(sep);
        start = idx + ch.len_utf8();
    }
    tokens.push(Token::Segment(&input[start..]));
    tokens
}

/// Relations to traverse before reaching a field; empty means none
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct RelationPath(Vec<String>);

impl RelationPath {
    pub fn new(segments: Vec<String>) -> Self {
        RelationPath(segments)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }
}

/// A field reached through zero or more relations
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct FieldPath {
    pub relations: RelationPath,
    pub field: String,
}

impl FieldPath {
    pub fn column(field: impl Into<String>) -> Self {
        FieldPath {
            relations: RelationPath::default(),
            field: field.into(),
        }
    }

    /// Parse a field expression; both `$` and `.` separate relations.
    pub fn parse(expr: &str) -> Result<Self> {
        let tokens = tokenize(expr);
        Self::from_tokens(expr, &tokens)
    }

    /// Parse a positional field, dropping any `->json` column suffix first.
    pub fn parse_positional(expr: &str) -> Result<Self> {
        let column = expr.split("->").next().unwrap_or(expr);
        Self::parse(column)
    }

    fn from_tokens(source: &str, tokens: &[Token<'_>]) -> Result<Self> {
        let mut segments = Vec::with_capacity(tokens.len() / 2 + 1);
        for token in tokens {
            if let Token::Segment(segment) = token {
                let segment = segment.trim();
                if segment.is_empty() {
                    return Err(SearchError::malformed(source, "empty path segment"));
                }
                segments.push(segment.to_string());
            }
        }

        // tokenize always yields at least one segment
        let field = segments
            .pop()
            .ok_or_else(|| SearchError::malformed(source, "missing field name"))?;
        Ok(FieldPath {
            relations: RelationPath(segments),
            field,
        })
    }

    pub fn is_relation_scoped(&self) -> bool {
        !self.relations.is_empty()
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for relation in self.relations.segments() {
            write!(f, "{}.", relation)?;
        }
        f.write_str(&self.field)
    }
}

/// A keyed condition entry split into field and optional operator token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionKey {
    pub path: FieldPath,
    pub operator: Option<String>,
}

impl ConditionKey {
    /// Parse a keyed entry such as `name`, `name.like` or `company$name.in`.
    ///
    /// The last `.` always starts the operator, so a keyed `company.name`
    /// is field `company` with operator `name` (rendered verbatim). A
    /// relation in a keyed entry is written `company$name`; the dotted
    /// `company.name` spelling names a relation only in a positional
    /// `{field, value}` entry, where nothing follows the path.
    pub fn parse(key: &str) -> Result<Self> {
        let tokens = tokenize(key);
        let last_dot = tokens.iter().rposition(|t| *t == Token::Dot);

        match last_dot {
            None => Ok(ConditionKey {
                path: FieldPath::from_tokens(key, &tokens)?,
                operator: None,
            }),
            Some(idx) => {
                let operator = match tokens.get(idx + 1) {
                    Some(Token::Segment(op)) if !op.trim().is_empty() => op.trim().to_string(),
                    _ => return Err(SearchError::malformed(key, "missing operator after '.'")),
                };
                Ok(ConditionKey {
                    path: FieldPath::from_tokens(key, &tokens[..idx])?,
                    operator: Some(operator),
                })
            }
        }
    }
}
