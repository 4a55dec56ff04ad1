//! YAML query evaluation
//!
//! A small subset of the yq/jq addressing language, enough to pull values
//! out of a config file from a shell script:
//!
//! | Expression | Meaning |
//! |------------|---------|
//! | `.` | the whole document |
//! | `.foo.bar`, `."odd key"` | field access (`null` when absent) |
//! | `.list[0]`, `.list[-1]` | indexing, negative from the end |
//! | `.list[]` | every item of a sequence, or every value of a mapping |
//! | `a \| b` | feed each result of `a` into `b` |
//! | `select(cond)` | keep the input when `cond` is truthy |
//! | `==` `!=` `<` `<=` `>` `>=` `and` `or` `not` | conditions |
//! | `length`, `keys` | collection helpers |
//!
//! Results are rendered back to YAML with scalars unwrapped and printed as
//! written in the source, see [`evaluate_str`].

mod eval;
mod node;
mod parser;
mod render;

use std::fmt;
use std::str::FromStr;

use serde_yaml::Value;
use thiserror::Error;

use crate::format::{DecodeError, EncodeError};

use node::Node;

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("invalid query at position {position}: {message}")]
    Syntax { position: usize, message: String },

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Encode(#[from] EncodeError),
}

/// A parsed query expression
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    source: String,
    expr: parser::Expr,
}

impl Query {
    /// Parses a query expression
    pub fn parse(source: &str) -> Result<Self, QueryError> {
        let expr = parser::parse(source)?;
        Ok(Self {
            source: source.to_string(),
            expr,
        })
    }

    /// Returns the expression text
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Evaluates the query against one document.
    ///
    /// Never fails: missing fields yield `null` and filters that reject
    /// everything yield no results.
    pub fn evaluate(&self, document: &Value) -> Vec<Value> {
        eval::eval(&self.expr, &Node::from_value(document))
            .iter()
            .map(Node::to_value)
            .collect()
    }

    /// Evaluates the query against every document of a YAML stream and
    /// renders the results
    pub fn evaluate_yaml(&self, data: &[u8]) -> Result<String, QueryError> {
        let documents = node::load(data)?;

        let results: Vec<(usize, Node)> = documents
            .iter()
            .enumerate()
            .flat_map(|(index, doc)| {
                eval::eval(&self.expr, doc)
                    .into_iter()
                    .map(move |node| (index, node))
            })
            .collect();

        Ok(render::render(&results)?)
    }
}

impl FromStr for Query {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Evaluates `expr` against every document of a YAML stream and renders the
/// results as text.
///
/// The query is parsed before the data, so a bad expression is reported
/// even when the data is not valid YAML. A query that matches nothing
/// produces an empty string.
pub fn evaluate_str(expr: &str, data: &[u8]) -> Result<String, QueryError> {
    Query::parse(expr)?.evaluate_yaml(data)
}
