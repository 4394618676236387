//! Error Types
//!
//! A single crate error enum. Static-analysis gaps and ambiguous rule
//! resolution are not errors: they show up as `None` and the caller keeps
//! the unrewritten expression.

use thiserror::Error;

/// Errors raised while loading rules, parsing queries or building expressions
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Malformed path text
    #[error("invalid path `{spec}`: {reason}")]
    Parse { spec: String, reason: String },

    /// Malformed index configuration document or rule
    #[error("invalid index configuration: {0}")]
    Config(String),

    /// Query text the parser does not accept
    #[error("query syntax error: {0}")]
    Query(String),

    /// The expression tree for a rewrite could not be assembled
    #[error("cannot construct expression: {0}")]
    ExpressionConstruction(String),
}

impl Error {
    pub(crate) fn parse(spec: &str, reason: impl Into<String>) -> Self {
        Error::Parse {
            spec: spec.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
