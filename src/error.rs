//! Error types for schemascan

use thiserror::Error;

/// Errors that can occur during schema introspection.
///
/// Errors are isolated per table/object: bulk enumerations continue past a
/// failed member, and the core never retries anything. "Not found" is not an
/// error; lookups return [`crate::resolver::Resolved`] instead.
#[derive(Error, Debug, Clone)]
pub enum SchemaError {
    #[error("argument `{name}` must not be empty")]
    Argument { name: &'static str },

    #[error("configuration error: {message}")]
    Configuration { message: String },

    #[error("failed to parse DDL for `{object}` at offset {offset}: {message}")]
    Parse {
        object: String,
        offset: usize,
        message: String,
        /// The verbatim statement text that failed to parse.
        sql: String,
    },

    #[error("catalog query failed: {message}")]
    Query { message: String },

    #[error("operation cancelled")]
    Cancelled,
}

impl SchemaError {
    /// Shorthand for a `Configuration` error.
    pub fn config(message: impl Into<String>) -> Self {
        SchemaError::Configuration {
            message: message.into(),
        }
    }

    /// Shorthand for a `Query` error.
    pub fn query(message: impl Into<String>) -> Self {
        SchemaError::Query {
            message: message.into(),
        }
    }
}
