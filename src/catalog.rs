//! Catalog query execution interface.
//!
//! The core never talks to a database directly. A [`QueryExecutor`] runs
//! parameterized SQL text against the target engine's catalog and returns
//! rows; connection transport, pooling, and retry policy all belong to the
//! implementor, never to this crate.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::SchemaError;

/// A single catalog cell value, mirroring SQLite's storage classes (which
/// are also the lowest common denominator across the supported engines).
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(v) => Some(*v),
            _ => None,
        }
    }

    /// Truthiness for pragma flag columns (`notnull`, `unique`, `pk`).
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Integer(v) => Some(*v != 0),
            Value::Text(s) => match s.as_str() {
                "0" | "false" => Some(false),
                "1" | "true" => Some(true),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

/// One catalog result row with named columns.
#[derive(Debug, Clone)]
pub struct Row {
    columns: Arc<[String]>,
    values: Vec<Value>,
}

impl Row {
    pub fn new(columns: Arc<[String]>, values: Vec<Value>) -> Self {
        Self { columns, values }
    }

    /// The value of the named column; `None` when the column is missing.
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(column))
            .map(|i| &self.values[i])
    }

    pub fn get_str(&self, column: &str) -> Option<&str> {
        self.get(column).and_then(Value::as_str)
    }

    pub fn get_i64(&self, column: &str) -> Option<i64> {
        self.get(column).and_then(Value::as_i64)
    }

    pub fn get_bool(&self, column: &str) -> Option<bool> {
        self.get(column).and_then(Value::as_bool)
    }

    /// The named column as a required string, erroring on absence or NULL.
    pub fn require_str(&self, column: &str) -> Result<&str, SchemaError> {
        self.get_str(column)
            .ok_or_else(|| SchemaError::query(format!("catalog row missing column `{column}`")))
    }
}

/// Runs parameterized catalog SQL and returns rows.
///
/// Implementations may run queries for independent tables concurrently; the
/// core serializes nothing beyond per-fact single-flight.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    async fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, SchemaError>;
}

/// Convenience builder for tests and in-memory fixtures.
pub fn rows(columns: &[&str], data: Vec<Vec<Value>>) -> Vec<Row> {
    let columns: Arc<[String]> = columns.iter().map(|c| c.to_string()).collect();
    data.into_iter()
        .map(|values| Row::new(Arc::clone(&columns), values))
        .collect()
}
