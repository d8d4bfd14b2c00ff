//! schemascan: database schema introspection
//!
//! This library reads the structure of an existing database (tables,
//! columns, keys, indexes, checks, triggers) into a canonical in-memory
//! model, resolving partially-qualified identifiers and recovering
//! declaration detail (constraint names, check expressions, generated-column
//! formulas) that catalogs like SQLite's only expose as verbatim DDL text.
//!
//! The model is a read-only snapshot. Providers own their caches, lookups
//! return [`resolver::Resolved`] rather than erroring on absence, and every
//! operation comes in an async form with a blocking wrapper.

pub mod cache;
pub mod catalog;
pub mod declare;
pub mod engine;
pub mod error;
pub mod identifier;
pub mod keys;
pub mod model;
pub mod parser;
pub mod resolver;
pub mod sqlite;
pub mod util;

pub use engine::{Engine, NameFold};
pub use error::SchemaError;
pub use identifier::{Identifier, IdentifierDefaults};
pub use resolver::{IdentifierResolver, Resolved};
pub use sqlite::SqliteSchemaReader;
