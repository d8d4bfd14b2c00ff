//! Hierarchical object identifiers.
//!
//! An [`Identifier`] names a database object by up to four components:
//! server, database, schema, and the mandatory local name. Callers usually
//! supply only a suffix of that hierarchy ("the `orders` table"); the missing
//! higher components are filled from engine-level defaults without ever
//! touching a component the caller supplied.

use crate::engine::NameFold;
use crate::error::SchemaError;

/// A possibly-partial hierarchical object name.
///
/// Only `local_name` is mandatory. Equality and hashing are byte-exact; for
/// catalog comparison use [`Identifier::folded_key`] with the engine's fold
/// rule instead.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identifier {
    pub server: Option<String>,
    pub database: Option<String>,
    pub schema: Option<String>,
    pub local_name: String,
}

/// Engine-level defaults used to complete partial identifiers.
#[derive(Debug, Clone, Default)]
pub struct IdentifierDefaults {
    pub server: Option<String>,
    pub database: Option<String>,
    pub schema: Option<String>,
}

impl Identifier {
    /// Create an identifier from a bare local name.
    pub fn new(local_name: impl Into<String>) -> Result<Self, SchemaError> {
        let local_name = local_name.into();
        if local_name.trim().is_empty() {
            return Err(SchemaError::Argument { name: "local_name" });
        }
        Ok(Self {
            server: None,
            database: None,
            schema: None,
            local_name,
        })
    }

    /// Create a schema-qualified identifier.
    pub fn with_schema(
        schema: impl Into<String>,
        local_name: impl Into<String>,
    ) -> Result<Self, SchemaError> {
        let mut id = Self::new(local_name)?;
        let schema = schema.into();
        if schema.trim().is_empty() {
            return Err(SchemaError::Argument { name: "schema" });
        }
        id.schema = Some(schema);
        Ok(id)
    }

    /// Parse a dotted name of up to four parts: `server.database.schema.name`.
    ///
    /// Fewer parts bind to the lower tiers, matching how partially-qualified
    /// names are written in SQL (`schema.name`, `database.schema.name`).
    pub fn parse(dotted: &str) -> Result<Self, SchemaError> {
        let parts: Vec<&str> = dotted.split('.').map(str::trim).collect();
        if parts.is_empty() || parts.len() > 4 || parts.iter().any(|p| p.is_empty()) {
            return Err(SchemaError::Argument { name: "dotted" });
        }
        let mut id = Self::new(parts[parts.len() - 1])?;
        let higher = &parts[..parts.len() - 1];
        if let Some(schema) = higher.last() {
            id.schema = Some((*schema).to_string());
        }
        if higher.len() >= 2 {
            id.database = Some(higher[higher.len() - 2].to_string());
        }
        if higher.len() >= 3 {
            id.server = Some(higher[0].to_string());
        }
        Ok(id)
    }

    /// Fill missing higher components from `defaults`.
    ///
    /// Components the caller supplied are never overwritten, only absent
    /// ones are filled: schema, then database, then server.
    pub fn qualify_with_defaults(&self, defaults: &IdentifierDefaults) -> Identifier {
        Identifier {
            server: self.server.clone().or_else(|| defaults.server.clone()),
            database: self.database.clone().or_else(|| defaults.database.clone()),
            schema: self.schema.clone().or_else(|| defaults.schema.clone()),
            local_name: self.local_name.clone(),
        }
    }

    /// True when every component present in `self` is also the only data the
    /// identifier carries below the highest present tier, i.e. the name has
    /// no "holes" like a server with no database.
    pub fn is_well_formed(&self) -> bool {
        match (&self.server, &self.database, &self.schema) {
            (Some(_), None, _) => false,
            (_, Some(_), None) => false,
            _ => true,
        }
    }

    /// A fold-normalized key for engine-aware map lookup and equality.
    pub fn folded_key(&self, fold: NameFold) -> FoldedIdentifier {
        FoldedIdentifier {
            server: self.server.as_deref().map(|s| fold.apply(s)),
            database: self.database.as_deref().map(|s| fold.apply(s)),
            schema: self.schema.as_deref().map(|s| fold.apply(s)),
            local_name: fold.apply(&self.local_name),
        }
    }

    /// Engine-aware equality between two identifiers.
    pub fn eq_folded(&self, other: &Identifier, fold: NameFold) -> bool {
        fn opt_eq(a: &Option<String>, b: &Option<String>, fold: NameFold) -> bool {
            match (a, b) {
                (Some(a), Some(b)) => fold.eq(a, b),
                (None, None) => true,
                _ => false,
            }
        }
        opt_eq(&self.server, &other.server, fold)
            && opt_eq(&self.database, &other.database, fold)
            && opt_eq(&self.schema, &other.schema, fold)
            && fold.eq(&self.local_name, &other.local_name)
    }
}

/// An identifier with all components passed through an engine's fold rule.
///
/// Used as the cache and arena key so that `Users` and `users` land on the
/// same entry under a case-insensitive engine.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FoldedIdentifier {
    pub server: Option<String>,
    pub database: Option<String>,
    pub schema: Option<String>,
    pub local_name: String,
}

impl std::fmt::Display for Identifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(server) = &self.server {
            write!(f, "{}.", server)?;
        }
        if let Some(database) = &self.database {
            write!(f, "{}.", database)?;
        }
        if let Some(schema) = &self.schema {
            write!(f, "{}.", schema)?;
        }
        f.write_str(&self.local_name)
    }
}
