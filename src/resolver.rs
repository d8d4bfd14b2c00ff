//! Identifier resolution against a catalog.
//!
//! A partially-qualified name is expanded into an ordered, finite list of
//! fully-qualified candidates, and the candidates are tried against the
//! catalog strictly in order. Resolution stops at the first hit; it is never
//! parallel, since racing could return a lower-priority match or issue
//! catalog calls past the first hit.

use async_trait::async_trait;
use tracing::debug;

use crate::engine::{Engine, NameFold};
use crate::error::SchemaError;
use crate::identifier::{Identifier, IdentifierDefaults};

/// An explicit two-variant lookup result.
///
/// Absence is a value, not an error: a failed lookup returns `NotFound` and
/// the caller must check before use. Errors are reserved for broken input or
/// broken catalogs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolved<T> {
    Found(T),
    NotFound,
}

impl<T> Resolved<T> {
    pub fn found(self) -> Option<T> {
        match self {
            Resolved::Found(value) => Some(value),
            Resolved::NotFound => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Resolved::Found(_))
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Resolved<U> {
        match self {
            Resolved::Found(value) => Resolved::Found(f(value)),
            Resolved::NotFound => Resolved::NotFound,
        }
    }
}

/// Catalog membership test the resolver runs candidates against.
///
/// Implementors answer "does an object with exactly this fully-qualified name
/// exist"; they do not fall back to their own qualification rules.
#[async_trait]
pub trait CatalogLookup: Send + Sync {
    async fn contains(&self, identifier: &Identifier) -> Result<bool, SchemaError>;
}

/// Resolves partially-qualified identifiers for one engine + default set.
#[derive(Debug, Clone)]
pub struct IdentifierResolver {
    engine: Engine,
    defaults: IdentifierDefaults,
}

impl IdentifierResolver {
    pub fn new(engine: Engine, mut defaults: IdentifierDefaults) -> Self {
        if defaults.schema.is_none() {
            defaults.schema = engine.default_schema().map(str::to_string);
        }
        Self { engine, defaults }
    }

    pub fn engine(&self) -> Engine {
        self.engine
    }

    pub fn defaults(&self) -> &IdentifierDefaults {
        &self.defaults
    }

    /// The ordered candidate list for `identifier`.
    ///
    /// The as-given name, qualified with defaults, always comes first. For
    /// engines that fold unquoted names into their catalogs (PostgreSQL
    /// lower, Oracle upper), the folded spelling follows as a relaxed
    /// variant; a candidate equal to one already in the list is dropped.
    pub fn resolution_order(&self, identifier: &Identifier) -> Vec<Identifier> {
        let qualified = identifier.qualify_with_defaults(&self.defaults);
        let mut candidates = vec![qualified.clone()];

        match self.engine.name_fold() {
            NameFold::Lower | NameFold::Upper => {
                let fold = self.engine.name_fold();
                let folded = Identifier {
                    server: qualified.server.clone(),
                    database: qualified.database.clone(),
                    schema: qualified.schema.as_deref().map(|s| fold.apply(s)),
                    local_name: fold.apply(&qualified.local_name),
                };
                if folded != qualified {
                    candidates.push(folded);
                }
            }
            NameFold::Exact | NameFold::CaseInsensitive => {}
        }

        candidates
    }

    /// Resolve `identifier` to the first candidate the catalog confirms.
    ///
    /// Candidates are evaluated sequentially; no catalog calls are issued
    /// past the first hit.
    pub async fn resolve(
        &self,
        catalog: &dyn CatalogLookup,
        identifier: &Identifier,
    ) -> Result<Resolved<Identifier>, SchemaError> {
        for candidate in self.resolution_order(identifier) {
            debug!(candidate = %candidate, "trying resolution candidate");
            if catalog.contains(&candidate).await? {
                debug!(resolved = %candidate, "identifier resolved");
                return Ok(Resolved::Found(candidate));
            }
        }
        debug!(identifier = %identifier, "identifier not found in catalog");
        Ok(Resolved::NotFound)
    }

    /// Blocking form of [`IdentifierResolver::resolve`], identical semantics.
    pub fn resolve_blocking(
        &self,
        catalog: &dyn CatalogLookup,
        identifier: &Identifier,
    ) -> Result<Resolved<Identifier>, SchemaError> {
        futures::executor::block_on(self.resolve(catalog, identifier))
    }
}
