//! Identifier resolution tests

use std::sync::Mutex;

use async_trait::async_trait;
use pretty_assertions::assert_eq;

use schemascan::error::SchemaError;
use schemascan::identifier::{Identifier, IdentifierDefaults};
use schemascan::resolver::{CatalogLookup, IdentifierResolver, Resolved};
use schemascan::Engine;

/// A catalog fixture that records every membership probe it receives.
struct RecordingCatalog {
    known: Vec<Identifier>,
    probes: Mutex<Vec<Identifier>>,
}

impl RecordingCatalog {
    fn new(known: Vec<Identifier>) -> Self {
        Self {
            known,
            probes: Mutex::new(Vec::new()),
        }
    }

    fn probe_count(&self) -> usize {
        self.probes.lock().unwrap().len()
    }
}

#[async_trait]
impl CatalogLookup for RecordingCatalog {
    async fn contains(&self, identifier: &Identifier) -> Result<bool, SchemaError> {
        self.probes.lock().unwrap().push(identifier.clone());
        Ok(self.known.contains(identifier))
    }
}

fn defaults(server: &str, database: &str, schema: &str) -> IdentifierDefaults {
    IdentifierDefaults {
        server: Some(server.to_string()),
        database: Some(database.to_string()),
        schema: Some(schema.to_string()),
    }
}

#[tokio::test]
async fn test_bare_name_is_qualified_from_defaults() {
    let resolver = IdentifierResolver::new(Engine::SqlServer, defaults("srv", "db", "dbo"));
    let mut expected = Identifier::new("orders").unwrap();
    expected.server = Some("srv".into());
    expected.database = Some("db".into());
    expected.schema = Some("dbo".into());

    let catalog = RecordingCatalog::new(vec![expected.clone()]);
    let resolved = resolver
        .resolve(&catalog, &Identifier::new("orders").unwrap())
        .await
        .unwrap();
    assert_eq!(resolved, Resolved::Found(expected));
}

#[tokio::test]
async fn test_supplied_components_never_overwritten() {
    let resolver = IdentifierResolver::new(Engine::SqlServer, defaults("srv", "db", "dbo"));
    let catalog = RecordingCatalog::new(Vec::new());
    let given = Identifier::with_schema("sales", "orders").unwrap();

    resolver.resolve(&catalog, &given).await.unwrap();
    let probes = catalog.probes.lock().unwrap();
    assert_eq!(probes[0].schema.as_deref(), Some("sales"));
    assert_eq!(probes[0].server.as_deref(), Some("srv"));
}

#[tokio::test]
async fn test_resolution_stops_at_first_hit() {
    let resolver =
        IdentifierResolver::new(Engine::PostgreSql, IdentifierDefaults::default());
    // "MyTable" yields two candidates for PostgreSQL; the first one hits.
    let mut hit = Identifier::new("MyTable").unwrap();
    hit.schema = Some("public".into());
    let catalog = RecordingCatalog::new(vec![hit]);

    let resolved = resolver
        .resolve(&catalog, &Identifier::new("MyTable").unwrap())
        .await
        .unwrap();
    assert!(resolved.is_found());
    assert_eq!(catalog.probe_count(), 1);
}

#[tokio::test]
async fn test_postgres_falls_back_to_lowered_candidate() {
    let resolver =
        IdentifierResolver::new(Engine::PostgreSql, IdentifierDefaults::default());
    let mut lowered = Identifier::new("mytable").unwrap();
    lowered.schema = Some("public".into());
    let catalog = RecordingCatalog::new(vec![lowered.clone()]);

    let resolved = resolver
        .resolve(&catalog, &Identifier::new("MyTable").unwrap())
        .await
        .unwrap();
    assert_eq!(resolved, Resolved::Found(lowered));
    assert_eq!(catalog.probe_count(), 2);
}

#[tokio::test]
async fn test_absence_is_not_found_not_error() {
    let resolver = IdentifierResolver::new(Engine::Sqlite, IdentifierDefaults::default());
    let catalog = RecordingCatalog::new(Vec::new());
    let resolved = resolver
        .resolve(&catalog, &Identifier::new("ghost").unwrap())
        .await
        .unwrap();
    assert_eq!(resolved, Resolved::NotFound);
}

#[test]
fn test_blocking_form_matches_async() {
    let resolver = IdentifierResolver::new(Engine::Sqlite, IdentifierDefaults::default());
    let known = Identifier::new("users").unwrap();
    let catalog = RecordingCatalog::new(vec![known.clone()]);
    let resolved = resolver
        .resolve_blocking(&catalog, &Identifier::new("users").unwrap())
        .unwrap();
    assert_eq!(resolved, Resolved::Found(known));
}

#[test]
fn test_empty_local_name_is_argument_error() {
    assert!(matches!(
        Identifier::new(""),
        Err(SchemaError::Argument { name: "local_name" })
    ));
}
