//! SQLite provider tests against an in-memory catalog fixture.
//!
//! The fixture answers the same queries a real SQLite connection would:
//! `sqlite_master` rows for DDL text and `PRAGMA table_info` /
//! `index_list` / `index_info` for structure.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use tokio_util::sync::CancellationToken;

use schemascan::catalog::{rows, QueryExecutor, Row, Value};
use schemascan::error::SchemaError;
use schemascan::identifier::Identifier;
use schemascan::model::{KeyKind, ReferentialAction, TriggerTiming};
use schemascan::resolver::Resolved;
use schemascan::sqlite::SqliteSchemaReader;

// ============================================================================
// Fixture
// ============================================================================

#[derive(Clone)]
struct FixtureColumn {
    name: &'static str,
    declared_type: &'static str,
    not_null: bool,
    default_value: Option<&'static str>,
    pk: bool,
}

#[derive(Clone)]
struct FixtureIndex {
    name: &'static str,
    unique: bool,
    /// `c` created, `u` unique constraint, `pk` primary key.
    origin: &'static str,
    columns: Vec<&'static str>,
}

#[derive(Clone)]
struct FixtureTable {
    name: &'static str,
    ddl: &'static str,
    columns: Vec<FixtureColumn>,
    indexes: Vec<FixtureIndex>,
    triggers: Vec<(&'static str, &'static str)>,
}

struct FixtureDb {
    tables: Vec<FixtureTable>,
}

impl FixtureDb {
    /// Pragmas resolve table names case-insensitively, like the engine.
    fn table(&self, name: &str) -> Option<&FixtureTable> {
        self.tables.iter().find(|t| t.name.eq_ignore_ascii_case(name))
    }

    /// `sqlite_master` text columns compare under BINARY collation unless
    /// the query itself opts into NOCASE, same as a real connection.
    fn master_row(&self, sql: &str, name: &str) -> Option<&FixtureTable> {
        let nocase = sql.contains("COLLATE NOCASE");
        self.tables.iter().find(|t| {
            if nocase {
                t.name.eq_ignore_ascii_case(name)
            } else {
                t.name == name
            }
        })
    }

    fn pragma_target(sql: &str) -> &str {
        let start = sql.find("(\"").unwrap() + 2;
        let end = sql.rfind("\")").unwrap();
        &sql[start..end]
    }
}

#[async_trait]
impl QueryExecutor for FixtureDb {
    async fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, SchemaError> {
        let param = params.first().and_then(Value::as_str).unwrap_or("");

        if sql.contains("name NOT LIKE 'sqlite_%'") {
            let mut names: Vec<&str> = self.tables.iter().map(|t| t.name).collect();
            names.sort_unstable();
            return Ok(rows(
                &["name"],
                names
                    .into_iter()
                    .map(|n| vec![Value::Text(n.to_string())])
                    .collect(),
            ));
        }

        if sql.starts_with("SELECT 1 AS present") {
            return Ok(match self.master_row(sql, param) {
                Some(_) => rows(&["present"], vec![vec![Value::Integer(1)]]),
                None => rows(&["present"], vec![]),
            });
        }

        if sql.contains("type = 'table' AND name = ?") {
            return Ok(match self.master_row(sql, param) {
                Some(t) => rows(
                    &["name", "sql"],
                    vec![vec![
                        Value::Text(t.name.to_string()),
                        Value::Text(t.ddl.to_string()),
                    ]],
                ),
                None => rows(&["name", "sql"], vec![]),
            });
        }

        if sql.contains("type = 'trigger'") {
            let triggers = self
                .master_row(sql, param)
                .map(|t| t.triggers.clone())
                .unwrap_or_default();
            return Ok(rows(
                &["name", "sql"],
                triggers
                    .into_iter()
                    .map(|(name, ddl)| {
                        vec![Value::Text(name.to_string()), Value::Text(ddl.to_string())]
                    })
                    .collect(),
            ));
        }

        if sql.contains("type = 'view'") {
            return Ok(rows(&["name", "sql"], vec![]));
        }

        if sql.starts_with("PRAGMA table_info(") {
            let table = self
                .table(Self::pragma_target(sql))
                .ok_or_else(|| SchemaError::query("no such table"))?;
            return Ok(rows(
                &["cid", "name", "type", "notnull", "dflt_value", "pk"],
                table
                    .columns
                    .iter()
                    .enumerate()
                    .map(|(i, c)| {
                        vec![
                            Value::Integer(i as i64),
                            Value::Text(c.name.to_string()),
                            Value::Text(c.declared_type.to_string()),
                            Value::Integer(c.not_null as i64),
                            c.default_value
                                .map(|d| Value::Text(d.to_string()))
                                .unwrap_or(Value::Null),
                            Value::Integer(c.pk as i64),
                        ]
                    })
                    .collect(),
            ));
        }

        if sql.starts_with("PRAGMA index_list(") {
            let table = self
                .table(Self::pragma_target(sql))
                .ok_or_else(|| SchemaError::query("no such table"))?;
            return Ok(rows(
                &["seq", "name", "unique", "origin", "partial"],
                table
                    .indexes
                    .iter()
                    .enumerate()
                    .map(|(i, idx)| {
                        vec![
                            Value::Integer(i as i64),
                            Value::Text(idx.name.to_string()),
                            Value::Integer(idx.unique as i64),
                            Value::Text(idx.origin.to_string()),
                            Value::Integer(0),
                        ]
                    })
                    .collect(),
            ));
        }

        if sql.starts_with("PRAGMA index_info(") {
            let target = Self::pragma_target(sql);
            let index = self
                .tables
                .iter()
                .flat_map(|t| t.indexes.iter())
                .find(|idx| idx.name == target)
                .ok_or_else(|| SchemaError::query("no such index"))?;
            return Ok(rows(
                &["seqno", "cid", "name"],
                index
                    .columns
                    .iter()
                    .enumerate()
                    .map(|(i, c)| {
                        vec![
                            Value::Integer(i as i64),
                            Value::Integer(i as i64),
                            Value::Text(c.to_string()),
                        ]
                    })
                    .collect(),
            ));
        }

        Err(SchemaError::query(format!("fixture cannot answer: {sql}")))
    }
}

/// Counts `sqlite_master` DDL fetches to observe single-flight behavior.
struct CountingDb {
    inner: FixtureDb,
    ddl_queries: AtomicUsize,
}

#[async_trait]
impl QueryExecutor for CountingDb {
    async fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, SchemaError> {
        if sql.starts_with("SELECT name, sql FROM sqlite_master WHERE type = 'table'") {
            self.ddl_queries.fetch_add(1, Ordering::SeqCst);
        }
        self.inner.query(sql, params).await
    }
}

fn shop_db() -> FixtureDb {
    FixtureDb {
        tables: vec![
            FixtureTable {
                name: "customers",
                ddl: "CREATE TABLE customers (\
                      id INTEGER PRIMARY KEY, \
                      email TEXT NOT NULL, \
                      CONSTRAINT uq_customers_email UNIQUE (email))",
                columns: vec![
                    FixtureColumn {
                        name: "id",
                        declared_type: "INTEGER",
                        not_null: false,
                        default_value: None,
                        pk: true,
                    },
                    FixtureColumn {
                        name: "email",
                        declared_type: "TEXT",
                        not_null: true,
                        default_value: None,
                        pk: false,
                    },
                ],
                indexes: vec![FixtureIndex {
                    name: "sqlite_autoindex_customers_1",
                    unique: true,
                    origin: "u",
                    columns: vec!["email"],
                }],
                triggers: vec![(
                    "trg_customers_audit",
                    "CREATE TRIGGER trg_customers_audit AFTER UPDATE ON customers \
                     BEGIN SELECT 1; END",
                )],
            },
            FixtureTable {
                name: "orders",
                ddl: "CREATE TABLE orders (\
                      id INTEGER PRIMARY KEY, \
                      customer_id INTEGER NOT NULL, \
                      total NUMERIC DEFAULT 0, \
                      CONSTRAINT fk_orders_customer FOREIGN KEY (customer_id) \
                          REFERENCES customers (id) ON DELETE CASCADE)",
                columns: vec![
                    FixtureColumn {
                        name: "id",
                        declared_type: "INTEGER",
                        not_null: false,
                        default_value: None,
                        pk: true,
                    },
                    FixtureColumn {
                        name: "customer_id",
                        declared_type: "INTEGER",
                        not_null: true,
                        default_value: None,
                        pk: false,
                    },
                    FixtureColumn {
                        name: "total",
                        declared_type: "NUMERIC",
                        not_null: false,
                        default_value: Some("0"),
                        pk: false,
                    },
                ],
                indexes: vec![FixtureIndex {
                    name: "ix_orders_customer",
                    unique: false,
                    origin: "c",
                    columns: vec!["customer_id"],
                }],
                triggers: vec![],
            },
        ],
    }
}

fn reader(db: FixtureDb) -> SqliteSchemaReader {
    SqliteSchemaReader::new(Arc::new(db))
}

async fn load(reader: &SqliteSchemaReader, name: &str) -> Arc<schemascan::model::Table> {
    reader
        .get_table(&Identifier::new(name).unwrap(), &CancellationToken::new())
        .await
        .unwrap()
        .found()
        .unwrap_or_else(|| panic!("table {name} not found"))
}

// ============================================================================
// Lookup and core structure
// ============================================================================

#[tokio::test]
async fn test_missing_table_is_not_found() {
    let reader = reader(shop_db());
    let result = reader
        .get_table(&Identifier::new("ghost").unwrap(), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(result, Resolved::NotFound);
}

#[tokio::test]
async fn test_lookup_is_case_insensitive() {
    let reader = reader(shop_db());
    let table = load(&reader, "CUSTOMERS").await;
    assert_eq!(table.name.local_name, "customers");
}

#[tokio::test]
async fn test_columns_merge_parsed_and_pragma_facts() {
    let reader = reader(shop_db());
    let table = load(&reader, "orders").await;

    assert_eq!(table.columns.len(), 3);
    let customer_id = table.column("customer_id").unwrap();
    assert!(!customer_id.nullable);
    assert!(customer_id.auto_increment.is_none());

    let total = table.column("total").unwrap();
    assert!(total.nullable);
    assert_eq!(total.default_value.as_deref(), Some("0"));
}

#[tokio::test]
async fn test_rowid_alias_column_auto_increments() {
    let reader = reader(shop_db());
    let table = load(&reader, "customers").await;
    let id = table.column("id").unwrap();
    let auto = id.auto_increment.as_ref().expect("id should auto-increment");
    assert_eq!(auto.seed, 1);
    assert_eq!(auto.step, 1);
}

#[tokio::test]
async fn test_unique_key_name_recovered_from_ddl() {
    let reader = reader(shop_db());
    let table = load(&reader, "customers").await;
    assert_eq!(table.unique_keys.len(), 1);
    assert_eq!(
        table.unique_keys[0].name.as_deref(),
        Some("uq_customers_email")
    );
    assert_eq!(table.unique_keys[0].columns, vec!["email".to_string()]);
}

#[tokio::test]
async fn test_created_index_reported_separately_from_keys() {
    let reader = reader(shop_db());
    let table = load(&reader, "orders").await;
    assert_eq!(table.indexes.len(), 1);
    assert_eq!(table.indexes[0].name.as_deref(), Some("ix_orders_customer"));
    assert!(!table.indexes[0].unique);
    assert!(table.unique_keys.is_empty());
}

#[tokio::test]
async fn test_trigger_recovered_with_timing() {
    let reader = reader(shop_db());
    let table = load(&reader, "customers").await;
    assert_eq!(table.triggers.len(), 1);
    assert_eq!(table.triggers[0].name, "trg_customers_audit");
    assert_eq!(table.triggers[0].timing, TriggerTiming::After);
}

// ============================================================================
// Relational keys
// ============================================================================

#[tokio::test]
async fn test_foreign_key_resolves_with_cascade_action() {
    let reader = reader(shop_db());
    let table = load(&reader, "orders").await;

    assert_eq!(table.parent_keys.len(), 1);
    let rk = &table.parent_keys[0];
    assert_eq!(rk.child.name.as_deref(), Some("fk_orders_customer"));
    assert_eq!(rk.parent_table.local_name, "customers");
    assert_eq!(rk.parent.kind, KeyKind::Primary);
    assert_eq!(rk.delete_action, ReferentialAction::Cascade);
    assert_eq!(rk.update_action, ReferentialAction::NoAction);
}

#[tokio::test]
async fn test_child_keys_discovered_by_scan() {
    let reader = reader(shop_db());
    let keys = reader
        .get_child_keys(&Identifier::new("customers").unwrap(), &CancellationToken::new())
        .await
        .unwrap()
        .found()
        .unwrap();
    assert_eq!(keys.len(), 1);
    assert_eq!(keys[0].child_table.local_name, "orders");
}

#[tokio::test]
async fn test_foreign_key_to_missing_table_is_configuration_error() {
    let mut db = shop_db();
    db.tables.retain(|t| t.name != "customers");
    let reader = reader(db);
    let err = reader
        .get_table(&Identifier::new("orders").unwrap(), &CancellationToken::new())
        .await
        .unwrap_err();
    match err {
        SchemaError::Configuration { message } => {
            assert!(message.contains("references unknown table"), "{message}");
        }
        other => panic!("expected Configuration, got {other:?}"),
    }
}

#[tokio::test]
async fn test_broken_foreign_key_target_surfaces_its_parse_error() {
    let mut db = shop_db();
    db.tables[0].ddl = "CREATE TABLE customers (id INTEGER";
    let reader = reader(db);
    let err = reader
        .get_table(&Identifier::new("orders").unwrap(), &CancellationToken::new())
        .await
        .unwrap_err();
    // The target exists but its DDL is malformed; the caller sees the
    // parse failure for `customers`, not a bogus missing-table report.
    match err {
        SchemaError::Parse { object, sql, .. } => {
            assert_eq!(object, "customers");
            assert_eq!(sql, "CREATE TABLE customers (id INTEGER");
        }
        other => panic!("expected Parse, got {other:?}"),
    }
}

#[tokio::test]
async fn test_self_referencing_table_loads() {
    let db = FixtureDb {
        tables: vec![FixtureTable {
            name: "employees",
            ddl: "CREATE TABLE employees (\
                  id INTEGER PRIMARY KEY, \
                  manager_id INTEGER REFERENCES employees(id))",
            columns: vec![
                FixtureColumn {
                    name: "id",
                    declared_type: "INTEGER",
                    not_null: false,
                    default_value: None,
                    pk: true,
                },
                FixtureColumn {
                    name: "manager_id",
                    declared_type: "INTEGER",
                    not_null: false,
                    default_value: None,
                    pk: false,
                },
            ],
            indexes: vec![],
            triggers: vec![],
        }],
    };
    let reader = reader(db);
    let table = load(&reader, "employees").await;
    assert_eq!(table.parent_keys.len(), 1);
    assert_eq!(table.parent_keys[0].parent_table.local_name, "employees");
}

#[tokio::test]
async fn test_mutually_referencing_tables_load() {
    fn int_col(name: &'static str, pk: bool) -> FixtureColumn {
        FixtureColumn {
            name,
            declared_type: "INTEGER",
            not_null: false,
            default_value: None,
            pk,
        }
    }
    let db = FixtureDb {
        tables: vec![
            FixtureTable {
                name: "a",
                ddl: "CREATE TABLE a (id INTEGER PRIMARY KEY, b_id INTEGER REFERENCES b(id))",
                columns: vec![int_col("id", true), int_col("b_id", false)],
                indexes: vec![],
                triggers: vec![],
            },
            FixtureTable {
                name: "b",
                ddl: "CREATE TABLE b (id INTEGER PRIMARY KEY, a_id INTEGER REFERENCES a(id))",
                columns: vec![int_col("id", true), int_col("a_id", false)],
                indexes: vec![],
                triggers: vec![],
            },
        ],
    };
    let reader = reader(db);
    let a = load(&reader, "a").await;
    let b = load(&reader, "b").await;
    assert_eq!(a.parent_keys[0].parent_table.local_name, "b");
    assert_eq!(b.parent_keys[0].parent_table.local_name, "a");
}

// ============================================================================
// Caching, bulk loads, cancellation
// ============================================================================

#[tokio::test]
async fn test_repeated_lookup_shares_one_parse_and_snapshot() {
    let reader = reader(shop_db());
    let first = load(&reader, "orders").await;
    let second = load(&reader, "orders").await;
    assert!(Arc::ptr_eq(&first, &second));
    // orders plus its FK target.
    assert_eq!(reader.parse_cache().table_parse_count(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_lookups_share_one_fetch_and_parse() {
    let db = Arc::new(CountingDb {
        inner: shop_db(),
        ddl_queries: AtomicUsize::new(0),
    });
    let reader = Arc::new(SqliteSchemaReader::new(db.clone()));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let reader = Arc::clone(&reader);
        handles.push(tokio::spawn(async move {
            reader
                .get_table(&Identifier::new("orders").unwrap(), &CancellationToken::new())
                .await
                .unwrap()
                .found()
                .unwrap()
        }));
    }
    let tables: Vec<_> = futures::future::join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    for table in &tables[1..] {
        assert!(Arc::ptr_eq(&tables[0], table));
    }
    // orders plus its FK target, each fetched and parsed exactly once.
    assert_eq!(db.ddl_queries.load(Ordering::SeqCst), 2);
    assert_eq!(reader.parse_cache().table_parse_count(), 2);
}

#[tokio::test]
async fn test_bulk_load_reports_failures_without_aborting() {
    let mut db = shop_db();
    db.tables.push(FixtureTable {
        name: "broken",
        ddl: "CREATE TABLE broken (a INTEGER",
        columns: vec![],
        indexes: vec![],
        triggers: vec![],
    });
    let reader = reader(db);
    let report = reader.load_all_tables(&CancellationToken::new()).await.unwrap();

    assert_eq!(report.tables.len(), 2);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].0, "broken");
    assert!(matches!(report.failures[0].1, SchemaError::Parse { .. }));
}

#[tokio::test]
async fn test_bulk_load_fills_child_keys() {
    let reader = reader(shop_db());
    let report = reader.load_all_tables(&CancellationToken::new()).await.unwrap();
    let customers = report
        .tables
        .iter()
        .find(|t| t.name.local_name == "customers")
        .unwrap();
    assert_eq!(customers.child_keys.len(), 1);
    assert_eq!(customers.child_keys[0].child_table.local_name, "orders");
}

#[tokio::test]
async fn test_cancelled_token_aborts_lookup() {
    let reader = reader(shop_db());
    let token = CancellationToken::new();
    token.cancel();
    let err = reader
        .get_table(&Identifier::new("orders").unwrap(), &token)
        .await
        .unwrap_err();
    assert!(matches!(err, SchemaError::Cancelled));
}

#[tokio::test]
async fn test_cancelled_lookup_leaves_nothing_cached() {
    let reader = reader(shop_db());
    let token = CancellationToken::new();
    token.cancel();
    let _ = reader
        .get_table(&Identifier::new("orders").unwrap(), &token)
        .await;
    // A later uncancelled request succeeds from scratch.
    let table = load(&reader, "orders").await;
    assert_eq!(table.name.local_name, "orders");
}

#[test]
fn test_blocking_lookup_matches_async() {
    let reader = reader(shop_db());
    let table = reader
        .get_table_blocking(&Identifier::new("orders").unwrap(), &CancellationToken::new())
        .unwrap()
        .found()
        .unwrap();
    assert_eq!(table.parent_keys.len(), 1);
}

#[tokio::test]
async fn test_unparseable_trigger_is_skipped_not_fatal() {
    let mut db = shop_db();
    db.tables[0].triggers.push(("trg_bad", "CREATE TRIGGER trg_bad NONSENSE"));
    let reader = reader(db);
    let table = load(&reader, "customers").await;
    // The good trigger survives; the bad one is dropped.
    assert_eq!(table.triggers.len(), 1);
}
