//! SQLite schema provider.
//!
//! SQLite's pragmas report structure (column order, which index is unique)
//! but not declaration detail (constraint names, check expressions,
//! generated-column formulas). This provider loads both sides, pragma rows
//! through the [`QueryExecutor`] and declaration detail through the DDL
//! parser, and correlates them into the canonical model.
//!
//! Table construction is two-phase to keep mutually-referencing FK graphs
//! from recursing: the *core* phase (columns, keys, indexes, checks,
//! triggers) never loads another table, and relational-key resolution only
//! consults target cores.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::cache::{DdlParseCache, SingleFlightCache};
use crate::catalog::{QueryExecutor, Value};
use crate::engine::{Engine, NameFold};
use crate::error::SchemaError;
use crate::identifier::{Identifier, IdentifierDefaults};
use crate::keys::{child_keys_of, resolve_relational_key, ForeignKeyRequest};
use crate::model::{
    AutoIncrement, CheckConstraint, Column, DbType, Index, IndexColumn, Key, KeyKind,
    RelationalKey, SortOrder, Table, TableArena, Trigger, View,
};
use crate::parser::ParsedTableData;
use crate::resolver::{CatalogLookup, IdentifierResolver, Resolved};

// SQLite folds schema names case-insensitively but sqlite_master compares
// under BINARY collation by default, so every name predicate opts into
// NOCASE to match the engine's own resolution rule.
const SQL_TABLE_DDL: &str =
    "SELECT name, sql FROM sqlite_master WHERE type = 'table' AND name = ? COLLATE NOCASE";
const SQL_TABLE_NAMES: &str =
    "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name";
const SQL_VIEW_DDL: &str =
    "SELECT name, sql FROM sqlite_master WHERE type = 'view' AND name = ? COLLATE NOCASE";
const SQL_TRIGGERS_FOR: &str =
    "SELECT name, sql FROM sqlite_master WHERE type = 'trigger' AND tbl_name = ? COLLATE NOCASE";

/// A table before relational-key resolution: everything that can be built
/// without touching any other table.
#[derive(Debug, Clone)]
struct TableCore {
    table: Table,
    fk_requests: Vec<ForeignKeyRequest>,
}

/// Outcome of a bulk load: one table's failure never aborts the batch.
#[derive(Debug)]
pub struct BulkLoadReport {
    pub tables: Vec<Arc<Table>>,
    pub failures: Vec<(String, SchemaError)>,
}

/// Schema provider for one SQLite database.
///
/// Owns its caches; nothing is shared across provider instances. All caches
/// live until the provider is dropped; the model is a snapshot and there is
/// no invalidation path.
pub struct SqliteSchemaReader {
    executor: Arc<dyn QueryExecutor>,
    resolver: IdentifierResolver,
    parse_cache: DdlParseCache,
    cores: SingleFlightCache<String, TableCore>,
    tables: SingleFlightCache<String, Table>,
    child_keys: SingleFlightCache<String, Vec<RelationalKey>>,
}

impl SqliteSchemaReader {
    pub fn new(executor: Arc<dyn QueryExecutor>) -> Self {
        Self {
            executor,
            resolver: IdentifierResolver::new(Engine::Sqlite, IdentifierDefaults::default()),
            parse_cache: DdlParseCache::new(),
            cores: SingleFlightCache::new(),
            tables: SingleFlightCache::new(),
            child_keys: SingleFlightCache::new(),
        }
    }

    fn fold(&self) -> NameFold {
        Engine::Sqlite.name_fold()
    }

    /// The DDL parse cache, exposed for instrumentation.
    pub fn parse_cache(&self) -> &DdlParseCache {
        &self.parse_cache
    }

    // ========================================================================
    // Public lookups
    // ========================================================================

    /// Names of all user tables.
    pub async fn table_names(&self) -> Result<Vec<String>, SchemaError> {
        let rows = self.executor.query(SQL_TABLE_NAMES, &[]).await?;
        rows.iter()
            .map(|row| row.require_str("name").map(str::to_string))
            .collect()
    }

    /// Load one table with its outgoing foreign keys resolved.
    ///
    /// Absence is a value: an unresolvable identifier yields `NotFound`.
    /// Parse and configuration failures for the table itself are errors.
    pub async fn get_table(
        &self,
        name: &Identifier,
        cancel: &CancellationToken,
    ) -> Result<Resolved<Arc<Table>>, SchemaError> {
        let work = async {
            let resolved = match self.resolver.resolve(self, name).await? {
                Resolved::Found(resolved) => resolved,
                Resolved::NotFound => return Ok(Resolved::NotFound),
            };
            let key = self.fold().apply(&resolved.local_name);
            let table = self
                .tables
                .get_or_try_init(key, || self.build_table(resolved.local_name.clone()))
                .await?;
            Ok(Resolved::Found(table))
        };
        cancellable(cancel, work).await
    }

    /// Blocking form of [`SqliteSchemaReader::get_table`].
    pub fn get_table_blocking(
        &self,
        name: &Identifier,
        cancel: &CancellationToken,
    ) -> Result<Resolved<Arc<Table>>, SchemaError> {
        futures::executor::block_on(self.get_table(name, cancel))
    }

    /// Incoming foreign keys of `name`, discovered by scanning every user
    /// table's parent keys. Cached per table after the first scan.
    pub async fn get_child_keys(
        &self,
        name: &Identifier,
        cancel: &CancellationToken,
    ) -> Result<Resolved<Arc<Vec<RelationalKey>>>, SchemaError> {
        let work = async {
            let resolved = match self.resolver.resolve(self, name).await? {
                Resolved::Found(resolved) => resolved,
                Resolved::NotFound => return Ok(Resolved::NotFound),
            };
            let key = self.fold().apply(&resolved.local_name);
            let keys = self
                .child_keys
                .get_or_try_init(key, || async {
                    let arena = self.load_arena().await?;
                    Ok(child_keys_of(&arena, &resolved, self.fold()))
                })
                .await?;
            Ok(Resolved::Found(keys))
        };
        cancellable(cancel, work).await
    }

    /// Blocking form of [`SqliteSchemaReader::get_child_keys`].
    pub fn get_child_keys_blocking(
        &self,
        name: &Identifier,
        cancel: &CancellationToken,
    ) -> Result<Resolved<Arc<Vec<RelationalKey>>>, SchemaError> {
        futures::executor::block_on(self.get_child_keys(name, cancel))
    }

    /// Load every user table. One table's failure is reported in the result
    /// and does not abort the batch; child keys are filled on the returned
    /// snapshots since the whole catalog is in hand anyway.
    pub async fn load_all_tables(
        &self,
        cancel: &CancellationToken,
    ) -> Result<BulkLoadReport, SchemaError> {
        let work = async {
            let names = self.table_names().await?;
            let mut loaded: Vec<Table> = Vec::new();
            let mut failures = Vec::new();
            for name in names {
                let identifier = Identifier::new(name.clone())?;
                match self.get_table(&identifier, cancel).await {
                    Ok(Resolved::Found(table)) => loaded.push((*table).clone()),
                    // A name listed by the catalog that then fails to
                    // resolve means it vanished mid-scan; skip it.
                    Ok(Resolved::NotFound) => {
                        warn!(table = %name, "table disappeared during bulk load")
                    }
                    Err(SchemaError::Cancelled) => return Err(SchemaError::Cancelled),
                    Err(err) => {
                        warn!(table = %name, error = %err, "skipping table in bulk load");
                        failures.push((name, err));
                    }
                }
            }

            let mut arena = TableArena::new(self.fold());
            for table in loaded {
                arena.insert(table)?;
            }
            let handles: Vec<_> = arena.handles().collect();
            for handle in handles {
                let child_keys = child_keys_of(&arena, &arena.get(handle).name.clone(), self.fold());
                arena.get_mut(handle).child_keys = child_keys;
            }

            Ok(BulkLoadReport {
                tables: arena.into_tables().into_iter().map(Arc::new).collect(),
                failures,
            })
        };
        cancellable(cancel, work).await
    }

    /// Blocking form of [`SqliteSchemaReader::load_all_tables`].
    pub fn load_all_tables_blocking(
        &self,
        cancel: &CancellationToken,
    ) -> Result<BulkLoadReport, SchemaError> {
        futures::executor::block_on(self.load_all_tables(cancel))
    }

    /// Load one view: columns via pragma, triggers via DDL recovery.
    pub async fn get_view(
        &self,
        name: &Identifier,
        cancel: &CancellationToken,
    ) -> Result<Resolved<Arc<View>>, SchemaError> {
        let work = async {
            let rows = self
                .executor
                .query(SQL_VIEW_DDL, &[Value::Text(name.local_name.clone())])
                .await?;
            let Some(row) = rows.first() else {
                return Ok(Resolved::NotFound);
            };
            let definition = row.require_str("sql")?.to_string();
            let columns = self
                .pragma_columns(&name.local_name)
                .await?
                .into_iter()
                .map(|info| Column {
                    name: info.name,
                    db_type: DbType::from_declared(info.declared_type.as_deref()),
                    nullable: !info.not_null,
                    default_value: info.default_value,
                    auto_increment: None,
                    computed_expression: None,
                })
                .collect();
            let triggers = self.load_triggers(&name.local_name).await?;
            Ok(Resolved::Found(Arc::new(View {
                name: name.clone(),
                columns,
                definition,
                triggers,
            })))
        };
        cancellable(cancel, work).await
    }

    // ========================================================================
    // Core construction
    // ========================================================================

    async fn core(&self, local_name: &str) -> Result<Arc<TableCore>, SchemaError> {
        let key = self.fold().apply(local_name);
        self.cores
            .get_or_try_init(key, || self.build_core(local_name.to_string()))
            .await
    }

    async fn build_core(&self, local_name: String) -> Result<TableCore, SchemaError> {
        debug!(table = %local_name, "building table core");
        let rows = self
            .executor
            .query(SQL_TABLE_DDL, &[Value::Text(local_name.clone())])
            .await?;
        let row = rows.first().ok_or_else(|| {
            SchemaError::query(format!("no CREATE TABLE text for `{local_name}`"))
        })?;
        // The catalog's spelling of the name is canonical, not the caller's.
        let canonical_name = row.require_str("name")?.to_string();
        let ddl = row
            .get_str("sql")
            .ok_or_else(|| {
                SchemaError::query(format!("no CREATE TABLE text for `{local_name}`"))
            })?
            .to_string();

        let parsed = self.parse_cache.parse_table(&canonical_name, &ddl).await?;
        let pragma_columns = self.pragma_columns(&canonical_name).await?;

        let columns = merge_columns(&parsed, &pragma_columns);
        let primary_key = parsed.primary_key.as_ref().map(|pk| Key {
            name: pk.name.clone(),
            kind: KeyKind::Primary,
            columns: pk.columns.clone(),
            enabled: true,
        });

        let (unique_keys, indexes) = self.correlate_unique_keys(&canonical_name, &parsed).await?;

        let checks = parsed
            .checks
            .iter()
            .map(|check| CheckConstraint {
                name: check.name.clone(),
                expression: parsed.definition_of(check.expression).to_string(),
                columns: check.columns.clone(),
                enabled: true,
            })
            .collect();

        let fk_requests = parsed
            .foreign_keys
            .iter()
            .map(|fk| ForeignKeyRequest {
                name: fk.name.clone(),
                columns: fk.columns.clone(),
                target_table: Identifier {
                    server: None,
                    database: None,
                    schema: None,
                    local_name: fk.target_table.clone(),
                },
                target_kind: if fk.target_columns.is_empty() {
                    KeyKind::Primary
                } else {
                    KeyKind::Unique
                },
                target_key_name: None,
                target_columns: fk.target_columns.clone(),
                delete_code: fk.on_delete.clone(),
                update_code: fk.on_update.clone(),
            })
            .collect();

        let triggers = self.load_triggers(&canonical_name).await?;

        Ok(TableCore {
            table: Table {
                name: Identifier::new(canonical_name)?,
                columns,
                primary_key,
                unique_keys,
                parent_keys: Vec::new(),
                child_keys: Vec::new(),
                indexes,
                checks,
                triggers,
            },
            fk_requests,
        })
    }

    async fn build_table(&self, local_name: String) -> Result<Table, SchemaError> {
        let core = self.core(&local_name).await?;
        let mut table = core.table.clone();
        for request in &core.fk_requests {
            // Only a target absent from the catalog is a configuration
            // defect of this table; a target that exists but fails to load
            // keeps its own error.
            if !self.contains(&request.target_table).await? {
                return Err(SchemaError::config(format!(
                    "foreign key on `{}` references unknown table `{}`",
                    table.name, request.target_table
                )));
            }
            // Targets are loaded as cores only (columns and keys, never the
            // target's own foreign keys), so cyclic references terminate.
            let target = self.core(&request.target_table.local_name).await?;
            let relational =
                resolve_relational_key(&table, request, &target.table, self.fold())?;
            table.parent_keys.push(relational);
        }
        Ok(table)
    }

    /// All cores of the catalog, with parent keys resolved, in one arena.
    async fn load_arena(&self) -> Result<TableArena, SchemaError> {
        let mut arena = TableArena::new(self.fold());
        for name in self.table_names().await? {
            match self.build_table(name.clone()).await {
                Ok(table) => {
                    arena.insert(table)?;
                }
                Err(err) => warn!(table = %name, error = %err, "skipping table in key scan"),
            }
        }
        Ok(arena)
    }

    // ========================================================================
    // Pragma correlation
    // ========================================================================

    async fn pragma_columns(&self, local_name: &str) -> Result<Vec<PragmaColumn>, SchemaError> {
        let sql = format!("PRAGMA table_info({})", quote_identifier(local_name));
        let rows = self.executor.query(&sql, &[]).await?;
        Ok(rows
            .iter()
            .map(|row| PragmaColumn {
                name: row.get_str("name").unwrap_or_default().to_string(),
                declared_type: row.get_str("type").map(str::to_string).filter(|t| !t.is_empty()),
                not_null: row.get_bool("notnull").unwrap_or(false),
                default_value: row.get_str("dflt_value").map(str::to_string),
            })
            .collect())
    }

    /// Correlate pragma-reported unique indexes with parsed UNIQUE
    /// constraints to recover declared names.
    ///
    /// A pragma unique index matches a parsed constraint on exact ordered
    /// column-name-list equality; no match means the key is anonymous. When
    /// two constraints share a column list the first unclaimed one in
    /// declaration order wins; each parsed name is recovered at most once.
    async fn correlate_unique_keys(
        &self,
        local_name: &str,
        parsed: &ParsedTableData,
    ) -> Result<(Vec<Key>, Vec<Index>), SchemaError> {
        let sql = format!("PRAGMA index_list({})", quote_identifier(local_name));
        let index_rows = self.executor.query(&sql, &[]).await?;

        let mut unique_keys: Vec<Key> = Vec::new();
        let mut indexes: Vec<Index> = Vec::new();
        let mut claimed = vec![false; parsed.unique_keys.len()];

        for row in &index_rows {
            let index_name = row.require_str("name")?.to_string();
            let unique = row.get_bool("unique").unwrap_or(false);
            let origin = row.get_str("origin").unwrap_or("c");
            // The index backing the primary key is already modeled as the
            // primary key itself.
            if origin == "pk" {
                continue;
            }

            let info_sql = format!("PRAGMA index_info({})", quote_identifier(&index_name));
            let column_rows = self.executor.query(&info_sql, &[]).await?;
            let columns: Vec<String> = column_rows
                .iter()
                .filter_map(|r| r.get_str("name").map(str::to_string))
                .collect();

            if origin == "u" {
                let matched = parsed.unique_keys.iter().enumerate().find(|(i, key)| {
                    !claimed[*i]
                        && key.columns.len() == columns.len()
                        && key.columns.iter().zip(&columns).all(|(a, b)| a == b)
                });
                let name = matched.map(|(i, key)| {
                    claimed[i] = true;
                    key.name.clone()
                });
                unique_keys.push(Key {
                    name: name.flatten(),
                    kind: KeyKind::Unique,
                    columns,
                    enabled: true,
                });
            } else {
                indexes.push(Index {
                    name: Some(index_name),
                    unique,
                    columns: columns
                        .into_iter()
                        .map(|name| IndexColumn {
                            name,
                            order: SortOrder::Ascending,
                        })
                        .collect(),
                    included_columns: Vec::new(),
                    enabled: true,
                });
            }
        }

        Ok((unique_keys, indexes))
    }

    /// Triggers on one table, recovered from their DDL. A trigger whose text
    /// fails to parse is skipped; the failure is fatal for that one DDL
    /// object only, not for the table.
    async fn load_triggers(&self, local_name: &str) -> Result<Vec<Trigger>, SchemaError> {
        let rows = self
            .executor
            .query(SQL_TRIGGERS_FOR, &[Value::Text(local_name.to_string())])
            .await?;
        let mut triggers = Vec::new();
        for row in &rows {
            let name = row.require_str("name")?;
            let Some(sql) = row.get_str("sql") else {
                continue;
            };
            match self.parse_cache.parse_trigger(name, sql).await {
                Ok(parsed) => triggers.push(Trigger {
                    name: parsed.name.clone(),
                    timing: parsed.timing,
                    event: parsed.event,
                    definition: sql.to_string(),
                }),
                Err(err) => {
                    warn!(trigger = %name, error = %err, "skipping unparseable trigger")
                }
            }
        }
        Ok(triggers)
    }
}

#[async_trait]
impl CatalogLookup for SqliteSchemaReader {
    async fn contains(&self, identifier: &Identifier) -> Result<bool, SchemaError> {
        let rows = self
            .executor
            .query(
                "SELECT 1 AS present FROM sqlite_master WHERE type = 'table' AND name = ? COLLATE NOCASE",
                &[Value::Text(identifier.local_name.clone())],
            )
            .await?;
        Ok(!rows.is_empty())
    }
}

#[derive(Debug, Clone)]
struct PragmaColumn {
    name: String,
    declared_type: Option<String>,
    not_null: bool,
    default_value: Option<String>,
}

/// Build the canonical column list from parsed DDL plus pragma facts.
///
/// Parsed columns drive the order (pragmas omit generated columns on older
/// SQLite versions); pragma rows supply authoritative NOT NULL flags where
/// present. The auto-increment flag comes exclusively from the parser's
/// rowid-alias judgement, never from a pragma flag.
fn merge_columns(parsed: &ParsedTableData, pragma: &[PragmaColumn]) -> Vec<Column> {
    let rowid_alias = parsed.rowid_alias_column().map(|c| c.name.clone());
    parsed
        .columns
        .iter()
        .map(|col| {
            let pragma_row = pragma.iter().find(|p| p.name == col.name);
            let not_null = pragma_row.map(|p| p.not_null).unwrap_or(col.not_null);
            let default_value = col
                .default_value
                .map(|span| parsed.definition_of(span).to_string())
                .or_else(|| pragma_row.and_then(|p| p.default_value.clone()));
            Column {
                name: col.name.clone(),
                db_type: DbType::from_declared(col.declared_type.as_deref()),
                nullable: !not_null,
                default_value,
                auto_increment: rowid_alias
                    .as_deref()
                    .filter(|alias| *alias == col.name)
                    .map(|_| AutoIncrement::default()),
                computed_expression: col
                    .computed
                    .as_ref()
                    .map(|c| parsed.definition_of(c.expression).to_string()),
            }
        })
        .collect()
}

/// Double-quote an identifier for pragma interpolation.
fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Race `work` against cancellation. Dropping the in-flight work discards
/// any partially-built result: single-flight cells are only filled by a
/// computation that ran to completion.
async fn cancellable<T>(
    cancel: &CancellationToken,
    work: impl std::future::Future<Output = Result<T, SchemaError>>,
) -> Result<T, SchemaError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(SchemaError::Cancelled),
        result = work => result,
    }
}
