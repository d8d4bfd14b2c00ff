//! Single-flight memoization for derived schema facts.
//!
//! Each provider instance owns its caches; nothing here is process-global.
//! Entries live for the lifetime of the provider and are never invalidated;
//! the model is a read-only snapshot, so there is no write path that could
//! make them stale.

use std::hash::Hash;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::OnceCell;

use crate::error::SchemaError;
use crate::parser::{ParsedTableData, ParsedTrigger, TableDdlParser, TriggerDdlParser};

/// A concurrent map where each key's value is computed at most once.
///
/// Concurrent requests for the same key share one in-flight computation; no
/// fact is computed twice concurrently. A failed or cancelled computation
/// leaves the cell empty, so the next request retries from scratch and a
/// partially-built result is never cached.
pub struct SingleFlightCache<K, V> {
    cells: DashMap<K, Arc<OnceCell<Arc<V>>>>,
}

impl<K, V> SingleFlightCache<K, V>
where
    K: Eq + Hash + Clone,
{
    pub fn new() -> Self {
        Self {
            cells: DashMap::new(),
        }
    }

    /// Get the cached value for `key`, running `init` to produce it if no
    /// other request has already done so or is doing so right now.
    pub async fn get_or_try_init<F, Fut>(&self, key: K, init: F) -> Result<Arc<V>, SchemaError>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<V, SchemaError>>,
    {
        let cell = self
            .cells
            .entry(key)
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();
        let value = cell
            .get_or_try_init(|| async { init().await.map(Arc::new) })
            .await?;
        Ok(Arc::clone(value))
    }

    /// Peek without computing.
    pub fn get(&self, key: &K) -> Option<Arc<V>> {
        self.cells.get(key).and_then(|cell| cell.get().cloned())
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

impl<K: Eq + Hash + Clone, V> Default for SingleFlightCache<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

/// Memoized DDL parsing, keyed by the raw statement text.
///
/// Keying by text rather than table identity means identical DDL is parsed
/// once and shared, and a re-fetched statement that has not changed costs
/// nothing. The pass counters exist so callers (and tests) can verify that
/// a given text triggered exactly one tokenize/parse pass.
pub struct DdlParseCache {
    tables: SingleFlightCache<String, ParsedTableData>,
    triggers: SingleFlightCache<String, ParsedTrigger>,
    table_passes: AtomicUsize,
    trigger_passes: AtomicUsize,
}

impl DdlParseCache {
    pub fn new() -> Self {
        Self {
            tables: SingleFlightCache::new(),
            triggers: SingleFlightCache::new(),
            table_passes: AtomicUsize::new(0),
            trigger_passes: AtomicUsize::new(0),
        }
    }

    /// Parse a `CREATE TABLE` statement, reusing a previous parse of the
    /// exact same text. `object` only attributes errors.
    pub async fn parse_table(
        &self,
        object: &str,
        sql: &str,
    ) -> Result<Arc<ParsedTableData>, SchemaError> {
        self.tables
            .get_or_try_init(sql.to_string(), || async {
                self.table_passes.fetch_add(1, Ordering::Relaxed);
                TableDdlParser::new(object, sql)?.parse()
            })
            .await
    }

    /// Parse a `CREATE TRIGGER` statement, memoized the same way.
    pub async fn parse_trigger(
        &self,
        object: &str,
        sql: &str,
    ) -> Result<Arc<ParsedTrigger>, SchemaError> {
        self.triggers
            .get_or_try_init(sql.to_string(), || async {
                self.trigger_passes.fetch_add(1, Ordering::Relaxed);
                TriggerDdlParser::new(object, sql)?.parse()
            })
            .await
    }

    /// Number of actual `CREATE TABLE` parse passes performed.
    pub fn table_parse_count(&self) -> usize {
        self.table_passes.load(Ordering::Relaxed)
    }

    /// Number of actual `CREATE TRIGGER` parse passes performed.
    pub fn trigger_parse_count(&self) -> usize {
        self.trigger_passes.load(Ordering::Relaxed)
    }
}

impl Default for DdlParseCache {
    fn default() -> Self {
        Self::new()
    }
}
