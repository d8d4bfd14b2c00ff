//! Arena storage for one catalog's tables.
//!
//! Foreign keys make table graphs mutually referencing. Instead
//! of nesting table objects inside each other, all tables of one catalog
//! live in a single arena and keys refer to tables through [`TableHandle`]
//! lookups, so construction never recurses unboundedly.

use std::collections::HashMap;

use crate::engine::NameFold;
use crate::error::SchemaError;
use crate::identifier::{FoldedIdentifier, Identifier};
use crate::model::elements::Table;

/// Index of one table inside a [`TableArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TableHandle(usize);

/// All tables of one catalog, indexed by fold-normalized identifier.
#[derive(Debug)]
pub struct TableArena {
    fold: NameFold,
    tables: Vec<Table>,
    by_name: HashMap<FoldedIdentifier, TableHandle>,
}

impl TableArena {
    pub fn new(fold: NameFold) -> Self {
        Self {
            fold,
            tables: Vec::new(),
            by_name: HashMap::new(),
        }
    }

    /// Add a table. Two tables with fold-equal names cannot coexist in one
    /// catalog.
    pub fn insert(&mut self, table: Table) -> Result<TableHandle, SchemaError> {
        let key = table.name.folded_key(self.fold);
        if self.by_name.contains_key(&key) {
            return Err(SchemaError::config(format!(
                "duplicate table `{}` in arena",
                table.name
            )));
        }
        let handle = TableHandle(self.tables.len());
        self.tables.push(table);
        self.by_name.insert(key, handle);
        Ok(handle)
    }

    pub fn get(&self, handle: TableHandle) -> &Table {
        &self.tables[handle.0]
    }

    pub fn get_mut(&mut self, handle: TableHandle) -> &mut Table {
        &mut self.tables[handle.0]
    }

    /// Handle of the table with this exact (folded) identifier.
    pub fn lookup(&self, name: &Identifier) -> Option<TableHandle> {
        self.by_name.get(&name.folded_key(self.fold)).copied()
    }

    /// Handle of the table whose local name fold-matches `local`, ignoring
    /// higher components. SQLite FK targets are bare names, so this is the
    /// lookup that resolves them.
    pub fn lookup_local(&self, local: &str) -> Option<TableHandle> {
        self.tables
            .iter()
            .position(|t| self.fold.eq(&t.name.local_name, local))
            .map(TableHandle)
    }

    pub fn handles(&self) -> impl Iterator<Item = TableHandle> + '_ {
        (0..self.tables.len()).map(TableHandle)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Table> {
        self.tables.iter()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn into_tables(self) -> Vec<Table> {
        self.tables
    }
}
