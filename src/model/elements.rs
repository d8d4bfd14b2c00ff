//! Canonical metadata element types.
//!
//! Every struct here is an immutable snapshot: providers build a value once
//! per introspection pass and hand out shared references. There is no write
//! path back to the catalog.

use crate::identifier::Identifier;
use crate::model::types::{AutoIncrement, DbType};
use crate::util::eq_ci;

/// A table or view column.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub db_type: DbType,
    pub nullable: bool,
    /// Verbatim default-value text as declared, if any.
    pub default_value: Option<String>,
    pub auto_increment: Option<AutoIncrement>,
    /// Verbatim generation expression for computed columns.
    pub computed_expression: Option<String>,
}

impl Column {
    pub fn is_computed(&self) -> bool {
        self.computed_expression.is_some()
    }
}

/// Kind of a declared key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyKind {
    Primary,
    Unique,
    Foreign,
}

impl KeyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyKind::Primary => "PRIMARY KEY",
            KeyKind::Unique => "UNIQUE",
            KeyKind::Foreign => "FOREIGN KEY",
        }
    }
}

/// A primary, unique, or foreign key on one table.
#[derive(Debug, Clone, PartialEq)]
pub struct Key {
    /// Constraint name; anonymous constraints have none.
    pub name: Option<String>,
    pub kind: KeyKind,
    /// Ordered list of column names.
    pub columns: Vec<String>,
    pub enabled: bool,
}

/// Canonical referential action for FK delete/update rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReferentialAction {
    #[default]
    NoAction,
    Cascade,
    SetNull,
    SetDefault,
}

impl ReferentialAction {
    /// Map an engine-native action code onto the canonical set.
    ///
    /// Unknown or absent codes mean the engine default, which is NoAction;
    /// RESTRICT differs from NO ACTION only in deferral timing, which the
    /// model does not track.
    pub fn from_code(code: Option<&str>) -> ReferentialAction {
        let Some(code) = code else {
            return ReferentialAction::NoAction;
        };
        let code = code.trim();
        if eq_ci(code, "CASCADE") {
            ReferentialAction::Cascade
        } else if eq_ci(code, "SET NULL") {
            ReferentialAction::SetNull
        } else if eq_ci(code, "SET DEFAULT") {
            ReferentialAction::SetDefault
        } else {
            ReferentialAction::NoAction
        }
    }
}

/// A resolved foreign-key relationship: the child key, the parent key it
/// references, and the declared actions.
#[derive(Debug, Clone, PartialEq)]
pub struct RelationalKey {
    pub child_table: Identifier,
    pub child: Key,
    pub parent_table: Identifier,
    pub parent: Key,
    pub delete_action: ReferentialAction,
    pub update_action: ReferentialAction,
}

/// Sort order of an index column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

/// One ordered column of an index.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexColumn {
    pub name: String,
    pub order: SortOrder,
}

/// An index on a table.
#[derive(Debug, Clone, PartialEq)]
pub struct Index {
    pub name: Option<String>,
    pub unique: bool,
    pub columns: Vec<IndexColumn>,
    /// Leaf-level included columns, for engines that support them.
    pub included_columns: Vec<String>,
    pub enabled: bool,
}

/// A check constraint.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckConstraint {
    pub name: Option<String>,
    /// Verbatim expression text as declared.
    pub expression: String,
    /// Names of the table columns the expression references; always a subset
    /// of the table's columns.
    pub columns: Vec<String>,
    pub enabled: bool,
}

/// When a trigger fires relative to its statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerTiming {
    Before,
    After,
    InsteadOf,
}

/// The statement kind a trigger fires on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerEvent {
    Insert,
    Update,
    Delete,
}

/// A trigger attached to a table or view.
#[derive(Debug, Clone, PartialEq)]
pub struct Trigger {
    pub name: String,
    pub timing: TriggerTiming,
    pub event: TriggerEvent,
    /// Verbatim definition text.
    pub definition: String,
}

/// A sequence object.
#[derive(Debug, Clone, PartialEq)]
pub struct Sequence {
    pub name: Identifier,
    pub start: Option<i64>,
    pub increment: Option<i64>,
    pub min_value: Option<i64>,
    pub max_value: Option<i64>,
    pub cycles: bool,
}

/// A synonym/alias for another object.
#[derive(Debug, Clone, PartialEq)]
pub struct Synonym {
    pub name: Identifier,
    pub target: Identifier,
}

/// Kind of a stored routine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutineKind {
    Procedure,
    Function,
}

/// A stored procedure or function.
#[derive(Debug, Clone, PartialEq)]
pub struct Routine {
    pub name: Identifier,
    pub kind: RoutineKind,
    pub definition: Option<String>,
    pub return_type: Option<DbType>,
}

/// A table with its full resolved metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub name: Identifier,
    pub columns: Vec<Column>,
    pub primary_key: Option<Key>,
    pub unique_keys: Vec<Key>,
    /// Outgoing foreign keys (this table is the child).
    pub parent_keys: Vec<RelationalKey>,
    /// Incoming foreign keys (this table is the parent). Discovered lazily
    /// by scanning every table's parent keys; empty until then.
    pub child_keys: Vec<RelationalKey>,
    pub indexes: Vec<Index>,
    pub checks: Vec<CheckConstraint>,
    pub triggers: Vec<Trigger>,
}

impl Table {
    /// Look up a column by name (byte-exact).
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// The named unique key, if declared.
    pub fn unique_key(&self, name: &str) -> Option<&Key> {
        self.unique_keys
            .iter()
            .find(|k| k.name.as_deref() == Some(name))
    }
}

/// A view: columns plus the defining query, no keys of its own.
#[derive(Debug, Clone, PartialEq)]
pub struct View {
    pub name: Identifier,
    pub columns: Vec<Column>,
    pub definition: String,
    pub triggers: Vec<Trigger>,
}
