//! Declarative table modelling.
//!
//! Instead of introspecting a live catalog, a caller can describe tables in
//! code: a type implements [`TableDefinition`] and returns a [`TableSpec`]
//! built with the fluent builder. [`reflect_table`] validates the declaration and
//! produces the same canonical [`Table`] an introspection pass would.
//!
//! Foreign-key targets are named by type, not by value: a
//! [`ForeignKeySpec`] stores a function pointer to the target's
//! `definition()` and only materializes the target's *core* (columns and
//! keys, never its own foreign keys) during validation. Two types whose
//! definitions reference each other therefore validate without recursing.

use crate::engine::NameFold;
use crate::error::SchemaError;
use crate::identifier::Identifier;
use crate::keys::{resolve_relational_key, ForeignKeyRequest};
use crate::model::{
    AutoIncrement, CheckConstraint, Column, DbType, Index, IndexColumn, Key, KeyKind,
    ReferentialAction, SortOrder, Table,
};

/// A type that describes one table.
pub trait TableDefinition {
    fn definition() -> TableSpec;
}

/// One declared column.
#[derive(Debug, Clone)]
pub struct ColumnSpec {
    name: String,
    db_type: DbType,
    nullable: bool,
    default_value: Option<String>,
    auto_increment: Option<AutoIncrement>,
    computed_expression: Option<String>,
}

impl ColumnSpec {
    pub fn new(name: impl Into<String>, db_type: DbType) -> Self {
        Self {
            name: name.into(),
            db_type,
            nullable: true,
            default_value: None,
            auto_increment: None,
            computed_expression: None,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn default_value(mut self, text: impl Into<String>) -> Self {
        self.default_value = Some(text.into());
        self
    }

    pub fn auto_increment(mut self) -> Self {
        self.auto_increment = Some(AutoIncrement::default());
        self
    }

    pub fn computed(mut self, expression: impl Into<String>) -> Self {
        self.computed_expression = Some(expression.into());
        self
    }

    fn into_column(self) -> Column {
        Column {
            name: self.name,
            db_type: self.db_type,
            nullable: self.nullable,
            default_value: self.default_value,
            auto_increment: self.auto_increment,
            computed_expression: self.computed_expression,
        }
    }
}

/// One declared foreign key, targeting another [`TableDefinition`] type.
#[derive(Debug, Clone)]
pub struct ForeignKeySpec {
    name: Option<String>,
    columns: Vec<String>,
    target: Option<fn() -> TableSpec>,
    target_kind: KeyKind,
    target_key_name: Option<String>,
    target_columns: Vec<String>,
    delete_action: ReferentialAction,
    update_action: ReferentialAction,
}

impl ForeignKeySpec {
    pub fn new<I, S>(name: Option<&str>, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.map(str::to_string),
            columns: columns.into_iter().map(Into::into).collect(),
            target: None,
            target_kind: KeyKind::Primary,
            target_key_name: None,
            target_columns: Vec::new(),
            delete_action: ReferentialAction::NoAction,
            update_action: ReferentialAction::NoAction,
        }
    }

    /// Reference the primary key of `T`.
    pub fn references<T: TableDefinition>(mut self) -> Self {
        self.target = Some(T::definition);
        self.target_kind = KeyKind::Primary;
        self
    }

    /// Reference a unique key of `T` by its constraint name.
    pub fn references_unique<T: TableDefinition>(mut self, key_name: impl Into<String>) -> Self {
        self.target = Some(T::definition);
        self.target_kind = KeyKind::Unique;
        self.target_key_name = Some(key_name.into());
        self
    }

    /// Reference explicit columns of `T`, which must be covered by its
    /// primary key or one of its unique keys.
    pub fn references_columns<T, I, S>(mut self, columns: I) -> Self
    where
        T: TableDefinition,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.target = Some(T::definition);
        self.target_kind = KeyKind::Unique;
        self.target_columns = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn on_delete(mut self, action: ReferentialAction) -> Self {
        self.delete_action = action;
        self
    }

    pub fn on_update(mut self, action: ReferentialAction) -> Self {
        self.update_action = action;
        self
    }
}

/// A complete declared table, ready for [`reflect_table`].
#[derive(Debug, Clone)]
pub struct TableSpec {
    name: String,
    schema: Option<String>,
    columns: Vec<ColumnSpec>,
    /// Every PRIMARY KEY declaration made on the builder. Validation rejects
    /// more than one; collecting them all keeps the error precise.
    primary_keys: Vec<Key>,
    unique_keys: Vec<Key>,
    checks: Vec<CheckConstraint>,
    indexes: Vec<Index>,
    foreign_keys: Vec<ForeignKeySpec>,
}

impl TableSpec {
    pub fn builder(name: impl Into<String>) -> TableSpecBuilder {
        TableSpecBuilder {
            spec: TableSpec {
                name: name.into(),
                schema: None,
                columns: Vec::new(),
                primary_keys: Vec::new(),
                unique_keys: Vec::new(),
                checks: Vec::new(),
                indexes: Vec::new(),
                foreign_keys: Vec::new(),
            },
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Fluent builder for [`TableSpec`].
#[derive(Debug, Clone)]
pub struct TableSpecBuilder {
    spec: TableSpec,
}

impl TableSpecBuilder {
    pub fn schema(mut self, schema: impl Into<String>) -> Self {
        self.spec.schema = Some(schema.into());
        self
    }

    pub fn column(mut self, column: ColumnSpec) -> Self {
        self.spec.columns.push(column);
        self
    }

    pub fn primary_key<I, S>(mut self, name: Option<&str>, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.spec.primary_keys.push(Key {
            name: name.map(str::to_string),
            kind: KeyKind::Primary,
            columns: columns.into_iter().map(Into::into).collect(),
            enabled: true,
        });
        self
    }

    pub fn unique_key<I, S>(mut self, name: Option<&str>, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.spec.unique_keys.push(Key {
            name: name.map(str::to_string),
            kind: KeyKind::Unique,
            columns: columns.into_iter().map(Into::into).collect(),
            enabled: true,
        });
        self
    }

    pub fn check<I, S>(mut self, name: Option<&str>, expression: impl Into<String>, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.spec.checks.push(CheckConstraint {
            name: name.map(str::to_string),
            expression: expression.into(),
            columns: columns.into_iter().map(Into::into).collect(),
            enabled: true,
        });
        self
    }

    pub fn index<I, S>(mut self, name: Option<&str>, unique: bool, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.spec.indexes.push(Index {
            name: name.map(str::to_string),
            unique,
            columns: columns
                .into_iter()
                .map(|name| IndexColumn {
                    name: name.into(),
                    order: SortOrder::Ascending,
                })
                .collect(),
            included_columns: Vec::new(),
            enabled: true,
        });
        self
    }

    pub fn foreign_key(mut self, key: ForeignKeySpec) -> Self {
        self.spec.foreign_keys.push(key);
        self
    }

    pub fn build(self) -> TableSpec {
        self.spec
    }
}

/// Validate `T`'s definition and produce its canonical [`Table`].
///
/// Foreign keys resolve against the targets' cores only, so mutually
/// referencing definitions are fine. Name comparison is case-insensitive,
/// matching how every supported engine treats unquoted declared names.
pub fn reflect_table<T: TableDefinition>() -> Result<Table, SchemaError> {
    let fold = NameFold::CaseInsensitive;
    let spec = T::definition();
    let mut table = core_of(&spec, fold)?;

    for fk in &spec.foreign_keys {
        let target_spec = fk.target.map(|f| f()).ok_or_else(|| {
            SchemaError::config(format!(
                "foreign key `{}` on `{}` declares no target table",
                fk.name.as_deref().unwrap_or("<anonymous>"),
                spec.name,
            ))
        })?;
        let target = core_of(&target_spec, fold)?;
        let request = ForeignKeyRequest {
            name: fk.name.clone(),
            columns: fk.columns.clone(),
            target_table: target.name.clone(),
            target_kind: fk.target_kind,
            target_key_name: fk.target_key_name.clone(),
            target_columns: fk.target_columns.clone(),
            delete_code: Some(action_code(fk.delete_action).to_string()),
            update_code: Some(action_code(fk.update_action).to_string()),
        };
        let relational = resolve_relational_key(&table, &request, &target, fold)?;
        table.parent_keys.push(relational);
    }

    Ok(table)
}

/// Build the foreign-key-free part of a spec's table, validating columns
/// and key declarations.
fn core_of(spec: &TableSpec, fold: NameFold) -> Result<Table, SchemaError> {
    if spec.name.trim().is_empty() {
        return Err(SchemaError::Argument { name: "name" });
    }
    if spec.columns.is_empty() {
        return Err(SchemaError::config(format!(
            "table `{}` declares no columns",
            spec.name
        )));
    }

    let mut columns: Vec<Column> = Vec::with_capacity(spec.columns.len());
    for column_spec in &spec.columns {
        if columns.iter().any(|c| fold.eq(&c.name, &column_spec.name)) {
            return Err(SchemaError::config(format!(
                "table `{}` declares column `{}` more than once",
                spec.name, column_spec.name
            )));
        }
        columns.push(column_spec.clone().into_column());
    }

    if spec.primary_keys.len() > 1 {
        return Err(SchemaError::config(format!(
            "table `{}` declares more than one primary key",
            spec.name
        )));
    }
    let primary_key = spec.primary_keys.first().cloned();

    let known = |name: &str| columns.iter().any(|c| fold.eq(&c.name, name));
    let check_key = |key: &Key| -> Result<(), SchemaError> {
        if key.columns.is_empty() {
            return Err(SchemaError::Argument { name: "columns" });
        }
        for name in &key.columns {
            if !known(name) {
                return Err(SchemaError::config(format!(
                    "{} on `{}` names unknown column `{}`",
                    key.kind.as_str(),
                    spec.name,
                    name
                )));
            }
        }
        Ok(())
    };
    if let Some(pk) = &primary_key {
        check_key(pk)?;
    }
    for unique in &spec.unique_keys {
        check_key(unique)?;
    }
    for check in &spec.checks {
        for name in &check.columns {
            if !known(name) {
                return Err(SchemaError::config(format!(
                    "check constraint on `{}` names unknown column `{}`",
                    spec.name, name
                )));
            }
        }
    }
    for index in &spec.indexes {
        for column in &index.columns {
            if !known(&column.name) {
                return Err(SchemaError::config(format!(
                    "index on `{}` names unknown column `{}`",
                    spec.name, column.name
                )));
            }
        }
    }

    let name = match &spec.schema {
        Some(schema) => Identifier::with_schema(schema.clone(), spec.name.clone())?,
        None => Identifier::new(spec.name.clone())?,
    };

    Ok(Table {
        name,
        columns,
        primary_key,
        unique_keys: spec.unique_keys.clone(),
        parent_keys: Vec::new(),
        child_keys: Vec::new(),
        indexes: spec.indexes.clone(),
        checks: spec.checks.clone(),
        triggers: Vec::new(),
    })
}

fn action_code(action: ReferentialAction) -> &'static str {
    match action {
        ReferentialAction::NoAction => "NO ACTION",
        ReferentialAction::Cascade => "CASCADE",
        ReferentialAction::SetNull => "SET NULL",
        ReferentialAction::SetDefault => "SET DEFAULT",
    }
}
