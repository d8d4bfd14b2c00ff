//! Relational-key resolution.
//!
//! Matches a table's declared or derived foreign key to the target table's
//! primary/unique key, validates that the paired columns are type-compatible,
//! and maps engine-native action codes onto the canonical set. Any mismatch
//! is a fatal configuration error for that one key, never retried and never
//! silently repaired.

use tracing::debug;

use crate::engine::NameFold;
use crate::error::SchemaError;
use crate::identifier::Identifier;
use crate::model::{
    Column, Key, KeyKind, ReferentialAction, RelationalKey, Table, TableArena,
};

/// A declared or derived foreign key, before resolution.
#[derive(Debug, Clone)]
pub struct ForeignKeyRequest {
    pub name: Option<String>,
    /// Ordered child column names.
    pub columns: Vec<String>,
    pub target_table: Identifier,
    /// Whether the key is declared against the target's primary key or a
    /// unique key. Anything else is rejected.
    pub target_kind: KeyKind,
    /// Explicit target key name, when the declaration carries one.
    pub target_key_name: Option<String>,
    /// Explicit referenced columns; empty means "the target's primary key".
    pub target_columns: Vec<String>,
    /// Raw engine action codes, mapped via [`ReferentialAction::from_code`].
    pub delete_code: Option<String>,
    pub update_code: Option<String>,
}

/// Resolve `request` against an already-loaded `parent` table.
///
/// The caller is responsible for locating `parent` (via the resolver or an
/// arena lookup); this function only matches and validates.
pub fn resolve_relational_key(
    child: &Table,
    request: &ForeignKeyRequest,
    parent: &Table,
    fold: NameFold,
) -> Result<RelationalKey, SchemaError> {
    if request.columns.is_empty() {
        return Err(SchemaError::Argument { name: "columns" });
    }
    let parent_key = select_parent_key(parent, request, fold)?;

    if parent_key.columns.len() != request.columns.len() {
        return Err(SchemaError::config(format!(
            "foreign key `{}` on `{}` has {} columns but target key on `{}` has {}",
            request.name.as_deref().unwrap_or("<anonymous>"),
            child.name,
            request.columns.len(),
            parent.name,
            parent_key.columns.len(),
        )));
    }

    for (child_name, parent_name) in request.columns.iter().zip(&parent_key.columns) {
        let child_column = child.column(child_name).ok_or_else(|| {
            SchemaError::config(format!(
                "foreign key on `{}` names unknown column `{}`",
                child.name, child_name
            ))
        })?;
        let parent_column = parent.column(parent_name).ok_or_else(|| {
            SchemaError::config(format!(
                "key on `{}` names unknown column `{}`",
                parent.name, parent_name
            ))
        })?;
        check_column_pair(child_column, parent_column).map_err(|reason| {
            SchemaError::config(format!(
                "foreign key `{}`.`{}` is incompatible with `{}`.`{}`: {}",
                child.name, child_name, parent.name, parent_name, reason
            ))
        })?;
    }

    debug!(
        child = %child.name,
        parent = %parent.name,
        key = request.name.as_deref().unwrap_or("<anonymous>"),
        "resolved relational key"
    );

    Ok(RelationalKey {
        child_table: child.name.clone(),
        child: Key {
            name: request.name.clone(),
            kind: KeyKind::Foreign,
            columns: request.columns.clone(),
            enabled: true,
        },
        parent_table: parent.name.clone(),
        parent: parent_key,
        delete_action: ReferentialAction::from_code(request.delete_code.as_deref()),
        update_action: ReferentialAction::from_code(request.update_code.as_deref()),
    })
}

/// Pick the target key the request references.
fn select_parent_key(
    parent: &Table,
    request: &ForeignKeyRequest,
    fold: NameFold,
) -> Result<Key, SchemaError> {
    match request.target_kind {
        KeyKind::Primary | KeyKind::Unique => {}
        KeyKind::Foreign => {
            return Err(SchemaError::config(format!(
                "foreign key `{}` targets a foreign key on `{}`; only primary or unique keys can be referenced",
                request.name.as_deref().unwrap_or("<anonymous>"),
                parent.name,
            )))
        }
    }

    // An explicit key name binds tightest.
    if let Some(target_name) = &request.target_key_name {
        if let Some(pk) = &parent.primary_key {
            if pk.name.as_deref() == Some(target_name.as_str()) {
                return Ok(pk.clone());
            }
        }
        return parent.unique_key(target_name).cloned().ok_or_else(|| {
            SchemaError::config(format!(
                "table `{}` has no primary or unique key named `{}`",
                parent.name, target_name
            ))
        });
    }

    // Explicit referenced columns: match the primary key first, then unique
    // keys, by exact ordered column-name equality under the engine fold.
    if !request.target_columns.is_empty() {
        let matches = |key: &Key| {
            key.columns.len() == request.target_columns.len()
                && key
                    .columns
                    .iter()
                    .zip(&request.target_columns)
                    .all(|(a, b)| fold.eq(a, b))
        };
        if let Some(pk) = &parent.primary_key {
            if matches(pk) {
                return Ok(pk.clone());
            }
        }
        if let Some(unique) = parent.unique_keys.iter().find(|k| matches(k)) {
            return Ok(unique.clone());
        }
        return Err(SchemaError::config(format!(
            "table `{}` has no primary or unique key over ({})",
            parent.name,
            request.target_columns.join(", ")
        )));
    }

    // Bare reference: the target's primary key.
    match request.target_kind {
        KeyKind::Primary => parent.primary_key.clone().ok_or_else(|| {
            SchemaError::config(format!("table `{}` has no primary key", parent.name))
        }),
        _ => Err(SchemaError::config(format!(
            "foreign key `{}` targets a unique key on `{}` but names neither the key nor its columns",
            request.name.as_deref().unwrap_or("<anonymous>"),
            parent.name,
        ))),
    }
}

/// Type compatibility between one (child, parent) column pair.
///
/// The analog type and data category must match exactly. A fixed-length
/// child may reference a variable-length parent (and vice versa) only when
/// it does not narrow; narrowing means a known child length shorter than a
/// known parent length.
fn check_column_pair(child: &Column, parent: &Column) -> Result<(), String> {
    if child.db_type.analog != parent.db_type.analog {
        return Err(format!(
            "value type {:?} does not match {:?}",
            child.db_type.analog, parent.db_type.analog
        ));
    }
    if child.db_type.category != parent.db_type.category {
        return Err(format!(
            "data category {:?} does not match {:?}",
            child.db_type.category, parent.db_type.category
        ));
    }
    if let (Some(child_len), Some(parent_len)) = (child.db_type.max_length, parent.db_type.max_length)
    {
        if child_len < parent_len {
            return Err(format!(
                "length {} narrows target length {}",
                child_len, parent_len
            ));
        }
    }
    Ok(())
}

/// Incoming foreign keys of `parent`: every arena table's parent keys,
/// filtered by parent-table-name match under the engine fold.
pub fn child_keys_of(arena: &TableArena, parent: &Identifier, fold: NameFold) -> Vec<RelationalKey> {
    arena
        .iter()
        .flat_map(|table| table.parent_keys.iter())
        .filter(|rk| fold.eq(&rk.parent_table.local_name, &parent.local_name))
        .cloned()
        .collect()
}
