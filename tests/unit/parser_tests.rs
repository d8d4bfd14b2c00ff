//! CREATE TABLE / CREATE TRIGGER DDL recovery tests

use pretty_assertions::assert_eq;

use schemascan::error::SchemaError;
use schemascan::model::{TriggerEvent, TriggerTiming};
use schemascan::parser::{TableDdlParser, TriggerDdlParser};

fn parse_table(sql: &str) -> schemascan::parser::ParsedTableData {
    TableDdlParser::new("test_object", sql)
        .unwrap()
        .parse()
        .unwrap_or_else(|e| panic!("failed to parse: {e}"))
}

// ============================================================================
// Column and constraint recovery
// ============================================================================

#[test]
fn test_computed_and_check_definitions_are_source_slices() {
    let data = parse_table(
        "CREATE TABLE t (\n\
         \x20   a INTEGER,\n\
         \x20   b INTEGER,\n\
         \x20   c AS (a+b),\n\
         \x20   CONSTRAINT ck1 CHECK (a>0)\n\
         )",
    );

    let computed = data.columns[2].computed.as_ref().unwrap();
    assert_eq!(data.definition_of(computed.expression), "a+b");
    assert!(!computed.stored);

    assert_eq!(data.checks.len(), 1);
    assert_eq!(data.checks[0].name.as_deref(), Some("ck1"));
    assert_eq!(data.definition_of(data.checks[0].expression), "(a>0)");
    assert_eq!(data.checks[0].columns, vec!["a".to_string()]);
}

#[test]
fn test_check_columns_in_expression_order_without_duplicates() {
    let data =
        parse_table("CREATE TABLE t (x INTEGER, y INTEGER, CHECK (y > x AND y < x * 10))");
    assert_eq!(data.checks[0].columns, vec!["y".to_string(), "x".to_string()]);
}

#[test]
fn test_default_value_text_is_verbatim() {
    let data = parse_table(
        "CREATE TABLE t (a TEXT DEFAULT 'n/a', b INTEGER DEFAULT (1 + 2), c INTEGER DEFAULT -5)",
    );
    let default = |i: usize| data.definition_of(data.columns[i].default_value.unwrap());
    assert_eq!(default(0), "'n/a'");
    assert_eq!(default(1), "(1 + 2)");
    assert_eq!(default(2), "-5");
}

#[test]
fn test_declared_type_text_kept_exactly() {
    let data = parse_table("CREATE TABLE t (a VarChar(30), b DOUBLE PRECISION, c INTEGER)");
    assert_eq!(data.columns[0].declared_type.as_deref(), Some("VarChar(30)"));
    assert_eq!(
        data.columns[1].declared_type.as_deref(),
        Some("DOUBLE PRECISION")
    );
    assert_eq!(data.columns[2].declared_type.as_deref(), Some("INTEGER"));
}

#[test]
fn test_named_table_level_keys() {
    let data = parse_table(
        "CREATE TABLE t (\
             a INTEGER, b INTEGER, c TEXT,\
             CONSTRAINT pk_t PRIMARY KEY (a, b),\
             CONSTRAINT uq_t_c UNIQUE (c)\
         )",
    );
    let pk = data.primary_key.as_ref().unwrap();
    assert_eq!(pk.name.as_deref(), Some("pk_t"));
    assert_eq!(pk.columns, vec!["a".to_string(), "b".to_string()]);
    assert_eq!(data.unique_keys[0].name.as_deref(), Some("uq_t_c"));
}

#[test]
fn test_foreign_key_actions_recovered() {
    let data = parse_table(
        "CREATE TABLE orders (\
             id INTEGER PRIMARY KEY,\
             customer_id INTEGER NOT NULL,\
             CONSTRAINT fk_orders_customer FOREIGN KEY (customer_id)\
                 REFERENCES customers (id) ON DELETE CASCADE ON UPDATE SET NULL\
         )",
    );
    let fk = &data.foreign_keys[0];
    assert_eq!(fk.name.as_deref(), Some("fk_orders_customer"));
    assert_eq!(fk.columns, vec!["customer_id".to_string()]);
    assert_eq!(fk.target_table, "customers");
    assert_eq!(fk.target_columns, vec!["id".to_string()]);
    assert_eq!(fk.on_delete.as_deref(), Some("CASCADE"));
    assert_eq!(fk.on_update.as_deref(), Some("SET NULL"));
}

#[test]
fn test_column_level_references_becomes_foreign_key() {
    let data = parse_table(
        "CREATE TABLE orders (id INTEGER PRIMARY KEY, \
         customer_id INTEGER REFERENCES customers(id) ON DELETE CASCADE)",
    );
    let fk = &data.foreign_keys[0];
    assert!(fk.name.is_none());
    assert_eq!(fk.columns, vec!["customer_id".to_string()]);
    assert_eq!(fk.on_delete.as_deref(), Some("CASCADE"));
    assert!(fk.on_update.is_none());
}

// ============================================================================
// Rowid aliasing
// ============================================================================

#[test]
fn test_sole_integer_primary_key_aliases_rowid() {
    let data = parse_table("CREATE TABLE t (id INTEGER PRIMARY KEY, name TEXT)");
    assert_eq!(data.rowid_alias_column().unwrap().name, "id");
}

#[test]
fn test_int_primary_key_is_not_a_rowid_alias() {
    // Only the exact spelling INTEGER aliases the rowid.
    let data = parse_table("CREATE TABLE t (id INT PRIMARY KEY)");
    assert!(data.rowid_alias_column().is_none());
}

#[test]
fn test_without_rowid_table_has_no_alias() {
    let data = parse_table("CREATE TABLE t (id INTEGER PRIMARY KEY) WITHOUT ROWID");
    assert!(data.without_rowid);
    assert!(data.rowid_alias_column().is_none());
}

#[test]
fn test_composite_primary_key_has_no_alias() {
    let data = parse_table("CREATE TABLE t (a INTEGER, b INTEGER, PRIMARY KEY (a, b))");
    assert!(data.rowid_alias_column().is_none());
}

// ============================================================================
// Errors
// ============================================================================

#[test]
fn test_parse_error_carries_object_offset_and_sql() {
    let sql = "CREATE TABLE t (a INTEGER,)";
    let err = TableDdlParser::new("t", sql).unwrap().parse().unwrap_err();
    match err {
        SchemaError::Parse {
            object,
            offset,
            sql: carried,
            ..
        } => {
            assert_eq!(object, "t");
            assert!(offset <= sql.len());
            assert_eq!(carried, sql);
        }
        other => panic!("expected Parse error, got {other:?}"),
    }
}

#[test]
fn test_truncated_statement_is_a_parse_error() {
    let err = TableDdlParser::new("t", "CREATE TABLE t (a INTEGER")
        .unwrap()
        .parse()
        .unwrap_err();
    assert!(matches!(err, SchemaError::Parse { .. }));
}

// ============================================================================
// Triggers
// ============================================================================

#[test]
fn test_trigger_timing_and_event() {
    let parsed = TriggerDdlParser::new(
        "trg",
        "CREATE TRIGGER trg AFTER UPDATE OF email ON users BEGIN SELECT 1; END",
    )
    .unwrap()
    .parse()
    .unwrap();
    assert_eq!(parsed.name, "trg");
    assert_eq!(parsed.table_name, "users");
    assert_eq!(parsed.timing, TriggerTiming::After);
    assert_eq!(parsed.event, TriggerEvent::Update);
}

#[test]
fn test_trigger_without_timing_defaults_to_before() {
    let parsed = TriggerDdlParser::new(
        "trg",
        "CREATE TRIGGER trg DELETE ON users BEGIN SELECT 1; END",
    )
    .unwrap()
    .parse()
    .unwrap();
    assert_eq!(parsed.timing, TriggerTiming::Before);
    assert_eq!(parsed.event, TriggerEvent::Delete);
}
