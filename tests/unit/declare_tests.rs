//! Declarative table modelling tests

use pretty_assertions::assert_eq;

use schemascan::declare::{
    reflect_table, ColumnSpec, ForeignKeySpec, TableDefinition, TableSpec,
};
use schemascan::error::SchemaError;
use schemascan::model::{DbType, KeyKind, ReferentialAction};

struct Departments;

impl TableDefinition for Departments {
    fn definition() -> TableSpec {
        TableSpec::builder("departments")
            .column(ColumnSpec::new("id", DbType::integer()).not_null().auto_increment())
            .column(ColumnSpec::new("code", DbType::varchar(8)).not_null())
            .column(ColumnSpec::new("name", DbType::varchar(80)).not_null())
            .primary_key(Some("pk_departments"), ["id"])
            .unique_key(Some("uq_departments_code"), ["code"])
            .build()
    }
}

struct Employees;

impl TableDefinition for Employees {
    fn definition() -> TableSpec {
        TableSpec::builder("employees")
            .column(ColumnSpec::new("id", DbType::integer()).not_null())
            .column(ColumnSpec::new("department_id", DbType::integer()).not_null())
            .column(ColumnSpec::new("salary", DbType::integer()).default_value("0"))
            .primary_key(None, ["id"])
            .check(Some("ck_salary"), "(salary >= 0)", ["salary"])
            .index(Some("ix_employees_department"), false, ["department_id"])
            .foreign_key(
                ForeignKeySpec::new(Some("fk_employees_department"), ["department_id"])
                    .references::<Departments>()
                    .on_delete(ReferentialAction::Cascade),
            )
            .build()
    }
}

#[test]
fn test_reflected_table_carries_all_declared_elements() {
    let table = reflect_table::<Employees>().unwrap();
    assert_eq!(table.name.local_name, "employees");
    assert_eq!(table.columns.len(), 3);
    assert!(!table.column("id").unwrap().nullable);
    assert_eq!(table.column("salary").unwrap().default_value.as_deref(), Some("0"));
    assert_eq!(table.checks[0].name.as_deref(), Some("ck_salary"));
    assert_eq!(table.indexes[0].name.as_deref(), Some("ix_employees_department"));
}

#[test]
fn test_foreign_key_resolves_against_target_definition() {
    let table = reflect_table::<Employees>().unwrap();
    assert_eq!(table.parent_keys.len(), 1);
    let rk = &table.parent_keys[0];
    assert_eq!(rk.child_table.local_name, "employees");
    assert_eq!(rk.parent_table.local_name, "departments");
    assert_eq!(rk.parent.kind, KeyKind::Primary);
    assert_eq!(rk.parent.name.as_deref(), Some("pk_departments"));
    assert_eq!(rk.delete_action, ReferentialAction::Cascade);
    assert_eq!(rk.update_action, ReferentialAction::NoAction);
}

#[test]
fn test_second_primary_key_declaration_is_rejected() {
    struct DoublyKeyed;
    impl TableDefinition for DoublyKeyed {
        fn definition() -> TableSpec {
            TableSpec::builder("doubly_keyed")
                .column(ColumnSpec::new("a", DbType::integer()))
                .column(ColumnSpec::new("b", DbType::integer()))
                .primary_key(None, ["a"])
                .primary_key(None, ["b"])
                .build()
        }
    }

    let err = reflect_table::<DoublyKeyed>().unwrap_err();
    assert!(matches!(err, SchemaError::Configuration { .. }));
    assert!(
        err.to_string().contains("more than one primary key"),
        "unexpected message: {err}"
    );
}

#[test]
fn test_incompatible_foreign_key_types_rejected() {
    struct Mismatched;
    impl TableDefinition for Mismatched {
        fn definition() -> TableSpec {
            TableSpec::builder("mismatched")
                .column(ColumnSpec::new("id", DbType::integer()).not_null())
                .column(ColumnSpec::new("department_id", DbType::varchar(10)))
                .primary_key(None, ["id"])
                .foreign_key(
                    ForeignKeySpec::new(None, ["department_id"]).references::<Departments>(),
                )
                .build()
        }
    }

    let err = reflect_table::<Mismatched>().unwrap_err();
    assert!(matches!(err, SchemaError::Configuration { .. }));
}

#[test]
fn test_mutually_referencing_definitions_terminate() {
    struct Chickens;
    struct Eggs;
    impl TableDefinition for Chickens {
        fn definition() -> TableSpec {
            TableSpec::builder("chickens")
                .column(ColumnSpec::new("id", DbType::integer()).not_null())
                .column(ColumnSpec::new("hatched_from", DbType::integer()))
                .primary_key(None, ["id"])
                .foreign_key(ForeignKeySpec::new(None, ["hatched_from"]).references::<Eggs>())
                .build()
        }
    }
    impl TableDefinition for Eggs {
        fn definition() -> TableSpec {
            TableSpec::builder("eggs")
                .column(ColumnSpec::new("id", DbType::integer()).not_null())
                .column(ColumnSpec::new("laid_by", DbType::integer()))
                .primary_key(None, ["id"])
                .foreign_key(ForeignKeySpec::new(None, ["laid_by"]).references::<Chickens>())
                .build()
        }
    }

    let chickens = reflect_table::<Chickens>().unwrap();
    let eggs = reflect_table::<Eggs>().unwrap();
    assert_eq!(chickens.parent_keys[0].parent_table.local_name, "eggs");
    assert_eq!(eggs.parent_keys[0].parent_table.local_name, "chickens");
}

#[test]
fn test_reference_to_unique_key_by_columns() {
    struct Budgets;
    impl TableDefinition for Budgets {
        fn definition() -> TableSpec {
            TableSpec::builder("budgets")
                .column(ColumnSpec::new("id", DbType::integer()).not_null())
                .column(ColumnSpec::new("department_code", DbType::varchar(8)))
                .primary_key(None, ["id"])
                .foreign_key(
                    ForeignKeySpec::new(None, ["department_code"])
                        .references_columns::<Departments, _, _>(["code"]),
                )
                .build()
        }
    }

    let table = reflect_table::<Budgets>().unwrap();
    assert_eq!(
        table.parent_keys[0].parent.name.as_deref(),
        Some("uq_departments_code")
    );
}
