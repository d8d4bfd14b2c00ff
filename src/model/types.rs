//! Column type descriptors.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::util::contains_ci;

/// Broad category of a column's data type, shared across engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataCategory {
    Integer,
    Numeric,
    Float,
    String,
    Unicode,
    Text,
    Binary,
    Date,
    Time,
    DateTime,
    Boolean,
    Unknown,
}

/// The closest native value type a column maps to in application code.
///
/// Foreign-key compatibility is checked on this, not on the engine's type
/// name, so `INTEGER` and `BIGINT` columns compare as the same thing while
/// `INTEGER` and `TEXT` never do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnalogType {
    Bool,
    I16,
    I32,
    I64,
    F32,
    F64,
    Decimal,
    String,
    Bytes,
    Date,
    Time,
    DateTime,
    Unknown,
}

/// Auto-increment specification (seed and step).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutoIncrement {
    pub seed: i64,
    pub step: i64,
}

impl Default for AutoIncrement {
    fn default() -> Self {
        Self { seed: 1, step: 1 }
    }
}

/// A column's resolved type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbType {
    /// Engine type name as declared, e.g. `VARCHAR(30)` or `INTEGER`.
    pub type_name: String,
    pub category: DataCategory,
    pub analog: AnalogType,
    /// True for fixed-length types (`CHAR`, `BINARY`), false for
    /// variable-length ones (`VARCHAR`, `BLOB`).
    pub fixed_length: bool,
    /// Maximum length in characters/bytes where the type carries one.
    pub max_length: Option<u32>,
    pub precision: Option<u8>,
    pub scale: Option<u8>,
    pub collation: Option<String>,
}

// `VARCHAR (30)`, `DECIMAL(10, 2)`: base name plus up to two arguments.
static TYPE_ARGS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*([A-Za-z_][A-Za-z0-9_ ]*?)\s*(?:\(\s*(\d+)\s*(?:,\s*(\d+)\s*)?\))?\s*$")
        .expect("type-name pattern is valid")
});

impl DbType {
    /// Build a `DbType` from a declared type-name string using SQLite's
    /// affinity rules, which are substring matches over the declared name.
    ///
    /// A column declared with no type at all gets BLOB affinity (`Binary`).
    pub fn from_declared(declared: Option<&str>) -> DbType {
        let declared = match declared {
            Some(d) if !d.trim().is_empty() => d.trim(),
            _ => {
                return DbType {
                    type_name: String::new(),
                    category: DataCategory::Binary,
                    analog: AnalogType::Bytes,
                    fixed_length: false,
                    max_length: None,
                    precision: None,
                    scale: None,
                    collation: None,
                }
            }
        };

        let (base, arg1, arg2) = match TYPE_ARGS.captures(declared) {
            Some(caps) => (
                caps.get(1).map(|m| m.as_str().trim().to_string()).unwrap_or_default(),
                caps.get(2).and_then(|m| m.as_str().parse::<u32>().ok()),
                caps.get(3).and_then(|m| m.as_str().parse::<u32>().ok()),
            ),
            None => (declared.to_string(), None, None),
        };

        // SQLite affinity order matters: INT before CHAR so that
        // `POINTLESS_INT_CHAR` style names behave like the engine.
        let (category, analog) = if contains_ci(&base, "INT") {
            (DataCategory::Integer, AnalogType::I64)
        } else if contains_ci(&base, "CHAR") || contains_ci(&base, "CLOB") || contains_ci(&base, "TEXT") {
            if contains_ci(&base, "NCHAR") || contains_ci(&base, "NVARCHAR") {
                (DataCategory::Unicode, AnalogType::String)
            } else if contains_ci(&base, "TEXT") || contains_ci(&base, "CLOB") {
                (DataCategory::Text, AnalogType::String)
            } else {
                (DataCategory::String, AnalogType::String)
            }
        } else if contains_ci(&base, "BLOB") {
            (DataCategory::Binary, AnalogType::Bytes)
        } else if contains_ci(&base, "REAL") || contains_ci(&base, "FLOA") || contains_ci(&base, "DOUB") {
            (DataCategory::Float, AnalogType::F64)
        } else if contains_ci(&base, "BOOL") {
            (DataCategory::Boolean, AnalogType::Bool)
        } else if contains_ci(&base, "DATETIME") || contains_ci(&base, "TIMESTAMP") {
            (DataCategory::DateTime, AnalogType::DateTime)
        } else if contains_ci(&base, "DATE") {
            (DataCategory::Date, AnalogType::Date)
        } else if contains_ci(&base, "TIME") {
            (DataCategory::Time, AnalogType::Time)
        } else {
            (DataCategory::Numeric, AnalogType::Decimal)
        };

        let fixed_length = matches!(category, DataCategory::String | DataCategory::Unicode)
            && !contains_ci(&base, "VAR");

        let (max_length, precision, scale) = match category {
            DataCategory::String | DataCategory::Unicode | DataCategory::Text
            | DataCategory::Binary => (arg1, None, None),
            DataCategory::Numeric | DataCategory::Float => (
                None,
                arg1.and_then(|v| u8::try_from(v).ok()),
                arg2.and_then(|v| u8::try_from(v).ok()),
            ),
            _ => (None, None, None),
        };

        DbType {
            type_name: declared.to_string(),
            category,
            analog,
            fixed_length,
            max_length,
            precision,
            scale,
            collation: None,
        }
    }

    /// Simple integer type, used by the declarative builder and tests.
    pub fn integer() -> DbType {
        DbType::from_declared(Some("INTEGER"))
    }

    /// Variable-length string type of the given maximum length.
    pub fn varchar(max_length: u32) -> DbType {
        DbType::from_declared(Some(&format!("VARCHAR({})", max_length)))
    }
}
