//! Supported database engines and their identifier conventions.
//!
//! The canonical metadata model is engine-agnostic; the engine only decides
//! how identifiers fold for catalog comparison and which schema a bare name
//! lands in when the caller supplies no default.

/// A supported database engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Engine {
    SqlServer,
    PostgreSql,
    MySql,
    Oracle,
    Sqlite,
}

/// How an engine folds unquoted identifiers when comparing against its catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameFold {
    /// Compare byte-for-byte (MySQL on case-sensitive filesystems).
    Exact,
    /// Compare ASCII case-insensitively (SQL Server default collations, SQLite).
    CaseInsensitive,
    /// Catalog stores unquoted names lower-cased (PostgreSQL).
    Lower,
    /// Catalog stores unquoted names upper-cased (Oracle).
    Upper,
}

impl Engine {
    /// The fold rule this engine applies to unquoted identifiers.
    pub fn name_fold(&self) -> NameFold {
        match self {
            Engine::SqlServer | Engine::Sqlite => NameFold::CaseInsensitive,
            Engine::PostgreSql => NameFold::Lower,
            Engine::Oracle => NameFold::Upper,
            Engine::MySql => NameFold::Exact,
        }
    }

    /// The schema a bare object name belongs to when no default is configured.
    ///
    /// MySQL and SQLite have no schema tier below the database; Oracle's
    /// "schema" is the connected user, which only the caller knows.
    pub fn default_schema(&self) -> Option<&'static str> {
        match self {
            Engine::SqlServer => Some("dbo"),
            Engine::PostgreSql => Some("public"),
            Engine::MySql | Engine::Oracle | Engine::Sqlite => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Engine::SqlServer => "sqlserver",
            Engine::PostgreSql => "postgresql",
            Engine::MySql => "mysql",
            Engine::Oracle => "oracle",
            Engine::Sqlite => "sqlite",
        }
    }
}

impl NameFold {
    /// Fold a single name component for catalog comparison.
    pub fn apply(&self, name: &str) -> String {
        match self {
            NameFold::Exact => name.to_string(),
            // Case-insensitive comparison is implemented by lower-casing both
            // sides, so the folded key is the lower-cased form.
            NameFold::CaseInsensitive | NameFold::Lower => name.to_ascii_lowercase(),
            NameFold::Upper => name.to_ascii_uppercase(),
        }
    }

    /// Compare two name components under this fold rule.
    pub fn eq(&self, a: &str, b: &str) -> bool {
        match self {
            NameFold::Exact => a == b,
            NameFold::CaseInsensitive => a.eq_ignore_ascii_case(b),
            NameFold::Lower | NameFold::Upper => a.eq_ignore_ascii_case(b),
        }
    }
}

impl std::fmt::Display for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
