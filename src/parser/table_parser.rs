//! Recursive-descent `CREATE TABLE` parsing for SQLite DDL recovery.
//!
//! SQLite's pragmas report that a constraint or column exists, but not its
//! name, its check expression, or its generation formula; those live only in
//! the verbatim `CREATE TABLE` text stored in `sqlite_master`. This parser
//! recovers them. Every constrained element retains the byte span of its
//! first and last defining tokens, and its externally-visible definition is
//! always a slice of the original source string.
//!
//! ## Supported syntax
//!
//! ```sql
//! CREATE TABLE [IF NOT EXISTS] [schema.]name (
//!     col [TYPE[(n[,m])]] [CONSTRAINT name] [NOT NULL] [PRIMARY KEY [AUTOINCREMENT]]
//!         [UNIQUE] [CHECK (expr)] [DEFAULT value] [COLLATE name]
//!         [REFERENCES tbl [(cols)] [ON DELETE/UPDATE action]]
//!         [[GENERATED ALWAYS] AS (expr) [STORED | VIRTUAL]],
//!     [CONSTRAINT name] PRIMARY KEY (cols),
//!     [CONSTRAINT name] UNIQUE (cols),
//!     [CONSTRAINT name] CHECK (expr),
//!     [CONSTRAINT name] FOREIGN KEY (cols) REFERENCES tbl [(cols)] [actions]
//! ) [WITHOUT ROWID] [, STRICT]
//! ```

use sqlparser::keywords::Keyword;
use sqlparser::tokenizer::Token;

use crate::error::SchemaError;
use crate::parser::token_parser::{SourceSpan, TokenParser};

/// A generated-column clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedComputed {
    /// Span of the generation expression, excluding the surrounding parens.
    pub expression: SourceSpan,
    pub stored: bool,
}

/// One parsed column definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedColumn {
    pub name: String,
    /// Declared type text exactly as written, e.g. `VARCHAR(30)`.
    pub declared_type: Option<String>,
    pub not_null: bool,
    /// Span of the default value (literal or parenthesized expression).
    pub default_value: Option<SourceSpan>,
    pub computed: Option<ParsedComputed>,
    pub inline_primary_key: bool,
    pub inline_unique: bool,
    /// True only when AUTOINCREMENT was written on an inline PRIMARY KEY.
    pub autoincrement_keyword: bool,
    pub collation: Option<String>,
    /// Span of the whole column definition.
    pub span: SourceSpan,
}

/// A parsed PRIMARY KEY or UNIQUE table constraint (or its inline
/// column-level equivalent).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedKey {
    pub name: Option<String>,
    pub columns: Vec<String>,
    pub span: SourceSpan,
}

/// A parsed CHECK constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCheck {
    pub name: Option<String>,
    /// Span of the check expression including its parentheses.
    pub expression: SourceSpan,
    /// Table columns the expression references, in expression order.
    pub columns: Vec<String>,
    pub span: SourceSpan,
}

/// A parsed FOREIGN KEY clause (table-level or column-level REFERENCES).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedForeignKey {
    pub name: Option<String>,
    pub columns: Vec<String>,
    pub target_table: String,
    /// Referenced columns; empty means the target's primary key.
    pub target_columns: Vec<String>,
    /// Raw action text, e.g. `CASCADE` or `SET NULL`.
    pub on_delete: Option<String>,
    pub on_update: Option<String>,
    pub span: SourceSpan,
}

/// Structured facts recovered from one `CREATE TABLE` statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTableData {
    /// The verbatim statement text every span indexes into.
    pub source: String,
    pub schema: Option<String>,
    pub table_name: String,
    pub columns: Vec<ParsedColumn>,
    pub primary_key: Option<ParsedKey>,
    pub unique_keys: Vec<ParsedKey>,
    pub checks: Vec<ParsedCheck>,
    pub foreign_keys: Vec<ParsedForeignKey>,
    pub without_rowid: bool,
}

impl ParsedTableData {
    /// The exact original text of a parsed element.
    pub fn definition_of(&self, span: SourceSpan) -> &str {
        span.slice(&self.source)
    }

    /// The rowid-alias column, if this table has one.
    ///
    /// A column aliases the rowid, and is therefore the only column that
    /// can auto-increment, exactly when it is the table's sole primary-key
    /// column, its declared type is exactly `INTEGER`, and the table keeps
    /// its rowid. A pragma flag alone never establishes this.
    pub fn rowid_alias_column(&self) -> Option<&ParsedColumn> {
        if self.without_rowid {
            return None;
        }
        let pk = self.primary_key.as_ref()?;
        if pk.columns.len() != 1 {
            return None;
        }
        let candidate = self.columns.iter().find(|c| c.name == pk.columns[0])?;
        let is_integer = candidate
            .declared_type
            .as_deref()
            .is_some_and(|t| t.eq_ignore_ascii_case("INTEGER"));
        is_integer.then_some(candidate)
    }
}

/// Recursive-descent parser over one `CREATE TABLE` statement.
pub struct TableDdlParser {
    base: TokenParser,
}

// Words that end the optional type-name token run of a column definition.
const TYPE_TERMINATORS: &[&str] = &[
    "CONSTRAINT", "PRIMARY", "NOT", "NULL", "UNIQUE", "CHECK", "DEFAULT", "COLLATE",
    "REFERENCES", "GENERATED", "AS",
];

impl TableDdlParser {
    pub fn new(object: &str, sql: &str) -> Result<Self, SchemaError> {
        Ok(Self {
            base: TokenParser::new(object, sql)?,
        })
    }

    /// Parse the statement into [`ParsedTableData`].
    pub fn parse(mut self) -> Result<ParsedTableData, SchemaError> {
        self.base.skip_whitespace();
        self.base.expect_keyword(Keyword::CREATE)?;
        self.base.skip_whitespace();
        let _ = self.base.eat_word_ci("TEMP") || self.base.eat_word_ci("TEMPORARY");
        self.base.expect_keyword(Keyword::TABLE)?;
        self.base.skip_whitespace();
        if self.base.eat_keyword(Keyword::IF) {
            self.base.expect_keyword(Keyword::NOT)?;
            self.base.skip_whitespace();
            self.base.expect_keyword(Keyword::EXISTS)?;
            self.base.skip_whitespace();
        }
        let (schema, table_name) = self.base.parse_qualified_name()?;
        self.base.skip_whitespace();
        self.base.expect_token(&Token::LParen)?;
        self.base.skip_whitespace();

        let mut data = ParsedTableData {
            source: self.base.source().to_string(),
            schema,
            table_name,
            columns: Vec::new(),
            primary_key: None,
            unique_keys: Vec::new(),
            checks: Vec::new(),
            foreign_keys: Vec::new(),
            without_rowid: false,
        };
        // Bare word candidates per check, resolved to columns once the full
        // column list is known.
        let mut check_words: Vec<Vec<String>> = Vec::new();

        loop {
            self.base.skip_whitespace();
            if self.base.check_token(&Token::RParen) {
                break;
            }
            if self.is_table_constraint_start() {
                self.parse_table_constraint(&mut data, &mut check_words)?;
            } else {
                self.parse_column(&mut data, &mut check_words)?;
            }
            self.base.skip_whitespace();
            if self.base.check_token(&Token::Comma) {
                self.base.advance();
                self.base.skip_whitespace();
                if self.base.check_token(&Token::RParen) {
                    return Err(self.base.error_here("expected table element after ,"));
                }
            } else if !self.base.check_token(&Token::RParen) {
                return Err(self.base.error_here("expected , or ) after table element"));
            }
        }
        self.base.expect_token(&Token::RParen)?;
        self.base.skip_whitespace();

        // Table options: WITHOUT ROWID and/or STRICT, comma-separated.
        loop {
            if self.base.eat_word_ci("WITHOUT") {
                self.base.expect_word_ci("ROWID")?;
                data.without_rowid = true;
            } else if !self.base.eat_word_ci("STRICT") {
                break;
            }
            self.base.skip_whitespace();
            if self.base.check_token(&Token::Comma) {
                self.base.advance();
                self.base.skip_whitespace();
            } else {
                break;
            }
        }

        // Resolve each check's referenced columns against the final column
        // list, preserving expression order and dropping duplicates.
        let column_names: Vec<&str> = data.columns.iter().map(|c| c.name.as_str()).collect();
        for (check, words) in data.checks.iter_mut().zip(check_words) {
            let mut seen: Vec<String> = Vec::new();
            for word in words {
                if column_names.iter().any(|c| c.eq_ignore_ascii_case(&word))
                    && !seen.iter().any(|s| s.eq_ignore_ascii_case(&word))
                {
                    seen.push(word);
                }
            }
            check.columns = seen;
        }

        Ok(data)
    }

    fn is_table_constraint_start(&self) -> bool {
        self.base.check_keyword(Keyword::CONSTRAINT)
            || self.base.check_keyword(Keyword::PRIMARY)
            || self.base.check_keyword(Keyword::UNIQUE)
            || self.base.check_keyword(Keyword::CHECK)
            || self.base.check_keyword(Keyword::FOREIGN)
    }

    // ========================================================================
    // Column definitions
    // ========================================================================

    fn parse_column(
        &mut self,
        data: &mut ParsedTableData,
        check_words: &mut Vec<Vec<String>>,
    ) -> Result<(), SchemaError> {
        let start_index = self.base.pos();
        let name = self.base.parse_identifier()?;
        self.base.skip_whitespace();

        let declared_type = self.parse_declared_type()?;

        let mut column = ParsedColumn {
            name,
            declared_type,
            not_null: false,
            default_value: None,
            computed: None,
            inline_primary_key: false,
            inline_unique: false,
            autoincrement_keyword: false,
            collation: None,
            span: SourceSpan { start: 0, end: 0 },
        };

        // Column constraints until the next comma or the closing paren.
        let mut pending_name: Option<String> = None;
        let mut inline_pk_name: Option<String> = None;
        loop {
            self.base.skip_whitespace();
            if self.base.check_token(&Token::Comma) || self.base.check_token(&Token::RParen) {
                break;
            }
            if self.base.eat_keyword(Keyword::CONSTRAINT) {
                pending_name = Some(self.base.parse_identifier()?);
                continue;
            }
            if self.base.eat_keyword(Keyword::PRIMARY) {
                self.base.expect_keyword(Keyword::KEY)?;
                self.base.skip_whitespace();
                let _ = self.base.eat_keyword(Keyword::ASC) || self.base.eat_keyword(Keyword::DESC);
                self.skip_conflict_clause()?;
                if self.base.eat_word_ci("AUTOINCREMENT") {
                    column.autoincrement_keyword = true;
                }
                column.inline_primary_key = true;
                if data.primary_key.is_some() {
                    return Err(self.base.error_here("table has more than one PRIMARY KEY"));
                }
                inline_pk_name = pending_name.take();
                continue;
            }
            if self.base.eat_keyword(Keyword::NOT) {
                self.base.expect_keyword(Keyword::NULL)?;
                self.skip_conflict_clause()?;
                column.not_null = true;
                pending_name = None;
                continue;
            }
            if self.base.eat_keyword(Keyword::NULL) {
                pending_name = None;
                continue;
            }
            if self.base.eat_keyword(Keyword::UNIQUE) {
                self.skip_conflict_clause()?;
                column.inline_unique = true;
                data.unique_keys.push(ParsedKey {
                    name: pending_name.take(),
                    columns: vec![column.name.clone()],
                    span: self.base.span_from(start_index),
                });
                continue;
            }
            if self.base.check_keyword(Keyword::CHECK) {
                let constraint_start = self.base.pos();
                self.base.advance();
                self.base.skip_whitespace();
                let (outer, _inner) = self.base.consume_parenthesized()?;
                let words = self.words_in_span(constraint_start);
                data.checks.push(ParsedCheck {
                    name: pending_name.take(),
                    expression: outer,
                    columns: Vec::new(),
                    span: self.base.span_from(constraint_start),
                });
                check_words.push(words);
                continue;
            }
            if self.base.eat_keyword(Keyword::DEFAULT) {
                column.default_value = Some(self.parse_default_value()?);
                pending_name = None;
                continue;
            }
            if self.base.eat_keyword(Keyword::COLLATE) {
                column.collation = Some(self.base.parse_identifier()?);
                pending_name = None;
                continue;
            }
            if self.base.check_keyword(Keyword::REFERENCES) {
                let constraint_start = self.base.pos();
                self.base.advance();
                self.base.skip_whitespace();
                let fk = self.parse_references_clause(
                    pending_name.take(),
                    vec![column.name.clone()],
                    constraint_start,
                )?;
                data.foreign_keys.push(fk);
                continue;
            }
            if self.base.eat_word_ci("GENERATED") {
                self.base.expect_word_ci("ALWAYS")?;
                self.base.skip_whitespace();
                self.base.expect_keyword(Keyword::AS)?;
                self.base.skip_whitespace();
                column.computed = Some(self.parse_generated_body()?);
                pending_name = None;
                continue;
            }
            if self.base.eat_keyword(Keyword::AS) {
                column.computed = Some(self.parse_generated_body()?);
                pending_name = None;
                continue;
            }
            return Err(self.base.error_here("unexpected token in column definition"));
        }

        column.span = self.base.span_from(start_index);
        if column.inline_primary_key {
            data.primary_key = Some(ParsedKey {
                name: inline_pk_name,
                columns: vec![column.name.clone()],
                span: column.span,
            });
        }
        data.columns.push(column);
        Ok(())
    }

    /// The optional type-name token run: one or more bare words (`UNSIGNED
    /// BIG INT`) optionally followed by parenthesized arguments.
    fn parse_declared_type(&mut self) -> Result<Option<String>, SchemaError> {
        let mut first: Option<usize> = None;
        loop {
            let is_type_word = match self.base.current_token().map(|t| &t.token) {
                Some(Token::Word(w)) if w.quote_style.is_none() => {
                    !TYPE_TERMINATORS.iter().any(|kw| w.value.eq_ignore_ascii_case(kw))
                }
                _ => false,
            };
            if !is_type_word {
                break;
            }
            if first.is_none() {
                first = Some(self.base.pos());
            }
            self.base.advance();
            self.base.skip_whitespace();
        }
        let Some(first) = first else {
            return Ok(None);
        };
        if self.base.check_token(&Token::LParen) {
            self.base.skip_parenthesized()?;
        }
        let span = self.base.span_from(first);
        Ok(Some(span.slice(self.base.source()).to_string()))
    }

    /// DEFAULT value: signed number, literal, keyword literal, or a
    /// parenthesized expression. Returns the span of the value text.
    fn parse_default_value(&mut self) -> Result<SourceSpan, SchemaError> {
        self.base.skip_whitespace();
        if self.base.check_token(&Token::LParen) {
            let (outer, _inner) = self.base.consume_parenthesized()?;
            return Ok(outer);
        }
        let start_index = self.base.pos();
        if self.base.check_token(&Token::Minus) || self.base.check_token(&Token::Plus) {
            self.base.advance();
            self.base.skip_whitespace();
        }
        match self.base.current_token().map(|t| &t.token) {
            Some(Token::Number(..))
            | Some(Token::SingleQuotedString(_))
            | Some(Token::DoubleQuotedString(_))
            | Some(Token::HexStringLiteral(_))
            | Some(Token::Word(_)) => {
                self.base.advance();
                Ok(self.base.span_from(start_index))
            }
            _ => Err(self.base.error_here("expected default value")),
        }
    }

    /// Body of a generated-column clause: `(expr) [STORED | VIRTUAL]`.
    fn parse_generated_body(&mut self) -> Result<ParsedComputed, SchemaError> {
        let (_outer, inner) = self.base.consume_parenthesized()?;
        self.base.skip_whitespace();
        let stored = self.base.eat_word_ci("STORED");
        if !stored {
            let _ = self.base.eat_word_ci("VIRTUAL");
        }
        Ok(ParsedComputed {
            expression: inner,
            stored,
        })
    }

    // ========================================================================
    // Table-level constraints
    // ========================================================================

    fn parse_table_constraint(
        &mut self,
        data: &mut ParsedTableData,
        check_words: &mut Vec<Vec<String>>,
    ) -> Result<(), SchemaError> {
        let start_index = self.base.pos();
        let name = if self.base.eat_keyword(Keyword::CONSTRAINT) {
            let name = self.base.parse_identifier()?;
            self.base.skip_whitespace();
            Some(name)
        } else {
            None
        };

        if self.base.eat_keyword(Keyword::PRIMARY) {
            self.base.expect_keyword(Keyword::KEY)?;
            self.base.skip_whitespace();
            let columns = self.parse_column_name_list()?;
            self.skip_conflict_clause()?;
            if data.primary_key.is_some() || data.columns.iter().any(|c| c.inline_primary_key) {
                return Err(self.base.error_here("table has more than one PRIMARY KEY"));
            }
            data.primary_key = Some(ParsedKey {
                name,
                columns,
                span: self.base.span_from(start_index),
            });
        } else if self.base.eat_keyword(Keyword::UNIQUE) {
            let columns = self.parse_column_name_list()?;
            self.skip_conflict_clause()?;
            data.unique_keys.push(ParsedKey {
                name,
                columns,
                span: self.base.span_from(start_index),
            });
        } else if self.base.eat_keyword(Keyword::CHECK) {
            let expr_start = self.base.pos();
            let (outer, _inner) = self.base.consume_parenthesized()?;
            let words = self.words_in_span(expr_start);
            data.checks.push(ParsedCheck {
                name,
                expression: outer,
                columns: Vec::new(),
                span: self.base.span_from(start_index),
            });
            check_words.push(words);
        } else if self.base.eat_keyword(Keyword::FOREIGN) {
            self.base.expect_keyword(Keyword::KEY)?;
            self.base.skip_whitespace();
            let columns = self.parse_column_name_list()?;
            self.base.skip_whitespace();
            self.base.expect_keyword(Keyword::REFERENCES)?;
            self.base.skip_whitespace();
            let fk = self.parse_references_clause(name, columns, start_index)?;
            data.foreign_keys.push(fk);
        } else {
            return Err(self.base.error_here("expected table constraint"));
        }
        Ok(())
    }

    /// The tail of a REFERENCES clause, shared by table-level FOREIGN KEY
    /// constraints and column-level REFERENCES.
    fn parse_references_clause(
        &mut self,
        name: Option<String>,
        columns: Vec<String>,
        start_index: usize,
    ) -> Result<ParsedForeignKey, SchemaError> {
        let (_schema, target_table) = self.base.parse_qualified_name()?;
        self.base.skip_whitespace();

        let target_columns = if self.base.check_token(&Token::LParen) {
            self.parse_column_name_list()?
        } else {
            Vec::new()
        };

        let mut on_delete: Option<String> = None;
        let mut on_update: Option<String> = None;
        loop {
            self.base.skip_whitespace();
            if self.base.eat_keyword(Keyword::ON) {
                let is_delete = if self.base.eat_keyword(Keyword::DELETE) {
                    true
                } else if self.base.eat_keyword(Keyword::UPDATE) {
                    false
                } else {
                    return Err(self.base.error_here("expected DELETE or UPDATE"));
                };
                let action = self.parse_referential_action()?;
                if is_delete {
                    on_delete = Some(action);
                } else {
                    on_update = Some(action);
                }
            } else if self.base.eat_keyword(Keyword::MATCH) {
                let _ = self.base.parse_identifier()?;
            } else if self.base.check_keyword(Keyword::NOT) || self.base.check_word_ci("DEFERRABLE") {
                // [NOT] DEFERRABLE [INITIALLY DEFERRED | IMMEDIATE]. A bare
                // NOT here can also start the column's NOT NULL constraint,
                // so only commit when DEFERRABLE follows.
                let mark = self.base.pos();
                let _ = self.base.eat_keyword(Keyword::NOT);
                if !self.base.check_word_ci("DEFERRABLE") {
                    self.base.set_pos(mark);
                    break;
                }
                self.base.advance();
                self.base.skip_whitespace();
                if self.base.eat_word_ci("INITIALLY") {
                    let _ = self.base.eat_word_ci("DEFERRED") || self.base.eat_word_ci("IMMEDIATE");
                }
            } else {
                break;
            }
        }

        Ok(ParsedForeignKey {
            name,
            columns,
            target_table,
            target_columns,
            on_delete,
            on_update,
            span: self.base.span_from(start_index),
        })
    }

    /// `SET NULL | SET DEFAULT | CASCADE | RESTRICT | NO ACTION`, returned
    /// as upper-cased canonical text.
    fn parse_referential_action(&mut self) -> Result<String, SchemaError> {
        self.base.skip_whitespace();
        if self.base.eat_keyword(Keyword::SET) {
            if self.base.eat_keyword(Keyword::NULL) {
                Ok("SET NULL".to_string())
            } else if self.base.eat_keyword(Keyword::DEFAULT) {
                Ok("SET DEFAULT".to_string())
            } else {
                Err(self.base.error_here("expected NULL or DEFAULT"))
            }
        } else if self.base.eat_keyword(Keyword::CASCADE) {
            Ok("CASCADE".to_string())
        } else if self.base.eat_keyword(Keyword::RESTRICT) {
            Ok("RESTRICT".to_string())
        } else if self.base.eat_keyword(Keyword::NO) {
            self.base.expect_word_ci("ACTION")?;
            Ok("NO ACTION".to_string())
        } else {
            Err(self.base.error_here("expected referential action"))
        }
    }

    /// `(col [, col ...])` where each column may carry COLLATE and ASC/DESC.
    fn parse_column_name_list(&mut self) -> Result<Vec<String>, SchemaError> {
        self.base.expect_token(&Token::LParen)?;
        let mut columns = Vec::new();
        loop {
            self.base.skip_whitespace();
            let column = self.base.parse_identifier()?;
            self.base.skip_whitespace();
            if self.base.eat_keyword(Keyword::COLLATE) {
                let _ = self.base.parse_identifier()?;
                self.base.skip_whitespace();
            }
            let _ = self.base.eat_keyword(Keyword::ASC) || self.base.eat_keyword(Keyword::DESC);
            columns.push(column);
            self.base.skip_whitespace();
            if self.base.check_token(&Token::Comma) {
                self.base.advance();
            } else {
                break;
            }
        }
        self.base.expect_token(&Token::RParen)?;
        if columns.is_empty() {
            return Err(self.base.error_here("empty column list"));
        }
        Ok(columns)
    }

    /// Skip `ON CONFLICT ROLLBACK|ABORT|FAIL|IGNORE|REPLACE` if present.
    fn skip_conflict_clause(&mut self) -> Result<(), SchemaError> {
        self.base.skip_whitespace();
        // Only consume ON when it is a conflict clause; a bare ON here would
        // otherwise swallow the ON DELETE of a following REFERENCES clause.
        let mark = self.base.pos();
        if self.base.eat_keyword(Keyword::ON) {
            if self.base.eat_keyword(Keyword::CONFLICT) {
                let _ = self.base.parse_identifier()?;
                self.base.skip_whitespace();
            } else {
                self.base.set_pos(mark);
            }
        }
        Ok(())
    }

    /// Bare identifier words between `start_index` and the current position.
    fn words_in_span(&self, start_index: usize) -> Vec<String> {
        self.base.words_in_range(start_index, self.base.pos())
    }
}
