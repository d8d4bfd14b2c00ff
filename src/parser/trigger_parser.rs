//! Trigger timing/event recovery from `CREATE TRIGGER` text.
//!
//! The catalog stores only a trigger's name, target table, and verbatim
//! definition; the timing (BEFORE/AFTER/INSTEAD OF) and firing event
//! (INSERT/UPDATE/DELETE) exist only inside the DDL text. Same two-stage
//! tokenize/parse strategy as the table parser, with a much smaller grammar.
//!
//! ## Supported syntax
//!
//! ```sql
//! CREATE [TEMP] TRIGGER [IF NOT EXISTS] [schema.]name
//!     [BEFORE | AFTER | INSTEAD OF] DELETE | INSERT | UPDATE [OF cols]
//!     ON table ...
//! ```

use sqlparser::keywords::Keyword;

use crate::error::SchemaError;
use crate::model::{TriggerEvent, TriggerTiming};
use crate::parser::token_parser::TokenParser;

/// Facts recovered from one `CREATE TRIGGER` statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTrigger {
    pub name: String,
    pub table_name: String,
    pub timing: TriggerTiming,
    pub event: TriggerEvent,
}

/// Parser over one `CREATE TRIGGER` statement.
pub struct TriggerDdlParser {
    base: TokenParser,
}

impl TriggerDdlParser {
    pub fn new(object: &str, sql: &str) -> Result<Self, SchemaError> {
        Ok(Self {
            base: TokenParser::new(object, sql)?,
        })
    }

    pub fn parse(mut self) -> Result<ParsedTrigger, SchemaError> {
        self.base.skip_whitespace();
        self.base.expect_keyword(Keyword::CREATE)?;
        self.base.skip_whitespace();
        let _ = self.base.eat_word_ci("TEMP") || self.base.eat_word_ci("TEMPORARY");
        self.base.expect_keyword(Keyword::TRIGGER)?;
        self.base.skip_whitespace();
        if self.base.eat_keyword(Keyword::IF) {
            self.base.expect_keyword(Keyword::NOT)?;
            self.base.skip_whitespace();
            self.base.expect_keyword(Keyword::EXISTS)?;
            self.base.skip_whitespace();
        }
        let (_schema, name) = self.base.parse_qualified_name()?;
        self.base.skip_whitespace();

        // Unspecified timing means BEFORE in SQLite.
        let timing = if self.base.eat_keyword(Keyword::BEFORE) {
            TriggerTiming::Before
        } else if self.base.eat_keyword(Keyword::AFTER) {
            TriggerTiming::After
        } else if self.base.eat_word_ci("INSTEAD") {
            self.base.expect_keyword(Keyword::OF)?;
            self.base.skip_whitespace();
            TriggerTiming::InsteadOf
        } else {
            TriggerTiming::Before
        };

        let event = if self.base.eat_keyword(Keyword::INSERT) {
            TriggerEvent::Insert
        } else if self.base.eat_keyword(Keyword::DELETE) {
            TriggerEvent::Delete
        } else if self.base.eat_keyword(Keyword::UPDATE) {
            // UPDATE OF col [, col ...]
            if self.base.eat_keyword(Keyword::OF) {
                loop {
                    let _ = self.base.parse_identifier()?;
                    self.base.skip_whitespace();
                    if self.base.check_token(&sqlparser::tokenizer::Token::Comma) {
                        self.base.advance();
                        self.base.skip_whitespace();
                    } else {
                        break;
                    }
                }
            }
            TriggerEvent::Update
        } else {
            return Err(self.base.error_here("expected INSERT, UPDATE, or DELETE"));
        };

        self.base.skip_whitespace();
        self.base.expect_keyword(Keyword::ON)?;
        self.base.skip_whitespace();
        let (_schema, table_name) = self.base.parse_qualified_name()?;

        Ok(ParsedTrigger {
            name,
            table_name,
            timing,
            event,
        })
    }
}
