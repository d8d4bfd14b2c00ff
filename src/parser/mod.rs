//! SQLite DDL recovery parsing

mod table_parser;
mod token_parser;
mod trigger_parser;

pub use table_parser::{
    ParsedCheck, ParsedColumn, ParsedComputed, ParsedForeignKey, ParsedKey, ParsedTableData,
    TableDdlParser,
};
pub use token_parser::{SourceSpan, TokenParser};
pub use trigger_parser::{ParsedTrigger, TriggerDdlParser};
