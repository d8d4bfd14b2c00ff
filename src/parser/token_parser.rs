//! Base token parser for SQLite DDL recovery.
//!
//! This wraps sqlparser's tokenizer into a finite, restartable sequence of
//! positioned tokens and provides the navigation helpers the grammar parsers
//! share. Two things distinguish it from a plain token stream:
//!
//! - every token's position is converted to an **absolute byte offset** into
//!   the original statement text, so a parsed element's definition can be
//!   reconstructed by slicing the original string (never by re-serializing
//!   tokens);
//! - a lexical failure is fatal only for the one statement being parsed: it
//!   surfaces as [`SchemaError::Parse`] carrying the object name, the raw
//!   text, and the error offset, and must not abort a bulk run.

use sqlparser::dialect::SQLiteDialect;
use sqlparser::keywords::Keyword;
use sqlparser::tokenizer::{Location, Token, TokenWithSpan, Tokenizer};

use crate::error::SchemaError;

/// Byte range of one parsed element inside the original statement text.
///
/// `end` is exclusive: the span of a single token is
/// `offset .. offset + literal length`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceSpan {
    pub start: usize,
    pub end: usize,
}

impl SourceSpan {
    /// The exact original substring, formatting and casing preserved.
    pub fn slice<'a>(&self, source: &'a str) -> &'a str {
        &source[self.start..self.end]
    }
}

/// Positioned, restartable token stream over one statement.
#[derive(Debug)]
pub struct TokenParser {
    object: String,
    source: String,
    /// Byte index of the start of each source line, for offset conversion.
    line_starts: Vec<usize>,
    tokens: Vec<TokenWithSpan>,
    pos: usize,
}

impl TokenParser {
    /// Tokenize one statement. `object` names the owning schema object and
    /// is carried into any parse error raised later.
    pub fn new(object: &str, sql: &str) -> Result<Self, SchemaError> {
        let line_starts = line_starts(sql);
        let dialect = SQLiteDialect {};
        let tokens = Tokenizer::new(&dialect, sql)
            .tokenize_with_location()
            .map_err(|e| SchemaError::Parse {
                object: object.to_string(),
                offset: byte_offset(sql, &line_starts, e.location),
                message: e.message,
                sql: sql.to_string(),
            })?;

        Ok(Self {
            object: object.to_string(),
            source: sql.to_string(),
            line_starts,
            tokens,
            pos: 0,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn object(&self) -> &str {
        &self.object
    }

    // ========================================================================
    // Position and state
    // ========================================================================

    #[inline]
    pub fn is_at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    #[inline]
    pub fn pos(&self) -> usize {
        self.pos
    }

    /// Restart or rewind the stream.
    #[inline]
    pub fn set_pos(&mut self, pos: usize) {
        self.pos = pos;
    }

    #[inline]
    pub fn current_token(&self) -> Option<&TokenWithSpan> {
        self.tokens.get(self.pos)
    }

    #[inline]
    pub fn advance(&mut self) {
        if !self.is_at_end() {
            self.pos += 1;
        }
    }

    /// Skip whitespace and comment tokens.
    pub fn skip_whitespace(&mut self) {
        while let Some(token) = self.current_token() {
            match &token.token {
                Token::Whitespace(_) => self.advance(),
                _ => break,
            }
        }
    }

    // ========================================================================
    // Offsets and spans
    // ========================================================================

    /// Absolute byte offset where the token at `index` starts.
    pub fn token_start(&self, index: usize) -> usize {
        byte_offset(&self.source, &self.line_starts, self.tokens[index].span.start)
    }

    /// Absolute byte offset just past the token at `index`.
    pub fn token_end(&self, index: usize) -> usize {
        byte_offset(&self.source, &self.line_starts, self.tokens[index].span.end)
    }

    /// Span from the first token at/after `start_index` to the last
    /// significant (non-whitespace) token before the current position.
    pub fn span_from(&self, start_index: usize) -> SourceSpan {
        let start = self.token_start(start_index);
        let end = self.last_significant_before(self.pos).map_or(start, |i| self.token_end(i));
        SourceSpan { start, end }
    }

    fn last_significant_before(&self, pos: usize) -> Option<usize> {
        self.tokens[..pos.min(self.tokens.len())]
            .iter()
            .rposition(|t| !matches!(t.token, Token::Whitespace(_)))
    }

    /// Byte offset of the current token, or of end-of-text when exhausted.
    pub fn current_offset(&self) -> usize {
        if self.is_at_end() {
            self.source.len()
        } else {
            self.token_start(self.pos)
        }
    }

    // ========================================================================
    // Errors
    // ========================================================================

    /// A grammar error at the current token, fatal for this statement only.
    pub fn error_here(&self, message: impl Into<String>) -> SchemaError {
        SchemaError::Parse {
            object: self.object.clone(),
            offset: self.current_offset(),
            message: message.into(),
            sql: self.source.clone(),
        }
    }

    // ========================================================================
    // Token type checks
    // ========================================================================

    #[inline]
    pub fn check_keyword(&self, keyword: Keyword) -> bool {
        matches!(
            self.current_token().map(|t| &t.token),
            Some(Token::Word(w)) if w.keyword == keyword && w.quote_style.is_none()
        )
    }

    /// Case-insensitive word check for words sqlparser does not classify as
    /// keywords (AUTOINCREMENT, ROWID, INSTEAD, STORED, VIRTUAL, ...).
    #[inline]
    pub fn check_word_ci(&self, word: &str) -> bool {
        matches!(
            self.current_token().map(|t| &t.token),
            Some(Token::Word(w)) if w.quote_style.is_none() && w.value.eq_ignore_ascii_case(word)
        )
    }

    /// Token-type check by discriminant, ignoring the inner value.
    #[inline]
    pub fn check_token(&self, expected: &Token) -> bool {
        match self.current_token() {
            Some(token) => {
                std::mem::discriminant(&token.token) == std::mem::discriminant(expected)
            }
            None => false,
        }
    }

    // ========================================================================
    // Expect methods (check, advance, or fail the statement)
    // ========================================================================

    pub fn expect_keyword(&mut self, keyword: Keyword) -> Result<(), SchemaError> {
        if self.check_keyword(keyword) {
            self.advance();
            Ok(())
        } else {
            Err(self.error_here(format!("expected {:?}", keyword)))
        }
    }

    pub fn expect_word_ci(&mut self, word: &str) -> Result<(), SchemaError> {
        if self.check_word_ci(word) {
            self.advance();
            Ok(())
        } else {
            Err(self.error_here(format!("expected {}", word)))
        }
    }

    pub fn expect_token(&mut self, expected: &Token) -> Result<(), SchemaError> {
        if self.check_token(expected) {
            self.advance();
            Ok(())
        } else {
            Err(self.error_here(format!("expected {}", expected)))
        }
    }

    /// Consume the keyword if present; reports whether it was.
    pub fn eat_keyword(&mut self, keyword: Keyword) -> bool {
        if self.check_keyword(keyword) {
            self.advance();
            self.skip_whitespace();
            true
        } else {
            false
        }
    }

    /// Consume the word (case-insensitively) if present.
    pub fn eat_word_ci(&mut self, word: &str) -> bool {
        if self.check_word_ci(word) {
            self.advance();
            self.skip_whitespace();
            true
        } else {
            false
        }
    }

    // ========================================================================
    // Identifier parsing
    // ========================================================================

    /// Parse an identifier (bare, `"quoted"`, `[bracketed]`, or
    /// `` `backticked` ``), returning the value without delimiters.
    pub fn parse_identifier(&mut self) -> Result<String, SchemaError> {
        match self.current_token().map(|t| t.token.clone()) {
            Some(Token::Word(w)) => {
                self.advance();
                Ok(w.value)
            }
            // SQLite also accepts string literals in identifier position.
            Some(Token::SingleQuotedString(s)) => {
                self.advance();
                Ok(s)
            }
            _ => Err(self.error_here("expected identifier")),
        }
    }

    /// Parse `name` or `schema.name`, returning `(schema, name)`.
    pub fn parse_qualified_name(&mut self) -> Result<(Option<String>, String), SchemaError> {
        let first = self.parse_identifier()?;
        self.skip_whitespace();
        if self.check_token(&Token::Period) {
            self.advance();
            self.skip_whitespace();
            let second = self.parse_identifier()?;
            Ok((Some(first), second))
        } else {
            Ok((None, first))
        }
    }

    // ========================================================================
    // Numeric parsing
    // ========================================================================

    pub fn parse_signed_integer(&mut self) -> Result<i64, SchemaError> {
        let is_negative = if self.check_token(&Token::Minus) {
            self.advance();
            self.skip_whitespace();
            true
        } else {
            false
        };

        match self.current_token().map(|t| &t.token) {
            Some(Token::Number(n, _)) => match n.parse::<i64>() {
                Ok(value) => {
                    self.advance();
                    Ok(if is_negative { -value } else { value })
                }
                Err(_) => Err(self.error_here("integer out of range")),
            },
            _ => Err(self.error_here("expected integer")),
        }
    }

    // ========================================================================
    // Parenthesized groups
    // ========================================================================

    /// Skip a balanced parenthesized group; position ends after the closing
    /// parenthesis.
    pub fn skip_parenthesized(&mut self) -> Result<(), SchemaError> {
        if !self.check_token(&Token::LParen) {
            return Err(self.error_here("expected ("));
        }
        let mut depth = 0usize;
        while let Some(token) = self.current_token() {
            match token.token {
                Token::LParen => depth += 1,
                Token::RParen => {
                    depth -= 1;
                    if depth == 0 {
                        self.advance();
                        return Ok(());
                    }
                }
                _ => {}
            }
            self.advance();
        }
        Err(self.error_here("unbalanced parentheses"))
    }

    /// Consume a balanced group and return two spans: the whole group
    /// including the parentheses, and the interior excluding them.
    pub fn consume_parenthesized(&mut self) -> Result<(SourceSpan, SourceSpan), SchemaError> {
        if !self.check_token(&Token::LParen) {
            return Err(self.error_here("expected ("));
        }
        let open_index = self.pos;
        self.skip_parenthesized()?;
        let close_index = self.pos - 1;

        let outer = SourceSpan {
            start: self.token_start(open_index),
            end: self.token_end(close_index),
        };
        // Interior trimmed to the significant tokens between the parens, so
        // `( a+b )` yields exactly `a+b`.
        let inner_tokens = &self.tokens[open_index + 1..close_index];
        let first = inner_tokens
            .iter()
            .position(|t| !matches!(t.token, Token::Whitespace(_)))
            .map(|i| open_index + 1 + i);
        let last = inner_tokens
            .iter()
            .rposition(|t| !matches!(t.token, Token::Whitespace(_)))
            .map(|i| open_index + 1 + i);
        let inner = match (first, last) {
            (Some(first), Some(last)) => SourceSpan {
                start: self.token_start(first),
                end: self.token_end(last),
            },
            _ => SourceSpan {
                start: outer.start + 1,
                end: outer.start + 1,
            },
        };
        Ok((outer, inner))
    }

    /// Bare identifier words appearing inside the token range, in order.
    /// Used to find the columns a check expression depends on.
    pub fn words_in_range(&self, start_index: usize, end_index: usize) -> Vec<String> {
        self.tokens[start_index..end_index.min(self.tokens.len())]
            .iter()
            .filter_map(|t| match &t.token {
                Token::Word(w) if w.keyword == Keyword::NoKeyword || w.quote_style.is_some() => {
                    Some(w.value.clone())
                }
                _ => None,
            })
            .collect()
    }
}

/// Byte index of the start of every line in `source`.
fn line_starts(source: &str) -> Vec<usize> {
    let mut starts = vec![0usize];
    for (i, b) in source.bytes().enumerate() {
        if b == b'\n' {
            starts.push(i + 1);
        }
    }
    starts
}

/// Convert a sqlparser line/column location (1-based, counted in chars) to an
/// absolute byte offset.
fn byte_offset(source: &str, line_starts: &[usize], loc: Location) -> usize {
    let line = (loc.line.max(1) as usize - 1).min(line_starts.len() - 1);
    let line_start = line_starts[line];
    let col = loc.column.max(1) as usize - 1;
    let rest = &source[line_start..];
    match rest.char_indices().nth(col) {
        Some((byte, _)) => line_start + byte,
        None => source.len(),
    }
}
