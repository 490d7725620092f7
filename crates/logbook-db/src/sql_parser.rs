//! Splits multi-statement SQL scripts into individually executable statements.
//!
//! Splitting is driven by a small lexer that knows about quoted strings,
//! quoted identifiers and comments, so that a `;` or a `BEGIN`/`END` keyword
//! inside any of those never influences where a statement ends. A
//! `CREATE TRIGGER ... BEGIN ... END` body is always emitted as one statement.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TokenKind {
    Word,
    Quoted,
    Whitespace,
    LineComment,
    BlockComment,
    Semicolon,
    Punct,
}

#[derive(Debug, Clone, Copy)]
struct Token<'a> {
    kind: TokenKind,
    text: &'a str,
}

/// Byte-level lexer. Every delimiter it looks for is ASCII, so slicing at the
/// positions it finds always lands on UTF-8 character boundaries.
struct Lexer<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn is_word_byte(b: u8) -> bool {
        b.is_ascii_alphanumeric() || b == b'_' || b >= 0x80
    }

    /// End offset of a quoted run starting at `start`. A doubled closing
    /// quote is an escape; an unterminated run extends to end of input.
    fn quoted_end(bytes: &[u8], start: usize, close: u8, doubled_escape: bool) -> usize {
        let mut i = start + 1;
        while i < bytes.len() {
            if bytes[i] == close {
                if doubled_escape && bytes.get(i + 1) == Some(&close) {
                    i += 2;
                    continue;
                }
                return i + 1;
            }
            i += 1;
        }
        bytes.len()
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Token<'a>> {
        let bytes = self.src.as_bytes();
        let start = self.pos;
        if start >= bytes.len() {
            return None;
        }

        let b = bytes[start];
        let next = bytes.get(start + 1).copied();
        let (kind, end) = match b {
            b if b.is_ascii_whitespace() => {
                let mut i = start;
                while i < bytes.len() && bytes[i].is_ascii_whitespace() {
                    i += 1;
                }
                (TokenKind::Whitespace, i)
            }
            b'-' if next == Some(b'-') => {
                let end = self.src[start..]
                    .find('\n')
                    .map(|i| start + i)
                    .unwrap_or(bytes.len());
                (TokenKind::LineComment, end)
            }
            b'/' if next == Some(b'*') => {
                let end = self.src[start + 2..]
                    .find("*/")
                    .map(|i| start + 2 + i + 2)
                    .unwrap_or(bytes.len());
                (TokenKind::BlockComment, end)
            }
            b'\'' | b'"' | b'`' => (TokenKind::Quoted, Self::quoted_end(bytes, start, b, true)),
            b'[' => (TokenKind::Quoted, Self::quoted_end(bytes, start, b']', false)),
            b';' => (TokenKind::Semicolon, start + 1),
            b if Self::is_word_byte(b) => {
                let mut i = start;
                while i < bytes.len() && Self::is_word_byte(bytes[i]) {
                    i += 1;
                }
                (TokenKind::Word, i)
            }
            _ => (TokenKind::Punct, start + 1),
        };

        self.pos = end;
        Some(Token {
            kind,
            text: &self.src[start..end],
        })
    }
}

/// DDL category of a statement, used for bootstrap ordering and for deciding
/// which errors a statement may tolerate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatementKind {
    CreateTable,
    CreateIndex,
    CreateTrigger,
    CreateView,
    AlterTableAddColumn,
    Other,
}

impl StatementKind {
    /// Execution rank during bootstrap: tables, indexes, triggers, views, rest.
    pub fn bootstrap_rank(self) -> u8 {
        match self {
            StatementKind::CreateTable => 0,
            StatementKind::CreateIndex => 1,
            StatementKind::CreateTrigger => 2,
            StatementKind::CreateView => 3,
            StatementKind::AlterTableAddColumn | StatementKind::Other => 4,
        }
    }
}

/// Stateless SQL script splitter and classifier.
pub struct SqlStatementParser;

impl SqlStatementParser {
    /// Split `sql` into ordered statements with comments removed and without
    /// trailing semicolons. Semicolons inside a `BEGIN ... END` block (or a
    /// `CASE ... END` expression) do not end the statement. An unterminated
    /// block swallows the rest of the script into one trailing statement.
    pub fn parse(sql: &str) -> Vec<String> {
        let mut statements = Vec::new();
        let mut current = String::new();
        let mut depth: i32 = 0;

        for token in Lexer::new(sql) {
            match token.kind {
                TokenKind::LineComment => {}
                TokenKind::BlockComment => current.push(' '),
                TokenKind::Semicolon => {
                    if depth > 0 {
                        current.push(';');
                    } else {
                        push_statement(&mut statements, &current);
                        current.clear();
                        depth = 0;
                    }
                }
                TokenKind::Word => {
                    if token.text.eq_ignore_ascii_case("BEGIN")
                        || token.text.eq_ignore_ascii_case("CASE")
                    {
                        depth += 1;
                    } else if token.text.eq_ignore_ascii_case("END") {
                        depth -= 1;
                    }
                    current.push_str(token.text);
                }
                TokenKind::Quoted | TokenKind::Whitespace | TokenKind::Punct => {
                    current.push_str(token.text)
                }
            }
        }
        push_statement(&mut statements, &current);

        statements
    }

    /// Classify a single statement by its leading keywords.
    pub fn classify(statement: &str) -> StatementKind {
        let words: Vec<String> = Lexer::new(statement)
            .filter(|t| matches!(t.kind, TokenKind::Word | TokenKind::Quoted))
            .take(8)
            .map(|t| t.text.to_ascii_uppercase())
            .collect();
        let words: Vec<&str> = words.iter().map(String::as_str).collect();

        match words.as_slice() {
            ["CREATE", rest @ ..] => {
                let object = rest
                    .iter()
                    .find(|w| !matches!(**w, "TEMP" | "TEMPORARY" | "UNIQUE" | "VIRTUAL"));
                match object {
                    Some(&"TABLE") => StatementKind::CreateTable,
                    Some(&"INDEX") => StatementKind::CreateIndex,
                    Some(&"TRIGGER") => StatementKind::CreateTrigger,
                    Some(&"VIEW") => StatementKind::CreateView,
                    _ => StatementKind::Other,
                }
            }
            // The table name may be schema-qualified, i.e. two words.
            ["ALTER", "TABLE", rest @ ..] if rest.iter().skip(1).take(2).any(|w| *w == "ADD") => {
                StatementKind::AlterTableAddColumn
            }
            _ => StatementKind::Other,
        }
    }
}

fn push_statement(statements: &mut Vec<String>, raw: &str) {
    let trimmed = raw.trim();
    if !trimmed.is_empty() {
        statements.push(trimmed.to_string());
    }
}
