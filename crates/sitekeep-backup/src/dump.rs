//! SQL dump inspection.
//!
//! Restore needs to know which tables a dump defines, and with which columns,
//! before it touches the database. [`DumpScan`] streams a dump statement by
//! statement and keeps only `CREATE TABLE` definitions, so memory stays bounded
//! by the largest table definition rather than the dump size.

use crate::compression::open_maybe_gzip;
use crate::engine::EngineKind;
use crate::error::{BackupError, Result};
use camino::Utf8Path;
use regex::Regex;
use sitekeep_core::TableName;
use std::collections::HashSet;
use std::io::{self, BufRead, Write};
use std::sync::LazyLock;
use thiserror::Error;

static CREATE_TABLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?is)^CREATE\s+(?:(?:TEMPORARY|TEMP|UNLOGGED)\s+)?TABLE\s+(?:IF\s+NOT\s+EXISTS\s+)?",
    )
    .expect("create table regex is valid")
});

static COPY_FROM_STDIN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)^COPY\s.+\sFROM\s+stdin").expect("copy regex is valid")
});

/// Keywords that open a table constraint rather than a column definition.
const CONSTRAINT_KEYWORDS: &[&str] = &[
    "CONSTRAINT",
    "PRIMARY",
    "KEY",
    "INDEX",
    "UNIQUE",
    "FOREIGN",
    "CHECK",
    "FULLTEXT",
    "SPATIAL",
    "EXCLUDE",
    "PERIOD",
];

/// Lexical flavour of a dump.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlDialect {
    /// mysqldump output: backslash escapes, backtick identifiers, `#` comments
    MySql,
    /// pg_dump output: `COPY ... FROM stdin` data blocks, `$$` quoting
    Postgres,
    Sqlite,
}

impl SqlDialect {
    fn backslash_escapes(self) -> bool {
        self == SqlDialect::MySql
    }
}

impl From<EngineKind> for SqlDialect {
    fn from(kind: EngineKind) -> Self {
        match kind {
            EngineKind::MariaDb => SqlDialect::MySql,
            EngineKind::Postgres => SqlDialect::Postgres,
            EngineKind::Sqlite => SqlDialect::Sqlite,
        }
    }
}

/// Reasons a dump cannot be scanned.
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("read failed: {0}")]
    Io(#[from] io::Error),

    #[error("malformed dump: {0}")]
    Malformed(String),
}

/// A table defined by a dump.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpTable {
    pub name: TableName,
    pub columns: Vec<String>,
}

/// The table definitions found in a dump.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DumpScan {
    tables: Vec<DumpTable>,
}

impl DumpScan {
    /// Scans a dump file, decompressing it if needed.
    pub fn scan_file(path: &Utf8Path, dialect: SqlDialect) -> Result<Self> {
        let reader = open_maybe_gzip(path).map_err(|e| BackupError::dump_unreadable(path, e.to_string()))?;
        Self::scan(reader, dialect).map_err(|e| BackupError::dump_unreadable(path, e.to_string()))
    }

    /// Scans a dump stream.
    pub fn scan<R: BufRead>(mut reader: R, dialect: SqlDialect) -> std::result::Result<Self, ScanError> {
        let mut scanner = Scanner::new(dialect);
        let mut line = Vec::new();
        loop {
            line.clear();
            if reader.read_until(b'\n', &mut line)? == 0 {
                break;
            }
            scanner.feed_line(&line)?;
        }
        scanner.finish()
    }

    pub fn tables(&self) -> &[DumpTable] {
        &self.tables
    }

    pub fn table_names(&self) -> Vec<TableName> {
        self.tables.iter().map(|t| t.name.clone()).collect()
    }

    pub fn get(&self, table: &TableName) -> Option<&DumpTable> {
        self.tables.iter().find(|t| &t.name == table)
    }

    /// Whether the dump carries a `CREATE TABLE` for `table`.
    pub fn defines(&self, table: &TableName) -> bool {
        self.get(table).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Normal,
    SingleQuote,
    DoubleQuote,
    Backtick,
    DollarQuote,
    LineComment,
    BlockComment,
    CopyData,
}

struct Scanner {
    dialect: SqlDialect,
    state: State,
    escape_next: bool,
    /// Text of the current statement while it may still be a definition
    stmt: Vec<u8>,
    capture: bool,
    has_content: bool,
    copy_pending: bool,
    tables: Vec<DumpTable>,
    seen: HashSet<TableName>,
}

impl Scanner {
    fn new(dialect: SqlDialect) -> Self {
        Self {
            dialect,
            state: State::Normal,
            escape_next: false,
            stmt: Vec::new(),
            capture: true,
            has_content: false,
            copy_pending: false,
            tables: Vec::new(),
            seen: HashSet::new(),
        }
    }

    fn feed_line(&mut self, line: &[u8]) -> std::result::Result<(), ScanError> {
        if self.state == State::CopyData {
            if line.trim_ascii_end() == b"\\." {
                self.state = State::Normal;
            }
            return Ok(());
        }

        let mut i = 0;
        while i < line.len() {
            let b = line[i];
            let next = line.get(i + 1).copied();
            match self.state {
                State::Normal => match b {
                    b'-' if next == Some(b'-') => {
                        self.state = State::LineComment;
                        i += 1;
                    }
                    b'#' if self.dialect == SqlDialect::MySql => self.state = State::LineComment,
                    b'/' if next == Some(b'*') => {
                        self.state = State::BlockComment;
                        i += 1;
                    }
                    b'\'' => {
                        self.push(b);
                        self.state = State::SingleQuote;
                    }
                    b'"' => {
                        self.push(b);
                        self.state = State::DoubleQuote;
                    }
                    b'`' if self.dialect == SqlDialect::MySql => {
                        self.push(b);
                        self.state = State::Backtick;
                    }
                    b'$' if self.dialect == SqlDialect::Postgres && next == Some(b'$') => {
                        self.push(b);
                        self.push(b);
                        self.state = State::DollarQuote;
                        i += 1;
                    }
                    b';' => self.end_statement()?,
                    _ => self.push(b),
                },
                State::SingleQuote | State::DoubleQuote => {
                    let quote = if self.state == State::SingleQuote { b'\'' } else { b'"' };
                    self.push(b);
                    if self.escape_next {
                        self.escape_next = false;
                    } else if b == b'\\' && self.dialect.backslash_escapes() {
                        self.escape_next = true;
                    } else if b == quote {
                        if next == Some(quote) {
                            self.push(quote);
                            i += 1;
                        } else {
                            self.state = State::Normal;
                        }
                    }
                }
                State::Backtick => {
                    self.push(b);
                    if b == b'`' {
                        if next == Some(b'`') {
                            self.push(b);
                            i += 1;
                        } else {
                            self.state = State::Normal;
                        }
                    }
                }
                State::DollarQuote => {
                    self.push(b);
                    if b == b'$' && next == Some(b'$') {
                        self.push(b);
                        self.state = State::Normal;
                        i += 1;
                    }
                }
                State::LineComment => {
                    if b == b'\n' {
                        self.state = State::Normal;
                        self.push(b' ');
                    }
                }
                State::BlockComment => {
                    if b == b'*' && next == Some(b'/') {
                        self.state = State::Normal;
                        self.push(b' ');
                        i += 1;
                    }
                }
                // COPY data lines are consumed before the byte loop
                State::CopyData => {}
            }
            i += 1;
        }

        if self.copy_pending {
            self.copy_pending = false;
            self.state = State::CopyData;
        }
        Ok(())
    }

    fn push(&mut self, b: u8) {
        if b.is_ascii_whitespace() {
            if self.stmt.is_empty() {
                return;
            }
        } else {
            self.has_content = true;
        }
        if !self.capture {
            return;
        }
        self.stmt.push(b);
        // Only definitions and COPY headers are kept.
        if self.stmt.len() == 6 {
            let head = &self.stmt[..6];
            if !head.eq_ignore_ascii_case(b"CREATE") && !head[..4].eq_ignore_ascii_case(b"COPY") {
                self.capture = false;
                self.stmt.clear();
            }
        }
    }

    fn end_statement(&mut self) -> std::result::Result<(), ScanError> {
        if self.capture && !self.stmt.is_empty() {
            let text = String::from_utf8_lossy(&self.stmt).into_owned();
            if let Some(table) = parse_create_table(&text, self.dialect)? {
                if self.seen.insert(table.name.clone()) {
                    self.tables.push(table);
                }
            } else if self.dialect == SqlDialect::Postgres && COPY_FROM_STDIN.is_match(&text) {
                self.copy_pending = true;
            }
        }
        self.stmt.clear();
        self.capture = true;
        self.has_content = false;
        Ok(())
    }

    fn finish(self) -> std::result::Result<DumpScan, ScanError> {
        let problem = match self.state {
            State::SingleQuote | State::DoubleQuote | State::Backtick | State::DollarQuote => {
                Some("unterminated quoted string")
            }
            State::BlockComment => Some("unterminated comment"),
            State::CopyData => Some("unterminated COPY data block"),
            State::Normal | State::LineComment if self.has_content => {
                Some("unterminated statement at end of dump")
            }
            State::Normal | State::LineComment => None,
        };
        match problem {
            Some(message) => Err(ScanError::Malformed(message.to_string())),
            None => Ok(DumpScan {
                tables: self.tables,
            }),
        }
    }
}

/// Parses a `CREATE TABLE` statement into its table name and column names.
///
/// Returns `None` for statements that are not table definitions.
fn parse_create_table(
    text: &str,
    dialect: SqlDialect,
) -> std::result::Result<Option<DumpTable>, ScanError> {
    let Some(head) = CREATE_TABLE.find(text) else {
        return Ok(None);
    };

    let rest = &text[head.end()..];
    let (name, rest) = parse_qualified_name(rest).ok_or_else(|| {
        ScanError::Malformed(format!("unreadable table name in: {}", truncate(text)))
    })?;
    let name = TableName::new(name)
        .map_err(|_| ScanError::Malformed(format!("empty table name in: {}", truncate(text))))?;

    let rest = rest.trim_start();
    let columns = match rest.strip_prefix('(') {
        Some(body) => column_names(body, dialect),
        // CREATE TABLE ... AS SELECT has no column list
        None => Vec::new(),
    };

    Ok(Some(DumpTable { name, columns }))
}

/// Parses `a.b."c"` style names, returning the last part and the remaining text.
fn parse_qualified_name(text: &str) -> Option<(String, &str)> {
    let mut rest = text;
    loop {
        let (part, after) = parse_identifier(rest)?;
        match after.strip_prefix('.') {
            Some(more) => rest = more,
            None => return Some((part, after)),
        }
    }
}

fn parse_identifier(text: &str) -> Option<(String, &str)> {
    let mut chars = text.char_indices();
    let (_, first) = chars.next()?;
    if first == '`' || first == '"' || first == '[' {
        let close = if first == '[' { ']' } else { first };
        let mut ident = String::new();
        let mut iter = text[1..].char_indices().peekable();
        while let Some((idx, c)) = iter.next() {
            if c == close {
                if close != ']' && matches!(iter.peek(), Some((_, n)) if *n == close) {
                    ident.push(c);
                    iter.next();
                    continue;
                }
                return Some((ident, &text[1 + idx + c.len_utf8()..]));
            }
            ident.push(c);
        }
        None
    } else {
        let end = text
            .find(|c: char| !(c.is_alphanumeric() || c == '_' || c == '$'))
            .unwrap_or(text.len());
        if end == 0 {
            return None;
        }
        Some((text[..end].to_string(), &text[end..]))
    }
}

/// Extracts column names from the body of a column list (after the opening paren).
fn column_names(body: &str, dialect: SqlDialect) -> Vec<String> {
    split_definitions(body, dialect)
        .into_iter()
        .filter_map(|def| {
            let def = def.trim();
            let (ident, _) = parse_identifier(def)?;
            let quoted = def.starts_with(['`', '"', '[']);
            let keyword = ident.to_ascii_uppercase();
            if !quoted && CONSTRAINT_KEYWORDS.contains(&keyword.as_str()) {
                None
            } else {
                Some(ident)
            }
        })
        .collect()
}

/// Splits a column list on top-level commas, stopping at the closing paren.
fn split_definitions(body: &str, dialect: SqlDialect) -> Vec<&str> {
    let bytes = body.as_bytes();
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    let mut quote: Option<u8> = None;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        if let Some(q) = quote {
            if b == b'\\' && q == b'\'' && dialect.backslash_escapes() {
                i += 1;
            } else if b == q {
                quote = None;
            }
        } else {
            match b {
                b'\'' | b'"' | b'`' => quote = Some(b),
                b'(' => depth += 1,
                b')' if depth == 0 => {
                    parts.push(&body[start..i]);
                    return parts;
                }
                b')' => depth -= 1,
                b',' if depth == 0 => {
                    parts.push(&body[start..i]);
                    start = i + 1;
                }
                _ => {}
            }
        }
        i += 1;
    }

    parts.push(&body[start..]);
    parts
}

fn truncate(text: &str) -> &str {
    match text.char_indices().nth(80) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Writes the comment header that opens every dump.
pub fn write_header(
    out: &mut dyn Write,
    site: &str,
    kind: EngineKind,
    tables: &[TableName],
) -> io::Result<()> {
    writeln!(out, "-- sitekeep database dump")?;
    writeln!(out, "-- Site: {}", site)?;
    writeln!(out, "-- Engine: {}", kind)?;
    writeln!(out, "-- Tables: {}", tables.len())?;
    writeln!(out)?;
    Ok(())
}
