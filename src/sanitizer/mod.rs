//! Admission gate for generated SQL, plus identifier sanitization.
//!
//! [`is_sql_query`] is a loose "does this look like SQL" heuristic.
//! [`is_sql_query_safe`] is the gate in front of execution: a single
//! read-only `SELECT`/`WITH` statement, no comments, no mutating keywords
//! outside literals.

pub mod lexer;

use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

use crate::error::{TabError, TabResult};
use lexer::Token;

/// Maximum identifier length produced by the sanitizers.
pub const MAX_IDENTIFIER_LEN: usize = 64;

/// Keywords that mutate data, the catalog or the session.
pub const FORBIDDEN_KEYWORDS: &[&str] = &[
    "INSERT",
    "UPDATE",
    "DELETE",
    "DROP",
    "ALTER",
    "CREATE",
    "TRUNCATE",
    "MERGE",
    "UPSERT",
    "GRANT",
    "REVOKE",
    "ATTACH",
    "DETACH",
    "COPY",
    "EXPORT",
    "IMPORT",
    "INSTALL",
    "LOAD",
    "PRAGMA",
    "SET",
    "RESET",
    "CALL",
    "VACUUM",
    "CHECKPOINT",
    "EXECUTE",
];

// The statement verb must open the text, after optional whitespace and
// parentheses.
static SQL_QUERY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?is)^\s*(?:\(\s*)*(?:SELECT\b.+?\bFROM\b|INSERT\s+(?:OR\s+\w+\s+)?INTO\b|UPDATE\s+\S+\s+SET\b|DELETE\s+FROM\b|(?:DROP|CREATE(?:\s+OR\s+REPLACE)?)\s+(?:(?:TEMP|TEMPORARY|UNIQUE)\s+)?(?:TABLE|DATABASE|VIEW|INDEX|SCHEMA)\b|ALTER\s+TABLE\b|WITH\s+(?:RECURSIVE\s+)?\w+\s+AS\s*\()",
    )
    .expect("valid SQL detection regex")
});

/// True when `text` looks like a SQL statement.
pub fn is_sql_query(text: &str) -> bool {
    SQL_QUERY_PATTERN.is_match(text)
}

/// True when `text` is a single read-only query.
pub fn is_sql_query_safe(text: &str) -> bool {
    check(text).is_ok()
}

/// Fail with [`TabError::UnsafeQueryRejected`] unless `text` is safe.
pub fn ensure_safe(text: &str) -> TabResult<()> {
    check(text).map_err(TabError::unsafe_query)
}

fn check(text: &str) -> Result<(), String> {
    if !is_sql_query(text) {
        return Err("not a SQL query".to_string());
    }

    let tokens = lexer::tokenize(text).map_err(|e| e.to_string())?;

    if tokens.iter().any(Token::is_comment) {
        return Err("statement contains a comment".to_string());
    }

    let last = tokens.len().saturating_sub(1);
    if tokens
        .iter()
        .enumerate()
        .any(|(i, t)| *t == Token::Semicolon && i != last)
    {
        return Err("multiple statements".to_string());
    }

    let leading = tokens.iter().find(|t| **t != Token::LParen);
    if !leading.is_some_and(|t| t.is_word("SELECT") || t.is_word("WITH")) {
        return Err("only SELECT and WITH queries are allowed".to_string());
    }

    if let Some(Token::Word(word)) = tokens.iter().find(|t| {
        FORBIDDEN_KEYWORDS.iter().any(|kw| t.is_word(kw))
    }) {
        return Err(format!("forbidden keyword '{}'", word.to_uppercase()));
    }

    Ok(())
}

/// File stem reduced to `[A-Za-z0-9_]`, at most 64 chars.
pub fn sanitize_file_name(path: &str) -> String {
    let stem = Path::new(path)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    sanitize_sql_table_name(&stem)
}

/// Replace every char outside `[A-Za-z0-9_]` with `_` and cap the length.
pub fn sanitize_sql_table_name(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .take(MAX_IDENTIFIER_LEN)
        .collect()
}

pub fn sanitize_sql_table_name_lowercase(name: &str) -> String {
    sanitize_sql_table_name(&name.to_lowercase())
}

/// Quote a `column`, `table.column` or `schema.table.column` reference,
/// sanitizing each part.
pub fn sanitize_view_column_name(relation: &str) -> TabResult<String> {
    let parts: Vec<&str> = relation.split('.').collect();
    if parts.len() > 3 || parts.iter().any(|p| p.trim().is_empty()) {
        return Err(TabError::InvalidIdentifier(relation.to_string()));
    }
    Ok(parts
        .iter()
        .map(|p| format!("\"{}\"", sanitize_sql_table_name_lowercase(p.trim())))
        .collect::<Vec<_>>()
        .join("."))
}
