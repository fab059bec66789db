//! Dialect handling.
//!
//! Two jobs live here: spelling SQL functions per dialect for the
//! transformation registry ([`FunctionGenerator`]), and rewriting whole
//! statements for the engine they will run on ([`Transpiler`]).

pub mod dialect;
pub mod sql;
pub mod traits;

pub use dialect::Dialect;
pub use traits::{FunctionGenerator, escape_identifier, format_number, quote_literal};

use sqlparser::parser::Parser;

use crate::error::TabResult;

/// Rewrites query text into a target dialect.
pub trait Transpiler: Send + Sync {
    fn transpile(&self, sql: &str, target: Dialect) -> TabResult<String>;
}

/// Returns queries untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct Passthrough;

impl Transpiler for Passthrough {
    fn transpile(&self, sql: &str, _target: Dialect) -> TabResult<String> {
        Ok(sql.to_string())
    }
}

/// Transpiler backed by `sqlparser`.
///
/// Statements are parsed with the source dialect and re-rendered, which
/// normalizes keywords, whitespace and dialect-only operators. Text the
/// parser rejects is returned unchanged so engine-specific syntax still
/// reaches the engine, which reports its own error if the text is wrong.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlParserTranspiler {
    source: Dialect,
}

impl SqlParserTranspiler {
    pub fn new(source: Dialect) -> Self {
        Self { source }
    }
}

impl Transpiler for SqlParserTranspiler {
    fn transpile(&self, sql: &str, target: Dialect) -> TabResult<String> {
        let dialect = self.source.parser_dialect();
        match Parser::parse_sql(dialect.as_ref(), sql) {
            Ok(statements) if !statements.is_empty() => Ok(statements
                .iter()
                .map(|s| s.to_string())
                .collect::<Vec<_>>()
                .join("; ")),
            Ok(_) => Ok(sql.to_string()),
            Err(e) => {
                tracing::debug!(
                    source = ?self.source,
                    target = ?target,
                    error = %e,
                    "transpile skipped, passing query through"
                );
                Ok(sql.to_string())
            }
        }
    }
}
