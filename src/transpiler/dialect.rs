use serde::Deserialize;

use crate::transpiler::sql::duckdb::DuckDbGenerator;
use crate::transpiler::sql::mysql::MysqlGenerator;
use crate::transpiler::sql::postgres::PostgresGenerator;
use crate::transpiler::traits::FunctionGenerator;

/// Supported SQL Dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    #[default]
    DuckDb,
    Postgres,
    MySql,
    /// Whatever the generic parser accepts; functions render as DuckDB.
    Generic,
}

impl Dialect {
    pub fn generator(&self) -> Box<dyn FunctionGenerator + Send + Sync> {
        match self {
            Dialect::DuckDb | Dialect::Generic => Box::new(DuckDbGenerator),
            Dialect::Postgres => Box::new(PostgresGenerator),
            Dialect::MySql => Box::new(MysqlGenerator),
        }
    }

    /// Matching `sqlparser` dialect.
    pub fn parser_dialect(&self) -> Box<dyn sqlparser::dialect::Dialect> {
        use sqlparser::dialect::{DuckDbDialect, GenericDialect, MySqlDialect, PostgreSqlDialect};
        match self {
            Dialect::DuckDb => Box::new(DuckDbDialect {}),
            Dialect::Postgres => Box::new(PostgreSqlDialect {}),
            Dialect::MySql => Box::new(MySqlDialect {}),
            Dialect::Generic => Box::new(GenericDialect {}),
        }
    }

    /// Parse a dialect name such as `duckdb`, `postgresql` or `mysql`.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "duckdb" => Some(Dialect::DuckDb),
            "postgres" | "postgresql" | "pg" => Some(Dialect::Postgres),
            "mysql" | "mariadb" => Some(Dialect::MySql),
            "generic" | "ansi" => Some(Dialect::Generic),
            _ => None,
        }
    }
}
