//! Execution front door for generated queries.
//!
//! The [`Engine`] ties the pool, the admission gate and the transformation
//! registry together: tables are registered into the pool, model-written SQL
//! passes [`ensure_safe`](crate::sanitizer::ensure_safe) before it runs, and
//! hand-built queries come from [`QueryBuilder`].

use std::sync::Arc;

use crate::error::TabResult;
use crate::pool::ConnectionPool;
use crate::query_builder::QueryBuilder;
use crate::sanitizer;
use crate::table::Table;
use crate::transform::TransformationRegistry;
use crate::transpiler::Dialect;

/// Language-model collaborator that turns a prompt into text.
pub trait Llm {
    fn call(&self, prompt: &str) -> TabResult<String>;
}

impl<F> Llm for F
where
    F: Fn(&str) -> TabResult<String>,
{
    fn call(&self, prompt: &str) -> TabResult<String> {
        self(prompt)
    }
}

/// Pull SQL out of a model reply, dropping Markdown code fences.
///
/// The first fenced block wins; a reply without fences is used whole.
pub fn extract_sql(reply: &str) -> String {
    let text = reply.trim();
    let Some(open) = text.find("```") else {
        return text.to_string();
    };
    let after_fence = &text[open + 3..];
    // Skip the info string (```sql).
    let body_start = after_fence.find('\n').map(|i| i + 1).unwrap_or(after_fence.len());
    let body = &after_fence[body_start..];
    let end = body.find("```").unwrap_or(body.len());
    body[..end].trim().to_string()
}

/// Runs registered tables and generated queries against a pool.
#[derive(Debug)]
pub struct Engine {
    pool: Arc<ConnectionPool>,
    registry: TransformationRegistry,
}

impl Engine {
    pub fn new(pool: Arc<ConnectionPool>) -> Self {
        Self {
            pool,
            registry: TransformationRegistry::default(),
        }
    }

    /// Render transformations for `dialect` instead of DuckDB.
    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.registry = TransformationRegistry::new(dialect);
        self
    }

    pub fn pool(&self) -> &Arc<ConnectionPool> {
        &self.pool
    }

    pub fn registry(&self) -> &TransformationRegistry {
        &self.registry
    }

    /// Make `table` queryable as `name`.
    pub fn register(&self, name: &str, table: &Table) -> TabResult<()> {
        self.pool.register(name, table)
    }

    /// Run SQL written by a model once it passes the admission gate.
    pub fn run_generated(&self, sql: &str) -> TabResult<Table> {
        if let Err(e) = sanitizer::ensure_safe(sql) {
            tracing::warn!(error = %e, "generated query rejected");
            return Err(e);
        }
        self.pool.sql(sql, &[])
    }

    /// Ask `llm` for a query and run it.
    pub fn ask(&self, llm: &dyn Llm, prompt: &str) -> TabResult<Table> {
        let reply = llm.call(prompt)?;
        let sql = extract_sql(&reply);
        tracing::debug!(sql = %sql, "model produced query");
        self.run_generated(&sql)
    }

    /// Start a SELECT over `table` using this engine's dialect.
    pub fn query_builder(&self, table: &str) -> QueryBuilder<'_> {
        QueryBuilder::new(&self.registry, table)
    }

    pub fn close(&self) {
        self.pool.close();
    }
}
