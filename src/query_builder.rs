//! SELECT builder that applies column transformations.

use crate::transform::{Transformation, TransformationKind, TransformationRegistry};
use crate::transpiler::escape_identifier;

/// Builds `SELECT <columns> FROM <table>` with each column rewritten by the
/// transformations declared for it.
#[derive(Debug)]
pub struct QueryBuilder<'r> {
    registry: &'r TransformationRegistry,
    table: String,
    columns: Vec<String>,
    transformations: Vec<Transformation>,
    order_by: Vec<(String, bool)>,
    limit: Option<u64>,
}

impl<'r> QueryBuilder<'r> {
    pub fn new(registry: &'r TransformationRegistry, table: impl Into<String>) -> Self {
        Self {
            registry,
            table: table.into(),
            columns: Vec::new(),
            transformations: Vec::new(),
            order_by: Vec::new(),
            limit: None,
        }
    }

    /// Add a projected column.
    pub fn column(mut self, name: impl Into<String>) -> Self {
        self.columns.push(name.into());
        self
    }

    /// Add transformations; only those targeting a projected column apply.
    pub fn transformations(mut self, list: impl IntoIterator<Item = Transformation>) -> Self {
        self.transformations.extend(list);
        self
    }

    pub fn order_by(mut self, column: impl Into<String>, descending: bool) -> Self {
        self.order_by.push((column.into(), descending));
        self
    }

    pub fn limit(mut self, n: u64) -> Self {
        self.limit = Some(n);
        self
    }

    pub fn build(&self) -> String {
        let projection = if self.columns.is_empty() {
            "*".to_string()
        } else {
            self.columns
                .iter()
                .map(|c| self.project(c))
                .collect::<Vec<_>>()
                .join(", ")
        };

        let mut sql = format!(
            "SELECT {} FROM {}",
            projection,
            escape_identifier(&self.table)
        );

        if !self.order_by.is_empty() {
            let keys: Vec<String> = self
                .order_by
                .iter()
                .map(|(col, desc)| {
                    format!(
                        "{} {}",
                        escape_identifier(col),
                        if *desc { "DESC" } else { "ASC" }
                    )
                })
                .collect();
            sql.push_str(" ORDER BY ");
            sql.push_str(&keys.join(", "));
        }

        if let Some(n) = self.limit {
            sql.push_str(&format!(" LIMIT {}", n));
        }

        sql
    }

    fn project(&self, column: &str) -> String {
        let quoted = escape_identifier(column);
        let applied = self
            .registry
            .get_column_transformations(column, &self.transformations);
        if applied.is_empty() {
            return quoted;
        }

        // A rename only supplies the alias, so it goes last wherever it was
        // declared; the last effective one wins.
        let (renames, rest): (Vec<_>, Vec<_>) = applied
            .into_iter()
            .partition(|t| t.kind == TransformationKind::Rename);
        let expr = self.registry.apply_transformations(&quoted, rest);
        let rename = renames
            .into_iter()
            .rev()
            .find(|t| t.params.new_name.as_deref().is_some_and(|n| !n.is_empty()));

        match rename {
            Some(rename) => self.registry.apply(&expr, rename),
            None if expr == quoted => quoted,
            None => format!("{} AS {}", expr, quoted),
        }
    }
}
