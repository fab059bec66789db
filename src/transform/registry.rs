//! Rewrites column expressions according to transformation specs.

use serde_json::Map;

use super::types::{Transformation, TransformationKind, TransformationParams};
use crate::transpiler::{Dialect, FunctionGenerator, format_number};

/// Loose email shape accepted by `validate_email`.
pub const EMAIL_PATTERN: &str = r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$";

const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d";
const DEFAULT_TRUNCATE_LENGTH: u64 = 10;
const DEFAULT_PAD_WIDTH: u64 = 10;
const DEFAULT_COUNTRY_CODE: &str = "+1";

/// Registry of SQL templates for every [`TransformationKind`].
///
/// Rewriting never fails: a transformation missing the params it needs
/// leaves the expression unchanged and logs at debug level.
pub struct TransformationRegistry {
    dialect: Dialect,
    generator: Box<dyn FunctionGenerator + Send + Sync>,
}

impl Default for TransformationRegistry {
    fn default() -> Self {
        Self::new(Dialect::DuckDb)
    }
}

impl std::fmt::Debug for TransformationRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformationRegistry")
            .field("dialect", &self.dialect)
            .finish()
    }
}

impl TransformationRegistry {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            generator: dialect.generator(),
        }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Fold `transformations` over `expr` in order.
    pub fn apply_transformations<'a>(
        &self,
        expr: &str,
        transformations: impl IntoIterator<Item = &'a Transformation>,
    ) -> String {
        transformations
            .into_iter()
            .fold(expr.to_string(), |acc, t| self.apply(&acc, t))
    }

    /// Transformations targeting `column`, in declared order.
    pub fn get_column_transformations<'a>(
        &self,
        column: &str,
        transformations: &'a [Transformation],
    ) -> Vec<&'a Transformation> {
        transformations
            .iter()
            .filter(|t| t.applies_to(column))
            .collect()
    }

    /// Apply only the transformations that target `column`.
    pub fn apply_column_transformations(
        &self,
        expr: &str,
        column: &str,
        transformations: &[Transformation],
    ) -> String {
        let matching = self.get_column_transformations(column, transformations);
        self.apply_transformations(expr, matching)
    }

    /// Apply a single transformation.
    pub fn apply(&self, expr: &str, transformation: &Transformation) -> String {
        let p = &transformation.params;
        let rewritten = match transformation.kind {
            TransformationKind::Anonymize => Some(self.generator.md5(expr)),
            TransformationKind::FillNa => self.fill_na(expr, p),
            TransformationKind::MapValues => self.map_values(expr, p, false),
            TransformationKind::ToLowercase => Some(format!("LOWER({})", expr)),
            TransformationKind::ToUppercase => Some(format!("UPPER({})", expr)),
            TransformationKind::RoundNumbers => {
                Some(format!("ROUND({}, {})", expr, p.decimals.unwrap_or(0)))
            }
            TransformationKind::FormatDate => Some(
                self.generator
                    .format_date(expr, text_or(&p.format, DEFAULT_DATE_FORMAT)),
            ),
            TransformationKind::Truncate => Some(format!(
                "LEFT({}, {})",
                expr,
                p.length.unwrap_or(DEFAULT_TRUNCATE_LENGTH)
            )),
            TransformationKind::Scale => Some(format!(
                "({} * {})",
                expr,
                format_number(p.factor.unwrap_or(1.0))
            )),
            TransformationKind::Normalize => Some(format!(
                "(({e} - MIN({e})) / (MAX({e}) - MIN({e})))",
                e = expr
            )),
            TransformationKind::Standardize => {
                Some(format!("(({e} - AVG({e})) / STDDEV({e}))", e = expr))
            }
            TransformationKind::ConvertTimezone => Some(self.generator.convert_timezone(
                expr,
                text_or(&p.from_tz, "UTC"),
                text_or(&p.to_tz, "UTC"),
            )),
            TransformationKind::Strip => Some(format!("TRIM({})", expr)),
            TransformationKind::ToNumeric => Some(self.generator.to_numeric(expr)),
            TransformationKind::ToDatetime => Some(
                self.generator
                    .parse_date(expr, text_or(&p.format, DEFAULT_DATE_FORMAT)),
            ),
            TransformationKind::Replace => self.replace(expr, p),
            TransformationKind::Extract => p
                .pattern
                .as_deref()
                .filter(|s| !s.is_empty())
                .map(|pattern| self.generator.regexp_extract(expr, pattern)),
            TransformationKind::Pad => Some(self.pad(expr, p)),
            TransformationKind::Clip => clip(expr, p.lower, p.upper),
            TransformationKind::Bin => self.bin(expr, p),
            TransformationKind::ValidateEmail => Some(format!(
                "CASE WHEN {} THEN {} ELSE NULL END",
                self.generator.regexp_matches(expr, EMAIL_PATTERN),
                expr
            )),
            TransformationKind::ValidateDateRange => self.validate_date_range(expr, p),
            TransformationKind::NormalizePhone => Some(format!(
                "CONCAT({}, {})",
                self.generator
                    .string_literal(text_or(&p.country_code, DEFAULT_COUNTRY_CODE)),
                self.generator.regexp_replace_all(expr, "[^0-9]", "")
            )),
            TransformationKind::RemoveDuplicates => Some(format!("DISTINCT {}", expr)),
            TransformationKind::ValidateForeignKey => self.validate_foreign_key(expr, p),
            TransformationKind::EnsurePositive => Some(format!(
                "CASE WHEN {e} > 0 THEN {e} ELSE NULL END",
                e = expr
            )),
            TransformationKind::StandardizeCategories => self.map_values(expr, p, true),
            TransformationKind::Rename => p
                .new_name
                .as_deref()
                .filter(|s| !s.is_empty())
                .map(|name| format!("{} AS {}", expr, self.generator.quote_identifier(name))),
        };

        rewritten.unwrap_or_else(|| {
            tracing::debug!(
                kind = %transformation.kind,
                column = %p.column,
                "transformation missing required params; expression left unchanged"
            );
            expr.to_string()
        })
    }

    fn fill_na(&self, expr: &str, p: &TransformationParams) -> Option<String> {
        let value = p.value.as_ref().filter(|v| !v.is_null())?;
        Some(format!("COALESCE({}, {})", expr, self.json_literal(value)))
    }

    fn map_values(&self, expr: &str, p: &TransformationParams, fold_case: bool) -> Option<String> {
        let mapping: &Map<String, serde_json::Value> = p.mapping.as_ref().filter(|m| !m.is_empty())?;
        let arms: Vec<String> = mapping
            .iter()
            .map(|(key, value)| {
                let key = self.generator.string_literal(key);
                let value = self.json_literal(value);
                if fold_case {
                    format!("WHEN LOWER({}) = LOWER({}) THEN {}", expr, key, value)
                } else {
                    format!("WHEN {} = {} THEN {}", expr, key, value)
                }
            })
            .collect();
        Some(format!("CASE {} ELSE {} END", arms.join(" "), expr))
    }

    fn replace(&self, expr: &str, p: &TransformationParams) -> Option<String> {
        let old = p.old_value.as_deref().filter(|s| !s.is_empty())?;
        Some(format!(
            "REPLACE({}, {}, {})",
            expr,
            self.generator.string_literal(old),
            self.generator
                .string_literal(p.new_value.as_deref().unwrap_or(""))
        ))
    }

    fn pad(&self, expr: &str, p: &TransformationParams) -> String {
        let width = p.width.unwrap_or(DEFAULT_PAD_WIDTH);
        let fill = self.generator.string_literal(text_or(&p.pad_char, " "));
        let right = p
            .side
            .as_deref()
            .is_some_and(|s| s.eq_ignore_ascii_case("right"));
        let func = if right { "RPAD" } else { "LPAD" };
        format!("{}({}, {}, {})", func, expr, width, fill)
    }

    fn bin(&self, expr: &str, p: &TransformationParams) -> Option<String> {
        let bins = p.bins.as_ref()?;
        let labels = p.labels.as_ref()?;
        if labels.is_empty() || bins.len() != labels.len() + 1 {
            return None;
        }
        let arms: Vec<String> = labels
            .iter()
            .enumerate()
            .map(|(i, label)| {
                format!(
                    "WHEN {e} >= {} AND {e} < {} THEN {}",
                    format_number(bins[i]),
                    format_number(bins[i + 1]),
                    self.generator.string_literal(label),
                    e = expr
                )
            })
            .collect();
        Some(format!("CASE {} ELSE {} END", arms.join(" "), expr))
    }

    fn validate_date_range(&self, expr: &str, p: &TransformationParams) -> Option<String> {
        let start = p.start_date.as_deref().filter(|s| !s.is_empty());
        let end = p.end_date.as_deref().filter(|s| !s.is_empty());
        let condition = match (start, end) {
            (Some(s), Some(e)) => format!(
                "{} BETWEEN {} AND {}",
                expr,
                self.generator.string_literal(s),
                self.generator.string_literal(e)
            ),
            (Some(s), None) => format!("{} >= {}", expr, self.generator.string_literal(s)),
            (None, Some(e)) => format!("{} <= {}", expr, self.generator.string_literal(e)),
            (None, None) => return None,
        };
        Some(format!(
            "CASE WHEN {} THEN {} ELSE NULL END",
            condition, expr
        ))
    }

    fn validate_foreign_key(&self, expr: &str, p: &TransformationParams) -> Option<String> {
        let table = p.ref_table.as_deref().filter(|s| !s.is_empty())?;
        let column = p.ref_column.as_deref().filter(|s| !s.is_empty())?;
        Some(format!(
            "CASE WHEN {e} IN (SELECT {} FROM {}) THEN {e} ELSE NULL END",
            self.generator.quote_identifier(column),
            self.generator.quote_identifier(table),
            e = expr
        ))
    }

    /// Literal for a JSON param: strings quoted, numbers raw.
    fn json_literal(&self, value: &serde_json::Value) -> String {
        match value {
            serde_json::Value::Null => "NULL".to_string(),
            serde_json::Value::Bool(true) => "TRUE".to_string(),
            serde_json::Value::Bool(false) => "FALSE".to_string(),
            serde_json::Value::Number(n) => n.to_string(),
            serde_json::Value::String(s) => self.generator.string_literal(s),
            other => self.generator.string_literal(&other.to_string()),
        }
    }
}

fn clip(expr: &str, lower: Option<f64>, upper: Option<f64>) -> Option<String> {
    match (lower, upper) {
        (Some(lo), Some(hi)) => Some(format!(
            "LEAST(GREATEST({}, {}), {})",
            expr,
            format_number(lo),
            format_number(hi)
        )),
        (Some(lo), None) => Some(format!("GREATEST({}, {})", expr, format_number(lo))),
        (None, Some(hi)) => Some(format!("LEAST({}, {})", expr, format_number(hi))),
        (None, None) => None,
    }
}

/// Param text, falling back to `default` when unset or empty.
fn text_or<'a>(value: &'a Option<String>, default: &'a str) -> &'a str {
    value.as_deref().filter(|s| !s.is_empty()).unwrap_or(default)
}
