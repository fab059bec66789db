use crate::transpiler::traits::FunctionGenerator;

/// DuckDB Generator.
pub struct DuckDbGenerator;

impl FunctionGenerator for DuckDbGenerator {
    fn format_date(&self, expr: &str, format: &str) -> String {
        format!("STRFTIME({}, {})", expr, self.string_literal(format))
    }

    fn parse_date(&self, expr: &str, format: &str) -> String {
        format!("STRPTIME({}, {})", expr, self.string_literal(format))
    }

    fn convert_timezone(&self, expr: &str, from_tz: &str, to_tz: &str) -> String {
        // timezone(tz, naive) attaches tz; timezone(tz, timestamptz) renders in tz
        format!(
            "timezone({}, timezone({}, {}))",
            self.string_literal(to_tz),
            self.string_literal(from_tz),
            expr
        )
    }

    fn to_numeric(&self, expr: &str) -> String {
        format!("TRY_CAST({} AS DOUBLE)", expr)
    }

    fn regexp_extract(&self, expr: &str, pattern: &str) -> String {
        format!("REGEXP_EXTRACT({}, {})", expr, self.string_literal(pattern))
    }

    fn regexp_matches(&self, expr: &str, pattern: &str) -> String {
        format!("REGEXP_MATCHES({}, {})", expr, self.string_literal(pattern))
    }

    fn regexp_replace_all(&self, expr: &str, pattern: &str, replacement: &str) -> String {
        format!(
            "REGEXP_REPLACE({}, {}, {}, 'g')",
            expr,
            self.string_literal(pattern),
            self.string_literal(replacement)
        )
    }
}
