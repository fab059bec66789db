use crate::transpiler::traits::{FunctionGenerator, escape_identifier_with};

/// MySQL Generator.
pub struct MysqlGenerator;

impl FunctionGenerator for MysqlGenerator {
    fn quote_identifier(&self, name: &str) -> String {
        escape_identifier_with(name, '`')
    }

    fn string_literal(&self, value: &str) -> String {
        // Backslash is an escape character inside MySQL string literals
        format!("'{}'", value.replace('\\', "\\\\").replace('\'', "''"))
    }

    fn format_date(&self, expr: &str, format: &str) -> String {
        format!("DATE_FORMAT({}, {})", expr, self.string_literal(format))
    }

    fn parse_date(&self, expr: &str, format: &str) -> String {
        format!("STR_TO_DATE({}, {})", expr, self.string_literal(format))
    }

    fn convert_timezone(&self, expr: &str, from_tz: &str, to_tz: &str) -> String {
        format!(
            "CONVERT_TZ({}, {}, {})",
            expr,
            self.string_literal(from_tz),
            self.string_literal(to_tz)
        )
    }

    fn regexp_extract(&self, expr: &str, pattern: &str) -> String {
        format!("REGEXP_SUBSTR({}, {})", expr, self.string_literal(pattern))
    }

    fn regexp_matches(&self, expr: &str, pattern: &str) -> String {
        format!("{} REGEXP {}", expr, self.string_literal(pattern))
    }

    fn regexp_replace_all(&self, expr: &str, pattern: &str, replacement: &str) -> String {
        // MySQL replaces every occurrence by default
        format!(
            "REGEXP_REPLACE({}, {}, {})",
            expr,
            self.string_literal(pattern),
            self.string_literal(replacement)
        )
    }
}
