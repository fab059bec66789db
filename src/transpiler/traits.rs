//! Quoting helpers and the per-dialect function generator trait.

/// SQL reserved words that must be quoted when used as identifiers.
pub const RESERVED_WORDS: &[&str] = &[
    "all", "alter", "and", "as", "asc", "between", "by", "case", "check", "column", "constraint",
    "create", "default", "delete", "desc", "distinct", "drop", "else", "end", "except", "false",
    "from", "group", "having", "in", "index", "inner", "insert", "intersect", "is", "join", "key",
    "left", "like", "limit", "not", "null", "offset", "on", "or", "order", "outer", "primary",
    "references", "right", "select", "table", "then", "true", "union", "update", "user", "using",
    "when", "where", "with",
];

/// Escape an identifier if it's a reserved word or contains special chars.
/// Handles dotted identifiers (e.g., `schema.table`) by quoting each part.
pub fn escape_identifier(name: &str) -> String {
    escape_identifier_with(name, '"')
}

/// Same as [`escape_identifier`] with a dialect-specific quote character.
pub fn escape_identifier_with(name: &str, quote: char) -> String {
    name.split('.')
        .map(|part| escape_single_identifier(part, quote))
        .collect::<Vec<_>>()
        .join(".")
}

fn escape_single_identifier(name: &str, quote: char) -> String {
    let lower = name.to_lowercase();
    let needs_escaping = name.is_empty()
        || RESERVED_WORDS.contains(&lower.as_str())
        || name.chars().any(|c| !c.is_ascii_alphanumeric() && c != '_')
        || name.chars().next().is_some_and(|c| c.is_ascii_digit());

    if needs_escaping {
        let doubled: String = [quote, quote].iter().collect();
        format!("{q}{}{q}", name.replace(quote, &doubled), q = quote)
    } else {
        name.to_string()
    }
}

/// Single-quoted string literal with embedded quotes doubled.
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Render a number without a trailing `.0` for integral values.
pub fn format_number(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

/// Trait for dialect-specific spellings of the functions transformations use.
///
/// Arguments named `expr` are SQL expressions and are embedded verbatim;
/// every other string argument is a raw value that implementations quote.
pub trait FunctionGenerator {
    /// Quote an identifier (table or column name).
    fn quote_identifier(&self, name: &str) -> String {
        escape_identifier(name)
    }
    /// Quote a string literal.
    fn string_literal(&self, value: &str) -> String {
        quote_literal(value)
    }
    /// Hash used for anonymization.
    fn md5(&self, expr: &str) -> String {
        format!("MD5({})", expr)
    }
    /// Render a date/timestamp as text using a strftime-style format.
    fn format_date(&self, expr: &str, format: &str) -> String;
    /// Parse text into a timestamp using a strftime-style format.
    fn parse_date(&self, expr: &str, format: &str) -> String;
    /// Shift a timestamp between two named time zones.
    fn convert_timezone(&self, expr: &str, from_tz: &str, to_tz: &str) -> String;
    /// Cast text to a number.
    fn to_numeric(&self, expr: &str) -> String {
        format!("CAST({} AS DECIMAL)", expr)
    }
    /// First substring matching a regular expression.
    fn regexp_extract(&self, expr: &str, pattern: &str) -> String;
    /// Boolean regular-expression match.
    fn regexp_matches(&self, expr: &str, pattern: &str) -> String;
    /// Replace every match of a regular expression.
    fn regexp_replace_all(&self, expr: &str, pattern: &str, replacement: &str) -> String;
}
