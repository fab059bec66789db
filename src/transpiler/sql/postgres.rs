use crate::transpiler::traits::FunctionGenerator;

pub struct PostgresGenerator;

impl PostgresGenerator {
    /// Translate strftime specifiers into a `TO_CHAR` template.
    ///
    /// Literal text is wrapped in double quotes so Postgres does not read
    /// it as template patterns. Unknown specifiers are kept as literals.
    pub fn strftime_to_template(format: &str) -> String {
        let mut out = String::new();
        let mut literal = String::new();
        let mut chars = format.chars();

        fn flush(out: &mut String, literal: &mut String) {
            if !literal.is_empty() {
                out.push('"');
                out.push_str(&literal.replace('"', "\\\""));
                out.push('"');
                literal.clear();
            }
        }

        while let Some(c) = chars.next() {
            if c != '%' {
                if c.is_ascii_alphabetic() {
                    literal.push(c);
                } else {
                    flush(&mut out, &mut literal);
                    out.push(c);
                }
                continue;
            }
            let pattern = match chars.next() {
                Some('Y') => "YYYY",
                Some('y') => "YY",
                Some('m') => "MM",
                Some('d') => "DD",
                Some('H') => "HH24",
                Some('I') => "HH12",
                Some('M') => "MI",
                Some('S') => "SS",
                Some('f') => "US",
                Some('p') => "AM",
                Some('B') => "FMMonth",
                Some('b') => "Mon",
                Some('A') => "FMDay",
                Some('a') => "Dy",
                Some('j') => "DDD",
                Some('%') => {
                    flush(&mut out, &mut literal);
                    out.push('%');
                    continue;
                }
                Some(other) => {
                    literal.push('%');
                    literal.push(other);
                    continue;
                }
                None => {
                    literal.push('%');
                    continue;
                }
            };
            flush(&mut out, &mut literal);
            out.push_str(pattern);
        }
        flush(&mut out, &mut literal);
        out
    }
}

impl FunctionGenerator for PostgresGenerator {
    fn format_date(&self, expr: &str, format: &str) -> String {
        format!(
            "TO_CHAR({}, {})",
            expr,
            self.string_literal(&Self::strftime_to_template(format))
        )
    }

    fn parse_date(&self, expr: &str, format: &str) -> String {
        format!(
            "TO_TIMESTAMP({}, {})",
            expr,
            self.string_literal(&Self::strftime_to_template(format))
        )
    }

    fn convert_timezone(&self, expr: &str, from_tz: &str, to_tz: &str) -> String {
        format!(
            "(({}) AT TIME ZONE {} AT TIME ZONE {})",
            expr,
            self.string_literal(from_tz),
            self.string_literal(to_tz)
        )
    }

    fn regexp_extract(&self, expr: &str, pattern: &str) -> String {
        format!("SUBSTRING({} FROM {})", expr, self.string_literal(pattern))
    }

    fn regexp_matches(&self, expr: &str, pattern: &str) -> String {
        format!("{} ~ {}", expr, self.string_literal(pattern))
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
