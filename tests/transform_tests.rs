use pretty_assertions::assert_eq;
use serde_json::json;
use tabquery::transform::{Transformation, TransformationKind, TransformationRegistry};
use tabquery::transpiler::Dialect;

fn parse(spec: serde_json::Value) -> Vec<Transformation> {
    serde_json::from_value(spec).expect("valid transformation spec")
}

fn render(kind: &str, params: serde_json::Value) -> String {
    let list = parse(json!([{ "type": kind, "params": params }]));
    TransformationRegistry::default().apply_transformations("col", &list)
}

#[test]
fn test_order_matters() {
    let registry = TransformationRegistry::default();
    let lower_then_map = parse(json!([
        {"type": "to_lowercase", "params": {"column": "col"}},
        {"type": "map_values", "params": {"column": "col", "mapping": {"a": "b"}}}
    ]));
    let map_then_lower = parse(json!([
        {"type": "map_values", "params": {"column": "col", "mapping": {"a": "b"}}},
        {"type": "to_lowercase", "params": {"column": "col"}}
    ]));

    assert_eq!(
        registry.apply_transformations("col", &lower_then_map),
        "CASE WHEN LOWER(col) = 'a' THEN 'b' ELSE LOWER(col) END"
    );
    assert_eq!(
        registry.apply_transformations("col", &map_then_lower),
        "LOWER(CASE WHEN col = 'a' THEN 'b' ELSE col END)"
    );
}

#[test]
fn test_documented_defaults() {
    let c = json!({"column": "col"});
    assert_eq!(render("round_numbers", c.clone()), "ROUND(col, 0)");
    assert_eq!(render("round", c.clone()), "ROUND(col, 0)");
    assert_eq!(render("format_date", c.clone()), "STRFTIME(col, '%Y-%m-%d')");
    assert_eq!(render("to_datetime", c.clone()), "STRPTIME(col, '%Y-%m-%d')");
    assert_eq!(render("truncate", c.clone()), "LEFT(col, 10)");
    assert_eq!(render("scale", c.clone()), "(col * 1)");
    assert_eq!(render("pad", c.clone()), "LPAD(col, 10, ' ')");
    assert_eq!(
        render("convert_timezone", c.clone()),
        "timezone('UTC', timezone('UTC', col))"
    );
    assert_eq!(
        render("normalize_phone", c.clone()),
        "CONCAT('+1', REGEXP_REPLACE(col, '[^0-9]', '', 'g'))"
    );
    assert_eq!(render("replace", json!({"column": "col", "old_value": "x"})), "REPLACE(col, 'x', '')");
}

#[test]
fn test_templates() {
    let cases = [
        ("anonymize", json!({}), "MD5(col)"),
        ("fill_na", json!({"value": 0}), "COALESCE(col, 0)"),
        ("fill_na", json!({"value": "n/a"}), "COALESCE(col, 'n/a')"),
        ("to_uppercase", json!({}), "UPPER(col)"),
        ("round_numbers", json!({"decimals": 2}), "ROUND(col, 2)"),
        ("scale", json!({"factor": 0.5}), "(col * 0.5)"),
        (
            "normalize",
            json!({}),
            "((col - MIN(col)) / (MAX(col) - MIN(col)))",
        ),
        ("standardize", json!({}), "((col - AVG(col)) / STDDEV(col))"),
        ("strip", json!({}), "TRIM(col)"),
        ("to_numeric", json!({}), "TRY_CAST(col AS DOUBLE)"),
        ("extract", json!({"pattern": "\\d+"}), "REGEXP_EXTRACT(col, '\\d+')"),
        (
            "pad",
            json!({"width": 5, "side": "right", "pad_char": "0"}),
            "RPAD(col, 5, '0')",
        ),
        ("clip", json!({"lower": 0, "upper": 100}), "LEAST(GREATEST(col, 0), 100)"),
        (
            "validate_date_range",
            json!({"start_date": "2020-01-01", "end_date": "2020-12-31"}),
            "CASE WHEN col BETWEEN '2020-01-01' AND '2020-12-31' THEN col ELSE NULL END",
        ),
        (
            "validate_date_range",
            json!({"start_date": "2020-01-01"}),
            "CASE WHEN col >= '2020-01-01' THEN col ELSE NULL END",
        ),
        ("remove_duplicates", json!({}), "DISTINCT col"),
        ("ensure_positive", json!({}), "CASE WHEN col > 0 THEN col ELSE NULL END"),
        (
            "standardize_categories",
            json!({"mapping": {"NY": "New York"}}),
            "CASE WHEN LOWER(col) = LOWER('NY') THEN 'New York' ELSE col END",
        ),
        ("rename", json!({"new_name": "renamed"}), "col AS renamed"),
    ];

    for (kind, extra, expected) in cases {
        let mut params = extra.as_object().cloned().unwrap_or_default();
        params.insert("column".to_string(), json!("col"));
        assert_eq!(render(kind, serde_json::Value::Object(params)), expected, "{}", kind);
    }
}

#[test]
fn test_validate_email() {
    assert_eq!(
        render("validate_email", json!({"column": "col"})),
        "CASE WHEN REGEXP_MATCHES(col, '^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\\.[A-Za-z]{2,}$') THEN col ELSE NULL END"
    );
}

#[test]
fn test_string_params_are_escaped() {
    assert_eq!(
        render(
            "replace",
            json!({"column": "col", "old_value": "'; DROP TABLE t; --", "new_value": "o'k"})
        ),
        "REPLACE(col, '''; DROP TABLE t; --', 'o''k')"
    );
    assert_eq!(
        render("map_values", json!({"column": "col", "mapping": {"it's": "fine"}})),
        "CASE WHEN col = 'it''s' THEN 'fine' ELSE col END"
    );
}

#[test]
fn test_mysql_spellings() {
    let registry = TransformationRegistry::new(Dialect::MySql);
    let list = parse(json!([
        {"type": "to_numeric", "params": {"column": "col"}},
        {"type": "convert_timezone", "params": {"column": "col", "from_tz": "UTC", "to_tz": "Europe/Oslo"}}
    ]));
    assert_eq!(
        registry.apply_transformations("col", &list),
        "CONVERT_TZ(CAST(col AS DECIMAL), 'UTC', 'Europe/Oslo')"
    );
}

#[test]
fn test_column_transformations_filter_case_insensitively() {
    let registry = TransformationRegistry::default();
    let list = parse(json!([
        {"type": "strip", "params": {"column": "Email"}},
        {"type": "to_uppercase", "params": {"column": "name"}},
        {"type": "to_lowercase", "params": {"column": "EMAIL"}}
    ]));

    let found = registry.get_column_transformations("email", &list);
    assert_eq!(found.len(), 2);
    assert_eq!(found[0].kind, TransformationKind::Strip);
    assert_eq!(
        registry.apply_column_transformations("email", "email", &list),
        "LOWER(TRIM(email))"
    );
    assert_eq!(registry.apply_column_transformations("age", "age", &list), "age");
}
