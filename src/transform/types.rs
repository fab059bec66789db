//! Declarative transformation specs as they appear in a dataset schema.

use serde::{Deserialize, Serialize};
use serde_json::Map;
use std::fmt;

/// Named transformation operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformationKind {
    Anonymize,
    FillNa,
    MapValues,
    ToLowercase,
    ToUppercase,
    #[serde(alias = "round")]
    RoundNumbers,
    FormatDate,
    Truncate,
    Scale,
    Normalize,
    Standardize,
    ConvertTimezone,
    Strip,
    ToNumeric,
    ToDatetime,
    Replace,
    Extract,
    Pad,
    Clip,
    Bin,
    ValidateEmail,
    ValidateDateRange,
    NormalizePhone,
    RemoveDuplicates,
    ValidateForeignKey,
    EnsurePositive,
    StandardizeCategories,
    Rename,
}

impl TransformationKind {
    /// Schema name of the kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            TransformationKind::Anonymize => "anonymize",
            TransformationKind::FillNa => "fill_na",
            TransformationKind::MapValues => "map_values",
            TransformationKind::ToLowercase => "to_lowercase",
            TransformationKind::ToUppercase => "to_uppercase",
            TransformationKind::RoundNumbers => "round_numbers",
            TransformationKind::FormatDate => "format_date",
            TransformationKind::Truncate => "truncate",
            TransformationKind::Scale => "scale",
            TransformationKind::Normalize => "normalize",
            TransformationKind::Standardize => "standardize",
            TransformationKind::ConvertTimezone => "convert_timezone",
            TransformationKind::Strip => "strip",
            TransformationKind::ToNumeric => "to_numeric",
            TransformationKind::ToDatetime => "to_datetime",
            TransformationKind::Replace => "replace",
            TransformationKind::Extract => "extract",
            TransformationKind::Pad => "pad",
            TransformationKind::Clip => "clip",
            TransformationKind::Bin => "bin",
            TransformationKind::ValidateEmail => "validate_email",
            TransformationKind::ValidateDateRange => "validate_date_range",
            TransformationKind::NormalizePhone => "normalize_phone",
            TransformationKind::RemoveDuplicates => "remove_duplicates",
            TransformationKind::ValidateForeignKey => "validate_foreign_key",
            TransformationKind::EnsurePositive => "ensure_positive",
            TransformationKind::StandardizeCategories => "standardize_categories",
            TransformationKind::Rename => "rename",
        }
    }
}

impl fmt::Display for TransformationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parameters of a transformation. Which fields matter depends on the kind;
/// everything except `column` is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformationParams {
    /// Column the transformation applies to.
    pub column: String,
    /// Replacement for NULLs (`fill_na`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
    /// Ordered value mapping (`map_values`, `standardize_categories`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mapping: Option<Map<String, serde_json::Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decimals: Option<i64>,
    /// strftime-style format (`format_date`, `to_datetime`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub length: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub factor: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_tz: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_tz: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_value: Option<String>,
    /// Regular expression (`extract`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u64>,
    /// `left` or `right` (`pad`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub side: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pad_char: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lower: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upper: Option<f64>,
    /// Bin edges; must hold exactly one more entry than `labels`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bins: Option<Vec<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ref_table: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ref_column: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_name: Option<String>,
}

impl TransformationParams {
    /// Params targeting `column` with every option unset.
    pub fn for_column(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            ..Default::default()
        }
    }
}

/// A named rewrite rule for one column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transformation {
    #[serde(rename = "type")]
    pub kind: TransformationKind,
    #[serde(default)]
    pub params: TransformationParams,
}

impl Transformation {
    pub fn new(kind: TransformationKind, params: TransformationParams) -> Self {
        Self { kind, params }
    }

    /// Transformation on `column` with default params.
    pub fn on(kind: TransformationKind, column: impl Into<String>) -> Self {
        Self::new(kind, TransformationParams::for_column(column))
    }

    /// Parse a JSON array of transformation specs.
    pub fn list_from_json(json: &str) -> crate::error::TabResult<Vec<Transformation>> {
        Ok(serde_json::from_str(json)?)
    }

    /// True when this transformation targets `column` (case-insensitive).
    pub fn applies_to(&self, column: &str) -> bool {
        !self.params.column.is_empty() && self.params.column.to_lowercase() == column.to_lowercase()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deserialize_spec() {
        let spec = json!([
            {"type": "to_lowercase", "params": {"column": "Name"}},
            {"type": "round", "params": {"column": "price", "decimals": 2}},
            {"type": "map_values", "params": {"column": "name", "mapping": {"z": "last", "a": "first"}}}
        ]);
        let list: Vec<Transformation> = serde_json::from_value(spec).unwrap();
        assert_eq!(list[0].kind, TransformationKind::ToLowercase);
        assert_eq!(list[1].kind, TransformationKind::RoundNumbers);
        assert_eq!(list[1].params.decimals, Some(2));

        let keys: Vec<&String> = list[2].params.mapping.as_ref().unwrap().keys().collect();
        assert_eq!(keys, vec!["z", "a"]);
    }

    #[test]
    fn test_unknown_kind_is_rejected() {
        let err = Transformation::list_from_json(r#"[{"type": "explode", "params": {"column": "a"}}]"#);
        assert!(err.is_err());
    }

    #[test]
    fn test_applies_to() {
        let t = Transformation::on(TransformationKind::Strip, "Email");
        assert!(t.applies_to("email"));
        assert!(t.applies_to("EMAIL"));
        assert!(!t.applies_to("emails"));
        assert!(!Transformation::on(TransformationKind::Strip, "").applies_to(""));
    }

    #[test]
    fn test_kind_names_round_trip() {
        let kind: TransformationKind = serde_json::from_value(json!("validate_foreign_key")).unwrap();
        assert_eq!(kind.as_str(), "validate_foreign_key");
        assert_eq!(kind.to_string(), "validate_foreign_key");
    }
}
