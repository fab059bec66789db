//! In-memory tabular data exchanged with the pool.
//!
//! A [`Table`] is what callers register and what queries return: named
//! columns plus rows of dynamically typed [`Value`]s.

use chrono::{NaiveDate, NaiveDateTime};
use serde_json::Map;
use std::fmt;

use crate::error::{TabError, TabResult};

/// Dynamic cell value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    Real(f64),
    Text(String),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
}

/// SQL column type inferred from the values of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Boolean,
    BigInt,
    Double,
    Varchar,
    Date,
    Timestamp,
}

impl ColumnType {
    /// DuckDB type name.
    pub fn sql_name(self) -> &'static str {
        match self {
            ColumnType::Boolean => "BOOLEAN",
            ColumnType::BigInt => "BIGINT",
            ColumnType::Double => "DOUBLE",
            ColumnType::Varchar => "VARCHAR",
            ColumnType::Date => "DATE",
            ColumnType::Timestamp => "TIMESTAMP",
        }
    }

    fn of(value: &Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::Boolean(_) => Some(ColumnType::Boolean),
            Value::Integer(_) => Some(ColumnType::BigInt),
            Value::Real(_) => Some(ColumnType::Double),
            Value::Text(_) => Some(ColumnType::Varchar),
            Value::Date(_) => Some(ColumnType::Date),
            Value::Timestamp(_) => Some(ColumnType::Timestamp),
        }
    }

    fn widen(self, other: Self) -> Self {
        match (self, other) {
            (a, b) if a == b => a,
            (ColumnType::BigInt, ColumnType::Double) | (ColumnType::Double, ColumnType::BigInt) => {
                ColumnType::Double
            }
            _ => ColumnType::Varchar,
        }
    }
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Coerce the value to what a column of `ty` stores.
    pub fn coerce(&self, ty: ColumnType) -> Value {
        match (self, ty) {
            (Value::Null, _) => Value::Null,
            (Value::Integer(v), ColumnType::Double) => Value::Real(*v as f64),
            (v, ColumnType::Varchar) if !matches!(v, Value::Text(_)) => Value::Text(v.to_string()),
            (v, _) => v.clone(),
        }
    }

    /// Convert to a JSON value.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Boolean(v) => serde_json::Value::Bool(*v),
            Value::Integer(v) => serde_json::Value::Number((*v).into()),
            Value::Real(v) => serde_json::Number::from_f64(*v)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Text(v) => serde_json::Value::String(v.clone()),
            Value::Date(_) | Value::Timestamp(_) => serde_json::Value::String(self.to_string()),
        }
    }

    /// Convert from a JSON scalar. Arrays and objects are kept as JSON text.
    pub fn from_json(value: &serde_json::Value) -> Value {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(v) => Value::Boolean(*v),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Integer(i),
                None => n.as_f64().map(Value::Real).unwrap_or(Value::Null),
            },
            serde_json::Value::String(s) => Value::Text(s.clone()),
            other => Value::Text(other.to_string()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Boolean(v) => write!(f, "{}", v),
            Value::Integer(v) => write!(f, "{}", v),
            Value::Real(v) => write!(f, "{}", v),
            Value::Text(v) => write!(f, "{}", v),
            Value::Date(v) => write!(f, "{}", v.format("%Y-%m-%d")),
            Value::Timestamp(v) => write!(f, "{}", v.format("%Y-%m-%d %H:%M:%S%.f")),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(i64::from(v))
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Value::Date(v)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Value::Timestamp(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// Rows of values under named columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl Table {
    /// Create an empty table with the given columns.
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Build a table from named columns of equal length.
    pub fn from_columns<S: Into<String>>(
        columns: impl IntoIterator<Item = (S, Vec<Value>)>,
    ) -> TabResult<Self> {
        let mut names = Vec::new();
        let mut data: Vec<Vec<Value>> = Vec::new();
        for (name, values) in columns {
            names.push(name.into());
            data.push(values);
        }
        let height = data.first().map(Vec::len).unwrap_or(0);
        if let Some(pos) = data.iter().position(|c| c.len() != height) {
            return Err(TabError::InvalidTable(format!(
                "column '{}' has {} values, expected {}",
                names[pos],
                data[pos].len(),
                height
            )));
        }
        let rows = (0..height)
            .map(|r| data.iter().map(|c| c[r].clone()).collect())
            .collect();
        Ok(Self {
            columns: names,
            rows,
        })
    }

    /// Append a row (builder style).
    pub fn row(mut self, values: impl IntoIterator<Item = Value>) -> Self {
        self.rows.push(values.into_iter().collect());
        self
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Index of a column, case-insensitive.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(name))
    }

    /// Cell at (row, column name).
    pub fn get(&self, row: usize, column: &str) -> Option<&Value> {
        let idx = self.column_index(column)?;
        self.rows.get(row).and_then(|r| r.get(idx))
    }

    /// Check the table can be materialized.
    pub fn validate(&self) -> TabResult<()> {
        if self.columns.is_empty() {
            return Err(TabError::InvalidTable("table has no columns".to_string()));
        }
        let width = self.columns.len();
        if let Some(pos) = self.rows.iter().position(|r| r.len() != width) {
            return Err(TabError::InvalidTable(format!(
                "row {} has {} values, expected {}",
                pos,
                self.rows[pos].len(),
                width
            )));
        }
        Ok(())
    }

    /// Inferred SQL type per column. All-null columns are VARCHAR.
    pub fn column_types(&self) -> Vec<ColumnType> {
        (0..self.columns.len())
            .map(|idx| {
                self.rows
                    .iter()
                    .filter_map(|row| row.get(idx).and_then(ColumnType::of))
                    .reduce(ColumnType::widen)
                    .unwrap_or(ColumnType::Varchar)
            })
            .collect()
    }

    /// Rows as JSON objects keyed by column name.
    pub fn to_json_records(&self) -> Vec<Map<String, serde_json::Value>> {
        self.rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .cloned()
                    .zip(row.iter().map(Value::to_json))
                    .collect()
            })
            .collect()
    }

    /// Build a table from JSON records; columns follow first appearance.
    pub fn from_json_records(records: &[Map<String, serde_json::Value>]) -> Self {
        let mut columns: Vec<String> = Vec::new();
        for record in records {
            for key in record.keys() {
                if !columns.contains(key) {
                    columns.push(key.clone());
                }
            }
        }
        let rows = records
            .iter()
            .map(|record| {
                columns
                    .iter()
                    .map(|c| record.get(c).map(Value::from_json).unwrap_or(Value::Null))
                    .collect()
            })
            .collect();
        Self { columns, rows }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Table {
        Table::new(["col1", "col2"])
            .row([Value::from(1), Value::from("a")])
            .row([Value::from(2), Value::from("b")])
            .row([Value::from(3), Value::from("c")])
    }

    #[test]
    fn test_column_types() {
        let table = Table::new(["a", "b", "c", "d"])
            .row([1.into(), 1.5.into(), Value::Null, true.into()])
            .row([2.into(), 2.into(), Value::Null, "x".into()]);
        assert_eq!(
            table.column_types(),
            vec![
                ColumnType::BigInt,
                ColumnType::Double,
                ColumnType::Varchar,
                ColumnType::Varchar
            ]
        );
    }

    #[test]
    fn test_validate() {
        assert!(sample().validate().is_ok());
        assert!(Table::default().validate().is_err());
        let ragged = Table::new(["a", "b"]).row([Value::from(1)]);
        assert!(matches!(ragged.validate(), Err(TabError::InvalidTable(_))));
    }

    #[test]
    fn test_from_columns() {
        let table = Table::from_columns([
            ("col1", vec![1.into(), 2.into()]),
            ("col2", vec!["a".into(), "b".into()]),
        ])
        .unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.get(1, "COL2"), Some(&Value::from("b")));

        let err = Table::from_columns([("a", vec![1.into()]), ("b", vec![])]);
        assert!(err.is_err());
    }

    #[test]
    fn test_json_records() {
        let records = sample().to_json_records();
        assert_eq!(records[0].get("col1"), Some(&json!(1)));
        let back = Table::from_json_records(&records);
        assert_eq!(back, sample());
    }

    #[test]
    fn test_coerce() {
        assert_eq!(Value::from(3).coerce(ColumnType::Double), Value::Real(3.0));
        assert_eq!(
            Value::from(true).coerce(ColumnType::Varchar),
            Value::from("true")
        );
        assert_eq!(Value::Null.coerce(ColumnType::BigInt), Value::Null);
    }
}
