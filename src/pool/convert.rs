//! Conversions between [`Value`] and DuckDB's value types.

use chrono::{DateTime, Datelike, NaiveDate, NaiveTime};
use duckdb::types::{TimeUnit, Value as DuckValue, ValueRef};

use crate::table::Value;

/// Days from 0001-01-01 to 1970-01-01.
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

pub(crate) fn to_duckdb(value: &Value) -> DuckValue {
    match value {
        Value::Null => DuckValue::Null,
        Value::Boolean(v) => DuckValue::Boolean(*v),
        Value::Integer(v) => DuckValue::BigInt(*v),
        Value::Real(v) => DuckValue::Double(*v),
        Value::Text(v) => DuckValue::Text(v.clone()),
        Value::Date(d) => {
            DuckValue::Date32(d.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE)
        }
        Value::Timestamp(ts) => {
            DuckValue::Timestamp(TimeUnit::Microsecond, ts.and_utc().timestamp_micros())
        }
    }
}

fn to_micros(unit: TimeUnit, v: i64) -> i64 {
    match unit {
        TimeUnit::Second => v.saturating_mul(1_000_000),
        TimeUnit::Millisecond => v.saturating_mul(1_000),
        TimeUnit::Microsecond => v,
        TimeUnit::Nanosecond => v / 1_000,
    }
}

/// Read column `index` of `row`.
pub(crate) fn from_row(row: &duckdb::Row<'_>, index: usize) -> Result<Value, duckdb::Error> {
    let value = match row.get_ref(index)? {
        ValueRef::Null => Value::Null,
        ValueRef::Boolean(v) => Value::Boolean(v),
        ValueRef::TinyInt(v) => Value::Integer(i64::from(v)),
        ValueRef::SmallInt(v) => Value::Integer(i64::from(v)),
        ValueRef::Int(v) => Value::Integer(i64::from(v)),
        ValueRef::BigInt(v) => Value::Integer(v),
        ValueRef::UTinyInt(v) => Value::Integer(i64::from(v)),
        ValueRef::USmallInt(v) => Value::Integer(i64::from(v)),
        ValueRef::UInt(v) => Value::Integer(i64::from(v)),
        ValueRef::HugeInt(v) => match i64::try_from(v) {
            Ok(i) => Value::Integer(i),
            Err(_) => Value::Text(v.to_string()),
        },
        ValueRef::UBigInt(v) => match i64::try_from(v) {
            Ok(i) => Value::Integer(i),
            Err(_) => Value::Text(v.to_string()),
        },
        ValueRef::Float(v) => Value::Real(f64::from(v)),
        ValueRef::Double(v) => Value::Real(v),
        ValueRef::Decimal(d) => {
            let text = d.to_string();
            text.parse::<f64>().map(Value::Real).unwrap_or(Value::Text(text))
        }
        ValueRef::Text(v) => Value::Text(String::from_utf8_lossy(v).into_owned()),
        ValueRef::Blob(v) => Value::Text(String::from_utf8_lossy(v).into_owned()),
        ValueRef::Date32(days) => {
            match NaiveDate::from_num_days_from_ce_opt(UNIX_EPOCH_DAYS_FROM_CE + days) {
                Some(date) => Value::Date(date),
                None => Value::Integer(i64::from(days)),
            }
        }
        ValueRef::Timestamp(unit, v) => {
            let micros = to_micros(unit, v);
            match DateTime::from_timestamp_micros(micros) {
                Some(dt) => Value::Timestamp(dt.naive_utc()),
                None => Value::Integer(micros),
            }
        }
        ValueRef::Time64(unit, v) => {
            let micros = to_micros(unit, v);
            let secs = u32::try_from(micros / 1_000_000).unwrap_or(0);
            let nanos = u32::try_from((micros % 1_000_000) * 1_000).unwrap_or(0);
            match NaiveTime::from_num_seconds_from_midnight_opt(secs, nanos) {
                Some(time) => Value::Text(time.format("%H:%M:%S%.6f").to_string()),
                None => Value::Integer(micros),
            }
        }
        other => {
            tracing::debug!(column = index, "nested DuckDB value rendered as debug text");
            Value::Text(format!("{:?}", other))
        }
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temporal_params() {
        let date = NaiveDate::from_ymd_opt(1970, 1, 11).unwrap();
        assert_eq!(to_duckdb(&Value::Date(date)), DuckValue::Date32(10));

        let ts = date.and_hms_opt(0, 0, 1).unwrap();
        assert_eq!(
            to_duckdb(&Value::Timestamp(ts)),
            DuckValue::Timestamp(TimeUnit::Microsecond, 864_001_000_000)
        );
    }

    #[test]
    fn test_scalar_params() {
        assert_eq!(to_duckdb(&Value::Null), DuckValue::Null);
        assert_eq!(to_duckdb(&Value::from(7)), DuckValue::BigInt(7));
        assert_eq!(to_duckdb(&Value::from("x")), DuckValue::Text("x".to_string()));
    }
}
