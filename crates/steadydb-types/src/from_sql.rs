//! Trait for converting from SQL values to Rust types.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use crate::error::TypeError;
use crate::value::{SqlValue, parse_date, parse_datetime, parse_time};

/// Trait for types that can be converted from SQL values.
///
/// Conversions are lenient in the directions drivers commonly need:
/// integers widen and narrow with range checks, and text parses into
/// numbers, dates and JSON.
pub trait FromSql: Sized {
    /// Convert from a SQL value to this type.
    fn from_sql(value: &SqlValue) -> Result<Self, TypeError>;

    /// Convert from an optional SQL value.
    ///
    /// Returns `None` if the value is NULL.
    fn from_sql_nullable(value: &SqlValue) -> Result<Option<Self>, TypeError> {
        if value.is_null() {
            Ok(None)
        } else {
            Self::from_sql(value).map(Some)
        }
    }
}

impl FromSql for bool {
    fn from_sql(value: &SqlValue) -> Result<Self, TypeError> {
        match value {
            SqlValue::Bool(v) => Ok(*v),
            SqlValue::Int(v) => Ok(*v != 0),
            SqlValue::BigInt(v) => Ok(*v != 0),
            // BIT(1) columns arrive as a single byte.
            SqlValue::Binary(b) if b.len() == 1 => Ok(b[0] != 0),
            SqlValue::Text(s) => match s.trim() {
                "1" | "true" | "TRUE" => Ok(true),
                "0" | "false" | "FALSE" => Ok(false),
                _ => Err(TypeError::mismatch("bool", value)),
            },
            SqlValue::Null => Err(TypeError::UnexpectedNull),
            _ => Err(TypeError::mismatch("bool", value)),
        }
    }
}

impl FromSql for i64 {
    fn from_sql(value: &SqlValue) -> Result<Self, TypeError> {
        match value {
            SqlValue::BigInt(v) => Ok(*v),
            SqlValue::Int(v) => Ok(i64::from(*v)),
            SqlValue::Bool(v) => Ok(i64::from(*v)),
            SqlValue::Text(s) => s
                .trim()
                .parse()
                .map_err(|_| TypeError::mismatch("i64", value)),
            SqlValue::Null => Err(TypeError::UnexpectedNull),
            _ => Err(TypeError::mismatch("i64", value)),
        }
    }
}

impl FromSql for i32 {
    fn from_sql(value: &SqlValue) -> Result<Self, TypeError> {
        let wide = i64::from_sql(value).map_err(|e| match e {
            TypeError::TypeMismatch { actual, .. } => TypeError::TypeMismatch {
                expected: "i32",
                actual,
            },
            other => other,
        })?;
        i32::try_from(wide).map_err(|_| TypeError::OutOfRange { target_type: "i32" })
    }
}

impl FromSql for u64 {
    fn from_sql(value: &SqlValue) -> Result<Self, TypeError> {
        let wide = i64::from_sql(value)?;
        u64::try_from(wide).map_err(|_| TypeError::OutOfRange { target_type: "u64" })
    }
}

impl FromSql for f64 {
    fn from_sql(value: &SqlValue) -> Result<Self, TypeError> {
        match value {
            SqlValue::Double(v) => Ok(*v),
            SqlValue::Int(v) => Ok(f64::from(*v)),
            SqlValue::BigInt(v) => Ok(*v as f64),
            SqlValue::Text(s) => s
                .trim()
                .parse()
                .map_err(|_| TypeError::mismatch("f64", value)),
            SqlValue::Null => Err(TypeError::UnexpectedNull),
            _ => Err(TypeError::mismatch("f64", value)),
        }
    }
}

impl FromSql for String {
    fn from_sql(value: &SqlValue) -> Result<Self, TypeError> {
        match value {
            SqlValue::Text(v) => Ok(v.clone()),
            SqlValue::Binary(b) => {
                String::from_utf8(b.to_vec()).map_err(|_| TypeError::mismatch("String", value))
            }
            SqlValue::Null => Err(TypeError::UnexpectedNull),
            _ => Err(TypeError::mismatch("String", value)),
        }
    }
}

impl FromSql for Vec<u8> {
    fn from_sql(value: &SqlValue) -> Result<Self, TypeError> {
        match value {
            SqlValue::Binary(v) => Ok(v.to_vec()),
            SqlValue::Text(s) => Ok(s.as_bytes().to_vec()),
            SqlValue::Null => Err(TypeError::UnexpectedNull),
            _ => Err(TypeError::mismatch("Vec<u8>", value)),
        }
    }
}

impl FromSql for NaiveDate {
    fn from_sql(value: &SqlValue) -> Result<Self, TypeError> {
        match value {
            SqlValue::Date(v) => Ok(*v),
            SqlValue::DateTime(v) => Ok(v.date()),
            SqlValue::Text(s) => parse_date(s),
            SqlValue::Null => Err(TypeError::UnexpectedNull),
            _ => Err(TypeError::mismatch("NaiveDate", value)),
        }
    }
}

impl FromSql for NaiveTime {
    fn from_sql(value: &SqlValue) -> Result<Self, TypeError> {
        match value {
            SqlValue::Time(v) => Ok(*v),
            SqlValue::DateTime(v) => Ok(v.time()),
            SqlValue::Text(s) => parse_time(s),
            SqlValue::Null => Err(TypeError::UnexpectedNull),
            _ => Err(TypeError::mismatch("NaiveTime", value)),
        }
    }
}

impl FromSql for NaiveDateTime {
    fn from_sql(value: &SqlValue) -> Result<Self, TypeError> {
        match value {
            SqlValue::DateTime(v) => Ok(*v),
            SqlValue::Date(v) => Ok(v.and_time(NaiveTime::MIN)),
            SqlValue::Text(s) => parse_datetime(s),
            SqlValue::Null => Err(TypeError::UnexpectedNull),
            _ => Err(TypeError::mismatch("NaiveDateTime", value)),
        }
    }
}

impl FromSql for serde_json::Value {
    fn from_sql(value: &SqlValue) -> Result<Self, TypeError> {
        match value {
            SqlValue::Json(v) => Ok(v.clone()),
            SqlValue::Text(s) => {
                serde_json::from_str(s).map_err(|e| TypeError::InvalidJson(e.to_string()))
            }
            SqlValue::Null => Ok(serde_json::Value::Null),
            _ => Err(TypeError::mismatch("JSON", value)),
        }
    }
}

impl<T: FromSql> FromSql for Option<T> {
    fn from_sql(value: &SqlValue) -> Result<Self, TypeError> {
        T::from_sql_nullable(value)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[test]
    fn test_from_sql_i32_narrows_with_range_check() {
        assert_eq!(i32::from_sql(&SqlValue::BigInt(42)).unwrap(), 42);
        assert!(matches!(
            i32::from_sql(&SqlValue::BigInt(i64::MAX)),
            Err(TypeError::OutOfRange { target_type: "i32" })
        ));
    }

    #[test]
    fn test_from_sql_bool_variants() {
        assert!(bool::from_sql(&SqlValue::BigInt(1)).unwrap());
        assert!(bool::from_sql(&SqlValue::Binary(Bytes::from_static(b"\x01"))).unwrap());
        assert!(!bool::from_sql(&SqlValue::Text("0".into())).unwrap());
        assert!(bool::from_sql(&SqlValue::Double(1.0)).is_err());
    }

    #[test]
    fn test_from_sql_null() {
        assert!(matches!(
            i64::from_sql(&SqlValue::Null),
            Err(TypeError::UnexpectedNull)
        ));
        assert_eq!(Option::<i64>::from_sql(&SqlValue::Null).unwrap(), None);
    }

    #[test]
    fn test_from_sql_datetime_from_text() {
        let dt = NaiveDateTime::from_sql(&SqlValue::Text("2023-01-02 03:04:05.250".into())).unwrap();
        assert_eq!(dt.format("%H:%M:%S%.3f").to_string(), "03:04:05.250");
    }

    #[test]
    fn test_from_sql_json_from_text() {
        let v = serde_json::Value::from_sql(&SqlValue::Text("[\"a\",\"b\"]".into())).unwrap();
        assert_eq!(v, serde_json::json!(["a", "b"]));
        assert!(matches!(
            serde_json::Value::from_sql(&SqlValue::Text("[".into())),
            Err(TypeError::InvalidJson(_))
        ));
    }
}
