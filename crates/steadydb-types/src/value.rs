//! SQL value representation.

use bytes::Bytes;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use crate::error::TypeError;

/// Canonical text form used when a date-time travels as a string.
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

const DATETIME_FORMATS: &[&str] = &[DATETIME_FORMAT, "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M"];

/// A SQL value exchanged with a driver.
///
/// Parameters are bound as `SqlValue`s and result columns come back as
/// `SqlValue`s, so the pool and repository layers never depend on a
/// particular driver's value type.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum SqlValue {
    /// NULL value.
    #[default]
    Null,
    /// Boolean value.
    Bool(bool),
    /// 32-bit signed integer.
    Int(i32),
    /// 64-bit signed integer.
    BigInt(i64),
    /// 64-bit floating point.
    Double(f64),
    /// Text value.
    Text(String),
    /// Binary value.
    Binary(Bytes),
    /// Calendar date.
    Date(NaiveDate),
    /// Time of day.
    Time(NaiveTime),
    /// Date and time without offset.
    DateTime(NaiveDateTime),
    /// Structured JSON document.
    Json(serde_json::Value),
}

impl SqlValue {
    /// Check if the value is NULL.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Get the value as a bool, if it is one.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Get the value as an i64 if it holds any integer.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::BigInt(v) => Some(*v),
            Self::Int(v) => Some(i64::from(*v)),
            _ => None,
        }
    }

    /// Get the value as an f64, if it is one.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Double(v) => Some(*v),
            _ => None,
        }
    }

    /// Get the value as a string slice, if it is text.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(v) => Some(v),
            _ => None,
        }
    }

    /// Get the value as bytes, if it is binary.
    #[must_use]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Binary(v) => Some(v),
            _ => None,
        }
    }

    /// Get the type name as a string.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "NULL",
            Self::Bool(_) => "BOOLEAN",
            Self::Int(_) => "INTEGER",
            Self::BigInt(_) => "BIGINT",
            Self::Double(_) => "DOUBLE",
            Self::Text(_) => "TEXT",
            Self::Binary(_) => "BLOB",
            Self::Date(_) => "DATE",
            Self::Time(_) => "TIME",
            Self::DateTime(_) => "DATETIME",
            Self::Json(_) => "JSON",
        }
    }
}

/// Parse a date-time from any of the accepted text layouts.
///
/// A bare date is accepted and maps to midnight.
pub fn parse_datetime(text: &str) -> Result<NaiveDateTime, TypeError> {
    let text = text.trim();
    for format in DATETIME_FORMATS {
        if let Ok(v) = NaiveDateTime::parse_from_str(text, format) {
            return Ok(v);
        }
    }
    parse_date(text)
        .map(|d| d.and_time(NaiveTime::MIN))
        .map_err(|_| TypeError::InvalidDateTime(text.to_string()))
}

/// Parse a `YYYY-MM-DD` date.
pub fn parse_date(text: &str) -> Result<NaiveDate, TypeError> {
    NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d")
        .map_err(|_| TypeError::InvalidDateTime(text.to_string()))
}

/// Parse an `HH:MM:SS[.fff]` time.
pub fn parse_time(text: &str) -> Result<NaiveTime, TypeError> {
    NaiveTime::parse_from_str(text.trim(), "%H:%M:%S%.f")
        .map_err(|_| TypeError::InvalidDateTime(text.to_string()))
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for SqlValue {
    fn from(v: i32) -> Self {
        Self::Int(v)
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        Self::BigInt(v)
    }
}

impl From<u32> for SqlValue {
    fn from(v: u32) -> Self {
        Self::BigInt(i64::from(v))
    }
}

impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        Self::Double(v)
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_owned())
    }
}

impl From<Vec<u8>> for SqlValue {
    fn from(v: Vec<u8>) -> Self {
        Self::Binary(Bytes::from(v))
    }
}

impl From<NaiveDate> for SqlValue {
    fn from(v: NaiveDate) -> Self {
        Self::Date(v)
    }
}

impl From<NaiveTime> for SqlValue {
    fn from(v: NaiveTime) -> Self {
        Self::Time(v)
    }
}

impl From<NaiveDateTime> for SqlValue {
    fn from(v: NaiveDateTime) -> Self {
        Self::DateTime(v)
    }
}

impl From<serde_json::Value> for SqlValue {
    fn from(v: serde_json::Value) -> Self {
        Self::Json(v)
    }
}

impl<T> From<Option<T>> for SqlValue
where
    T: Into<SqlValue>,
{
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => Self::Null,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_option_into_value() {
        assert_eq!(SqlValue::from(Some(3)), SqlValue::Int(3));
        assert_eq!(SqlValue::from(None::<i64>), SqlValue::Null);
    }

    #[test]
    fn test_as_i64_widens() {
        assert_eq!(SqlValue::Int(7).as_i64(), Some(7));
        assert_eq!(SqlValue::Text("7".into()).as_i64(), None);
    }

    #[test]
    fn test_parse_datetime_layouts() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_opt(10, 30, 5)
            .unwrap();
        assert_eq!(parse_datetime("2024-03-09 10:30:05").unwrap(), expected);
        assert_eq!(parse_datetime("2024-03-09T10:30:05").unwrap(), expected);
        assert_eq!(
            parse_datetime("2024-03-09").unwrap(),
            expected.date().and_time(NaiveTime::MIN)
        );
        assert!(parse_datetime("yesterday").is_err());
    }
}
