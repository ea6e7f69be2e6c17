//! Field value conversions.
//!
//! [`FieldValue`] is the converter behind every record field: it maps the
//! Rust field type to and from storage values and input JSON. The free
//! functions here apply a descriptor's flags on top of it and are what
//! `#[derive(Record)]` expands to.

use std::collections::{BTreeMap, HashMap};

use bytes::Bytes;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as Json;
use steadydb_client::{DATETIME_FORMAT, FromSql, SqlValue, TypeError};

use crate::error::FieldError;
use crate::field::{FieldDescriptor, FieldType};

/// A Rust type usable as a record field.
pub trait FieldValue: Sized {
    /// Semantic type recorded in the field descriptor.
    const FIELD_TYPE: FieldType;

    /// Convert to a storage value.
    fn to_sql_value(&self) -> SqlValue;

    /// Convert from a non-NULL storage value.
    fn from_sql_value(value: &SqlValue) -> Result<Self, TypeError>;

    /// Convert to JSON for output maps and JSON-mapped storage.
    fn to_json(&self) -> Json;

    /// Convert from a non-null input JSON value.
    fn from_json(value: &Json) -> Option<Self>;

    /// Value representing NULL, for types that have one.
    fn null() -> Option<Self> {
        None
    }
}

macro_rules! sql_backed {
    ($ty:ty, $field_type:expr, $variant:ident) => {
        impl FieldValue for $ty {
            const FIELD_TYPE: FieldType = $field_type;

            fn to_sql_value(&self) -> SqlValue {
                SqlValue::$variant(self.clone().into())
            }

            fn from_sql_value(value: &SqlValue) -> Result<Self, TypeError> {
                <$ty as FromSql>::from_sql(value)
            }

            fn to_json(&self) -> Json {
                Json::from(self.clone())
            }

            fn from_json(value: &Json) -> Option<Self> {
                serde_json::from_value(value.clone()).ok()
            }
        }
    };
}

sql_backed!(bool, FieldType::Bool, Bool);
sql_backed!(i32, FieldType::Int, Int);
sql_backed!(i64, FieldType::Int, BigInt);
sql_backed!(f64, FieldType::Float, Double);
sql_backed!(String, FieldType::Text, Text);

impl FieldValue for Bytes {
    const FIELD_TYPE: FieldType = FieldType::Bytes;

    fn to_sql_value(&self) -> SqlValue {
        SqlValue::Binary(self.clone())
    }

    fn from_sql_value(value: &SqlValue) -> Result<Self, TypeError> {
        Vec::<u8>::from_sql(value).map(Bytes::from)
    }

    fn to_json(&self) -> Json {
        Json::from(self.to_vec())
    }

    fn from_json(value: &Json) -> Option<Self> {
        serde_json::from_value::<Vec<u8>>(value.clone())
            .ok()
            .map(Bytes::from)
    }
}

macro_rules! temporal {
    ($ty:ty, $field_type:expr, $variant:ident, $format:expr) => {
        impl FieldValue for $ty {
            const FIELD_TYPE: FieldType = $field_type;

            fn to_sql_value(&self) -> SqlValue {
                SqlValue::$variant(*self)
            }

            fn from_sql_value(value: &SqlValue) -> Result<Self, TypeError> {
                <$ty as FromSql>::from_sql(value)
            }

            fn to_json(&self) -> Json {
                Json::String(self.format($format).to_string())
            }

            fn from_json(value: &Json) -> Option<Self> {
                let text = value.as_str()?;
                <$ty as FromSql>::from_sql(&SqlValue::Text(text.to_string())).ok()
            }
        }
    };
}

temporal!(NaiveDate, FieldType::Date, Date, "%Y-%m-%d");
temporal!(NaiveTime, FieldType::Time, Time, "%H:%M:%S%.f");
temporal!(NaiveDateTime, FieldType::DateTime, DateTime, DATETIME_FORMAT);

impl FieldValue for Json {
    const FIELD_TYPE: FieldType = FieldType::Json;

    fn to_sql_value(&self) -> SqlValue {
        SqlValue::Json(self.clone())
    }

    fn from_sql_value(value: &SqlValue) -> Result<Self, TypeError> {
        Json::from_sql(value)
    }

    fn to_json(&self) -> Json {
        self.clone()
    }

    fn from_json(value: &Json) -> Option<Self> {
        Some(value.clone())
    }

    fn null() -> Option<Self> {
        Some(Json::Null)
    }
}

/// Decode a JSON document from a storage value.
fn json_document(value: &SqlValue) -> Result<Json, TypeError> {
    match value {
        SqlValue::Json(v) => Ok(v.clone()),
        SqlValue::Text(s) => serde_json::from_str(s).map_err(|e| TypeError::InvalidJson(e.to_string())),
        other => Err(TypeError::TypeMismatch {
            expected: "JSON",
            actual: other.type_name().to_string(),
        }),
    }
}

impl<T: FieldValue> FieldValue for Vec<T> {
    const FIELD_TYPE: FieldType = FieldType::List;

    fn to_sql_value(&self) -> SqlValue {
        SqlValue::Json(self.to_json())
    }

    fn from_sql_value(value: &SqlValue) -> Result<Self, TypeError> {
        let doc = json_document(value)?;
        Self::from_json(&doc).ok_or_else(|| TypeError::TypeMismatch {
            expected: "list",
            actual: doc.to_string(),
        })
    }

    fn to_json(&self) -> Json {
        Json::Array(self.iter().map(FieldValue::to_json).collect())
    }

    fn from_json(value: &Json) -> Option<Self> {
        value.as_array()?.iter().map(T::from_json).collect()
    }
}

macro_rules! string_map {
    ($map:ident) => {
        impl<T: FieldValue> FieldValue for $map<String, T> {
            const FIELD_TYPE: FieldType = FieldType::Map;

            fn to_sql_value(&self) -> SqlValue {
                SqlValue::Json(self.to_json())
            }

            fn from_sql_value(value: &SqlValue) -> Result<Self, TypeError> {
                let doc = json_document(value)?;
                Self::from_json(&doc).ok_or_else(|| TypeError::TypeMismatch {
                    expected: "map",
                    actual: doc.to_string(),
                })
            }

            fn to_json(&self) -> Json {
                Json::Object(self.iter().map(|(k, v)| (k.clone(), v.to_json())).collect())
            }

            fn from_json(value: &Json) -> Option<Self> {
                value
                    .as_object()?
                    .iter()
                    .map(|(k, v)| T::from_json(v).map(|v| (k.clone(), v)))
                    .collect()
            }
        }
    };
}

string_map!(BTreeMap);
string_map!(HashMap);

impl<T: FieldValue> FieldValue for Option<T> {
    const FIELD_TYPE: FieldType = T::FIELD_TYPE;

    fn to_sql_value(&self) -> SqlValue {
        self.as_ref().map_or(SqlValue::Null, T::to_sql_value)
    }

    fn from_sql_value(value: &SqlValue) -> Result<Self, TypeError> {
        T::from_sql_value(value).map(Some)
    }

    fn to_json(&self) -> Json {
        self.as_ref().map_or(Json::Null, T::to_json)
    }

    fn from_json(value: &Json) -> Option<Self> {
        T::from_json(value).map(Some)
    }

    fn null() -> Option<Self> {
        Some(None)
    }
}

/// Any serde type, stored as a JSON document.
///
/// ```rust,ignore
/// #[derive(Record, Default)]
/// struct Song {
///     id: Option<i64>,
///     #[record(map_json)]
///     credits: JsonField<Credits>,
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JsonField<T>(pub T);

impl<T: Serialize + DeserializeOwned> FieldValue for JsonField<T> {
    const FIELD_TYPE: FieldType = FieldType::Json;

    fn to_sql_value(&self) -> SqlValue {
        SqlValue::Json(self.to_json())
    }

    fn from_sql_value(value: &SqlValue) -> Result<Self, TypeError> {
        let doc = json_document(value)?;
        serde_json::from_value(doc)
            .map(JsonField)
            .map_err(|e| TypeError::InvalidJson(e.to_string()))
    }

    fn to_json(&self) -> Json {
        serde_json::to_value(&self.0).unwrap_or(Json::Null)
    }

    fn from_json(value: &Json) -> Option<Self> {
        serde_json::from_value(value.clone()).ok().map(JsonField)
    }
}

/// Encode a field for storage, honouring `map_json`.
pub fn encode<T: FieldValue>(field: &FieldDescriptor, value: &T) -> Result<SqlValue, FieldError> {
    if !field.is_map_json() {
        return Ok(value.to_sql_value());
    }
    match value.to_json() {
        Json::Null => Ok(SqlValue::Null),
        doc => serde_json::to_string(&doc)
            .map(SqlValue::Text)
            .map_err(|e| FieldError::Json {
                field: field.name().to_string(),
                message: e.to_string(),
            }),
    }
}

/// Decode a storage value into a field, honouring `map_json`.
///
/// Used on rows read back from the database, so no input validation is
/// applied beyond the type conversion itself. NULL into a type that has no
/// NULL value fails with [`FieldError::Required`]; row decoding treats that
/// as "keep the default".
pub fn decode<T: FieldValue>(field: &FieldDescriptor, value: &SqlValue) -> Result<T, FieldError> {
    if value.is_null() {
        return T::null().ok_or_else(|| FieldError::Required {
            field: field.name().to_string(),
        });
    }
    let expected = T::FIELD_TYPE.name();
    if field.is_map_json() {
        let doc = json_document(value).map_err(|e| FieldError::from_type(field.name(), expected, e))?;
        return T::from_json(&doc)
            .ok_or_else(|| FieldError::mismatch(field.name(), expected, doc.to_string()));
    }
    T::from_sql_value(value).map_err(|e| FieldError::from_type(field.name(), expected, e))
}

/// Convert an input JSON value into a field.
pub fn from_json<T: FieldValue>(field: &FieldDescriptor, value: &Json) -> Result<T, FieldError> {
    if value.is_null() {
        return T::null().ok_or_else(|| FieldError::Required {
            field: field.name().to_string(),
        });
    }
    T::from_json(value).ok_or_else(|| FieldError::mismatch(field.name(), T::FIELD_TYPE.name(), json_kind(value)))
}

/// Convert a field to JSON for output maps.
pub fn to_json<T: FieldValue>(value: &T) -> Json {
    value.to_json()
}

/// Decode a storage value to JSON guided only by the descriptor, for the
/// generic mapping result shape.
pub fn column_json(field: &FieldDescriptor, value: &SqlValue) -> Result<Json, FieldError> {
    if value.is_null() {
        return Ok(Json::Null);
    }
    if field.is_map_json() {
        return json_document(value).map_err(|e| FieldError::from_type(field.name(), "json", e));
    }
    let name = field.name();
    let ty = field.field_type();
    let converted = match ty {
        FieldType::Bool => bool::from_sql_value(value).map(Json::from),
        FieldType::Int => i64::from_sql_value(value).map(Json::from),
        FieldType::Float => f64::from_sql_value(value).map(Json::from),
        FieldType::Text => String::from_sql_value(value).map(Json::from),
        FieldType::Bytes => Bytes::from_sql_value(value).map(|b| b.to_json()),
        FieldType::Date => NaiveDate::from_sql_value(value).map(|d| d.to_json()),
        FieldType::Time => NaiveTime::from_sql_value(value).map(|t| t.to_json()),
        FieldType::DateTime => NaiveDateTime::from_sql_value(value).map(|t| t.to_json()),
        FieldType::List | FieldType::Map | FieldType::Json => json_document(value),
    };
    converted.map_err(|e| FieldError::from_type(name, ty.name(), e))
}

fn json_kind(value: &Json) -> &'static str {
    match value {
        Json::Null => "null",
        Json::Bool(_) => "bool",
        Json::Number(_) => "number",
        Json::String(_) => "string",
        Json::Array(_) => "array",
        Json::Object(_) => "object",
    }
}
