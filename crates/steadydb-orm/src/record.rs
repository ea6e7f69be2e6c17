//! The record trait.
//!
//! Records are plain structs whose fields are registered once as a
//! [`FieldSet`]. They are normally implemented with `#[derive(Record)]`:
//!
//! ```rust,ignore
//! use steadydb_orm::Record;
//!
//! #[derive(Record, Default)]
//! struct Song {
//!     id: Option<i64>,
//!     #[record(required)]
//!     title: String,
//!     #[record(map_json)]
//!     tags: Vec<String>,
//!     #[record(rename = "ct")]
//!     created_at: Option<NaiveDateTime>,
//! }
//! ```

use serde_json::{Map, Value as Json};
use steadydb_client::{Row, SqlValue};

use crate::error::FieldError;
use crate::field::FieldSet;

/// A struct mapped to a table row through its field descriptors.
///
/// Field access goes by index into [`field_set`](Record::field_set).
pub trait Record: Default + Send + Sized + 'static {
    /// The registered fields, in index order.
    fn field_set() -> &'static FieldSet;

    /// Storage value of the field at `index`.
    fn value(&self, index: usize) -> Result<SqlValue, FieldError>;

    /// Assign a storage value to the field at `index`.
    ///
    /// No input validation is applied; the value is trusted to come from
    /// storage.
    fn assign(&mut self, index: usize, value: &SqlValue) -> Result<(), FieldError>;

    /// Assign an input JSON value to the field at `index`.
    fn assign_json(&mut self, index: usize, value: &Json) -> Result<(), FieldError>;

    /// JSON form of the field at `index`.
    fn json(&self, index: usize) -> Result<Json, FieldError>;

    /// Build a record from an input map, validating every field.
    ///
    /// Each field takes the value under its alias, then under its name,
    /// then its default. Text is trimmed. A required field without a value,
    /// or with blank text, fails with [`FieldError::Required`].
    fn from_map(input: &Map<String, Json>) -> Result<Self, FieldError> {
        let mut record = Self::default();
        for field in Self::field_set().fields() {
            let found = input
                .get(field.alias_name())
                .filter(|v| !v.is_null())
                .or_else(|| input.get(field.name()).filter(|v| !v.is_null()))
                .or(field.default().filter(|v| !v.is_null()));

            let trimmed;
            let value = match found {
                Some(Json::String(s)) => {
                    trimmed = Json::String(s.trim().to_string());
                    Some(&trimmed)
                }
                other => other,
            };

            match value {
                Some(Json::String(s)) if s.is_empty() && field.is_required() => {
                    return Err(FieldError::Required {
                        field: field.name().to_string(),
                    });
                }
                Some(value) => record.assign_json(field.index(), value)?,
                None if field.is_required() => {
                    return Err(FieldError::Required {
                        field: field.name().to_string(),
                    });
                }
                None => {}
            }
        }
        Ok(record)
    }

    /// Output map keyed by field aliases.
    fn to_alias_map(&self) -> Result<Map<String, Json>, FieldError> {
        Self::field_set()
            .fields()
            .iter()
            .map(|f| Ok((f.alias_name().to_string(), self.json(f.index())?)))
            .collect()
    }
}

/// Decode a row into a record, column `offset + i` going to field
/// `fields[i]`.
///
/// Stored values are not validated. A NULL in a field that cannot hold
/// one, such as the right side of an unmatched LEFT JOIN, leaves the
/// field at its `Default` value.
pub(crate) fn decode_row<R: Record>(
    row: &Row,
    offset: usize,
    fields: &[usize],
) -> Result<R, FieldError> {
    let mut record = R::default();
    for (column, &index) in fields.iter().enumerate() {
        let value = row.value(offset + column).unwrap_or(&SqlValue::Null);
        match record.assign(index, value) {
            Err(FieldError::Required { .. }) if value.is_null() => {}
            result => result?,
        }
    }
    Ok(record)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::OnceLock;

    use serde_json::json;

    use super::*;
    use crate::field::{FieldDescriptor, FieldType};
    use crate::value;

    /// Hand-written record, the way the derive macro expands.
    #[derive(Debug, Default, PartialEq)]
    struct Account {
        id: Option<i64>,
        user_name: String,
        level: i64,
        tags: Vec<String>,
    }

    impl Record for Account {
        fn field_set() -> &'static FieldSet {
            static FIELDS: OnceLock<FieldSet> = OnceLock::new();
            FIELDS.get_or_init(|| {
                FieldSet::builder("Account")
                    .field(FieldDescriptor::new("id", FieldType::Int))
                    .field(FieldDescriptor::new("user_name", FieldType::Text).required())
                    .field(FieldDescriptor::new("level", FieldType::Int).default_value(1))
                    .field(FieldDescriptor::new("tags", FieldType::List).map_json())
                    .build()
            })
        }

        fn value(&self, index: usize) -> Result<SqlValue, FieldError> {
            let f = &Self::field_set().fields()[index];
            match index {
                0 => value::encode(f, &self.id),
                1 => value::encode(f, &self.user_name),
                2 => value::encode(f, &self.level),
                3 => value::encode(f, &self.tags),
                _ => Err(FieldError::UnknownIndex(index)),
            }
        }

        fn assign(&mut self, index: usize, v: &SqlValue) -> Result<(), FieldError> {
            let fields = Self::field_set().fields();
            match index {
                0 => self.id = value::decode(&fields[0], v)?,
                1 => self.user_name = value::decode(&fields[1], v)?,
                2 => self.level = value::decode(&fields[2], v)?,
                3 => self.tags = value::decode(&fields[3], v)?,
                _ => return Err(FieldError::UnknownIndex(index)),
            }
            Ok(())
        }

        fn assign_json(&mut self, index: usize, v: &Json) -> Result<(), FieldError> {
            let fields = Self::field_set().fields();
            match index {
                0 => self.id = value::from_json(&fields[0], v)?,
                1 => self.user_name = value::from_json(&fields[1], v)?,
                2 => self.level = value::from_json(&fields[2], v)?,
                3 => self.tags = value::from_json(&fields[3], v)?,
                _ => return Err(FieldError::UnknownIndex(index)),
            }
            Ok(())
        }

        fn json(&self, index: usize) -> Result<Json, FieldError> {
            match index {
                0 => Ok(value::to_json(&self.id)),
                1 => Ok(value::to_json(&self.user_name)),
                2 => Ok(value::to_json(&self.level)),
                3 => Ok(value::to_json(&self.tags)),
                _ => Err(FieldError::UnknownIndex(index)),
            }
        }
    }

    fn map(value: Json) -> Map<String, Json> {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn test_from_map_prefers_alias_then_name_then_default() {
        let account =
            Account::from_map(&map(json!({"userName": "  ann ", "user_name": "ignored"}))).unwrap();
        assert_eq!(account.user_name, "ann");
        assert_eq!(account.level, 1);
        assert_eq!(account.id, None);

        let account = Account::from_map(&map(json!({"user_name": "bob", "level": 3}))).unwrap();
        assert_eq!(account.user_name, "bob");
        assert_eq!(account.level, 3);
    }

    #[test]
    fn test_from_map_required() {
        let err = Account::from_map(&map(json!({"level": 2}))).unwrap_err();
        assert!(matches!(err, FieldError::Required { ref field } if field == "user_name"));

        let err = Account::from_map(&map(json!({"userName": "   "}))).unwrap_err();
        assert!(matches!(err, FieldError::Required { .. }));
    }

    #[test]
    fn test_from_map_type_mismatch() {
        let err = Account::from_map(&map(json!({"userName": "ann", "tags": "a,b"}))).unwrap_err();
        assert!(matches!(err, FieldError::TypeMismatch { ref field, .. } if field == "tags"));
    }

    #[test]
    fn test_to_alias_map() {
        let account = Account {
            id: Some(4),
            user_name: "ann".into(),
            level: 2,
            tags: vec!["x".into()],
        };
        let out = account.to_alias_map().unwrap();
        assert_eq!(
            Json::Object(out),
            json!({"id": 4, "userName": "ann", "level": 2, "tags": ["x"]})
        );
    }

    #[test]
    fn test_decode_row_subset() {
        let meta = std::sync::Arc::new(steadydb_client::ColMetaData::from_names(["tags", "user_name"]));
        let row = Row::new(
            meta,
            vec![SqlValue::Text(r#"["a"]"#.into()), SqlValue::Text("ann".into())],
        );
        let account: Account = decode_row(&row, 0, &[3, 1]).unwrap();
        assert_eq!(account.tags, vec!["a".to_string()]);
        assert_eq!(account.user_name, "ann");
        assert_eq!(account.level, 0);
    }

    #[test]
    fn test_decode_row_null_keeps_default() {
        let meta = std::sync::Arc::new(steadydb_client::ColMetaData::from_names([
            "id",
            "user_name",
            "level",
        ]));
        let row = Row::new(meta, vec![SqlValue::Null, SqlValue::Null, SqlValue::Null]);
        let account: Account = decode_row(&row, 0, &[0, 1, 2]).unwrap();
        assert_eq!(account, Account::default());

        // Missing trailing columns read as NULL too.
        let account: Account = decode_row(&row, 1, &[1, 2, 3]).unwrap();
        assert!(account.tags.is_empty());
    }

    #[test]
    fn test_decode_row_type_mismatch_still_fails() {
        let meta = std::sync::Arc::new(steadydb_client::ColMetaData::from_names(["level"]));
        let row = Row::new(meta, vec![SqlValue::Text("high".into())]);
        let err = decode_row::<Account>(&row, 0, &[2]).unwrap_err();
        assert!(matches!(err, FieldError::TypeMismatch { ref field, .. } if field == "level"));
    }
}
