//! Field descriptors.
//!
//! A record type registers its fields once, in declaration order, as a
//! [`FieldSet`]. The set is immutable afterwards and shared by every
//! query built for the record.

use std::collections::HashMap;
use std::fmt;

/// Semantic type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum FieldType {
    /// Boolean, stored as an integer or bit.
    Bool,
    /// Integer.
    Int,
    /// Floating point.
    Float,
    /// Text.
    Text,
    /// Binary data.
    Bytes,
    /// Calendar date.
    Date,
    /// Time of day.
    Time,
    /// Date and time.
    DateTime,
    /// Ordered list.
    List,
    /// String-keyed map.
    Map,
    /// Arbitrary JSON document.
    Json,
}

impl FieldType {
    /// Name used in validation messages.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Float => "float",
            Self::Text => "text",
            Self::Bytes => "bytes",
            Self::Date => "date",
            Self::Time => "time",
            Self::DateTime => "datetime",
            Self::List => "list",
            Self::Map => "map",
            Self::Json => "json",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Metadata describing one record field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    name: String,
    alias: String,
    field_type: FieldType,
    default: Option<serde_json::Value>,
    required: bool,
    map_json: bool,
    index: usize,
}

impl FieldDescriptor {
    /// Describe a field; the alias defaults to the camelCase form of
    /// `name`.
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        let name = name.into();
        Self {
            alias: to_camel_case(&name),
            name,
            field_type,
            default: None,
            required: false,
            map_json: false,
            index: 0,
        }
    }

    /// Override the alias used in input and output maps.
    #[must_use]
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = alias.into();
        self
    }

    /// Value used when an input map has no entry for the field.
    #[must_use]
    pub fn default_value(mut self, value: impl Into<serde_json::Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Reject input maps without a value for this field.
    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Store the field as JSON text.
    #[must_use]
    pub fn map_json(mut self) -> Self {
        self.map_json = true;
        self
    }

    /// Column name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Key in input and output maps.
    pub fn alias_name(&self) -> &str {
        &self.alias
    }

    /// Semantic type.
    pub fn field_type(&self) -> FieldType {
        self.field_type
    }

    /// Default for input maps.
    pub fn default(&self) -> Option<&serde_json::Value> {
        self.default.as_ref()
    }

    /// Whether input maps must provide a value.
    pub fn is_required(&self) -> bool {
        self.required
    }

    /// Whether the field is stored as JSON text.
    pub fn is_map_json(&self) -> bool {
        self.map_json
    }

    /// Position in the record's field set.
    pub fn index(&self) -> usize {
        self.index
    }
}

/// The ordered fields of one record type.
#[derive(Debug, Clone)]
pub struct FieldSet {
    entity: String,
    fields: Vec<FieldDescriptor>,
    by_name: HashMap<String, usize>,
}

impl FieldSet {
    /// Start registering the fields of `entity`.
    pub fn builder(entity: impl Into<String>) -> FieldSetBuilder {
        FieldSetBuilder {
            entity: entity.into(),
            fields: Vec::new(),
        }
    }

    /// Name of the record type.
    pub fn entity(&self) -> &str {
        &self.entity
    }

    /// All fields in index order.
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// Field at `index`.
    pub fn field(&self, index: usize) -> Option<&FieldDescriptor> {
        self.fields.get(index)
    }

    /// Field named `name`.
    pub fn get(&self, name: &str) -> Option<&FieldDescriptor> {
        self.by_name.get(name).map(|&i| &self.fields[i])
    }

    /// Index of the field named `name`.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    /// Whether a field named `name` exists.
    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Field names in index order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the set has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Builder for [`FieldSet`].
#[derive(Debug)]
pub struct FieldSetBuilder {
    entity: String,
    fields: Vec<FieldDescriptor>,
}

impl FieldSetBuilder {
    /// Copy every field of `parent`, keeping their indices.
    ///
    /// Call this before declaring the record's own fields.
    #[must_use]
    pub fn inherit(mut self, parent: &FieldSet) -> Self {
        for field in parent.fields() {
            self = self.field(field.clone());
        }
        self
    }

    /// Declare a field.
    ///
    /// Redeclaring an existing name replaces that field in place; new
    /// names are appended.
    #[must_use]
    pub fn field(mut self, mut field: FieldDescriptor) -> Self {
        match self.fields.iter().position(|f| f.name == field.name) {
            Some(index) => {
                field.index = index;
                self.fields[index] = field;
            }
            None => {
                field.index = self.fields.len();
                self.fields.push(field);
            }
        }
        self
    }

    /// Finish registration.
    pub fn build(self) -> FieldSet {
        let by_name = self
            .fields
            .iter()
            .map(|f| (f.name.clone(), f.index))
            .collect();
        FieldSet {
            entity: self.entity,
            fields: self.fields,
            by_name,
        }
    }
}

/// Convert a `snake_case` name to `camelCase`.
pub fn to_camel_case(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut capitalize_next = false;
    for c in s.chars() {
        if c == '_' {
            capitalize_next = !result.is_empty();
        } else if capitalize_next {
            result.extend(c.to_uppercase());
            capitalize_next = false;
        } else {
            result.push(c);
        }
    }
    result
}

/// Quote an identifier with backticks.
///
/// Qualified names (`u.id`), expressions (`count(*)`) and names that
/// are already quoted pass through unchanged.
pub fn quote_ident(name: &str) -> String {
    if name.contains(['.', '(', '`']) {
        name.to_string()
    } else {
        format!("`{name}`")
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn base() -> FieldSet {
        FieldSet::builder("Base")
            .field(FieldDescriptor::new("id", FieldType::Int))
            .field(FieldDescriptor::new("created_at", FieldType::DateTime))
            .build()
    }

    #[test]
    fn test_camel_case() {
        assert_eq!(to_camel_case("user_name"), "userName");
        assert_eq!(to_camel_case("id"), "id");
        assert_eq!(to_camel_case("a_b_c"), "aBC");
        assert_eq!(to_camel_case("_private"), "private");
    }

    #[test]
    fn test_descriptor_defaults() {
        let field = FieldDescriptor::new("display_name", FieldType::Text);
        assert_eq!(field.alias_name(), "displayName");
        assert!(!field.is_required());
        assert!(!field.is_map_json());
        assert!(field.default().is_none());

        let field = field.alias("label").required().default_value("anon");
        assert_eq!(field.alias_name(), "label");
        assert!(field.is_required());
        assert_eq!(field.default(), Some(&serde_json::json!("anon")));
    }

    #[test]
    fn test_indices_follow_declaration_order() {
        let set = base();
        assert_eq!(set.entity(), "Base");
        assert_eq!(set.index_of("id"), Some(0));
        assert_eq!(set.index_of("created_at"), Some(1));
        assert_eq!(set.names().collect::<Vec<_>>(), ["id", "created_at"]);
        assert!(set.get("missing").is_none());
    }

    #[test]
    fn test_inherit_keeps_parent_index() {
        let parent = base();
        let child = FieldSet::builder("Child")
            .inherit(&parent)
            .field(FieldDescriptor::new("title", FieldType::Text))
            .field(FieldDescriptor::new("created_at", FieldType::Date).required())
            .build();

        assert_eq!(child.len(), 3);
        assert_eq!(child.index_of("created_at"), Some(1));
        assert_eq!(child.index_of("title"), Some(2));
        let redefined = child.get("created_at").unwrap();
        assert_eq!(redefined.field_type(), FieldType::Date);
        assert!(redefined.is_required());
        assert_eq!(redefined.index(), 1);
        // The parent is untouched.
        assert_eq!(parent.get("created_at").unwrap().field_type(), FieldType::DateTime);
    }

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("name"), "`name`");
        assert_eq!(quote_ident("u.name"), "u.name");
        assert_eq!(quote_ident("count(*)"), "count(*)");
        assert_eq!(quote_ident("`name`"), "`name`");
    }
}
