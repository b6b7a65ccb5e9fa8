//! Field registry: which fields a query may name and how their values are typed.
//!
//! The registry is built once (from [`crate::Config`] or [`Registry::default`])
//! and then only read. Parsing, optimization and compilation all take it by
//! reference.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::value::{parse_datetime, ObjectId, Value};
use crate::{Error, Result};

/// Logical field name that aliases the datastore's primary key.
pub const ID_ALIAS: &str = "id";

/// Default primary-key field of the datastore.
pub const DEFAULT_PRIMARY_KEY: &str = "_id";

/// How a query phrase is converted before it is compared with a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Coercion {
    /// Keep the phrase as-is.
    String,
    /// Uppercase the phrase (enum-like fields such as `status`).
    UpperCase,
    /// Parse as a primary-key identifier.
    ObjectId,
    Integer,
    Float,
    /// ISO-8601 text or a Unix timestamp.
    DateTime,
}

impl Coercion {
    /// Convert `phrase`, or `None` if it is not a valid literal of this kind.
    pub fn coerce(self, phrase: &str) -> Option<Value> {
        match self {
            Coercion::String => Some(Value::String(phrase.to_string())),
            Coercion::UpperCase => Some(Value::String(phrase.to_uppercase())),
            Coercion::ObjectId => ObjectId::parse_str(phrase).map(Value::ObjectId),
            Coercion::Integer => phrase.trim().parse().ok().map(Value::Integer),
            Coercion::Float => phrase
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|f| f.is_finite())
                .map(Value::Float),
            Coercion::DateTime => parse_datetime(phrase).map(Value::DateTime),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Coercion::String => "string",
            Coercion::UpperCase => "upper_case",
            Coercion::ObjectId => "object_id",
            Coercion::Integer => "integer",
            Coercion::Float => "float",
            Coercion::DateTime => "date_time",
        }
    }
}

/// One registered field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    /// Field name as written in queries (dotted for nested documents).
    pub name: String,
    pub coercion: Coercion,
    /// Whether string values are matched as case-insensitive substrings.
    #[serde(default)]
    pub regex: bool,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, coercion: Coercion) -> Self {
        Self {
            name: name.into(),
            coercion,
            regex: false,
        }
    }

    /// Mark the field as substring-searchable.
    pub fn searchable(mut self) -> Self {
        self.regex = true;
        self
    }
}

/// The fields of an experiment document.
pub fn default_fields() -> Vec<FieldSpec> {
    vec![
        FieldSpec::new(ID_ALIAS, Coercion::ObjectId),
        FieldSpec::new("name", Coercion::String).searchable(),
        FieldSpec::new("description", Coercion::String).searchable(),
        FieldSpec::new("tags", Coercion::String),
        FieldSpec::new("start_time", Coercion::DateTime),
        FieldSpec::new("stop_time", Coercion::DateTime),
        FieldSpec::new("heartbeat", Coercion::DateTime),
        FieldSpec::new("status", Coercion::UpperCase),
        FieldSpec::new("exit_code", Coercion::Integer),
        FieldSpec::new("storage_dir", Coercion::String).searchable(),
        FieldSpec::new("exc_info.hostname", Coercion::String),
        FieldSpec::new("exc_info.work_dir", Coercion::String).searchable(),
        FieldSpec::new("args", Coercion::String),
    ]
}

/// Whether `c` may appear in a field name.
pub fn is_field_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '.' || c == '_'
}

/// Whether `name` is a legal field name (`[A-Za-z0-9._]+`).
pub fn is_field_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(is_field_char)
}

/// Read-only table of queryable fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registry {
    primary_key: String,
    fields: Vec<FieldSpec>,
}

impl Default for Registry {
    fn default() -> Self {
        Self {
            primary_key: DEFAULT_PRIMARY_KEY.to_string(),
            fields: default_fields(),
        }
    }
}

impl Registry {
    /// Build a registry, rejecting malformed or duplicate field names.
    pub fn new(primary_key: impl Into<String>, fields: Vec<FieldSpec>) -> Result<Self> {
        let primary_key = primary_key.into();
        if primary_key.is_empty() {
            return Err(Error::Config("primary key must not be empty".to_string()));
        }

        let mut seen = HashSet::new();
        for field in &fields {
            if !is_field_name(&field.name) {
                return Err(Error::Config(format!("invalid field name: {:?}", field.name)));
            }
            if !seen.insert(field.name.as_str()) {
                return Err(Error::Config(format!("duplicate field: {}", field.name)));
            }
        }

        Ok(Self { primary_key, fields })
    }

    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    /// Registered fields, in declaration order.
    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Datastore column for a query field name (`id` becomes the primary key).
    pub fn column<'a>(&'a self, field: &'a str) -> &'a str {
        if field == ID_ALIAS {
            &self.primary_key
        } else {
            field
        }
    }

    /// Registry entry for a datastore column.
    ///
    /// The primary key resolves to the `id` entry.
    pub fn lookup(&self, column: &str) -> Option<&FieldSpec> {
        let name = if column == self.primary_key {
            ID_ALIAS
        } else {
            column
        };
        self.fields
            .iter()
            .find(|f| f.name == name)
            .or_else(|| self.fields.iter().find(|f| f.name == column))
    }

    pub fn is_regex_eligible(&self, column: &str) -> bool {
        self.lookup(column).is_some_and(|f| f.regex)
    }

    /// Coerce `phrase` for `column`.
    ///
    /// Unregistered columns and failed coercions both keep the raw string.
    pub fn coerce(&self, column: &str, phrase: &str) -> Value {
        self.lookup(column)
            .and_then(|spec| spec.coercion.coerce(phrase))
            .unwrap_or_else(|| Value::String(phrase.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_registry_layout() {
        let registry = Registry::default();
        assert_eq!(registry.primary_key(), "_id");
        assert_eq!(registry.fields().len(), 13);
        assert_eq!(registry.fields()[0].name, "id");

        let searchable: Vec<&str> = registry
            .fields()
            .iter()
            .filter(|f| f.regex)
            .map(|f| f.name.as_str())
            .collect();
        assert_eq!(
            searchable,
            vec!["name", "description", "storage_dir", "exc_info.work_dir"]
        );
    }

    #[test]
    fn test_id_alias() {
        let registry = Registry::default();
        assert_eq!(registry.column("id"), "_id");
        assert_eq!(registry.column("name"), "name");
        assert_eq!(registry.lookup("_id").unwrap().coercion, Coercion::ObjectId);
    }

    #[test]
    fn test_coerce_rules() {
        let registry = Registry::default();
        assert_eq!(registry.coerce("status", "running"), Value::from("RUNNING"));
        assert_eq!(registry.coerce("exit_code", "0"), Value::Integer(0));
        assert_eq!(registry.coerce("name", "Foo"), Value::from("Foo"));
        assert!(matches!(
            registry.coerce("_id", "5c9e1a2b3c4d5e6f70819203"),
            Value::ObjectId(_)
        ));
        assert!(matches!(
            registry.coerce("start_time", "2019-03-01"),
            Value::DateTime(_)
        ));
    }

    #[test]
    fn test_coerce_failure_keeps_string() {
        let registry = Registry::default();
        assert_eq!(registry.coerce("exit_code", "zero"), Value::from("zero"));
        assert_eq!(registry.coerce("_id", "bar"), Value::from("bar"));
        assert_eq!(registry.coerce("heartbeat", "soon"), Value::from("soon"));
    }

    #[test]
    fn test_unregistered_field_is_string() {
        let registry = Registry::default();
        assert!(registry.lookup("result.loss").is_none());
        assert_eq!(registry.coerce("result.loss", "0.5"), Value::from("0.5"));
    }

    #[test]
    fn test_float_coercion() {
        assert_eq!(Coercion::Float.coerce(" 0.25 "), Some(Value::Float(0.25)));
        assert_eq!(Coercion::Float.coerce("abc"), None);
    }

    #[test]
    fn test_float_coercion_rejects_non_finite() {
        for phrase in ["nan", "NaN", "inf", "-inf", "infinity", "1e400"] {
            assert_eq!(Coercion::Float.coerce(phrase), None, "{}", phrase);
        }

        let registry = Registry::new("_id", vec![FieldSpec::new("loss", Coercion::Float)]).unwrap();
        assert_eq!(registry.coerce("loss", "nan"), Value::from("nan"));
        assert_eq!(registry.coerce("loss", "1e400"), Value::from("1e400"));
    }

    #[test]
    fn test_new_rejects_duplicates() {
        let fields = vec![
            FieldSpec::new("name", Coercion::String),
            FieldSpec::new("name", Coercion::UpperCase),
        ];
        let err = Registry::new("_id", fields).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_new_rejects_bad_names() {
        let fields = vec![FieldSpec::new("bad name", Coercion::String)];
        assert!(Registry::new("_id", fields).is_err());
        assert!(Registry::new("", default_fields()).is_err());
    }

    #[test]
    fn test_custom_primary_key() {
        let registry = Registry::new("pk", default_fields()).unwrap();
        assert_eq!(registry.column("id"), "pk");
        assert_eq!(registry.lookup("pk").unwrap().name, "id");
    }
}
