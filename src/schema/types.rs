use crate::error::RecordError;
use crate::infer::{self, ValueKind};
use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Default stored for datetime fields that have no value yet.
pub const DEFAULT_DATETIME: &str = "1970-01-01T00:00:00";

/// The type of one entry in a compiled field table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FieldType {
    String,
    Int,
    Float,
    Bool,
    Datetime,
    /// Free-form JSON object.
    Dict,
    /// Any JSON value (multi-select entries).
    Any,
    List {
        element: Box<FieldType>,
    },
    /// A nested record with its own compiled table.
    Record {
        record: Box<RecordType>,
    },
}

impl FieldType {
    pub fn list_of(element: FieldType) -> Self {
        FieldType::List {
            element: Box::new(element),
        }
    }

    pub fn record(record: RecordType) -> Self {
        FieldType::Record {
            record: Box::new(record),
        }
    }

    /// The scalar kind backing this type, if any.
    pub fn kind(&self) -> Option<ValueKind> {
        match self {
            FieldType::String => Some(ValueKind::String),
            FieldType::Int => Some(ValueKind::Int),
            FieldType::Float => Some(ValueKind::Float),
            FieldType::Bool => Some(ValueKind::Bool),
            FieldType::Datetime => Some(ValueKind::Datetime),
            FieldType::Dict => Some(ValueKind::Dict),
            FieldType::List { .. } => Some(ValueKind::List),
            FieldType::Any | FieldType::Record { .. } => None,
        }
    }

    /// The nested record type of a `list<record>` or `record` entry.
    pub fn nested(&self) -> Option<&RecordType> {
        match self {
            FieldType::Record { record } => Some(record),
            FieldType::List { element } => element.nested(),
            _ => None,
        }
    }

    /// Coerces a value into this type.
    pub fn coerce(&self, key: &str, value: &Value) -> Result<Value, RecordError> {
        let invalid = || RecordError::InvalidValue {
            key: key.to_string(),
            expected: self.to_string(),
            found: value.clone(),
        };
        match self {
            FieldType::Any => Ok(value.clone()),
            FieldType::Record { record } => match value {
                Value::Object(map) => Ok(Value::Object(record.coerce_row(map)?)),
                Value::Null => Ok(Value::Object(record.defaults())),
                _ => Err(invalid()),
            },
            FieldType::List { element } => {
                let items = match value {
                    Value::Array(items) => items.clone(),
                    Value::Null => Vec::new(),
                    other => match infer::convert(ValueKind::List, other) {
                        Some(Value::Array(items)) => items,
                        _ => return Err(invalid()),
                    },
                };
                items
                    .iter()
                    .map(|item| element.coerce(key, item))
                    .collect::<Result<Vec<_>, _>>()
                    .map(Value::Array)
            }
            scalar => {
                let kind = scalar.kind().ok_or_else(invalid)?;
                if value.is_null() {
                    return Ok(scalar.default_value());
                }
                infer::convert(kind, value).ok_or_else(invalid)
            }
        }
    }

    /// The zero value of this type.
    pub fn default_value(&self) -> Value {
        match self {
            FieldType::String => Value::String(String::new()),
            FieldType::Int => Value::from(0),
            FieldType::Float => Value::from(0.0),
            FieldType::Bool => Value::Bool(false),
            FieldType::Datetime => Value::String(DEFAULT_DATETIME.to_string()),
            FieldType::Dict => Value::Object(Map::new()),
            FieldType::Any => Value::Null,
            FieldType::List { .. } => Value::Array(Vec::new()),
            FieldType::Record { .. } => Value::Object(Map::new()),
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::String => write!(f, "string"),
            FieldType::Int => write!(f, "int"),
            FieldType::Float => write!(f, "float"),
            FieldType::Bool => write!(f, "bool"),
            FieldType::Datetime => write!(f, "datetime"),
            FieldType::Dict => write!(f, "dict"),
            FieldType::Any => write!(f, "any"),
            FieldType::List { element } => write!(f, "list<{}>", element),
            FieldType::Record { record } => write!(f, "{}", record.name),
        }
    }
}

/// One `key -> (type, default)` entry of a compiled field table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDef {
    pub key: String,
    pub field_type: FieldType,
    pub default: Value,
}

/// The compiled field table: an ordered `key -> (type, default)` map that
/// stands in for a generated record type.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordType {
    pub name: String,
    fields: Vec<FieldDef>,
    #[serde(skip)]
    index: AHashMap<String, usize>,
    /// Keys stripped by `clone_data` on top of the fixed baseline.
    pub no_clone_field_keys: Vec<String>,
}

// Two tables are equal when their ordered entries are; the index is derived.
impl PartialEq for RecordType {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.fields == other.fields
            && self.no_clone_field_keys == other.no_clone_field_keys
    }
}

impl RecordType {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    /// Inserts or replaces an entry. Replacing keeps the original position.
    pub fn insert(&mut self, key: &str, field_type: FieldType, default: Value) {
        let def = FieldDef {
            key: key.to_string(),
            field_type,
            default,
        };
        match self.position(key) {
            Some(pos) => self.fields[pos] = def,
            None => {
                self.index.insert(key.to_string(), self.fields.len());
                self.fields.push(def);
            }
        }
    }

    fn position(&self, key: &str) -> Option<usize> {
        if self.index.len() == self.fields.len() {
            return self.index.get(key).copied();
        }
        // Index is not serialized; fall back to a scan after deserialization.
        self.fields.iter().position(|f| f.key == key)
    }

    pub fn get(&self, key: &str) -> Option<&FieldDef> {
        self.position(key).map(|pos| &self.fields[pos])
    }

    pub fn contains(&self, key: &str) -> bool {
        self.position(key).is_some()
    }

    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.key.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// A fresh object holding every field's default.
    pub fn defaults(&self) -> Map<String, Value> {
        self.fields
            .iter()
            .map(|f| (f.key.clone(), f.default.clone()))
            .collect()
    }

    /// Builds a row from defaults overlaid with the known keys of `payload`.
    pub fn coerce_row(&self, payload: &Map<String, Value>) -> Result<Map<String, Value>, RecordError> {
        let mut row = self.defaults();
        for (key, value) in payload {
            match self.get(key) {
                Some(def) => {
                    row.insert(key.clone(), def.field_type.coerce(key, value)?);
                }
                None if key == "data_value" => {
                    row.insert(key.clone(), value.clone());
                }
                None => tracing::debug!(key = %key, record = %self.name, "ignoring key not in field table"),
            }
        }
        Ok(row)
    }
}
