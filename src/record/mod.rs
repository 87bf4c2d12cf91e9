//! The dynamic record facade.
//!
//! A [`Record`] is a JSON object shaped by a compiled [`RecordType`]: every
//! declared field is present, typed on construction, and a `data_value` map
//! holds display values for selection fields.

use crate::error::RecordError;
use crate::infer::{self, ValueKind};
use crate::path;
use crate::schema::RecordType;
use chrono::NaiveDateTime;
use serde_json::{Map, Value};
use std::sync::{Arc, LazyLock};

const DATA_VALUE: &str = "data_value";

/// Keys never copied by [`Record::clone_data`].
const NEVER_CLONED: [&str; 2] = ["rec_name", "list_order"];

#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    record_type: Arc<RecordType>,
    fields: Map<String, Value>,
}

impl Record {
    /// Builds a record from defaults overlaid with `payload`.
    ///
    /// Known keys are coerced to their declared type, nested rows included.
    /// Unknown keys are dropped, except `data_value`.
    pub fn new(record_type: Arc<RecordType>, payload: &Value) -> Result<Self, RecordError> {
        let fields = match payload {
            Value::Object(map) => record_type.coerce_row(map)?,
            Value::Null => record_type.defaults(),
            other => return Err(RecordError::NotAnObject(other.clone())),
        };
        let mut record = Self {
            record_type,
            fields,
        };
        record.ensure_data_value();
        Ok(record)
    }

    fn ensure_data_value(&mut self) {
        let slot = self
            .fields
            .entry(DATA_VALUE)
            .or_insert_with(|| Value::Object(Map::new()));
        if !slot.is_object() {
            *slot = Value::Object(Map::new());
        }
    }

    pub fn record_type(&self) -> &RecordType {
        &self.record_type
    }

    pub fn name(&self) -> &str {
        &self.record_type.name
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.fields.clone())
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.fields)
    }

    /// Display values of selection fields.
    pub fn data_value(&self) -> &Map<String, Value> {
        static EMPTY: LazyLock<Map<String, Value>> = LazyLock::new(Map::new);
        self.fields
            .get(DATA_VALUE)
            .and_then(Value::as_object)
            .unwrap_or(&*EMPTY)
    }

    fn set_display(&mut self, key: &str, display: Value) {
        self.ensure_data_value();
        if let Some(Value::Object(map)) = self.fields.get_mut(DATA_VALUE) {
            map.insert(key.to_string(), display);
        }
    }

    /// Resolves a dotted path; digit segments index lists.
    pub fn lookup(&self, path: &str) -> Option<&Value> {
        path::lookup_in(&self.fields, path)
    }

    /// Resolves a dotted path, returning `default` when any step fails.
    pub fn get(&self, path: &str, default: Value) -> Value {
        self.lookup(path).cloned().unwrap_or(default)
    }

    /// Stores `value` at `key`. With `coerce`, string input is run through
    /// the inferencer first. A dotted key writes into an existing container.
    pub fn set(&mut self, key: &str, value: Value, coerce: bool) {
        let value = if coerce { infer::coerce(&value) } else { value };
        if !key.contains('.') {
            self.fields.insert(key.to_string(), value);
            return;
        }
        match path::lookup_in_mut(&mut self.fields, key) {
            Some(slot) => *slot = value,
            None => self.insert_at(key, value),
        }
    }

    /// Creates the last segment of `key` inside its existing parent object.
    fn insert_at(&mut self, key: &str, value: Value) {
        let Some((parent, leaf)) = key.rsplit_once('.') else {
            return;
        };
        match path::lookup_in_mut(&mut self.fields, parent) {
            Some(Value::Object(map)) => {
                map.insert(leaf.to_string(), value);
            }
            _ => tracing::debug!(key = %key, record = %self.record_type.name, "no container for dotted key"),
        }
    }

    /// Copies the entries of `values` whose keys the record already has
    /// (table fields, `data_value`, keys stored earlier) verbatim. Other keys
    /// are skipped.
    pub fn set_many(&mut self, values: &Map<String, Value>) {
        for (key, value) in values {
            if self.fields.contains_key(key) || self.record_type.contains(key) {
                self.fields.insert(key.clone(), value.clone());
            } else {
                tracing::debug!(key = %key, record = %self.record_type.name, "set_many skips unknown key");
            }
        }
        self.ensure_data_value();
    }

    /// Stores a selection: the raw value under `key`, its label under
    /// `data_value[key]`.
    pub fn selection_value(&mut self, key: &str, value: Value, display: Value) {
        self.fields.insert(key.to_string(), value);
        self.set_display(key, display);
    }

    /// Copies a selection, value and label, from another record.
    pub fn selection_value_from_record(&mut self, key: &str, source: &Record, source_key: Option<&str>) {
        let source_key = source_key.filter(|k| !k.is_empty()).unwrap_or(key);
        let value = source.fields.get(source_key).cloned().unwrap_or(Value::Null);
        let display = source
            .data_value()
            .get(source_key)
            .cloned()
            .unwrap_or(Value::Null);
        self.selection_value(key, value, display);
    }

    /// Stores a selection whose label is looked up in an option list of
    /// `{value, <label_key>}` objects. A missing option yields an empty label.
    pub fn selection_value_resources(&mut self, key: &str, value: Value, options: &[Value], label_key: &str) {
        let label = options
            .iter()
            .find(|item| item.get("value") == Some(&value))
            .and_then(|item| item.get(label_key))
            .cloned()
            .unwrap_or_else(|| Value::from(""));
        self.selection_value(key, value, label);
    }

    /// Copies the value found at `source_path` into `key`.
    pub fn set_from_child(&mut self, key: &str, source_path: &str, default: Value) {
        let value = self.get(source_path, default);
        self.fields.insert(key.to_string(), value);
    }

    /// Re-infers the stored value of `key` in place.
    pub fn update_field_type_value(&mut self, key: &str) {
        let current = self.fields.get(key).cloned().unwrap_or_else(|| Value::from(""));
        self.fields.insert(key.to_string(), infer::coerce(&current));
    }

    /// The stored timestamp of `key`, when it holds one.
    pub fn to_datetime(&self, key: &str) -> Option<NaiveDateTime> {
        let value = self.lookup(key)?;
        if infer::classify(value) != ValueKind::Datetime {
            return None;
        }
        value.as_str().and_then(infer::parse_datetime)
    }

    /// A deep copy of the data without identity and no-clone keys.
    pub fn clone_data(&self) -> Map<String, Value> {
        let mut data = self.fields.clone();
        for key in NEVER_CLONED
            .iter()
            .copied()
            .chain(self.record_type.no_clone_field_keys.iter().map(String::as_str))
        {
            data.remove(key);
        }
        data
    }

    /// Entries of `other` whose key exists here with a different value.
    pub fn get_dict_diff(&self, other: &Map<String, Value>, ignore: &[&str]) -> Map<String, Value> {
        other
            .iter()
            .filter(|(key, _)| !ignore.contains(&key.as_str()))
            .filter(|(key, value)| self.fields.get(*key).is_some_and(|current| current != *value))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }
}
