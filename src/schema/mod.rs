//! Raw schema documents and the compiled field table types.

use crate::error::CompileError;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

pub mod types;

pub use types::*;

/// A form-builder schema payload: `{components, properties, data_model?}`.
///
/// Components are kept as raw JSON so that a single malformed node can be
/// rejected by the compiler without failing the whole document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaDocument {
    pub components: Vec<Value>,
    #[serde(default, deserialize_with = "lenient_map")]
    pub properties: Map<String, Value>,
    #[serde(default)]
    pub data_model: Option<String>,
}

impl SchemaDocument {
    pub fn from_json(json: &str) -> Result<Self, CompileError> {
        let value: Value =
            serde_json::from_str(json).map_err(|e| CompileError::JsonParseError(e.to_string()))?;
        Self::from_value(&value)
    }

    pub fn from_value(value: &Value) -> Result<Self, CompileError> {
        let Some(obj) = value.as_object() else {
            return Err(CompileError::InvalidSchema(
                "schema must be a JSON object".to_string(),
            ));
        };
        if !matches!(obj.get("components"), Some(Value::Array(_))) {
            return Err(CompileError::InvalidSchema(
                "schema has no 'components' array".to_string(),
            ));
        }
        serde_json::from_value(value.clone())
            .map_err(|e| CompileError::InvalidSchema(e.to_string()))
    }

    /// Builds a document from a bare component list.
    pub fn from_components(components: Vec<Value>) -> Self {
        Self {
            components,
            ..Default::default()
        }
    }
}

/// One element of the form tree, either a field or a layout container.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaNode {
    #[serde(default)]
    pub key: String,
    #[serde(default, rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, deserialize_with = "truthy")]
    pub input: bool,
    #[serde(default, deserialize_with = "truthy")]
    pub hidden: bool,
    #[serde(default, deserialize_with = "truthy")]
    pub disabled: bool,
    #[serde(default, deserialize_with = "truthy")]
    pub read_only_value: bool,
    #[serde(default, deserialize_with = "truthy")]
    pub table_view: bool,
    #[serde(default, deserialize_with = "truthy")]
    pub multiple: bool,
    #[serde(default, deserialize_with = "truthy")]
    pub require_decimal: bool,
    #[serde(default, deserialize_with = "lenient_map")]
    pub validate: Map<String, Value>,
    #[serde(default, deserialize_with = "lenient_map")]
    pub properties: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditional: Option<Value>,
    #[serde(default, deserialize_with = "lenient_list", skip_serializing_if = "Vec::is_empty")]
    pub logic: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, deserialize_with = "lenient_list", skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<Value>,
    #[serde(default, deserialize_with = "lenient_list", skip_serializing_if = "Vec::is_empty")]
    pub columns: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decimal_limit: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_mask: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delimiter: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_date: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_time: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub widget: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calculate_value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_src: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_property: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub select_values: Option<String>,
    #[serde(default, deserialize_with = "lenient_list", skip_serializing_if = "Vec::is_empty")]
    pub questions: Vec<Value>,
    #[serde(default, deserialize_with = "lenient_list", skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<Value>,
    /// Keys this crate does not interpret, preserved verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SchemaNode {
    /// Deserializes a node. The error carries whatever key/type could be read.
    pub fn from_value(value: &Value) -> Result<Self, CompileError> {
        serde_json::from_value(value.clone()).map_err(|e| CompileError::MalformedField {
            key: value
                .get("key")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            kind: value
                .get("type")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            message: e.to_string(),
        })
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    pub fn raw_label(&self) -> &str {
        self.label.as_deref().unwrap_or_default()
    }

    /// `properties.type`, used to pick sub-variants such as JSON textareas.
    pub fn property_type(&self) -> Option<&str> {
        self.properties.get("type").and_then(Value::as_str)
    }

    pub fn property_flag(&self, name: &str) -> bool {
        self.properties.get(name).is_some_and(is_truthy)
    }

    /// The `conditional.json` expression, when it is an object.
    pub fn conditional_json(&self) -> Option<&Value> {
        self.conditional
            .as_ref()
            .and_then(|c| c.get("json"))
            .filter(|json| json.is_object())
    }

    /// `(trigger.json, actions)` for every logic entry that has a JSON trigger.
    pub fn logic_rules(&self) -> impl Iterator<Item = (&Value, &[Value])> {
        self.logic.iter().filter_map(|rule| {
            let trigger = rule.get("trigger")?.get("json")?;
            if !is_truthy(trigger) {
                return None;
            }
            let actions = rule
                .get("actions")
                .and_then(Value::as_array)
                .map(Vec::as_slice)
                .unwrap_or_default();
            Some((trigger, actions))
        })
    }
}

/// JSON-logic truthiness: `false`, `null`, `0`, `""` and `[]` are falsy.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(_) => true,
    }
}

fn truthy<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Value::deserialize(deserializer).map(|v| is_truthy(&v))
}

fn lenient_map<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Map<String, Value>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Object(map) => map,
        _ => Map::new(),
    })
}

fn lenient_list<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Value>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(items) => items,
        _ => Vec::new(),
    })
}
