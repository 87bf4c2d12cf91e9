use super::Locale;
use crate::error::CompileError;
use crate::infer::{self, ValueKind};
use crate::path;
use crate::schema::{SchemaNode, is_truthy};
use ahash::AHashMap;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::LazyLock;

static TAG_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<.*?>").expect("tag pattern is valid"));

const DEFAULT_TEMPLATE: &str = "<span>{{ item.label }}</span>";

/// Where a select field takes its options from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    Values,
    Resource,
    Url,
}

impl DataSource {
    fn from_name(name: Option<&str>) -> Self {
        match name {
            Some("resource") => DataSource::Resource,
            Some("url") => DataSource::Url,
            _ => DataSource::Values,
        }
    }

    /// Whether the option list has to be resolved by the caller.
    pub fn is_external(&self) -> bool {
        !matches!(self, DataSource::Values)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectOption {
    pub label: String,
    pub value: Value,
}

/// Resolved options plus a `value -> label` search map.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OptionList {
    pub values: Vec<SelectOption>,
    pub search: AHashMap<String, String>,
}

impl OptionList {
    fn push(&mut self, label: String, value: Value) {
        self.search.insert(option_key(&value), label.clone());
        self.values.push(SelectOption { label, value });
    }
}

/// Select-specific configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectSpec {
    pub data_src: DataSource,
    pub multiple: bool,
    pub value_property: Option<String>,
    pub default_value: Value,
    pub id_path: Option<String>,
    pub select_values: Option<String>,
    pub values: Vec<SelectOption>,
    pub resource_id: Option<String>,
    pub template_label_keys: Vec<String>,
    pub url: Option<String>,
    /// The single request header sent with a url source: `(key, value)`.
    pub header: Option<(String, String)>,
    pub label_property: String,
    pub id_property: String,
}

impl SelectSpec {
    pub fn from_node(node: &SchemaNode) -> Result<Self, CompileError> {
        let data = node.data.as_ref();
        let data_src = DataSource::from_name(node.data_src.as_deref());
        let malformed = |message: &str| CompileError::MalformedField {
            key: node.key.clone(),
            kind: node.kind.clone(),
            message: message.to_string(),
        };

        let values = data
            .and_then(|d| d.get("values"))
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(parse_option).collect())
            .unwrap_or_default();

        let mut spec = Self {
            data_src,
            multiple: node.multiple,
            value_property: node.value_property.clone().filter(|p| !p.is_empty()),
            default_value: node.default_value.clone().unwrap_or_else(|| Value::from("")),
            id_path: node.id_path.clone(),
            select_values: node.select_values.clone(),
            values,
            resource_id: None,
            template_label_keys: Vec::new(),
            url: None,
            header: None,
            label_property: property_name(node, "label"),
            id_property: property_name(node, "id"),
        };

        match data_src {
            DataSource::Values => {}
            DataSource::Resource => {
                let template = node.template.as_deref().unwrap_or(DEFAULT_TEMPLATE);
                spec.template_label_keys = decode_resource_template(template);
                spec.resource_id = data
                    .and_then(|d| d.get("resource"))
                    .and_then(Value::as_str)
                    .map(str::to_string);
            }
            DataSource::Url => {
                let data = data.ok_or_else(|| malformed("url source has no data block"))?;
                spec.url = data.get("url").and_then(Value::as_str).map(str::to_string);
                let header = data
                    .get("headers")
                    .and_then(Value::as_array)
                    .and_then(|headers| headers.first())
                    .ok_or_else(|| malformed("url source has no request header"))?;
                let field = |name: &str| {
                    header
                        .get(name)
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string()
                };
                spec.header = Some((field("key"), field("value")));
            }
        }
        Ok(spec)
    }

    /// Builds the option list. `resolved` is the caller-fetched list for
    /// resource and url sources and is ignored for inline values.
    pub fn options(&self, resolved: &[Value]) -> OptionList {
        let mut list = OptionList::default();
        match self.data_src {
            DataSource::Values => {
                for option in &self.values {
                    list.push(option.label.clone(), option.value.clone());
                }
            }
            DataSource::Resource => {
                for item in resolved {
                    let label = path::lookup(item, &self.template_label_keys.join("."));
                    match (label, item.get("rec_name")) {
                        (Some(label), Some(id)) => list.push(label_text(label), id.clone()),
                        _ => tracing::debug!(item = %item, "resource item has no label or rec_name"),
                    }
                }
            }
            DataSource::Url => {
                for item in resolved {
                    match (item.get(&self.label_property), item.get(&self.id_property)) {
                        (Some(label), Some(id)) => list.push(label_text(label), id.clone()),
                        _ => tracing::debug!(item = %item, "url item has no label or id"),
                    }
                }
            }
        }
        list
    }

    /// Resolves the default value.
    ///
    /// A multi-select wraps a configured default into a one-element array.
    /// When `valueProperty` is a dotted path and nothing is selected yet, the
    /// value is pulled from `context`.
    pub fn default_value(&self, context: &Value, selected: Option<&Value>) -> Value {
        let mut default = if self.multiple {
            if is_truthy(&self.default_value) {
                Value::Array(vec![self.default_value.clone()])
            } else {
                Value::Array(Vec::new())
            }
        } else {
            self.default_value.clone()
        };

        let nothing_selected = selected.is_none_or(|v| !is_truthy(v));
        if let Some(property) = self.value_property.as_deref().filter(|p| p.contains('.')) {
            if nothing_selected {
                let resolved = path::lookup(context, property)
                    .or_else(|| {
                        property
                            .split_once('.')
                            .and_then(|(_, rest)| path::lookup(context, rest))
                    })
                    .cloned()
                    .unwrap_or_else(|| Value::from(""));
                if !self.multiple {
                    default = resolved;
                } else if let Value::Array(items) = &mut default {
                    items.push(resolved);
                }
            }
        }
        default
    }

    /// Label of the option matching `value`, translated.
    pub fn value_label(&self, value: &Value, options: &OptionList, locale: &Locale) -> Option<String> {
        if !is_truthy(value) {
            return None;
        }
        options
            .values
            .iter()
            .find(|option| same_typed(value, &option.value))
            .map(|option| locale.translate(&option.label))
    }

    /// Labels of every option contained in a multi-select value, translated.
    pub fn value_labels(&self, value: &Value, options: &OptionList, locale: &Locale) -> Vec<String> {
        let selected: Vec<&Value> = match value {
            Value::Array(items) => items.iter().collect(),
            Value::Null => Vec::new(),
            single => vec![single],
        };
        options
            .values
            .iter()
            .filter(|option| selected.iter().any(|v| same_typed(v, &option.value)))
            .map(|option| locale.translate(&option.label))
            .collect()
    }
}

fn parse_option(item: &Value) -> Option<SelectOption> {
    let value = item.get("value")?.clone();
    let label = item.get("label").map(label_text).unwrap_or_default();
    Some(SelectOption { label, value })
}

fn property_name(node: &SchemaNode, name: &str) -> String {
    node.properties
        .get(name)
        .and_then(Value::as_str)
        .unwrap_or(name)
        .to_string()
}

fn label_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn option_key(value: &Value) -> String {
    label_text(value)
}

/// Compares a stored value with an option value after coercing the stored
/// value into the option's type, so `"1"` matches `1`. Integer options only
/// match values that are exactly that integer: `"1.5"` does not match `1`.
fn same_typed(value: &Value, candidate: &Value) -> bool {
    let kind = match candidate {
        Value::Number(n) if n.is_i64() || n.is_u64() => {
            return match (exact_int(value), n.as_i64()) {
                (Some(a), Some(b)) => a == b,
                _ => value == candidate,
            };
        }
        Value::Number(_) => ValueKind::Float,
        Value::Bool(_) => ValueKind::Bool,
        Value::String(_) => ValueKind::String,
        _ => return value == candidate,
    };
    match infer::convert(kind, value) {
        Some(Value::Number(a)) => match candidate {
            Value::Number(b) => a.as_f64() == b.as_f64(),
            _ => false,
        },
        Some(converted) => &converted == candidate,
        None => false,
    }
}

fn exact_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Extracts the dotted key path from a label template such as
/// `<span>{{ item.name.first }}</span>`, dropping the leading `item`.
pub fn decode_resource_template(template: &str) -> Vec<String> {
    let stripped = TAG_PATTERN.replace_all(template, " ");
    let cleaned = stripped.replace("{{", "").replace("}}", "");
    cleaned
        .trim()
        .split('.')
        .skip(1)
        .map(|s| s.trim().to_string())
        .collect()
}
