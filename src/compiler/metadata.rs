use crate::field::{FieldConfig, LimitValues, Transform};
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Map, Value};

/// A column shown in list views.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableColumn {
    pub key: String,
    pub label: String,
}

/// Per-scope registries collected while compiling.
///
/// Maps keep document order so dumps are reproducible.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchemaMetadata {
    pub unique_fields: Vec<String>,
    pub required_fields: Vec<String>,
    pub no_clone_field_keys: Vec<String>,
    pub computed_fields: IndexMap<String, Value>,
    pub default_hidden_fields: Vec<String>,
    pub default_readonly_fields: Vec<String>,
    pub default_required_fields: Vec<String>,
    pub fields_properties: IndexMap<String, Map<String, Value>>,
    pub conditional: IndexMap<String, Value>,
    pub logic: IndexMap<String, Vec<Value>>,
    pub transform_data_value: IndexMap<String, Transform>,
    pub fields_limit_value: IndexMap<String, LimitValues>,
    pub ext_data_src: Vec<String>,
    pub table_columns: Vec<TableColumn>,
    pub create_task_action: Vec<String>,
    pub config_fields: IndexMap<String, FieldConfig>,
    /// Raw nodes of every input field, in document order.
    pub fields: Vec<Value>,
    pub data_model: String,
}

impl Default for SchemaMetadata {
    fn default() -> Self {
        let identity = vec!["rec_name".to_string()];
        Self {
            unique_fields: identity.clone(),
            required_fields: identity.clone(),
            no_clone_field_keys: identity,
            computed_fields: IndexMap::new(),
            default_hidden_fields: Vec::new(),
            default_readonly_fields: Vec::new(),
            default_required_fields: Vec::new(),
            fields_properties: IndexMap::new(),
            conditional: IndexMap::new(),
            logic: IndexMap::new(),
            transform_data_value: IndexMap::new(),
            fields_limit_value: IndexMap::new(),
            ext_data_src: Vec::new(),
            table_columns: Vec::new(),
            create_task_action: Vec::new(),
            config_fields: IndexMap::new(),
            fields: Vec::new(),
            data_model: String::new(),
        }
    }
}

/// Appends `key` unless it is already listed.
pub(super) fn push_unique(list: &mut Vec<String>, key: &str) {
    if !list.iter().any(|k| k == key) {
        list.push(key.to_string());
    }
}
