use super::SchemaCompiler;
use super::kinds::NodeKind;
use crate::error::CompileError;
use crate::field::{LabelMap, Translations};
use crate::infer::ValueKind;
use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Compile options. Every key is optional when read from JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    pub language: String,
    pub translations: Translations,
    /// Caller-resolved option lists of resource and url selects, by field key.
    pub resources: AHashMap<String, Vec<Value>>,
    /// Context object rules see during the compile.
    pub context_data: Value,
    /// Sample-inference kind overrides, by field key.
    pub fields_parser: AHashMap<String, ValueKind>,
    pub data_model: Option<String>,
    /// Custom component type -> built-in type.
    pub type_mapping: AHashMap<String, String>,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            language: "it".to_string(),
            translations: Translations::new(),
            resources: AHashMap::new(),
            context_data: Value::Object(Map::new()),
            fields_parser: AHashMap::new(),
            data_model: None,
            type_mapping: AHashMap::new(),
        }
    }
}

impl CompilerConfig {
    pub fn from_json(json: &str) -> Result<Self, CompileError> {
        serde_json::from_str(json).map_err(|e| CompileError::JsonParseError(e.to_string()))
    }
}

pub struct CompilerBuilder {
    name: String,
    config: CompilerConfig,
}

impl CompilerBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            config: CompilerConfig::default(),
        }
    }

    /// Replaces every option at once.
    pub fn with_config(mut self, config: CompilerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_language(mut self, language: &str) -> Self {
        self.config.language = language.to_string();
        self
    }

    pub fn with_translations(mut self, translations: Translations) -> Self {
        self.config.translations = translations;
        self
    }

    pub fn with_labels(mut self, language: &str, labels: LabelMap) -> Self {
        self.config.translations.insert(language.to_string(), labels);
        self
    }

    pub fn with_resource(mut self, key: &str, items: Vec<Value>) -> Self {
        self.config.resources.insert(key.to_string(), items);
        self
    }

    pub fn with_context_data(mut self, context: Value) -> Self {
        self.config.context_data = context;
        self
    }

    pub fn with_field_parser(mut self, key: &str, kind: ValueKind) -> Self {
        self.config.fields_parser.insert(key.to_string(), kind);
        self
    }

    pub fn with_data_model(mut self, data_model: &str) -> Self {
        self.config.data_model = Some(data_model.to_string());
        self
    }

    /// Compiles components of type `custom_type` as `builtin_type`.
    pub fn with_type_mapping(mut self, custom_type: &str, builtin_type: &str) -> Self {
        self.config
            .type_mapping
            .insert(custom_type.to_string(), builtin_type.to_string());
        self
    }

    pub fn build(self) -> SchemaCompiler {
        let mut type_mapping = AHashMap::new();
        for (custom, builtin) in &self.config.type_mapping {
            match NodeKind::classify(builtin) {
                NodeKind::Unknown => {
                    tracing::warn!(custom = %custom, builtin = %builtin, "ignoring mapping to an unknown type");
                }
                kind => {
                    type_mapping.insert(custom.clone(), kind);
                }
            }
        }
        SchemaCompiler {
            name: self.name,
            config: self.config,
            type_mapping,
        }
    }
}
