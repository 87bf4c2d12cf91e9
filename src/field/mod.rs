use crate::compiler::ScopeId;
use crate::error::CompileError;
use crate::record::Record;
use crate::schema::{FieldType, SchemaNode, is_truthy};
use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

mod select;
mod survey;

pub use select::*;
pub use survey::*;

/// `msgid -> translated text` for one language.
pub type LabelMap = AHashMap<String, String>;

/// `language -> LabelMap`.
pub type Translations = AHashMap<String, LabelMap>;

/// The active language and its resolved label map.
#[derive(Debug, Clone, Default)]
pub struct Locale {
    pub language: String,
    labels: Option<Arc<LabelMap>>,
}

impl Locale {
    pub fn new(language: &str, translations: &Translations) -> Self {
        Self {
            language: language.to_string(),
            labels: translations
                .get(language)
                .filter(|labels| !labels.is_empty())
                .map(|labels| Arc::new(labels.clone())),
        }
    }

    pub fn has_labels(&self) -> bool {
        self.labels.is_some()
    }

    /// Translates `text`, falling back to the text itself.
    pub fn translate(&self, text: &str) -> String {
        self.labels
            .as_ref()
            .and_then(|labels| labels.get(text))
            .filter(|t| !t.is_empty())
            .cloned()
            .unwrap_or_else(|| text.to_string())
    }
}

/// Display transform applied by the persistence layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Transform {
    Date,
    Datetime,
    Float { dp: Value, mask: Value, dps: Value },
}

/// Lower and upper bounds of a field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LimitValues {
    pub min: Value,
    pub max: Value,
}

/// The derived configuration of one field.
///
/// Computed by [`FieldDescriptor::update_config`] and mutated in place by
/// logic actions. Keys without a dedicated slot land in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldConfig {
    pub ctype: String,
    pub disabled: bool,
    pub readonly: bool,
    pub hidden: bool,
    pub required: bool,
    pub unique: bool,
    pub calculate_server: Option<Value>,
    pub action_type: Option<Value>,
    pub no_clone: bool,
    pub transform: Option<Transform>,
    pub date: bool,
    pub time: bool,
    pub datetime: bool,
    pub min: Option<Value>,
    pub max: Option<Value>,
    pub mask: Option<Value>,
    pub delimiter: Option<Value>,
    pub decimal_places: Option<Value>,
    pub value: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FieldConfig {
    /// Assigns a config key by name, as logic actions do.
    pub fn set(&mut self, key: &str, value: Value) {
        match key {
            "disabled" => self.disabled = is_truthy(&value),
            "readonly" | "readOnly" => self.readonly = is_truthy(&value),
            "hidden" => self.hidden = is_truthy(&value),
            "required" => self.required = is_truthy(&value),
            "unique" => self.unique = is_truthy(&value),
            "no_clone" => self.no_clone = is_truthy(&value),
            "calculateServer" => self.calculate_server = non_empty(Some(value)),
            "action_type" => self.action_type = non_empty(Some(value)),
            "min" => self.min = non_empty(Some(value)),
            "max" => self.max = non_empty(Some(value)),
            "value" => self.value = Some(value),
            _ => {
                self.extra.insert(key.to_string(), value);
            }
        }
    }

    /// Reads a config key by name.
    pub fn get(&self, key: &str) -> Option<Value> {
        match key {
            "ctype" => Some(Value::String(self.ctype.clone())),
            "disabled" => Some(Value::Bool(self.disabled)),
            "readonly" | "readOnly" => Some(Value::Bool(self.readonly)),
            "hidden" => Some(Value::Bool(self.hidden)),
            "required" => Some(Value::Bool(self.required)),
            "unique" => Some(Value::Bool(self.unique)),
            "no_clone" => Some(Value::Bool(self.no_clone())),
            "calculateServer" => self.calculate_server.clone(),
            "action_type" => self.action_type.clone(),
            "min" => self.min.clone(),
            "max" => self.max.clone(),
            "value" => self.value.clone(),
            _ => self.extra.get(key).cloned(),
        }
    }

    /// Computed fields can never be cloned.
    pub fn no_clone(&self) -> bool {
        self.no_clone || self.calculate_server.is_some()
    }

    pub fn limit_values(&self) -> Option<LimitValues> {
        if self.min.is_none() && self.max.is_none() {
            return None;
        }
        Some(LimitValues {
            min: self.min.clone().unwrap_or(Value::Null),
            max: self.max.clone().unwrap_or(Value::Null),
        })
    }
}

fn non_empty(value: Option<Value>) -> Option<Value> {
    value.filter(is_truthy)
}

/// Kind-specific data carried by a descriptor.
#[derive(Debug, Clone)]
pub enum FieldVariant {
    Plain,
    Select(SelectSpec),
    Survey(SurveySpec),
}

/// The compiled wrapper around one schema node.
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    pub node: SchemaNode,
    pub cfg: FieldConfig,
    /// Declared input type; `None` for nesting fields.
    pub input_type: Option<FieldType>,
    pub variant: FieldVariant,
    /// Compile scope that owns this descriptor.
    pub scope: ScopeId,
    /// Key of the owning grid, for fields compiled inside a nested scope.
    pub parent: Option<String>,
    pub row_index: usize,
    pub children: Vec<FieldDescriptor>,
    locale: Locale,
    /// Config and properties as derived from the node, before any rule ran.
    baseline: Option<(FieldConfig, Map<String, Value>)>,
}

impl FieldDescriptor {
    /// Wraps a node. The node is owned, so the schema is never aliased.
    pub fn new(
        node: SchemaNode,
        input_type: Option<FieldType>,
        locale: Locale,
        scope: ScopeId,
    ) -> Result<Self, CompileError> {
        let variant = match node.kind.as_str() {
            "select" => FieldVariant::Select(SelectSpec::from_node(&node)?),
            "survey" => FieldVariant::Survey(SurveySpec::from_node(&node)),
            _ => FieldVariant::Plain,
        };
        Ok(Self {
            node,
            cfg: FieldConfig::default(),
            input_type,
            variant,
            scope,
            parent: None,
            row_index: 0,
            children: Vec::new(),
            locale,
            baseline: None,
        })
    }

    pub fn key(&self) -> &str {
        &self.node.key
    }

    pub fn kind(&self) -> &str {
        &self.node.kind
    }

    pub fn is_input(&self) -> bool {
        self.node.input
    }

    pub fn table_view(&self) -> bool {
        self.node.table_view
    }

    pub fn locale(&self) -> &Locale {
        &self.locale
    }

    /// The label, translated when a map exists for the active language.
    pub fn label(&self) -> String {
        self.locale.translate(self.node.raw_label())
    }

    pub fn properties(&self) -> &Map<String, Value> {
        &self.node.properties
    }

    pub fn has_logic(&self) -> bool {
        !self.node.logic.is_empty()
    }

    pub fn has_conditions(&self) -> bool {
        self.node.conditional_json().is_some()
    }

    pub fn trigger_change(&self) -> bool {
        self.node.property_flag("trigger_change")
    }

    pub fn is_survey(&self) -> bool {
        matches!(self.variant, FieldVariant::Survey(_))
    }

    pub fn is_multi_row(&self) -> bool {
        !self.children.is_empty()
    }

    pub fn select(&self) -> Option<&SelectSpec> {
        match &self.variant {
            FieldVariant::Select(spec) => Some(spec),
            _ => None,
        }
    }

    pub fn survey(&self) -> Option<&SurveySpec> {
        match &self.variant {
            FieldVariant::Survey(spec) => Some(spec),
            _ => None,
        }
    }

    pub fn set_parent(&mut self, parent: Option<&str>) {
        if let Some(parent) = parent.filter(|p| !p.is_empty()) {
            self.parent = Some(parent.to_string());
        }
    }

    /// Points the descriptor, and its children, at one row of its grid.
    pub fn at_row(&mut self, index: usize) {
        self.row_index = index;
        for child in &mut self.children {
            child.at_row(index);
        }
    }

    /// Dotted path of this field inside the owning record.
    pub fn value_path(&self) -> String {
        match &self.parent {
            Some(parent) => format!("{}.{}.{}", parent, self.row_index, self.node.key),
            None => self.node.key.clone(),
        }
    }

    /// Reads the field's current value from `record`.
    pub fn value(&self, record: &Record) -> Option<Value> {
        record.lookup(&self.value_path()).cloned()
    }

    /// Derives the field configuration from the node.
    ///
    /// The properties block overrides the validate block. A datetime node
    /// must carry `widget.minDate` and `widget.maxDate`.
    pub fn update_config(&mut self) -> Result<(), CompileError> {
        let node = &self.node;
        let mut cfg = FieldConfig {
            ctype: node.kind.clone(),
            disabled: node.disabled,
            readonly: node.read_only_value || node.property_flag("readonly"),
            hidden: node.hidden,
            required: node.validate.get("required").is_some_and(is_truthy)
                || node.property_flag("required"),
            unique: node.validate.get("unique").is_some_and(is_truthy),
            calculate_server: non_empty(node.calculate_value.clone())
                .or_else(|| non_empty(node.properties.get("calculateServer").cloned())),
            action_type: non_empty(node.properties.get("action_type").cloned()),
            ..Default::default()
        };
        cfg.no_clone = node.property_flag("no_clone") || cfg.calculate_server.is_some();

        if node.kind == "datetime" {
            cfg.time = node.enable_time.as_ref().is_some_and(is_truthy);
            cfg.date = node.enable_date.as_ref().is_some_and(is_truthy);
            // A missing enableDate flag means the date part is shown.
            if !cfg.time && !cfg.date && node.enable_date.is_none() {
                cfg.date = true;
            }
            if cfg.date {
                cfg.transform = Some(Transform::Date);
            }
            if cfg.date && cfg.time {
                cfg.datetime = true;
                cfg.transform = Some(Transform::Datetime);
            }
            let widget = node
                .widget
                .as_ref()
                .and_then(Value::as_object)
                .ok_or_else(|| self.malformed("datetime field has no widget block"))?;
            let bound = |name: &str| {
                widget
                    .get(name)
                    .cloned()
                    .ok_or_else(|| self.malformed(&format!("widget has no '{}'", name)))
            };
            cfg.min = Some(bound("minDate")?).filter(|v| !v.is_null());
            cfg.max = Some(bound("maxDate")?).filter(|v| !v.is_null());
        }

        if node.require_decimal {
            let mask = node
                .display_mask
                .clone()
                .unwrap_or_else(|| Value::from("decimal"));
            let delimiter = node.delimiter.clone().unwrap_or_else(|| Value::from(","));
            let dp = node.decimal_limit.clone().unwrap_or_else(|| Value::from(2));
            cfg.min = node.validate.get("min").cloned().filter(|v| !v.is_null());
            cfg.max = node.validate.get("max").cloned().filter(|v| !v.is_null());
            cfg.transform = Some(Transform::Float {
                dp: dp.clone(),
                mask: mask.clone(),
                dps: delimiter.clone(),
            });
            cfg.mask = Some(mask);
            cfg.delimiter = Some(delimiter);
            cfg.decimal_places = Some(dp);
        }

        self.baseline = Some((cfg.clone(), node.properties.clone()));
        self.cfg = cfg;
        Ok(())
    }

    /// Drops everything rules changed since [`update_config`](Self::update_config).
    pub fn reset(&mut self) {
        if let Some((cfg, properties)) = &self.baseline {
            self.cfg = cfg.clone();
            self.node.properties = properties.clone();
        }
    }

    fn malformed(&self, message: &str) -> CompileError {
        CompileError::MalformedField {
            key: self.node.key.clone(),
            kind: self.node.kind.clone(),
            message: message.to_string(),
        }
    }

    /// Label of the selected option, for select fields.
    pub fn value_label(&self, record: &Record, options: &OptionList) -> Option<String> {
        let spec = self.select()?;
        let value = self.value(record)?;
        spec.value_label(&value, options, &self.locale)
    }

    /// Labels of all selected options, for multi-select fields.
    pub fn value_labels(&self, record: &Record, options: &OptionList) -> Vec<String> {
        match (self.select(), self.value(record)) {
            (Some(spec), Some(value)) => spec.value_labels(&value, options, &self.locale),
            _ => Vec::new(),
        }
    }

    /// The question × answer grid, for survey fields.
    pub fn survey_grid(&self, record: &Record) -> Vec<SurveyQuestion> {
        match self.survey() {
            Some(spec) => {
                let answers = self.value(record).unwrap_or(Value::Null);
                spec.grid(&answers, &self.locale)
            }
            None => Vec::new(),
        }
    }
}
