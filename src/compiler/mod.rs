use crate::error::{CompileError, RecordError};
use crate::field::{FieldConfig, FieldDescriptor, Locale, OptionList};
use crate::record::Record;
use crate::rules::{DependencyMap, RuleEvaluator};
use crate::schema::{FieldType, RecordType, SchemaDocument, SchemaNode};
use ahash::AHashMap;
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Value, json};
use std::sync::Arc;

mod builder;
mod kinds;
mod metadata;
mod sample;

pub use builder::{CompilerBuilder, CompilerConfig};
pub use kinds::{FieldKind, LayoutKind, NodeKind};
pub use metadata::{SchemaMetadata, TableColumn};

use metadata::push_unique;

/// Handle of one compile scope: the root or a nested grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ScopeId(pub usize);

impl ScopeId {
    pub const ROOT: ScopeId = ScopeId(0);

    pub fn is_root(&self) -> bool {
        *self == Self::ROOT
    }
}

/// Compiles form schemas into record types, descriptors and metadata.
pub struct SchemaCompiler {
    name: String,
    config: CompilerConfig,
    type_mapping: AHashMap<String, NodeKind>,
}

impl SchemaCompiler {
    pub fn builder(name: &str) -> CompilerBuilder {
        CompilerBuilder::new(name)
    }

    /// A compiler with default options.
    pub fn new(name: &str) -> Self {
        CompilerBuilder::new(name).build()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    pub fn compile_json(&self, json: &str) -> Result<CompiledSchema, CompileError> {
        self.compile(&SchemaDocument::from_json(json)?)
    }

    /// Compiles a schema document.
    ///
    /// Only a missing or malformed document fails; broken fields are skipped
    /// and reported in [`CompiledSchema::diagnostics`].
    pub fn compile(&self, document: &SchemaDocument) -> Result<CompiledSchema, CompileError> {
        let data_model = self
            .config
            .data_model
            .clone()
            .or_else(|| document.data_model.clone())
            .unwrap_or_default();

        let mut session = Session {
            config: &self.config,
            type_mapping: &self.type_mapping,
            locale: Locale::new(&self.config.language, &self.config.translations),
            dependencies: DependencyMap::default(),
            input_keys: Vec::new(),
            filter_keys: Vec::new(),
            components_logic: Vec::new(),
            ext_data_src: Vec::new(),
            diagnostics: Vec::new(),
            next_scope: 1,
        };
        let mut root = ScopeCompiler::new(&mut session, ScopeId::ROOT, &self.name, None);
        root.metadata.data_model = data_model.clone();
        let mut root = root.make(&document.components, Some(&data_model));
        root.metadata.ext_data_src = session.ext_data_src.clone();

        tracing::debug!(
            name = %self.name,
            fields = root.record_type.len(),
            skipped = session.diagnostics.len(),
            "compiled schema"
        );

        Ok(CompiledSchema {
            name: self.name.clone(),
            record_type: Arc::new(root.record_type.clone()),
            root,
            dependencies: session.dependencies,
            input_keys: session.input_keys,
            filter_keys: session.filter_keys,
            components_logic: session.components_logic,
            diagnostics: session.diagnostics,
            resources: self.config.resources.clone(),
        })
    }

    /// Infers a record type from an example document.
    pub fn infer_from_sample(&self, sample: &Value) -> Result<RecordType, CompileError> {
        sample::infer_record_type(&self.name, sample, &self.config.fields_parser)
    }
}

/// State shared by every scope of one compile.
struct Session<'c> {
    config: &'c CompilerConfig,
    type_mapping: &'c AHashMap<String, NodeKind>,
    locale: Locale,
    dependencies: DependencyMap,
    input_keys: Vec<String>,
    filter_keys: Vec<String>,
    components_logic: Vec<String>,
    ext_data_src: Vec<String>,
    diagnostics: Vec<CompileError>,
    next_scope: usize,
}

impl Session<'_> {
    fn open_scope(&mut self) -> ScopeId {
        let id = ScopeId(self.next_scope);
        self.next_scope += 1;
        id
    }

    fn classify(&self, kind: &str) -> NodeKind {
        self.type_mapping
            .get(kind)
            .copied()
            .unwrap_or_else(|| NodeKind::classify(kind))
    }
}

/// The output of one scope: its table, registries and descriptors.
#[derive(Debug, Clone, Serialize)]
pub struct CompiledScope {
    pub scope: ScopeId,
    pub record_type: RecordType,
    pub metadata: SchemaMetadata,
    #[serde(skip)]
    pub descriptors: Vec<FieldDescriptor>,
    /// Scopes of nesting fields, by field key.
    pub nested: IndexMap<String, CompiledScope>,
}

struct ScopeCompiler<'s, 'c> {
    session: &'s mut Session<'c>,
    scope: ScopeId,
    parent_key: Option<String>,
    record: RecordType,
    metadata: SchemaMetadata,
    descriptors: Vec<FieldDescriptor>,
    nested: IndexMap<String, CompiledScope>,
}

impl<'s, 'c> ScopeCompiler<'s, 'c> {
    fn new(session: &'s mut Session<'c>, scope: ScopeId, name: &str, parent_key: Option<&str>) -> Self {
        Self {
            session,
            scope,
            parent_key: parent_key.map(str::to_string),
            record: RecordType::new(name),
            metadata: SchemaMetadata::default(),
            descriptors: Vec::new(),
            nested: IndexMap::new(),
        }
    }

    /// Compiles `components` and finalizes the scope.
    fn make(mut self, components: &[Value], data_model: Option<&str>) -> CompiledScope {
        for component in components {
            self.scan(component);
        }

        if !self.record.contains("rec_name") {
            let rec_name = json!({
                "type": "textfield",
                "key": "rec_name",
                "label": "Name",
                "hidden": true,
                "defaultValue": ""
            });
            self.add_component(FieldKind::Textfield, &rec_name);
        }
        if let Some(data_model) = data_model.filter(|d| !d.is_empty()) {
            if !self.record.contains("data_model") {
                let node = json!({
                    "type": "textfield",
                    "key": "data_model",
                    "label": "Data Model",
                    "hidden": true,
                    "defaultValue": data_model
                });
                self.add_component(FieldKind::Textfield, &node);
            }
        }

        self.record.no_clone_field_keys = self.metadata.no_clone_field_keys.clone();
        CompiledScope {
            scope: self.scope,
            record_type: self.record,
            metadata: self.metadata,
            descriptors: self.descriptors,
            nested: self.nested,
        }
    }

    fn scan(&mut self, raw: &Value) {
        let kind = raw.get("type").and_then(Value::as_str).unwrap_or_default();
        if kind.is_empty() {
            return;
        }
        match self.session.classify(kind) {
            NodeKind::Layout(layout) => self.eval_layout(layout, raw),
            NodeKind::Field(field_kind) => self.add_component(field_kind, raw),
            NodeKind::Inert => {}
            NodeKind::Unknown => {
                let key = raw.get("key").and_then(Value::as_str).unwrap_or_default();
                self.report(CompileError::UnknownFieldType {
                    key: key.to_string(),
                    kind: kind.to_string(),
                });
            }
        }
    }

    fn eval_layout(&mut self, layout: LayoutKind, raw: &Value) {
        let node = match SchemaNode::from_value(raw) {
            Ok(node) => node,
            Err(error) => return self.report(error),
        };
        if layout == LayoutKind::Fieldset && node.property_flag("action_type") {
            push_unique(&mut self.metadata.create_task_action, &node.key);
        }
        for child in layout.children(&node) {
            self.scan(child);
        }
    }

    /// Per-field boundary: any error skips the field and becomes a diagnostic.
    fn add_component(&mut self, kind: FieldKind, raw: &Value) {
        let result = if kind.is_nesting() {
            self.add_nested(raw)
        } else {
            self.add_field(kind, raw)
        };
        if let Err(error) = result {
            self.report(error);
        }
    }

    fn report(&mut self, error: CompileError) {
        tracing::error!(scope = self.scope.0, error = %error, "skipping component");
        self.session.diagnostics.push(error);
    }

    fn descriptor(&self, node: SchemaNode, input_type: Option<FieldType>) -> Result<FieldDescriptor, CompileError> {
        if node.key.is_empty() {
            return Err(CompileError::MalformedField {
                key: String::new(),
                kind: node.kind.clone(),
                message: "component has no key".to_string(),
            });
        }
        let mut field = FieldDescriptor::new(node, input_type, self.session.locale.clone(), self.scope)?;
        field.update_config()?;
        field.set_parent(self.parent_key.as_deref());
        Ok(field)
    }

    fn add_field(&mut self, kind: FieldKind, raw: &Value) -> Result<(), CompileError> {
        let node = SchemaNode::from_value(raw)?;
        let (field_type, default) = kind.field_type(&node);
        let field = self.descriptor(node, Some(kind.input_type(&field_type)))?;
        let key = field.key().to_string();
        let cfg = &field.cfg;
        let metadata = &mut self.metadata;

        if cfg.required {
            push_unique(&mut metadata.required_fields, &key);
        }
        if cfg.unique {
            push_unique(&mut metadata.unique_fields, &key);
            push_unique(&mut metadata.no_clone_field_keys, &key);
        }
        if let Some(calculate) = &cfg.calculate_server {
            metadata.computed_fields.insert(key.clone(), calculate.clone());
        }
        if cfg.no_clone() {
            push_unique(&mut metadata.no_clone_field_keys, &key);
        }
        if let Some(transform) = &cfg.transform {
            metadata.transform_data_value.insert(key.clone(), transform.clone());
        }
        if let Some(limits) = cfg.limit_values() {
            metadata.fields_limit_value.insert(key.clone(), limits);
        }
        if field.select().is_some_and(|spec| spec.data_src.is_external()) {
            push_unique(&mut self.session.ext_data_src, &key);
        }

        if self.record.contains(&key) {
            tracing::warn!(key = %key, "duplicate component key replaces the earlier entry");
        }
        self.record.insert(&key, field_type, default);
        self.complete_component(field);
        Ok(())
    }

    /// Compiles a datagrid, table or form into its own scope.
    fn add_nested(&mut self, raw: &Value) -> Result<(), CompileError> {
        let node = SchemaNode::from_value(raw)?;
        let components = node.components.clone();
        let mut field = self.descriptor(node, None)?;
        let key = field.key().to_string();

        let child_scope = self.session.open_scope();
        let nested = ScopeCompiler::new(&mut *self.session, child_scope, &key, Some(&key)).make(&components, None);

        field.children = nested.descriptors.clone();
        self.record.insert(
            &key,
            FieldType::list_of(FieldType::record(nested.record_type.clone())),
            Value::Array(Vec::new()),
        );
        self.nested.insert(key, nested);
        self.complete_component(field);
        Ok(())
    }

    /// Registers a built descriptor and runs its rules once.
    fn complete_component(&mut self, mut field: FieldDescriptor) {
        let key = field.key().to_string();
        let metadata = &mut self.metadata;

        if field.is_input() {
            metadata.fields.push(field.node.to_value());
        }
        if field.table_view() && !field.is_survey() && !field.is_multi_row() {
            metadata.table_columns.push(TableColumn {
                key: key.clone(),
                label: field.label(),
            });
        }
        if field.kind() == "table" {
            metadata.computed_fields.insert(
                key.clone(),
                field.cfg.calculate_server.clone().unwrap_or(Value::Bool(false)),
            );
        }
        if !field.properties().is_empty() {
            metadata.fields_properties.insert(key.clone(), field.properties().clone());
        }
        if field.cfg.hidden {
            metadata.default_hidden_fields.push(key.clone());
        }
        if field.cfg.readonly {
            metadata.default_readonly_fields.push(key.clone());
        }
        if field.cfg.required {
            metadata.default_required_fields.push(key.clone());
        }
        if let Some(condition) = field.node.conditional_json() {
            metadata.conditional.insert(key.clone(), condition.clone());
        }
        if field.has_logic() {
            metadata.logic.insert(key.clone(), field.node.logic.clone());
        }
        metadata.config_fields.insert(key.clone(), field.cfg.clone());

        let session = &mut *self.session;
        if field.is_input() {
            session.input_keys.push(key.clone());
        }
        push_unique(&mut session.filter_keys, &key);
        if field.has_logic() || field.has_conditions() {
            session.components_logic.push(key.clone());
        }
        if field.kind() != "table" {
            RuleEvaluator::new(&session.config.context_data).evaluate_field(&mut field, &mut session.dependencies);
        }
        self.descriptors.push(field);
    }
}

/// The result of a compile.
#[derive(Debug, Clone, Serialize)]
pub struct CompiledSchema {
    pub name: String,
    #[serde(skip)]
    record_type: Arc<RecordType>,
    pub root: CompiledScope,
    pub dependencies: DependencyMap,
    pub input_keys: Vec<String>,
    pub filter_keys: Vec<String>,
    pub components_logic: Vec<String>,
    /// Components skipped because they could not be compiled.
    pub diagnostics: Vec<CompileError>,
    #[serde(skip)]
    resources: AHashMap<String, Vec<Value>>,
}

impl CompiledSchema {
    pub fn record_type(&self) -> &RecordType {
        &self.record_type
    }

    pub fn shared_record_type(&self) -> Arc<RecordType> {
        Arc::clone(&self.record_type)
    }

    pub fn metadata(&self) -> &SchemaMetadata {
        &self.root.metadata
    }

    pub fn descriptors(&self) -> &[FieldDescriptor] {
        &self.root.descriptors
    }

    /// The compiled scope of a nesting field, searched at any depth.
    pub fn nested_scope(&self, key: &str) -> Option<&CompiledScope> {
        fn find<'a>(scope: &'a CompiledScope, key: &str) -> Option<&'a CompiledScope> {
            scope
                .nested
                .get(key)
                .or_else(|| scope.nested.values().find_map(|child| find(child, key)))
        }
        find(&self.root, key)
    }

    /// Finds a descriptor by key, nested descriptors included.
    pub fn descriptor(&self, key: &str) -> Option<&FieldDescriptor> {
        fn find<'a>(fields: &'a [FieldDescriptor], key: &str) -> Option<&'a FieldDescriptor> {
            fields
                .iter()
                .find(|f| f.key() == key)
                .or_else(|| fields.iter().find_map(|f| find(&f.children, key)))
        }
        find(&self.root.descriptors, key)
    }

    pub fn dependents_of(&self, key: &str) -> &[String] {
        self.dependencies.dependents_of(key)
    }

    /// Re-evaluates one field's rules against `context`, starting from its
    /// rule-free configuration.
    pub fn evaluate_field(&self, key: &str, context: &Value) -> Option<FieldDescriptor> {
        let mut field = self.descriptor(key)?.clone();
        field.reset();
        if field.kind() != "table" {
            let mut scratch = DependencyMap::default();
            RuleEvaluator::new(context).evaluate_field(&mut field, &mut scratch);
        }
        Some(field)
    }

    /// Re-evaluates every field that carries rules.
    pub fn evaluate_rules(&self, context: &Value) -> IndexMap<String, FieldConfig> {
        self.components_logic
            .iter()
            .filter_map(|key| Some((key.clone(), self.evaluate_field(key, context)?.cfg)))
            .collect()
    }

    /// Re-evaluates the fields whose rules read `changed_key`.
    pub fn evaluate_dependents(&self, changed_key: &str, context: &Value) -> IndexMap<String, FieldConfig> {
        self.dependents_of(changed_key)
            .iter()
            .filter_map(|key| Some((key.clone(), self.evaluate_field(key, context)?.cfg)))
            .collect()
    }

    /// The option list of a select field, using the resources given at
    /// compile time for external sources.
    pub fn options(&self, key: &str) -> Option<OptionList> {
        let spec = self.descriptor(key)?.select()?;
        let resolved = self.resources.get(key).map(Vec::as_slice).unwrap_or_default();
        Some(spec.options(resolved))
    }

    /// Instantiates a record of the root type.
    pub fn new_record(&self, payload: &Value) -> Result<Record, RecordError> {
        Record::new(self.shared_record_type(), payload)
    }
}
