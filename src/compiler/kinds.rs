use crate::schema::{FieldType, SchemaNode, is_truthy};
use serde_json::{Map, Value};

/// Containers whose children are compiled into the enclosing scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayoutKind {
    Columns,
    Column,
    Panel,
    Tabs,
    Well,
    Fieldset,
}

impl LayoutKind {
    /// Child component lists, in document order.
    pub fn children<'a>(&self, node: &'a SchemaNode) -> Vec<&'a Value> {
        match self {
            LayoutKind::Columns => node
                .columns
                .iter()
                .flat_map(child_components)
                .collect(),
            LayoutKind::Tabs => node
                .components
                .iter()
                .flat_map(child_components)
                .collect(),
            _ => node.components.iter().collect(),
        }
    }
}

fn child_components(container: &Value) -> impl Iterator<Item = &Value> {
    container
        .get("components")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
}

/// Every component kind that becomes a record field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    Textfield,
    Password,
    Number,
    Select,
    Textarea,
    Datetime,
    Day,
    Checkbox,
    Radio,
    Survey,
    Content,
    Email,
    File,
    Datagrid,
    Table,
    Form,
}

impl FieldKind {
    /// Kinds that spawn a nested compile of their own component list.
    pub fn is_nesting(&self) -> bool {
        matches!(self, FieldKind::Datagrid | FieldKind::Table | FieldKind::Form)
    }

    /// The `(type, default)` pair for a leaf field, before `defaultValue`.
    pub fn field_type(&self, node: &SchemaNode) -> (FieldType, Value) {
        let (field_type, default) = match self {
            FieldKind::Number if node.require_decimal => (FieldType::Float, Value::from(0.0)),
            FieldKind::Number => (FieldType::Int, Value::from(0)),
            FieldKind::Select if node.multiple => {
                (FieldType::list_of(FieldType::Any), Value::Array(Vec::new()))
            }
            FieldKind::Textarea if node.property_type() == Some("json") => {
                (FieldType::Dict, Value::Object(Map::new()))
            }
            FieldKind::Checkbox => (FieldType::Bool, Value::Bool(false)),
            FieldKind::Survey => (FieldType::Dict, Value::Object(Map::new())),
            FieldKind::Datetime | FieldKind::Day => {
                (FieldType::Datetime, FieldType::Datetime.default_value())
            }
            FieldKind::File => (FieldType::list_of(FieldType::Dict), Value::Array(Vec::new())),
            _ => (FieldType::String, Value::from("")),
        };
        match &node.default_value {
            Some(value) if is_truthy(value) => {
                let coerced = field_type.coerce(&node.key, value).unwrap_or_else(|error| {
                    tracing::debug!(key = %node.key, error = %error, "keeping uncoerced default");
                    value.clone()
                });
                (field_type, coerced)
            }
            _ => (field_type, default),
        }
    }

    /// The type logic actions coerce a `value` target through.
    pub fn input_type(&self, field_type: &FieldType) -> FieldType {
        match self {
            FieldKind::Datetime | FieldKind::Day => FieldType::String,
            _ => field_type.clone(),
        }
    }
}

/// How the compiler treats one component `type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Layout(LayoutKind),
    Field(FieldKind),
    /// Buttons and static markup: skipped silently.
    Inert,
    Unknown,
}

impl NodeKind {
    pub fn classify(kind: &str) -> Self {
        match kind {
            "columns" => NodeKind::Layout(LayoutKind::Columns),
            "column" => NodeKind::Layout(LayoutKind::Column),
            "panel" => NodeKind::Layout(LayoutKind::Panel),
            "tabs" => NodeKind::Layout(LayoutKind::Tabs),
            "well" => NodeKind::Layout(LayoutKind::Well),
            "fieldset" => NodeKind::Layout(LayoutKind::Fieldset),
            "textfield" => NodeKind::Field(FieldKind::Textfield),
            "password" => NodeKind::Field(FieldKind::Password),
            "number" => NodeKind::Field(FieldKind::Number),
            "select" => NodeKind::Field(FieldKind::Select),
            "textarea" => NodeKind::Field(FieldKind::Textarea),
            "datetime" => NodeKind::Field(FieldKind::Datetime),
            "day" => NodeKind::Field(FieldKind::Day),
            "checkbox" => NodeKind::Field(FieldKind::Checkbox),
            "radio" => NodeKind::Field(FieldKind::Radio),
            "survey" => NodeKind::Field(FieldKind::Survey),
            "content" => NodeKind::Field(FieldKind::Content),
            "email" => NodeKind::Field(FieldKind::Email),
            "file" => NodeKind::Field(FieldKind::File),
            "datagrid" => NodeKind::Field(FieldKind::Datagrid),
            "table" => NodeKind::Field(FieldKind::Table),
            "form" => NodeKind::Field(FieldKind::Form),
            "button" | "htmlelement" | "resource" => NodeKind::Inert,
            _ => NodeKind::Unknown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn node(value: Value) -> SchemaNode {
        SchemaNode::from_value(&value).unwrap()
    }

    #[test]
    fn test_decimal_number_maps_to_float() {
        let n = node(json!({"type": "number", "key": "price", "requireDecimal": true}));
        assert_eq!(FieldKind::Number.field_type(&n), (FieldType::Float, json!(0.0)));
    }

    #[test]
    fn test_truthy_default_is_coerced() {
        let n = node(json!({"type": "number", "key": "qty", "defaultValue": "3"}));
        assert_eq!(FieldKind::Number.field_type(&n), (FieldType::Int, json!(3)));
    }

    #[test]
    fn test_classify_inert_and_unknown() {
        assert_eq!(NodeKind::classify("button"), NodeKind::Inert);
        assert_eq!(NodeKind::classify("signature"), NodeKind::Unknown);
    }
}
