use super::DependencyMap;
use serde_json::Value;

const FORM_PREFIX: &str = "form.";
const DATA_VALUE_PREFIX: &str = "form.data_value.";

/// The field key a `form.` path refers to.
///
/// `form.data_value.x` refers to `x`; any other `form.x...` refers to `x`.
pub fn referenced_field(path: &str) -> Option<&str> {
    let rest = path
        .strip_prefix(DATA_VALUE_PREFIX)
        .or_else(|| path.strip_prefix(FORM_PREFIX))?;
    rest.split('.').next().filter(|key| !key.is_empty())
}

/// Walks an expression tree and records `referenced -> field_key` for every
/// `var` leaf naming a `form.` path.
pub fn collect_dependencies(expr: &Value, field_key: &str, deps: &mut DependencyMap) {
    match expr {
        Value::Object(map) => {
            for (key, value) in map {
                if key == "var" {
                    if let Some(source) = var_path(value).and_then(referenced_field) {
                        deps.record(source, field_key);
                        continue;
                    }
                }
                collect_dependencies(value, field_key, deps);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_dependencies(item, field_key, deps);
            }
        }
        _ => {}
    }
}

/// `{"var": "a.b"}` and `{"var": ["a.b", default]}` both name `a.b`.
fn var_path(value: &Value) -> Option<&str> {
    match value {
        Value::String(path) => Some(path),
        Value::Array(items) => items.first().and_then(Value::as_str),
        _ => None,
    }
}
