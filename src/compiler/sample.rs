use crate::error::CompileError;
use crate::infer::{self, Inferred, ValueKind};
use crate::schema::{FieldType, RecordType};
use ahash::AHashMap;
use itertools::Itertools;
use serde_json::{Map, Value};

/// Infers a record type from an example document. The sample values become
/// the defaults.
pub(super) fn infer_record_type(
    name: &str,
    sample: &Value,
    fields_parser: &AHashMap<String, ValueKind>,
) -> Result<RecordType, CompileError> {
    let Value::Object(map) = sample else {
        return Err(CompileError::InvalidSchema(format!(
            "sample document must be a JSON object, found '{}'",
            sample
        )));
    };
    let mut record = object_type(name, map, fields_parser);
    if !record.contains("rec_name") {
        record.insert("rec_name", FieldType::String, Value::from(""));
    }
    Ok(record)
}

fn object_type(name: &str, map: &Map<String, Value>, fields_parser: &AHashMap<String, ValueKind>) -> RecordType {
    let mut record = RecordType::new(name);
    for (key, value) in map {
        if key == "_id" {
            continue;
        }
        let (field_type, default) = match value {
            Value::Object(_) if key == "data_value" => (FieldType::Dict, value.clone()),
            Value::Object(inner) => {
                let nested = object_type(key, inner, fields_parser);
                let default = Value::Object(nested.defaults());
                (FieldType::record(nested), default)
            }
            Value::Array(items) => list_type(key, items, fields_parser),
            scalar => scalar_type(key, scalar, fields_parser),
        };
        record.insert(key, field_type, default);
    }
    record
}

/// Rows of objects become a nested table whose columns are the union of
/// every row's keys; scalar lists keep their element kind when uniform.
fn list_type(key: &str, items: &[Value], fields_parser: &AHashMap<String, ValueKind>) -> (FieldType, Value) {
    let rows: Vec<&Map<String, Value>> = items.iter().filter_map(Value::as_object).collect();
    if !rows.is_empty() {
        let mut row_type = RecordType::new(key);
        for row in &rows {
            for def in object_type(key, row, fields_parser).fields() {
                if !row_type.contains(&def.key) {
                    row_type.insert(&def.key, def.field_type.clone(), def.field_type.default_value());
                }
            }
        }
        let default = rows
            .iter()
            .map(|row| {
                row_type
                    .coerce_row(row)
                    .map(Value::Object)
                    .unwrap_or_else(|_| Value::Object((*row).clone()))
            })
            .collect();
        return (FieldType::list_of(FieldType::record(row_type)), Value::Array(default));
    }

    let element = match items.iter().map(element_type).all_equal_value() {
        Ok(element) => element,
        Err(None) => FieldType::String,
        Err(Some(_)) => FieldType::Any,
    };
    (FieldType::list_of(element), Value::Array(items.to_vec()))
}

fn element_type(item: &Value) -> FieldType {
    match item {
        Value::String(_) => FieldType::String,
        Value::Number(n) if n.is_i64() || n.is_u64() => FieldType::Int,
        Value::Number(_) => FieldType::Float,
        Value::Bool(_) => FieldType::Bool,
        _ => FieldType::Any,
    }
}

fn scalar_type(key: &str, value: &Value, fields_parser: &AHashMap<String, ValueKind>) -> (FieldType, Value) {
    if let Some(kind) = fields_parser.get(key) {
        let field_type = kind_type(*kind);
        let converted = infer::convert(*kind, value).unwrap_or_else(|| {
            tracing::warn!(key = %key, kind = %kind, "sample value does not convert, using the default");
            field_type.default_value()
        });
        return (field_type, converted);
    }
    let inferred = infer::infer(value);
    let field_type = match &inferred {
        Inferred::Text(_) => FieldType::String,
        other => kind_type(other.kind()),
    };
    (field_type, inferred.into_value())
}

fn kind_type(kind: ValueKind) -> FieldType {
    match kind {
        ValueKind::Int => FieldType::Int,
        ValueKind::Float => FieldType::Float,
        ValueKind::String => FieldType::String,
        ValueKind::Bool => FieldType::Bool,
        ValueKind::Datetime => FieldType::Datetime,
        ValueKind::List => FieldType::list_of(FieldType::Any),
        ValueKind::Dict => FieldType::Dict,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_mixed_scalar_list_is_any() {
        let (ty, _) = list_type("tags", &[json!("a"), json!(1)], &AHashMap::new());
        assert_eq!(ty, FieldType::list_of(FieldType::Any));
    }

    #[test]
    fn test_row_union_keeps_first_seen_order() {
        let items = [json!({"a": 1}), json!({"b": "x", "a": 2})];
        let (ty, default) = list_type("rows", &items, &AHashMap::new());
        let row = ty.nested().unwrap();
        assert_eq!(row.keys().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(default, json!([{"a": 1, "b": ""}, {"a": 2, "b": "x"}]));
    }
}
