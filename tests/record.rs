//! Tests for the dynamic record facade.
mod common;
use common::*;
use formweave::prelude::*;
use serde_json::{Map, Value, json};

fn order_record(payload: Value) -> Record {
    compile("order", &order_schema())
        .new_record(&payload)
        .expect("record builds")
}

#[test]
fn test_payload_is_coerced_to_declared_types() {
    let record = order_record(json!({
        "rec_name": "O-1",
        "price": "12.5",
        "quantity": "3",
        "lines": [{"product": "A", "amount": "2"}],
        "unknown": 1
    }));

    assert_eq!(record.get("price", Value::Null), json!(12.5));
    assert_eq!(record.get("quantity", Value::Null), json!(3));
    assert_eq!(record.get("lines.0.amount", Value::Null), json!(2));
    assert_eq!(record.get("lines.0.rec_name", Value::Null), json!(""));
    assert_eq!(record.get("paid", Value::Null), json!(false));
    assert!(record.lookup("unknown").is_none());
    assert!(record.data_value().is_empty());
}

#[test]
fn test_invalid_payloads() {
    let compiled = compile("order", &order_schema());

    assert!(matches!(
        compiled.new_record(&json!({"quantity": "many"})),
        Err(RecordError::InvalidValue { key, .. }) if key == "quantity"
    ));
    assert!(matches!(
        compiled.new_record(&json!([1, 2])),
        Err(RecordError::NotAnObject(_))
    ));
    assert!(compiled.new_record(&Value::Null).is_ok());
}

#[test]
fn test_get_falls_back_to_default() {
    let record = order_record(json!({"lines": [{"product": "A"}]}));

    assert_eq!(record.get("lines.0.product", json!("none")), json!("A"));
    assert_eq!(record.get("lines.5.product", json!("none")), json!("none"));
    assert_eq!(record.get("price.deep", json!(-1)), json!(-1));
    assert_eq!(record.get("nothing", json!("none")), json!("none"));
}

#[test]
fn test_set_with_and_without_inference() {
    let mut record = order_record(json!({}));

    record.set("note", json!("42"), true);
    assert_eq!(record.get("note", Value::Null), json!(42));

    record.set("note", json!("42"), false);
    assert_eq!(record.get("note", Value::Null), json!("42"));

    record.set("data_value.note", json!("forty-two"), false);
    assert_eq!(record.data_value().get("note"), Some(&json!("forty-two")));

}

#[test]
fn test_set_many_only_touches_known_keys() {
    let mut record = order_record(json!({}));
    record.set("note", json!("draft"), false);

    let mut many = Map::new();
    many.insert("paid".to_string(), json!(true));
    many.insert("note".to_string(), json!("final"));
    many.insert("data_value".to_string(), json!({"paid": "Yes"}));
    many.insert("extra".to_string(), json!([1]));
    record.set_many(&many);

    assert_eq!(record.get("paid", Value::Null), json!(true));
    assert_eq!(record.get("note", Value::Null), json!("final"));
    assert_eq!(record.data_value().get("paid"), Some(&json!("Yes")));
    assert!(record.lookup("extra").is_none());
}

#[test]
fn test_selection_values() {
    let mut record = order_record(json!({}));
    record.selection_value("status", json!("A"), json!("Active"));
    assert_eq!(record.get("status", Value::Null), json!("A"));
    assert_eq!(record.data_value()["status"], json!("Active"));

    let options = vec![
        json!({"value": "c1", "label": "Customer 1"}),
        json!({"value": "c2", "label": "Customer 2"}),
    ];
    record.selection_value_resources("customer", json!("c2"), &options, "label");
    assert_eq!(record.data_value()["customer"], json!("Customer 2"));
    record.selection_value_resources("customer", json!("c9"), &options, "label");
    assert_eq!(record.data_value()["customer"], json!(""));

    let mut copy = order_record(json!({}));
    copy.selection_value_from_record("state", &record, Some("status"));
    assert_eq!(copy.get("state", Value::Null), json!("A"));
    assert_eq!(copy.data_value()["state"], json!("Active"));
}

#[test]
fn test_set_from_child_and_retyping() {
    let mut record = order_record(json!({"lines": [{"product": "Bolt"}]}));

    record.set_from_child("first_product", "lines.0.product", json!(""));
    assert_eq!(record.get("first_product", Value::Null), json!("Bolt"));
    record.set_from_child("missing", "lines.3.product", json!("n/a"));
    assert_eq!(record.get("missing", Value::Null), json!("n/a"));

    record.set("flag", json!("true"), false);
    record.update_field_type_value("flag");
    assert_eq!(record.get("flag", Value::Null), json!(true));

    record.update_field_type_value("absent");
    assert_eq!(record.get("absent", Value::Null), json!(""));
}

#[test]
fn test_to_datetime() {
    let record = order_record(json!({"due": "2024-03-01T09:15:00"}));

    let due = record.to_datetime("due").expect("due is a timestamp");
    assert_eq!(formweave::infer::format_datetime(&due), "2024-03-01T09:15:00");
    assert!(record.to_datetime("paid").is_none());
    assert!(record.to_datetime("nothing").is_none());
}

#[test]
fn test_clone_data_drops_identity_and_shares_nothing() {
    let record = order_record(json!({
        "rec_name": "O-1",
        "total": 10.0,
        "lines": [{"product": "A"}]
    }));

    let mut copy = record.clone_data();
    assert!(!copy.contains_key("rec_name"));
    assert!(!copy.contains_key("total"));
    assert!(copy.contains_key("price"));

    if let Some(Value::Array(lines)) = copy.get_mut("lines") {
        lines.push(json!({"product": "B"}));
        lines[0]["product"] = json!("changed");
    }
    assert_eq!(record.get("lines.0.product", Value::Null), json!("A"));
    assert_eq!(record.get("lines", Value::Null).as_array().map(Vec::len), Some(1));
}

#[test]
fn test_dict_diff() {
    let record = order_record(json!({"rec_name": "O-1", "quantity": 2}));
    let mut other = Map::new();
    other.insert("rec_name".to_string(), json!("O-2"));
    other.insert("quantity".to_string(), json!(2));
    other.insert("paid".to_string(), json!(true));
    other.insert("unrelated".to_string(), json!(1));

    let diff = record.get_dict_diff(&other, &["rec_name"]);
    assert_eq!(Value::Object(diff), json!({"paid": true}));
}
