//! Tests for rule evaluation, logic actions and dependency extraction.
mod common;
use common::*;
use formweave::prelude::*;
use formweave::rules::{self, collect_dependencies};
use serde_json::{Value, json};

fn eval(logic: Value, data: Value) -> Value {
    rules::evaluate(&logic, &data).expect("expression evaluates")
}

#[test]
fn test_var_paths_and_defaults() {
    let data = json!({"form": {"user": {"name": "Ada"}, "rows": [{"qty": 3}]}});

    assert_eq!(eval(json!({"var": "form.user.name"}), data.clone()), json!("Ada"));
    assert_eq!(eval(json!({"var": "form.rows.0.qty"}), data.clone()), json!(3));
    assert_eq!(eval(json!({"var": ["form.missing", "n/a"]}), data.clone()), json!("n/a"));
    assert_eq!(eval(json!({"var": "form.missing"}), data), json!(null));
}

#[test]
fn test_control_flow_and_logic() {
    let data = json!({"age": 20});
    let logic = json!({"if": [
        {"<": [{"var": "age"}, 18]}, "minor",
        {"<": [{"var": "age"}, 65]}, "adult",
        "senior"
    ]});
    assert_eq!(eval(logic, data.clone()), json!("adult"));

    assert_eq!(eval(json!({"or": [0, "", "x"]}), json!({})), json!("x"));
    assert_eq!(eval(json!({"and": [1, 0, 2]}), json!({})), json!(0));
    assert_eq!(eval(json!({"!": [[]]}), json!({})), json!(true));
    assert_eq!(eval(json!({"!!": ["0"]}), json!({})), json!(true));
}

#[test]
fn test_arithmetic_and_strings() {
    assert_eq!(eval(json!({"*": [{"var": "price"}, {"var": "qty"}]}), json!({"price": "2.5", "qty": 4})), json!(10));
    assert_eq!(eval(json!({"-": [5]}), json!({})), json!(-5));
    assert_eq!(eval(json!({"%": [7, 3]}), json!({})), json!(1));
    assert_eq!(eval(json!({"max": [1, 9, 4]}), json!({})), json!(9));
    assert_eq!(eval(json!({"cat": ["a", 1, null]}), json!({})), json!("a1"));
    assert_eq!(eval(json!({"in": ["ell", "hello"]}), json!({})), json!(true));
    assert_eq!(eval(json!({"in": [2, [1, 2]]}), json!({})), json!(true));
    assert_eq!(eval(json!({"merge": [[1], 2, [3, 4]]}), json!({})), json!([1, 2, 3, 4]));
}

#[test]
fn test_array_operations() {
    let data = json!({"items": [1, 2, 3, 4]});
    assert_eq!(
        eval(json!({"map": [{"var": "items"}, {"*": [{"var": ""}, 2]}]}), data.clone()),
        json!([2, 4, 6, 8])
    );
    assert_eq!(
        eval(json!({"filter": [{"var": "items"}, {">": [{"var": ""}, 2]}]}), data.clone()),
        json!([3, 4])
    );
    assert_eq!(eval(json!({"all": [{"var": "items"}, {">": [{"var": ""}, 0]}]}), data.clone()), json!(true));
    assert_eq!(eval(json!({"some": [{"var": "items"}, {">": [{"var": ""}, 3]}]}), data.clone()), json!(true));
    assert_eq!(eval(json!({"none": [{"var": "items"}, {">": [{"var": ""}, 9]}]}), data), json!(true));
    assert_eq!(eval(json!({"all": [[], true]}), json!({})), json!(false));
}

#[test]
fn test_missing() {
    let data = json!({"a": 1, "b": ""});
    assert_eq!(eval(json!({"missing": ["a", "b", "c"]}), data.clone()), json!(["b", "c"]));
    assert_eq!(eval(json!({"missing_some": [1, ["a", "c"]]}), data.clone()), json!([]));
    assert_eq!(eval(json!({"missing_some": [2, ["a", "c"]]}), data), json!(["c"]));
}

#[test]
fn test_evaluation_errors() {
    assert_eq!(
        rules::evaluate(&json!({"frobnicate": [1]}), &json!({})),
        Err(EvaluationError::UnknownOperator("frobnicate".to_string()))
    );
    assert!(matches!(
        rules::evaluate(&json!({"==": [1]}), &json!({})),
        Err(EvaluationError::Arity { found: 1, .. })
    ));
    assert!(matches!(
        rules::evaluate(&json!({"+": ["abc", 1]}), &json!({})),
        Err(EvaluationError::TypeMismatch { .. })
    ));
}

#[test]
fn test_dependency_extraction() {
    let mut deps = DependencyMap::default();
    let expr = json!({"and": [
        {"==": [{"var": "form.data_value.status"}, "Active"]},
        {">": [{"var": ["form.total.amount", 0]}, 10]},
        {"var": "row.other"}
    ]});
    collect_dependencies(&expr, "summary", &mut deps);
    collect_dependencies(&expr, "summary", &mut deps);

    assert_eq!(deps.dependents_of("status"), ["summary"]);
    assert_eq!(deps.dependents_of("total"), ["summary"]);
    assert!(deps.dependents_of("row").is_empty());
    assert_eq!(deps.len(), 2);
}

#[test]
fn test_conditional_visibility_follows_context() {
    let compiled = compile("login", &login_schema());

    let guest = compiled
        .evaluate_field("secret", &form_context(json!({"username": "guest"})))
        .expect("secret exists");
    assert!(guest.cfg.hidden);

    let admin = compiled
        .evaluate_field("secret", &form_context(json!({"username": "admin"})))
        .expect("secret exists");
    assert!(!admin.cfg.hidden);
}

#[test]
fn test_evaluate_dependents_of_changed_field() {
    let compiled = compile("login", &login_schema());
    let configs = compiled.evaluate_dependents("username", &form_context(json!({"username": "guest"})));

    assert_eq!(configs.len(), 2);
    assert!(configs["password"].readonly);
    assert!(configs["secret"].hidden);

    let configs = compiled.evaluate_rules(&form_context(json!({"username": "admin"})));
    assert!(!configs["password"].readonly);
    assert!(!configs["secret"].hidden);
}

fn discount_schema(action: &str) -> SchemaDocument {
    SchemaDocument::from_value(&json!({
        "components": [
            {"type": "number", "key": "price", "input": true},
            {"type": "textfield", "key": "offer", "input": true,
             "logic": [{
                 "name": "discount",
                 "trigger": {"type": "json", "json": {">": [{"var": "form.price"}, 5]}},
                 "actions": [{"type": "value", "value": action}]
             }]}
        ]
    }))
    .expect("discount schema is valid")
}

#[test]
fn test_value_action_mirrors_into_properties() {
    let compiler = SchemaCompiler::builder("shop")
        .with_context_data(form_context(json!({"price": 10})))
        .build();
    let compiled = compiler.compile(&discount_schema("discount=form.price")).unwrap();
    let offer = compiled.descriptor("offer").expect("offer exists");

    assert_eq!(offer.cfg.get("discount"), Some(json!(10)));
    assert_eq!(offer.properties().get("discount"), Some(&json!(10)));
    assert_eq!(compiled.dependents_of("price"), ["offer"]);

    // The pre-rule snapshot is untouched.
    assert!(!compiled.metadata().config_fields["offer"].extra.contains_key("discount"));
}

#[test]
fn test_value_action_coerces_value_target() {
    let compiler = SchemaCompiler::builder("shop")
        .with_context_data(form_context(json!({"price": 10})))
        .build();
    let compiled = compiler
        .compile(&discount_schema(r#"value={"+": [{"var": "form.price"}, 1]}"#))
        .unwrap();
    let offer = compiled.descriptor("offer").expect("offer exists");

    // `offer` is a text field, so the sum is stored as text.
    assert_eq!(offer.cfg.value, Some(json!("11")));
    assert!(offer.properties().get("value").is_none());
}

#[test]
fn test_property_action_on_validate_path() {
    let schema = SchemaDocument::from_value(&json!({
        "components": [{
            "type": "textfield", "key": "vat", "input": true,
            "logic": [{
                "trigger": {"type": "json", "json": {"==": [{"var": "form.country"}, "IT"]}},
                "actions": [
                    {"type": "property", "property": {"value": "validate.required"}, "state": true},
                    {"type": "property", "property": {"value": "hidden"}, "state": false}
                ]
            }]
        }]
    }))
    .unwrap();
    let compiled = compile("invoice", &schema);

    let vat = compiled
        .evaluate_field("vat", &form_context(json!({"country": "IT"})))
        .expect("vat exists");
    assert!(vat.cfg.required);

    let vat = compiled
        .evaluate_field("vat", &form_context(json!({"country": "FR"})))
        .expect("vat exists");
    assert!(!vat.cfg.required);
}

#[test]
fn test_failing_rule_leaves_config_unchanged() {
    let schema = SchemaDocument::from_value(&json!({
        "components": [{
            "type": "textfield", "key": "note", "input": true,
            "logic": [
                {"trigger": {"type": "json", "json": {"bogus": [1]}},
                 "actions": [{"type": "property", "property": {"value": "hidden"}, "state": true}]},
                {"trigger": {"type": "json", "json": {"==": [1, 1]}},
                 "actions": [
                     {"type": "property", "property": {"value": "disabled"}, "state": true},
                     {"type": "value", "value": "value={\"+\": [\"x\", 1]}"}
                 ]}
            ]
        }]
    }))
    .unwrap();
    let compiled = compile("memo", &schema);
    let note = compiled.descriptor("note").expect("note exists");

    // Neither rule applied: the first cannot parse, the second fails midway.
    assert!(!note.cfg.hidden);
    assert!(!note.cfg.disabled);
    assert!(compiled.diagnostics.is_empty());
}

#[test]
fn test_substr_with_out_of_range_length() {
    assert_eq!(eval(json!({"substr": ["abc", 1, 1e19]}), json!({})), json!("bc"));
    assert_eq!(eval(json!({"substr": ["abc", 1, -1e19]}), json!({})), json!(""));
    assert_eq!(eval(json!({"substr": ["abc", -1e19, 1]}), json!({})), json!("a"));
}

#[test]
fn test_compile_survives_out_of_range_substr() {
    let schema = SchemaDocument::from_value(&json!({
        "components": [
            {"type": "textfield", "key": "a", "input": true},
            {"type": "textfield", "key": "b", "input": true,
             "conditional": {"json": {"==": [{"substr": [{"var": "form.a"}, 1, 1e19]}, "ello"]}}}
        ]
    }))
    .unwrap();
    let compiled = SchemaCompiler::builder("clip")
        .with_context_data(form_context(json!({"a": "hello"})))
        .build()
        .compile(&schema)
        .expect("Failed to compile");

    let b = compiled.descriptor("b").expect("b exists");
    assert!(!b.cfg.hidden);
    assert!(compiled.diagnostics.is_empty());
    assert_eq!(compiled.dependents_of("a"), ["b"]);
}
