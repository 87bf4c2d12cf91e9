//! Rule evaluation for conditional visibility and logic triggers.
//!
//! Expressions are JSON-logic trees. [`evaluate`] parses and runs one against
//! a data object; [`RuleEvaluator`] applies a field's conditional and logic
//! blocks to its configuration.

use crate::error::EvaluationError;
use crate::field::FieldDescriptor;
use crate::schema::is_truthy;
use indexmap::IndexMap;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use std::sync::LazyLock;

mod deps;
mod engine;
mod expression;

pub use deps::{collect_dependencies, referenced_field};
pub use expression::{Expression, Operator};

static DOTTED_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z0-9_]+)+$").expect("path pattern is valid")
});

/// Parses and evaluates `logic` against `data`.
pub fn evaluate(logic: &Value, data: &Value) -> Result<Value, EvaluationError> {
    let expr = Expression::parse(logic)?;
    engine::LogicEngine::new(data).eval(&expr)
}

/// `referenced field -> fields whose rules read it`.
///
/// Each entry is a set. Sources and dependents keep first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DependencyMap {
    edges: IndexMap<String, Vec<String>>,
}

impl DependencyMap {
    /// Records that `dependent` reads `source`. Returns false on a duplicate.
    pub fn record(&mut self, source: &str, dependent: &str) -> bool {
        let entry = self.edges.entry(source.to_string()).or_default();
        if entry.iter().any(|d| d == dependent) {
            return false;
        }
        entry.push(dependent.to_string());
        true
    }

    pub fn dependents_of(&self, source: &str) -> &[String] {
        self.edges.get(source).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn contains(&self, source: &str, dependent: &str) -> bool {
        self.dependents_of(source).iter().any(|d| d == dependent)
    }

    pub fn sources(&self) -> impl Iterator<Item = &str> {
        self.edges.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}

/// One parsed action of a logic rule.
#[derive(Debug, Clone, PartialEq)]
enum Action {
    /// Sets a config key to a literal state.
    Property { target: String, state: Value },
    /// Sets a config key to the trigger result, or to a computed value.
    Value { target: String, expr: Option<Value> },
}

impl Action {
    fn parse(raw: &Value) -> Option<Self> {
        match raw.get("type").and_then(Value::as_str) {
            Some("property") => {
                let name = raw
                    .get("property")
                    .and_then(|p| p.get("value"))
                    .and_then(Value::as_str)?;
                // validate.required addresses the `required` key.
                let target = match name.strip_prefix("validate.") {
                    Some(rest) => rest.rsplit('.').next().unwrap_or(rest),
                    None => name,
                };
                Some(Action::Property {
                    target: target.to_string(),
                    state: raw.get("state").cloned().unwrap_or(Value::Null),
                })
            }
            Some("value") => {
                let text = raw.get("value").and_then(Value::as_str)?.trim();
                Some(match text.split_once('=') {
                    Some((target, expr)) => Action::Value {
                        target: target.trim().to_string(),
                        expr: Some(action_expression(expr)),
                    },
                    None => Action::Value {
                        target: text.to_string(),
                        expr: None,
                    },
                })
            }
            other => {
                tracing::debug!(action = ?other, "ignoring unsupported logic action");
                None
            }
        }
    }
}

/// Decodes the right-hand side of a `key=expr` value action.
///
/// JSON is taken as is, also with single quotes. A bare dotted path becomes a
/// `var` reference; anything else stays literal text.
fn action_expression(text: &str) -> Value {
    let text = text.trim();
    if let Ok(value) = serde_json::from_str::<Value>(text) {
        return value;
    }
    if let Ok(value) = serde_json::from_str::<Value>(&text.replace('\'', "\"")) {
        return value;
    }
    if DOTTED_PATH.is_match(text) {
        return serde_json::json!({ "var": text });
    }
    Value::String(text.to_string())
}

/// Applies rule blocks of descriptors against one context object.
#[derive(Debug, Clone, Copy)]
pub struct RuleEvaluator<'a> {
    context: &'a Value,
}

impl<'a> RuleEvaluator<'a> {
    pub fn new(context: &'a Value) -> Self {
        Self { context }
    }

    pub fn evaluate(&self, logic: &Value) -> Result<Value, EvaluationError> {
        evaluate(logic, self.context)
    }

    /// Sets `hidden` to the negated truthiness of the conditional expression.
    pub fn apply_conditional(&self, field: &mut FieldDescriptor) -> Result<(), EvaluationError> {
        let Some(condition) = field.node.conditional_json() else {
            return Ok(());
        };
        let visible = is_truthy(&self.evaluate(condition)?);
        field.cfg.hidden = !visible;
        Ok(())
    }

    /// Runs every logic rule whose trigger is truthy.
    ///
    /// Each rule applies all of its actions or none of them. A failing rule is
    /// logged and skipped; the others still run.
    pub fn apply_logic(&self, field: &mut FieldDescriptor) -> usize {
        let rules: Vec<(Value, Vec<Value>)> = field
            .node
            .logic_rules()
            .map(|(trigger, actions)| (trigger.clone(), actions.to_vec()))
            .collect();
        let mut applied = 0;
        for (trigger, actions) in rules {
            match self.apply_rule(field, &trigger, &actions) {
                Ok(true) => applied += 1,
                Ok(false) => {}
                Err(error) => {
                    tracing::warn!(field = %field.key(), error = %error, "logic rule failed");
                }
            }
        }
        applied
    }

    fn apply_rule(
        &self,
        field: &mut FieldDescriptor,
        trigger: &Value,
        actions: &[Value],
    ) -> Result<bool, EvaluationError> {
        let result = self.evaluate(trigger)?;
        if !is_truthy(&result) {
            return Ok(false);
        }

        let mut cfg = field.cfg.clone();
        let mut properties = field.node.properties.clone();
        for action in actions.iter().filter_map(Action::parse) {
            match action {
                Action::Property { target, state } => cfg.set(&target, state),
                Action::Value { target, expr } => {
                    let value = match &expr {
                        Some(expr) => self.evaluate(expr)?,
                        None => result.clone(),
                    };
                    if target == "value" {
                        let value = match &field.input_type {
                            Some(input_type) => input_type.coerce(field.key(), &value).map_err(
                                |_| EvaluationError::TypeMismatch {
                                    operation: "value".to_string(),
                                    expected: input_type.to_string(),
                                    found: value.clone(),
                                },
                            )?,
                            None => value,
                        };
                        cfg.set("value", value);
                    } else {
                        cfg.set(&target, value.clone());
                        properties.insert(target, value);
                    }
                }
            }
        }
        field.cfg = cfg;
        field.node.properties = properties;
        Ok(true)
    }

    /// Records the field's dependencies, then applies its rules.
    ///
    /// Rule failures are logged and leave the configuration untouched.
    pub fn evaluate_field(&self, field: &mut FieldDescriptor, deps: &mut DependencyMap) {
        field_dependencies(field, deps);
        if field.has_logic() {
            self.apply_logic(field);
        }
        if field.has_conditions() {
            if let Err(error) = self.apply_conditional(field) {
                tracing::warn!(field = %field.key(), error = %error, "conditional rule failed");
            }
        }
    }
}

/// Collects every `form.` reference of a field's conditional, triggers and
/// value actions.
pub fn field_dependencies(field: &FieldDescriptor, deps: &mut DependencyMap) {
    let key = field.key().to_string();
    if let Some(condition) = field.node.conditional_json() {
        collect_dependencies(condition, &key, deps);
    }
    for (trigger, actions) in field.node.logic_rules() {
        collect_dependencies(trigger, &key, deps);
        for action in actions.iter().filter_map(Action::parse) {
            if let Action::Value { expr: Some(expr), .. } = action {
                collect_dependencies(&expr, &key, deps);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_action_expression_forms() {
        assert_eq!(action_expression(r#"{"var": "a"}"#), json!({"var": "a"}));
        assert_eq!(action_expression("{'var': 'a'}"), json!({"var": "a"}));
        assert_eq!(action_expression("form.price"), json!({"var": "form.price"}));
        assert_eq!(action_expression("hello world"), json!("hello world"));
    }

    #[test]
    fn test_validate_prefix_is_reduced() {
        let action = Action::parse(&json!({
            "type": "property",
            "property": {"value": "validate.required"},
            "state": true
        }));
        assert_eq!(
            action,
            Some(Action::Property {
                target: "required".to_string(),
                state: json!(true)
            })
        );
    }
}
