use super::expression::{Expression, Operator};
use crate::error::EvaluationError;
use crate::path;
use crate::schema::is_truthy;
use serde_json::{Map, Number, Value};
use std::cmp::Ordering;

// Expands to a folded numeric operation over every argument.
macro_rules! fold_numbers {
    ($self:ident, $op:ident, $args:ident, $init:expr, $fold:expr) => {{
        let mut acc: f64 = $init;
        for arg in $args {
            let value = $self.eval(arg)?;
            acc = $fold(acc, $self.number($op, &value)?);
        }
        Ok(number_value(acc))
    }};
}

/// The recursive engine evaluating one expression against a data object.
pub(super) struct LogicEngine<'a> {
    data: &'a Value,
}

impl<'a> LogicEngine<'a> {
    pub(super) fn new(data: &'a Value) -> Self {
        Self { data }
    }

    pub(super) fn eval(&self, expr: &Expression) -> Result<Value, EvaluationError> {
        match expr {
            Expression::Literal(value) => Ok(value.clone()),
            Expression::Array(items) => items
                .iter()
                .map(|item| self.eval(item))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            Expression::Operation { op, args } => self.apply(*op, args),
        }
    }

    fn apply(&self, op: Operator, args: &[Expression]) -> Result<Value, EvaluationError> {
        match op {
            // --- Data access ---
            Operator::Var => self.var(args),
            Operator::Missing => {
                let keys = self.keys(args)?;
                Ok(Value::Array(self.missing(&keys)))
            }
            Operator::MissingSome => {
                let needed = self.eval(&args[0])?;
                let needed = self.number(op, &needed)? as usize;
                let keys = match self.eval(&args[1])? {
                    Value::Array(keys) => keys,
                    other => vec![other],
                };
                let missing = self.missing(&keys);
                if keys.len() - missing.len() >= needed {
                    Ok(Value::Array(Vec::new()))
                } else {
                    Ok(Value::Array(missing))
                }
            }

            // --- Control flow ---
            Operator::If | Operator::Ternary => {
                for pair in args.chunks(2) {
                    match pair {
                        [condition, then] => {
                            if is_truthy(&self.eval(condition)?) {
                                return self.eval(then);
                            }
                        }
                        [otherwise] => return self.eval(otherwise),
                        _ => {}
                    }
                }
                Ok(Value::Null)
            }

            // --- Equality ---
            Operator::Equal => {
                let (l, r) = self.pair(args)?;
                Ok(Value::Bool(loose_eq(&l, &r)))
            }
            Operator::NotEqual => {
                let (l, r) = self.pair(args)?;
                Ok(Value::Bool(!loose_eq(&l, &r)))
            }
            Operator::StrictEqual => {
                let (l, r) = self.pair(args)?;
                Ok(Value::Bool(strict_eq(&l, &r)))
            }
            Operator::StrictNotEqual => {
                let (l, r) = self.pair(args)?;
                Ok(Value::Bool(!strict_eq(&l, &r)))
            }

            // --- Logical ---
            Operator::Not => Ok(Value::Bool(!is_truthy(&self.eval(&args[0])?))),
            Operator::Truthy => Ok(Value::Bool(is_truthy(&self.eval(&args[0])?))),
            Operator::Or => {
                let mut last = Value::Null;
                for arg in args {
                    last = self.eval(arg)?;
                    if is_truthy(&last) {
                        break;
                    }
                }
                Ok(last)
            }
            Operator::And => {
                let mut last = Value::Null;
                for arg in args {
                    last = self.eval(arg)?;
                    if !is_truthy(&last) {
                        break;
                    }
                }
                Ok(last)
            }

            // --- Comparison ---
            Operator::GreaterThan => self.compare_chain(args, |o| o == Ordering::Greater),
            Operator::GreaterThanOrEqual => self.compare_chain(args, |o| o != Ordering::Less),
            Operator::SmallerThan => self.compare_chain(args, |o| o == Ordering::Less),
            Operator::SmallerThanOrEqual => self.compare_chain(args, |o| o != Ordering::Greater),
            Operator::Max | Operator::Min => {
                let mut best: Option<f64> = None;
                for arg in args {
                    let value = self.eval(arg)?;
                    let n = self.number(op, &value)?;
                    best = Some(match best {
                        Some(b) if op == Operator::Max => b.max(n),
                        Some(b) => b.min(n),
                        None => n,
                    });
                }
                Ok(best.map(number_value).unwrap_or(Value::Null))
            }

            // --- Arithmetic ---
            Operator::Sum => fold_numbers!(self, op, args, 0.0, |a, b| a + b),
            Operator::Multiply => fold_numbers!(self, op, args, 1.0, |a, b| a * b),
            Operator::Subtract => {
                let first = self.eval(&args[0])?;
                let first = self.number(op, &first)?;
                match args.get(1) {
                    Some(rhs) => {
                        let rhs = self.eval(rhs)?;
                        Ok(number_value(first - self.number(op, &rhs)?))
                    }
                    None => Ok(number_value(-first)),
                }
            }
            Operator::Divide | Operator::Modulo => {
                let (l, r) = self.pair(args)?;
                let (l, r) = (self.number(op, &l)?, self.number(op, &r)?);
                if r == 0.0 {
                    return Ok(Value::Null);
                }
                Ok(number_value(if op == Operator::Divide { l / r } else { l % r }))
            }

            // --- Strings and arrays ---
            Operator::Cat => {
                let mut out = String::new();
                for arg in args {
                    out.push_str(&text(&self.eval(arg)?));
                }
                Ok(Value::String(out))
            }
            Operator::Substr => self.substr(args),
            Operator::In => {
                let (needle, haystack) = self.pair(args)?;
                let found = match &haystack {
                    Value::String(s) => s.contains(&text(&needle)),
                    Value::Array(items) => items.iter().any(|item| strict_eq(item, &needle)),
                    _ => false,
                };
                Ok(Value::Bool(found))
            }
            Operator::Merge => {
                let mut out = Vec::new();
                for arg in args {
                    match self.eval(arg)? {
                        Value::Array(items) => out.extend(items),
                        other => out.push(other),
                    }
                }
                Ok(Value::Array(out))
            }
            Operator::Map => {
                let items = self.items(&args[0])?;
                items
                    .iter()
                    .map(|item| LogicEngine::new(item).eval(&args[1]))
                    .collect::<Result<Vec<_>, _>>()
                    .map(Value::Array)
            }
            Operator::Filter => {
                let mut kept = Vec::new();
                for item in self.items(&args[0])? {
                    if is_truthy(&LogicEngine::new(&item).eval(&args[1])?) {
                        kept.push(item);
                    }
                }
                Ok(Value::Array(kept))
            }
            Operator::Reduce => {
                let mut accumulator = match args.get(2) {
                    Some(initial) => self.eval(initial)?,
                    None => Value::Null,
                };
                for item in self.items(&args[0])? {
                    let mut scope = Map::new();
                    scope.insert("current".to_string(), item);
                    scope.insert("accumulator".to_string(), accumulator);
                    accumulator = LogicEngine::new(&Value::Object(scope)).eval(&args[1])?;
                }
                Ok(accumulator)
            }
            Operator::All | Operator::Some | Operator::None => {
                let items = self.items(&args[0])?;
                if items.is_empty() {
                    return Ok(Value::Bool(op == Operator::None));
                }
                let mut hits = 0;
                for item in &items {
                    if is_truthy(&LogicEngine::new(item).eval(&args[1])?) {
                        hits += 1;
                    }
                }
                Ok(Value::Bool(match op {
                    Operator::All => hits == items.len(),
                    Operator::Some => hits > 0,
                    _ => hits == 0,
                }))
            }

            Operator::Log => {
                let value = self.eval(&args[0])?;
                tracing::debug!(value = %value, "rule log");
                Ok(value)
            }
        }
    }

    fn var(&self, args: &[Expression]) -> Result<Value, EvaluationError> {
        let path = match args.first() {
            Some(arg) => self.eval(arg)?,
            None => Value::Null,
        };
        let path = match &path {
            Value::Null => String::new(),
            other => text(other),
        };
        if path.is_empty() {
            return Ok(self.data.clone());
        }
        match path::lookup(self.data, &path) {
            Some(value) => Ok(value.clone()),
            None => match args.get(1) {
                Some(default) => self.eval(default),
                None => Ok(Value::Null),
            },
        }
    }

    /// Evaluated key list of `missing`; a single array argument is unpacked.
    fn keys(&self, args: &[Expression]) -> Result<Vec<Value>, EvaluationError> {
        let mut keys = Vec::new();
        for arg in args {
            match self.eval(arg)? {
                Value::Array(items) => keys.extend(items),
                other => keys.push(other),
            }
        }
        Ok(keys)
    }

    fn missing(&self, keys: &[Value]) -> Vec<Value> {
        keys.iter()
            .filter(|key| {
                path::lookup(self.data, &text(key))
                    .is_none_or(|v| v.is_null() || v.as_str() == Some(""))
            })
            .cloned()
            .collect()
    }

    fn pair(&self, args: &[Expression]) -> Result<(Value, Value), EvaluationError> {
        Ok((self.eval(&args[0])?, self.eval(&args[1])?))
    }

    fn items(&self, expr: &Expression) -> Result<Vec<Value>, EvaluationError> {
        Ok(match self.eval(expr)? {
            Value::Array(items) => items,
            _ => Vec::new(),
        })
    }

    /// Two-argument comparison, or the three-argument "between" form.
    fn compare_chain(
        &self,
        args: &[Expression],
        accept: impl Fn(Ordering) -> bool,
    ) -> Result<Value, EvaluationError> {
        let values = args
            .iter()
            .map(|arg| self.eval(arg))
            .collect::<Result<Vec<_>, _>>()?;
        let ok = values
            .windows(2)
            .all(|w| compare(&w[0], &w[1]).is_some_and(&accept));
        Ok(Value::Bool(ok))
    }

    fn substr(&self, args: &[Expression]) -> Result<Value, EvaluationError> {
        let source: Vec<char> = text(&self.eval(&args[0])?).chars().collect();
        let start = self.eval(&args[1])?;
        let start = self.number(Operator::Substr, &start)? as i64;
        let len = source.len() as i64;
        // Out-of-range floats saturate on the cast; the bounds must too.
        let from = if start < 0 {
            len.saturating_add(start).max(0)
        } else {
            start.min(len)
        };
        let to = match args.get(2) {
            Some(count) => {
                let count = self.eval(count)?;
                let count = self.number(Operator::Substr, &count)? as i64;
                if count < 0 {
                    len.saturating_add(count).max(from)
                } else {
                    from.saturating_add(count).min(len)
                }
            }
            None => len,
        };
        Ok(Value::String(source[from as usize..to as usize].iter().collect()))
    }

    fn number(&self, op: Operator, value: &Value) -> Result<f64, EvaluationError> {
        to_number(value).ok_or_else(|| EvaluationError::TypeMismatch {
            operation: op.name().to_string(),
            expected: "Number".to_string(),
            found: value.clone(),
        })
    }
}

/// Numeric coercion: numbers, numeric strings, booleans and null.
pub(super) fn to_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) if s.trim().is_empty() => Some(0.0),
        Value::String(s) => s.trim().parse().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::Null => Some(0.0),
        _ => None,
    }
}

/// Integral results come back as integers.
fn number_value(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < 9.0e15 {
        Value::from(n as i64)
    } else {
        Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null)
    }
}

fn text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn loose_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Null, _) | (_, Value::Null) => false,
        (Value::String(x), Value::String(y)) => x == y,
        (Value::Number(_) | Value::Bool(_) | Value::String(_), Value::Number(_) | Value::Bool(_))
        | (Value::Number(_) | Value::Bool(_), Value::String(_)) => {
            matches!((to_number(a), to_number(b)), (Some(x), Some(y)) if x == y)
        }
        _ => a == b,
    }
}

fn strict_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => to_number(a)?.partial_cmp(&to_number(b)?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn run(logic: Value, data: Value) -> Value {
        let expr = Expression::parse(&logic).unwrap();
        LogicEngine::new(&data).eval(&expr).unwrap()
    }

    #[test]
    fn test_integral_results_are_ints() {
        assert_eq!(run(json!({"+": [1.5, 2.5]}), json!({})), json!(4));
        assert_eq!(run(json!({"/": [1, 4]}), json!({})), json!(0.25));
    }

    #[test]
    fn test_between() {
        assert_eq!(run(json!({"<": [1, {"var": "x"}, 10]}), json!({"x": 5})), json!(true));
        assert_eq!(run(json!({"<=": [1, {"var": "x"}, 4]}), json!({"x": 5})), json!(false));
    }

    #[test]
    fn test_loose_equality_crosses_types() {
        assert_eq!(run(json!({"==": [1, "1"]}), json!({})), json!(true));
        assert_eq!(run(json!({"===": [1, "1"]}), json!({})), json!(false));
        assert_eq!(run(json!({"==": [null, 0]}), json!({})), json!(false));
    }

    #[test]
    fn test_substr_negative_bounds() {
        assert_eq!(run(json!({"substr": ["jsonlogic", -5]}), json!({})), json!("logic"));
        assert_eq!(run(json!({"substr": ["jsonlogic", 0, -5]}), json!({})), json!("json"));
    }

    #[test]
    fn test_substr_huge_bounds_clamp() {
        assert_eq!(run(json!({"substr": ["abc", 1, 1e19]}), json!({})), json!("bc"));
        assert_eq!(run(json!({"substr": ["abc", 1, -1e19]}), json!({})), json!(""));
        assert_eq!(run(json!({"substr": ["abc", -1e19]}), json!({})), json!("abc"));
        assert_eq!(run(json!({"substr": ["abc", 1e19, 2]}), json!({})), json!(""));
    }

    #[test]
    fn test_reduce_uses_accumulator_scope() {
        let logic = json!({"reduce": [
            {"var": "items"},
            {"+": [{"var": "current"}, {"var": "accumulator"}]},
            0
        ]});
        assert_eq!(run(logic, json!({"items": [1, 2, 3]})), json!(6));
    }
}
