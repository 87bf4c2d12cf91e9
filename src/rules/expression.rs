use crate::error::EvaluationError;
use serde_json::Value;
use std::fmt;

/// Defines the operator enum together with its name lookup and arity table.
macro_rules! define_operators {
    ( $( ($variant:ident, $name:expr, $min:expr, $max:expr) ),* $(,)? ) => {
        /// The closed set of supported operations.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum Operator {
            $( $variant, )*
        }

        impl Operator {
            pub fn from_name(name: &str) -> Option<Self> {
                match name {
                    $( $name => Some(Operator::$variant), )*
                    _ => None,
                }
            }

            pub fn name(&self) -> &'static str {
                match self {
                    $( Operator::$variant => $name, )*
                }
            }

            /// `(min, max)` argument count; `None` means unbounded.
            fn arity(&self) -> (usize, Option<usize>) {
                match self {
                    $( Operator::$variant => ($min, $max), )*
                }
            }
        }
    };
}

define_operators! {
    // Data access
    (Var, "var", 0, Some(2)),
    (Missing, "missing", 0, None),
    (MissingSome, "missing_some", 2, Some(2)),

    // Control flow
    (If, "if", 0, None),
    (Ternary, "?:", 0, None),

    // Equality
    (Equal, "==", 2, Some(2)),
    (StrictEqual, "===", 2, Some(2)),
    (NotEqual, "!=", 2, Some(2)),
    (StrictNotEqual, "!==", 2, Some(2)),

    // Logical
    (Not, "!", 1, Some(1)),
    (Truthy, "!!", 1, Some(1)),
    (Or, "or", 1, None),
    (And, "and", 1, None),

    // Comparison
    (GreaterThan, ">", 2, Some(2)),
    (GreaterThanOrEqual, ">=", 2, Some(2)),
    (SmallerThan, "<", 2, Some(3)),
    (SmallerThanOrEqual, "<=", 2, Some(3)),
    (Max, "max", 0, None),
    (Min, "min", 0, None),

    // Arithmetic
    (Sum, "+", 0, None),
    (Subtract, "-", 1, Some(2)),
    (Multiply, "*", 1, None),
    (Divide, "/", 2, Some(2)),
    (Modulo, "%", 2, Some(2)),

    // Strings and arrays
    (Cat, "cat", 0, None),
    (Substr, "substr", 2, Some(3)),
    (In, "in", 2, Some(2)),
    (Merge, "merge", 0, None),
    (Map, "map", 2, Some(2)),
    (Filter, "filter", 2, Some(2)),
    (Reduce, "reduce", 2, Some(3)),
    (All, "all", 2, Some(2)),
    (Some, "some", 2, Some(2)),
    (None, "none", 2, Some(2)),

    // Misc
    (Log, "log", 1, Some(1)),
}

/// A parsed rule expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Literal(Value),
    Array(Vec<Expression>),
    Operation { op: Operator, args: Vec<Expression> },
}

impl Expression {
    /// Parses a JSON-logic tree. Objects with exactly one key are operations;
    /// any other object is a literal.
    pub fn parse(value: &Value) -> Result<Self, EvaluationError> {
        match value {
            Value::Object(map) if map.len() == 1 => {
                let Some((name, operands)) = map.iter().next() else {
                    return Ok(Expression::Literal(value.clone()));
                };
                let op = Operator::from_name(name)
                    .ok_or_else(|| EvaluationError::UnknownOperator(name.clone()))?;
                let args = match operands {
                    Value::Array(items) => items
                        .iter()
                        .map(Expression::parse)
                        .collect::<Result<Vec<_>, _>>()?,
                    single => vec![Expression::parse(single)?],
                };
                check_arity(op, args.len())?;
                Ok(Expression::Operation { op, args })
            }
            Value::Array(items) => items
                .iter()
                .map(Expression::parse)
                .collect::<Result<Vec<_>, _>>()
                .map(Expression::Array),
            other => Ok(Expression::Literal(other.clone())),
        }
    }

    /// Shorthand for a `{"var": path}` reference.
    pub fn var(path: &str) -> Self {
        Expression::Operation {
            op: Operator::Var,
            args: vec![Expression::Literal(Value::String(path.to_string()))],
        }
    }
}

fn check_arity(op: Operator, found: usize) -> Result<(), EvaluationError> {
    let (min, max) = op.arity();
    if found < min || max.is_some_and(|max| found > max) {
        let expected = match max {
            Some(max) if max == min => min.to_string(),
            Some(max) => format!("{}..={}", min, max),
            None => format!("at least {}", min),
        };
        return Err(EvaluationError::Arity {
            operator: op.name().to_string(),
            expected,
            found,
        });
    }
    Ok(())
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Literal(v) => write!(f, "{}", v),
            Expression::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Expression::Operation { op, args } => {
                write!(f, "{}(", op.name())?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
        }
    }
}
