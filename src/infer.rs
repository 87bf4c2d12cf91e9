//! Value type inference for free-text input.
//!
//! Raw scalars coming from form submissions are mostly strings. The inferencer
//! classifies them into a [`ValueKind`] and produces the coerced value:
//!
//! 1. non-strings are stringified,
//! 2. `"true"` / `"false"` (any case) become booleans,
//! 3. a timestamp like `2022-05-24T00:00:00` is parsed into a datetime,
//! 4. everything else goes through a composite pattern with the alternatives
//!    dict, list, float, int and string. Mixed content such as `"abc123"`
//!    stays text, and numeric kinds keep only the captured digits.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use std::fmt;
use std::sync::LazyLock;

/// Canonical storage format for datetimes inside JSON records.
pub const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

static DATETIME_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d{4}-\d{2}-\d{2})[A-Za-z]+(\d{2}:\d{2}:\d{2})")
        .expect("datetime pattern is valid")
});

static SCALAR_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?P<dict>\{[^{}]+\})|(?P<list>\[[^\]]+\])|(?P<float>\d*\.\d+)|(?P<int>\d+)|(?P<string>[a-zA-Z]+)",
    )
    .expect("scalar pattern is valid")
});

// Order matches the alternatives of SCALAR_PATTERN.
const ALTERNATIVES: [(&str, ValueKind); 5] = [
    ("dict", ValueKind::Dict),
    ("list", ValueKind::List),
    ("float", ValueKind::Float),
    ("int", ValueKind::Int),
    ("string", ValueKind::String),
];

/// The closed set of kinds a raw scalar can be classified into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    Int,
    Float,
    String,
    Bool,
    Datetime,
    List,
    Dict,
}

impl ValueKind {
    /// Resolves a kind from the names used in field-parser overrides.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "int" | "integer" => Some(ValueKind::Int),
            "float" | "number" => Some(ValueKind::Float),
            "string" | "str" | "text" => Some(ValueKind::String),
            "bool" | "boolean" => Some(ValueKind::Bool),
            "date" | "datetime" => Some(ValueKind::Datetime),
            "list" | "array" => Some(ValueKind::List),
            "dict" | "object" => Some(ValueKind::Dict),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ValueKind::Int => "int",
            ValueKind::Float => "float",
            ValueKind::String => "string",
            ValueKind::Bool => "bool",
            ValueKind::Datetime => "datetime",
            ValueKind::List => "list",
            ValueKind::Dict => "dict",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A classified and coerced scalar.
#[derive(Debug, Clone, PartialEq)]
pub enum Inferred {
    Bool(bool),
    Int(i64),
    Float(f64),
    Datetime(NaiveDateTime),
    List(Vec<Value>),
    Dict(Map<String, Value>),
    Text(String),
}

impl Inferred {
    pub fn kind(&self) -> ValueKind {
        match self {
            Inferred::Bool(_) => ValueKind::Bool,
            Inferred::Int(_) => ValueKind::Int,
            Inferred::Float(_) => ValueKind::Float,
            Inferred::Datetime(_) => ValueKind::Datetime,
            Inferred::List(_) => ValueKind::List,
            Inferred::Dict(_) => ValueKind::Dict,
            Inferred::Text(_) => ValueKind::String,
        }
    }

    /// Renders the coerced value as JSON. Datetimes use [`DATETIME_FORMAT`].
    pub fn into_value(self) -> Value {
        match self {
            Inferred::Bool(b) => Value::Bool(b),
            Inferred::Int(i) => Value::from(i),
            Inferred::Float(f) => Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null),
            Inferred::Datetime(dt) => Value::String(format_datetime(&dt)),
            Inferred::List(items) => Value::Array(items),
            Inferred::Dict(map) => Value::Object(map),
            Inferred::Text(s) => Value::String(s),
        }
    }
}

/// Classifies and coerces a raw JSON value.
///
/// `null` is treated as empty text.
pub fn infer(raw: &Value) -> Inferred {
    match raw {
        Value::String(s) => infer_str(s),
        Value::Null => Inferred::Text(String::new()),
        other => infer_str(&other.to_string()),
    }
}

/// Returns only the kind of a raw value.
pub fn classify(raw: &Value) -> ValueKind {
    infer(raw).kind()
}

/// Returns only the coerced value of a raw value, rendered as JSON.
pub fn coerce(raw: &Value) -> Value {
    infer(raw).into_value()
}

/// Classifies and coerces a string.
///
/// Numbers are read from the first captured numeric run only. Separators
/// such as `-` or `/` are not captured and do not count as a second kind,
/// so a bare date `"2022-05-24"` infers as the integer `2022` and
/// `"1.5.6"` as the float `1.5`. Only a full timestamp is a datetime.
pub fn infer_str(s: &str) -> Inferred {
    if s.eq_ignore_ascii_case("true") {
        return Inferred::Bool(true);
    }
    if s.eq_ignore_ascii_case("false") {
        return Inferred::Bool(false);
    }

    if let Some(caps) = DATETIME_PATTERN.captures(s) {
        let stamp = format!("{}T{}", &caps[1], &caps[2]);
        match NaiveDateTime::parse_from_str(&stamp, DATETIME_FORMAT) {
            Ok(dt) => return Inferred::Datetime(dt),
            Err(e) => {
                tracing::warn!(value = s, error = %e, "datetime-shaped value is not a valid timestamp");
                return Inferred::Text(s.to_string());
            }
        }
    }

    let Some(first) = SCALAR_PATTERN.captures(s) else {
        return Inferred::Text(s.to_string());
    };
    let Some((kind, captured)) = matched_alternative(&first) else {
        return Inferred::Text(s.to_string());
    };

    if matches!(kind, ValueKind::List | ValueKind::Dict) {
        return match serde_json::from_str::<Value>(s) {
            Ok(Value::Array(items)) => Inferred::List(items),
            Ok(Value::Object(map)) => Inferred::Dict(map),
            Ok(other) => {
                tracing::warn!(value = s, "decoded {} is not a container", other);
                Inferred::Text(s.to_string())
            }
            Err(e) => {
                tracing::warn!(value = s, error = %e, "could not decode embedded JSON");
                Inferred::Text(s.to_string())
            }
        };
    }

    let mixed = SCALAR_PATTERN
        .captures_iter(s)
        .filter_map(|caps| matched_alternative(&caps).map(|(k, _)| k))
        .any(|k| k != kind);
    if mixed {
        return Inferred::Text(s.to_string());
    }

    match kind {
        ValueKind::Int => match captured.parse::<i64>() {
            Ok(i) => Inferred::Int(i),
            Err(_) => captured
                .parse::<f64>()
                .map(Inferred::Float)
                .unwrap_or_else(|_| Inferred::Text(s.to_string())),
        },
        ValueKind::Float => captured
            .parse::<f64>()
            .map(Inferred::Float)
            .unwrap_or_else(|_| Inferred::Text(s.to_string())),
        _ => Inferred::Text(s.to_string()),
    }
}

fn matched_alternative<'t>(caps: &Captures<'t>) -> Option<(ValueKind, &'t str)> {
    ALTERNATIVES
        .iter()
        .find_map(|(name, kind)| caps.name(name).map(|m| (*kind, m.as_str())))
}

/// Forces a raw value into the given kind, returning `None` when it cannot be
/// represented. Used for typed writes and field-parser overrides.
pub fn convert(kind: ValueKind, raw: &Value) -> Option<Value> {
    match kind {
        ValueKind::String => Some(match raw {
            Value::String(s) => Value::String(s.clone()),
            Value::Null => Value::String(String::new()),
            other => Value::String(other.to_string()),
        }),
        ValueKind::Int => match raw {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f.trunc() as i64))
                .map(Value::from),
            Value::String(s) => {
                let t = s.trim();
                t.parse::<i64>()
                    .ok()
                    .or_else(|| t.parse::<f64>().ok().map(|f| f.trunc() as i64))
                    .map(Value::from)
            }
            Value::Bool(b) => Some(Value::from(*b as i64)),
            _ => None,
        },
        ValueKind::Float => {
            let f = match raw {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => s.trim().parse::<f64>().ok(),
                Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
                _ => None,
            }?;
            Number::from_f64(f).map(Value::Number)
        }
        ValueKind::Bool => match raw {
            Value::Bool(b) => Some(Value::Bool(*b)),
            Value::String(s) if s.eq_ignore_ascii_case("true") => Some(Value::Bool(true)),
            Value::String(s) if s.eq_ignore_ascii_case("false") => Some(Value::Bool(false)),
            Value::Number(n) => n.as_f64().map(|f| Value::Bool(f != 0.0)),
            _ => None,
        },
        ValueKind::Datetime => match raw {
            Value::String(s) => parse_datetime(s).map(|dt| Value::String(format_datetime(&dt))),
            _ => None,
        },
        ValueKind::List => match raw {
            Value::Array(_) => Some(raw.clone()),
            Value::String(s) => match serde_json::from_str::<Value>(s) {
                Ok(v @ Value::Array(_)) => Some(v),
                _ => None,
            },
            _ => None,
        },
        ValueKind::Dict => match raw {
            Value::Object(_) => Some(raw.clone()),
            Value::String(s) => match serde_json::from_str::<Value>(s) {
                Ok(v @ Value::Object(_)) => Some(v),
                _ => None,
            },
            _ => None,
        },
    }
}

/// Parses the timestamp shapes seen in form payloads.
pub fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Some(dt);
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0);
    }
    DATETIME_PATTERN.captures(s).and_then(|caps| {
        NaiveDateTime::parse_from_str(&format!("{}T{}", &caps[1], &caps[2]), DATETIME_FORMAT).ok()
    })
}

pub fn format_datetime(dt: &NaiveDateTime) -> String {
    dt.format(DATETIME_FORMAT).to_string()
}
