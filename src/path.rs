//! Dotted-path addressing into JSON values.
//!
//! `grid.1.total` walks object keys and turns all-digit segments into list
//! indices. An empty path addresses the root.

use serde_json::{Map, Value};

/// One step of a dotted path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment<'a> {
    Key(&'a str),
    Index(usize),
}

pub fn segments(path: &str) -> impl Iterator<Item = Segment<'_>> {
    path.split('.').filter(|s| !s.is_empty()).map(|s| {
        if s.bytes().all(|b| b.is_ascii_digit()) {
            s.parse().map(Segment::Index).unwrap_or(Segment::Key(s))
        } else {
            Segment::Key(s)
        }
    })
}

/// Resolves `path` against `root`. Digit segments also address object keys
/// named by those digits.
pub fn lookup<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    segments(path).try_fold(root, |node, segment| match (node, segment) {
        (Value::Object(map), Segment::Key(key)) => map.get(key),
        (Value::Object(map), Segment::Index(i)) => map.get(&i.to_string()),
        (Value::Array(items), Segment::Index(i)) => items.get(i),
        _ => None,
    })
}

/// Mutable counterpart of [`lookup`].
pub fn lookup_mut<'a>(root: &'a mut Value, path: &str) -> Option<&'a mut Value> {
    segments(path).try_fold(root, |node, segment| match (node, segment) {
        (Value::Object(map), Segment::Key(key)) => map.get_mut(key),
        (Value::Object(map), Segment::Index(i)) => map.get_mut(&i.to_string()),
        (Value::Array(items), Segment::Index(i)) => items.get_mut(i),
        _ => None,
    })
}

/// Resolves `path` against the fields of an object.
pub fn lookup_in<'a>(fields: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    let (head, rest) = path.split_once('.').unwrap_or((path, ""));
    lookup(fields.get(head)?, rest)
}

/// Mutable counterpart of [`lookup_in`].
pub fn lookup_in_mut<'a>(fields: &'a mut Map<String, Value>, path: &str) -> Option<&'a mut Value> {
    let (head, rest) = path.split_once('.').unwrap_or((path, ""));
    lookup_mut(fields.get_mut(head)?, rest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_digit_segments_index_lists_and_keys() {
        let root = json!({"grid": [{"a": 1}, {"a": 2}], "map": {"0": "zero"}});
        assert_eq!(lookup(&root, "grid.1.a"), Some(&json!(2)));
        assert_eq!(lookup(&root, "map.0"), Some(&json!("zero")));
        assert_eq!(lookup(&root, "grid.5.a"), None);
        assert_eq!(lookup(&root, ""), Some(&root));
    }
}
