//! Dotted field lookup

use std::borrow::Cow;

use serde_json::Value;

/// Resolve `path` against `doc`, descending one object field per `.` segment
///
/// Returns `None` when a segment is missing or an intermediate value is not
/// an object. Arrays are not indexed.
pub fn lookup<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .try_fold(doc, |value, segment| value.as_object()?.get(segment))
}

/// Render a resolved value in its natural string form
pub fn render(value: Option<&Value>) -> Cow<'_, str> {
    match value {
        None => Cow::Borrowed(""),
        Some(Value::String(s)) => Cow::Borrowed(s.as_str()),
        Some(Value::Null) => Cow::Borrowed("null"),
        Some(Value::Bool(b)) => Cow::Borrowed(if *b { "true" } else { "false" }),
        Some(Value::Number(n)) => Cow::Owned(n.to_string()),
        Some(other) => Cow::Owned(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_lookup_nested() {
        let doc = json!({"a": {"b": {"c": 1}}});
        assert_eq!(lookup(&doc, "a.b.c"), Some(&json!(1)));
        assert_eq!(lookup(&doc, "a.x"), None);
    }

    #[test]
    fn test_lookup_through_non_object() {
        let doc = json!({"a": [1, 2], "s": "str"});
        assert_eq!(lookup(&doc, "a.0"), None);
        assert_eq!(lookup(&doc, "s.len"), None);
    }

    #[test]
    fn test_render_container_as_json() {
        let doc = json!({"o": {"k": "v"}});
        assert_eq!(render(lookup(&doc, "o")), r#"{"k":"v"}"#);
    }
}
