//! Validation of untyped path arguments taken from JSON request bodies.
//!
//! The routing layer hands request fields over as [`serde_json::Value`]s. A
//! wrongly shaped field is an [`GuardError::InvalidPathArgument`] (HTTP 400),
//! kept apart from containment failures (HTTP 403).

use serde_json::Value;
use std::path::PathBuf;

use crate::error::{GuardError, Result};

/// Expect a single non-empty path string.
pub fn path_from_value(value: &Value) -> Result<PathBuf> {
    match value {
        Value::String(s) if s.is_empty() => Err(GuardError::invalid_argument(
            "expected a path string, got an empty string",
        )),
        Value::String(s) => Ok(PathBuf::from(s)),
        other => Err(GuardError::invalid_argument(format!(
            "expected a path string, got {}",
            type_name(other)
        ))),
    }
}

/// Expect an array of path strings. A bare string is rejected rather than
/// treated as a one-element list.
pub fn paths_from_value(value: &Value) -> Result<Vec<PathBuf>> {
    let Value::Array(items) = value else {
        return Err(GuardError::invalid_argument(format!(
            "expected an array of path strings, got {}",
            type_name(value)
        )));
    };

    items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            path_from_value(item).map_err(|_| {
                GuardError::invalid_argument(format!(
                    "expected a path string at index {index}, got {}",
                    type_name(item)
                ))
            })
        })
        .collect()
}

/// Look up `field` in a JSON object and expect a path string there.
pub fn path_field(body: &Value, field: &str) -> Result<PathBuf> {
    match body.get(field) {
        Some(value) => path_from_value(value).map_err(|_| {
            GuardError::invalid_argument(format!(
                "field '{field}' must be a path string, got {}",
                type_name(value)
            ))
        }),
        None => Err(GuardError::invalid_argument(format!(
            "missing required path field '{field}'"
        ))),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(s) if s.is_empty() => "an empty string",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GuardErrorKind;
    use serde_json::json;

    #[test]
    fn accepts_a_string() {
        assert_eq!(
            path_from_value(&json!("/allowed/a.txt")).unwrap(),
            PathBuf::from("/allowed/a.txt")
        );
    }

    #[test]
    fn rejects_non_strings_with_400() {
        for value in [json!(42), json!(null), json!(true), json!({"p": "/x"}), json!("")] {
            let err = path_from_value(&value).unwrap_err();
            assert_eq!(err.kind(), GuardErrorKind::InvalidPathArgument);
            assert_eq!(err.status_code(), 400);
        }
    }

    #[test]
    fn array_of_strings() {
        let paths = paths_from_value(&json!(["a", "/b/c"])).unwrap();
        assert_eq!(paths, vec![PathBuf::from("a"), PathBuf::from("/b/c")]);
        assert!(paths_from_value(&json!([])).unwrap().is_empty());
    }

    #[test]
    fn scalar_where_array_expected_is_rejected() {
        let err = paths_from_value(&json!("/allowed/a.txt")).unwrap_err();
        assert!(err.to_string().contains("got a string"), "got: {err}");
    }

    #[test]
    fn array_reports_offending_index() {
        let err = paths_from_value(&json!(["ok", 7])).unwrap_err();
        assert!(err.to_string().contains("index 1"), "got: {err}");
    }

    #[test]
    fn object_field_lookup() {
        let body = json!({ "filePath": "/data/settings.json", "count": 3 });
        assert_eq!(
            path_field(&body, "filePath").unwrap(),
            PathBuf::from("/data/settings.json")
        );
        assert!(path_field(&body, "count").is_err());
        let missing = path_field(&body, "other").unwrap_err();
        assert!(missing.to_string().contains("missing"), "got: {missing}");
    }
}
