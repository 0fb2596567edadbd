//! Document helpers
//!
//! Documents coming off the data channel are dynamically shaped JSON values
//! with no fixed schema. This module provides the two pure operations the
//! pipeline needs over them: dot-path lookup (used to extract the
//! incremental-fetching value from the last written row) and a filtering
//! projection that removes configured keys before a document reaches the
//! writer.

use crate::domain::{Result, StrataError};
use serde_json::Value;

/// Look up a value in a document by a dot-separated field path.
///
/// `"user.address.city"` resolves through nested objects. Failures are
/// user errors since the path comes from the configuration:
/// a missing key, or an intermediate node that is not an object.
pub fn value_at_path<'a>(document: &'a Value, path: &str) -> Result<&'a Value> {
    let mut current = document;
    for segment in path.split('.') {
        let object = current.as_object().ok_or_else(|| {
            StrataError::FieldPath(format!(
                "Cannot resolve \"{path}\": \"{segment}\" is not reachable, \
                 an intermediate value is not an object."
            ))
        })?;
        current = object.get(segment).ok_or_else(|| {
            StrataError::FieldPath(format!(
                "Cannot resolve \"{path}\": key \"{segment}\" not found in the document."
            ))
        })?;
    }
    Ok(current)
}

/// Remove ignored top-level keys from a document.
///
/// Used to drop store-generated metadata (`_rid`, `_etag`, ...) before the
/// document is written. Pure projection: non-object documents pass through
/// unchanged.
pub fn strip_ignored_keys(mut document: Value, ignored_keys: &[String]) -> Value {
    if let Some(object) = document.as_object_mut() {
        for key in ignored_keys {
            object.remove(key);
        }
    }
    document
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_value_at_path_top_level() {
        let doc = json!({"id": "123", "name": "test"});
        assert_eq!(value_at_path(&doc, "id").unwrap(), &json!("123"));
    }

    #[test]
    fn test_value_at_path_nested() {
        let doc = json!({"user": {"address": {"city": "Prague"}}});
        assert_eq!(
            value_at_path(&doc, "user.address.city").unwrap(),
            &json!("Prague")
        );
    }

    #[test]
    fn test_value_at_path_missing_key_is_user_error() {
        let doc = json!({"id": "123"});
        let err = value_at_path(&doc, "missing").unwrap_err();
        assert!(err.is_user_error());
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_value_at_path_through_scalar_is_user_error() {
        let doc = json!({"id": "123"});
        let err = value_at_path(&doc, "id.nested").unwrap_err();
        assert!(err.is_user_error());
        assert!(err.to_string().contains("not an object"));
    }

    #[test]
    fn test_strip_ignored_keys() {
        let doc = json!({"id": "1", "_rid": "x", "_etag": "y", "data": 42});
        let stripped = strip_ignored_keys(doc, &["_rid".to_string(), "_etag".to_string()]);
        assert_eq!(stripped, json!({"id": "1", "data": 42}));
    }

    #[test]
    fn test_strip_ignored_keys_absent_keys_are_noops() {
        let doc = json!({"id": "1"});
        let stripped = strip_ignored_keys(doc.clone(), &["_ts".to_string()]);
        assert_eq!(stripped, doc);
    }

    #[test]
    fn test_strip_ignored_keys_non_object() {
        let doc = json!([1, 2, 3]);
        let stripped = strip_ignored_keys(doc.clone(), &["_rid".to_string()]);
        assert_eq!(stripped, doc);
    }
}
