//! Shallow merge of configuration documents.
//!
//! The project override replaces default values one top-level key at a time.
//! Nested records are not merged: an override's `build` section replaces the
//! default `build` section as a whole. Fields missing from the replacement are
//! filled from type defaults on deserialization (see `types`).

use serde_json::Value;

/// Merge `overlay` onto `base`, replacing whole top-level values.
///
/// - Both objects: each key of `overlay` replaces the same key of `base`
/// - A null overlay value means "not specified" and keeps the base value
/// - Any other overlay replaces `base` entirely
///
/// # Example
/// ```
/// use serde_json::json;
/// use pages_pipeline::config::shallow_merge;
///
/// let base = json!({ "port": 2000, "build": { "src": "src", "dist": "dist" } });
/// let overlay = json!({ "build": { "src": "app" } });
/// let result = shallow_merge(base, overlay);
/// assert_eq!(result, json!({ "port": 2000, "build": { "src": "app" } }));
/// ```
pub fn shallow_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut base_map), Value::Object(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                if !overlay_value.is_null() {
                    base_map.insert(key, overlay_value);
                }
            }
            Value::Object(base_map)
        }
        (base, Value::Null) => base,
        (_, overlay) => overlay,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_merge_simple_objects() {
        let base = json!({"a": 1, "b": 2});
        let overlay = json!({"b": 3, "c": 4});
        let result = shallow_merge(base, overlay);
        assert_eq!(result, json!({"a": 1, "b": 3, "c": 4}));
    }

    #[test]
    fn test_nested_objects_replaced_wholesale() {
        let base = json!({
            "build": {
                "src": "src",
                "paths": {"style": "a/*.scss", "script": "b/*.js"}
            },
            "port": 2000
        });
        let overlay = json!({
            "build": {"paths": {"style": "styles/*.scss"}}
        });
        let result = shallow_merge(base, overlay);
        assert_eq!(
            result,
            json!({
                "build": {"paths": {"style": "styles/*.scss"}},
                "port": 2000
            })
        );
    }

    #[test]
    fn test_arrays_replaced_not_merged() {
        let base = json!({"items": [1, 2, 3]});
        let overlay = json!({"items": [4, 5]});
        let result = shallow_merge(base, overlay);
        assert_eq!(result, json!({"items": [4, 5]}));
    }

    #[test]
    fn test_null_preserves_base() {
        let base = json!({"a": 1, "b": {"c": 2}});
        let overlay = json!({"a": null});
        let result = shallow_merge(base, overlay);
        assert_eq!(result, json!({"a": 1, "b": {"c": 2}}));
    }

    #[test]
    fn test_null_overlay_document_preserves_base() {
        let base = json!({"a": 1});
        assert_eq!(shallow_merge(base.clone(), Value::Null), base);
    }

    #[test]
    fn test_unknown_keys_are_carried() {
        let base = json!({"port": 2000});
        let overlay = json!({"extra": true});
        let result = shallow_merge(base, overlay);
        assert_eq!(result, json!({"port": 2000, "extra": true}));
    }
}
