#![deny(missing_docs)]

//! # Metadata Merge
//!
//! Recursive deep merge of nested documentation maps.
//!
//! Documentation metadata is accumulated by applying fragments one after the
//! other. For each leaf key the latest fragment wins; nested maps are merged
//! key by key. A non-map overlay (including `null` and `false`) always
//! replaces the base value outright, which is how inherited documentation is
//! suppressed.

use serde_json::Value;

/// Merges `overlay` on top of `base` and returns the result.
///
/// Neither input is modified.
pub fn merge(base: &Value, overlay: &Value) -> Value {
    let mut result = base.clone();
    merge_into(&mut result, overlay);
    result
}

/// In-place variant of [`merge`].
pub fn merge_into(base: &mut Value, overlay: &Value) {
    let Value::Object(overlay_map) = overlay else {
        *base = overlay.clone();
        return;
    };

    let Value::Object(base_map) = base else {
        *base = overlay.clone();
        return;
    };

    for (key, value) in overlay_map {
        match base_map.get_mut(key) {
            Some(existing) if existing.is_object() && value.is_object() => {
                merge_into(existing, value);
            }
            _ => {
                base_map.insert(key.clone(), value.clone());
            }
        }
    }
}

/// Folds a sequence of fragments from left to right.
pub fn merge_all<'a, I>(fragments: I) -> Value
where
    I: IntoIterator<Item = &'a Value>,
{
    fragments
        .into_iter()
        .fold(Value::Object(Default::default()), |acc, next| {
            merge(&acc, next)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_nested_precedence() {
        let merged = merge(&json!({"a": {"b": 1, "c": 2}}), &json!({"a": {"b": 9}}));
        assert_eq!(merged, json!({"a": {"b": 9, "c": 2}}));
    }

    #[test]
    fn test_idempotent_on_self() {
        let x = json!({"a": {"b": [1, 2]}, "d": "text", "e": null});
        assert_eq!(merge(&x, &x), x);
    }

    #[test]
    fn test_false_and_null_win() {
        let base = json!({"get": {"description": "x"}, "deprecated": true});
        let merged = merge(&base, &json!({"get": false, "deprecated": null}));
        assert_eq!(merged, json!({"get": false, "deprecated": null}));
    }

    #[test]
    fn test_map_replaces_scalar() {
        let merged = merge(&json!({"a": 1}), &json!({"a": {"b": 2}}));
        assert_eq!(merged, json!({"a": {"b": 2}}));
    }

    #[test]
    fn test_lists_are_replaced_not_concatenated() {
        let merged = merge(&json!({"expect": ["A"]}), &json!({"expect": ["B"]}));
        assert_eq!(merged, json!({"expect": ["B"]}));
    }

    #[test]
    fn test_sequential_application_order() {
        let a = json!({"params": {"id": {"in": "path", "description": "first"}}});
        let b = json!({"params": {"id": {"description": "second"}}});
        let c = json!({"params": {"id": {"type": "integer"}}, "id": "op"});

        let sequential = merge(&merge(&a, &b), &c);
        let folded = merge_all([&a, &b, &c]);
        assert_eq!(sequential, folded);
        assert_eq!(
            sequential,
            json!({
                "params": {"id": {"in": "path", "description": "second", "type": "integer"}},
                "id": "op"
            })
        );
    }

    #[test]
    fn test_base_is_not_mutated() {
        let base = json!({"a": {"b": 1}});
        let _ = merge(&base, &json!({"a": {"b": 2}}));
        assert_eq!(base, json!({"a": {"b": 1}}));
    }
}
