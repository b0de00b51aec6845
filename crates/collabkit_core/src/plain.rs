//! Plain-tree backend.
//!
//! Patches an owned [`Value`] in place so that every subtree the delta does not
//! touch keeps its allocation. A UI layer that memoizes on node identity only
//! re-renders the branches that actually changed.
//!
//! ```
//! use collabkit_core::plain::deep_patch;
//! use serde_json::json;
//!
//! let mut state = json!({ "todos": [{ "title": "a" }, { "title": "b" }] });
//! let first = &state["todos"][0] as *const _;
//!
//! deep_patch(&mut state, json!({ "todos": [{ "title": "a" }, { "title": "c" }] })).unwrap();
//!
//! assert_eq!(state["todos"][1]["title"], "c");
//! assert!(std::ptr::eq(first, &state["todos"][0]));
//! ```

use indexmap::IndexMap;
use serde_json::Map;

use crate::coordinator::{PatchOutcome, plan};
use crate::delta::Delta;
use crate::error::{CollabError, Result};
use crate::patch::apply_delta;
use crate::path::Path;
use crate::value::{NodeKind, Template, Value, normalize, normalize_container};

/// Apply `delta` to `tree` in place.
pub fn patch_plain(tree: &mut Value, delta: Delta) -> Result<()> {
    apply_delta(tree, delta)
}

/// Make `target` deep-equal to `new_state`, preserving unchanged subtrees.
///
/// `new_state` is normalized first; it must be a container of the same kind
/// as `target`.
pub fn deep_patch(target: &mut Value, new_state: impl Into<Template>) -> Result<PatchOutcome> {
    let new_state = normalize_container(new_state)?;
    patch_towards(target, &new_state)
}

/// Merge `update` into the object `target`.
///
/// Keys absent from `update` are left alone, keys set to
/// [`Template::Undefined`] or an unsupported value are removed, nested objects
/// are merged recursively, and any other value (arrays included) replaces what
/// was there. Reference identity is preserved exactly as in [`deep_patch`].
pub fn deep_merge(target: &mut Value, update: impl Into<Template>) -> Result<PatchOutcome> {
    let update = match update.into() {
        Template::Object(fields) => fields,
        other => {
            return Err(CollabError::ShapeMismatch {
                path: Path::root().to_string(),
                old: NodeKind::of(target),
                new: template_kind(&other),
            });
        }
    };
    let Value::Object(current) = &*target else {
        return Err(CollabError::ShapeMismatch {
            path: Path::root().to_string(),
            old: NodeKind::of(target),
            new: NodeKind::Object,
        });
    };

    let mut desired = current.clone();
    overlay(&mut desired, update);
    patch_towards(target, &Value::Object(desired))
}

fn overlay(target: &mut Map<String, Value>, update: IndexMap<String, Template>) {
    for (key, field) in update {
        match field {
            Template::Undefined | Template::Unsupported(_) => {
                target.shift_remove(&key);
            }
            Template::Object(fields) if matches!(target.get(&key), Some(Value::Object(_))) => {
                if let Some(Value::Object(inner)) = target.get_mut(&key) {
                    overlay(inner, fields);
                }
            }
            other => match normalize(other) {
                Ok(value) => {
                    target.insert(key, value);
                }
                Err(_) => {
                    target.shift_remove(&key);
                }
            },
        }
    }
}

fn patch_towards(target: &mut Value, new_state: &Value) -> Result<PatchOutcome> {
    let Some(delta) = plan(target, new_state)? else {
        log::debug!("plain patch skipped, target already matches");
        return Ok(PatchOutcome::Unchanged);
    };
    let operations = delta.operation_count();
    patch_plain(target, delta)?;
    Ok(PatchOutcome::Applied { operations })
}

fn template_kind(template: &Template) -> NodeKind {
    match template {
        Template::Array(_) => NodeKind::Array,
        Template::Object(_) => NodeKind::Object,
        Template::Bool(_) => NodeKind::Boolean,
        Template::Number(_) => NodeKind::Number,
        Template::String(_) => NodeKind::String,
        Template::Null | Template::Undefined | Template::Unsupported(_) => NodeKind::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::diff;
    use serde_json::json;

    fn address(value: &Value) -> *const Value {
        value as *const Value
    }

    #[test]
    fn test_deep_equal_target_keeps_original_child() {
        let mut tree = json!({ "deep": { "a": 1 } });
        let before = address(&tree["deep"]);
        let target = json!({ "deep": { "a": 1 } });

        let outcome = deep_patch(&mut tree, target.clone()).unwrap();

        assert_eq!(outcome, PatchOutcome::Unchanged);
        assert!(std::ptr::eq(before, &tree["deep"]));
        assert!(!std::ptr::eq(&tree["deep"], &target["deep"]));
    }

    #[test]
    fn test_unchanged_siblings_keep_their_storage() {
        let mut tree = json!({
            "stable": { "items": [1, 2, 3] },
            "changing": { "n": 1 },
            "list": [{ "id": 1 }, { "id": 2 }, { "id": 3 }]
        });
        let stable_items = tree["stable"]["items"].as_array().unwrap().as_ptr();
        let third = tree["list"][2]["id"].clone();

        let outcome = deep_patch(
            &mut tree,
            json!({
                "stable": { "items": [1, 2, 3] },
                "changing": { "n": 2 },
                "list": [{ "id": 1 }, { "id": 3 }]
            }),
        )
        .unwrap();

        assert!(matches!(outcome, PatchOutcome::Applied { .. }));
        assert_eq!(tree["stable"]["items"].as_array().unwrap().as_ptr(), stable_items);
        assert_eq!(tree["changing"]["n"], 2);
        assert_eq!(tree["list"], json!([{ "id": 1 }, { "id": 3 }]));
        assert_eq!(tree["list"][1]["id"], third);
    }

    #[test]
    fn test_patch_plain_round_trip() {
        let old = json!({ "a": [1, 2, { "b": "c" }], "d": true });
        let new = json!({ "a": [2, { "b": "e" }, 4], "f": null });
        let mut tree = old.clone();
        patch_plain(&mut tree, diff(&old, &new).unwrap()).unwrap();
        assert_eq!(tree, new);
    }

    #[test]
    fn test_deep_patch_normalizes_new_state() {
        let mut tree = json!([1, 2]);
        let template = Template::Array(vec![
            Template::from(1i64),
            Template::Undefined,
            Template::from(3i64),
        ]);
        deep_patch(&mut tree, template).unwrap();
        assert_eq!(tree, json!([1, 3]));
    }

    #[test]
    fn test_deep_patch_rejects_kind_change() {
        let mut tree = json!([1]);
        assert!(matches!(
            deep_patch(&mut tree, json!({ "a": 1 })),
            Err(CollabError::ShapeMismatch { .. })
        ));
        assert_eq!(tree, json!([1]));
    }

    #[test]
    fn test_deep_merge() {
        let mut tree = json!({
            "keep": { "x": 1 },
            "nested": { "a": 1, "b": [1, 2] },
            "drop": "me",
            "list": [1, 2, 3]
        });
        let keep = address(&tree["keep"]["x"]);

        let update: Template = [
            ("nested".to_string(), Template::from(json!({ "b": [2], "c": 3 }))),
            ("drop".to_string(), Template::Undefined),
            ("list".to_string(), Template::from(json!([3]))),
            ("new".to_string(), Template::from("value")),
        ]
        .into_iter()
        .collect();

        deep_merge(&mut tree, update).unwrap();

        assert_eq!(
            tree,
            json!({
                "keep": { "x": 1 },
                "nested": { "a": 1, "b": [2], "c": 3 },
                "list": [3],
                "new": "value"
            })
        );
        assert!(std::ptr::eq(keep, &tree["keep"]["x"]));
    }

    #[test]
    fn test_deep_merge_requires_objects() {
        let mut tree = json!([]);
        assert!(deep_merge(&mut tree, json!({})).is_err());
        let mut tree = json!({});
        assert!(deep_merge(&mut tree, json!([1])).is_err());
    }
}
