//! Tree differ.
//!
//! [`diff`] compares two containers of the same kind and produces the
//! [`Delta`] that turns the first into the second. Objects are compared key by
//! key; arrays are aligned on their longest common subsequence. Containers of
//! the same kind found at the same position are diffed recursively instead of
//! being replaced.

use crate::delta::{ArrayOperation, Delta, ObjectOperation};
use crate::error::{CollabError, Result};
use crate::hash::HashMemo;
use crate::lcs::longest_common_subsequence;
use crate::path::Path;
use crate::value::{NodeKind, Value};
use serde_json::Map;

/// Compute the delta from `old` to `new`.
///
/// Both roots must be arrays or both must be objects; anything else is a
/// [`CollabError::ShapeMismatch`]. Deep-equal inputs yield
/// [`Delta::NoDifference`].
pub fn diff(old: &Value, new: &Value) -> Result<Delta> {
    if std::ptr::eq(old, new) {
        return Ok(Delta::NoDifference);
    }
    let mut memo = HashMemo::new();
    match (old, new) {
        (Value::Array(old_items), Value::Array(new_items)) => {
            Ok(diff_arrays(old_items, new_items, &mut memo))
        }
        (Value::Object(old_map), Value::Object(new_map)) => {
            Ok(diff_objects(old_map, new_map, &mut memo))
        }
        _ => Err(CollabError::ShapeMismatch {
            path: Path::root().to_string(),
            old: NodeKind::of(old),
            new: NodeKind::of(new),
        }),
    }
}

/// Diff one position. `None` means the values cannot be patched in place and
/// the new value must be substituted.
fn diff_children<'a>(old: &'a Value, new: &'a Value, memo: &mut HashMemo<'a>) -> Option<Delta> {
    match (old, new) {
        (Value::Array(old_items), Value::Array(new_items)) => {
            Some(diff_arrays(old_items, new_items, memo))
        }
        (Value::Object(old_map), Value::Object(new_map)) => {
            Some(diff_objects(old_map, new_map, memo))
        }
        _ => None,
    }
}

fn diff_objects<'a>(
    old: &'a Map<String, Value>,
    new: &'a Map<String, Value>,
    memo: &mut HashMemo<'a>,
) -> Delta {
    let mut operations = Vec::new();

    for key in old.keys() {
        if !new.contains_key(key) {
            operations.push(ObjectOperation::Deletion { key: key.clone() });
        }
    }

    for (key, new_value) in new {
        let Some(old_value) = old.get(key) else {
            operations.push(ObjectOperation::Insertion {
                key: key.clone(),
                value: new_value.clone(),
            });
            continue;
        };
        if memo.matches(old_value, new_value) {
            continue;
        }
        match diff_children(old_value, new_value, memo) {
            Some(delta) if !delta.is_empty() => operations.push(ObjectOperation::Nested {
                key: key.clone(),
                delta,
            }),
            Some(_) => {}
            None => operations.push(ObjectOperation::Substitution {
                key: key.clone(),
                value: new_value.clone(),
            }),
        }
    }

    Delta::object(operations)
}

fn diff_arrays<'a>(old: &'a [Value], new: &'a [Value], memo: &mut HashMemo<'a>) -> Delta {
    let lcs = longest_common_subsequence(old, new, memo);

    let mut deletions: Vec<(usize, usize)> = Vec::new();
    let mut insertions: Vec<(usize, Vec<Value>)> = Vec::new();
    let mut substitutions = Vec::new();
    let mut nested = Vec::new();

    let (mut old_idx, mut new_idx, mut lcs_idx) = (0, 0, 0);
    while old_idx < old.len() || new_idx < new.len() {
        if old_idx == old.len() {
            insertions.push((new_idx, new[new_idx..].to_vec()));
            break;
        }
        if new_idx == new.len() {
            deletions.push((old_idx, old.len() - old_idx));
            break;
        }

        let old_value = &old[old_idx];
        let new_value = &new[new_idx];
        let (old_on_lcs, new_on_lcs) = match lcs.get(lcs_idx).copied() {
            Some(common) => (memo.matches(old_value, common), memo.matches(new_value, common)),
            None => (false, false),
        };

        match (old_on_lcs, new_on_lcs) {
            (false, true) => {
                deletions.push((old_idx, 1));
                old_idx += 1;
            }
            (true, false) => {
                insertions.push((new_idx, vec![new_value.clone()]));
                new_idx += 1;
            }
            (true, true) => {
                old_idx += 1;
                new_idx += 1;
                lcs_idx += 1;
            }
            (false, false) => {
                // Both elements fall between the same pair of common elements:
                // pair them up and keep the LCS cursor where it is.
                if !memo.matches(old_value, new_value) {
                    match diff_children(old_value, new_value, memo) {
                        Some(delta) if !delta.is_empty() => nested.push(ArrayOperation::Nested {
                            index: new_idx,
                            delta,
                        }),
                        Some(_) => {}
                        None => substitutions.push(ArrayOperation::Substitution {
                            index: new_idx,
                            value: new_value.clone(),
                        }),
                    }
                }
                old_idx += 1;
                new_idx += 1;
            }
        }
    }

    let mut operations = coalesce_deletions(deletions);
    operations.extend(coalesce_insertions(insertions));
    operations.extend(substitutions);
    operations.extend(nested);
    Delta::array(operations)
}

/// Merge runs of adjacent deletions and order them from the highest index down,
/// so each removal leaves the positions of the remaining ones intact.
fn coalesce_deletions(deletions: Vec<(usize, usize)>) -> Vec<ArrayOperation> {
    let mut runs: Vec<(usize, usize)> = Vec::with_capacity(deletions.len());
    for (index, count) in deletions {
        match runs.last_mut() {
            Some((start, run)) if *start + *run == index => *run += count,
            _ => runs.push((index, count)),
        }
    }
    runs.into_iter()
        .rev()
        .map(|(index, count)| ArrayOperation::Deletion { index, count })
        .collect()
}

fn coalesce_insertions(insertions: Vec<(usize, Vec<Value>)>) -> Vec<ArrayOperation> {
    let mut runs: Vec<(usize, Vec<Value>)> = Vec::with_capacity(insertions.len());
    for (index, values) in insertions {
        match runs.last_mut() {
            Some((start, run)) if *start + run.len() == index => run.extend(values),
            _ => runs.push((index, values)),
        }
    }
    runs.into_iter()
        .map(|(index, values)| ArrayOperation::Insertion { index, values })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_equal_objects_have_no_difference() {
        let old = json!({ "a": 1, "b": { "a": 1, "b": 2 } });
        let new = json!({ "a": 1, "b": { "a": 1, "b": 2 } });
        assert_eq!(diff(&old, &new).unwrap(), Delta::NoDifference);
        assert_eq!(diff(&old, &old).unwrap(), Delta::NoDifference);
    }

    #[test]
    fn test_removed_key() {
        let delta = diff(&json!({ "a": true }), &json!({})).unwrap();
        assert_eq!(
            delta,
            Delta::Object(vec![ObjectOperation::Deletion {
                key: "a".to_string()
            }])
        );
    }

    #[test]
    fn test_object_operations() {
        let old = json!({ "gone": 1, "same": [1], "changed": "x", "deep": { "k": 1, "j": 2 } });
        let new = json!({ "same": [1], "changed": 5, "deep": { "k": 2, "j": 2 }, "added": null });
        let delta = diff(&old, &new).unwrap();
        assert_eq!(
            delta,
            Delta::Object(vec![
                ObjectOperation::Deletion {
                    key: "gone".to_string()
                },
                ObjectOperation::Substitution {
                    key: "changed".to_string(),
                    value: json!(5),
                },
                ObjectOperation::Nested {
                    key: "deep".to_string(),
                    delta: Delta::Object(vec![ObjectOperation::Substitution {
                        key: "k".to_string(),
                        value: json!(2),
                    }]),
                },
                ObjectOperation::Insertion {
                    key: "added".to_string(),
                    value: json!(null),
                },
            ])
        );
    }

    #[test]
    fn test_container_kind_change_is_substitution() {
        let delta = diff(&json!({ "k": [1] }), &json!({ "k": { "0": 1 } })).unwrap();
        assert_eq!(
            delta,
            Delta::Object(vec![ObjectOperation::Substitution {
                key: "k".to_string(),
                value: json!({ "0": 1 }),
            }])
        );
    }

    #[test]
    fn test_changed_tail_element() {
        let delta = diff(&json!([1, 2, 4]), &json!([1, 2, 3])).unwrap();
        assert_eq!(
            delta,
            Delta::Array(vec![ArrayOperation::Substitution {
                index: 2,
                value: json!(3),
            }])
        );
    }

    #[test]
    fn test_clearing_array_is_one_deletion() {
        let delta = diff(&json!([1, 1]), &json!([])).unwrap();
        assert_eq!(
            delta,
            Delta::Array(vec![ArrayOperation::Deletion { index: 0, count: 2 }])
        );
    }

    #[test]
    fn test_filling_array_is_one_insertion() {
        let delta = diff(&json!([]), &json!([1, 2, 3])).unwrap();
        assert_eq!(
            delta,
            Delta::Array(vec![ArrayOperation::Insertion {
                index: 0,
                values: vec![json!(1), json!(2), json!(3)],
            }])
        );
    }

    #[test]
    fn test_array_runs_are_coalesced_and_ordered() {
        let old = json!([0, "a", "b", 1, "c", 2]);
        let new = json!(["x", "y", 0, 1, 2, "z"]);
        let delta = diff(&old, &new).unwrap();
        assert_eq!(
            delta,
            Delta::Array(vec![
                ArrayOperation::Deletion { index: 4, count: 1 },
                ArrayOperation::Deletion { index: 1, count: 2 },
                ArrayOperation::Insertion {
                    index: 0,
                    values: vec![json!("x"), json!("y")],
                },
                ArrayOperation::Insertion {
                    index: 5,
                    values: vec![json!("z")],
                },
            ])
        );
    }

    #[test]
    fn test_array_element_recursion() {
        let old = json!([{ "id": 1, "tags": ["a"] }, "keep"]);
        let new = json!([{ "id": 1, "tags": ["a", "b"] }, "keep"]);
        let delta = diff(&old, &new).unwrap();
        assert_eq!(
            delta,
            Delta::Array(vec![ArrayOperation::Nested {
                index: 0,
                delta: Delta::Object(vec![ObjectOperation::Nested {
                    key: "tags".to_string(),
                    delta: Delta::Array(vec![ArrayOperation::Insertion {
                        index: 1,
                        values: vec![json!("b")],
                    }]),
                }]),
            }])
        );
    }

    #[test]
    fn test_reordered_keys_are_equal() {
        let old = json!({ "a": { "x": 1, "y": 2 } });
        let new = json!({ "a": { "y": 2, "x": 1 } });
        assert!(diff(&old, &new).unwrap().is_empty());
    }

    #[test]
    fn test_move_is_delete_and_insert() {
        let delta = diff(&json!(["a", "b", "c"]), &json!(["c", "a", "b"])).unwrap();
        assert_eq!(
            delta,
            Delta::Array(vec![
                ArrayOperation::Deletion { index: 2, count: 1 },
                ArrayOperation::Insertion {
                    index: 0,
                    values: vec![json!("c")],
                },
            ])
        );
    }

    #[test]
    fn test_shape_mismatch() {
        let err = diff(&json!([]), &json!({})).unwrap_err();
        assert!(matches!(
            err,
            CollabError::ShapeMismatch {
                old: NodeKind::Array,
                new: NodeKind::Object,
                ..
            }
        ));
        assert!(diff(&json!(1), &json!(1)).is_err());
    }
}
