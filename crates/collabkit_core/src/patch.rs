//! Applying a [`Delta`] to a live tree.
//!
//! Both backends implement [`MutableTree`], a handful of key/index-addressed
//! mutations plus navigation to a child container. [`apply_delta`] is the one
//! traversal that walks a delta over any such tree. It checks every node's
//! kind and every index against the live tree before mutating, and reports
//! the tree path of the first disagreement.

use crate::delta::{ArrayOperation, Delta, ObjectOperation};
use crate::error::{CollabError, Result};
use crate::path::{Path, Segment};
use crate::value::{NodeKind, Value};

/// The mutation capability a tree must offer to be patched.
///
/// Object methods are only called on object nodes and array methods only on
/// array nodes. Errors carry paths relative to the node (`$` is the node
/// itself); [`apply_delta`] re-anchors them.
pub trait MutableTree {
    /// Kind of this node.
    fn kind(&self) -> NodeKind;

    /// Number of elements or keys. Zero for primitives.
    fn len(&self) -> usize;

    /// Whether [`MutableTree::len`] is zero.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Kind of the child at `segment`, failing if there is no such child.
    fn child_kind(&self, segment: &Segment) -> Result<NodeKind>;

    /// Mutable handle to the container at `segment`.
    fn child(&mut self, segment: &Segment) -> Result<Box<dyn MutableTree + '_>>;

    /// Assign `value` to `key`, taking ownership of it.
    fn set(&mut self, key: &str, value: Value) -> Result<()>;

    /// Remove `key` if present.
    fn remove(&mut self, key: &str) -> Result<()>;

    /// Insert `values` so the first lands at `index`.
    fn insert(&mut self, index: usize, values: Vec<Value>) -> Result<()>;

    /// Remove `count` elements starting at `index`.
    fn remove_range(&mut self, index: usize, count: usize) -> Result<()>;

    /// Replace the element at `index`.
    fn replace(&mut self, index: usize, value: Value) -> Result<()> {
        self.remove_range(index, 1)?;
        self.insert(index, vec![value])
    }

    /// Snapshot of the node as a plain value.
    fn to_value(&self) -> Result<Value>;
}

impl<T: MutableTree + ?Sized> MutableTree for &mut T {
    fn kind(&self) -> NodeKind {
        (**self).kind()
    }

    fn len(&self) -> usize {
        (**self).len()
    }

    fn child_kind(&self, segment: &Segment) -> Result<NodeKind> {
        (**self).child_kind(segment)
    }

    fn child(&mut self, segment: &Segment) -> Result<Box<dyn MutableTree + '_>> {
        (**self).child(segment)
    }

    fn set(&mut self, key: &str, value: Value) -> Result<()> {
        (**self).set(key, value)
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        (**self).remove(key)
    }

    fn insert(&mut self, index: usize, values: Vec<Value>) -> Result<()> {
        (**self).insert(index, values)
    }

    fn remove_range(&mut self, index: usize, count: usize) -> Result<()> {
        (**self).remove_range(index, count)
    }

    fn replace(&mut self, index: usize, value: Value) -> Result<()> {
        (**self).replace(index, value)
    }

    fn to_value(&self) -> Result<Value> {
        (**self).to_value()
    }
}

/// Plain trees are patched in place. Inserted and substituted values are moved
/// into the tree; every other node keeps its allocation.
impl MutableTree for Value {
    fn kind(&self) -> NodeKind {
        NodeKind::of(self)
    }

    fn len(&self) -> usize {
        match self {
            Value::Array(items) => items.len(),
            Value::Object(map) => map.len(),
            _ => 0,
        }
    }

    fn child_kind(&self, segment: &Segment) -> Result<NodeKind> {
        match (self, segment) {
            (Value::Object(map), Segment::Key(key)) => map
                .get(key)
                .map(NodeKind::of)
                .ok_or_else(|| missing_key(key)),
            (Value::Array(items), Segment::Index(index)) => items
                .get(*index)
                .map(NodeKind::of)
                .ok_or_else(|| out_of_bounds(*index, items.len())),
            (node, segment) => Err(segment_mismatch(segment, NodeKind::of(node))),
        }
    }

    fn child(&mut self, segment: &Segment) -> Result<Box<dyn MutableTree + '_>> {
        self.child_kind(segment)?;
        let found = NodeKind::of(self);
        let child = match (self, segment) {
            (Value::Object(map), Segment::Key(key)) => map.get_mut(key),
            (Value::Array(items), Segment::Index(index)) => items.get_mut(*index),
            _ => None,
        };
        match child {
            Some(child) => Ok(Box::new(child)),
            None => Err(segment_mismatch(segment, found)),
        }
    }

    fn set(&mut self, key: &str, value: Value) -> Result<()> {
        match self {
            Value::Object(map) => {
                map.insert(key.to_string(), value);
                Ok(())
            }
            other => Err(shape_mismatch(NodeKind::Object, NodeKind::of(other))),
        }
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        match self {
            Value::Object(map) => {
                map.shift_remove(key);
                Ok(())
            }
            other => Err(shape_mismatch(NodeKind::Object, NodeKind::of(other))),
        }
    }

    fn insert(&mut self, index: usize, values: Vec<Value>) -> Result<()> {
        match self {
            Value::Array(items) if index <= items.len() => {
                items.splice(index..index, values);
                Ok(())
            }
            Value::Array(items) => Err(out_of_bounds(index, items.len())),
            other => Err(shape_mismatch(NodeKind::Array, NodeKind::of(other))),
        }
    }

    fn remove_range(&mut self, index: usize, count: usize) -> Result<()> {
        match self {
            Value::Array(items) => {
                let end = checked_end(index, count, items.len())?;
                items.drain(index..end);
                Ok(())
            }
            other => Err(shape_mismatch(NodeKind::Array, NodeKind::of(other))),
        }
    }

    fn replace(&mut self, index: usize, value: Value) -> Result<()> {
        match self {
            Value::Array(items) => {
                let len = items.len();
                let slot = items.get_mut(index).ok_or_else(|| out_of_bounds(index, len))?;
                *slot = value;
                Ok(())
            }
            other => Err(shape_mismatch(NodeKind::Array, NodeKind::of(other))),
        }
    }

    fn to_value(&self) -> Result<Value> {
        Ok(self.clone())
    }
}

pub(crate) fn shape_mismatch(expected: NodeKind, found: NodeKind) -> CollabError {
    CollabError::PatchShapeMismatch {
        path: Path::root().to_string(),
        expected,
        found,
    }
}

pub(crate) fn segment_mismatch(segment: &Segment, found: NodeKind) -> CollabError {
    let expected = match segment {
        Segment::Key(_) => NodeKind::Object,
        Segment::Index(_) => NodeKind::Array,
    };
    shape_mismatch(expected, found)
}

pub(crate) fn out_of_bounds(index: usize, len: usize) -> CollabError {
    CollabError::PatchOutOfBounds {
        path: Path::root().to_string(),
        index,
        len,
    }
}

pub(crate) fn missing_key(key: &str) -> CollabError {
    CollabError::PatchMissingKey {
        path: Path::root().to_string(),
        key: key.to_string(),
    }
}

/// End of the range `index..index + count`, which must lie within `len`.
pub(crate) fn checked_end(index: usize, count: usize, len: usize) -> Result<usize> {
    match index.checked_add(count) {
        Some(end) if end <= len => Ok(end),
        _ => Err(out_of_bounds(index.saturating_add(count).saturating_sub(1), len)),
    }
}

/// Apply `delta` to `tree` in place.
///
/// Fails with [`CollabError::PatchShapeMismatch`],
/// [`CollabError::PatchOutOfBounds`] or [`CollabError::PatchMissingKey`] when
/// the tree no longer has the shape the delta was computed against. Operations
/// before the failing one have already been applied.
pub fn apply_delta(tree: &mut dyn MutableTree, delta: Delta) -> Result<()> {
    let mut path = Path::root();
    apply_at(tree, delta, &mut path)
}

fn apply_at(tree: &mut dyn MutableTree, delta: Delta, path: &mut Path) -> Result<()> {
    let Some(expected) = delta.kind() else {
        return Ok(());
    };
    let found = tree.kind();
    if found != expected {
        return Err(CollabError::PatchShapeMismatch {
            path: path.to_string(),
            expected,
            found,
        });
    }

    match delta {
        Delta::NoDifference => Ok(()),
        Delta::Array(operations) => {
            for operation in operations {
                apply_array_operation(tree, operation, path)?;
            }
            Ok(())
        }
        Delta::Object(operations) => {
            for operation in operations {
                apply_object_operation(tree, operation, path)?;
            }
            Ok(())
        }
    }
}

fn apply_array_operation(
    tree: &mut dyn MutableTree,
    operation: ArrayOperation,
    path: &mut Path,
) -> Result<()> {
    let len = tree.len();
    let bounds = |index: usize, valid: bool| {
        if valid {
            Ok(())
        } else {
            Err(CollabError::PatchOutOfBounds {
                path: path.to_string(),
                index,
                len,
            })
        }
    };

    match operation {
        ArrayOperation::Insertion { index, values } => {
            bounds(index, index <= len)?;
            tree.insert(index, values).map_err(|e| e.rebased(path))
        }
        ArrayOperation::Deletion { index, count } => {
            checked_end(index, count, len).map_err(|e| e.rebased(path))?;
            tree.remove_range(index, count).map_err(|e| e.rebased(path))
        }
        ArrayOperation::Substitution { index, value } => {
            bounds(index, index < len)?;
            tree.replace(index, value).map_err(|e| e.rebased(path))
        }
        ArrayOperation::Nested { index, delta } => {
            bounds(index, index < len)?;
            descend(tree, Segment::Index(index), delta, path)
        }
    }
}

fn apply_object_operation(
    tree: &mut dyn MutableTree,
    operation: ObjectOperation,
    path: &mut Path,
) -> Result<()> {
    match operation {
        ObjectOperation::Insertion { key, value } | ObjectOperation::Substitution { key, value } => {
            tree.set(&key, value).map_err(|e| e.rebased(path))
        }
        ObjectOperation::Deletion { key } => tree.remove(&key).map_err(|e| e.rebased(path)),
        ObjectOperation::Nested { key, delta } => descend(tree, Segment::Key(key), delta, path),
    }
}

fn descend(
    tree: &mut dyn MutableTree,
    segment: Segment,
    delta: Delta,
    path: &mut Path,
) -> Result<()> {
    let Some(expected) = delta.kind() else {
        return Ok(());
    };
    let found = tree.child_kind(&segment).map_err(|e| e.rebased(path))?;
    if found != expected {
        path.push(segment);
        let err = CollabError::PatchShapeMismatch {
            path: path.to_string(),
            expected,
            found,
        };
        path.pop();
        return Err(err);
    }
    let mut child = tree.child(&segment).map_err(|e| e.rebased(path))?;

    path.push(segment);
    let result = apply_at(child.as_mut(), delta, path);
    path.pop();
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_value_mutations() {
        let mut tree = json!({ "a": 1, "b": 2, "c": 3 });
        tree.set("d", json!(4)).unwrap();
        tree.remove("b").unwrap();
        tree.set("a", json!(0)).unwrap();
        tree.remove("missing").unwrap();
        assert_eq!(serde_json::to_string(&tree).unwrap(), r#"{"a":0,"c":3,"d":4}"#);

        let mut list = json!([1, 2, 3]);
        list.insert(1, vec![json!("x"), json!("y")]).unwrap();
        list.remove_range(3, 2).unwrap();
        list.replace(0, json!(true)).unwrap();
        assert_eq!(list, json!([true, "x", "y"]));
        assert!(list.remove_range(2, 2).is_err());
    }

    #[test]
    fn test_apply_nested_delta() {
        let mut tree = json!({ "list": [{ "n": 1 }, { "n": 2 }] });
        let delta = Delta::Object(vec![ObjectOperation::Nested {
            key: "list".to_string(),
            delta: Delta::Array(vec![ArrayOperation::Nested {
                index: 1,
                delta: Delta::Object(vec![ObjectOperation::Substitution {
                    key: "n".to_string(),
                    value: json!(20),
                }]),
            }]),
        }]);
        apply_delta(&mut tree, delta).unwrap();
        assert_eq!(tree, json!({ "list": [{ "n": 1 }, { "n": 20 }] }));
    }

    #[test]
    fn test_root_shape_mismatch() {
        let mut tree = json!([1]);
        let err = apply_delta(
            &mut tree,
            Delta::Object(vec![ObjectOperation::Deletion {
                key: "a".to_string(),
            }]),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            CollabError::PatchShapeMismatch {
                expected: NodeKind::Object,
                found: NodeKind::Array,
                ..
            }
        ));
    }

    #[test]
    fn test_nested_shape_mismatch_reports_path() {
        let mut tree = json!({ "a": { "b": 5 } });
        let delta = Delta::Object(vec![ObjectOperation::Nested {
            key: "a".to_string(),
            delta: Delta::Object(vec![ObjectOperation::Nested {
                key: "b".to_string(),
                delta: Delta::Array(vec![ArrayOperation::Deletion { index: 0, count: 1 }]),
            }]),
        }]);
        match apply_delta(&mut tree, delta).unwrap_err() {
            CollabError::PatchShapeMismatch {
                path,
                expected,
                found,
            } => {
                assert_eq!(path, "$.a.b");
                assert_eq!(expected, NodeKind::Array);
                assert_eq!(found, NodeKind::Number);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_out_of_bounds_and_missing_key() {
        let mut tree = json!({ "list": [1, 2] });
        let delta = Delta::Object(vec![ObjectOperation::Nested {
            key: "list".to_string(),
            delta: Delta::Array(vec![ArrayOperation::Substitution {
                index: 2,
                value: json!(3),
            }]),
        }]);
        match apply_delta(&mut tree, delta).unwrap_err() {
            CollabError::PatchOutOfBounds { path, index, len } => {
                assert_eq!(path, "$.list");
                assert_eq!((index, len), (2, 2));
            }
            other => panic!("unexpected error {other:?}"),
        }

        let delta = Delta::Object(vec![ObjectOperation::Nested {
            key: "absent".to_string(),
            delta: Delta::Array(vec![ArrayOperation::Deletion { index: 0, count: 1 }]),
        }]);
        assert!(matches!(
            apply_delta(&mut tree, delta).unwrap_err(),
            CollabError::PatchMissingKey { ref key, .. } if key == "absent"
        ));
    }

    #[test]
    fn test_no_difference_is_noop_on_any_tree() {
        let mut tree = json!("scalar");
        apply_delta(&mut tree, Delta::NoDifference).unwrap();
        assert_eq!(tree, json!("scalar"));
    }
}
