//! Edit scripts produced by the differ and consumed by the patch appliers.
//!
//! A [`Delta`] serializes as
//! `{"type":"array","operations":[{"operationType":"insertion","index":0,"values":[1]}]}`.
//! TypeScript bindings are exported to `bindings/` for consumers on the JS side.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::value::{NodeKind, Value};

/// An ordered list of operations transforming one container into another.
///
/// [`Delta::NoDifference`] is the only representation of "nothing changed";
/// the differ never returns an `Array` or `Object` delta without operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(tag = "type", content = "operations", rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub enum Delta {
    /// The two values are deep-equal.
    NoDifference,
    /// Operations on an array, in application order.
    Array(Vec<ArrayOperation>),
    /// Operations on an object, in application order.
    Object(Vec<ObjectOperation>),
}

/// One step of an array [`Delta`].
///
/// Deletion indices refer to the old array and arrive in descending order.
/// Insertion, substitution and nested indices refer to the new array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(tag = "operationType", rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub enum ArrayOperation {
    /// Insert a contiguous run of values at `index`.
    Insertion {
        /// Position of the first inserted value
        index: usize,
        /// Values to insert, in order
        values: Vec<Value>,
    },
    /// Remove `count` contiguous elements starting at `index`.
    Deletion {
        /// Position of the first removed element
        index: usize,
        /// Number of elements removed
        count: usize,
    },
    /// Replace exactly one element.
    Substitution {
        /// Position of the replaced element
        index: usize,
        /// Replacement value
        value: Value,
    },
    /// Patch the container at `index` recursively.
    Nested {
        /// Position of the patched element
        index: usize,
        /// Changes to apply to the element
        delta: Delta,
    },
}

/// One step of an object [`Delta`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(tag = "operationType", rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub enum ObjectOperation {
    /// Add a key that did not exist.
    Insertion {
        /// The new key
        key: String,
        /// Its value
        value: Value,
    },
    /// Remove a key.
    Deletion {
        /// The removed key
        key: String,
    },
    /// Replace the value of an existing key.
    Substitution {
        /// The replaced key
        key: String,
        /// Replacement value
        value: Value,
    },
    /// Patch the container under `key` recursively.
    Nested {
        /// The patched key
        key: String,
        /// Changes to apply to the value
        delta: Delta,
    },
}

impl Delta {
    /// Build an array delta, collapsing an empty operation list.
    pub fn array(operations: Vec<ArrayOperation>) -> Self {
        if operations.is_empty() {
            Delta::NoDifference
        } else {
            Delta::Array(operations)
        }
    }

    /// Build an object delta, collapsing an empty operation list.
    pub fn object(operations: Vec<ObjectOperation>) -> Self {
        if operations.is_empty() {
            Delta::NoDifference
        } else {
            Delta::Object(operations)
        }
    }

    /// Whether applying this delta changes nothing.
    pub fn is_empty(&self) -> bool {
        match self {
            Delta::NoDifference => true,
            Delta::Array(operations) => operations.is_empty(),
            Delta::Object(operations) => operations.is_empty(),
        }
    }

    /// The container kind this delta applies to.
    pub fn kind(&self) -> Option<NodeKind> {
        match self {
            Delta::NoDifference => None,
            Delta::Array(_) => Some(NodeKind::Array),
            Delta::Object(_) => Some(NodeKind::Object),
        }
    }

    /// Number of top-level operations.
    pub fn len(&self) -> usize {
        match self {
            Delta::NoDifference => 0,
            Delta::Array(operations) => operations.len(),
            Delta::Object(operations) => operations.len(),
        }
    }

    /// Total number of primitive operations, counting inside nested deltas.
    pub fn operation_count(&self) -> usize {
        match self {
            Delta::NoDifference => 0,
            Delta::Array(operations) => operations
                .iter()
                .map(|op| match op {
                    ArrayOperation::Nested { delta, .. } => delta.operation_count(),
                    _ => 1,
                })
                .sum(),
            Delta::Object(operations) => operations
                .iter()
                .map(|op| match op {
                    ObjectOperation::Nested { delta, .. } => delta.operation_count(),
                    _ => 1,
                })
                .sum(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_serialized_shape() {
        let delta = Delta::Array(vec![
            ArrayOperation::Deletion { index: 2, count: 1 },
            ArrayOperation::Nested {
                index: 0,
                delta: Delta::Object(vec![ObjectOperation::Deletion {
                    key: "a".to_string(),
                }]),
            },
        ]);
        let json = serde_json::to_value(&delta).unwrap();
        assert_eq!(
            json,
            json!({
                "type": "array",
                "operations": [
                    { "operationType": "deletion", "index": 2, "count": 1 },
                    {
                        "operationType": "nested",
                        "index": 0,
                        "delta": {
                            "type": "object",
                            "operations": [{ "operationType": "deletion", "key": "a" }]
                        }
                    }
                ]
            })
        );
        let back: Delta = serde_json::from_value(json).unwrap();
        assert_eq!(back, delta);
    }

    #[test]
    fn test_no_difference_serializes_without_operations() {
        let json = serde_json::to_value(Delta::NoDifference).unwrap();
        assert_eq!(json, json!({ "type": "noDifference" }));
    }

    #[test]
    fn test_counts() {
        let delta = Delta::Object(vec![
            ObjectOperation::Insertion {
                key: "x".to_string(),
                value: json!(1),
            },
            ObjectOperation::Nested {
                key: "y".to_string(),
                delta: Delta::Array(vec![
                    ArrayOperation::Deletion { index: 0, count: 3 },
                    ArrayOperation::Insertion {
                        index: 0,
                        values: vec![json!(1), json!(2)],
                    },
                ]),
            },
        ]);
        assert_eq!(delta.len(), 2);
        assert_eq!(delta.operation_count(), 3);
        assert_eq!(delta.kind(), Some(NodeKind::Object));
        assert!(Delta::array(Vec::new()).is_empty());
        assert_eq!(Delta::object(Vec::new()), Delta::NoDifference);
    }
}
