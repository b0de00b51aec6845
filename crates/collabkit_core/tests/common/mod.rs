//! Proptest strategies for JSON trees shared by the integration tests

#![allow(dead_code)]

use proptest::prelude::*;
use serde_json::{Map, Value};

/// Primitive leaves drawn from small alphabets so generated trees share a lot
/// of structure
pub fn arb_leaf() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        (-3i64..4).prop_map(Value::from),
        "[a-c]{0,2}".prop_map(Value::String),
    ]
}

/// Arbitrary JSON values up to a few levels deep
pub fn arb_json() -> impl Strategy<Value = Value> {
    arb_leaf().prop_recursive(3, 32, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..5).prop_map(Value::Array),
            prop::collection::vec(("[a-d]", inner), 0..4).prop_map(into_object),
        ]
    })
}

/// Arbitrary JSON objects
pub fn arb_object() -> impl Strategy<Value = Value> {
    prop::collection::vec(("[a-e]", arb_json()), 0..5).prop_map(into_object)
}

/// Arbitrary JSON arrays
pub fn arb_array() -> impl Strategy<Value = Value> {
    prop::collection::vec(arb_json(), 0..6).prop_map(Value::Array)
}

/// A pair of objects where the second is usually a light edit of the first
pub fn arb_object_pair() -> impl Strategy<Value = (Value, Value)> {
    prop_oneof![
        (arb_object(), arb_object()),
        arb_object().prop_flat_map(|old| {
            let edits = prop::collection::vec(("[a-e]", prop::option::of(arb_json())), 0..3);
            (Just(old), edits).prop_map(|(old, edits)| {
                let mut new = old.clone();
                if let Value::Object(map) = &mut new {
                    for (key, value) in edits {
                        match value {
                            Some(value) => {
                                map.insert(key, value);
                            }
                            None => {
                                map.shift_remove(&key);
                            }
                        }
                    }
                }
                (old, new)
            })
        }),
    ]
}

/// A pair of arrays where the second is usually the first with a few
/// elements inserted, removed or replaced
pub fn arb_array_pair() -> impl Strategy<Value = (Value, Value)> {
    prop_oneof![
        (arb_array(), arb_array()),
        arb_array().prop_flat_map(|old| {
            let edits = prop::collection::vec((0usize..8, prop::option::of(arb_json())), 0..4);
            (Just(old), edits).prop_map(|(old, edits)| {
                let mut new = old.clone();
                if let Value::Array(items) = &mut new {
                    for (position, value) in edits {
                        match value {
                            Some(value) => {
                                let index = position.min(items.len());
                                items.insert(index, value);
                            }
                            None if !items.is_empty() => {
                                items.remove(position % items.len());
                            }
                            None => {}
                        }
                    }
                }
                (old, new)
            })
        }),
    ]
}

fn into_object(entries: Vec<(String, Value)>) -> Value {
    let mut map = Map::new();
    for (key, value) in entries {
        map.insert(key, value);
    }
    Value::Object(map)
}
