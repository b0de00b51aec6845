//! Structural hashing of values.
//!
//! Deep-equal values always hash equally, whatever their identity or object
//! key order, so the LCS matcher can pair array elements that are equal but
//! not the same allocation. Containers are memoized by address in a
//! [`HashMemo`] that lives for a single diff call.

use std::collections::HashMap;
use std::marker::PhantomData;

use crate::value::{Value, deep_equal};

const PRIME1: u32 = 510_137;
const PRIME2: u32 = 472_369;
const PRIME3: u32 = 751_321;
const PRIME4: u32 = 532_489;
const PRIME5: u32 = 301_813;
const PRIME6: u32 = 545_023;
const PRIME7: u32 = 31;

/// Identity-keyed memo of container hashes.
///
/// Keys are the addresses of values borrowed for `'a`, so the trees cannot be
/// moved or mutated while the memo is alive and no address is reused.
#[derive(Debug, Default)]
pub struct HashMemo<'a> {
    containers: HashMap<usize, u32>,
    _borrow: PhantomData<&'a Value>,
}

impl<'a> HashMemo<'a> {
    /// Create an empty memo.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of containers hashed so far.
    pub fn len(&self) -> usize {
        self.containers.len()
    }

    /// Whether no container has been hashed yet.
    pub fn is_empty(&self) -> bool {
        self.containers.is_empty()
    }

    /// Hash `value`, reusing any container hash computed earlier in this memo.
    pub fn hash(&mut self, value: &'a Value) -> u32 {
        let identity = value as *const Value as usize;
        match value {
            Value::Array(items) => {
                if let Some(hash) = self.containers.get(&identity) {
                    return *hash;
                }
                let mut hash = PRIME6;
                for item in items {
                    hash = hash.wrapping_mul(PRIME7) ^ self.hash(item);
                }
                // Without this, `[[x]]` folds back to the hash of `x`.
                let hash = hash.wrapping_mul(PRIME6);
                self.containers.insert(identity, hash);
                hash
            }
            Value::Object(map) => {
                if let Some(hash) = self.containers.get(&identity) {
                    return *hash;
                }
                let mut entries: Vec<(&'a String, &'a Value)> = map.iter().collect();
                entries.sort_unstable_by(|a, b| a.0.cmp(b.0));

                let mut hash = PRIME6.wrapping_mul(PRIME7);
                for (key, child) in entries {
                    hash = hash.wrapping_mul(PRIME7) ^ hash_str(key);
                    hash = hash.wrapping_mul(PRIME7) ^ self.hash(child);
                }
                let hash = hash.wrapping_mul(PRIME6);
                self.containers.insert(identity, hash);
                hash
            }
            primitive => hash_primitive(primitive),
        }
    }

    /// Equality oracle used while matching: same allocation, or equal hashes
    /// confirmed by a structural comparison.
    pub fn matches(&mut self, a: &'a Value, b: &'a Value) -> bool {
        std::ptr::eq(a, b) || (self.hash(a) == self.hash(b) && deep_equal(a, b))
    }
}

/// Hash a value without keeping a memo around.
pub fn structural_hash(value: &Value) -> u32 {
    HashMemo::new().hash(value)
}

fn hash_primitive(value: &Value) -> u32 {
    match value {
        Value::Null => PRIME5,
        Value::Bool(true) => PRIME2,
        Value::Bool(false) => PRIME3,
        Value::Number(n) => hash_number(n.as_f64().unwrap_or(0.0)),
        Value::String(s) => hash_str(s),
        Value::Array(_) | Value::Object(_) => structural_hash(value),
    }
}

fn hash_number(value: f64) -> u32 {
    if value.fract() == 0.0 {
        // Truncate to 32 bits the way a JS engine feeds an integer to `Math.imul`.
        (value as i64 as u32).wrapping_mul(PRIME1)
    } else {
        let bits = value.to_bits();
        ((bits as u32) ^ ((bits >> 32) as u32)).wrapping_mul(PRIME1)
    }
}

fn hash_str(s: &str) -> u32 {
    let mut hash = PRIME4;
    for unit in s.encode_utf16() {
        hash = hash.wrapping_mul(PRIME7) ^ u32::from(unit);
    }
    hash
}
