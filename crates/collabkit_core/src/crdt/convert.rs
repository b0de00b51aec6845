//! Conversion between plain values and yrs types.
//!
//! Writing turns nested arrays and objects into `ArrayPrelim` / `MapPrelim`
//! so every container inside the document is itself a shared type. Reading
//! accepts shared maps and arrays as well as plain `Any` containers (as
//! written by peers that embed JSON directly) and rejects text, XML and
//! subdocuments.

use std::sync::Arc;

use serde_json::{Map as JsonMap, Number};
use yrs::{Any, Array, ArrayPrelim, ArrayRef, In, Map, MapPrelim, MapRef, Out, ReadTxn};

use crate::error::{CollabError, Result};
use crate::path::Path;
use crate::value::{MAX_SAFE_INTEGER, Value, number_from_f64};

/// Convert a plain value into its preliminary shared representation.
pub(crate) fn to_input(value: Value) -> In {
    match value {
        Value::Null => In::Any(Any::Null),
        Value::Bool(b) => In::Any(Any::Bool(b)),
        Value::Number(n) => In::Any(number_to_any(&n)),
        Value::String(s) => In::Any(Any::String(Arc::from(s))),
        Value::Array(items) => In::Array(items.into_iter().map(to_input).collect::<ArrayPrelim>()),
        Value::Object(map) => In::Map(
            map.into_iter()
                .map(|(key, value)| (key, to_input(value)))
                .collect::<MapPrelim>(),
        ),
    }
}

fn number_to_any(n: &Number) -> Any {
    if let Some(i) = n.as_i64() {
        if i.unsigned_abs() <= MAX_SAFE_INTEGER as u64 {
            Any::Number(i as f64)
        } else {
            Any::BigInt(i)
        }
    } else {
        Any::Number(n.as_f64().unwrap_or(0.0))
    }
}

/// Read a shared map into a plain object. Keys come out sorted, since the
/// document keeps no key order.
pub(crate) fn read_map<T: ReadTxn>(txn: &T, map: &MapRef, path: &mut Path) -> Result<Value> {
    let mut entries: Vec<(String, Out)> = map
        .iter(txn)
        .map(|(key, value)| (key.to_string(), value))
        .collect();
    entries.sort_by(|a, b| a.0.cmp(&b.0));

    let mut object = JsonMap::with_capacity(entries.len());
    for (key, out) in entries {
        path.push_key(&key);
        let value = read_out(txn, out, path);
        path.pop();
        object.insert(key, value?);
    }
    Ok(Value::Object(object))
}

/// Read a shared array into a plain array.
pub(crate) fn read_array<T: ReadTxn>(txn: &T, array: &ArrayRef, path: &mut Path) -> Result<Value> {
    let mut items = Vec::with_capacity(array.len(txn) as usize);
    for (index, out) in array.iter(txn).enumerate() {
        path.push_index(index);
        let value = read_out(txn, out, path);
        path.pop();
        items.push(value?);
    }
    Ok(Value::Array(items))
}

/// Read any stored value.
pub(crate) fn read_out<T: ReadTxn>(txn: &T, out: Out, path: &mut Path) -> Result<Value> {
    match out {
        Out::Any(any) => read_any(&any, path),
        Out::YMap(map) => read_map(txn, &map, path),
        Out::YArray(array) => read_array(txn, &array, path),
        other => Err(CollabError::UnsupportedValue {
            path: path.to_string(),
            kind: out_kind(&other).to_string(),
        }),
    }
}

fn read_any(any: &Any, path: &mut Path) -> Result<Value> {
    match any {
        Any::Null => Ok(Value::Null),
        Any::Bool(b) => Ok(Value::Bool(*b)),
        Any::Number(f) => number_from_f64(*f)
            .map(Value::Number)
            .ok_or_else(|| unsupported(path, "non-finite number")),
        Any::BigInt(i) => Ok(Value::from(*i)),
        Any::String(s) => Ok(Value::String(s.to_string())),
        Any::Array(items) => {
            let mut values = Vec::with_capacity(items.len());
            for (index, item) in items.iter().enumerate() {
                path.push_index(index);
                let value = read_any(item, path);
                path.pop();
                values.push(value?);
            }
            Ok(Value::Array(values))
        }
        Any::Map(fields) => {
            let mut keys: Vec<&String> = fields.keys().collect();
            keys.sort();
            let mut object = JsonMap::with_capacity(keys.len());
            for key in keys {
                path.push_key(key);
                let value = fields
                    .get(key)
                    .map_or(Ok(Value::Null), |field| read_any(field, path));
                path.pop();
                object.insert(key.clone(), value?);
            }
            Ok(Value::Object(object))
        }
        Any::Undefined => Err(unsupported(path, "undefined")),
        Any::Buffer(_) => Err(unsupported(path, "binary buffer")),
    }
}

fn unsupported(path: &Path, kind: &str) -> CollabError {
    CollabError::UnsupportedValue {
        path: path.to_string(),
        kind: kind.to_string(),
    }
}

/// Name of a stored value's type, for diagnostics.
pub(crate) fn out_kind(out: &Out) -> &'static str {
    match out {
        Out::Any(_) => "Any",
        Out::YText(_) => "Y.Text",
        Out::YArray(_) => "Y.Array",
        Out::YMap(_) => "Y.Map",
        Out::YXmlElement(_) => "Y.XmlElement",
        Out::YXmlFragment(_) => "Y.XmlFragment",
        Out::YXmlText(_) => "Y.XmlText",
        Out::YDoc(_) => "Y.Doc",
        _ => "unknown shared type",
    }
}
