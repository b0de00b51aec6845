//! [`MutableTree`] over shared yrs containers inside an open transaction.

use yrs::{Any, Array, ArrayRef, Map, MapRef, Out, ReadTxn, TransactionMut};

use super::convert::{out_kind, read_array, read_map, read_out, to_input};
use crate::error::{CollabError, Result};
use crate::patch::{MutableTree, checked_end, missing_key, out_of_bounds, segment_mismatch, shape_mismatch};
use crate::path::{Path, Segment};
use crate::value::{NodeKind, Value};

/// A shared container that can act as a tree root.
#[derive(Clone)]
pub(crate) enum Container {
    Map(MapRef),
    Array(ArrayRef),
}

impl Container {
    pub(crate) fn kind(&self) -> NodeKind {
        match self {
            Container::Map(_) => NodeKind::Object,
            Container::Array(_) => NodeKind::Array,
        }
    }

    pub(crate) fn len<T: ReadTxn>(&self, txn: &T) -> usize {
        match self {
            Container::Map(map) => map.len(txn) as usize,
            Container::Array(array) => array.len(txn) as usize,
        }
    }

    pub(crate) fn read<T: ReadTxn>(&self, txn: &T, path: &mut Path) -> Result<Value> {
        match self {
            Container::Map(map) => read_map(txn, map, path),
            Container::Array(array) => read_array(txn, array, path),
        }
    }
}

/// One container of a replicated tree, borrowed together with the write
/// transaction every mutation goes through.
pub(crate) struct ReplicatedNode<'t, 'doc> {
    txn: &'t mut TransactionMut<'doc>,
    target: Container,
}

impl<'t, 'doc> ReplicatedNode<'t, 'doc> {
    pub(crate) fn new(txn: &'t mut TransactionMut<'doc>, target: Container) -> Self {
        Self { txn, target }
    }

    fn get(&self, segment: &Segment) -> Result<Out> {
        match (&self.target, segment) {
            (Container::Map(map), Segment::Key(key)) => {
                map.get(&*self.txn, key).ok_or_else(|| missing_key(key))
            }
            (Container::Array(array), Segment::Index(index)) => {
                let len = array.len(&*self.txn) as usize;
                let position = position(*index, len)?;
                array
                    .get(&*self.txn, position)
                    .ok_or_else(|| out_of_bounds(*index, len))
            }
            (target, segment) => Err(segment_mismatch(segment, target.kind())),
        }
    }

    /// Overwrite the child at `segment` with freshly converted shared types.
    fn rewrite(&mut self, segment: &Segment, value: Value) -> Result<()> {
        match segment {
            Segment::Key(key) => self.set(key, value),
            Segment::Index(index) => self.replace(*index, value),
        }
    }
}

fn position(index: usize, len: usize) -> Result<u32> {
    if index >= len {
        return Err(out_of_bounds(index, len));
    }
    u32::try_from(index).map_err(|_| out_of_bounds(index, len))
}

fn child_path(segment: &Segment) -> Path {
    let mut path = Path::root();
    path.push(segment.clone());
    path
}

fn stored_kind(out: &Out, segment: &Segment) -> Result<NodeKind> {
    match out {
        Out::YMap(_) => Ok(NodeKind::Object),
        Out::YArray(_) => Ok(NodeKind::Array),
        Out::Any(any) => match any {
            Any::Null => Ok(NodeKind::Null),
            Any::Bool(_) => Ok(NodeKind::Boolean),
            Any::Number(_) | Any::BigInt(_) => Ok(NodeKind::Number),
            Any::String(_) => Ok(NodeKind::String),
            Any::Array(_) => Ok(NodeKind::Array),
            Any::Map(_) => Ok(NodeKind::Object),
            Any::Undefined | Any::Buffer(_) => Err(CollabError::UnsupportedValue {
                path: child_path(segment).to_string(),
                kind: "Any".to_string(),
            }),
        },
        other => Err(CollabError::UnsupportedValue {
            path: child_path(segment).to_string(),
            kind: out_kind(other).to_string(),
        }),
    }
}

impl MutableTree for ReplicatedNode<'_, '_> {
    fn kind(&self) -> NodeKind {
        self.target.kind()
    }

    fn len(&self) -> usize {
        self.target.len(&*self.txn)
    }

    fn child_kind(&self, segment: &Segment) -> Result<NodeKind> {
        let out = self.get(segment)?;
        stored_kind(&out, segment)
    }

    fn child(&mut self, segment: &Segment) -> Result<Box<dyn MutableTree + '_>> {
        let target = match self.get(segment)? {
            Out::YMap(map) => Container::Map(map),
            Out::YArray(array) => Container::Array(array),
            Out::Any(any @ (Any::Array(_) | Any::Map(_))) => {
                // Plain containers embedded by a peer cannot be edited in
                // place; promote them to shared types first.
                let value = read_out(&*self.txn, Out::Any(any), &mut child_path(segment))?;
                self.rewrite(segment, value)?;
                match self.get(segment)? {
                    Out::YMap(map) => Container::Map(map),
                    Out::YArray(array) => Container::Array(array),
                    other => {
                        return Err(CollabError::UnsupportedValue {
                            path: child_path(segment).to_string(),
                            kind: out_kind(&other).to_string(),
                        });
                    }
                }
            }
            other => {
                let found = stored_kind(&other, segment)?;
                let expected = match segment {
                    Segment::Key(_) => NodeKind::Object,
                    Segment::Index(_) => NodeKind::Array,
                };
                return Err(CollabError::PatchShapeMismatch {
                    path: child_path(segment).to_string(),
                    expected,
                    found,
                });
            }
        };
        Ok(Box::new(ReplicatedNode {
            txn: &mut *self.txn,
            target,
        }))
    }

    fn set(&mut self, key: &str, value: Value) -> Result<()> {
        match &self.target {
            Container::Map(map) => {
                map.insert(self.txn, key, to_input(value));
                Ok(())
            }
            target => Err(shape_mismatch(NodeKind::Object, target.kind())),
        }
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        match &self.target {
            Container::Map(map) => {
                map.remove(self.txn, key);
                Ok(())
            }
            target => Err(shape_mismatch(NodeKind::Object, target.kind())),
        }
    }

    fn insert(&mut self, index: usize, values: Vec<Value>) -> Result<()> {
        let Container::Array(array) = &self.target else {
            return Err(shape_mismatch(NodeKind::Array, self.target.kind()));
        };
        let len = array.len(&*self.txn) as usize;
        if index > len {
            return Err(out_of_bounds(index, len));
        }
        let mut at = u32::try_from(index).map_err(|_| out_of_bounds(index, len))?;
        for value in values {
            array.insert(self.txn, at, to_input(value));
            at += 1;
        }
        Ok(())
    }

    fn remove_range(&mut self, index: usize, count: usize) -> Result<()> {
        let Container::Array(array) = &self.target else {
            return Err(shape_mismatch(NodeKind::Array, self.target.kind()));
        };
        let len = array.len(&*self.txn) as usize;
        checked_end(index, count, len)?;
        if count == 0 {
            return Ok(());
        }
        let start = u32::try_from(index).map_err(|_| out_of_bounds(index, len))?;
        let count = u32::try_from(count).map_err(|_| out_of_bounds(index, len))?;
        array.remove_range(self.txn, start, count);
        Ok(())
    }

    fn to_value(&self) -> Result<Value> {
        self.target.read(&*self.txn, &mut Path::root())
    }
}
