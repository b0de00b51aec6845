#![doc = include_str!(concat!(env!("OUT_DIR"), "/crdt_README.md"))]

mod convert;
mod node;
mod tree;

pub use tree::ReplicatedTree;
pub use yrs::{Doc, Origin, Subscription, TransactionMut};

use crate::coordinator::PatchOutcome;
use crate::delta::Delta;
use crate::error::Result;

/// Apply `delta` to `tree` in one transaction tagged with `origin`.
///
/// Same as [`ReplicatedTree::apply_delta`].
pub fn patch_replicated(
    tree: &ReplicatedTree,
    delta: Delta,
    origin: Option<Origin>,
) -> Result<PatchOutcome> {
    tree.apply_delta(delta, origin)
}
