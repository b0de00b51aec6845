#![doc = include_str!(concat!(env!("OUT_DIR"), "/README.md"))]
#![warn(missing_docs)]

/// Configuration options
pub mod config;

/// No-op planning and post-patch verification
pub mod coordinator;

/// Replicated-tree backend (yrs)
#[cfg(feature = "crdt")]
pub mod crdt;

/// Delta and operation types
pub mod delta;

/// Tree differ
pub mod diff;

/// Error (common error types)
pub mod error;

/// Structural hashing
pub mod hash;

/// Longest common subsequence over structurally hashed values
pub mod lcs;

/// Mutable tree capability and the delta traversal
pub mod patch;

/// Tree positions used in diagnostics
pub mod path;

/// Plain-tree backend
pub mod plain;

/// Value model, normalization and deep equality
pub mod value;

pub use coordinator::PatchOutcome;
pub use delta::{ArrayOperation, Delta, ObjectOperation};
pub use diff::diff;
pub use error::{CollabError, Result};
pub use plain::{deep_merge, deep_patch, patch_plain};
pub use value::{NodeKind, Template, Value, deep_equal, normalize};

#[cfg(feature = "crdt")]
pub use crdt::{ReplicatedTree, patch_replicated};
