use std::fmt;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use crate::delta::Delta;
use crate::path::Path;
use crate::value::{NodeKind, Value};

/// Unified error type for collabkit operations
#[derive(Debug, Error)]
pub enum CollabError {
    // Value model errors
    /// A value could not be brought into the JSON universe.
    #[error("Cannot normalize value at '{path}': {reason}")]
    Normalization {
        /// Position of the offending value
        path: String,
        /// What was wrong with it
        reason: String,
    },

    /// Old and new state are of kinds that cannot be diffed.
    #[error("Shape mismatch at '{path}': cannot reconcile {old} with {new}")]
    ShapeMismatch {
        /// Position where the kinds diverge
        path: String,
        /// Kind of the current state
        old: NodeKind,
        /// Kind of the requested state
        new: NodeKind,
    },

    /// A stored value has no JSON counterpart.
    #[error("Unsupported value at '{path}': {kind} is not representable as JSON")]
    UnsupportedValue {
        /// Position of the stored value
        path: String,
        /// Name of the stored type
        kind: String,
    },

    // Patch errors
    /// A delta addressed a node of the wrong kind.
    #[error("Patch shape mismatch at '{path}': expected {expected}, found {found}")]
    PatchShapeMismatch {
        /// Position of the node
        path: String,
        /// Kind the delta needs
        expected: NodeKind,
        /// Kind the tree holds
        found: NodeKind,
    },

    /// An array operation pointed past the end of its target.
    #[error("Patch index {index} out of bounds at '{path}' (length {len})")]
    PatchOutOfBounds {
        /// Position of the array
        path: String,
        /// Requested index
        index: usize,
        /// Array length at the time
        len: usize,
    },

    /// A nested object operation named a key the target lacks.
    #[error("Patch target at '{path}' has no key '{key}'")]
    PatchMissingKey {
        /// Position of the object
        path: String,
        /// The missing key
        key: String,
    },

    /// Verification after a patch found the tree differs from the new state.
    #[error("Patched tree did not converge to the new state: {0}")]
    PatchIntegrity(Box<IntegrityReport>),

    // Transaction errors
    /// A patch was issued while another one holds the document.
    #[error("A patch is already in flight on this tree and reentrant patches are rejected")]
    ReentrantPatch,

    /// The deferred patch queue is at its configured limit.
    #[error("Too many deferred patches (limit {0})")]
    DeferredQueueFull(usize),

    /// yrs rejected an update, state vector or transaction.
    #[error("Replication error: {0}")]
    Replication(String),

    // IO errors
    /// Generic IO failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Reading a file failed.
    #[error("Failed to read file '{path}': {source}")]
    FileRead {
        /// File that was read
        path: PathBuf,
        /// Underlying IO error
        source: std::io::Error,
    },

    /// JSON (de)serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // Config errors
    /// The config file is not valid TOML for [`crate::config::EngineConfig`].
    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// The config could not be written as TOML.
    #[error("Config serialize error: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),

    /// No platform config directory exists.
    #[error("Could not determine config directory")]
    NoConfigDir,
}

/// Result type alias for collabkit operations
pub type Result<T> = std::result::Result<T, CollabError>;

/// Diagnostic context attached to [`CollabError::PatchIntegrity`].
///
/// Holds the state read before patching, the intended state, what the tree
/// actually contained after the operations ran, and the delta that was applied.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrityReport {
    /// Tree value before the patch
    pub old_state: Value,
    /// Value the patch was meant to produce
    pub new_state: Value,
    /// Tree value after the patch
    pub actual_state: Value,
    /// Delta that was applied
    pub delta: Delta,
}

impl fmt::Display for IntegrityReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string_pretty(self) {
            Ok(json) => f.write_str(&json),
            Err(_) => write!(f, "{:?}", self),
        }
    }
}

/// A serializable representation of CollabError for IPC (e.g., a JS bridge)
#[derive(Debug, Clone, Serialize)]
pub struct SerializableError {
    /// Error kind/variant name
    pub kind: String,
    /// Human-readable error message
    pub message: String,
    /// Tree position (if applicable)
    pub path: Option<String>,
}

impl From<&CollabError> for SerializableError {
    fn from(err: &CollabError) -> Self {
        let kind = match err {
            CollabError::Normalization { .. } => "Normalization",
            CollabError::ShapeMismatch { .. } => "ShapeMismatch",
            CollabError::UnsupportedValue { .. } => "UnsupportedValue",
            CollabError::PatchShapeMismatch { .. } => "PatchShapeMismatch",
            CollabError::PatchOutOfBounds { .. } => "PatchOutOfBounds",
            CollabError::PatchMissingKey { .. } => "PatchMissingKey",
            CollabError::PatchIntegrity(_) => "PatchIntegrity",
            CollabError::ReentrantPatch => "ReentrantPatch",
            CollabError::DeferredQueueFull(_) => "DeferredQueueFull",
            CollabError::Replication(_) => "Replication",
            CollabError::Io(_) => "Io",
            CollabError::FileRead { .. } => "FileRead",
            CollabError::Json(_) => "Json",
            CollabError::ConfigParse(_) => "ConfigParse",
            CollabError::ConfigSerialize(_) => "ConfigSerialize",
            CollabError::NoConfigDir => "NoConfigDir",
        }
        .to_string();

        let path = match err {
            CollabError::Normalization { path, .. } => Some(path.clone()),
            CollabError::ShapeMismatch { path, .. } => Some(path.clone()),
            CollabError::UnsupportedValue { path, .. } => Some(path.clone()),
            CollabError::PatchShapeMismatch { path, .. } => Some(path.clone()),
            CollabError::PatchOutOfBounds { path, .. } => Some(path.clone()),
            CollabError::PatchMissingKey { path, .. } => Some(path.clone()),
            CollabError::FileRead { path, .. } => Some(path.display().to_string()),
            _ => None,
        };

        Self {
            kind,
            message: err.to_string(),
            path,
        }
    }
}

impl From<CollabError> for SerializableError {
    fn from(err: CollabError) -> Self {
        SerializableError::from(&err)
    }
}

impl CollabError {
    /// Convert to a serializable representation for IPC
    pub fn to_serializable(&self) -> SerializableError {
        SerializableError::from(self)
    }

    /// Whether this error means the local replica must be resynchronized
    /// from a trusted snapshot before further patches are attempted.
    pub fn requires_resync(&self) -> bool {
        matches!(
            self,
            CollabError::PatchIntegrity(_)
                | CollabError::PatchShapeMismatch { .. }
                | CollabError::PatchOutOfBounds { .. }
                | CollabError::PatchMissingKey { .. }
        )
    }

    /// Re-anchor a path reported relative to a subtree (`$` being the
    /// subtree root) at that subtree's position in the whole tree.
    pub(crate) fn rebased(self, base: &Path) -> Self {
        match self {
            CollabError::PatchShapeMismatch {
                path,
                expected,
                found,
            } => CollabError::PatchShapeMismatch {
                path: base.rebase(&path),
                expected,
                found,
            },
            CollabError::PatchOutOfBounds { path, index, len } => CollabError::PatchOutOfBounds {
                path: base.rebase(&path),
                index,
                len,
            },
            CollabError::PatchMissingKey { path, key } => CollabError::PatchMissingKey {
                path: base.rebase(&path),
                key,
            },
            CollabError::UnsupportedValue { path, kind } => CollabError::UnsupportedValue {
                path: base.rebase(&path),
                kind,
            },
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serializable_error_carries_path() {
        let err = CollabError::PatchOutOfBounds {
            path: "$.items".to_string(),
            index: 4,
            len: 2,
        };
        let serializable = err.to_serializable();
        assert_eq!(serializable.kind, "PatchOutOfBounds");
        assert_eq!(serializable.path.as_deref(), Some("$.items"));
        assert!(serializable.message.contains("index 4"));
        assert!(err.requires_resync());
    }

    #[test]
    fn test_shape_mismatch_message() {
        let err = CollabError::ShapeMismatch {
            path: "$".to_string(),
            old: NodeKind::Array,
            new: NodeKind::Object,
        };
        assert_eq!(
            err.to_string(),
            "Shape mismatch at '$': cannot reconcile array with object"
        );
        assert!(!err.requires_resync());
    }

    #[test]
    fn test_rebased_prefixes_subtree_path() {
        let mut base = Path::root();
        base.push_key("list");
        base.push_index(1);
        let err = CollabError::PatchMissingKey {
            path: "$.inner".to_string(),
            key: "k".to_string(),
        }
        .rebased(&base);
        assert!(matches!(err, CollabError::PatchMissingKey { ref path, .. } if path == "$.list[1].inner"));
    }

    #[test]
    fn test_integrity_report_fields_serialize_camel_case() {
        let report = IntegrityReport {
            old_state: serde_json::json!({ "a": 1 }),
            new_state: serde_json::json!({ "a": 2 }),
            actual_state: serde_json::json!({ "a": 1 }),
            delta: Delta::NoDifference,
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["oldState"], serde_json::json!({ "a": 1 }));
        assert_eq!(json["newState"], serde_json::json!({ "a": 2 }));
        assert_eq!(json["actualState"], serde_json::json!({ "a": 1 }));
        assert!(json.get("delta").is_some());
        assert!(CollabError::PatchIntegrity(Box::new(report)).requires_resync());
    }
}
