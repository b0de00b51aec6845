//! No-op detection and post-patch verification shared by both backends.

use serde::Serialize;

use crate::delta::Delta;
use crate::diff::diff;
use crate::error::{CollabError, IntegrityReport, Result};
use crate::value::{Value, deep_equal};

/// What a patch call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum PatchOutcome {
    /// The target already matched; nothing was touched.
    Unchanged,
    /// A delta was applied.
    Applied {
        /// Primitive operations applied, counted through nested deltas
        operations: usize,
    },
    /// Another patch on the same tree was in flight, so this one was queued
    /// and will run right after it.
    Deferred,
}

impl PatchOutcome {
    /// Whether the call left the target untouched.
    pub fn is_unchanged(&self) -> bool {
        matches!(self, PatchOutcome::Unchanged)
    }

    /// Operations applied by this call.
    pub fn operations(&self) -> usize {
        match self {
            PatchOutcome::Applied { operations } => *operations,
            _ => 0,
        }
    }
}

/// Decide whether moving from `old` to `new` needs a patch at all, and if so
/// return the delta to apply.
pub fn plan(old: &Value, new: &Value) -> Result<Option<Delta>> {
    if deep_equal(old, new) {
        return Ok(None);
    }
    let delta = diff(old, new)?;
    if delta.is_empty() {
        return Ok(None);
    }
    Ok(Some(delta))
}

/// Assert that a patched tree now holds `new`.
///
/// On mismatch the error carries the old, intended and actual states together
/// with the delta that was computed for them.
pub fn verify(actual: &Value, old: &Value, new: &Value) -> Result<()> {
    if deep_equal(actual, new) {
        return Ok(());
    }
    let delta = diff(old, new).unwrap_or(Delta::NoDifference);
    log::warn!(
        "patched tree diverged from its target after {} operations",
        delta.operation_count()
    );
    Err(CollabError::PatchIntegrity(Box::new(IntegrityReport {
        old_state: old.clone(),
        new_state: new.clone(),
        actual_state: actual.clone(),
        delta,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_plan_skips_equal_states() {
        let old = json!({ "a": [1, 2], "b": { "c": null } });
        assert_eq!(plan(&old, &old.clone()).unwrap(), None);
        assert_eq!(plan(&old, &json!({ "b": { "c": null }, "a": [1, 2] })).unwrap(), None);
    }

    #[test]
    fn test_plan_returns_delta() {
        let delta = plan(&json!({ "a": 1 }), &json!({ "a": 2 })).unwrap().unwrap();
        assert_eq!(delta.operation_count(), 1);
    }

    #[test]
    fn test_verify_reports_divergence() {
        let old = json!({ "a": 1 });
        let new = json!({ "a": 2 });
        assert!(verify(&new, &old, &new).is_ok());

        match verify(&old, &old, &new).unwrap_err() {
            CollabError::PatchIntegrity(report) => {
                assert_eq!(report.actual_state, old);
                assert_eq!(report.new_state, new);
                assert_eq!(report.delta.operation_count(), 1);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_outcome_serialization() {
        let json = serde_json::to_value(PatchOutcome::Applied { operations: 3 }).unwrap();
        assert_eq!(json, json!({ "outcome": "applied", "operations": 3 }));
        assert_eq!(PatchOutcome::Deferred.operations(), 0);
        assert!(PatchOutcome::Unchanged.is_unchanged());
    }
}
