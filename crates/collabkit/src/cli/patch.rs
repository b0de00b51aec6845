//! `collabkit patch` and `collabkit merge`

use std::path::Path;

use collabkit_core::error::Result;
use collabkit_core::{PatchOutcome, Value, deep_merge, deep_patch};

use crate::cli::util::{emit, read_json};

/// Handle the patch command
/// Returns true on success, false on error
pub fn handle_patch(target: &Path, new: &Path, in_place: bool) -> bool {
    let result = (|| -> Result<PatchOutcome> {
        let mut tree: Value = read_json(target)?;
        let new_state: Value = read_json(new)?;
        let outcome = deep_patch(&mut tree, new_state)?;
        if !(in_place && outcome.is_unchanged()) {
            emit(&tree, target, in_place)?;
        }
        Ok(outcome)
    })();
    report(target, in_place, result)
}

/// Handle the merge command
/// Returns true on success, false on error
pub fn handle_merge(target: &Path, update: &Path, in_place: bool) -> bool {
    let result = (|| -> Result<PatchOutcome> {
        let mut tree: Value = read_json(target)?;
        let update: Value = read_json(update)?;
        let outcome = deep_merge(&mut tree, update)?;
        if !(in_place && outcome.is_unchanged()) {
            emit(&tree, target, in_place)?;
        }
        Ok(outcome)
    })();
    report(target, in_place, result)
}

fn report(target: &Path, in_place: bool, result: Result<PatchOutcome>) -> bool {
    match result {
        Ok(outcome) => {
            if in_place {
                match outcome {
                    PatchOutcome::Unchanged => {
                        eprintln!("✓ {} already up to date", target.display())
                    }
                    _ => eprintln!(
                        "✓ Updated {} ({} operations)",
                        target.display(),
                        outcome.operations()
                    ),
                }
            }
            true
        }
        Err(e) => {
            eprintln!("✗ {}", e);
            false
        }
    }
}
