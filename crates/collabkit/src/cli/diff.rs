//! `collabkit diff` and `collabkit apply`

use std::path::Path;

use collabkit_core::error::Result;
use collabkit_core::{Delta, Value, diff, patch_plain};

use crate::cli::util::{emit, read_json};

/// Handle the diff command
/// Returns true on success, false on error
pub fn handle_diff(old: &Path, new: &Path, compact: bool) -> bool {
    match run_diff(old, new, compact) {
        Ok(json) => {
            println!("{}", json);
            true
        }
        Err(e) => {
            eprintln!("✗ {}", e);
            false
        }
    }
}

fn run_diff(old: &Path, new: &Path, compact: bool) -> Result<String> {
    let old_state: Value = read_json(old)?;
    let new_state: Value = read_json(new)?;
    let delta = diff(&old_state, &new_state)?;
    log::info!("{} operations", delta.operation_count());
    let json = if compact {
        serde_json::to_string(&delta)?
    } else {
        serde_json::to_string_pretty(&delta)?
    };
    Ok(json)
}

/// Handle the apply command
/// Returns true on success, false on error
pub fn handle_apply(target: &Path, delta: &Path, in_place: bool) -> bool {
    let result = (|| -> Result<usize> {
        let mut tree: Value = read_json(target)?;
        let delta: Delta = read_json(delta)?;
        let operations = delta.operation_count();
        patch_plain(&mut tree, delta)?;
        emit(&tree, target, in_place)?;
        Ok(operations)
    })();

    match result {
        Ok(operations) => {
            if in_place {
                eprintln!("✓ Applied {} operations to {}", operations, target.display());
            }
            true
        }
        Err(e) => {
            eprintln!("✗ {}", e);
            if e.requires_resync() {
                eprintln!("  The delta was computed against a different state of this file.");
            }
            false
        }
    }
}
