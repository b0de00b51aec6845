//! `collabkit replay`: feed successive states through a replicated document

use std::path::{Path, PathBuf};

use collabkit_core::ReplicatedTree;
use collabkit_core::config::EngineConfig;
use collabkit_core::crdt::{Doc, Origin};
use collabkit_core::error::Result;
use collabkit_core::{PatchOutcome, Value};
use serde::Serialize;

use crate::cli::util::read_json;

/// One replayed state
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayStep {
    /// State file
    pub path: PathBuf,
    /// What the patch did
    #[serde(flatten)]
    pub outcome: PatchOutcome,
    /// Size in bytes of the update the patch produced
    pub update_bytes: usize,
}

/// Handle the replay command
/// Returns true on success, false on error
pub fn handle_replay(states: &[PathBuf], name: &str, array: bool, config: EngineConfig) -> bool {
    match replay(states, name, array, config) {
        Ok((steps, final_state)) => {
            for (index, step) in steps.iter().enumerate() {
                let summary = match step.outcome {
                    PatchOutcome::Unchanged => "unchanged".to_string(),
                    PatchOutcome::Deferred => "deferred".to_string(),
                    PatchOutcome::Applied { operations } => format!("{} operations", operations),
                };
                println!(
                    "{:>3}  {:<32} {:<16} {:>6} bytes",
                    index + 1,
                    step.path.display(),
                    summary,
                    step.update_bytes
                );
            }
            match serde_json::to_string_pretty(&final_state) {
                Ok(json) => println!("{}", json),
                Err(e) => {
                    eprintln!("✗ {}", e);
                    return false;
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

/// Patch a fresh document with every state in `states`.
pub fn replay(
    states: &[PathBuf],
    name: &str,
    array: bool,
    config: EngineConfig,
) -> Result<(Vec<ReplayStep>, Value)> {
    let doc = Doc::new();
    let tree = if array {
        ReplicatedTree::array(&doc, name)
    } else {
        ReplicatedTree::map(&doc, name)
    }
    .with_config(config);

    let mut steps = Vec::with_capacity(states.len());
    for (index, path) in states.iter().enumerate() {
        steps.push(replay_step(&tree, index, path)?);
    }
    Ok((steps, tree.to_value()?))
}

fn replay_step(tree: &ReplicatedTree, index: usize, path: &Path) -> Result<ReplayStep> {
    let state: Value = read_json(path)?;
    let before = tree.encode_state_vector()?;
    let origin = format!("replay-{}", index + 1);
    let outcome = tree.patch(state, Some(Origin::from(origin.as_str())))?;
    let update_bytes = if outcome.is_unchanged() {
        0
    } else {
        tree.encode_diff(&before)?.len()
    };
    log::debug!("{}: {:?}, {} update bytes", path.display(), outcome, update_bytes);
    Ok(ReplayStep {
        path: path.to_path_buf(),
        outcome,
        update_bytes,
    })
}
