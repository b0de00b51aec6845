//! Shared utilities for CLI commands

use std::path::Path;

use collabkit_core::Value;
use collabkit_core::config::EngineConfig;
use collabkit_core::error::{CollabError, Result};
use serde::de::DeserializeOwned;

/// Read and parse a JSON file
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let contents = std::fs::read_to_string(path).map_err(|e| CollabError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(serde_json::from_str(&contents)?)
}

/// Print `value` to stdout, or write it back to `path` when `in_place` is set
pub fn emit(value: &Value, path: &Path, in_place: bool) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    if in_place {
        std::fs::write(path, format!("{}\n", json))?;
    } else {
        println!("{}", json);
    }
    Ok(())
}

/// Load the engine config from `path`, or from the default location
pub fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    match path {
        Some(path) => EngineConfig::load_from(path),
        None => EngineConfig::load(),
    }
}
