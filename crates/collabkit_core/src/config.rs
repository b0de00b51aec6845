//! Configuration types for collabkit.
//!
//! [`EngineConfig`] tunes how patches are applied to replicated trees.
//! It is persisted as TOML (typically at `~/.config/collabkit/config.toml`
//! on Unix systems).
//!
//! # Example
//!
//! ```ignore
//! use collabkit_core::config::{EngineConfig, ReentrancyPolicy};
//!
//! // Load from default location (native only)
//! let config = EngineConfig::load()?;
//!
//! // Or build one by hand
//! let config = EngineConfig {
//!     reentrancy: ReentrancyPolicy::Reject,
//!     ..EngineConfig::default()
//! };
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{CollabError, Result};

/// Default bound on patches queued behind an in-flight transaction.
pub const DEFAULT_MAX_DEFERRED_PATCHES: usize = 64;

/// What to do with a patch submitted while another patch on the same
/// replicated tree is still inside its transaction (for example from a change
/// observer).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReentrancyPolicy {
    /// Queue it and run it as its own transaction right after the current one
    /// commits.
    #[default]
    Defer,
    /// Fail with [`CollabError::ReentrantPatch`].
    Reject,
}

/// `EngineConfig` holds the tunables of the patch engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Re-read the replicated tree after every patch and fail if it does not
    /// equal the intended state
    pub verify_patches: bool,

    /// Handling of patches issued while a transaction is in flight
    pub reentrancy: ReentrancyPolicy,

    /// Maximum number of deferred patches queued at once
    pub max_deferred_patches: usize,

    /// Origin attached to transactions whose caller supplied none
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_origin: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            verify_patches: true,
            reentrancy: ReentrancyPolicy::default(),
            max_deferred_patches: DEFAULT_MAX_DEFERRED_PATCHES,
            default_origin: None,
        }
    }
}

impl EngineConfig {
    /// Parse a config from TOML text. Missing fields take their defaults.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: EngineConfig = toml::from_str(contents)?;
        Ok(config)
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| CollabError::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_toml_str(&contents)
    }

    /// Load config from a specific path, returning defaults if it does not exist.
    pub fn load_from_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load_from(path)
        } else {
            log::debug!("no config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Save config to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Create parent directory if needed
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }
}

// ============================================================================
// Native-only implementation
// ============================================================================

#[cfg(not(target_arch = "wasm32"))]
impl EngineConfig {
    /// Get the config file path (~/.config/collabkit/config.toml)
    /// Only available on native platforms
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("collabkit").join("config.toml"))
    }

    /// Load config from default location, or return default if file doesn't exist
    /// Only available on native platforms
    pub fn load() -> Result<Self> {
        if let Some(path) = Self::config_path()
            && path.exists()
        {
            return Self::load_from(&path);
        }

        // Return default config if file doesn't exist
        Ok(EngineConfig::default())
    }

    /// Save config to default location
    /// Only available on native platforms
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path().ok_or(CollabError::NoConfigDir)?;
        self.save_to(&path)
    }
}
