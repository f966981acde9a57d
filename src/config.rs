//! Engine configuration, stored as TOML.
//!
//! ```toml
//! data_dir = "/var/lib/terms"
//! transactional = true
//! autocommit = true
//! bootstrap_now = 0
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, TermsResult};

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Data directory for persistence. `None` for memory-only mode.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
    /// Run each mutation against a snapshot restored on failure. Taking the
    /// snapshot clones the whole network. When off, a failure partway through
    /// a rule cascade leaves the facts asserted before it in place.
    #[serde(default = "default_true")]
    pub transactional: bool,
    /// Commit to the store after every successful mutation. Each commit
    /// serializes the whole network, so bulk loads should turn this off and
    /// call `Engine::persist` once at the end.
    #[serde(default = "default_true")]
    pub autocommit: bool,
    /// Time asserted as `(now subj T)` when a fresh store is bootstrapped.
    #[serde(default)]
    pub bootstrap_now: Option<f64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            transactional: default_true(),
            autocommit: default_true(),
            bootstrap_now: None,
        }
    }
}

impl EngineConfig {
    /// Memory-only config with every other field at its default.
    pub fn memory() -> Self {
        Self::default()
    }

    /// Persistent config rooted at `dir`.
    pub fn persistent(dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: Some(dir.into()),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> TermsResult<()> {
        if let Some(now) = self.bootstrap_now {
            if !now.is_finite() {
                return Err(EngineError::InvalidConfig {
                    message: format!("bootstrap_now must be finite, got {now}"),
                }
                .into());
            }
        }
        if let Some(dir) = &self.data_dir {
            if dir.as_os_str().is_empty() {
                return Err(EngineError::InvalidConfig {
                    message: "data_dir must not be empty".into(),
                }
                .into());
            }
        }
        Ok(())
    }

    /// Load from a TOML file.
    pub fn load(path: &Path) -> TermsResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| EngineError::Config {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let config: Self = toml::from_str(&content).map_err(|e| EngineError::Config {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Save to a TOML file, creating parent directories.
    pub fn save(&self, path: &Path) -> TermsResult<()> {
        let content = toml::to_string_pretty(self).map_err(|e| EngineError::Config {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|_| EngineError::DataDir {
                path: parent.display().to_string(),
            })?;
        }
        std::fs::write(path, content).map_err(|e| EngineError::Config {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Ok(())
    }
}
