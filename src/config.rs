//! Persistent settings from `.token-guard.json`.
//!
//! The file is looked up in the current directory first, then in the home
//! directory. The first file that parses wins. Anything it does not set
//! falls back to the built-in defaults, and command-line flags override it.
//!
//! ```json
//! {
//!   "defaultBudget": 50000,
//!   "warnPercent": 80,
//!   "models": {
//!     "custom-model": { "input": 5.00, "output": 15.00 }
//!   }
//! }
//! ```

use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::budget::{PricingEntry, DEFAULT_WARN_PERCENT};
use crate::error::{GuardError, Result};

/// Name of the config file in both lookup locations.
pub const CONFIG_FILENAME: &str = ".token-guard.json";

/// Contents of a config file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileConfig {
    /// Token budget used when `--budget` is not given
    #[serde(default)]
    pub default_budget: Option<u64>,

    /// Cost limit used when `--cost-limit` is not given
    #[serde(default)]
    pub default_cost_limit: Option<f64>,

    #[serde(default = "default_warn_percent")]
    pub warn_percent: f64,

    /// Extra or replacement pricing entries, keyed by model name
    #[serde(default)]
    pub models: BTreeMap<String, PricingEntry>,
}

fn default_warn_percent() -> f64 {
    DEFAULT_WARN_PERCENT
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            default_budget: None,
            default_cost_limit: None,
            warn_percent: DEFAULT_WARN_PERCENT,
            models: BTreeMap::new(),
        }
    }
}

/// Load the config from the standard locations.
pub fn load_config() -> FileConfig {
    load_from(&candidate_paths())
}

/// Load the first usable config among `paths`.
///
/// Missing files are skipped silently; unreadable or malformed ones are
/// skipped with a warning.
pub fn load_from(paths: &[PathBuf]) -> FileConfig {
    for path in paths {
        if !path.is_file() {
            continue;
        }
        match read_config(path) {
            Ok(config) => {
                debug!(path = %path.display(), "loaded config");
                return config;
            }
            Err(err) => warn!(error = %err, "ignoring config file"),
        }
    }
    FileConfig::default()
}

/// Parse one config file.
pub fn read_config(path: &Path) -> Result<FileConfig> {
    let content = fs::read_to_string(path).map_err(|e| GuardError::Config {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    serde_json::from_str(&content).map_err(|e| GuardError::Config {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Lookup order: current directory, then home directory.
pub fn candidate_paths() -> Vec<PathBuf> {
    let mut paths = Vec::with_capacity(2);
    if let Ok(cwd) = std::env::current_dir() {
        paths.push(cwd.join(CONFIG_FILENAME));
    }
    if let Some(home) = dirs::home_dir() {
        paths.push(home.join(CONFIG_FILENAME));
    }
    paths
}

/// Where the persistent (home directory) config lives.
pub fn config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(CONFIG_FILENAME))
}
