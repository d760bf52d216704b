//! Configuration stored in simstore.yaml
//!
//! ```yaml
//! output_path: ap_output
//! display: true
//! log_level: info
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use color_eyre::eyre::{WrapErr, eyre};
use serde::{Deserialize, Serialize};
use simstore_core::DEFAULT_OUTPUT_PATH;

pub const CONFIG_FILE_NAME: &str = "simstore.yaml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base directory holding the experiment directories
    pub output_path: PathBuf,
    /// Report save/load progress at info level
    pub display: bool,
    /// Default log level (debug, info, warn, error)
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_path: PathBuf::from(DEFAULT_OUTPUT_PATH),
            display: true,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// `{config_dir}/simstore/simstore.yaml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("simstore").join(CONFIG_FILE_NAME))
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, serde_saphyr::Error> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_saphyr::from_str(yaml)
    }

    pub fn to_yaml(&self) -> Result<String, serde_saphyr::ser::Error> {
        serde_saphyr::to_string(self)
    }

    /// Read the configuration file.
    ///
    /// An explicit path must exist. Without one the default location is
    /// tried and a missing file gives the defaults.
    pub fn load(path: Option<&Path>) -> color_eyre::Result<Self> {
        let path = match path {
            Some(path) if !path.exists() => {
                return Err(eyre!("Config file not found: {}", path.display()));
            }
            Some(path) => path.to_path_buf(),
            None => match Self::default_path() {
                Some(path) if path.exists() => path,
                _ => return Ok(Self::default()),
            },
        };

        let content = fs::read_to_string(&path)
            .wrap_err_with(|| format!("Failed to read {}", path.display()))?;
        let config = Self::from_yaml(&content)
            .wrap_err_with(|| format!("Failed to parse {}", path.display()))?;
        tracing::debug!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Apply command line overrides
    pub fn with_overrides(mut self, output_path: Option<PathBuf>, log_level: Option<String>) -> Self {
        if let Some(output_path) = output_path {
            self.output_path = output_path;
        }
        if let Some(log_level) = log_level {
            self.log_level = log_level;
        }
        self
    }
}
