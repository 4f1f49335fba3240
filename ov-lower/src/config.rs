//! Delegate options.

use std::fs;
use std::path::{Path, PathBuf};

use log::LevelFilter;
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid options: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DelegateOptions {
    /// 0 warnings only, 1 info, 2 debug, 3 and above trace.
    pub debug_level: u8,
    /// Engine device the lowered model is compiled for.
    pub device: String,
    pub plugins_path: PathBuf,
}

impl Default for DelegateOptions {
    fn default() -> Self {
        Self {
            debug_level: 0,
            device: "CPU".to_string(),
            plugins_path: PathBuf::from("/tmp/plugins.xml"),
        }
    }
}

impl DelegateOptions {
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    pub fn log_level(&self) -> LevelFilter {
        match self.debug_level {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }
}
