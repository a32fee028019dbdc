use crate::core::ranker::{RankOrder, SearchOptions};
use crate::diagnostics::ErrorLog;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Could not read config file {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config file {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Defaults for the command line, stored as JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub threshold: f64,
    pub count: i64,
    /// Where reports are written; the working directory when unset.
    pub report_dir: Option<PathBuf>,
    pub log_file: PathBuf,
    pub order: RankOrder,
    pub sorted_walk: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            threshold: 0.30,
            count: 10,
            report_dir: None,
            log_file: PathBuf::from(ErrorLog::DEFAULT_FILE),
            order: RankOrder::Walk,
            sorted_walk: false,
        }
    }
}

impl Config {
    /// `<config dir>/simimg/config.json`, e.g. `~/.config/simimg/config.json`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("simimg").join("config.json"))
    }

    /// Load `explicit` if given (it must exist), otherwise the default path
    /// if present, otherwise built-in defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        match explicit {
            Some(path) => Self::from_file(path),
            None => match Self::default_path() {
                Some(path) if path.is_file() => Self::from_file(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn search_options(&self) -> SearchOptions {
        SearchOptions {
            threshold: self.threshold,
            max_results: SearchOptions::max_results_from(self.count),
            order: self.order,
            sorted_walk: self.sorted_walk,
            persist_report: true,
            report_dir: self
                .report_dir
                .clone()
                .unwrap_or_else(|| PathBuf::from(".")),
        }
    }
}
