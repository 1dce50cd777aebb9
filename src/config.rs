//! Run configuration.
//!
//! Everything the engine needs is assembled once at startup into an immutable
//! [`RunConfig`] and passed by reference into the components; no module-global
//! state.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

/// Errors that can occur while building configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML configuration: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Unknown context mode: {0} (expected 'new' or 'day')")]
    InvalidContextMode(String),

    #[error("Action-space bucket count must be at least 1")]
    ZeroBins,
}

/// Which transcript context variant the predictions were produced with.
/// Recorded in the report; does not affect scoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContextMode {
    New,
    Day,
}

impl FromStr for ContextMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "new" => Ok(Self::New),
            "day" => Ok(Self::Day),
            _ => Err(ConfigError::InvalidContextMode(s.to_string())),
        }
    }
}

impl ContextMode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Day => "day",
        }
    }
}

/// Case selection: everything, one case by prefix, or a case and all after it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaseFilter {
    All,
    /// First case id starting with the prefix
    Exact(String),
    /// First matching case id and every id after it, in sorted order
    From(String),
}

impl CaseFilter {
    /// Parse the CLI form: `ALL`, an id prefix, or a prefix with trailing `+`
    #[must_use]
    pub fn parse(s: &str) -> Self {
        if s.eq_ignore_ascii_case("all") {
            Self::All
        } else if let Some(prefix) = s.strip_suffix('+') {
            Self::From(prefix.to_string())
        } else {
            Self::Exact(s.to_string())
        }
    }

    /// Apply the filter to a sorted id list
    #[must_use]
    pub fn select(&self, ids: &[String]) -> Vec<String> {
        match self {
            Self::All => ids.to_vec(),
            Self::Exact(prefix) => ids
                .iter()
                .find(|id| id.starts_with(prefix.as_str()))
                .cloned()
                .into_iter()
                .collect(),
            Self::From(prefix) => {
                match ids.iter().position(|id| id.starts_with(prefix.as_str())) {
                    Some(start) => ids[start..].to_vec(),
                    None => Vec::new(),
                }
            }
        }
    }

    /// Display form used in the report's `case` field
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::All => "ALL".to_string(),
            Self::Exact(prefix) => prefix.clone(),
            Self::From(prefix) => format!("{prefix}+"),
        }
    }
}

/// Tunable grading parameters, loadable from YAML
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GradingProfile {
    /// Target number of action-space quantile buckets
    #[serde(default = "default_action_space_bins")]
    pub action_space_bins: usize,
}

const fn default_action_space_bins() -> usize {
    7
}

impl Default for GradingProfile {
    fn default() -> Self {
        Self {
            action_space_bins: default_action_space_bins(),
        }
    }
}

impl GradingProfile {
    /// Load a grading profile from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if the
    /// bucket count is zero.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse a grading profile from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML cannot be parsed or the bucket count is
    /// zero.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let profile: Self = serde_yaml::from_str(yaml)?;
        if profile.action_space_bins == 0 {
            return Err(ConfigError::ZeroBins);
        }
        Ok(profile)
    }
}

/// Immutable configuration for one grading run
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Model identifier (may contain provider path segments)
    pub model: String,
    /// Prompt-configuration identifier
    pub prompt: String,
    pub context: Option<ContextMode>,
    /// Whether evidence descriptions were omitted from the prompts
    pub no_description: bool,
    pub case_filter: CaseFilter,
    /// Directory holding gold case files
    pub data_dir: PathBuf,
    /// Root under which per-run prediction directories live
    pub output_root: PathBuf,
    pub profile: GradingProfile,
}

impl RunConfig {
    /// Short model name: the last `/`-separated segment of the identifier
    #[must_use]
    pub fn model_short(&self) -> &str {
        self.model.rsplit('/').next().unwrap_or(&self.model)
    }

    /// Prediction directory for this run: `<output_root>/<model>_<prompt>`
    #[must_use]
    pub fn output_dir(&self) -> PathBuf {
        self.output_root
            .join(format!("{}_{}", self.model_short(), self.prompt))
    }
}
