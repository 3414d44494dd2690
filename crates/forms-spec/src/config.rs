//! Engine configuration.
//!
//! Loaded from a JSON file given explicitly or through `FORMS_CONFIG`;
//! `FORMS_DEAD_END` overrides the dead-end policy.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{FormsError, Result};

pub const CONFIG_ENV: &str = "FORMS_CONFIG";
pub const DEAD_END_ENV: &str = "FORMS_DEAD_END";

/// What routing does when a step has no eligible transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum DeadEndPolicy {
    /// Only steps flagged `is_final` end the form; other dead ends are errors.
    #[default]
    Error,
    /// Any step without an eligible transition ends the form.
    Finish,
}

impl FromStr for DeadEndPolicy {
    type Err = FormsError;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_lowercase().as_str() {
            "error" => Ok(DeadEndPolicy::Error),
            "finish" => Ok(DeadEndPolicy::Finish),
            other => Err(FormsError::Config(format!(
                "dead-end policy must be 'error' or 'finish', got '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
pub struct EngineConfig {
    #[serde(default)]
    pub dead_end: DeadEndPolicy,
    /// Built-in validators to leave out of the registry.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub disabled_validators: Vec<String>,
    /// `tracing` filter used by the command line when logging is enabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_filter: Option<String>,
}

impl EngineConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        if contents.trim().is_empty() {
            return Ok(EngineConfig::default());
        }
        serde_json::from_str(&contents)
            .map_err(|err| FormsError::Config(format!("{}: {}", path.display(), err)))
    }

    /// Resolves the configuration from an explicit path, `FORMS_CONFIG`, or defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = explicit
            .map(Path::to_path_buf)
            .or_else(|| env::var_os(CONFIG_ENV).map(PathBuf::from));
        let mut config = match path {
            Some(path) => Self::from_file(&path)?,
            None => EngineConfig::default(),
        };
        if let Ok(raw) = env::var(DEAD_END_ENV) {
            config.dead_end = raw.parse()?;
        }
        Ok(config)
    }

    pub fn is_validator_enabled(&self, name: &str) -> bool {
        !self.disabled_validators.iter().any(|disabled| disabled == name)
    }
}
