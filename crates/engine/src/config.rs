//! Engine configuration.
//!
//! The configuration is optional: a missing file yields [`EngineConfig::default`]. The file is
//! looked up at `BPMN_IO_CONFIG` when set, otherwise under the user configuration directory.
//! Both YAML and JSON documents are accepted; the format is picked by file extension.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use dirs_next::config_dir;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Environment variable overriding the configuration file location.
pub const CONFIG_PATH_ENV: &str = "BPMN_IO_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Configuration error: {message}")]
    Invalid { message: String },
}

/// How the data-object store treats repeated writes to the same id.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WritePolicy {
    /// Later writes replace earlier ones. Parallel writers race in completion order.
    #[default]
    LastWriteWins,
    /// A second write to an id already written through this store is rejected.
    RejectOverwrite,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct EngineConfig {
    /// Script formats accepted by script parameter definitions, compared case-insensitively.
    pub supported_script_formats: Vec<String>,
    pub write_policy: WritePolicy,
    /// Default for activities that are not script tasks.
    pub allow_return_input_context: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            supported_script_formats: vec!["javascript".to_string()],
            write_policy: WritePolicy::default(),
            allow_return_input_context: false,
        }
    }
}

impl EngineConfig {
    pub fn supports_script_format(&self, format: &str) -> bool {
        self.supported_script_formats
            .iter()
            .any(|supported| supported.eq_ignore_ascii_case(format.trim()))
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(blank) = self.supported_script_formats.iter().position(|format| format.trim().is_empty()) {
            return Err(ConfigError::Invalid {
                message: format!("supported_script_formats[{blank}] is blank"),
            });
        }
        Ok(())
    }
}

/// Returns the default path for the engine configuration file.
pub fn default_config_path() -> PathBuf {
    if let Ok(path) = env::var(CONFIG_PATH_ENV)
        && !path.trim().is_empty()
    {
        return PathBuf::from(path);
    }

    config_dir().unwrap_or_else(|| PathBuf::from(".")).join("bpmn-io").join("engine.yaml")
}

/// Loads the engine configuration from the default path.
pub fn load_config() -> Result<EngineConfig, ConfigError> {
    load_config_from_path(&default_config_path())
}

/// Loads the engine configuration from a specific path.
pub fn load_config_from_path(path: &Path) -> Result<EngineConfig, ConfigError> {
    if !path.exists() {
        return Ok(EngineConfig::default());
    }

    let content = fs::read_to_string(path)?;
    let is_json = path
        .extension()
        .and_then(|extension| extension.to_str())
        .is_some_and(|extension| extension.eq_ignore_ascii_case("json"));
    let config: EngineConfig = if is_json {
        serde_json::from_str(&content)?
    } else if content.trim().is_empty() {
        EngineConfig::default()
    } else {
        serde_yaml::from_str(&content)?
    };
    config.validate()?;
    Ok(config)
}
