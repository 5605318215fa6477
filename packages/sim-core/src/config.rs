//! Simulator configuration.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SimError;

/// How operation failures reach the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorMode {
    /// Errors are returned as `Err`
    #[default]
    Raise,
    /// Errors are converted into `{"exceptionType", "message"}` values
    ErrorDict,
}

impl FromStr for ErrorMode {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "raise" => Ok(ErrorMode::Raise),
            "error_dict" => Ok(ErrorMode::ErrorDict),
            other => Err(SimError::InvalidInput(format!(
                "Invalid error mode '{}'. Expected 'raise' or 'error_dict'",
                other
            ))),
        }
    }
}

impl fmt::Display for ErrorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorMode::Raise => write!(f, "raise"),
            ErrorMode::ErrorDict => write!(f, "error_dict"),
        }
    }
}

/// Simulator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Directory holding state files
    pub data_dir: PathBuf,
    /// Default state file name inside `data_dir`
    pub state_file: String,
    /// Error delivery mode for operations
    pub error_mode: ErrorMode,
    /// Page size used when a list call does not specify one
    pub default_page_size: usize,
    /// Maximum retry attempts for transient I/O errors
    pub persistence_max_retries: u32,
    /// Delay between retry attempts in milliseconds
    pub persistence_retry_delay_ms: u64,
    /// Validate registered schemas when loading state
    pub validate_on_load: bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            state_file: "state.json".to_string(),
            error_mode: ErrorMode::Raise,
            default_page_size: 25,
            persistence_max_retries: 3,      // Default retry attempts
            persistence_retry_delay_ms: 100, // 100ms delay between retries
            validate_on_load: true,
        }
    }
}

impl SimConfig {
    /// Loads configuration from a TOML file, then applies `APISIM_*` overrides.
    ///
    /// Missing keys fall back to [`SimConfig::default`].
    pub fn from_toml_file(path: &Path) -> Result<Self, SimError> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            SimError::Io(format!("Failed to read config {}: {}", path.display(), e))
        })?;
        let mut config = Self::from_toml_str(&contents)?;
        config.apply_env()?;
        Ok(config)
    }

    /// Parses configuration from TOML text without environment overrides.
    pub fn from_toml_str(contents: &str) -> Result<Self, SimError> {
        toml::from_str(contents)
            .map_err(|e| SimError::Serialization(format!("Failed to parse config: {}", e)))
    }

    /// Default configuration with `APISIM_*` environment overrides applied.
    pub fn from_env() -> Result<Self, SimError> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Applies `APISIM_DATA_DIR`, `APISIM_ERROR_MODE` and
    /// `APISIM_DEFAULT_PAGE_SIZE` when set.
    pub fn apply_env(&mut self) -> Result<(), SimError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), SimError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup("APISIM_DATA_DIR") {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(mode) = lookup("APISIM_ERROR_MODE") {
            self.error_mode = mode.parse()?;
        }
        if let Some(size) = lookup("APISIM_DEFAULT_PAGE_SIZE") {
            self.default_page_size = size.trim().parse().map_err(|_| {
                SimError::InvalidInput(format!("Invalid APISIM_DEFAULT_PAGE_SIZE '{}'", size))
            })?;
        }
        Ok(())
    }

    /// Full path of the default state file.
    pub fn state_path(&self) -> PathBuf {
        self.data_dir.join(&self.state_file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = SimConfig::from_toml_str(
            r#"
            data_dir = "/tmp/sim"
            error_mode = "error_dict"
            "#,
        )
        .unwrap();

        assert_eq!(config.data_dir, PathBuf::from("/tmp/sim"));
        assert_eq!(config.error_mode, ErrorMode::ErrorDict);
        assert_eq!(config.default_page_size, 25);
        assert_eq!(config.state_path(), PathBuf::from("/tmp/sim/state.json"));
    }

    #[test]
    fn test_overrides() {
        let mut config = SimConfig::default();
        config
            .apply_overrides(|key| match key {
                "APISIM_ERROR_MODE" => Some("error_dict".to_string()),
                "APISIM_DEFAULT_PAGE_SIZE" => Some("10".to_string()),
                _ => None,
            })
            .unwrap();

        assert_eq!(config.error_mode, ErrorMode::ErrorDict);
        assert_eq!(config.default_page_size, 10);
        assert_eq!(config.data_dir, PathBuf::from("./data"));
    }

    #[test]
    fn test_invalid_override_rejected() {
        let mut config = SimConfig::default();
        let err = config
            .apply_overrides(|key| (key == "APISIM_ERROR_MODE").then(|| "loud".to_string()))
            .unwrap_err();
        assert!(matches!(err, SimError::InvalidInput(_)));
    }

    #[test]
    fn test_error_mode_round_trip_names() {
        assert_eq!("raise".parse::<ErrorMode>().unwrap(), ErrorMode::Raise);
        assert_eq!(ErrorMode::ErrorDict.to_string(), "error_dict");
    }
}
