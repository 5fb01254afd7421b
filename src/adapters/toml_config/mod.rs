// TOML config adapter - Configuration management using TOML files

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, info};

use crate::error::{ProbeXError, ProbeXResult};
use crate::ports::{ConfigPort, FileSettings};

/// File name looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "probex.toml";

/// Top-level layout: every setting lives under `[probex]`
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigDocument {
    probex: FileSettings,
}

/// TOML configuration adapter
#[derive(Debug, Clone)]
pub struct TomlConfigAdapter {
    default_path: PathBuf,
}

impl Default for TomlConfigAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl TomlConfigAdapter {
    /// Adapter reading `probex.toml` from the working directory by default
    pub fn new() -> Self {
        Self {
            default_path: PathBuf::from(DEFAULT_CONFIG_FILE),
        }
    }

    /// Adapter with a different default location
    pub fn with_default_path(path: impl Into<PathBuf>) -> Self {
        Self {
            default_path: path.into(),
        }
    }

    /// Parse settings from TOML text
    pub fn parse(toml_content: &str) -> ProbeXResult<FileSettings> {
        let document: ConfigDocument =
            toml::from_str(toml_content).map_err(|e| ProbeXError::InvalidConfig {
                message: format!("Failed to parse TOML config: {}", e),
            })?;
        Ok(document.probex)
    }
}

impl ConfigPort for TomlConfigAdapter {
    fn load_file(&self, path: &Path) -> ProbeXResult<FileSettings> {
        let content = std::fs::read_to_string(path).map_err(|e| ProbeXError::InvalidConfig {
            message: format!("Failed to read config file {}: {}", path.display(), e),
        })?;
        let settings = Self::parse(&content)?;
        info!(path = %path.display(), "loaded configuration file");
        Ok(settings)
    }

    fn load_default(&self) -> ProbeXResult<Option<FileSettings>> {
        if !self.default_path.is_file() {
            debug!(path = %self.default_path.display(), "no default configuration file");
            return Ok(None);
        }
        self.load_file(&self.default_path).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_probex_table() {
        let settings = TomlConfigAdapter::parse(
            r#"
            [probex]
            parse_speed = 1.0
            continuous_file_names = true
            workers = 2
            output = "json"
            "#,
        )
        .unwrap();
        assert_eq!(settings.parse_speed, Some(1.0));
        assert_eq!(settings.continuous_file_names, Some(true));
        assert_eq!(settings.workers, Some(2));
        assert_eq!(settings.output.as_deref(), Some("json"));
        assert_eq!(settings.max_files, None);
    }

    #[test]
    fn test_empty_document_is_all_defaults() {
        assert_eq!(TomlConfigAdapter::parse("").unwrap(), FileSettings::default());
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        let err = TomlConfigAdapter::parse("[probex]\ncrf = 18\n").unwrap_err();
        assert!(matches!(err, ProbeXError::InvalidConfig { .. }));
    }

    #[test]
    fn test_missing_default_file_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = TomlConfigAdapter::with_default_path(dir.path().join("probex.toml"));
        assert_eq!(adapter.load_default().unwrap(), None);

        std::fs::write(dir.path().join("probex.toml"), "[probex]\nmax_files = 3\n").unwrap();
        let settings = adapter.load_default().unwrap().unwrap();
        assert_eq!(settings.max_files, Some(3));
    }
}
