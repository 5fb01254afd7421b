// Ports - Interface definitions (contracts)

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::domain::model::{AnalyzeOptions, Report};
use crate::engine::AnalysisUnit;
use crate::error::ProbeXResult;
use crate::probe::ContainerFormat;

/// Port for container analysis
#[async_trait]
pub trait ProbePort: Send + Sync {
    /// Analyze one unit into a report
    async fn analyze_unit(
        &self,
        unit: AnalysisUnit,
        options: AnalyzeOptions,
    ) -> ProbeXResult<Report>;

    /// Classify a file by its leading bytes only
    async fn detect_format(&self, path: &Path) -> ProbeXResult<ContainerFormat>;
}

/// Port for file system operations
#[async_trait]
pub trait FsPort: Send + Sync {
    /// Expand directories into the files below them, sorted; files pass through
    async fn expand_inputs(&self, inputs: &[PathBuf]) -> ProbeXResult<Vec<PathBuf>>;
}

/// Settings read from a configuration file; every key is optional
#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileSettings {
    pub parse_speed: Option<f64>,
    pub continuous_file_names: Option<bool>,
    pub max_files: Option<usize>,
    pub workers: Option<usize>,
    pub output: Option<String>,
    pub log_level: Option<String>,
    pub log_format: Option<String>,
}

/// Port for configuration files
pub trait ConfigPort: Send + Sync {
    /// Load settings from an explicit file
    fn load_file(&self, path: &Path) -> ProbeXResult<FileSettings>;

    /// Load settings from the default location, if a file is there
    fn load_default(&self) -> ProbeXResult<Option<FileSettings>>;
}
