//! Report renderers
//!
//! Renderers are read-only projections of the report model. The tool name
//! and version are passed in explicitly.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::model::{AppInfo, Report};
use crate::error::{ProbeXError, ProbeXResult};

pub mod json;
pub mod text;

/// Output format of the inspect command
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputFormat {
    /// Aligned `Name : value` blocks
    #[default]
    Text,
    Json,
    Yaml,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Text => "text",
            OutputFormat::Json => "json",
            OutputFormat::Yaml => "yaml",
        }
    }
}

impl FromStr for OutputFormat {
    type Err = ProbeXError;

    fn from_str(format: &str) -> Result<Self, Self::Err> {
        match format.to_ascii_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "yaml" | "yml" => Ok(OutputFormat::Yaml),
            _ => Err(ProbeXError::InvalidConfig {
                message: format!("Invalid output format: {}. Valid formats: text, json, yaml", format),
            }),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Render reports in the requested format
pub fn render(reports: &[Report], format: OutputFormat, app: &AppInfo) -> ProbeXResult<String> {
    match format {
        OutputFormat::Text => Ok(text::render(reports)),
        OutputFormat::Json => json::to_json(reports, app),
        OutputFormat::Yaml => json::to_yaml(reports, app),
    }
}
