// Native probe adapter - Runs the in-crate parsers on the blocking pool

use std::path::Path;

use async_trait::async_trait;

use crate::domain::model::{AnalyzeOptions, Report};
use crate::engine::{self, AnalysisUnit};
use crate::error::{ProbeXError, ProbeXResult};
use crate::ports::ProbePort;
use crate::probe::{sniff_path, ContainerFormat};

/// Probe adapter backed by the native container parsers
///
/// Parsing is synchronous file I/O, so every call runs on
/// `tokio::task::spawn_blocking`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeProbeAdapter;

impl NativeProbeAdapter {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ProbePort for NativeProbeAdapter {
    async fn analyze_unit(
        &self,
        unit: AnalysisUnit,
        options: AnalyzeOptions,
    ) -> ProbeXResult<Report> {
        tokio::task::spawn_blocking(move || engine::analyze_unit(&unit, &options))
            .await
            .map_err(|e| ProbeXError::Worker {
                message: e.to_string(),
            })?
    }

    async fn detect_format(&self, path: &Path) -> ProbeXResult<ContainerFormat> {
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || sniff_path(&path))
            .await
            .map_err(|e| ProbeXError::Worker {
                message: e.to_string(),
            })?
    }
}
