// Analyze interactor - Orchestrates batch analysis of media files

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::domain::model::{AnalyzeOptions, Report};
use crate::error::{ProbeXError, ProbeXResult};
use crate::planner::{plan_units, DiskLookup};
use crate::ports::{FsPort, ProbePort};

/// Interactor for the batch analysis use case
pub struct AnalyzeInteractor {
    probe_port: Arc<dyn ProbePort>,
    fs_port: Arc<dyn FsPort>,
}

impl AnalyzeInteractor {
    /// Create new analyze interactor with injected ports
    pub fn new(probe_port: Arc<dyn ProbePort>, fs_port: Arc<dyn FsPort>) -> Self {
        Self {
            probe_port,
            fs_port,
        }
    }

    /// Analyze every input and return reports in input order
    ///
    /// Units run concurrently, at most `workers` at a time. A failing unit
    /// is recorded and the rest continue; the call only fails when no unit
    /// produced a report.
    pub async fn execute(&self, request: AnalyzeRequest) -> ProbeXResult<AnalyzeOutcome> {
        request.options.validate()?;
        let files = self.fs_port.expand_inputs(&request.inputs).await?;
        let units = plan_units(&files, &request.options, DiskLookup);
        info!(
            files = files.len(),
            units = units.len(),
            workers = request.workers,
            "starting analysis"
        );

        let semaphore = Arc::new(Semaphore::new(request.workers.max(1)));
        let mut pending = Vec::with_capacity(units.len());
        for unit in units {
            let path = unit.primary().display().to_string();
            let semaphore = Arc::clone(&semaphore);
            let probe_port = Arc::clone(&self.probe_port);
            let options = request.options.clone();
            let handle = tokio::spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|e| ProbeXError::Worker {
                        message: e.to_string(),
                    })?;
                probe_port.analyze_unit(unit, options).await
            });
            pending.push((path, handle));
        }

        // Awaiting in spawn order keeps the input order
        let mut outcome = AnalyzeOutcome::default();
        for (path, handle) in pending {
            let result = match handle.await {
                Ok(result) => result,
                Err(e) => Err(ProbeXError::Worker {
                    message: e.to_string(),
                }),
            };
            match result {
                Ok(report) => {
                    if !report.is_empty() {
                        outcome.success_count += 1;
                    }
                    outcome.reports.push(report);
                }
                Err(error) => {
                    warn!(path = %path, %error, "unit failed");
                    outcome.failures.push(UnitFailure {
                        path,
                        message: error.to_string(),
                    });
                }
            }
        }

        if outcome.success_count == 0 {
            return Err(ProbeXError::NothingAnalyzed {
                failures: outcome.failures.len(),
                first_error: outcome
                    .failures
                    .first()
                    .map(|f| format!("{}: {}", f.path, f.message))
                    .unwrap_or_else(|| "no input files".to_string()),
            });
        }
        info!(
            reports = outcome.reports.len(),
            failed = outcome.failures.len(),
            "analysis completed"
        );
        Ok(outcome)
    }
}

/// Request for batch analysis
#[derive(Debug, Clone)]
pub struct AnalyzeRequest {
    /// Files and directories, in the order reports should come back
    pub inputs: Vec<PathBuf>,
    pub options: AnalyzeOptions,
    /// Units analyzed at the same time
    pub workers: usize,
}

impl AnalyzeRequest {
    /// Create a request using one worker per CPU
    pub fn new(inputs: Vec<PathBuf>, options: AnalyzeOptions) -> Self {
        Self {
            inputs,
            options,
            workers: num_cpus::get(),
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }
}

/// A unit that could not be analyzed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnitFailure {
    pub path: String,
    pub message: String,
}

/// Result of a batch
#[derive(Debug, Clone, Default)]
pub struct AnalyzeOutcome {
    /// One report per successful unit, in input order
    pub reports: Vec<Report>,
    /// Units that produced a non-empty report
    pub success_count: usize,
    pub failures: Vec<UnitFailure>,
}
