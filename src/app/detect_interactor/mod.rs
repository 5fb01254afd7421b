// Detect interactor - Container classification without parsing

use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

use crate::error::ProbeXResult;
use crate::ports::{FsPort, ProbePort};
use crate::probe::ContainerFormat;

/// Interactor for the detect use case
pub struct DetectInteractor {
    probe_port: Arc<dyn ProbePort>,
    fs_port: Arc<dyn FsPort>,
}

/// Classification of one input file
#[derive(Debug)]
pub struct Detection {
    pub path: PathBuf,
    pub format: ProbeXResult<ContainerFormat>,
}

impl DetectInteractor {
    pub fn new(probe_port: Arc<dyn ProbePort>, fs_port: Arc<dyn FsPort>) -> Self {
        Self {
            probe_port,
            fs_port,
        }
    }

    /// Sniff every input file, in input order
    pub async fn execute(&self, inputs: &[PathBuf]) -> ProbeXResult<Vec<Detection>> {
        let files = self.fs_port.expand_inputs(inputs).await?;
        info!(files = files.len(), "detecting container formats");
        let mut detections = Vec::with_capacity(files.len());
        for path in files {
            let format = self.probe_port.detect_format(&path).await;
            detections.push(Detection { path, format });
        }
        Ok(detections)
    }
}
