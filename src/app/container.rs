use std::sync::Arc;

use crate::adapters::{FsLocalAdapter, NativeProbeAdapter};
use crate::app::{AnalyzeInteractor, DetectInteractor};
use crate::ports::{FsPort, ProbePort};

pub trait AppContainer: Send + Sync {
    fn analyze_interactor(&self) -> Arc<AnalyzeInteractor>;
    fn detect_interactor(&self) -> Arc<DetectInteractor>;
}

pub struct DefaultAppContainer {
    analyze_interactor: Arc<AnalyzeInteractor>,
    detect_interactor: Arc<DetectInteractor>,
}

impl DefaultAppContainer {
    pub fn new() -> Self {
        let probe_port = Arc::new(NativeProbeAdapter::new());
        let fs_port = Arc::new(FsLocalAdapter::new());

        let analyze_interactor = Arc::new(AnalyzeInteractor::new(
            Arc::clone(&probe_port) as Arc<dyn ProbePort>,
            Arc::clone(&fs_port) as Arc<dyn FsPort>,
        ));

        let detect_interactor = Arc::new(DetectInteractor::new(
            Arc::clone(&probe_port) as Arc<dyn ProbePort>,
            Arc::clone(&fs_port) as Arc<dyn FsPort>,
        ));

        Self {
            analyze_interactor,
            detect_interactor,
        }
    }
}

impl Default for DefaultAppContainer {
    fn default() -> Self {
        Self::new()
    }
}

impl AppContainer for DefaultAppContainer {
    fn analyze_interactor(&self) -> Arc<AnalyzeInteractor> {
        Arc::clone(&self.analyze_interactor)
    }

    fn detect_interactor(&self) -> Arc<DetectInteractor> {
        Arc::clone(&self.detect_interactor)
    }
}
