// Application layer - Use case interactors

pub mod analyze_interactor;
pub mod container;
pub mod detect_interactor;

// Re-export interactors
pub use analyze_interactor::{AnalyzeInteractor, AnalyzeOutcome, AnalyzeRequest, UnitFailure};
pub use container::{AppContainer, DefaultAppContainer};
pub use detect_interactor::{DetectInteractor, Detection};
