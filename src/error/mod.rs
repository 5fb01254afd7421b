//! Error handling module for ProbeX

use thiserror::Error;

/// Main error type for ProbeX operations
#[derive(Error, Debug)]
pub enum ProbeXError {
    /// Input file not found or inaccessible
    #[error("Input file not found: {path}")]
    InputFileNotFound { path: String },

    /// I/O failure while opening or reading one unit
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Parse speed outside the accepted range
    #[error("Invalid parse speed: {value}. Expected a number between 0.0 and 1.0")]
    InvalidParseSpeed { value: f64 },

    /// Configuration file or environment value could not be used
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// Report serialization error
    #[error("Failed to serialize report: {message}")]
    Serialization { message: String },

    /// Every unit of the batch failed
    #[error("No file could be analyzed ({failures} failed): {first_error}")]
    NothingAnalyzed { failures: usize, first_error: String },

    /// Background worker failed to complete
    #[error("Analysis worker failed: {message}")]
    Worker { message: String },

    /// I/O error without path context
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl ProbeXError {
    /// Attach a path to an I/O error
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::NotFound {
            return ProbeXError::InputFileNotFound { path: path.into() };
        }
        ProbeXError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type alias for ProbeX operations
pub type ProbeXResult<T> = std::result::Result<T, ProbeXError>;
