//! Error types for the pb-app service layer.

use std::path::PathBuf;

/// Application error type that wraps errors from the backend crates
/// and gives the CLI a single error to report.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Failed to read config file: {path}")]
    ConfigFileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write config file: {path}")]
    ConfigFileWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Config validation failed: {0}")]
    Validation(String),

    #[error("Unsupported config version: {0}")]
    UnsupportedVersion(u32),

    #[error("Plant error: {0}")]
    Plant(String),

    #[error("Synthesis error: {0}")]
    Synthesis(String),

    #[error("Control error: {0}")]
    Control(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for pb-app operations.
pub type AppResult<T> = Result<T, AppError>;

// Conversions from backend error types
impl From<pb_plant::PlantError> for AppError {
    fn from(err: pb_plant::PlantError) -> Self {
        AppError::Plant(err.to_string())
    }
}

impl From<pb_synth::SynthError> for AppError {
    fn from(err: pb_synth::SynthError) -> Self {
        AppError::Synthesis(err.to_string())
    }
}

impl From<pb_control::ControlError> for AppError {
    fn from(err: pb_control::ControlError) -> Self {
        AppError::Control(err.to_string())
    }
}
