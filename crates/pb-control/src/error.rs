//! Error types for control operations.

use pb_plant::PlantError;
use pb_synth::SynthError;
use thiserror::Error;

/// Result type for control operations.
pub type ControlResult<T> = Result<T, ControlError>;

/// Errors that can occur in control operations.
///
/// Synthesis failures inside a tick are not errors: they come back in the
/// [`TickReport`](crate::TickReport) and the previous gain stays in force.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ControlError {
    /// Invalid argument provided to a control function.
    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    #[error("Dimension mismatch for {what}: expected {expected}, got {got}")]
    Dimension {
        what: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("Index {index} out of range for {what} (len {len})")]
    IndexOutOfRange {
        what: &'static str,
        index: usize,
        len: usize,
    },

    #[error("Synthesis error: {0}")]
    Synthesis(#[from] SynthError),

    #[error("Plant error: {0}")]
    Plant(#[from] PlantError),
}
