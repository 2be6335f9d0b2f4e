//! Error types for synthesis operations.

use pb_core::PbError;
use pb_plant::PlantError;
use thiserror::Error;

/// Errors that can occur while synthesizing a feedback gain.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SynthError {
    #[error("Control cost matrix R is not invertible")]
    SingularR,

    #[error(
        "Stable eigenspace has dimension {found}, expected {expected}; \
         the pair is not stabilizable/detectable for these weights"
    )]
    WrongEigenspaceDimension { found: usize, expected: usize },

    #[error("Stable eigenvector basis is singular")]
    SingularEigenbasis,

    #[error("Hamiltonian has no stable/unstable dichotomy: {what}")]
    NoDichotomy { what: &'static str },

    #[error("Eigen decomposition failed: {what}")]
    EigenDecomposition { what: &'static str },

    #[error("Closed loop is not stable (max real part {max_real_part})")]
    NotStabilizing { max_real_part: f64 },

    #[error("Dimension mismatch for {what}: expected {expected}, got {got}")]
    Dimension {
        what: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    #[error("Numeric error: {0}")]
    Numeric(#[from] PbError),

    #[error("Plant error: {0}")]
    Plant(#[from] PlantError),
}

pub type SynthResult<T> = Result<T, SynthError>;
