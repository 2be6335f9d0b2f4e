//! Error types for plant operations.

use thiserror::Error;

/// Errors raised at the plant boundary.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlantError {
    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    #[error("Dimension mismatch for {what}: expected {expected}, got {got}")]
    Dimension {
        what: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("Unknown joint: {name}")]
    UnknownJoint { name: String },

    #[error("Non-physical condition: {what}")]
    NonPhysical { what: &'static str },

    #[error("Snapshot does not belong to this plant: {what}")]
    SnapshotMismatch { what: &'static str },
}

pub type PlantResult<T> = Result<T, PlantError>;

impl From<pb_core::PbError> for PlantError {
    fn from(e: pb_core::PbError) -> Self {
        match e {
            pb_core::PbError::Dimension {
                what,
                expected,
                got,
            } => PlantError::Dimension {
                what,
                expected,
                got,
            },
            pb_core::PbError::NonFinite { what, .. } => PlantError::NonPhysical { what },
        }
    }
}
