//! pb-core: shared foundation for polebalance.
//!
//! Contains:
//! - units (uom SI types + constructors)
//! - numeric (Real + tolerances + float and matrix helpers)
//! - timing (opt-in wall clock instrumentation)
//! - error (shared error types)

pub mod error;
pub mod numeric;
pub mod timing;
pub mod units;

pub use error::{PbError, PbResult};
pub use numeric::*;
pub use units::*;
