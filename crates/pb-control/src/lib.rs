//! Closed-loop control for the pole balancer.
//!
//! The controller owns the most recent synthesis result and applies
//! u = −K(x − x_ref) every tick. Cost weights live in a [`WeightConfig`]
//! whose change flag is edge-triggered: the controller resynthesizes once
//! per change, between ticks, and keeps the previous gain if that fails.

pub mod controller;
pub mod error;
pub mod weights;

pub use controller::{ControllerPhase, LqrController, SynthesisOutcome, TickReport};
pub use error::{ControlError, ControlResult};
pub use weights::{AxisPenalties, WeightConfig};
