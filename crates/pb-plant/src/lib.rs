//! Plant boundary for the pole balancer.
//!
//! Provides:
//! - The `Plant` capability trait consumed by linearization and control
//! - Exact snapshot/restore of the full plant state
//! - Joint lookup table resolved once at plant construction
//! - Analytic cart-pole backend (platform on two slides, pole on two hinges)
//! - Fixed-step RK4 and forward Euler integrators

pub mod axis;
pub mod cartpole;
pub mod dynamics;
pub mod error;
pub mod integrator;
pub mod plant;

pub use axis::{Axis, AxisSet, AxisTable, JointAddr, SlotKind, StateLayout, StateSlot};
pub use cartpole::{CartPoleParams, CartPolePlant};
pub use dynamics::Dynamics;
pub use error::{PlantError, PlantResult};
pub use integrator::{ForwardEuler, Integrator, IntegratorType, RK4};
pub use plant::{Plant, PlantSnapshot};
