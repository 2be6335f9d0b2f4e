//! Online LQR synthesis for the pole balancer.
//!
//! Pipeline, leaves first:
//! - `jacobian`: forward and central finite-difference Jacobians
//! - `linearize`: A, B of a [`Plant`](pb_plant::Plant) about an operating point,
//!   with exact save/restore of the plant state
//! - `care`: stabilizing solution of the continuous-time algebraic Riccati
//!   equation from the Hamiltonian's stable invariant subspace
//! - `gain`: K = R⁻¹BᵗP and closed-loop diagnostics
//! - `pipeline`: the three stages chained into a [`SynthesisContext`]

pub mod care;
pub mod error;
pub mod gain;
pub mod jacobian;
pub mod linearize;
pub mod pipeline;

pub use care::{CareMethod, care_residual, hamiltonian, solve_care, solve_care_with};
pub use error::{SynthError, SynthResult};
pub use gain::{closed_loop_poles, compute_gain, lqr, spectral_abscissa};
pub use jacobian::DifferenceScheme;
pub use linearize::{Linearization, OperatingPoint, linearize, linearize_with};
pub use pipeline::{SynthesisContext, SynthesisOptions, synthesize};
