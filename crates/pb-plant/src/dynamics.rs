//! Dynamics trait consumed by the fixed-step integrators.

use crate::error::PlantResult;

/// A system that can report `x_dot = f(t, x)` for the integrators.
///
/// Implementors must provide:
/// - State type (Clone, for intermediate stages)
/// - RHS computation
/// - Element-wise add and scalar scale of states
pub trait Dynamics {
    type State: Clone;

    /// Compute state derivative dxdt = f(t, x).
    ///
    /// Inputs held constant over a step (control, applied forces) are read
    /// from `self`. Takes `&mut self` so implementors may cache.
    fn rhs(&mut self, t: f64, x: &Self::State) -> PlantResult<Self::State>;

    /// Add two states element-wise: result = a + b.
    fn add(&self, a: &Self::State, b: &Self::State) -> Self::State;

    /// Scale a state by a scalar: result = scale * a.
    fn scale(&self, a: &Self::State, scale: f64) -> Self::State;
}
