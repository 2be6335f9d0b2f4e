//! Plant capability trait and exact state snapshots.

use nalgebra::DVector;

use crate::error::PlantResult;

/// Full plant state, including everything outside the modeled subset.
///
/// Restoring a snapshot reproduces the saved coordinates bit for bit.
/// Derived quantities (accelerations, tip position) are not part of it; call
/// [`Plant::forward_dynamics`] after a restore to refresh them.
#[derive(Clone, Debug, PartialEq)]
pub struct PlantSnapshot {
    pub time: f64,
    pub qpos: Vec<f64>,
    pub qvel: Vec<f64>,
    pub ctrl: Vec<f64>,
    /// Externally applied forces, one per horizontal axis.
    pub applied: Vec<f64>,
}

/// Narrow interface the synthesis pipeline and controller use to reach the
/// physics backend.
///
/// State and control vectors are the reduced, modeled ones: `state_dim()`
/// and `control_dim()` entries ordered as the plant's layout specifies.
pub trait Plant {
    fn state_dim(&self) -> usize;

    fn control_dim(&self) -> usize;

    /// Current modeled state vector.
    fn state(&self) -> DVector<f64>;

    /// Overwrite the modeled coordinates; auxiliary coordinates are untouched.
    fn set_state(&mut self, x: &DVector<f64>) -> PlantResult<()>;

    /// Current control vector.
    fn control(&self) -> DVector<f64>;

    fn set_control(&mut self, u: &DVector<f64>) -> PlantResult<()>;

    /// Run one forward-dynamics evaluation at the current state and control.
    ///
    /// Refreshes cached derived quantities and returns the time derivative of
    /// the modeled state. Does not advance time.
    fn forward_dynamics(&mut self) -> PlantResult<DVector<f64>>;

    /// Advance the plant by `dt` seconds under the current control.
    fn step(&mut self, dt: f64) -> PlantResult<()>;

    fn save_snapshot(&self) -> PlantSnapshot;

    fn restore_snapshot(&mut self, snapshot: &PlantSnapshot) -> PlantResult<()>;
}
