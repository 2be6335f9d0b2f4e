//! Numerical linearization of a plant about an operating point.

use nalgebra::{DMatrix, DVector};
use pb_plant::Plant;
use tracing::debug;

use crate::error::{SynthError, SynthResult};
use crate::jacobian::{DifferenceScheme, jacobian};

/// Reference perturbation for plant linearization.
pub const DEFAULT_EPSILON: f64 = 1e-6;

/// Perturbations above this no longer describe a local slope.
pub const MAX_EPSILON: f64 = 1e-1;

/// State/control pair the plant is linearized about.
#[derive(Clone, Debug, PartialEq)]
pub struct OperatingPoint {
    pub x0: DVector<f64>,
    pub u0: DVector<f64>,
}

impl OperatingPoint {
    /// Upright equilibrium: zero state, zero control.
    pub fn upright(state_dim: usize, control_dim: usize) -> Self {
        Self {
            x0: DVector::zeros(state_dim),
            u0: DVector::zeros(control_dim),
        }
    }

    /// Upright equilibrium sized for `plant`.
    pub fn upright_for<P: Plant + ?Sized>(plant: &P) -> Self {
        Self::upright(plant.state_dim(), plant.control_dim())
    }
}

/// Jacobians of the state derivative at an operating point.
#[derive(Clone, Debug, PartialEq)]
pub struct Linearization {
    /// ∂f/∂x, n×n
    pub a: DMatrix<f64>,
    /// ∂f/∂u, n×m
    pub b: DMatrix<f64>,
}

/// Forward-difference linearization with perturbation `epsilon`.
pub fn linearize<P: Plant + ?Sized>(
    plant: &mut P,
    op: &OperatingPoint,
    epsilon: f64,
) -> SynthResult<Linearization> {
    linearize_with(plant, op, epsilon, DifferenceScheme::Forward)
}

/// Linearize `plant` about `op`.
///
/// The full plant state is saved before the first probe and restored
/// afterwards, whether or not probing succeeded, followed by one more
/// forward-dynamics evaluation so cached quantities match the restored
/// state. The caller's `&mut` borrow keeps the whole sequence exclusive.
pub fn linearize_with<P: Plant + ?Sized>(
    plant: &mut P,
    op: &OperatingPoint,
    epsilon: f64,
    scheme: DifferenceScheme,
) -> SynthResult<Linearization> {
    if !(epsilon > 0.0 && epsilon <= MAX_EPSILON) {
        return Err(SynthError::InvalidArg {
            what: "epsilon must lie in (0, 0.1]",
        });
    }
    check_dim("operating state", plant.state_dim(), op.x0.len())?;
    check_dim("operating control", plant.control_dim(), op.u0.len())?;

    let snapshot = plant.save_snapshot();
    let probed = probe(plant, op, epsilon, scheme);
    plant.restore_snapshot(&snapshot)?;
    plant.forward_dynamics()?;

    let lin = probed?;
    debug!(
        n = lin.a.nrows(),
        m = lin.b.ncols(),
        a_norm = lin.a.norm(),
        b_norm = lin.b.norm(),
        ?scheme,
        "linearized plant"
    );
    Ok(lin)
}

fn probe<P: Plant + ?Sized>(
    plant: &mut P,
    op: &OperatingPoint,
    epsilon: f64,
    scheme: DifferenceScheme,
) -> SynthResult<Linearization> {
    plant.set_state(&op.x0)?;
    plant.set_control(&op.u0)?;
    let f0 = plant.forward_dynamics()?;
    check_dim("state derivative", op.x0.len(), f0.len())?;

    let a = jacobian(
        scheme,
        &op.x0,
        &f0,
        |x| {
            plant.set_state(x)?;
            plant.set_control(&op.u0)?;
            Ok(plant.forward_dynamics()?)
        },
        epsilon,
    )?;

    let b = jacobian(
        scheme,
        &op.u0,
        &f0,
        |u| {
            plant.set_state(&op.x0)?;
            plant.set_control(u)?;
            Ok(plant.forward_dynamics()?)
        },
        epsilon,
    )?;

    Ok(Linearization { a, b })
}

fn check_dim(what: &'static str, expected: usize, got: usize) -> SynthResult<()> {
    if expected == got {
        Ok(())
    } else {
        Err(SynthError::Dimension {
            what,
            expected,
            got,
        })
    }
}
