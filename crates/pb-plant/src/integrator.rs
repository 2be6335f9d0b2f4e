//! Fixed-step time integrators.

use crate::dynamics::Dynamics;
use crate::error::PlantResult;

/// Integrator selection for plant stepping.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum IntegratorType {
    /// 4th-order Runge-Kutta (default, 4 rhs calls per step).
    #[default]
    RK4,
    /// Forward Euler (1st-order, 1 rhs call per step).
    ForwardEuler,
}

impl IntegratorType {
    pub fn step<M: Dynamics>(
        self,
        model: &mut M,
        t: f64,
        x: &M::State,
        dt: f64,
    ) -> PlantResult<M::State> {
        match self {
            IntegratorType::RK4 => RK4.step(model, t, x, dt),
            IntegratorType::ForwardEuler => ForwardEuler.step(model, t, x, dt),
        }
    }
}

/// Trait for time integrators.
pub trait Integrator {
    /// Advance state by one time step.
    fn step<M: Dynamics>(
        &self,
        model: &mut M,
        t: f64,
        x: &M::State,
        dt: f64,
    ) -> PlantResult<M::State>;
}

/// Classical RK4 (Runge-Kutta 4th order) integrator.
#[derive(Clone, Debug)]
pub struct RK4;

impl Integrator for RK4 {
    fn step<M: Dynamics>(
        &self,
        model: &mut M,
        t: f64,
        x: &M::State,
        dt: f64,
    ) -> PlantResult<M::State> {
        let half = 0.5 * dt;
        let k1 = model.rhs(t, x)?;
        let probe = model.add(x, &model.scale(&k1, half));
        let k2 = model.rhs(t + half, &probe)?;
        let probe = model.add(x, &model.scale(&k2, half));
        let k3 = model.rhs(t + half, &probe)?;
        let probe = model.add(x, &model.scale(&k3, dt));
        let k4 = model.rhs(t + dt, &probe)?;

        // slope = k1 + 2 (k2 + k3) + k4
        let ends = model.add(&k1, &k4);
        let mid = model.add(&k2, &k3);
        let slope = model.add(&ends, &model.scale(&mid, 2.0));
        Ok(model.add(x, &model.scale(&slope, dt / 6.0)))
    }
}

/// Forward Euler (explicit, 1st order).
#[derive(Clone, Debug)]
pub struct ForwardEuler;

impl Integrator for ForwardEuler {
    fn step<M: Dynamics>(
        &self,
        model: &mut M,
        t: f64,
        x: &M::State,
        dt: f64,
    ) -> PlantResult<M::State> {
        let xdot = model.rhs(t, x)?;
        Ok(model.add(x, &model.scale(&xdot, dt)))
    }
}
