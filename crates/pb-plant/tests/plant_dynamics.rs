//! Integration test: conservation laws of the undamped cart-pole.
//!
//! With no damping, no control and no pushes, each axis conserves its energy
//! and its horizontal momentum. RK4 should hold both tightly; forward Euler
//! should visibly drift.

use nalgebra::DVector;
use pb_plant::{AxisSet, CartPoleParams, CartPolePlant, IntegratorType, Plant};
use proptest::prelude::*;

const M: f64 = 56.55;
const MP: f64 = 8.38;
const L: f64 = 0.5;
const G: f64 = 9.81;

fn pivot_inertia() -> f64 {
    MP / 12.0 + MP * L * L
}

/// Planar state [p, th, v, w].
fn energy(x: &DVector<f64>) -> f64 {
    let (th, v, w) = (x[1], x[2], x[3]);
    0.5 * (M + MP) * v * v + MP * L * th.cos() * v * w + 0.5 * pivot_inertia() * w * w
        + MP * G * L * th.cos()
}

fn momentum(x: &DVector<f64>) -> f64 {
    (M + MP) * x[2] + MP * L * x[1].cos() * x[3]
}

fn run(integrator: IntegratorType, x0: &DVector<f64>, steps: usize, dt: f64) -> DVector<f64> {
    let mut plant = CartPolePlant::new(CartPoleParams::default(), AxisSet::Planar)
        .unwrap()
        .with_integrator(integrator);
    plant.set_state(x0).unwrap();
    for _ in 0..steps {
        plant.step(dt).unwrap();
    }
    plant.state()
}

proptest! {
    #[test]
    fn rk4_conserves_energy_and_momentum(
        th in -0.5_f64..0.5,
        v in -1.0_f64..1.0,
        w in -1.0_f64..1.0,
    ) {
        let x0 = DVector::from_column_slice(&[0.0, th, v, w]);
        let x1 = run(IntegratorType::RK4, &x0, 500, 1e-3);

        let e_scale = energy(&x0).abs().max(1.0);
        prop_assert!((energy(&x1) - energy(&x0)).abs() < 1e-6 * e_scale);
        prop_assert!((momentum(&x1) - momentum(&x0)).abs() < 1e-8 * (M + MP));
    }
}

#[test]
fn euler_drifts_more_than_rk4() {
    let x0 = DVector::from_column_slice(&[0.0, 0.3, 0.0, 0.0]);
    let e0 = energy(&x0);
    let rk4 = run(IntegratorType::RK4, &x0, 200, 5e-3);
    let euler = run(IntegratorType::ForwardEuler, &x0, 200, 5e-3);

    let drift_rk4 = (energy(&rk4) - e0).abs();
    let drift_euler = (energy(&euler) - e0).abs();
    assert!(drift_euler > 100.0 * drift_rk4);
}

#[test]
fn damping_dissipates_energy() {
    let params = CartPoleParams {
        platform_damping: 5.0,
        hinge_damping: 2.0,
        ..CartPoleParams::default()
    };
    let mut plant = CartPolePlant::new(params, AxisSet::Planar).unwrap();
    let x0 = DVector::from_column_slice(&[0.0, 0.0, 1.0, 0.5]);
    plant.set_state(&x0).unwrap();
    for _ in 0..500 {
        plant.step(1e-3).unwrap();
    }
    assert!(energy(&plant.state()) < energy(&x0));
}
