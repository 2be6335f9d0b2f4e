//! Assemble plant, weights and controller from a config.

use nalgebra::DVector;
use pb_control::{LqrController, WeightConfig};
use pb_core::units::{kg, m, mps2};
use pb_plant::{Axis, AxisSet, CartPoleParams, CartPolePlant, Plant};
use pb_synth::{SynthesisContext, synthesize};
use tracing::debug;

use crate::config::BalanceConfig;
use crate::config_service::validate_config;
use crate::error::AppResult;

/// Everything a run ticks.
#[derive(Debug, Clone)]
pub struct BalanceRuntime {
    pub plant: CartPolePlant,
    pub weights: WeightConfig,
    pub controller: LqrController,
}

pub fn build_params(config: &BalanceConfig) -> CartPoleParams {
    let p = &config.plant;
    CartPoleParams {
        platform_mass: kg(p.platform_mass_kg),
        pole_mass: kg(p.pole_mass_kg),
        pole_length: m(p.pole_length_m),
        gravity: mps2(p.gravity_mps2),
        platform_damping: p.platform_damping,
        hinge_damping: p.hinge_damping,
        spin_damping: p.spin_damping,
    }
}

/// Plant at its initial tilt, weights flagged for a first synthesis, and a
/// controller with no gain yet.
pub fn build_runtime(config: &BalanceConfig) -> AppResult<BalanceRuntime> {
    validate_config(config)?;

    let axes = AxisSet::from(config.axes);
    let mut plant = CartPolePlant::new(build_params(config), axes)?
        .with_integrator(config.run.integrator.into());
    plant.set_tilt(Axis::X, config.run.initial.tilt_x_rad)?;
    plant.set_tilt(Axis::Y, config.run.initial.tilt_y_rad)?;
    plant.forward_dynamics()?;

    let weights = WeightConfig::new(
        plant.layout(),
        config.weights.penalties(),
        config.weights.control,
    )?;

    let mut controller = LqrController::for_plant(&plant, config.synthesis.options());
    if let Some(reference) = &config.run.reference {
        controller.set_reference(Some(DVector::from_column_slice(reference)))?;
    }

    debug!(
        name = %config.name,
        n = plant.state_dim(),
        m = plant.control_dim(),
        "built runtime"
    );
    Ok(BalanceRuntime {
        plant,
        weights,
        controller,
    })
}

/// One synthesis pass with the config's initial weights.
pub fn synthesize_once(config: &BalanceConfig) -> AppResult<SynthesisContext> {
    let mut rt = build_runtime(config)?;
    let op = pb_synth::OperatingPoint::upright_for(&rt.plant);
    let ctx = synthesize(
        &mut rt.plant,
        &op,
        &rt.weights.q(),
        &rt.weights.r(),
        rt.controller.options(),
    )?;
    Ok(ctx)
}

/// Column labels for the modeled state, e.g. `p_x`, `theta_y`.
pub fn state_labels(plant: &CartPolePlant) -> Vec<String> {
    plant
        .layout()
        .slots()
        .iter()
        .map(|slot| {
            let kind = match slot.kind {
                pb_plant::SlotKind::Position => "p",
                pb_plant::SlotKind::Angle => "theta",
                pb_plant::SlotKind::Velocity => "v",
                pb_plant::SlotKind::AngularVelocity => "omega",
            };
            format!("{}_{}", kind, axis_suffix(slot.axis))
        })
        .collect()
}

pub fn control_labels(plant: &CartPolePlant) -> Vec<String> {
    plant
        .layout()
        .axes()
        .axes()
        .iter()
        .map(|a| format!("u_{}", axis_suffix(*a)))
        .collect()
}

fn axis_suffix(axis: Axis) -> &'static str {
    match axis {
        Axis::X => "x",
        Axis::Y => "y",
    }
}
