//! Config loading, saving and validation.

use std::path::Path;

use pb_plant::AxisSet;
use pb_synth::linearize::MAX_EPSILON;

use crate::config::{BalanceConfig, CONFIG_VERSION, WeightsDef};
use crate::error::{AppError, AppResult};

/// Load a config from a YAML file and validate it.
pub fn load_config(path: &Path) -> AppResult<BalanceConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| AppError::ConfigFileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    let config: BalanceConfig = serde_yaml::from_str(&content)
        .map_err(|e| AppError::Config(format!("Failed to parse config YAML: {}", e)))?;

    validate_config(&config)?;
    Ok(config)
}

/// Validate and save a config to a YAML file.
pub fn save_config(path: &Path, config: &BalanceConfig) -> AppResult<()> {
    validate_config(config)?;
    let content = serde_yaml::to_string(config)
        .map_err(|e| AppError::Config(format!("Failed to serialize config: {}", e)))?;

    std::fs::write(path, content).map_err(|e| AppError::ConfigFileWrite {
        path: path.to_path_buf(),
        source: e,
    })?;

    Ok(())
}

/// Check everything the runtime relies on before it is built.
pub fn validate_config(config: &BalanceConfig) -> AppResult<()> {
    if config.version != CONFIG_VERSION {
        return Err(AppError::UnsupportedVersion(config.version));
    }

    let plant = &config.plant;
    positive("plant.platform_mass_kg", plant.platform_mass_kg)?;
    positive("plant.pole_mass_kg", plant.pole_mass_kg)?;
    positive("plant.pole_length_m", plant.pole_length_m)?;
    if !plant.gravity_mps2.is_finite() {
        return Err(invalid("plant.gravity_mps2", plant.gravity_mps2, "must be finite"));
    }
    non_negative("plant.platform_damping", plant.platform_damping)?;
    non_negative("plant.hinge_damping", plant.hinge_damping)?;
    non_negative("plant.spin_damping", plant.spin_damping)?;

    validate_weights("weights", &config.weights)?;

    let eps = config.synthesis.epsilon;
    if !(eps > 0.0 && eps <= MAX_EPSILON) {
        return Err(invalid(
            "synthesis.epsilon",
            eps,
            &format!("must lie in (0, {}]", MAX_EPSILON),
        ));
    }

    let run = &config.run;
    positive("run.dt_s", run.dt_s)?;
    non_negative("run.t_end_s", run.t_end_s)?;
    if run.record_every == 0 {
        return Err(AppError::Validation(
            "run.record_every must be at least 1".to_string(),
        ));
    }
    for (field, tilt) in [
        ("run.initial.tilt_x_rad", run.initial.tilt_x_rad),
        ("run.initial.tilt_y_rad", run.initial.tilt_y_rad),
    ] {
        if !(tilt.abs() < std::f64::consts::FRAC_PI_2) {
            return Err(invalid(field, tilt, "must be finite and under pi/2 in magnitude"));
        }
    }

    let axes = AxisSet::from(config.axes);
    if !axes.contains(pb_plant::Axis::Y) && run.initial.tilt_y_rad != 0.0 {
        return Err(invalid(
            "run.initial.tilt_y_rad",
            run.initial.tilt_y_rad,
            "the y axis is not controlled in a planar config",
        ));
    }
    if let Some(reference) = &run.reference {
        if reference.len() != axes.state_dim() {
            return Err(AppError::Validation(format!(
                "run.reference has {} entries, expected {}",
                reference.len(),
                axes.state_dim()
            )));
        }
        if reference.iter().any(|v| !v.is_finite()) {
            return Err(AppError::Validation(
                "run.reference entries must be finite".to_string(),
            ));
        }
    }

    for (i, d) in run.disturbances.iter().enumerate() {
        non_negative(&format!("run.disturbances[{}].at_s", i), d.at_s)?;
        positive(&format!("run.disturbances[{}].duration_s", i), d.duration_s)?;
        if !d.force_n.is_finite() {
            return Err(invalid(
                &format!("run.disturbances[{}].force_n", i),
                d.force_n,
                "must be finite",
            ));
        }
        if !axes.contains(d.axis.into()) {
            return Err(AppError::Validation(format!(
                "run.disturbances[{}] pushes along {:?}, which a {:?} config does not control",
                i, d.axis, config.axes
            )));
        }
    }

    for (i, change) in run.weight_changes.iter().enumerate() {
        non_negative(&format!("run.weight_changes[{}].at_s", i), change.at_s)?;
        validate_weights(&format!("run.weight_changes[{}].weights", i), &change.weights)?;
    }

    Ok(())
}

fn validate_weights(prefix: &str, w: &WeightsDef) -> AppResult<()> {
    for (field, v) in [
        ("position", w.position),
        ("angle", w.angle),
        ("velocity", w.velocity),
        ("angular_velocity", w.angular_velocity),
        ("control", w.control),
    ] {
        non_negative(&format!("{}.{}", prefix, field), v)?;
    }
    Ok(())
}

fn positive(field: &str, v: f64) -> AppResult<()> {
    if v > 0.0 && v.is_finite() {
        Ok(())
    } else {
        Err(invalid(field, v, "must be positive"))
    }
}

fn non_negative(field: &str, v: f64) -> AppResult<()> {
    if v >= 0.0 && v.is_finite() {
        Ok(())
    } else {
        Err(invalid(field, v, "must be non-negative"))
    }
}

fn invalid(field: &str, value: f64, reason: &str) -> AppError {
    AppError::Validation(format!("{} = {} ({})", field, value, reason))
}
