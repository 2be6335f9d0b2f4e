//! Balancing scenario schema.

use pb_control::AxisPenalties;
use pb_plant::{Axis, AxisSet, IntegratorType};
use pb_synth::{CareMethod, DifferenceScheme, SynthesisOptions};
use serde::{Deserialize, Serialize};

pub const CONFIG_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BalanceConfig {
    pub version: u32,
    pub name: String,
    #[serde(default)]
    pub plant: PlantDef,
    #[serde(default)]
    pub axes: AxesDef,
    #[serde(default)]
    pub weights: WeightsDef,
    #[serde(default)]
    pub synthesis: SynthesisDef,
    #[serde(default)]
    pub run: RunDef,
}

impl BalanceConfig {
    /// Default scenario: pole tipped in both axes, reference scene plant.
    pub fn new(name: impl Into<String>, axes: AxesDef) -> Self {
        let initial = match axes {
            AxesDef::Planar => InitialDef {
                tilt_x_rad: 0.1,
                tilt_y_rad: 0.0,
            },
            AxesDef::Spatial => InitialDef::default(),
        };
        Self {
            version: CONFIG_VERSION,
            name: name.into(),
            plant: PlantDef::default(),
            axes,
            weights: WeightsDef::default(),
            synthesis: SynthesisDef::default(),
            run: RunDef {
                initial,
                ..RunDef::default()
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PlantDef {
    pub platform_mass_kg: f64,
    pub pole_mass_kg: f64,
    pub pole_length_m: f64,
    pub gravity_mps2: f64,
    pub platform_damping: f64,
    pub hinge_damping: f64,
    pub spin_damping: f64,
}

impl Default for PlantDef {
    fn default() -> Self {
        Self {
            platform_mass_kg: 56.55,
            pole_mass_kg: 8.38,
            pole_length_m: 1.0,
            gravity_mps2: pb_core::constants::GRAVITY_MPS2,
            platform_damping: 0.0,
            hinge_damping: 0.0,
            spin_damping: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum AxesDef {
    Planar,
    #[default]
    Spatial,
}

impl From<AxesDef> for AxisSet {
    fn from(def: AxesDef) -> Self {
        match def {
            AxesDef::Planar => AxisSet::Planar,
            AxesDef::Spatial => AxisSet::Spatial,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WeightsDef {
    pub position: f64,
    pub angle: f64,
    pub velocity: f64,
    pub angular_velocity: f64,
    /// R diagonal entry, shared by every actuator.
    pub control: f64,
}

impl Default for WeightsDef {
    fn default() -> Self {
        let p = AxisPenalties::default();
        Self {
            position: p.position,
            angle: p.angle,
            velocity: p.velocity,
            angular_velocity: p.angular_velocity,
            control: 1.0,
        }
    }
}

impl WeightsDef {
    pub fn penalties(&self) -> AxisPenalties {
        AxisPenalties {
            position: self.position,
            angle: self.angle,
            velocity: self.velocity,
            angular_velocity: self.angular_velocity,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DifferenceDef {
    #[default]
    Forward,
    Central,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum MethodDef {
    #[default]
    Eigenvector,
    MatrixSign,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SynthesisDef {
    pub epsilon: f64,
    pub difference: DifferenceDef,
    pub method: MethodDef,
}

impl Default for SynthesisDef {
    fn default() -> Self {
        Self {
            epsilon: pb_synth::linearize::DEFAULT_EPSILON,
            difference: DifferenceDef::Forward,
            method: MethodDef::Eigenvector,
        }
    }
}

impl SynthesisDef {
    pub fn options(&self) -> SynthesisOptions {
        SynthesisOptions {
            epsilon: self.epsilon,
            difference: match self.difference {
                DifferenceDef::Forward => DifferenceScheme::Forward,
                DifferenceDef::Central => DifferenceScheme::Central,
            },
            method: match self.method {
                MethodDef::Eigenvector => CareMethod::Eigenvector,
                MethodDef::MatrixSign => CareMethod::MatrixSign,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum IntegratorDef {
    #[default]
    Rk4,
    ForwardEuler,
}

impl From<IntegratorDef> for IntegratorType {
    fn from(def: IntegratorDef) -> Self {
        match def {
            IntegratorDef::Rk4 => IntegratorType::RK4,
            IntegratorDef::ForwardEuler => IntegratorType::ForwardEuler,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AxisDef {
    X,
    Y,
}

impl From<AxisDef> for Axis {
    fn from(def: AxisDef) -> Self {
        match def {
            AxisDef::X => Axis::X,
            AxisDef::Y => Axis::Y,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct InitialDef {
    pub tilt_x_rad: f64,
    pub tilt_y_rad: f64,
}

impl Default for InitialDef {
    fn default() -> Self {
        Self {
            tilt_x_rad: 0.1,
            tilt_y_rad: -0.05,
        }
    }
}

/// Horizontal push on the pole, active on `[at_s, at_s + duration_s)`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct DisturbanceDef {
    pub at_s: f64,
    pub duration_s: f64,
    pub axis: AxisDef,
    pub force_n: f64,
}

impl DisturbanceDef {
    pub fn is_active(&self, t: f64) -> bool {
        t >= self.at_s && t < self.at_s + self.duration_s
    }
}

/// New weights taking effect from `at_s` on.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct WeightChangeDef {
    pub at_s: f64,
    pub weights: WeightsDef,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RunDef {
    pub dt_s: f64,
    pub t_end_s: f64,
    pub record_every: usize,
    pub integrator: IntegratorDef,
    pub initial: InitialDef,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<Vec<f64>>,
    pub disturbances: Vec<DisturbanceDef>,
    pub weight_changes: Vec<WeightChangeDef>,
}

impl Default for RunDef {
    fn default() -> Self {
        Self {
            dt_s: 0.01,
            t_end_s: 10.0,
            record_every: 1,
            integrator: IntegratorDef::Rk4,
            initial: InitialDef::default(),
            reference: None,
            disturbances: Vec::new(),
            weight_changes: Vec::new(),
        }
    }
}
