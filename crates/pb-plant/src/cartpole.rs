//! Analytic cart-pole backend.
//!
//! A platform slides on two horizontal joints and carries a uniform pole on
//! two hinges, one per axis, plus a free spin joint about the pole's long
//! axis. Each horizontal axis follows the nonlinear planar cart-pole
//! equations (pole as a uniform rod, I = mL²/12 about its centre):
//!
//! ```text
//! (M+m) p'' + m l cos(th) th'' = F + f_ext - b_p p' + m l sin(th) th'^2
//! m l cos(th) p'' + (I + m l^2) th'' = m g l sin(th) + f_ext l cos(th) - b_h th'
//! ```
//!
//! with l = L/2 and `f_ext` a horizontal push applied at the pole's centre of
//! mass. Positive tilt leans the pole toward the positive axis direction.

use nalgebra::{DVector, Matrix2, Vector2};
use tracing::debug;
use uom::si::acceleration::meter_per_second_squared;
use uom::si::length::meter;
use uom::si::mass::kilogram;
use uom::si::moment_of_inertia::kilogram_square_meter;

use pb_core::units::{Accel, Inertia, Length, Mass, constants, kg, m};

use crate::axis::{Axis, AxisSet, AxisTable, JointAddr, StateLayout};
use crate::dynamics::Dynamics;
use crate::error::{PlantError, PlantResult};
use crate::integrator::IntegratorType;
use crate::plant::{Plant, PlantSnapshot};

/// Joints in generalized-coordinate order.
const JOINTS: [&str; 5] = ["platform_x", "platform_y", "hinge_x", "hinge_y", "spin"];
const NQ: usize = JOINTS.len();
const NU: usize = 2;

/// Height of the hinge above the ground.
const HINGE_HEIGHT_M: f64 = 0.2;

/// Physical parameters.
///
/// Default masses are those of the reference scene's cylinder platform
/// (r = 0.3 m, h = 0.2 m) and capsule pole (r = 0.05 m, L = 1 m) at a density
/// of 1000 kg/m³.
#[derive(Clone, Debug, PartialEq)]
pub struct CartPoleParams {
    pub platform_mass: Mass,
    pub pole_mass: Mass,
    pub pole_length: Length,
    pub gravity: Accel,
    /// Viscous friction on the platform slides (N·s/m).
    pub platform_damping: f64,
    /// Viscous friction on the pole hinges (N·m·s/rad).
    pub hinge_damping: f64,
    /// Decay rate of the free spin joint (1/s).
    pub spin_damping: f64,
}

impl Default for CartPoleParams {
    fn default() -> Self {
        Self {
            platform_mass: kg(56.55),
            pole_mass: kg(8.38),
            pole_length: m(1.0),
            gravity: constants::gravity(),
            platform_damping: 0.0,
            hinge_damping: 0.0,
            spin_damping: 0.0,
        }
    }
}

impl CartPoleParams {
    /// Pole moment of inertia about the hinge: mL²/12 + m(L/2)².
    pub fn pivot_inertia(&self) -> Inertia {
        let half = self.pole_length / 2.0;
        self.pole_mass * self.pole_length * self.pole_length / 12.0
            + self.pole_mass * half * half
    }

    pub fn validate(&self) -> PlantResult<()> {
        if !(self.platform_mass.get::<kilogram>() > 0.0) {
            return Err(PlantError::InvalidArg {
                what: "platform mass must be positive",
            });
        }
        if !(self.pole_mass.get::<kilogram>() > 0.0) {
            return Err(PlantError::InvalidArg {
                what: "pole mass must be positive",
            });
        }
        if !(self.pole_length.get::<meter>() > 0.0) {
            return Err(PlantError::InvalidArg {
                what: "pole length must be positive",
            });
        }
        if !self.gravity.get::<meter_per_second_squared>().is_finite() {
            return Err(PlantError::InvalidArg {
                what: "gravity must be finite",
            });
        }
        for d in [self.platform_damping, self.hinge_damping, self.spin_damping] {
            if !(d >= 0.0 && d.is_finite()) {
                return Err(PlantError::InvalidArg {
                    what: "damping must be non-negative",
                });
            }
        }
        Ok(())
    }
}

/// Plain-f64 view of the parameters used in the inner loop.
#[derive(Clone, Copy, Debug)]
struct Coefficients {
    total_mass: f64,
    ml: f64,
    pivot_inertia: f64,
    mgl: f64,
    half_length: f64,
    b_platform: f64,
    b_hinge: f64,
    b_spin: f64,
}

impl Coefficients {
    fn from_params(p: &CartPoleParams) -> Self {
        let big_m = p.platform_mass.get::<kilogram>();
        let small_m = p.pole_mass.get::<kilogram>();
        let len = p.pole_length.get::<meter>();
        let l = 0.5 * len;
        let g = p.gravity.get::<meter_per_second_squared>();
        Self {
            total_mass: big_m + small_m,
            ml: small_m * l,
            pivot_inertia: p.pivot_inertia().get::<kilogram_square_meter>(),
            mgl: small_m * g * l,
            half_length: l,
            b_platform: p.platform_damping,
            b_hinge: p.hinge_damping,
            b_spin: p.spin_damping,
        }
    }

    /// Platform and hinge accelerations for one axis.
    fn axis_accel(&self, v: f64, th: f64, w: f64, force: f64, push: f64) -> Option<(f64, f64)> {
        let (s, c) = th.sin_cos();
        let mass = Matrix2::new(
            self.total_mass,
            self.ml * c,
            self.ml * c,
            self.pivot_inertia,
        );
        let rhs = Vector2::new(
            force + push - self.b_platform * v + self.ml * s * w * w,
            self.mgl * s + push * self.half_length * c - self.b_hinge * w,
        );
        let acc = mass.try_inverse()? * rhs;
        Some((acc[0], acc[1]))
    }
}

/// Joint addresses looked up once at construction.
#[derive(Clone, Copy, Debug)]
struct Joints {
    platform: [JointAddr; 2],
    hinge: [JointAddr; 2],
    spin: JointAddr,
}

impl Joints {
    fn resolve(table: &AxisTable) -> PlantResult<Self> {
        Ok(Self {
            platform: [
                table.get(Axis::X.platform_joint())?,
                table.get(Axis::Y.platform_joint())?,
            ],
            hinge: [
                table.get(Axis::X.hinge_joint())?,
                table.get(Axis::Y.hinge_joint())?,
            ],
            spin: table.get("spin")?,
        })
    }
}

/// Two-axis inverted pendulum on a moving platform.
#[derive(Clone, Debug)]
pub struct CartPolePlant {
    params: CartPoleParams,
    coeffs: Coefficients,
    table: AxisTable,
    joints: Joints,
    layout: StateLayout,
    integrator: IntegratorType,
    time: f64,
    qpos: Vec<f64>,
    qvel: Vec<f64>,
    ctrl: Vec<f64>,
    applied: Vec<f64>,
    // derived, refreshed by forward_dynamics
    qacc: Vec<f64>,
    tip: [f64; 3],
}

impl CartPolePlant {
    /// Build a plant at rest in the upright equilibrium.
    pub fn new(params: CartPoleParams, axes: AxisSet) -> PlantResult<Self> {
        params.validate()?;

        let mut table = AxisTable::new();
        for (i, name) in JOINTS.iter().enumerate() {
            table.insert(*name, JointAddr { qpos: i, qvel: i });
        }
        let layout = StateLayout::resolve(&table, axes)?;
        let joints = Joints::resolve(&table)?;

        let mut plant = Self {
            coeffs: Coefficients::from_params(&params),
            params,
            table,
            joints,
            layout,
            integrator: IntegratorType::default(),
            time: 0.0,
            qpos: vec![0.0; NQ],
            qvel: vec![0.0; NQ],
            ctrl: vec![0.0; NU],
            applied: vec![0.0; Axis::ALL.len()],
            qacc: vec![0.0; NQ],
            tip: [0.0; 3],
        };
        plant.forward_dynamics()?;
        Ok(plant)
    }

    pub fn with_integrator(mut self, integrator: IntegratorType) -> Self {
        self.integrator = integrator;
        self
    }

    pub fn params(&self) -> &CartPoleParams {
        &self.params
    }

    pub fn layout(&self) -> &StateLayout {
        &self.layout
    }

    pub fn joints(&self) -> &AxisTable {
        &self.table
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn qpos(&self) -> &[f64] {
        &self.qpos
    }

    pub fn qvel(&self) -> &[f64] {
        &self.qvel
    }

    /// Accelerations from the last forward-dynamics evaluation.
    pub fn qacc(&self) -> &[f64] {
        &self.qacc
    }

    /// World position of the pole tip from the last forward-dynamics evaluation.
    pub fn tip_position(&self) -> [f64; 3] {
        self.tip
    }

    /// Tilt of the pole toward `axis`, in radians.
    pub fn tilt(&self, axis: Axis) -> f64 {
        self.qpos[self.joints.hinge[axis_slot(axis)].qpos]
    }

    pub fn set_tilt(&mut self, axis: Axis, angle_rad: f64) -> PlantResult<()> {
        if !angle_rad.is_finite() {
            return Err(PlantError::InvalidArg {
                what: "tilt must be finite",
            });
        }
        self.qpos[self.joints.hinge[axis_slot(axis)].qpos] = angle_rad;
        Ok(())
    }

    pub fn set_spin_rate(&mut self, rate: f64) -> PlantResult<()> {
        if !rate.is_finite() {
            return Err(PlantError::InvalidArg {
                what: "spin rate must be finite",
            });
        }
        self.qvel[self.joints.spin.qvel] = rate;
        Ok(())
    }

    /// Apply a horizontal push along `axis` at the pole's centre of mass.
    /// The push stays in effect until cleared.
    pub fn apply_force(&mut self, axis: Axis, force_n: f64) -> PlantResult<()> {
        if !force_n.is_finite() {
            return Err(PlantError::InvalidArg {
                what: "applied force must be finite",
            });
        }
        debug!(?axis, force_n, t = self.time, "applying push to pole");
        self.applied[axis_slot(axis)] = force_n;
        Ok(())
    }

    pub fn applied_force(&self, axis: Axis) -> f64 {
        self.applied[axis_slot(axis)]
    }

    pub fn clear_forces(&mut self) {
        self.applied.iter_mut().for_each(|f| *f = 0.0);
    }

    /// Return to rest at the origin, clearing controls and pushes.
    pub fn reset(&mut self) -> PlantResult<()> {
        debug!("resetting cart-pole plant");
        self.time = 0.0;
        self.qpos.iter_mut().for_each(|q| *q = 0.0);
        self.qvel.iter_mut().for_each(|q| *q = 0.0);
        self.ctrl.iter_mut().for_each(|u| *u = 0.0);
        self.clear_forces();
        self.forward_dynamics()?;
        Ok(())
    }

    fn accelerations(&self, qpos: &[f64], qvel: &[f64]) -> PlantResult<Vec<f64>> {
        let mut qacc = vec![0.0; NQ];
        for axis in Axis::ALL {
            let platform = self.joints.platform[axis_slot(axis)];
            let hinge = self.joints.hinge[axis_slot(axis)];
            let (p_acc, th_acc) = self
                .coeffs
                .axis_accel(
                    qvel[platform.qvel],
                    qpos[hinge.qpos],
                    qvel[hinge.qvel],
                    self.ctrl[axis.actuator()],
                    self.applied[axis_slot(axis)],
                )
                .ok_or(PlantError::NonPhysical {
                    what: "singular mass matrix",
                })?;
            qacc[platform.qvel] = p_acc;
            qacc[hinge.qvel] = th_acc;
        }
        let spin = self.joints.spin;
        qacc[spin.qvel] = -self.coeffs.b_spin * qvel[spin.qvel];

        if qacc.iter().any(|a| !a.is_finite()) {
            return Err(PlantError::NonPhysical {
                what: "non-finite acceleration",
            });
        }
        Ok(qacc)
    }

    fn refresh_tip(&mut self) {
        let len = 2.0 * self.coeffs.half_length;
        let [hx, hy] = self.joints.hinge;
        let [px, py] = self.joints.platform;
        let (sx, cx) = self.qpos[hx.qpos].sin_cos();
        let (sy, cy) = self.qpos[hy.qpos].sin_cos();
        self.tip = [
            self.qpos[px.qpos] + len * sx,
            self.qpos[py.qpos] + len * sy,
            HINGE_HEIGHT_M + len * cx * cy,
        ];
    }
}

fn axis_slot(axis: Axis) -> usize {
    match axis {
        Axis::X => 0,
        Axis::Y => 1,
    }
}

impl Plant for CartPolePlant {
    fn state_dim(&self) -> usize {
        self.layout.state_dim()
    }

    fn control_dim(&self) -> usize {
        self.layout.control_dim()
    }

    fn state(&self) -> DVector<f64> {
        self.layout.gather(&self.qpos, &self.qvel)
    }

    fn set_state(&mut self, x: &DVector<f64>) -> PlantResult<()> {
        pb_core::ensure_finite_vector(x, "state vector")?;
        self.layout.scatter(x, &mut self.qpos, &mut self.qvel)
    }

    fn control(&self) -> DVector<f64> {
        DVector::from_iterator(
            self.control_dim(),
            self.layout.actuators().iter().map(|&i| self.ctrl[i]),
        )
    }

    fn set_control(&mut self, u: &DVector<f64>) -> PlantResult<()> {
        pb_core::ensure_len(u, self.control_dim(), "control vector")?;
        pb_core::ensure_finite_vector(u, "control vector")?;
        for (k, &i) in self.layout.actuators().iter().enumerate() {
            self.ctrl[i] = u[k];
        }
        Ok(())
    }

    fn forward_dynamics(&mut self) -> PlantResult<DVector<f64>> {
        self.qacc = self.accelerations(&self.qpos, &self.qvel)?;
        self.refresh_tip();
        Ok(self.layout.gather_derivative(&self.qvel, &self.qacc))
    }

    fn step(&mut self, dt: f64) -> PlantResult<()> {
        if !(dt > 0.0 && dt.is_finite()) {
            return Err(PlantError::InvalidArg {
                what: "dt must be positive",
            });
        }
        let x = DVector::from_iterator(
            2 * NQ,
            self.qpos.iter().chain(self.qvel.iter()).copied(),
        );
        let integrator = self.integrator;
        let t = self.time;
        let x_new = integrator.step(self, t, &x, dt)?;

        self.qpos.copy_from_slice(&x_new.as_slice()[..NQ]);
        self.qvel.copy_from_slice(&x_new.as_slice()[NQ..]);
        self.time += dt;
        self.forward_dynamics()?;
        Ok(())
    }

    fn save_snapshot(&self) -> PlantSnapshot {
        PlantSnapshot {
            time: self.time,
            qpos: self.qpos.clone(),
            qvel: self.qvel.clone(),
            ctrl: self.ctrl.clone(),
            applied: self.applied.clone(),
        }
    }

    fn restore_snapshot(&mut self, snapshot: &PlantSnapshot) -> PlantResult<()> {
        if snapshot.qpos.len() != NQ || snapshot.qvel.len() != NQ {
            return Err(PlantError::SnapshotMismatch {
                what: "generalized coordinate count",
            });
        }
        if snapshot.ctrl.len() != NU || snapshot.applied.len() != self.applied.len() {
            return Err(PlantError::SnapshotMismatch {
                what: "actuator count",
            });
        }
        self.time = snapshot.time;
        self.qpos.copy_from_slice(&snapshot.qpos);
        self.qvel.copy_from_slice(&snapshot.qvel);
        self.ctrl.copy_from_slice(&snapshot.ctrl);
        self.applied.copy_from_slice(&snapshot.applied);
        Ok(())
    }
}

impl Dynamics for CartPolePlant {
    type State = DVector<f64>;

    fn rhs(&mut self, _t: f64, x: &DVector<f64>) -> PlantResult<DVector<f64>> {
        let (qpos, qvel) = x.as_slice().split_at(NQ);
        let qacc = self.accelerations(qpos, qvel)?;
        Ok(DVector::from_iterator(
            2 * NQ,
            qvel.iter().chain(qacc.iter()).copied(),
        ))
    }

    fn add(&self, a: &DVector<f64>, b: &DVector<f64>) -> DVector<f64> {
        a + b
    }

    fn scale(&self, a: &DVector<f64>, scale: f64) -> DVector<f64> {
        a * scale
    }
}
