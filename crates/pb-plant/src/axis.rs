//! Joint lookup table and state layout.
//!
//! Joint addresses are resolved by name once, when a plant is built, and the
//! resulting index lists are what every state read/write goes through.

use nalgebra::DVector;

use crate::error::{PlantError, PlantResult};

/// Horizontal axis of the platform.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Axis {
    X,
    Y,
}

impl Axis {
    pub const ALL: [Axis; 2] = [Axis::X, Axis::Y];

    /// Slide joint that moves the platform along this axis.
    pub fn platform_joint(self) -> &'static str {
        match self {
            Axis::X => "platform_x",
            Axis::Y => "platform_y",
        }
    }

    /// Hinge joint that tilts the pole toward this axis.
    pub fn hinge_joint(self) -> &'static str {
        match self {
            Axis::X => "hinge_x",
            Axis::Y => "hinge_y",
        }
    }

    /// Actuator (platform motor) channel for this axis.
    pub fn actuator(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
        }
    }
}

/// Which axes are under feedback control.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AxisSet {
    /// X axis only: n = 4, m = 1.
    Planar,
    /// Both axes: n = 8, m = 2.
    #[default]
    Spatial,
}

impl AxisSet {
    pub fn axes(self) -> &'static [Axis] {
        match self {
            AxisSet::Planar => &[Axis::X],
            AxisSet::Spatial => &Axis::ALL,
        }
    }

    pub fn state_dim(self) -> usize {
        4 * self.axes().len()
    }

    pub fn control_dim(self) -> usize {
        self.axes().len()
    }

    pub fn contains(self, axis: Axis) -> bool {
        self.axes().contains(&axis)
    }
}

/// Offsets of one joint in the generalized position/velocity arrays.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct JointAddr {
    pub qpos: usize,
    pub qvel: usize,
}

/// Small name-keyed table of joint addresses.
#[derive(Clone, Debug, Default)]
pub struct AxisTable {
    joints: Vec<(String, JointAddr)>,
}

impl AxisTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, addr: JointAddr) {
        let name = name.into();
        match self.joints.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = addr,
            None => self.joints.push((name, addr)),
        }
    }

    pub fn get(&self, name: &str) -> PlantResult<JointAddr> {
        self.joints
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, addr)| *addr)
            .ok_or_else(|| PlantError::UnknownJoint {
                name: name.to_string(),
            })
    }

    pub fn len(&self) -> usize {
        self.joints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.joints.is_empty()
    }
}

/// Physical meaning of one entry of the modeled state vector.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlotKind {
    Position,
    Angle,
    Velocity,
    AngularVelocity,
}

impl SlotKind {
    /// Joint whose coordinate this slot reads.
    pub fn joint(self, axis: Axis) -> &'static str {
        match self {
            SlotKind::Position | SlotKind::Velocity => axis.platform_joint(),
            SlotKind::Angle | SlotKind::AngularVelocity => axis.hinge_joint(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StateSlot {
    pub axis: Axis,
    pub kind: SlotKind,
}

/// Resolved index lists for the modeled state and control channels.
///
/// State ordering is positions first, then rates:
/// `[platform.., hinge.., platform_vel.., hinge_vel..]`, one entry per
/// controlled axis in each group.
#[derive(Clone, Debug, PartialEq)]
pub struct StateLayout {
    axes: AxisSet,
    slots: Vec<StateSlot>,
    qpos: Vec<usize>,
    qvel: Vec<usize>,
    actuators: Vec<usize>,
}

impl StateLayout {
    pub fn resolve(table: &AxisTable, axes: AxisSet) -> PlantResult<Self> {
        let mut slots = Vec::with_capacity(axes.state_dim());
        let mut qpos = Vec::with_capacity(axes.state_dim() / 2);
        let mut qvel = Vec::with_capacity(axes.state_dim() / 2);

        for kind in [SlotKind::Position, SlotKind::Angle] {
            for &axis in axes.axes() {
                let addr = table.get(kind.joint(axis))?;
                qpos.push(addr.qpos);
                slots.push(StateSlot { axis, kind });
            }
        }
        for kind in [SlotKind::Velocity, SlotKind::AngularVelocity] {
            for &axis in axes.axes() {
                let addr = table.get(kind.joint(axis))?;
                qvel.push(addr.qvel);
                slots.push(StateSlot { axis, kind });
            }
        }

        let actuators = axes.axes().iter().map(|a| a.actuator()).collect();

        Ok(Self {
            axes,
            slots,
            qpos,
            qvel,
            actuators,
        })
    }

    pub fn axes(&self) -> AxisSet {
        self.axes
    }

    pub fn state_dim(&self) -> usize {
        self.slots.len()
    }

    pub fn control_dim(&self) -> usize {
        self.actuators.len()
    }

    pub fn slots(&self) -> &[StateSlot] {
        &self.slots
    }

    pub fn actuators(&self) -> &[usize] {
        &self.actuators
    }

    /// Position in the state vector of the given slot, if modeled.
    pub fn index_of(&self, axis: Axis, kind: SlotKind) -> Option<usize> {
        self.slots
            .iter()
            .position(|s| s.axis == axis && s.kind == kind)
    }

    /// Read the modeled state out of generalized coordinates.
    pub fn gather(&self, qpos: &[f64], qvel: &[f64]) -> DVector<f64> {
        let pos = self.qpos.iter().map(|&i| qpos[i]);
        let vel = self.qvel.iter().map(|&i| qvel[i]);
        DVector::from_iterator(self.state_dim(), pos.chain(vel))
    }

    /// Read the modeled state derivative: `[qvel; qacc]` at the modeled joints.
    pub fn gather_derivative(&self, qvel: &[f64], qacc: &[f64]) -> DVector<f64> {
        let vel = self.qvel.iter().map(|&i| qvel[i]);
        let acc = self.qvel.iter().map(|&i| qacc[i]);
        DVector::from_iterator(self.state_dim(), vel.chain(acc))
    }

    /// Write the modeled state into generalized coordinates, leaving every
    /// other joint untouched.
    pub fn scatter(
        &self,
        x: &DVector<f64>,
        qpos: &mut [f64],
        qvel: &mut [f64],
    ) -> PlantResult<()> {
        if x.len() != self.state_dim() {
            return Err(PlantError::Dimension {
                what: "state vector",
                expected: self.state_dim(),
                got: x.len(),
            });
        }
        let half = self.qpos.len();
        for (k, &i) in self.qpos.iter().enumerate() {
            qpos[i] = x[k];
        }
        for (k, &i) in self.qvel.iter().enumerate() {
            qvel[i] = x[half + k];
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> AxisTable {
        let mut t = AxisTable::new();
        t.insert("platform_x", JointAddr { qpos: 0, qvel: 0 });
        t.insert("platform_y", JointAddr { qpos: 1, qvel: 1 });
        t.insert("hinge_x", JointAddr { qpos: 2, qvel: 2 });
        t.insert("hinge_y", JointAddr { qpos: 3, qvel: 3 });
        t
    }

    #[test]
    fn unknown_joint_is_reported_by_name() {
        let t = AxisTable::new();
        let err = t.get("hinge_x").unwrap_err();
        assert_eq!(
            err,
            PlantError::UnknownJoint {
                name: "hinge_x".into()
            }
        );
    }

    #[test]
    fn insert_overwrites_existing_entry() {
        let mut t = table();
        t.insert("hinge_x", JointAddr { qpos: 7, qvel: 6 });
        assert_eq!(t.len(), 4);
        assert_eq!(t.get("hinge_x").unwrap(), JointAddr { qpos: 7, qvel: 6 });
    }

    #[test]
    fn spatial_layout_orders_positions_before_rates() {
        let layout = StateLayout::resolve(&table(), AxisSet::Spatial).unwrap();
        assert_eq!(layout.state_dim(), 8);
        assert_eq!(layout.control_dim(), 2);
        assert_eq!(layout.index_of(Axis::Y, SlotKind::Angle), Some(3));
        assert_eq!(layout.index_of(Axis::X, SlotKind::AngularVelocity), Some(6));

        let qpos = [1.0, 2.0, 3.0, 4.0];
        let qvel = [5.0, 6.0, 7.0, 8.0];
        let x = layout.gather(&qpos, &qvel);
        assert_eq!(x.as_slice(), &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0]);
    }

    #[test]
    fn planar_scatter_leaves_y_joints_alone() {
        let layout = StateLayout::resolve(&table(), AxisSet::Planar).unwrap();
        assert_eq!(layout.state_dim(), 4);
        let mut qpos = [0.0, 9.0, 0.0, 9.0];
        let mut qvel = [0.0, 9.0, 0.0, 9.0];
        let x = DVector::from_column_slice(&[1.0, 0.1, 2.0, 0.2]);
        layout.scatter(&x, &mut qpos, &mut qvel).unwrap();
        assert_eq!(qpos, [1.0, 9.0, 0.1, 9.0]);
        assert_eq!(qvel, [2.0, 9.0, 0.2, 9.0]);
    }

    #[test]
    fn scatter_rejects_wrong_length() {
        let layout = StateLayout::resolve(&table(), AxisSet::Planar).unwrap();
        let mut qpos = [0.0; 4];
        let mut qvel = [0.0; 4];
        let x = DVector::zeros(8);
        assert!(matches!(
            layout.scatter(&x, &mut qpos, &mut qvel),
            Err(PlantError::Dimension { expected: 4, got: 8, .. })
        ));
    }
}
