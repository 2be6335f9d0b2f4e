//! Cost weights with an edge-triggered change flag.

use nalgebra::{DMatrix, DVector};
use pb_plant::{SlotKind, StateLayout, StateSlot};
use serde::{Deserialize, Serialize};

use crate::error::{ControlError, ControlResult};

/// State penalties applied identically to every controlled axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AxisPenalties {
    pub position: f64,
    pub angle: f64,
    pub velocity: f64,
    pub angular_velocity: f64,
}

impl Default for AxisPenalties {
    fn default() -> Self {
        Self {
            position: 10.0,
            angle: 1000.0,
            velocity: 1.0,
            angular_velocity: 10.0,
        }
    }
}

impl AxisPenalties {
    pub fn get(&self, kind: SlotKind) -> f64 {
        match kind {
            SlotKind::Position => self.position,
            SlotKind::Angle => self.angle,
            SlotKind::Velocity => self.velocity,
            SlotKind::AngularVelocity => self.angular_velocity,
        }
    }

    pub fn validate(&self) -> ControlResult<()> {
        for v in [
            self.position,
            self.angle,
            self.velocity,
            self.angular_velocity,
        ] {
            check_weight(v)?;
        }
        Ok(())
    }
}

/// Diagonal Q and R plus the flag the controller polls.
///
/// Starts out flagged so the first controller tick synthesizes a gain.
/// Between [`begin_edit`](Self::begin_edit) and [`end_edit`](Self::end_edit)
/// changes are remembered but the flag is only raised when the edit ends,
/// so a slider drag costs one synthesis instead of one per frame.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightConfig {
    slots: Vec<StateSlot>,
    q_diag: DVector<f64>,
    r_diag: DVector<f64>,
    changed: bool,
    editing: bool,
    pending: bool,
}

impl WeightConfig {
    /// Build Q from per-axis penalties over `layout`, R = `control`·I.
    pub fn new(
        layout: &StateLayout,
        penalties: AxisPenalties,
        control: f64,
    ) -> ControlResult<Self> {
        penalties.validate()?;
        check_weight(control)?;
        let slots = layout.slots().to_vec();
        let q_diag = DVector::from_iterator(slots.len(), slots.iter().map(|s| penalties.get(s.kind)));
        let r_diag = DVector::from_element(layout.control_dim(), control);
        Ok(Self::from_parts(slots, q_diag, r_diag))
    }

    /// Build from explicit diagonals.
    pub fn from_diagonals(
        layout: &StateLayout,
        q_diag: DVector<f64>,
        r_diag: DVector<f64>,
    ) -> ControlResult<Self> {
        check_len("Q diagonal", layout.state_dim(), q_diag.len())?;
        check_len("R diagonal", layout.control_dim(), r_diag.len())?;
        for &v in q_diag.iter().chain(r_diag.iter()) {
            check_weight(v)?;
        }
        Ok(Self::from_parts(layout.slots().to_vec(), q_diag, r_diag))
    }

    fn from_parts(slots: Vec<StateSlot>, q_diag: DVector<f64>, r_diag: DVector<f64>) -> Self {
        Self {
            slots,
            q_diag,
            r_diag,
            changed: true,
            editing: false,
            pending: false,
        }
    }

    pub fn state_dim(&self) -> usize {
        self.q_diag.len()
    }

    pub fn control_dim(&self) -> usize {
        self.r_diag.len()
    }

    pub fn q_diag(&self) -> &DVector<f64> {
        &self.q_diag
    }

    pub fn r_diag(&self) -> &DVector<f64> {
        &self.r_diag
    }

    pub fn q(&self) -> DMatrix<f64> {
        DMatrix::from_diagonal(&self.q_diag)
    }

    pub fn r(&self) -> DMatrix<f64> {
        DMatrix::from_diagonal(&self.r_diag)
    }

    /// Current penalty for `kind`, read from the first slot of that kind.
    pub fn penalty(&self, kind: SlotKind) -> Option<f64> {
        self.slots
            .iter()
            .position(|s| s.kind == kind)
            .map(|i| self.q_diag[i])
    }

    pub fn set_q(&mut self, index: usize, value: f64) -> ControlResult<()> {
        check_weight(value)?;
        let len = self.q_diag.len();
        let entry = self.q_diag.get_mut(index).ok_or(ControlError::IndexOutOfRange {
            what: "Q diagonal",
            index,
            len,
        })?;
        if *entry != value {
            *entry = value;
            self.mark_changed();
        }
        Ok(())
    }

    pub fn set_r(&mut self, index: usize, value: f64) -> ControlResult<()> {
        check_weight(value)?;
        let len = self.r_diag.len();
        let entry = self.r_diag.get_mut(index).ok_or(ControlError::IndexOutOfRange {
            what: "R diagonal",
            index,
            len,
        })?;
        if *entry != value {
            *entry = value;
            self.mark_changed();
        }
        Ok(())
    }

    /// Set the penalty for `kind` on every controlled axis.
    pub fn set_penalty(&mut self, kind: SlotKind, value: f64) -> ControlResult<()> {
        check_weight(value)?;
        let indices: Vec<usize> = self
            .slots
            .iter()
            .enumerate()
            .filter(|(_, s)| s.kind == kind)
            .map(|(i, _)| i)
            .collect();
        for i in indices {
            self.set_q(i, value)?;
        }
        Ok(())
    }

    pub fn set_penalties(&mut self, penalties: AxisPenalties) -> ControlResult<()> {
        penalties.validate()?;
        for kind in [
            SlotKind::Position,
            SlotKind::Angle,
            SlotKind::Velocity,
            SlotKind::AngularVelocity,
        ] {
            self.set_penalty(kind, penalties.get(kind))?;
        }
        Ok(())
    }

    /// Set every entry of R to `value`.
    pub fn set_control_penalty(&mut self, value: f64) -> ControlResult<()> {
        check_weight(value)?;
        for i in 0..self.r_diag.len() {
            self.set_r(i, value)?;
        }
        Ok(())
    }

    pub fn begin_edit(&mut self) {
        self.editing = true;
    }

    pub fn end_edit(&mut self) {
        self.editing = false;
        if self.pending {
            self.pending = false;
            self.changed = true;
        }
    }

    pub fn is_editing(&self) -> bool {
        self.editing
    }

    /// Raise the flag without changing any weight.
    pub fn request_resynthesis(&mut self) {
        self.changed = true;
    }

    pub fn is_changed(&self) -> bool {
        self.changed
    }

    /// Return the flag and clear it.
    pub fn take_changed(&mut self) -> bool {
        std::mem::take(&mut self.changed)
    }

    fn mark_changed(&mut self) {
        if self.editing {
            self.pending = true;
        } else {
            self.changed = true;
        }
    }
}

fn check_weight(v: f64) -> ControlResult<()> {
    if v.is_finite() && v >= 0.0 {
        Ok(())
    } else {
        Err(ControlError::InvalidArg {
            what: "weights must be finite and non-negative",
        })
    }
}

fn check_len(what: &'static str, expected: usize, got: usize) -> ControlResult<()> {
    if expected == got {
        Ok(())
    } else {
        Err(ControlError::Dimension {
            what,
            expected,
            got,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pb_plant::{Axis, AxisSet, CartPoleParams, CartPolePlant};

    fn layout(axes: AxisSet) -> StateLayout {
        CartPolePlant::new(CartPoleParams::default(), axes)
            .unwrap()
            .layout()
            .clone()
    }

    #[test]
    fn default_penalties_fill_every_axis() {
        let layout = layout(AxisSet::Spatial);
        let w = WeightConfig::new(&layout, AxisPenalties::default(), 1.0).unwrap();
        assert_eq!(w.state_dim(), 8);
        assert_eq!(w.control_dim(), 2);
        for axis in Axis::ALL {
            let i = layout.index_of(axis, SlotKind::Angle).unwrap();
            assert_eq!(w.q_diag()[i], 1000.0);
            let i = layout.index_of(axis, SlotKind::AngularVelocity).unwrap();
            assert_eq!(w.q_diag()[i], 10.0);
        }
        assert_eq!(w.r(), DMatrix::identity(2, 2));
    }

    #[test]
    fn starts_flagged_and_take_clears() {
        let mut w = WeightConfig::new(&layout(AxisSet::Planar), AxisPenalties::default(), 1.0)
            .unwrap();
        assert!(w.take_changed());
        assert!(!w.take_changed());
    }

    #[test]
    fn only_real_changes_raise_the_flag() {
        let mut w = WeightConfig::new(&layout(AxisSet::Planar), AxisPenalties::default(), 1.0)
            .unwrap();
        w.take_changed();

        w.set_penalty(SlotKind::Angle, 1000.0).unwrap();
        assert!(!w.is_changed());

        w.set_penalty(SlotKind::Angle, 500.0).unwrap();
        assert!(w.take_changed());
        assert_eq!(w.penalty(SlotKind::Angle), Some(500.0));
    }

    #[test]
    fn drag_raises_flag_once_on_release() {
        let mut w = WeightConfig::new(&layout(AxisSet::Spatial), AxisPenalties::default(), 1.0)
            .unwrap();
        w.take_changed();

        w.begin_edit();
        for v in [20.0, 30.0, 40.0] {
            w.set_penalty(SlotKind::Position, v).unwrap();
            assert!(!w.is_changed());
        }
        w.end_edit();
        assert!(w.take_changed());
        assert!(!w.take_changed());

        // an empty drag raises nothing
        w.begin_edit();
        w.end_edit();
        assert!(!w.is_changed());
    }

    #[test]
    fn rejects_negative_and_non_finite() {
        let mut w = WeightConfig::new(&layout(AxisSet::Planar), AxisPenalties::default(), 1.0)
            .unwrap();
        w.take_changed();
        assert!(w.set_q(0, -1.0).is_err());
        assert!(w.set_r(0, f64::NAN).is_err());
        assert!(w.set_control_penalty(f64::INFINITY).is_err());
        assert!(!w.is_changed());
        assert_eq!(
            w.set_q(9, 1.0),
            Err(ControlError::IndexOutOfRange {
                what: "Q diagonal",
                index: 9,
                len: 4
            })
        );
    }

    #[test]
    fn zero_control_penalty_is_accepted() {
        let mut w = WeightConfig::new(&layout(AxisSet::Planar), AxisPenalties::default(), 1.0)
            .unwrap();
        w.set_control_penalty(0.0).unwrap();
        assert_eq!(w.r()[(0, 0)], 0.0);
    }

    #[test]
    fn manual_request() {
        let mut w = WeightConfig::new(&layout(AxisSet::Planar), AxisPenalties::default(), 1.0)
            .unwrap();
        w.take_changed();
        w.request_resynthesis();
        assert!(w.take_changed());
    }

    #[test]
    fn from_diagonals_checks_lengths() {
        let layout = layout(AxisSet::Planar);
        let err = WeightConfig::from_diagonals(
            &layout,
            DVector::from_element(3, 1.0),
            DVector::from_element(1, 1.0),
        )
        .unwrap_err();
        assert!(matches!(err, ControlError::Dimension { what: "Q diagonal", .. }));
    }
}
