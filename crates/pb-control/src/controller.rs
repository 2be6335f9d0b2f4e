//! LQR state-feedback controller.
//!
//! Per tick:
//! 1. If the weights report a change, resynthesize (synchronously).
//! 2. Read x, write u = −K(x − x_ref).
//!
//! A failed synthesis leaves the previous gain in force. Until the first
//! success the controller writes zero control.

use nalgebra::{DMatrix, DVector};
use pb_plant::Plant;
use pb_synth::{OperatingPoint, SynthError, SynthesisContext, SynthesisOptions, synthesize};
use tracing::{debug, info, warn};

use crate::error::{ControlError, ControlResult};
use crate::weights::WeightConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerPhase {
    /// Applying the last valid gain.
    Idle,
    /// Inside a synthesis pass.
    Resynthesizing,
}

/// Result of one resynthesis attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum SynthesisOutcome {
    Updated { residual: f64, spectral_abscissa: f64 },
    Failed(SynthError),
}

impl SynthesisOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, SynthesisOutcome::Failed(_))
    }
}

/// What one tick did.
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    /// Control vector written to the plant.
    pub control: DVector<f64>,
    /// Present when this tick resynthesized.
    pub synthesis: Option<SynthesisOutcome>,
}

#[derive(Debug, Clone)]
pub struct LqrController {
    operating_point: OperatingPoint,
    options: SynthesisOptions,
    phase: ControllerPhase,
    context: Option<SynthesisContext>,
    reference: Option<DVector<f64>>,
    last_failure: Option<SynthError>,
    successes: usize,
    failures: usize,
}

impl LqrController {
    pub fn new(operating_point: OperatingPoint, options: SynthesisOptions) -> Self {
        Self {
            operating_point,
            options,
            phase: ControllerPhase::Idle,
            context: None,
            reference: None,
            last_failure: None,
            successes: 0,
            failures: 0,
        }
    }

    /// Controller linearizing about the upright equilibrium of `plant`.
    pub fn for_plant<P: Plant + ?Sized>(plant: &P, options: SynthesisOptions) -> Self {
        Self::new(OperatingPoint::upright_for(plant), options)
    }

    pub fn phase(&self) -> ControllerPhase {
        self.phase
    }

    pub fn state_dim(&self) -> usize {
        self.operating_point.x0.len()
    }

    pub fn control_dim(&self) -> usize {
        self.operating_point.u0.len()
    }

    pub fn options(&self) -> &SynthesisOptions {
        &self.options
    }

    /// Takes effect at the next resynthesis.
    pub fn set_options(&mut self, options: SynthesisOptions) {
        self.options = options;
    }

    pub fn gain(&self) -> Option<&DMatrix<f64>> {
        self.context.as_ref().map(|c| &c.k)
    }

    pub fn context(&self) -> Option<&SynthesisContext> {
        self.context.as_ref()
    }

    /// Error from the most recent attempt, cleared by the next success.
    pub fn last_failure(&self) -> Option<&SynthError> {
        self.last_failure.as_ref()
    }

    pub fn successes(&self) -> usize {
        self.successes
    }

    pub fn failures(&self) -> usize {
        self.failures
    }

    pub fn reference(&self) -> Option<&DVector<f64>> {
        self.reference.as_ref()
    }

    /// Set point the state is regulated to; `None` means the origin.
    pub fn set_reference(&mut self, reference: Option<DVector<f64>>) -> ControlResult<()> {
        if let Some(r) = &reference {
            if r.len() != self.state_dim() {
                return Err(ControlError::Dimension {
                    what: "reference",
                    expected: self.state_dim(),
                    got: r.len(),
                });
            }
            if r.iter().any(|v| !v.is_finite()) {
                return Err(ControlError::InvalidArg {
                    what: "reference must be finite",
                });
            }
        }
        self.reference = reference;
        Ok(())
    }

    /// Run one synthesis pass now, regardless of the weight flag.
    pub fn resynthesize<P: Plant + ?Sized>(
        &mut self,
        plant: &mut P,
        weights: &WeightConfig,
    ) -> SynthesisOutcome {
        self.phase = ControllerPhase::Resynthesizing;
        let result = synthesize(
            plant,
            &self.operating_point,
            &weights.q(),
            &weights.r(),
            &self.options,
        );
        self.phase = ControllerPhase::Idle;

        match result {
            Ok(ctx) => {
                let outcome = SynthesisOutcome::Updated {
                    residual: ctx.residual,
                    spectral_abscissa: ctx.spectral_abscissa(),
                };
                info!(gain = %ctx.k, "controller gain updated");
                self.context = Some(ctx);
                self.last_failure = None;
                self.successes += 1;
                outcome
            }
            Err(err) => {
                warn!(
                    error = %err,
                    has_gain = self.context.is_some(),
                    "synthesis failed, keeping previous gain"
                );
                self.last_failure = Some(err.clone());
                self.failures += 1;
                SynthesisOutcome::Failed(err)
            }
        }
    }

    /// u = −K(x − x_ref), or zero before the first successful synthesis.
    pub fn control_for(&self, x: &DVector<f64>) -> ControlResult<DVector<f64>> {
        if x.len() != self.state_dim() {
            return Err(ControlError::Dimension {
                what: "state",
                expected: self.state_dim(),
                got: x.len(),
            });
        }
        let Some(ctx) = &self.context else {
            return Ok(DVector::zeros(self.control_dim()));
        };
        let error = match &self.reference {
            Some(r) => x - r,
            None => x.clone(),
        };
        Ok(-(&ctx.k * error))
    }

    /// One control tick against `plant`.
    pub fn tick<P: Plant + ?Sized>(
        &mut self,
        plant: &mut P,
        weights: &mut WeightConfig,
    ) -> ControlResult<TickReport> {
        if weights.state_dim() != self.state_dim() {
            return Err(ControlError::Dimension {
                what: "Q diagonal",
                expected: self.state_dim(),
                got: weights.state_dim(),
            });
        }
        if weights.control_dim() != self.control_dim() {
            return Err(ControlError::Dimension {
                what: "R diagonal",
                expected: self.control_dim(),
                got: weights.control_dim(),
            });
        }

        let synthesis = if weights.take_changed() {
            debug!("weights changed, resynthesizing");
            Some(self.resynthesize(plant, weights))
        } else {
            None
        };

        let x = plant.state();
        let control = self.control_for(&x)?;
        plant.set_control(&control)?;
        Ok(TickReport { control, synthesis })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::weights::AxisPenalties;
    use pb_plant::{Axis, AxisSet, CartPoleParams, CartPolePlant, SlotKind};

    fn setup(axes: AxisSet) -> (CartPolePlant, WeightConfig, LqrController) {
        let plant = CartPolePlant::new(CartPoleParams::default(), axes).unwrap();
        let weights = WeightConfig::new(plant.layout(), AxisPenalties::default(), 1.0).unwrap();
        let controller = LqrController::for_plant(&plant, SynthesisOptions::default());
        (plant, weights, controller)
    }

    #[test]
    fn zero_control_before_first_gain() {
        let (mut plant, mut weights, mut ctrl) = setup(AxisSet::Spatial);
        weights.take_changed();
        plant.set_tilt(Axis::X, 0.1).unwrap();

        let report = ctrl.tick(&mut plant, &mut weights).unwrap();
        assert_eq!(report.synthesis, None);
        assert_eq!(report.control, DVector::zeros(2));
        assert!(ctrl.gain().is_none());
    }

    #[test]
    fn first_tick_synthesizes_and_applies_feedback() {
        let (mut plant, mut weights, mut ctrl) = setup(AxisSet::Planar);
        plant.set_tilt(Axis::X, 0.1).unwrap();

        let report = ctrl.tick(&mut plant, &mut weights).unwrap();
        assert!(matches!(report.synthesis, Some(SynthesisOutcome::Updated { .. })));
        assert_eq!(ctrl.phase(), ControllerPhase::Idle);

        let k = ctrl.gain().unwrap();
        let expected = -(k * plant.state());
        assert_eq!(report.control, expected);
        assert_eq!(plant.control(), expected);
        // leaning +x: push the platform toward +x
        assert!(report.control[0] > 0.0);

        // no change, no synthesis
        let report = ctrl.tick(&mut plant, &mut weights).unwrap();
        assert_eq!(report.synthesis, None);
        assert_eq!(ctrl.successes(), 1);
    }

    #[test]
    fn singular_r_keeps_previous_gain() {
        let (mut plant, mut weights, mut ctrl) = setup(AxisSet::Planar);
        ctrl.tick(&mut plant, &mut weights).unwrap();
        let k_before = ctrl.gain().unwrap().clone();

        weights.set_control_penalty(0.0).unwrap();
        let report = ctrl.tick(&mut plant, &mut weights).unwrap();
        assert_eq!(
            report.synthesis,
            Some(SynthesisOutcome::Failed(SynthError::SingularR))
        );
        assert_eq!(ctrl.gain(), Some(&k_before));
        assert_eq!(ctrl.last_failure(), Some(&SynthError::SingularR));

        // no automatic retry
        let report = ctrl.tick(&mut plant, &mut weights).unwrap();
        assert_eq!(report.synthesis, None);
        assert_eq!(ctrl.failures(), 1);

        weights.set_control_penalty(2.0).unwrap();
        let report = ctrl.tick(&mut plant, &mut weights).unwrap();
        assert!(matches!(report.synthesis, Some(SynthesisOutcome::Updated { .. })));
        assert!(ctrl.last_failure().is_none());
        assert_ne!(ctrl.gain(), Some(&k_before));
    }

    #[test]
    fn heavier_angle_penalty_stiffens_angle_gain() {
        let (mut plant, mut weights, mut ctrl) = setup(AxisSet::Planar);
        let angle = plant.layout().index_of(Axis::X, SlotKind::Angle).unwrap();
        ctrl.tick(&mut plant, &mut weights).unwrap();
        let soft = ctrl.gain().unwrap()[(0, angle)].abs();

        weights.set_penalty(SlotKind::Angle, 10_000.0).unwrap();
        ctrl.tick(&mut plant, &mut weights).unwrap();
        let stiff = ctrl.gain().unwrap()[(0, angle)].abs();
        assert!(stiff > soft);
    }

    #[test]
    fn reference_shifts_regulation_target() {
        let (mut plant, mut weights, mut ctrl) = setup(AxisSet::Planar);
        ctrl.tick(&mut plant, &mut weights).unwrap();

        let pos = plant.layout().index_of(Axis::X, SlotKind::Position).unwrap();
        let mut target = DVector::zeros(4);
        target[pos] = 1.0;
        ctrl.set_reference(Some(target.clone())).unwrap();

        // at the target the controller is silent
        plant.set_state(&target).unwrap();
        let u = ctrl.tick(&mut plant, &mut weights).unwrap().control;
        assert!(u.amax() < 1e-12);

        assert!(matches!(
            ctrl.set_reference(Some(DVector::zeros(3))),
            Err(ControlError::Dimension { what: "reference", .. })
        ));
    }

    #[test]
    fn mismatched_weights_rejected() {
        let (mut plant, _, mut ctrl) = setup(AxisSet::Spatial);
        let planar = CartPolePlant::new(CartPoleParams::default(), AxisSet::Planar).unwrap();
        let mut wrong = WeightConfig::new(planar.layout(), AxisPenalties::default(), 1.0).unwrap();
        assert!(matches!(
            ctrl.tick(&mut plant, &mut wrong),
            Err(ControlError::Dimension { .. })
        ));
    }
}
