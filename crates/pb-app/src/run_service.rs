//! Headless tick loop.
//!
//! Per tick, in order:
//! 1. apply weight changes that have come due (edge-triggers resynthesis)
//! 2. controller tick (resynthesize if flagged, write u = −K(x − x_ref))
//! 3. apply the pushes active at this time
//! 4. advance the plant by `dt`
//!
//! Every `record_every`-th tick the pre-step time, state and control are
//! recorded.

use std::fmt::Write as _;
use std::time::Instant;

use pb_control::SynthesisOutcome;
use pb_plant::{Axis, Plant};
use tracing::{info, warn};

use crate::config::BalanceConfig;
use crate::error::AppResult;
use crate::runtime::{build_runtime, control_labels, state_labels};

/// A resynthesis that happened during a run.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisEvent {
    pub t: f64,
    pub outcome: SynthesisOutcome,
}

/// Concise summary of a run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub ticks: usize,
    pub final_time_s: f64,
    /// Largest |tilt| over both axes and every tick.
    pub max_abs_tilt_rad: f64,
    pub final_abs_tilt_rad: f64,
    pub syntheses_ok: usize,
    pub syntheses_failed: usize,
    /// The pole passed horizontal at some point.
    pub fell: bool,
    pub wall_time_s: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunRecord {
    pub state_labels: Vec<String>,
    pub control_labels: Vec<String>,
    pub t: Vec<f64>,
    pub x: Vec<Vec<f64>>,
    pub u: Vec<Vec<f64>>,
    pub syntheses: Vec<SynthesisEvent>,
    pub summary: RunSummary,
}

impl RunRecord {
    /// Render as CSV with a `t_s` column followed by state and control columns.
    pub fn to_csv(&self) -> String {
        let mut csv = String::from("t_s");
        for label in self.state_labels.iter().chain(&self.control_labels) {
            csv.push(',');
            csv.push_str(label);
        }
        csv.push('\n');

        for ((t, x), u) in self.t.iter().zip(&self.x).zip(&self.u) {
            let _ = write!(csv, "{}", t);
            for v in x.iter().chain(u) {
                let _ = write!(csv, ",{}", v);
            }
            csv.push('\n');
        }
        csv
    }
}

/// Progress reported once per recorded sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunProgress {
    pub sim_time_s: f64,
    pub t_end_s: f64,
    pub fraction_complete: f64,
    pub step: usize,
}

pub fn run(config: &BalanceConfig) -> AppResult<RunRecord> {
    run_with_progress(config, None)
}

pub fn run_with_progress(
    config: &BalanceConfig,
    mut progress_cb: Option<&mut dyn FnMut(RunProgress)>,
) -> AppResult<RunRecord> {
    let started = Instant::now();
    let mut rt = build_runtime(config)?;
    let run = &config.run;
    let dt = run.dt_s;
    let ticks = (run.t_end_s / dt).round() as usize;

    let mut record = RunRecord {
        state_labels: state_labels(&rt.plant),
        control_labels: control_labels(&rt.plant),
        ..RunRecord::default()
    };
    let mut changes_applied = 0;
    let mut changes: Vec<_> = run.weight_changes.clone();
    changes.sort_by(|a, b| a.at_s.total_cmp(&b.at_s));

    let mut max_tilt: f64 = 0.0;
    for tick in 0..ticks {
        let t = tick as f64 * dt;

        while let Some(change) = changes.get(changes_applied) {
            if change.at_s > t {
                break;
            }
            rt.weights.set_penalties(change.weights.penalties())?;
            rt.weights.set_control_penalty(change.weights.control)?;
            info!(t, "applied weight change");
            changes_applied += 1;
        }

        let report = rt.controller.tick(&mut rt.plant, &mut rt.weights)?;
        if let Some(outcome) = report.synthesis {
            if let SynthesisOutcome::Failed(err) = &outcome {
                warn!(t, error = %err, "resynthesis failed during run");
            }
            record.syntheses.push(SynthesisEvent { t, outcome });
        }

        rt.plant.clear_forces();
        for d in run.disturbances.iter().filter(|d| d.is_active(t)) {
            let axis = Axis::from(d.axis);
            let total = rt.plant.applied_force(axis) + d.force_n;
            rt.plant.apply_force(axis, total)?;
        }

        if tick % run.record_every == 0 {
            record.t.push(t);
            record.x.push(rt.plant.state().iter().copied().collect());
            record.u.push(report.control.iter().copied().collect());
            if let Some(cb) = progress_cb.as_deref_mut() {
                cb(RunProgress {
                    sim_time_s: t,
                    t_end_s: run.t_end_s,
                    fraction_complete: tick as f64 / ticks as f64,
                    step: tick,
                });
            }
        }

        rt.plant.step(dt)?;
        max_tilt = max_tilt.max(max_abs_tilt(&rt.plant));
    }

    let syntheses_failed = record
        .syntheses
        .iter()
        .filter(|e| e.outcome.is_failure())
        .count();
    record.summary = RunSummary {
        ticks,
        final_time_s: rt.plant.time(),
        max_abs_tilt_rad: max_tilt,
        final_abs_tilt_rad: max_abs_tilt(&rt.plant),
        syntheses_ok: record.syntheses.len() - syntheses_failed,
        syntheses_failed,
        fell: max_tilt >= std::f64::consts::FRAC_PI_2,
        wall_time_s: started.elapsed().as_secs_f64(),
    };

    let s = &record.summary;
    info!(
        name = %config.name,
        ticks = s.ticks,
        max_tilt = s.max_abs_tilt_rad,
        final_tilt = s.final_abs_tilt_rad,
        ok = s.syntheses_ok,
        failed = s.syntheses_failed,
        fell = s.fell,
        "run complete"
    );
    Ok(record)
}

fn max_abs_tilt(plant: &pb_plant::CartPolePlant) -> f64 {
    Axis::ALL
        .iter()
        .map(|a| plant.tilt(*a).abs())
        .fold(0.0, f64::max)
}
