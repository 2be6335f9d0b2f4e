//! Linearize, solve, form the gain: one synthesis pass.

use nalgebra::{Complex, DMatrix, DVector};
use pb_core::timing::{Timer, synthesis_timing};
use pb_plant::Plant;
use tracing::{debug, info};

use crate::care::{CareMethod, care_residual, solve_care_with};
use crate::error::{SynthError, SynthResult};
use crate::gain::{closed_loop_poles, compute_gain, spectral_abscissa};
use crate::jacobian::DifferenceScheme;
use crate::linearize::{DEFAULT_EPSILON, Linearization, OperatingPoint, linearize_with};

/// Knobs for one synthesis pass.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SynthesisOptions {
    /// Finite-difference perturbation.
    pub epsilon: f64,
    pub difference: DifferenceScheme,
    pub method: CareMethod,
}

impl Default for SynthesisOptions {
    fn default() -> Self {
        Self {
            epsilon: DEFAULT_EPSILON,
            difference: DifferenceScheme::Forward,
            method: CareMethod::Eigenvector,
        }
    }
}

/// Everything one synthesis pass produced.
#[derive(Clone, Debug, PartialEq)]
pub struct SynthesisContext {
    pub a: DMatrix<f64>,
    pub b: DMatrix<f64>,
    pub q: DMatrix<f64>,
    pub r: DMatrix<f64>,
    /// Stabilizing Riccati solution, symmetric.
    pub p: DMatrix<f64>,
    /// Feedback gain, m×n.
    pub k: DMatrix<f64>,
    /// Frobenius norm of the Riccati residual at `p`.
    pub residual: f64,
    /// Eigenvalues of A − BK.
    pub poles: DVector<Complex<f64>>,
}

impl SynthesisContext {
    /// Synthesize from a known linear model, skipping linearization.
    pub fn from_model(
        a: DMatrix<f64>,
        b: DMatrix<f64>,
        q: &DMatrix<f64>,
        r: &DMatrix<f64>,
        method: CareMethod,
    ) -> SynthResult<Self> {
        let timer = Timer::start("care");
        let p = solve_care_with(&a, &b, q, r, method)?;
        timer.stop_into(&synthesis_timing::CARE);

        let timer = Timer::start("gain");
        let k = compute_gain(&b, r, &p)?;
        let poles = closed_loop_poles(&a, &b, &k)?;
        let abscissa = spectral_abscissa(&poles);
        if !(abscissa < 0.0) {
            return Err(SynthError::NotStabilizing {
                max_real_part: abscissa,
            });
        }
        let residual = care_residual(&a, &b, q, r, &p)?;
        timer.stop_into(&synthesis_timing::GAIN);

        Ok(Self {
            a,
            b,
            q: q.clone(),
            r: r.clone(),
            p,
            k,
            residual,
            poles,
        })
    }

    pub fn state_dim(&self) -> usize {
        self.a.nrows()
    }

    pub fn control_dim(&self) -> usize {
        self.b.ncols()
    }

    /// Largest closed-loop real part; always negative for a returned context.
    pub fn spectral_abscissa(&self) -> f64 {
        spectral_abscissa(&self.poles)
    }

    /// Residual divided by the size of the terms it balances.
    pub fn relative_residual(&self) -> f64 {
        let scale = (self.a.transpose() * &self.p).norm() + self.q.norm();
        self.residual / scale.max(1.0)
    }
}

/// Run the whole pipeline against `plant` about `op`.
///
/// The plant comes back in the state it was handed over in. On error no
/// partial result escapes.
pub fn synthesize<P: Plant + ?Sized>(
    plant: &mut P,
    op: &OperatingPoint,
    q: &DMatrix<f64>,
    r: &DMatrix<f64>,
    options: &SynthesisOptions,
) -> SynthResult<SynthesisContext> {
    let timer = Timer::start("linearize");
    let Linearization { a, b } = linearize_with(plant, op, options.epsilon, options.difference)?;
    timer.stop_into(&synthesis_timing::LINEARIZE);
    debug!(a = %a, b = %b, "linear model");

    let ctx = SynthesisContext::from_model(a, b, q, r, options.method)?;
    info!(
        n = ctx.state_dim(),
        m = ctx.control_dim(),
        residual = ctx.residual,
        abscissa = ctx.spectral_abscissa(),
        method = ?options.method,
        "synthesized feedback gain"
    );
    Ok(ctx)
}
