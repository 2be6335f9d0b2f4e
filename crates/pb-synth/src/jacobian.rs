//! Finite difference Jacobian computation.

use crate::error::{SynthError, SynthResult};
use nalgebra::{DMatrix, DVector};

/// Finite-difference stencil used for linearization.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DifferenceScheme {
    /// (f(x + eps e_j) - f(x)) / eps. One evaluation per column, O(eps) error.
    #[default]
    Forward,
    /// (f(x + eps e_j) - f(x - eps e_j)) / 2 eps. Two evaluations per column,
    /// O(eps²) error.
    Central,
}

/// Compute Jacobian using forward finite differences.
///
/// For each column j, perturbs x[j] by exactly `epsilon` and computes
/// (f(x+e) - f(x))/epsilon. `f_x` is the already evaluated f(x).
pub fn finite_difference_jacobian<F>(
    x: &DVector<f64>,
    f_x: &DVector<f64>,
    mut f: F,
    epsilon: f64,
) -> SynthResult<DMatrix<f64>>
where
    F: FnMut(&DVector<f64>) -> SynthResult<DVector<f64>>,
{
    let n = x.len();
    let m = f_x.len();

    let mut jac = DMatrix::zeros(m, n);

    for j in 0..n {
        let mut x_perturbed = x.clone();
        x_perturbed[j] += epsilon;

        let f_perturbed = check_len(f(&x_perturbed)?, m)?;
        jac.set_column(j, &((f_perturbed - f_x) / epsilon));
    }

    Ok(jac)
}

/// Compute Jacobian using central finite differences (more accurate but 2x cost).
pub fn central_difference_jacobian<F>(
    x: &DVector<f64>,
    m: usize,
    mut f: F,
    epsilon: f64,
) -> SynthResult<DMatrix<f64>>
where
    F: FnMut(&DVector<f64>) -> SynthResult<DVector<f64>>,
{
    let n = x.len();
    let mut jac = DMatrix::zeros(m, n);

    for j in 0..n {
        let mut x_plus = x.clone();
        x_plus[j] += epsilon;
        let f_plus = check_len(f(&x_plus)?, m)?;

        let mut x_minus = x.clone();
        x_minus[j] -= epsilon;
        let f_minus = check_len(f(&x_minus)?, m)?;

        jac.set_column(j, &((f_plus - f_minus) / (2.0 * epsilon)));
    }

    Ok(jac)
}

/// Dispatch on `scheme`.
pub fn jacobian<F>(
    scheme: DifferenceScheme,
    x: &DVector<f64>,
    f_x: &DVector<f64>,
    f: F,
    epsilon: f64,
) -> SynthResult<DMatrix<f64>>
where
    F: FnMut(&DVector<f64>) -> SynthResult<DVector<f64>>,
{
    match scheme {
        DifferenceScheme::Forward => finite_difference_jacobian(x, f_x, f, epsilon),
        DifferenceScheme::Central => central_difference_jacobian(x, f_x.len(), f, epsilon),
    }
}

fn check_len(v: DVector<f64>, m: usize) -> SynthResult<DVector<f64>> {
    if v.len() == m {
        Ok(v)
    } else {
        Err(SynthError::Dimension {
            what: "derivative evaluation",
            expected: m,
            got: v.len(),
        })
    }
}
