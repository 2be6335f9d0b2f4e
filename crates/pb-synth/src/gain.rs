//! Feedback gain and closed-loop diagnostics.

use nalgebra::{Complex, DMatrix, DVector, Schur};
use pb_core::ensure_finite_matrix;

use crate::care::{CareMethod, invert_r, solve_care_with};
use crate::error::{SynthError, SynthResult};

/// K = R⁻¹BᵗP, shape m×n.
pub fn compute_gain(
    b: &DMatrix<f64>,
    r: &DMatrix<f64>,
    p: &DMatrix<f64>,
) -> SynthResult<DMatrix<f64>> {
    let (n, m) = b.shape();
    if p.shape() != (n, n) {
        return Err(SynthError::Dimension {
            what: "P rows",
            expected: n,
            got: p.nrows(),
        });
    }
    if r.shape() != (m, m) {
        return Err(SynthError::Dimension {
            what: "R rows",
            expected: m,
            got: r.nrows(),
        });
    }
    let r_inv = invert_r(r)?;
    let k = r_inv * b.transpose() * p;
    ensure_finite_matrix(&k, "gain")?;
    Ok(k)
}

/// Solve the CARE and form the gain in one step. Returns (K, P).
pub fn lqr(
    a: &DMatrix<f64>,
    b: &DMatrix<f64>,
    q: &DMatrix<f64>,
    r: &DMatrix<f64>,
    method: CareMethod,
) -> SynthResult<(DMatrix<f64>, DMatrix<f64>)> {
    let p = solve_care_with(a, b, q, r, method)?;
    let k = compute_gain(b, r, &p)?;
    Ok((k, p))
}

/// Eigenvalues of A − BK.
pub fn closed_loop_poles(
    a: &DMatrix<f64>,
    b: &DMatrix<f64>,
    k: &DMatrix<f64>,
) -> SynthResult<DVector<Complex<f64>>> {
    if k.shape() != (b.ncols(), a.nrows()) {
        return Err(SynthError::Dimension {
            what: "K rows",
            expected: b.ncols(),
            got: k.nrows(),
        });
    }
    let closed = a - b * k;
    let schur = Schur::try_new(closed, f64::EPSILON, 0).ok_or(SynthError::EigenDecomposition {
        what: "Schur iteration did not converge",
    })?;
    Ok(schur.complex_eigenvalues())
}

/// Largest real part among `poles`; negative means asymptotically stable.
pub fn spectral_abscissa(poles: &DVector<Complex<f64>>) -> f64 {
    poles.iter().map(|p| p.re).fold(f64::NEG_INFINITY, f64::max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn double_integrator_gain() {
        let a = DMatrix::from_row_slice(2, 2, &[0.0, 1.0, 0.0, 0.0]);
        let b = DMatrix::from_row_slice(2, 1, &[0.0, 1.0]);
        let q = DMatrix::identity(2, 2);
        let r = DMatrix::from_element(1, 1, 1.0);

        let (k, _) = lqr(&a, &b, &q, &r, CareMethod::Eigenvector).unwrap();
        assert!((k[(0, 0)] - 1.0).abs() < 1e-9);
        assert!((k[(0, 1)] - 3f64.sqrt()).abs() < 1e-9);

        // s² + √3 s + 1
        let poles = closed_loop_poles(&a, &b, &k).unwrap();
        assert!((spectral_abscissa(&poles) + 3f64.sqrt() / 2.0).abs() < 1e-9);
    }

    #[test]
    fn gain_scales_inversely_with_r() {
        let b = DMatrix::from_row_slice(2, 1, &[0.0, 1.0]);
        let p = DMatrix::identity(2, 2);
        let k1 = compute_gain(&b, &DMatrix::from_element(1, 1, 1.0), &p).unwrap();
        let k2 = compute_gain(&b, &DMatrix::from_element(1, 1, 2.0), &p).unwrap();
        assert!((&k1 - k2.scale(2.0)).amax() < 1e-15);
    }

    #[test]
    fn repeated_gain_is_identical() {
        let b = DMatrix::from_row_slice(2, 1, &[0.0, 1.0]);
        let p = DMatrix::from_row_slice(2, 2, &[3.0, 1.0, 1.0, 2.0]);
        let r = DMatrix::from_element(1, 1, 0.5);
        let first = compute_gain(&b, &r, &p).unwrap();
        assert_eq!(compute_gain(&b, &r, &p).unwrap(), first);
    }

    #[test]
    fn singular_r_and_bad_shapes() {
        let b = DMatrix::from_row_slice(2, 1, &[0.0, 1.0]);
        let p = DMatrix::identity(2, 2);
        assert_eq!(
            compute_gain(&b, &DMatrix::zeros(1, 1), &p),
            Err(SynthError::SingularR)
        );
        assert!(matches!(
            compute_gain(&b, &DMatrix::identity(1, 1), &DMatrix::identity(3, 3)),
            Err(SynthError::Dimension { what: "P rows", .. })
        ));
    }

    #[test]
    fn abscissa_of_mixed_spectrum() {
        let poles = DVector::from_column_slice(&[
            Complex::new(-3.0, 1.0),
            Complex::new(-0.5, 0.0),
            Complex::new(-3.0, -1.0),
        ]);
        assert_eq!(spectral_abscissa(&poles), -0.5);
    }
}
