//! Continuous-time algebraic Riccati equation.
//!
//! Solves AᵗP + PA − PBR⁻¹BᵗP + Q = 0 for the stabilizing P through the
//! stable invariant subspace of the Hamiltonian
//!
//! ```text
//! H = [  A   −BR⁻¹Bᵗ ]
//!     [ −Q     −Aᵗ   ]
//! ```
//!
//! If the columns of [U1; U2] span that subspace, P = U2 U1⁻¹. Two ways of
//! finding the subspace sit behind the same contract:
//! - [`CareMethod::Eigenvector`]: eigenvalues from the real Schur form, one
//!   eigenvector per stable eigenvalue (null space of H − λI via SVD).
//! - [`CareMethod::MatrixSign`]: Newton iteration for sign(H), whose −1
//!   eigenspace is the stable subspace.

use nalgebra::{Complex, DMatrix, DVector, SVD, Schur};
use pb_core::{asymmetry, ensure_finite_matrix, symmetrize};
use tracing::debug;

use crate::error::{SynthError, SynthResult};

/// Eigenvalues with real part at or below this count as stable on the
/// second, relaxed selection pass.
pub const RELAXED_STABILITY_THRESHOLD: f64 = 1e-12;

/// Relative distance under which two eigenvalues are treated as one
/// repeated eigenvalue.
const CLUSTER_TOL: f64 = 1e-6;

/// Smallest singular value, relative to the largest (floored at 1), a basis
/// block may have and still be inverted.
const BASIS_RCOND: f64 = 1e-12;

const SIGN_MAX_ITER: usize = 100;
const SIGN_TOL: f64 = 1e-12;

/// How the stable invariant subspace of the Hamiltonian is found.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CareMethod {
    /// Stable eigenvectors of H. Reference behaviour.
    #[default]
    Eigenvector,
    /// Matrix sign function of H.
    MatrixSign,
}

/// Solve the CARE with the default [`CareMethod`].
pub fn solve_care(
    a: &DMatrix<f64>,
    b: &DMatrix<f64>,
    q: &DMatrix<f64>,
    r: &DMatrix<f64>,
) -> SynthResult<DMatrix<f64>> {
    solve_care_with(a, b, q, r, CareMethod::default())
}

/// Solve the CARE, returning the symmetrized stabilizing solution P.
pub fn solve_care_with(
    a: &DMatrix<f64>,
    b: &DMatrix<f64>,
    q: &DMatrix<f64>,
    r: &DMatrix<f64>,
    method: CareMethod,
) -> SynthResult<DMatrix<f64>> {
    let n = check_shapes(a, b, q, r)?;
    let r_inv = invert_r(r)?;
    let h = hamiltonian(a, b, q, &r_inv);

    let p = match method {
        CareMethod::Eigenvector => stable_subspace_eigen(&h, n)?,
        CareMethod::MatrixSign => stable_subspace_sign(&h, n)?,
    };
    ensure_finite_matrix(&p, "riccati solution")?;

    debug!(
        n,
        ?method,
        asymmetry = asymmetry(&p),
        "solved riccati equation"
    );
    Ok(symmetrize(&p))
}

/// Build H = [[A, −B R⁻¹ Bᵗ], [−Q, −Aᵗ]].
pub fn hamiltonian(
    a: &DMatrix<f64>,
    b: &DMatrix<f64>,
    q: &DMatrix<f64>,
    r_inv: &DMatrix<f64>,
) -> DMatrix<f64> {
    let n = a.nrows();
    let g = b * r_inv * b.transpose();

    let mut h = DMatrix::zeros(2 * n, 2 * n);
    h.view_mut((0, 0), (n, n)).copy_from(a);
    h.view_mut((0, n), (n, n)).copy_from(&(-g));
    h.view_mut((n, 0), (n, n)).copy_from(&(-q));
    h.view_mut((n, n), (n, n)).copy_from(&(-a.transpose()));
    h
}

/// Frobenius norm of AᵗP + PA − PBR⁻¹BᵗP + Q.
pub fn care_residual(
    a: &DMatrix<f64>,
    b: &DMatrix<f64>,
    q: &DMatrix<f64>,
    r: &DMatrix<f64>,
    p: &DMatrix<f64>,
) -> SynthResult<f64> {
    check_shapes(a, b, q, r)?;
    let r_inv = invert_r(r)?;
    let residual = a.transpose() * p + p * a - p * b * r_inv * b.transpose() * p + q;
    Ok(residual.norm())
}

pub(crate) fn invert_r(r: &DMatrix<f64>) -> SynthResult<DMatrix<f64>> {
    let r_inv = r.clone().try_inverse().ok_or(SynthError::SingularR)?;
    if r_inv.iter().any(|v| !v.is_finite()) {
        return Err(SynthError::SingularR);
    }
    Ok(r_inv)
}

/// Validate shapes and basic invariants, returning n.
fn check_shapes(
    a: &DMatrix<f64>,
    b: &DMatrix<f64>,
    q: &DMatrix<f64>,
    r: &DMatrix<f64>,
) -> SynthResult<usize> {
    let n = a.nrows();
    let dim = |what, expected, got| {
        if expected == got {
            Ok(())
        } else {
            Err(SynthError::Dimension {
                what,
                expected,
                got,
            })
        }
    };
    if n == 0 {
        return Err(SynthError::InvalidArg {
            what: "A must be non-empty",
        });
    }
    dim("A columns", n, a.ncols())?;
    dim("B rows", n, b.nrows())?;
    let m = b.ncols();
    if m == 0 {
        return Err(SynthError::InvalidArg {
            what: "B must have at least one column",
        });
    }
    dim("Q rows", n, q.nrows())?;
    dim("Q columns", n, q.ncols())?;
    dim("R rows", m, r.nrows())?;
    dim("R columns", m, r.ncols())?;

    ensure_finite_matrix(a, "A")?;
    ensure_finite_matrix(b, "B")?;
    ensure_finite_matrix(q, "Q")?;
    ensure_finite_matrix(r, "R")?;

    if asymmetry(q) > 1e-12 * q.amax().max(1.0) {
        return Err(SynthError::InvalidArg {
            what: "Q must be symmetric",
        });
    }
    if q.diagonal().iter().any(|d| *d < 0.0) {
        return Err(SynthError::InvalidArg {
            what: "Q diagonal must be non-negative",
        });
    }
    Ok(n)
}

/// Pick exactly `n` stable eigenvalues: strictly negative real part first,
/// then real part ≤ [`RELAXED_STABILITY_THRESHOLD`].
pub(crate) fn select_stable(
    eigenvalues: &DVector<Complex<f64>>,
    n: usize,
) -> SynthResult<Vec<Complex<f64>>> {
    let strict: Vec<_> = eigenvalues.iter().copied().filter(|l| l.re < 0.0).collect();
    if strict.len() == n {
        return Ok(strict);
    }

    let relaxed: Vec<_> = eigenvalues
        .iter()
        .copied()
        .filter(|l| l.re <= RELAXED_STABILITY_THRESHOLD)
        .collect();
    if relaxed.len() == n {
        debug!(
            strict = strict.len(),
            n, "stable eigenvalue count needed the relaxed threshold"
        );
        return Ok(relaxed);
    }

    Err(SynthError::WrongEigenspaceDimension {
        found: relaxed.len(),
        expected: n,
    })
}

/// Group numerically repeated eigenvalues into (mean, multiplicity).
fn cluster(values: &[Complex<f64>]) -> Vec<(Complex<f64>, usize)> {
    let mut groups: Vec<(Complex<f64>, usize)> = Vec::new();
    for &l in values {
        let hit = groups.iter_mut().find(|(sum, k)| {
            let centre = *sum / (*k as f64);
            (l - centre).norm() <= CLUSTER_TOL * centre.norm().max(1.0)
        });
        match hit {
            Some(group) => {
                group.0 += l;
                group.1 += 1;
            }
            None => groups.push((l, 1)),
        }
    }
    groups
        .into_iter()
        .map(|(sum, k)| (sum / k as f64, k))
        .collect()
}

fn stable_subspace_eigen(h: &DMatrix<f64>, n: usize) -> SynthResult<DMatrix<f64>> {
    let schur = Schur::try_new(h.clone(), f64::EPSILON, 0).ok_or(
        SynthError::EigenDecomposition {
            what: "Schur iteration did not converge",
        },
    )?;
    let stable = select_stable(&schur.complex_eigenvalues(), n)?;

    let h_c = h.map(|v| Complex::new(v, 0.0));
    let mut basis = DMatrix::<Complex<f64>>::zeros(2 * n, n);
    let mut col = 0;
    for (lambda, multiplicity) in cluster(&stable) {
        for v in null_space(&h_c, lambda, multiplicity)? {
            basis.set_column(col, &v);
            col += 1;
        }
    }

    let u1 = basis.rows(0, n).into_owned();
    let u2 = basis.rows(n, n).into_owned();
    let u1_inv = invert_basis(u1)?;

    Ok((u2 * u1_inv).map(|z| z.re))
}

/// `k` orthonormal vectors spanning (approximately) the null space of H − λI.
fn null_space(
    h: &DMatrix<Complex<f64>>,
    lambda: Complex<f64>,
    k: usize,
) -> SynthResult<Vec<DVector<Complex<f64>>>> {
    let mut shifted = h.clone();
    for i in 0..shifted.nrows() {
        shifted[(i, i)] -= lambda;
    }

    let SVD {
        singular_values,
        v_t,
        ..
    } = SVD::try_new(shifted, false, true, f64::EPSILON, 0).ok_or(
        SynthError::EigenDecomposition {
            what: "SVD did not converge",
        },
    )?;
    let v_t = v_t.ok_or(SynthError::EigenDecomposition {
        what: "SVD returned no right singular vectors",
    })?;

    let mut order: Vec<usize> = (0..singular_values.len()).collect();
    order.sort_by(|&i, &j| singular_values[i].total_cmp(&singular_values[j]));

    Ok(order
        .into_iter()
        .take(k)
        .map(|i| v_t.row(i).adjoint())
        .collect())
}

fn invert_basis(u1: DMatrix<Complex<f64>>) -> SynthResult<DMatrix<Complex<f64>>> {
    let sv = SVD::try_new(u1.clone(), false, false, f64::EPSILON, 0)
        .ok_or(SynthError::EigenDecomposition {
            what: "SVD did not converge",
        })?
        .singular_values;
    let smax = sv.max();
    let smin = sv.min();
    if smin <= BASIS_RCOND * smax.max(1.0) {
        return Err(SynthError::SingularEigenbasis);
    }
    u1.try_inverse().ok_or(SynthError::SingularEigenbasis)
}

fn stable_subspace_sign(h: &DMatrix<f64>, n: usize) -> SynthResult<DMatrix<f64>> {
    let dim = 2 * n;
    let mut z = h.clone();
    let mut converged = false;

    for _ in 0..SIGN_MAX_ITER {
        let lu = z.clone().lu();
        let z_inv = lu.try_inverse().ok_or(SynthError::NoDichotomy {
            what: "eigenvalue on the imaginary axis",
        })?;
        // determinant scaling: c = |det Z|^(1/dim)
        let log_det: f64 = lu.u().diagonal().iter().map(|d| d.abs().ln()).sum();
        let c = (log_det / dim as f64).exp();
        if !c.is_finite() || c == 0.0 {
            return Err(SynthError::NoDichotomy {
                what: "degenerate sign iterate",
            });
        }

        let z_next = z.scale(0.5 / c) + z_inv.scale(0.5 * c);
        let delta = (&z_next - &z).norm();
        let scale = z.norm();
        z = z_next;
        if delta <= SIGN_TOL * scale {
            converged = true;
            break;
        }
    }
    if !converged {
        return Err(SynthError::NoDichotomy {
            what: "sign iteration did not converge",
        });
    }

    // (sign(H) + I) [I; P] = 0  =>  [W12; W22 + I] P = −[W11 + I; W21]
    let eye = DMatrix::<f64>::identity(n, n);
    let mut lhs = DMatrix::<f64>::zeros(dim, n);
    lhs.view_mut((0, 0), (n, n))
        .copy_from(&z.view((0, n), (n, n)));
    lhs.view_mut((n, 0), (n, n))
        .copy_from(&(z.view((n, n), (n, n)) + &eye));
    let mut rhs = DMatrix::<f64>::zeros(dim, n);
    rhs.view_mut((0, 0), (n, n))
        .copy_from(&(-(z.view((0, 0), (n, n)) + &eye)));
    rhs.view_mut((n, 0), (n, n))
        .copy_from(&(-z.view((n, 0), (n, n))));

    let svd = SVD::try_new(lhs, true, true, f64::EPSILON, 0).ok_or(
        SynthError::EigenDecomposition {
            what: "SVD did not converge",
        },
    )?;
    let smax = svd.singular_values.max();
    if svd.singular_values.min() <= BASIS_RCOND * smax.max(1.0) {
        return Err(SynthError::SingularEigenbasis);
    }
    svd.solve(&rhs, BASIS_RCOND * smax)
        .map_err(|_| SynthError::SingularEigenbasis)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pb_core::diag;

    fn double_integrator() -> (DMatrix<f64>, DMatrix<f64>, DMatrix<f64>, DMatrix<f64>) {
        (
            DMatrix::from_row_slice(2, 2, &[0.0, 1.0, 0.0, 0.0]),
            DMatrix::from_row_slice(2, 1, &[0.0, 1.0]),
            DMatrix::identity(2, 2),
            DMatrix::from_element(1, 1, 1.0),
        )
    }

    fn closed_form_double_integrator() -> DMatrix<f64> {
        let s3 = 3f64.sqrt();
        DMatrix::from_row_slice(2, 2, &[s3, 1.0, 1.0, s3])
    }

    #[test]
    fn double_integrator_eigenvector_path() {
        let (a, b, q, r) = double_integrator();
        let p = solve_care(&a, &b, &q, &r).unwrap();
        assert!((&p - closed_form_double_integrator()).amax() < 1e-9);
        assert!(care_residual(&a, &b, &q, &r, &p).unwrap() < 1e-9);
    }

    #[test]
    fn double_integrator_sign_path() {
        let (a, b, q, r) = double_integrator();
        let p = solve_care_with(&a, &b, &q, &r, CareMethod::MatrixSign).unwrap();
        assert!((&p - closed_form_double_integrator()).amax() < 1e-9);
    }

    #[test]
    fn scalar_unstable_plant() {
        // 2p − p² + 1 = 0, stabilizing root p = 1 + √2
        let one = DMatrix::from_element(1, 1, 1.0);
        for method in [CareMethod::Eigenvector, CareMethod::MatrixSign] {
            let p = solve_care_with(&one, &one, &one, &one, method).unwrap();
            assert!((p[(0, 0)] - (1.0 + 2f64.sqrt())).abs() < 1e-10);
        }
    }

    #[test]
    fn result_is_exactly_symmetric() {
        let a = DMatrix::from_row_slice(3, 3, &[0.0, 1.0, 0.0, 0.0, 0.0, 1.0, -1.0, 2.0, 0.5]);
        let b = DMatrix::from_row_slice(3, 1, &[0.0, 0.0, 1.0]);
        let q = diag(&[10.0, 1.0, 0.1]);
        let r = DMatrix::from_element(1, 1, 0.5);
        let p = solve_care(&a, &b, &q, &r).unwrap();
        assert!(asymmetry(&p) < 1e-9);
        assert_eq!(p, p.transpose());
    }

    #[test]
    fn singular_r_rejected() {
        let (a, b, q, _) = double_integrator();
        let r = DMatrix::zeros(1, 1);
        assert_eq!(solve_care(&a, &b, &q, &r), Err(SynthError::SingularR));
        assert_eq!(
            solve_care_with(&a, &b, &q, &r, CareMethod::MatrixSign),
            Err(SynthError::SingularR)
        );
    }

    #[test]
    fn purely_imaginary_spectrum_has_no_stable_subspace() {
        // H is the zero matrix: every eigenvalue sits on the imaginary axis
        let zero = DMatrix::zeros(1, 1);
        let r = DMatrix::from_element(1, 1, 1.0);
        assert_eq!(
            solve_care(&zero, &zero, &zero, &r),
            Err(SynthError::WrongEigenspaceDimension {
                found: 2,
                expected: 1
            })
        );
        assert!(matches!(
            solve_care_with(&zero, &zero, &zero, &r, CareMethod::MatrixSign),
            Err(SynthError::NoDichotomy { .. })
        ));
    }

    #[test]
    fn unstabilizable_mode_gives_singular_basis() {
        // ẋ = x with no input: the stable eigenvector has no state component
        let a = DMatrix::from_element(1, 1, 1.0);
        let b = DMatrix::zeros(1, 1);
        let q = DMatrix::from_element(1, 1, 1.0);
        let r = DMatrix::from_element(1, 1, 1.0);
        assert_eq!(solve_care(&a, &b, &q, &r), Err(SynthError::SingularEigenbasis));
        assert_eq!(
            solve_care_with(&a, &b, &q, &r, CareMethod::MatrixSign),
            Err(SynthError::SingularEigenbasis)
        );
    }

    #[test]
    fn repeated_eigenvalues_from_identical_decoupled_axes() {
        // two copies of the double integrator: every Hamiltonian eigenvalue
        // appears twice
        let a = DMatrix::from_row_slice(
            4,
            4,
            &[
                0.0, 0.0, 1.0, 0.0, //
                0.0, 0.0, 0.0, 1.0, //
                0.0, 0.0, 0.0, 0.0, //
                0.0, 0.0, 0.0, 0.0,
            ],
        );
        let b = DMatrix::from_row_slice(4, 2, &[0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0]);
        let q = DMatrix::identity(4, 4);
        let r = DMatrix::identity(2, 2);
        let p = solve_care(&a, &b, &q, &r).unwrap();
        let s3 = 3f64.sqrt();
        assert!((p[(0, 0)] - s3).abs() < 1e-8);
        assert!((p[(0, 2)] - 1.0).abs() < 1e-8);
        assert!((p[(3, 3)] - s3).abs() < 1e-8);
        assert!(p[(0, 1)].abs() < 1e-8);
    }

    #[test]
    fn shape_and_weight_validation() {
        let (a, b, q, r) = double_integrator();
        let bad_b = DMatrix::zeros(3, 1);
        assert!(matches!(
            solve_care(&a, &bad_b, &q, &r),
            Err(SynthError::Dimension { what: "B rows", .. })
        ));
        let neg_q = diag(&[1.0, -1.0]);
        assert!(matches!(
            solve_care(&a, &b, &neg_q, &r),
            Err(SynthError::InvalidArg { .. })
        ));
        let skew_q = DMatrix::from_row_slice(2, 2, &[1.0, 0.5, 0.0, 1.0]);
        assert!(matches!(
            solve_care(&a, &b, &skew_q, &r),
            Err(SynthError::InvalidArg { .. })
        ));
    }

    #[test]
    fn relaxed_pass_absorbs_round_off_zero() {
        let eig = DVector::from_column_slice(&[
            Complex::new(-1.0, 0.0),
            Complex::new(1e-14, 0.0),
            Complex::new(1.0, 0.0),
            Complex::new(2.0, 0.0),
        ]);
        let picked = select_stable(&eig, 2).unwrap();
        assert_eq!(picked.len(), 2);
        assert_eq!(picked[1], Complex::new(1e-14, 0.0));
    }

    #[test]
    fn clusters_merge_near_duplicates_only() {
        let values = [
            Complex::new(-1.0, 0.5),
            Complex::new(-1.0 + 1e-10, 0.5),
            Complex::new(-1.0, -0.5),
        ];
        let groups = cluster(&values);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].1, 2);
        assert_eq!(groups[1].1, 1);
    }
}
