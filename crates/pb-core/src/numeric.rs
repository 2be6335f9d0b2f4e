use crate::PbError;
use nalgebra::{DMatrix, DVector};

/// Floating point type used throughout system
pub type Real = f64;

/// Reject vectors carrying NaN or infinities.
pub fn ensure_finite_vector(v: &DVector<Real>, what: &'static str) -> Result<(), PbError> {
    match v.iter().find(|x| !x.is_finite()) {
        Some(&value) => Err(PbError::NonFinite { what, value }),
        None => Ok(()),
    }
}

/// Reject matrices carrying NaN or infinities.
pub fn ensure_finite_matrix(m: &DMatrix<Real>, what: &'static str) -> Result<(), PbError> {
    match m.iter().find(|x| !x.is_finite()) {
        Some(&value) => Err(PbError::NonFinite { what, value }),
        None => Ok(()),
    }
}

pub fn ensure_len(v: &DVector<Real>, expected: usize, what: &'static str) -> Result<(), PbError> {
    if v.len() == expected {
        Ok(())
    } else {
        Err(PbError::Dimension {
            what,
            expected,
            got: v.len(),
        })
    }
}

/// (M + Mᵗ) / 2.
pub fn symmetrize(m: &DMatrix<Real>) -> DMatrix<Real> {
    (m + m.transpose()) * 0.5
}

/// Largest absolute entry of M - Mᵗ.
pub fn asymmetry(m: &DMatrix<Real>) -> Real {
    (m - m.transpose()).amax()
}

/// Square diagonal matrix from a vector of diagonal entries.
pub fn diag(entries: &[Real]) -> DMatrix<Real> {
    DMatrix::from_diagonal(&DVector::from_column_slice(entries))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ensure_finite_vector_detects_nan() {
        let v = DVector::from_column_slice(&[0.0, Real::NAN]);
        let err = ensure_finite_vector(&v, "state").unwrap_err();
        let msg = format!("{err}");
        assert!(msg.contains("Non-finite"));
    }

    #[test]
    fn ensure_finite_matrix_reports_offending_value() {
        let mut m = DMatrix::<Real>::identity(2, 2);
        m[(1, 0)] = Real::INFINITY;
        let err = ensure_finite_matrix(&m, "gain").unwrap_err();
        assert_eq!(
            err,
            PbError::NonFinite {
                what: "gain",
                value: Real::INFINITY
            }
        );
    }

    #[test]
    fn symmetrize_removes_skew_part() {
        let m = DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 4.0, 3.0]);
        let s = symmetrize(&m);
        assert_eq!(s[(0, 1)], 3.0);
        assert_eq!(s[(1, 0)], 3.0);
        assert_eq!(asymmetry(&s), 0.0);
        assert_eq!(asymmetry(&m), 2.0);
    }

    #[test]
    fn ensure_len_mismatch() {
        let v = DVector::<Real>::zeros(3);
        assert!(ensure_len(&v, 3, "state").is_ok());
        assert!(matches!(
            ensure_len(&v, 4, "state"),
            Err(PbError::Dimension {
                expected: 4,
                got: 3,
                ..
            })
        ));
    }
}
