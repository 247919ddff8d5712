//! Parameter covariance from the Jacobian at the optimum.
//!
//! For a least-squares fit with residual Jacobian `J` the covariance estimate is
//!
//! ```text
//! cov = (JᵀJ)⁻¹ · SSR / DOF
//! ```
//!
//! Implementation choices:
//! - `JᵀJ` is inverted through an SVD so a near-singular matrix is detected from
//!   its singular values instead of blowing up inside an LU/Cholesky solve.
//! - A rank-deficient `JᵀJ` (a fitted parameter the residuals do not depend on,
//!   or two perfectly correlated parameters) yields `None`; the caller reports
//!   the standard errors as unavailable rather than meaningless.

use nalgebra::DMatrix;

/// Relative singular-value cutoff below which `JᵀJ` is treated as singular.
const RANK_TOL: f64 = 1e-13;

/// `(JᵀJ)⁻¹`, or `None` when it is not (numerically) invertible.
pub fn normal_matrix_inverse(jacobian: &DMatrix<f64>) -> Option<DMatrix<f64>> {
    let n = jacobian.ncols();
    if n == 0 {
        return Some(DMatrix::zeros(0, 0));
    }

    let jtj = jacobian.transpose() * jacobian;
    if jtj.iter().any(|v| !v.is_finite()) {
        return None;
    }

    let svd = jtj.svd(true, true);
    let s_max = svd.singular_values.max();
    let s_min = svd.singular_values.min();
    if !(s_max.is_finite() && s_max > 0.0) || s_min <= s_max * RANK_TOL {
        return None;
    }

    let inv = svd.pseudo_inverse(0.0).ok()?;
    if inv.iter().all(|v| v.is_finite()) {
        Some(inv)
    } else {
        None
    }
}

/// Standard errors `sqrt(diag((JᵀJ)⁻¹) · scale)`, where `scale` is the
/// reduced chi-square.
pub fn standard_errors(jacobian: &DMatrix<f64>, scale: f64) -> Option<Vec<f64>> {
    let inv = normal_matrix_inverse(jacobian)?;
    let errs: Vec<f64> = (0..inv.nrows())
        .map(|i| (inv[(i, i)] * scale).max(0.0).sqrt())
        .collect();
    Some(errs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn straight_line_errors_match_closed_form() {
        // Residual Jacobian of y = a + b x on x = [0, 1, 2] is -[1 x].
        let j = DMatrix::from_row_slice(3, 2, &[-1.0, 0.0, -1.0, -1.0, -1.0, -2.0]);
        let inv = normal_matrix_inverse(&j).unwrap();
        // (XᵀX)⁻¹ = 1/6 * [[5, -3], [-3, 3]]
        let expected = DMatrix::from_row_slice(2, 2, &[5.0 / 6.0, -0.5, -0.5, 0.5]);
        assert_relative_eq!(inv, expected, epsilon = 1e-10);

        let errs = standard_errors(&j, 2.0).unwrap();
        assert_relative_eq!(errs[1], 1.0, epsilon = 1e-10);
    }

    #[test]
    fn unused_parameter_makes_covariance_unavailable() {
        let j = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 2.0, 0.0, 3.0, 0.0]);
        assert!(normal_matrix_inverse(&j).is_none());
        assert!(standard_errors(&j, 1.0).is_none());
    }
}
