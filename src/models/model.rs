//! Observed-signal model of a melt.
//!
//! A melt's normalized CD signal is a mix of two linear baselines weighted by
//! the fraction of folded units `θ(denat)`:
//!
//! ```text
//! y = (af·denat + bf)·θ + (au·denat + bu)·(1 − θ)
//! ```
//!
//! θ is not clamped: the fitted model is allowed to extrapolate.

use crate::domain::Baseline;

/// Predict the signal at one denaturant concentration.
pub fn predict(baseline: &Baseline, denat: f64, frac_folded: f64) -> f64 {
    let folded = baseline.af * denat + baseline.bf;
    let unfolded = baseline.au * denat + baseline.bu;
    folded * frac_folded + unfolded * (1.0 - frac_folded)
}

/// Write `observed − predicted` for a whole melt into `out`.
///
/// # Panics
/// Panics if the slices have different lengths. Callers size them from the
/// same melt.
pub fn fill_residuals(
    baseline: &Baseline,
    denat: &[f64],
    signal: &[f64],
    frac_folded: &[f64],
    out: &mut [f64],
) {
    assert_eq!(denat.len(), signal.len());
    assert_eq!(denat.len(), frac_folded.len());
    assert_eq!(denat.len(), out.len());

    for i in 0..denat.len() {
        out[i] = signal[i] - predict(baseline, denat[i], frac_folded[i]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn predict_interpolates_between_baselines() {
        let b = Baseline {
            af: 0.1,
            bf: 1.0,
            au: -0.05,
            bu: 0.2,
        };
        assert!((predict(&b, 2.0, 1.0) - 1.2).abs() < 1e-12);
        assert!((predict(&b, 2.0, 0.0) - 0.1).abs() < 1e-12);
        assert!((predict(&b, 2.0, 0.5) - 0.65).abs() < 1e-12);
    }

    #[test]
    fn residuals_vanish_for_model_generated_signal() {
        let b = Baseline::default();
        let denat = [0.0, 1.0, 2.0];
        let theta = [0.9, 0.5, 0.1];
        let signal: Vec<f64> = denat.iter().zip(theta).map(|(&d, t)| predict(&b, d, t)).collect();
        let mut out = [1.0; 3];
        fill_residuals(&b, &denat, &signal, &theta, &mut out);
        assert!(out.iter().all(|r| r.abs() < 1e-15));
    }
}
