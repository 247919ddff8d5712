//! Reporting utilities: per-melt fit statistics and formatted terminal output.

pub mod format;

pub use format::*;

use crate::domain::{FitReport, MeltSet};
use crate::error::{IsingError, Result};

/// Goodness of fit of one melt within a global fit.
#[derive(Debug, Clone, PartialEq)]
pub struct MeltStats {
    pub melt: String,
    pub construct: String,
    pub n_points: usize,
    pub ssr: f64,
    pub rmse: f64,
    pub max_abs_residual: f64,
}

/// Split the report's combined residual vector back into melt blocks.
///
/// `melts` must be the set the report was fitted on (same order).
pub fn melt_stats(report: &FitReport, melts: &MeltSet) -> Result<Vec<MeltStats>> {
    if report.residuals.len() != melts.total_points() {
        return Err(IsingError::Validation(format!(
            "report has {} residuals but the melts have {} points",
            report.residuals.len(),
            melts.total_points()
        )));
    }

    let mut out = Vec::with_capacity(melts.len());
    let mut offset = 0;
    for melt in melts.iter() {
        let block = &report.residuals[offset..offset + melt.len()];
        offset += melt.len();
        let ssr: f64 = block.iter().map(|r| r * r).sum();
        out.push(MeltStats {
            melt: melt.name.clone(),
            construct: melt.construct.clone(),
            n_points: block.len(),
            ssr,
            rmse: (ssr / block.len() as f64).sqrt(),
            max_abs_residual: block.iter().fold(0.0, |m, r| m.max(r.abs())),
        });
    }
    Ok(out)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::domain::{Melt, Parameters};
    use chrono::Utc;

    pub(crate) fn report(residuals: Vec<f64>) -> FitReport {
        FitReport {
            generated_at: Utc::now(),
            params: Parameters::new(),
            n_melts: 2,
            n_observations: residuals.len(),
            n_fitted: 1,
            degrees_of_freedom: residuals.len() - 1,
            ssr: residuals.iter().map(|r| r * r).sum(),
            reduced_chi_square: 0.0,
            termination: "Converged".to_string(),
            evaluations: 10,
            residuals,
        }
    }

    #[test]
    fn splits_residuals_by_melt_order() {
        let mut melts = MeltSet::new();
        melts.insert(Melt::new("R_R_1", vec![0.0, 1.0], vec![0.0, 0.0]).unwrap()).unwrap();
        melts.insert(Melt::new("N_R_1", vec![0.0, 1.0, 2.0], vec![0.0; 3]).unwrap()).unwrap();

        let stats = melt_stats(&report(vec![3.0, 4.0, 0.0, 0.0, -2.0]), &melts).unwrap();
        assert_eq!(stats[0].melt, "R_R_1");
        assert!((stats[0].ssr - 25.0).abs() < 1e-12);
        assert!((stats[0].rmse - 12.5_f64.sqrt()).abs() < 1e-12);
        assert_eq!(stats[1].n_points, 3);
        assert_eq!(stats[1].max_abs_residual, 2.0);

        assert!(melt_stats(&report(vec![1.0]), &melts).is_err());
    }
}
