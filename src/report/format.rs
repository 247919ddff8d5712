//! Formatted terminal output.
//!
//! We keep formatting code in one place so:
//! - the math/fitting code stays clean and testable
//! - output changes are localized

use crate::domain::{FitReport, GlobalName, Parameters};
use crate::io::IngestedMelts;
use crate::report::MeltStats;

/// Format the full run summary (dataset + fit diagnostics).
pub fn format_run_summary(ingest: &IngestedMelts, report: &FitReport) -> String {
    let mut out = String::new();

    out.push_str("=== ising - global Ising fit of denaturation melts ===\n");
    out.push_str(&format!("Run: {}\n", report.generated_at.format("%Y-%m-%d %H:%M:%S UTC")));
    out.push_str(&format!(
        "Rows: read={} used={} skipped={}\n",
        ingest.rows_read,
        ingest.rows_used,
        ingest.row_errors.len()
    ));
    out.push_str(&format!(
        "Melts: n={} | constructs: {}\n",
        report.n_melts,
        ingest.melts.construct_names().join(", ")
    ));

    out.push_str("\nFit diagnostics:\n");
    out.push_str(&format!(
        "- observations={} fitted={} dof={}\n",
        report.n_observations, report.n_fitted, report.degrees_of_freedom
    ));
    out.push_str(&format!(
        "- SSR={:.6e} reduced chi-square={:.6e}\n",
        report.ssr, report.reduced_chi_square
    ));
    out.push_str(&format!(
        "- termination: {} after {} evaluations\n",
        report.termination, report.evaluations
    ));

    for e in ingest.row_errors.iter().take(5) {
        out.push_str(&format!("  (skipped line {}) {}\n", e.line, e.message));
    }
    if ingest.row_errors.len() > 5 {
        out.push_str(&format!("  ... and {} more\n", ingest.row_errors.len() - 5));
    }
    out.push('\n');

    out
}

/// Table of parameters: global thermodynamic ones first, then baselines.
pub fn format_param_table(params: &Parameters) -> String {
    let mut out = String::new();
    out.push_str(format!("{:<24} {:>14} {:>14} {:<6}", "param", "value", "stderr", "vary").trim_end());
    out.push('\n');
    out.push_str(format!("{:-<24} {:-<14} {:-<14} {:-<6}", "", "", "", "").trim_end());
    out.push('\n');

    let is_global = |name: &str| GlobalName::from_name(name).is_some();
    let rows = params
        .iter()
        .filter(|p| is_global(&p.name))
        .chain(params.iter().filter(|p| !is_global(&p.name)));
    for p in rows {
        let stderr = p.stderr.map(|e| format!("{e:.6}")).unwrap_or_else(|| "-".to_string());
        out.push_str(
            format!(
                "{:<24} {:>14.6} {:>14} {:<6}",
                truncate(&p.name, 24),
                p.value,
                stderr,
                if p.vary { "yes" } else { "no" }
            )
            .trim_end(),
        );
        out.push('\n');
    }
    out
}

/// Per-melt goodness of fit.
pub fn format_melt_table(stats: &[MeltStats]) -> String {
    let mut out = String::new();
    out.push_str(format!("{:<20} {:>6} {:>12} {:>12} {:>12}", "melt", "n", "ssr", "rmse", "max|r|").trim_end());
    out.push('\n');
    out.push_str(format!("{:-<20} {:-<6} {:-<12} {:-<12} {:-<12}", "", "", "", "", "").trim_end());
    out.push('\n');
    for s in stats {
        out.push_str(&format!(
            "{:<20} {:>6} {:>12.4e} {:>12.4e} {:>12.4e}\n",
            truncate(&s.melt, 20),
            s.n_points,
            s.ssr,
            s.rmse,
            s.max_abs_residual
        ));
    }
    out
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('.');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Melt, MeltSet, Parameter};
    use crate::io::RowError;

    #[test]
    fn param_table_lists_globals_first() {
        let mut p = Parameters::new();
        p.add("af_R_R_1", 0.02)
            .insert(Parameter {
                stderr: Some(0.125),
                ..Parameter::new("dGR", 5.0)
            })
            .add_fixed("mi", 1.0);

        let table = format_param_table(&p);
        let lines: Vec<&str> = table.lines().collect();
        assert!(lines[2].starts_with("dGR"));
        assert!(lines[2].contains("0.125000"));
        assert!(lines[3].starts_with("mi") && lines[3].ends_with("no"));
        assert!(lines[4].starts_with("af_R_R_1") && lines[4].contains('-'));
    }

    #[test]
    fn summary_mentions_counts_and_skipped_rows() {
        let mut melts = MeltSet::new();
        melts.insert(Melt::new("R_R_1", vec![0.0, 1.0], vec![1.0, 0.0]).unwrap()).unwrap();
        let ingest = IngestedMelts {
            melts,
            row_errors: vec![RowError {
                line: 7,
                message: "Missing `signal` value.".to_string(),
            }],
            rows_read: 3,
            rows_used: 2,
        };
        let report = crate::report::tests::report(vec![0.1, -0.1]);
        let s = format_run_summary(&ingest, &report);
        assert!(s.contains("Rows: read=3 used=2 skipped=1"));
        assert!(s.contains("constructs: R_R"));
        assert!(s.contains("skipped line 7"));
    }

    #[test]
    fn truncate_marks_cut_names() {
        assert_eq!(truncate("N_R_R_R_R_R_C_1", 6), "N_R_R.");
        assert_eq!(truncate("R_1", 6), "R_1");
    }
}
