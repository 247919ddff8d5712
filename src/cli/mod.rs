//! Command-line parsing for the Ising melt fitter.
//!
//! Argument parsing stays here; command dispatch lives in [`crate::app`].

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(
    name = "ising",
    version,
    about = "Global 1D Ising fits of repeat-protein denaturation melts"
)]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log errors.
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Also write logs to this file.
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Derive fraction-folded equations for a set of constructs and save them.
    Generate(GenerateArgs),
    /// Fit melts globally against saved equations.
    Fit(FitArgs),
    /// Write synthetic melts drawn from the model to CSV.
    Simulate(SimulateArgs),
}

#[derive(Debug, Args, Clone)]
pub struct GenerateArgs {
    /// Construct names, e.g. `N_R_R_C`.
    #[arg(value_name = "CONSTRUCT")]
    pub constructs: Vec<String>,

    /// JSON list of construct names, merged with the positional ones.
    #[arg(long, value_name = "JSON")]
    pub constructs_file: Option<PathBuf>,

    /// Directory receiving the equation and construct files.
    #[arg(short, long, default_value = ".")]
    pub output_dir: PathBuf,

    /// Prefix of the written file names.
    #[arg(short, long, default_value = "ising")]
    pub project: String,
}

/// Options for `ising fit`.
#[derive(Debug, Args, Clone)]
pub struct FitArgs {
    /// Melt CSV (denat, signal, construct, dataset).
    #[arg(short, long, value_name = "CSV")]
    pub melts: PathBuf,

    /// Equations JSON written by `ising generate`.
    #[arg(short, long, value_name = "JSON")]
    pub equations: PathBuf,

    /// Initial guesses JSON; built-in defaults when absent.
    #[arg(short, long, value_name = "JSON")]
    pub guesses: Option<PathBuf>,

    /// Min-max normalize each melt's signal before fitting.
    #[arg(long)]
    pub normalize: bool,

    #[arg(long, default_value_t = 1e-10)]
    pub ftol: f64,

    #[arg(long, default_value_t = 1e-10)]
    pub xtol: f64,

    #[arg(long, default_value_t = 0.0)]
    pub gtol: f64,

    /// Evaluation budget in multiples of (parameters + 1).
    #[arg(long, default_value_t = 200)]
    pub patience: usize,

    /// Relative step of the finite-difference Jacobian.
    #[arg(long, default_value_t = 1e-7)]
    pub diff_step: f64,

    /// Disable the terminal plot.
    #[arg(long)]
    pub no_plot: bool,

    /// Plot width (columns).
    #[arg(long, default_value_t = 80)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 20)]
    pub height: usize,

    /// Write the fit report to JSON.
    #[arg(long, value_name = "JSON")]
    pub export_report: Option<PathBuf>,

    /// Write per-point fitted values and residuals to CSV.
    #[arg(long, value_name = "CSV")]
    pub export_points: Option<PathBuf>,
}

/// Options for `ising simulate`.
#[derive(Debug, Args, Clone)]
pub struct SimulateArgs {
    #[arg(value_name = "CONSTRUCT", required = true)]
    pub constructs: Vec<String>,

    /// Melts per construct.
    #[arg(long, default_value_t = 2)]
    pub replicates: usize,

    #[arg(long, default_value_t = 0.0)]
    pub denat_min: f64,

    #[arg(long, default_value_t = 8.0)]
    pub denat_max: f64,

    /// Points per melt.
    #[arg(long, default_value_t = 33)]
    pub points: usize,

    /// Standard deviation of Gaussian signal noise.
    #[arg(long, default_value_t = 0.01)]
    pub noise: f64,

    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    #[arg(long = "dgn", default_value_t = 6.0, allow_negative_numbers = true)]
    pub dgn: f64,

    #[arg(long = "dgr", default_value_t = 5.0, allow_negative_numbers = true)]
    pub dgr: f64,

    #[arg(long = "dgc", default_value_t = 6.0, allow_negative_numbers = true)]
    pub dgc: f64,

    #[arg(long = "dginter", default_value_t = -12.0, allow_negative_numbers = true)]
    pub dginter: f64,

    #[arg(long, default_value_t = 1.0)]
    pub mi: f64,

    /// Output CSV.
    #[arg(short, long, value_name = "CSV")]
    pub output: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_generate_with_defaults() {
        let cli = Cli::try_parse_from(["ising", "generate", "R_R", "N_R_C"]).unwrap();
        let Command::Generate(args) = cli.command else {
            panic!("expected generate");
        };
        assert_eq!(args.constructs, vec!["R_R", "N_R_C"]);
        assert_eq!(args.output_dir, PathBuf::from("."));
        assert_eq!(args.project, "ising");
        assert_eq!(cli.verbose, 0);
    }

    #[test]
    fn parses_fit_flags() {
        let cli = Cli::try_parse_from([
            "ising", "-vv", "fit", "--melts", "m.csv", "--equations", "e.json", "--normalize", "--no-plot",
            "--patience", "50",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        let Command::Fit(args) = cli.command else {
            panic!("expected fit");
        };
        assert_eq!(args.melts, PathBuf::from("m.csv"));
        assert!(args.normalize);
        assert!(args.no_plot);
        assert_eq!(args.patience, 50);
        assert!(args.guesses.is_none());
    }

    #[test]
    fn simulate_accepts_negative_globals() {
        let cli = Cli::try_parse_from([
            "ising", "simulate", "R_R_R", "--dginter", "-10.5", "--output", "out.csv",
        ])
        .unwrap();
        let Command::Simulate(args) = cli.command else {
            panic!("expected simulate");
        };
        assert_eq!(args.dginter, -10.5);
        assert_eq!(args.replicates, 2);
    }

    #[test]
    fn fit_requires_melts() {
        assert!(Cli::try_parse_from(["ising", "fit", "--equations", "e.json"]).is_err());
    }
}
