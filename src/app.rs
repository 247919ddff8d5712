//! Top-level application orchestration.
//!
//! `src/main.rs` stays tiny; this module is the "real main" that:
//! - parses CLI arguments and installs logging
//! - dispatches to the `generate`, `fit` and `simulate` pipelines
//! - prints reports/plots and writes optional exports

use clap::Parser;

use crate::cli::{Cli, Command, FitArgs, GenerateArgs, SimulateArgs};
use crate::domain::{FitConfig, GenerateConfig, GlobalParams, SimulateConfig, SolverOptions};
use crate::error::Result;

pub mod pipeline;

/// Entry point for the `ising` binary.
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    crate::logging::setup_logging(cli.verbose, cli.quiet, cli.log_file.as_deref())?;

    match cli.command {
        Command::Generate(args) => handle_generate(&args),
        Command::Fit(args) => handle_fit(&args),
        Command::Simulate(args) => handle_simulate(&args),
    }
}

fn handle_generate(args: &GenerateArgs) -> Result<()> {
    let config = generate_config_from_args(args)?;
    let out = pipeline::run_generate(&config)?;

    println!("Generated equations for {} construct(s):", out.constructs.len());
    for c in &out.constructs {
        println!("  {}", c.name());
    }
    println!("Equations:  {}", out.equations_path.display());
    println!("Constructs: {}", out.constructs_path.display());
    Ok(())
}

fn handle_fit(args: &FitArgs) -> Result<()> {
    let config = fit_config_from_args(args);
    let run = pipeline::run_fit(&config)?;

    println!("{}", crate::report::format_run_summary(&run.ingest, &run.report));
    println!("{}", crate::report::format_param_table(&run.report.params));
    println!("{}", crate::report::format_melt_table(&run.stats));

    if config.plot {
        let plot = crate::plot::render_melt_plot(
            &run.model,
            &run.ingest.melts,
            &run.report.params,
            config.plot_width,
            config.plot_height,
        )?;
        println!("{plot}");
    }

    if let Some(path) = &config.export_report {
        crate::io::write_report_json(path, &run.report)?;
    }
    if let Some(path) = &config.export_points {
        crate::io::write_points_csv(path, &run.model, &run.ingest.melts, &run.report.params)?;
    }

    Ok(())
}

fn handle_simulate(args: &SimulateArgs) -> Result<()> {
    let config = simulate_config_from_args(args);
    let melts = pipeline::run_simulate(&config)?;
    println!(
        "Wrote {} melt(s), {} points, to {}",
        melts.len(),
        melts.total_points(),
        config.output.display()
    );
    Ok(())
}

/// Merge positional construct names with those of `--constructs-file`.
pub fn generate_config_from_args(args: &GenerateArgs) -> Result<GenerateConfig> {
    let mut constructs = args.constructs.clone();
    if let Some(path) = &args.constructs_file {
        constructs.extend(
            crate::io::read_construct_names(path)?
                .iter()
                .map(|c| c.name().to_string()),
        );
    }
    Ok(GenerateConfig {
        constructs,
        output_dir: args.output_dir.clone(),
        project: args.project.clone(),
    })
}

pub fn fit_config_from_args(args: &FitArgs) -> FitConfig {
    FitConfig {
        melts_path: args.melts.clone(),
        equations_path: args.equations.clone(),
        guesses_path: args.guesses.clone(),
        normalize: args.normalize,
        solver: SolverOptions {
            ftol: args.ftol,
            xtol: args.xtol,
            gtol: args.gtol,
            patience: args.patience,
            diff_step: args.diff_step,
        },
        plot: !args.no_plot,
        plot_width: args.width,
        plot_height: args.height,
        export_report: args.export_report.clone(),
        export_points: args.export_points.clone(),
    }
}

pub fn simulate_config_from_args(args: &SimulateArgs) -> SimulateConfig {
    SimulateConfig {
        constructs: args.constructs.clone(),
        replicates: args.replicates,
        denat_min: args.denat_min,
        denat_max: args.denat_max,
        points: args.points,
        noise: args.noise,
        seed: args.seed,
        globals: GlobalParams {
            dgn: args.dgn,
            dgr: args.dgr,
            dgc: args.dgc,
            dginter: args.dginter,
            mi: args.mi,
        },
        output: args.output.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn parse(argv: &[&str]) -> Command {
        Cli::try_parse_from(argv).unwrap().command
    }

    #[test]
    fn fit_args_map_onto_config() {
        let Command::Fit(args) = parse(&[
            "ising", "fit", "-m", "melts.csv", "-e", "eqs.json", "--ftol", "1e-6", "--no-plot",
            "--export-report", "report.json",
        ]) else {
            panic!("expected fit");
        };
        let config = fit_config_from_args(&args);
        assert_eq!(config.melts_path, PathBuf::from("melts.csv"));
        assert_eq!(config.solver.ftol, 1e-6);
        assert_eq!(config.solver.patience, SolverOptions::default().patience);
        assert!(!config.plot);
        assert_eq!(config.export_report, Some(PathBuf::from("report.json")));
    }

    #[test]
    fn constructs_file_is_merged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("constructs.json");
        std::fs::write(&path, r#"["N_R_C", "R_R_R"]"#).unwrap();

        let path_arg = path.to_string_lossy().to_string();
        let Command::Generate(args) = parse(&["ising", "generate", "R_R", "--constructs-file", &path_arg])
        else {
            panic!("expected generate");
        };
        let config = generate_config_from_args(&args).unwrap();
        assert_eq!(config.constructs, vec!["R_R", "N_R_C", "R_R_R"]);
    }

    #[test]
    fn simulate_globals_come_from_flags() {
        let Command::Simulate(args) = parse(&["ising", "simulate", "R_R", "--mi", "1.5", "-o", "out.csv"]) else {
            panic!("expected simulate");
        };
        let config = simulate_config_from_args(&args);
        assert_eq!(config.globals.mi, 1.5);
        assert_eq!(config.globals.dgr, 5.0);
        assert_eq!(config.points, 33);
    }
}
