//! Shared pipeline logic behind the `ising` subcommands.
//!
//! Each `run_*` function performs the work of one command and returns what it
//! computed; printing stays in [`crate::app`].

use std::path::PathBuf;

use tracing::info;

use crate::data::generate_melts;
use crate::domain::{
    Construct, FitConfig, FitReport, GenerateConfig, MeltSet, Parameters, SimulateConfig, default_guesses,
    unique_constructs,
};
use crate::error::{IsingError, Result};
use crate::fit::IsingModel;
use crate::io::{IngestedMelts, load_melts, read_guesses, write_construct_names, write_fitting_equations, write_melts_csv};
use crate::models::generate_fitting_equations;
use crate::report::{MeltStats, melt_stats};

/// Files written by `ising generate`.
#[derive(Debug, Clone)]
pub struct GenerateOutput {
    pub constructs: Vec<Construct>,
    pub equations_path: PathBuf,
    pub constructs_path: PathBuf,
}

/// All computed outputs of a single `ising fit` run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub ingest: IngestedMelts,
    pub model: IsingModel,
    pub report: FitReport,
    pub stats: Vec<MeltStats>,
    /// Fitted global parameters; baselines are left out.
    pub best: Parameters,
}

/// Derive and save the equations for `config.constructs`.
pub fn run_generate(config: &GenerateConfig) -> Result<GenerateOutput> {
    if config.constructs.is_empty() {
        return Err(IsingError::Config("no constructs given".to_string()));
    }
    let constructs = unique_constructs(&config.constructs)?;
    let equations = generate_fitting_equations(&constructs)?;

    let equations_path = write_fitting_equations(&config.output_dir, &config.project, &equations)?;
    let constructs_path = write_construct_names(&config.output_dir, &config.project, &constructs)?;

    Ok(GenerateOutput {
        constructs,
        equations_path,
        constructs_path,
    })
}

/// Ingest melts, compile their equations and run one global fit.
pub fn run_fit(config: &FitConfig) -> Result<RunOutput> {
    let ingest = load_melts(&config.melts_path, config.normalize)?;

    let constructs = unique_constructs(&ingest.melts.construct_names())?;
    let model = IsingModel::from_path(&constructs, &config.equations_path)?;

    let guesses = match &config.guesses_path {
        Some(path) => read_guesses(path)?,
        None => default_guesses(),
    };

    let mut session = model.session().with_solver(config.solver);
    let report = session.fit(&ingest.melts, &guesses)?.clone();
    let best = session.best_fit_params()?;
    let stats = melt_stats(&report, &ingest.melts)?;

    Ok(RunOutput {
        ingest,
        model,
        report,
        stats,
        best,
    })
}

/// Draw synthetic melts from the model and write them to `config.output`.
pub fn run_simulate(config: &SimulateConfig) -> Result<MeltSet> {
    let constructs = unique_constructs(&config.constructs)?;
    let equations = generate_fitting_equations(&constructs)?;
    let model = IsingModel::new(&constructs, &equations)?;

    let melts = generate_melts(&model, config)?;
    write_melts_csv(&config.output, &melts)?;
    info!(path = %config.output.display(), melts = melts.len(), "wrote synthetic melts");
    Ok(melts)
}
