//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - used in-memory during equation generation and fitting
//! - exported to JSON/CSV
//! - reloaded later for plotting or comparisons

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::params::Parameters;
use crate::error::{IsingError, Result};

/// Gas constant in kcal·mol⁻¹·K⁻¹.
pub const GAS_CONSTANT: f64 = 0.001987;

/// Absolute temperature (K) the melts are assumed to be recorded at.
pub const TEMPERATURE: f64 = 298.15;

/// `R·T` in kcal/mol, bound into every compiled fraction-folded expression.
pub const RT: f64 = GAS_CONSTANT * TEMPERATURE;

/// Repeat-unit type of a chain position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Unit {
    /// N-terminal (native-like) capping repeat.
    N,
    /// Internal consensus repeat.
    R,
    /// C-terminal capping repeat.
    C,
}

impl Unit {
    pub const ALL: [Unit; 3] = [Unit::N, Unit::R, Unit::C];

    pub fn symbol(self) -> &'static str {
        match self {
            Unit::N => "N",
            Unit::R => "R",
            Unit::C => "C",
        }
    }

    fn from_token(token: &str) -> Option<Unit> {
        match token {
            "N" => Some(Unit::N),
            "R" => Some(Unit::R),
            "C" => Some(Unit::C),
            _ => None,
        }
    }
}

/// A linear chain of repeat units, e.g. `N_R_R_C`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Construct {
    name: String,
    units: Vec<Unit>,
}

impl Construct {
    /// Longest chain accepted.
    ///
    /// Partition-function coefficients are exact `u64` integers bounded by
    /// `n · 2^n`, which stays representable up to this length.
    pub const MAX_CHAIN_LEN: usize = 48;

    pub fn parse(name: &str) -> Result<Self> {
        let name = name.trim();
        if name.is_empty() {
            return Err(IsingError::Validation("construct name is empty".to_string()));
        }

        let mut units = Vec::new();
        for (pos, token) in name.split('_').enumerate() {
            let unit = Unit::from_token(token).ok_or_else(|| {
                IsingError::Validation(format!(
                    "construct '{name}': token {pos} ('{token}') is not one of N, R, C"
                ))
            })?;
            units.push(unit);
        }

        if units.len() > Self::MAX_CHAIN_LEN {
            return Err(IsingError::Validation(format!(
                "construct '{name}' has {} units; at most {} are supported",
                units.len(),
                Self::MAX_CHAIN_LEN
            )));
        }

        Ok(Self {
            name: name.to_string(),
            units,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn units(&self) -> &[Unit] {
        &self.units
    }

    /// Chain length (number of repeat units).
    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Key of this construct's persisted fraction-folded expression.
    pub fn equation_key(&self) -> String {
        equation_key(&self.name)
    }
}

impl FromStr for Construct {
    type Err = IsingError;

    fn from_str(s: &str) -> Result<Self> {
        Construct::parse(s)
    }
}

impl fmt::Display for Construct {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// `<construct>_frac_folded`
pub fn equation_key(construct: &str) -> String {
    format!("{construct}_frac_folded")
}

/// Parse and deduplicate construct names, keeping first-seen order.
pub fn unique_constructs<S: AsRef<str>>(names: &[S]) -> Result<Vec<Construct>> {
    let mut out: Vec<Construct> = Vec::with_capacity(names.len());
    for name in names {
        let construct = Construct::parse(name.as_ref())?;
        if !out.iter().any(|c| c.name == construct.name) {
            out.push(construct);
        }
    }
    Ok(out)
}

/// Construct name of a melt identifier (`<construct>_<index>`).
///
/// Only the last underscore-separated token is dropped, so multi-digit
/// dataset indices are handled.
pub fn melt_construct_name(melt: &str) -> Result<&str> {
    match melt.rsplit_once('_') {
        Some((construct, index)) if !construct.is_empty() && !index.is_empty() => Ok(construct),
        _ => Err(IsingError::Validation(format!(
            "melt name '{melt}' is not of the form <construct>_<index>"
        ))),
    }
}

/// One denaturation curve.
#[derive(Debug, Clone, PartialEq)]
pub struct Melt {
    pub name: String,
    pub construct: String,
    pub denat: Vec<f64>,
    pub signal: Vec<f64>,
}

impl Melt {
    pub fn new(name: impl Into<String>, denat: Vec<f64>, signal: Vec<f64>) -> Result<Self> {
        let name = name.into();
        let construct = melt_construct_name(&name)?.to_string();

        if denat.len() != signal.len() {
            return Err(IsingError::Validation(format!(
                "melt '{name}': {} denaturant values but {} signal values",
                denat.len(),
                signal.len()
            )));
        }
        if denat.is_empty() {
            return Err(IsingError::Validation(format!("melt '{name}' has no points")));
        }
        if denat.iter().chain(signal.iter()).any(|v| !v.is_finite()) {
            return Err(IsingError::Validation(format!("melt '{name}' contains non-finite values")));
        }

        Ok(Self {
            name,
            construct,
            denat,
            signal,
        })
    }

    pub fn len(&self) -> usize {
        self.denat.len()
    }

    pub fn is_empty(&self) -> bool {
        self.denat.is_empty()
    }
}

/// Ordered collection of melts keyed by melt name.
///
/// Iteration order is insertion order; it fixes the order of residual blocks
/// in the combined objective.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeltSet {
    melts: Vec<Melt>,
}

impl MeltSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a melt. Duplicate names are rejected rather than renamed.
    pub fn insert(&mut self, melt: Melt) -> Result<()> {
        if self.get(&melt.name).is_some() {
            return Err(IsingError::Validation(format!("duplicate melt name '{}'", melt.name)));
        }
        self.melts.push(melt);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Melt> {
        self.melts.iter().find(|m| m.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Melt> {
        self.melts.iter()
    }

    pub fn len(&self) -> usize {
        self.melts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.melts.is_empty()
    }

    pub fn total_points(&self) -> usize {
        self.melts.iter().map(Melt::len).sum()
    }

    /// Construct names referenced by the melts, first-seen order, deduplicated.
    pub fn construct_names(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for melt in &self.melts {
            if !out.contains(&melt.construct) {
                out.push(melt.construct.clone());
            }
        }
        out
    }
}

/// Names of the thermodynamic parameters shared by every melt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GlobalName {
    Dgn,
    Dgr,
    Dgc,
    Dginter,
    Mi,
}

impl GlobalName {
    pub const ALL: [GlobalName; 5] = [
        GlobalName::Dgn,
        GlobalName::Dgr,
        GlobalName::Dgc,
        GlobalName::Dginter,
        GlobalName::Mi,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            GlobalName::Dgn => "dGN",
            GlobalName::Dgr => "dGR",
            GlobalName::Dgc => "dGC",
            GlobalName::Dginter => "dGinter",
            GlobalName::Mi => "mi",
        }
    }

    pub fn index(self) -> usize {
        match self {
            GlobalName::Dgn => 0,
            GlobalName::Dgr => 1,
            GlobalName::Dgc => 2,
            GlobalName::Dginter => 3,
            GlobalName::Mi => 4,
        }
    }

    pub fn from_name(name: &str) -> Option<GlobalName> {
        GlobalName::ALL.into_iter().find(|g| g.as_str() == name)
    }
}

/// Values of the five global parameters, bound explicitly at evaluation time.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GlobalParams {
    #[serde(rename = "dGN")]
    pub dgn: f64,
    #[serde(rename = "dGR")]
    pub dgr: f64,
    #[serde(rename = "dGC")]
    pub dgc: f64,
    #[serde(rename = "dGinter")]
    pub dginter: f64,
    pub mi: f64,
}

impl GlobalParams {
    pub fn get(&self, name: GlobalName) -> f64 {
        match name {
            GlobalName::Dgn => self.dgn,
            GlobalName::Dgr => self.dgr,
            GlobalName::Dgc => self.dgc,
            GlobalName::Dginter => self.dginter,
            GlobalName::Mi => self.mi,
        }
    }

    pub fn set(&mut self, name: GlobalName, value: f64) {
        match name {
            GlobalName::Dgn => self.dgn = value,
            GlobalName::Dgr => self.dgr = value,
            GlobalName::Dgc => self.dgc = value,
            GlobalName::Dginter => self.dginter = value,
            GlobalName::Mi => self.mi = value,
        }
    }
}

/// Per-melt baseline coefficient kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LocalName {
    /// Folded-state baseline slope.
    Af,
    /// Folded-state baseline intercept.
    Bf,
    /// Unfolded-state baseline slope.
    Au,
    /// Unfolded-state baseline intercept.
    Bu,
}

impl LocalName {
    pub const ALL: [LocalName; 4] = [LocalName::Af, LocalName::Bf, LocalName::Au, LocalName::Bu];

    pub fn prefix(self) -> &'static str {
        match self {
            LocalName::Af => "af",
            LocalName::Bf => "bf",
            LocalName::Au => "au",
            LocalName::Bu => "bu",
        }
    }

    /// Seed value used when the guesses do not mention this parameter.
    pub fn default_value(self) -> f64 {
        match self {
            LocalName::Af => 0.02,
            LocalName::Bf => 1.0,
            LocalName::Au => 0.0,
            LocalName::Bu => 0.0,
        }
    }

    /// `<prefix>_<melt>`, e.g. `af_N_R_C_1`.
    pub fn param_name(self, melt: &str) -> String {
        format!("{}_{melt}", self.prefix())
    }
}

/// Two-segment linear baseline of one melt.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Baseline {
    pub af: f64,
    pub bf: f64,
    pub au: f64,
    pub bu: f64,
}

impl Default for Baseline {
    fn default() -> Self {
        Self {
            af: LocalName::Af.default_value(),
            bf: LocalName::Bf.default_value(),
            au: LocalName::Au.default_value(),
            bu: LocalName::Bu.default_value(),
        }
    }
}

impl Baseline {
    pub fn get(&self, name: LocalName) -> f64 {
        match name {
            LocalName::Af => self.af,
            LocalName::Bf => self.bf,
            LocalName::Au => self.au,
            LocalName::Bu => self.bu,
        }
    }

    pub fn set(&mut self, name: LocalName, value: f64) {
        match name {
            LocalName::Af => self.af = value,
            LocalName::Bf => self.bf = value,
            LocalName::Au => self.au = value,
            LocalName::Bu => self.bu = value,
        }
    }
}

/// Levenberg–Marquardt settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolverOptions {
    /// Relative reduction in the sum of squares considered converged.
    pub ftol: f64,
    /// Relative change in the parameters considered converged.
    pub xtol: f64,
    /// Orthogonality between residuals and Jacobian columns considered converged.
    pub gtol: f64,
    /// Evaluation budget, in multiples of `(n_params + 1)`.
    pub patience: usize,
    /// Relative step of the forward-difference Jacobian.
    pub diff_step: f64,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            ftol: 1e-10,
            xtol: 1e-10,
            gtol: 0.0,
            patience: 200,
            diff_step: 1e-7,
        }
    }
}

impl SolverOptions {
    pub fn validate(&self) -> Result<()> {
        let tol_ok = |v: f64| v.is_finite() && v >= 0.0;
        if !(tol_ok(self.ftol) && tol_ok(self.xtol) && tol_ok(self.gtol)) {
            return Err(IsingError::Config("solver tolerances must be finite and >= 0".to_string()));
        }
        if self.patience == 0 {
            return Err(IsingError::Config("solver patience must be > 0".to_string()));
        }
        if !(self.diff_step.is_finite() && self.diff_step > 0.0) {
            return Err(IsingError::Config("Jacobian step must be finite and > 0".to_string()));
        }
        Ok(())
    }
}

/// A `ising generate` run as understood by the pipeline.
#[derive(Debug, Clone)]
pub struct GenerateConfig {
    pub constructs: Vec<String>,
    pub output_dir: PathBuf,
    pub project: String,
}

/// A `ising fit` run as understood by the pipeline.
///
/// This is derived from CLI flags (plus defaults).
#[derive(Debug, Clone)]
pub struct FitConfig {
    pub melts_path: PathBuf,
    pub equations_path: PathBuf,
    /// Optional guesses file; when absent, `default_guesses()` is used.
    pub guesses_path: Option<PathBuf>,
    /// Min–max normalize each melt's signal on ingest.
    pub normalize: bool,
    pub solver: SolverOptions,

    pub plot: bool,
    pub plot_width: usize,
    pub plot_height: usize,

    pub export_report: Option<PathBuf>,
    pub export_points: Option<PathBuf>,
}

/// A `ising simulate` run: synthetic melts drawn from the forward model.
#[derive(Debug, Clone)]
pub struct SimulateConfig {
    pub constructs: Vec<String>,
    pub replicates: usize,
    pub denat_min: f64,
    pub denat_max: f64,
    pub points: usize,
    /// Standard deviation of additive Gaussian noise on the signal.
    pub noise: f64,
    pub seed: u64,
    pub globals: GlobalParams,
    pub output: PathBuf,
}

/// Fit output of one session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitReport {
    pub generated_at: DateTime<Utc>,
    /// Every parameter (global and local) with fitted value and standard error.
    pub params: Parameters,
    pub n_melts: usize,
    pub n_observations: usize,
    pub n_fitted: usize,
    pub degrees_of_freedom: usize,
    /// Sum of squared residuals.
    pub ssr: f64,
    /// `ssr / degrees_of_freedom`.
    pub reduced_chi_square: f64,
    pub termination: String,
    pub evaluations: usize,
    /// Final combined residual vector, melt blocks in fit order.
    pub residuals: Vec<f64>,
}
