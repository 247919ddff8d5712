//! Compiled model and fit sessions.
//!
//! An [`IsingModel`] owns one compiled fraction-folded expression per
//! construct. Each [`FitSession`] borrows the model, runs at most one
//! Levenberg–Marquardt fit and keeps either its report or the error that
//! ended it. Retrying after a failure means opening a new session from the
//! same model, so nothing is recompiled.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Instant;

use chrono::Utc;
use levenberg_marquardt::LevenbergMarquardt;

use crate::domain::{
    Baseline, Construct, FitReport, GlobalName, GlobalParams, LocalName, Melt, MeltSet, Parameters, SolverOptions,
};
use crate::error::{IsingError, Result};
use crate::expr::CompiledExpr;
use crate::fit::layout::ParamLayout;
use crate::fit::problem::GlobalProblem;
use crate::io::read_fitting_equations;
use crate::math::standard_errors;
use crate::models::{Equations, predict};

/// Compiled fraction-folded expressions for a set of constructs.
#[derive(Debug, Clone)]
pub struct IsingModel {
    constructs: Vec<Construct>,
    compiled: BTreeMap<String, CompiledExpr>,
}

/// Model output for one melt.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub frac_folded: Vec<f64>,
    pub signal: Vec<f64>,
}

impl IsingModel {
    /// Compile the expression of every construct.
    ///
    /// A construct whose `<construct>_frac_folded` key is absent from
    /// `equations` is a configuration error.
    pub fn new(constructs: &[Construct], equations: &Equations) -> Result<Self> {
        let mut compiled = BTreeMap::new();
        for construct in constructs {
            let key = construct.equation_key();
            let text = equations.get(&key).ok_or_else(|| {
                IsingError::Config(format!(
                    "no fraction-folded equation '{key}' for construct {}",
                    construct.name()
                ))
            })?;
            let expr = CompiledExpr::compile(construct.name(), text)?;
            tracing::debug!(
                construct = construct.name(),
                globals = ?expr.globals(),
                "compiled fraction folded"
            );
            compiled.insert(construct.name().to_string(), expr);
        }
        Ok(Self {
            constructs: constructs.to_vec(),
            compiled,
        })
    }

    /// Load the equations JSON at `path` and compile it for `constructs`.
    pub fn from_path(constructs: &[Construct], path: &Path) -> Result<Self> {
        let equations = read_fitting_equations(path)?;
        Self::new(constructs, &equations)
    }

    pub fn constructs(&self) -> &[Construct] {
        &self.constructs
    }

    pub fn compiled(&self, construct: &str) -> Option<&CompiledExpr> {
        self.compiled.get(construct)
    }

    fn expr_for(&self, melt: &Melt) -> Result<&CompiledExpr> {
        self.compiled(&melt.construct).ok_or_else(|| {
            IsingError::Lookup(format!(
                "melt '{}' refers to construct '{}', which has no compiled expression",
                melt.name, melt.construct
            ))
        })
    }

    /// Globals used by the constructs of `melts`, in canonical order.
    pub fn referenced_globals(&self, melts: &MeltSet) -> Result<Vec<GlobalName>> {
        let mut used = [false; 5];
        for melt in melts.iter() {
            for g in self.expr_for(melt)?.globals() {
                used[g.index()] = true;
            }
        }
        Ok(GlobalName::ALL.into_iter().filter(|g| used[g.index()]).collect())
    }

    /// Fraction folded and predicted signal of `melt` under `params`.
    ///
    /// Baseline parameters absent from `params` take their defaults; a global
    /// the construct depends on must be present.
    pub fn predict(&self, melt: &Melt, params: &Parameters) -> Result<Prediction> {
        let expr = self.expr_for(melt)?;
        let mut globals = GlobalParams::default();
        for &g in expr.globals() {
            let v = params.value(g.as_str()).ok_or_else(|| {
                IsingError::Lookup(format!("global parameter '{}' is missing", g.as_str()))
            })?;
            globals.set(g, v);
        }
        let mut baseline = Baseline::default();
        for local in LocalName::ALL {
            if let Some(v) = params.value(&local.param_name(&melt.name)) {
                baseline.set(local, v);
            }
        }

        let frac_folded = expr.evaluate(&globals, &melt.denat);
        let signal = melt
            .denat
            .iter()
            .zip(&frac_folded)
            .map(|(&d, &f)| predict(&baseline, d, f))
            .collect();
        Ok(Prediction { frac_folded, signal })
    }

    /// Open a fit session with default solver settings.
    pub fn session(&self) -> FitSession<'_> {
        FitSession::new(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FitState {
    Unfitted,
    Fitting,
    Fitted,
    Failed,
}

/// One fit attempt against an [`IsingModel`].
#[derive(Debug)]
pub struct FitSession<'m> {
    model: &'m IsingModel,
    solver: SolverOptions,
    state: FitState,
    report: Option<FitReport>,
    error: Option<IsingError>,
}

impl<'m> FitSession<'m> {
    pub fn new(model: &'m IsingModel) -> Self {
        Self {
            model,
            solver: SolverOptions::default(),
            state: FitState::Unfitted,
            report: None,
            error: None,
        }
    }

    pub fn with_solver(mut self, solver: SolverOptions) -> Self {
        self.solver = solver;
        self
    }

    pub fn model(&self) -> &'m IsingModel {
        self.model
    }

    pub fn state(&self) -> FitState {
        self.state
    }

    /// The error that moved the session to `Failed`.
    pub fn error(&self) -> Option<&IsingError> {
        self.error.as_ref()
    }

    pub fn report(&self) -> Result<&FitReport> {
        self.report
            .as_ref()
            .ok_or_else(|| IsingError::State(format!("no fit report in state {:?}", self.state)))
    }

    /// Fit every melt at once.
    ///
    /// `guesses` is copied; missing baseline parameters are added to the copy
    /// only. A session fits once: calling this again is a state error.
    pub fn fit(&mut self, melts: &MeltSet, guesses: &Parameters) -> Result<&FitReport> {
        if self.state != FitState::Unfitted {
            return Err(IsingError::State(format!(
                "fit already attempted (state {:?}); open a new session to retry",
                self.state
            )));
        }

        self.state = FitState::Fitting;
        match self.run(melts, guesses) {
            Ok(report) => {
                self.state = FitState::Fitted;
                let report = self.report.insert(report);
                Ok(&*report)
            }
            Err(err) => {
                tracing::warn!(error = %err, "fit failed");
                self.state = FitState::Failed;
                self.error = Some(err.clone());
                Err(err)
            }
        }
    }

    fn run(&self, melts: &MeltSet, guesses: &Parameters) -> Result<FitReport> {
        let start = Instant::now();
        self.solver.validate()?;
        if melts.is_empty() {
            return Err(IsingError::Validation("no melts to fit".to_string()));
        }

        let pairs = melts
            .iter()
            .map(|m| Ok((m, self.model.expr_for(m)?)))
            .collect::<Result<Vec<_>>>()?;
        let referenced = self.model.referenced_globals(melts)?;
        let layout = ParamLayout::build(guesses, melts, &referenced)?;

        let n_obs = melts.total_points();
        let n_fitted = layout.n_free();
        if n_obs <= n_fitted {
            return Err(IsingError::Numeric(format!(
                "{n_obs} observations cannot determine {n_fitted} parameters (degrees of freedom <= 0)"
            )));
        }
        let dof = n_obs - n_fitted;

        tracing::info!(melts = melts.len(), observations = n_obs, fitted = n_fitted, "starting global fit");

        let problem = GlobalProblem::new(&layout, &pairs, self.solver.diff_step);
        let initial = problem.residuals_at(problem.x().as_slice());
        if initial.iter().any(|r| !r.is_finite()) {
            return Err(IsingError::Numeric(
                "model is not finite at the initial guesses".to_string(),
            ));
        }

        let (problem, termination, evaluations) = if layout.n_varying() == 0 {
            (problem, "no varying parameters".to_string(), 1)
        } else {
            let (problem, report) = LevenbergMarquardt::new()
                .with_ftol(self.solver.ftol)
                .with_xtol(self.solver.xtol)
                .with_gtol(self.solver.gtol)
                .with_patience(self.solver.patience)
                .minimize(problem);
            tracing::debug!(
                termination = ?report.termination,
                evaluations = report.number_of_evaluations,
                objective = report.objective_function,
                "minimizer finished"
            );
            if !report.termination.was_successful() {
                return Err(IsingError::Numeric(format!(
                    "minimizer did not converge: {:?}",
                    report.termination
                )));
            }
            (problem, format!("{:?}", report.termination), report.number_of_evaluations)
        };

        let x = problem.x().as_slice().to_vec();
        let residuals = problem.residuals_at(&x);
        if residuals.iter().any(|r| !r.is_finite()) {
            return Err(IsingError::Numeric("non-finite residuals at the optimum".to_string()));
        }

        let ssr: f64 = residuals.iter().map(|r| r * r).sum();
        let reduced_chi_square = ssr / dof as f64;

        let stderr = if layout.n_varying() == 0 {
            Some(Vec::new())
        } else {
            problem
                .jacobian_at(&x)
                .and_then(|j| standard_errors(&j, reduced_chi_square))
        };
        if stderr.is_none() {
            tracing::warn!("covariance is singular; standard errors unavailable");
        }

        let params = layout.to_parameters(&x, stderr.as_deref());
        tracing::info!(
            ssr,
            reduced_chi_square,
            evaluations,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "global fit finished"
        );

        Ok(FitReport {
            generated_at: Utc::now(),
            params,
            n_melts: melts.len(),
            n_observations: n_obs,
            n_fitted,
            degrees_of_freedom: dof,
            ssr,
            reduced_chi_square,
            termination,
            evaluations,
            residuals,
        })
    }

    /// Fitted global thermodynamic parameters.
    ///
    /// Baseline parameters (names starting with `a` or `b`) are left out.
    pub fn best_fit_params(&self) -> Result<Parameters> {
        if self.state != FitState::Fitted {
            return Err(IsingError::State(format!(
                "best-fit parameters requested in state {:?}",
                self.state
            )));
        }
        let report = self.report()?;
        Ok(report
            .params
            .iter()
            .filter(|p| !(p.name.starts_with('a') || p.name.starts_with('b')))
            .cloned()
            .collect())
    }

    /// The combined residual vector the fit minimizes, at `params`.
    ///
    /// All parameters are taken at face value; `vary` flags are irrelevant.
    pub fn residuals(&self, melts: &MeltSet, params: &Parameters) -> Result<Vec<f64>> {
        let pairs = melts
            .iter()
            .map(|m| Ok((m, self.model.expr_for(m)?)))
            .collect::<Result<Vec<_>>>()?;
        let referenced = self.model.referenced_globals(melts)?;
        let layout = ParamLayout::build(params, melts, &referenced)?;
        let problem = GlobalProblem::new(&layout, &pairs, self.solver.diff_step);
        Ok(problem.residuals_at(problem.x().as_slice()))
    }
}
