//! Mapping between named parameters and the minimizer's vector.
//!
//! The working parameter set is the caller's guesses plus any missing
//! per-melt baseline parameters. Only parameters that the residuals depend on
//! and that are marked `vary` occupy a slot in the minimizer's vector; the rest
//! keep their value for the whole fit.
//!
//! Every `vary` parameter still counts as fitted for the degrees of freedom,
//! whether or not the model reads it.

use nalgebra::DVector;

use crate::domain::{Baseline, GlobalName, GlobalParams, LocalName, MeltSet, Parameter, Parameters};
use crate::error::{IsingError, Result};

#[derive(Debug, Clone)]
pub struct ParamLayout {
    params: Parameters,
    values: Vec<f64>,
    varying: Vec<usize>,
    n_free: usize,
    globals: [Option<usize>; 5],
    locals: Vec<[usize; 4]>,
}

fn position(params: &Parameters, name: &str) -> Option<usize> {
    params.iter().position(|p| p.name == name)
}

impl ParamLayout {
    /// Build the working set for `melts`.
    ///
    /// `referenced` lists the globals some compiled expression depends on;
    /// each must be present in `guesses`. Other globals, and any parameter the
    /// model does not know, are carried through unchanged.
    pub fn build(guesses: &Parameters, melts: &MeltSet, referenced: &[GlobalName]) -> Result<Self> {
        guesses.validate()?;
        let mut params = guesses.clone();

        for g in referenced {
            if !params.contains(g.as_str()) {
                return Err(IsingError::Lookup(format!(
                    "global parameter '{}' is used by the model but missing from the guesses",
                    g.as_str()
                )));
            }
        }

        let mut locals = Vec::with_capacity(melts.len());
        for melt in melts.iter() {
            let mut slots = [0usize; 4];
            for (slot, local) in slots.iter_mut().zip(LocalName::ALL) {
                let name = local.param_name(&melt.name);
                if GlobalName::from_name(&name).is_some() {
                    return Err(IsingError::Validation(format!(
                        "local parameter '{name}' collides with a global name"
                    )));
                }
                if !params.contains(&name) {
                    params.add(name.clone(), local.default_value());
                }
                *slot = position(&params, &name).ok_or_else(|| IsingError::Lookup(name.clone()))?;
            }
            locals.push(slots);
        }

        let mut globals = [None; 5];
        for g in GlobalName::ALL {
            globals[g.index()] = position(&params, g.as_str());
        }

        let mut used = vec![false; params.len()];
        for g in referenced {
            if let Some(i) = globals[g.index()] {
                used[i] = true;
            }
        }
        for slots in &locals {
            for &i in slots {
                used[i] = true;
            }
        }

        let mut varying = Vec::new();
        let mut n_free = 0;
        for (i, p) in params.iter().enumerate() {
            if !p.vary {
                continue;
            }
            n_free += 1;
            if used[i] {
                varying.push(i);
            } else {
                tracing::debug!(param = %p.name, "parameter does not enter the model; held at its guess");
            }
        }

        let values = params.iter().map(|p| p.value).collect();
        Ok(Self {
            params,
            values,
            varying,
            n_free,
            globals,
            locals,
        })
    }

    /// Number of slots in the minimizer's vector.
    pub fn n_varying(&self) -> usize {
        self.varying.len()
    }

    /// Number of `vary` parameters, used or not; the fitted count of the report.
    pub fn n_free(&self) -> usize {
        self.n_free
    }

    pub fn varying_names(&self) -> Vec<&str> {
        self.varying
            .iter()
            .filter_map(|&i| self.params.iter().nth(i).map(|p| p.name.as_str()))
            .collect()
    }

    /// Starting point of the minimizer.
    pub fn initial(&self) -> DVector<f64> {
        DVector::from_iterator(self.varying.len(), self.varying.iter().map(|&i| self.values[i]))
    }

    /// All working values with the varying slots replaced by `x`.
    pub fn expand(&self, x: &[f64]) -> Vec<f64> {
        let mut full = self.values.clone();
        for (&i, &v) in self.varying.iter().zip(x) {
            full[i] = v;
        }
        full
    }

    /// Global values; absent globals read as 0.
    pub fn globals(&self, full: &[f64]) -> GlobalParams {
        let mut out = GlobalParams::default();
        for g in GlobalName::ALL {
            if let Some(i) = self.globals[g.index()] {
                out.set(g, full[i]);
            }
        }
        out
    }

    /// Baseline of the `melt`-th melt (in melt-set order).
    pub fn baseline(&self, full: &[f64], melt: usize) -> Baseline {
        let mut b = Baseline::default();
        for (local, &i) in LocalName::ALL.into_iter().zip(&self.locals[melt]) {
            b.set(local, full[i]);
        }
        b
    }

    /// Working parameters at `x`, with standard errors for the varying ones.
    pub fn to_parameters(&self, x: &[f64], stderr: Option<&[f64]>) -> Parameters {
        let full = self.expand(x);
        let mut out: Vec<Parameter> = self
            .params
            .iter()
            .zip(&full)
            .map(|(p, &v)| Parameter {
                value: v,
                stderr: None,
                ..p.clone()
            })
            .collect();
        if let Some(errs) = stderr {
            for (&i, &e) in self.varying.iter().zip(errs) {
                out[i].stderr = Some(e);
            }
        }
        out.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Melt, default_guesses};

    fn melts() -> MeltSet {
        let mut set = MeltSet::new();
        set.insert(Melt::new("R_R_1", vec![0.0, 1.0], vec![1.0, 0.5]).unwrap()).unwrap();
        set.insert(Melt::new("R_R_2", vec![0.0, 1.0], vec![1.0, 0.4]).unwrap()).unwrap();
        set
    }

    const RR: [GlobalName; 3] = [GlobalName::Dgr, GlobalName::Dginter, GlobalName::Mi];

    #[test]
    fn adds_missing_baselines_without_touching_guesses() {
        let guesses = default_guesses();
        let before = guesses.clone();
        let layout = ParamLayout::build(&guesses, &melts(), &RR).unwrap();
        assert_eq!(guesses, before);

        // 3 referenced globals + 2 × 4 baselines; dGN and dGC do not enter R_R.
        assert_eq!(layout.n_varying(), 11);
        assert_eq!(layout.n_free(), 13);
        assert!(!layout.varying_names().contains(&"dGN"));

        let full = layout.expand(layout.initial().as_slice());
        assert_eq!(layout.baseline(&full, 1), Baseline::default());
        assert_eq!(layout.globals(&full).dginter, -10.0);
    }

    #[test]
    fn keeps_user_baselines_and_fixed_flags() {
        let mut guesses = default_guesses();
        guesses.add_fixed("bf_R_R_2", 0.8).add_fixed("mi", 1.2);
        let layout = ParamLayout::build(&guesses, &melts(), &RR).unwrap();
        assert_eq!(layout.n_varying(), 9);
        assert_eq!(layout.n_free(), 11);

        let full = layout.expand(layout.initial().as_slice());
        assert_eq!(layout.baseline(&full, 1).bf, 0.8);
        assert_eq!(layout.globals(&full).mi, 1.2);
    }

    #[test]
    fn unused_varying_globals_still_count_as_free() {
        let denat: Vec<f64> = (0..21).map(|i| f64::from(i) * 0.4).collect();
        let mut set = MeltSet::new();
        set.insert(Melt::new("R_R_R_1", denat, vec![0.5; 21]).unwrap()).unwrap();

        let layout = ParamLayout::build(&default_guesses(), &set, &RR).unwrap();
        assert_eq!(layout.n_varying(), 3 + 4);
        assert_eq!(layout.n_free(), 5 + 4);

        let mut guesses = default_guesses();
        guesses.add_fixed("dGN", 6.0).add_fixed("dGC", 6.0);
        let layout = ParamLayout::build(&guesses, &set, &RR).unwrap();
        assert_eq!(layout.n_free(), layout.n_varying());
    }

    #[test]
    fn missing_referenced_global_is_a_lookup_error() {
        let mut guesses = Parameters::new();
        guesses.add("dGR", 5.0).add("mi", 1.0);
        let err = ParamLayout::build(&guesses, &melts(), &RR).unwrap_err();
        assert!(matches!(err, IsingError::Lookup(ref m) if m.contains("dGinter")));
    }

    #[test]
    fn invalid_guesses_are_rejected() {
        let mut guesses = default_guesses();
        guesses.add("mi", f64::INFINITY);
        assert!(matches!(
            ParamLayout::build(&guesses, &melts(), &RR),
            Err(IsingError::InvalidGuesses(_))
        ));
    }

    #[test]
    fn to_parameters_attaches_errors_to_varying_only() {
        let mut guesses = default_guesses();
        guesses.add_fixed("mi", 1.0);
        let layout = ParamLayout::build(&guesses, &melts(), &RR).unwrap();
        let x = layout.initial();
        let errs = vec![0.1; layout.n_varying()];
        let out = layout.to_parameters(x.as_slice(), Some(&errs));
        assert_eq!(out.get("mi").unwrap().stderr, None);
        assert_eq!(out.get("dGN").unwrap().stderr, None);
        assert_eq!(out.get("dGR").unwrap().stderr, Some(0.1));
        assert_eq!(out.get("bu_R_R_1").unwrap().stderr, Some(0.1));
        assert_eq!(out.len(), 5 + 8);
    }
}
