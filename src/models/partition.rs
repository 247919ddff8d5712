//! Fraction-folded synthesis from a construct's partition function.
//!
//! Given the exact partition polynomial `q(K_N, K_R, K_C, W)` of a chain of `n`
//! units, the fraction of folded units is the log-derivative average
//!
//! ```text
//! θ = (K_N ∂q/∂K_N + K_R ∂q/∂K_R + K_C ∂q/∂K_C) / (n · q)
//! ```
//!
//! After substituting `K_t = exp(-(dG_t + mi·denat)/RT)` and
//! `W = exp(-dGinter/RT)`, every monomial `K_N^a K_R^b K_C^c W^w` turns into a
//! single exponential whose argument is linear in the parameters, so θ is a
//! ratio of two exponential sums. Simplification collects equal exponents,
//! drops vanishing terms and cancels the common integer factor of all
//! coefficients (the chain-length divisor usually cancels this way).

use std::collections::BTreeMap;
use std::fmt;
use std::time::Instant;

use rayon::prelude::*;

use crate::domain::{Construct, GlobalParams, Unit};
use crate::error::Result;
use crate::math::{Monomial, Polynomial, Var, partition_polynomial};

/// Persisted fraction-folded expressions, keyed `<construct>_frac_folded`.
pub type Equations = BTreeMap<String, String>;

/// Partition function of one construct.
#[derive(Debug, Clone, PartialEq)]
pub struct PartitionFunction {
    construct: Construct,
    q: Polynomial,
}

impl PartitionFunction {
    pub fn build(construct: &Construct) -> Result<Self> {
        let q = partition_polynomial(construct.units())?;
        Ok(Self {
            construct: construct.clone(),
            q,
        })
    }

    pub fn construct(&self) -> &Construct {
        &self.construct
    }

    pub fn polynomial(&self) -> &Polynomial {
        &self.q
    }

    /// `∂q/∂K_t`; the zero polynomial when `unit` does not occur in the chain.
    pub fn derivative(&self, unit: Unit) -> Polynomial {
        self.q.derivative(Var::of_unit(unit))
    }

    pub fn evaluate(&self, kn: f64, kr: f64, kc: f64, w: f64) -> f64 {
        self.q.evaluate([kn, kr, kc, w])
    }

    /// Build and simplify the closed-form fraction folded.
    pub fn fraction_folded(&self) -> FractionFolded {
        let mut weighted = Polynomial::zero();
        for unit in Unit::ALL {
            let v = Var::of_unit(unit);
            weighted = &weighted + &self.derivative(unit).times_var(v);
        }

        let n = self.construct.len() as u64;
        let numerator = collect(weighted.terms().map(|(m, &c)| (Exponent::of(m), c)));
        let denominator = collect(self.q.terms().map(|(m, &c)| (Exponent::of(m), c * n)));

        let mut ff = FractionFolded {
            construct: self.construct.name().to_string(),
            numerator,
            denominator,
        };
        ff.cancel_common_factor();
        ff
    }
}

/// Integer coefficients of `exp(-(dgn·dGN + dgr·dGR + dgc·dGC + dginter·dGinter
/// + denat·mi·denat)/RT)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Exponent {
    pub dgn: u32,
    pub dgr: u32,
    pub dgc: u32,
    pub dginter: u32,
    /// Multiplier of `mi·denat`: the number of folded units.
    pub denat: u32,
}

impl Exponent {
    fn of(m: &Monomial) -> Self {
        Self {
            dgn: m.exponent(Var::Kn),
            dgr: m.exponent(Var::Kr),
            dgc: m.exponent(Var::Kc),
            dginter: m.exponent(Var::W),
            denat: m.k_degree(),
        }
    }

    pub fn is_zero(&self) -> bool {
        *self == Exponent::default()
    }

    /// Value of the exponential's argument.
    pub fn value(&self, p: &GlobalParams, denat: f64, rt: f64) -> f64 {
        let s = f64::from(self.dgn) * p.dgn
            + f64::from(self.dgr) * p.dgr
            + f64::from(self.dgc) * p.dgc
            + f64::from(self.dginter) * p.dginter
            + f64::from(self.denat) * p.mi * denat;
        -s / rt
    }

    fn linear_form(&self) -> String {
        let mut parts = Vec::new();
        for (k, sym) in [
            (self.dgn, "dGN"),
            (self.dgr, "dGR"),
            (self.dgc, "dGC"),
            (self.dginter, "dGinter"),
            (self.denat, "mi*denat"),
        ] {
            match k {
                0 => {}
                1 => parts.push(sym.to_string()),
                _ => parts.push(format!("{k}*{sym}")),
            }
        }
        parts.join(" + ")
    }
}

/// `coef · exp(exponent)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpTerm {
    pub coef: u64,
    pub exponent: Exponent,
}

impl fmt::Display for ExpTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.exponent.is_zero() {
            return write!(f, "{}", self.coef);
        }
        if self.coef != 1 {
            write!(f, "{}*", self.coef)?;
        }
        write!(f, "exp(-({})/RT)", self.exponent.linear_form())
    }
}

fn collect(terms: impl Iterator<Item = (Exponent, u64)>) -> Vec<ExpTerm> {
    let mut acc: BTreeMap<Exponent, u64> = BTreeMap::new();
    for (e, c) in terms {
        if c > 0 {
            *acc.entry(e).or_insert(0) += c;
        }
    }
    // Most-folded state first reads naturally and keeps output stable.
    acc.into_iter()
        .rev()
        .map(|(exponent, coef)| ExpTerm { coef, exponent })
        .collect()
}

fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

/// Closed-form fraction folded of one construct: `Σ numerator / Σ denominator`.
#[derive(Debug, Clone, PartialEq)]
pub struct FractionFolded {
    construct: String,
    numerator: Vec<ExpTerm>,
    denominator: Vec<ExpTerm>,
}

impl FractionFolded {
    pub fn construct(&self) -> &str {
        &self.construct
    }

    pub fn numerator(&self) -> &[ExpTerm] {
        &self.numerator
    }

    pub fn denominator(&self) -> &[ExpTerm] {
        &self.denominator
    }

    fn cancel_common_factor(&mut self) {
        let g = self
            .numerator
            .iter()
            .chain(self.denominator.iter())
            .fold(0, |acc, t| gcd(acc, t.coef));
        if g > 1 {
            for t in self.numerator.iter_mut().chain(self.denominator.iter_mut()) {
                t.coef /= g;
            }
        }
    }

    /// Evaluate at one denaturant concentration.
    ///
    /// Exponents are shifted by their maximum before exponentiation, so long
    /// or very stable chains do not overflow.
    pub fn evaluate(&self, p: &GlobalParams, denat: f64, rt: f64) -> f64 {
        let num: Vec<(f64, f64)> = self
            .numerator
            .iter()
            .map(|t| (t.coef as f64, t.exponent.value(p, denat, rt)))
            .collect();
        let den: Vec<(f64, f64)> = self
            .denominator
            .iter()
            .map(|t| (t.coef as f64, t.exponent.value(p, denat, rt)))
            .collect();

        let shift = num
            .iter()
            .chain(den.iter())
            .map(|&(_, e)| e)
            .fold(f64::NEG_INFINITY, f64::max);
        let sum = |terms: &[(f64, f64)]| -> f64 { terms.iter().map(|&(c, e)| c * (e - shift).exp()).sum() };
        sum(&num) / sum(&den)
    }
}

impl fmt::Display for FractionFolded {
    /// Textual form accepted by `expr::parse`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let join = |terms: &[ExpTerm]| -> String {
            if terms.is_empty() {
                return "0".to_string();
            }
            terms.iter().map(ToString::to_string).collect::<Vec<_>>().join(" + ")
        };
        write!(f, "({})/({})", join(&self.numerator), join(&self.denominator))
    }
}

/// Generate the fraction-folded expression of every construct.
///
/// Constructs are processed in parallel; the output is keyed by
/// `<construct>_frac_folded` and does not depend on scheduling.
pub fn generate_fitting_equations(constructs: &[Construct]) -> Result<Equations> {
    let start = Instant::now();

    let generated: Vec<(String, String)> = constructs
        .par_iter()
        .map(|construct| {
            let pf = PartitionFunction::build(construct)?;
            let ff = pf.fraction_folded();
            tracing::debug!(
                construct = construct.name(),
                q_terms = pf.polynomial().len(),
                numerator_terms = ff.numerator().len(),
                denominator_terms = ff.denominator().len(),
                "synthesized fraction folded"
            );
            Ok((construct.equation_key(), ff.to_string()))
        })
        .collect::<Result<Vec<_>>>()?;

    let equations: Equations = generated.into_iter().collect();
    tracing::info!(
        constructs = equations.len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "generated fitting equations"
    );
    Ok(equations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RT;

    fn ff(name: &str) -> FractionFolded {
        PartitionFunction::build(&Construct::parse(name).unwrap())
            .unwrap()
            .fraction_folded()
    }

    #[test]
    fn derivative_of_missing_unit_vanishes() {
        let pf = PartitionFunction::build(&Construct::parse("R_R").unwrap()).unwrap();
        assert!(pf.derivative(Unit::N).is_zero());
        assert!(pf.derivative(Unit::C).is_zero());
        assert!(!pf.derivative(Unit::R).is_zero());
    }

    #[test]
    fn homodimer_simplifies_chain_length_away() {
        // q = Kr^2 W + 2 Kr + 1, numerator 2 Kr^2 W + 2 Kr, divisor 2.
        assert_eq!(
            ff("R_R").to_string(),
            "(exp(-(2*dGR + dGinter + 2*mi*denat)/RT) + exp(-(dGR + mi*denat)/RT))/\
             (exp(-(2*dGR + dGinter + 2*mi*denat)/RT) + 2*exp(-(dGR + mi*denat)/RT) + 1)"
        );
    }

    #[test]
    fn single_unit_is_two_state_sigmoid() {
        let f = ff("R");
        let p = GlobalParams {
            dgr: 1.0,
            mi: 0.5,
            ..GlobalParams::default()
        };
        for d in [0.0, 1.0, 4.0] {
            let k = (-(p.dgr + p.mi * d) / RT).exp();
            let expected = k / (1.0 + k);
            assert!((f.evaluate(&p, d, RT) - expected).abs() < 1e-12);
        }
    }

    #[test]
    fn matches_numeric_log_derivative() {
        let construct = Construct::parse("N_R_R_C").unwrap();
        let pf = PartitionFunction::build(&construct).unwrap();
        let f = pf.fraction_folded();
        let p = GlobalParams {
            dgn: 6.0,
            dgr: 5.0,
            dgc: 6.0,
            dginter: -12.0,
            mi: 1.0,
        };
        let d = 2.5;
        let k = |dg: f64| (-(dg + p.mi * d) / RT).exp();
        let (kn, kr, kc, w) = (k(p.dgn), k(p.dgr), k(p.dgc), (-p.dginter / RT).exp());

        let q = pf.evaluate(kn, kr, kc, w);
        let weighted = kn * pf.derivative(Unit::N).evaluate([kn, kr, kc, w])
            + kr * pf.derivative(Unit::R).evaluate([kn, kr, kc, w])
            + kc * pf.derivative(Unit::C).evaluate([kn, kr, kc, w]);
        let expected = weighted / (q * construct.len() as f64);

        let got = f.evaluate(&p, d, RT);
        assert!((got - expected).abs() < 1e-12 * expected.abs().max(1.0));
    }

    #[test]
    fn stays_finite_over_physical_ranges() {
        let f = ff("N_R_R_R_R_C");
        for dg in [-20.0, -5.0, 0.0, 5.0, 20.0] {
            for dginter in [-20.0, 0.0, 20.0] {
                for d in [0.0, 2.0, 8.0] {
                    let p = GlobalParams {
                        dgn: dg,
                        dgr: dg,
                        dgc: dg,
                        dginter,
                        mi: 1.0,
                    };
                    let v = f.evaluate(&p, d, 0.592);
                    assert!(v.is_finite(), "dg={dg} dginter={dginter} d={d} gave {v}");
                    assert!((-1e-12..=1.0 + 1e-12).contains(&v));
                }
            }
        }
    }

    #[test]
    fn generate_keys_every_construct() {
        let constructs = vec![
            Construct::parse("N_R_C").unwrap(),
            Construct::parse("R_R").unwrap(),
        ];
        let eqs = generate_fitting_equations(&constructs).unwrap();
        assert_eq!(eqs.len(), 2);
        assert!(eqs.contains_key("N_R_C_frac_folded"));
        assert!(eqs.contains_key("R_R_frac_folded"));
    }
}
