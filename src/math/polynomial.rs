//! Exact polynomials in the chain's statistical weights.
//!
//! Transfer-matrix products only ever add and multiply `K_N`, `K_R`, `K_C`,
//! `W` and the constant `1`, so the partition function is a polynomial with
//! non-negative integer coefficients. Keeping it exact means differentiation
//! and term collection never lose precision, and the terms come out in a
//! deterministic (sorted) order.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::{Add, Mul};

use crate::domain::Unit;

/// A polynomial variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Var {
    Kn,
    Kr,
    Kc,
    W,
}

impl Var {
    pub const ALL: [Var; 4] = [Var::Kn, Var::Kr, Var::Kc, Var::W];

    fn index(self) -> usize {
        match self {
            Var::Kn => 0,
            Var::Kr => 1,
            Var::Kc => 2,
            Var::W => 3,
        }
    }

    /// Equilibrium-constant variable of a unit type.
    pub fn of_unit(unit: Unit) -> Var {
        match unit {
            Unit::N => Var::Kn,
            Unit::R => Var::Kr,
            Unit::C => Var::Kc,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Var::Kn => "Kn",
            Var::Kr => "Kr",
            Var::Kc => "Kc",
            Var::W => "W",
        }
    }
}

/// Exponents of `(K_N, K_R, K_C, W)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Monomial([u32; 4]);

impl Monomial {
    pub const ONE: Monomial = Monomial([0; 4]);

    pub fn var(v: Var) -> Self {
        let mut e = [0; 4];
        e[v.index()] = 1;
        Monomial(e)
    }

    pub fn exponent(&self, v: Var) -> u32 {
        self.0[v.index()]
    }

    /// Total degree in the three `K` variables, i.e. the number of folded units.
    pub fn k_degree(&self) -> u32 {
        self.0[0] + self.0[1] + self.0[2]
    }

    fn times(self, other: Monomial) -> Monomial {
        let mut e = self.0;
        for (a, b) in e.iter_mut().zip(other.0) {
            *a += b;
        }
        Monomial(e)
    }
}

impl fmt::Display for Monomial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for v in Var::ALL {
            let e = self.exponent(v);
            if e == 0 {
                continue;
            }
            if !first {
                f.write_str("*")?;
            }
            first = false;
            if e == 1 {
                write!(f, "{}", v.symbol())?;
            } else {
                write!(f, "{}^{e}", v.symbol())?;
            }
        }
        if first {
            f.write_str("1")?;
        }
        Ok(())
    }
}

/// Polynomial with non-negative integer coefficients.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Polynomial {
    terms: BTreeMap<Monomial, u64>,
}

impl Polynomial {
    pub fn zero() -> Self {
        Self::default()
    }

    pub fn one() -> Self {
        Self::constant(1)
    }

    pub fn constant(c: u64) -> Self {
        let mut p = Self::zero();
        p.add_term(Monomial::ONE, c);
        p
    }

    pub fn var(v: Var) -> Self {
        let mut p = Self::zero();
        p.add_term(Monomial::var(v), 1);
        p
    }

    pub fn is_zero(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn coefficient(&self, m: &Monomial) -> u64 {
        self.terms.get(m).copied().unwrap_or(0)
    }

    /// Terms in ascending monomial order.
    pub fn terms(&self) -> impl DoubleEndedIterator<Item = (&Monomial, &u64)> {
        self.terms.iter()
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    fn add_term(&mut self, m: Monomial, c: u64) {
        if c == 0 {
            return;
        }
        *self.terms.entry(m).or_insert(0) += c;
    }

    /// Partial derivative with respect to `v`.
    pub fn derivative(&self, v: Var) -> Polynomial {
        let mut out = Polynomial::zero();
        for (m, &c) in &self.terms {
            let e = m.exponent(v);
            if e == 0 {
                continue;
            }
            let mut reduced = *m;
            reduced.0[v.index()] -= 1;
            out.add_term(reduced, c * u64::from(e));
        }
        out
    }

    /// Multiply by the single variable `v`.
    pub fn times_var(&self, v: Var) -> Polynomial {
        let step = Monomial::var(v);
        let mut out = Polynomial::zero();
        for (m, &c) in &self.terms {
            out.add_term(m.times(step), c);
        }
        out
    }

    /// Numeric value at `(K_N, K_R, K_C, W)`.
    pub fn evaluate(&self, values: [f64; 4]) -> f64 {
        self.terms
            .iter()
            .map(|(m, &c)| {
                let mut term = c as f64;
                for v in Var::ALL {
                    let e = m.exponent(v);
                    if e > 0 {
                        term *= values[v.index()].powi(e as i32);
                    }
                }
                term
            })
            .sum()
    }
}

impl<'a> Add<&'a Polynomial> for &'a Polynomial {
    type Output = Polynomial;

    fn add(self, rhs: &'a Polynomial) -> Polynomial {
        let mut out = self.clone();
        for (m, &c) in &rhs.terms {
            out.add_term(*m, c);
        }
        out
    }
}

impl<'a> Mul<&'a Polynomial> for &'a Polynomial {
    type Output = Polynomial;

    fn mul(self, rhs: &'a Polynomial) -> Polynomial {
        let mut out = Polynomial::zero();
        for (ma, &ca) in &self.terms {
            for (mb, &cb) in &rhs.terms {
                out.add_term(ma.times(*mb), ca * cb);
            }
        }
        out
    }
}

impl fmt::Display for Polynomial {
    /// Highest monomial first, e.g. `Kn^2*W + 2*Kn + 1`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_zero() {
            return f.write_str("0");
        }
        for (i, (m, &c)) in self.terms.iter().rev().enumerate() {
            if i > 0 {
                f.write_str(" + ")?;
            }
            if *m == Monomial::ONE {
                write!(f, "{c}")?;
            } else if c == 1 {
                write!(f, "{m}")?;
            } else {
                write!(f, "{c}*{m}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn product_collects_like_terms() {
        let a = &Polynomial::var(Var::Kn) + &Polynomial::one();
        let sq = &a * &a;
        assert_eq!(sq.to_string(), "Kn^2 + 2*Kn + 1");
    }

    #[test]
    fn derivative_of_absent_variable_is_zero() {
        let p = &Polynomial::var(Var::Kn) * &Polynomial::var(Var::W);
        assert!(p.derivative(Var::Kc).is_zero());
        assert_eq!(p.derivative(Var::Kn).to_string(), "W");
    }

    #[test]
    fn euler_operator_scales_by_degree() {
        // Kn * d/dKn (Kn^3 W) = 3 Kn^3 W
        let kn = Polynomial::var(Var::Kn);
        let w = Polynomial::var(Var::W);
        let p = &(&(&kn * &kn) * &kn) * &w;
        let e = p.derivative(Var::Kn).times_var(Var::Kn);
        assert_eq!(e.to_string(), "3*Kn^3*W");
    }

    #[test]
    fn evaluate_matches_hand_calculation() {
        let kn = Polynomial::var(Var::Kn);
        let p = &(&kn * &kn) + &Polynomial::constant(3);
        assert!((p.evaluate([2.0, 0.0, 0.0, 0.0]) - 7.0).abs() < 1e-12);
    }
}
