//! Transfer-matrix construction of a chain's partition function.
//!
//! For a chain `t_0 … t_{n-1}`:
//!
//! ```text
//! q = [0, 1] · M(t_0) · … · M(t_{n-1}) · [1, 1]^T
//! M(t) = | K_t·W  1 |
//!        | K_t    1 |
//! ```
//!
//! Row 1 / column 1 correspond to a folded unit; the `W` factor is picked up
//! whenever a folded unit follows another folded unit.

use crate::domain::Unit;
use crate::error::{IsingError, Result};
use crate::math::polynomial::{Polynomial, Var};

/// 2×2 transfer matrix of one repeat unit.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferMatrix {
    m: [[Polynomial; 2]; 2],
}

impl TransferMatrix {
    pub fn for_unit(unit: Unit) -> Self {
        let k = Polynomial::var(Var::of_unit(unit));
        let kw = &k * &Polynomial::var(Var::W);
        Self {
            m: [[kw, Polynomial::one()], [k, Polynomial::one()]],
        }
    }

    pub fn entry(&self, row: usize, col: usize) -> &Polynomial {
        &self.m[row][col]
    }
}

/// Row vector `[a, b]` carried through the product.
#[derive(Debug, Clone, PartialEq)]
struct Row([Polynomial; 2]);

impl Row {
    fn begin() -> Self {
        Row([Polynomial::zero(), Polynomial::one()])
    }

    fn times(&self, t: &TransferMatrix) -> Row {
        let col = |j: usize| {
            let a = &self.0[0] * t.entry(0, j);
            let b = &self.0[1] * t.entry(1, j);
            &a + &b
        };
        Row([col(0), col(1)])
    }

    /// Contract with `end = [1, 1]^T`.
    fn close(&self) -> Polynomial {
        &self.0[0] + &self.0[1]
    }
}

/// Partition function of the chain, multiplied out in token order.
pub fn partition_polynomial(units: &[Unit]) -> Result<Polynomial> {
    if units.is_empty() {
        return Err(IsingError::Validation(
            "cannot build a partition function for an empty chain".to_string(),
        ));
    }

    let mut row = Row::begin();
    for &unit in units {
        row = row.times(&TransferMatrix::for_unit(unit));
    }
    Ok(row.close())
}
