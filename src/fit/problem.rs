//! The combined least-squares objective over every melt.
//!
//! Residual blocks are laid out in melt-set order; block `k` starts at the
//! sum of the point counts of melts `0..k`. The Jacobian is a forward
//! difference whose columns are evaluated in parallel.

use levenberg_marquardt::LeastSquaresProblem;
use nalgebra::{DMatrix, DVector, Dyn, Owned};
use rayon::prelude::*;

use crate::domain::Melt;
use crate::expr::CompiledExpr;
use crate::fit::layout::ParamLayout;
use crate::models::fill_residuals;

/// One melt and the expression that predicts its fraction folded.
#[derive(Debug, Clone, Copy)]
pub struct MeltBlock<'a> {
    pub melt: &'a Melt,
    pub expr: &'a CompiledExpr,
    pub offset: usize,
}

#[derive(Debug, Clone)]
pub struct GlobalProblem<'a> {
    layout: &'a ParamLayout,
    blocks: Vec<MeltBlock<'a>>,
    n_obs: usize,
    diff_step: f64,
    x: DVector<f64>,
}

impl<'a> GlobalProblem<'a> {
    /// `melts` pairs each melt with its compiled expression, in melt-set order.
    pub fn new(layout: &'a ParamLayout, melts: &[(&'a Melt, &'a CompiledExpr)], diff_step: f64) -> Self {
        let mut blocks = Vec::with_capacity(melts.len());
        let mut offset = 0;
        for &(melt, expr) in melts {
            blocks.push(MeltBlock { melt, expr, offset });
            offset += melt.len();
        }
        Self {
            layout,
            blocks,
            n_obs: offset,
            diff_step,
            x: layout.initial(),
        }
    }

    pub fn n_observations(&self) -> usize {
        self.n_obs
    }

    pub fn blocks(&self) -> &[MeltBlock<'a>] {
        &self.blocks
    }

    /// Current point of the minimizer.
    pub fn x(&self) -> &DVector<f64> {
        &self.x
    }

    /// Combined residual vector at `x` (varying parameters only).
    pub fn residuals_at(&self, x: &[f64]) -> Vec<f64> {
        self.residuals_full(&self.layout.expand(x))
    }

    /// Combined residual vector at a full working-value vector.
    pub fn residuals_full(&self, full: &[f64]) -> Vec<f64> {
        let globals = self.layout.globals(full);
        let mut out = vec![0.0; self.n_obs];
        for (k, block) in self.blocks.iter().enumerate() {
            let melt = block.melt;
            let theta = block.expr.evaluate(&globals, &melt.denat);
            let baseline = self.layout.baseline(full, k);
            let slice = &mut out[block.offset..block.offset + melt.len()];
            fill_residuals(&baseline, &melt.denat, &melt.signal, &theta, slice);
        }
        out
    }

    /// Forward-difference Jacobian of the residuals at `x`.
    ///
    /// `None` when any entry is not finite.
    pub fn jacobian_at(&self, x: &[f64]) -> Option<DMatrix<f64>> {
        let base = self.residuals_at(x);
        let n = x.len();

        let columns: Vec<Vec<f64>> = (0..n)
            .into_par_iter()
            .map(|j| {
                let h = self.diff_step * x[j].abs().max(1.0);
                let mut shifted = x.to_vec();
                shifted[j] += h;
                let r = self.residuals_at(&shifted);
                r.iter().zip(&base).map(|(a, b)| (a - b) / h).collect()
            })
            .collect();

        if columns.iter().flatten().any(|v| !v.is_finite()) {
            return None;
        }
        Some(DMatrix::from_fn(self.n_obs, n, |i, j| columns[j][i]))
    }
}

impl LeastSquaresProblem<f64, Dyn, Dyn> for GlobalProblem<'_> {
    type ResidualStorage = Owned<f64, Dyn>;
    type JacobianStorage = Owned<f64, Dyn, Dyn>;
    type ParameterStorage = Owned<f64, Dyn>;

    fn set_params(&mut self, x: &DVector<f64>) {
        self.x.copy_from(x);
    }

    fn params(&self) -> DVector<f64> {
        self.x.clone()
    }

    fn residuals(&self) -> Option<DVector<f64>> {
        let r = self.residuals_at(self.x.as_slice());
        if r.iter().all(|v| v.is_finite()) {
            Some(DVector::from_vec(r))
        } else {
            None
        }
    }

    fn jacobian(&self) -> Option<DMatrix<f64>> {
        self.jacobian_at(self.x.as_slice())
    }
}
