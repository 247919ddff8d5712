//! Binding and lowering of parsed expressions into an evaluable form.
//!
//! Compilation resolves every identifier once (`RT` becomes a literal,
//! `denat` and the global names become slots), folds constant subtrees and
//! rewrites a quotient of two exponential sums into an [`Node::ExpRatio`],
//! which is evaluated with the largest exponent factored out.

use crate::domain::{GlobalName, GlobalParams, RT};
use crate::error::{IsingError, Result};
use crate::expr::parse::{BinOp, Expr, Func, parse};

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Const(f64),
    Denat,
    Global(GlobalName),
    Neg(Box<Node>),
    Binary(BinOp, Box<Node>, Box<Node>),
    Call(Func, Box<Node>),
    /// `Σ c_i·exp(e_i) / Σ d_j·exp(g_j)`
    ExpRatio {
        num: Vec<(f64, Node)>,
        den: Vec<(f64, Node)>,
    },
}

fn bind(expr: &Expr, construct: &str) -> Result<Node> {
    Ok(match expr {
        Expr::Num(v) => Node::Const(*v),
        Expr::Var(name) => match name.as_str() {
            "RT" => Node::Const(RT),
            "denat" => Node::Denat,
            other => Node::Global(GlobalName::from_name(other).ok_or_else(|| {
                IsingError::Lookup(format!("undefined symbol '{other}' in the {construct} expression"))
            })?),
        },
        Expr::Neg(x) => fold(Node::Neg(Box::new(bind(x, construct)?))),
        Expr::Call(f, x) => fold(Node::Call(*f, Box::new(bind(x, construct)?))),
        Expr::Binary(op, a, b) => {
            let a = bind(a, construct)?;
            let b = bind(b, construct)?;
            lower(fold(Node::Binary(*op, Box::new(a), Box::new(b))))
        }
    })
}

fn fold(node: Node) -> Node {
    match node {
        Node::Neg(x) => match *x {
            Node::Const(v) => Node::Const(-v),
            other => Node::Neg(Box::new(other)),
        },
        Node::Call(f, x) => match *x {
            Node::Const(v) => Node::Const(f.apply(v)),
            other => Node::Call(f, Box::new(other)),
        },
        Node::Binary(op, a, b) => match (*a, *b) {
            (Node::Const(x), Node::Const(y)) => Node::Const(op.apply(x, y)),
            (a, b) => Node::Binary(op, Box::new(a), Box::new(b)),
        },
        other => other,
    }
}

/// Terms of `node` read as a sum `Σ c·exp(e)`, if it has that shape.
fn exp_sum(node: &Node) -> Option<Vec<(f64, Node)>> {
    match node {
        Node::Const(c) => Some(vec![(*c, Node::Const(0.0))]),
        Node::Call(Func::Exp, arg) => Some(vec![(1.0, (**arg).clone())]),
        Node::Neg(x) => Some(scale(exp_sum(x)?, -1.0)),
        Node::Binary(BinOp::Add, a, b) => {
            let mut terms = exp_sum(a)?;
            terms.extend(exp_sum(b)?);
            Some(terms)
        }
        Node::Binary(BinOp::Sub, a, b) => {
            let mut terms = exp_sum(a)?;
            terms.extend(scale(exp_sum(b)?, -1.0));
            Some(terms)
        }
        Node::Binary(BinOp::Mul, a, b) => match (&**a, &**b) {
            (Node::Const(c), x) | (x, Node::Const(c)) => Some(scale(exp_sum(x)?, *c)),
            _ => None,
        },
        _ => None,
    }
}

fn scale(terms: Vec<(f64, Node)>, by: f64) -> Vec<(f64, Node)> {
    terms.into_iter().map(|(c, e)| (c * by, e)).collect()
}

fn has_exp(terms: &[(f64, Node)]) -> bool {
    terms.iter().any(|(_, e)| *e != Node::Const(0.0))
}

fn lower(node: Node) -> Node {
    let Node::Binary(BinOp::Div, a, b) = &node else {
        return node;
    };
    match (exp_sum(a), exp_sum(b)) {
        (Some(num), Some(den)) if has_exp(&num) || has_exp(&den) => Node::ExpRatio { num, den },
        _ => node,
    }
}

fn eval(node: &Node, p: &GlobalParams, denat: f64) -> f64 {
    match node {
        Node::Const(v) => *v,
        Node::Denat => denat,
        Node::Global(g) => p.get(*g),
        Node::Neg(x) => -eval(x, p, denat),
        Node::Binary(op, a, b) => op.apply(eval(a, p, denat), eval(b, p, denat)),
        Node::Call(f, x) => f.apply(eval(x, p, denat)),
        Node::ExpRatio { num, den } => {
            let shift = num
                .iter()
                .chain(den.iter())
                .map(|(_, e)| eval(e, p, denat))
                .fold(f64::NEG_INFINITY, f64::max);
            let shift = if shift.is_finite() { shift } else { 0.0 };
            let sum = |terms: &[(f64, Node)]| -> f64 {
                terms.iter().map(|(c, e)| c * (eval(e, p, denat) - shift).exp()).sum()
            };
            sum(num) / sum(den)
        }
    }
}

fn collect_globals(node: &Node, out: &mut Vec<GlobalName>) {
    match node {
        Node::Const(_) | Node::Denat => {}
        Node::Global(g) => {
            if !out.contains(g) {
                out.push(*g);
            }
        }
        Node::Neg(x) | Node::Call(_, x) => collect_globals(x, out),
        Node::Binary(_, a, b) => {
            collect_globals(a, out);
            collect_globals(b, out);
        }
        Node::ExpRatio { num, den } => {
            for (_, e) in num.iter().chain(den.iter()) {
                collect_globals(e, out);
            }
        }
    }
}

/// A fraction-folded expression ready for repeated evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledExpr {
    construct: String,
    root: Node,
    globals: Vec<GlobalName>,
}

impl CompiledExpr {
    /// Parse and compile the expression text of `construct`.
    pub fn compile(construct: &str, source: &str) -> Result<Self> {
        let expr = parse(source)?;
        Self::from_expr(construct, &expr)
    }

    pub fn from_expr(construct: &str, expr: &Expr) -> Result<Self> {
        let root = bind(expr, construct)?;
        let mut globals = Vec::new();
        collect_globals(&root, &mut globals);
        globals.sort_by_key(|g| g.index());
        Ok(Self {
            construct: construct.to_string(),
            root,
            globals,
        })
    }

    pub fn construct(&self) -> &str {
        &self.construct
    }

    /// Global parameters the expression depends on, in canonical order.
    pub fn globals(&self) -> &[GlobalName] {
        &self.globals
    }

    /// True when the top level was lowered to a shifted exponential ratio.
    pub fn is_exp_ratio(&self) -> bool {
        matches!(self.root, Node::ExpRatio { .. })
    }

    pub fn evaluate_at(&self, p: &GlobalParams, denat: f64) -> f64 {
        eval(&self.root, p, denat)
    }

    pub fn evaluate(&self, p: &GlobalParams, denat: &[f64]) -> Vec<f64> {
        denat.iter().map(|&d| eval(&self.root, p, d)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Construct;
    use crate::models::PartitionFunction;
    use approx::assert_relative_eq;

    fn params() -> GlobalParams {
        GlobalParams {
            dgn: 6.0,
            dgr: 5.0,
            dgc: 6.0,
            dginter: -12.0,
            mi: 1.0,
        }
    }

    #[test]
    fn serialized_fraction_folded_round_trips() {
        let denat: Vec<f64> = (0..=32).map(|i| f64::from(i) * 0.25).collect();
        for name in ["R", "R_R", "N_R_C", "N_R_R_C", "N_R_R_R_R_C"] {
            let ff = PartitionFunction::build(&Construct::parse(name).unwrap())
                .unwrap()
                .fraction_folded();
            let compiled = CompiledExpr::compile(name, &ff.to_string()).unwrap();
            assert!(compiled.is_exp_ratio());
            for (d, got) in denat.iter().zip(compiled.evaluate(&params(), &denat)) {
                let want = ff.evaluate(&params(), *d, RT);
                assert_relative_eq!(got, want, max_relative = 1e-9);
            }
        }
    }

    #[test]
    fn compilation_is_deterministic() {
        let text = "(exp(-(dGR + mi*denat)/RT))/(exp(-(dGR + mi*denat)/RT) + 1)";
        let a = CompiledExpr::compile("R", text).unwrap();
        let b = CompiledExpr::compile("R", text).unwrap();
        assert_eq!(a, b);
        let d = [0.0, 1.5, 7.0];
        assert_eq!(a.evaluate(&params(), &d), b.evaluate(&params(), &d));
    }

    #[test]
    fn tracks_referenced_globals() {
        let c = CompiledExpr::compile("R", "np.exp(-(dGinter + dGR)/RT) ** 2").unwrap();
        assert_eq!(c.globals(), &[GlobalName::Dgr, GlobalName::Dginter]);
        assert!(!c.is_exp_ratio());
    }

    #[test]
    fn undefined_symbols_are_rejected() {
        let err = CompiledExpr::compile("R", "exp(-(dGX + mi*denat)/RT)").unwrap_err();
        assert!(matches!(err, IsingError::Lookup(ref m) if m.contains("dGX")));
    }

    #[test]
    fn constants_fold_and_rt_is_bound() {
        let c = CompiledExpr::compile("R", "RT*2 + sqrt(4)").unwrap();
        assert!(c.globals().is_empty());
        assert!((c.evaluate_at(&params(), 3.0) - (2.0 * RT + 2.0)).abs() < 1e-15);
    }

    #[test]
    fn extreme_exponents_stay_finite() {
        let c = CompiledExpr::compile(
            "R_R",
            "(exp(-(2*dGR + dGinter + 2*mi*denat)/RT))/(exp(-(2*dGR + dGinter + 2*mi*denat)/RT) + 1)",
        )
        .unwrap();
        let p = GlobalParams {
            dgr: -400.0,
            dginter: -400.0,
            ..params()
        };
        let v = c.evaluate_at(&p, 0.0);
        assert!(v.is_finite());
        assert!((v - 1.0).abs() < 1e-12);
    }
}
