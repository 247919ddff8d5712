//! Parser for persisted fraction-folded expressions.
//!
//! Grammar (usual precedence, `^` binds tighter than unary minus and is
//! right-associative):
//!
//! ```text
//! expr  := term (('+' | '-') term)*
//! term  := unary (('*' | '/') unary)*
//! unary := ('-' | '+') unary | power
//! power := atom (('^' | '**') unary)?
//! atom  := number | ident | func '(' expr ')' | '(' expr ')'
//! ```
//!
//! Identifiers may contain dots so that `np.exp(...)`, as written by older
//! sympy-based tooling, is read as `exp(...)`.

use std::collections::BTreeSet;

use crate::error::{IsingError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

impl BinOp {
    pub fn apply(self, a: f64, b: f64) -> f64 {
        match self {
            BinOp::Add => a + b,
            BinOp::Sub => a - b,
            BinOp::Mul => a * b,
            BinOp::Div => a / b,
            BinOp::Pow => a.powf(b),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Func {
    Exp,
    Log,
    Sqrt,
}

impl Func {
    fn from_name(name: &str) -> Option<Func> {
        match name.strip_prefix("np.").unwrap_or(name) {
            "exp" => Some(Func::Exp),
            "log" => Some(Func::Log),
            "sqrt" => Some(Func::Sqrt),
            _ => None,
        }
    }

    pub fn apply(self, x: f64) -> f64 {
        match self {
            Func::Exp => x.exp(),
            Func::Log => x.ln(),
            Func::Sqrt => x.sqrt(),
        }
    }
}

/// Parsed, unbound expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Num(f64),
    Var(String),
    Neg(Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    Call(Func, Box<Expr>),
}

impl Expr {
    /// Free identifiers, sorted.
    pub fn symbols(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        self.collect_symbols(&mut out);
        out
    }

    fn collect_symbols(&self, out: &mut BTreeSet<String>) {
        match self {
            Expr::Num(_) => {}
            Expr::Var(name) => {
                out.insert(name.clone());
            }
            Expr::Neg(x) | Expr::Call(_, x) => x.collect_symbols(out),
            Expr::Binary(_, a, b) => {
                a.collect_symbols(out);
                b.collect_symbols(out);
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Num(f64),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    LParen,
    RParen,
}

#[derive(Debug, Clone, PartialEq)]
struct Token {
    tok: Tok,
    offset: usize,
}

fn tokenize(src: &str) -> Result<Vec<Token>> {
    let bytes = src.as_bytes();
    let mut out = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i];
        let start = i;
        let simple = match c {
            b' ' | b'\t' | b'\n' | b'\r' => {
                i += 1;
                continue;
            }
            b'+' => Some(Tok::Plus),
            b'-' => Some(Tok::Minus),
            b'/' => Some(Tok::Slash),
            b'^' => Some(Tok::Caret),
            b'(' => Some(Tok::LParen),
            b')' => Some(Tok::RParen),
            b'*' => {
                if bytes.get(i + 1) == Some(&b'*') {
                    i += 1;
                    Some(Tok::Caret)
                } else {
                    Some(Tok::Star)
                }
            }
            _ => None,
        };
        if let Some(tok) = simple {
            i += 1;
            out.push(Token { tok, offset: start });
            continue;
        }

        if c.is_ascii_digit() || c == b'.' {
            while i < bytes.len() && (bytes[i].is_ascii_digit() || bytes[i] == b'.') {
                i += 1;
            }
            if i < bytes.len() && (bytes[i] == b'e' || bytes[i] == b'E') {
                let mut j = i + 1;
                if j < bytes.len() && (bytes[j] == b'+' || bytes[j] == b'-') {
                    j += 1;
                }
                if j < bytes.len() && bytes[j].is_ascii_digit() {
                    while j < bytes.len() && bytes[j].is_ascii_digit() {
                        j += 1;
                    }
                    i = j;
                }
            }
            let text = &src[start..i];
            let value: f64 = text
                .parse()
                .map_err(|_| IsingError::parse(start, format!("invalid number '{text}'")))?;
            out.push(Token {
                tok: Tok::Num(value),
                offset: start,
            });
            continue;
        }

        if c.is_ascii_alphabetic() || c == b'_' {
            while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_' || bytes[i] == b'.') {
                i += 1;
            }
            out.push(Token {
                tok: Tok::Ident(src[start..i].to_string()),
                offset: start,
            });
            continue;
        }

        let ch = src[start..].chars().next().unwrap_or('?');
        return Err(IsingError::parse(start, format!("unexpected character '{ch}'")));
    }

    Ok(out)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    end: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Tok> {
        self.tokens.get(self.pos).map(|t| &t.tok)
    }

    fn offset(&self) -> usize {
        self.tokens.get(self.pos).map(|t| t.offset).unwrap_or(self.end)
    }

    fn bump(&mut self) -> Option<Tok> {
        let t = self.tokens.get(self.pos).map(|t| t.tok.clone());
        self.pos += 1;
        t
    }

    fn expect(&mut self, want: Tok, what: &str) -> Result<()> {
        let offset = self.offset();
        match self.bump() {
            Some(t) if t == want => Ok(()),
            _ => Err(IsingError::parse(offset, format!("expected {what}"))),
        }
    }

    fn expr(&mut self) -> Result<Expr> {
        let mut lhs = self.term()?;
        loop {
            let op = match self.peek() {
                Some(Tok::Plus) => BinOp::Add,
                Some(Tok::Minus) => BinOp::Sub,
                _ => return Ok(lhs),
            };
            self.bump();
            let rhs = self.term()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn term(&mut self) -> Result<Expr> {
        let mut lhs = self.unary()?;
        loop {
            let op = match self.peek() {
                Some(Tok::Star) => BinOp::Mul,
                Some(Tok::Slash) => BinOp::Div,
                _ => return Ok(lhs),
            };
            self.bump();
            let rhs = self.unary()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn unary(&mut self) -> Result<Expr> {
        match self.peek() {
            Some(Tok::Minus) => {
                self.bump();
                Ok(Expr::Neg(Box::new(self.unary()?)))
            }
            Some(Tok::Plus) => {
                self.bump();
                self.unary()
            }
            _ => self.power(),
        }
    }

    fn power(&mut self) -> Result<Expr> {
        let base = self.atom()?;
        if self.peek() == Some(&Tok::Caret) {
            self.bump();
            let exponent = self.unary()?;
            return Ok(Expr::Binary(BinOp::Pow, Box::new(base), Box::new(exponent)));
        }
        Ok(base)
    }

    fn atom(&mut self) -> Result<Expr> {
        let offset = self.offset();
        match self.bump() {
            Some(Tok::Num(v)) => Ok(Expr::Num(v)),
            Some(Tok::Ident(name)) => {
                if self.peek() != Some(&Tok::LParen) {
                    return Ok(Expr::Var(name));
                }
                let func = Func::from_name(&name)
                    .ok_or_else(|| IsingError::parse(offset, format!("unknown function '{name}'")))?;
                self.bump();
                let arg = self.expr()?;
                self.expect(Tok::RParen, "')' after function argument")?;
                Ok(Expr::Call(func, Box::new(arg)))
            }
            Some(Tok::LParen) => {
                let inner = self.expr()?;
                self.expect(Tok::RParen, "')'")?;
                Ok(inner)
            }
            Some(_) => Err(IsingError::parse(offset, "expected a number, name or '('")),
            None => Err(IsingError::parse(offset, "unexpected end of expression")),
        }
    }
}

/// Parse an expression string into an unbound tree.
pub fn parse(src: &str) -> Result<Expr> {
    let tokens = tokenize(src)?;
    if tokens.is_empty() {
        return Err(IsingError::parse(0, "empty expression"));
    }
    let mut parser = Parser {
        tokens,
        pos: 0,
        end: src.len(),
    };
    let expr = parser.expr()?;
    if parser.pos < parser.tokens.len() {
        return Err(IsingError::parse(parser.offset(), "unexpected trailing input"));
    }
    Ok(expr)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(e: &Expr, x: f64) -> f64 {
        match e {
            Expr::Num(v) => *v,
            Expr::Var(_) => x,
            Expr::Neg(a) => -eval(a, x),
            Expr::Binary(op, a, b) => op.apply(eval(a, x), eval(b, x)),
            Expr::Call(f, a) => f.apply(eval(a, x)),
        }
    }

    #[test]
    fn precedence_and_associativity() {
        assert_eq!(eval(&parse("1 + 2*3").unwrap(), 0.0), 7.0);
        assert_eq!(eval(&parse("8/4/2").unwrap(), 0.0), 1.0);
        assert_eq!(eval(&parse("2^3^2").unwrap(), 0.0), 512.0);
        assert_eq!(eval(&parse("-x^2").unwrap(), 3.0), -9.0);
        assert_eq!(eval(&parse("2**-1").unwrap(), 0.0), 0.5);
        assert_eq!(eval(&parse("(1 - x)*2").unwrap(), 3.0), -4.0);
    }

    #[test]
    fn numbers_with_exponents() {
        assert_eq!(parse("1.5e-3").unwrap(), Expr::Num(1.5e-3));
        assert_eq!(parse(".25").unwrap(), Expr::Num(0.25));
        assert_eq!(parse("2E+2").unwrap(), Expr::Num(200.0));
    }

    #[test]
    fn numpy_prefixed_functions_are_accepted() {
        let e = parse("np.exp(-(dGR + mi*denat)/RT)").unwrap();
        assert!(matches!(e, Expr::Call(Func::Exp, _)));
        let syms: Vec<String> = e.symbols().into_iter().collect();
        assert_eq!(syms, vec!["RT", "dGR", "denat", "mi"]);
    }

    #[test]
    fn errors_report_offsets() {
        match parse("1 + * 2") {
            Err(IsingError::Parse { offset, .. }) => assert_eq!(offset, 4),
            other => panic!("unexpected {other:?}"),
        }
        match parse("exp(1") {
            Err(IsingError::Parse { offset, .. }) => assert_eq!(offset, 5),
            other => panic!("unexpected {other:?}"),
        }
        assert!(parse("").is_err());
        assert!(parse("foo(1)").is_err());
        assert!(parse("1 2").is_err());
        assert!(parse("1 $ 2").is_err());
    }
}
