use std::collections::HashMap;

use sym::{BvBinaryOp, BvUnaryOp, Expr, FloatSort, FpBinaryOp, FpUnaryOp, Node, Sort};
use tracing::{debug, trace};

use super::{require_bool, Result, SatResult, Solver, SolverError};

/// Solver backed by Z3. Each query is answered in a fresh Z3 context.
///
/// The path condition is rendered as an SMT-LIB script over the bit-vector and floating-point
/// theories, so float arithmetic, comparisons and conversions are decided exactly under their
/// rounding modes. Z3 has a single NaN, so NaN payloads are not distinguished.
#[derive(Debug, Clone, Default)]
pub struct Z3Solver {
    assertions: Vec<Expr>,
    timeout_ms: Option<u64>,
}

impl Z3Solver {
    pub fn new() -> Self {
        Default::default()
    }

    /// Queries running longer than `timeout_ms` are answered with [SatResult::Unknown].
    pub fn with_timeout(timeout_ms: u64) -> Self {
        Self {
            assertions: Vec::new(),
            timeout_ms: Some(timeout_ms),
        }
    }
}

impl Solver for Z3Solver {
    fn assert(&mut self, constraint: Expr) -> Result<()> {
        require_bool(&constraint)?;
        if !constraint.is_true() {
            self.assertions.push(constraint);
        }

        Ok(())
    }

    fn check(&self, query: &Expr) -> Result<SatResult> {
        require_bool(query)?;
        let constraints = self
            .assertions
            .iter()
            .chain(std::iter::once(query))
            .filter(|constraint| !constraint.is_true())
            .collect::<Vec<_>>();

        if constraints.iter().any(|constraint| constraint.is_false()) {
            return Ok(SatResult::Unsat);
        }

        if constraints.is_empty() {
            return Ok(SatResult::Sat);
        }

        let mut script = Script::default();
        for constraint in &constraints {
            script.assert(constraint);
        }
        trace!(script = %script.text, "z3 query");

        let mut cfg = z3::Config::new();
        if let Some(timeout_ms) = self.timeout_ms {
            cfg.set_timeout_msec(timeout_ms);
        }

        let ctx = z3::Context::new(&cfg);
        let solver = z3::Solver::new(&ctx);
        solver.from_string(script.text);

        // A script Z3 cannot parse is only partially loaded
        let loaded = solver.get_assertions().len();
        if loaded != constraints.len() {
            return Err(SolverError::Backend(format!(
                "z3 loaded {loaded} of {} constraints",
                constraints.len()
            )));
        }

        let result = match solver.check() {
            z3::SatResult::Sat => SatResult::Sat,
            z3::SatResult::Unsat => SatResult::Unsat,
            z3::SatResult::Unknown => SatResult::Unknown,
        };

        debug!(%result, constraints = constraints.len(), "z3 check");
        Ok(result)
    }

    fn assertions(&self) -> &[Expr] {
        &self.assertions
    }
}

/// SMT-LIB commands declaring the variables and defining the shared subterms of a set of
/// constraints.
#[derive(Default)]
struct Script {
    text: String,
    terms: HashMap<Expr, String>,
    variables: usize,
    definitions: usize,
}

impl Script {
    fn assert(&mut self, constraint: &Expr) {
        let term = self.term(constraint);
        self.text.push_str(&format!("(assert {term})\n"));
    }

    /// The name of `expr` in the script. Constants are written inline and every other node is
    /// declared or defined once.
    fn term(&mut self, expr: &Expr) -> String {
        if let Some(term) = self.terms.get(expr) {
            return term.clone();
        }

        let term = match expr.node() {
            Node::BvConst { .. } | Node::FpConst { .. } | Node::BoolConst(_) => {
                return expr.to_string();
            }
            Node::Var { sort, .. } => {
                let name = format!("v{}", self.variables);
                self.variables += 1;
                self.text
                    .push_str(&format!("(declare-fun {name} () {sort})\n"));
                name
            }
            _ => {
                let body = self.body(expr);
                let name = format!("t{}", self.definitions);
                self.definitions += 1;
                self.text
                    .push_str(&format!("(define-fun {name} () {} {body})\n", expr.sort()));
                name
            }
        };

        self.terms.insert(expr.clone(), term.clone());
        term
    }

    fn body(&mut self, expr: &Expr) -> String {
        match expr.node() {
            Node::BvUnary(op, arg) => {
                let width = arg.sort().width();
                let arg = self.term(arg);
                match op {
                    BvUnaryOp::Not | BvUnaryOp::Neg => format!("({} {arg})", op.name()),
                    BvUnaryOp::Clz => count_leading_zeros(&arg, width),
                    BvUnaryOp::Ctz => count_trailing_zeros(&arg, width),
                    BvUnaryOp::Popcnt => popcount(&arg, width),
                }
            }
            Node::BvBinary(op, lhs, rhs) => {
                let width = lhs.sort().width();
                let lhs = self.term(lhs);
                let rhs = self.term(rhs);
                match op {
                    BvBinaryOp::RotateLeft => rotate(&lhs, &rhs, width, "bvshl", "bvlshr"),
                    BvBinaryOp::RotateRight => rotate(&lhs, &rhs, width, "bvlshr", "bvshl"),
                    _ => format!("({} {lhs} {rhs})", op.name()),
                }
            }
            Node::Compare(op, lhs, rhs) => {
                format!("({} {} {})", op.name(), self.term(lhs), self.term(rhs))
            }
            Node::Extract { high, low, arg } => {
                format!("((_ extract {high} {low}) {})", self.term(arg))
            }
            Node::Extend { signed, extra, arg } => {
                let name = if *signed { "sign_extend" } else { "zero_extend" };
                format!("((_ {name} {extra}) {})", self.term(arg))
            }
            Node::Concat(high, low) => {
                format!("(concat {} {})", self.term(high), self.term(low))
            }
            Node::FpUnary(op, arg) => {
                let arg = self.term(arg);
                match op {
                    FpUnaryOp::Sqrt(rm) | FpUnaryOp::RoundToIntegral(rm) => {
                        format!("({} {rm} {arg})", op.name())
                    }
                    FpUnaryOp::Abs | FpUnaryOp::Neg => format!("({} {arg})", op.name()),
                }
            }
            Node::FpBinary(op, lhs, rhs) => {
                let lhs = self.term(lhs);
                let rhs = self.term(rhs);
                match (op, expr.sort()) {
                    (FpBinaryOp::Min, Sort::Float(sort)) => min_max(&lhs, &rhs, sort, true),
                    (FpBinaryOp::Max, Sort::Float(sort)) => min_max(&lhs, &rhs, sort, false),
                    _ => match op.rounding_mode() {
                        Some(rm) => format!("({} {rm} {lhs} {rhs})", op.name()),
                        None => format!("({} {lhs} {rhs})", op.name()),
                    },
                }
            }
            Node::FpCompare(op, lhs, rhs) => {
                format!("({} {} {})", op.name(), self.term(lhs), self.term(rhs))
            }
            Node::FpIsNegative(arg) => format!("(fp.isNegative {})", self.term(arg)),
            Node::FpToBv {
                signed,
                width,
                rm,
                arg,
            } => {
                let name = if *signed { "fp.to_sbv" } else { "fp.to_ubv" };
                format!("((_ {name} {width}) {rm} {})", self.term(arg))
            }
            Node::FpToFp { rm, sort, arg } => {
                format!("({} {rm} {})", to_fp("to_fp", *sort), self.term(arg))
            }
            Node::BvToFp {
                signed,
                rm,
                sort,
                arg,
            } => {
                let name = if *signed { "to_fp" } else { "to_fp_unsigned" };
                format!("({} {rm} {})", to_fp(name, *sort), self.term(arg))
            }
            Node::ToIeeeBv(arg) => format!("(fp.to_ieee_bv {})", self.term(arg)),
            Node::FromIeeeBv { sort, arg } => {
                format!("({} {})", to_fp("to_fp", *sort), self.term(arg))
            }
            Node::BoolNot(arg) => format!("(not {})", self.term(arg)),
            Node::BoolBinary(op, lhs, rhs) => {
                format!("({} {} {})", op.name(), self.term(lhs), self.term(rhs))
            }
            Node::Ite(cond, lhs, rhs) => format!(
                "(ite {} {} {})",
                self.term(cond),
                self.term(lhs),
                self.term(rhs)
            ),
            Node::BvConst { .. } | Node::FpConst { .. } | Node::BoolConst(_) | Node::Var { .. } => {
                expr.to_string()
            }
        }
    }
}

fn to_fp(name: &str, sort: FloatSort) -> String {
    format!("(_ {name} {} {})", sort.ebits, sort.sbits)
}

fn constant(value: u32, width: u32) -> String {
    Expr::bv(u64::from(value), width).to_string()
}

fn bit_set(arg: &str, index: u32) -> String {
    format!("(= ((_ extract {index} {index}) {arg}) #b1)")
}

fn count_leading_zeros(arg: &str, width: u32) -> String {
    (0..width).fold(constant(width, width), |acc, i| {
        format!(
            "(ite {} {} {acc})",
            bit_set(arg, i),
            constant(width - 1 - i, width)
        )
    })
}

fn count_trailing_zeros(arg: &str, width: u32) -> String {
    (0..width).rev().fold(constant(width, width), |acc, i| {
        format!("(ite {} {} {acc})", bit_set(arg, i), constant(i, width))
    })
}

fn popcount(arg: &str, width: u32) -> String {
    (0..width).fold(constant(0, width), |acc, i| {
        format!(
            "(bvadd {acc} ((_ zero_extend {}) ((_ extract {i} {i}) {arg})))",
            width - 1
        )
    })
}

/// Rotation by `amount` modulo the width.
fn rotate(value: &str, amount: &str, width: u32, toward: &str, back: &str) -> String {
    let width = constant(width, width);
    let amount = format!("(bvurem {amount} {width})");
    format!("(bvor ({toward} {value} {amount}) ({back} {value} (bvsub {width} {amount})))")
}

/// WebAssembly `min`/`max`: NaN if either operand is NaN, and `-0` orders below `+0`.
fn min_max(lhs: &str, rhs: &str, sort: FloatSort, min: bool) -> String {
    let nan = format!("(_ NaN {} {})", sort.ebits, sort.sbits);
    let (op, zero) = if min {
        ("fp.min", format!("(ite (fp.isNegative {lhs}) {lhs} {rhs})"))
    } else {
        ("fp.max", format!("(ite (fp.isNegative {lhs}) {rhs} {lhs})"))
    };

    format!(
        "(ite (or (fp.isNaN {lhs}) (fp.isNaN {rhs})) {nan} \
         (ite (and (fp.isZero {lhs}) (fp.isZero {rhs})) {zero} ({op} {lhs} {rhs})))"
    )
}
