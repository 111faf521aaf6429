use std::collections::HashMap;

use sym::{Expr, Sort, SortError};
use tracing::debug;

mod z3_backend;
pub use z3_backend::Z3Solver;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SatResult {
    Sat,
    Unsat,

    /// The backend gave up, e.g. on a timeout.
    Unknown,
}

impl std::fmt::Display for SatResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SatResult::Sat => "sat",
            SatResult::Unsat => "unsat",
            SatResult::Unknown => "unknown",
        };

        f.write_str(name)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum SolverError {
    /// A constraint or query is not a well-sorted boolean expression.
    #[error(transparent)]
    Sort(#[from] SortError),

    /// The backing solver failed to answer the query.
    #[error("solver backend failure: {0}")]
    Backend(String),
}

pub type Result<T> = std::result::Result<T, SolverError>;

/// A store of path constraints that can answer satisfiability queries against them.
pub trait Solver: Clone + std::fmt::Debug {
    /// Conjoin a boolean constraint with the constraints asserted so far.
    fn assert(&mut self, constraint: Expr) -> Result<()>;

    /// Check whether the asserted constraints together with `query` are satisfiable. The query is
    /// not retained.
    fn check(&self, query: &Expr) -> Result<SatResult>;

    /// The asserted constraints in the order they were added.
    fn assertions(&self) -> &[Expr];

    /// Canonicalize an expression.
    fn simplify(&self, expr: &Expr) -> Expr {
        expr.simplify()
    }
}

fn require_bool(expr: &Expr) -> Result<()> {
    if expr.sort() == Sort::Bool {
        Ok(())
    } else {
        Err(SortError::Unsupported {
            operation: "assert",
            sort: expr.sort(),
        }
        .into())
    }
}

/// Memoized satisfiability results. Entries are keyed by the number of constraints asserted when
/// the query was made, so asserting a constraint never reuses a result computed for a weaker
/// path condition.
#[derive(Debug, Clone, Default)]
pub struct QueryCache {
    entries: HashMap<(usize, Expr), SatResult>,
    hits: usize,
    misses: usize,
}

impl QueryCache {
    pub fn hits(&self) -> usize {
        self.hits
    }

    pub fn misses(&self) -> usize {
        self.misses
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The conjunction of constraints along one execution path, owned by a single execution state.
/// Cloning a path condition clones its constraints and its cache.
#[derive(Debug, Clone)]
pub struct PathCondition<S: Solver> {
    solver: S,
    cache: QueryCache,
}

impl<S: Solver + Default> Default for PathCondition<S> {
    fn default() -> Self {
        Self::new(S::default())
    }
}

impl<S: Solver> PathCondition<S> {
    pub fn new(solver: S) -> Self {
        Self {
            solver,
            cache: Default::default(),
        }
    }

    /// Conjoin a constraint. Constraints already on the path are not asserted again.
    pub fn add(&mut self, constraint: Expr) -> Result<()> {
        if self.solver.assertions().contains(&constraint) {
            return Ok(());
        }

        self.solver.assert(constraint)
    }

    /// Satisfiability of the path condition conjoined with `query`.
    pub fn check(&mut self, query: &Expr) -> Result<SatResult> {
        let key = (self.solver.assertions().len(), query.clone());
        if let Some(result) = self.cache.entries.get(&key) {
            self.cache.hits += 1;
            debug!(%query, %result, "query cache hit");
            return Ok(*result);
        }

        let result = self.solver.check(query)?;
        self.cache.misses += 1;
        self.cache.entries.insert(key, result);
        Ok(result)
    }

    /// Returns `false` only if `query` is provably infeasible on this path.
    pub fn is_feasible(&mut self, query: &Expr) -> Result<bool> {
        Ok(self.check(query)? != SatResult::Unsat)
    }

    pub fn simplify(&self, expr: &Expr) -> Expr {
        self.solver.simplify(expr)
    }

    pub fn constraints(&self) -> &[Expr] {
        self.solver.assertions()
    }

    pub fn solver(&self) -> &S {
        &self.solver
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }
}
