//! Solver capability traits and the query verdict.

use crate::SolverResult;
use chc_expr::{Expression, Sort};
use std::fmt;

/// Verdict of a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CheckResult {
    /// The goal is derivable: the target state is reachable.
    Satisfiable,
    /// The goal is not derivable: the property holds.
    Unsatisfiable,
    /// Undecided within the configured resource bounds.
    Unknown,
    /// The engine failed while solving.
    Error,
}

impl CheckResult {
    /// `Unknown` and `Error` must be treated as "cannot conclude".
    pub fn is_conclusive(self) -> bool {
        matches!(self, CheckResult::Satisfiable | CheckResult::Unsatisfiable)
    }
}

impl fmt::Display for CheckResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CheckResult::Satisfiable => "sat",
            CheckResult::Unsatisfiable => "unsat",
            CheckResult::Unknown => "unknown",
            CheckResult::Error => "error",
        };
        f.write_str(s)
    }
}

/// Incremental assertion-based solving.
pub trait SolverInterface {
    /// Drop all declarations and assertions. Scope depth is unaffected.
    fn reset(&mut self) -> SolverResult<()>;

    fn push(&mut self);

    /// Restore the state saved by the matching `push`.
    fn pop(&mut self) -> SolverResult<()>;

    fn declare_variable(&mut self, name: &str, sort: &Sort) -> SolverResult<()>;

    fn add_assertion(&mut self, expr: &Expression) -> SolverResult<()>;

    /// Check the goals against the current assertions.
    ///
    /// The second component is reserved for model data and is currently
    /// always empty.
    fn check(&mut self, goals: &[Expression]) -> SolverResult<(CheckResult, Vec<String>)>;
}

/// Horn-clause solving on top of [`SolverInterface`].
pub trait ChcSolverInterface: SolverInterface {
    /// Mark a declared relation as an unknown predicate for the engine to solve for.
    fn register_relation(&mut self, relation: &Expression) -> SolverResult<()>;

    /// Assert a universally closed rule labelled `name`.
    fn add_rule(&mut self, rule: &Expression, name: &str) -> SolverResult<()>;

    /// Ask whether `goal` is derivable from the registered rules.
    fn query(&mut self, goal: &Expression) -> SolverResult<(CheckResult, Vec<String>)>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_sat_and_unsat_are_conclusive() {
        assert!(CheckResult::Satisfiable.is_conclusive());
        assert!(CheckResult::Unsatisfiable.is_conclusive());
        assert!(!CheckResult::Unknown.is_conclusive());
        assert!(!CheckResult::Error.is_conclusive());
        assert_eq!(CheckResult::Unsatisfiable.to_string(), "unsat");
    }
}
