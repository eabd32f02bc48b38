//! Seam between the session and a native Horn-clause engine.

use crate::config::SessionConfig;
use crate::SolverResult;
use thiserror::Error;

/// Native answer to a reachability query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineAnswer {
    /// The goal is derivable from the rules.
    Reachable,
    /// The goal is not derivable.
    Unreachable,
    /// The engine gave up (timeout, incompleteness).
    Unknown { reason: String },
}

/// The engine raised an internal error while solving.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("engine fault: {message}")]
pub struct EngineFault {
    pub message: String,
}

impl EngineFault {
    pub fn new(message: impl Into<String>) -> Self {
        EngineFault {
            message: message.into(),
        }
    }
}

/// A Horn-clause engine consuming native Z3 terms.
///
/// The session recreates its engine on `reset` and `pop` and replays the
/// surviving relations and rules, so engines need no scoping support.
pub trait HornEngine {
    /// Fresh engine with no relations or rules.
    fn create(config: &SessionConfig) -> SolverResult<Self>
    where
        Self: Sized;

    fn register_relation(&mut self, decl: z3_sys::Z3_func_decl) -> SolverResult<()>;

    /// Assert a closed rule, labelled `name` in certificates.
    fn add_rule(&mut self, rule: z3_sys::Z3_ast, name: &str) -> SolverResult<()>;

    /// Decide whether `goal` is derivable.
    fn query(&mut self, goal: z3_sys::Z3_ast) -> Result<EngineAnswer, EngineFault>;

    /// The accumulated rule set in the engine's textual format.
    fn dump(&self) -> String;
}
