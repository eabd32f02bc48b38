//! Constrained Horn Clause solving interface backed by Z3's fixedpoint engine.
//!
//! Callers declare constants and relations, assert universally quantified
//! rules over them and ask whether a goal is derivable. Native engine
//! machinery (terms, declarations, parameters) stays behind this crate's API;
//! callers only see [`Expression`]s, [`Sort`]s and a [`CheckResult`].

pub mod config;
pub mod engine;
pub mod fixedpoint;
pub mod global;
pub mod interface;
pub mod session;
pub mod symbols;
pub mod translate;

pub use chc_expr::{Expression, Kind, Op, Sort};
pub use config::{HornEngineKind, Quantification, SessionConfig, DEFAULT_QUERY_TIMEOUT};
pub use engine::{EngineAnswer, EngineFault, HornEngine};
pub use fixedpoint::Fixedpoint;
pub use global::{global_params_initialized, init_global_params};
pub use interface::{ChcSolverInterface, CheckResult, SolverInterface};
pub use session::{Rule, SessionState, Z3ChcInterface};
pub use symbols::SymbolTable;

use thiserror::Error;

/// Contract violations and native construction failures.
///
/// Engine failures while a query runs are not reported here; they are
/// downgraded to [`CheckResult::Error`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SolverError {
    #[error("undeclared symbol '{name}'")]
    UndeclaredSymbol { name: String },

    #[error("symbol '{name}' is declared as {declared}, cannot redeclare as {requested}")]
    SortConflict {
        name: String,
        declared: Sort,
        requested: Sort,
    },

    #[error("sort mismatch in {context}: expected {expected}, found {found}")]
    SortMismatch {
        context: String,
        expected: String,
        found: String,
    },

    #[error("'{name}' is not a relation")]
    NotARelation { name: String },

    #[error("pop without matching push")]
    ImbalancedScope,

    #[error("queries take exactly one goal, got {count}")]
    UnsupportedQueryShape { count: usize },

    #[error("Z3 error: {0}")]
    Z3(String),
}

pub type SolverResult<T> = Result<T, SolverError>;
