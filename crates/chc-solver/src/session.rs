//! Horn-clause solver session.
//!
//! The session records every declaration, registered relation and rule it
//! receives. Scopes are snapshots of that record: `pop` restores the snapshot
//! and replays it into a fresh engine, so the engine itself never needs
//! push/pop support and a restored state is exactly the pre-push state.

use crate::config::{Quantification, SessionConfig};
use crate::engine::{EngineAnswer, HornEngine};
use crate::fixedpoint::Fixedpoint;
use crate::global::init_global_params;
use crate::interface::{ChcSolverInterface, CheckResult, SolverInterface};
use crate::symbols::SymbolTable;
use crate::translate::Translator;
use crate::{SolverError, SolverResult};
use chc_expr::{Expression, Sort};
use std::time::Duration;
use tracing::{debug, info, warn};
use z3::ast::{Ast, Bool};

/// A rule as asserted, with the variables it was closed over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub name: String,
    pub body: Expression,
    /// Universally bound constants, captured when the rule was added.
    pub bound: Vec<String>,
}

/// Everything a scope saves and restores.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    symbols: SymbolTable,
    relations: Vec<String>,
    rules: Vec<Rule>,
}

impl SessionState {
    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    /// Registered relations, in registration order.
    pub fn relations(&self) -> &[String] {
        &self.relations
    }

    /// Asserted rules, in assertion order.
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }
}

type RuleTrace = Box<dyn FnMut(&str)>;

/// CHC session over a Z3 Horn engine.
///
/// Intended for a single verification thread; the native handles it holds
/// make it neither `Send` nor `Sync`.
pub struct Z3ChcInterface<E: HornEngine = Fixedpoint> {
    config: SessionConfig,
    state: SessionState,
    scopes: Vec<SessionState>,
    engine: E,
    rule_trace: Option<RuleTrace>,
    last_unknown_reason: Option<String>,
    /// Set when the engine faulted and could not be rebuilt yet.
    engine_stale: bool,
}

impl Z3ChcInterface<Fixedpoint> {
    pub fn new(config: SessionConfig) -> SolverResult<Self> {
        Self::with_engine(config)
    }

    /// Session with default settings and the given per-query timeout.
    pub fn with_timeout(timeout: Duration) -> SolverResult<Self> {
        Self::new(SessionConfig::default().with_timeout(Some(timeout)))
    }
}

impl<E: HornEngine> Z3ChcInterface<E> {
    /// Session over an arbitrary engine implementation.
    pub fn with_engine(config: SessionConfig) -> SolverResult<Self> {
        init_global_params();
        let engine = E::create(&config)?;
        let rule_trace: Option<RuleTrace> = if config.trace_rules {
            Some(Box::new(|rules: &str| {
                debug!(target: "chc_solver::rules", "{}", rules);
            }))
        } else {
            None
        };
        debug!(config = ?config, "created CHC session");
        Ok(Z3ChcInterface {
            config,
            state: SessionState::default(),
            scopes: Vec::new(),
            engine,
            rule_trace,
            last_unknown_reason: None,
            engine_stale: false,
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Number of unmatched `push` calls.
    pub fn scope_depth(&self) -> usize {
        self.scopes.len()
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Reason reported by the engine for the last `Unknown` verdict.
    pub fn last_unknown_reason(&self) -> Option<&str> {
        self.last_unknown_reason.as_deref()
    }

    /// Receive the engine's full rule set before every query.
    pub fn set_rule_trace(&mut self, hook: impl FnMut(&str) + 'static) {
        self.rule_trace = Some(Box::new(hook));
    }

    pub fn clear_rule_trace(&mut self) {
        self.rule_trace = None;
    }

    /// Fresh engine holding the relations and rules recorded in `state`.
    fn replay(&self, state: &SessionState) -> SolverResult<E> {
        let mut engine = E::create(&self.config)?;
        let tr = Translator::new(&state.symbols);
        for name in &state.relations {
            engine.register_relation(tr.relation_decl(name)?.native()?)?;
        }
        for rule in &state.rules {
            engine.add_rule(close_rule(&tr, rule)?.get_z3_ast(), &rule.name)?;
        }
        debug!(
            relations = state.relations.len(),
            rules = state.rules.len(),
            "replayed session into fresh engine"
        );
        Ok(engine)
    }

    /// Rebuild the engine if an earlier fault left it unusable.
    fn ensure_engine(&mut self) -> SolverResult<()> {
        if self.engine_stale {
            self.engine = self.replay(&self.state)?;
            self.engine_stale = false;
        }
        Ok(())
    }

    /// Variables a new rule over `expr` is closed over.
    fn bound_variables(&self, expr: &Expression) -> Vec<String> {
        let free = self.state.symbols.free_variables();
        match self.config.quantification {
            Quantification::Session => free.to_vec(),
            Quantification::Minimal => {
                let used = expr.constants();
                free.iter()
                    .filter(|v| used.contains(v.as_str()))
                    .cloned()
                    .collect()
            }
        }
    }
}

fn close_rule(tr: &Translator<'_>, rule: &Rule) -> SolverResult<Bool> {
    let body = tr.translate_bool(&rule.body, &format!("rule '{}'", rule.name))?;
    tr.forall(&rule.bound, body)
}

impl<E: HornEngine> SolverInterface for Z3ChcInterface<E> {
    fn reset(&mut self) -> SolverResult<()> {
        self.engine = E::create(&self.config)?;
        self.engine_stale = false;
        self.state = SessionState::default();
        self.last_unknown_reason = None;
        debug!(depth = self.scopes.len(), "reset session");
        Ok(())
    }

    fn push(&mut self) {
        self.scopes.push(self.state.clone());
        debug!(depth = self.scopes.len(), "push");
    }

    fn pop(&mut self) -> SolverResult<()> {
        let saved = self.scopes.pop().ok_or(SolverError::ImbalancedScope)?;
        match self.replay(&saved) {
            Ok(engine) => {
                self.engine = engine;
                self.engine_stale = false;
                self.state = saved;
                debug!(depth = self.scopes.len(), "pop");
                Ok(())
            }
            Err(e) => {
                self.scopes.push(saved);
                Err(e)
            }
        }
    }

    fn declare_variable(&mut self, name: &str, sort: &Sort) -> SolverResult<()> {
        if self.state.symbols.declare(name, sort)? {
            debug!(name, sort = %sort, "declared symbol");
        }
        Ok(())
    }

    fn add_assertion(&mut self, expr: &Expression) -> SolverResult<()> {
        let name = format!("assertion_{}", self.state.rules.len());
        self.add_rule(expr, &name)
    }

    fn check(&mut self, goals: &[Expression]) -> SolverResult<(CheckResult, Vec<String>)> {
        match goals {
            [goal] => self.query(goal),
            _ => Err(SolverError::UnsupportedQueryShape { count: goals.len() }),
        }
    }
}

impl<E: HornEngine> ChcSolverInterface for Z3ChcInterface<E> {
    fn register_relation(&mut self, relation: &Expression) -> SolverResult<()> {
        let name = relation
            .symbol_name()
            .ok_or_else(|| SolverError::NotARelation {
                name: relation.to_string(),
            })?;
        let decl = Translator::new(&self.state.symbols).relation_decl(name)?;
        if self.state.relations.iter().any(|r| r == name) {
            return Ok(());
        }
        self.ensure_engine()?;
        self.engine.register_relation(decl.native()?)?;
        self.state.relations.push(name.to_string());
        debug!(name, "registered relation");
        Ok(())
    }

    fn add_rule(&mut self, expr: &Expression, name: &str) -> SolverResult<()> {
        let rule = Rule {
            name: name.to_string(),
            body: expr.clone(),
            bound: self.bound_variables(expr),
        };
        let closed = close_rule(&Translator::new(&self.state.symbols), &rule)?;
        self.ensure_engine()?;
        self.engine.add_rule(closed.get_z3_ast(), name)?;
        debug!(name, bound = rule.bound.len(), rule = %expr, "added rule");
        self.state.rules.push(rule);
        Ok(())
    }

    fn query(&mut self, goal: &Expression) -> SolverResult<(CheckResult, Vec<String>)> {
        self.last_unknown_reason = None;
        let native = {
            let tr = Translator::new(&self.state.symbols);
            let body = tr.translate_bool(goal, "query goal")?;
            // Constants in the goal are existentially quantified.
            let used = goal.constants();
            let occurring: Vec<String> = self
                .state
                .symbols
                .free_variables()
                .iter()
                .filter(|v| used.contains(v.as_str()))
                .cloned()
                .collect();
            tr.exists(&occurring, body)?
        };
        self.ensure_engine()?;

        if let Some(trace) = self.rule_trace.as_mut() {
            trace(&self.engine.dump());
        }

        // TODO: fill with counterexample or invariant data once its format is settled.
        let mut values = Vec::new();
        let result = match self.engine.query(native.get_z3_ast()) {
            Ok(EngineAnswer::Reachable) => CheckResult::Satisfiable,
            Ok(EngineAnswer::Unreachable) => CheckResult::Unsatisfiable,
            Ok(EngineAnswer::Unknown { reason }) => {
                info!(reason = %reason, "query returned unknown");
                self.last_unknown_reason = Some(reason);
                CheckResult::Unknown
            }
            Err(fault) => {
                warn!(error = %fault, "engine failed during query");
                values.clear();
                match self.replay(&self.state) {
                    Ok(engine) => self.engine = engine,
                    Err(e) => {
                        warn!(error = %e, "deferred engine rebuild after fault");
                        self.engine_stale = true;
                    }
                }
                CheckResult::Error
            }
        };
        info!(goal = %goal, result = %result, "query finished");
        Ok((result, values))
    }
}
