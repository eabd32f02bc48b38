//! Integration tests for the CHC session against Z3's fixedpoint engine.
//!
//! Each test builds a small Horn-clause system and asserts the verdict.

use chc_solver::{
    ChcSolverInterface, CheckResult, EngineAnswer, EngineFault, Expression, Fixedpoint,
    HornEngine, Quantification, SessionConfig, SolverError, SolverInterface, SolverResult, Sort,
    Z3ChcInterface,
};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn session() -> Z3ChcInterface {
    init_tracing();
    Z3ChcInterface::new(SessionConfig::default()).unwrap()
}

fn x() -> Expression {
    Expression::constant("x")
}

fn inv(arg: Expression) -> Expression {
    Expression::call("Inv", vec![arg])
}

/// `x = 0 -> Inv(x)` and `Inv(x) & x < 10 -> Inv(x + 1)`.
fn counter_system(s: &mut impl ChcSolverInterface) {
    s.declare_variable("x", &Sort::Int).unwrap();
    s.declare_variable("Inv", &Sort::relation(vec![Sort::Int])).unwrap();
    s.register_relation(&Expression::constant("Inv")).unwrap();
    s.add_rule(&x().equals(Expression::from(0)).implies(inv(x())), "init").unwrap();
    s.add_rule(
        &Expression::and(vec![inv(x()), x().lt(Expression::from(10))]).implies(inv(x() + 1)),
        "step",
    )
    .unwrap();
}

// ============================================================================
// Verdicts
// ============================================================================

#[test]
fn false_goal_on_empty_rule_set_is_unsat() {
    let mut s = session();
    let (result, values) = s.check(&[Expression::from(false)]).unwrap();
    assert_eq!(result, CheckResult::Unsatisfiable);
    assert!(values.is_empty());
}

#[test]
fn fact_makes_goal_sat() {
    let mut s = session();
    s.declare_variable("R", &Sort::relation(vec![])).unwrap();
    s.register_relation(&Expression::constant("R")).unwrap();
    s.add_rule(
        &Expression::from(true).implies(Expression::constant("R")),
        "fact",
    )
    .unwrap();
    let (result, values) = s.check(&[Expression::constant("R")]).unwrap();
    assert_eq!(result, CheckResult::Satisfiable);
    assert!(values.is_empty());
}

#[test]
fn unreachable_relation_is_unsat() {
    let mut s = session();
    s.declare_variable("R", &Sort::relation(vec![])).unwrap();
    s.register_relation(&Expression::constant("R")).unwrap();
    let (result, _) = s.query(&Expression::constant("R")).unwrap();
    assert_eq!(result, CheckResult::Unsatisfiable);
}

#[test]
fn counter_never_exceeds_bound() {
    let mut s = session();
    counter_system(&mut s);
    let goal = Expression::and(vec![inv(x()), x().gt(Expression::from(10))]);
    let (result, _) = s.query(&goal).unwrap();
    assert_eq!(result, CheckResult::Unsatisfiable);
}

#[test]
fn counter_reaches_intermediate_value() {
    let mut s = session();
    counter_system(&mut s);
    let goal = Expression::and(vec![inv(x()), x().equals(Expression::from(5))]);
    let (result, values) = s.query(&goal).unwrap();
    assert_eq!(result, CheckResult::Satisfiable);
    assert!(values.is_empty());
}

#[test]
fn error_relation_query() {
    // Inv(x) & x > 10 -> Err, queried through a nullary error relation.
    let mut s = session();
    counter_system(&mut s);
    s.declare_variable("Err", &Sort::relation(vec![])).unwrap();
    s.register_relation(&Expression::constant("Err")).unwrap();
    s.add_rule(
        &Expression::and(vec![inv(x()), x().gt(Expression::from(10))])
            .implies(Expression::constant("Err")),
        "error",
    )
    .unwrap();
    let (result, _) = s.check(&[Expression::constant("Err")]).unwrap();
    assert_eq!(result, CheckResult::Unsatisfiable);
}

#[test]
fn bitvector_and_array_rules() {
    let mut s = session();
    s.declare_variable("w", &Sort::BitVector(8)).unwrap();
    s.declare_variable("m", &Sort::array(Sort::Int, Sort::Int)).unwrap();
    s.declare_variable("P", &Sort::relation(vec![Sort::BitVector(8)])).unwrap();
    s.declare_variable("Q", &Sort::relation(vec![Sort::array(Sort::Int, Sort::Int)])).unwrap();
    s.register_relation(&Expression::constant("P")).unwrap();
    s.register_relation(&Expression::constant("Q")).unwrap();
    let w = Expression::constant("w");
    let m = Expression::constant("m");
    s.add_rule(
        &w.clone()
            .equals(Expression::bv(200, 8))
            .implies(Expression::call("P", vec![w.clone()])),
        "p_init",
    )
    .unwrap();
    s.add_rule(
        &m.clone()
            .select(Expression::from(0))
            .equals(Expression::from(7))
            .implies(Expression::call("Q", vec![m.clone()])),
        "q_init",
    )
    .unwrap();

    let overflow = Expression::and(vec![
        Expression::call("P", vec![w.clone()]),
        Expression::app(chc_solver::Op::BvUlt, vec![w, Expression::bv(100, 8)]),
    ]);
    assert_eq!(s.query(&overflow).unwrap().0, CheckResult::Unsatisfiable);

    let stored = Expression::and(vec![
        Expression::call("Q", vec![m.clone()]),
        m.select(Expression::from(0)).equals(Expression::from(7)),
    ]);
    assert_eq!(s.query(&stored).unwrap().0, CheckResult::Satisfiable);
}

// ============================================================================
// Contract violations
// ============================================================================

#[test]
fn two_goals_are_rejected() {
    let mut s = session();
    let err = s
        .check(&[Expression::from(false), Expression::from(true)])
        .unwrap_err();
    assert_eq!(err, SolverError::UnsupportedQueryShape { count: 2 });
    let err = s.check(&[]).unwrap_err();
    assert_eq!(err, SolverError::UnsupportedQueryShape { count: 0 });
}

#[test]
fn pop_without_push_fails_and_keeps_state() {
    let mut s = session();
    counter_system(&mut s);
    let before = s.state().clone();
    assert_eq!(s.pop().unwrap_err(), SolverError::ImbalancedScope);
    assert_eq!(s.state(), &before);
    let goal = Expression::and(vec![inv(x()), x().equals(Expression::from(5))]);
    assert_eq!(s.query(&goal).unwrap().0, CheckResult::Satisfiable);
}

#[test]
fn reset_forgets_relations() {
    let mut s = session();
    counter_system(&mut s);
    s.push();
    s.reset().unwrap();
    assert_eq!(s.scope_depth(), 1);
    assert!(s.state().symbols().is_empty());
    let err = s.query(&inv(Expression::from(0))).unwrap_err();
    assert_eq!(err, SolverError::UndeclaredSymbol { name: "Inv".into() });
}

#[test]
fn register_requires_declared_relation() {
    let mut s = session();
    let err = s.register_relation(&Expression::constant("R")).unwrap_err();
    assert_eq!(err, SolverError::UndeclaredSymbol { name: "R".into() });

    s.declare_variable("x", &Sort::Int).unwrap();
    let err = s.register_relation(&x()).unwrap_err();
    assert_eq!(err, SolverError::NotARelation { name: "x".into() });

    let err = s.register_relation(&Expression::from(1)).unwrap_err();
    assert!(matches!(err, SolverError::NotARelation { .. }));
}

#[test]
fn conflicting_redeclaration_fails() {
    let mut s = session();
    s.declare_variable("x", &Sort::Int).unwrap();
    s.declare_variable("x", &Sort::Int).unwrap();
    let err = s.declare_variable("x", &Sort::Bool).unwrap_err();
    assert!(matches!(err, SolverError::SortConflict { .. }));
    assert_eq!(s.state().symbols().free_variables(), ["x".to_string()]);
}

#[test]
fn non_boolean_goal_is_a_sort_mismatch() {
    let mut s = session();
    s.declare_variable("x", &Sort::Int).unwrap();
    let err = s.query(&(x() + 1)).unwrap_err();
    assert!(matches!(err, SolverError::SortMismatch { .. }), "{err}");
}

// ============================================================================
// Quantification
// ============================================================================

#[test]
fn later_declarations_are_not_bound_retroactively() {
    let mut s = session();
    s.declare_variable("x", &Sort::Int).unwrap();
    s.declare_variable("Inv", &Sort::relation(vec![Sort::Int])).unwrap();
    s.register_relation(&Expression::constant("Inv")).unwrap();
    s.add_rule(&x().equals(Expression::from(0)).implies(inv(x())), "init").unwrap();
    s.declare_variable("y", &Sort::Int).unwrap();
    s.add_rule(
        &inv(Expression::constant("y")).implies(inv(Expression::constant("y") + 2)),
        "step",
    )
    .unwrap();

    let rules = s.state().rules();
    assert_eq!(rules[0].bound, ["x".to_string()]);
    assert_eq!(rules[1].bound, ["x".to_string(), "y".to_string()]);
    assert_eq!(s.state().symbols().free_variables().len(), 2);
}

#[test]
fn relations_are_never_bound() {
    let mut s = session();
    s.declare_variable("R", &Sort::relation(vec![])).unwrap();
    s.declare_variable("f", &Sort::function(vec![Sort::Int], Sort::Int)).unwrap();
    s.register_relation(&Expression::constant("R")).unwrap();
    s.add_rule(&Expression::constant("R"), "fact").unwrap();
    assert!(s.state().symbols().free_variables().is_empty());
    assert!(s.state().rules()[0].bound.is_empty());
}

#[test]
fn minimal_quantification_agrees_with_session_quantification() {
    init_tracing();
    let mut s = Z3ChcInterface::new(
        SessionConfig::default().with_quantification(Quantification::Minimal),
    )
    .unwrap();
    s.declare_variable("unused", &Sort::Bool).unwrap();
    counter_system(&mut s);
    assert_eq!(s.state().rules()[0].bound, ["x".to_string()]);

    let goal = Expression::and(vec![inv(x()), x().gt(Expression::from(10))]);
    assert_eq!(s.query(&goal).unwrap().0, CheckResult::Unsatisfiable);
    let goal = Expression::and(vec![inv(x()), x().equals(Expression::from(10))]);
    assert_eq!(s.query(&goal).unwrap().0, CheckResult::Satisfiable);
}

// ============================================================================
// Scopes
// ============================================================================

#[test]
fn pop_restores_rules_and_verdicts() {
    let mut s = session();
    counter_system(&mut s);
    let goal = Expression::and(vec![inv(x()), x().gt(Expression::from(10))]);
    let before = s.state().clone();

    s.push();
    s.declare_variable("z", &Sort::Int).unwrap();
    s.add_rule(
        &Expression::constant("z")
            .equals(Expression::from(42))
            .implies(inv(Expression::constant("z"))),
        "jump",
    )
    .unwrap();
    assert_eq!(s.query(&goal).unwrap().0, CheckResult::Satisfiable);

    s.pop().unwrap();
    assert_eq!(s.state(), &before);
    assert_eq!(s.scope_depth(), 0);
    assert_eq!(s.query(&goal).unwrap().0, CheckResult::Unsatisfiable);
}

#[test]
fn nested_scopes_unwind_in_order() {
    let mut s = session();
    s.declare_variable("R", &Sort::relation(vec![])).unwrap();
    s.register_relation(&Expression::constant("R")).unwrap();
    let empty = s.state().clone();

    s.push();
    s.add_rule(&Expression::constant("R"), "fact").unwrap();
    let with_fact = s.state().clone();
    s.push();
    s.declare_variable("S", &Sort::relation(vec![])).unwrap();
    s.register_relation(&Expression::constant("S")).unwrap();
    assert_eq!(s.scope_depth(), 2);

    s.pop().unwrap();
    assert_eq!(s.state(), &with_fact);
    assert_eq!(s.query(&Expression::constant("R")).unwrap().0, CheckResult::Satisfiable);
    s.pop().unwrap();
    assert_eq!(s.state(), &empty);
    assert_eq!(s.query(&Expression::constant("R")).unwrap().0, CheckResult::Unsatisfiable);
    assert_eq!(s.pop().unwrap_err(), SolverError::ImbalancedScope);
}

// ============================================================================
// Rule tracing
// ============================================================================

#[test]
fn rule_trace_sees_rule_set_before_query() {
    let mut s = session();
    let dumps = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&dumps);
    s.set_rule_trace(move |rules| sink.borrow_mut().push(rules.to_string()));
    counter_system(&mut s);
    s.query(&inv(Expression::from(3))).unwrap();
    s.query(&inv(Expression::from(4))).unwrap();
    assert_eq!(dumps.borrow().len(), 2);
    assert!(dumps.borrow()[0].contains("Inv"));

    s.clear_rule_trace();
    s.query(&inv(Expression::from(5))).unwrap();
    assert_eq!(dumps.borrow().len(), 2);
}

#[test]
fn config_rule_trace_does_not_change_verdicts() {
    init_tracing();
    let mut s = Z3ChcInterface::new(SessionConfig::default().with_rule_trace(true)).unwrap();
    counter_system(&mut s);
    assert_eq!(
        s.query(&inv(Expression::from(11))).unwrap().0,
        CheckResult::Unsatisfiable
    );
}

// ============================================================================
// Engine faults
// ============================================================================

thread_local! {
    static FAIL_NEXT_QUERY: Cell<bool> = const { Cell::new(false) };
    static GIVE_UP_NEXT_QUERY: Cell<bool> = const { Cell::new(false) };
    static FAIL_NEXT_CREATE: Cell<bool> = const { Cell::new(false) };
}

/// Fixedpoint engine that fails to start, fails a query or gives up on request.
struct FaultyEngine(Fixedpoint);

impl HornEngine for FaultyEngine {
    fn create(config: &SessionConfig) -> SolverResult<Self> {
        if FAIL_NEXT_CREATE.with(|f| f.replace(false)) {
            return Err(SolverError::Z3("injected create failure".into()));
        }
        Ok(FaultyEngine(Fixedpoint::create(config)?))
    }

    fn register_relation(&mut self, decl: z3_sys::Z3_func_decl) -> SolverResult<()> {
        self.0.register_relation(decl)
    }

    fn add_rule(&mut self, rule: z3_sys::Z3_ast, name: &str) -> SolverResult<()> {
        self.0.add_rule(rule, name)
    }

    fn query(&mut self, goal: z3_sys::Z3_ast) -> Result<EngineAnswer, EngineFault> {
        if FAIL_NEXT_QUERY.with(|f| f.replace(false)) {
            return Err(EngineFault::new("injected fault"));
        }
        if GIVE_UP_NEXT_QUERY.with(|f| f.replace(false)) {
            return Ok(EngineAnswer::Unknown {
                reason: "timeout".into(),
            });
        }
        self.0.query(goal)
    }

    fn dump(&self) -> String {
        self.0.dump()
    }
}

#[test]
fn engine_fault_yields_error_and_session_survives() {
    init_tracing();
    let mut s = Z3ChcInterface::<FaultyEngine>::with_engine(SessionConfig::default()).unwrap();
    counter_system(&mut s);
    let before = s.state().clone();
    let goal = Expression::and(vec![inv(x()), x().equals(Expression::from(5))]);

    FAIL_NEXT_QUERY.with(|f| f.set(true));
    let (result, values) = s.query(&goal).unwrap();
    assert_eq!(result, CheckResult::Error);
    assert!(values.is_empty());
    assert!(!result.is_conclusive());
    assert_eq!(s.state(), &before);

    let (result, _) = s.query(&goal).unwrap();
    assert_eq!(result, CheckResult::Satisfiable);
}

#[test]
fn native_engine_fault_yields_error_and_session_survives() {
    let mut s = session();
    counter_system(&mut s);
    s.declare_variable("Low", &Sort::relation(vec![Sort::Int])).unwrap();
    s.register_relation(&Expression::constant("Low")).unwrap();
    let before = s.state().clone();

    s.push();
    // Spacer rejects negated relations in rule bodies once the query runs.
    let negated = Expression::and(vec![!inv(x()), x().equals(Expression::from(-1))]);
    s.add_rule(&negated.implies(Expression::call("Low", vec![x()])), "negated").unwrap();
    let pushed = s.state().clone();
    let goal = Expression::call("Low", vec![Expression::from(-1)]);
    let (result, values) = s.query(&goal).unwrap();
    assert_eq!(result, CheckResult::Error);
    assert!(values.is_empty());
    assert_eq!(s.state(), &pushed);

    s.pop().unwrap();
    assert_eq!(s.state(), &before);
    let goal = Expression::and(vec![inv(x()), x().equals(Expression::from(5))]);
    assert_eq!(s.query(&goal).unwrap().0, CheckResult::Satisfiable);
}

#[test]
fn failed_pop_keeps_scope_and_engine() {
    init_tracing();
    let mut s = Z3ChcInterface::<FaultyEngine>::with_engine(SessionConfig::default()).unwrap();
    counter_system(&mut s);
    s.push();
    s.add_rule(&inv(Expression::from(50)), "jump").unwrap();
    let pushed = s.state().clone();

    FAIL_NEXT_CREATE.with(|f| f.set(true));
    assert!(matches!(s.pop().unwrap_err(), SolverError::Z3(_)));
    assert_eq!(s.scope_depth(), 1);
    assert_eq!(s.state(), &pushed);
    assert_eq!(s.query(&inv(Expression::from(50))).unwrap().0, CheckResult::Satisfiable);

    FAIL_NEXT_CREATE.with(|f| f.set(true));
    assert!(matches!(s.reset().unwrap_err(), SolverError::Z3(_)));
    assert_eq!(s.state(), &pushed);

    s.pop().unwrap();
    assert_eq!(s.scope_depth(), 0);
    assert_eq!(s.query(&inv(Expression::from(50))).unwrap().0, CheckResult::Unsatisfiable);
}

#[test]
fn failed_recovery_is_retried_on_next_use() {
    init_tracing();
    let mut s = Z3ChcInterface::<FaultyEngine>::with_engine(SessionConfig::default()).unwrap();
    counter_system(&mut s);
    let goal = Expression::and(vec![inv(x()), x().equals(Expression::from(5))]);

    FAIL_NEXT_QUERY.with(|f| f.set(true));
    FAIL_NEXT_CREATE.with(|f| f.set(true));
    let (result, values) = s.query(&goal).unwrap();
    assert_eq!(result, CheckResult::Error);
    assert!(values.is_empty());

    assert_eq!(s.query(&goal).unwrap().0, CheckResult::Satisfiable);
}

#[test]
fn engine_giving_up_is_unknown() {
    init_tracing();
    let mut s = Z3ChcInterface::<FaultyEngine>::with_engine(SessionConfig::default()).unwrap();
    counter_system(&mut s);
    let goal = inv(Expression::from(11));

    GIVE_UP_NEXT_QUERY.with(|f| f.set(true));
    let (result, values) = s.query(&goal).unwrap();
    assert_eq!(result, CheckResult::Unknown);
    assert!(values.is_empty());
    assert_eq!(s.last_unknown_reason(), Some("timeout"));

    let (result, _) = s.query(&goal).unwrap();
    assert_eq!(result, CheckResult::Unsatisfiable);
    assert_eq!(s.last_unknown_reason(), None);
}

#[test]
fn translation_errors_do_not_reach_engine() {
    init_tracing();
    let mut s = Z3ChcInterface::<FaultyEngine>::with_engine(SessionConfig::default()).unwrap();
    FAIL_NEXT_QUERY.with(|f| f.set(true));
    let err = s.query(&Expression::constant("missing")).unwrap_err();
    assert_eq!(err, SolverError::UndeclaredSymbol { name: "missing".into() });
    // The armed fault is still pending because the engine was never asked.
    assert!(FAIL_NEXT_QUERY.with(|f| f.get()));
}

#[test]
fn repeated_construction_keeps_global_params() {
    let _a = session();
    let _b = session();
    assert!(chc_solver::global_params_initialized());
}
