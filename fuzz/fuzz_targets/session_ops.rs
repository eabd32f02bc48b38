#![no_main]
use chc_expr::{Expression, Sort};
use chc_solver::{ChcSolverInterface, SessionConfig, SolverInterface, Z3ChcInterface};
use libfuzzer_sys::fuzz_target;
use std::time::Duration;

const NAMES: [&str; 4] = ["x", "y", "R", "S"];

fn sort(b: u8) -> Sort {
    match b % 4 {
        0 => Sort::Int,
        1 => Sort::Bool,
        2 => Sort::relation(vec![]),
        _ => Sort::relation(vec![Sort::Int]),
    }
}

fn term(b: u8) -> Expression {
    let name = NAMES[(b % 4) as usize];
    match b / 4 % 4 {
        0 => Expression::constant(name),
        1 => Expression::call(name, vec![Expression::constant("x")]),
        2 => Expression::constant("x").lt(Expression::from(i64::from(b))),
        _ => Expression::from(b % 2 == 0),
    }
}

fuzz_target!(|data: &[u8]| {
    let config = SessionConfig::default().with_timeout(Some(Duration::from_millis(200)));
    let Ok(mut s) = Z3ChcInterface::new(config) else {
        return;
    };
    for chunk in data.chunks(3).take(32) {
        let &[op, a, b] = chunk else { break };
        let _ = match op % 7 {
            0 => s.declare_variable(NAMES[(a % 4) as usize], &sort(b)),
            1 => s.register_relation(&term(a)),
            2 => s.add_rule(&term(a).implies(term(b)), "rule"),
            3 => s.query(&term(a)).map(|_| ()),
            4 => {
                s.push();
                Ok(())
            }
            5 => s.pop(),
            _ => s.reset(),
        };
    }
});
