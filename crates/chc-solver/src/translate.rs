//! Expression translator: maps `Expression` trees to Z3 terms.
//!
//! Translation is checked against the session's symbol table: every name must
//! be declared, function applications must match the declared arity and
//! argument sorts, and operator operands must have the sorts the operator
//! expects. Terms are built with the reference-counted `z3::ast` types; raw
//! handles are only taken where the fixedpoint API needs them.

use crate::symbols::SymbolTable;
use crate::{SolverError, SolverResult};
use chc_expr::{Expression, Op, Sort};
use z3::ast::{self, Array, Ast, Bool, Dynamic, Int, BV};
use z3::{Context, FuncDecl};

/// A translated term together with its sort.
#[derive(Debug, Clone)]
pub struct Translated {
    pub ast: Dynamic,
    pub sort: Sort,
}

impl Translated {
    fn new(ast: Dynamic, sort: Sort) -> Self {
        Translated { ast, sort }
    }

    fn boolean(ast: Bool) -> Self {
        Translated::new(Dynamic::from_ast(&ast), Sort::Bool)
    }

    fn int(ast: Int) -> Self {
        Translated::new(Dynamic::from_ast(&ast), Sort::Int)
    }

    fn as_term(&self) -> Term<'_> {
        Term {
            ast: &self.ast,
            sort: &self.sort,
        }
    }
}

/// Borrowed view of an operand during operator translation.
#[derive(Debug, Clone, Copy)]
struct Term<'t> {
    ast: &'t Dynamic,
    sort: &'t Sort,
}

impl Term<'_> {
    fn bool(&self) -> SolverResult<Bool> {
        self.ast.as_bool().ok_or_else(|| self.native_mismatch())
    }

    fn int(&self) -> SolverResult<Int> {
        self.ast.as_int().ok_or_else(|| self.native_mismatch())
    }

    fn bv(&self) -> SolverResult<BV> {
        self.ast.as_bv().ok_or_else(|| self.native_mismatch())
    }

    fn array(&self) -> SolverResult<Array> {
        self.ast.as_array().ok_or_else(|| self.native_mismatch())
    }

    fn native_mismatch(&self) -> SolverError {
        SolverError::Z3(format!("native term {} is not of sort {}", self.ast, self.sort))
    }
}

/// A relation applied to placeholder arguments.
///
/// The application keeps the native declaration alive for as long as this
/// value lives.
pub struct RelationDecl {
    app: Dynamic,
}

impl RelationDecl {
    /// Raw declaration handle for the fixedpoint API.
    pub fn native(&self) -> SolverResult<z3_sys::Z3_func_decl> {
        let ctx = Context::thread_local().get_z3_context();
        let app = unsafe { z3_sys::Z3_to_app(ctx, self.app.get_z3_ast()) }
            .ok_or_else(|| SolverError::Z3(format!("{} is not an application", self.app)))?;
        unsafe { z3_sys::Z3_get_app_decl(ctx, app) }
            .ok_or_else(|| SolverError::Z3(format!("no declaration for {}", self.app)))
    }
}

/// Translates expressions against a fixed symbol table.
pub struct Translator<'a> {
    symbols: &'a SymbolTable,
}

impl<'a> Translator<'a> {
    pub fn new(symbols: &'a SymbolTable) -> Self {
        Translator { symbols }
    }

    /// Translate an expression of any sort.
    pub fn translate(&self, expr: &Expression) -> SolverResult<Translated> {
        match expr {
            Expression::Bool(b) => Ok(Translated::boolean(Bool::from_bool(*b))),
            Expression::Int(n) => Ok(Translated::int(int_literal(*n))),
            Expression::BitVec { value, width } => {
                check_bv_literal(expr, *value, *width)?;
                let ast = Dynamic::from_ast(&bv_literal(*value, *width));
                Ok(Translated::new(ast, Sort::BitVector(*width)))
            }
            Expression::Const(name) => {
                let sort = self.symbols.sort_of(name)?;
                match sort {
                    Sort::Function { domain, codomain } => {
                        if !domain.is_empty() {
                            return Err(arity_mismatch(name, domain.len(), 0));
                        }
                        let decl = func_decl(name, domain, codomain)?;
                        Ok(Translated::new(decl.apply(&[]), (**codomain).clone()))
                    }
                    _ => Ok(Translated::new(self.constant(name)?, sort.clone())),
                }
            }
            Expression::Call { name, args } => self.translate_call(name, args),
            Expression::App { op, args } => self.translate_app(*op, args),
        }
    }

    /// Translate an expression that must be Boolean (rules and goals).
    pub fn translate_bool(&self, expr: &Expression, context: &str) -> SolverResult<Bool> {
        let t = self.translate(expr)?;
        if t.sort != Sort::Bool {
            return Err(SolverError::SortMismatch {
                context: context.to_string(),
                expected: Sort::Bool.to_string(),
                found: t.sort.to_string(),
            });
        }
        t.as_term().bool()
    }

    /// Constant for a declared non-function symbol.
    pub fn constant(&self, name: &str) -> SolverResult<Dynamic> {
        native_const(name, self.symbols.sort_of(name)?)
    }

    /// Declaration of the relation `name`.
    pub fn relation_decl(&self, name: &str) -> SolverResult<RelationDecl> {
        match self.symbols.relation_sort(name)? {
            Sort::Function { domain, codomain } => {
                let decl = func_decl(name, domain, codomain)?;
                let placeholders = domain
                    .iter()
                    .enumerate()
                    .map(|(i, sort)| native_const(&format!("{}!{}", name, i), sort))
                    .collect::<SolverResult<Vec<_>>>()?;
                let args: Vec<&dyn Ast> = placeholders.iter().map(|a| a as &dyn Ast).collect();
                Ok(RelationDecl {
                    app: decl.apply(&args),
                })
            }
            _ => Err(SolverError::NotARelation {
                name: name.to_string(),
            }),
        }
    }

    /// Universally close `body` over the named constants.
    ///
    /// With no bound variables the body is returned unchanged.
    pub fn forall(&self, bound: &[String], body: Bool) -> SolverResult<Bool> {
        self.quantify(true, bound, body)
    }

    /// Existentially close `body` over the named constants.
    pub fn exists(&self, bound: &[String], body: Bool) -> SolverResult<Bool> {
        self.quantify(false, bound, body)
    }

    fn quantify(&self, universal: bool, bound: &[String], body: Bool) -> SolverResult<Bool> {
        if bound.is_empty() {
            return Ok(body);
        }
        let consts = bound
            .iter()
            .map(|name| self.constant(name))
            .collect::<SolverResult<Vec<_>>>()?;
        let vars: Vec<&dyn Ast> = consts.iter().map(|c| c as &dyn Ast).collect();
        Ok(if universal {
            ast::forall_const(&vars, &[], &body)
        } else {
            ast::exists_const(&vars, &[], &body)
        })
    }

    fn translate_call(&self, name: &str, args: &[Expression]) -> SolverResult<Translated> {
        let sort = self.symbols.sort_of(name)?;
        let Sort::Function { domain, codomain } = sort else {
            return Err(SolverError::SortMismatch {
                context: format!("application of '{}'", name),
                expected: "function or relation".into(),
                found: sort.to_string(),
            });
        };
        if domain.len() != args.len() {
            return Err(arity_mismatch(name, domain.len(), args.len()));
        }
        let mut operands = Vec::with_capacity(args.len());
        for (i, (arg, expected)) in args.iter().zip(domain).enumerate() {
            let t = self.translate(arg)?;
            if &t.sort != expected {
                return Err(SolverError::SortMismatch {
                    context: format!("argument {} of '{}'", i + 1, name),
                    expected: expected.to_string(),
                    found: t.sort.to_string(),
                });
            }
            operands.push(t.ast);
        }
        let decl = func_decl(name, domain, codomain)?;
        let refs: Vec<&dyn Ast> = operands.iter().map(|a| a as &dyn Ast).collect();
        Ok(Translated::new(decl.apply(&refs), (**codomain).clone()))
    }

    fn translate_app(&self, op: Op, args: &[Expression]) -> SolverResult<Translated> {
        let owned = args
            .iter()
            .map(|a| self.translate(a))
            .collect::<SolverResult<Vec<_>>>()?;
        let terms: Vec<Term<'_>> = owned.iter().map(Translated::as_term).collect();

        match op {
            Op::Not => {
                expect_arity(op, &terms, 1)?;
                expect_all(op, &terms, &Sort::Bool)?;
                Ok(Translated::boolean(terms[0].bool()?.not()))
            }
            Op::And | Op::Or => {
                expect_all(op, &terms, &Sort::Bool)?;
                let operands = terms.iter().map(Term::bool).collect::<SolverResult<Vec<_>>>()?;
                let ast = match (op, operands.len()) {
                    (Op::And, 0) => Bool::from_bool(true),
                    (_, 0) => Bool::from_bool(false),
                    (_, 1) => operands[0].clone(),
                    (Op::And, _) => Bool::and(&operands),
                    _ => Bool::or(&operands),
                };
                Ok(Translated::boolean(ast))
            }
            Op::Implies => {
                expect_arity(op, &terms, 2)?;
                expect_all(op, &terms, &Sort::Bool)?;
                Ok(Translated::boolean(terms[0].bool()?.implies(&terms[1].bool()?)))
            }
            Op::Eq => {
                expect_arity(op, &terms, 2)?;
                common_sort(op, &terms)?;
                Ok(Translated::boolean(terms[0].ast.eq(terms[1].ast)))
            }
            Op::Distinct => {
                expect_min_arity(op, &terms, 2)?;
                common_sort(op, &terms)?;
                let mut pairs = Vec::new();
                for (i, a) in terms.iter().enumerate() {
                    for b in &terms[i + 1..] {
                        pairs.push(a.ast.eq(b.ast).not());
                    }
                }
                Ok(Translated::boolean(Bool::and(&pairs)))
            }
            Op::Ite => {
                expect_arity(op, &terms, 3)?;
                expect_all(op, &terms[..1], &Sort::Bool)?;
                let sort = common_sort(op, &terms[1..])?;
                let ast = terms[0].bool()?.ite(terms[1].ast, terms[2].ast);
                Ok(Translated::new(ast, sort))
            }
            Op::Add | Op::Mul | Op::Sub => {
                expect_min_arity(op, &terms, if op == Op::Sub { 2 } else { 1 })?;
                expect_all(op, &terms, &Sort::Int)?;
                let ints = terms.iter().map(Term::int).collect::<SolverResult<Vec<_>>>()?;
                let ast = match op {
                    Op::Add => Int::add(&ints),
                    Op::Mul => Int::mul(&ints),
                    _ => Int::sub(&ints),
                };
                Ok(Translated::int(ast))
            }
            Op::Neg => {
                expect_arity(op, &terms, 1)?;
                expect_all(op, &terms, &Sort::Int)?;
                Ok(Translated::int(terms[0].int()?.unary_minus()))
            }
            Op::Div | Op::Mod => {
                expect_arity(op, &terms, 2)?;
                expect_all(op, &terms, &Sort::Int)?;
                let (a, b) = (terms[0].int()?, terms[1].int()?);
                let ast = if op == Op::Div { a.div(&b) } else { a.modulo(&b) };
                Ok(Translated::int(ast))
            }
            Op::Lt | Op::Le | Op::Gt | Op::Ge => {
                expect_arity(op, &terms, 2)?;
                expect_all(op, &terms, &Sort::Int)?;
                let (a, b) = (terms[0].int()?, terms[1].int()?);
                let ast = match op {
                    Op::Lt => a.lt(&b),
                    Op::Le => a.le(&b),
                    Op::Gt => a.gt(&b),
                    _ => a.ge(&b),
                };
                Ok(Translated::boolean(ast))
            }
            Op::BvNot => {
                expect_arity(op, &terms, 1)?;
                let sort = bv_sort(op, &terms)?;
                let ast = terms[0].bv()?.bvnot();
                Ok(Translated::new(Dynamic::from_ast(&ast), sort))
            }
            Op::BvAnd
            | Op::BvOr
            | Op::BvXor
            | Op::BvAdd
            | Op::BvSub
            | Op::BvMul
            | Op::BvUdiv
            | Op::BvShl
            | Op::BvLshr => {
                expect_arity(op, &terms, 2)?;
                let sort = bv_sort(op, &terms)?;
                let (a, b) = (terms[0].bv()?, terms[1].bv()?);
                let ast = match op {
                    Op::BvAnd => a.bvand(&b),
                    Op::BvOr => a.bvor(&b),
                    Op::BvXor => a.bvxor(&b),
                    Op::BvAdd => a.bvadd(&b),
                    Op::BvSub => a.bvsub(&b),
                    Op::BvMul => a.bvmul(&b),
                    Op::BvUdiv => a.bvudiv(&b),
                    Op::BvShl => a.bvshl(&b),
                    _ => a.bvlshr(&b),
                };
                Ok(Translated::new(Dynamic::from_ast(&ast), sort))
            }
            Op::BvUlt | Op::BvUle | Op::BvSlt | Op::BvSle => {
                expect_arity(op, &terms, 2)?;
                bv_sort(op, &terms)?;
                let (a, b) = (terms[0].bv()?, terms[1].bv()?);
                let ast = match op {
                    Op::BvUlt => a.bvult(&b),
                    Op::BvUle => a.bvule(&b),
                    Op::BvSlt => a.bvslt(&b),
                    _ => a.bvsle(&b),
                };
                Ok(Translated::boolean(ast))
            }
            Op::Select => {
                expect_arity(op, &terms, 2)?;
                let (domain, range) = array_parts(op, &terms[0])?;
                expect_operand(op, &terms[1], domain)?;
                let ast = terms[0].array()?.select(terms[1].ast);
                Ok(Translated::new(ast, range.clone()))
            }
            Op::Store => {
                expect_arity(op, &terms, 3)?;
                let (domain, range) = array_parts(op, &terms[0])?;
                expect_operand(op, &terms[1], domain)?;
                expect_operand(op, &terms[2], range)?;
                let ast = terms[0].array()?.store(terms[1].ast, terms[2].ast);
                Ok(Translated::new(Dynamic::from_ast(&ast), terms[0].sort.clone()))
            }
        }
    }
}

// === Native construction ===

/// Native sort for a first-order sort.
pub fn native_sort(sort: &Sort) -> SolverResult<z3::Sort> {
    match sort {
        Sort::Bool => Ok(z3::Sort::bool()),
        Sort::Int => Ok(z3::Sort::int()),
        Sort::BitVector(w) => Ok(z3::Sort::bitvector(*w)),
        Sort::Array { domain, range } => {
            Ok(z3::Sort::array(&native_sort(domain)?, &native_sort(range)?))
        }
        Sort::Function { .. } => Err(SolverError::SortMismatch {
            context: "sort translation".into(),
            expected: "first-order sort".into(),
            found: sort.to_string(),
        }),
    }
}

fn native_const(name: &str, sort: &Sort) -> SolverResult<Dynamic> {
    let ast = match sort {
        Sort::Bool => Dynamic::from_ast(&Bool::new_const(name)),
        Sort::Int => Dynamic::from_ast(&Int::new_const(name)),
        Sort::BitVector(w) => Dynamic::from_ast(&BV::new_const(name, *w)),
        Sort::Array { domain, range } => {
            let array = Array::new_const(name, &native_sort(domain)?, &native_sort(range)?);
            Dynamic::from_ast(&array)
        }
        Sort::Function { .. } => {
            return Err(SolverError::SortMismatch {
                context: format!("constant '{}'", name),
                expected: "first-order sort".into(),
                found: sort.to_string(),
            })
        }
    };
    Ok(ast)
}

fn func_decl(name: &str, domain: &[Sort], codomain: &Sort) -> SolverResult<FuncDecl> {
    let sorts = domain
        .iter()
        .map(native_sort)
        .collect::<SolverResult<Vec<_>>>()?;
    let refs: Vec<&z3::Sort> = sorts.iter().collect();
    Ok(FuncDecl::new(name, &refs, &native_sort(codomain)?))
}

/// Integer literal of any `i128` value, assembled from 64-bit halves when needed.
fn int_literal(n: i128) -> Int {
    if let Ok(small) = i64::try_from(n) {
        return Int::from_i64(small);
    }
    // n = hi * 2^64 + lo
    let hi = (n >> 64) as i64;
    let lo = n as u64;
    let half = Int::from_u64(1 << 32);
    Int::add(&[
        Int::mul(&[Int::from_i64(hi), half.clone(), half]),
        Int::from_u64(lo),
    ])
}

fn check_bv_literal(expr: &Expression, value: u128, width: u32) -> SolverResult<()> {
    let found = if width == 0 {
        "width 0".to_string()
    } else if width < 128 && value >> width != 0 {
        format!("value {} wider than {} bits", value, width)
    } else {
        return Ok(());
    };
    Err(SolverError::SortMismatch {
        context: format!("bitvector literal {}", expr),
        expected: "positive width holding the value".into(),
        found,
    })
}

fn bv_literal(value: u128, width: u32) -> BV {
    if width <= 64 {
        return BV::from_u64(value as u64, width);
    }
    let hi = BV::from_u64((value >> 64) as u64, width - 64);
    hi.concat(&BV::from_u64(value as u64, 64))
}

// === Sort checks ===

fn arity_mismatch(name: &str, expected: usize, found: usize) -> SolverError {
    SolverError::SortMismatch {
        context: format!("application of '{}'", name),
        expected: format!("{} arguments", expected),
        found: format!("{} arguments", found),
    }
}

fn expect_arity(op: Op, terms: &[Term<'_>], n: usize) -> SolverResult<()> {
    if terms.len() != n {
        return Err(SolverError::SortMismatch {
            context: format!("operator '{}'", op),
            expected: format!("{} operands", n),
            found: format!("{} operands", terms.len()),
        });
    }
    Ok(())
}

fn expect_min_arity(op: Op, terms: &[Term<'_>], n: usize) -> SolverResult<()> {
    if terms.len() < n {
        return Err(SolverError::SortMismatch {
            context: format!("operator '{}'", op),
            expected: format!("at least {} operands", n),
            found: format!("{} operands", terms.len()),
        });
    }
    Ok(())
}

fn expect_operand(op: Op, term: &Term<'_>, sort: &Sort) -> SolverResult<()> {
    if term.sort != sort {
        return Err(SolverError::SortMismatch {
            context: format!("operand of '{}'", op),
            expected: sort.to_string(),
            found: term.sort.to_string(),
        });
    }
    Ok(())
}

fn expect_all(op: Op, terms: &[Term<'_>], sort: &Sort) -> SolverResult<()> {
    terms.iter().try_for_each(|t| expect_operand(op, t, sort))
}

/// All operands share one sort; returns it.
fn common_sort(op: Op, terms: &[Term<'_>]) -> SolverResult<Sort> {
    let first = terms[0].sort;
    expect_all(op, &terms[1..], first)?;
    Ok(first.clone())
}

fn bv_sort(op: Op, terms: &[Term<'_>]) -> SolverResult<Sort> {
    let sort = common_sort(op, terms)?;
    if sort.bv_width().is_none() {
        return Err(SolverError::SortMismatch {
            context: format!("operand of '{}'", op),
            expected: "bitvector".into(),
            found: sort.to_string(),
        });
    }
    Ok(sort)
}

fn array_parts<'t>(op: Op, term: &Term<'t>) -> SolverResult<(&'t Sort, &'t Sort)> {
    match term.sort {
        Sort::Array { domain, range } => Ok((&**domain, &**range)),
        other => Err(SolverError::SortMismatch {
            context: format!("operand of '{}'", op),
            expected: "array".into(),
            found: other.to_string(),
        }),
    }
}
