//! Immutable logical expression trees.

use std::collections::BTreeSet;
use std::fmt;
use std::ops;

/// Built-in operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    // Boolean
    Not,
    And,
    Or,
    Implies,
    Eq,
    Distinct,
    Ite,
    // Integer arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Neg,
    Lt,
    Le,
    Gt,
    Ge,
    // Bitvectors
    BvNot,
    BvAnd,
    BvOr,
    BvXor,
    BvAdd,
    BvSub,
    BvMul,
    BvUdiv,
    BvShl,
    BvLshr,
    BvUlt,
    BvUle,
    BvSlt,
    BvSle,
    // Arrays
    Select,
    Store,
}

impl Op {
    /// SMT-LIB name of the operator.
    pub fn symbol(self) -> &'static str {
        match self {
            Op::Not => "not",
            Op::And => "and",
            Op::Or => "or",
            Op::Implies => "=>",
            Op::Eq => "=",
            Op::Distinct => "distinct",
            Op::Ite => "ite",
            Op::Add => "+",
            Op::Sub | Op::Neg => "-",
            Op::Mul => "*",
            Op::Div => "div",
            Op::Mod => "mod",
            Op::Lt => "<",
            Op::Le => "<=",
            Op::Gt => ">",
            Op::Ge => ">=",
            Op::BvNot => "bvnot",
            Op::BvAnd => "bvand",
            Op::BvOr => "bvor",
            Op::BvXor => "bvxor",
            Op::BvAdd => "bvadd",
            Op::BvSub => "bvsub",
            Op::BvMul => "bvmul",
            Op::BvUdiv => "bvudiv",
            Op::BvShl => "bvshl",
            Op::BvLshr => "bvlshr",
            Op::BvUlt => "bvult",
            Op::BvUle => "bvule",
            Op::BvSlt => "bvslt",
            Op::BvSle => "bvsle",
            Op::Select => "select",
            Op::Store => "store",
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// A logical expression.
///
/// Leaves are literals and references to declared constants; interior nodes
/// are built-in operator applications or applications of declared
/// functions/relations. Sorts of named symbols are not stored here: they come
/// from whichever symbol table the expression is interpreted against.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Expression {
    /// Boolean literal.
    Bool(bool),
    /// Integer literal.
    Int(i128),
    /// Bitvector literal of the given width.
    BitVec { value: u128, width: u32 },
    /// Reference to a declared constant (or nullary relation).
    Const(String),
    /// Built-in operator application.
    App { op: Op, args: Vec<Expression> },
    /// Application of a declared function or relation.
    Call { name: String, args: Vec<Expression> },
}

impl Expression {
    pub fn constant(name: impl Into<String>) -> Self {
        Expression::Const(name.into())
    }

    pub fn call(name: impl Into<String>, args: Vec<Expression>) -> Self {
        Expression::Call {
            name: name.into(),
            args,
        }
    }

    pub fn app(op: Op, args: Vec<Expression>) -> Self {
        Expression::App { op, args }
    }

    pub fn bv(value: u128, width: u32) -> Self {
        Expression::BitVec { value, width }
    }

    pub fn and(args: Vec<Expression>) -> Self {
        Expression::app(Op::And, args)
    }

    pub fn or(args: Vec<Expression>) -> Self {
        Expression::app(Op::Or, args)
    }

    pub fn implies(self, consequent: Expression) -> Self {
        Expression::app(Op::Implies, vec![self, consequent])
    }

    pub fn equals(self, other: Expression) -> Self {
        Expression::app(Op::Eq, vec![self, other])
    }

    pub fn ite(cond: Expression, then_branch: Expression, else_branch: Expression) -> Self {
        Expression::app(Op::Ite, vec![cond, then_branch, else_branch])
    }

    pub fn lt(self, other: Expression) -> Self {
        Expression::app(Op::Lt, vec![self, other])
    }

    pub fn le(self, other: Expression) -> Self {
        Expression::app(Op::Le, vec![self, other])
    }

    pub fn gt(self, other: Expression) -> Self {
        Expression::app(Op::Gt, vec![self, other])
    }

    pub fn ge(self, other: Expression) -> Self {
        Expression::app(Op::Ge, vec![self, other])
    }

    pub fn select(self, index: Expression) -> Self {
        Expression::app(Op::Select, vec![self, index])
    }

    pub fn store(self, index: Expression, value: Expression) -> Self {
        Expression::app(Op::Store, vec![self, index, value])
    }

    /// Name of the symbol this node refers to, if any.
    pub fn symbol_name(&self) -> Option<&str> {
        match self {
            Expression::Const(name) | Expression::Call { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Names of all `Const` leaves in this tree.
    pub fn constants(&self) -> BTreeSet<&str> {
        let mut out = BTreeSet::new();
        self.collect_constants(&mut out);
        out
    }

    fn collect_constants<'a>(&'a self, out: &mut BTreeSet<&'a str>) {
        match self {
            Expression::Const(name) => {
                out.insert(name);
            }
            Expression::App { args, .. } | Expression::Call { args, .. } => {
                for arg in args {
                    arg.collect_constants(out);
                }
            }
            Expression::Bool(_) | Expression::Int(_) | Expression::BitVec { .. } => {}
        }
    }
}

impl From<bool> for Expression {
    fn from(b: bool) -> Self {
        Expression::Bool(b)
    }
}

impl From<i64> for Expression {
    fn from(n: i64) -> Self {
        Expression::Int(i128::from(n))
    }
}

impl ops::Not for Expression {
    type Output = Expression;

    fn not(self) -> Expression {
        Expression::app(Op::Not, vec![self])
    }
}

impl ops::Neg for Expression {
    type Output = Expression;

    fn neg(self) -> Expression {
        Expression::app(Op::Neg, vec![self])
    }
}

macro_rules! binary_op {
    ($trait:ident, $method:ident, $op:expr) => {
        impl ops::$trait for Expression {
            type Output = Expression;

            fn $method(self, rhs: Expression) -> Expression {
                Expression::app($op, vec![self, rhs])
            }
        }

        impl ops::$trait<i64> for Expression {
            type Output = Expression;

            fn $method(self, rhs: i64) -> Expression {
                Expression::app($op, vec![self, Expression::from(rhs)])
            }
        }
    };
}

binary_op!(Add, add, Op::Add);
binary_op!(Sub, sub, Op::Sub);
binary_op!(Mul, mul, Op::Mul);

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Bool(b) => write!(f, "{}", b),
            Expression::Int(n) if *n < 0 => write!(f, "(- {})", n.unsigned_abs()),
            Expression::Int(n) => write!(f, "{}", n),
            Expression::BitVec { value, width } => write!(f, "(_ bv{} {})", value, width),
            Expression::Const(name) => write!(f, "{}", name),
            Expression::App { op, args } => write_application(f, op.symbol(), args),
            Expression::Call { name, args } => write_application(f, name, args),
        }
    }
}

fn write_application(f: &mut fmt::Formatter<'_>, head: &str, args: &[Expression]) -> fmt::Result {
    if args.is_empty() {
        return write!(f, "{}", head);
    }
    write!(f, "({}", head)?;
    for arg in args {
        write!(f, " {}", arg)?;
    }
    write!(f, ")")
}
