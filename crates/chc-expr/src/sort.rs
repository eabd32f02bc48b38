//! Sorts (logical types) of symbols and expressions.

use std::fmt;

/// Coarse classification of a sort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Bool,
    Int,
    BitVector,
    Array,
    Function,
}

/// A logical sort.
///
/// A relation is a `Function` sort whose codomain is `Bool`; its domain fully
/// determines the relation's arity and argument sorts.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Sort {
    /// Boolean sort.
    Bool,
    /// Mathematical integers.
    Int,
    /// Fixed-width bitvectors.
    BitVector(u32),
    /// Total maps from `domain` to `range`.
    Array { domain: Box<Sort>, range: Box<Sort> },
    /// Uninterpreted function or relation.
    Function { domain: Vec<Sort>, codomain: Box<Sort> },
}

impl Sort {
    /// Array sort `domain -> range`.
    pub fn array(domain: Sort, range: Sort) -> Self {
        Sort::Array {
            domain: Box::new(domain),
            range: Box::new(range),
        }
    }

    /// Function sort `domain -> codomain`.
    pub fn function(domain: Vec<Sort>, codomain: Sort) -> Self {
        Sort::Function {
            domain,
            codomain: Box::new(codomain),
        }
    }

    /// Relation (predicate) sort over `domain`.
    pub fn relation(domain: Vec<Sort>) -> Self {
        Sort::function(domain, Sort::Bool)
    }

    pub fn kind(&self) -> Kind {
        match self {
            Sort::Bool => Kind::Bool,
            Sort::Int => Kind::Int,
            Sort::BitVector(_) => Kind::BitVector,
            Sort::Array { .. } => Kind::Array,
            Sort::Function { .. } => Kind::Function,
        }
    }

    /// True for function and relation sorts.
    pub fn is_function(&self) -> bool {
        matches!(self, Sort::Function { .. })
    }

    /// True for function sorts returning `Bool`.
    pub fn is_relation(&self) -> bool {
        match self {
            Sort::Function { codomain, .. } => **codomain == Sort::Bool,
            _ => false,
        }
    }

    /// Number of arguments a symbol of this sort takes (0 for non-functions).
    pub fn arity(&self) -> usize {
        match self {
            Sort::Function { domain, .. } => domain.len(),
            _ => 0,
        }
    }

    /// Bit width, for bitvector sorts.
    pub fn bv_width(&self) -> Option<u32> {
        match self {
            Sort::BitVector(w) => Some(*w),
            _ => None,
        }
    }
}

impl fmt::Display for Sort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sort::Bool => write!(f, "Bool"),
            Sort::Int => write!(f, "Int"),
            Sort::BitVector(w) => write!(f, "(_ BitVec {})", w),
            Sort::Array { domain, range } => write!(f, "(Array {} {})", domain, range),
            Sort::Function { domain, codomain } => {
                write!(f, "(")?;
                for (i, s) in domain.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{}", s)?;
                }
                write!(f, ") {}", codomain)
            }
        }
    }
}
