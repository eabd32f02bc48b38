//! Expression model for the CHC solving interface.
//!
//! Verification-condition generators build [`Expression`] trees over symbols
//! whose [`Sort`]s are declared separately with a solver session.

pub mod expr;
pub mod sort;

pub use expr::{Expression, Op};
pub use sort::{Kind, Sort};
