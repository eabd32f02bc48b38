//! Declared constants, functions and relations of a session.

use crate::{SolverError, SolverResult};
use chc_expr::Sort;
use std::collections::BTreeMap;

/// Name-to-sort table plus the ordered list of constants that rules are
/// universally closed over.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SymbolTable {
    sorts: BTreeMap<String, Sort>,
    free_variables: Vec<String>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare `name` with `sort`.
    ///
    /// Returns `Ok(false)` if the exact declaration already exists. Constants
    /// are appended to the free-variable list on first declaration; function
    /// and relation symbols never are.
    pub fn declare(&mut self, name: &str, sort: &Sort) -> SolverResult<bool> {
        if let Some(declared) = self.sorts.get(name) {
            if declared == sort {
                return Ok(false);
            }
            return Err(SolverError::SortConflict {
                name: name.to_string(),
                declared: declared.clone(),
                requested: sort.clone(),
            });
        }
        self.sorts.insert(name.to_string(), sort.clone());
        if !sort.is_function() {
            self.free_variables.push(name.to_string());
        }
        Ok(true)
    }

    pub fn sort_of(&self, name: &str) -> SolverResult<&Sort> {
        self.sorts
            .get(name)
            .ok_or_else(|| SolverError::UndeclaredSymbol {
                name: name.to_string(),
            })
    }

    /// Sort of `name`, which must be a declared relation.
    pub fn relation_sort(&self, name: &str) -> SolverResult<&Sort> {
        let sort = self.sort_of(name)?;
        if !sort.is_relation() {
            return Err(SolverError::NotARelation {
                name: name.to_string(),
            });
        }
        Ok(sort)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.sorts.contains_key(name)
    }

    /// Constants in declaration order.
    pub fn free_variables(&self) -> &[String] {
        &self.free_variables
    }

    pub fn len(&self) -> usize {
        self.sorts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sorts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Sort)> {
        self.sorts.iter().map(|(n, s)| (n.as_str(), s))
    }

    pub fn clear(&mut self) {
        self.sorts.clear();
        self.free_variables.clear();
    }
}
