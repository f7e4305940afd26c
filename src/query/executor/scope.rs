// Scope Implementation
//
// A scope is the set of row bindings visible to expression evaluation at one
// point of FROM-clause iteration, together with the CTEs registered by the
// enclosing WITH clauses. Extending a scope never mutates the parent: each
// iteration step clones its parent and adds one binding.

use std::collections::HashMap;
use std::rc::Rc;

use crate::common::types::BindingName;
use crate::query::executor::cte::CteEntry;
use crate::query::executor::result::{DataValue, Row};

/// One named row association within a scope
#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    pub name: BindingName,
    pub row: Row,
    /// Set on the all-NULL row an outer join emits for an unmatched side
    pub null_extended: bool,
}

#[derive(Debug, Clone, Default)]
pub struct Scope<'a> {
    bindings: Vec<Binding>,
    /// Bindings before this index belong to enclosing queries
    frame_start: usize,
    ctes: Rc<HashMap<String, CteEntry<'a>>>,
}

impl<'a> Scope<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// A copy of this scope with one more binding
    pub fn bind(&self, name: BindingName, row: Row) -> Self {
        let mut scope = self.clone();
        scope.push(name, row);
        scope
    }

    pub fn push(&mut self, name: BindingName, row: Row) {
        self.bindings.push(Binding {
            name,
            row,
            null_extended: false,
        });
    }

    /// Bind an all-NULL row over `columns`
    pub fn push_null(&mut self, name: BindingName, columns: &[String]) {
        self.bindings.push(Binding {
            name,
            row: Row::nulls(columns),
            null_extended: true,
        });
    }

    /// Expose every binding added from position `start` on as one binding
    /// named `alias`. When several were added (a join under an alias) their
    /// columns are merged, first writer wins, and the inner names are hidden.
    pub fn alias_from(&mut self, start: usize, alias: &str) {
        let start = start.min(self.bindings.len());
        let added = self.bindings.split_off(start);
        let null_extended = !added.is_empty() && added.iter().all(|binding| binding.null_extended);

        let mut row = Row::new();
        for binding in added {
            if row.is_empty() {
                row = binding.row;
                continue;
            }
            for (column, value) in binding.row.iter() {
                if !row.contains_column(column) {
                    row.set(column.clone(), value.clone());
                }
            }
        }

        self.bindings.push(Binding {
            name: Some(alias.to_string()),
            row,
            null_extended,
        });
    }

    /// Start a new query level: wildcards only expand bindings added after
    /// this point, while column lookups still reach the outer bindings
    pub fn new_frame(&self) -> Self {
        let mut scope = self.clone();
        scope.frame_start = scope.bindings.len();
        scope
    }

    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }

    /// Bindings added by the current query level
    pub fn frame(&self) -> &[Binding] {
        &self.bindings[self.frame_start.min(self.bindings.len())..]
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn last(&self) -> Option<&Binding> {
        self.bindings.last()
    }

    /// The row of the most recent binding, which is the row a query node
    /// produced
    pub fn into_last_row(mut self) -> Row {
        self.bindings.pop().map(|binding| binding.row).unwrap_or_default()
    }

    /// Look up a column, innermost binding first. A qualified lookup only
    /// considers bindings with that name; a null-extended binding answers
    /// NULL for any column. An unqualified name found nowhere is NULL when a
    /// null-extended binding of unknown shape (a source with no rows and no
    /// declared columns) could have supplied it.
    pub fn resolve(&self, table: Option<&str>, column: &str) -> Option<DataValue> {
        for binding in self.bindings.iter().rev() {
            match table {
                Some(table) => {
                    if binding.name.as_deref() != Some(table) {
                        continue;
                    }
                    if let Some(value) = binding.row.get(column) {
                        return Some(value.clone());
                    }
                    if binding.null_extended {
                        return Some(DataValue::Null);
                    }
                }
                None => {
                    if let Some(value) = binding.row.get(column) {
                        return Some(value.clone());
                    }
                }
            }
        }
        if table.is_none()
            && self
                .bindings
                .iter()
                .any(|binding| binding.null_extended && binding.row.is_empty())
        {
            return Some(DataValue::Null);
        }
        None
    }

    pub fn cte(&self, name: &str) -> Option<&CteEntry<'a>> {
        self.ctes.get(name)
    }

    /// A copy of this scope where `name` resolves to `entry`
    pub fn with_cte(&self, name: &str, entry: CteEntry<'a>) -> Self {
        let mut scope = self.clone();
        Rc::make_mut(&mut scope.ctes).insert(name.to_string(), entry);
        scope
    }
}

/// Look up a column among a slice of bindings, innermost first
pub(crate) fn lookup_column<'s>(bindings: &'s [Binding], column: &str) -> Option<&'s DataValue> {
    bindings.iter().rev().find_map(|binding| binding.row.get(column))
}
