// Nested Loop Join Implementation
//
// Works for any join condition with O(n*m) time complexity. The right side is
// re-iterated against every left scope. Outer joins track which rows found a
// partner and emit each unmatched row exactly once, NULL-extended, after the
// scan that proves it unmatched:
// - an unmatched left row right after its own right-side scan;
// - unmatched right rows after the whole left side is exhausted, by one more
//   scan of the right side against a NULL left side.
// Right rows are identified by their position in the right-side sequence.

use std::collections::HashSet;

use crate::query::ast::{JoinConstraint, JoinKind, TableExpr};
use crate::query::executor::engine::Engine;
use crate::query::executor::result::{QueryError, QueryResult};
use crate::query::executor::scope::{lookup_column, Scope};
use crate::query::executor::source::{Bound, ScopeStream};

enum Phase {
    Probing,
    UnmatchedRight,
    Done,
}

/// Current left scope and the right-side scan running against it
struct Probe<'a> {
    left: Scope<'a>,
    right: ScopeStream<'a>,
    position: usize,
    found_match: bool,
}

/// Nested Loop Join operator
pub struct NestedLoopJoin<'a> {
    engine: &'a Engine,
    /// Scope the join itself was iterated in
    parent: Scope<'a>,
    kind: JoinKind,
    left: ScopeStream<'a>,
    left_node: &'a TableExpr,
    right_node: &'a TableExpr,
    constraint: &'a JoinConstraint,
    current: Option<Probe<'a>>,
    /// Positions of right rows that matched at least one left row
    right_matched: HashSet<usize>,
    unmatched: Option<ScopeStream<'a>>,
    unmatched_position: usize,
    phase: Phase,
}

impl<'a> NestedLoopJoin<'a> {
    pub fn new(
        engine: &'a Engine,
        parent: Scope<'a>,
        kind: JoinKind,
        left: &'a TableExpr,
        right: &'a TableExpr,
        constraint: &'a JoinConstraint,
    ) -> Self {
        NestedLoopJoin {
            engine,
            left: engine.iterate(parent.clone(), left),
            parent,
            kind,
            left_node: left,
            right_node: right,
            constraint,
            current: None,
            right_matched: HashSet::new(),
            unmatched: None,
            unmatched_position: 0,
            phase: Phase::Probing,
        }
    }

    fn tracks_right(&self) -> bool {
        matches!(self.kind, JoinKind::Right | JoinKind::Full)
    }

    fn tracks_left(&self) -> bool {
        matches!(self.kind, JoinKind::Left | JoinKind::Full)
    }

    /// Evaluate the join condition on a combined scope
    fn evaluate_condition(&self, left: &Scope<'a>, combined: &Scope<'a>) -> QueryResult<bool> {
        match self.constraint {
            JoinConstraint::None => Ok(true),
            JoinConstraint::On(predicate) => Ok(self.engine.evaluate(combined, predicate)?.is_truthy()),
            JoinConstraint::Using(columns) => {
                let left_bindings = &left.bindings()[self.parent.len()..];
                let right_bindings = &combined.bindings()[left.len()..];
                for column in columns {
                    let left_value = lookup_column(left_bindings, column)
                        .ok_or_else(|| QueryError::ColumnNotFound(column.clone()))?;
                    let right_value = lookup_column(right_bindings, column)
                        .ok_or_else(|| QueryError::ColumnNotFound(column.clone()))?;
                    if left_value.is_null() || left_value != right_value {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            JoinConstraint::Natural => Err(QueryError::UnsupportedJoinMethod(self.constraint.to_string())),
        }
    }

    /// `scope` extended with NULL bindings for everything `node` would add
    fn null_extend(&self, mut scope: Scope<'a>, node: &'a TableExpr) -> QueryResult<Bound<'a>> {
        let shape = self.engine.shape(&scope, node)?;
        let name = shape.last().and_then(|(name, _)| name.clone());
        for (binding, columns) in shape {
            scope.push_null(binding, &columns);
        }
        Ok((name, scope))
    }

    fn fail(&mut self, err: QueryError) -> Option<QueryResult<Bound<'a>>> {
        self.phase = Phase::Done;
        self.current = None;
        self.unmatched = None;
        Some(Err(err))
    }

    fn next_probe(&mut self) -> Option<QueryResult<Bound<'a>>> {
        loop {
            if self.current.is_none() {
                match self.left.next() {
                    Some(Ok((_, left))) => {
                        let right = self.engine.iterate(left.clone(), self.right_node);
                        self.current = Some(Probe {
                            left,
                            right,
                            position: 0,
                            found_match: false,
                        });
                    }
                    Some(Err(err)) => return self.fail(err),
                    None => {
                        self.phase = Phase::UnmatchedRight;
                        return None;
                    }
                }
            }

            let Some(probe) = self.current.as_mut() else {
                continue;
            };
            let item = probe.right.next();

            match item {
                Some(Ok((name, combined))) => {
                    let Some(probe) = self.current.take() else {
                        continue;
                    };
                    let matched = match self.evaluate_condition(&probe.left, &combined) {
                        Ok(matched) => matched,
                        Err(err) => return self.fail(err),
                    };
                    let position = probe.position;
                    self.current = Some(Probe {
                        position: position + 1,
                        found_match: probe.found_match || matched,
                        ..probe
                    });
                    if matched {
                        if self.tracks_right() {
                            self.right_matched.insert(position);
                        }
                        return Some(Ok((name, combined)));
                    }
                }
                Some(Err(err)) => return self.fail(err),
                None => {
                    let Some(probe) = self.current.take() else {
                        continue;
                    };
                    if !probe.found_match && self.tracks_left() {
                        return match self.null_extend(probe.left, self.right_node) {
                            Ok(bound) => Some(Ok(bound)),
                            Err(err) => self.fail(err),
                        };
                    }
                }
            }
        }
    }

    fn next_unmatched_right(&mut self) -> Option<QueryResult<Bound<'a>>> {
        if !self.tracks_right() {
            self.phase = Phase::Done;
            return None;
        }

        if self.unmatched.is_none() {
            let (_, null_left) = match self.null_extend(self.parent.clone(), self.left_node) {
                Ok(bound) => bound,
                Err(err) => return self.fail(err),
            };
            self.unmatched = Some(self.engine.iterate(null_left, self.right_node));
        }

        loop {
            let item = self.unmatched.as_mut()?.next();
            match item {
                Some(Ok(bound)) => {
                    let position = self.unmatched_position;
                    self.unmatched_position += 1;
                    if !self.right_matched.contains(&position) {
                        return Some(Ok(bound));
                    }
                }
                Some(Err(err)) => return self.fail(err),
                None => {
                    self.phase = Phase::Done;
                    self.unmatched = None;
                    return None;
                }
            }
        }
    }
}

impl<'a> Iterator for NestedLoopJoin<'a> {
    type Item = QueryResult<Bound<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.phase {
                Phase::Probing => {
                    if let Some(item) = self.next_probe() {
                        return Some(item);
                    }
                }
                Phase::UnmatchedRight => {
                    if let Some(item) = self.next_unmatched_right() {
                        return Some(item);
                    }
                }
                Phase::Done => return None,
            }
        }
    }
}
