// Expression Evaluation
//
// The engine hands every scalar expression to an `ExpressionEvaluator`
// together with the current scope and itself, so subqueries can call back
// into the engine with the scope they are correlated with.

use std::cmp::Ordering;

use crate::query::ast::{Expression, Operator, SelectStatement, UnaryOperator, Value};
use crate::query::executor::engine::Engine;
use crate::query::executor::result::{DataValue, QueryError, QueryResult, Row};
use crate::query::executor::scope::Scope;

/// Evaluates scalar expressions against a scope
pub trait ExpressionEvaluator {
    fn evaluate(&self, engine: &Engine, scope: &Scope<'_>, expr: &Expression) -> QueryResult<DataValue>;
}

/// Evaluator used when the embedding application does not supply one
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultEvaluator;

impl ExpressionEvaluator for DefaultEvaluator {
    fn evaluate(&self, engine: &Engine, scope: &Scope<'_>, expr: &Expression) -> QueryResult<DataValue> {
        match expr {
            Expression::Literal(value) => Ok(literal(value)),
            Expression::Column(col_ref) => scope
                .resolve(col_ref.table.as_deref(), &col_ref.name)
                .ok_or_else(|| {
                    QueryError::ColumnNotFound(match &col_ref.table {
                        Some(table) => format!("{}.{}", table, col_ref.name),
                        None => col_ref.name.clone(),
                    })
                }),
            Expression::BinaryOp { left, op, right } => match op {
                Operator::And | Operator::Or => self.evaluate_logical(engine, scope, left, *op, right),
                _ => {
                    let left_val = self.evaluate(engine, scope, left)?;
                    let right_val = self.evaluate(engine, scope, right)?;
                    binary_op(left_val, *op, right_val)
                }
            },
            Expression::UnaryOp { op, expr } => {
                let val = self.evaluate(engine, scope, expr)?;
                match op {
                    UnaryOperator::Minus => match val {
                        DataValue::Integer(i) => Ok(DataValue::Integer(i.checked_neg().ok_or(QueryError::NumericOverflow)?)),
                        DataValue::Float(f) => Ok(DataValue::Float(-f)),
                        DataValue::Null => Ok(DataValue::Null),
                        other => Err(QueryError::TypeError(format!(
                            "Unary minus not supported for type {}",
                            other.data_type()
                        ))),
                    },
                    // NOT NULL is NULL
                    UnaryOperator::Not => match val {
                        DataValue::Null => Ok(DataValue::Null),
                        other => Ok(DataValue::Boolean(!other.is_truthy())),
                    },
                }
            }
            Expression::IsNull { expr, negated } => {
                let is_null = self.evaluate(engine, scope, expr)?.is_null();
                Ok(DataValue::Boolean(is_null != *negated))
            }
            Expression::InList { expr, list, negated } => {
                let needle = self.evaluate(engine, scope, expr)?;
                let candidates = list.iter().map(|item| self.evaluate(engine, scope, item));
                in_candidates(needle, candidates, *negated)
            }
            Expression::InSubquery { expr, query, negated } => {
                let needle = self.evaluate(engine, scope, expr)?;
                let candidates = subquery(engine, scope, query)
                    .map(|row| row.map(|row| row.first_value().cloned().unwrap_or(DataValue::Null)));
                in_candidates(needle, candidates, *negated)
            }
            Expression::Exists(query) => match subquery(engine, scope, query).next() {
                Some(row) => row.map(|_| DataValue::Boolean(true)),
                None => Ok(DataValue::Boolean(false)),
            },
            Expression::Subquery(query) => match subquery(engine, scope, query).next() {
                Some(row) => Ok(row?.first_value().cloned().unwrap_or(DataValue::Null)),
                None => Ok(DataValue::Null),
            },
            Expression::Function { name, args } => self.evaluate_function(engine, scope, name, args),
        }
    }
}

impl DefaultEvaluator {
    /// AND / OR with three-valued logic. The right operand is skipped when
    /// the left one already decides the result.
    fn evaluate_logical(
        &self,
        engine: &Engine,
        scope: &Scope<'_>,
        left: &Expression,
        op: Operator,
        right: &Expression,
    ) -> QueryResult<DataValue> {
        let decisive = op == Operator::Or;

        let left_val = self.evaluate(engine, scope, left)?;
        if !left_val.is_null() && left_val.is_truthy() == decisive {
            return Ok(DataValue::Boolean(decisive));
        }
        let right_val = self.evaluate(engine, scope, right)?;
        if !right_val.is_null() && right_val.is_truthy() == decisive {
            return Ok(DataValue::Boolean(decisive));
        }

        if left_val.is_null() || right_val.is_null() {
            Ok(DataValue::Null)
        } else {
            Ok(DataValue::Boolean(!decisive))
        }
    }

    fn evaluate_function(
        &self,
        engine: &Engine,
        scope: &Scope<'_>,
        name: &str,
        args: &[Expression],
    ) -> QueryResult<DataValue> {
        let function = name.to_uppercase();

        match function.as_str() {
            "COALESCE" | "IFNULL" => {
                if function == "IFNULL" && args.len() != 2 {
                    return Err(wrong_arity(&function, 2, args.len()));
                }
                for arg in args {
                    let value = self.evaluate(engine, scope, arg)?;
                    if !value.is_null() {
                        return Ok(value);
                    }
                }
                Ok(DataValue::Null)
            }
            "ABS" | "LENGTH" | "LOWER" | "UPPER" => {
                if args.len() != 1 {
                    return Err(wrong_arity(&function, 1, args.len()));
                }
                let value = self.evaluate(engine, scope, &args[0])?;
                scalar_function(&function, value)
            }
            _ => Err(QueryError::ExecutionError(format!("Unknown function: {}", name))),
        }
    }
}

fn literal(value: &Value) -> DataValue {
    match value {
        Value::Null => DataValue::Null,
        Value::Integer(i) => DataValue::Integer(*i),
        Value::Float(f) => DataValue::Float(*f),
        Value::String(s) => DataValue::Text(s.clone()),
        Value::Blob(b) => DataValue::Blob(b.clone()),
        Value::Boolean(b) => DataValue::Boolean(*b),
    }
}

fn subquery<'a>(
    engine: &'a Engine,
    scope: &Scope<'a>,
    query: &'a SelectStatement,
) -> impl Iterator<Item = QueryResult<Row>> + 'a {
    engine.select(scope.clone(), query)
}

/// Shared tail of `IN (list)` and `IN (subquery)`: true on a match, NULL when
/// no match was found but a candidate was NULL
fn in_candidates(
    needle: DataValue,
    candidates: impl Iterator<Item = QueryResult<DataValue>>,
    negated: bool,
) -> QueryResult<DataValue> {
    if needle.is_null() {
        return Ok(DataValue::Null);
    }

    let mut saw_null = false;
    for candidate in candidates {
        let candidate = candidate?;
        if candidate.is_null() {
            saw_null = true;
        } else if values_equal(&needle, &candidate) {
            return Ok(DataValue::Boolean(!negated));
        }
    }

    if saw_null {
        Ok(DataValue::Null)
    } else {
        Ok(DataValue::Boolean(negated))
    }
}

/// Equality across numeric types; values of unrelated types are never equal
fn values_equal(left: &DataValue, right: &DataValue) -> bool {
    left.partial_cmp(right) == Some(Ordering::Equal)
}

fn binary_op(left_val: DataValue, op: Operator, right_val: DataValue) -> QueryResult<DataValue> {
    // Every remaining operator propagates NULL
    if left_val.is_null() || right_val.is_null() {
        return Ok(DataValue::Null);
    }

    match op {
        Operator::Equals => Ok(DataValue::Boolean(values_equal(&left_val, &right_val))),
        Operator::NotEquals => Ok(DataValue::Boolean(!values_equal(&left_val, &right_val))),
        Operator::LessThan => Ok(DataValue::Boolean(left_val.compare(&right_val)? == Ordering::Less)),
        Operator::GreaterThan => Ok(DataValue::Boolean(left_val.compare(&right_val)? == Ordering::Greater)),
        Operator::LessEquals => Ok(DataValue::Boolean(left_val.compare(&right_val)? != Ordering::Greater)),
        Operator::GreaterEquals => Ok(DataValue::Boolean(left_val.compare(&right_val)? != Ordering::Less)),
        Operator::Plus => match (left_val, right_val) {
            (DataValue::Integer(l), DataValue::Integer(r)) => {
                Ok(DataValue::Integer(l.checked_add(r).ok_or(QueryError::NumericOverflow)?))
            }
            (DataValue::Float(l), DataValue::Float(r)) => Ok(DataValue::Float(l + r)),
            (DataValue::Integer(l), DataValue::Float(r)) => Ok(DataValue::Float(l as f64 + r)),
            (DataValue::Float(l), DataValue::Integer(r)) => Ok(DataValue::Float(l + r as f64)),
            _ => Err(QueryError::TypeError("Unsupported types for + operator".to_string())),
        },
        Operator::Minus => match (left_val, right_val) {
            (DataValue::Integer(l), DataValue::Integer(r)) => {
                Ok(DataValue::Integer(l.checked_sub(r).ok_or(QueryError::NumericOverflow)?))
            }
            (DataValue::Float(l), DataValue::Float(r)) => Ok(DataValue::Float(l - r)),
            (DataValue::Integer(l), DataValue::Float(r)) => Ok(DataValue::Float(l as f64 - r)),
            (DataValue::Float(l), DataValue::Integer(r)) => Ok(DataValue::Float(l - r as f64)),
            _ => Err(QueryError::TypeError("Unsupported types for - operator".to_string())),
        },
        Operator::Multiply => match (left_val, right_val) {
            (DataValue::Integer(l), DataValue::Integer(r)) => {
                Ok(DataValue::Integer(l.checked_mul(r).ok_or(QueryError::NumericOverflow)?))
            }
            (DataValue::Float(l), DataValue::Float(r)) => Ok(DataValue::Float(l * r)),
            (DataValue::Integer(l), DataValue::Float(r)) => Ok(DataValue::Float(l as f64 * r)),
            (DataValue::Float(l), DataValue::Integer(r)) => Ok(DataValue::Float(l * r as f64)),
            _ => Err(QueryError::TypeError("Unsupported types for * operator".to_string())),
        },
        Operator::Divide => match (left_val, right_val) {
            // Integer division truncates
            (DataValue::Integer(_), DataValue::Integer(0)) => Err(QueryError::DivisionByZero),
            (DataValue::Integer(l), DataValue::Integer(r)) => {
                Ok(DataValue::Integer(l.checked_div(r).ok_or(QueryError::NumericOverflow)?))
            }
            (DataValue::Float(l), DataValue::Float(r)) => divide_float(l, r),
            (DataValue::Integer(l), DataValue::Float(r)) => divide_float(l as f64, r),
            (DataValue::Float(l), DataValue::Integer(r)) => divide_float(l, r as f64),
            _ => Err(QueryError::TypeError("Unsupported types for / operator".to_string())),
        },
        Operator::Modulo => match (left_val, right_val) {
            (DataValue::Integer(_), DataValue::Integer(0)) => Err(QueryError::DivisionByZero),
            (DataValue::Integer(l), DataValue::Integer(r)) => {
                Ok(DataValue::Integer(l.checked_rem(r).ok_or(QueryError::NumericOverflow)?))
            }
            _ => Err(QueryError::TypeError("Modulo operator only supports integers".to_string())),
        },
        Operator::Concat => Ok(DataValue::Text(format!("{}{}", left_val, right_val))),
        Operator::And | Operator::Or => Err(QueryError::ExecutionError(format!(
            "Logical operator {:?} must be evaluated lazily",
            op
        ))),
    }
}

fn divide_float(l: f64, r: f64) -> QueryResult<DataValue> {
    if r == 0.0 {
        Err(QueryError::DivisionByZero)
    } else {
        Ok(DataValue::Float(l / r))
    }
}

fn scalar_function(function: &str, value: DataValue) -> QueryResult<DataValue> {
    if value.is_null() {
        return Ok(DataValue::Null);
    }

    match (function, value) {
        ("ABS", DataValue::Integer(i)) => Ok(DataValue::Integer(i.checked_abs().ok_or(QueryError::NumericOverflow)?)),
        ("ABS", DataValue::Float(f)) => Ok(DataValue::Float(f.abs())),
        ("LENGTH", DataValue::Text(s)) => Ok(DataValue::Integer(s.chars().count() as i64)),
        ("LENGTH", DataValue::Blob(b)) => Ok(DataValue::Integer(b.len() as i64)),
        ("LENGTH", other) => Ok(DataValue::Integer(other.to_string().chars().count() as i64)),
        ("LOWER", DataValue::Text(s)) => Ok(DataValue::Text(s.to_lowercase())),
        ("UPPER", DataValue::Text(s)) => Ok(DataValue::Text(s.to_uppercase())),
        (function, other) => Err(QueryError::TypeError(format!(
            "{} not supported for type {}",
            function,
            other.data_type()
        ))),
    }
}

fn wrong_arity(function: &str, expected: usize, actual: usize) -> QueryError {
    QueryError::ExecutionError(format!(
        "{} expects {} argument(s), got {}",
        function, expected, actual
    ))
}
