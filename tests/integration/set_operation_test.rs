use anyhow::Result;

use tabula::Engine;
use tabula::query::ast::{Operator, SetOperator, Statement};

#[path = "../common/mod.rs"]
mod common;
use common::*;

fn setup(left: &[i64], right: &[i64]) -> Engine {
    engine_with(vec![("l", int_rows("x", left)), ("r", int_rows("x", right))])
}

/// SELECT * FROM l <op> SELECT * FROM r
fn combine(op: SetOperator) -> Statement {
    select(set_op(
        op,
        core(star(), vec![table("l")], None),
        core(star(), vec![table("r")], None),
    ))
}

#[test]
fn test_union_deduplicates_in_first_seen_order() -> Result<()> {
    let engine = setup(&[1, 1], &[1, 2]);
    let rows = run(&engine, &combine(SetOperator::Union))?;
    assert_eq!(rows, int_rows("x", &[1, 2]));
    Ok(())
}

#[test]
fn test_union_all_keeps_every_row() -> Result<()> {
    let engine = setup(&[1, 1], &[1, 2]);
    let rows = run(&engine, &combine(SetOperator::UnionAll))?;
    assert_eq!(rows, int_rows("x", &[1, 1, 1, 2]));
    Ok(())
}

#[test]
fn test_intersect() -> Result<()> {
    let engine = setup(&[1, 1, 2, 3], &[3, 1, 1, 4]);
    let rows = run(&engine, &combine(SetOperator::Intersect))?;
    // Rows come from the right operand, each once
    assert_eq!(rows, int_rows("x", &[3, 1]));
    Ok(())
}

#[test]
fn test_except() -> Result<()> {
    let engine = setup(&[4, 1, 2, 4, 3], &[2, 5]);
    let rows = run(&engine, &combine(SetOperator::Except))?;
    assert_eq!(rows, int_rows("x", &[4, 1, 3]));
    Ok(())
}

#[test]
fn test_rows_with_different_columns_are_distinct() -> Result<()> {
    let engine = engine_with(vec![("l", int_rows("x", &[1])), ("r", int_rows("y", &[1]))]);
    let rows = run(&engine, &combine(SetOperator::Union))?;
    assert_eq!(rows, vec![int_row(&[("x", 1)]), int_row(&[("y", 1)])]);
    Ok(())
}

#[test]
fn test_set_operation_over_values() -> Result<()> {
    let engine = engine_with(vec![]);
    let stmt = select(set_op(
        SetOperator::Union,
        values(&[&[1], &[2]]),
        set_op(SetOperator::UnionAll, values(&[&[2]]), values(&[&[3], &[3]])),
    ));
    let rows = run(&engine, &stmt)?;
    assert_eq!(rows, int_rows("0", &[1, 2, 3]));
    Ok(())
}

#[test]
fn test_set_operation_as_from_source() -> Result<()> {
    let engine = setup(&[1, 2], &[2, 3]);
    // SELECT u.x FROM (SELECT * FROM l UNION SELECT * FROM r) AS u WHERE u.x > 1
    let union = set_op(
        SetOperator::Union,
        core(star(), vec![table("l")], None),
        core(star(), vec![table("r")], None),
    );
    let stmt = select(core(
        vec![qproj("u", "x")],
        vec![alias(union, "u")],
        Some(binary(qcol("u", "x"), Operator::GreaterThan, int(1))),
    ));

    let rows = run(&engine, &stmt)?;
    assert_eq!(rows, int_rows("x", &[2, 3]));
    Ok(())
}
