use anyhow::Result;

use tabula::query::ast::{JoinConstraint, JoinKind, Projection, Statement, TableExpr};
use tabula::{DataValue, Engine, QueryError, Row};

#[path = "../common/mod.rs"]
mod common;
use common::*;

fn setup() -> Engine {
    engine_with(vec![
        ("a", int_rows("id", &[1, 2])),
        ("b", int_rows("id", &[1])),
    ])
}

fn on_ids(left: &str, right: &str) -> JoinConstraint {
    JoinConstraint::On(eq(qcol(left, "id"), qcol(right, "id")))
}

/// SELECT a.id AS a_id, b.id AS b_id FROM <from>
fn both_ids(from: TableExpr) -> Statement {
    select(core(
        vec![aliased(qcol("a", "id"), "a_id"), aliased(qcol("b", "id"), "b_id")],
        vec![from],
        None,
    ))
}

fn pairs(rows: &[Row]) -> Vec<(DataValue, DataValue)> {
    rows.iter()
        .map(|row| {
            (
                row.get("a_id").cloned().unwrap_or(DataValue::Null),
                row.get("b_id").cloned().unwrap_or(DataValue::Null),
            )
        })
        .collect()
}

fn i(value: i64) -> DataValue {
    DataValue::Integer(value)
}

#[test]
fn test_inner_join() -> Result<()> {
    let engine = setup();
    let stmt = select(core(
        star(),
        vec![join(JoinKind::Inner, table("a"), table("b"), on_ids("a", "b"))],
        None,
    ));

    let rows = run(&engine, &stmt)?;
    assert_eq!(rows, vec![int_row(&[("id", 1)])]);

    let rows = run(&engine, &both_ids(join(JoinKind::Inner, table("a"), table("b"), on_ids("a", "b"))))?;
    assert_eq!(pairs(&rows), vec![(i(1), i(1))]);
    Ok(())
}

#[test]
fn test_left_join_null_extends_unmatched_rows() -> Result<()> {
    let engine = setup();
    let rows = run(&engine, &both_ids(join(JoinKind::Left, table("a"), table("b"), on_ids("a", "b"))))?;
    assert_eq!(pairs(&rows), vec![(i(1), i(1)), (i(2), DataValue::Null)]);
    Ok(())
}

#[test]
fn test_left_join_emits_each_unmatched_row_once() -> Result<()> {
    let engine = engine_with(vec![
        ("a", int_rows("id", &[1, 2, 3, 4])),
        ("b", int_rows("id", &[3, 5, 6, 3])),
    ]);
    let rows = run(&engine, &both_ids(join(JoinKind::Left, table("a"), table("b"), on_ids("a", "b"))))?;
    assert_eq!(
        pairs(&rows),
        vec![
            (i(1), DataValue::Null),
            (i(2), DataValue::Null),
            (i(3), i(3)),
            (i(3), i(3)),
            (i(4), DataValue::Null),
        ]
    );
    Ok(())
}

#[test]
fn test_right_and_full_join() -> Result<()> {
    let engine = engine_with(vec![
        ("a", int_rows("id", &[1, 2])),
        ("b", int_rows("id", &[1, 3, 3])),
    ]);

    let rows = run(&engine, &both_ids(join(JoinKind::Right, table("a"), table("b"), on_ids("a", "b"))))?;
    assert_eq!(
        pairs(&rows),
        vec![(i(1), i(1)), (DataValue::Null, i(3)), (DataValue::Null, i(3))]
    );

    let rows = run(&engine, &both_ids(join(JoinKind::Full, table("a"), table("b"), on_ids("a", "b"))))?;
    assert_eq!(
        pairs(&rows),
        vec![
            (i(1), i(1)),
            (i(2), DataValue::Null),
            (DataValue::Null, i(3)),
            (DataValue::Null, i(3)),
        ]
    );
    Ok(())
}

#[test]
fn test_outer_join_against_empty_table() -> Result<()> {
    let engine = engine_with(vec![("a", int_rows("id", &[1, 2])), ("b", vec![])]);
    let rows = run(&engine, &both_ids(join(JoinKind::Left, table("a"), table("b"), on_ids("a", "b"))))?;
    assert_eq!(pairs(&rows), vec![(i(1), DataValue::Null), (i(2), DataValue::Null)]);

    let rows = run(&engine, &both_ids(join(JoinKind::Right, table("a"), table("b"), on_ids("a", "b"))))?;
    assert!(rows.is_empty());
    Ok(())
}

#[test]
fn test_left_join_unqualified_column_of_empty_table() -> Result<()> {
    // SELECT a.id, y FROM a LEFT JOIN b ON a.id = b.id, with b seeded empty
    let engine = engine_with(vec![("a", int_rows("id", &[1, 2])), ("b", vec![])]);
    let stmt = select(core(
        vec![qproj("a", "id"), proj("y")],
        vec![join(JoinKind::Left, table("a"), table("b"), on_ids("a", "b"))],
        None,
    ));

    let rows = run(&engine, &stmt)?;
    assert_eq!(column_values(&rows, "id"), vec![i(1), i(2)]);
    assert_eq!(column_values(&rows, "y"), vec![DataValue::Null, DataValue::Null]);
    Ok(())
}

#[test]
fn test_alias_over_join_hides_inner_names() -> Result<()> {
    let engine = engine_with(vec![
        ("a", vec![int_row(&[("id", 1), ("x", 10)]), int_row(&[("id", 2), ("x", 20)])]),
        ("b", vec![int_row(&[("id", 2), ("y", 200)])]),
    ]);
    // SELECT j.id, j.x, j.y FROM (a LEFT JOIN b ON a.id = b.id) AS j
    let joined = alias(join(JoinKind::Left, table("a"), table("b"), on_ids("a", "b")), "j");
    let stmt = select(core(
        vec![qproj("j", "id"), qproj("j", "x"), qproj("j", "y")],
        vec![joined.clone()],
        None,
    ));

    let rows = run(&engine, &stmt)?;
    assert_eq!(column_values(&rows, "id"), vec![i(1), i(2)]);
    assert_eq!(column_values(&rows, "x"), vec![i(10), i(20)]);
    assert_eq!(column_values(&rows, "y"), vec![DataValue::Null, i(200)]);

    let stmt = select(core(vec![qproj("a", "x")], vec![joined], None));
    let err = run(&engine, &stmt).unwrap_err();
    assert_eq!(
        err.downcast_ref::<QueryError>(),
        Some(&QueryError::ColumnNotFound("a.x".to_string()))
    );
    Ok(())
}

#[test]
fn test_join_using() -> Result<()> {
    let engine = engine_with(vec![
        ("a", vec![int_row(&[("id", 1), ("x", 10)]), int_row(&[("id", 2), ("x", 20)])]),
        ("b", vec![int_row(&[("id", 2), ("y", 200)]), int_row(&[("id", 3), ("y", 300)])]),
    ]);
    let stmt = select(core(
        star(),
        vec![join(
            JoinKind::Inner,
            table("a"),
            table("b"),
            JoinConstraint::Using(vec!["id".to_string()]),
        )],
        None,
    ));

    let rows = run(&engine, &stmt)?;
    assert_eq!(rows, vec![int_row(&[("id", 2), ("x", 20), ("y", 200)])]);
    Ok(())
}

#[test]
fn test_cross_join_and_aliases() -> Result<()> {
    let engine = engine_with(vec![("t", int_rows("id", &[1, 2]))]);
    let stmt = select(core(
        vec![aliased(qcol("l", "id"), "l"), aliased(qcol("r", "id"), "r")],
        vec![join(
            JoinKind::Cross,
            alias(table("t"), "l"),
            alias(table("t"), "r"),
            JoinConstraint::None,
        )],
        None,
    ));

    let rows = run(&engine, &stmt)?;
    let got: Vec<(DataValue, DataValue)> = rows
        .iter()
        .map(|row| (row.get("l").cloned().unwrap(), row.get("r").cloned().unwrap()))
        .collect();
    assert_eq!(got, vec![(i(1), i(1)), (i(1), i(2)), (i(2), i(1)), (i(2), i(2))]);
    Ok(())
}

#[test]
fn test_join_chain_keeps_left_deep_order() -> Result<()> {
    let engine = engine_with(vec![
        ("a", int_rows("id", &[1, 2])),
        ("b", int_rows("id", &[2, 1])),
        ("c", vec![int_row(&[("id", 1), ("tag", 7)])]),
    ]);
    let ab = join(JoinKind::Inner, table("a"), table("b"), on_ids("a", "b"));
    let abc = join(JoinKind::Left, ab, table("c"), on_ids("b", "c"));
    let stmt = select(core(
        vec![aliased(qcol("a", "id"), "a_id"), Projection::All(Some("c".to_string()))],
        vec![abc],
        None,
    ));

    let rows = run(&engine, &stmt)?;
    assert_eq!(column_values(&rows, "a_id"), vec![i(1), i(2)]);
    assert_eq!(column_values(&rows, "tag"), vec![i(7), DataValue::Null]);
    Ok(())
}

#[test]
fn test_natural_join_is_rejected() {
    let engine = setup();
    let stmt = select(core(
        star(),
        vec![join(JoinKind::Inner, table("a"), table("b"), JoinConstraint::Natural)],
        None,
    ));
    let err = run(&engine, &stmt).unwrap_err();
    assert_eq!(
        err.downcast_ref::<QueryError>(),
        Some(&QueryError::UnsupportedJoinMethod("NATURAL".to_string()))
    );
}
