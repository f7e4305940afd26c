use std::sync::Arc;

use anyhow::Result;
use parking_lot::RwLock;

use tabula::query::ast::{
    CommonTableExpr, Expression, JoinConstraint, JoinKind, Operator, Projection, SelectStatement, SetOperator,
    Statement, WithClause,
};
use tabula::{Catalog, DataValue, Engine, EngineConfig, QueryError, Row};

#[path = "../common/mod.rs"]
mod common;
use common::*;

/// WITH RECURSIVE c(n) AS (VALUES (1) <op> SELECT n + 1 FROM c WHERE n < <limit>)
/// SELECT n FROM c
fn counter(op: SetOperator, limit: Option<i64>) -> Statement {
    let step = core(
        vec![Projection::Expression(binary(col("n"), Operator::Plus, int(1)))],
        vec![table("c")],
        limit.map(|limit| binary(col("n"), Operator::LessThan, int(limit))),
    );
    with_cte(
        "c",
        &["n"],
        set_op(op, values(&[&[1]]), step),
        core(vec![proj("n")], vec![table("c")], None),
    )
}

fn engine_with_limit(limit: Option<usize>) -> Engine {
    let config = EngineConfig::default().with_max_recursion_rounds(limit);
    Engine::with_config(Arc::new(RwLock::new(Catalog::new())), config)
}

fn edge(src: i64, dst: i64) -> Row {
    int_row(&[("src", src), ("dst", dst)])
}

/// Nodes reachable from node 1 over `edges`
fn reachability(op: SetOperator) -> Statement {
    let step = core(
        vec![qproj("edges", "dst")],
        vec![join(
            JoinKind::Inner,
            table("reach"),
            table("edges"),
            JoinConstraint::On(eq(qcol("reach", "node"), qcol("edges", "src"))),
        )],
        None,
    );
    with_cte(
        "reach",
        &["node"],
        set_op(op, values(&[&[1]]), step),
        core(star(), vec![table("reach")], None),
    )
}

#[test]
fn test_recursive_counter_reaches_fixpoint() -> Result<()> {
    let engine = engine_with(vec![]);
    let rows = run(&engine, &counter(SetOperator::Union, Some(3)))?;
    assert_eq!(rows, int_rows("n", &[1, 2, 3]));

    let rows = run(&engine, &counter(SetOperator::UnionAll, Some(5)))?;
    assert_eq!(column_values(&rows, "n"), ints(&[1, 2, 3, 4, 5]));
    Ok(())
}

#[test]
fn test_round_cap() -> Result<()> {
    // Three producing rounds plus the empty round that proves the fixpoint
    let rows = run(&engine_with_limit(Some(4)), &counter(SetOperator::Union, Some(3)))?;
    assert_eq!(rows.len(), 3);

    let err = run(&engine_with_limit(Some(3)), &counter(SetOperator::Union, Some(3))).unwrap_err();
    assert_eq!(
        err.downcast_ref::<QueryError>(),
        Some(&QueryError::RecursionNonTermination {
            name: "c".to_string(),
            rounds: 3,
        })
    );

    let rows = run(&engine_with_limit(None), &counter(SetOperator::Union, Some(50)))?;
    assert_eq!(rows.len(), 50);
    Ok(())
}

#[test]
fn test_unbounded_recursion_is_capped() {
    let engine = engine_with_limit(Some(25));
    let err = run(&engine, &counter(SetOperator::UnionAll, None)).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<QueryError>(),
        Some(QueryError::RecursionNonTermination { rounds: 25, .. })
    ));
}

#[test]
fn test_rows_stream_before_the_fixpoint() -> Result<()> {
    let engine = engine_with_limit(Some(10));
    let stmt = counter(SetOperator::UnionAll, None);
    let mut cursor = engine.cursor();
    cursor.execute(&stmt)?;

    // Rows of early rounds are available before the cap is hit
    let first = cursor.fetchmany(3)?;
    assert_eq!(column_values(&first, "n"), ints(&[1, 2, 3]));
    assert_eq!(cursor.rowcount(), 3);
    assert!(cursor.fetchall().is_err());
    assert_eq!(cursor.rowcount(), 0);
    Ok(())
}

#[test]
fn test_union_terminates_on_cyclic_graph() -> Result<()> {
    let engine = engine_with(vec![("edges", vec![edge(1, 2), edge(2, 3), edge(3, 1), edge(3, 4), edge(5, 6)])]);
    let rows = run(&engine, &reachability(SetOperator::Union))?;
    assert_eq!(column_values(&rows, "node"), ints(&[1, 2, 3, 4]));

    // UNION ALL keeps revisiting the cycle
    let config = EngineConfig::default().with_max_recursion_rounds(Some(20));
    let engine = Engine::with_config(engine.catalog().clone(), config);
    let err = run(&engine, &reachability(SetOperator::UnionAll)).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<QueryError>(),
        Some(QueryError::RecursionNonTermination { .. })
    ));
    Ok(())
}

#[test]
fn test_non_recursive_cte() -> Result<()> {
    let engine = engine_with(vec![("base", int_rows("x", &[1, 2, 3]))]);
    let stmt = Statement::Select(SelectStatement {
        with: Some(WithClause {
            recursive: false,
            tables: vec![CommonTableExpr {
                name: "big".to_string(),
                columns: vec![],
                query: Box::new(SelectStatement::new(core(
                    star(),
                    vec![table("base")],
                    Some(binary(col("x"), Operator::GreaterThan, int(1))),
                ))),
            }],
        }),
        body: core(star(), vec![table("big")], None),
    });

    let rows = run(&engine, &stmt)?;
    assert_eq!(rows, int_rows("x", &[2, 3]));
    Ok(())
}

#[test]
fn test_later_cte_reads_earlier_one() -> Result<()> {
    let engine = engine_with(vec![]);
    let first = CommonTableExpr {
        name: "one".to_string(),
        columns: vec!["v".to_string()],
        query: Box::new(SelectStatement::new(values(&[&[1], &[2]]))),
    };
    let second = CommonTableExpr {
        name: "two".to_string(),
        columns: vec!["w".to_string()],
        query: Box::new(SelectStatement::new(core(
            vec![Projection::Expression(binary(col("v"), Operator::Multiply, int(10)))],
            vec![table("one")],
            None,
        ))),
    };
    let stmt = Statement::Select(SelectStatement {
        with: Some(WithClause {
            recursive: false,
            tables: vec![first, second],
        }),
        body: core(star(), vec![table("two")], None),
    });

    let rows = run(&engine, &stmt)?;
    assert_eq!(rows, int_rows("w", &[10, 20]));
    Ok(())
}

#[test]
fn test_cte_read_twice_in_one_statement() -> Result<()> {
    let engine = engine_with(vec![]);
    let body = core(
        vec![aliased(qcol("a", "n"), "a"), aliased(qcol("b", "n"), "b")],
        vec![join(
            JoinKind::Inner,
            alias(table("c"), "a"),
            alias(table("c"), "b"),
            JoinConstraint::On(eq(qcol("a", "n"), qcol("b", "n"))),
        )],
        None,
    );
    let Statement::Select(definition) = counter(SetOperator::Union, Some(3)) else {
        unreachable!();
    };
    let stmt = Statement::Select(SelectStatement { body, ..definition });

    let rows = run(&engine, &stmt)?;
    assert_eq!(column_values(&rows, "a"), ints(&[1, 2, 3]));
    assert_eq!(column_values(&rows, "b"), ints(&[1, 2, 3]));
    Ok(())
}

#[test]
fn test_catalog_table_shadows_cte() -> Result<()> {
    let engine = engine_with(vec![("c", int_rows("n", &[42]))]);
    let rows = run(&engine, &counter(SetOperator::Union, Some(3)))?;
    assert_eq!(rows, int_rows("n", &[42]));
    Ok(())
}

#[test]
fn test_column_list_length_mismatch() {
    let engine = engine_with(vec![]);
    let stmt = with_cte(
        "pair",
        &["a", "b"],
        values(&[&[1]]),
        core(star(), vec![table("pair")], None),
    );
    let err = run(&engine, &stmt).unwrap_err();
    assert_eq!(
        err.downcast_ref::<QueryError>(),
        Some(&QueryError::DimensionMismatch { expected: 2, actual: 1 })
    );
}

#[test]
fn test_recursive_cte_without_column_list() -> Result<()> {
    // WITH c AS (SELECT 1 AS n UNION ALL SELECT n + 1 FROM c WHERE n < 3) SELECT n FROM c
    let engine = engine_with(vec![]);
    let step = core(
        vec![Projection::Expression(binary(col("n"), Operator::Plus, int(1)))],
        vec![table("c")],
        Some(binary(col("n"), Operator::LessThan, int(3))),
    );
    let stmt = with_cte(
        "c",
        &[],
        set_op(SetOperator::UnionAll, core(vec![aliased(int(1), "n")], vec![], None), step),
        core(vec![proj("n")], vec![table("c")], None),
    );

    let rows = run(&engine, &stmt)?;
    assert_eq!(rows, int_rows("n", &[1, 2, 3]));
    Ok(())
}

#[test]
fn test_cte_in_subquery_is_scoped() -> Result<()> {
    // SELECT x, (WITH d(v) AS (VALUES (7)) SELECT v FROM d) AS seven FROM t
    let engine = engine_with(vec![("t", int_rows("x", &[1]))]);
    let inner = with_cte("d", &["v"], values(&[&[7]]), core(vec![proj("v")], vec![table("d")], None));
    let Statement::Select(inner) = inner else {
        unreachable!();
    };
    let stmt = select(core(
        vec![proj("x"), aliased(Expression::Subquery(Box::new(inner)), "seven")],
        vec![table("t")],
        None,
    ));

    let rows = run(&engine, &stmt)?;
    assert_eq!(rows[0].get("seven"), Some(&DataValue::Integer(7)));

    let err = run(&engine, &select_star_from("d")).unwrap_err();
    assert_eq!(
        err.downcast_ref::<QueryError>(),
        Some(&QueryError::UnknownTable("d".to_string()))
    );
    Ok(())
}

#[test]
fn test_recursive_branch_on_left_side() -> Result<()> {
    let engine = engine_with(vec![]);
    let step = core(
        vec![Projection::Expression(binary(col("n"), Operator::Plus, int(1)))],
        vec![table("c")],
        Some(binary(col("n"), Operator::LessThan, int(3))),
    );
    let stmt = with_cte(
        "c",
        &["n"],
        set_op(SetOperator::Union, step, values(&[&[1]])),
        core(star(), vec![table("c")], None),
    );
    let rows = run(&engine, &stmt)?;
    assert_eq!(rows, int_rows("n", &[1, 2, 3]));
    Ok(())
}
