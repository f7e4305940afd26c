use anyhow::Result;

use tabula::query::ast::{DeleteStatement, Expression, Operator, Projection, Statement, Value};
use tabula::query::executor::DataType;
use tabula::{Cursor, DataValue, QueryError};

#[path = "../common/mod.rs"]
mod common;
use common::*;

#[test]
fn test_fetchall_then_exhausted() -> Result<()> {
    let engine = engine_with(vec![("t", int_rows("x", &[1, 2, 3]))]);
    let stmt = select_star_from("t");
    let mut cursor = Cursor::new(&engine);
    cursor.execute(&stmt)?;

    assert_eq!(cursor.fetchall()?, int_rows("x", &[1, 2, 3]));
    assert_eq!(cursor.fetchone()?, None);
    assert_eq!(cursor.rowcount(), 0);
    assert!(cursor.description().is_empty());
    Ok(())
}

#[test]
fn test_fetchmany_in_batches() -> Result<()> {
    let engine = engine_with(vec![("t", int_rows("x", &[1, 2, 3, 4, 5]))]);
    let stmt = select_star_from("t");
    let mut cursor = engine.cursor();
    cursor.execute(&stmt)?;

    assert_eq!(column_values(&cursor.fetchmany(2)?, "x"), ints(&[1, 2]));
    assert_eq!(cursor.rowcount(), 2);
    assert_eq!(column_values(&cursor.fetchmany(2)?, "x"), ints(&[3, 4]));
    assert_eq!(cursor.rowcount(), 4);
    assert_eq!(column_values(&cursor.fetchmany(2)?, "x"), ints(&[5]));
    assert!(cursor.fetchmany(2)?.is_empty());
    Ok(())
}

#[test]
fn test_description_follows_current_row() -> Result<()> {
    let engine = engine_with(vec![]);
    let stmt = select(core(
        vec![
            aliased(int(1), "i"),
            aliased(text("a"), "s"),
            aliased(Expression::Literal(Value::Float(1.5)), "f"),
            aliased(Expression::Literal(Value::Null), "n"),
            aliased(boolean(true), "b"),
        ],
        vec![],
        None,
    ));
    let mut cursor = engine.cursor();
    cursor.execute(&stmt)?;
    assert!(cursor.description().is_empty());

    let row = cursor.fetchone()?;
    assert!(row.is_some());
    let description: Vec<(&str, DataType)> = cursor
        .description()
        .iter()
        .map(|column| (column.name.as_str(), column.type_code))
        .collect();
    assert_eq!(
        description,
        vec![
            ("i", DataType::Integer),
            ("s", DataType::Text),
            ("f", DataType::Float),
            ("n", DataType::Null),
            ("b", DataType::Boolean),
        ]
    );
    Ok(())
}

#[test]
fn test_rowcount_after_dml() -> Result<()> {
    let engine = engine_with(vec![("t", int_rows("x", &[1, 2, 3]))]);
    let delete = Statement::Delete(DeleteStatement {
        table_name: "t".to_string(),
        where_clause: Some(binary(col("x"), Operator::LessThan, int(3))),
    });

    let mut cursor = engine.cursor();
    cursor.execute(&delete)?;
    assert_eq!(cursor.rowcount(), 2);
    // DML produces no rows
    assert_eq!(cursor.fetchone()?, None);
    Ok(())
}

#[test]
fn test_execute_resets_previous_result() -> Result<()> {
    let engine = engine_with(vec![("t", int_rows("x", &[1, 2]))]);
    let first = select_star_from("t");
    let second = select(core(vec![Projection::All(None)], vec![table("t")], Some(boolean(false))));
    let mut cursor = engine.cursor();

    cursor.execute(&first)?;
    cursor.fetchone()?;
    assert_eq!(cursor.rowcount(), 1);

    cursor.execute(&second)?;
    assert_eq!(cursor.rowcount(), 0);
    assert_eq!(cursor.fetchone()?, None);
    Ok(())
}

#[test]
fn test_failed_fetch_resets_cursor() -> Result<()> {
    let engine = engine_with(vec![("t", int_rows("x", &[1, 0, 2]))]);
    let stmt = select(core(
        vec![aliased(binary(int(10), Operator::Divide, col("x")), "q")],
        vec![table("t")],
        None,
    ));
    let mut cursor = engine.cursor();
    cursor.execute(&stmt)?;

    let first = cursor.fetchone()?;
    assert_eq!(first.and_then(|row| row.get("q").cloned()), Some(DataValue::Integer(10)));
    assert_eq!(cursor.fetchone(), Err(QueryError::DivisionByZero));
    assert_eq!(cursor.rowcount(), 0);
    // The remaining row is gone with the failed result
    assert_eq!(cursor.fetchone()?, None);
    Ok(())
}

#[test]
fn test_failed_execute_leaves_cursor_empty() -> Result<()> {
    let engine = engine_with(vec![("t", int_rows("x", &[1]))]);
    let good = select_star_from("t");
    let bad = Statement::Delete(DeleteStatement {
        table_name: "missing".to_string(),
        where_clause: None,
    });
    let mut cursor = engine.cursor();

    cursor.execute(&good)?;
    assert_eq!(
        cursor.execute(&bad),
        Err(QueryError::UnknownTable("missing".to_string()))
    );
    assert_eq!(cursor.fetchone()?, None);
    assert_eq!(cursor.rowcount(), 0);
    Ok(())
}

#[test]
fn test_cursor_iterates_rows() -> Result<()> {
    let engine = engine_with(vec![("t", int_rows("x", &[7, 8, 9]))]);
    let stmt = select_star_from("t");
    let mut cursor = engine.cursor();
    cursor.execute(&stmt)?;

    let total: i64 = cursor
        .by_ref()
        .map(|row| -> Result<i64> {
            match row?.get("x") {
                Some(DataValue::Integer(x)) => Ok(*x),
                _ => Ok(0),
            }
        })
        .sum::<Result<i64>>()?;
    assert_eq!(total, 24);
    Ok(())
}
