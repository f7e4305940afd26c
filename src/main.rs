use anyhow::Result;

use tabula::query::ast::{
    ColumnReference, CommonTableExpr, Expression, JoinConstraint, JoinKind, Operator, Projection, SelectCore,
    SelectStatement, SetOperator, Statement, TableExpr, Value, WithClause,
};
use tabula::query::executor::result::QueryResultSet;
use tabula::{Catalog, DataValue, Engine, Row};

fn column(table: &str, name: &str) -> Expression {
    Expression::Column(ColumnReference {
        table: Some(table.to_string()),
        name: name.to_string(),
    })
}

fn edge(src: i64, dst: i64) -> Row {
    Row::from_values(
        vec!["src".to_string(), "dst".to_string()],
        vec![DataValue::Integer(src), DataValue::Integer(dst)],
    )
}

/// Every node reachable from node 1:
///
/// WITH RECURSIVE reach(node) AS (
///     VALUES (1)
///     UNION
///     SELECT edges.dst FROM reach JOIN edges ON reach.node = edges.src
/// )
/// SELECT * FROM reach
fn reachability() -> Statement {
    let step = TableExpr::Core(Box::new(SelectCore {
        distinct: false,
        projection: vec![Projection::Column(ColumnReference {
            table: Some("edges".to_string()),
            name: "dst".to_string(),
        })],
        from: vec![TableExpr::Join {
            kind: JoinKind::Inner,
            left: Box::new(TableExpr::Table("reach".to_string())),
            right: Box::new(TableExpr::Table("edges".to_string())),
            constraint: JoinConstraint::On(Expression::BinaryOp {
                left: Box::new(column("reach", "node")),
                op: Operator::Equals,
                right: Box::new(column("edges", "src")),
            }),
        }],
        where_clause: None,
    }));

    let definition = SelectStatement::new(TableExpr::SetOperation {
        op: SetOperator::Union,
        left: Box::new(TableExpr::Values(vec![vec![Expression::Literal(Value::Integer(1))]])),
        right: Box::new(step),
    });

    Statement::Select(SelectStatement {
        with: Some(WithClause {
            recursive: true,
            tables: vec![CommonTableExpr {
                name: "reach".to_string(),
                columns: vec!["node".to_string()],
                query: Box::new(definition),
            }],
        }),
        body: TableExpr::Core(Box::new(SelectCore {
            distinct: false,
            projection: vec![Projection::All(None)],
            from: vec![TableExpr::Table("reach".to_string())],
            where_clause: None,
        })),
    })
}

fn main() -> Result<()> {
    // A small graph with a cycle: 1 -> 2 -> 3 -> 1, 3 -> 4
    let catalog = Catalog::from_tables(vec![("edges", vec![edge(1, 2), edge(2, 3), edge(3, 1), edge(3, 4)])]);
    let engine = Engine::from_catalog(catalog);

    let statement = reachability();
    let mut cursor = engine.cursor();
    cursor.execute(&statement)?;
    let rows = cursor.fetchall()?;

    println!("Nodes reachable from 1:");
    println!("{}", QueryResultSet::from_rows(rows).to_string_table());

    Ok(())
}
