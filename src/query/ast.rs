// SQL Abstract Syntax Tree (AST) Implementation
//
// This module defines the statement and expression nodes the engine consumes.
// Parsing SQL text into these nodes is the job of an external parser.

use std::fmt;

/// Represents a SQL statement
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Create(CreateStatement),
    Drop(DropStatement),
    Select(SelectStatement),
    Insert(InsertStatement),
    Update(UpdateStatement),
    Delete(DeleteStatement),
    /// Recognized by the grammar, rejected by the engine (there is no planner)
    Explain(Box<Statement>),
}

/// CREATE TABLE statement
#[derive(Debug, Clone, PartialEq)]
pub struct CreateStatement {
    pub table_name: String,
    pub columns: Vec<ColumnDef>,
    pub if_not_exists: bool,
}

/// Column definition for CREATE TABLE. The type name is kept for callers;
/// values are dynamically typed.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDef {
    pub name: String,
    pub data_type: Option<String>,
}

/// DROP TABLE statement
#[derive(Debug, Clone, PartialEq)]
pub struct DropStatement {
    pub table_name: String,
    pub if_exists: bool,
}

/// SELECT statement representation
#[derive(Debug, Clone, PartialEq)]
pub struct SelectStatement {
    /// WITH clause (optional)
    pub with: Option<WithClause>,
    /// Query body: a select core, VALUES list or set operation
    pub body: TableExpr,
}

/// WITH clause
#[derive(Debug, Clone, PartialEq)]
pub struct WithClause {
    pub recursive: bool,
    pub tables: Vec<CommonTableExpr>,
}

/// `name(columns) AS (query)` inside a WITH clause
#[derive(Debug, Clone, PartialEq)]
pub struct CommonTableExpr {
    pub name: String,
    /// Explicit column list, empty when omitted
    pub columns: Vec<String>,
    pub query: Box<SelectStatement>,
}

/// SELECT ... FROM ... WHERE ...
#[derive(Debug, Clone, PartialEq)]
pub struct SelectCore {
    pub distinct: bool,
    /// Columns in SELECT clause
    pub projection: Vec<Projection>,
    /// FROM clause table references, joined left to right
    pub from: Vec<TableExpr>,
    /// WHERE clause (optional)
    pub where_clause: Option<Expression>,
}

/// Item in a SELECT list
#[derive(Debug, Clone, PartialEq)]
pub enum Projection {
    /// Regular column reference, keyed by the column's name
    Column(ColumnReference),
    /// Expression with an alias
    Alias { expr: Expression, alias: String },
    /// `*`, or `table.*` when qualified
    All(Option<String>),
    /// Any other expression, keyed by its position in the list
    Expression(Expression),
}

/// Column reference (could be qualified with table name)
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnReference {
    pub table: Option<String>,
    pub name: String,
}

/// Table reference in a FROM clause
#[derive(Debug, Clone, PartialEq)]
pub enum TableExpr {
    /// A catalog table or a CTE
    Table(String),
    /// `table INDEXED BY index` or `table NOT INDEXED`
    Indexed { table: String, index: Option<String> },
    /// `source AS alias`
    Alias { source: Box<TableExpr>, alias: String },
    /// VALUES (...), (...)
    Values(Vec<Vec<Expression>>),
    /// Parenthesized subquery
    Select(Box<SelectStatement>),
    Core(Box<SelectCore>),
    /// Comma-separated references
    List(Vec<TableExpr>),
    Join {
        kind: JoinKind,
        left: Box<TableExpr>,
        right: Box<TableExpr>,
        constraint: JoinConstraint,
    },
    SetOperation {
        op: SetOperator,
        left: Box<TableExpr>,
        right: Box<TableExpr>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
    Right,
    Full,
    Cross,
}

/// Join qualifier
#[derive(Debug, Clone, PartialEq)]
pub enum JoinConstraint {
    None,
    On(Expression),
    Using(Vec<String>),
    /// Recognized by the grammar, rejected by the engine
    Natural,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOperator {
    Union,
    UnionAll,
    Intersect,
    Except,
}

/// Expression in SQL
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// Literal value
    Literal(Value),
    /// Column reference
    Column(ColumnReference),
    /// Binary operation (e.g., a + b, x = y)
    BinaryOp {
        left: Box<Expression>,
        op: Operator,
        right: Box<Expression>,
    },
    UnaryOp {
        op: UnaryOperator,
        expr: Box<Expression>,
    },
    /// `expr IS [NOT] NULL`
    IsNull {
        expr: Box<Expression>,
        negated: bool,
    },
    /// `expr [NOT] IN (a, b, ...)`
    InList {
        expr: Box<Expression>,
        list: Vec<Expression>,
        negated: bool,
    },
    /// `expr [NOT] IN (SELECT ...)`
    InSubquery {
        expr: Box<Expression>,
        query: Box<SelectStatement>,
        negated: bool,
    },
    Exists(Box<SelectStatement>),
    /// Scalar subquery
    Subquery(Box<SelectStatement>),
    /// Function call
    Function {
        name: String,
        args: Vec<Expression>,
    },
}

/// SQL literal values
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Float(f64),
    String(String),
    Blob(Vec<u8>),
    Boolean(bool),
}

/// SQL binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    // Comparison
    Equals,
    NotEquals,
    LessThan,
    GreaterThan,
    LessEquals,
    GreaterEquals,
    // Logical
    And,
    Or,
    // Arithmetic
    Plus,
    Minus,
    Multiply,
    Divide,
    Modulo,
    /// String concatenation `||`
    Concat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Not,
    Minus,
}

/// INSERT statement
#[derive(Debug, Clone, PartialEq)]
pub struct InsertStatement {
    pub table_name: String,
    /// Explicit column list; `None` for the wildcard form
    pub columns: Option<Vec<String>>,
    /// VALUES list or query producing the rows
    pub source: TableExpr,
}

/// UPDATE statement
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateStatement {
    pub table_name: String,
    pub alias: Option<String>,
    pub assignments: Vec<Assignment>,
    /// Extra tables for multi-table updates
    pub from: Vec<TableExpr>,
    pub where_clause: Option<Expression>,
}

/// Column assignment in UPDATE
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub column: String,
    pub value: Expression,
}

/// DELETE statement
#[derive(Debug, Clone, PartialEq)]
pub struct DeleteStatement {
    pub table_name: String,
    pub where_clause: Option<Expression>,
}

impl SelectStatement {
    pub fn new(body: TableExpr) -> Self {
        SelectStatement { with: None, body }
    }

    /// Whether this query reads `name` anywhere, including nested subqueries
    pub fn references_table(&self, name: &str) -> bool {
        self.with
            .as_ref()
            .is_some_and(|with| with.tables.iter().any(|cte| cte.query.references_table(name)))
            || self.body.references_table(name)
    }
}

impl SelectCore {
    pub fn references_table(&self, name: &str) -> bool {
        self.from.iter().any(|item| item.references_table(name))
            || self.projection.iter().any(|item| match item {
                Projection::Alias { expr, .. } | Projection::Expression(expr) => expr.references_table(name),
                Projection::Column(_) | Projection::All(_) => false,
            })
            || self.where_clause.as_ref().is_some_and(|expr| expr.references_table(name))
    }
}

impl TableExpr {
    pub fn references_table(&self, name: &str) -> bool {
        match self {
            TableExpr::Table(table) | TableExpr::Indexed { table, .. } => table == name,
            TableExpr::Alias { source, .. } => source.references_table(name),
            TableExpr::Values(rows) => rows.iter().flatten().any(|expr| expr.references_table(name)),
            TableExpr::Select(select) => select.references_table(name),
            TableExpr::Core(core) => core.references_table(name),
            TableExpr::List(items) => items.iter().any(|item| item.references_table(name)),
            TableExpr::Join { left, right, constraint, .. } => {
                left.references_table(name)
                    || right.references_table(name)
                    || matches!(constraint, JoinConstraint::On(expr) if expr.references_table(name))
            }
            TableExpr::SetOperation { left, right, .. } => {
                left.references_table(name) || right.references_table(name)
            }
        }
    }
}

impl Expression {
    pub fn references_table(&self, name: &str) -> bool {
        match self {
            Expression::Literal(_) | Expression::Column(_) => false,
            Expression::BinaryOp { left, right, .. } => {
                left.references_table(name) || right.references_table(name)
            }
            Expression::UnaryOp { expr, .. } | Expression::IsNull { expr, .. } => expr.references_table(name),
            Expression::InList { expr, list, .. } => {
                expr.references_table(name) || list.iter().any(|item| item.references_table(name))
            }
            Expression::InSubquery { expr, query, .. } => {
                expr.references_table(name) || query.references_table(name)
            }
            Expression::Exists(query) | Expression::Subquery(query) => query.references_table(name),
            Expression::Function { args, .. } => args.iter().any(|arg| arg.references_table(name)),
        }
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Statement::Create(_) => write!(f, "CREATE statement"),
            Statement::Drop(_) => write!(f, "DROP statement"),
            Statement::Select(_) => write!(f, "SELECT statement"),
            Statement::Insert(_) => write!(f, "INSERT statement"),
            Statement::Update(_) => write!(f, "UPDATE statement"),
            Statement::Delete(_) => write!(f, "DELETE statement"),
            Statement::Explain(_) => write!(f, "EXPLAIN statement"),
        }
    }
}

impl fmt::Display for JoinConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JoinConstraint::None => write!(f, "no constraint"),
            JoinConstraint::On(_) => write!(f, "ON"),
            JoinConstraint::Using(_) => write!(f, "USING"),
            JoinConstraint::Natural => write!(f, "NATURAL"),
        }
    }
}
