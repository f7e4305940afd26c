// Query Result Implementation
//
// This module defines values, rows and the error type shared by the executor.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use linked_hash_map::LinkedHashMap;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use thiserror::Error;

/// Possible data types for values in a row
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum DataValue {
    Null,
    Integer(i64),
    Float(f64),
    Text(String),
    Blob(Vec<u8>),
    Boolean(bool),
}

impl Eq for DataValue {}

impl Hash for DataValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            DataValue::Null => 0.hash(state),
            DataValue::Integer(i) => { 1.hash(state); i.hash(state); }
            DataValue::Float(f) => { 2.hash(state); f.to_bits().hash(state); }
            DataValue::Text(s) => { 3.hash(state); s.hash(state); }
            DataValue::Blob(b) => { 4.hash(state); b.hash(state); }
            DataValue::Boolean(b) => { 5.hash(state); b.hash(state); }
        }
    }
}

impl fmt::Display for DataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataValue::Null => write!(f, "NULL"),
            DataValue::Integer(i) => write!(f, "{}", i),
            DataValue::Float(fl) => write!(f, "{}", fl),
            DataValue::Text(s) => write!(f, "{}", s),
            DataValue::Blob(b) => write!(f, "X'{}'", hex::encode(b)),
            DataValue::Boolean(b) => write!(f, "{}", b),
        }
    }
}

impl PartialOrd for DataValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (DataValue::Null, DataValue::Null) => Some(Ordering::Equal),
            (DataValue::Null, _) => Some(Ordering::Less),
            (_, DataValue::Null) => Some(Ordering::Greater),

            (DataValue::Integer(a), DataValue::Integer(b)) => a.partial_cmp(b),
            (DataValue::Float(a), DataValue::Float(b)) => a.partial_cmp(b),
            (DataValue::Integer(a), DataValue::Float(b)) => (*a as f64).partial_cmp(b),
            (DataValue::Float(a), DataValue::Integer(b)) => a.partial_cmp(&(*b as f64)),
            (DataValue::Text(a), DataValue::Text(b)) => Some(a.cmp(b)),
            (DataValue::Blob(a), DataValue::Blob(b)) => Some(a.cmp(b)),
            (DataValue::Boolean(a), DataValue::Boolean(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

impl DataValue {
    pub fn data_type(&self) -> DataType {
        match self {
            DataValue::Null => DataType::Null,
            DataValue::Integer(_) => DataType::Integer,
            DataValue::Float(_) => DataType::Float,
            DataValue::Text(_) => DataType::Text,
            DataValue::Blob(_) => DataType::Blob,
            DataValue::Boolean(_) => DataType::Boolean,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, DataValue::Null)
    }

    /// Truthiness used by WHERE, ON and the logical operators.
    /// NULL is never truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            DataValue::Null => false,
            DataValue::Integer(i) => *i != 0,
            DataValue::Float(f) => *f != 0.0,
            DataValue::Text(s) => !s.is_empty(),
            DataValue::Blob(b) => !b.is_empty(),
            DataValue::Boolean(b) => *b,
        }
    }

    /// Compare two values, NULLs first. Fails for types with no ordering
    /// between them.
    pub fn compare(&self, other: &Self) -> QueryResult<Ordering> {
        self.partial_cmp(other).ok_or_else(|| {
            QueryError::TypeError(format!(
                "Cannot compare incompatible types: {} and {}",
                self.data_type(),
                other.data_type()
            ))
        })
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            DataValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }
}

/// Type code reported in a cursor description
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum DataType {
    Null,
    Integer,
    Float,
    Text,
    Blob,
    Boolean,
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataType::Null => "NULL",
            DataType::Integer => "INTEGER",
            DataType::Float => "FLOAT",
            DataType::Text => "TEXT",
            DataType::Blob => "BLOB",
            DataType::Boolean => "BOOLEAN",
        };
        f.write_str(name)
    }
}

/// One column of a cursor description
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDescription {
    pub name: String,
    pub type_code: DataType,
}

/// Represents a row: an ordered mapping from column name to value
#[derive(Debug, Clone, Default)]
pub struct Row {
    values: LinkedHashMap<String, DataValue>,
}

impl PartialEq for Row {
    fn eq(&self, other: &Self) -> bool {
        // Column order does not take part in equality
        self.values.len() == other.values.len()
            && self.values.iter().all(|(col, v1)| other.values.get(col) == Some(v1))
    }
}

impl Eq for Row {}

impl Row {
    /// Create a new empty row
    pub fn new() -> Self {
        Row { values: LinkedHashMap::new() }
    }

    /// Create a row from column values
    pub fn from_values(columns: Vec<String>, values: Vec<DataValue>) -> Self {
        let mut row = Row::new();
        for (col, val) in columns.into_iter().zip(values) {
            row.set(col, val);
        }
        row
    }

    /// Create a row holding NULL for every given column
    pub fn nulls(columns: &[String]) -> Self {
        let mut row = Row::new();
        for col in columns {
            row.set(col.clone(), DataValue::Null);
        }
        row
    }

    /// Get a value by column name
    pub fn get(&self, column: &str) -> Option<&DataValue> {
        self.values.get(column)
    }

    /// Set a value for a column. An existing column keeps its position.
    pub fn set(&mut self, column: String, value: DataValue) {
        match self.values.get_mut(&column) {
            Some(slot) => *slot = value,
            None => {
                self.values.insert(column, value);
            }
        }
    }

    pub fn contains_column(&self, column: &str) -> bool {
        self.values.contains_key(column)
    }

    /// Get all columns in the row
    pub fn columns(&self) -> impl Iterator<Item = &String> {
        self.values.keys()
    }

    /// Get all values in column order
    pub fn values(&self) -> impl Iterator<Item = &DataValue> {
        self.values.values()
    }

    pub fn into_values(self) -> Vec<DataValue> {
        self.values.into_iter().map(|(_, value)| value).collect()
    }

    /// Get all values with their corresponding column names
    pub fn iter(&self) -> impl Iterator<Item = (&String, &DataValue)> {
        self.values.iter()
    }

    pub fn first_value(&self) -> Option<&DataValue> {
        self.values.values().next()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Structural key of the row: its column/value pairs sorted by column
    /// name. Two rows with the same key are duplicates for DISTINCT and the
    /// set operations.
    pub fn key(&self) -> RowKey {
        let mut pairs: Vec<(String, DataValue)> = self
            .values
            .iter()
            .map(|(col, value)| (col.clone(), value.clone()))
            .collect();
        pairs.sort_by(|a, b| a.0.cmp(&b.0));
        RowKey(pairs)
    }

    pub fn describe(&self) -> Vec<ColumnDescription> {
        self.values
            .iter()
            .map(|(name, value)| ColumnDescription {
                name: name.clone(),
                type_code: value.data_type(),
            })
            .collect()
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (column, value) in &self.values {
            map.serialize_entry(column, value)?;
        }
        map.end()
    }
}

/// Order-independent identity of a row, see [`Row::key`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct RowKey(Vec<(String, DataValue)>);

/// Represents query execution error
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QueryError {
    /// Neither a table nor a visible CTE has this name
    #[error("Unknown table: {0}")]
    UnknownTable(String),
    /// Table already exists
    #[error("Table already exists: {0}")]
    TableExists(String),
    /// Column not found
    #[error("Column not found: {0}")]
    ColumnNotFound(String),
    #[error("Unsupported join method: {0}")]
    UnsupportedJoinMethod(String),
    #[error("Unsupported statement: {0}")]
    UnsupportedStatement(String),
    /// Column list and value row lengths differ
    #[error("Dimension mismatch: expected {expected} values, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    /// A recursive CTE hit the configured round cap
    #[error("Recursive CTE '{name}' did not reach a fixpoint within {rounds} rounds")]
    RecursionNonTermination { name: String, rounds: usize },
    /// Error in data type handling
    #[error("Type error: {0}")]
    TypeError(String),
    /// Error during query execution
    #[error("Execution error: {0}")]
    ExecutionError(String),
    /// Numeric overflow
    #[error("Numeric overflow")]
    NumericOverflow,
    /// Division by zero
    #[error("Division by zero")]
    DivisionByZero,
}

/// Result type for query operations
pub type QueryResult<T> = Result<T, QueryError>;

/// Query resultset representation
#[derive(Debug, Default)]
pub struct QueryResultSet {
    /// Column names in the resultset
    columns: Vec<String>,
    /// Rows of data
    rows: Vec<Row>,
}

impl QueryResultSet {
    /// Create a new empty resultset with column names
    pub fn new(columns: Vec<String>) -> Self {
        QueryResultSet {
            columns,
            rows: Vec::new(),
        }
    }

    /// Build a resultset whose columns are every column seen across `rows`,
    /// in first-seen order
    pub fn from_rows(rows: Vec<Row>) -> Self {
        let mut columns: Vec<String> = Vec::new();
        for row in &rows {
            for col in row.columns() {
                if !columns.contains(col) {
                    columns.push(col.clone());
                }
            }
        }
        QueryResultSet { columns, rows }
    }

    /// Add a row to the resultset
    pub fn add_row(&mut self, row: Row) {
        self.rows.push(row);
    }

    /// Get the columns in the resultset
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Get the rows in the resultset
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Get the number of rows
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Format the resultset as a string table
    pub fn to_string_table(&self) -> String {
        if self.columns.is_empty() {
            return "Empty result".to_string();
        }

        let mut result = String::new();

        result.push_str("| ");
        for col in &self.columns {
            result.push_str(&format!("{} | ", col));
        }
        result.push('\n');

        result.push('|');
        for col in &self.columns {
            result.push_str(&format!("{}|", "-".repeat(col.len() + 2)));
        }
        result.push('\n');

        for row in &self.rows {
            result.push_str("| ");
            for col in &self.columns {
                match row.get(col) {
                    Some(value) => result.push_str(&format!("{} | ", value)),
                    None => result.push_str("NULL | "),
                }
            }
            result.push('\n');
        }

        result
    }
}
