//! The command surface consumed by the engine.
//!
//! Commands are produced by an external SQL parser; this crate only defines
//! the algebraic shape the engine executes. Field validation (column
//! existence, types, counts) happens in the engine, not here.

use types::{SqlType, Value};

/// Comparison operators usable in WHERE conditions and join predicates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Lt,
    Gt,
    Le,
    Ge,
}

/// A column definition in a CREATE TABLE command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: String,
    pub ty: SqlType,
    pub primary_key: bool,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, ty: SqlType) -> Self {
        Self {
            name: name.into(),
            ty,
            primary_key: false,
        }
    }

    pub fn primary_key(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ty: SqlType::Integer,
            primary_key: true,
        }
    }
}

/// One `column <op> literal` condition of a WHERE clause.
#[derive(Clone, Debug, PartialEq)]
pub struct Condition {
    pub column: String,
    pub op: CompareOp,
    pub value: Value,
}

/// An AND-connected list of conditions.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct WhereClause {
    pub conditions: Vec<Condition>,
}

impl WhereClause {
    pub fn new(conditions: Vec<Condition>) -> Self {
        Self { conditions }
    }
}

/// A join predicate. Both sides are reference strings, resolved against the
/// joined rows first and falling back to literal text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JoinOn {
    pub column: String,
    pub op: CompareOp,
    pub value: String,
}

/// A JOIN clause on a SELECT.
///
/// `left` marks a LEFT JOIN; the engine currently evaluates it with inner
/// semantics.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JoinClause {
    pub table: String,
    pub on: JoinOn,
    pub left: bool,
}

/// A `column = literal` assignment in an UPDATE command.
#[derive(Clone, Debug, PartialEq)]
pub struct Assignment {
    pub column: String,
    pub value: Value,
}

/// A validated command, ready for execution.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    CreateTable {
        name: String,
        columns: Vec<ColumnDef>,
    },
    Insert {
        table: String,
        /// Explicit column list of the named-values form; `None` means
        /// positional values covering every column.
        columns: Option<Vec<String>>,
        values: Vec<Value>,
    },
    Select {
        table: String,
        join: Option<JoinClause>,
        filter: Option<WhereClause>,
    },
    Update {
        table: String,
        assignments: Vec<Assignment>,
        filter: Option<WhereClause>,
    },
    Delete {
        table: String,
        filter: Option<WhereClause>,
    },
    Begin,
    Commit,
    Rollback,
}
