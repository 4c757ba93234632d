//! Builders for the `Command` values the engine consumes.

use command::{
    Assignment, Command, CompareOp, Condition, JoinClause, JoinOn, WhereClause,
};
use types::Value;

pub fn int(i: i32) -> Value {
    Value::Int(i)
}

pub fn text(s: &str) -> Value {
    Value::Text(s.to_string())
}

/// A positional-values INSERT covering every column.
pub fn insert_values(table: &str, values: Vec<Value>) -> Command {
    Command::Insert {
        table: table.to_string(),
        columns: None,
        values,
    }
}

/// A named-columns INSERT (the auto-increment form when the pk is omitted).
pub fn insert_named(table: &str, columns: &[&str], values: Vec<Value>) -> Command {
    Command::Insert {
        table: table.to_string(),
        columns: Some(columns.iter().map(|c| c.to_string()).collect()),
        values,
    }
}

pub fn select_all(table: &str) -> Command {
    Command::Select {
        table: table.to_string(),
        join: None,
        filter: None,
    }
}

pub fn select_where(table: &str, conditions: Vec<Condition>) -> Command {
    Command::Select {
        table: table.to_string(),
        join: None,
        filter: Some(WhereClause::new(conditions)),
    }
}

/// An inner `SELECT * FROM {table} JOIN {right} ON {on_left} = {on_right}`.
pub fn select_join(table: &str, right: &str, on_left: &str, on_right: &str) -> Command {
    Command::Select {
        table: table.to_string(),
        join: Some(JoinClause {
            table: right.to_string(),
            on: JoinOn {
                column: on_left.to_string(),
                op: CompareOp::Eq,
                value: on_right.to_string(),
            },
            left: false,
        }),
        filter: None,
    }
}

pub fn update_where(
    table: &str,
    assignments: Vec<Assignment>,
    conditions: Vec<Condition>,
) -> Command {
    Command::Update {
        table: table.to_string(),
        assignments,
        filter: Some(WhereClause::new(conditions)),
    }
}

pub fn delete_where(table: &str, conditions: Vec<Condition>) -> Command {
    Command::Delete {
        table: table.to_string(),
        filter: Some(WhereClause::new(conditions)),
    }
}

pub fn cond(column: &str, op: CompareOp, value: Value) -> Condition {
    Condition {
        column: column.to_string(),
        op,
        value,
    }
}

pub fn eq(column: &str, value: Value) -> Condition {
    cond(column, CompareOp::Eq, value)
}

pub fn assign(column: &str, value: Value) -> Assignment {
    Assignment {
        column: column.to_string(),
        value,
    }
}
