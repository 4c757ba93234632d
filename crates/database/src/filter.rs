//! Predicate evaluation: AND-connected conditions with weak typing at the
//! comparison boundary.
//!
//! Values stay strictly typed everywhere else in the engine; only here, when
//! a comparison mixes a number with numeric-looking text, is the text coerced
//! to a number. Equality is weak (`"1"` equals `1`); ordering uses the
//! numeric comparison after coercion, or the natural per-type order.

use command::{CompareOp, Condition, WhereClause};
use common::RowMap;
use std::cmp::Ordering;
use types::Value;

/// Returns true if the row satisfies every condition of the clause.
pub fn row_matches(row: &RowMap, table: &str, clause: &WhereClause) -> bool {
    clause
        .conditions
        .iter()
        .all(|cond| condition_holds(row, table, cond))
}

fn condition_holds(row: &RowMap, table: &str, cond: &Condition) -> bool {
    match lookup(row, table, &cond.column) {
        Some(actual) => compare(actual, cond.op, &cond.value),
        None => false,
    }
}

/// Resolve a condition column: bare name first, then `"{table}.{column}"`
/// (the shape join merges produce for conflicting names).
fn lookup<'a>(row: &'a RowMap, table: &str, column: &str) -> Option<&'a Value> {
    row.get(column)
        .or_else(|| row.get(&format!("{table}.{column}")))
}

/// Compare two values under an operator with weak-typing coercion.
pub fn compare(left: &Value, op: CompareOp, right: &Value) -> bool {
    match op {
        CompareOp::Eq => weak_eq(left, right),
        CompareOp::Lt => matches!(ordering(left, right), Some(Ordering::Less)),
        CompareOp::Gt => matches!(ordering(left, right), Some(Ordering::Greater)),
        CompareOp::Le => matches!(ordering(left, right), Some(Ordering::Less | Ordering::Equal)),
        CompareOp::Ge => matches!(
            ordering(left, right),
            Some(Ordering::Greater | Ordering::Equal)
        ),
    }
}

fn weak_eq(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Int(a), Value::Int(b)) => a == b,
        (Value::Text(a), Value::Text(b)) => a == b,
        (Value::Int(n), Value::Text(s)) | (Value::Text(s), Value::Int(n)) => {
            parse_number(s) == Some(*n)
        }
        _ => false,
    }
}

fn ordering(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
        (Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
        (Value::Int(n), Value::Text(s)) => parse_number(s).map(|m| n.cmp(&m)),
        (Value::Text(s), Value::Int(n)) => parse_number(s).map(|m| m.cmp(n)),
        _ => None,
    }
}

fn parse_number(text: &str) -> Option<i32> {
    text.trim().parse().ok()
}
