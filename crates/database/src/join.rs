//! Nested-loop join over materialized row sets.

use crate::filter;
use command::JoinClause;
use common::RowMap;
use types::Value;

/// Join every pair of `(left, right)` rows satisfying the ON condition.
///
/// Output order follows the left rows, then the right rows within each left
/// row. A `LEFT` marker on the clause is accepted but evaluated with inner
/// semantics.
pub fn nested_loop_join(
    left_rows: &[RowMap],
    left_table: &str,
    right_rows: &[RowMap],
    join: &JoinClause,
) -> Vec<RowMap> {
    let mut out = Vec::new();
    for left in left_rows {
        for right in right_rows {
            let lhs = resolve(&join.on.column, left, left_table, right, &join.table);
            let rhs = resolve(&join.on.value, left, left_table, right, &join.table);
            if filter::compare(&lhs, join.on.op, &rhs) {
                out.push(merge(left, right, &join.table));
            }
        }
    }
    out
}

/// Resolve a join reference against the candidate pair.
///
/// Precedence: a left column named exactly `reference`, then a right column,
/// then the qualified `table.column` forms, and finally the reference itself
/// as literal text.
fn resolve(
    reference: &str,
    left: &RowMap,
    left_table: &str,
    right: &RowMap,
    right_table: &str,
) -> Value {
    if let Some(value) = left.get(reference) {
        return value.clone();
    }
    if let Some(value) = right.get(reference) {
        return value.clone();
    }
    if let Some((table, column)) = reference.split_once('.') {
        if table == left_table
            && let Some(value) = left.get(column)
        {
            return value.clone();
        }
        if table == right_table
            && let Some(value) = right.get(column)
        {
            return value.clone();
        }
    }
    Value::Text(reference.to_string())
}

/// Shallow merge of a joined pair. Right-side columns that collide with a
/// left-side name are inserted under `"{right_table}.{column}"` instead of
/// overwriting.
fn merge(left: &RowMap, right: &RowMap, right_table: &str) -> RowMap {
    let mut merged = left.clone();
    for (column, value) in right {
        if merged.contains_key(column) {
            merged.insert(format!("{right_table}.{column}"), value.clone());
        } else {
            merged.insert(column.clone(), value.clone());
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use command::{CompareOp, JoinOn};

    fn row(pairs: &[(&str, Value)]) -> RowMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn users_orders_join() -> JoinClause {
        JoinClause {
            table: "orders".into(),
            on: JoinOn {
                column: "users.id".into(),
                op: CompareOp::Eq,
                value: "orders.uid".into(),
            },
            left: false,
        }
    }

    #[test]
    fn joins_matching_pairs_only() {
        let users = vec![
            row(&[("id", Value::Int(1)), ("name", "Alice".into())]),
            row(&[("id", Value::Int(2)), ("name", "Bob".into())]),
        ];
        let orders = vec![
            row(&[("oid", Value::Int(100)), ("uid", Value::Int(1)), ("item", "Laptop".into())]),
            row(&[("oid", Value::Int(101)), ("uid", Value::Int(9)), ("item", "Phone".into())]),
        ];

        let joined = nested_loop_join(&users, "users", &orders, &users_orders_join());
        assert_eq!(joined.len(), 1);
        assert_eq!(joined[0]["name"], Value::Text("Alice".into()));
        assert_eq!(joined[0]["item"], Value::Text("Laptop".into()));
    }

    #[test]
    fn conflicting_columns_are_qualified_not_overwritten() {
        let left = vec![row(&[("id", Value::Int(1)), ("name", "Alice".into())])];
        let right = vec![row(&[("id", Value::Int(100)), ("uid", Value::Int(1))])];

        let join = JoinClause {
            table: "orders".into(),
            on: JoinOn {
                column: "users.id".into(),
                op: CompareOp::Eq,
                value: "orders.uid".into(),
            },
            left: false,
        };
        let joined = nested_loop_join(&left, "users", &right, &join);
        assert_eq!(joined.len(), 1);
        assert_eq!(joined[0]["id"], Value::Int(1));
        assert_eq!(joined[0]["orders.id"], Value::Int(100));
        assert_eq!(joined[0]["uid"], Value::Int(1));
    }

    #[test]
    fn bare_column_references_resolve_left_then_right() {
        let left = vec![row(&[("uid", Value::Int(5))])];
        let right = vec![row(&[("owner", Value::Int(5))])];

        let join = JoinClause {
            table: "orders".into(),
            on: JoinOn {
                column: "uid".into(),
                op: CompareOp::Eq,
                value: "owner".into(),
            },
            left: false,
        };
        assert_eq!(nested_loop_join(&left, "users", &right, &join).len(), 1);
    }

    #[test]
    fn unresolvable_reference_falls_back_to_literal_text() {
        let left = vec![row(&[("tag", Value::Text("vip".into()))])];
        let right = vec![row(&[("oid", Value::Int(1))])];

        let join = JoinClause {
            table: "orders".into(),
            on: JoinOn {
                column: "tag".into(),
                op: CompareOp::Eq,
                value: "vip".into(),
            },
            left: false,
        };
        // "vip" resolves to no column anywhere, so it compares as a literal.
        assert_eq!(nested_loop_join(&left, "users", &right, &join).len(), 1);
    }

    #[test]
    fn left_marker_is_accepted_with_inner_semantics() {
        let users = vec![row(&[("id", Value::Int(2)), ("name", "Bob".into())])];
        let orders = vec![row(&[("uid", Value::Int(1))])];

        let mut join = users_orders_join();
        join.left = true;
        // No match: inner semantics emit nothing, even for LEFT.
        assert!(nested_loop_join(&users, "users", &orders, &join).is_empty());
    }

    #[test]
    fn cross_product_when_condition_always_holds() {
        let left = vec![
            row(&[("a", Value::Int(1))]),
            row(&[("a", Value::Int(2))]),
        ];
        let right = vec![
            row(&[("b", Value::Int(10))]),
            row(&[("b", Value::Int(20))]),
        ];

        let join = JoinClause {
            table: "r".into(),
            on: JoinOn {
                column: "same".into(),
                op: CompareOp::Eq,
                value: "same".into(),
            },
            left: false,
        };
        // Both sides resolve to the literal "same": 2 x 2 pairs all match.
        assert_eq!(nested_loop_join(&left, "l", &right, &join).len(), 4);
    }
}
