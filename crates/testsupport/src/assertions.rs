//! Assertion helpers for engine results.

use common::{DbResult, RowMap};
use database::QueryResult;
use std::fmt::Debug;

/// Unwrap a SELECT result into its rows.
pub fn expect_rows(result: QueryResult) -> Vec<RowMap> {
    result.into_rows().expect("expected rows, got a status")
}

/// Unwrap a DDL/DML result into its status line.
pub fn expect_status(result: QueryResult) -> String {
    result
        .status()
        .expect("expected a status, got rows")
        .to_string()
}

/// Assert that an operation fails with a message containing `expected`.
pub fn assert_error_contains<T: Debug>(result: DbResult<T>, expected: &str) {
    match result {
        Ok(value) => panic!("expected error containing '{expected}', got Ok({value:?})"),
        Err(err) => {
            let message = format!("{err}");
            assert!(
                message.contains(expected),
                "expected error containing '{expected}', got '{message}'"
            );
        }
    }
}
