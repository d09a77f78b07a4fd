//! Custom assertion helpers for testing the executor and engine layers.

use common::{DbError, DbResult, Row, Status};
use executor::{ExecutionContext, Executor};

/// Asserts that an executor's next row matches `expected` exactly.
pub fn assert_next_row<E: Executor + ?Sized>(
    executor: &mut E,
    ctx: &ExecutionContext,
    expected: &Row,
) {
    let row = executor
        .next(ctx)
        .expect("executor next failed")
        .expect("expected a row but got None");
    assert_eq!(
        &row, expected,
        "row mismatch: expected {:?}, got {:?}",
        expected, row
    );
}

/// Asserts that an executor is exhausted (its next call returns `None`).
pub fn assert_exhausted<E: Executor + ?Sized>(executor: &mut E, ctx: &ExecutionContext) {
    let result = executor.next(ctx).expect("executor next failed");
    assert!(
        result.is_none(),
        "expected executor to be exhausted, got row: {:?}",
        result
    );
}

/// Asserts that `rows` contains exactly `expected`, ignoring order — the
/// shape most scan/join assertions want since operators make no row-order
/// guarantee beyond what an `ORDER BY` plan node enforces.
pub fn assert_rows_unordered_eq(mut rows: Vec<Row>, mut expected: Vec<Row>) {
    let key = |r: &Row| format!("{:?}", r.values);
    rows.sort_by_key(key);
    expected.sort_by_key(key);
    assert_eq!(rows, expected, "row sets differ");
}

/// Asserts that a result is an error whose [`Status`] matches `expected`.
pub fn assert_error_status<T: std::fmt::Debug>(result: DbResult<T>, expected: Status) {
    match result {
        Ok(value) => panic!("expected error with status {expected:?}, got Ok({value:?})"),
        Err(err) => assert_eq!(
            err.status(),
            expected,
            "expected status {expected:?}, got {:?} (from {err})",
            err.status()
        ),
    }
}

/// Asserts that a result is an error whose message contains `needle`.
pub fn assert_error_contains<T: std::fmt::Debug>(result: DbResult<T>, needle: &str) {
    match result {
        Ok(value) => panic!("expected error containing '{needle}', got Ok({value:?})"),
        Err(err) => {
            let message = err.to_string();
            assert!(
                message.contains(needle),
                "expected error to contain '{needle}', got: {message}"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::int_row;

    #[test]
    fn unordered_eq_ignores_order() {
        assert_rows_unordered_eq(
            vec![int_row(&[2]), int_row(&[1])],
            vec![int_row(&[1]), int_row(&[2])],
        );
    }

    #[test]
    #[should_panic(expected = "row sets differ")]
    fn unordered_eq_catches_mismatch() {
        assert_rows_unordered_eq(vec![int_row(&[1])], vec![int_row(&[2])]);
    }

    #[test]
    fn error_status_matches_unique_violation() {
        let result: DbResult<()> = Err(DbError::UniqueConstraintViolation("dup".into()));
        assert_error_status(result, Status::ErrUniqueConstraintViolation);
    }
}
