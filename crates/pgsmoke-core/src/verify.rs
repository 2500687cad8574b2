//! Result verification.
//!
//! Failed checks are recorded and the run carries on; the report at the end
//! decides pass or fail. This is the one place where an unexpected value does
//! not abort the run.

use std::fmt::{self, Display, Formatter};

use tracing::warn;

use crate::exercise::UserRow;

/// Names inserted by the exercise and accepted when read back.
pub const EXPECTED_NAMES: [&str; 2] = ["Alice", "Bob"];

/// Row count expected after the insert.
pub const EXPECTED_ROW_COUNT: i64 = 2;

/// A check whose observed value diverged from the expectation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssertionFailure {
    /// A row carried a name outside the expected set.
    UnexpectedName {
        /// Row identifier.
        id: i32,
        /// Name that was read back.
        name: String,
    },
    /// The aggregate count differed from the expected count.
    CountMismatch {
        /// Expected row count.
        expected: i64,
        /// Row count reported by the database.
        observed: i64,
    },
}

impl Display for AssertionFailure {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnexpectedName { id, name } => {
                write!(formatter, "row {id} has unexpected name {name:?}")
            }
            Self::CountMismatch { expected, observed } => {
                write!(formatter, "expected {expected} rows, but got {observed}")
            }
        }
    }
}

/// Accumulates checks over the exercise output.
#[derive(Debug)]
pub struct Verifier<'n> {
    expected_names: &'n [&'n str],
    checks: usize,
    failures: Vec<AssertionFailure>,
}

impl Default for Verifier<'static> {
    fn default() -> Self {
        Self::new(&EXPECTED_NAMES)
    }
}

impl<'n> Verifier<'n> {
    /// Verifier accepting the given names.
    #[must_use]
    pub const fn new(expected_names: &'n [&'n str]) -> Self {
        Self {
            expected_names,
            checks: 0,
            failures: Vec::new(),
        }
    }

    /// Check that the row's name belongs to the expected set.
    /// Returns whether the check passed.
    pub fn check_row(&mut self, row: &UserRow) -> bool {
        self.checks += 1;
        if self.expected_names.contains(&row.name.as_str()) {
            return true;
        }
        self.record(AssertionFailure::UnexpectedName {
            id: row.id,
            name: row.name.clone(),
        });
        false
    }

    /// Check that the observed row count matches `expected`.
    /// Returns whether the check passed.
    pub fn check_count(&mut self, observed: i64, expected: i64) -> bool {
        self.checks += 1;
        if observed == expected {
            return true;
        }
        self.record(AssertionFailure::CountMismatch { expected, observed });
        false
    }

    fn record(&mut self, failure: AssertionFailure) {
        warn!(failure = %failure, "assertion failed");
        self.failures.push(failure);
    }

    /// Close the verifier and produce its report.
    #[must_use]
    pub fn finish(self) -> VerificationReport {
        VerificationReport {
            checks: self.checks,
            failures: self.failures,
        }
    }
}

/// Outcome of every check made during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationReport {
    checks: usize,
    failures: Vec<AssertionFailure>,
}

impl VerificationReport {
    /// `true` when no check failed.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Number of checks performed.
    #[must_use]
    pub const fn checks(&self) -> usize {
        self.checks
    }

    /// Failed checks in the order they were made.
    #[must_use]
    pub fn failures(&self) -> &[AssertionFailure] {
        &self.failures
    }
}

impl Display for VerificationReport {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        write!(
            formatter,
            "{} of {} checks failed",
            self.failures.len(),
            self.checks
        )?;
        for failure in &self.failures {
            write!(formatter, "\n  - {failure}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: i32, name: &str) -> UserRow {
        UserRow {
            id,
            name: name.to_string(),
        }
    }

    #[test]
    fn expected_rows_in_any_order_pass() {
        let mut verifier = Verifier::default();
        assert!(verifier.check_row(&row(2, "Bob")));
        assert!(verifier.check_row(&row(1, "Alice")));
        assert!(verifier.check_count(2, EXPECTED_ROW_COUNT));

        let report = verifier.finish();
        assert!(report.is_success());
        assert_eq!(report.checks(), 3);
        assert_eq!(report.to_string(), "0 of 3 checks failed");
    }

    #[test]
    fn failures_accumulate_instead_of_aborting() {
        let mut verifier = Verifier::default();
        assert!(!verifier.check_row(&row(1, "Mallory")));
        assert!(verifier.check_row(&row(2, "Bob")));
        assert!(!verifier.check_count(3, EXPECTED_ROW_COUNT));

        let report = verifier.finish();
        assert!(!report.is_success());
        assert_eq!(report.checks(), 3);
        assert_eq!(
            report.failures(),
            &[
                AssertionFailure::UnexpectedName {
                    id: 1,
                    name: "Mallory".to_string(),
                },
                AssertionFailure::CountMismatch {
                    expected: 2,
                    observed: 3,
                },
            ]
        );
        let rendered = report.to_string();
        assert!(rendered.starts_with("2 of 3 checks failed"));
        assert!(rendered.contains("expected 2 rows, but got 3"));
    }

    #[test]
    fn membership_is_case_sensitive() {
        let mut verifier = Verifier::default();
        assert!(!verifier.check_row(&row(1, "alice")));
    }

    #[test]
    fn custom_name_sets_are_honoured() {
        let names = ["Carol"];
        let mut verifier = Verifier::new(&names);
        assert!(verifier.check_row(&row(1, "Carol")));
        assert!(!verifier.check_row(&row(2, "Alice")));
    }
}
