//! Fluent assertions for tests of grammars and generated parsers.

use std::fmt::{Debug, Display};

/// Wraps a `Result` so that tests read as one chain.
pub struct TestResult<T, E> {
    inner: Result<T, E>,
}

impl<T: Debug, E: Display + Debug> TestResult<T, E> {
    pub fn new(result: Result<T, E>) -> Self {
        Self { inner: result }
    }

    /// Asserts success and returns the value.
    pub fn assert_success(self) -> T {
        match self.inner {
            Ok(val) => val,
            Err(e) => {
                panic!("\nTEST FAILED (expected success, got error):\nMessage: {}\nDetails: {:?}\n", e, e);
            }
        }
    }

    /// Asserts success and compares the value.
    pub fn assert_success_is<X>(self, expected: X) -> T
    where
        T: PartialEq<X>,
        X: Debug,
    {
        let val = self.assert_success();
        if val != expected {
            panic!(
                "\nTEST FAILED (value mismatch):\nExpected: {:?}\nGot:      {:?}\n",
                expected, val
            );
        }
        val
    }

    /// Asserts failure and returns the error.
    pub fn assert_failure(self) -> E {
        match self.inner {
            Ok(val) => {
                panic!("\nTEST FAILED (expected failure, got success):\nParsed value: {:?}\n", val);
            }
            Err(e) => e,
        }
    }

    /// Asserts failure and checks that the message contains `expected_msg_part`.
    pub fn assert_failure_contains(self, expected_msg_part: &str) -> E {
        let err = self.assert_failure();
        let actual_msg = err.to_string();
        if !actual_msg.contains(expected_msg_part) {
            panic!(
                "\nTEST FAILED (error message mismatch):\nExpected part: {:?}\nActual msg:    {:?}\n",
                expected_msg_part, actual_msg
            );
        }
        err
    }
}

pub trait Testable<T, E> {
    fn test(self) -> TestResult<T, E>;
}

impl<T: Debug, E: Display + Debug> Testable<T, E> for Result<T, E> {
    fn test(self) -> TestResult<T, E> {
        TestResult::new(self)
    }
}
