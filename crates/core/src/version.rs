//! Optimistic concurrency tokens for rows mutated in place.

use crate::error::{DomainError, DomainResult};

/// A persisted row that carries a monotonically increasing version.
///
/// The version is bumped by the store on every successful write; writers state
/// which version they derived their change from via [`ExpectedVersion`].
pub trait Versioned {
    fn version(&self) -> u64;
}

/// Optimistic concurrency expectation for a single row.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ExpectedVersion {
    /// Skip version checking.
    Any,
    /// The row must not exist yet (first insert for a key).
    Absent,
    /// Require the row to be at an exact version.
    Exact(u64),
}

impl ExpectedVersion {
    /// `actual` is `None` when the row does not exist.
    pub fn matches(self, actual: Option<u64>) -> bool {
        match (self, actual) {
            (ExpectedVersion::Any, _) => true,
            (ExpectedVersion::Absent, None) => true,
            (ExpectedVersion::Exact(v), Some(a)) => v == a,
            _ => false,
        }
    }

    pub fn check(self, actual: Option<u64>) -> DomainResult<()> {
        if self.matches(actual) {
            Ok(())
        } else {
            Err(DomainError::conflict(format!(
                "optimistic concurrency check failed (expected: {self:?}, actual: {actual:?})"
            )))
        }
    }

    /// Expectation for a row that was read as `current`.
    pub fn of<T: Versioned>(current: Option<&T>) -> Self {
        match current {
            Some(row) => ExpectedVersion::Exact(row.version()),
            None => ExpectedVersion::Absent,
        }
    }
}
