// Copyright (C) 2025 Jeremy J. Carroll. See LICENSE for details.

//! Error taxonomy for rule generation.
//!
//! Three failure families exist, and they are handled very differently:
//!
//! - [`GenError::Retry`] marks a recoverable inconsistency (a code mismatch,
//!   a solid-distance error, a branch conflict). The working set and the
//!   shortcut database have already been updated by the time the error is
//!   raised; the driver catches it and runs another rules iteration.
//! - [`GenError::Surrender`] marks an exhausted budget (timeout, cell cap,
//!   retry cap) or a case the algorithm does not implement. The run aborts
//!   and the diagnostic string is reported to the caller.
//! - [`GenError::Failure`] marks a broken internal invariant and should be
//!   reported as a bug.
//!
//! All three travel through the call stack as ordinary `Result` values;
//! nothing in the crate panics on bad tilings.

use thiserror::Error;

/// Any error produced while inferring tree rules.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenError {
    /// Recoverable inconsistency; another iteration may resolve it.
    #[error("retry: {0}")]
    Retry(String),

    /// Budget exceeded or unimplemented case; the run is abandoned.
    #[error("surrender: {0}")]
    Surrender(String),

    /// Internal invariant breach; a bug in the engine.
    #[error("bug: {0}")]
    Failure(String),
}

impl GenError {
    /// True for the recoverable [`GenError::Retry`] family.
    pub fn is_retry(&self) -> bool {
        matches!(self, GenError::Retry(_))
    }
}

/// Result alias used throughout the engine.
pub type GenResult<T> = Result<T, GenError>;

pub(crate) fn retry(msg: impl Into<String>) -> GenError {
    GenError::Retry(msg.into())
}

pub(crate) fn surrender(msg: impl Into<String>) -> GenError {
    GenError::Surrender(msg.into())
}

pub(crate) fn failure(msg: impl Into<String>) -> GenError {
    GenError::Failure(msg.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_retry() {
        assert!(retry("x").is_retry());
        assert!(!surrender("x").is_retry());
        assert!(!failure("x").is_retry());
    }

    #[test]
    fn test_display_prefixes() {
        assert_eq!(retry("solid error").to_string(), "retry: solid error");
        assert_eq!(surrender("timeout").to_string(), "surrender: timeout");
        assert_eq!(failure("bad spin").to_string(), "bug: bad spin");
    }
}
