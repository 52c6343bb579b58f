//! Error taxonomy for the search driver (spec.md §7).
//!
//! `optd-core`'s collaborators mostly propagate `anyhow::Result` and
//! `bail!()` at the call sites that build the memo; the driver itself needs
//! a closed, matchable taxonomy so callers can distinguish "you called me
//! twice" from "a normalization rule violated an invariant". `SearchError`
//! is that taxonomy; `anyhow::Error` is still used internally for the
//! factory/explorer stand-ins the way `optd-core` uses it.

use thiserror::Error;

/// Errors `SearchDriver::optimize` can return.
#[derive(Error, Debug)]
pub enum SearchError {
    /// `optimize()` was called a second time on the same driver (spec.md
    /// invariant 6 / property P9).
    #[error("memo has already been optimized")]
    AlreadyOptimized,

    /// The finalized root still carries outer column references (spec.md
    /// invariant 5 / property P5).
    #[error("root expression has dangling outer columns after optimization")]
    DanglingOuterColumns,

    /// The factory's constructor stack depth was non-zero after
    /// optimization, indicating a normalization rule leaked a scope.
    #[error("factory constructor stack is unbalanced after optimization")]
    UnbalancedFactory,

    /// An internal assertion failed deep in the recursive search. Caught at
    /// the `optimize()` boundary via `catch_unwind` and converted here;
    /// genuine Rust panics (stack overflow, `unreachable!()` outside our own
    /// `debug_assert!`s) are not caught and propagate unchanged.
    #[error("internal assertion failed: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, SearchError>;
