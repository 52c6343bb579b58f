//! A cost-based, top-down search driver for a Cascades-style query
//! optimizer's memo: given a memo already populated with one or more
//! logically-equivalent expressions per group, find the cheapest physical
//! plan satisfying a set of required physical properties.
//!
//! The memo, catalog, factory/normalizer and rule engine are the
//! collaborators this crate consumes rather than builds — `search::driver`
//! is the part that matters: recursive top-down optimization with
//! memoized `(group, required properties)` state, on-demand exploration,
//! enforcer insertion for unsatisfiable orderings, and a final
//! tree-rewrite pass that extracts one concrete plan from the memo.

pub mod catalog;
pub mod cost;
pub mod error;
pub mod explorer;
pub mod expr;
pub mod factory;
pub mod memo;
pub mod observer;
pub mod ordering;
pub mod ordering_service;
pub mod props;
pub mod search;

pub use error::{Result, SearchError};
pub use search::{CostRecomputer, SearchDriver, SearchDriverProperties};
