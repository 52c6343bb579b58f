//! The search submodules (spec.md §4): `SearchDriver` and its
//! collaborators, split out file-per-phase the way `optd-core`'s
//! `cascades/tasks/` directory splits one task type per file.

mod driver;
mod enforcer;
mod finalize;
mod recompute;
mod root_prep;
mod state;

pub use driver::{SearchDriver, SearchDriverProperties};
pub use recompute::CostRecomputer;
