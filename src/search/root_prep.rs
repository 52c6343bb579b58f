//! Root preparation (spec.md §4.2): `SimplifyRootOrdering` and
//! `PruneRootCols`, each firing at most once before the main search begins.
//!
//! Grounded on `optd-datafusion-repr`'s root-level rewrite pass that runs
//! once before Cascades search proper (simplifying the requested output
//! ordering against known functional dependencies, then projecting away
//! unused columns) — this crate's analogue of that pre-search cleanup,
//! narrowed to exactly the two rules spec.md names.

use std::collections::HashSet;

use crate::error::{Result, SearchError};
use crate::expr::ColumnId;

use super::driver::SearchDriver;

pub struct RootPreparer;

impl RootPreparer {
    pub fn prepare(driver: &mut SearchDriver) -> Result<()> {
        Self::simplify_root_ordering(driver);
        Self::prune_root_cols(driver)?;
        Ok(())
    }

    /// Drops constant columns and de-duplicates functionally-equivalent
    /// columns from the root's required ordering (spec.md §4.2
    /// `SimplifyRootOrdering`).
    fn simplify_root_ordering(driver: &mut SearchDriver) {
        if !driver.observer().matched("SimplifyRootOrdering") {
            return;
        }
        let root = driver.memo.root_expr().expect("root set before prepare");
        let required = driver.memo.root_props().expect("root set before prepare").clone();
        let group = driver.memo.group_of(root);
        let fd = driver.memo.group(group).props.func_deps.clone();

        if !required.ordering.can_simplify(&fd) {
            return;
        }
        let simplified = required.ordering.simplify(&fd);
        let new_required = driver.intern_props(required.with_ordering(simplified));
        driver.memo.set_root(root, new_required);
        driver.observer().applied("SimplifyRootOrdering", "root", "root");
    }

    /// Projects the root down to only the columns the required ordering and
    /// presentation actually reference, when the root's own operator
    /// supports pruning (spec.md §4.2 `PruneRootCols`; scenario 3:
    /// `SELECT x FROM a` prunes a 3-column scan to `{x}`).
    fn prune_root_cols(driver: &mut SearchDriver) -> Result<()> {
        let root = driver.memo.root_expr().expect("root set before prepare");
        let required = driver.memo.root_props().expect("root set before prepare").clone();
        let group = driver.memo.group_of(root);
        let output_cols = driver.memo.group(group).props.output_col_set();

        let mut needed: HashSet<ColumnId> = required.ordering.col_set();
        if let Some(cols) = &required.presentation.0 {
            needed.extend(cols.iter().copied());
        }

        if !needed.is_subset(&output_cols) {
            return Err(SearchError::Internal(
                "PruneRootCols: required columns are not a subset of the root's output columns".into(),
            ));
        }

        if driver.properties().disable_pruning || !driver.observer().matched("PruneRootCols") {
            return Ok(());
        }
        if !driver.factory.custom_funcs().can_prune_cols(&driver.memo, root, &needed) {
            return Ok(());
        }

        let new_group = driver.factory.custom_funcs().prune_cols(&mut driver.memo, root, &needed);
        let new_root = driver
            .memo
            .group(new_group)
            .first_member
            .expect("prune_cols always founds a member");
        let new_output_cols = driver.memo.group(new_group).props.output_col_set();
        let new_ordering = if required.ordering.subset_of_cols(&new_output_cols) {
            required.ordering.clone()
        } else {
            required.ordering.project_cols(&new_output_cols)
        };
        let new_required = driver.intern_props(required.with_ordering(new_ordering));
        driver.memo.set_root(new_root, new_required);
        driver.observer().applied("PruneRootCols", "root", "root-pruned");
        Ok(())
    }
}
