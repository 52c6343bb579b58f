//! Factory / normalizer (spec.md §1 "deliberately out of scope... the
//! factory / normalizer that produces the initial canonical form"; §6
//! "Factory").
//!
//! Grounded on `optd-core/src/cascades/optimizer.rs`'s expression
//! construction path (`CascadesOptimizer::new`, rule registration) and the
//! `customFuncs().canPruneCols / pruneCols` contract spec.md names
//! directly, modeled on `optd-datafusion-repr`'s column-pruning rule
//! convention of threading a needed-column set down through a rewrite.

use std::collections::HashSet;

use crate::expr::{ColumnId, ExprId, GroupId};
use crate::memo::Memo;
use crate::observer::RuleObserver;

/// Tracks nested "building a plan node" scopes the way `optd-core`'s
/// builder pushes/pops predicate contexts; left non-zero after
/// optimization is the `UnbalancedFactory` condition (spec.md §7).
#[derive(Default)]
pub struct Factory {
    constructor_stack_depth: usize,
    observer: RuleObserver,
}

impl Factory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn init(&mut self) {
        self.constructor_stack_depth = 0;
    }

    pub fn notify_on_matched_rule(&mut self, f: impl Fn(&str) -> bool + 'static) {
        self.observer.on_matched(f);
    }

    pub fn notify_on_applied_rule(&mut self, f: impl Fn(&str, &str, &str) + 'static) {
        self.observer.on_applied(f);
    }

    pub fn observer(&self) -> &RuleObserver {
        &self.observer
    }

    pub fn push_constructor_scope(&mut self) {
        self.constructor_stack_depth += 1;
    }

    pub fn pop_constructor_scope(&mut self) {
        self.constructor_stack_depth -= 1;
    }

    pub fn check_constructor_stack_depth(&self) -> bool {
        self.constructor_stack_depth == 0
    }

    pub fn custom_funcs(&self) -> CustomFuncs {
        CustomFuncs
    }

    /// Seizes nothing itself — `detachMemo` lives on the driver, which
    /// owns the memo; the factory only needs to forget its own transient
    /// scratch state when the driver resets.
    pub fn detach(&mut self) {
        self.constructor_stack_depth = 0;
    }
}

/// Stateless column-pruning helpers. Carries no reference to the owning
/// `Factory` so `SearchDriver` can call it while also holding a `&mut Memo`
/// borrow without a field-borrow conflict.
pub struct CustomFuncs;

impl CustomFuncs {
    /// Whether `root`'s expression kind accepts column pruning at all
    /// (spec.md §4.2 `PruneRootCols`: "If the factory's pruning helper
    /// accepts the pair (root, neededCols)"). `Scan` is the only pruning
    /// target this design implements; anything else declines, leaving the
    /// root untouched.
    pub fn can_prune_cols(&self, memo: &Memo, root: ExprId, needed: &HashSet<ColumnId>) -> bool {
        use crate::expr::{ExprKind, RelOp};
        let output = memo.group(memo.group_of(root)).props.output_col_set();
        matches!(&memo.expr(root).kind, ExprKind::Rel(RelOp::Scan { .. }))
            && needed.is_subset(&output)
            && needed.len() < output.len()
    }

    /// Replaces `root`'s group with a pruned variant whose output columns
    /// are exactly `needed` (spec.md scenario 3: `SELECT x FROM a` prunes a
    /// 3-column scan down to `{x}`). Returns the new root's group.
    pub fn prune_cols(&self, memo: &mut Memo, root: ExprId, needed: &HashSet<ColumnId>) -> GroupId {
        use crate::expr::{ExprKind, RelOp};
        use crate::props::RelationalProperties;

        let ExprKind::Rel(RelOp::Scan { table }) = memo.expr(root).kind.clone() else {
            unreachable!("can_prune_cols gates this to Scan roots");
        };
        let old_props = memo.group(memo.group_of(root)).props.clone();
        let mut cols: Vec<ColumnId> = old_props
            .output_columns
            .iter()
            .copied()
            .filter(|c| needed.contains(c))
            .collect();
        cols.sort_by_key(|c| c.0);
        let pruned_props = RelationalProperties {
            output_columns: cols,
            func_deps: old_props.func_deps.clone(),
            outer_columns: old_props.outer_columns.clone(),
        };
        let new_root = memo.new_group(ExprKind::Rel(RelOp::Scan { table }), vec![], pruned_props);
        memo.group_of(new_root)
    }
}
