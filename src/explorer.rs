//! Explorer (spec.md §1 "deliberately out of scope... only its
//! `exploreGroup(g) -> {fullyExplored}` contract matters here").
//!
//! Grounded on `optd-core/src/cascades/tasks/explore_group.rs` /
//! `explore_expr.rs` and the `Rule` trait in `optd-core/src/rules.rs`:
//! exploration is rule application that appends new members to a group.
//! This crate's explorer implements exactly the two transformations the
//! worked scenarios in spec.md §8 need — discovering an index-scan
//! alternative for a `Scan`, and commuting a two-way `Join` — rather than a
//! general rule engine, since the rule engine itself is named out of scope.
//! The catalog is threaded in as an explicit parameter (rather than stored
//! on the explorer) so `SearchDriver` can own both without a
//! self-referential lifetime.

use std::collections::HashSet;

use crate::catalog::Catalog;
use crate::expr::{ChildRef, ExprKind, GroupId, JoinOp, RelOp};
use crate::memo::Memo;
use crate::observer::RuleObserver;

pub struct ExploreResult {
    pub fully_explored: bool,
}

pub trait Explorer {
    fn explore_group(&mut self, memo: &mut Memo, catalog: &Catalog, observer: &RuleObserver, group: GroupId) -> ExploreResult;
}

/// Tracks, per group, which exploration rules have already fired — the
/// `exploreState` scratch spec.md's `GroupState` names (spec.md §3). The
/// matched-rule observer is threaded in per call rather than stored, so a
/// driver's `notify_on_matched_rule`/`disable_optimizations` governs
/// exploration rules too instead of drifting out of sync with a copy held
/// here.
#[derive(Default)]
pub struct DefaultExplorer {
    explored: HashSet<GroupId>,
}

impl DefaultExplorer {
    pub fn new() -> Self {
        Self::default()
    }

    fn explore_index_scan(&self, memo: &mut Memo, catalog: &Catalog, observer: &RuleObserver, group: GroupId) -> bool {
        let mut applied = false;
        for member in memo.members(group) {
            let ExprKind::Rel(RelOp::Scan { table }) = memo.expr(member).kind.clone() else {
                continue;
            };
            if !observer.matched("GenerateIndexScan") {
                continue;
            }
            for index in catalog.index_orderings(table).into_iter() {
                let already_present = memo.members(group).iter().any(|m| {
                    matches!(
                        &memo.expr(*m).kind,
                        ExprKind::Rel(RelOp::IndexScan { provided, .. }) if *provided == index
                    )
                });
                if already_present {
                    continue;
                }
                let ix = catalog
                    .table(table)
                    .expect("table exists")
                    .indexes
                    .iter()
                    .find(|ix| ix.ordering == index)
                    .expect("index producing this ordering exists");
                memo.add_member(
                    group,
                    ExprKind::Rel(RelOp::IndexScan {
                        table,
                        index: ix.id,
                        provided: index,
                    }),
                    vec![],
                );
                applied = true;
                observer.applied("GenerateIndexScan", "Scan", "IndexScan");
            }
        }
        applied
    }

    fn explore_join_commute(&self, memo: &mut Memo, observer: &RuleObserver, group: GroupId) -> bool {
        let mut applied = false;
        for member in memo.members(group) {
            let (op, children) = match &memo.expr(member).kind {
                ExprKind::Rel(RelOp::Join { op }) => (*op, memo.expr(member).children.clone()),
                _ => continue,
            };
            if children.len() < 2 || !observer.matched("JoinCommute") {
                continue;
            }
            let (left, right) = match (children[0], children[1]) {
                (ChildRef::Group(l), ChildRef::Group(r)) => (l, r),
                _ => continue,
            };
            let swapped_exists = memo.members(group).iter().any(|m| {
                matches!(
                    &memo.expr(*m).children[..2.min(memo.expr(*m).children.len())],
                    [ChildRef::Group(l), ChildRef::Group(r)] if *l == right && *r == left
                )
            });
            if swapped_exists {
                continue;
            }
            let mut new_children = children.clone();
            new_children[0] = ChildRef::Group(right);
            new_children[1] = ChildRef::Group(left);
            memo.add_member(group, ExprKind::Rel(RelOp::Join { op }), new_children);
            applied = true;
            observer.applied("JoinCommute", "Join(a,b)", "Join(b,a)");
        }
        applied
    }
}

impl Explorer for DefaultExplorer {
    fn explore_group(&mut self, memo: &mut Memo, catalog: &Catalog, observer: &RuleObserver, group: GroupId) -> ExploreResult {
        if self.explored.contains(&group) {
            return ExploreResult { fully_explored: true };
        }
        let applied_index_scan = self.explore_index_scan(memo, catalog, observer, group);
        let applied_join_commute = self.explore_join_commute(memo, observer, group);
        let applied = applied_index_scan || applied_join_commute;
        if !applied {
            self.explored.insert(group);
        }
        ExploreResult { fully_explored: !applied }
    }
}

/// Always reports full exploration without generating alternatives —
/// useful when a caller already built every member it wants by hand (most
/// unit tests) and doesn't need rule-driven discovery.
#[derive(Default)]
pub struct NullExplorer;

impl Explorer for NullExplorer {
    fn explore_group(&mut self, _memo: &mut Memo, _catalog: &Catalog, _observer: &RuleObserver, _group: GroupId) -> ExploreResult {
        ExploreResult { fully_explored: true }
    }
}

impl JoinOp {
    pub fn commuted_name(&self) -> &'static str {
        match self {
            JoinOp::Inner => "InnerJoin",
            JoinOp::Hash => "HashJoin",
            JoinOp::NestedLoop => "NestedLoopJoin",
        }
    }
}
