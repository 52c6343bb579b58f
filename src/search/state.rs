//! `GroupState` and its stable-address pool (spec.md §3 "GroupState", §9
//! "Stable-address allocation").
//!
//! The source keeps a growable hash map from `(group, required)` to a
//! pointer into a page allocator so references survive further allocation
//! while recursion holds them. The idiomatic-Rust equivalent used here is a
//! `Vec<Box<RefCell<GroupState>>>`: growing the `Vec` only ever moves the
//! `Box` pointers it holds, never the heap-allocated `GroupState`s
//! themselves, so a `&RefCell<GroupState>` handed out earlier stays valid
//! across every later `get_or_create` call — the same guarantee spec.md
//! §9 asks for, without `unsafe` or a true arena crate (see DESIGN.md for
//! why `typed-arena` was dropped in favor of this).

use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap};

use crate::cost::Cost;
use crate::expr::{ExprId, GroupId};
use crate::props::PropsHandle;

/// Opaque scratch the explorer owns for incremental exploration bookkeeping
/// (spec.md §3 "exploreState"). This crate's explorer tracks completion
/// per-group itself (`DefaultExplorer::explored`), so the scratch slot is
/// unused here but kept on `GroupState` to preserve the documented shape.
#[derive(Default, Clone, Copy)]
pub struct ExploreScratch;

pub struct GroupState {
    pub group: GroupId,
    pub required: PropsHandle,
    pub best: Option<ExprId>,
    pub cost: Cost,
    pub fully_optimized: bool,
    pub fully_optimized_members: BTreeSet<usize>,
    pub explore_state: ExploreScratch,
}

impl GroupState {
    fn new(group: GroupId, required: PropsHandle) -> Self {
        Self {
            group,
            required,
            best: None,
            cost: Cost::zero(),
            fully_optimized: false,
            fully_optimized_members: BTreeSet::new(),
            explore_state: ExploreScratch,
        }
    }

    /// Monotone `(best, cost)` update: replace only with a strictly
    /// cheaper candidate (spec.md §4.1 `ratchetCost`, invariant 2 "the
    /// ratchet invariant").
    pub fn ratchet(&mut self, candidate: ExprId, cost: Cost) {
        if self.best.is_none() || cost.less(&self.cost) {
            self.best = Some(candidate);
            self.cost = cost;
        }
    }
}

type Key = (GroupId, PropsHandle);

/// Per-(group, required) memoization store (spec.md §3 "GroupState",
/// §4 "SearchDriver... owns optimization state map").
#[derive(Default)]
pub struct GroupStatePool {
    slots: Vec<Box<RefCell<GroupState>>>,
    index: HashMap<Key, usize>,
}

impl GroupStatePool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the existing `GroupState` for `(group, required)`, or
    /// allocates a fresh one. The returned reference remains valid for the
    /// pool's entire lifetime, even across later calls to this method
    /// (spec.md §3 invariant 1: "at most one GroupState per required-
    /// properties identity").
    pub fn get_or_create(&mut self, group: GroupId, required: &PropsHandle) -> &RefCell<GroupState> {
        let key = (group, required.clone());
        let idx = *self
            .index
            .entry(key)
            .or_insert_with(|| {
                self.slots.push(Box::new(RefCell::new(GroupState::new(group, required.clone()))));
                self.slots.len() - 1
            });
        &self.slots[idx]
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.index.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ordering::{Ordering, Presentation};
    use crate::props::RequiredPhysicalProps;

    #[test]
    fn ratchet_never_replaces_with_equal_or_higher_cost() {
        let mut state = GroupState::new(GroupId(0), PropsHandle::new(RequiredPhysicalProps::any()));
        state.ratchet(ExprId(1), Cost::new(10.0));
        state.ratchet(ExprId(2), Cost::new(10.0));
        assert_eq!(state.best, Some(ExprId(1)), "tie keeps the first-seen candidate");
        state.ratchet(ExprId(3), Cost::new(9.0));
        assert_eq!(state.best, Some(ExprId(3)));
        state.cost = Cost::new(9.0);
        state.ratchet(ExprId(4), Cost::new(20.0));
        assert_eq!(state.best, Some(ExprId(3)), "never replaced by a higher cost");
    }

    #[test]
    fn pool_returns_stable_reference_across_further_allocations() {
        let mut pool = GroupStatePool::new();
        let props_a = PropsHandle::new(RequiredPhysicalProps::new(Ordering::any(), Presentation::any()));
        let first = pool.get_or_create(GroupId(0), &props_a) as *const _;
        for i in 1..50 {
            let props_i = PropsHandle::new(RequiredPhysicalProps::new(Ordering::any(), Presentation::any()));
            pool.get_or_create(GroupId(i), &props_i);
        }
        let again = pool.get_or_create(GroupId(0), &props_a) as *const _;
        assert_eq!(first, again, "address is stable across further allocations");
    }
}
