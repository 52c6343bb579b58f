//! `SearchDriver`: the top-down recursive search (spec.md §4.1).
//!
//! Grounded on `optd-core/src/cascades/optimizer.rs`'s `CascadesOptimizer`
//! (task scheduling, `notify_on_matched_rule`/`notify_on_applied_rule`,
//! `disable_rule`) and its `tasks/optimize_group.rs` /
//! `optimize_inputs.rs` recursion, collapsed into direct recursive calls
//! since this crate has no task queue of its own (spec.md §1 names the
//! scheduler out of scope; only its net effect — top-down, on-demand
//! exploration with memoized group state — matters here).

use std::panic::{self, AssertUnwindSafe};

use tracing::trace;

use crate::catalog::Catalog;
use crate::cost::{Coster, SimpleCoster};
use crate::error::{Result, SearchError};
use crate::explorer::{DefaultExplorer, Explorer};
use crate::expr::{ChildRef, ExprId, GroupId};
use crate::factory::Factory;
use crate::memo::Memo;
use crate::observer::{DisabledRules, RuleObserver};
use crate::ordering_service::{CatalogOrderingService, OrderingService};
use crate::props::{
    build_child_physical_props, build_child_physical_props_scalar, can_provide_physical_props,
    PropsHandle, PropsInterner, RequiredPhysicalProps,
};
use crate::cost::Cost;

use super::enforcer::EnforcerPlanner;
use super::state::GroupStatePool;

/// Configuration knobs passed at construction/`initialize()`, mirroring
/// `optd-core`'s `OptimizerProperties`: no environment variables or config
/// files, since spec.md §6 names no such surface — just an explicit struct
/// the caller builds and hands in.
#[derive(Default, Clone, Debug)]
pub struct SearchDriverProperties {
    /// Skips `PruneRootCols` entirely, leaving the root's columns untouched
    /// even when the factory could narrow them.
    pub disable_pruning: bool,
    /// Caps the total number of `optimize_group` loop iterations across the
    /// whole search; once reached, no group explores further (existing
    /// members still get costed to a fixed point).
    pub partial_explore_iter: Option<usize>,
    /// When the iteration budget above is exhausted, panic instead of
    /// quietly capping exploration. The panic is caught and converted to
    /// `SearchError::Internal` at the `optimize()` boundary like any other
    /// internal assertion failure.
    pub panic_on_budget: bool,
}

/// Owns the memo, catalog and every pluggable collaborator (coster,
/// ordering service, explorer) and drives `optimize()` to completion
/// exactly once (spec.md §4 "SearchDriver").
pub struct SearchDriver {
    pub memo: Memo,
    pub factory: Factory,
    pub catalog: Catalog,
    coster: Box<dyn Coster>,
    ordering_service: Box<dyn OrderingService>,
    explorer: Box<dyn Explorer>,
    states: GroupStatePool,
    interner: PropsInterner,
    observer: RuleObserver,
    disabled_rules: DisabledRules,
    properties: SearchDriverProperties,
    total_iterations: usize,
    budget_used: bool,
    optimized: bool,
}

impl SearchDriver {
    pub fn new(catalog: Catalog) -> Self {
        let mut driver = Self {
            memo: Memo::new(),
            factory: Factory::new(),
            catalog,
            coster: Box::new(SimpleCoster::default()),
            ordering_service: Box::new(CatalogOrderingService),
            explorer: Box::new(DefaultExplorer::new()),
            states: GroupStatePool::new(),
            interner: PropsInterner::new(),
            observer: RuleObserver::new(),
            disabled_rules: DisabledRules::new(),
            properties: SearchDriverProperties::default(),
            total_iterations: 0,
            budget_used: false,
            optimized: false,
        };
        driver.factory.init();
        driver
    }

    /// Resets every piece of mutable search state and installs a fresh
    /// catalog and properties, so the same driver value can be reused for a
    /// new query (spec.md §4 `initialize`).
    pub fn initialize(&mut self, catalog: Catalog, properties: SearchDriverProperties) {
        self.catalog = catalog;
        self.memo = Memo::new();
        self.factory.init();
        self.states.clear();
        self.interner = PropsInterner::new();
        self.properties = properties;
        self.total_iterations = 0;
        self.budget_used = false;
        self.optimized = false;
    }

    pub fn properties(&self) -> &SearchDriverProperties {
        &self.properties
    }

    pub fn set_properties(&mut self, properties: SearchDriverProperties) {
        self.properties = properties;
    }

    pub fn factory(&mut self) -> &mut Factory {
        &mut self.factory
    }

    pub fn memo(&self) -> &Memo {
        &self.memo
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn set_coster(&mut self, coster: Box<dyn Coster>) {
        self.coster = coster;
    }

    pub fn coster(&self) -> &dyn Coster {
        self.coster.as_ref()
    }

    pub fn set_explorer(&mut self, explorer: Box<dyn Explorer>) {
        self.explorer = explorer;
    }

    pub fn set_ordering_service(&mut self, service: Box<dyn OrderingService>) {
        self.ordering_service = service;
    }

    pub fn ordering_service(&self) -> &dyn OrderingService {
        self.ordering_service.as_ref()
    }

    /// Installs a matched-rule predicate; the same predicate also governs
    /// the factory's own normalization rules (spec.md §6 "Observer
    /// callbacks").
    pub fn notify_on_matched_rule(&mut self, f: impl Fn(&str) -> bool + 'static + Clone) {
        self.observer.on_matched(f.clone());
        self.factory.notify_on_matched_rule(f);
    }

    pub fn notify_on_applied_rule(&mut self, f: impl Fn(&str, &str, &str) + 'static + Clone) {
        self.observer.on_applied(f.clone());
        self.factory.notify_on_applied_rule(f);
    }

    /// Forbids every non-essential rule (spec.md §9 "rule-disablement for
    /// testing").
    pub fn disable_optimizations(&mut self) {
        DisabledRules::install_forbid_all(&mut self.observer);
    }

    pub fn disable_rule(&mut self, rule: &'static str) {
        self.disabled_rules.disable(rule);
    }

    pub fn intern_props(&mut self, props: RequiredPhysicalProps) -> PropsHandle {
        self.interner.intern(props)
    }

    pub(crate) fn observer(&self) -> &RuleObserver {
        &self.observer
    }

    pub(crate) fn disabled_rules(&self) -> &DisabledRules {
        &self.disabled_rules
    }

    /// `(cost, fully_optimized)` for an already-populated `GroupState`.
    pub(crate) fn state_snapshot(&mut self, group: GroupId, required: &PropsHandle) -> (Cost, bool) {
        let cell = self.states.get_or_create(group, required);
        let state = cell.borrow();
        (state.cost, state.fully_optimized)
    }

    pub(crate) fn ratchet_state(&mut self, group: GroupId, required: &PropsHandle, candidate: ExprId, cost: Cost) {
        let cell = self.states.get_or_create(group, required);
        cell.borrow_mut().ratchet(candidate, cost);
    }

    /// Runs the search to completion exactly once, returning the chosen
    /// root expression (spec.md §4.1 top level, §4.2 root preparation,
    /// §4.3 finalization).
    pub fn optimize(&mut self, root: ExprId, required: PropsHandle) -> Result<ExprId> {
        if self.optimized {
            return Err(SearchError::AlreadyOptimized);
        }
        self.memo.set_root(root, required);
        super::root_prep::RootPreparer::prepare(self)?;

        let root = self.memo.root_expr().expect("root set above");
        let required = self.memo.root_props().expect("root set above").clone();
        let group = self.memo.group_of(root);

        trace!(event = "search_begin", root = %root, group = %group);
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            stacker::maybe_grow(32 * 1024, 8 * 1024 * 1024, || self.optimize_group(group, &required))
        }));
        match result {
            Ok(inner) => inner?,
            Err(payload) => return Err(Self::panic_to_error(payload)),
        }

        if !self.factory.check_constructor_stack_depth() {
            return Err(SearchError::UnbalancedFactory);
        }

        let finalized = super::finalize::PlanFinalizer::set_lowest_cost_tree(self, group, &required)?;
        if !self.memo.group(group).props.outer_columns.is_empty() {
            return Err(SearchError::DanglingOuterColumns);
        }

        self.optimized = true;
        self.memo.mark_optimized();
        self.memo.set_root(finalized, required);
        trace!(event = "search_finish", root = %finalized);
        Ok(finalized)
    }

    fn panic_to_error(payload: Box<dyn std::any::Any + Send>) -> SearchError {
        if let Some(msg) = payload.downcast_ref::<&str>() {
            SearchError::Internal(msg.to_string())
        } else if let Some(msg) = payload.downcast_ref::<String>() {
            SearchError::Internal(msg.clone())
        } else {
            panic::resume_unwind(payload)
        }
    }

    /// Recursively optimizes `group` under `required` (spec.md §4.1
    /// `optimizeGroup`). Loops until a full pass over every member plus
    /// exploration yields no new work, matching invariant 2's
    /// monotone-completion contract.
    pub(crate) fn optimize_group(&mut self, group: GroupId, required: &PropsHandle) -> Result<()> {
        {
            let cell = self.states.get_or_create(group, required);
            if cell.borrow().fully_optimized {
                return Ok(());
            }
        }
        trace!(event = "task_begin", task = "optimize_group", group = %group);
        loop {
            let mut done = true;

            // Re-read the member list's length on every iteration rather than
            // snapshotting it once: `optimize_group_member` can recurse (via
            // an enforcer) into exploration of this very group, appending a
            // member mid-pass, and that member must still be visited before
            // the pass is allowed to call itself done.
            let mut i = 0;
            while i < self.memo.members(group).len() {
                let member = self.memo.members(group)[i];
                let already = {
                    let cell = self.states.get_or_create(group, required);
                    cell.borrow().fully_optimized_members.contains(&i)
                };
                if already {
                    i += 1;
                    continue;
                }
                let member_done = self.optimize_group_member(group, member, required)?;
                let cell = self.states.get_or_create(group, required);
                if member_done {
                    cell.borrow_mut().fully_optimized_members.insert(i);
                } else {
                    done = false;
                }
                i += 1;
            }

            self.total_iterations += 1;
            if !self.budget_used {
                if let Some(limit) = self.properties.partial_explore_iter {
                    if self.total_iterations >= limit {
                        self.budget_used = true;
                        trace!(event = "budget_exhausted", task = "optimize_group", group = %group);
                        if self.properties.panic_on_budget {
                            panic!("search driver iteration budget exhausted");
                        }
                    }
                }
            }

            if !self.budget_used && self.should_explore(required) {
                let result = self
                    .explorer
                    .explore_group(&mut self.memo, &self.catalog, &self.observer, group);
                if !result.fully_explored {
                    done = false;
                }
            }

            if done {
                let cell = self.states.get_or_create(group, required);
                cell.borrow_mut().fully_optimized = true;
                break;
            }
        }
        trace!(event = "task_finish", task = "optimize_group", group = %group);
        Ok(())
    }

    /// Only groups with no ordering requirement get explored: an enforcer
    /// handles ordering on top of whatever the un-ordered group settles on
    /// (spec.md §4.1 step 3, "exploration happens once per group, keyed
    /// only by the group — not by required properties").
    fn should_explore(&self, required: &PropsHandle) -> bool {
        required.ordering.is_empty()
    }

    /// Costs one member of `group` under `required`: tries the enforcer
    /// path (if an ordering is required), then the native path if the
    /// member can provide the required properties without one. Ratchets
    /// whichever candidates result directly into the group's state.
    fn optimize_group_member(&mut self, group: GroupId, member: ExprId, required: &PropsHandle) -> Result<bool> {
        let mut fully_optimized = EnforcerPlanner::enforce_props(self, member, required)?;

        if can_provide_physical_props(self.memo.expr(member), required) {
            let child_count = self.memo.expr(member).child_count();
            let mut total_cost = Cost::zero();
            for idx in 0..child_count {
                let child = self.memo.expr(member).child(idx);
                let (cost, done) = match child {
                    ChildRef::Group(_) => {
                        let child_required =
                            build_child_physical_props(&self.memo, self.memo.expr(member), idx, required);
                        let child_required = self.intern_props(child_required);
                        self.optimize_expr(child, &child_required)?
                    }
                    ChildRef::Expr(_) => self.optimize_expr(child, required)?,
                };
                total_cost = total_cost.add(cost);
                if !done {
                    fully_optimized = false;
                }
            }
            let own_cost = self.coster.compute_cost(&self.memo, member, required);
            total_cost = total_cost.add(own_cost);
            self.ratchet_state(group, required, member, total_cost);
        }

        Ok(fully_optimized)
    }

    /// Dispatches on child kind (spec.md §4.1 `optimizeExpr`): a group
    /// reference recurses into `optimize_group`; a scalar expression with
    /// no embedded subquery short-circuits at zero cost (invariant 7 /
    /// property P7); a scalar expression that does embed one recurses into
    /// its own children, descending into any nested group through a
    /// `Subquery` node.
    fn optimize_expr(&mut self, child: ChildRef, required: &PropsHandle) -> Result<(Cost, bool)> {
        match child {
            ChildRef::Group(g) => {
                self.optimize_group(g, required)?;
                Ok(self.state_snapshot(g, required))
            }
            ChildRef::Expr(e) => {
                if !self.memo.expr(e).has_subquery {
                    return Ok((Cost::zero(), true));
                }
                let n = self.memo.expr(e).child_count();
                let mut total = Cost::zero();
                let mut done = true;
                for idx in 0..n {
                    let c = self.memo.expr(e).child(idx);
                    let child_required = match c {
                        ChildRef::Group(_) => {
                            let req = build_child_physical_props_scalar(self.memo.expr(e), idx);
                            self.intern_props(req)
                        }
                        ChildRef::Expr(_) => required.clone(),
                    };
                    let (cost, d) = self.optimize_expr(c, &child_required)?;
                    total = total.add(cost);
                    if !d {
                        done = false;
                    }
                }
                Ok((total, done))
            }
        }
    }

    /// Test/diagnostic hook: exposes the memoized `(cost, fully_optimized)`
    /// for `(group, required)` without mutating anything (spec.md §4.4
    /// references re-reading recorded state for the cost-recomputation
    /// diagnostic).
    pub fn peek_state(&mut self, group: GroupId, required: &PropsHandle) -> (Cost, bool, Option<ExprId>) {
        let cell = self.states.get_or_create(group, required);
        let state = cell.borrow();
        (state.cost, state.fully_optimized, state.best)
    }

    /// Detaches the finished memo from the driver (spec.md §4 `detachMemo`),
    /// leaving the driver otherwise unusable until re-`initialize`d.
    pub fn detach_memo(&mut self) -> Memo {
        self.factory.detach();
        std::mem::take(&mut self.memo)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cost::test_support::ScriptedCoster;
    use crate::expr::{ExprKind, RelOp, TableId};
    use crate::ordering::Presentation;
    use crate::props::RelationalProperties;

    fn scan_group(memo: &mut Memo, table: TableId, cols: Vec<crate::expr::ColumnId>) -> ExprId {
        memo.new_group(
            ExprKind::Rel(RelOp::Scan { table }),
            vec![],
            RelationalProperties {
                output_columns: cols,
                ..Default::default()
            },
        )
    }

    #[test]
    fn optimize_picks_cheapest_member_and_refuses_second_call() {
        let mut driver = SearchDriver::new(Catalog::new());
        driver.set_explorer(Box::new(crate::explorer::NullExplorer));
        let scan = scan_group(&mut driver.memo, TableId(0), vec![]);

        let mut coster = ScriptedCoster::new(1.0);
        coster.set(scan, 42.0);
        driver.set_coster(Box::new(coster));

        let required = PropsHandle::new(RequiredPhysicalProps::new(crate::ordering::Ordering::any(), Presentation::any()));
        let result = driver.optimize(scan, required.clone()).expect("optimize succeeds");
        assert_eq!(result, scan);

        let group = driver.memo.group_of(scan);
        let (cost, done, best) = driver.peek_state(group, &required);
        assert!(done);
        assert_eq!(best, Some(scan));
        assert_eq!(cost.value(), 42.0);

        let err = driver.optimize(scan, required).unwrap_err();
        assert!(matches!(err, SearchError::AlreadyOptimized));
    }

    /// Property P2/P3: once a group is `fully_optimized` for some required
    /// props, re-running `optimize_group` against the same key must neither
    /// change the recorded best (completion is monotone) nor do any further
    /// work (the loop terminates immediately on re-entry).
    #[test]
    fn optimize_group_is_a_no_op_once_fully_optimized() {
        let mut driver = SearchDriver::new(Catalog::new());
        driver.set_explorer(Box::new(crate::explorer::NullExplorer));
        let scan = scan_group(&mut driver.memo, TableId(0), vec![]);

        let mut coster = ScriptedCoster::new(1.0);
        coster.set(scan, 42.0);
        driver.set_coster(Box::new(coster));

        let required = PropsHandle::new(RequiredPhysicalProps::new(crate::ordering::Ordering::any(), Presentation::any()));
        let group = driver.memo.group_of(scan);

        driver.optimize_group(group, &required).expect("first pass succeeds");
        let (cost_first, done_first, best_first) = driver.peek_state(group, &required);
        assert!(done_first);

        driver.optimize_group(group, &required).expect("second pass is a no-op");
        let (cost_second, done_second, best_second) = driver.peek_state(group, &required);

        assert!(done_second);
        assert_eq!(cost_first.value(), cost_second.value());
        assert_eq!(best_first, best_second);
    }
}
