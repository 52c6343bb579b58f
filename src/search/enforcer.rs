//! Enforcer planning (spec.md §4.1 `enforceProps` / `optimizeEnforcer`).
//!
//! Grounded on `optd-core/src/cascades/tasks/optimize_inputs.rs`'s enforcer
//! insertion, which tries a full sort and then falls back on a cheaper
//! partial sort fed by whatever prefix the ordering service can already
//! supply. A free function taking `&mut SearchDriver` rather than a stored
//! collaborator, since it recurses back into `SearchDriver::optimize_group`
//! and a method on a type `SearchDriver` owns would be a borrow cycle.

use crate::expr::{ExprId, RelOp};
use crate::ordering::Ordering;
use crate::props::PropsHandle;
use crate::error::Result;

use super::driver::SearchDriver;

pub struct EnforcerPlanner;

impl EnforcerPlanner {
    /// Tries to satisfy `required` on `member`'s group via a Sort enforcer,
    /// ratcheting any enforcer candidate into the `(group, required)`
    /// `GroupState` directly. Returns whether every recursive child
    /// optimization this attempted is itself fully optimized (spec.md §4.1
    /// step 1's completion contribution).
    pub fn enforce_props(driver: &mut SearchDriver, member: ExprId, required: &PropsHandle) -> Result<bool> {
        if required.ordering.is_empty() {
            return Ok(true);
        }
        let group = driver.memo.group_of(member);
        let mut fully_optimized = true;

        // A full sort: the child is optimized under "no ordering required".
        {
            let child_required = driver.intern_props(required.with_ordering(Ordering::any()));
            let enforcer = driver.memo.new_enforcer(
                RelOp::Sort {
                    output_ordering: required.ordering.clone(),
                    input_ordering: Ordering::any(),
                },
                group,
            );
            if !Self::optimize_enforcer(driver, group, required, enforcer, &child_required)? {
                fully_optimized = false;
            }
        }

        // A partial sort: feed the enforcer the longest prefix of `required`
        // any interesting ordering on this group already supplies, so the
        // enforcer only has to impose the remaining suffix.
        let interesting = driver
            .ordering_service()
            .derive_interesting_orderings(&driver.memo, &driver.catalog, group);
        let mut best_prefix: Option<Ordering> = None;
        for o in &interesting {
            let prefix = o.longest_common_prefix(&required.ordering);
            if !prefix.is_empty() && prefix.len() < required.ordering.len() {
                if best_prefix.as_ref().map_or(true, |b| prefix.len() > b.len()) {
                    best_prefix = Some(prefix);
                }
            }
        }
        if let Some(prefix) = best_prefix {
            let child_required = driver.intern_props(required.with_ordering(prefix.clone()));
            let enforcer = driver.memo.new_enforcer(
                RelOp::Sort {
                    output_ordering: required.ordering.clone(),
                    input_ordering: prefix,
                },
                group,
            );
            if !Self::optimize_enforcer(driver, group, required, enforcer, &child_required)? {
                fully_optimized = false;
            }
        }

        Ok(fully_optimized)
    }

    fn optimize_enforcer(
        driver: &mut SearchDriver,
        group: crate::expr::GroupId,
        enforcer_required: &PropsHandle,
        enforcer: ExprId,
        child_required: &PropsHandle,
    ) -> Result<bool> {
        driver.optimize_group(group, child_required)?;
        let (child_cost, child_done) = driver.state_snapshot(group, child_required);
        let enforcer_cost = driver
            .coster()
            .compute_cost(&driver.memo, enforcer, enforcer_required);
        let total = child_cost.add(enforcer_cost);
        driver.ratchet_state(group, enforcer_required, enforcer, total);
        Ok(child_done)
    }
}
