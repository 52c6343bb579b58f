//! Plan finalization (spec.md §4.3 `setLowestCostTree`): the root-first
//! rewrite that turns the memoized group forest into one concrete plan
//! tree by following each `GroupState::best` down and overwriting child
//! pointers in place.
//!
//! Grounded on `optd-core/src/cascades/tasks/optimize_group.rs`'s final
//! "extract winner" step, which performs the analogous pointer-rewrite once
//! the task queue drains.

use crate::error::{Result, SearchError};
use crate::expr::{ChildRef, ExprId, GroupId};
use crate::memo::BestProps;
use crate::props::{build_child_physical_props, build_child_physical_props_scalar, PropsHandle};

use super::driver::SearchDriver;

pub struct PlanFinalizer;

impl PlanFinalizer {
    /// Resolves `group`'s chosen member under `required`, rewrites every
    /// relational child slot it still holds from `Group` to `Expr`
    /// (recursing into each child's own required properties first), and
    /// records the `(required, provided, cost)` triple for `group`. Returns
    /// the chosen member's `ExprId`. Running this twice on an
    /// already-finalized group is a no-op: every slot it would touch is
    /// already an `Expr`.
    pub fn set_lowest_cost_tree(driver: &mut SearchDriver, group: GroupId, required: &PropsHandle) -> Result<ExprId> {
        let (cost, _, best) = driver.peek_state(group, required);
        let chosen = best.ok_or_else(|| {
            SearchError::Internal(format!(
                "group {group} has no chosen member for its required properties; search never reached it"
            ))
        })?;

        Self::finalize_children(driver, chosen, required)?;

        let provided = driver.ordering_service().build_provided(&driver.memo, chosen, required);
        driver.memo.set_best_props(
            group,
            BestProps {
                required: required.clone(),
                provided,
                cost,
            },
        );
        Ok(chosen)
    }

    fn finalize_children(driver: &mut SearchDriver, expr: ExprId, required: &PropsHandle) -> Result<()> {
        let child_count = driver.memo.expr(expr).child_count();
        for idx in 0..child_count {
            let child = driver.memo.expr(expr).child(idx);
            match child {
                ChildRef::Group(child_group) => {
                    let child_required =
                        build_child_physical_props(&driver.memo, driver.memo.expr(expr), idx, required);
                    let child_required = driver.intern_props(child_required);
                    let finalized = Self::set_lowest_cost_tree(driver, child_group, &child_required)?;
                    driver.memo.expr_mut(expr).set_child(idx, ChildRef::Expr(finalized));
                }
                // Already resolved to a concrete expression: either a scalar
                // child (finalize its embedded subquery groups, if any), or
                // a relational child an earlier call already rewrote — for
                // which `finalize_scalar` below is a no-op, since relational
                // nodes never set `has_subquery`.
                ChildRef::Expr(e) => {
                    Self::finalize_scalar(driver, e, required)?;
                }
            }
        }
        Ok(())
    }

    fn finalize_scalar(driver: &mut SearchDriver, expr: ExprId, required: &PropsHandle) -> Result<()> {
        if !driver.memo.expr(expr).has_subquery {
            return Ok(());
        }
        let child_count = driver.memo.expr(expr).child_count();
        for idx in 0..child_count {
            let child = driver.memo.expr(expr).child(idx);
            match child {
                ChildRef::Group(child_group) => {
                    let child_required = build_child_physical_props_scalar(driver.memo.expr(expr), idx);
                    let child_required = driver.intern_props(child_required);
                    let finalized = Self::set_lowest_cost_tree(driver, child_group, &child_required)?;
                    driver.memo.expr_mut(expr).set_child(idx, ChildRef::Expr(finalized));
                }
                ChildRef::Expr(e) => {
                    Self::finalize_scalar(driver, e, required)?;
                }
            }
        }
        Ok(())
    }
}
