//! Cost recomputation diagnostic (spec.md §4.4): walk an already-finalized
//! plan tree bottom-up with a (possibly different) coster and recompute its
//! total cost from scratch, without consulting any memoized `GroupState`.
//!
//! Grounded on `optd-core/src/cascades/optimizer.rs`'s post-hoc
//! `compute_cost` sanity pass, used there to confirm a swapped-in cost
//! model agrees with whatever the search itself produced.

use crate::cost::{Cost, Coster};
use crate::expr::ChildRef;
use crate::memo::Memo;
use crate::props::{build_child_physical_props, RequiredPhysicalProps};

pub struct CostRecomputer;

impl CostRecomputer {
    /// Recomputes the cost of the finalized plan rooted at `root` under
    /// `required`. `root` must already be fully resolved (no remaining
    /// `ChildRef::Group` slots) — exactly the postcondition
    /// `PlanFinalizer::set_lowest_cost_tree` leaves behind.
    pub fn recompute_cost(memo: &Memo, coster: &dyn Coster, root: crate::expr::ExprId, required: &RequiredPhysicalProps) -> Cost {
        Self::recompute_child(memo, coster, ChildRef::Expr(root), required)
    }

    fn recompute_child(memo: &Memo, coster: &dyn Coster, child: ChildRef, required: &RequiredPhysicalProps) -> Cost {
        let ChildRef::Expr(expr) = child else {
            unreachable!("recompute_cost requires an already-finalized tree with no unresolved groups");
        };

        if memo.expr(expr).kind.is_relational() {
            let mut total = coster.compute_cost(memo, expr, required);
            for idx in 0..memo.expr(expr).child_count() {
                let c = memo.expr(expr).child(idx);
                let child_required = build_child_physical_props(memo, memo.expr(expr), idx, required);
                total = total.add(Self::recompute_child(memo, coster, c, &child_required));
            }
            total
        } else if !memo.expr(expr).has_subquery {
            // Scalar expressions carry no cost of their own; a subquery-free
            // subtree short-circuits at zero (spec.md invariant 7 / P7).
            Cost::zero()
        } else {
            let mut total = Cost::zero();
            for idx in 0..memo.expr(expr).child_count() {
                let c = memo.expr(expr).child(idx);
                total = total.add(Self::recompute_child(memo, coster, c, &RequiredPhysicalProps::any()));
            }
            total
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cost::SimpleCoster;
    use crate::expr::{ExprKind, RelOp, TableId};
    use crate::props::RelationalProperties;

    #[test]
    fn recompute_matches_simple_coster_for_a_plain_scan() {
        let mut memo = Memo::new();
        let scan = memo.new_group(
            ExprKind::Rel(RelOp::Scan { table: TableId(0) }),
            vec![],
            RelationalProperties::default(),
        );
        let cost = CostRecomputer::recompute_cost(&memo, &SimpleCoster::default(), scan, &RequiredPhysicalProps::any());
        assert_eq!(cost.value(), SimpleCoster::default().scan_cost);
    }
}
