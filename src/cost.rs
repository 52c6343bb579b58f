//! The coster (spec.md §6 "Coster"): `computeCost(expr, required) -> Cost`
//! plus `Cost.less`.
//!
//! Grounded on `optd-core/src/cost.rs`'s `Cost` / `CostModel` pair, narrowed
//! from a vector cost (`Cost(Vec<f64>)`, compute/io dimensions) to the
//! scalar cost this design needs; `ordered-float` gives the scalar a total
//! order the way `optd-core` leans on it elsewhere in the crate for
//! comparable floating costs.

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::expr::ExprId;
use crate::memo::Memo;
use crate::props::RequiredPhysicalProps;

#[derive(Clone, Copy, Debug, Default, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Cost(pub OrderedFloat<f64>);

impl Cost {
    pub fn new(v: f64) -> Self {
        Self(OrderedFloat(v))
    }

    pub fn zero() -> Self {
        Self::new(0.0)
    }

    pub fn value(&self) -> f64 {
        self.0.into_inner()
    }

    /// Strict less-than, matching `ratchetCost`'s tie-break (spec.md §4.1:
    /// "strict, to ensure progress and break ties deterministically").
    pub fn less(&self, other: &Cost) -> bool {
        self.0 < other.0
    }

    pub fn add(self, other: Cost) -> Cost {
        Cost(self.0 + other.0)
    }
}

impl std::iter::Sum for Cost {
    fn sum<I: Iterator<Item = Cost>>(iter: I) -> Self {
        iter.fold(Cost::zero(), Cost::add)
    }
}

/// `computeCost` is asked only for the operation's own incremental cost;
/// the driver accumulates children's costs separately (spec.md §4.1
/// `optimizeGroupMember` step 2: "Add `coster.computeCost(member, required)`
/// to the accumulated child cost").
pub trait Coster {
    fn compute_cost(&self, memo: &Memo, expr: ExprId, required: &RequiredPhysicalProps) -> Cost;
}

/// A simple structural coster: a fixed per-operator base cost, with `Sort`
/// priced proportional to how much ordering it has to impose. Adequate as
/// a default for consumers that have not wired in a statistics-aware
/// model; scenario/unit tests instead inject a `ScriptedCoster` (see
/// `cost::test_support`) so costs match spec.md §8's worked examples
/// exactly.
#[derive(Clone, Copy, Debug)]
pub struct SimpleCoster {
    pub scan_cost: f64,
    pub select_cost: f64,
    pub join_cost: f64,
    pub sort_cost_per_col: f64,
}

impl Default for SimpleCoster {
    fn default() -> Self {
        Self {
            scan_cost: 100.0,
            select_cost: 10.0,
            join_cost: 50.0,
            sort_cost_per_col: 1.0,
        }
    }
}

impl Coster for SimpleCoster {
    fn compute_cost(&self, memo: &Memo, expr: ExprId, _required: &RequiredPhysicalProps) -> Cost {
        use crate::expr::{ExprKind, RelOp};
        let expr = memo.expr(expr);
        match &expr.kind {
            ExprKind::Rel(RelOp::Scan { .. }) => Cost::new(self.scan_cost),
            ExprKind::Rel(RelOp::IndexScan { .. }) => Cost::new(self.scan_cost),
            ExprKind::Rel(RelOp::Select) => Cost::new(self.select_cost),
            ExprKind::Rel(RelOp::Join { .. }) => Cost::new(self.join_cost),
            ExprKind::Rel(RelOp::Sort { output_ordering, .. }) => {
                Cost::new(self.sort_cost_per_col * output_ordering.len().max(1) as f64)
            }
            ExprKind::Scalar(_) => Cost::zero(),
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub mod test_support {
    use std::collections::HashMap;

    use super::*;

    /// A coster driven by a fixed table of per-expression costs, used to
    /// reproduce spec.md §8's worked scenarios deterministically: the test
    /// that builds the memo knows every `ExprId` it allocated and scripts
    /// the exact cost spec.md's scenario assigns it.
    #[derive(Default)]
    pub struct ScriptedCoster {
        costs: HashMap<ExprId, f64>,
        default_cost: f64,
    }

    impl ScriptedCoster {
        pub fn new(default_cost: f64) -> Self {
            Self {
                costs: HashMap::new(),
                default_cost,
            }
        }

        pub fn set(&mut self, id: ExprId, cost: f64) {
            self.costs.insert(id, cost);
        }
    }

    impl Coster for ScriptedCoster {
        fn compute_cost(&self, _memo: &Memo, expr: ExprId, _required: &RequiredPhysicalProps) -> Cost {
            Cost::new(*self.costs.get(&expr).unwrap_or(&self.default_cost))
        }
    }
}
