//! Ordering service (spec.md §6): `deriveInterestingOrderings`,
//! `orderings.longestCommonPrefix`, `buildProvided`.
//!
//! Grounded on `optd-core/src/physical_prop.rs`'s `PhysicalPropsBuilder`
//! trait, specialized to orderings and backed by the catalog for the one
//! source of "interesting" orderings this design models: index scans. The
//! catalog is threaded in as an explicit parameter rather than stored on
//! the service so `SearchDriver` can own both without a self-referential
//! lifetime.

use crate::catalog::Catalog;
use crate::expr::{ExprId, ExprKind, GroupId, RelOp};
use crate::memo::Memo;
use crate::ordering::{Ordering, ProvidedOrdering};
use crate::props::RequiredPhysicalProps;

pub trait OrderingService {
    /// Orderings `group`'s members can produce cheaply, without a Sort
    /// enforcer (spec.md glossary "Interesting ordering").
    fn derive_interesting_orderings(&self, memo: &Memo, catalog: &Catalog, group: GroupId) -> Vec<Ordering>;

    /// What `expr` actually provides given it was chosen to satisfy
    /// `required` (spec.md §4.3 point 4).
    fn build_provided(&self, memo: &Memo, expr: ExprId, required: &RequiredPhysicalProps) -> ProvidedOrdering;
}

#[derive(Default)]
pub struct CatalogOrderingService;

impl OrderingService for CatalogOrderingService {
    fn derive_interesting_orderings(&self, memo: &Memo, catalog: &Catalog, group: GroupId) -> Vec<Ordering> {
        let mut out = Vec::new();
        for member in memo.members(group) {
            if let ExprKind::Rel(RelOp::Scan { table }) = &memo.expr(member).kind {
                out.extend(catalog.index_orderings(*table));
            }
            if let ExprKind::Rel(RelOp::IndexScan { provided, .. }) = &memo.expr(member).kind {
                out.push(provided.clone());
            }
        }
        out
    }

    fn build_provided(&self, memo: &Memo, expr: ExprId, required: &RequiredPhysicalProps) -> ProvidedOrdering {
        match &memo.expr(expr).kind {
            ExprKind::Rel(RelOp::IndexScan { provided, .. }) => ProvidedOrdering(provided.clone()),
            ExprKind::Rel(RelOp::Sort { output_ordering, .. }) => ProvidedOrdering(output_ordering.clone()),
            ExprKind::Rel(RelOp::Scan { .. }) | ExprKind::Rel(RelOp::Join { .. }) => {
                ProvidedOrdering(Ordering::any())
            }
            ExprKind::Rel(RelOp::Select) => {
                // Select passes its (single relational) child's provided
                // ordering through unchanged; since it was only chosen
                // natively when `required.ordering` is empty, "any" is
                // always a safe answer here.
                let _ = required;
                ProvidedOrdering(Ordering::any())
            }
            ExprKind::Scalar(_) => ProvidedOrdering(Ordering::any()),
        }
    }
}
