//! Required/relational properties and the property-helper free functions
//! (spec.md §6 "Property helpers").
//!
//! `RequiredPhysicalProps` values are interned and compared by identity
//! (spec.md §3: "Two required-property values are compared by identity").
//! `optd-core` interns logical/physical properties behind `Arc<dyn Any>`
//! (`property.rs`, `physical_property.rs`); this crate uses the more
//! direct idiomatic-Rust equivalent, `Rc<RequiredPhysicalProps>` compared
//! with `Rc::ptr_eq`, wrapped in `PropsHandle` so it can key a `HashMap`.

use std::collections::HashSet;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use crate::expr::{ChildRef, ColumnId, ExprNode, RelOp};
use crate::memo::Memo;
use crate::ordering::{Ordering, Presentation};

#[derive(Clone, PartialEq, Eq, Debug, Hash)]
pub struct RequiredPhysicalProps {
    pub ordering: Ordering,
    pub presentation: Presentation,
}

impl RequiredPhysicalProps {
    pub fn new(ordering: Ordering, presentation: Presentation) -> Self {
        Self {
            ordering,
            presentation,
        }
    }

    pub fn any() -> Self {
        Self {
            ordering: Ordering::any(),
            presentation: Presentation::any(),
        }
    }

    pub fn with_ordering(&self, ordering: Ordering) -> Self {
        Self {
            ordering,
            presentation: self.presentation.clone(),
        }
    }
}

/// A reference-counted, identity-comparable handle to an interned
/// `RequiredPhysicalProps`. Two handles are equal iff they point at the
/// *same* allocation, never merely at structurally-equal values.
#[derive(Clone, Debug)]
pub struct PropsHandle(pub Rc<RequiredPhysicalProps>);

impl PropsHandle {
    pub fn new(props: RequiredPhysicalProps) -> Self {
        Self(Rc::new(props))
    }
}

impl PartialEq for PropsHandle {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for PropsHandle {}

impl Hash for PropsHandle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (Rc::as_ptr(&self.0) as usize).hash(state);
    }
}

impl std::ops::Deref for PropsHandle {
    type Target = RequiredPhysicalProps;

    fn deref(&self) -> &RequiredPhysicalProps {
        &self.0
    }
}

/// Interner for required-properties values, so repeated requests for "no
/// ordering, any presentation" inside one optimization share a single
/// allocation and therefore compare equal by identity. `optd-datafusion-repr`
/// interns physical properties the same way at the factory boundary.
#[derive(Default)]
pub struct PropsInterner {
    // Deliberately *not* a structural cache keyed by value: interning a
    // value twice with different call sites must be something the caller
    // does on purpose (e.g. reusing a handle), since identity is the whole
    // point of spec.md's memoization key. This just centralizes allocation.
    count: usize,
}

impl PropsInterner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(&mut self, props: RequiredPhysicalProps) -> PropsHandle {
        self.count += 1;
        PropsHandle::new(props)
    }

    pub fn interned_count(&self) -> usize {
        self.count
    }
}

/// Relational properties shared by every member of a group (spec.md §3
/// "Group... All members share the same relational properties").
#[derive(Clone, Debug, Default)]
pub struct RelationalProperties {
    pub output_columns: Vec<ColumnId>,
    pub func_deps: crate::ordering::FuncDepSet,
    pub outer_columns: HashSet<ColumnId>,
}

impl RelationalProperties {
    pub fn output_col_set(&self) -> HashSet<ColumnId> {
        self.output_columns.iter().copied().collect()
    }
}

/// Does `expr` natively satisfy `required` without an enforcer?
///
/// Only ordering gates this in the current design (spec.md §4.1
/// `enforceProps`: "Only ordering is currently enforceable"); presentation
/// is always satisfiable in place by re-projecting output columns, so every
/// relational operator "natively provides" any presentation.
pub fn can_provide_physical_props(expr: &ExprNode, required: &RequiredPhysicalProps) -> bool {
    let Some(rel) = expr.kind.as_rel() else {
        return false;
    };
    match rel {
        RelOp::Scan { .. } | RelOp::Select | RelOp::Join { .. } => required.ordering.is_empty(),
        RelOp::IndexScan { provided, .. } => {
            required.ordering.is_empty()
                || provided.longest_common_prefix(&required.ordering).len() == required.ordering.len()
        }
        RelOp::Sort { output_ordering, .. } => {
            output_ordering.longest_common_prefix(&required.ordering).len() == required.ordering.len()
        }
    }
}

/// Required properties to impose on child `idx` of a relational `parent`
/// given the parent is being costed under `parent_required`.
pub fn build_child_physical_props(
    _memo: &Memo,
    parent: &ExprNode,
    idx: usize,
    parent_required: &RequiredPhysicalProps,
) -> RequiredPhysicalProps {
    let rel = parent
        .kind
        .as_rel()
        .expect("build_child_physical_props called on a non-relational parent");
    match rel {
        RelOp::Sort { input_ordering, .. } => {
            debug_assert_eq!(idx, 0, "Sort enforcer has exactly one child");
            parent_required.with_ordering(input_ordering.clone())
        }
        RelOp::Scan { .. } | RelOp::IndexScan { .. } => {
            unreachable!("{} has no children", rel.name())
        }
        RelOp::Select | RelOp::Join { .. } => {
            // canProvidePhysicalProps only let us reach here with an empty
            // required ordering (see above), so there is nothing to push
            // down except "no ordering required".
            debug_assert!(parent_required.ordering.is_empty());
            RequiredPhysicalProps::any()
        }
    }
}

/// Required properties for scalar child `idx` of `parent`. Scalar
/// expressions carry no physical-property requirements of their own in this
/// design; this exists purely so a `Subquery` node's embedded group can be
/// optimized under a well-formed (trivial) requirement.
pub fn build_child_physical_props_scalar(_parent: &ExprNode, _idx: usize) -> RequiredPhysicalProps {
    RequiredPhysicalProps::any()
}

/// True iff a relational child slot still points at an unresolved group.
pub fn is_unresolved(child: ChildRef) -> bool {
    matches!(child, ChildRef::Group(_))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn props_handle_identity_not_structural() {
        let a = PropsHandle::new(RequiredPhysicalProps::any());
        let b = PropsHandle::new(RequiredPhysicalProps::any());
        assert_eq!(a.0, b.0, "structurally equal");
        assert_ne!(a, b, "but distinct identities");
        assert_eq!(a, a.clone(), "same Rc compares equal to itself");
    }
}
