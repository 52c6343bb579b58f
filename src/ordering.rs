//! Ordering, presentation and functional dependencies (spec.md §3 "Required
//! physical properties", §6 "Ordering service").
//!
//! Grounded on `optd-core/src/physical_prop.rs` / `physical_property.rs`'s
//! `PhysicalPropertyBuilder` trait family, specialized here to the one
//! enforceable property this design needs: ordering. `FuncDepSet` models just
//! enough of a functional-dependency lattice (constant columns,
//! equivalence classes) to make `canSimplify` / `simplify` meaningful.

use std::collections::HashSet;

use crate::expr::ColumnId;

#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub struct OrderingColumn {
    pub col: ColumnId,
    pub descending: bool,
}

impl OrderingColumn {
    pub fn asc(col: ColumnId) -> Self {
        Self {
            col,
            descending: false,
        }
    }

    pub fn desc(col: ColumnId) -> Self {
        Self {
            col,
            descending: true,
        }
    }
}

/// A required or provided column ordering.
#[derive(Clone, PartialEq, Eq, Debug, Default, Hash)]
pub struct Ordering(pub Vec<OrderingColumn>);

impl Ordering {
    pub fn new(cols: Vec<OrderingColumn>) -> Self {
        Self(cols)
    }

    pub fn any() -> Self {
        Self(Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn copy(&self) -> Self {
        self.clone()
    }

    pub fn col_set(&self) -> HashSet<ColumnId> {
        self.0.iter().map(|c| c.col).collect()
    }

    pub fn subset_of_cols(&self, cols: &HashSet<ColumnId>) -> bool {
        self.0.iter().all(|c| cols.contains(&c.col))
    }

    /// Truncates the ordering at the first column no longer present in
    /// `cols`, used by `RootPreparer::PruneRootCols` when column pruning
    /// drops a column the required ordering referenced.
    pub fn project_cols(&self, cols: &HashSet<ColumnId>) -> Self {
        let mut out = Vec::new();
        for c in &self.0 {
            if !cols.contains(&c.col) {
                break;
            }
            out.push(*c);
        }
        Self(out)
    }

    /// Longest run of leading columns shared with `other`, used by the
    /// ordering service's `longestCommonPrefix`.
    pub fn longest_common_prefix(&self, other: &Ordering) -> Ordering {
        let n = self.0.iter().zip(other.0.iter()).take_while(|(a, b)| a == b).count();
        Ordering(self.0[..n].to_vec())
    }

    /// True iff functional dependencies let `simplify` drop or dedup a
    /// column: a constant column, or a column that is functionally
    /// equivalent to one already present in the ordering.
    pub fn can_simplify(&self, fd: &FuncDepSet) -> bool {
        let mut seen_classes: Vec<usize> = Vec::new();
        for c in &self.0 {
            if fd.is_constant(c.col) {
                return true;
            }
            if let Some(class) = fd.equivalence_class_of(c.col) {
                if seen_classes.contains(&class) {
                    return true;
                }
                seen_classes.push(class);
            }
        }
        false
    }

    /// Drops constant columns and collapses consecutive columns that are
    /// functionally equivalent to one already kept.
    pub fn simplify(&self, fd: &FuncDepSet) -> Self {
        let mut out = Vec::new();
        let mut seen_classes: Vec<usize> = Vec::new();
        for c in &self.0 {
            if fd.is_constant(c.col) {
                continue;
            }
            if let Some(class) = fd.equivalence_class_of(c.col) {
                if seen_classes.contains(&class) {
                    continue;
                }
                seen_classes.push(class);
            }
            out.push(*c);
        }
        Self(out)
    }
}

/// Functional dependencies relevant to ordering simplification: columns
/// pinned to a single value by an equality predicate, and groups of
/// columns known equal to each other.
#[derive(Clone, Debug, Default)]
pub struct FuncDepSet {
    constant_cols: HashSet<ColumnId>,
    equiv_classes: Vec<HashSet<ColumnId>>,
}

impl FuncDepSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_constant(mut self, col: ColumnId) -> Self {
        self.constant_cols.insert(col);
        self
    }

    pub fn with_equivalence(mut self, cols: impl IntoIterator<Item = ColumnId>) -> Self {
        self.equiv_classes.push(cols.into_iter().collect());
        self
    }

    pub fn is_constant(&self, col: ColumnId) -> bool {
        self.constant_cols.contains(&col)
    }

    fn equivalence_class_of(&self, col: ColumnId) -> Option<usize> {
        self.equiv_classes.iter().position(|c| c.contains(&col))
    }
}

/// Required output column layout. `None` means any layout of the group's
/// output columns satisfies the requirement.
#[derive(Clone, PartialEq, Eq, Debug, Default, Hash)]
pub struct Presentation(pub Option<Vec<ColumnId>>);

impl Presentation {
    pub fn any() -> Self {
        Self(None)
    }
}

/// What a chosen plan actually supplies, as opposed to what was required
/// (spec.md glossary "Provided physical properties").
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct ProvidedOrdering(pub Ordering);

#[cfg(test)]
mod tests {
    use super::*;

    fn col(n: u32) -> ColumnId {
        ColumnId(n)
    }

    #[test]
    fn simplify_drops_constant_column() {
        let fd = FuncDepSet::new().with_constant(col(1));
        let ordering = Ordering::new(vec![OrderingColumn::asc(col(1)), OrderingColumn::asc(col(2))]);
        assert!(ordering.can_simplify(&fd));
        let simplified = ordering.simplify(&fd);
        assert_eq!(simplified, Ordering::new(vec![OrderingColumn::asc(col(2))]));
    }

    #[test]
    fn simplify_collapses_equivalent_columns() {
        let fd = FuncDepSet::new().with_equivalence([col(1), col(2)]);
        let ordering = Ordering::new(vec![OrderingColumn::asc(col(1)), OrderingColumn::asc(col(2))]);
        assert!(ordering.can_simplify(&fd));
        let simplified = ordering.simplify(&fd);
        assert_eq!(simplified, Ordering::new(vec![OrderingColumn::asc(col(1))]));
    }

    #[test]
    fn longest_common_prefix_stops_at_first_mismatch() {
        let a = Ordering::new(vec![OrderingColumn::asc(col(1)), OrderingColumn::asc(col(2))]);
        let b = Ordering::new(vec![OrderingColumn::asc(col(1)), OrderingColumn::desc(col(2))]);
        assert_eq!(a.longest_common_prefix(&b), Ordering::new(vec![OrderingColumn::asc(col(1))]));
    }

    #[test]
    fn project_cols_truncates_at_missing_column() {
        let ordering = Ordering::new(vec![OrderingColumn::asc(col(1)), OrderingColumn::asc(col(2))]);
        let kept: HashSet<ColumnId> = [col(1)].into_iter().collect();
        assert_eq!(ordering.project_cols(&kept), Ordering::new(vec![OrderingColumn::asc(col(1))]));
    }
}
