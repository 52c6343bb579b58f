//! The memo: the group forest, expression arena and physical-property
//! storage (spec.md §1 "deliberately out of scope... the driver only
//! *consumes* its accessors"; §6 "Memo (state)").
//!
//! Grounded on `optd-core/src/cascades/memo.rs`'s `Group` / `Memo` trait
//! and `NaiveMemo` implementation, simplified to a single concrete
//! implementation (this crate has exactly one, so — like `optd-core`'s
//! `NaiveMemo` is the only `Memo` impl actually wired up in most
//! consumers — an inherent `impl` stands in for the trait).

use std::collections::HashMap;
use std::rc::Rc;

use crate::expr::{ChildRef, ExprId, ExprKind, ExprNode, GroupId, RelOp, ScalarOp};
use crate::ordering::ProvidedOrdering;
use crate::props::{PropsHandle, RelationalProperties};

/// One equivalence class: a linked list of members in insertion order,
/// exactly as spec.md §3 describes ("first member, next member, ...").
pub struct Group {
    pub first_member: Option<ExprId>,
    pub props: Rc<RelationalProperties>,
}

/// A recorded `(required, provided, cost)` annotation for one group,
/// written by `PlanFinalizer::set_lowest_cost_tree` (spec.md §4.3 point 4)
/// and consumed by whoever extracts the final plan.
#[derive(Clone)]
pub struct BestProps {
    pub required: PropsHandle,
    pub provided: ProvidedOrdering,
    pub cost: crate::cost::Cost,
}

pub struct Memo {
    arena: Vec<ExprNode>,
    groups: Vec<Group>,
    root: Option<ExprId>,
    root_props: Option<PropsHandle>,
    optimized: bool,
    best_props: HashMap<GroupId, BestProps>,
}

impl Memo {
    pub fn new() -> Self {
        Self {
            arena: Vec::new(),
            groups: Vec::new(),
            root: None,
            root_props: None,
            optimized: false,
            best_props: HashMap::new(),
        }
    }

    /// Allocates a new group with a single founding member, returning the
    /// member's `ExprId`. Scalar nodes never get a group (spec.md §3:
    /// "Every *relational* expression belongs to exactly one Group").
    pub fn new_group(&mut self, kind: ExprKind, children: Vec<ChildRef>, props: RelationalProperties) -> ExprId {
        debug_assert!(kind.is_relational());
        let group_id = GroupId(self.groups.len());
        let expr_id = self.alloc(ExprNode {
            kind,
            children,
            group: Some(group_id),
            next_member: None,
            has_subquery: false,
        });
        self.groups.push(Group {
            first_member: Some(expr_id),
            props: Rc::new(props),
        });
        expr_id
    }

    /// Appends a new member to an existing group's linked list (what the
    /// out-of-scope explorer does during `exploreGroup`, spec.md §3
    /// "Group"). Returns the new member's `ExprId`.
    pub fn add_member(&mut self, group_id: GroupId, kind: ExprKind, children: Vec<ChildRef>) -> ExprId {
        debug_assert!(kind.is_relational());
        let expr_id = self.alloc(ExprNode {
            kind,
            children,
            group: Some(group_id),
            next_member: None,
            has_subquery: false,
        });
        let mut cur = self.groups[group_id.0]
            .first_member
            .expect("group has at least one member");
        loop {
            let next = self.arena[cur.0].next_member;
            match next {
                Some(n) => cur = n,
                None => break,
            }
        }
        self.arena[cur.0].next_member = Some(expr_id);
        expr_id
    }

    /// Allocates a standalone enforcer expression whose child points at the
    /// given group. Not a group member — it becomes a `GroupState::best`
    /// candidate directly (spec.md §3 "best: ... or an enforcer wrapping a
    /// member").
    pub fn new_enforcer(&mut self, op: RelOp, child_group: GroupId) -> ExprId {
        debug_assert!(op.is_enforcer());
        self.alloc(ExprNode {
            kind: ExprKind::Rel(op),
            children: vec![ChildRef::Group(child_group)],
            group: None,
            next_member: None,
            has_subquery: false,
        })
    }

    pub fn new_scalar(&mut self, op: ScalarOp, children: Vec<ExprId>) -> ExprId {
        let has_subquery =
            matches!(op, ScalarOp::Subquery) || children.iter().any(|c| self.arena[c.0].has_subquery);
        let children = children.into_iter().map(ChildRef::Expr).collect();
        self.alloc(ExprNode {
            kind: ExprKind::Scalar(op),
            children,
            group: None,
            next_member: None,
            has_subquery,
        })
    }

    /// Embeds a relational group as a scalar `Subquery` node.
    pub fn new_subquery(&mut self, group_id: GroupId) -> ExprId {
        self.alloc(ExprNode {
            kind: ExprKind::Scalar(ScalarOp::Subquery),
            children: vec![ChildRef::Group(group_id)],
            group: None,
            next_member: None,
            has_subquery: true,
        })
    }

    fn alloc(&mut self, node: ExprNode) -> ExprId {
        let id = ExprId(self.arena.len());
        self.arena.push(node);
        id
    }

    pub fn expr(&self, id: ExprId) -> &ExprNode {
        &self.arena[id.0]
    }

    pub fn expr_mut(&mut self, id: ExprId) -> &mut ExprNode {
        &mut self.arena[id.0]
    }

    pub fn group(&self, id: GroupId) -> &Group {
        &self.groups[id.0]
    }

    /// `group` of `expr_id`, panicking if `expr_id` names a scalar node.
    pub fn group_of(&self, expr_id: ExprId) -> GroupId {
        self.arena[expr_id.0]
            .group
            .expect("expr is not a relational group member")
    }

    /// Every member of `group`, in insertion order (spec.md §4.1
    /// `optimizeGroup` step 4b "in insertion order, including members
    /// appended by the explorer in earlier iterations").
    pub fn members(&self, group: GroupId) -> Vec<ExprId> {
        let mut out = Vec::new();
        let mut cur = self.groups[group.0].first_member;
        while let Some(id) = cur {
            out.push(id);
            cur = self.arena[id.0].next_member;
        }
        out
    }

    pub fn root_expr(&self) -> Option<ExprId> {
        self.root
    }

    pub fn root_props(&self) -> Option<&PropsHandle> {
        self.root_props.as_ref()
    }

    pub fn root_group(&self) -> Option<GroupId> {
        self.root.map(|id| self.group_of(id))
    }

    /// Replaces the memo's root and its required properties. Used both for
    /// the initial setup and by `RootPreparer`'s rewrites (spec.md §4.2).
    pub fn set_root(&mut self, root: ExprId, props: PropsHandle) {
        self.root = Some(root);
        self.root_props = Some(props);
    }

    pub fn is_optimized(&self) -> bool {
        self.optimized
    }

    pub fn mark_optimized(&mut self) {
        self.optimized = true;
    }

    pub fn set_best_props(&mut self, group: GroupId, entry: BestProps) {
        self.best_props.insert(group, entry);
    }

    pub fn best_props(&self, group: GroupId) -> Option<&BestProps> {
        self.best_props.get(&group)
    }

    /// Clears recorded costs, used by `CostRecomputer` before it
    /// reconstructs them with an unperturbed coster (spec.md §4.4).
    pub fn reset_cost(&mut self, group: GroupId) {
        if let Some(entry) = self.best_props.get_mut(&group) {
            entry.cost = crate::cost::Cost::zero();
        }
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }
}

impl Default for Memo {
    fn default() -> Self {
        Self::new()
    }
}
