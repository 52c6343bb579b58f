//! End-to-end scenarios driving `SearchDriver::optimize` against hand-built
//! memos, mirroring the worked examples used to design the driver: a
//! filter-then-sort query, sort-cost comparison, root column pruning, an
//! index satisfying an ORDER BY without an enforcer, join commutation, and
//! the single-optimize guarantee.

use optd_search::catalog::{single_column_index, Catalog, TableDef};
use optd_search::cost::test_support::ScriptedCoster;
use optd_search::cost::{Cost, Coster, SimpleCoster};
use optd_search::explorer::{DefaultExplorer, NullExplorer};
use optd_search::expr::{
    BinOp, ChildRef, ColumnId, ExprId, ExprKind, GroupId, IndexId, JoinOp, RelOp, ScalarOp, TableId, Value,
};
use optd_search::memo::Memo;
use optd_search::ordering::{Ordering, OrderingColumn, Presentation};
use optd_search::props::{PropsHandle, RelationalProperties, RequiredPhysicalProps};
use optd_search::{SearchDriver, SearchError};

const X: ColumnId = ColumnId(0);
const Y: ColumnId = ColumnId(1);
const Z: ColumnId = ColumnId(2);
const TABLE_A: TableId = TableId(0);

fn scan_a(memo: &mut Memo, cols: &[ColumnId]) -> ExprId {
    memo.new_group(
        ExprKind::Rel(RelOp::Scan { table: TABLE_A }),
        vec![],
        RelationalProperties {
            output_columns: cols.to_vec(),
            ..Default::default()
        },
    )
}

fn eq_one_predicate(memo: &mut Memo, col: ColumnId) -> ExprId {
    let colref = memo.new_scalar(ScalarOp::ColumnRef(col), vec![]);
    let one = memo.new_scalar(ScalarOp::Const(Value::Int(1)), vec![]);
    memo.new_scalar(ScalarOp::Binary(BinOp::Eq), vec![colref, one])
}

fn props(ordering: Ordering, presentation: Presentation) -> PropsHandle {
    PropsHandle::new(RequiredPhysicalProps::new(ordering, presentation))
}

/// Scenario 1: `SELECT * FROM a WHERE x=1 ORDER BY y`. Scan (100), Select
/// atop scan (110), global sort enforcer atop select (111).
#[test]
fn sort_select_scan_chooses_the_only_available_plan_at_cost_111() {
    let mut driver = SearchDriver::new(Catalog::new());
    driver.set_explorer(Box::new(NullExplorer));
    driver.set_coster(Box::new(SimpleCoster::default()));

    let scan = scan_a(&mut driver.memo, &[X, Y]);
    let scan_group = driver.memo.group_of(scan);
    let pred = eq_one_predicate(&mut driver.memo, X);
    let select = driver.memo.new_group(
        ExprKind::Rel(RelOp::Select),
        vec![ChildRef::Group(scan_group), ChildRef::Expr(pred)],
        RelationalProperties {
            output_columns: vec![X, Y],
            ..Default::default()
        },
    );
    let select_group = driver.memo.group_of(select);

    let required = props(Ordering::new(vec![OrderingColumn::asc(Y)]), Presentation::any());
    let finalized = driver.optimize(select, required).expect("optimize succeeds");

    // `finalized` must be the Sort enforcer the driver inserted, wrapping
    // the only select member available.
    match &driver.memo().expr(finalized).kind {
        ExprKind::Rel(RelOp::Sort { output_ordering, .. }) => {
            assert_eq!(output_ordering, &Ordering::new(vec![OrderingColumn::asc(Y)]));
        }
        other => panic!("expected a Sort enforcer at the root, got {other:?}"),
    }
    let best = driver.memo().best_props(select_group).expect("best recorded");
    assert_eq!(best.cost.value(), 111.0);
}

/// Scenario 2: two competing realizations of the same required ordering —
/// a cheap select (total 111) and a pricier one (total 160) — must be
/// resolved in favor of the cheaper one via the ratchet's strict
/// less-than, not merely "whichever optimized first".
#[test]
fn the_driver_prefers_the_cheaper_of_two_competing_plans() {
    let mut driver = SearchDriver::new(Catalog::new());
    driver.set_explorer(Box::new(NullExplorer));

    let scan = scan_a(&mut driver.memo, &[X, Y]);
    let scan_group = driver.memo.group_of(scan);
    let pred = eq_one_predicate(&mut driver.memo, X);
    let cheap_select = driver.memo.new_group(
        ExprKind::Rel(RelOp::Select),
        vec![ChildRef::Group(scan_group), ChildRef::Expr(pred)],
        RelationalProperties {
            output_columns: vec![X, Y],
            ..Default::default()
        },
    );
    let select_group = driver.memo.group_of(cheap_select);
    let pred2 = eq_one_predicate(&mut driver.memo, X);
    let pricey_select = driver.memo.add_member(
        select_group,
        ExprKind::Rel(RelOp::Select),
        vec![ChildRef::Group(scan_group), ChildRef::Expr(pred2)],
    );

    let mut coster = ScriptedCoster::new(1.0);
    coster.set(scan, 100.0);
    coster.set(cheap_select, 10.0);
    coster.set(pricey_select, 59.0);
    driver.set_coster(Box::new(coster));

    let required = props(Ordering::new(vec![OrderingColumn::asc(Y)]), Presentation::any());
    driver.optimize(cheap_select, required).expect("optimize succeeds");

    let best = driver.memo().best_props(select_group).expect("best recorded");
    assert_eq!(best.cost.value(), 111.0, "100 (scan) + 10 (cheap select) + 1 (enforcer)");
}

/// Scenario 3: `SELECT x FROM a` where *a* has columns x, y, z.
/// `RootPreparer` must prune the root down to output column `{x}` before
/// search even begins.
#[test]
fn select_x_from_a_prunes_the_root_to_one_column() {
    let mut driver = SearchDriver::new(Catalog::new());
    driver.set_explorer(Box::new(NullExplorer));
    driver.set_coster(Box::new(SimpleCoster::default()));

    let scan = scan_a(&mut driver.memo, &[X, Y, Z]);

    let required = props(Ordering::any(), Presentation(Some(vec![X])));
    let finalized = driver.optimize(scan, required).expect("optimize succeeds");

    let group = driver.memo().group_of(finalized);
    assert_eq!(driver.memo().group(group).props.output_columns, vec![X]);
    assert!(matches!(&driver.memo().expr(finalized).kind, ExprKind::Rel(RelOp::Scan { .. })));
}

/// Same query as above, but with `disable_pruning` set: the root must keep
/// all three columns, since `PruneRootCols` is skipped entirely.
#[test]
fn disable_pruning_keeps_every_root_column() {
    use optd_search::SearchDriverProperties;

    let mut driver = SearchDriver::new(Catalog::new());
    driver.set_explorer(Box::new(NullExplorer));
    driver.set_coster(Box::new(SimpleCoster::default()));
    driver.set_properties(SearchDriverProperties {
        disable_pruning: true,
        ..SearchDriverProperties::default()
    });

    let scan = scan_a(&mut driver.memo, &[X, Y, Z]);

    let required = props(Ordering::any(), Presentation(Some(vec![X])));
    let finalized = driver.optimize(scan, required).expect("optimize succeeds");

    let group = driver.memo().group_of(finalized);
    assert_eq!(driver.memo().group(group).props.output_columns, vec![X, Y, Z]);
}

/// Scenario 4: `SELECT * FROM a ORDER BY y` with an index on y. Exploration
/// must surface an index scan that natively provides the ordering (cost
/// 100), beating `Sort <- Scan` (cost 150), with no enforcer in the final
/// plan.
#[test]
fn an_index_on_the_ordering_column_beats_a_sort_enforcer() {
    let mut catalog = Catalog::new();
    let mut table = TableDef {
        name: "a".into(),
        columns: vec![X, Y],
        indexes: vec![],
    };
    table.indexes.push(single_column_index(IndexId(0), "a_y_idx", Y));
    catalog.add_table(TABLE_A, table);

    let mut driver = SearchDriver::new(catalog);
    driver.set_explorer(Box::new(DefaultExplorer::new()));
    driver.set_coster(Box::new(SimpleCoster {
        scan_cost: 100.0,
        sort_cost_per_col: 50.0,
        ..SimpleCoster::default()
    }));

    let scan = scan_a(&mut driver.memo, &[X, Y]);

    let required = props(Ordering::new(vec![OrderingColumn::asc(Y)]), Presentation::any());
    let finalized = driver.optimize(scan, required).expect("optimize succeeds");

    match &driver.memo().expr(finalized).kind {
        ExprKind::Rel(RelOp::IndexScan { index, .. }) => assert_eq!(*index, IndexId(0)),
        other => panic!("expected the index scan to win, got {other:?}"),
    }
    let group = driver.memo().group_of(finalized);
    let best = driver.memo().best_props(group).expect("best recorded");
    assert_eq!(best.cost.value(), 100.0);
}

/// Scenario 5: join reordering. `G1` holds `(join G2 G3)`; once the
/// explorer commutes it to `(join G3 G2)`, a coster that favors G3 on the
/// left must make the finalizer rewrite G1's chosen member to the
/// commuted join.
#[test]
fn a_cheaper_commuted_join_wins_after_exploration() {
    struct AsymmetricJoinCoster {
        cheap_left: GroupId,
    }
    impl Coster for AsymmetricJoinCoster {
        fn compute_cost(&self, memo: &Memo, expr: ExprId, _required: &RequiredPhysicalProps) -> Cost {
            match &memo.expr(expr).kind {
                ExprKind::Rel(RelOp::Join { .. }) => {
                    let left = match memo.expr(expr).child(0) {
                        ChildRef::Group(g) => g,
                        ChildRef::Expr(_) => unreachable!("join children are groups before finalization"),
                    };
                    if left == self.cheap_left {
                        Cost::new(5.0)
                    } else {
                        Cost::new(50.0)
                    }
                }
                ExprKind::Rel(RelOp::Scan { .. }) => Cost::new(10.0),
                _ => Cost::zero(),
            }
        }
    }

    let mut driver = SearchDriver::new(Catalog::new());
    driver.set_explorer(Box::new(DefaultExplorer::new()));

    let g2_member = scan_a(&mut driver.memo, &[X]);
    let g3_member = scan_a(&mut driver.memo, &[Y]);
    let g2 = driver.memo.group_of(g2_member);
    let g3 = driver.memo.group_of(g3_member);
    let join = driver.memo.new_group(
        ExprKind::Rel(RelOp::Join { op: JoinOp::Inner }),
        vec![ChildRef::Group(g2), ChildRef::Group(g3)],
        RelationalProperties {
            output_columns: vec![X, Y],
            ..Default::default()
        },
    );
    let g1 = driver.memo.group_of(join);

    driver.set_coster(Box::new(AsymmetricJoinCoster { cheap_left: g3 }));

    let required = props(Ordering::any(), Presentation::any());
    let finalized = driver.optimize(join, required).expect("optimize succeeds");

    assert_eq!(driver.memo().group_of(finalized), g1);
    match driver.memo().expr(finalized).child(0) {
        ChildRef::Expr(left_expr) => {
            assert_eq!(driver.memo().group_of(left_expr), g3, "commuted join should have g3 on the left");
        }
        ChildRef::Group(_) => panic!("finalization must resolve every child to a concrete expression"),
    }
}

/// Scenario 6: a second `optimize()` call on the same driver always fails
/// with `AlreadyOptimized`.
#[test]
fn a_second_optimize_call_fails() {
    let mut driver = SearchDriver::new(Catalog::new());
    driver.set_explorer(Box::new(NullExplorer));
    driver.set_coster(Box::new(SimpleCoster::default()));

    let scan = scan_a(&mut driver.memo, &[X]);

    let required = props(Ordering::any(), Presentation::any());
    driver.optimize(scan, required.clone()).expect("first optimize succeeds");

    let err = driver.optimize(scan, required).unwrap_err();
    assert!(matches!(err, SearchError::AlreadyOptimized));
}
