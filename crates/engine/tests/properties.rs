// Property-based tests for the position index and the history log.
// CI: 128 cases (default). Soak: PROPTEST_CASES=10000 cargo test --release

use memgrid_engine::cell_id::SequentialUids;
use memgrid_engine::edit::{EditOutcome, Side};
use memgrid_engine::sheet::Sheet;
use proptest::prelude::*;

fn config() -> ProptestConfig {
    ProptestConfig {
        cases: std::env::var("PROPTEST_CASES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(128),
        failure_persistence: None,
        ..ProptestConfig::default()
    }
}

#[derive(Debug, Clone)]
enum Op {
    Edit(usize, usize, String),
    InsertRow(usize, bool),
    InsertCol(usize, bool),
    DeleteRow(usize),
    DeleteCol(usize),
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (any::<usize>(), any::<usize>(), r"[a-z]{0,6}").prop_map(|(r, c, v)| Op::Edit(r, c, v)),
        1 => (any::<usize>(), any::<bool>()).prop_map(|(r, b)| Op::InsertRow(r, b)),
        1 => (any::<usize>(), any::<bool>()).prop_map(|(c, b)| Op::InsertCol(c, b)),
        1 => any::<usize>().prop_map(Op::DeleteRow),
        1 => any::<usize>().prop_map(Op::DeleteCol),
    ]
}

fn side(before: bool) -> Side {
    if before {
        Side::Before
    } else {
        Side::After
    }
}

/// Apply one op through an acting cell picked from the current grid and
/// return how many history records it should have appended.
fn apply(sheet: &mut Sheet, op: &Op) -> usize {
    let rows = sheet.row_count();
    let cols = sheet.col_count();
    let acting = |r: usize, c: usize| sheet.hash_sheet()[r % rows][c % cols].clone();
    let (outcome, grown) = match op {
        Op::Edit(r, c, v) => {
            let uid = acting(*r, *c);
            (sheet.set_value(&uid, v.clone()).unwrap(), 1)
        }
        Op::InsertRow(r, before) => {
            let uid = acting(*r, 0);
            (sheet.insert_row(&uid, side(*before)).unwrap(), cols)
        }
        Op::InsertCol(c, before) => {
            let uid = acting(0, *c);
            (sheet.insert_column(&uid, side(*before)).unwrap(), rows)
        }
        Op::DeleteRow(r) => {
            let uid = acting(*r, 0);
            (sheet.delete_row(&uid).unwrap(), 0)
        }
        Op::DeleteCol(c) => {
            let uid = acting(0, *c);
            (sheet.delete_column(&uid).unwrap(), 0)
        }
    };
    match outcome {
        EditOutcome::Rejected(_) => 0,
        _ => grown,
    }
}

proptest! {
    #![proptest_config(config())]

    #[test]
    fn index_matches_grid_after_every_edit(ops in prop::collection::vec(arb_op(), 1..40)) {
        let mut sheet = Sheet::with_uids("P", 3, 3, Box::new(SequentialUids::default()));
        for op in &ops {
            let _ = apply(&mut sheet, op);

            let before = sheet.position_index().rebuild_count();
            for (r, row) in sheet.hash_sheet().iter().enumerate() {
                for (c, uid) in row.iter().enumerate() {
                    prop_assert_eq!(sheet.position_of(uid), Some((r, c)));
                }
            }
            prop_assert!(sheet.position_index().rebuild_count() - before <= 1);
            prop_assert!(sheet.row_count() >= 2);
            prop_assert!(sheet.col_count() >= 2);
            let width = sheet.col_count();
            prop_assert!(sheet.hash_sheet().iter().all(|row| row.len() == width));
        }
    }

    #[test]
    fn history_is_append_only(ops in prop::collection::vec(arb_op(), 1..40)) {
        let mut sheet = Sheet::with_uids("P", 3, 3, Box::new(SequentialUids::default()));
        for op in &ops {
            let earlier = sheet.history().to_vec();
            let grown = apply(&mut sheet, op);

            prop_assert_eq!(sheet.history().len(), earlier.len() + grown);
            prop_assert_eq!(&sheet.history()[..earlier.len()], &earlier[..]);
        }
    }
}
