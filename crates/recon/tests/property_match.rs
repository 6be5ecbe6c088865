// Property-based tests for matching and marking.
// CI: 256 cases (default). Soak: PROPTEST_CASES=10000 cargo test --release

use proptest::prelude::*;
use gapfinder_recon::differ::{decide_and_mark, MarkReason};
use gapfinder_recon::engine::{run, RunOptions};
use gapfinder_recon::matcher::{best_match, find_best_match, positional_score, MatchMode};
use gapfinder_recon::model::{SharedColumns, Table, Value};

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

fn config_256() -> ProptestConfig {
    ProptestConfig {
        cases: std::env::var("PROPTEST_CASES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(256),
        failure_persistence: None,
        ..ProptestConfig::default()
    }
}

// ---------------------------------------------------------------------------
// Generators
// ---------------------------------------------------------------------------

const WIDTH: usize = 3;

fn columns() -> Vec<String> {
    vec!["id".to_string(), "name".to_string(), "status".to_string()]
}

/// Small value domain so collisions (and ties) actually happen.
fn arb_value() -> impl Strategy<Value = Value> {
    prop_oneof![
        3 => (0i64..4).prop_map(Value::Int),
        2 => prop::sample::select(vec!["A", "B", "present", "absent"]).prop_map(Value::from),
        1 => Just(Value::Empty),
    ]
}

fn arb_present_value() -> impl Strategy<Value = Value> {
    prop_oneof![
        (0i64..4).prop_map(Value::Int),
        prop::sample::select(vec!["A", "B", "present", "absent"]).prop_map(Value::from),
    ]
}

fn arb_row() -> impl Strategy<Value = Vec<Value>> {
    prop::collection::vec(arb_value(), WIDTH)
}

fn arb_table(max_rows: usize) -> impl Strategy<Value = Table> {
    prop::collection::vec(arb_row(), 0..max_rows).prop_map(|rows| {
        let mut t = Table::new(columns());
        for r in rows {
            t.push_row(r);
        }
        t
    })
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(config_256())]

    #[test]
    fn empty_duplicate_marks_every_row(main in arb_table(12)) {
        let dup = Table::new(columns());
        let report = run(&main, &dup, &RunOptions::default());
        prop_assert_eq!(report.summary.marked, main.len());
        for r in &report.rows {
            prop_assert_eq!(r.reason.as_ref(), Some(&MarkReason::NoDuplicateRows));
        }
    }

    #[test]
    fn every_main_row_gets_a_verdict(main in arb_table(10), dup in arb_table(10)) {
        let report = run(&main, &dup, &RunOptions::default());
        prop_assert_eq!(report.rows.len(), main.len());
        for (i, r) in report.rows.iter().enumerate() {
            prop_assert_eq!(r.row, i);
            prop_assert_eq!(r.best_match.is_some(), !dup.is_empty());
        }
    }

    #[test]
    fn best_match_is_earliest_minimum(main_row in arb_row(), dup in arb_table(10)) {
        let found = best_match(&main_row, &dup, MatchMode::Positional, &SharedColumns::default());
        let scores: Vec<usize> = dup.rows.iter().map(|r| positional_score(&main_row, r)).collect();
        match found {
            None => prop_assert!(dup.is_empty()),
            Some(m) => {
                let min = *scores.iter().min().unwrap();
                prop_assert_eq!(m.score, min);
                prop_assert_eq!(m.index, scores.iter().position(|s| *s == min).unwrap());
            }
        }
    }

    #[test]
    fn fully_present_identical_row_is_never_marked(
        row in prop::collection::vec(arb_present_value(), WIDTH),
        others in arb_table(8),
        at in 0usize..8,
    ) {
        let mut dup = others.clone();
        let at = at.min(dup.len());
        dup.rows.insert(at, row.clone());

        let mut main = Table::new(columns());
        main.push_row(row.clone());

        // Identical row scores 0, so it (or an earlier identical row) is the best match
        prop_assert_eq!(find_best_match(&row, &dup).map(|i| dup.rows[i].clone()), Some(row.clone()));
        let report = run(&main, &dup, &RunOptions::default());
        prop_assert!(!report.rows[0].marked);
    }

    #[test]
    fn missing_duplicate_value_always_marks(
        main_row in prop::collection::vec(arb_present_value(), WIDTH),
        hole in 0usize..WIDTH,
    ) {
        let mut dup_row = main_row.clone();
        dup_row[hole] = Value::Empty;
        let shared = SharedColumns::resolve(&columns(), &columns());
        let verdict = decide_and_mark(&main_row, Some(dup_row.as_slice()), &shared);
        prop_assert!(verdict.is_marked());
    }

    #[test]
    fn marking_never_alters_main_table(main in arb_table(10), dup in arb_table(10)) {
        let before = main.clone();
        let _ = run(&main, &dup, &RunOptions { mode: MatchMode::Named });
        prop_assert_eq!(before, main);
    }
}
