use gapfinder_recon::config::GapConfig;
use gapfinder_recon::differ::MarkReason;
use gapfinder_recon::engine::{run, RunOptions};
use gapfinder_recon::matcher::MatchMode;
use gapfinder_recon::model::{Table, Value};

fn table(columns: &[&str], rows: Vec<Vec<Value>>) -> Table {
    let mut t = Table::new(columns.iter().map(|c| c.to_string()).collect());
    for r in rows {
        t.push_row(r);
    }
    t
}

fn attendance_row(id: i64, name: &str, date: &str, status: &str) -> Vec<Value> {
    vec![Value::Int(id), name.into(), date.into(), status.into()]
}

const COLUMNS: &[&str] = &["emp_id", "name", "date", "status"];

// -------------------------------------------------------------------------
// Roster scenarios
// -------------------------------------------------------------------------

#[test]
fn roster_with_one_absent_and_one_changed_row() {
    let main = table(
        COLUMNS,
        vec![
            attendance_row(101, "Asha", "2024-03-01", "present"),
            attendance_row(102, "Bilal", "2024-03-01", "present"),
            attendance_row(103, "Chen", "2024-03-01", "present"),
            attendance_row(104, "Dina", "2024-03-01", "present"),
        ],
    );
    let dup = table(
        COLUMNS,
        vec![
            attendance_row(104, "Dina", "2024-03-01", "present"),
            attendance_row(101, "Asha", "2024-03-01", "present"),
            attendance_row(103, "Chen", "2024-03-01", "absent"),
        ],
    );

    let report = run(&main, &dup, &RunOptions::default());

    let marked: Vec<usize> = report.highlights().rows().collect();
    assert_eq!(marked, vec![1, 2]);

    assert_eq!(report.rows[0].best_match, Some(1));
    assert_eq!(report.rows[3].best_match, Some(0));

    match &report.rows[2].reason {
        Some(MarkReason::ValueDiffers { column, main, duplicate }) => {
            assert_eq!(column, "status");
            assert_eq!(main, &Value::from("present"));
            assert_eq!(duplicate, &Value::from("absent"));
        }
        other => panic!("unexpected reason: {other:?}"),
    }
}

#[test]
fn extra_duplicate_columns_are_ignored_by_differ() {
    let main = table(&["emp_id", "name"], vec![vec![Value::Int(1), "A".into()]]);
    let dup = table(
        &["emp_id", "name", "badge"],
        vec![vec![Value::Int(1), "A".into(), "B-77".into()]],
    );

    let report = run(&main, &dup, &RunOptions::default());
    // Positional score counts the extra column, but the differ only sees shared ones
    assert_eq!(report.rows[0].score, Some(1));
    assert!(!report.rows[0].marked);
    assert_eq!(report.columns.duplicate_only, vec!["badge"]);
}

#[test]
fn int_and_float_columns_compare_numerically() {
    let main = table(&["emp_id", "hours"], vec![vec![Value::Int(7), Value::Int(8)]]);
    let dup = table(&["emp_id", "hours"], vec![vec![Value::Float(7.0), Value::Float(8.0)]]);
    let report = run(&main, &dup, &RunOptions::default());
    assert_eq!(report.summary.marked, 0);
}

#[test]
fn text_never_equals_number() {
    let main = table(&["emp_id"], vec![vec![Value::Int(7)]]);
    let dup = table(&["emp_id"], vec![vec!["7".into()]]);
    let report = run(&main, &dup, &RunOptions::default());
    assert_eq!(report.summary.marked, 1);
}

#[test]
fn empty_main_table_produces_empty_report() {
    let main = table(COLUMNS, vec![]);
    let dup = table(COLUMNS, vec![attendance_row(1, "A", "2024-03-01", "present")]);
    let report = run(&main, &dup, &RunOptions::default());
    assert_eq!(report.summary.total_rows, 0);
    assert!(report.highlights().is_empty());
}

// -------------------------------------------------------------------------
// Config-driven runs
// -------------------------------------------------------------------------

#[test]
fn config_selects_named_mode() {
    let config = GapConfig::from_toml(
        r#"
name = "reordered export"

[main]
file = "main.csv"

[duplicate]
file = "dup.xlsx"

[matching]
mode = "named"
"#,
    )
    .unwrap();

    let main = table(&["id", "name"], vec![vec![Value::Int(1), "A".into()]]);
    let dup = table(&["name", "id"], vec![vec!["A".into(), Value::Int(1)]]);

    let report = run(&main, &dup, &RunOptions { mode: config.matching.mode });
    assert_eq!(report.meta.match_mode, MatchMode::Named);
    assert_eq!(report.rows[0].score, Some(0));
    assert!(!report.rows[0].marked);
}

#[test]
fn config_from_file_resolves() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("gaps.toml");
    std::fs::write(
        &path,
        "[main]\nfile = \"a.csv\"\n\n[duplicate]\nfile = \"b.csv\"\n\n[output]\njson = \"report.json\"\n",
    )
    .unwrap();

    let config = GapConfig::from_file(&path).unwrap();
    assert_eq!(config.output.json.as_deref(), Some("report.json"));

    let missing = GapConfig::from_file(&dir.path().join("nope.toml"));
    assert!(missing.is_err());
}
