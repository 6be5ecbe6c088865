use log::{debug, info, warn};
use serde::Serialize;

use crate::differ::{decide_and_mark, Highlights, MarkReason};
use crate::matcher::{best_match, MatchMode};
use crate::model::{SharedColumns, Table};

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    pub mode: MatchMode,
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct RowVerdict {
    /// Zero-based data row in the main table.
    pub row: usize,
    /// Zero-based row of the best match in the duplicate table.
    pub best_match: Option<usize>,
    pub score: Option<usize>,
    pub marked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<MarkReason>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ColumnReport {
    pub shared: Vec<String>,
    pub main_only: Vec<String>,
    pub duplicate_only: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GapSummary {
    pub total_rows: usize,
    pub marked: usize,
    pub unmarked: usize,
    /// Rows with no duplicate row to compare against.
    pub unmatched: usize,
    pub duplicate_rows: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct GapMeta {
    pub engine_version: String,
    pub match_mode: MatchMode,
    pub run_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct GapReport {
    pub meta: GapMeta,
    pub columns: ColumnReport,
    pub summary: GapSummary,
    pub rows: Vec<RowVerdict>,
    #[serde(skip)]
    highlights: Highlights,
}

impl GapReport {
    /// Rows to highlight in the output artifact.
    pub fn highlights(&self) -> &Highlights {
        &self.highlights
    }
}

// ---------------------------------------------------------------------------
// Run
// ---------------------------------------------------------------------------

/// Evaluate every main row against the whole duplicate table.
pub fn run(main: &Table, duplicate: &Table, options: &RunOptions) -> GapReport {
    let shared = SharedColumns::resolve(&main.columns, &duplicate.columns);

    if options.mode == MatchMode::Positional && main.columns != duplicate.columns {
        warn!(
            "main and duplicate schemas differ ({} vs {} columns); positional matching compares by field order",
            main.width(),
            duplicate.width()
        );
    }
    if shared.is_empty() {
        warn!("main and duplicate tables share no columns");
    }

    let mut rows = Vec::with_capacity(main.len());
    let mut verdicts = Vec::with_capacity(main.len());
    for (row, main_row) in main.rows.iter().enumerate() {
        let best = best_match(main_row, duplicate, options.mode, &shared);
        let dup_row = best.map(|b| duplicate.rows[b.index].as_slice());
        let verdict = decide_and_mark(main_row, dup_row, &shared);

        debug!(
            "row {row}: best match {:?} (score {:?}) -> {}",
            best.map(|b| b.index),
            best.map(|b| b.score),
            verdict.reason().map_or_else(|| "unmarked".to_string(), |r| r.to_string()),
        );

        rows.push(RowVerdict {
            row,
            best_match: best.map(|b| b.index),
            score: best.map(|b| b.score),
            marked: verdict.is_marked(),
            reason: verdict.reason().cloned(),
        });
        verdicts.push(verdict);
    }
    let highlights = Highlights::from_verdicts(&verdicts);

    let marked = rows.iter().filter(|r| r.marked).count();
    let unmatched = rows.iter().filter(|r| r.best_match.is_none()).count();
    let summary = GapSummary {
        total_rows: rows.len(),
        marked,
        unmarked: rows.len() - marked,
        unmatched,
        duplicate_rows: duplicate.len(),
    };

    info!(
        "gap check: {} rows, {} marked, {} unmarked",
        summary.total_rows, summary.marked, summary.unmarked
    );

    GapReport {
        meta: GapMeta {
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            match_mode: options.mode,
            run_at: chrono::Utc::now().to_rfc3339(),
        },
        columns: column_report(main, duplicate, &shared),
        summary,
        rows,
        highlights,
    }
}

fn column_report(main: &Table, duplicate: &Table, shared: &SharedColumns) -> ColumnReport {
    let shared_names = shared.names();
    let main_only = main
        .columns
        .iter()
        .filter(|c| !shared_names.contains(c))
        .cloned()
        .collect();
    let duplicate_only = duplicate
        .columns
        .iter()
        .filter(|c| !shared_names.contains(c))
        .cloned()
        .collect();
    ColumnReport {
        shared: shared_names,
        main_only,
        duplicate_only,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Value;

    fn roster(rows: &[(i64, &str)]) -> Table {
        let mut t = Table::new(vec!["id".into(), "name".into()]);
        for (id, name) in rows {
            t.push_row(vec![Value::Int(*id), Value::from(*name)]);
        }
        t
    }

    #[test]
    fn missing_row_is_marked() {
        let main = roster(&[(1, "A"), (2, "B")]);
        let dup = roster(&[(1, "A")]);
        let report = run(&main, &dup, &RunOptions::default());

        assert!(!report.rows[0].marked);
        assert!(report.rows[1].marked);
        assert_eq!(report.rows[1].best_match, Some(0));
        assert_eq!(report.summary.marked, 1);
        assert_eq!(report.summary.unmarked, 1);
        assert_eq!(report.summary.unmatched, 0);
        assert_eq!(report.highlights().rows().collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn empty_duplicate_marks_everything() {
        let main = roster(&[(1, "A"), (2, "B"), (3, "C")]);
        let dup = roster(&[]);
        let report = run(&main, &dup, &RunOptions::default());

        assert_eq!(report.summary.marked, 3);
        assert_eq!(report.summary.unmatched, 3);
        for r in &report.rows {
            assert_eq!(r.reason, Some(MarkReason::NoDuplicateRows));
            assert_eq!(r.score, None);
        }
    }

    #[test]
    fn column_report_splits_schemas() {
        let main = Table::new(vec!["id".into(), "name".into(), "shift".into()]);
        let dup = Table::new(vec!["name".into(), "id".into(), "badge".into()]);
        let report = run(&main, &dup, &RunOptions::default());
        assert_eq!(report.columns.shared, vec!["id", "name"]);
        assert_eq!(report.columns.main_only, vec!["shift"]);
        assert_eq!(report.columns.duplicate_only, vec!["badge"]);
        assert_eq!(report.summary.total_rows, 0);
    }

    #[test]
    fn named_mode_matches_reordered_columns() {
        let main = roster(&[(1, "A"), (2, "B")]);
        let mut dup = Table::new(vec!["name".into(), "id".into()]);
        dup.push_row(vec![Value::from("B"), Value::Int(2)]);
        dup.push_row(vec![Value::from("A"), Value::Int(1)]);

        let named = run(&main, &dup, &RunOptions { mode: MatchMode::Named });
        assert_eq!(named.summary.marked, 0);
        assert_eq!(named.rows[0].best_match, Some(1));
        assert_eq!(named.rows[1].best_match, Some(0));

        // Positional scoring sees every row as fully different and keeps row 0
        let positional = run(&main, &dup, &RunOptions::default());
        assert_eq!(positional.rows[0].best_match, Some(0));
        assert!(positional.rows[0].marked);
        assert!(!positional.rows[1].marked);
    }

    #[test]
    fn report_serializes_reasons() {
        let main = roster(&[(1, "A"), (2, "B")]);
        let dup = roster(&[(1, "A"), (2, "")]);
        let report = run(&main, &dup, &RunOptions::default());
        let json = serde_json::to_value(&report).unwrap();

        assert_eq!(json["summary"]["marked"], 1);
        assert_eq!(json["meta"]["match_mode"], "positional");
        assert!(json["rows"][0].get("reason").is_none());
        assert_eq!(json["rows"][1]["reason"]["kind"], "missing_value");
        assert_eq!(json["rows"][1]["reason"]["column"], "name");
    }
}
