use serde::{Deserialize, Serialize};

use crate::model::{SharedColumns, Table, Value};

/// How a main row is scored against each duplicate row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    /// Compare every field by ordinal position, ignoring column names.
    #[default]
    Positional,
    /// Compare only shared columns, looked up by name.
    Named,
}

impl std::fmt::Display for MatchMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Positional => write!(f, "positional"),
            Self::Named => write!(f, "named"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BestMatch {
    pub index: usize,
    pub score: usize,
}

/// Count of positions whose values differ. A position present on only one
/// side counts as a difference.
pub fn positional_score(main_row: &[Value], dup_row: &[Value]) -> usize {
    let common = main_row.len().min(dup_row.len());
    let unequal = main_row
        .iter()
        .zip(dup_row)
        .filter(|(m, d)| m != d)
        .count();
    unequal + main_row.len().max(dup_row.len()) - common
}

/// Count of shared columns whose values differ.
pub fn named_score(main_row: &[Value], dup_row: &[Value], shared: &SharedColumns) -> usize {
    shared
        .iter()
        .filter(|c| main_row.get(c.main_index) != dup_row.get(c.dup_index))
        .count()
}

/// Positional best match: the duplicate row with the fewest differing fields.
/// Ties keep the earliest row. `None` when the duplicate table is empty.
pub fn find_best_match(main_row: &[Value], duplicate: &Table) -> Option<usize> {
    best_match(main_row, duplicate, MatchMode::Positional, &SharedColumns::default())
        .map(|m| m.index)
}

/// Best match under either scoring mode, with its score.
pub fn best_match(
    main_row: &[Value],
    duplicate: &Table,
    mode: MatchMode,
    shared: &SharedColumns,
) -> Option<BestMatch> {
    let mut best: Option<BestMatch> = None;

    for (index, dup_row) in duplicate.rows.iter().enumerate() {
        let score = match mode {
            MatchMode::Positional => positional_score(main_row, dup_row),
            MatchMode::Named => named_score(main_row, dup_row, shared),
        };
        // Strict less-than: first row at the minimum wins
        if best.map_or(true, |b| score < b.score) {
            best = Some(BestMatch { index, score });
            if score == 0 {
                break;
            }
        }
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(columns: &[&str], rows: Vec<Vec<Value>>) -> Table {
        let mut t = Table::new(columns.iter().map(|c| c.to_string()).collect());
        for r in rows {
            t.push_row(r);
        }
        t
    }

    fn ints(vals: &[i64]) -> Vec<Value> {
        vals.iter().map(|v| Value::Int(*v)).collect()
    }

    #[test]
    fn exact_row_beats_near_row() {
        let dup = table(&["a", "b", "c"], vec![ints(&[1, 2, 3]), ints(&[1, 2, 4])]);
        assert_eq!(find_best_match(&ints(&[1, 2, 3]), &dup), Some(0));
    }

    #[test]
    fn later_exact_row_beats_earlier_near_row() {
        let dup = table(&["a", "b", "c"], vec![ints(&[1, 2, 4]), ints(&[1, 2, 3])]);
        let m = best_match(&ints(&[1, 2, 3]), &dup, MatchMode::Positional, &SharedColumns::default());
        assert_eq!(m, Some(BestMatch { index: 1, score: 0 }));
    }

    #[test]
    fn ties_keep_earliest_row() {
        let dup = table(&["a", "b"], vec![ints(&[9, 9]), ints(&[1, 1]), ints(&[1, 1])]);
        assert_eq!(find_best_match(&ints(&[1, 1]), &dup), Some(1));

        let dup = table(&["a", "b"], vec![ints(&[1, 9]), ints(&[9, 1])]);
        let m = best_match(&ints(&[1, 1]), &dup, MatchMode::Positional, &SharedColumns::default());
        assert_eq!(m, Some(BestMatch { index: 0, score: 1 }));
    }

    #[test]
    fn empty_duplicate_has_no_match() {
        let dup = table(&["a"], vec![]);
        assert_eq!(find_best_match(&ints(&[1]), &dup), None);
    }

    #[test]
    fn width_mismatch_counts_missing_positions() {
        assert_eq!(positional_score(&ints(&[1, 2, 3]), &ints(&[1, 2])), 1);
        assert_eq!(positional_score(&ints(&[1]), &ints(&[2, 3, 4])), 3);
        assert_eq!(positional_score(&[], &[]), 0);
    }

    #[test]
    fn positional_ignores_column_names() {
        // Same values, columns swapped: positional sees two differences
        let main_cols = vec!["id".to_string(), "name".into()];
        let dup = table(
            &["name", "id"],
            vec![vec![Value::from("A"), Value::Int(1)]],
        );
        let main_row = vec![Value::Int(1), Value::from("A")];
        let shared = SharedColumns::resolve(&main_cols, &dup.columns);

        let pos = best_match(&main_row, &dup, MatchMode::Positional, &shared).unwrap();
        assert_eq!(pos.score, 2);

        let named = best_match(&main_row, &dup, MatchMode::Named, &shared).unwrap();
        assert_eq!(named.score, 0);
    }

    #[test]
    fn named_mode_skips_unshared_columns() {
        let main_cols = vec!["id".to_string(), "note".into()];
        let dup = table(
            &["id", "extra"],
            vec![
                vec![Value::Int(2), Value::from("x")],
                vec![Value::Int(1), Value::from("y")],
            ],
        );
        let shared = SharedColumns::resolve(&main_cols, &dup.columns);
        let main_row = vec![Value::Int(1), Value::from("whatever")];
        let m = best_match(&main_row, &dup, MatchMode::Named, &shared).unwrap();
        assert_eq!(m, BestMatch { index: 1, score: 0 });
    }
}
