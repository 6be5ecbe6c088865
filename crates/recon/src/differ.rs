use std::collections::BTreeSet;

use serde::Serialize;

use crate::model::{SharedColumns, Value};

/// Why a main row was marked.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MarkReason {
    /// The duplicate table has no rows at all.
    NoDuplicateRows,
    /// The best match has no value in this shared column.
    MissingValue { column: String },
    /// The best match holds a different value in this shared column.
    ValueDiffers {
        column: String,
        main: Value,
        duplicate: Value,
    },
}

impl std::fmt::Display for MarkReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoDuplicateRows => write!(f, "duplicate table is empty"),
            Self::MissingValue { column } => write!(f, "'{column}' missing in duplicate"),
            Self::ValueDiffers { column, main, duplicate } => {
                write!(f, "'{column}': '{main}' vs '{duplicate}'")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Unmarked,
    Marked(MarkReason),
}

impl Verdict {
    pub fn is_marked(&self) -> bool {
        matches!(self, Verdict::Marked(_))
    }

    pub fn reason(&self) -> Option<&MarkReason> {
        match self {
            Verdict::Marked(reason) => Some(reason),
            Verdict::Unmarked => None,
        }
    }
}

/// Decide whether a main row is marked against its best match.
///
/// Only shared columns are compared, in main-table order. The first column
/// that is empty on the duplicate side or holds a different value marks the
/// row and stops the scan.
pub fn decide_and_mark(
    main_row: &[Value],
    duplicate_row: Option<&[Value]>,
    shared: &SharedColumns,
) -> Verdict {
    let Some(dup_row) = duplicate_row else {
        return Verdict::Marked(MarkReason::NoDuplicateRows);
    };

    for col in shared.iter() {
        let dup_value = dup_row.get(col.dup_index).unwrap_or(&Value::Empty);
        if dup_value.is_empty() {
            return Verdict::Marked(MarkReason::MissingValue {
                column: col.name.clone(),
            });
        }
        let main_value = main_row.get(col.main_index).unwrap_or(&Value::Empty);
        if main_value != dup_value {
            return Verdict::Marked(MarkReason::ValueDiffers {
                column: col.name.clone(),
                main: main_value.clone(),
                duplicate: dup_value.clone(),
            });
        }
    }

    Verdict::Unmarked
}

// ---------------------------------------------------------------------------
// Annotator
// ---------------------------------------------------------------------------

/// Rows of the main table whose every cell gets highlighted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Highlights {
    rows: BTreeSet<usize>,
}

impl Highlights {
    /// One entry per main row, in row order.
    pub fn from_verdicts<'a>(verdicts: impl IntoIterator<Item = &'a Verdict>) -> Self {
        let mut highlights = Self::default();
        for (row, verdict) in verdicts.into_iter().enumerate() {
            if verdict.is_marked() {
                highlights.mark(row);
            }
        }
        highlights
    }

    pub fn mark(&mut self, row: usize) {
        self.rows.insert(row);
    }

    pub fn is_marked(&self, row: usize) -> bool {
        self.rows.contains(&row)
    }

    /// Marked row indices, ascending.
    pub fn rows(&self) -> impl Iterator<Item = usize> + '_ {
        self.rows.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shared(main: &[&str], dup: &[&str]) -> SharedColumns {
        let m: Vec<String> = main.iter().map(|s| s.to_string()).collect();
        let d: Vec<String> = dup.iter().map(|s| s.to_string()).collect();
        SharedColumns::resolve(&m, &d)
    }

    #[test]
    fn no_match_is_marked() {
        let v = decide_and_mark(&[Value::Int(1)], None, &shared(&["id"], &["id"]));
        assert_eq!(v, Verdict::Marked(MarkReason::NoDuplicateRows));
    }

    #[test]
    fn identical_shared_columns_unmarked() {
        let cols = shared(&["id", "name", "only_main"], &["name", "id"]);
        let main = vec![Value::Int(1), Value::from("A"), Value::from("ignored")];
        let dup = vec![Value::from("A"), Value::Float(1.0)];
        assert_eq!(decide_and_mark(&main, Some(dup.as_slice()), &cols), Verdict::Unmarked);
    }

    #[test]
    fn missing_duplicate_value_marks_even_if_main_empty() {
        let cols = shared(&["id", "name"], &["id", "name"]);
        let main = vec![Value::Int(1), Value::Empty];
        let dup = vec![Value::Int(1), Value::Empty];
        assert_eq!(
            decide_and_mark(&main, Some(dup.as_slice()), &cols),
            Verdict::Marked(MarkReason::MissingValue { column: "name".into() })
        );
    }

    #[test]
    fn first_differing_column_is_reported() {
        let cols = shared(&["id", "name", "dept"], &["id", "name", "dept"]);
        let main = vec![Value::Int(1), Value::from("A"), Value::from("X")];
        let dup = vec![Value::Int(1), Value::from("B"), Value::from("Y")];
        let v = decide_and_mark(&main, Some(dup.as_slice()), &cols);
        match v.reason() {
            Some(MarkReason::ValueDiffers { column, .. }) => assert_eq!(column, "name"),
            other => panic!("unexpected verdict: {other:?}"),
        }
    }

    #[test]
    fn no_shared_columns_never_marks_matched_row() {
        let cols = shared(&["a"], &["b"]);
        let v = decide_and_mark(&[Value::Int(1)], Some(&[Value::Int(2)][..]), &cols);
        assert!(!v.is_marked());
    }

    #[test]
    fn highlights_collect_marked_rows() {
        let verdicts = vec![
            Verdict::Unmarked,
            Verdict::Marked(MarkReason::NoDuplicateRows),
            Verdict::Unmarked,
            Verdict::Marked(MarkReason::NoDuplicateRows),
        ];
        let h = Highlights::from_verdicts(&verdicts);
        assert_eq!(h.rows().collect::<Vec<_>>(), vec![1, 3]);
        assert!(h.is_marked(3));
        assert!(!h.is_marked(0));
    }
}
