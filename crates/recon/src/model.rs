use std::fmt;

use serde::Serialize;

// ---------------------------------------------------------------------------
// Cell values
// ---------------------------------------------------------------------------

/// A single scalar cell, typed the way the loader saw it.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Value {
    Empty,
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl Value {
    pub fn is_empty(&self) -> bool {
        matches!(self, Value::Empty)
    }

    fn as_number(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(*n as f64),
            Value::Float(n) => Some(*n),
            _ => None,
        }
    }
}

/// Native-typed equality: ints and floats compare numerically, numbers never
/// equal text, and two empties are equal.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Empty, Value::Empty) => true,
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            _ => match (self.as_number(), other.as_number()) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            },
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Empty => Ok(()),
            Value::Text(s) => write!(f, "{s}"),
            Value::Int(n) => write!(f, "{n}"),
            // Integral floats render without the trailing ".0"
            Value::Float(n) if n.fract() == 0.0 && n.abs() < 1e15 => write!(f, "{}", *n as i64),
            Value::Float(n) => write!(f, "{n}"),
            Value::Bool(b) => write!(f, "{}", if *b { "TRUE" } else { "FALSE" }),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        if s.is_empty() {
            Value::Empty
        } else {
            Value::Text(s.to_string())
        }
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

// ---------------------------------------------------------------------------
// Tables
// ---------------------------------------------------------------------------

/// Ordered rows under a fixed schema. Every row is exactly as wide as
/// `columns`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
    /// Sheet position (row, col) of the header's first cell. `(0, 0)` for CSV.
    pub origin: (u32, u16),
}

impl Table {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
            origin: (0, 0),
        }
    }

    pub fn with_origin(mut self, row: u32, col: u16) -> Self {
        self.origin = (row, col);
        self
    }

    /// Append a row, padding short rows with `Value::Empty` and dropping
    /// cells past the schema width.
    pub fn push_row(&mut self, mut row: Vec<Value>) {
        row.resize(self.columns.len(), Value::Empty);
        self.rows.push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }
}

// ---------------------------------------------------------------------------
// Shared columns
// ---------------------------------------------------------------------------

/// A column present in both tables, with its position on each side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SharedColumn {
    pub name: String,
    pub main_index: usize,
    pub dup_index: usize,
}

/// Shared columns in main-table order, resolved once per run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SharedColumns(Vec<SharedColumn>);

impl SharedColumns {
    pub fn resolve(main: &[String], duplicate: &[String]) -> Self {
        let shared = main
            .iter()
            .enumerate()
            .filter_map(|(main_index, name)| {
                duplicate
                    .iter()
                    .position(|d| d == name)
                    .map(|dup_index| SharedColumn {
                        name: name.clone(),
                        main_index,
                        dup_index,
                    })
            })
            .collect();
        Self(shared)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SharedColumn> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.0.iter().map(|c| c.name.clone()).collect()
    }
}

// ---------------------------------------------------------------------------
// Source formats
// ---------------------------------------------------------------------------

/// Tabular input kinds, told apart by file-name suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceFormat {
    Csv,
    Spreadsheet,
}

const SPREADSHEET_SUFFIXES: &[&str] = &["xlsx", "xlsm", "xlsb", "xls", "ods"];

impl SourceFormat {
    /// Detect the format from a file name. `None` for unsupported suffixes.
    pub fn from_name(name: &str) -> Option<Self> {
        let (_, ext) = name.rsplit_once('.')?;
        let ext = ext.to_ascii_lowercase();
        if ext == "csv" {
            Some(Self::Csv)
        } else if SPREADSHEET_SUFFIXES.contains(&ext.as_str()) {
            Some(Self::Spreadsheet)
        } else {
            None
        }
    }
}
