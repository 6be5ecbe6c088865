use std::fmt;

/// Failure turning an input source into a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    /// File-name suffix is neither `.csv` nor a spreadsheet.
    UnsupportedFormat { name: String },
    /// The source could not be read.
    Io { name: String, message: String },
    /// CSV bytes are not valid UTF-8.
    Encoding { name: String },
    /// CSV content could not be tokenized.
    Malformed { name: String, message: String },
    /// CSV has no header record.
    Empty { name: String },
    /// Spreadsheet binary could not be opened or read.
    Spreadsheet { name: String, message: String },
    /// Requested worksheet does not exist.
    SheetNotFound { name: String, sheet: String },
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedFormat { name } => {
                write!(f, "{name}: unsupported file type (expected .csv, .xlsx, .xlsm, .xlsb, .xls or .ods)")
            }
            Self::Io { name, message } => write!(f, "{name}: cannot read file: {message}"),
            Self::Encoding { name } => write!(f, "{name}: file is not valid UTF-8"),
            Self::Malformed { name, message } => write!(f, "{name}: malformed CSV: {message}"),
            Self::Empty { name } => write!(f, "{name}: no columns to parse"),
            Self::Spreadsheet { name, message } => write!(f, "{name}: {message}"),
            Self::SheetNotFound { name, sheet } => write!(f, "{name}: sheet '{sheet}' not found"),
        }
    }
}

impl std::error::Error for LoadError {}

/// Failure producing the highlighted output artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteError {
    /// The main spreadsheet could not be reopened as a workbook.
    Reopen(String),
    /// The XLSX writer rejected a cell or sheet.
    Xlsx(String),
    /// The artifact could not be stored.
    Io(String),
}

impl fmt::Display for WriteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reopen(msg) => write!(f, "cannot reopen main workbook: {msg}"),
            Self::Xlsx(msg) => write!(f, "XLSX write error: {msg}"),
            Self::Io(msg) => write!(f, "IO error: {msg}"),
        }
    }
}

impl std::error::Error for WriteError {}
