// Loader: raw sources in, typed tables out

use std::collections::HashMap;
use std::path::Path;

use gapfinder_recon::model::{SourceFormat, Table};

use crate::error::LoadError;

/// Field delimiter for CSV sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delimiter {
    Byte(u8),
    /// Sniff among tab, semicolon, comma and pipe.
    Auto,
}

impl Default for Delimiter {
    fn default() -> Self {
        Delimiter::Byte(b',')
    }
}

impl Delimiter {
    /// `"auto"` or a single ASCII character.
    pub fn parse(input: &str) -> Option<Self> {
        if input.eq_ignore_ascii_case("auto") {
            return Some(Delimiter::Auto);
        }
        match input.as_bytes() {
            [b] if b.is_ascii() => Some(Delimiter::Byte(*b)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    pub delimiter: Delimiter,
    /// Worksheet to read; first sheet when `None`.
    pub sheet: Option<String>,
    /// Decode non-UTF-8 CSV as Windows-1252 instead of failing.
    pub legacy_encoding: bool,
}

/// A named blob of tabular data, as uploaded or read from disk.
#[derive(Debug, Clone)]
pub struct InputSource {
    pub name: String,
    pub data: Vec<u8>,
}

impl InputSource {
    pub fn new(name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }

    /// Read a file, rejecting unsupported suffixes before touching the disk.
    pub fn from_path(path: &Path) -> Result<Self, LoadError> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        if SourceFormat::from_name(&name).is_none() {
            return Err(LoadError::UnsupportedFormat { name });
        }

        let data = std::fs::read(path).map_err(|e| LoadError::Io {
            name: name.clone(),
            message: e.to_string(),
        })?;
        Ok(Self { name, data })
    }

    pub fn format(&self) -> Option<SourceFormat> {
        SourceFormat::from_name(&self.name)
    }
}

/// Parse one source into a table.
pub fn load_table(source: &InputSource, options: &LoadOptions) -> Result<Table, LoadError> {
    match source.format() {
        Some(SourceFormat::Csv) => crate::csv::import_bytes(
            &source.name,
            &source.data,
            options.delimiter,
            options.legacy_encoding,
        ),
        Some(SourceFormat::Spreadsheet) => {
            crate::xlsx::import_bytes(&source.name, &source.data, options.sheet.as_deref())
        }
        None => Err(LoadError::UnsupportedFormat {
            name: source.name.clone(),
        }),
    }
}

/// Parse the main and duplicate sources. Either failure fails the pair.
pub fn load_pair(
    main: &InputSource,
    main_options: &LoadOptions,
    duplicate: &InputSource,
    duplicate_options: &LoadOptions,
) -> Result<(Table, Table), LoadError> {
    let main_table = load_table(main, main_options)?;
    let dup_table = load_table(duplicate, duplicate_options)?;
    Ok((main_table, dup_table))
}

// ---------------------------------------------------------------------------
// Shared parsing helpers
// ---------------------------------------------------------------------------

/// Text treated as a missing value in any cell.
const MISSING_MARKERS: &[&str] = &[
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

pub(crate) fn is_missing_marker(s: &str) -> bool {
    MISSING_MARKERS.contains(&s)
}

/// Name blank headers `Unnamed: <i>` and suffix repeats `.1`, `.2`, ...
pub(crate) fn normalize_headers(raw: Vec<String>) -> Vec<String> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    let mut out = Vec::with_capacity(raw.len());

    for (i, name) in raw.into_iter().enumerate() {
        let mut col = if name.trim().is_empty() {
            format!("Unnamed: {i}")
        } else {
            name
        };

        let mut cur = counts.get(&col).copied().unwrap_or(0);
        while cur > 0 {
            counts.insert(col.clone(), cur + 1);
            col = format!("{col}.{cur}");
            cur = counts.get(&col).copied().unwrap_or(0);
        }
        counts.insert(col.clone(), cur + 1);
        out.push(col);
    }

    out
}
