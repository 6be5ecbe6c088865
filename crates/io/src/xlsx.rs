// Spreadsheet import (xlsx, xlsm, xlsb, xls, ods) and highlighted export (xlsx only)
//
// Import: the first row of the sheet's used range is the header.
// Export: xlsx/xlsm mains are patched in place (see xlsx_styles); other
//         workbooks are rebuilt sheet by sheet; CSV mains are written as
//         spelled. Marked rows get a solid fill.

use std::io::Cursor;
use std::path::Path;

use calamine::{open_workbook_auto_from_rs, Data, Range, Reader, Sheets};
use rust_xlsxwriter::{Color, Format, FormatPattern, Workbook as XlsxWorkbook, Worksheet};

use gapfinder_recon::differ::Highlights;
use gapfinder_recon::model::{SourceFormat, Table, Value};

use crate::error::{LoadError, WriteError};
use crate::load::{is_missing_marker, normalize_headers, InputSource, LoadOptions};
use crate::xlsx_styles::{self, HighlightPlan};

/// Sheet name used when the main source is CSV.
pub const CSV_SHEET_NAME: &str = "Sheet1";

/// Integers of 16 or more digits lose precision as Excel doubles.
const EXCEL_MAX_SAFE_INT: u64 = 1_000_000_000_000_000;

// ---------------------------------------------------------------------------
// Opening
// ---------------------------------------------------------------------------

enum OpenError {
    Workbook(String),
    NoSheets,
    SheetNotFound(String),
    Read(String),
}

impl OpenError {
    fn into_load_error(self, name: &str) -> LoadError {
        match self {
            OpenError::SheetNotFound(sheet) => LoadError::SheetNotFound {
                name: name.into(),
                sheet,
            },
            other => LoadError::Spreadsheet {
                name: name.into(),
                message: other.message(),
            },
        }
    }

    fn message(&self) -> String {
        match self {
            OpenError::Workbook(msg) => format!("Failed to open spreadsheet: {msg}"),
            OpenError::NoSheets => "Spreadsheet contains no sheets".to_string(),
            OpenError::SheetNotFound(sheet) => format!("sheet '{sheet}' not found"),
            OpenError::Read(msg) => msg.clone(),
        }
    }
}

/// Open a workbook from memory and read one sheet's used range.
fn open_sheet(bytes: &[u8], sheet: Option<&str>) -> Result<(String, Range<Data>), OpenError> {
    let mut workbook: Sheets<_> = open_workbook_auto_from_rs(Cursor::new(bytes))
        .map_err(|e| OpenError::Workbook(e.to_string()))?;

    let sheet_names: Vec<String> = workbook.sheet_names().to_vec();
    let sheet_name = match sheet {
        Some(wanted) => sheet_names
            .iter()
            .find(|n| n.as_str() == wanted)
            .cloned()
            .ok_or_else(|| OpenError::SheetNotFound(wanted.to_string()))?,
        None => sheet_names.first().cloned().ok_or(OpenError::NoSheets)?,
    };

    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| OpenError::Read(format!("Failed to read sheet '{}': {}", sheet_name, e)))?;

    Ok((sheet_name, range))
}

// ---------------------------------------------------------------------------
// Import
// ---------------------------------------------------------------------------

/// Parse spreadsheet bytes into a table. Cells keep their native types.
pub fn import_bytes(name: &str, bytes: &[u8], sheet: Option<&str>) -> Result<Table, LoadError> {
    let (sheet_name, range) = open_sheet(bytes, sheet).map_err(|e| e.into_load_error(name))?;

    let Some((start_row, start_col)) = range.start() else {
        log::info!("{name}: sheet '{sheet_name}' is empty");
        return Ok(Table::default());
    };

    let mut rows = range.rows();
    let Some(header) = rows.next() else {
        return Ok(Table::default());
    };

    let columns = normalize_headers(header.iter().map(header_text).collect());
    let mut table = Table::new(columns).with_origin(start_row, start_col as u16);
    for row in rows {
        table.push_row(row.iter().map(cell_value).collect());
    }

    log::info!(
        "{name}: loaded sheet '{sheet_name}', {} rows x {} columns",
        table.len(),
        table.width()
    );
    Ok(table)
}

fn header_text(cell: &Data) -> String {
    match cell {
        Data::String(s) => s.clone(),
        other => cell_value(other).to_string(),
    }
}

fn cell_value(cell: &Data) -> Value {
    match cell {
        Data::Empty => Value::Empty,
        Data::String(s) => text_value(s),
        Data::Float(n) => Value::Float(*n),
        Data::Int(n) => Value::Int(*n),
        Data::Bool(b) => Value::Bool(*b),
        // Serial number; 1900 date system assumed
        Data::DateTime(dt) => Value::Float(dt.as_f64()),
        Data::DateTimeIso(s) => text_value(s),
        Data::DurationIso(s) => text_value(s),
        Data::Error(e) => text_value(&format!("#{:?}", e)),
    }
}

fn text_value(s: &str) -> Value {
    if is_missing_marker(s) {
        Value::Empty
    } else {
        Value::Text(s.to_string())
    }
}

// ---------------------------------------------------------------------------
// Export
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct WriteOptions {
    /// Fill color as `0xRRGGBB`.
    pub highlight_rgb: u32,
    /// How the main table was loaded: the sheet to mark and the CSV dialect.
    pub source: LoadOptions,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            highlight_rgb: 0xFF0000,
            source: LoadOptions::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteSummary {
    pub sheet: String,
    pub rows_written: usize,
    pub highlighted_rows: usize,
    pub cells_highlighted: usize,
}

/// Write a copy of the main source with every cell of each marked row filled.
///
/// An xlsx/xlsm main is copied as a package, so every sheet and all of its
/// formatting carry over. Other spreadsheet formats are rebuilt sheet by sheet
/// from their values. A CSV main is written as spelled in the file. Any
/// existing file at `path` is replaced.
pub fn write_highlighted(
    main_source: &InputSource,
    main: &Table,
    highlights: &Highlights,
    options: &WriteOptions,
    path: &Path,
) -> Result<WriteSummary, WriteError> {
    let (bytes, summary) = match main_source.format() {
        Some(SourceFormat::Spreadsheet) if xlsx_styles::is_ooxml(&main_source.data) => {
            patch_workbook(main_source, main, highlights, options)?
        }
        Some(SourceFormat::Spreadsheet) => {
            let mut workbook = XlsxWorkbook::new();
            let summary = rebuild_workbook(&mut workbook, main_source, highlights, options)?;
            (save_to_buffer(&mut workbook)?, summary)
        }
        _ => {
            let mut workbook = XlsxWorkbook::new();
            let summary = write_csv_copy(&mut workbook, main_source, highlights, options)?;
            (save_to_buffer(&mut workbook)?, summary)
        }
    };

    std::fs::write(path, bytes)
        .map_err(|e| WriteError::Io(format!("cannot write {}: {}", path.display(), e)))?;

    log::info!(
        "wrote {}: {} rows, {} highlighted",
        path.display(),
        summary.rows_written,
        summary.highlighted_rows
    );
    Ok(summary)
}

fn save_to_buffer(workbook: &mut XlsxWorkbook) -> Result<Vec<u8>, WriteError> {
    workbook
        .save_to_buffer()
        .map_err(|e| WriteError::Xlsx(e.to_string()))
}

fn reopen_error(source: &InputSource, e: OpenError) -> WriteError {
    WriteError::Reopen(format!("{}: {}", source.name, e.message()))
}

/// Fill marked rows inside the original xlsx/xlsm package.
fn patch_workbook(
    source: &InputSource,
    main: &Table,
    highlights: &Highlights,
    options: &WriteOptions,
) -> Result<(Vec<u8>, WriteSummary), WriteError> {
    let (sheet, range) =
        open_sheet(&source.data, options.source.sheet.as_deref()).map_err(|e| reopen_error(source, e))?;
    let (start_row, start_col) = range.start().unwrap_or((0, 0));

    // Header on the first used row; data row i sits i + 1 rows below it (1-based)
    let rows: Vec<u32> = if main.width() == 0 {
        Vec::new()
    } else {
        highlights
            .rows()
            .filter(|&r| r < main.len())
            .map(|r| start_row + 2 + r as u32)
            .collect()
    };
    let plan = HighlightPlan {
        sheet,
        rows,
        first_col: start_col + 1,
        last_col: start_col + main.width() as u32,
        rgb: options.highlight_rgb,
    };

    let patched = xlsx_styles::highlight_package(&source.name, &source.data, &plan)?;
    let summary = WriteSummary {
        highlighted_rows: plan.rows.len(),
        sheet: plan.sheet,
        rows_written: main.len(),
        cells_highlighted: patched.cells,
    };
    Ok((patched.bytes, summary))
}

/// Copy every sheet of a non-OOXML workbook; only the main sheet is marked.
fn rebuild_workbook(
    workbook: &mut XlsxWorkbook,
    source: &InputSource,
    highlights: &Highlights,
    options: &WriteOptions,
) -> Result<WriteSummary, WriteError> {
    let (chosen, _) =
        open_sheet(&source.data, options.source.sheet.as_deref()).map_err(|e| reopen_error(source, e))?;
    let mut sheets: Sheets<_> = open_workbook_auto_from_rs(Cursor::new(source.data.as_slice()))
        .map_err(|e| reopen_error(source, OpenError::Workbook(e.to_string())))?;

    let mut summary = None;
    for name in sheets.sheet_names().to_vec() {
        let range = sheets.worksheet_range(&name).map_err(|e| {
            reopen_error(source, OpenError::Read(format!("Failed to read sheet '{}': {}", name, e)))
        })?;
        let worksheet = workbook
            .add_worksheet()
            .set_name(&name)
            .map_err(|e| WriteError::Xlsx(format!("Failed to create sheet '{}': {}", name, e)))?;

        let marks = (name == chosen).then_some(highlights);
        let copied = copy_sheet(worksheet, &range, marks, options.highlight_rgb, name.clone())?;
        if marks.is_some() {
            summary = Some(copied);
        }
    }

    summary.ok_or_else(|| reopen_error(source, OpenError::SheetNotFound(chosen)))
}

/// One cell to emit, detached from where it came from.
enum CellOut<'a> {
    Blank,
    Text(&'a str),
    Owned(String),
    Number(f64),
    Bool(bool),
}

fn integer_out(n: i64) -> CellOut<'static> {
    if n.unsigned_abs() >= EXCEL_MAX_SAFE_INT {
        // Export as text to keep every digit
        CellOut::Owned(n.to_string())
    } else {
        CellOut::Number(n as f64)
    }
}

/// A CSV field as a cell: a number only when it prints back to the same text.
fn field_out(field: &str) -> CellOut<'_> {
    if field.is_empty() {
        return CellOut::Blank;
    }
    if let Ok(n) = field.parse::<i64>() {
        if n.to_string() == field {
            return integer_out(n);
        }
    } else if let Ok(n) = field.parse::<f64>() {
        if n.is_finite() && n.to_string() == field {
            return CellOut::Number(n);
        }
    }
    CellOut::Text(field)
}

fn build_format(fill_rgb: Option<u32>, num_format: Option<&str>) -> Option<Format> {
    if fill_rgb.is_none() && num_format.is_none() {
        return None;
    }
    let mut format = Format::new();
    if let Some(rgb) = fill_rgb {
        format = format
            .set_background_color(Color::RGB(rgb))
            .set_pattern(FormatPattern::Solid);
    }
    if let Some(pattern) = num_format {
        format = format.set_num_format(pattern);
    }
    Some(format)
}

/// Excel number format for a date serial, by whether it carries a day and/or a time.
fn date_pattern(serial: f64) -> &'static str {
    let has_date = serial.floor() > 0.0;
    let has_time = serial.fract().abs() > 0.0001;
    if has_date && has_time {
        "yyyy-mm-dd hh:mm:ss"
    } else if has_time {
        "hh:mm:ss"
    } else {
        "yyyy-mm-dd"
    }
}

/// Returns true when something was written.
fn write_cell(
    worksheet: &mut Worksheet,
    row: u32,
    col: u16,
    cell: CellOut<'_>,
    format: Option<&Format>,
) -> Result<bool, WriteError> {
    let err = |e: rust_xlsxwriter::XlsxError| {
        WriteError::Xlsx(format!("Failed to write cell ({}, {}): {}", row, col, e))
    };

    match (cell, format) {
        (CellOut::Blank, Some(f)) => {
            worksheet.write_blank(row, col, f).map_err(err)?;
        }
        (CellOut::Blank, None) => return Ok(false),
        (CellOut::Text(s), Some(f)) => {
            worksheet.write_string_with_format(row, col, s, f).map_err(err)?;
        }
        (CellOut::Text(s), None) => {
            worksheet.write_string(row, col, s).map_err(err)?;
        }
        (CellOut::Owned(s), Some(f)) => {
            worksheet.write_string_with_format(row, col, s, f).map_err(err)?;
        }
        (CellOut::Owned(s), None) => {
            worksheet.write_string(row, col, s).map_err(err)?;
        }
        (CellOut::Number(n), Some(f)) => {
            worksheet.write_number_with_format(row, col, n, f).map_err(err)?;
        }
        (CellOut::Number(n), None) => {
            worksheet.write_number(row, col, n).map_err(err)?;
        }
        (CellOut::Bool(b), Some(f)) => {
            worksheet.write_boolean_with_format(row, col, b, f).map_err(err)?;
        }
        (CellOut::Bool(b), None) => {
            worksheet.write_boolean(row, col, b).map_err(err)?;
        }
    }
    Ok(true)
}

/// Copy a sheet's used range at its original positions. Rows are marked only
/// when `highlights` is given.
fn copy_sheet(
    worksheet: &mut Worksheet,
    range: &Range<Data>,
    highlights: Option<&Highlights>,
    rgb: u32,
    sheet_name: String,
) -> Result<WriteSummary, WriteError> {
    let mut summary = WriteSummary {
        sheet: sheet_name,
        ..Default::default()
    };
    let Some((start_row, start_col)) = range.start() else {
        return Ok(summary);
    };

    for (r, row) in range.rows().enumerate() {
        // Row 0 of the range is the header; data row i sits at range row i + 1
        let marked = r > 0 && highlights.is_some_and(|h| h.is_marked(r - 1));
        let fill = marked.then_some(rgb);
        let sheet_row = start_row + r as u32;

        for (c, cell) in row.iter().enumerate() {
            let sheet_col = (start_col as usize + c) as u16;
            let (out, num_format) = match cell {
                Data::Empty => (CellOut::Blank, None),
                Data::String(s) => (CellOut::Text(s), None),
                Data::Float(n) => (CellOut::Number(*n), None),
                Data::Int(n) => (integer_out(*n), None),
                Data::Bool(b) => (CellOut::Bool(*b), None),
                Data::DateTime(dt) => {
                    let serial = dt.as_f64();
                    (CellOut::Number(serial), Some(date_pattern(serial)))
                }
                Data::DateTimeIso(s) => (CellOut::Text(s), None),
                Data::DurationIso(s) => (CellOut::Text(s), None),
                Data::Error(e) => (CellOut::Owned(format!("#{:?}", e)), None),
            };
            let format = build_format(fill, num_format);
            let written = write_cell(worksheet, sheet_row, sheet_col, out, format.as_ref())?;
            if written && marked {
                summary.cells_highlighted += 1;
            }
        }

        if r > 0 {
            summary.rows_written += 1;
            if marked {
                summary.highlighted_rows += 1;
            }
        }
    }

    Ok(summary)
}

/// Write a CSV main on `Sheet1` with its header and fields as spelled.
fn write_csv_copy(
    workbook: &mut XlsxWorkbook,
    source: &InputSource,
    highlights: &Highlights,
    options: &WriteOptions,
) -> Result<WriteSummary, WriteError> {
    let raw = crate::csv::read_raw(
        &source.name,
        &source.data,
        options.source.delimiter,
        options.source.legacy_encoding,
    )
    .map_err(|e| WriteError::Reopen(e.to_string()))?;

    let worksheet = workbook
        .add_worksheet()
        .set_name(CSV_SHEET_NAME)
        .map_err(|e| WriteError::Xlsx(format!("Failed to create sheet: {}", e)))?;
    let mut summary = WriteSummary {
        sheet: CSV_SHEET_NAME.to_string(),
        ..Default::default()
    };

    let width = raw.header.len();
    for (c, name) in raw.header.iter().enumerate() {
        let out = if name.is_empty() { CellOut::Blank } else { CellOut::Text(name) };
        write_cell(worksheet, 0, c as u16, out, None)?;
    }

    for (r, record) in raw.records.iter().enumerate() {
        let marked = highlights.is_marked(r);
        let format = build_format(marked.then_some(options.highlight_rgb), None);
        let sheet_row = r as u32 + 1;

        for c in 0..width {
            let field = record.get(c).map_or("", String::as_str);
            let written = write_cell(worksheet, sheet_row, c as u16, field_out(field), format.as_ref())?;
            if written && marked {
                summary.cells_highlighted += 1;
            }
        }

        summary.rows_written += 1;
        if marked {
            summary.highlighted_rows += 1;
        }
    }

    Ok(summary)
}
