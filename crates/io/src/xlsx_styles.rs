// In-place highlighting of OOXML workbooks (xlsx, xlsm)
//
// The package is copied entry by entry. Only the target worksheet and
// xl/styles.xml are rewritten, plus the two parts that name the VBA project
// when the main is macro-enabled. Each cell style used in a marked row is
// cloned with one appended solid fill, so fonts, borders, number formats and
// alignment stay under the highlight.

use std::collections::{BTreeMap, HashMap};
use std::io::{Cursor, Read, Seek, Write};

use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::WriteError;

const WORKBOOK_PART: &str = "xl/workbook.xml";
const WORKBOOK_RELS_PART: &str = "xl/_rels/workbook.xml.rels";
const STYLES_PART: &str = "xl/styles.xml";
const CONTENT_TYPES_PART: &str = "[Content_Types].xml";

const XLSX_MAIN_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml";
const XLSM_MAIN_TYPE: &str = "application/vnd.ms-excel.sheet.macroEnabled.main+xml";

/// True for a ZIP package with an XML workbook part (xlsx, xlsm). ODS and
/// XLSB are ZIP packages too, but without `xl/workbook.xml`.
pub(crate) fn is_ooxml(bytes: &[u8]) -> bool {
    ZipArchive::new(Cursor::new(bytes))
        .map(|archive| archive.file_names().any(|n| n == WORKBOOK_PART))
        .unwrap_or(false)
}

/// Cells to fill, in 1-based sheet coordinates.
#[derive(Debug, Clone)]
pub(crate) struct HighlightPlan {
    pub sheet: String,
    /// Sheet rows to fill, ascending.
    pub rows: Vec<u32>,
    /// Inclusive column span of the table.
    pub first_col: u32,
    pub last_col: u32,
    /// Fill color as `0xRRGGBB`.
    pub rgb: u32,
}

#[derive(Debug)]
pub(crate) struct PatchedPackage {
    pub bytes: Vec<u8>,
    /// Cells carrying the fill, including blanks added to complete a row.
    pub cells: usize,
}

/// Copy the workbook package with the planned cells filled.
pub(crate) fn highlight_package(
    name: &str,
    bytes: &[u8],
    plan: &HighlightPlan,
) -> Result<PatchedPackage, WriteError> {
    let reopen = |msg: String| WriteError::Reopen(format!("{name}: {msg}"));

    let mut archive = ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| reopen(format!("not a valid XLSX package: {e}")))?;

    let workbook_xml = read_zip_file(&mut archive, WORKBOOK_PART).map_err(reopen)?;
    let rels_xml = read_zip_file(&mut archive, WORKBOOK_RELS_PART).map_err(reopen)?;
    let sheet_path = resolve_sheet_path(&workbook_xml, &rels_xml, &plan.sheet)
        .ok_or_else(|| reopen(format!("sheet '{}' has no worksheet part", plan.sheet)))?;
    let sheet_xml = read_zip_file(&mut archive, &sheet_path).map_err(reopen)?;
    let styles_xml = read_zip_file(&mut archive, STYLES_PART).map_err(reopen)?;

    let counts = count_styles(&styles_xml).map_err(reopen)?;
    let mut styles = FillStyles::new(counts.cell_xfs);
    let (sheet_out, cells) = highlight_sheet(&sheet_xml, plan, &mut styles).map_err(reopen)?;
    let styles_out = append_fill_styles(&styles_xml, counts, &styles, plan.rgb).map_err(reopen)?;

    log::debug!(
        "{name}: {sheet_path} gets {cells} filled cells over {} cloned styles",
        styles.len()
    );

    let mut replaced: HashMap<String, Vec<u8>> = HashMap::new();
    replaced.insert(sheet_path, sheet_out);
    replaced.insert(STYLES_PART.to_string(), styles_out);

    let macro_enabled = archive.file_names().any(is_vba_part);
    if macro_enabled {
        log::warn!("{name}: macro-enabled workbook, the VBA project is not carried into the XLSX copy");
        let types_xml = read_zip_file(&mut archive, CONTENT_TYPES_PART).map_err(reopen)?;
        replaced.insert(
            CONTENT_TYPES_PART.to_string(),
            strip_vba_content_types(&types_xml).map_err(reopen)?,
        );
        replaced.insert(
            WORKBOOK_RELS_PART.to_string(),
            strip_vba_relationships(&rels_xml).map_err(reopen)?,
        );
    }

    let bytes = repack(&mut archive, &replaced, macro_enabled).map_err(WriteError::Xlsx)?;
    Ok(PatchedPackage { bytes, cells })
}

fn is_vba_part(name: &str) -> bool {
    name.starts_with("xl/vbaProject") || name.starts_with("xl/_rels/vbaProject")
}

/// Rebuild the archive in its original entry order. Untouched entries are
/// copied without recompressing.
fn repack<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    replaced: &HashMap<String, Vec<u8>>,
    drop_vba: bool,
) -> Result<Vec<u8>, String> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for i in 0..archive.len() {
        let file = archive
            .by_index_raw(i)
            .map_err(|e| format!("Failed to read package entry {i}: {e}"))?;
        let entry = file.name().to_string();
        if drop_vba && is_vba_part(&entry) {
            continue;
        }
        match replaced.get(&entry) {
            Some(content) => {
                drop(file);
                writer
                    .start_file(entry.as_str(), options)
                    .map_err(|e| format!("Failed to add '{entry}': {e}"))?;
                writer
                    .write_all(content)
                    .map_err(|e| format!("Failed to write '{entry}': {e}"))?;
            }
            None => writer
                .raw_copy_file(file)
                .map_err(|e| format!("Failed to copy '{entry}': {e}"))?,
        }
    }

    let cursor = writer
        .finish()
        .map_err(|e| format!("Failed to finish package: {e}"))?;
    Ok(cursor.into_inner())
}

// ---------------------------------------------------------------------------
// Package navigation
// ---------------------------------------------------------------------------

/// Read a file from a ZIP archive.
fn read_zip_file<R: Read + Seek>(archive: &mut ZipArchive<R>, path: &str) -> Result<String, String> {
    let mut file = archive
        .by_name(path)
        .map_err(|e| format!("File '{}' not found in XLSX: {}", path, e))?;
    let mut content = String::new();
    file.read_to_string(&mut content)
        .map_err(|e| format!("Failed to read '{}': {}", path, e))?;
    Ok(content)
}

/// Worksheet part for a sheet name, via workbook.xml and its relationships.
fn resolve_sheet_path(workbook_xml: &str, rels_xml: &str, sheet: &str) -> Option<String> {
    let rid = sheet_relationship_id(workbook_xml, sheet)?;
    let target = relationship_target(rels_xml, &rid)?;
    Some(match target.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None => format!("xl/{}", target),
    })
}

fn sheet_relationship_id(workbook_xml: &str, sheet: &str) -> Option<String> {
    let mut reader = Reader::from_str(workbook_xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e)) if e.local_name().as_ref() == b"sheet" => {
                let name = attr_value(e, b"name").map(|raw| {
                    quick_xml::escape::unescape(&raw)
                        .map(|unescaped| unescaped.into_owned())
                        .unwrap_or(raw)
                });
                let rid = e
                    .attributes()
                    .flatten()
                    .find(|a| a.key.prefix().is_some() && a.key.local_name().as_ref() == b"id")
                    .map(|a| String::from_utf8_lossy(&a.value).into_owned());
                if name.as_deref() == Some(sheet) {
                    return rid;
                }
            }
            Ok(Event::Eof) => return None,
            Err(_) => return None,
            _ => {}
        }
        buf.clear();
    }
}

fn relationship_target(rels_xml: &str, rid: &str) -> Option<String> {
    let mut reader = Reader::from_str(rels_xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e))
                if e.local_name().as_ref() == b"Relationship" =>
            {
                if attr_value(e, b"Id").as_deref() == Some(rid) {
                    return attr_value(e, b"Target");
                }
            }
            Ok(Event::Eof) => return None,
            Err(_) => return None,
            _ => {}
        }
        buf.clear();
    }
}

// ---------------------------------------------------------------------------
// Worksheet
// ---------------------------------------------------------------------------

/// Rewrite a worksheet so every cell of each planned row points at a filled
/// style. Returns the new XML and the number of cells filled.
fn highlight_sheet(
    xml: &str,
    plan: &HighlightPlan,
    styles: &mut FillStyles,
) -> Result<(Vec<u8>, usize), String> {
    let mut reader = Reader::from_str(xml);
    let mut writer = Writer::new(Vec::new());
    let mut patch = SheetPatch::new(plan, styles);
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => patch.open(&mut writer, e, false)?,
            Ok(Event::Empty(e)) => patch.open(&mut writer, e, true)?,
            Ok(Event::End(e)) => patch.close(&mut writer, e)?,
            Ok(Event::Eof) => break,
            Ok(other) => emit(&mut writer, other)?,
            Err(e) => return Err(format!("worksheet XML: {e}")),
        }
        buf.clear();
    }

    let cells = patch.cells;
    Ok((writer.into_inner(), cells))
}

#[derive(Debug, Clone, Copy)]
struct OpenRow {
    number: u32,
    /// First table column not yet written in this row.
    next_col: u32,
    /// Row default style, when the row declares `customFormat`.
    row_style: Option<u32>,
}

struct SheetPatch<'a> {
    rows: &'a [u32],
    first_col: u32,
    last_col: u32,
    styles: &'a mut FillStyles,
    /// Namespace prefix of the sheet's elements, with its colon.
    prefix: String,
    /// `<col>` ranges carrying a style: (min, max, style).
    col_styles: Vec<(u32, u32, u32)>,
    in_sheet_data: bool,
    next_mark: usize,
    last_row: u32,
    last_cell_col: u32,
    open_row: Option<OpenRow>,
    cells: usize,
}

impl<'a> SheetPatch<'a> {
    fn new(plan: &'a HighlightPlan, styles: &'a mut FillStyles) -> Self {
        Self {
            rows: &plan.rows,
            first_col: plan.first_col,
            last_col: plan.last_col,
            styles,
            prefix: String::new(),
            col_styles: Vec::new(),
            in_sheet_data: false,
            next_mark: 0,
            last_row: 0,
            last_cell_col: 0,
            open_row: None,
            cells: 0,
        }
    }

    fn open(&mut self, w: &mut Writer<Vec<u8>>, e: BytesStart<'_>, empty: bool) -> Result<(), String> {
        let local = e.local_name().as_ref().to_vec();
        match local.as_slice() {
            b"col" => {
                self.record_col(&e);
                emit_tag(w, e, empty)
            }
            b"sheetData" => {
                self.prefix = prefix_of(&e);
                if empty {
                    let end = BytesEnd::new(tag_name(&e));
                    emit(w, Event::Start(e))?;
                    self.flush_rows(w, None)?;
                    emit(w, Event::End(end))
                } else {
                    self.in_sheet_data = true;
                    emit(w, Event::Start(e))
                }
            }
            b"row" if self.in_sheet_data => self.start_row(w, e, empty),
            b"c" if self.open_row.is_some() => self.start_cell(w, e, empty),
            _ => emit_tag(w, e, empty),
        }
    }

    fn close(&mut self, w: &mut Writer<Vec<u8>>, e: BytesEnd<'_>) -> Result<(), String> {
        let local = e.local_name().as_ref().to_vec();
        match local.as_slice() {
            b"row" if self.open_row.is_some() => self.finish_row(w)?,
            b"sheetData" => {
                self.flush_rows(w, None)?;
                self.in_sheet_data = false;
            }
            _ => {}
        }
        emit(w, Event::End(e))
    }

    fn record_col(&mut self, e: &BytesStart<'_>) {
        if let (Some(min), Some(max), Some(style)) =
            (attr_u32(e, b"min"), attr_u32(e, b"max"), attr_u32(e, b"style"))
        {
            self.col_styles.push((min, max, style));
        }
    }

    fn column_style(&self, col: u32) -> Option<u32> {
        self.col_styles
            .iter()
            .find(|(min, max, _)| (*min..=*max).contains(&col))
            .map(|(_, _, style)| *style)
    }

    fn tag(&self, local: &str) -> String {
        format!("{}{}", self.prefix, local)
    }

    fn start_row(&mut self, w: &mut Writer<Vec<u8>>, e: BytesStart<'_>, empty: bool) -> Result<(), String> {
        let number = attr_u32(&e, b"r").unwrap_or(self.last_row + 1);
        self.last_row = number;
        self.last_cell_col = 0;
        self.flush_rows(w, Some(number))?;

        if self.rows.get(self.next_mark) != Some(&number) {
            return emit_tag(w, e, empty);
        }
        self.next_mark += 1;

        let row_style = if attr_flag(&e, b"customFormat") {
            attr_u32(&e, b"s")
        } else {
            None
        };
        // spans is an optimization hint and may no longer cover the row
        let start = rebuild(&e, &[], &[b"spans"]);
        let end = BytesEnd::new(tag_name(&e));
        emit(w, Event::Start(start))?;

        self.open_row = Some(OpenRow { number, next_col: self.first_col, row_style });
        if empty {
            self.finish_row(w)?;
            emit(w, Event::End(end))?;
        }
        Ok(())
    }

    fn start_cell(&mut self, w: &mut Writer<Vec<u8>>, e: BytesStart<'_>, empty: bool) -> Result<(), String> {
        let col = attr_value(&e, b"r")
            .and_then(|r| column_number(&r))
            .unwrap_or(self.last_cell_col + 1);
        self.last_cell_col = col;

        if col < self.first_col {
            return emit_tag(w, e, empty);
        }
        if col > self.last_col {
            self.fill_gap(w, self.last_col + 1)?;
            return emit_tag(w, e, empty);
        }

        self.fill_gap(w, col)?;
        let style = self.styles.clone_of(attr_u32(&e, b"s").unwrap_or(0));
        let cell = rebuild(&e, &[("s", style.to_string())], &[]);
        if let Some(row) = self.open_row.as_mut() {
            row.next_col = col + 1;
        }
        self.cells += 1;
        emit_tag(w, cell, empty)
    }

    /// Blank cells for the open row from its next column up to `until` (exclusive).
    fn fill_gap(&mut self, w: &mut Writer<Vec<u8>>, until: u32) -> Result<(), String> {
        let Some(row) = self.open_row else {
            return Ok(());
        };
        for col in row.next_col..until {
            self.blank(w, row.number, col, row.row_style)?;
        }
        if let Some(open) = self.open_row.as_mut() {
            open.next_col = open.next_col.max(until);
        }
        Ok(())
    }

    fn finish_row(&mut self, w: &mut Writer<Vec<u8>>) -> Result<(), String> {
        self.fill_gap(w, self.last_col + 1)?;
        self.open_row = None;
        Ok(())
    }

    fn blank(&mut self, w: &mut Writer<Vec<u8>>, row: u32, col: u32, row_style: Option<u32>) -> Result<(), String> {
        let base = row_style.or_else(|| self.column_style(col)).unwrap_or(0);
        let style = self.styles.clone_of(base);
        let mut cell = BytesStart::new(self.tag("c"));
        cell.push_attribute(("r", cell_ref(col, row).as_str()));
        cell.push_attribute(("s", style.to_string().as_str()));
        self.cells += 1;
        emit(w, Event::Empty(cell))
    }

    /// Write planned rows the sheet has no `<row>` for, up to `before` (exclusive).
    fn flush_rows(&mut self, w: &mut Writer<Vec<u8>>, before: Option<u32>) -> Result<(), String> {
        while let Some(&number) = self.rows.get(self.next_mark) {
            if before.is_some_and(|b| number >= b) {
                break;
            }
            self.next_mark += 1;

            let name = self.tag("row");
            let mut start = BytesStart::new(name.clone());
            start.push_attribute(("r", number.to_string().as_str()));
            emit(w, Event::Start(start))?;
            self.open_row = Some(OpenRow { number, next_col: self.first_col, row_style: None });
            self.finish_row(w)?;
            emit(w, Event::End(BytesEnd::new(name)))?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Styles
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct StyleCounts {
    fills: u32,
    cell_xfs: u32,
}

/// Cell styles cloned with the highlight fill, keyed by original `cellXfs` index.
#[derive(Debug, Default)]
struct FillStyles {
    base: u32,
    clones: BTreeMap<u32, u32>,
}

impl FillStyles {
    fn new(base: u32) -> Self {
        Self { base, clones: BTreeMap::new() }
    }

    fn clone_of(&mut self, original: u32) -> u32 {
        let next = self.base + self.clones.len() as u32;
        *self.clones.entry(original).or_insert(next)
    }

    fn len(&self) -> usize {
        self.clones.len()
    }

    fn is_empty(&self) -> bool {
        self.clones.is_empty()
    }

    /// Originals in the order their clones were numbered.
    fn originals(&self) -> Vec<u32> {
        let mut by_clone: Vec<(u32, u32)> = self.clones.iter().map(|(&o, &c)| (c, o)).collect();
        by_clone.sort_unstable();
        by_clone.into_iter().map(|(_, o)| o).collect()
    }
}

fn count_styles(xml: &str) -> Result<StyleCounts, String> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut counts = StyleCounts::default();
    let mut in_fills = false;
    let mut in_xfs = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.local_name().as_ref() {
                b"fills" => in_fills = true,
                b"cellXfs" => in_xfs = true,
                b"fill" if in_fills => counts.fills += 1,
                b"xf" if in_xfs => counts.cell_xfs += 1,
                _ => {}
            },
            Ok(Event::Empty(ref e)) => match e.local_name().as_ref() {
                b"fill" if in_fills => counts.fills += 1,
                b"xf" if in_xfs => counts.cell_xfs += 1,
                _ => {}
            },
            Ok(Event::End(ref e)) => match e.local_name().as_ref() {
                b"fills" => in_fills = false,
                b"cellXfs" => in_xfs = false,
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(format!("styles XML: {e}")),
            _ => {}
        }
        buf.clear();
    }

    Ok(counts)
}

/// Append one solid fill and a filled clone of every style in `styles`.
fn append_fill_styles(
    xml: &str,
    counts: StyleCounts,
    styles: &FillStyles,
    rgb: u32,
) -> Result<Vec<u8>, String> {
    if styles.is_empty() {
        return Ok(xml.as_bytes().to_vec());
    }
    let fill_id = counts.fills;
    let fills_count = (counts.fills + 1).to_string();
    let xfs_count = (counts.cell_xfs + styles.len() as u32).to_string();

    let mut reader = Reader::from_str(xml);
    let mut w = Writer::new(Vec::new());
    let mut buf = Vec::new();
    let mut prefix = String::new();
    let mut in_xfs = false;
    // Each cellXfs entry as its full event sequence, so clones keep children
    let mut xfs: Vec<Vec<Event<'static>>> = Vec::new();
    let mut current: Option<Vec<Event<'static>>> = None;

    loop {
        let event = match reader.read_event_into(&mut buf) {
            Ok(Event::Eof) => break,
            Ok(event) => event,
            Err(e) => return Err(format!("styles XML: {e}")),
        };

        let mut closes_xf = false;
        let out = match event {
            Event::Start(e) => match local_of(&e).as_slice() {
                b"styleSheet" => {
                    prefix = prefix_of(&e);
                    Event::Start(e)
                }
                b"fills" => Event::Start(rebuild(&e, &[("count", fills_count.clone())], &[])),
                b"cellXfs" => {
                    in_xfs = true;
                    Event::Start(rebuild(&e, &[("count", xfs_count.clone())], &[]))
                }
                b"xf" if in_xfs => {
                    current = Some(Vec::new());
                    Event::Start(e)
                }
                _ => Event::Start(e),
            },
            Event::Empty(e) => match local_of(&e).as_slice() {
                b"fills" => {
                    emit(&mut w, Event::Start(rebuild(&e, &[("count", fills_count.clone())], &[])))?;
                    write_fill(&mut w, &prefix, rgb)?;
                    Event::End(BytesEnd::new(tag_name(&e)))
                }
                b"xf" if in_xfs && current.is_none() => {
                    xfs.push(vec![Event::Empty(e.clone().into_owned())]);
                    Event::Empty(e)
                }
                _ => Event::Empty(e),
            },
            Event::End(e) => match e.local_name().as_ref().to_vec().as_slice() {
                b"fills" => {
                    write_fill(&mut w, &prefix, rgb)?;
                    Event::End(e)
                }
                b"xf" if in_xfs => {
                    closes_xf = true;
                    Event::End(e)
                }
                b"cellXfs" => {
                    in_xfs = false;
                    for original in styles.originals() {
                        write_xf_clone(&mut w, xfs.get(original as usize), fill_id, &prefix)?;
                    }
                    Event::End(e)
                }
                _ => Event::End(e),
            },
            other => other,
        };

        if let Some(xf) = current.as_mut() {
            xf.push(out.clone().into_owned());
        }
        if closes_xf {
            if let Some(xf) = current.take() {
                xfs.push(xf);
            }
        }
        emit(&mut w, out)?;
        buf.clear();
    }

    Ok(w.into_inner())
}

fn write_fill(w: &mut Writer<Vec<u8>>, prefix: &str, rgb: u32) -> Result<(), String> {
    let tag = |local: &str| format!("{prefix}{local}");
    let argb = format!("FF{:06X}", rgb & 0x00FF_FFFF);

    let mut pattern = BytesStart::new(tag("patternFill"));
    pattern.push_attribute(("patternType", "solid"));
    let mut fg = BytesStart::new(tag("fgColor"));
    fg.push_attribute(("rgb", argb.as_str()));
    let mut bg = BytesStart::new(tag("bgColor"));
    bg.push_attribute(("indexed", "64"));

    emit(w, Event::Start(BytesStart::new(tag("fill"))))?;
    emit(w, Event::Start(pattern))?;
    emit(w, Event::Empty(fg))?;
    emit(w, Event::Empty(bg))?;
    emit(w, Event::End(BytesEnd::new(tag("patternFill"))))?;
    emit(w, Event::End(BytesEnd::new(tag("fill"))))
}

/// Write `template` again with its fill swapped for `fill_id`.
fn write_xf_clone(
    w: &mut Writer<Vec<u8>>,
    template: Option<&Vec<Event<'static>>>,
    fill_id: u32,
    prefix: &str,
) -> Result<(), String> {
    let set = [("fillId", fill_id.to_string()), ("applyFill", "1".to_string())];
    match template.and_then(|events| events.split_first()) {
        Some((Event::Start(first), rest)) => {
            emit(w, Event::Start(rebuild(first, &set, &[])))?;
            for event in rest {
                emit(w, event.clone())?;
            }
            Ok(())
        }
        Some((Event::Empty(first), _)) => emit(w, Event::Empty(rebuild(first, &set, &[]))),
        _ => {
            // Style index past the table; fall back to the workbook default look
            let mut xf = BytesStart::new(format!("{prefix}xf"));
            for (key, value) in [("numFmtId", "0"), ("fontId", "0"), ("borderId", "0"), ("xfId", "0")] {
                xf.push_attribute((key, value));
            }
            emit(w, Event::Empty(rebuild(&xf, &set, &[])))
        }
    }
}

// ---------------------------------------------------------------------------
// Macro parts
// ---------------------------------------------------------------------------

fn strip_vba_content_types(xml: &str) -> Result<Vec<u8>, String> {
    rewrite_empty_elements(xml, |e| {
        let part = attr_value(e, b"PartName").unwrap_or_default();
        if part.starts_with("/xl/vbaProject") {
            return None;
        }
        if attr_value(e, b"ContentType").as_deref() == Some(XLSM_MAIN_TYPE) {
            return Some(rebuild(e, &[("ContentType", XLSX_MAIN_TYPE.to_string())], &[]));
        }
        Some(e.clone().into_owned())
    })
}

fn strip_vba_relationships(xml: &str) -> Result<Vec<u8>, String> {
    rewrite_empty_elements(xml, |e| {
        let kind = attr_value(e, b"Type").unwrap_or_default();
        if kind.ends_with("/vbaProject") {
            None
        } else {
            Some(e.clone().into_owned())
        }
    })
}

/// Copy `xml`, passing every empty element through `keep`; `None` drops it.
fn rewrite_empty_elements(
    xml: &str,
    mut keep: impl FnMut(&BytesStart<'_>) -> Option<BytesStart<'static>>,
) -> Result<Vec<u8>, String> {
    let mut reader = Reader::from_str(xml);
    let mut w = Writer::new(Vec::new());
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Empty(e)) => {
                if let Some(kept) = keep(&e) {
                    emit(&mut w, Event::Empty(kept))?;
                }
            }
            Ok(Event::Eof) => break,
            Ok(other) => emit(&mut w, other)?,
            Err(e) => return Err(format!("package XML: {e}")),
        }
        buf.clear();
    }

    Ok(w.into_inner())
}

// ---------------------------------------------------------------------------
// XML helpers
// ---------------------------------------------------------------------------

fn emit(w: &mut Writer<Vec<u8>>, event: Event<'_>) -> Result<(), String> {
    w.write_event(event).map_err(|e| format!("XML write failed: {e}"))
}

fn emit_tag(w: &mut Writer<Vec<u8>>, e: BytesStart<'_>, empty: bool) -> Result<(), String> {
    if empty {
        emit(w, Event::Empty(e))
    } else {
        emit(w, Event::Start(e))
    }
}

fn tag_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.name().as_ref()).into_owned()
}

fn local_of(e: &BytesStart<'_>) -> Vec<u8> {
    e.local_name().as_ref().to_vec()
}

fn prefix_of(e: &BytesStart<'_>) -> String {
    e.name()
        .prefix()
        .map(|p| format!("{}:", String::from_utf8_lossy(p.as_ref())))
        .unwrap_or_default()
}

fn attr_value(e: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == key)
        .map(|a| String::from_utf8_lossy(&a.value).into_owned())
}

fn attr_u32(e: &BytesStart<'_>, key: &[u8]) -> Option<u32> {
    attr_value(e, key)?.trim().parse().ok()
}

fn attr_flag(e: &BytesStart<'_>, key: &[u8]) -> bool {
    matches!(attr_value(e, key).as_deref(), Some("1") | Some("true"))
}

/// Copy of `e` with `set` attributes replaced in place (or appended) and
/// `drop` attributes removed.
fn rebuild(e: &BytesStart<'_>, set: &[(&str, String)], drop: &[&[u8]]) -> BytesStart<'static> {
    let mut out = BytesStart::new(tag_name(e));
    let mut pending: Vec<&(&str, String)> = set.iter().collect();

    for attr in e.attributes().flatten() {
        let key = attr.key.as_ref();
        if drop.iter().any(|d| *d == key) {
            continue;
        }
        match pending.iter().position(|(k, _)| k.as_bytes() == key) {
            Some(i) => {
                let (k, v) = pending.remove(i);
                out.push_attribute((*k, v.as_str()));
            }
            None => out.push_attribute(attr),
        }
    }
    for (k, v) in pending {
        out.push_attribute((*k, v.as_str()));
    }
    out
}

/// 1-based column number of an A1 reference ("C7" -> 3).
fn column_number(reference: &str) -> Option<u32> {
    let letters: Vec<u8> = reference.bytes().take_while(|b| b.is_ascii_alphabetic()).collect();
    if letters.is_empty() {
        return None;
    }
    letters.iter().try_fold(0u32, |col, b| {
        col.checked_mul(26)?
            .checked_add(u32::from(b.to_ascii_uppercase() - b'A') + 1)
    })
}

/// A1 reference from a 1-based column and row.
fn cell_ref(col: u32, row: u32) -> String {
    let mut letters = Vec::new();
    let mut n = col;
    while n > 0 {
        let rem = ((n - 1) % 26) as u8;
        letters.push(b'A' + rem);
        n = (n - 1) / 26;
    }
    letters.reverse();
    format!("{}{}", String::from_utf8_lossy(&letters), row)
}
