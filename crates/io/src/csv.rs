// CSV import into typed tables

use gapfinder_recon::model::{Table, Value};

use crate::error::LoadError;
use crate::load::{is_missing_marker, normalize_headers, Delimiter};

/// A CSV file as spelled on disk: header and data fields, untyped.
///
/// Every record is at most `header.len()` fields long; shorter records are
/// kept short.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RawCsv {
    pub header: Vec<String>,
    pub records: Vec<Vec<String>>,
}

/// Parse CSV bytes into a table. The first record is the header.
pub fn import_bytes(
    name: &str,
    bytes: &[u8],
    delimiter: Delimiter,
    legacy_encoding: bool,
) -> Result<Table, LoadError> {
    let raw = read_raw(name, bytes, delimiter, legacy_encoding)?;
    let table = into_table(raw);
    log::info!("{name}: loaded {} rows x {} columns", table.len(), table.width());
    Ok(table)
}

/// Decode and split CSV bytes without normalizing or typing anything.
pub(crate) fn read_raw(
    name: &str,
    bytes: &[u8],
    delimiter: Delimiter,
    legacy_encoding: bool,
) -> Result<RawCsv, LoadError> {
    let content = decode(name, bytes, legacy_encoding)?;
    let delimiter = match delimiter {
        Delimiter::Byte(b) => b,
        Delimiter::Auto => sniff_delimiter(&content),
    };
    split_records(name, &content, delimiter)
}

/// Detect the most likely field delimiter by checking consistency across the first few lines.
///
/// For each candidate (tab, semicolon, comma, pipe), count fields per line. The delimiter
/// that produces the most consistent field count (>1 field) wins.
pub(crate) fn sniff_delimiter(content: &str) -> u8 {
    let candidates: &[u8] = &[b'\t', b';', b',', b'|'];
    let sample_lines: Vec<&str> = content.lines().take(10).collect();

    if sample_lines.is_empty() {
        return b',';
    }

    let mut best = b',';
    let mut best_score = 0u64;

    for &delim in candidates {
        let counts: Vec<usize> = sample_lines
            .iter()
            .map(|line| {
                csv::ReaderBuilder::new()
                    .delimiter(delim)
                    .has_headers(false)
                    .flexible(true)
                    .from_reader(line.as_bytes())
                    .records()
                    .next()
                    .and_then(|r| r.ok())
                    .map(|r| r.len())
                    .unwrap_or(1)
            })
            .collect();

        if counts.first().copied().unwrap_or(0) <= 1 {
            continue;
        }

        // Lines agreeing with line 1, weighted by field count
        let target = counts[0];
        let consistent = counts.iter().filter(|&&c| c == target).count() as u64;
        let score = consistent * target as u64;

        if score > best_score {
            best_score = score;
            best = delim;
        }
    }

    best
}

/// Decode to UTF-8, stripping a BOM. Non-UTF-8 input is an error unless
/// `legacy_encoding` allows a Windows-1252 fallback.
fn decode(name: &str, bytes: &[u8], legacy_encoding: bool) -> Result<String, LoadError> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(s) => Ok(s.to_string()),
        Err(_) if legacy_encoding => {
            log::warn!("{name}: not valid UTF-8, decoding as Windows-1252");
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
            Ok(decoded.into_owned())
        }
        Err(_) => Err(LoadError::Encoding { name: name.into() }),
    }
}

fn split_records(name: &str, content: &str, delimiter: u8) -> Result<RawCsv, LoadError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut records = reader.records();

    let header: Vec<String> = match records.next() {
        Some(result) => result.map_err(|e| malformed(name, e))?.iter().map(str::to_string).collect(),
        None => return Err(LoadError::Empty { name: name.into() }),
    };
    let width = header.len();

    let mut rows = Vec::new();
    for result in records {
        let record = result.map_err(|e| malformed(name, e))?;
        if record.len() > width {
            let line = record.position().map(|p| p.line()).unwrap_or(0);
            return Err(LoadError::Malformed {
                name: name.into(),
                message: format!("expected {width} fields in line {line}, saw {}", record.len()),
            });
        }
        rows.push(record.iter().map(str::to_string).collect());
    }

    Ok(RawCsv { header, records: rows })
}

fn into_table(raw: RawCsv) -> Table {
    let columns = normalize_headers(raw.header);
    let width = columns.len();

    // Fields column-major, so each column can be typed as a whole
    let mut fields: Vec<Vec<Option<String>>> = vec![Vec::with_capacity(raw.records.len()); width];
    for record in &raw.records {
        for (col, column) in fields.iter_mut().enumerate() {
            let field = record.get(col).filter(|f| !is_missing_marker(f));
            column.push(field.cloned());
        }
    }

    let typed: Vec<Vec<Value>> = fields.into_iter().map(type_column).collect();

    let mut table = Table::new(columns);
    for row in 0..raw.records.len() {
        table.push_row(typed.iter().map(|col| col[row].clone()).collect());
    }
    table
}

fn malformed(name: &str, err: csv::Error) -> LoadError {
    LoadError::Malformed {
        name: name.into(),
        message: err.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Column typing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    Int,
    Float,
    Bool,
    Text,
}

fn parse_bool(s: &str) -> Option<bool> {
    if s.eq_ignore_ascii_case("true") {
        Some(true)
    } else if s.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

fn infer_kind(fields: &[Option<String>]) -> ColumnKind {
    let present: Vec<&str> = fields.iter().flatten().map(|s| s.trim()).collect();
    if present.is_empty() {
        return ColumnKind::Text;
    }
    if present.iter().all(|s| s.parse::<i64>().is_ok()) {
        ColumnKind::Int
    } else if present.iter().all(|s| s.parse::<f64>().is_ok()) {
        ColumnKind::Float
    } else if present.iter().all(|s| parse_bool(s).is_some()) {
        ColumnKind::Bool
    } else {
        ColumnKind::Text
    }
}

/// Type a whole column: numeric or boolean only when every present field agrees.
fn type_column(fields: Vec<Option<String>>) -> Vec<Value> {
    let kind = infer_kind(&fields);
    fields
        .into_iter()
        .map(|field| match field {
            None => Value::Empty,
            Some(s) => match kind {
                ColumnKind::Int => s.trim().parse().map(Value::Int).unwrap_or(Value::Text(s)),
                ColumnKind::Float => s.trim().parse().map(Value::Float).unwrap_or(Value::Text(s)),
                ColumnKind::Bool => parse_bool(s.trim()).map(Value::Bool).unwrap_or(Value::Text(s)),
                ColumnKind::Text => Value::Text(s),
            },
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load(content: &str) -> Table {
        import_bytes("test.csv", content.as_bytes(), Delimiter::default(), false).unwrap()
    }

    #[test]
    fn test_sniff_semicolon_delimiter() {
        let content = "Name;Age;City\nAlice;30;Paris\nBob;25;London\n";
        assert_eq!(sniff_delimiter(content), b';');
    }

    #[test]
    fn test_sniff_comma_delimiter() {
        let content = "Name,Age,City\nAlice,30,Paris\nBob,25,London\n";
        assert_eq!(sniff_delimiter(content), b',');
    }

    #[test]
    fn test_sniff_tab_delimiter() {
        let content = "Name\tAge\tCity\nAlice\t30\tParis\nBob\t25\tLondon\n";
        assert_eq!(sniff_delimiter(content), b'\t');
    }

    #[test]
    fn test_sniff_semicolon_with_commas_in_values() {
        let content = "Name;Address;City\n\"Doe, Jane\";\"123 Main St, Apt 4\";Paris\nBob;\"456 Elm\";London\n";
        assert_eq!(sniff_delimiter(content), b';');
    }

    #[test]
    fn test_auto_delimiter_import() {
        let t = import_bytes("t.csv", b"id|name\n1|A\n", Delimiter::Auto, false).unwrap();
        assert_eq!(t.columns, vec!["id", "name"]);
        assert_eq!(t.rows[0], vec![Value::Int(1), Value::from("A")]);
    }

    #[test]
    fn test_columns_typed_as_a_whole() {
        let t = load("id,hours,code,active\n1,7.5,A1,true\n2,8,007,FALSE\n");
        assert_eq!(t.rows[0], vec![Value::Int(1), Value::Float(7.5), Value::from("A1"), Value::Bool(true)]);
        // "007" stays text because its column holds "A1"
        assert_eq!(t.rows[1], vec![Value::Int(2), Value::Float(8.0), Value::from("007"), Value::Bool(false)]);
    }

    #[test]
    fn test_missing_markers_become_empty() {
        let t = load("id,name\n1,NA\n2,\n,n/a\n");
        assert_eq!(t.rows[0][1], Value::Empty);
        assert_eq!(t.rows[1][1], Value::Empty);
        assert_eq!(t.rows[2], vec![Value::Empty, Value::Empty]);
        // Missing cells do not demote the column from Int
        assert_eq!(t.rows[1][0], Value::Int(2));
    }

    #[test]
    fn test_short_rows_padded_and_blank_lines_skipped() {
        let t = load("a,b,c\n1,2\n\n4,5,6\n");
        assert_eq!(t.len(), 2);
        assert_eq!(t.rows[0], vec![Value::Int(1), Value::Int(2), Value::Empty]);
        assert_eq!(t.rows[1], vec![Value::Int(4), Value::Int(5), Value::Int(6)]);
    }

    #[test]
    fn test_long_row_is_malformed() {
        let err = import_bytes("bad.csv", b"a,b\n1,2\n3,4,5\n", Delimiter::default(), false).unwrap_err();
        match err {
            LoadError::Malformed { message, .. } => {
                assert!(message.contains("expected 2 fields in line 3, saw 3"), "{message}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_empty_file_has_no_columns() {
        let err = import_bytes("empty.csv", b"", Delimiter::default(), false).unwrap_err();
        assert_eq!(err, LoadError::Empty { name: "empty.csv".into() });
    }

    #[test]
    fn test_header_only_file_has_no_rows() {
        let t = load("id,name\n");
        assert_eq!(t.columns, vec!["id", "name"]);
        assert!(t.is_empty());
    }

    #[test]
    fn test_encoding_strict_and_legacy() {
        // "café" in Windows-1252
        let bytes = b"name\ncaf\xE9\n";
        let err = import_bytes("w.csv", bytes, Delimiter::default(), false).unwrap_err();
        assert_eq!(err, LoadError::Encoding { name: "w.csv".into() });

        let t = import_bytes("w.csv", bytes, Delimiter::default(), true).unwrap();
        assert_eq!(t.rows[0][0], Value::from("café"));
    }

    #[test]
    fn test_raw_keeps_spelling() {
        let raw = read_raw("m.csv", b"id,,id\n007,NA,\n8\n", Delimiter::default(), false).unwrap();
        assert_eq!(raw.header, vec!["id", "", "id"]);
        assert_eq!(raw.records, vec![vec!["007", "NA", ""], vec!["8"]]);

        // The typed view of the same file is normalized
        let t = import_bytes("m.csv", b"id,,id\n007,NA,\n8\n", Delimiter::default(), false).unwrap();
        assert_eq!(t.columns, vec!["id", "Unnamed: 1", "id.1"]);
        assert_eq!(t.rows[0][0], Value::Int(7));
        assert_eq!(t.rows[0][1], Value::Empty);
    }

    #[test]
    fn test_bom_stripped_from_first_header() {
        let t = load("\u{FEFF}id,name\n1,A\n");
        assert_eq!(t.columns[0], "id");
    }
}
