use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use gapfinder_recon::model::Table;

/// Widest a preview column may grow before cells are cut with "..".
const MAX_CELL_WIDTH: usize = 24;

/// Display width of a string, accounting for CJK double-width, emoji, etc.
pub(crate) fn display_width(s: &str) -> usize {
    UnicodeWidthStr::width(s)
}

/// Truncate a string to fit within `width` display columns, adding ".." if truncated.
fn truncate_display(s: &str, width: usize) -> String {
    if display_width(s) <= width {
        return s.to_string();
    }
    if width < 3 {
        return s
            .chars()
            .next()
            .filter(|ch| UnicodeWidthChar::width(*ch).unwrap_or(0) <= width)
            .map(String::from)
            .unwrap_or_default();
    }

    // Leave room for ".."
    let budget = width - 2;
    let mut used = 0;
    let mut end_byte = 0;
    for (i, ch) in s.char_indices() {
        let cw = UnicodeWidthChar::width(ch).unwrap_or(0);
        if used + cw > budget {
            break;
        }
        used += cw;
        end_byte = i + ch.len_utf8();
    }

    format!("{}..", &s[..end_byte])
}

/// Pad or truncate a string to exactly `width` display columns.
fn pad_right(s: &str, width: usize) -> String {
    let cut = truncate_display(s, width);
    let sw = display_width(&cut);
    format!("{}{}", cut, " ".repeat(width.saturating_sub(sw)))
}

/// Convert column index to letter (0 -> A, 1 -> B, 26 -> AA, etc.)
pub(crate) fn col_to_letter(col: usize) -> String {
    let mut result = String::new();
    let mut n = col;
    loop {
        result.insert(0, (b'A' + (n % 26) as u8) as char);
        if n < 26 {
            break;
        }
        n = n / 26 - 1;
    }
    result
}

/// A1-style span covering one data row of a table as it sits in its sheet.
pub(crate) fn row_span(table: &Table, row: usize) -> String {
    let (header_row, first_col) = table.origin;
    // 1-based sheet row; the header occupies the first one
    let sheet_row = header_row as usize + row + 2;
    let first = first_col as usize;
    let last = first + table.width().saturating_sub(1);
    if first == last {
        format!("{}{}", col_to_letter(first), sheet_row)
    } else {
        format!("{}{}:{}{}", col_to_letter(first), sheet_row, col_to_letter(last), sheet_row)
    }
}

/// First `limit` rows of a table as an aligned text grid.
pub(crate) fn render_preview(title: &str, table: &Table, limit: usize) -> String {
    let body: Vec<Vec<String>> = table
        .rows
        .iter()
        .take(limit)
        .map(|row| row.iter().map(|v| v.to_string()).collect())
        .collect();

    let widths: Vec<usize> = table
        .columns
        .iter()
        .enumerate()
        .map(|(c, name)| {
            body.iter()
                .map(|row| display_width(&row[c]))
                .chain(std::iter::once(display_width(name)))
                .max()
                .unwrap_or(0)
                .clamp(1, MAX_CELL_WIDTH)
        })
        .collect();

    let mut out = format!("{title} ({} rows x {} columns)\n", table.len(), table.width());
    push_line(&mut out, &table.columns, &widths);
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    push_line(&mut out, &rule, &widths);
    for row in &body {
        push_line(&mut out, row, &widths);
    }
    if table.len() > body.len() {
        out.push_str(&format!("... {} more rows\n", table.len() - body.len()));
    }
    out
}

fn push_line(out: &mut String, cells: &[String], widths: &[usize]) {
    let line: Vec<String> = cells
        .iter()
        .zip(widths)
        .map(|(cell, w)| pad_right(cell, *w))
        .collect();
    out.push_str(line.join("  ").trim_end());
    out.push('\n');
}

#[cfg(test)]
mod tests {
    use super::*;
    use gapfinder_recon::model::Value;

    fn roster() -> Table {
        let mut t = Table::new(vec!["id".into(), "name".into()]);
        t.push_row(vec![Value::Int(1), Value::from("Asha")]);
        t.push_row(vec![Value::Int(2), Value::Empty]);
        t.push_row(vec![Value::Int(3), Value::from("\u{4e16}\u{754c}")]);
        t
    }

    #[test]
    fn display_width_cjk() {
        assert_eq!(display_width("\u{4e16}\u{754c}"), 4);
        assert_eq!(display_width("hello"), 5);
    }

    #[test]
    fn truncate_cuts() {
        assert_eq!(truncate_display("abcdef", 5), "abc..");
        assert_eq!(truncate_display("abc", 3), "abc");
        assert_eq!(truncate_display("abc", 2), "a");
        assert_eq!(truncate_display("", 0), "");
    }

    #[test]
    fn truncate_cjk_boundary() {
        let t = truncate_display("\u{4e16}\u{754c}\u{4f60}\u{597d}", 6);
        assert_eq!(t, "\u{4e16}\u{754c}..");
    }

    #[test]
    fn pad_right_pads_and_cuts() {
        assert_eq!(pad_right("ab", 5), "ab   ");
        assert_eq!(pad_right("abcdef", 5), "abc..");
    }

    #[test]
    fn col_letters() {
        assert_eq!(col_to_letter(0), "A");
        assert_eq!(col_to_letter(25), "Z");
        assert_eq!(col_to_letter(26), "AA");
        assert_eq!(col_to_letter(701), "ZZ");
    }

    #[test]
    fn row_span_follows_origin() {
        let t = roster();
        assert_eq!(row_span(&t, 0), "A2:B2");
        let shifted = roster().with_origin(2, 1);
        assert_eq!(row_span(&shifted, 1), "B5:C5");
    }

    #[test]
    fn preview_limits_rows() {
        let out = render_preview("main.csv", &roster(), 2);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "main.csv (3 rows x 2 columns)");
        assert_eq!(lines[1], "id  name");
        assert_eq!(lines[2], "--  ----");
        assert_eq!(lines[3], "1   Asha");
        assert_eq!(lines[4], "2");
        assert_eq!(lines[5], "... 1 more rows");
        assert_eq!(lines.len(), 6);
    }
}
