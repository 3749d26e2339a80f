//! Minimal CSV reading for the cleaned dataset exports: comma separated,
//! double-quote quoting with `""` escapes, one record per line. A quoted
//! cell may span lines; the record then continues on the following lines
//! and keeps the number of the line it started on.

use std::collections::HashMap;
use std::io::BufRead;

use crate::error::{Error, Result};

/// Split one CSV line into cells.
pub fn split_line(line: &str) -> Vec<String> {
    scan(line).0
}

/// Split `text` into cells, also reporting whether a quoted cell is still open
/// at the end.
fn scan(text: &str) -> (Vec<String>, bool) {
    let mut cells = Vec::new();
    let mut cell = String::new();
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    cell.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            }
            '"' if cell.is_empty() => in_quotes = true,
            ',' if !in_quotes => cells.push(std::mem::take(&mut cell)),
            _ => cell.push(c),
        }
    }
    cells.push(cell);
    (cells, in_quotes)
}

/// Escape a value for CSV output.
pub fn escape(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

/// A data row with its 1-based line number in the source.
#[derive(Debug)]
pub struct CsvRow<'h> {
    pub line: usize,
    header: &'h HashMap<String, usize>,
    cells: Vec<String>,
}

impl CsvRow<'_> {
    /// Cell under `column`, trimmed. Missing columns and short rows read as "".
    pub fn get(&self, column: &str) -> &str {
        self.header
            .get(column)
            .and_then(|&i| self.cells.get(i))
            .map(|s| s.trim())
            .unwrap_or("")
    }

    pub fn width(&self) -> usize {
        self.cells.len()
    }
}

/// A whole CSV document: header index plus raw data lines.
#[derive(Debug)]
pub struct CsvTable {
    header: HashMap<String, usize>,
    width: usize,
    lines: Vec<(usize, String)>,
}

impl CsvTable {
    pub fn read(reader: impl BufRead) -> Result<Self> {
        let mut lines = reader.lines().enumerate();

        let header_line = loop {
            match lines.next() {
                Some((_, line)) => {
                    let line = line?;
                    if !line.trim().is_empty() {
                        break line;
                    }
                }
                None => {
                    return Ok(Self {
                        header: HashMap::new(),
                        width: 0,
                        lines: Vec::new(),
                    })
                }
            }
        };
        let header_cells = split_line(header_line.trim_start_matches('\u{feff}'));
        let width = header_cells.len();
        let header = header_cells
            .into_iter()
            .enumerate()
            .map(|(i, name)| (name.trim().to_lowercase(), i))
            .collect();

        let mut data = Vec::new();
        let mut pending: Option<(usize, String)> = None;
        for (idx, line) in lines {
            let line = line?;
            let (start, text) = match pending.take() {
                Some((start, mut text)) => {
                    text.push('\n');
                    text.push_str(&line);
                    (start, text)
                }
                None if line.trim().is_empty() => continue,
                None => (idx + 1, line),
            };
            if scan(&text).1 {
                pending = Some((start, text));
            } else {
                data.push((start, text));
            }
        }
        // An unterminated quote runs to the end of input.
        data.extend(pending);

        Ok(Self {
            header,
            width,
            lines: data,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.header.is_empty()
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.header.contains_key(column)
    }

    /// Fail if any of `columns` is absent from the header.
    pub fn require(&self, columns: &[&str]) -> Result<()> {
        let missing: Vec<&str> = columns
            .iter()
            .copied()
            .filter(|c| !self.has_column(c))
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(Error::malformed(
                1,
                format!("header is missing column(s): {}", missing.join(", ")),
            ))
        }
    }

    /// Header width; rows of another width are suspect.
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn rows(&self) -> impl Iterator<Item = CsvRow<'_>> {
        self.lines.iter().map(|(line, text)| CsvRow {
            line: *line,
            header: &self.header,
            cells: split_line(text),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_plain() {
        assert_eq!(split_line("a,b,,c"), vec!["a", "b", "", "c"]);
    }

    #[test]
    fn test_split_quoted() {
        assert_eq!(
            split_line(r#"1,"Acme, Inc.","say ""hi""",x"#),
            vec!["1", "Acme, Inc.", r#"say "hi""#, "x"]
        );
    }

    #[test]
    fn test_escape() {
        assert_eq!(escape("hello"), "hello");
        assert_eq!(escape("hello,world"), "\"hello,world\"");
        assert_eq!(escape("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn test_escape_then_split_keeps_value() {
        let values = ["plain", "with,comma", "with \"quotes\""];
        let line = values.iter().map(|v| escape(v)).collect::<Vec<_>>().join(",");
        assert_eq!(split_line(&line), values);
    }

    #[test]
    fn test_read_table_by_header() {
        let text = "\u{feff}Date,Channel,Spend\n\n\
                    2021-01-01,Email,10\n\
                    2021-01-02,\"Google Ads\",20\n";
        let table = CsvTable::read(text.as_bytes()).unwrap();
        assert!(table.has_column("date"));
        assert_eq!(table.width(), 3);
        let rows: Vec<_> = table.rows().collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].line, 3);
        assert_eq!(rows[1].get("channel"), "Google Ads");
        assert_eq!(rows[1].get("missing"), "");
    }

    #[test]
    fn test_quoted_cell_spans_lines() {
        let text = "date,company,spend\n\
                    2021-01-01,\"Acme\n\nInc.\",10\n\
                    2021-01-02,Globex,20\n\
                    2021-01-03,\"open";
        let table = CsvTable::read(text.as_bytes()).unwrap();
        let rows: Vec<_> = table.rows().collect();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].line, 2);
        assert_eq!(rows[0].get("company"), "Acme\n\nInc.");
        assert_eq!(rows[0].get("spend"), "10");
        assert_eq!(rows[1].line, 5);
        assert_eq!(rows[1].get("company"), "Globex");
        assert_eq!(rows[2].line, 6);
        assert_eq!(rows[2].get("company"), "open");
    }

    #[test]
    fn test_require_reports_missing_columns() {
        let table = CsvTable::read("date,spend\n".as_bytes()).unwrap();
        let err = table.require(&["date", "channel", "roi"]).unwrap_err();
        assert!(err.to_string().contains("channel, roi"), "{err}");
    }

    #[test]
    fn test_empty_input() {
        let table = CsvTable::read("".as_bytes()).unwrap();
        assert!(table.is_empty());
        assert_eq!(table.rows().count(), 0);
    }
}
