//! CSV ingestion: raw file text into a header list and ordered rows.

use anyhow::{Context, Result};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use tracing::debug;

use crate::pipeline::ProcessingError;
use crate::row::Row;

/// A parsed file: header row plus records keyed by header.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedCsv {
    pub headers: Vec<String>,
    pub rows: Vec<Row>,
}

/// Parse CSV text whose first row is the header.
///
/// Record lengths may vary: short records read missing cells as empty and
/// cells past the last header are ignored. Blank lines are skipped.
pub fn parse_csv(content: &str) -> Result<ParsedCsv, ProcessingError> {
    let content = content.trim_start_matches('\u{feff}');

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(content.as_bytes());

    let raw_headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    if raw_headers.iter().all(|h| h.is_empty()) {
        return Err(ProcessingError::NoHeaders);
    }
    let headers = dedupe_headers(raw_headers);

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result?;
        if record.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }

        let row: Row = headers
            .iter()
            .enumerate()
            .map(|(i, header)| (header.clone(), record.get(i).unwrap_or("").to_string()))
            .collect();
        rows.push(row);
    }

    Ok(ParsedCsv { headers, rows })
}

/// Rename repeated header names to `<name>_<n>` so no column is lost.
/// `note,note,note` becomes `note,note_1,note_2`.
fn dedupe_headers(raw: Vec<String>) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut headers = Vec::new();

    for header in raw {
        let mut name = header.clone();
        let mut n = 1;
        while seen.contains(&name) {
            name = format!("{}_{}", header, n);
            n += 1;
        }
        if name != header {
            debug!("Renamed duplicate header '{}' to '{}'", header, name);
        }
        seen.insert(name.clone());
        headers.push(name);
    }

    headers
}

/// Read a CSV file from disk, returning its file name and text
pub fn read_csv_file(path: &Path) -> Result<(String, String)> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read input file: {}", path.display()))?;

    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .with_context(|| format!("Input path has no file name: {}", path.display()))?;

    Ok((filename, content))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::row;

    #[test]
    fn test_parse_preserves_column_order() {
        let parsed = parse_csv("website,company,phone\nacme.io,Acme,555\n").unwrap();
        assert_eq!(parsed.headers, vec!["website", "company", "phone"]);
        assert_eq!(parsed.rows.len(), 1);
        let keys: Vec<&str> = parsed.rows[0].keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["website", "company", "phone"]);
        assert_eq!(row::value(&parsed.rows[0], "company"), "Acme");
    }

    #[test]
    fn test_parse_quoted_fields() {
        let parsed = parse_csv("company,email\n\"Acme, Inc.\",\"jane@acme.io\"\n").unwrap();
        assert_eq!(row::value(&parsed.rows[0], "company"), "Acme, Inc.");
    }

    #[test]
    fn test_short_and_long_records() {
        let parsed = parse_csv("a,b,c\n1\n1,2,3,4\n").unwrap();
        assert_eq!(parsed.rows.len(), 2);
        assert_eq!(row::value(&parsed.rows[0], "b"), "");
        assert_eq!(parsed.rows[1].len(), 3);
    }

    #[test]
    fn test_blank_lines_skipped() {
        let parsed = parse_csv("email\n\na@x.com\n,\n\nb@x.com\n").unwrap();
        assert_eq!(parsed.rows.len(), 2);
    }

    #[test]
    fn test_header_only_file_has_no_rows() {
        let parsed = parse_csv("email,full_name\n").unwrap();
        assert_eq!(parsed.headers.len(), 2);
        assert!(parsed.rows.is_empty());
    }

    #[test]
    fn test_empty_file_has_no_headers() {
        assert!(matches!(parse_csv(""), Err(ProcessingError::NoHeaders)));
        assert!(matches!(parse_csv(",,\na,b,c\n"), Err(ProcessingError::NoHeaders)));
    }

    #[test]
    fn test_duplicate_headers_are_renamed() {
        let parsed = parse_csv("email,note,note,note\na@x.com,first,second,third\n").unwrap();
        assert_eq!(parsed.headers, vec!["email", "note", "note_1", "note_2"]);
        let r = &parsed.rows[0];
        assert_eq!(row::value(r, "note"), "first");
        assert_eq!(row::value(r, "note_1"), "second");
        assert_eq!(row::value(r, "note_2"), "third");
        assert_eq!(r.len(), 4);
    }

    #[test]
    fn test_renamed_header_does_not_clobber_existing_column() {
        let parsed = parse_csv("note,note,note_1\na,b,c\n").unwrap();
        assert_eq!(parsed.headers, vec!["note", "note_1", "note_1_1"]);
        assert_eq!(row::value(&parsed.rows[0], "note_1_1"), "c");
    }

    #[test]
    fn test_byte_order_mark_stripped() {
        let parsed = parse_csv("\u{feff}email\na@x.com\n").unwrap();
        assert_eq!(parsed.headers, vec!["email"]);
    }

    #[test]
    fn test_read_csv_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("leads.csv");
        std::fs::write(&path, "email\na@x.com\n").unwrap();
        let (name, content) = read_csv_file(&path).unwrap();
        assert_eq!(name, "leads.csv");
        assert!(content.starts_with("email"));

        assert!(read_csv_file(&dir.path().join("missing.csv")).is_err());
    }
}
