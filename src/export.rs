use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use csv::Writer;
use indexmap::IndexSet;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::row::{self, Row};

const TOO_LONG_PREFIX: &str = "!!TOO_LONG!!";
const HIGHLIGHT_OPEN: &str = "<span style=\"background-color:#ffcccc\">";
const HIGHLIGHT_CLOSE: &str = "</span>";

/// How overlong cleaned company names are marked for review.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LongNameFlag {
    #[default]
    None,
    /// Prefix the value with `!!TOO_LONG!!`
    Prefix,
    /// Wrap the value in a red-background `<span>`
    Highlight,
}

impl LongNameFlag {
    fn apply(&self, value: &str) -> String {
        match self {
            LongNameFlag::None => value.to_string(),
            LongNameFlag::Prefix => format!("{}{}", TOO_LONG_PREFIX, value),
            LongNameFlag::Highlight => format!("{}{}{}", HIGHLIGHT_OPEN, value, HIGHLIGHT_CLOSE),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportOptions {
    pub long_name_flag: LongNameFlag,
    /// Names with more characters than this are flagged
    pub long_name_threshold: usize,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            long_name_flag: LongNameFlag::None,
            long_name_threshold: 32,
        }
    }
}

/// Serialized export and its suggested file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedCsv {
    pub csv: String,
    pub filename: String,
}

/// `cleaned_<base>_<timestamp>.csv` for an export made at `at`.
///
/// `<base>` is the original name with its first `.csv` removed; the
/// timestamp is ISO-8601 UTC with `:` and `.` replaced by `-`.
pub fn export_filename_at(original_filename: &str, at: DateTime<Utc>) -> String {
    let base = original_filename.replacen(".csv", "", 1);
    let timestamp = at
        .to_rfc3339_opts(SecondsFormat::Millis, true)
        .replace([':', '.'], "-");
    format!("cleaned_{}_{}.csv", base, timestamp)
}

pub fn export_filename(original_filename: &str) -> String {
    export_filename_at(original_filename, Utc::now())
}

/// Serialize finalized rows to CSV text.
///
/// The header is every column seen across all rows, in first-seen order;
/// rows lacking a column get an empty cell.
pub fn export_csv(rows: &[Row], original_filename: &str, options: &ExportOptions) -> Result<ExportedCsv> {
    debug!("Exporting {} rows to CSV", rows.len());

    let header: IndexSet<&str> = rows
        .iter()
        .flat_map(|r| r.keys().map(String::as_str))
        .collect();

    let mut wtr = Writer::from_writer(Vec::new());
    if !header.is_empty() {
        wtr.write_record(header.iter())?;
    }

    let mut flagged = 0;
    for r in rows {
        let record: Vec<String> = header
            .iter()
            .map(|column| {
                let value = row::value(r, column);
                if *column == row::CLEANED_COMPANY_NAME
                    && value.chars().count() > options.long_name_threshold
                {
                    flagged += 1;
                    options.long_name_flag.apply(value)
                } else {
                    value.to_string()
                }
            })
            .collect();
        wtr.write_record(&record)?;
    }

    let bytes = wtr.into_inner().context("Failed to flush CSV writer")?;
    let csv = String::from_utf8(bytes).context("CSV output was not valid UTF-8")?;

    if flagged > 0 {
        info!("{} company names exceed {} characters", flagged, options.long_name_threshold);
    }

    Ok(ExportedCsv {
        csv,
        filename: export_filename(original_filename),
    })
}

/// Write an export into `dir` under its suggested name
pub fn write_export(export: &ExportedCsv, dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory: {}", dir.display()))?;

    let path = dir.join(&export.filename);
    fs::write(&path, export.csv.as_bytes())
        .with_context(|| format!("Failed to write export: {}", path.display()))?;

    info!("Successfully exported CSV: {}", path.display());
    Ok(path)
}
