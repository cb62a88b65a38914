//! CSV export discovery and parsing.
//!
//! Turns the text of a platform export into validated [`RawRow`]s. Header
//! location, channel filtering and required-field validation all happen
//! here; typed conversion is left to [`crate::transform`].

use std::path::{Path, PathBuf};
use std::sync::Arc;

use csv::{ReaderBuilder, StringRecord, Trim};
use pulse_core::data_processors::is_valid_email;
use pulse_core::error::IngestError;
use pulse_core::models::RecordKind;
use serde::Serialize;
use tracing::{debug, warn};

use crate::columns::{self, campaign, flow, subscriber};

/// Flow exports put report metadata above the header; only this many
/// leading records are searched for it.
pub const HEADER_SCAN_ROWS: usize = 10;

const BOM: char = '\u{feff}';

// ── RawRow ────────────────────────────────────────────────────────────────────

/// One untyped data row: header name → cell text, in file order.
#[derive(Debug, Clone)]
pub struct RawRow {
    line: u64,
    headers: Arc<[String]>,
    values: Vec<String>,
}

impl RawRow {
    pub fn new(line: u64, headers: Arc<[String]>, values: Vec<String>) -> Self {
        Self {
            line,
            headers,
            values,
        }
    }

    /// Build a row from `(column, value)` pairs.
    pub fn from_pairs(line: u64, pairs: &[(&str, &str)]) -> Self {
        let headers: Arc<[String]> = pairs.iter().map(|(h, _)| h.to_string()).collect();
        let values = pairs.iter().map(|(_, v)| v.to_string()).collect();
        Self::new(line, headers, values)
    }

    /// 1-based line number in the source file.
    pub fn line(&self) -> u64 {
        self.line
    }

    /// Trimmed cell value; `None` when the column is absent or the cell blank.
    pub fn get(&self, column: &str) -> Option<&str> {
        let index = self.headers.iter().position(|h| h == column)?;
        let value = self.values.get(index)?.trim();
        if value.is_empty() {
            None
        } else {
            Some(value)
        }
    }

    /// First non-blank value among `columns`.
    pub fn get_any(&self, columns: &[&str]) -> Option<&str> {
        columns.iter().find_map(|column| self.get(column))
    }

    /// Iterate `(column, value)` pairs; short rows yield fewer pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers
            .iter()
            .zip(self.values.iter())
            .map(|(h, v)| (h.as_str(), v.as_str()))
    }
}

/// A data row rejected by validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowWarning {
    pub line: u64,
    pub message: String,
}

/// The validated content of one export file.
#[derive(Debug, Clone)]
pub struct ParsedFile {
    pub kind: RecordKind,
    pub headers: Vec<String>,
    pub rows: Vec<RawRow>,
    pub warnings: Vec<RowWarning>,
    /// Rows excluded because they belong to a non-email channel.
    pub skipped_channel: usize,
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Find all `.csv` files recursively under `dir`, sorted by path.
pub fn find_csv_files(dir: &Path) -> Vec<PathBuf> {
    if !dir.exists() {
        warn!("Export directory does not exist: {}", dir.display());
        return Vec::new();
    }

    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry.file_type().is_file()
                && entry
                    .path()
                    .extension()
                    .map(|ext| ext.eq_ignore_ascii_case("csv"))
                    .unwrap_or(false)
        })
        .map(|entry| entry.into_path())
        .collect();

    files.sort();
    files
}

/// Classify an unlabelled export by its header signature.
pub fn detect_kind(text: &str) -> Option<RecordKind> {
    let text = text.strip_prefix(BOM).unwrap_or(text);
    let mut reader = csv_reader(text);

    for record in reader.records().take(HEADER_SCAN_ROWS).flatten() {
        let cells: Vec<String> = record.iter().map(clean_cell).collect();
        let has = |name: &str| cells.iter().any(|cell| cell == name);

        if has(flow::MESSAGE_ID) {
            return Some(RecordKind::Flows);
        }
        if has(campaign::SEND_TIME) && has(campaign::RECIPIENTS) {
            return Some(RecordKind::Campaigns);
        }
        if has(subscriber::CONSENT) {
            return Some(RecordKind::Subscribers);
        }
    }
    None
}

/// Parse the text of an export of the given `kind`.
///
/// Rows of non-email channels are skipped and rows missing required fields
/// are dropped with a [`RowWarning`]. The file itself is rejected when it is
/// empty, when a flow header cannot be located, or when no valid row remains.
pub fn parse_csv(kind: RecordKind, text: &str) -> Result<ParsedFile, IngestError> {
    let text = text.strip_prefix(BOM).unwrap_or(text);
    if text.trim().is_empty() {
        return Err(IngestError::EmptyFile);
    }

    let mut reader = csv_reader(text);
    let mut records = reader.records();

    let header = match kind {
        RecordKind::Flows => locate_flow_header(&mut records)?,
        RecordKind::Campaigns | RecordKind::Subscribers => match records.next() {
            Some(result) => result.map_err(|e| IngestError::Csv(e.to_string()))?,
            None => return Err(IngestError::EmptyFile),
        },
    };
    let headers: Arc<[String]> = header.iter().map(clean_cell).collect();

    let mut parsed = ParsedFile {
        kind,
        headers: headers.to_vec(),
        rows: Vec::new(),
        warnings: Vec::new(),
        skipped_channel: 0,
    };

    for result in records {
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                let line = e.position().map(|p| p.line()).unwrap_or_default();
                debug!("{}: unreadable row at line {}: {}", kind.label(), line, e);
                parsed.warnings.push(RowWarning {
                    line,
                    message: format!("unreadable row: {}", e),
                });
                continue;
            }
        };
        if record.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }

        let line = record.position().map(|p| p.line()).unwrap_or_default();
        let row = RawRow::new(
            line,
            Arc::clone(&headers),
            record.iter().map(str::to_string).collect(),
        );

        if !is_email_channel(kind, &row) {
            parsed.skipped_channel += 1;
            continue;
        }

        match validate_row(kind, &row) {
            Ok(()) => parsed.rows.push(row),
            Err(message) => {
                debug!("{}: dropped line {}: {}", kind.label(), line, message);
                parsed.warnings.push(RowWarning { line, message });
            }
        }
    }

    if parsed.rows.is_empty() {
        return Err(IngestError::NoValidRows {
            dropped: parsed.warnings.len(),
        });
    }

    debug!(
        "{}: {} valid rows, {} dropped, {} non-email skipped",
        kind.label(),
        parsed.rows.len(),
        parsed.warnings.len(),
        parsed.skipped_channel
    );
    Ok(parsed)
}

// ── Internal helpers ──────────────────────────────────────────────────────────

fn csv_reader(text: &str) -> csv::Reader<&[u8]> {
    ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(text.as_bytes())
}

fn clean_cell(cell: &str) -> String {
    cell.trim_start_matches(BOM).trim().to_string()
}

/// Consume records up to and including the `Day` header row.
fn locate_flow_header<I>(records: &mut I) -> Result<StringRecord, IngestError>
where
    I: Iterator<Item = Result<StringRecord, csv::Error>>,
{
    let mut scanned = 0;
    while scanned < HEADER_SCAN_ROWS {
        let Some(result) = records.next() else {
            break;
        };
        scanned += 1;

        let Ok(record) = result else {
            continue;
        };
        if record.get(0).map(clean_cell).as_deref() == Some(flow::DAY) {
            debug!("Flows file: header found after {} metadata rows", scanned - 1);
            return Ok(record);
        }
    }
    Err(IngestError::HeaderNotFound { scanned })
}

/// SMS and other non-email rows are excluded; a missing channel means email.
fn is_email_channel(kind: RecordKind, row: &RawRow) -> bool {
    let specific = match kind {
        RecordKind::Campaigns => Some(campaign::CHANNEL),
        RecordKind::Flows => Some(flow::CHANNEL),
        RecordKind::Subscribers => None,
    };
    let channel = specific
        .and_then(|column| row.get(column))
        .or_else(|| row.get(columns::CHANNEL));

    match channel {
        None => true,
        Some(value) => value.eq_ignore_ascii_case("email"),
    }
}

fn validate_row(kind: RecordKind, row: &RawRow) -> Result<(), String> {
    let required = match kind {
        RecordKind::Campaigns => campaign::REQUIRED,
        RecordKind::Flows => flow::REQUIRED,
        RecordKind::Subscribers => subscriber::REQUIRED,
    };
    let mut missing: Vec<&str> = required
        .iter()
        .copied()
        .filter(|column| row.get(column).is_none())
        .collect();

    if kind == RecordKind::Subscribers && row.get_any(subscriber::ID).is_none() {
        missing.push(subscriber::ID[0]);
    }
    if !missing.is_empty() {
        return Err(format!("missing required field(s): {}", missing.join(", ")));
    }

    if kind == RecordKind::Subscribers {
        let email = row.get(subscriber::EMAIL).unwrap_or_default();
        if !is_valid_email(email) {
            return Err(format!("invalid email address: {}", email));
        }
    }
    Ok(())
}

// ── Tests ──────────────────────────────────────────────────────────────────────
