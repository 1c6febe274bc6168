//! Export discovery and ingestion adapters.
//!
//! Turns raw file bytes into ordered [`RawRow`]s. Two adapters exist, one for
//! delimited text and one for spreadsheets; exactly one runs per file, picked
//! by [`ExportFormat::from_path`] before any byte is read.

use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};

use calamine::{open_workbook_auto_from_rs, Data, Range, Reader};
use charge_core::error::{AnalyticsError, Result};
use charge_core::models::{RawRow, RawValue};
use tracing::{debug, warn};

/// Row-level errors quoted in an aggregated parse failure.
const MAX_REPORTED_ROW_ERRORS: usize = 3;

const DELIMITER_CANDIDATES: [u8; 4] = [b',', b'\t', b';', b'|'];

// ── ExportFormat ──────────────────────────────────────────────────────────────

/// Which adapter a file is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    /// Comma/tab/semicolon/pipe separated text, optionally gzip-compressed.
    Delimited { compressed: bool },
    /// Any workbook calamine can open.
    Spreadsheet,
}

impl ExportFormat {
    pub const DELIMITED_EXTENSIONS: &'static [&'static str] = &["csv", "tsv", "csv.gz", "tsv.gz"];
    pub const SPREADSHEET_EXTENSIONS: &'static [&'static str] =
        &["xlsx", "xls", "xlsm", "xlsb", "ods"];

    /// Pick the adapter for `path` from its extension.
    ///
    /// Unknown extensions fail with [`AnalyticsError::UnsupportedFormat`].
    pub fn from_path(path: &Path) -> Result<Self> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        if let Some(stem) = name.strip_suffix(".gz") {
            if stem.ends_with(".csv") || stem.ends_with(".tsv") {
                return Ok(ExportFormat::Delimited { compressed: true });
            }
        }

        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        match extension.as_str() {
            "csv" | "tsv" => Ok(ExportFormat::Delimited { compressed: false }),
            "xlsx" | "xls" | "xlsm" | "xlsb" | "ods" => Ok(ExportFormat::Spreadsheet),
            _ => Err(AnalyticsError::UnsupportedFormat {
                path: path.to_path_buf(),
                extension,
            }),
        }
    }

    pub fn is_supported(path: &Path) -> bool {
        Self::from_path(path).is_ok()
    }

    /// All recognised extensions, delimited first.
    pub fn supported_extensions() -> impl Iterator<Item = &'static str> {
        Self::DELIMITED_EXTENSIONS
            .iter()
            .chain(Self::SPREADSHEET_EXTENSIONS.iter())
            .copied()
    }
}

// ── Discovery ─────────────────────────────────────────────────────────────────

/// Expand `inputs` into export files.
///
/// Files are kept as given (even with an unsupported extension, so the caller
/// sees the format error); directories are walked for supported files.
pub fn find_export_files(inputs: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for input in inputs {
        if input.is_dir() {
            let mut found: Vec<PathBuf> = walkdir::WalkDir::new(input)
                .follow_links(true)
                .into_iter()
                .filter_map(|entry| entry.ok())
                .filter(|entry| entry.file_type().is_file() && ExportFormat::is_supported(entry.path()))
                .map(|entry| entry.into_path())
                .collect();
            found.sort();
            if found.is_empty() {
                warn!("No export files found in {}", input.display());
            }
            files.extend(found);
        } else {
            files.push(input.clone());
        }
    }
    files
}

// ── Dispatch ──────────────────────────────────────────────────────────────────

/// Run the adapter for `format` over `bytes`.
pub fn read_rows(file_name: &str, format: ExportFormat, bytes: Vec<u8>) -> Result<Vec<RawRow>> {
    let rows = match format {
        ExportFormat::Delimited { compressed } => {
            let bytes = if compressed {
                gunzip(file_name, &bytes)?
            } else {
                bytes
            };
            DelimitedReader::read(file_name, &String::from_utf8_lossy(&bytes))?
        }
        ExportFormat::Spreadsheet => SpreadsheetReader::read(file_name, bytes)?,
    };
    debug!("{}: read {} raw rows", file_name, rows.len());
    Ok(rows)
}

fn gunzip(file_name: &str, bytes: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = flate2::read::GzDecoder::new(bytes);
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(|e| AnalyticsError::parse(file_name, format!("invalid gzip stream: {}", e)))?;
    Ok(out)
}

// ── Delimited text ────────────────────────────────────────────────────────────

/// Adapter for delimited text exports.
pub struct DelimitedReader;

impl DelimitedReader {
    /// Tokenize `text` with the first line as headers.
    ///
    /// Blank lines are skipped. Every row whose field count differs from the
    /// header is collected; if any exist the whole file fails with a message
    /// quoting the first few.
    pub fn read(file_name: &str, text: &str) -> Result<Vec<RawRow>> {
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);
        let delimiter = Self::sniff_delimiter(text);

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(text.as_bytes());

        let headers: Vec<String> = reader
            .headers()
            .map_err(|e| AnalyticsError::parse(file_name, format!("unreadable header: {}", e)))?
            .iter()
            .map(str::to_string)
            .collect();
        if headers.iter().all(|h| h.is_empty()) {
            return Err(AnalyticsError::parse(file_name, "missing header row"));
        }

        let mut rows = Vec::new();
        let mut errors: Vec<(u64, String)> = Vec::new();

        for (idx, record) in reader.records().enumerate() {
            // Header is line 1; fall back to that when csv gives no position.
            let fallback_line = idx as u64 + 2;
            match record {
                Ok(record) => {
                    if record.iter().all(|f| f.is_empty()) {
                        continue;
                    }
                    if record.len() != headers.len() {
                        let line = record.position().map_or(fallback_line, |p| p.line());
                        errors.push((
                            line,
                            format!("expected {} fields, found {}", headers.len(), record.len()),
                        ));
                        continue;
                    }
                    rows.push(RawRow::from_pairs(
                        headers.iter().map(String::as_str).zip(record.iter()),
                    ));
                }
                Err(e) => {
                    let line = e.position().map_or(fallback_line, |p| p.line());
                    errors.push((line, e.to_string()));
                }
            }
        }

        if !errors.is_empty() {
            return Err(AnalyticsError::parse(file_name, summarize_row_errors(&errors)));
        }
        Ok(rows)
    }

    /// Most frequent candidate delimiter on the first non-blank line; comma
    /// wins ties and the no-candidate case.
    pub fn sniff_delimiter(text: &str) -> u8 {
        let Some(first) = text.lines().find(|l| !l.trim().is_empty()) else {
            return b',';
        };
        let mut best = (b',', 0usize);
        for candidate in DELIMITER_CANDIDATES {
            let count = first.bytes().filter(|&b| b == candidate).count();
            if count > best.1 {
                best = (candidate, count);
            }
        }
        best.0
    }
}

fn summarize_row_errors(errors: &[(u64, String)]) -> String {
    let cited: Vec<String> = errors
        .iter()
        .take(MAX_REPORTED_ROW_ERRORS)
        .map(|(line, msg)| format!("row {}: {}", line, msg))
        .collect();
    format!("{} malformed row(s): {}", errors.len(), cited.join("; "))
}

// ── Spreadsheet ───────────────────────────────────────────────────────────────

/// Adapter for workbook exports. Only the first worksheet is read.
pub struct SpreadsheetReader;

impl SpreadsheetReader {
    pub fn read(file_name: &str, bytes: Vec<u8>) -> Result<Vec<RawRow>> {
        let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))
            .map_err(|e| AnalyticsError::parse(file_name, format!("unreadable workbook: {}", e)))?;

        let sheet = workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or_else(|| AnalyticsError::parse(file_name, "workbook has no worksheets"))?;

        let range = workbook.worksheet_range(&sheet).map_err(|e| {
            AnalyticsError::parse(file_name, format!("unreadable worksheet '{}': {}", sheet, e))
        })?;

        Self::rows_from_range(file_name, &range)
    }

    /// Convert a worksheet range into rows, first row as headers.
    pub fn rows_from_range(file_name: &str, range: &Range<Data>) -> Result<Vec<RawRow>> {
        let mut rows_iter = range.rows();
        let header_cells = rows_iter
            .next()
            .filter(|cells| cells.iter().any(|c| !matches!(cell_value(c), RawValue::Empty)))
            .ok_or_else(|| AnalyticsError::parse(file_name, "first worksheet is empty"))?;

        let headers: Vec<String> = header_cells
            .iter()
            .enumerate()
            .map(|(i, cell)| {
                let normalized = normalize_sheet_header(&cell_value(cell).to_text());
                if normalized.is_empty() {
                    format!("column_{}", i + 1)
                } else {
                    normalized
                }
            })
            .collect();

        let mut rows = Vec::new();
        for cells in rows_iter {
            let values: Vec<RawValue> = cells.iter().map(cell_value).collect();
            if values.iter().all(RawValue::is_empty) {
                continue;
            }
            let mut row = RawRow::new();
            for (header, value) in headers.iter().zip(values) {
                row.push(header.clone(), value);
            }
            rows.push(row);
        }
        Ok(rows)
    }
}

/// Lower-case and replace every run of whitespace or punctuation with `_`.
fn normalize_sheet_header(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending_sep = false;
    for c in raw.trim().chars() {
        if c.is_alphanumeric() {
            if pending_sep && !out.is_empty() {
                out.push('_');
            }
            pending_sep = false;
            out.extend(c.to_lowercase());
        } else {
            pending_sep = true;
        }
    }
    out
}

fn cell_value(cell: &Data) -> RawValue {
    match cell {
        Data::Int(i) => RawValue::Number(*i as f64),
        Data::Float(f) => RawValue::Number(*f),
        Data::String(s) if s.trim().is_empty() => RawValue::Empty,
        Data::String(s) => RawValue::Text(s.clone()),
        Data::Bool(b) => RawValue::Text(b.to_string()),
        Data::DateTime(dt) if dt.is_duration() => match dt.as_duration() {
            Some(d) => RawValue::Number(d.num_seconds() as f64 / 60.0),
            None => RawValue::Empty,
        },
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(naive) => RawValue::Text(naive.format("%Y-%m-%d %H:%M:%S").to_string()),
            None => RawValue::Empty,
        },
        Data::DateTimeIso(s) | Data::DurationIso(s) => RawValue::Text(s.clone()),
        Data::Error(_) | Data::Empty => RawValue::Empty,
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────
