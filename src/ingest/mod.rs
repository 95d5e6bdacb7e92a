//! Bulk DO import from spreadsheets.
//!
//! The first row of the sheet is a header. Columns are positional:
//!
//! | col | field            |
//! |-----|------------------|
//! | 0   | committee center |
//! | 1   | (unused)         |
//! | 2   | DO number        |
//! | 3   | date             |
//! | 4-6 | coarse/fine/common grain |
//! | 7   | total (ignored, recomputed) |
//!
//! Committee centers are usually merged cells spanning several DO rows, so a
//! blank center inherits the last non-blank one above it. Rows without a DO
//! number are not candidates at all. Malformed cells never fail the import;
//! they are noted on the candidate instead.

pub mod date;
pub mod spreadsheet;

use std::fmt;
use std::path::Path;

use rust_decimal::Decimal;

use crate::compute::parse_decimal_field;
use crate::config::ImportSettings;
use crate::model::{DoEntry, GrainKind};

const COL_CENTER: usize = 0;
const COL_DO_NUMBER: usize = 2;
const COL_DATE: usize = 3;
static EMPTY: Cell = Cell::Empty;

const GRAIN_COLUMNS: [(usize, GrainKind, &str); 3] = [
    (4, GrainKind::Coarse, "grainCoarse"),
    (5, GrainKind::Fine, "grainFine"),
    (6, GrainKind::Common, "grainCommon"),
];

/// One spreadsheet cell, reduced to what the import cares about.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
    /// A cell formatted as a date, holding its 1900-epoch serial.
    DateSerial(f64),
}

impl Cell {
    /// Trimmed text cell; blank text is [`Cell::Empty`].
    pub fn text(raw: &str) -> Cell {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            Cell::Empty
        } else {
            Cell::Text(trimmed.to_string())
        }
    }

    /// Cell rendered as an identifier. Whole numbers lose their `.0`.
    fn as_label(&self) -> Option<String> {
        match self {
            Cell::Empty => None,
            Cell::Text(text) => Some(text.clone()),
            Cell::Number(value) | Cell::DateSerial(value) => {
                if value.fract() == 0.0 && value.abs() < 1e15 {
                    Some(format!("{}", *value as i64))
                } else {
                    Some(value.to_string())
                }
            }
        }
    }
}

#[derive(Debug)]
pub enum IngestError {
    /// The file could not be opened or parsed at all.
    Unreadable { path: String, reason: String },
    UnsupportedFormat(String),
    /// The file was readable but held no DO rows.
    NoData,
}

impl fmt::Display for IngestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IngestError::Unreadable { path, reason } => {
                write!(f, "Unreadable file {}: {}", path, reason)
            }
            IngestError::UnsupportedFormat(ext) if ext.is_empty() => {
                write!(f, "Unreadable file: no extension, expected .xlsx, .xls or .csv")
            }
            IngestError::UnsupportedFormat(ext) => {
                write!(f, "Unreadable file: .{} is not a spreadsheet format", ext)
            }
            IngestError::NoData => write!(f, "No DO entries found in file"),
        }
    }
}

impl std::error::Error for IngestError {}

/// A parsed row offered for commit.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    /// 1-based row in the source sheet (the header is row 1).
    pub row: usize,
    pub entry: DoEntry,
    pub valid: bool,
    pub notes: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ingestion {
    pub candidates: Vec<Candidate>,
    /// The sheet had more rows than `import.max_rows`; the rest were not read.
    pub truncated: bool,
}

impl Ingestion {
    pub fn valid_entries(&self) -> Vec<DoEntry> {
        self.candidates
            .iter()
            .filter(|c| c.valid)
            .map(|c| c.entry.clone())
            .collect()
    }

    pub fn valid_count(&self) -> usize {
        self.candidates.iter().filter(|c| c.valid).count()
    }

    pub fn invalid_count(&self) -> usize {
        self.candidates.len() - self.valid_count()
    }
}

/// Read and ingest a spreadsheet from disk.
pub fn ingest_file(path: impl AsRef<Path>, settings: &ImportSettings) -> Result<Ingestion, IngestError> {
    let path = path.as_ref();
    // Header plus max_rows, and one more to tell whether anything was cut off.
    let limit = settings.max_rows.saturating_add(1);
    let mut rows = spreadsheet::read_rows(path, limit.saturating_add(1))?;
    let truncated = rows.len() > limit;
    if truncated {
        rows.truncate(limit);
        log::warn!(
            "{} has more than {} rows, the remainder was not imported",
            path.display(),
            settings.max_rows
        );
    }

    let mut ingestion = ingest_rows(&rows)?;
    ingestion.truncated = truncated;
    log::info!(
        "ingested {}: {} candidates, {} valid, {} invalid",
        path.display(),
        ingestion.candidates.len(),
        ingestion.valid_count(),
        ingestion.invalid_count()
    );
    Ok(ingestion)
}

/// Turn raw rows (header first) into DO candidates.
pub fn ingest_rows(rows: &[Vec<Cell>]) -> Result<Ingestion, IngestError> {
    let mut candidates = Vec::new();
    let mut current_center: Option<String> = None;

    for (index, cells) in rows.iter().enumerate().skip(1) {
        let cell = |col: usize| cells.get(col).unwrap_or(&EMPTY);

        if let Some(center) = cell(COL_CENTER).as_label() {
            current_center = Some(center);
        }
        let do_number = match cell(COL_DO_NUMBER).as_label() {
            Some(do_number) => do_number,
            None => continue,
        };
        let center = current_center.clone().unwrap_or_default();

        let mut notes = Vec::new();
        let date = read_date(cell(COL_DATE), &mut notes);
        let mut entry = DoEntry::new(
            center,
            do_number,
            date,
            Decimal::ZERO,
            Decimal::ZERO,
            Decimal::ZERO,
        );
        for (col, kind, field) in GRAIN_COLUMNS {
            entry.set_grain(kind, read_quantity(cell(col), field, &mut notes));
        }

        let valid = !entry.committee_center.is_empty() && !entry.do_number.is_empty();
        if !valid {
            notes.push("committee center is missing".to_string());
        }
        candidates.push(Candidate {
            row: index + 1,
            entry,
            valid,
            notes,
        });
    }

    if candidates.is_empty() {
        return Err(IngestError::NoData);
    }
    Ok(Ingestion {
        candidates,
        truncated: false,
    })
}

fn read_date(cell: &Cell, notes: &mut Vec<String>) -> Option<chrono::NaiveDate> {
    let parsed = match cell {
        Cell::Empty => return None,
        Cell::Number(serial) | Cell::DateSerial(serial) => date::from_serial(*serial),
        Cell::Text(text) => date::parse_text(text),
    };
    if parsed.is_none() {
        let shown = cell.as_label().unwrap_or_default();
        notes.push(format!("date '{}' was not recognised", shown));
    }
    parsed
}

fn read_quantity(cell: &Cell, field: &str, notes: &mut Vec<String>) -> Option<Decimal> {
    let parsed = match cell {
        Cell::Empty => return None,
        Cell::Number(value) | Cell::DateSerial(value) => {
            Decimal::try_from(*value).ok().map(|d| d.normalize())
        }
        Cell::Text(text) => parse_decimal_field(field, text).ok().flatten(),
    };
    match parsed {
        Some(quantity) if quantity >= Decimal::ZERO => Some(quantity),
        _ => {
            let shown = cell.as_label().unwrap_or_default();
            notes.push(format!("{} '{}' is not a valid quantity, counted as 0", field, shown));
            None
        }
    }
}
