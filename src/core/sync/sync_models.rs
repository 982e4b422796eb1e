// Domain models for the Notion -> Sheets sync.
// Nothing in here knows about HTTP, JSON or Google's chart objects; the infra
// layer maps its API structs onto these types.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// ERRORS
// ============================================================================

/// Failures that abort a sync job.
///
/// Row-level problems are NOT represented here; see [`RowRejection`].
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("Spreadsheet error: {0}")]
    Sheet(String),

    #[error("Sheet '{0}' does not exist in the spreadsheet")]
    SheetNotFound(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Why a record was left out of the destination table.
///
/// These are swallowed into log output and the sync report; they never stop
/// the batch.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RowRejection {
    #[error("item field '{field}' is missing or not a title ({found})")]
    MissingItem { field: String, found: String },

    #[error("category field '{field}' is missing or unusable ({found})")]
    MissingCategory { field: String, found: String },

    #[error("amount field '{field}' is missing or not a number ({found})")]
    MissingAmount { field: String, found: String },

    #[error("amount field '{field}' is null")]
    NullAmount { field: String },

    #[error("amount {amount} is zero or negative")]
    NonPositiveAmount { amount: f64 },

    #[error("amount field '{field}' is not a finite number ({amount})")]
    NonFiniteAmount { field: String, amount: f64 },
}

// ============================================================================
// SOURCE RECORDS
// ============================================================================

/// A single typed property of a source record.
///
/// Closed over the property types the sync understands, with an explicit
/// fallback arm carrying the unrecognised type tag.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Plain text of each title segment, in order.
    Title(Vec<String>),
    /// Label of the selected option, if any.
    Select(Option<String>),
    /// Ids of the related records.
    Relation(Vec<String>),
    /// `None` when the number property exists but holds no value.
    Number(Option<f64>),
    Unsupported(String),
}

impl FieldValue {
    /// Name of the property type, used in log lines and rejection reasons.
    pub fn type_tag(&self) -> &str {
        match self {
            FieldValue::Title(_) => "title",
            FieldValue::Select(_) => "select",
            FieldValue::Relation(_) => "relation",
            FieldValue::Number(_) => "number",
            FieldValue::Unsupported(tag) => tag,
        }
    }
}

/// Opaque record pulled from the source database.
#[derive(Debug, Clone, Default)]
pub struct RawRecord {
    pub id: String,
    pub fields: HashMap<String, FieldValue>,
}

impl RawRecord {
    #[cfg(test)]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            fields: HashMap::new(),
        }
    }

    #[cfg(test)]
    pub fn with_field(mut self, name: impl Into<String>, value: FieldValue) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }
}

/// Outcome of resolving a relation property to category text.
#[derive(Debug, Clone, PartialEq)]
pub enum RelationResolution {
    /// The relation holds zero references.
    NoRelation,
    /// At least one related record could not be turned into a title.
    Unresolved(String),
    /// One title, or several joined with [`CATEGORY_SEPARATOR`].
    Resolved(String),
}

/// Separator used both to join multi-relation categories and to split them
/// again during aggregation.
pub const CATEGORY_SEPARATOR: &str = ", ";

// ============================================================================
// NORMALIZED + AGGREGATED ROWS
// ============================================================================

/// One accepted row of the destination table.
///
/// Invariant: `item` and `category` are non-empty and `amount > 0`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedRow {
    pub item: String,
    pub category: String,
    pub amount: f64,
}

/// A record that was dropped, kept for the report.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedRecord {
    pub record_id: String,
    pub reason: RowRejection,
}

/// Result of normalising one batch of source records.
#[derive(Debug, Clone, Default)]
pub struct NormalizedBatch {
    pub rows: Vec<NormalizedRow>,
    pub skipped: Vec<SkippedRecord>,
}

/// Per-category total. One per distinct category token.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateRow {
    pub category: String,
    pub total: f64,
}

// ============================================================================
// SHEET GEOMETRY
// ============================================================================

/// A single value in a sheet grid.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Text(String),
    Number(f64),
    Empty,
}

impl CellValue {
    /// Numeric view of the cell. Numeric strings are accepted since the sheet
    /// may have been edited by hand.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) => Some(*n),
            CellValue::Text(text) => text.trim().parse::<f64>().ok(),
            CellValue::Empty => None,
        }
    }
}

/// 1-based cell position, the way spreadsheet users count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellAnchor {
    pub row: u32,
    pub column: u32,
}

impl CellAnchor {
    pub const fn new(row: u32, column: u32) -> Self {
        Self { row, column }
    }
}

/// Rectangular block on a named sheet. Rows/columns are 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetRange {
    pub sheet: String,
    pub origin: CellAnchor,
    pub rows: u32,
    pub columns: u32,
}

impl SheetRange {
    pub fn new(sheet: impl Into<String>, origin: CellAnchor, rows: u32, columns: u32) -> Self {
        Self {
            sheet: sheet.into(),
            origin,
            rows,
            columns,
        }
    }

    pub fn last_row(&self) -> u32 {
        self.origin.row + self.rows.saturating_sub(1)
    }

    pub fn last_column(&self) -> u32 {
        self.origin.column + self.columns.saturating_sub(1)
    }

    /// A1 notation, e.g. `'Expenses'!E1:F4`.
    pub fn to_a1(&self) -> String {
        format!(
            "{}!{}{}:{}{}",
            quote_sheet_name(&self.sheet),
            column_letters(self.origin.column),
            self.origin.row,
            column_letters(self.last_column()),
            self.last_row()
        )
    }
}

/// Quotes a sheet title for use in A1 notation (embedded quotes are doubled).
pub fn quote_sheet_name(sheet: &str) -> String {
    format!("'{}'", sheet.replace('\'', "''"))
}

/// Converts a 1-based column index to letters: 1 -> A, 27 -> AA.
pub fn column_letters(column: u32) -> String {
    let mut n = column.max(1);
    let mut letters = Vec::new();
    while n > 0 {
        let rem = ((n - 1) % 26) as u8;
        letters.push((b'A' + rem) as char);
        n = (n - 1) / 26;
    }
    letters.iter().rev().collect()
}

// ============================================================================
// CHARTS
// ============================================================================

/// What the gateway reports about a chart that already exists.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartSummary {
    pub chart_id: i64,
    pub title: Option<String>,
}

/// Everything needed to insert a fresh pie chart.
#[derive(Debug, Clone, PartialEq)]
pub struct PieChartRequest {
    pub title: String,
    pub data: SheetRange,
    pub anchor: CellAnchor,
    pub title_font_size: Option<u32>,
}

/// What the chart synchronizer decided to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartOutcome {
    /// The chart sheet had no charts at all.
    CreatedFirst,
    /// Charts existed, none with this title.
    CreatedAlongside,
    /// An existing chart with this title was rebound to the new data.
    Rebound { chart_id: i64 },
    /// The aggregate table had no rows, so the chart was left alone.
    SkippedEmpty,
}

// ============================================================================
// REPORT
// ============================================================================

/// Summary of one completed sync job, handed back to the CLI layer.
#[derive(Debug, Clone)]
pub struct SyncReport {
    pub chart_name: String,
    pub rows_written: usize,
    pub skipped: Vec<SkippedRecord>,
    pub totals: Vec<AggregateRow>,
    pub aggregate_range: SheetRange,
    pub chart: ChartOutcome,
    pub synced_at: DateTime<Utc>,
}
