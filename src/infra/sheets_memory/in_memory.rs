// In-memory implementation of SheetGateway.
//
// Used by `--dry-run` (nothing leaves the machine) and by the core tests. It
// keeps cells in a sparse map per sheet and charts in insertion order, which
// is all the sync ever looks at.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;

use crate::core::sync::{
    CellAnchor, CellValue, ChartSummary, PieChartRequest, SheetGateway, SheetRange, SyncError,
};

/// A pie chart as the in-memory sheet remembers it.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredChart {
    pub chart_id: i64,
    pub title: String,
    pub data: SheetRange,
    pub anchor: CellAnchor,
    pub title_font_size: Option<u32>,
}

#[derive(Debug, Default)]
struct SheetState {
    /// (row, column) -> value, both 1-based. Empty cells are never stored.
    cells: BTreeMap<(u32, u32), CellValue>,
    charts: Vec<StoredChart>,
}

impl SheetState {
    fn last_row(&self) -> u32 {
        self.cells.keys().map(|(row, _)| *row).max().unwrap_or(0)
    }
}

/// Spreadsheet held entirely in memory.
///
/// **DashMap:** each sheet is its own entry, so the gateway can be shared by
/// reference like the HTTP-backed one.
pub struct InMemorySheetGateway {
    sheets: DashMap<String, SheetState>,
    next_chart_id: AtomicI64,
}

impl InMemorySheetGateway {
    pub fn new() -> Self {
        Self {
            sheets: DashMap::new(),
            next_chart_id: AtomicI64::new(1),
        }
    }

    /// Creates a spreadsheet with the given (empty) sheets.
    #[cfg(test)]
    pub fn with_sheets(names: &[&str]) -> Self {
        let gateway = Self::new();
        for name in names {
            gateway.add_sheet(name);
        }
        gateway
    }

    pub fn add_sheet(&self, name: &str) {
        self.sheets.entry(name.to_string()).or_default();
    }

    /// Sets one cell, creating the sheet if needed.
    #[cfg(test)]
    pub fn set_cell(&self, sheet: &str, row: u32, column: u32, value: CellValue) {
        let mut state = self.sheets.entry(sheet.to_string()).or_default();
        match value {
            CellValue::Empty => {
                state.cells.remove(&(row, column));
            }
            value => {
                state.cells.insert((row, column), value);
            }
        }
    }

    #[cfg(test)]
    pub fn cell(&self, sheet: &str, row: u32, column: u32) -> CellValue {
        self.sheets
            .get(sheet)
            .and_then(|state| state.cells.get(&(row, column)).cloned())
            .unwrap_or(CellValue::Empty)
    }

    /// Every non-empty cell of a sheet.
    #[cfg(test)]
    pub fn snapshot(&self, sheet: &str) -> BTreeMap<(u32, u32), CellValue> {
        self.sheets
            .get(sheet)
            .map(|state| state.cells.clone())
            .unwrap_or_default()
    }

    #[cfg(test)]
    pub fn charts(&self, sheet: &str) -> Vec<StoredChart> {
        self.sheets
            .get(sheet)
            .map(|state| state.charts.clone())
            .unwrap_or_default()
    }

    fn missing(sheet: &str) -> SyncError {
        SyncError::SheetNotFound(sheet.to_string())
    }
}

impl Default for InMemorySheetGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SheetGateway for InMemorySheetGateway {
    async fn last_row(&self, sheet: &str) -> Result<u32, SyncError> {
        let state = self.sheets.get(sheet).ok_or_else(|| Self::missing(sheet))?;
        Ok(state.last_row())
    }

    async fn clear_rows(&self, sheet: &str, first: u32, last: u32) -> Result<(), SyncError> {
        let mut state = self.sheets.get_mut(sheet).ok_or_else(|| Self::missing(sheet))?;
        state.cells.retain(|(row, _), _| *row < first || *row > last);
        Ok(())
    }

    async fn write_range(
        &self,
        range: &SheetRange,
        values: Vec<Vec<CellValue>>,
    ) -> Result<(), SyncError> {
        if values.len() != range.rows as usize
            || values.iter().any(|row| row.len() != range.columns as usize)
        {
            return Err(SyncError::Sheet(format!(
                "data does not match the shape of {}",
                range.to_a1()
            )));
        }

        let mut state = self
            .sheets
            .get_mut(&range.sheet)
            .ok_or_else(|| Self::missing(&range.sheet))?;

        for (r, row) in values.into_iter().enumerate() {
            for (c, value) in row.into_iter().enumerate() {
                let key = (range.origin.row + r as u32, range.origin.column + c as u32);
                match value {
                    CellValue::Empty => {
                        state.cells.remove(&key);
                    }
                    value => {
                        state.cells.insert(key, value);
                    }
                }
            }
        }
        Ok(())
    }

    async fn read_range(&self, range: &SheetRange) -> Result<Vec<Vec<CellValue>>, SyncError> {
        let state = self
            .sheets
            .get(&range.sheet)
            .ok_or_else(|| Self::missing(&range.sheet))?;

        let first_col = range.origin.column;
        let last_col = range.last_column();
        let last_row = state
            .cells
            .keys()
            .filter(|(row, col)| *row >= range.origin.row && (first_col..=last_col).contains(col))
            .map(|(row, _)| *row)
            .max();

        let Some(last_row) = last_row else {
            return Ok(Vec::new());
        };

        // Mirrors the Sheets API: trailing empty cells of a row are omitted.
        let mut rows = Vec::new();
        for row in range.origin.row..=last_row {
            let mut values: Vec<CellValue> = (first_col..=last_col)
                .map(|col| state.cells.get(&(row, col)).cloned().unwrap_or(CellValue::Empty))
                .collect();
            while values.last() == Some(&CellValue::Empty) {
                values.pop();
            }
            rows.push(values);
        }
        Ok(rows)
    }

    async fn list_charts(&self, sheet: &str) -> Result<Vec<ChartSummary>, SyncError> {
        let state = self.sheets.get(sheet).ok_or_else(|| Self::missing(sheet))?;
        Ok(state
            .charts
            .iter()
            .map(|chart| ChartSummary {
                chart_id: chart.chart_id,
                title: Some(chart.title.clone()),
            })
            .collect())
    }

    async fn insert_pie_chart(
        &self,
        sheet: &str,
        request: &PieChartRequest,
    ) -> Result<i64, SyncError> {
        if !self.sheets.contains_key(&request.data.sheet) {
            return Err(Self::missing(&request.data.sheet));
        }

        let mut state = self.sheets.get_mut(sheet).ok_or_else(|| Self::missing(sheet))?;
        let chart_id = self.next_chart_id.fetch_add(1, Ordering::Relaxed);
        state.charts.push(StoredChart {
            chart_id,
            title: request.title.clone(),
            data: request.data.clone(),
            anchor: request.anchor,
            title_font_size: request.title_font_size,
        });
        Ok(chart_id)
    }

    async fn rebind_chart(
        &self,
        sheet: &str,
        chart_id: i64,
        data: &SheetRange,
    ) -> Result<(), SyncError> {
        let mut state = self.sheets.get_mut(sheet).ok_or_else(|| Self::missing(sheet))?;
        let chart = state
            .charts
            .iter_mut()
            .find(|chart| chart.chart_id == chart_id)
            .ok_or_else(|| SyncError::Sheet(format!("chart {} not found on '{}'", chart_id, sheet)))?;
        chart.data = data.clone();
        Ok(())
    }
}
