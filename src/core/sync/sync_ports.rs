// Ports: what the sync core needs from the outside world.
// The infra layer provides the Notion and Google Sheets implementations; tests
// and --dry-run use the in-memory sheet.

use async_trait::async_trait;

use super::sync_config::SyncJobsFile;
use super::sync_models::{
    CellValue, ChartSummary, PieChartRequest, RawRecord, SheetRange, SyncError,
};

/// Read side: the external tabular data source.
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Every record currently in the database. Implementations must exhaust
    /// pagination themselves.
    async fn query_database(&self, database_id: &str) -> Result<Vec<RawRecord>, SyncError>;

    /// A single record, used to resolve relation references.
    async fn fetch_record(&self, record_id: &str) -> Result<RawRecord, SyncError>;
}

/// Write side: a spreadsheet with named sheets and embedded charts.
#[async_trait]
pub trait SheetGateway: Send + Sync {
    /// 1-based index of the last row holding any value, 0 for an empty sheet.
    async fn last_row(&self, sheet: &str) -> Result<u32, SyncError>;

    /// Clears every cell in rows `first..=last` across all columns.
    async fn clear_rows(&self, sheet: &str, first: u32, last: u32) -> Result<(), SyncError>;

    /// Writes `values` into `range`. The block must match the range's shape.
    async fn write_range(
        &self,
        range: &SheetRange,
        values: Vec<Vec<CellValue>>,
    ) -> Result<(), SyncError>;

    /// Reads `columns` columns starting at `range.origin`, down to the last
    /// populated row. `range.rows` is ignored.
    async fn read_range(&self, range: &SheetRange) -> Result<Vec<Vec<CellValue>>, SyncError>;

    /// Charts on `sheet`, in the sheet's own order.
    async fn list_charts(&self, sheet: &str) -> Result<Vec<ChartSummary>, SyncError>;

    /// Inserts a pie chart on `sheet` and returns its id.
    async fn insert_pie_chart(
        &self,
        sheet: &str,
        request: &PieChartRequest,
    ) -> Result<i64, SyncError>;

    /// Points an existing chart at `data`, keeping its title, style and position.
    async fn rebind_chart(
        &self,
        sheet: &str,
        chart_id: i64,
        data: &SheetRange,
    ) -> Result<(), SyncError>;
}

/// Where sync jobs are configured.
#[async_trait]
pub trait JobConfigStore: Send + Sync {
    async fn load(&self) -> Result<SyncJobsFile, SyncError>;
}
