// Notion -> Google Sheets sync: everything that decides what ends up in the
// spreadsheet. I/O happens through the ports in `sync_ports`.

pub mod aggregator;
pub mod chart_sync;
pub mod normalizer;
pub mod sheet_writer;
pub mod sync_config;
pub mod sync_models;
pub mod sync_ports;
pub mod sync_service;

pub use sync_config::SyncJobsFile;
pub use sync_models::{
    CellAnchor, CellValue, ChartOutcome, ChartSummary, FieldValue, PieChartRequest, RawRecord,
    SheetRange, SyncError, SyncReport,
};
pub use sync_ports::{JobConfigStore, RecordSource, SheetGateway};
pub use sync_service::SyncService;
