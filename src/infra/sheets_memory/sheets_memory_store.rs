// In-memory spreadsheet, used by --dry-run and tests.

pub mod in_memory;

pub use in_memory::InMemorySheetGateway;
