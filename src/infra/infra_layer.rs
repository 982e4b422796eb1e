// The infra module contains implementations of core traits.
// Each external system gets its own submodule.

#[path = "notion/mod.rs"]
pub mod notion;

#[path = "google_sheets/mod.rs"]
pub mod google_sheets;

#[path = "config/mod.rs"]
pub mod config;

#[path = "sheets_memory/sheets_memory_store.rs"]
pub mod sheets_memory;
