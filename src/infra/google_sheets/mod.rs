// =============================================================================
// GOOGLE SHEETS MODULE
// =============================================================================
//
// Writes the mirrored rows, the aggregate table and the pie chart into a
// Google Spreadsheet.
//
// **Architecture:**
// This lives in the infra layer because it handles external I/O. The core only
// sees the `SheetGateway` trait; it doesn't know whether the sheet is Google's
// or the in-memory one used for dry runs.
//
// **Authentication:**
// Service account only. Share the spreadsheet with the service account email
// (Editor) and point `GOOGLE_SERVICE_ACCOUNT_KEY` at the JSON key.

pub mod service_account;
pub mod sheets_client;

pub use service_account::ServiceAccountAuth;
pub use sheets_client::GoogleSheetsClient;
