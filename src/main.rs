// This is the entry point of the Notion -> Google Sheets sync.
//
// **Architecture Overview:**
// - `core/` = Business logic (normalizing, aggregating, deciding chart updates)
// - `infra/` = Implementations of core traits (Notion, Google Sheets, job file)
// - `cli/` = Argument parsing and report output
//
// This file's job is to:
// 1. Load configuration
// 2. Initialize the clients (dependency injection)
// 3. Run every selected sync job and report the outcome

// These attrs point each module declaration at a more descriptive root file
// so we don't end up with several mod.rs files that all look the same.
#[path = "cli/cli_layer.rs"]
mod cli;
#[path = "core/core_layer.rs"]
mod core;
#[path = "infra/infra_layer.rs"]
mod infra;

use anyhow::{anyhow, bail, Context};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::report::render_report;
use crate::cli::Cli;
use crate::core::sync::{JobConfigStore, SyncService};
use crate::infra::config::JobFileStore;
use crate::infra::google_sheets::{GoogleSheetsClient, ServiceAccountAuth};
use crate::infra::notion::{NotionApiClient, DEFAULT_NOTION_VERSION};
use crate::infra::sheets_memory::InMemorySheetGateway;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file (if it exists) before clap
    // reads its env-backed defaults.
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    // ========================================================================
    // CONFIGURATION
    // ========================================================================

    let store = JobFileStore::new(&cli.config);
    let jobs_file = store
        .load()
        .await
        .with_context(|| format!("Failed to load jobs from {}", store.path().display()))?;

    let jobs = jobs_file.select(&cli.only);
    if jobs.is_empty() {
        bail!(
            "No sync job matches {:?} in {}",
            cli.only,
            store.path().display()
        );
    }

    let notion_token = std::env::var("NOTION_TOKEN").context(
        "Missing NOTION_TOKEN environment variable! Create a .env file with your integration token.",
    )?;
    let notion_version =
        std::env::var("NOTION_VERSION").unwrap_or_else(|_| DEFAULT_NOTION_VERSION.to_string());

    // ========================================================================
    // DEPENDENCY INJECTION
    // ========================================================================

    let notion = NotionApiClient::new(&notion_token, &notion_version)
        .context("Failed to create Notion API client")?;

    let results = if cli.dry_run {
        tracing::info!("Dry run: writing to an in-memory sheet");
        let sheet = InMemorySheetGateway::new();
        for job in &jobs {
            sheet.add_sheet(&job.data_sheet);
            sheet.add_sheet(&job.chart_sheet);
        }
        SyncService::new(notion, sheet).run_all(&jobs).await
    } else {
        let spreadsheet = std::env::var("SPREADSHEET_ID")
            .context("Missing SPREADSHEET_ID environment variable (or pass --dry-run)")?;
        let spreadsheet_id = GoogleSheetsClient::extract_spreadsheet_id(&spreadsheet)
            .ok_or_else(|| anyhow!("Could not extract spreadsheet ID from: {}", spreadsheet))?;

        let auth = ServiceAccountAuth::from_env()
            .await
            .context("Failed to load Google service account")?;
        tracing::info!("Using service account {}", auth.client_email());

        let sheets = GoogleSheetsClient::new(auth, spreadsheet_id);
        SyncService::new(notion, sheets).run_all(&jobs).await
    };

    // ========================================================================
    // REPORT
    // ========================================================================

    let total = results.len();
    let mut failed = 0;
    for (chart_name, result) in results {
        match result {
            Ok(report) => print!("{}", render_report(&report)),
            Err(e) => {
                failed += 1;
                println!("❌ {} failed: {}", chart_name, e);
            }
        }
    }

    if failed > 0 {
        bail!("{} of {} sync job(s) failed", failed, total);
    }
    Ok(())
}
