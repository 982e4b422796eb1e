use std::path::PathBuf;

use clap::Parser;

/// Mirror Notion databases into a Google Sheet and keep a pie chart of
/// totals per category.
#[derive(Debug, Parser)]
#[command(name = "notion-sheet-sync", version, about)]
pub struct Cli {
    /// JSON file listing the sync jobs.
    #[arg(long, env = "SYNC_JOBS_FILE", default_value = "sync_jobs.json")]
    pub config: PathBuf,

    /// Only run the job with this chart name (repeatable).
    #[arg(long = "only", value_name = "CHART")]
    pub only: Vec<String>,

    /// Read from Notion but write to an in-memory sheet instead of Google Sheets.
    #[arg(long)]
    pub dry_run: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_only_flags_collect() {
        let cli = Cli::parse_from([
            "notion-sheet-sync",
            "--config",
            "jobs.json",
            "--only",
            "Expenses",
            "--only",
            "Income",
            "--dry-run",
        ]);
        assert_eq!(cli.config, PathBuf::from("jobs.json"));
        assert_eq!(cli.only, vec!["Expenses", "Income"]);
        assert!(cli.dry_run);
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
