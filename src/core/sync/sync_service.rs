use chrono::Utc;

use super::aggregator::aggregate;
use super::chart_sync::sync_chart;
use super::normalizer::RecordNormalizer;
use super::sheet_writer::{read_destination, replace_rows, write_aggregate};
use super::sync_config::SyncJob;
use super::sync_models::{SyncError, SyncReport};
use super::sync_ports::{RecordSource, SheetGateway};

/// Runs sync jobs: fetch, normalize, rewrite rows, aggregate, chart.
///
/// Every run recomputes everything from scratch. Nothing is kept between
/// runs except what ends up in the spreadsheet.
pub struct SyncService<S: RecordSource, G: SheetGateway> {
    source: S,
    gateway: G,
}

impl<S, G> SyncService<S, G>
where
    S: RecordSource,
    G: SheetGateway,
{
    pub fn new(source: S, gateway: G) -> Self {
        Self { source, gateway }
    }

    #[cfg(test)]
    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    /// Runs one job end to end.
    ///
    /// A source failure aborts before anything is written. A sheet failure
    /// part-way through can leave the rows rewritten but the aggregate and
    /// chart stale.
    pub async fn run(&self, job: &SyncJob) -> Result<SyncReport, SyncError> {
        job.validate()?;

        tracing::info!(chart = %job.chart_name, database = %job.database_id, "Starting sync");
        let records = self.source.query_database(&job.database_id).await?;
        tracing::info!(chart = %job.chart_name, "Fetched {} record(s)", records.len());

        let batch = RecordNormalizer::new(&self.source, job)
            .normalize(&records)
            .await?;

        replace_rows(&self.gateway, &job.data_sheet, &batch.rows).await?;

        // Totals come from what the table holds now, not from the batch.
        let table = read_destination(&self.gateway, &job.data_sheet).await?;
        let totals = aggregate(table.iter().map(|(category, amount)| (category.as_str(), *amount)));

        let aggregate_range =
            write_aggregate(&self.gateway, &job.data_sheet, job.aggregate_anchor, &totals).await?;

        let chart = sync_chart(
            &self.gateway,
            &job.chart_sheet,
            &job.chart_name,
            job.chart_anchor,
            &aggregate_range,
        )
        .await?;

        tracing::info!(
            chart = %job.chart_name,
            rows = batch.rows.len(),
            skipped = batch.skipped.len(),
            categories = totals.len(),
            "Sync finished"
        );

        Ok(SyncReport {
            chart_name: job.chart_name.clone(),
            rows_written: batch.rows.len(),
            skipped: batch.skipped,
            totals,
            aggregate_range,
            chart,
            synced_at: Utc::now(),
        })
    }

    /// Runs jobs one after another. A failing job is logged and does not stop
    /// the ones after it.
    pub async fn run_all(
        &self,
        jobs: &[&SyncJob],
    ) -> Vec<(String, Result<SyncReport, SyncError>)> {
        let mut results = Vec::with_capacity(jobs.len());
        for job in jobs {
            let result = self.run(job).await;
            if let Err(e) = &result {
                tracing::error!(chart = %job.chart_name, "Sync failed: {}", e);
            }
            results.push((job.chart_name.clone(), result));
        }
        results
    }
}
