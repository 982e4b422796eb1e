use std::fmt::Write;

use crate::core::sync::{ChartOutcome, SyncReport};

fn describe_chart(outcome: ChartOutcome) -> String {
    match outcome {
        ChartOutcome::CreatedFirst => "created (first chart on the sheet)".to_string(),
        ChartOutcome::CreatedAlongside => "created next to existing charts".to_string(),
        ChartOutcome::Rebound { chart_id } => format!("updated chart {}", chart_id),
        ChartOutcome::SkippedEmpty => "skipped (no totals to chart)".to_string(),
    }
}

/// Human-readable summary of one finished job.
pub fn render_report(report: &SyncReport) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "✅ {} synced at {}",
        report.chart_name,
        report.synced_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    let _ = writeln!(
        out,
        "   rows written: {}, skipped: {}",
        report.rows_written,
        report.skipped.len()
    );
    for skipped in &report.skipped {
        let _ = writeln!(out, "   - skipped {}: {}", skipped.record_id, skipped.reason);
    }
    let _ = writeln!(out, "   totals ({}):", report.aggregate_range.to_a1());
    for row in &report.totals {
        let _ = writeln!(out, "   {:<24} {:>12.2}", row.category, row.total);
    }
    let _ = writeln!(out, "   chart: {}", describe_chart(report.chart));
    out
}
