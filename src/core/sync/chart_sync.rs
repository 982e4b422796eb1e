use super::sync_models::{
    CellAnchor, ChartOutcome, ChartSummary, PieChartRequest, SheetRange, SyncError,
};
use super::sync_ports::SheetGateway;

/// Title font size for charts added next to other charts.
pub const STYLED_TITLE_FONT_SIZE: u32 = 24;

/// What to do with the chart sheet, decided from the charts already on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartPlan {
    /// The sheet has no charts at all.
    CreateFirst,
    /// There are charts, but none titled with the configured name.
    CreateStyled,
    /// Rebind the first chart whose title matches exactly.
    Rebind { chart_id: i64 },
}

/// Picks the plan by exact title match; duplicates resolve to the first one.
pub fn plan_chart(existing: &[ChartSummary], chart_name: &str) -> ChartPlan {
    if existing.is_empty() {
        return ChartPlan::CreateFirst;
    }

    existing
        .iter()
        .find(|chart| chart.title.as_deref() == Some(chart_name))
        .map(|chart| ChartPlan::Rebind {
            chart_id: chart.chart_id,
        })
        .unwrap_or(ChartPlan::CreateStyled)
}

/// Makes sure exactly one chart named `chart_name` on `chart_sheet` shows
/// `data`, creating it if needed.
///
/// `data` starts with a header row. With nothing below it the chart would
/// have an empty source range, so the chart sheet is not touched at all.
pub async fn sync_chart<G: SheetGateway + ?Sized>(
    gateway: &G,
    chart_sheet: &str,
    chart_name: &str,
    anchor: CellAnchor,
    data: &SheetRange,
) -> Result<ChartOutcome, SyncError> {
    if data.rows <= 1 {
        tracing::warn!(
            chart = chart_name,
            range = %data.to_a1(),
            "No totals to chart. Leaving the chart as it is."
        );
        return Ok(ChartOutcome::SkippedEmpty);
    }

    let existing = gateway.list_charts(chart_sheet).await?;

    match plan_chart(&existing, chart_name) {
        ChartPlan::CreateFirst => {
            tracing::info!(
                chart = chart_name,
                "There is no chart in the sheet. Creating a new chart."
            );
            let request = PieChartRequest {
                title: chart_name.to_string(),
                data: data.clone(),
                anchor,
                title_font_size: None,
            };
            gateway.insert_pie_chart(chart_sheet, &request).await?;
            Ok(ChartOutcome::CreatedFirst)
        }
        ChartPlan::CreateStyled => {
            tracing::info!(
                chart = chart_name,
                "There is no chart with this name in the sheet. Creating a new chart."
            );
            let request = PieChartRequest {
                title: chart_name.to_string(),
                data: data.clone(),
                anchor,
                title_font_size: Some(STYLED_TITLE_FONT_SIZE),
            };
            gateway.insert_pie_chart(chart_sheet, &request).await?;
            Ok(ChartOutcome::CreatedAlongside)
        }
        ChartPlan::Rebind { chart_id } => {
            tracing::info!(
                chart = chart_name,
                chart_id,
                "Updating the existing chart with the new data range."
            );
            gateway.rebind_chart(chart_sheet, chart_id, data).await?;
            Ok(ChartOutcome::Rebound { chart_id })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::sheets_memory::InMemorySheetGateway;

    fn summary(chart_id: i64, title: Option<&str>) -> ChartSummary {
        ChartSummary {
            chart_id,
            title: title.map(str::to_string),
        }
    }

    #[test]
    fn plan_for_empty_sheet_is_create_first() {
        assert_eq!(plan_chart(&[], "Expenses"), ChartPlan::CreateFirst);
    }

    #[test]
    fn plan_without_match_is_create_styled() {
        let existing = [summary(1, Some("Income")), summary(2, None)];
        assert_eq!(plan_chart(&existing, "Expenses"), ChartPlan::CreateStyled);
    }

    #[test]
    fn plan_matches_title_exactly() {
        let existing = [summary(1, Some("expenses")), summary(2, Some("Expenses "))];
        assert_eq!(plan_chart(&existing, "Expenses"), ChartPlan::CreateStyled);
    }

    #[test]
    fn first_duplicate_wins() {
        let existing = [
            summary(7, Some("Other")),
            summary(3, Some("Expenses")),
            summary(9, Some("Expenses")),
        ];
        assert_eq!(
            plan_chart(&existing, "Expenses"),
            ChartPlan::Rebind { chart_id: 3 }
        );
    }

    #[tokio::test]
    async fn existing_chart_is_updated_not_duplicated() {
        let gateway = InMemorySheetGateway::with_sheets(&["Data", "Charts"]);
        let first = SheetRange::new("Data", CellAnchor::new(1, 5), 3, 2);
        let second = SheetRange::new("Data", CellAnchor::new(1, 5), 4, 2);

        let outcome = sync_chart(&gateway, "Charts", "Expenses", CellAnchor::new(2, 1), &first)
            .await
            .unwrap();
        assert_eq!(outcome, ChartOutcome::CreatedFirst);

        let outcome = sync_chart(&gateway, "Charts", "Expenses", CellAnchor::new(9, 9), &second)
            .await
            .unwrap();
        assert!(matches!(outcome, ChartOutcome::Rebound { .. }));

        let charts = gateway.charts("Charts");
        assert_eq!(charts.len(), 1);
        assert_eq!(charts[0].data, second);
        assert_eq!(charts[0].anchor, CellAnchor::new(2, 1), "position is preserved");
    }

    #[tokio::test]
    async fn header_only_range_leaves_charts_alone() {
        let gateway = InMemorySheetGateway::with_sheets(&["Data", "Charts"]);
        let header_only = SheetRange::new("Data", CellAnchor::new(1, 5), 1, 2);

        let outcome = sync_chart(&gateway, "Charts", "Expenses", CellAnchor::new(2, 1), &header_only)
            .await
            .unwrap();
        assert_eq!(outcome, ChartOutcome::SkippedEmpty);
        assert!(gateway.charts("Charts").is_empty());

        let data = SheetRange::new("Data", CellAnchor::new(1, 5), 3, 2);
        sync_chart(&gateway, "Charts", "Expenses", CellAnchor::new(2, 1), &data)
            .await
            .unwrap();
        let outcome = sync_chart(&gateway, "Charts", "Expenses", CellAnchor::new(2, 1), &header_only)
            .await
            .unwrap();
        assert_eq!(outcome, ChartOutcome::SkippedEmpty);
        assert_eq!(gateway.charts("Charts")[0].data, data, "previous binding is kept");
    }

    #[tokio::test]
    async fn new_name_adds_a_styled_chart() {
        let gateway = InMemorySheetGateway::with_sheets(&["Data", "Charts"]);
        let data = SheetRange::new("Data", CellAnchor::new(1, 5), 3, 2);
        sync_chart(&gateway, "Charts", "Expenses", CellAnchor::new(2, 1), &data)
            .await
            .unwrap();

        let outcome = sync_chart(&gateway, "Charts", "Expenses2", CellAnchor::new(2, 7), &data)
            .await
            .unwrap();

        assert_eq!(outcome, ChartOutcome::CreatedAlongside);
        let charts = gateway.charts("Charts");
        assert_eq!(charts.len(), 2);
        assert_eq!(charts[0].title_font_size, None);
        assert_eq!(charts[1].title, "Expenses2");
        assert_eq!(charts[1].title_font_size, Some(STYLED_TITLE_FONT_SIZE));
    }
}
