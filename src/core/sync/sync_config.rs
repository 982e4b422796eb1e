use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::sync_models::{CellAnchor, SyncError};

/// Where the aggregate table lands when a job doesn't say otherwise (E1).
pub const DEFAULT_AGGREGATE_ANCHOR: CellAnchor = CellAnchor::new(1, 5);

fn default_aggregate_anchor() -> CellAnchor {
    DEFAULT_AGGREGATE_ANCHOR
}

/// One database -> sheet -> chart mapping.
///
/// Relation categories are resolved by reading `category_field` on the
/// *related* page, so the related database must name its title property the
/// same way.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncJob {
    pub database_id: String,
    pub item_field: String,
    pub category_field: String,
    pub amount_field: String,
    /// Sheet holding the mirrored rows and the aggregate table.
    pub data_sheet: String,
    /// Sheet the pie chart lives on.
    pub chart_sheet: String,
    pub chart_name: String,
    pub chart_anchor: CellAnchor,
    #[serde(default = "default_aggregate_anchor")]
    pub aggregate_anchor: CellAnchor,
}

impl SyncJob {
    pub fn validate(&self) -> Result<(), SyncError> {
        let required = [
            ("database_id", &self.database_id),
            ("item_field", &self.item_field),
            ("category_field", &self.category_field),
            ("amount_field", &self.amount_field),
            ("data_sheet", &self.data_sheet),
            ("chart_sheet", &self.chart_sheet),
            ("chart_name", &self.chart_name),
        ];
        for (key, value) in required {
            if value.trim().is_empty() {
                return Err(SyncError::Config(format!(
                    "'{}' must not be empty (chart '{}')",
                    key, self.chart_name
                )));
            }
        }

        for (key, anchor) in [
            ("chart_anchor", self.chart_anchor),
            ("aggregate_anchor", self.aggregate_anchor),
        ] {
            if anchor.row == 0 || anchor.column == 0 {
                return Err(SyncError::Config(format!(
                    "'{}' is 1-based, got row {} column {}",
                    key, anchor.row, anchor.column
                )));
            }
        }

        // The aggregate table must not overlap the item/category/amount columns.
        if self.aggregate_anchor.column <= 3 {
            return Err(SyncError::Config(format!(
                "aggregate_anchor column {} overlaps the data columns A:C",
                self.aggregate_anchor.column
            )));
        }

        Ok(())
    }
}

/// Top-level contents of the job file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncJobsFile {
    #[serde(default)]
    pub jobs: Vec<SyncJob>,
}

impl SyncJobsFile {
    /// Validates every job and rejects two jobs fighting over one chart or
    /// one data sheet.
    ///
    /// Each run clears every data row of its data sheet (aggregate columns
    /// included), so a data sheet can only ever belong to one job.
    pub fn validate(&self) -> Result<(), SyncError> {
        let mut charts = HashSet::new();
        let mut data_sheets = HashSet::new();
        for job in &self.jobs {
            job.validate()?;
            if !charts.insert((job.chart_sheet.as_str(), job.chart_name.as_str())) {
                return Err(SyncError::Config(format!(
                    "chart '{}' on sheet '{}' is configured twice",
                    job.chart_name, job.chart_sheet
                )));
            }
            if !data_sheets.insert(job.data_sheet.as_str()) {
                return Err(SyncError::Config(format!(
                    "data sheet '{}' is used by more than one job (chart '{}')",
                    job.data_sheet, job.chart_name
                )));
            }
        }
        Ok(())
    }

    /// Jobs whose chart name is in `only`, or all jobs when `only` is empty.
    pub fn select<'a>(&'a self, only: &[String]) -> Vec<&'a SyncJob> {
        self.jobs
            .iter()
            .filter(|job| only.is_empty() || only.iter().any(|name| name == &job.chart_name))
            .collect()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn sample_job() -> SyncJob {
        SyncJob {
            database_id: "db-1".to_string(),
            item_field: "Item".to_string(),
            category_field: "Category".to_string(),
            amount_field: "Monthly Pay".to_string(),
            data_sheet: "Subscriptions".to_string(),
            chart_sheet: "Charts".to_string(),
            chart_name: "Expenses".to_string(),
            chart_anchor: CellAnchor::new(2, 1),
            aggregate_anchor: DEFAULT_AGGREGATE_ANCHOR,
        }
    }

    #[test]
    fn aggregate_anchor_defaults_to_e1() {
        let json = r#"{
            "database_id": "abc",
            "item_field": "Item",
            "category_field": "Category",
            "amount_field": "Pay",
            "data_sheet": "Data",
            "chart_sheet": "Charts",
            "chart_name": "Expenses",
            "chart_anchor": {"row": 2, "column": 7}
        }"#;
        let job: SyncJob = serde_json::from_str(json).unwrap();
        assert_eq!(job.aggregate_anchor, CellAnchor::new(1, 5));
        assert_eq!(job.chart_anchor, CellAnchor::new(2, 7));
        assert!(job.validate().is_ok());
    }

    #[test]
    fn empty_field_names_are_rejected() {
        let mut job = sample_job();
        job.category_field = "  ".to_string();
        let err = job.validate().unwrap_err();
        assert!(err.to_string().contains("category_field"));
    }

    #[test]
    fn zero_anchor_is_rejected() {
        let mut job = sample_job();
        job.chart_anchor = CellAnchor::new(0, 1);
        assert!(matches!(job.validate(), Err(SyncError::Config(_))));
    }

    #[test]
    fn aggregate_cannot_overlap_data_columns() {
        let mut job = sample_job();
        job.aggregate_anchor = CellAnchor::new(1, 3);
        assert!(job.validate().is_err());
    }

    #[test]
    fn duplicate_chart_on_same_sheet_is_rejected() {
        let file = SyncJobsFile {
            jobs: vec![sample_job(), sample_job()],
        };
        assert!(file.validate().is_err());

        let mut other = sample_job();
        other.chart_sheet = "Other charts".to_string();
        other.data_sheet = "Other data".to_string();
        let file = SyncJobsFile {
            jobs: vec![sample_job(), other],
        };
        assert!(file.validate().is_ok());
    }

    #[test]
    fn two_jobs_cannot_share_a_data_sheet() {
        let mut income = sample_job();
        income.chart_name = "Income".to_string();
        income.database_id = "db-2".to_string();
        income.aggregate_anchor = CellAnchor::new(1, 8);
        let file = SyncJobsFile {
            jobs: vec![sample_job(), income.clone()],
        };

        let err = file.validate().unwrap_err();
        assert!(matches!(err, SyncError::Config(_)));
        assert!(err.to_string().contains("Subscriptions"));

        income.data_sheet = "Income".to_string();
        let file = SyncJobsFile {
            jobs: vec![sample_job(), income],
        };
        assert!(file.validate().is_ok());
    }

    #[test]
    fn select_filters_by_chart_name() {
        let mut second = sample_job();
        second.chart_name = "Income".to_string();
        let file = SyncJobsFile {
            jobs: vec![sample_job(), second],
        };

        assert_eq!(file.select(&[]).len(), 2);
        let picked = file.select(&["Income".to_string()]);
        assert_eq!(picked.len(), 1);
        assert_eq!(picked[0].chart_name, "Income");
    }
}
