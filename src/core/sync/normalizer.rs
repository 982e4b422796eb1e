// Record normalizer: turns typed source records into (item, category, amount)
// rows and decides which records are dropped.

use super::sync_config::SyncJob;
use super::sync_models::{
    FieldValue, NormalizedBatch, NormalizedRow, RawRecord, RelationResolution, RowRejection,
    SkippedRecord, SyncError, CATEGORY_SEPARATOR,
};
use super::sync_ports::RecordSource;

/// What the amount property held.
#[derive(Debug, Clone, PartialEq)]
enum AmountField {
    Value(f64),
    NonFinite(f64),
    Null,
    Missing(String),
}

/// Describes a property for rejection messages ("absent", "select", ...).
fn describe(value: Option<&FieldValue>) -> String {
    match value {
        Some(value) => value.type_tag().to_string(),
        None => "absent".to_string(),
    }
}

/// Item text: first title segment, nothing else counts.
fn extract_item(record: &RawRecord, field: &str) -> Result<String, RowRejection> {
    let value = record.field(field);
    match value {
        Some(FieldValue::Title(segments)) => match segments.first() {
            Some(text) if !text.is_empty() => Ok(text.clone()),
            _ => Err(RowRejection::MissingItem {
                field: field.to_string(),
                found: "empty title".to_string(),
            }),
        },
        _ => Err(RowRejection::MissingItem {
            field: field.to_string(),
            found: describe(value),
        }),
    }
}

fn extract_amount(record: &RawRecord, field: &str) -> AmountField {
    match record.field(field) {
        Some(FieldValue::Number(Some(amount))) if amount.is_finite() => AmountField::Value(*amount),
        Some(FieldValue::Number(Some(amount))) => AmountField::NonFinite(*amount),
        Some(FieldValue::Number(None)) => AmountField::Null,
        other => AmountField::Missing(describe(other)),
    }
}

/// Normalizes records for one sync job, fetching related records through
/// `source` when the category is a relation.
pub struct RecordNormalizer<'a, S: RecordSource> {
    source: &'a S,
    job: &'a SyncJob,
}

impl<'a, S: RecordSource> RecordNormalizer<'a, S> {
    pub fn new(source: &'a S, job: &'a SyncJob) -> Self {
        Self { source, job }
    }

    /// Normalizes a whole batch. Row problems end up in `skipped`; only
    /// failures to reach the source are returned as errors.
    pub async fn normalize(&self, records: &[RawRecord]) -> Result<NormalizedBatch, SyncError> {
        let mut batch = NormalizedBatch::default();

        for record in records {
            match self.normalize_record(record).await? {
                Ok(row) => batch.rows.push(row),
                Err(reason) => {
                    match reason {
                        RowRejection::NullAmount { .. } => {
                            tracing::warn!(record = %record.id, "Dropping record: {}", reason)
                        }
                        _ => tracing::info!(record = %record.id, "Dropping record: {}", reason),
                    }
                    batch.skipped.push(SkippedRecord {
                        record_id: record.id.clone(),
                        reason,
                    });
                }
            }
        }

        tracing::debug!(
            accepted = batch.rows.len(),
            skipped = batch.skipped.len(),
            "Normalized {} record(s)",
            records.len()
        );
        Ok(batch)
    }

    /// Applies the disposition rules in order: item, category, amount.
    pub async fn normalize_record(
        &self,
        record: &RawRecord,
    ) -> Result<Result<NormalizedRow, RowRejection>, SyncError> {
        let item = match extract_item(record, &self.job.item_field) {
            Ok(item) => item,
            Err(reason) => return Ok(Err(reason)),
        };

        let category = match self.extract_category(record).await? {
            Ok(category) => category,
            Err(reason) => return Ok(Err(reason)),
        };

        let field = &self.job.amount_field;
        let amount = match extract_amount(record, field) {
            AmountField::Missing(found) => {
                return Ok(Err(RowRejection::MissingAmount {
                    field: field.clone(),
                    found,
                }))
            }
            AmountField::Null => {
                return Ok(Err(RowRejection::NullAmount {
                    field: field.clone(),
                }))
            }
            AmountField::NonFinite(amount) => {
                return Ok(Err(RowRejection::NonFiniteAmount {
                    field: field.clone(),
                    amount,
                }))
            }
            AmountField::Value(amount) if amount <= 0.0 => {
                return Ok(Err(RowRejection::NonPositiveAmount { amount }))
            }
            AmountField::Value(amount) => amount,
        };

        Ok(Ok(NormalizedRow {
            item,
            category,
            amount,
        }))
    }

    async fn extract_category(
        &self,
        record: &RawRecord,
    ) -> Result<Result<String, RowRejection>, SyncError> {
        let field = &self.job.category_field;
        let missing = |found: String| -> Result<Result<String, RowRejection>, SyncError> {
            Ok(Err(RowRejection::MissingCategory {
                field: field.clone(),
                found,
            }))
        };

        match record.field(field) {
            Some(FieldValue::Select(Some(label))) if !label.is_empty() => Ok(Ok(label.clone())),
            Some(FieldValue::Select(_)) => missing("no option selected".to_string()),
            Some(FieldValue::Relation(ids)) => match self.resolve_relation(ids).await? {
                RelationResolution::Resolved(category) => Ok(Ok(category)),
                RelationResolution::NoRelation => missing("empty relation".to_string()),
                RelationResolution::Unresolved(why) => missing(why),
            },
            other => missing(describe(other)),
        }
    }

    /// Fetches each related record and reads its title from the property
    /// named like the category field.
    pub async fn resolve_relation(&self, ids: &[String]) -> Result<RelationResolution, SyncError> {
        if ids.is_empty() {
            return Ok(RelationResolution::NoRelation);
        }

        let title_field = &self.job.category_field;
        let mut titles = Vec::with_capacity(ids.len());

        for id in ids {
            let related = self.source.fetch_record(id).await?;
            let title = match related.field(title_field) {
                Some(FieldValue::Title(segments)) => {
                    segments.first().map(|s| s.trim().to_string()).unwrap_or_default()
                }
                other => {
                    return Ok(RelationResolution::Unresolved(format!(
                        "related record {} has no title property '{}' ({})",
                        id,
                        title_field,
                        describe(other)
                    )))
                }
            };

            if title.is_empty() {
                return Ok(RelationResolution::Unresolved(format!(
                    "related record {} has an empty title",
                    id
                )));
            }
            titles.push(title);
        }

        if titles.len() > 1 {
            tracing::debug!("Multiple categories: {}", titles.join(CATEGORY_SEPARATOR));
        }

        Ok(RelationResolution::Resolved(titles.join(CATEGORY_SEPARATOR)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::sync::sync_config::tests::sample_job;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Serves related pages from a map and counts lookups.
    struct PageSource {
        pages: HashMap<String, RawRecord>,
        lookups: Mutex<usize>,
    }

    impl PageSource {
        fn new(pages: Vec<RawRecord>) -> Self {
            Self {
                pages: pages.into_iter().map(|p| (p.id.clone(), p)).collect(),
                lookups: Mutex::new(0),
            }
        }
    }

    #[async_trait]
    impl RecordSource for PageSource {
        async fn query_database(&self, _: &str) -> Result<Vec<RawRecord>, SyncError> {
            Ok(Vec::new())
        }

        async fn fetch_record(&self, record_id: &str) -> Result<RawRecord, SyncError> {
            *self.lookups.lock().unwrap() += 1;
            self.pages
                .get(record_id)
                .cloned()
                .ok_or_else(|| SyncError::SourceUnavailable(format!("404 for {}", record_id)))
        }
    }

    fn title(text: &str) -> FieldValue {
        FieldValue::Title(vec![text.to_string()])
    }

    fn select(label: &str) -> FieldValue {
        FieldValue::Select(Some(label.to_string()))
    }

    fn record(id: &str, item: FieldValue, category: FieldValue, amount: FieldValue) -> RawRecord {
        RawRecord::new(id)
            .with_field("Item", item)
            .with_field("Category", category)
            .with_field("Monthly Pay", amount)
    }

    fn category_page(id: &str, name: &str) -> RawRecord {
        RawRecord::new(id).with_field("Category", title(name))
    }

    #[tokio::test]
    async fn accepts_select_category() {
        let source = PageSource::new(vec![]);
        let job = sample_job();
        let normalizer = RecordNormalizer::new(&source, &job);

        let batch = normalizer
            .normalize(&[record(
                "r1",
                title("Coffee"),
                select("Food"),
                FieldValue::Number(Some(5.0)),
            )])
            .await
            .unwrap();

        assert_eq!(
            batch.rows,
            vec![NormalizedRow {
                item: "Coffee".into(),
                category: "Food".into(),
                amount: 5.0
            }]
        );
        assert!(batch.skipped.is_empty());
    }

    #[tokio::test]
    async fn zero_amount_is_dropped() {
        let source = PageSource::new(vec![]);
        let job = sample_job();
        let normalizer = RecordNormalizer::new(&source, &job);

        let batch = normalizer
            .normalize(&[record("r1", title("X"), select("Y"), FieldValue::Number(Some(0.0)))])
            .await
            .unwrap();

        assert!(batch.rows.is_empty());
        assert_eq!(
            batch.skipped[0].reason,
            RowRejection::NonPositiveAmount { amount: 0.0 }
        );
    }

    #[tokio::test]
    async fn null_amount_is_dropped_with_its_own_reason() {
        let source = PageSource::new(vec![]);
        let job = sample_job();
        let normalizer = RecordNormalizer::new(&source, &job);

        let batch = normalizer
            .normalize(&[record("r1", title("X"), select("Y"), FieldValue::Number(None))])
            .await
            .unwrap();

        assert!(batch.rows.is_empty());
        assert!(matches!(
            batch.skipped[0].reason,
            RowRejection::NullAmount { .. }
        ));
    }

    #[tokio::test]
    async fn non_finite_amount_is_not_reported_as_null() {
        let source = PageSource::new(vec![]);
        let job = sample_job();
        let normalizer = RecordNormalizer::new(&source, &job);

        let batch = normalizer
            .normalize(&[
                record("r1", title("X"), select("Y"), FieldValue::Number(Some(f64::INFINITY))),
                record("r2", title("Z"), select("Y"), FieldValue::Number(Some(f64::NAN))),
            ])
            .await
            .unwrap();

        assert!(batch.rows.is_empty());
        assert_eq!(batch.skipped.len(), 2);
        for skipped in &batch.skipped {
            assert!(
                matches!(&skipped.reason, RowRejection::NonFiniteAmount { field, .. } if field == "Monthly Pay"),
                "unexpected reason for {}: {:?}",
                skipped.record_id,
                skipped.reason
            );
        }
    }

    #[tokio::test]
    async fn unrecognised_category_type_drops_row() {
        let source = PageSource::new(vec![]);
        let job = sample_job();
        let normalizer = RecordNormalizer::new(&source, &job);

        let batch = normalizer
            .normalize(&[record(
                "r1",
                title("Rent"),
                FieldValue::Unsupported("multi_select".into()),
                FieldValue::Number(Some(900.0)),
            )])
            .await
            .unwrap();

        assert!(batch.rows.is_empty());
        assert_eq!(
            batch.skipped[0].reason,
            RowRejection::MissingCategory {
                field: "Category".into(),
                found: "multi_select".into()
            }
        );
    }

    #[tokio::test]
    async fn disposition_checks_item_before_category_and_amount() {
        let source = PageSource::new(vec![]);
        let job = sample_job();
        let normalizer = RecordNormalizer::new(&source, &job);

        let no_item = RawRecord::new("r1").with_field("Monthly Pay", FieldValue::Number(None));
        let no_amount = RawRecord::new("r2")
            .with_field("Item", title("Gym"))
            .with_field("Category", select("Health"))
            .with_field("Monthly Pay", FieldValue::Unsupported("formula".into()));

        let batch = normalizer.normalize(&[no_item, no_amount]).await.unwrap();

        assert!(matches!(
            batch.skipped[0].reason,
            RowRejection::MissingItem { .. }
        ));
        assert_eq!(
            batch.skipped[1].reason,
            RowRejection::MissingAmount {
                field: "Monthly Pay".into(),
                found: "formula".into()
            }
        );
    }

    #[tokio::test]
    async fn single_relation_resolves_to_related_title() {
        let source = PageSource::new(vec![category_page("p-food", "  Food ")]);
        let job = sample_job();
        let normalizer = RecordNormalizer::new(&source, &job);

        let resolution = normalizer
            .resolve_relation(&["p-food".to_string()])
            .await
            .unwrap();

        assert_eq!(resolution, RelationResolution::Resolved("Food".into()));
    }

    #[tokio::test]
    async fn multiple_relations_are_joined() {
        let source = PageSource::new(vec![
            category_page("p-food", "Food"),
            category_page("p-transport", "Transport"),
        ]);
        let job = sample_job();
        let normalizer = RecordNormalizer::new(&source, &job);

        let batch = normalizer
            .normalize(&[record(
                "r1",
                title("Bus"),
                FieldValue::Relation(vec!["p-food".into(), "p-transport".into()]),
                FieldValue::Number(Some(10.0)),
            )])
            .await
            .unwrap();

        assert_eq!(batch.rows[0].category, "Food, Transport");
        assert_eq!(*source.lookups.lock().unwrap(), 2);
    }

    #[tokio::test]
    async fn empty_relation_counts_as_missing_category() {
        let source = PageSource::new(vec![]);
        let job = sample_job();
        let normalizer = RecordNormalizer::new(&source, &job);

        assert_eq!(
            normalizer.resolve_relation(&[]).await.unwrap(),
            RelationResolution::NoRelation
        );

        let batch = normalizer
            .normalize(&[record(
                "r1",
                title("Bus"),
                FieldValue::Relation(vec![]),
                FieldValue::Number(Some(10.0)),
            )])
            .await
            .unwrap();
        assert!(matches!(
            batch.skipped[0].reason,
            RowRejection::MissingCategory { .. }
        ));
    }

    #[tokio::test]
    async fn related_page_without_matching_title_is_unresolved() {
        let source = PageSource::new(vec![
            RawRecord::new("p-1").with_field("Name", title("Food"))
        ]);
        let job = sample_job();
        let normalizer = RecordNormalizer::new(&source, &job);

        let resolution = normalizer.resolve_relation(&["p-1".to_string()]).await.unwrap();
        assert!(matches!(resolution, RelationResolution::Unresolved(_)));
    }

    #[tokio::test]
    async fn unreachable_related_page_is_fatal() {
        let source = PageSource::new(vec![]);
        let job = sample_job();
        let normalizer = RecordNormalizer::new(&source, &job);

        let result = normalizer
            .normalize(&[record(
                "r1",
                title("Bus"),
                FieldValue::Relation(vec!["gone".into()]),
                FieldValue::Number(Some(10.0)),
            )])
            .await;

        assert!(matches!(result, Err(SyncError::SourceUnavailable(_))));
    }

    #[tokio::test]
    async fn accepted_rows_always_satisfy_invariant() {
        let source = PageSource::new(vec![category_page("p", "Misc")]);
        let job = sample_job();
        let normalizer = RecordNormalizer::new(&source, &job);

        let amounts = [
            FieldValue::Number(Some(-3.0)),
            FieldValue::Number(Some(0.0)),
            FieldValue::Number(None),
            FieldValue::Number(Some(0.01)),
            FieldValue::Number(Some(120.0)),
            FieldValue::Unsupported("rollup".into()),
        ];
        let items = [title("A"), title(""), FieldValue::Title(vec![]), select("B")];
        let categories = [
            select("Food"),
            FieldValue::Select(None),
            FieldValue::Relation(vec!["p".into()]),
            FieldValue::Unsupported("people".into()),
        ];

        let mut records = Vec::new();
        for (i, item) in items.iter().enumerate() {
            for (j, category) in categories.iter().enumerate() {
                for (k, amount) in amounts.iter().enumerate() {
                    records.push(record(
                        &format!("r{}-{}-{}", i, j, k),
                        item.clone(),
                        category.clone(),
                        amount.clone(),
                    ));
                }
            }
        }

        let batch = normalizer.normalize(&records).await.unwrap();
        assert_eq!(batch.rows.len() + batch.skipped.len(), records.len());
        assert!(!batch.rows.is_empty());
        for row in &batch.rows {
            assert!(!row.item.is_empty());
            assert!(!row.category.is_empty());
            assert!(row.amount > 0.0);
        }
    }
}
