use std::collections::HashMap;

use super::sync_models::{AggregateRow, CATEGORY_SEPARATOR};

/// Sums amounts per category token.
///
/// A category of `"Food, Transport"` credits the full amount to both `Food`
/// and `Transport`, so a row with k tokens is counted k times. Output order is
/// first-seen order.
pub fn aggregate<'a, I>(rows: I) -> Vec<AggregateRow>
where
    I: IntoIterator<Item = (&'a str, f64)>,
{
    let mut totals: Vec<AggregateRow> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for (category, amount) in rows {
        for token in category.split(CATEGORY_SEPARATOR) {
            match index.get(token) {
                Some(&i) => totals[i].total += amount,
                None => {
                    index.insert(token.to_string(), totals.len());
                    totals.push(AggregateRow {
                        category: token.to_string(),
                        total: amount,
                    });
                }
            }
        }
    }

    totals
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_multi_category_rows() {
        let totals = aggregate([("Food", 5.0), ("Food, Transport", 10.0)]);
        assert_eq!(
            totals,
            vec![
                AggregateRow {
                    category: "Food".into(),
                    total: 15.0
                },
                AggregateRow {
                    category: "Transport".into(),
                    total: 10.0
                },
            ]
        );
    }

    #[test]
    fn single_token_totals_match_amount_sum() {
        let rows = [("Rent", 900.0), ("Food", 12.5), ("Rent", 50.0), ("Fun", 7.25)];
        let totals = aggregate(rows.iter().map(|(c, a)| (*c, *a)));

        let input_sum: f64 = rows.iter().map(|(_, a)| a).sum();
        let total_sum: f64 = totals.iter().map(|r| r.total).sum();
        assert_eq!(input_sum, total_sum);
        assert_eq!(totals.len(), 3);
    }

    #[test]
    fn multi_token_rows_are_counted_per_token() {
        let totals = aggregate([("A, B, C", 2.0), ("B", 1.0)]);
        let total_sum: f64 = totals.iter().map(|r| r.total).sum();
        assert_eq!(total_sum, 2.0 * 3.0 + 1.0);
    }

    #[test]
    fn keeps_first_seen_order() {
        let totals = aggregate([("Zeta", 1.0), ("Alpha", 1.0), ("Zeta", 1.0)]);
        let order: Vec<&str> = totals.iter().map(|r| r.category.as_str()).collect();
        assert_eq!(order, vec!["Zeta", "Alpha"]);
    }

    #[test]
    fn empty_input_gives_empty_totals() {
        assert!(aggregate(std::iter::empty()).is_empty());
    }
}
