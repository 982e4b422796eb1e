// Sink writer: the destination table (A:C from row 2) and the aggregate table.

use super::sync_models::{
    AggregateRow, CellAnchor, CellValue, NormalizedRow, SheetRange, SyncError,
};
use super::sync_ports::SheetGateway;

pub const AGGREGATE_HEADER: [&str; 2] = ["Category", "Total Pay"];

/// First data row of the destination table; row 1 holds user-managed headers.
const FIRST_DATA_ROW: u32 = 2;
const DESTINATION_COLUMNS: u32 = 3;

/// Replaces every data row of `sheet` with `rows`.
///
/// This is clear-then-write, two separate calls. A crash in between leaves
/// the table empty; it is not crash-atomic.
pub async fn replace_rows<G: SheetGateway + ?Sized>(
    gateway: &G,
    sheet: &str,
    rows: &[NormalizedRow],
) -> Result<(), SyncError> {
    let last_row = gateway.last_row(sheet).await?;
    if last_row >= FIRST_DATA_ROW {
        tracing::debug!(sheet, last_row, "Clearing previous rows");
        gateway.clear_rows(sheet, FIRST_DATA_ROW, last_row).await?;
    }

    if rows.is_empty() {
        tracing::info!(sheet, "No rows to write");
        return Ok(());
    }

    let range = SheetRange::new(
        sheet,
        CellAnchor::new(FIRST_DATA_ROW, 1),
        rows.len() as u32,
        DESTINATION_COLUMNS,
    );
    let values = rows
        .iter()
        .map(|row| {
            vec![
                CellValue::Text(row.item.clone()),
                CellValue::Text(row.category.clone()),
                CellValue::Number(row.amount),
            ]
        })
        .collect();

    gateway.write_range(&range, values).await
}

/// Reads (category, amount) pairs back from the destination table.
///
/// Rows that don't carry a category and a numeric amount are skipped, since
/// the table may have been edited outside the sync.
pub async fn read_destination<G: SheetGateway + ?Sized>(
    gateway: &G,
    sheet: &str,
) -> Result<Vec<(String, f64)>, SyncError> {
    let range = SheetRange::new(sheet, CellAnchor::new(FIRST_DATA_ROW, 2), 0, 2);
    let cells = gateway.read_range(&range).await?;

    let mut pairs = Vec::with_capacity(cells.len());
    for (offset, row) in cells.iter().enumerate() {
        let row_number = FIRST_DATA_ROW as usize + offset;
        let category = match row.first() {
            Some(CellValue::Text(text)) if !text.is_empty() => text.clone(),
            Some(CellValue::Number(n)) => n.to_string(),
            _ => {
                tracing::warn!(sheet, row = row_number, "Row has no category, not aggregated");
                continue;
            }
        };
        match row.get(1).and_then(CellValue::as_number) {
            Some(amount) => pairs.push((category, amount)),
            None => {
                tracing::warn!(sheet, row = row_number, "Row has no numeric amount, not aggregated")
            }
        }
    }

    Ok(pairs)
}

/// Writes the header plus one row per total at `anchor`, overwriting what was
/// there. Returns the exact range written, header included.
pub async fn write_aggregate<G: SheetGateway + ?Sized>(
    gateway: &G,
    sheet: &str,
    anchor: CellAnchor,
    totals: &[AggregateRow],
) -> Result<SheetRange, SyncError> {
    let range = SheetRange::new(sheet, anchor, totals.len() as u32 + 1, 2);

    let mut values: Vec<Vec<CellValue>> = Vec::with_capacity(totals.len() + 1);
    values.push(
        AGGREGATE_HEADER
            .iter()
            .map(|h| CellValue::Text(h.to_string()))
            .collect(),
    );
    for row in totals {
        values.push(vec![
            CellValue::Text(row.category.clone()),
            CellValue::Number(row.total),
        ]);
    }

    gateway.write_range(&range, values).await?;
    Ok(range)
}
