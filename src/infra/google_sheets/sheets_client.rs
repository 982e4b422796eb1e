// Google Sheets v4 implementation of SheetGateway.
//
// Values go through the `values` endpoints; charts go through `batchUpdate`.
// Sheet ids and existing charts are read from the spreadsheet metadata on
// demand, since charts change between calls.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, Url};
use serde::Deserialize;
use serde_json::{json, Value};

use super::service_account::ServiceAccountAuth;
use crate::core::sync::sync_models::{column_letters, quote_sheet_name};
use crate::core::sync::{
    CellValue, ChartSummary, PieChartRequest, SheetGateway, SheetRange, SyncError,
};

const SHEETS_BASE_URL: &str = "https://sheets.googleapis.com";
const METADATA_FIELDS: &str = "sheets(properties(sheetId,title),charts(chartId,spec))";

/// Client for one spreadsheet, authenticated as a service account.
pub struct GoogleSheetsClient {
    client: Client,
    auth: ServiceAccountAuth,
    spreadsheet_id: String,
    base_url: String,
}

impl GoogleSheetsClient {
    pub fn new(auth: ServiceAccountAuth, spreadsheet_id: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            auth,
            spreadsheet_id: spreadsheet_id.into(),
            base_url: SHEETS_BASE_URL.to_string(),
        }
    }

    /// Extracts the spreadsheet id from a full URL, or passes a bare id through.
    pub fn extract_spreadsheet_id(url_or_id: &str) -> Option<String> {
        if url_or_id.contains("docs.google.com") {
            let start = url_or_id.find("/spreadsheets/d/")?;
            let after_d = &url_or_id[start + 16..];
            let end = after_d.find('/').unwrap_or(after_d.len());
            let id = &after_d[..end];
            if !id.is_empty() {
                return Some(id.to_string());
            }
        } else if !url_or_id.is_empty()
            && !url_or_id.contains('/')
            && !url_or_id.contains(' ')
        {
            return Some(url_or_id.to_string());
        }
        None
    }

    /// `{base}/v4/spreadsheets/{id}/{segments...}`, each segment percent-encoded.
    fn url(&self, segments: &[&str]) -> Result<Url, SyncError> {
        let mut url = Url::parse(&self.base_url).map_err(|e| SyncError::Sheet(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| SyncError::Sheet(format!("cannot use {} as a base URL", self.base_url)))?
            .extend(["v4", "spreadsheets", self.spreadsheet_id.as_str()])
            .extend(segments);
        Ok(url)
    }

    async fn send(&self, request: RequestBuilder, what: &str) -> Result<Response, SyncError> {
        let token = self.auth.get_access_token().await?;
        let response = request
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| SyncError::Sheet(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(SyncError::Sheet(format!(
                "Google Sheets API error ({}) while {}: {}. \
                 Make sure the spreadsheet is shared with the service account as an editor.",
                status, what, text
            )));
        }
        Ok(response)
    }

    async fn metadata(&self) -> Result<ApiSpreadsheet, SyncError> {
        let url = self.url(&[])?;
        let request = self.client.get(url).query(&[("fields", METADATA_FIELDS)]);
        self.send(request, "reading spreadsheet metadata")
            .await?
            .json()
            .await
            .map_err(|e| SyncError::Sheet(e.to_string()))
    }

    async fn find_sheet(&self, title: &str) -> Result<ApiSheet, SyncError> {
        self.metadata()
            .await?
            .sheets
            .into_iter()
            .find(|sheet| sheet.properties.title == title)
            .ok_or_else(|| SyncError::SheetNotFound(title.to_string()))
    }

    async fn batch_update(&self, requests: Value, what: &str) -> Result<Value, SyncError> {
        let mut url = self.url(&[])?;
        // `:batchUpdate` is a suffix on the spreadsheet id segment, not a new segment.
        let path = format!("{}:batchUpdate", url.path());
        url.set_path(&path);

        let request = self
            .client
            .post(url)
            .json(&json!({ "requests": requests }));
        self.send(request, what)
            .await?
            .json()
            .await
            .map_err(|e| SyncError::Sheet(e.to_string()))
    }
}

#[async_trait]
impl SheetGateway for GoogleSheetsClient {
    async fn last_row(&self, sheet: &str) -> Result<u32, SyncError> {
        let url = self.url(&["values", quote_sheet_name(sheet).as_str()])?;
        let request = self.client.get(url).query(&[("majorDimension", "ROWS")]);
        let range: ApiValueRange = self
            .send(request, &format!("reading sheet '{}'", sheet))
            .await?
            .json()
            .await
            .map_err(|e| SyncError::Sheet(e.to_string()))?;

        // Trailing empty rows are trimmed by the API and a whole-sheet read
        // starts at row 1, so the row count is the last populated row.
        Ok(range.values.len() as u32)
    }

    async fn clear_rows(&self, sheet: &str, first: u32, last: u32) -> Result<(), SyncError> {
        let a1 = format!("{}!{}:{}", quote_sheet_name(sheet), first, last);
        let url = self.url(&["values", format!("{}:clear", a1).as_str()])?;
        let request = self.client.post(url).json(&json!({}));
        self.send(request, &format!("clearing {}", a1)).await?;
        Ok(())
    }

    async fn write_range(
        &self,
        range: &SheetRange,
        values: Vec<Vec<CellValue>>,
    ) -> Result<(), SyncError> {
        let a1 = range.to_a1();
        let url = self.url(&["values", a1.as_str()])?;
        let body = json!({
            "range": a1,
            "majorDimension": "ROWS",
            "values": values
                .iter()
                .map(|row| row.iter().map(cell_to_json).collect::<Vec<_>>())
                .collect::<Vec<_>>(),
        });
        let request = self
            .client
            .put(url)
            .query(&[("valueInputOption", "RAW")])
            .json(&body);
        self.send(request, &format!("writing {}", a1)).await?;
        Ok(())
    }

    async fn read_range(&self, range: &SheetRange) -> Result<Vec<Vec<CellValue>>, SyncError> {
        // Open-ended downwards: 'Sheet'!B2:C
        let a1 = format!(
            "{}!{}{}:{}",
            quote_sheet_name(&range.sheet),
            column_letters(range.origin.column),
            range.origin.row,
            column_letters(range.last_column())
        );
        let url = self.url(&["values", a1.as_str()])?;
        let request = self.client.get(url).query(&[
            ("majorDimension", "ROWS"),
            ("valueRenderOption", "UNFORMATTED_VALUE"),
        ]);
        let values: ApiValueRange = self
            .send(request, &format!("reading {}", a1))
            .await?
            .json()
            .await
            .map_err(|e| SyncError::Sheet(e.to_string()))?;

        Ok(values
            .values
            .into_iter()
            .map(|row| row.into_iter().map(json_to_cell).collect())
            .collect())
    }

    async fn list_charts(&self, sheet: &str) -> Result<Vec<ChartSummary>, SyncError> {
        let sheet = self.find_sheet(sheet).await?;
        Ok(sheet
            .charts
            .into_iter()
            .map(|chart| ChartSummary {
                chart_id: chart.chart_id,
                title: chart
                    .spec
                    .get("title")
                    .and_then(Value::as_str)
                    .map(str::to_string),
            })
            .collect())
    }

    async fn insert_pie_chart(
        &self,
        sheet: &str,
        request: &PieChartRequest,
    ) -> Result<i64, SyncError> {
        let chart_sheet_id = self.find_sheet(sheet).await?.properties.sheet_id;
        let data_sheet_id = self.find_sheet(&request.data.sheet).await?.properties.sheet_id;

        let add_chart = json!([{
            "addChart": {
                "chart": {
                    "spec": pie_chart_spec(data_sheet_id, request),
                    "position": {
                        "overlayPosition": {
                            "anchorCell": {
                                "sheetId": chart_sheet_id,
                                "rowIndex": request.anchor.row.saturating_sub(1),
                                "columnIndex": request.anchor.column.saturating_sub(1),
                            },
                            "offsetXPixels": 0,
                            "offsetYPixels": 0,
                        }
                    }
                }
            }
        }]);

        let reply = self
            .batch_update(add_chart, &format!("adding chart '{}'", request.title))
            .await?;
        reply
            .pointer("/replies/0/addChart/chart/chartId")
            .and_then(Value::as_i64)
            .ok_or_else(|| SyncError::Sheet("addChart reply carried no chartId".to_string()))
    }

    async fn rebind_chart(
        &self,
        sheet: &str,
        chart_id: i64,
        data: &SheetRange,
    ) -> Result<(), SyncError> {
        let chart_sheet = self.find_sheet(sheet).await?;
        let existing = chart_sheet
            .charts
            .into_iter()
            .find(|chart| chart.chart_id == chart_id)
            .ok_or_else(|| SyncError::Sheet(format!("chart {} not found on '{}'", chart_id, sheet)))?;
        let data_sheet_id = self.find_sheet(&data.sheet).await?.properties.sheet_id;

        let update = json!([{
            "updateChartSpec": {
                "chartId": chart_id,
                "spec": rebind_spec(existing.spec, data_sheet_id, data),
            }
        }]);
        self.batch_update(update, &format!("updating chart {}", chart_id))
            .await?;
        Ok(())
    }
}

fn cell_to_json(cell: &CellValue) -> Value {
    match cell {
        CellValue::Text(text) => Value::String(text.clone()),
        CellValue::Number(n) => json!(n),
        CellValue::Empty => Value::String(String::new()),
    }
}

fn json_to_cell(value: Value) -> CellValue {
    match value {
        Value::String(text) if text.is_empty() => CellValue::Empty,
        Value::String(text) => CellValue::Text(text),
        Value::Number(n) => n.as_f64().map(CellValue::Number).unwrap_or(CellValue::Empty),
        Value::Bool(b) => CellValue::Text(b.to_string().to_uppercase()),
        _ => CellValue::Empty,
    }
}

/// 0-based, end-exclusive GridRange covering one column of `range`, header
/// row excluded.
fn column_grid_range(sheet_id: i64, range: &SheetRange, column_offset: u32) -> Value {
    let column = range.origin.column - 1 + column_offset;
    json!({
        "sheetId": sheet_id,
        "startRowIndex": range.origin.row,
        "endRowIndex": range.origin.row - 1 + range.rows,
        "startColumnIndex": column,
        "endColumnIndex": column + 1,
    })
}

/// Category labels come from the first column, values from the second.
fn pie_data(sheet_id: i64, range: &SheetRange) -> Value {
    json!({
        "legendPosition": "RIGHT_LEGEND",
        "domain": { "sourceRange": { "sources": [column_grid_range(sheet_id, range, 0)] } },
        "series": { "sourceRange": { "sources": [column_grid_range(sheet_id, range, 1)] } },
    })
}

fn pie_chart_spec(data_sheet_id: i64, request: &PieChartRequest) -> Value {
    let mut spec = json!({
        "title": request.title,
        "pieChart": pie_data(data_sheet_id, &request.data),
    });
    if let Some(size) = request.title_font_size {
        spec["titleTextFormat"] = json!({ "fontSize": size });
    }
    spec
}

/// Keeps everything about the existing spec (title, fonts, colours) except
/// its chart type and source ranges, which become a pie over `data`.
fn rebind_spec(existing: Value, data_sheet_id: i64, data: &SheetRange) -> Value {
    let mut spec = match existing {
        Value::Object(map) => map,
        _ => serde_json::Map::new(),
    };
    spec.retain(|key, _| !(key.ends_with("Chart") && key != "pieChart"));

    let mut pie = match spec.remove("pieChart") {
        Some(Value::Object(map)) => map,
        _ => serde_json::Map::new(),
    };
    if let Value::Object(fresh) = pie_data(data_sheet_id, data) {
        for (key, value) in fresh {
            if key == "legendPosition" && pie.contains_key(&key) {
                continue;
            }
            pie.insert(key, value);
        }
    }
    spec.insert("pieChart".to_string(), Value::Object(pie));
    Value::Object(spec)
}

#[derive(Debug, Deserialize)]
struct ApiSpreadsheet {
    #[serde(default)]
    sheets: Vec<ApiSheet>,
}

#[derive(Debug, Deserialize)]
struct ApiSheet {
    properties: ApiSheetProperties,
    #[serde(default)]
    charts: Vec<ApiChart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiSheetProperties {
    sheet_id: i64,
    title: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiChart {
    chart_id: i64,
    #[serde(default)]
    spec: Value,
}

#[derive(Debug, Deserialize)]
struct ApiValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}
