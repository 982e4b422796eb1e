use std::collections::HashMap;
use std::future::Future;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::sync::{FieldValue, RawRecord, RecordSource, SyncError};

pub const DEFAULT_NOTION_VERSION: &str = "2022-06-28";
const NOTION_BASE_URL: &str = "https://api.notion.com";
const PAGE_SIZE: u32 = 100;

/// Minimal Notion REST client: database queries and single page reads.
pub struct NotionApiClient {
    client: Client,
    base_url: String,
}

impl NotionApiClient {
    pub fn new(token: &str, notion_version: &str) -> Result<Self, SyncError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "Authorization",
            HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|e| SyncError::Config(format!("invalid Notion token: {}", e)))?,
        );
        headers.insert(
            "Notion-Version",
            HeaderValue::from_str(notion_version)
                .map_err(|e| SyncError::Config(format!("invalid Notion version: {}", e)))?,
        );
        headers.insert(
            "User-Agent",
            HeaderValue::from_static("notion-sheet-sync/0.1"),
        );

        let client = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| SyncError::SourceUnavailable(e.to_string()))?;

        Ok(Self {
            client,
            base_url: NOTION_BASE_URL.to_string(),
        })
    }

    /// One `POST /v1/databases/{id}/query` round trip.
    async fn query_page(
        &self,
        database_id: &str,
        cursor: Option<String>,
    ) -> Result<ApiQueryResponse, SyncError> {
        let url = format!("{}/v1/databases/{}/query", self.base_url, database_id);
        let body = ApiQueryRequest {
            page_size: PAGE_SIZE,
            start_cursor: cursor,
        };
        let resp = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| SyncError::SourceUnavailable(e.to_string()))?;
        let resp = Self::check(resp, &format!("database {}", database_id)).await?;

        resp.json()
            .await
            .map_err(|e| SyncError::SourceUnavailable(e.to_string()))
    }

    async fn check(response: Response, what: &str) -> Result<Response, SyncError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        Err(SyncError::SourceUnavailable(format!(
            "Notion returned {} for {}: {}",
            status, what, text
        )))
    }
}

#[async_trait]
impl RecordSource for NotionApiClient {
    async fn query_database(&self, database_id: &str) -> Result<Vec<RawRecord>, SyncError> {
        collect_pages(database_id, |cursor| self.query_page(database_id, cursor)).await
    }

    async fn fetch_record(&self, record_id: &str) -> Result<RawRecord, SyncError> {
        let url = format!("{}/v1/pages/{}", self.base_url, record_id);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| SyncError::SourceUnavailable(e.to_string()))?;
        let resp = Self::check(resp, &format!("page {}", record_id)).await?;

        let page: ApiPage = resp
            .json()
            .await
            .map_err(|e| SyncError::SourceUnavailable(e.to_string()))?;
        Ok(map_page(page))
    }
}

/// Follows `next_cursor` until the database reports no more pages.
///
/// The first request carries no cursor. A page claiming `has_more` without a
/// cursor ends the walk with what was collected so far.
async fn collect_pages<F, Fut>(
    database_id: &str,
    mut fetch_page: F,
) -> Result<Vec<RawRecord>, SyncError>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<ApiQueryResponse, SyncError>>,
{
    let mut records = Vec::new();
    let mut cursor: Option<String> = None;

    loop {
        let page = fetch_page(cursor.take()).await?;

        tracing::debug!(
            database = database_id,
            count = page.results.len(),
            has_more = page.has_more,
            "Fetched page of records"
        );
        records.extend(page.results.into_iter().map(map_page));

        match (page.has_more, page.next_cursor) {
            (true, Some(next)) => cursor = Some(next),
            (true, None) => {
                tracing::warn!(database = database_id, "has_more without next_cursor; stopping");
                break;
            }
            _ => break,
        }
    }

    Ok(records)
}

fn map_page(page: ApiPage) -> RawRecord {
    RawRecord {
        id: page.id,
        fields: page
            .properties
            .into_iter()
            .map(|(name, value)| (name, map_property(value)))
            .collect(),
    }
}

/// Decodes a property by its `type` tag. Anything we don't model, or can't
/// decode, keeps its tag so rejection messages can name it.
fn map_property(value: Value) -> FieldValue {
    let tag = value
        .get("type")
        .and_then(Value::as_str)
        .unwrap_or("unknown")
        .to_string();

    match serde_json::from_value::<ApiProperty>(value) {
        Ok(ApiProperty::Title { title }) => {
            FieldValue::Title(title.into_iter().map(ApiRichText::into_text).collect())
        }
        Ok(ApiProperty::Select { select }) => FieldValue::Select(select.map(|s| s.name)),
        Ok(ApiProperty::Relation { relation }) => {
            FieldValue::Relation(relation.into_iter().map(|r| r.id).collect())
        }
        Ok(ApiProperty::Number { number }) => FieldValue::Number(number),
        Ok(ApiProperty::Other) => FieldValue::Unsupported(tag),
        Err(e) => {
            tracing::debug!("Could not decode '{}' property: {}", tag, e);
            FieldValue::Unsupported(tag)
        }
    }
}

#[derive(Debug, Serialize)]
struct ApiQueryRequest {
    page_size: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    start_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiQueryResponse {
    #[serde(default)]
    results: Vec<ApiPage>,
    #[serde(default)]
    has_more: bool,
    next_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiPage {
    id: String,
    #[serde(default)]
    properties: HashMap<String, Value>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ApiProperty {
    Title {
        #[serde(default)]
        title: Vec<ApiRichText>,
    },
    Select {
        select: Option<ApiSelectOption>,
    },
    Relation {
        #[serde(default)]
        relation: Vec<ApiPageRef>,
    },
    Number {
        number: Option<f64>,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct ApiRichText {
    plain_text: Option<String>,
    text: Option<ApiText>,
}

impl ApiRichText {
    fn into_text(self) -> String {
        self.text
            .map(|t| t.content)
            .or(self.plain_text)
            .unwrap_or_default()
    }
}

#[derive(Debug, Deserialize)]
struct ApiText {
    content: String,
}

#[derive(Debug, Deserialize)]
struct ApiSelectOption {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ApiPageRef {
    id: String,
}
