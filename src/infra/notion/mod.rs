// Notion infra layer.
// `notion_client.rs` talks to the Notion REST API and maps pages onto core
// `RawRecord`s.

#[path = "notion_client.rs"]
pub mod notion_client;

pub use notion_client::{NotionApiClient, DEFAULT_NOTION_VERSION};
