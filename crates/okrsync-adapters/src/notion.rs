//! Notion database + blocks API adapter.

use std::collections::HashMap;

use async_trait::async_trait;
use okrsync_core::{ContentBlock, NewBlock, Page, TrackingRow};
use okrsync_http::{JsonHttpClient, TransportError};
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use tracing::debug;

use crate::DocumentSource;

pub const NOTION_API_BASE: &str = "https://api.notion.com/v1";
pub const NOTION_VERSION: &str = "2022-06-28";
const BLOCK_PAGE_SIZE: u32 = 100;

/// Names of the row properties the sync reads and writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotionProperties {
    pub objective: String,
    pub project_url: String,
    pub latest_update: String,
}

impl Default for NotionProperties {
    fn default() -> Self {
        Self {
            objective: "Objective".to_string(),
            project_url: "Linear project URL".to_string(),
            latest_update: "Latest update".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NotionConfig {
    pub token: String,
    pub database_id: String,
    pub api_base: String,
    pub properties: NotionProperties,
}

impl NotionConfig {
    pub fn new(token: impl Into<String>, database_id: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            database_id: database_id.into(),
            api_base: NOTION_API_BASE.to_string(),
            properties: NotionProperties::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NotionClient {
    http: JsonHttpClient,
    config: NotionConfig,
}

impl NotionClient {
    pub fn new(http: JsonHttpClient, config: NotionConfig) -> Self {
        Self { http, config }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.api_base.trim_end_matches('/'), path)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .bearer_auth(&self.config.token)
            .header("Notion-Version", NOTION_VERSION)
    }
}

#[async_trait]
impl DocumentSource for NotionClient {
    async fn query_rows(
        &self,
        start_cursor: Option<&str>,
    ) -> Result<Page<TrackingRow>, TransportError> {
        let url = self.url(&format!("databases/{}/query", self.config.database_id));
        let payload = query_payload(&self.config.properties.project_url, start_cursor);
        let list: ListResponse<PageObject> = self
            .http
            .execute(self.authorize(self.http.post(&url)).json(&payload))
            .await?;
        debug!(rows = list.results.len(), "notion database page received");
        Ok(list.into_page(|page| page.into_row(&self.config.properties)))
    }

    async fn set_latest_update(&self, row_id: &str, text: &str) -> Result<(), TransportError> {
        let url = self.url(&format!("pages/{row_id}"));
        let property = self.config.properties.latest_update.as_str();
        let payload = json!({
            "properties": {
                property: { "rich_text": [rich_text(text)] }
            }
        });
        let _: JsonValue = self
            .http
            .execute(self.authorize(self.http.patch(&url)).json(&payload))
            .await?;
        Ok(())
    }

    async fn list_children(
        &self,
        block_id: &str,
        start_cursor: Option<&str>,
    ) -> Result<Page<ContentBlock>, TransportError> {
        let url = self.url(&format!("blocks/{block_id}/children"));
        let mut request = self
            .http
            .get(&url)
            .query(&[("page_size", BLOCK_PAGE_SIZE.to_string())]);
        if let Some(cursor) = start_cursor {
            request = request.query(&[("start_cursor", cursor)]);
        }
        let list: ListResponse<BlockObject> = self.http.execute(self.authorize(request)).await?;
        Ok(list.into_page(BlockObject::into_content_block))
    }

    async fn append_children(
        &self,
        block_id: &str,
        children: &[NewBlock],
    ) -> Result<Vec<ContentBlock>, TransportError> {
        let url = self.url(&format!("blocks/{block_id}/children"));
        let payload = json!({
            "children": children.iter().map(block_json).collect::<Vec<_>>()
        });
        let list: ListResponse<BlockObject> = self
            .http
            .execute(self.authorize(self.http.patch(&url)).json(&payload))
            .await?;
        Ok(list
            .results
            .into_iter()
            .map(BlockObject::into_content_block)
            .collect())
    }
}

fn query_payload(url_property: &str, start_cursor: Option<&str>) -> JsonValue {
    let mut payload = json!({
        "filter": {
            "property": url_property,
            "url": { "is_not_empty": true }
        }
    });
    if let Some(cursor) = start_cursor {
        payload["start_cursor"] = JsonValue::String(cursor.to_string());
    }
    payload
}

fn rich_text(content: &str) -> JsonValue {
    json!({ "type": "text", "text": { "content": content } })
}

fn block_json(block: &NewBlock) -> JsonValue {
    match block {
        NewBlock::Heading3 { text } => json!({
            "object": "block",
            "type": "heading_3",
            "heading_3": { "rich_text": [rich_text(text)], "is_toggleable": true }
        }),
        NewBlock::BulletedListItem { text, children } => {
            let mut item = json!({ "rich_text": [rich_text(text)] });
            if !children.is_empty() {
                item["children"] = JsonValue::Array(children.iter().map(block_json).collect());
            }
            json!({
                "object": "block",
                "type": "bulleted_list_item",
                "bulleted_list_item": item
            })
        }
    }
}

#[derive(Debug, Deserialize)]
struct ListResponse<T> {
    results: Vec<T>,
    #[serde(default)]
    has_more: Option<bool>,
    #[serde(default)]
    next_cursor: Option<String>,
}

impl<T> ListResponse<T> {
    fn into_page<U>(self, map: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.results.into_iter().map(map).collect(),
            has_more: self.has_more.unwrap_or(false),
            next_cursor: self.next_cursor,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RichTextItem {
    #[serde(default)]
    plain_text: String,
}

fn plain_text(items: &[RichTextItem]) -> String {
    items.iter().map(|t| t.plain_text.as_str()).collect()
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum PropertyValue {
    Title {
        #[serde(default)]
        title: Vec<RichTextItem>,
    },
    RichText {
        #[serde(default)]
        rich_text: Vec<RichTextItem>,
    },
    Url {
        #[serde(default)]
        url: Option<String>,
    },
    #[serde(other)]
    Other,
}

impl PropertyValue {
    fn text(&self) -> Option<String> {
        match self {
            Self::Title { title } => Some(plain_text(title)),
            Self::RichText { rich_text } => Some(plain_text(rich_text)),
            Self::Url { url } => url.clone(),
            Self::Other => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct PageObject {
    id: String,
    #[serde(default)]
    properties: HashMap<String, PropertyValue>,
}

impl PageObject {
    fn into_row(self, names: &NotionProperties) -> TrackingRow {
        let text = |name: &str| self.properties.get(name).and_then(PropertyValue::text);
        TrackingRow {
            objective: text(&names.objective).unwrap_or_default().trim().to_string(),
            project_url: text(&names.project_url).filter(|u| !u.trim().is_empty()),
            latest_update: text(&names.latest_update),
            id: self.id,
        }
    }
}

#[derive(Debug, Deserialize)]
struct BlockObject {
    id: String,
    #[serde(rename = "type")]
    block_type: String,
    #[serde(flatten)]
    content: HashMap<String, JsonValue>,
}

impl BlockObject {
    fn into_content_block(self) -> ContentBlock {
        let items: Vec<RichTextItem> = self
            .content
            .get(&self.block_type)
            .and_then(|body| body.get("rich_text"))
            .and_then(|rt| serde_json::from_value(rt.clone()).ok())
            .unwrap_or_default();
        ContentBlock {
            plain_text: plain_text(&items),
            id: self.id,
            block_type: self.block_type,
        }
    }
}
