//! Core domain model shared by the okrsync adapters and the sync pipeline.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

pub const CRATE_NAME: &str = "okrsync-core";

/// Literal that precedes the project slug in a tracker project URL.
pub const PROJECT_URL_MARKER: &str = "/project/";

/// One OKR row from the document source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingRow {
    pub id: String,
    pub objective: String,
    pub project_url: Option<String>,
    pub latest_update: Option<String>,
}

impl TrackingRow {
    pub fn project_slug(&self) -> Option<&str> {
        self.project_url.as_deref().and_then(project_slug_from_url)
    }
}

/// Extract the path segment immediately following `/project/`.
///
/// The segment ends at the next `/`, `?` or `#`. An empty segment is not a slug.
pub fn project_slug_from_url(url: &str) -> Option<&str> {
    let start = url.find(PROJECT_URL_MARKER)? + PROJECT_URL_MARKER.len();
    let rest = &url[start..];
    let end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
    let slug = &rest[..end];
    if slug.is_empty() {
        None
    } else {
        Some(slug)
    }
}

/// Most recent narrative update authored against a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectUpdate {
    pub author: Option<String>,
    pub created_at: String,
    pub body: String,
}

impl ProjectUpdate {
    /// UTC calendar date of `created_at`. Bare dates are taken as UTC.
    pub fn created_date(&self) -> Option<NaiveDate> {
        if let Ok(ts) = DateTime::parse_from_rfc3339(&self.created_at) {
            return Some(ts.with_timezone(&Utc).date_naive());
        }
        self.created_at
            .get(..10)
            .and_then(|date| NaiveDate::parse_from_str(date, "%Y-%m-%d").ok())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: Option<String>,
    pub lead_name: Option<String>,
    pub state: Option<String>,
    pub health: Option<String>,
    pub updated_at: Option<String>,
    pub latest_update: Option<ProjectUpdate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct WorkItemStatus {
    pub type_code: Option<String>,
    pub label: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItem {
    pub identifier: Option<String>,
    pub title: String,
    pub url: Option<String>,
    /// ISO-8601 timestamp; compared lexicographically.
    pub updated_at: String,
    pub status: WorkItemStatus,
}

impl WorkItem {
    pub fn display_title(&self) -> String {
        match self.identifier.as_deref().filter(|id| !id.is_empty()) {
            Some(identifier) => format!("{identifier}: {}", self.title),
            None => self.title.clone(),
        }
    }
}

/// One page of a cursor-paginated collaborator listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub has_more: bool,
    pub next_cursor: Option<String>,
}

impl<T> Page<T> {
    pub fn last(items: Vec<T>) -> Self {
        Self {
            items,
            has_more: false,
            next_cursor: None,
        }
    }

    /// Cursor for the following page, if the listing is not exhausted.
    ///
    /// A page that claims more results without a cursor ends the stream.
    pub fn continuation(&self) -> Option<&str> {
        if !self.has_more {
            return None;
        }
        self.next_cursor.as_deref().filter(|c| !c.is_empty())
    }
}

/// Existing block in a row's body, reduced to what the log writer inspects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentBlock {
    pub id: String,
    pub block_type: String,
    pub plain_text: String,
}

impl ContentBlock {
    pub fn is_heading_3_with_text(&self, text: &str) -> bool {
        self.block_type == "heading_3" && self.plain_text.trim() == text
    }
}

/// Block to be appended to a row's body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NewBlock {
    Heading3 { text: String },
    BulletedListItem { text: String, children: Vec<NewBlock> },
}

/// Truncate to at most `max_chars` characters, never splitting a code point.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}
