//! Collaborator contracts for the document source and the issue tracker, plus
//! their Notion and Linear implementations.

use async_trait::async_trait;
use okrsync_core::{ContentBlock, NewBlock, Page, Project, TrackingRow, WorkItem};

mod linear;
mod notion;

pub use linear::{slug_id_from_slug, LinearClient, LinearConfig, ISSUES_PAGE_SIZE, LINEAR_API_URL};
pub use notion::{NotionClient, NotionConfig, NotionProperties, NOTION_API_BASE};
pub use okrsync_http::TransportError;

pub const CRATE_NAME: &str = "okrsync-adapters";

/// Store of tracking rows and their free-form bodies.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// One page of rows whose project URL property is non-empty.
    async fn query_rows(&self, start_cursor: Option<&str>)
        -> Result<Page<TrackingRow>, TransportError>;

    /// Replace the row's latest-update rich text field with `text`.
    async fn set_latest_update(&self, row_id: &str, text: &str) -> Result<(), TransportError>;

    /// One page of the direct children of `block_id` (a row id addresses the row body).
    async fn list_children(
        &self,
        block_id: &str,
        start_cursor: Option<&str>,
    ) -> Result<Page<ContentBlock>, TransportError>;

    /// Append `children` after the existing children of `block_id`.
    ///
    /// Returns the newly created top-level blocks.
    async fn append_children(
        &self,
        block_id: &str,
        children: &[NewBlock],
    ) -> Result<Vec<ContentBlock>, TransportError>;
}

/// Query-language backed source of projects and their work items.
#[async_trait]
pub trait IssueTracker: Send + Sync {
    /// Projects matching `slug`. At most one is expected.
    async fn projects_by_slug(&self, slug: &str) -> Result<Vec<Project>, TransportError>;

    async fn work_items_page(
        &self,
        project_id: &str,
        after: Option<&str>,
    ) -> Result<Page<WorkItem>, TransportError>;
}
