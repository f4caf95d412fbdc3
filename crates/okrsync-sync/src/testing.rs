//! In-memory collaborators for pipeline tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use okrsync_adapters::{DocumentSource, IssueTracker, TransportError, ISSUES_PAGE_SIZE};
use okrsync_core::{
    ContentBlock, NewBlock, Page, Project, TrackingRow, WorkItem, WorkItemStatus,
};

pub fn row(id: &str, url: &str) -> TrackingRow {
    TrackingRow {
        id: id.to_string(),
        objective: format!("Objective {id}"),
        project_url: Some(url.to_string()),
        latest_update: None,
    }
}

pub fn project(id: &str, state: Option<&str>, health: Option<&str>) -> Project {
    Project {
        id: id.to_string(),
        name: Some(format!("Project {id}")),
        lead_name: None,
        state: state.map(str::to_string),
        health: health.map(str::to_string),
        updated_at: None,
        latest_update: None,
    }
}

pub fn item(identifier: &str, title: &str, updated_at: &str, type_code: &str, label: &str) -> WorkItem {
    WorkItem {
        identifier: Some(identifier.to_string()),
        title: title.to_string(),
        url: None,
        updated_at: updated_at.to_string(),
        status: WorkItemStatus {
            type_code: Some(type_code.to_string()),
            label: Some(label.to_string()),
        },
    }
}

pub fn block(id: &str, block_type: &str, text: &str) -> ContentBlock {
    ContentBlock {
        id: id.to_string(),
        block_type: block_type.to_string(),
        plain_text: text.to_string(),
    }
}

fn unavailable(url: &str) -> TransportError {
    TransportError::HttpStatus {
        status: 502,
        url: url.to_string(),
        body: "bad gateway".to_string(),
    }
}

fn offset_cursor(cursor: Option<&str>) -> usize {
    cursor.and_then(|c| c.parse().ok()).unwrap_or(0)
}

fn slice_page<T: Clone>(all: &[T], offset: usize, size: usize) -> Page<T> {
    let end = (offset + size).min(all.len());
    let items = all.get(offset..end).unwrap_or_default().to_vec();
    let has_more = end < all.len();
    Page {
        items,
        has_more,
        next_cursor: has_more.then(|| end.to_string()),
    }
}

#[derive(Default)]
struct DocumentState {
    row_pages: Vec<Page<TrackingRow>>,
    row_queries: Vec<Option<String>>,
    latest: HashMap<String, String>,
    children: HashMap<String, Vec<ContentBlock>>,
    appended: Vec<(String, NewBlock)>,
    next_block: usize,
}

pub struct FakeDocuments {
    state: Mutex<DocumentState>,
    block_page_size: usize,
    silent_appends: bool,
    fail_row_query: bool,
    failing_writes: HashSet<String>,
}

impl Default for FakeDocuments {
    fn default() -> Self {
        Self {
            state: Mutex::new(DocumentState::default()),
            block_page_size: 100,
            silent_appends: false,
            fail_row_query: false,
            failing_writes: HashSet::new(),
        }
    }
}

impl FakeDocuments {
    /// Page `i` is served for cursor `"i"`; the first page for no cursor.
    pub fn with_row_pages(self, pages: Vec<Page<TrackingRow>>) -> Self {
        self.state.lock().unwrap().row_pages = pages;
        self
    }

    pub fn with_rows(self, rows: Vec<TrackingRow>) -> Self {
        self.with_row_pages(vec![Page::last(rows)])
    }

    pub fn with_children(self, block_id: &str, blocks: Vec<ContentBlock>) -> Self {
        self.state
            .lock()
            .unwrap()
            .children
            .insert(block_id.to_string(), blocks);
        self
    }

    pub fn with_block_page_size(mut self, size: usize) -> Self {
        self.block_page_size = size;
        self
    }

    /// Append calls succeed but report no created blocks.
    pub fn with_silent_appends(mut self) -> Self {
        self.silent_appends = true;
        self
    }

    pub fn failing_row_query(mut self) -> Self {
        self.fail_row_query = true;
        self
    }

    pub fn failing_writes_for(mut self, row_id: &str) -> Self {
        self.failing_writes.insert(row_id.to_string());
        self
    }

    pub fn row_queries(&self) -> Vec<Option<String>> {
        self.state.lock().unwrap().row_queries.clone()
    }

    pub fn latest_update(&self, row_id: &str) -> Option<String> {
        self.state.lock().unwrap().latest.get(row_id).cloned()
    }

    pub fn children_of(&self, block_id: &str) -> Vec<ContentBlock> {
        self.state
            .lock()
            .unwrap()
            .children
            .get(block_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn appended(&self) -> Vec<(String, NewBlock)> {
        self.state.lock().unwrap().appended.clone()
    }
}

#[async_trait]
impl DocumentSource for FakeDocuments {
    async fn query_rows(
        &self,
        start_cursor: Option<&str>,
    ) -> Result<Page<TrackingRow>, TransportError> {
        if self.fail_row_query {
            return Err(unavailable("databases/query"));
        }
        let mut state = self.state.lock().unwrap();
        state.row_queries.push(start_cursor.map(str::to_string));
        let index = offset_cursor(start_cursor);
        Ok(state
            .row_pages
            .get(index)
            .cloned()
            .unwrap_or_else(|| Page::last(Vec::new())))
    }

    async fn set_latest_update(&self, row_id: &str, text: &str) -> Result<(), TransportError> {
        if self.failing_writes.contains(row_id) {
            return Err(unavailable(&format!("pages/{row_id}")));
        }
        self.state
            .lock()
            .unwrap()
            .latest
            .insert(row_id.to_string(), text.to_string());
        Ok(())
    }

    async fn list_children(
        &self,
        block_id: &str,
        start_cursor: Option<&str>,
    ) -> Result<Page<ContentBlock>, TransportError> {
        let state = self.state.lock().unwrap();
        let all = state.children.get(block_id).cloned().unwrap_or_default();
        Ok(slice_page(&all, offset_cursor(start_cursor), self.block_page_size))
    }

    async fn append_children(
        &self,
        block_id: &str,
        children: &[NewBlock],
    ) -> Result<Vec<ContentBlock>, TransportError> {
        let mut state = self.state.lock().unwrap();
        let mut created = Vec::new();
        for child in children {
            state.next_block += 1;
            let id = format!("blk-{}", state.next_block);
            let stored = match child {
                NewBlock::Heading3 { text } => block(&id, "heading_3", text),
                NewBlock::BulletedListItem { text, .. } => block(&id, "bulleted_list_item", text),
            };
            state
                .children
                .entry(block_id.to_string())
                .or_default()
                .push(stored.clone());
            state.appended.push((block_id.to_string(), child.clone()));
            created.push(stored);
        }
        if self.silent_appends {
            created.clear();
        }
        Ok(created)
    }
}

#[derive(Default)]
pub struct FakeTracker {
    projects: HashMap<String, Vec<Project>>,
    items: HashMap<String, Vec<WorkItem>>,
    fail_projects: bool,
    item_requests: Mutex<usize>,
}

impl FakeTracker {
    pub fn with_projects(mut self, slug: &str, projects: Vec<Project>) -> Self {
        self.projects.insert(slug.to_string(), projects);
        self
    }

    pub fn with_items(mut self, project_id: &str, items: Vec<WorkItem>) -> Self {
        self.items.insert(project_id.to_string(), items);
        self
    }

    pub fn failing_projects(mut self) -> Self {
        self.fail_projects = true;
        self
    }

    pub fn item_page_requests(&self) -> usize {
        *self.item_requests.lock().unwrap()
    }
}

#[async_trait]
impl IssueTracker for FakeTracker {
    async fn projects_by_slug(&self, slug: &str) -> Result<Vec<Project>, TransportError> {
        if self.fail_projects {
            return Err(TransportError::GraphQl("Authentication required".to_string()));
        }
        Ok(self.projects.get(slug).cloned().unwrap_or_default())
    }

    async fn work_items_page(
        &self,
        project_id: &str,
        after: Option<&str>,
    ) -> Result<Page<WorkItem>, TransportError> {
        *self.item_requests.lock().unwrap() += 1;
        let all = self.items.get(project_id).cloned().unwrap_or_default();
        Ok(slice_page(&all, offset_cursor(after), ISSUES_PAGE_SIZE as usize))
    }
}
