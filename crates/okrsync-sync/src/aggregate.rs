//! Project activity retrieval and the report it is summarized into.

use std::fmt;

use chrono::NaiveDate;
use okrsync_adapters::IssueTracker;
use okrsync_core::{truncate_chars, Project, WorkItem};
use serde::Serialize;
use tracing::debug;

use crate::RowError;

/// Upper bound on work items pulled for one project.
pub const WORK_ITEM_CAP: usize = 2000;
pub const NARRATIVE_BODY_LIMIT: usize = 400;
pub const DEFAULT_TOP_TITLES: usize = 3;
pub const DEFAULT_FRESHNESS_DAYS: i64 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Bucket {
    Done,
    InReview,
    InProgress,
    Other,
}

impl Bucket {
    /// Classify a status by type code and label, case-insensitively.
    ///
    /// Checks run in order done, in review, in progress; anything else is `Other`.
    pub fn classify(type_code: Option<&str>, label: Option<&str>) -> Self {
        let type_code = type_code.unwrap_or_default().to_lowercase();
        let label = label.unwrap_or_default().to_lowercase();

        if type_code == "completed" || label == "done" || label == "completed" {
            Self::Done
        } else if label.contains("review") {
            Self::InReview
        } else if type_code == "started" || label == "in progress" || label == "in-progress" {
            Self::InProgress
        } else {
            Self::Other
        }
    }

    pub fn of(item: &WorkItem) -> Self {
        Self::classify(
            item.status.type_code.as_deref(),
            item.status.label.as_deref(),
        )
    }
}

/// Display titles of the `n` most recently updated items.
///
/// Timestamps compare as strings; equal timestamps keep their input order.
pub fn top_titles(items: &[&WorkItem], n: usize) -> Vec<String> {
    let mut sorted = items.to_vec();
    sorted.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
    sorted.into_iter().take(n).map(WorkItem::display_title).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportOptions {
    pub top_titles: usize,
    pub freshness_days: i64,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            top_titles: DEFAULT_TOP_TITLES,
            freshness_days: DEFAULT_FRESHNESS_DAYS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectActivity {
    pub project: Project,
    pub work_items: Vec<WorkItem>,
}

/// Resolve `slug` to a project and collect its work items.
///
/// The first of several matching projects wins. Item pagination stops at
/// [`WORK_ITEM_CAP`] without error.
pub async fn aggregate(tracker: &dyn IssueTracker, slug: &str) -> Result<ProjectActivity, RowError> {
    let project = tracker
        .projects_by_slug(slug)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| RowError::NotFound {
            slug: slug.to_string(),
        })?;

    let mut work_items = Vec::new();
    let mut after: Option<String> = None;
    loop {
        let page = tracker.work_items_page(&project.id, after.as_deref()).await?;
        let next = page.continuation().map(str::to_string);
        work_items.extend(page.items);
        if work_items.len() >= WORK_ITEM_CAP {
            work_items.truncate(WORK_ITEM_CAP);
            debug!(project_id = %project.id, "work item cap reached");
            break;
        }
        match next {
            Some(cursor) => after = Some(cursor),
            None => break,
        }
    }

    Ok(ProjectActivity {
        project,
        work_items,
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Report {
    pub lines: Vec<String>,
}

impl Report {
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text())
    }
}

pub fn summarize(
    project: &Project,
    work_items: &[WorkItem],
    today: NaiveDate,
    options: ReportOptions,
) -> Report {
    let mut lines = Vec::new();

    if let Some(line) = narrative_line(project, today, options.freshness_days) {
        lines.push(line);
    }

    let mut done = Vec::new();
    let mut in_review = Vec::new();
    let mut in_progress = Vec::new();
    for item in work_items {
        match Bucket::of(item) {
            Bucket::Done => done.push(item),
            Bucket::InReview => in_review.push(item),
            Bucket::InProgress => in_progress.push(item),
            Bucket::Other => {}
        }
    }

    if !done.is_empty() || !in_review.is_empty() {
        let finished: Vec<&WorkItem> = done.iter().chain(in_review.iter()).copied().collect();
        let counts = format!("{} done, {} in review", done.len(), in_review.len());
        lines.push(with_titles(
            format!("Completed: {counts}"),
            top_titles(&finished, options.top_titles),
        ));
    }

    if !in_progress.is_empty() {
        lines.push(with_titles(
            format!("In progress: {}", in_progress.len()),
            top_titles(&in_progress, options.top_titles),
        ));
    }

    lines.push(format!(
        "Status: {}, health: {}",
        project.state.as_deref().unwrap_or("unknown"),
        project.health.as_deref().unwrap_or("unknown"),
    ));

    Report { lines }
}

fn with_titles(head: String, titles: Vec<String>) -> String {
    if titles.is_empty() {
        head
    } else {
        format!("{head} ({})", titles.join("; "))
    }
}

fn narrative_line(project: &Project, today: NaiveDate, freshness_days: i64) -> Option<String> {
    let update = project.latest_update.as_ref()?;
    let created = update.created_date()?;
    let days = (today - created).num_days();
    if days > freshness_days {
        return None;
    }
    let body = update
        .body
        .replace("\r\n", " ")
        .replace(['\n', '\r'], " ");
    Some(format!(
        "{}d ago, {}: {}",
        days.max(0),
        update.author.as_deref().unwrap_or("unknown"),
        truncate_chars(body.trim(), NARRATIVE_BODY_LIMIT),
    ))
}
