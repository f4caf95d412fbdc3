//! Writes a report back onto its row: the latest-update field is replaced and
//! a dated entry is appended under the update-log heading.

use chrono::NaiveDate;
use okrsync_adapters::{DocumentSource, TransportError};
use okrsync_core::{truncate_chars, NewBlock};
use tracing::{debug, info};

use crate::RowError;

pub const LOG_HEADING: &str = "Weekly Linear update log";
/// Per-text limit of the document source's rich text objects.
pub const TEXT_LIMIT: usize = 2000;
pub const MAX_LOG_LINES: usize = 20;

pub struct ReportWriter<'a> {
    documents: &'a dyn DocumentSource,
}

impl<'a> ReportWriter<'a> {
    pub fn new(documents: &'a dyn DocumentSource) -> Self {
        Self { documents }
    }

    pub async fn write(
        &self,
        row_id: &str,
        report_text: &str,
        label: &str,
        today: NaiveDate,
    ) -> Result<(), RowError> {
        self.overwrite_latest(row_id, report_text).await?;
        self.append_log_entry(row_id, report_text, label, today).await
    }

    pub async fn overwrite_latest(&self, row_id: &str, report_text: &str) -> Result<(), RowError> {
        let text = truncate_chars(report_text, TEXT_LIMIT);
        self.documents.set_latest_update(row_id, &text).await?;
        Ok(())
    }

    /// Append one dated entry under the log heading, creating the heading first
    /// if the row has none. Running twice appends twice.
    pub async fn append_log_entry(
        &self,
        row_id: &str,
        report_text: &str,
        label: &str,
        today: NaiveDate,
    ) -> Result<(), RowError> {
        let heading_id = self.find_or_create_heading(row_id).await?;
        let entry = log_entry(report_text, label, today);
        self.documents
            .append_children(&heading_id, std::slice::from_ref(&entry))
            .await?;
        info!(row_id, heading_id = %heading_id, "log entry appended");
        Ok(())
    }

    async fn find_or_create_heading(&self, row_id: &str) -> Result<String, RowError> {
        if let Some(id) = self.find_heading(row_id).await? {
            return Ok(id);
        }

        debug!(row_id, "creating log heading");
        let created = self
            .documents
            .append_children(
                row_id,
                &[NewBlock::Heading3 {
                    text: LOG_HEADING.to_string(),
                }],
            )
            .await?;
        if let Some(block) = created.iter().find(|b| b.is_heading_3_with_text(LOG_HEADING)) {
            return Ok(block.id.clone());
        }

        self.find_heading(row_id)
            .await?
            .ok_or_else(|| RowError::MissingHeading {
                row_id: row_id.to_string(),
            })
    }

    async fn find_heading(&self, row_id: &str) -> Result<Option<String>, TransportError> {
        let mut cursor: Option<String> = None;
        loop {
            let page = self.documents.list_children(row_id, cursor.as_deref()).await?;
            if let Some(block) = page
                .items
                .iter()
                .find(|b| b.is_heading_3_with_text(LOG_HEADING))
            {
                return Ok(Some(block.id.clone()));
            }
            match page.continuation() {
                Some(next) => cursor = Some(next.to_string()),
                None => return Ok(None),
            }
        }
    }
}

/// `{date} — {label}` with the report's non-blank lines as children.
pub fn log_entry(report_text: &str, label: &str, today: NaiveDate) -> NewBlock {
    let children = report_text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .take(MAX_LOG_LINES)
        .map(|line| NewBlock::BulletedListItem {
            text: truncate_chars(line, TEXT_LIMIT),
            children: Vec::new(),
        })
        .collect();
    NewBlock::BulletedListItem {
        text: truncate_chars(&format!("{} — {label}", today.format("%Y-%m-%d")), TEXT_LIMIT),
        children,
    }
}
