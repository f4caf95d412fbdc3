//! OKR sync pipeline: rows in, project activity summarized, reports written back.

use std::fmt;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use okrsync_adapters::{
    DocumentSource, IssueTracker, LinearClient, LinearConfig, NotionClient, NotionConfig,
    TransportError,
};
use okrsync_core::TrackingRow;
use okrsync_http::{HttpClientConfig, JsonHttpClient};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

pub mod aggregate;
pub mod rows;
pub mod writer;

#[cfg(test)]
mod testing;

pub use aggregate::{aggregate, summarize, top_titles, Bucket, ProjectActivity, Report, ReportOptions};
pub use rows::list_rows;
pub use writer::{log_entry, ReportWriter, LOG_HEADING};

pub const CRATE_NAME: &str = "okrsync-sync";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    #[error("invalid value {value:?} for {name}")]
    Invalid { name: &'static str, value: String },
}

/// Failure scoped to a single row. The batch carries on after any of these.
#[derive(Debug, Error)]
pub enum RowError {
    #[error("cannot parse project slug from {url:?}")]
    Parse { url: String },
    #[error("no project found for slug {slug}")]
    NotFound { slug: String },
    #[error("log heading missing on row {row_id} after creating it")]
    MissingHeading { row_id: String },
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl RowError {
    /// Parse and lookup misses skip the row; everything else is a failure.
    pub fn is_skip(&self) -> bool {
        matches!(self, Self::Parse { .. } | Self::NotFound { .. })
    }
}

#[derive(Clone)]
pub struct SyncConfig {
    pub notion_token: String,
    pub notion_database_id: String,
    pub linear_api_key: String,
    pub notion_api_base: String,
    pub linear_api_url: String,
    pub user_agent: String,
    pub http_timeout_secs: u64,
    pub top_titles: usize,
    pub freshness_days: i64,
}

impl fmt::Debug for SyncConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncConfig")
            .field("notion_token", &"<redacted>")
            .field("notion_database_id", &self.notion_database_id)
            .field("linear_api_key", &"<redacted>")
            .field("notion_api_base", &self.notion_api_base)
            .field("linear_api_url", &self.linear_api_url)
            .field("user_agent", &self.user_agent)
            .field("http_timeout_secs", &self.http_timeout_secs)
            .field("top_titles", &self.top_titles)
            .field("freshness_days", &self.freshness_days)
            .finish()
    }
}

impl SyncConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let value = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let required = |name: &'static str| value(name).ok_or(ConfigError::Missing(name));

        Ok(Self {
            notion_token: required("NOTION_TOKEN")?,
            notion_database_id: required("NOTION_OKR_DATABASE_ID")?,
            linear_api_key: required("LINEAR_API_KEY")?,
            notion_api_base: value("NOTION_API_BASE")
                .unwrap_or_else(|| okrsync_adapters::NOTION_API_BASE.to_string()),
            linear_api_url: value("LINEAR_API_URL")
                .unwrap_or_else(|| okrsync_adapters::LINEAR_API_URL.to_string()),
            user_agent: value("OKRSYNC_USER_AGENT").unwrap_or_else(|| "okrsync/0.1".to_string()),
            http_timeout_secs: parse_or("OKRSYNC_HTTP_TIMEOUT_SECS", value("OKRSYNC_HTTP_TIMEOUT_SECS"), 30)?,
            top_titles: parse_or("OKRSYNC_TOP_TITLES", value("OKRSYNC_TOP_TITLES"), aggregate::DEFAULT_TOP_TITLES)?,
            freshness_days: parse_or(
                "OKRSYNC_FRESHNESS_DAYS",
                value("OKRSYNC_FRESHNESS_DAYS"),
                aggregate::DEFAULT_FRESHNESS_DAYS,
            )?,
        })
    }

    pub fn report_options(&self) -> ReportOptions {
        ReportOptions {
            top_titles: self.top_titles,
            freshness_days: self.freshness_days,
        }
    }
}

fn parse_or<T: std::str::FromStr>(
    name: &'static str,
    raw: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match raw {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RowStatus {
    Updated,
    Skipped { reason: String },
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowOutcome {
    pub row_id: String,
    pub objective: String,
    pub slug: Option<String>,
    #[serde(flatten)]
    pub status: RowStatus,
}

impl fmt::Display for RowOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slug = self.slug.as_deref().unwrap_or("-");
        match &self.status {
            RowStatus::Updated => write!(f, "Updated: {} ({slug})", self.objective),
            RowStatus::Skipped { reason } => {
                write!(f, "Skipped row {}: {reason}", self.row_id)
            }
            RowStatus::Failed { error } => {
                write!(f, "Failed: {} ({slug}): {error}", self.objective)
            }
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncRunSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub rows_found: usize,
    pub updated: usize,
    pub skipped: usize,
    pub failed: usize,
    pub outcomes: Vec<RowOutcome>,
}

/// Progress notification emitted while a run is in flight.
#[derive(Debug, Clone, Copy)]
pub enum RunProgress<'a> {
    RowsFound(usize),
    RowDone(&'a RowOutcome),
}

pub struct SyncPipeline {
    options: ReportOptions,
    documents: Box<dyn DocumentSource>,
    tracker: Box<dyn IssueTracker>,
}

impl SyncPipeline {
    pub fn new(config: &SyncConfig) -> Result<Self> {
        let http = JsonHttpClient::new(HttpClientConfig {
            timeout: Duration::from_secs(config.http_timeout_secs),
            user_agent: Some(config.user_agent.clone()),
        })?;

        let mut notion = NotionConfig::new(&config.notion_token, &config.notion_database_id);
        notion.api_base = config.notion_api_base.clone();
        let mut linear = LinearConfig::new(&config.linear_api_key);
        linear.api_url = config.linear_api_url.clone();

        Ok(Self::with_collaborators(
            config.report_options(),
            Box::new(NotionClient::new(http.clone(), notion)),
            Box::new(LinearClient::new(http, linear)),
        ))
    }

    pub fn with_collaborators(
        options: ReportOptions,
        documents: Box<dyn DocumentSource>,
        tracker: Box<dyn IssueTracker>,
    ) -> Self {
        Self {
            options,
            documents,
            tracker,
        }
    }

    /// Run against today's UTC date, the same calendar narrative dates are read in.
    pub async fn run_once(&self) -> Result<SyncRunSummary> {
        self.run_once_on(Utc::now().date_naive()).await
    }

    pub async fn run_once_on(&self, today: NaiveDate) -> Result<SyncRunSummary> {
        self.run_once_reporting(today, |_| {}).await
    }

    /// Process every row once, dating reports and log entries `today`.
    ///
    /// `on_progress` sees the row count once listing finishes, then each outcome
    /// as soon as its row is done. Only a failure to list rows aborts the run.
    pub async fn run_once_reporting<F>(&self, today: NaiveDate, mut on_progress: F) -> Result<SyncRunSummary>
    where
        F: FnMut(RunProgress<'_>),
    {
        let started_at = Utc::now();
        let run_id = Uuid::new_v4();

        let rows = list_rows(self.documents.as_ref())
            .instrument(info_span!("list_rows", %run_id))
            .await
            .context("listing tracking rows")?;
        info!(%run_id, rows = rows.len(), "found tracking rows with project URLs");
        on_progress(RunProgress::RowsFound(rows.len()));

        let mut outcomes = Vec::with_capacity(rows.len());
        for row in &rows {
            let slug = row.project_slug().map(str::to_string);
            let span = info_span!("sync_row", %run_id, row_id = %row.id, slug = slug.as_deref().unwrap_or(""));
            let status = match self.sync_row(row, today).instrument(span).await {
                Ok(()) => {
                    info!(row_id = %row.id, objective = %row.objective, "row updated");
                    RowStatus::Updated
                }
                Err(err) if err.is_skip() => {
                    warn!(row_id = %row.id, error = %err, "row skipped");
                    RowStatus::Skipped {
                        reason: err.to_string(),
                    }
                }
                Err(err) => {
                    warn!(row_id = %row.id, error = %err, "row failed");
                    RowStatus::Failed {
                        error: err.to_string(),
                    }
                }
            };
            let outcome = RowOutcome {
                row_id: row.id.clone(),
                objective: row.objective.clone(),
                slug,
                status,
            };
            on_progress(RunProgress::RowDone(&outcome));
            outcomes.push(outcome);
        }

        let count = |want: fn(&RowStatus) -> bool| outcomes.iter().filter(|o| want(&o.status)).count();
        let updated = count(|s| matches!(s, RowStatus::Updated));
        let skipped = count(|s| matches!(s, RowStatus::Skipped { .. }));
        let failed = count(|s| matches!(s, RowStatus::Failed { .. }));

        Ok(SyncRunSummary {
            run_id,
            started_at,
            finished_at: Utc::now(),
            rows_found: rows.len(),
            updated,
            skipped,
            failed,
            outcomes,
        })
    }

    async fn sync_row(&self, row: &TrackingRow, today: NaiveDate) -> Result<(), RowError> {
        let slug = row.project_slug().ok_or_else(|| RowError::Parse {
            url: row.project_url.clone().unwrap_or_default(),
        })?;

        let activity = aggregate(self.tracker.as_ref(), slug).await?;
        let report = summarize(&activity.project, &activity.work_items, today, self.options);

        let label = activity
            .project
            .name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(&row.objective);

        ReportWriter::new(self.documents.as_ref())
            .write(&row.id, &report.text(), label, today)
            .await
    }
}

pub async fn run_sync_once_from_env<F>(on_progress: F) -> Result<SyncRunSummary>
where
    F: FnMut(RunProgress<'_>),
{
    let config = SyncConfig::from_env().context("loading configuration")?;
    let pipeline = SyncPipeline::new(&config)?;
    pipeline
        .run_once_reporting(Utc::now().date_naive(), on_progress)
        .await
}
