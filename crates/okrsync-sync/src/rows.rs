//! Enumeration of tracking rows from the document source.

use okrsync_adapters::{DocumentSource, TransportError};
use okrsync_core::TrackingRow;
use tracing::debug;

/// All rows with a non-empty project URL, following cursors until the source
/// stops reporting more results.
pub async fn list_rows(source: &dyn DocumentSource) -> Result<Vec<TrackingRow>, TransportError> {
    let mut rows = Vec::new();
    let mut cursor: Option<String> = None;
    loop {
        let page = source.query_rows(cursor.as_deref()).await?;
        let next = page.continuation().map(str::to_string);
        debug!(page_rows = page.items.len(), has_next = next.is_some(), "row page");
        rows.extend(page.items);
        match next {
            Some(c) => cursor = Some(c),
            None => break,
        }
    }
    Ok(rows)
}
