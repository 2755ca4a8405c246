//! Per-day paginated document export.
//!
//! One day-job walks its window of the source index page by page: filter
//! on the timestamp field over `[day, day+1)`, ascending order for
//! deterministic re-pagination, `skip` advancing by the page size until a
//! page comes back empty. Every page is normalized and flushed to its own
//! numbered file, so a day with `K` documents and page size `S` produces
//! exactly `ceil(K / S)` files.
//!
//! Files are written temp-then-rename: a partially written file is never
//! visible under its final name. Pre-existing files with colliding names
//! are overwritten — re-running an export regenerates the day from
//! scratch.

use chrono::NaiveDate;
use serde_json::Value;
use std::path::{Path, PathBuf};

use crate::client::{SearchClient, SearchQuery};
use crate::error::MirrorError;
use crate::geo;

/// Result of one day-job. `error` is set when the job ended early; the
/// counts then cover what was completed before the failure, so partial
/// day coverage is visible rather than silent.
#[derive(Debug)]
pub struct DayOutcome {
    pub day: NaiveDate,
    pub files_written: usize,
    pub documents: usize,
    pub error: Option<MirrorError>,
}

/// Export file name for one page of one day:
/// `{index}-{YYYY-MM-DD}-{page}.json`.
pub fn export_file_name(index: &str, day: NaiveDate, page: usize) -> String {
    format!("{}-{}-{}.json", index, day.format("%Y-%m-%d"), page)
}

/// Filter expression selecting documents whose timestamp falls in
/// `[day, day+1)`.
pub fn day_filter(timestamp_field: &str, day: NaiveDate) -> String {
    let next = day.succ_opt().expect("date overflow");
    format!(
        "{field} ge {start}T00:00:00Z and {field} lt {end}T00:00:00Z",
        field = timestamp_field,
        start = day.format("%Y-%m-%d"),
        end = next.format("%Y-%m-%d"),
    )
}

/// Export every document of one calendar day to numbered files in `dir`.
///
/// Owns all of its state; clones of the client share only the connection
/// pool, so day-jobs can run concurrently without coordination beyond
/// their distinct file names.
pub async fn export_day(
    client: SearchClient,
    index: String,
    timestamp_field: String,
    batch_size: usize,
    dir: PathBuf,
    day: NaiveDate,
) -> DayOutcome {
    let mut outcome = DayOutcome {
        day,
        files_written: 0,
        documents: 0,
        error: None,
    };

    let filter = day_filter(&timestamp_field, day);
    let order_by = format!("{} asc", timestamp_field);
    let mut skip = 0;
    let mut page_index = 0;

    loop {
        let query = SearchQuery {
            filter: Some(filter.clone()),
            order_by: Some(order_by.clone()),
            top: batch_size,
            skip,
            include_count: false,
        };

        let page = match client.search(&index, &query).await {
            Ok(page) => page,
            Err(e) => {
                outcome.error = Some(e);
                break;
            }
        };
        if page.value.is_empty() {
            break;
        }

        let mut documents = page.value;
        for doc in &mut documents {
            geo::normalize_document(doc);
        }

        let path = dir.join(export_file_name(&index, day, page_index));
        if let Err(e) = write_export_file(&path, &documents) {
            outcome.error = Some(e);
            break;
        }

        outcome.files_written += 1;
        outcome.documents += documents.len();
        page_index += 1;
        skip += batch_size;
    }

    outcome
}

/// Write one page as `{"value": [...]}`, atomically.
fn write_export_file(path: &Path, documents: &[Value]) -> Result<(), MirrorError> {
    let body = serde_json::json!({ "value": documents });
    let text = serde_json::to_string(&body).map_err(|e| MirrorError::FileWrite {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, text)
        .and_then(|_| std::fs::rename(&tmp, path))
        .map_err(|e| MirrorError::FileWrite {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
}
