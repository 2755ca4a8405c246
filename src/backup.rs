//! Backup orchestration: schema transfer plus the day-range export.
//!
//! Runs once per invocation: persist the source schema, note the source's
//! own document count, then fan the date range out into one job per
//! calendar day under the bounded scheduler. Individual day failures are
//! recorded and reported; only filesystem problems with the backup
//! directory itself abort the stage.

use anyhow::{Context, Result};

use crate::client::SearchClient;
use crate::config::Config;
use crate::export;
use crate::scheduler;
use crate::schema;
use crate::summary::BackupSummary;

pub async fn run_backup(
    config: &Config,
    since: Option<&str>,
    until: Option<&str>,
) -> Result<BackupSummary> {
    let (start, end) = config.export.resolve_range(since, until)?;
    std::fs::create_dir_all(&config.backup.dir).with_context(|| {
        format!(
            "Failed to create backup directory {}",
            config.backup.dir.display()
        )
    })?;

    let client = SearchClient::connect(&config.source, &config.export)?;

    println!(
        "backup {} @ {} → {}",
        config.source.index,
        config.source.endpoint,
        config.backup.dir.display()
    );

    // Schema first: restore refuses to run without it, so a fetch failure
    // here is loud later even though the document export continues.
    let mut schema_saved = false;
    let mut key_field = None;
    match client.get_index_schema(&config.source.index).await {
        Ok(raw) => {
            let path = schema::save_schema(&config.backup.dir, &config.source.index, &raw)?;
            key_field = schema::key_field_name(&raw);
            schema_saved = true;
            println!("  schema saved to {}", path.display());
            if let Some(key) = &key_field {
                println!("  key field: {}", key);
            }
        }
        Err(e) => {
            eprintln!("Warning: {} — restore will refuse to run without a schema", e);
        }
    }

    let source_doc_count = match client.document_count(&config.source.index).await {
        Ok(count) => Some(count),
        Err(e) => {
            eprintln!("Warning: could not read source document count: {}", e);
            None
        }
    };

    let days = scheduler::day_windows(start, end);
    if days.is_empty() {
        eprintln!(
            "Warning: export range {} → {} is empty; set [export] start_date/end_date \
             or pass --since/--until to export documents",
            start, end
        );
    }

    let outcomes = scheduler::run_bounded(days, config.export.parallelism, |day| {
        let client = client.clone();
        let index = config.source.index.clone();
        let timestamp_field = config.export.timestamp_field.clone();
        let batch_size = config.export.max_batch_size;
        let dir = config.backup.dir.clone();
        async move {
            let outcome =
                export::export_day(client, index, timestamp_field, batch_size, dir, day).await;
            match &outcome.error {
                None => println!(
                    "  {}  {} file(s), {} document(s)",
                    outcome.day, outcome.files_written, outcome.documents
                ),
                Some(error) => eprintln!(
                    "  {}  stopped after {} file(s): {}",
                    outcome.day, outcome.files_written, error
                ),
            }
            outcome
        }
    })
    .await;

    Ok(BackupSummary {
        index: config.source.index.clone(),
        endpoint: config.source.endpoint.clone(),
        schema_saved,
        key_field,
        source_doc_count,
        range: (start, end),
        days: outcomes,
    })
}
