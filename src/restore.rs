//! Restore: recreate the target index and replay the exported files.
//!
//! The sequence is deliberate: load the persisted schema (fatal if
//! missing), delete any previous target index (best-effort), create the
//! target from the renamed schema (fatal on failure — uploading into a
//! nonexistent or stale index would corrupt the restore silently), then
//! upload every export file under the bounded scheduler. Files are sent
//! verbatim; export already normalized them.
//!
//! Files are matched by the *source* index name: the backup artifacts are
//! the restore's input, whatever the target is called.

use anyhow::Result;
use globset::Glob;
use serde_json::Value;
use std::path::{Path, PathBuf};

use crate::client::SearchClient;
use crate::config::Config;
use crate::error::MirrorError;
use crate::scheduler;
use crate::schema;
use crate::summary::RestoreSummary;

/// Result of one file upload. `documents` is the batch size read from the
/// file, counted for the summary whether or not the upload succeeded.
#[derive(Debug)]
pub struct UploadOutcome {
    pub path: PathBuf,
    pub documents: usize,
    pub error: Option<MirrorError>,
}

pub async fn run_restore(config: &Config) -> Result<RestoreSummary> {
    // Fatal before any network traffic: no schema, no restore.
    let raw = schema::load_schema(&config.backup.dir, &config.source.index)?;
    let renamed = schema::rename_index(&raw, &config.target.index)?;

    let client = SearchClient::connect(&config.target, &config.export)?;

    println!(
        "restore {} @ {} ← {}",
        config.target.index,
        config.target.endpoint,
        config.backup.dir.display()
    );

    let deleted_existing = match client.delete_index(&config.target.index).await {
        Ok(deleted) => {
            if deleted {
                println!("  deleted existing index {}", config.target.index);
            }
            deleted
        }
        Err(e) => {
            eprintln!("Warning: {} — continuing to create", e);
            false
        }
    };

    // Fatal: abort before any upload job is spawned.
    client.create_index(&config.target.index, &renamed).await?;
    println!(
        "  created index {} from {} schema",
        config.target.index, config.source.index
    );

    let files = backup_files(&config.backup.dir, &config.source.index)?;
    if files.is_empty() {
        eprintln!(
            "Warning: no export files matching {}*.json in {}",
            config.source.index,
            config.backup.dir.display()
        );
    }

    let outcomes = scheduler::run_bounded(files, config.export.parallelism, |path| {
        let client = client.clone();
        let index = config.target.index.clone();
        async move {
            let outcome = upload_file(client, index, path).await;
            match &outcome.error {
                None => println!(
                    "  {}  {} document(s)",
                    outcome.path.display(),
                    outcome.documents
                ),
                Some(error) => eprintln!("  {}", error),
            }
            outcome
        }
    })
    .await;

    Ok(RestoreSummary {
        index: config.target.index.clone(),
        endpoint: config.target.endpoint.clone(),
        deleted_existing,
        uploads: outcomes,
    })
}

/// Export files for an index, sorted by name: `{index}*.json`, which
/// matches every day/page file but not the `.schema` document.
pub fn backup_files(dir: &Path, index: &str) -> Result<Vec<PathBuf>> {
    let matcher = Glob::new(&format!("{}*.json", index))?.compile_matcher();
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if matcher.is_match(Path::new(&entry.file_name())) {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}

async fn upload_file(client: SearchClient, index: String, path: PathBuf) -> UploadOutcome {
    let mut outcome = UploadOutcome {
        path: path.clone(),
        documents: 0,
        error: None,
    };

    let payload = match std::fs::read_to_string(&path) {
        Ok(payload) => payload,
        Err(e) => {
            outcome.error = Some(MirrorError::Upload {
                path,
                index,
                reason: format!("read failed: {}", e),
            });
            return outcome;
        }
    };

    // Batch size for the summary; the payload itself goes up untouched.
    outcome.documents = serde_json::from_str::<Value>(&payload)
        .ok()
        .and_then(|body| body.get("value").and_then(|v| v.as_array().map(Vec::len)))
        .unwrap_or(0);

    if let Err(failure) = client.upload_documents(&index, &payload).await {
        outcome.error = Some(MirrorError::Upload {
            path,
            index,
            reason: failure.reason,
        });
    }

    outcome
}
