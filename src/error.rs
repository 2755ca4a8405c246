//! Typed error taxonomy for the mirror pipeline.
//!
//! Every failure that the backup or restore stages can surface is one of
//! these variants. The [`MirrorError::is_fatal`] split decides whether a
//! failure aborts the remaining work ([`MirrorError::IndexCreate`],
//! [`MirrorError::InvalidSchema`]) or is merely recorded per-job and the
//! run continues (everything else).

use std::path::PathBuf;

use thiserror::Error;

/// A typed failure from the mirror pipeline.
#[derive(Debug, Error)]
pub enum MirrorError {
    /// Failed to read the source index schema.
    #[error("failed to fetch schema for index '{index}': {reason}")]
    SchemaFetch { index: String, reason: String },

    /// Failed to create the target index. Fatal: uploads must not proceed.
    #[error("failed to create index '{index}': {reason}")]
    IndexCreate { index: String, reason: String },

    /// Failed to delete the target index.
    #[error("failed to delete index '{index}': {reason}")]
    IndexDelete { index: String, reason: String },

    /// A page query against an index failed after retries.
    #[error("query against index '{index}' at skip {skip} failed: {reason}")]
    Query {
        index: String,
        skip: usize,
        reason: String,
    },

    /// Failed to write a local file.
    #[error("failed to write file '{}': {reason}", path.display())]
    FileWrite { path: PathBuf, reason: String },

    /// Failed to upload a document batch.
    #[error("failed to upload '{}' to index '{index}': {reason}", path.display())]
    Upload {
        path: PathBuf,
        index: String,
        reason: String,
    },

    /// A schema document was missing, empty, or malformed. Fatal.
    #[error("invalid schema: {0}")]
    InvalidSchema(String),
}

impl MirrorError {
    /// Whether this failure aborts the remaining work. Only index creation
    /// and invalid-schema failures are fatal; the rest are recorded per job
    /// and the run continues.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            MirrorError::IndexCreate { .. } | MirrorError::InvalidSchema(_)
        )
    }
}
