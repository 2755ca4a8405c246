//! # Index Mirror CLI (`idxm`)
//!
//! Command-line front end for backing up a search index to local JSON
//! files and restoring it into another index.
//!
//! ## Usage
//!
//! ```bash
//! idxm --config ./config/mirror.toml <command>
//! ```
//!
//! | Command | Description |
//! |---------|-------------|
//! | `idxm backup` | Export the source index schema and documents to the backup directory |
//! | `idxm restore` | Recreate the target index from a backup and re-upload every file |
//! | `idxm run` | Backup followed by restore in one invocation |
//!
//! The export date range comes from `[export] start_date`/`end_date` in
//! the config file; `--since`/`--until` override it per run. An unset
//! range is empty and exports nothing.
//!
//! Exit status is non-zero when any failure is left unresolved at the
//! end of the run — a fatal error that aborted a stage, or per-day /
//! per-file failures still present in the final summary.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use index_mirror::config;
use index_mirror::error::MirrorError;
use index_mirror::summary::{BackupSummary, RestoreSummary};
use index_mirror::{backup, restore};

/// Index Mirror — copy a search index through local JSON files.
#[derive(Parser)]
#[command(
    name = "idxm",
    about = "Mirror a remote search index to local JSON files and replay it into another index",
    version,
    long_about = "Index Mirror exports every document of a source search index to day-partitioned \
    JSON files through the service's paginated search API, persists the index schema alongside \
    them, and can then recreate a target index from that schema and bulk-upload the files back."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/mirror.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Export the source index schema and documents to the backup directory.
    Backup {
        /// First day to export (YYYY-MM-DD, inclusive). Overrides the config file.
        #[arg(long)]
        since: Option<String>,

        /// End of the export range (YYYY-MM-DD, exclusive). Overrides the config file.
        #[arg(long)]
        until: Option<String>,
    },

    /// Recreate the target index from a backup and re-upload every exported file.
    Restore,

    /// Backup followed by restore in one invocation.
    Run {
        /// First day to export (YYYY-MM-DD, inclusive). Overrides the config file.
        #[arg(long)]
        since: Option<String>,

        /// End of the export range (YYYY-MM-DD, exclusive). Overrides the config file.
        #[arg(long)]
        until: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Backup { since, until } => {
            let summary = backup::run_backup(&cfg, since.as_deref(), until.as_deref()).await?;
            summary.print();
            check_backup(&summary)
        }
        Commands::Restore => {
            let summary = restore::run_restore(&cfg).await.map_err(label_fatal)?;
            summary.print();
            check_restore(&summary)
        }
        Commands::Run { since, until } => {
            let backup_summary =
                backup::run_backup(&cfg, since.as_deref(), until.as_deref()).await?;
            backup_summary.print();

            let restore_summary = restore::run_restore(&cfg).await.map_err(label_fatal)?;
            restore_summary.print();

            check_backup(&backup_summary).and(check_restore(&restore_summary))
        }
    }
}

/// Fatal errors abort remaining work by design; say so in the final
/// diagnostic instead of looking like an incidental early exit.
fn label_fatal(err: anyhow::Error) -> anyhow::Error {
    match err.downcast_ref::<MirrorError>() {
        Some(e) if e.is_fatal() => err.context("fatal error — remaining restore work aborted"),
        _ => err,
    }
}

fn check_backup(summary: &BackupSummary) -> Result<()> {
    let failed = summary.failed_days().len();
    if failed > 0 {
        anyhow::bail!("{} day(s) failed to export completely", failed);
    }
    Ok(())
}

fn check_restore(summary: &RestoreSummary) -> Result<()> {
    let failed = summary.failed_uploads().len();
    if failed > 0 {
        anyhow::bail!("{} file(s) failed to upload", failed);
    }
    Ok(())
}
