//! TOML configuration parsing and validation.
//!
//! A run is described by one config file: where the source index lives,
//! where the target index lives, where export files go, and the export
//! tuning (date range, page size, parallelism, retry policy). See
//! `config/mirror.example.toml` for a full example.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// The search API rejects pages larger than this, so export files can
/// never hold more documents either.
pub const MAX_BATCH_SIZE_LIMIT: usize = 1000;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub source: ServiceConfig,
    pub target: ServiceConfig,
    pub backup: BackupConfig,
    #[serde(default)]
    pub export: ExportConfig,
}

/// Coordinates of one remote index service plus the index to operate on.
#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    /// Base URL of the service, e.g. `https://acme-search.example.net`.
    pub endpoint: String,
    /// Admin key sent in the `api-key` header.
    pub api_key: String,
    /// Index name on this service.
    pub index: String,
    /// Optional `api-version` query parameter appended to every request.
    #[serde(default)]
    pub api_version: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BackupConfig {
    /// Directory that receives the schema file and the per-page export
    /// files. Created on backup if missing; restore reads from it.
    pub dir: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExportConfig {
    /// Document field the day windows filter and order on.
    #[serde(default = "default_timestamp_field")]
    pub timestamp_field: String,

    /// First day of the export range (YYYY-MM-DD, inclusive). When unset,
    /// defaults to today — together with an unset `end_date` that is an
    /// empty range, which exports nothing. An explicit range is required
    /// configuration for any output.
    #[serde(default)]
    pub start_date: Option<String>,

    /// End of the export range (YYYY-MM-DD, exclusive). Same default
    /// behavior as `start_date`.
    #[serde(default)]
    pub end_date: Option<String>,

    /// Documents per page and therefore per export file. Hard API ceiling
    /// of 1000.
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,

    /// Upper bound on concurrently running day-jobs (backup) and file
    /// uploads (restore) — and so on in-flight requests.
    #[serde(default = "default_parallelism")]
    pub parallelism: usize,

    /// Retries per request on 429/5xx/transport errors, with exponential
    /// backoff.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Per-request timeout. A stuck call fails its job instead of
    /// blocking the pool forever.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            timestamp_field: default_timestamp_field(),
            start_date: None,
            end_date: None,
            max_batch_size: default_max_batch_size(),
            parallelism: default_parallelism(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_timestamp_field() -> String {
    "metadata_storage_last_modified".to_string()
}
fn default_max_batch_size() -> usize {
    500
}
fn default_parallelism() -> usize {
    10
}
fn default_max_retries() -> u32 {
    3
}
fn default_timeout_secs() -> u64 {
    30
}

impl ExportConfig {
    /// Resolve the export range `[start, end)`. CLI `--since`/`--until`
    /// win over the config file; unset bounds fall back to today, so a
    /// fully unset range is empty by construction.
    pub fn resolve_range(
        &self,
        since: Option<&str>,
        until: Option<&str>,
    ) -> Result<(NaiveDate, NaiveDate)> {
        let today = chrono::Utc::now().date_naive();
        let start = match since.or(self.start_date.as_deref()) {
            Some(text) => parse_date(text)?,
            None => today,
        };
        let end = match until.or(self.end_date.as_deref()) {
            Some(text) => parse_date(text)?,
            None => today,
        };
        if start > end {
            anyhow::bail!("export start date {} is after end date {}", start, end);
        }
        Ok((start, end))
    }
}

fn parse_date(text: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .with_context(|| format!("invalid date '{}', expected YYYY-MM-DD", text))
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    for (label, service) in [("source", &config.source), ("target", &config.target)] {
        if service.endpoint.is_empty() {
            anyhow::bail!("{}.endpoint must be set", label);
        }
        if service.index.is_empty() {
            anyhow::bail!("{}.index must be set", label);
        }
    }

    if config.export.max_batch_size == 0 || config.export.max_batch_size > MAX_BATCH_SIZE_LIMIT {
        anyhow::bail!(
            "export.max_batch_size must be in 1..={}, got {}",
            MAX_BATCH_SIZE_LIMIT,
            config.export.max_batch_size
        );
    }

    if config.export.parallelism == 0 {
        anyhow::bail!("export.parallelism must be >= 1");
    }

    // Reject malformed dates at load time rather than mid-run.
    config.export.resolve_range(None, None)?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_toml() -> String {
        r#"
[source]
endpoint = "https://src.example.net"
api_key = "src-key"
index = "hotels"

[target]
endpoint = "https://dst.example.net"
api_key = "dst-key"
index = "hotels-copy"

[backup]
dir = "./backup"
"#
        .to_string()
    }

    fn write_config(dir: &tempfile::TempDir, content: &str) -> PathBuf {
        let path = dir.path().join("mirror.toml");
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn defaults_apply_without_export_section() {
        let tmp = tempfile::TempDir::new().unwrap();
        let config = load_config(&write_config(&tmp, &base_toml())).unwrap();
        assert_eq!(config.export.max_batch_size, 500);
        assert_eq!(config.export.parallelism, 10);
        assert_eq!(
            config.export.timestamp_field,
            "metadata_storage_last_modified"
        );
        assert_eq!(config.export.max_retries, 3);
        assert_eq!(config.export.timeout_secs, 30);
        assert!(config.export.start_date.is_none());
    }

    #[test]
    fn batch_size_over_api_ceiling_rejected() {
        let tmp = tempfile::TempDir::new().unwrap();
        let toml = format!("{}\n[export]\nmax_batch_size = 1001\n", base_toml());
        let err = load_config(&write_config(&tmp, &toml)).unwrap_err();
        assert!(err.to_string().contains("max_batch_size"));
    }

    #[test]
    fn zero_parallelism_rejected() {
        let tmp = tempfile::TempDir::new().unwrap();
        let toml = format!("{}\n[export]\nparallelism = 0\n", base_toml());
        assert!(load_config(&write_config(&tmp, &toml)).is_err());
    }

    #[test]
    fn malformed_date_rejected_at_load() {
        let tmp = tempfile::TempDir::new().unwrap();
        let toml = format!("{}\n[export]\nstart_date = \"01/02/2024\"\n", base_toml());
        let err = load_config(&write_config(&tmp, &toml)).unwrap_err();
        assert!(format!("{:#}", err).contains("YYYY-MM-DD"));
    }

    #[test]
    fn cli_range_overrides_config() {
        let config = ExportConfig {
            start_date: Some("2024-01-01".into()),
            end_date: Some("2024-02-01".into()),
            ..ExportConfig::default()
        };
        let (start, end) = config
            .resolve_range(Some("2024-03-01"), Some("2024-03-05"))
            .unwrap();
        assert_eq!(start, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert_eq!(end, NaiveDate::from_ymd_opt(2024, 3, 5).unwrap());
    }

    #[test]
    fn unset_range_is_empty_today() {
        let config = ExportConfig::default();
        let (start, end) = config.resolve_range(None, None).unwrap();
        assert_eq!(start, end);
    }

    #[test]
    fn inverted_range_rejected() {
        let config = ExportConfig::default();
        assert!(config
            .resolve_range(Some("2024-01-05"), Some("2024-01-01"))
            .is_err());
    }
}
