//! Final run summaries.
//!
//! Each stage collects explicit per-job outcomes and renders one aligned
//! report at the end, so success and failure counts are readable in one
//! place instead of scattered through interleaved diagnostics. Failures
//! carried here also decide the process exit code.

use crate::export::DayOutcome;
use crate::restore::UploadOutcome;

pub struct BackupSummary {
    pub index: String,
    pub endpoint: String,
    pub schema_saved: bool,
    pub key_field: Option<String>,
    /// Whole-index count reported by the source, when available.
    /// Informational: the export range may be a strict subset of the
    /// index, so this is printed next to the exported total rather than
    /// asserted against it.
    pub source_doc_count: Option<i64>,
    pub range: (chrono::NaiveDate, chrono::NaiveDate),
    pub days: Vec<DayOutcome>,
}

impl BackupSummary {
    pub fn documents(&self) -> usize {
        self.days.iter().map(|d| d.documents).sum()
    }

    pub fn files(&self) -> usize {
        self.days.iter().map(|d| d.files_written).sum()
    }

    pub fn failed_days(&self) -> Vec<&DayOutcome> {
        self.days.iter().filter(|d| d.error.is_some()).collect()
    }

    pub fn print(&self) {
        println!();
        println!("Backup — {} @ {}", self.index, self.endpoint);
        println!("{}", "=".repeat(60));
        println!(
            "  Range:      {} → {} ({} day{})",
            self.range.0,
            self.range.1,
            self.days.len(),
            plural(self.days.len())
        );
        println!(
            "  Schema:     {}",
            if self.schema_saved { "saved" } else { "NOT saved" }
        );
        if let Some(key) = &self.key_field {
            println!("  Key field:  {}", key);
        }
        println!("  Files:      {}", format_number(self.files() as u64));
        println!("  Documents:  {}", format_number(self.documents() as u64));
        if let Some(total) = self.source_doc_count {
            println!(
                "  Source total: {} (whole index, informational)",
                format_number(total.max(0) as u64)
            );
        }

        let failed = self.failed_days();
        if !failed.is_empty() {
            println!("  Failed days: {}", failed.len());
            for outcome in failed {
                if let Some(error) = &outcome.error {
                    println!("    {}  {}", outcome.day, error);
                }
            }
        }
        println!();
    }
}

#[derive(Debug)]
pub struct RestoreSummary {
    pub index: String,
    pub endpoint: String,
    pub deleted_existing: bool,
    pub uploads: Vec<UploadOutcome>,
}

impl RestoreSummary {
    pub fn documents(&self) -> usize {
        self.uploads
            .iter()
            .filter(|u| u.error.is_none())
            .map(|u| u.documents)
            .sum()
    }

    pub fn failed_uploads(&self) -> Vec<&UploadOutcome> {
        self.uploads.iter().filter(|u| u.error.is_some()).collect()
    }

    pub fn print(&self) {
        println!();
        println!("Restore — {} @ {}", self.index, self.endpoint);
        println!("{}", "=".repeat(60));
        println!(
            "  Index:      {}",
            if self.deleted_existing {
                "recreated (previous index deleted)"
            } else {
                "created"
            }
        );
        println!(
            "  Files:      {}",
            format_number(self.uploads.len() as u64)
        );
        println!("  Documents:  {}", format_number(self.documents() as u64));

        let failed = self.failed_uploads();
        if !failed.is_empty() {
            println!("  Failed files: {}", failed.len());
            for outcome in failed {
                if let Some(error) = &outcome.error {
                    println!("    {}", error);
                }
            }
        }
        println!();
    }
}

fn plural(n: usize) -> &'static str {
    if n == 1 {
        ""
    } else {
        "s"
    }
}

fn format_number(n: u64) -> String {
    let digits = n.to_string();
    let mut result = String::with_capacity(digits.len() + digits.len() / 3);
    let chars: Vec<char> = digits.chars().rev().collect();
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(*c);
    }
    result.chars().rev().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MirrorError;
    use chrono::NaiveDate;

    #[test]
    fn format_number_groups_thousands() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(1_234_567), "1,234,567");
    }

    #[test]
    fn backup_totals_span_days_and_track_failures() {
        let day = |d: u32| NaiveDate::from_ymd_opt(2024, 1, d).unwrap();
        let summary = BackupSummary {
            index: "idx".into(),
            endpoint: "https://src.example.net".into(),
            schema_saved: true,
            key_field: Some("id".into()),
            source_doc_count: Some(9),
            range: (day(1), day(4)),
            days: vec![
                DayOutcome {
                    day: day(1),
                    files_written: 2,
                    documents: 3,
                    error: None,
                },
                DayOutcome {
                    day: day(2),
                    files_written: 0,
                    documents: 0,
                    error: None,
                },
                DayOutcome {
                    day: day(3),
                    files_written: 1,
                    documents: 2,
                    error: Some(MirrorError::Query {
                        index: "idx".into(),
                        skip: 500,
                        reason: "timeout".into(),
                    }),
                },
            ],
        };
        assert_eq!(summary.files(), 3);
        assert_eq!(summary.documents(), 5);
        assert_eq!(summary.failed_days().len(), 1);
        assert_eq!(summary.failed_days()[0].day, day(3));
    }

    #[test]
    fn restore_counts_exclude_failed_files() {
        let summary = RestoreSummary {
            index: "idx-copy".into(),
            endpoint: "https://dst.example.net".into(),
            deleted_existing: false,
            uploads: vec![
                UploadOutcome {
                    path: "idx-2024-01-01-0.json".into(),
                    documents: 2,
                    error: None,
                },
                UploadOutcome {
                    path: "idx-2024-01-01-1.json".into(),
                    documents: 1,
                    error: Some(MirrorError::Upload {
                        path: "idx-2024-01-01-1.json".into(),
                        index: "idx-copy".into(),
                        reason: "HTTP 503".into(),
                    }),
                },
            ],
        };
        assert_eq!(summary.documents(), 2);
        assert_eq!(summary.failed_uploads().len(), 1);
    }
}
