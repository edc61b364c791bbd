//! Run report for a sequential publish
//!
//! One entry per package, in publish order, so the report always shows
//! where a run stopped and what was left untouched.

use crate::core::error::SequenceError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What happened to one package during a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PackageStatus {
    Published,
    AlreadyPublished,
    Failed,
    NotAttempted,
}

/// Outcome for a single package
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageReport {
    pub package: String,
    /// Zero-based position in the publish order
    pub position: usize,
    pub status: PackageStatus,
    /// Time spent in the publish call, in milliseconds
    pub duration: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Report of a whole run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequenceReport {
    pub client: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub packages: Vec<PackageReport>,
    pub success: bool,
    #[serde(skip)]
    pub failure: Option<SequenceError>,
}

impl SequenceReport {
    pub fn count(&self, status: PackageStatus) -> usize {
        self.packages.iter().filter(|p| p.status == status).count()
    }

    pub fn with_status(&self, status: PackageStatus) -> impl Iterator<Item = &PackageReport> {
        self.packages.iter().filter(move |p| p.status == status)
    }

    /// The package the run stopped at, if it failed
    pub fn failed_package(&self) -> Option<&PackageReport> {
        self.with_status(PackageStatus::Failed).next()
    }

    /// Surface the first failure as an error
    pub fn ensure_success(&self) -> Result<(), SequenceError> {
        match &self.failure {
            Some(error) => Err(error.clone()),
            None if self.success => Ok(()),
            None => Err(SequenceError::PublishFailed {
                package: self
                    .failed_package()
                    .map(|p| p.package.clone())
                    .unwrap_or_else(|| "unknown".to_string()),
                message: "run did not complete".to_string(),
            }),
        }
    }

    /// Print run summary
    pub fn print_summary(&self) {
        println!("\n{}", "=".repeat(60));
        println!("📊 Publish Sequence Summary ({})", self.client);
        println!("{}", "=".repeat(60));

        let published = self.count(PackageStatus::Published);
        let already = self.count(PackageStatus::AlreadyPublished);
        println!("\n✅ Published: {}", published);
        for report in self.with_status(PackageStatus::Published) {
            println!("   - {} ({}ms)", report.package, report.duration);
        }

        if already > 0 {
            println!("\n⏩ Already published: {}", already);
            for report in self.with_status(PackageStatus::AlreadyPublished) {
                println!("   - {}", report.package);
            }
        }

        if let Some(failed) = self.failed_package() {
            println!("\n❌ Failed: {}", failed.package);
            if let Some(error) = &failed.error {
                println!("   {}", error);
            }
        }

        let not_attempted = self.count(PackageStatus::NotAttempted);
        if not_attempted > 0 {
            println!("\n⏭️  Not attempted: {}", not_attempted);
            for report in self.with_status(PackageStatus::NotAttempted) {
                println!("   - {}", report.package);
            }
        }

        let elapsed = (self.finished_at - self.started_at).num_seconds();
        println!("\n{}", "=".repeat(60));
        println!(
            "Overall Status: {} ({}s)",
            if self.success { "✅ SUCCESS" } else { "❌ FAILED" },
            elapsed
        );
        println!("{}\n", "=".repeat(60));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(package: &str, position: usize, status: PackageStatus) -> PackageReport {
        PackageReport {
            package: package.to_string(),
            position,
            status,
            duration: 0,
            output: None,
            error: None,
        }
    }

    fn report(packages: Vec<PackageReport>, failure: Option<SequenceError>) -> SequenceReport {
        let now = Utc::now();
        SequenceReport {
            client: "fake".to_string(),
            started_at: now,
            finished_at: now,
            success: failure.is_none(),
            packages,
            failure,
        }
    }

    #[test]
    fn test_counts_and_failed_package() {
        let report = report(
            vec![
                entry("a", 0, PackageStatus::Published),
                entry("b", 1, PackageStatus::Failed),
                entry("c", 2, PackageStatus::NotAttempted),
            ],
            Some(SequenceError::PublishFailed {
                package: "b".to_string(),
                message: "boom".to_string(),
            }),
        );

        assert_eq!(report.count(PackageStatus::Published), 1);
        assert_eq!(report.count(PackageStatus::NotAttempted), 1);
        assert_eq!(report.failed_package().unwrap().package, "b");

        let err = report.ensure_success().unwrap_err();
        assert_eq!(err.package(), Some("b"));
        assert_eq!(err.code(), "PUBLISH_FAILED");
    }

    #[test]
    fn test_ensure_success_ok() {
        let report = report(vec![entry("a", 0, PackageStatus::Published)], None);
        assert!(report.ensure_success().is_ok());
        assert!(report.failed_package().is_none());
    }

    #[test]
    fn test_json_serialization() {
        let report = report(
            vec![entry("a", 0, PackageStatus::AlreadyPublished)],
            None,
        );

        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains(r#""status":"ALREADY_PUBLISHED""#));
        assert!(json.contains(r#""success":true"#));
        assert!(!json.contains("failure"));
    }
}
