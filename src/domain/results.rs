//! Per-workspace scan result aggregate.
//!
//! [`ScanResults`] is created empty when a workspace scan starts, populated
//! incrementally as each scanner task completes, and persisted through the
//! result cache at scan end. The next scan replaces it wholesale; results are
//! never merged across scans.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::findings::{FileFindings, Region, RuleKeyed, SastIssue, SecurityIssue};
use crate::domain::graph::GraphScanResponse;
use crate::domain::severity::Severity;

/// Package manager family of a dependency descriptor.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum PackageType {
    Go,
    Maven,
    Npm,
    Yarn,
    Nuget,
    Python,
}

impl fmt::Display for PackageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PackageType::Go => "Go",
            PackageType::Maven => "Maven",
            PackageType::Npm => "Npm",
            PackageType::Yarn => "Yarn",
            PackageType::Nuget => "Nuget",
            PackageType::Python => "Python",
        };
        f.write_str(name)
    }
}

/// A dependency descriptor file discovered in the workspace.
///
/// Discovery itself happens outside this crate; the orchestrator only
/// consumes the located descriptors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Descriptor {
    pub name: String,
    pub full_path: String,
    pub package_type: PackageType,
    /// Root component id of the descriptor's dependency graph.
    pub component_id: String,
}

/// A file that errored during the scan, with the classified reason surfaced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedFileRecord {
    pub full_path: String,
    pub reason: String,
}

/// Normalized output of one whole-workspace source-code scanner run.
///
/// An absent result means the scanner was never attempted; an empty one means
/// it ran and found nothing. The two are distinct downstream.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceCodeScanResult<I> {
    pub files_with_issues: Vec<FileFindings<I>>,
    /// Number of raw issues excluded because they carried suppressions.
    pub ignored_count: u32,
    pub timestamp: Option<DateTime<Utc>>,
}

impl<I: RuleKeyed> SourceCodeScanResult<I> {
    pub fn has_issues(&self) -> bool {
        !self.files_with_issues.is_empty()
    }

    pub fn issue_count(&self) -> usize {
        self.files_with_issues
            .iter()
            .map(|file| file.issues.len())
            .sum()
    }

    pub fn top_severity(&self) -> Severity {
        Severity::roll_up(self.files_with_issues.iter().map(FileFindings::top_severity))
    }
}

pub type SastScanResult = SourceCodeScanResult<SastIssue>;
pub type SecurityScanResult = SourceCodeScanResult<SecurityIssue>;

/// Applicability of a known CVE to the scanned workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CveApplicability {
    Applicable,
    NotApplicable,
    /// The CVE was never part of an applicability scan.
    Unknown,
}

/// Evidence for an applicable CVE inside one file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEvidence {
    pub full_path: String,
    pub locations: Vec<Region>,
}

/// Details of a CVE determined to be applicable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CveApplicableDetails {
    pub fix_reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_description: Option<String>,
    pub file_evidences: Vec<FileEvidence>,
}

/// Outcome of a CVE applicability scan.
///
/// `scanned_cves` holds every CVE the analyzer evaluated; the subset with an
/// entry in `applicable_cves` is applicable, the rest is not. A CVE absent
/// from both has unknown applicability.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApplicabilityScanResult {
    pub scanned_cves: Vec<String>,
    pub applicable_cves: BTreeMap<String, CveApplicableDetails>,
    pub ignored_count: u32,
}

impl ApplicabilityScanResult {
    pub fn applicability(&self, cve_id: &str) -> CveApplicability {
        if self.applicable_cves.contains_key(cve_id) {
            CveApplicability::Applicable
        } else if self.scanned_cves.iter().any(|cve| cve == cve_id) {
            CveApplicability::NotApplicable
        } else {
            CveApplicability::Unknown
        }
    }
}

/// Scan results for one dependency descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependencyScanResults {
    pub name: String,
    pub full_path: String,
    pub package_type: PackageType,
    pub graph_scan: GraphScanResponse,
    pub graph_scan_timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub applicability: Option<ApplicabilityScanResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub applicability_timestamp: Option<DateTime<Utc>>,
}

impl DependencyScanResults {
    pub fn issue_count(&self) -> usize {
        self.graph_scan.issue_count()
    }
}

/// All the issue data of a single workspace scan.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanResults {
    pub path: String,
    pub descriptors_issues: Vec<DependencyScanResults>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sast: Option<SastScanResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iac: Option<SecurityScanResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secrets: Option<SecurityScanResult>,
    pub failed_files: Vec<FailedFileRecord>,
}

impl ScanResults {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// True when at least one issue exists in any scanner section.
    pub fn has_issues(&self) -> bool {
        !self.descriptors_issues.is_empty()
            || self.sast.as_ref().is_some_and(SourceCodeScanResult::has_issues)
            || self.iac.as_ref().is_some_and(SourceCodeScanResult::has_issues)
            || self
                .secrets
                .as_ref()
                .is_some_and(SourceCodeScanResult::has_issues)
    }

    /// True when the scan produced anything worth keeping: issues or failures.
    pub fn has_information(&self) -> bool {
        self.has_issues() || !self.failed_files.is_empty()
    }

    pub fn issue_count(&self) -> usize {
        let sast = self.sast.as_ref().map_or(0, SourceCodeScanResult::issue_count);
        let iac = self.iac.as_ref().map_or(0, SourceCodeScanResult::issue_count);
        let secrets = self
            .secrets
            .as_ref()
            .map_or(0, SourceCodeScanResult::issue_count);
        let dependencies: usize = self
            .descriptors_issues
            .iter()
            .map(DependencyScanResults::issue_count)
            .sum();
        sast + iac + secrets + dependencies
    }

    /// Total number of suppressed issues across the source-code scanners.
    pub fn ignored_count(&self) -> u32 {
        self.sast.as_ref().map_or(0, |s| s.ignored_count)
            + self.iac.as_ref().map_or(0, |s| s.ignored_count)
            + self.secrets.as_ref().map_or(0, |s| s.ignored_count)
    }

    pub fn top_severity(&self) -> Severity {
        let sast = self.sast.as_ref().map_or(Severity::Unknown, SourceCodeScanResult::top_severity);
        let iac = self.iac.as_ref().map_or(Severity::Unknown, SourceCodeScanResult::top_severity);
        let secrets = self
            .secrets
            .as_ref()
            .map_or(Severity::Unknown, SourceCodeScanResult::top_severity);
        Severity::roll_up([sast, iac, secrets])
    }

    /// Oldest timestamp across the per-category scans, for "last scanned"
    /// display purposes.
    pub fn oldest_scan_timestamp(&self) -> Option<DateTime<Utc>> {
        let mut timestamps: Vec<DateTime<Utc>> = Vec::new();
        timestamps.extend(self.sast.as_ref().and_then(|scan| scan.timestamp));
        timestamps.extend(self.iac.as_ref().and_then(|scan| scan.timestamp));
        timestamps.extend(self.secrets.as_ref().and_then(|scan| scan.timestamp));
        timestamps.extend(
            self.descriptors_issues
                .iter()
                .map(|descriptor| descriptor.graph_scan_timestamp),
        );
        timestamps.into_iter().min()
    }
}
