//! Analyzer scan request and its wire encoding.
//!
//! A request is immutable once built: one per analyzer invocation. The wire
//! format is YAML with the requests nested under a top-level `scans` list.
//! A handful of keys use hyphens on the wire while the in-memory model uses
//! underscores; that renaming is one fixed post-processing pass over the
//! serialized text, not per-field serde attributes.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::AnalyzerError;

/// Scanner family, as both dispatch key and wire identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScanType {
    #[serde(rename = "analyze-applicability")]
    Applicability,
    #[serde(rename = "sast")]
    Sast,
    #[serde(rename = "iac-scan-modules")]
    Iac,
    #[serde(rename = "secrets-scan")]
    Secrets,
}

impl ScanType {
    /// The analyzer CLI verb for this scanner family.
    pub fn verb(&self) -> &'static str {
        match self {
            ScanType::Applicability => "applicability",
            ScanType::Sast => "sast",
            ScanType::Iac => "iac",
            ScanType::Secrets => "secrets",
        }
    }
}

impl fmt::Display for ScanType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScanType::Applicability => "Applicability",
            ScanType::Sast => "SAST",
            ScanType::Iac => "IaC",
            ScanType::Secrets => "Secrets",
        };
        f.write_str(name)
    }
}

/// One scanner invocation request.
#[derive(Debug, Clone, Serialize)]
pub struct ScanRequest {
    #[serde(rename = "type")]
    pub scan_type: ScanType,
    /// Path the analyzer writes its response to.
    pub output: String,
    /// Folders the scan runs inside.
    pub roots: Vec<String>,
    /// Glob patterns for files that must be skipped.
    pub skipped_folders: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub excluded_rules: Vec<String>,
    /// CVE allow-list for applicability scans; present (possibly empty) only
    /// for that family.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cve_whitelist: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grep_disable: Option<bool>,
}

impl ScanRequest {
    pub fn new(scan_type: ScanType, roots: Vec<String>) -> Self {
        Self {
            scan_type,
            output: String::new(),
            roots,
            skipped_folders: Vec::new(),
            language: None,
            excluded_rules: Vec::new(),
            cve_whitelist: None,
            grep_disable: None,
        }
    }
}

/// Wrapper matching the wire format's top-level `scans` list.
#[derive(Serialize)]
struct AnalyzerRequest<'a> {
    scans: &'a [ScanRequest],
}

/// Keys renamed on the wire, applied after generic serialization.
const WIRE_KEY_RENAMES: [(&str, &str); 3] = [
    ("skipped_folders", "skipped-folders"),
    ("excluded_rules", "excluded-rules"),
    ("cve_whitelist", "cve-whitelist"),
];

/// Encode scan requests into the analyzer's YAML configuration format.
///
/// Deterministic: the same requests always produce the same text.
pub fn encode_requests(requests: &[ScanRequest]) -> Result<String, AnalyzerError> {
    let yaml = serde_yml::to_string(&AnalyzerRequest { scans: requests })?;
    Ok(WIRE_KEY_RENAMES
        .iter()
        .fold(yaml, |text, (from, to)| text.replace(from, to)))
}
