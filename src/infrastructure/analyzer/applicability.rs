//! CVE applicability scanner: runner and response normalization.
//!
//! Applicability rule ids embed the CVE they check for; the normalizer
//! extracts the CVE id for grouping and tracks the full set of scanned CVEs
//! separately from the subset found applicable.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use crate::config::ApplicabilityScannerConfig;
use crate::domain::results::{ApplicabilityScanResult, CveApplicableDetails, FileEvidence};

use super::models::AnalyzerResponse;
use super::normalize;
use super::request::{ScanRequest, ScanType};
use super::runner;
use super::{AnalyzerError, AnalyzerExecutor};

/// Marker token that starts the CVE id inside an applicability rule id.
const CVE_MARKER: &str = "CVE";

/// Extract the CVE id encoded in an applicability rule id.
///
/// The id is the suffix starting at the marker token; a rule id without the
/// marker is used as-is.
pub fn cve_from_rule_id(rule_id: &str) -> &str {
    match rule_id.find(CVE_MARKER) {
        Some(start) => &rule_id[start..],
        None => rule_id,
    }
}

/// Runner for the applicability verb of the analyzer.
pub struct ApplicabilityRunner {
    executor: Arc<dyn AnalyzerExecutor>,
}

impl ApplicabilityRunner {
    pub fn new(executor: Arc<dyn AnalyzerExecutor>) -> Self {
        Self { executor }
    }

    /// Determine which of the given CVEs are applicable in the scanned roots.
    #[instrument(skip(self, config, cancel), fields(cve_count = cve_allow_list.len()))]
    pub async fn scan(
        &self,
        roots: Vec<String>,
        cve_allow_list: Vec<String>,
        config: &ApplicabilityScannerConfig,
        cancel: &CancellationToken,
    ) -> Result<ApplicabilityScanResult, AnalyzerError> {
        let mut request = ScanRequest::new(ScanType::Applicability, roots);
        request.cve_whitelist = Some(cve_allow_list);
        request.skipped_folders = config.skip_folders.clone();
        request.grep_disable = Some(config.grep_disable);
        debug!(roots = ?request.roots, "Scanning directories for CVE applicability");

        let response = runner::run_contained(&*self.executor, request, cancel).await?;
        Ok(Self::normalize(response.as_ref()))
    }

    /// Normalize a raw analyzer response into an applicability result.
    ///
    /// Every rule in the catalog marks its CVE as scanned; every raw issue
    /// marks its CVE as applicable, with the issue message as the fix reason
    /// and its locations grouped per file as evidence.
    pub fn normalize(response: Option<&AnalyzerResponse>) -> ApplicabilityScanResult {
        let mut result = ApplicabilityScanResult::default();
        let Some(run) = response.and_then(|response| response.runs.first()) else {
            return result;
        };
        debug!(driver = %run.tool.driver.name, "Generating applicability response");

        let descriptions = normalize::rule_descriptions(run);
        result.scanned_cves = run
            .tool
            .driver
            .rules
            .iter()
            .map(|rule| cve_from_rule_id(&rule.id).to_string())
            .collect();

        for issue in &run.results {
            if issue.is_suppressed() {
                result.ignored_count += 1;
                continue;
            }
            let cve_id = cve_from_rule_id(&issue.rule_id).to_string();
            if !result.scanned_cves.iter().any(|cve| cve == &cve_id) {
                result.scanned_cves.push(cve_id.clone());
            }

            // A repeated issue with the same fix reason extends the existing
            // details; a different reason replaces them.
            let replace = result
                .applicable_cves
                .get(&cve_id)
                .map_or(true, |details| details.fix_reason != issue.message.text);
            if replace {
                result.applicable_cves.insert(
                    cve_id.clone(),
                    CveApplicableDetails {
                        fix_reason: issue.message.text.clone(),
                        full_description: descriptions.get(issue.rule_id.as_str()).cloned(),
                        file_evidences: Vec::new(),
                    },
                );
            }
            if let Some(details) = result.applicable_cves.get_mut(&cve_id) {
                for location in &issue.locations {
                    let Some(uri) = location.file_uri() else {
                        continue;
                    };
                    let evidence = evidence_entry(&mut details.file_evidences, uri);
                    evidence.locations.push(location.region().clone());
                }
            }
        }
        result
    }
}

/// Resolve the evidence entry for a file path, creating it on first sight.
fn evidence_entry<'a>(
    evidences: &'a mut Vec<FileEvidence>,
    full_path: &str,
) -> &'a mut FileEvidence {
    let index = match evidences
        .iter()
        .position(|evidence| evidence.full_path == full_path)
    {
        Some(index) => index,
        None => {
            evidences.push(FileEvidence {
                full_path: full_path.to_string(),
                locations: Vec::new(),
            });
            evidences.len() - 1
        }
    };
    &mut evidences[index]
}
