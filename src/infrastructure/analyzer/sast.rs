//! SAST scanner: runner and response normalization.
//!
//! On top of the shared grouping, SAST reconstructs multi-hop code-flow
//! traces: a thread flow belongs to an issue location when the flow's *last*
//! hop lands on exactly that file and region.

use std::sync::Arc;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use crate::config::ScannersConfig;
use crate::domain::findings::{file_entry, FileFindings, FileLocation, SastIssue, SastLocation};
use crate::domain::results::SastScanResult;
use crate::domain::severity::Severity;

use super::models::{AnalyzerResponse, CodeFlow, RawIssue};
use super::normalize;
use super::request::{ScanRequest, ScanType};
use super::runner;
use super::{AnalyzerError, AnalyzerExecutor};

/// Runner for the SAST verb of the analyzer.
pub struct SastRunner {
    executor: Arc<dyn AnalyzerExecutor>,
}

impl SastRunner {
    pub fn new(executor: Arc<dyn AnalyzerExecutor>) -> Self {
        Self { executor }
    }

    /// Scan the given roots for SAST issues.
    #[instrument(skip(self, config, cancel))]
    pub async fn scan(
        &self,
        roots: Vec<String>,
        config: &ScannersConfig,
        cancel: &CancellationToken,
    ) -> Result<SastScanResult, AnalyzerError> {
        let mut request = ScanRequest::new(ScanType::Sast, roots);
        request.skipped_folders = config.exclude_patterns.clone();
        request.language = config.sast.language.clone();
        request.excluded_rules = config.sast.excluded_rules.clone();
        debug!(
            roots = ?request.roots,
            skipped = ?request.skipped_folders,
            "Scanning directories for SAST issues"
        );

        let response = runner::run_contained(&*self.executor, request, cancel).await?;
        let mut result = Self::normalize(response.as_ref());
        result.timestamp = Some(Utc::now());
        Ok(result)
    }

    /// Normalize a raw analyzer response into grouped SAST findings.
    pub fn normalize(response: Option<&AnalyzerResponse>) -> SastScanResult {
        let mut result = SastScanResult::default();
        let Some(response) = response else {
            return result;
        };
        for run in &response.runs {
            let descriptions = normalize::rule_descriptions(run);
            for issue in &run.results {
                if issue.is_suppressed() {
                    result.ignored_count += 1;
                    continue;
                }
                Self::record_issue(
                    &mut result.files_with_issues,
                    issue,
                    descriptions.get(issue.rule_id.as_str()).map(String::as_str),
                );
            }
        }
        result
    }

    fn record_issue(
        files: &mut Vec<FileFindings<SastIssue>>,
        raw: &RawIssue,
        full_description: Option<&str>,
    ) {
        for location in &raw.locations {
            let Some(uri) = location.file_uri() else {
                continue;
            };
            let uri = uri.to_string();
            let file = file_entry(files, &uri);
            let issue = file.issue_entry(&raw.rule_id, || SastIssue {
                rule_id: raw.rule_id.clone(),
                rule_name: raw.message.text.clone(),
                severity: Severity::from_level(raw.level.as_deref()),
                full_description: full_description.map(str::to_string),
                locations: Vec::new(),
            });

            let mut sast_location = SastLocation {
                region: location.region().clone(),
                thread_flows: Vec::new(),
            };
            attach_code_flows(&uri, &mut sast_location, &raw.code_flows);
            issue.locations.push(sast_location);
        }
    }
}

/// Attach the thread flows that terminate at `location`.
///
/// The last hop of a flow must match the location's file and region exactly;
/// a flow ending anywhere else attaches to nothing. Hops without an artifact
/// location are skipped.
fn attach_code_flows(file_path: &str, location: &mut SastLocation, code_flows: &[CodeFlow]) {
    for code_flow in code_flows {
        for thread_flow in &code_flow.thread_flows {
            let Some(last) = thread_flow
                .locations
                .last()
                .and_then(|hop| hop.location.as_ref())
            else {
                continue;
            };
            let Some(last_uri) = last.file_uri() else {
                continue;
            };
            if last_uri != file_path || !last.region().same_position(&location.region) {
                continue;
            }
            let chain: Vec<FileLocation> = thread_flow
                .locations
                .iter()
                .filter_map(|hop| hop.location.as_ref())
                .filter_map(|hop| {
                    hop.file_uri().map(|uri| FileLocation {
                        file: uri.to_string(),
                        region: hop.region().clone(),
                    })
                })
                .collect();
            location.thread_flows.push(chain);
        }
    }
}
