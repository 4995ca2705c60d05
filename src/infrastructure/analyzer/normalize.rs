//! Normalization steps shared by the scanner families.
//!
//! All families walk the same two structures: the run's rule catalog (for
//! names and descriptions) and its raw issue list (grouped into files and
//! deduplicated by rule id). The grouping is idempotent and commutative by
//! file + rule id, so processing order never affects the final result.

use std::collections::HashMap;

use crate::domain::findings::{file_entry, FileFindings, SecurityIssue};
use crate::domain::results::SecurityScanResult;
use crate::domain::severity::Severity;

use super::models::{AnalyzerResponse, AnalyzerRun, RawIssue};

/// Collect the full description of every rule in a run's catalog, keyed by
/// rule id. The map is local to one normalization call, never shared.
pub fn rule_descriptions(run: &AnalyzerRun) -> HashMap<String, String> {
    run.tool
        .driver
        .rules
        .iter()
        .filter_map(|rule| {
            rule.full_description
                .as_ref()
                .map(|description| (rule.id.clone(), description.text.clone()))
        })
        .collect()
}

/// Merge one raw issue into the grouped file list.
///
/// Each of the issue's locations resolves (or creates) the findings entry for
/// its file and the issue entry for its rule id within that file, then
/// appends the location's region. Locations without a file are skipped.
pub fn record_security_issue(
    files: &mut Vec<FileFindings<SecurityIssue>>,
    raw: &RawIssue,
    full_description: Option<&str>,
) {
    for location in &raw.locations {
        let Some(uri) = location.file_uri() else {
            continue;
        };
        let file = file_entry(files, uri);
        let issue = file.issue_entry(&raw.rule_id, || SecurityIssue {
            rule_id: raw.rule_id.clone(),
            rule_name: raw.message.text.clone(),
            severity: Severity::from_level(raw.level.as_deref()),
            full_description: full_description.map(str::to_string),
            locations: Vec::new(),
        });
        issue.locations.push(location.region().clone());
    }
}

/// Normalize a whole response into a grouped security-issue result.
///
/// An absent response (the analyzer run failed entirely) and a response with
/// no runs both produce an explicitly empty result, not an error.
pub fn normalize_security_response(response: Option<&AnalyzerResponse>) -> SecurityScanResult {
    let mut result = SecurityScanResult::default();
    let Some(response) = response else {
        return result;
    };
    for run in &response.runs {
        let descriptions = rule_descriptions(run);
        for issue in &run.results {
            if issue.is_suppressed() {
                result.ignored_count += 1;
                continue;
            }
            record_security_issue(
                &mut result.files_with_issues,
                issue,
                descriptions.get(issue.rule_id.as_str()).map(String::as_str),
            );
        }
    }
    result
}
