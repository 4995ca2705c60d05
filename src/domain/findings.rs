//! Normalized finding model.
//!
//! Every scanner family reduces its raw analyzer output to the same grouped
//! shape: files, each holding at most one issue per rule, each issue holding
//! the regions it was reported at. The grouping helpers here enforce the two
//! uniqueness invariants (one entry per file path, one issue per rule id per
//! file) so that normalization is idempotent regardless of the order raw
//! issues arrive in.
//!
//! Region coordinates are analyzer-native and 1-based; translation to 0-based
//! editor coordinates happens at the presentation boundary, not here.

use serde::{Deserialize, Serialize};

use crate::domain::severity::Severity;

/// A region inside a file, 1-based, inclusive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Region {
    #[serde(default)]
    pub start_line: u32,
    #[serde(default)]
    pub end_line: u32,
    #[serde(default)]
    pub start_column: u32,
    #[serde(default)]
    pub end_column: u32,
    /// Code snippet covering the region, when the analyzer provides one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet: Option<Snippet>,
}

/// Snippet text as the analyzer reports it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snippet {
    #[serde(default)]
    pub text: String,
}

impl Region {
    pub fn new(start_line: u32, start_column: u32, end_line: u32, end_column: u32) -> Self {
        Self {
            start_line,
            end_line,
            start_column,
            end_column,
            snippet: None,
        }
    }

    /// Coordinate equality only; the snippet is presentation data.
    pub fn same_position(&self, other: &Region) -> bool {
        self.start_line == other.start_line
            && self.end_line == other.end_line
            && self.start_column == other.start_column
            && self.end_column == other.end_column
    }
}

/// One hop of a code-flow trace: a file plus the region inside it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileLocation {
    pub file: String,
    pub region: Region,
}

/// Lookup key shared by all issue kinds grouped under a file.
pub trait RuleKeyed {
    fn rule_id(&self) -> &str;
    fn severity(&self) -> Severity;
}

/// A security issue (IaC, secrets) at one or more regions of a single file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityIssue {
    pub rule_id: String,
    pub rule_name: String,
    pub severity: Severity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_description: Option<String>,
    pub locations: Vec<Region>,
}

impl RuleKeyed for SecurityIssue {
    fn rule_id(&self) -> &str {
        &self.rule_id
    }

    fn severity(&self) -> Severity {
        self.severity
    }
}

/// A SAST issue. Unlike [`SecurityIssue`], each location may carry the
/// code-flow traces whose final hop lands exactly on it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SastIssue {
    pub rule_id: String,
    pub rule_name: String,
    pub severity: Severity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_description: Option<String>,
    pub locations: Vec<SastLocation>,
}

impl RuleKeyed for SastIssue {
    fn rule_id(&self) -> &str {
        &self.rule_id
    }

    fn severity(&self) -> Severity {
        self.severity
    }
}

/// A SAST issue location with the ordered code-flow chains attached to it.
///
/// A single issue can have one location with a multi-hop trace and another
/// location with none.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SastLocation {
    pub region: Region,
    #[serde(default)]
    pub thread_flows: Vec<Vec<FileLocation>>,
}

/// All issues of one kind found in a single file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileFindings<I> {
    pub full_path: String,
    pub issues: Vec<I>,
}

impl<I> FileFindings<I> {
    pub fn new(full_path: impl Into<String>) -> Self {
        Self {
            full_path: full_path.into(),
            issues: Vec::new(),
        }
    }
}

impl<I: RuleKeyed> FileFindings<I> {
    /// Resolve the issue for `rule_id`, creating it on first sight.
    ///
    /// Repeated raw issues with the same rule id in the same file merge into
    /// one entry; they must never duplicate.
    pub fn issue_entry(&mut self, rule_id: &str, create: impl FnOnce() -> I) -> &mut I {
        let index = match self.issues.iter().position(|issue| issue.rule_id() == rule_id) {
            Some(index) => index,
            None => {
                self.issues.push(create());
                self.issues.len() - 1
            }
        };
        &mut self.issues[index]
    }

    /// Maximum severity among the issues of this file.
    pub fn top_severity(&self) -> Severity {
        Severity::roll_up(self.issues.iter().map(|issue| issue.severity()))
    }
}

/// Resolve the findings entry for a file path, creating it on first sight.
///
/// At most one entry exists per distinct path within a single response.
pub fn file_entry<'a, I>(
    files: &'a mut Vec<FileFindings<I>>,
    full_path: &str,
) -> &'a mut FileFindings<I> {
    let index = match files.iter().position(|file| file.full_path == full_path) {
        Some(index) => index,
        None => {
            files.push(FileFindings::new(full_path));
            files.len() - 1
        }
    };
    &mut files[index]
}
