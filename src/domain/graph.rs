//! Dependency-graph scan service contract.
//!
//! The graph-build service itself is an external collaborator; this module
//! only models the request/response shapes the engine consumes: issue lists
//! with component membership for counting, and the CVE ids feeding the
//! applicability allow-list.

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::application::progress::GraphScanProgress;
use crate::domain::results::Descriptor;

/// Errors from the dependency-graph service.
#[derive(Debug, thiserror::Error)]
pub enum GraphScanError {
    #[error("scan was cancelled")]
    Cancelled,

    #[error("descriptor '{0}' is not installed")]
    NotInstalled(String),

    #[error("dependency graph scan failed: {0}")]
    Service(String),
}

/// Async client for the dependency-graph scan service.
///
/// Implementations report incremental progress through the supplied adapter
/// and observe the cancellation token at their own suspension points.
#[async_trait]
pub trait DependencyGraphClient: Send + Sync {
    async fn scan(
        &self,
        descriptor: &Descriptor,
        progress: &mut GraphScanProgress,
        cancel: &CancellationToken,
    ) -> Result<GraphScanResponse, GraphScanError>;
}

/// A flat graph-scan request: the root component plus its unique dependencies.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphScanRequest {
    pub component_id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nodes: Vec<GraphRequestNode>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphRequestNode {
    pub component_id: String,
}

impl GraphScanRequest {
    /// Build a request from a root component and its (possibly repeated)
    /// transitive component ids. Duplicate entries are dropped to keep the
    /// payload small.
    pub fn from_components<I>(component_id: impl Into<String>, components: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        let unique: BTreeSet<String> = components.into_iter().map(Into::into).collect();
        Self {
            component_id: component_id.into(),
            nodes: unique
                .into_iter()
                .map(|component_id| GraphRequestNode { component_id })
                .collect(),
        }
    }
}

/// Response of a graph scan: violations when a policy context was supplied,
/// plain vulnerabilities otherwise.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphScanResponse {
    #[serde(default)]
    pub violations: Vec<GraphIssue>,
    #[serde(default)]
    pub vulnerabilities: Vec<GraphIssue>,
}

impl GraphScanResponse {
    /// The issue list to consume: violations take precedence when present.
    pub fn issues(&self) -> &[GraphIssue] {
        if self.violations.is_empty() {
            &self.vulnerabilities
        } else {
            &self.violations
        }
    }

    pub fn issue_count(&self) -> usize {
        self.issues().len()
    }

    /// Unique CVE ids across the consumed issue list, in first-seen order.
    pub fn cve_ids(&self) -> Vec<String> {
        let mut seen: BTreeSet<&str> = BTreeSet::new();
        let mut ids = Vec::new();
        for issue in self.issues() {
            for cve in issue.cves.iter().filter_map(|cve| cve.cve.as_deref()) {
                if seen.insert(cve) {
                    ids.push(cve.to_string());
                }
            }
        }
        ids
    }
}

/// A single violation or vulnerability reported by the graph service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphIssue {
    #[serde(default)]
    pub issue_id: String,
    #[serde(default)]
    pub severity: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub cves: Vec<GraphCve>,
    /// Vulnerable components this issue applies to, keyed by component id.
    #[serde(default)]
    pub components: BTreeMap<String, GraphComponent>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphCve {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cve: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphComponent {
    #[serde(default)]
    pub fixed_versions: Vec<String>,
}
