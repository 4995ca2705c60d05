//! Shared fakes and canned analyzer responses.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use scanforge::application::progress::GraphScanProgress;
use scanforge::domain::graph::{
    DependencyGraphClient, GraphCve, GraphIssue, GraphScanError, GraphScanResponse,
};
use scanforge::domain::results::Descriptor;
use scanforge::infrastructure::analyzer::ProcessOutput;
use scanforge::{AnalyzerError, AnalyzerExecutor, EntitlementProvider, ScanType};

/// How the fake analyzer reacts to one scanner family.
pub enum AnalyzerBehavior {
    /// Write this JSON to the output path named in the request.
    Respond(String),
    /// Exit with the not-entitled code.
    NotEntitled,
    /// The binary is missing.
    NotInstalled,
    /// Crash with a generic process failure.
    Crash,
    /// Block until the cancellation token trips.
    HangUntilCancelled,
}

/// Analyzer executor double: per-family canned behavior, defaulting to an
/// empty response.
pub struct FakeAnalyzer {
    behaviors: HashMap<ScanType, AnalyzerBehavior>,
    pub executed: Mutex<Vec<ScanType>>,
}

impl FakeAnalyzer {
    pub fn new() -> Self {
        Self {
            behaviors: HashMap::new(),
            executed: Mutex::new(Vec::new()),
        }
    }

    pub fn with_behavior(mut self, scan_type: ScanType, behavior: AnalyzerBehavior) -> Self {
        self.behaviors.insert(scan_type, behavior);
        self
    }
}

/// Resolve the response path the request points the analyzer at.
pub fn output_path_of(config_path: &Path) -> PathBuf {
    let raw = std::fs::read_to_string(config_path).expect("request file exists");
    let value: serde_yml::Value = serde_yml::from_str(&raw).expect("request is valid YAML");
    PathBuf::from(
        value["scans"][0]["output"]
            .as_str()
            .expect("request names an output path"),
    )
}

#[async_trait]
impl AnalyzerExecutor for FakeAnalyzer {
    async fn execute(
        &self,
        scan_type: ScanType,
        config_path: &Path,
        cancel: &CancellationToken,
    ) -> Result<ProcessOutput, AnalyzerError> {
        if cancel.is_cancelled() {
            return Err(AnalyzerError::Cancelled);
        }
        self.executed.lock().unwrap().push(scan_type);
        match self.behaviors.get(&scan_type) {
            Some(AnalyzerBehavior::Respond(json)) => {
                std::fs::write(output_path_of(config_path), json).expect("write response");
                Ok(ProcessOutput::default())
            }
            Some(AnalyzerBehavior::NotEntitled) => Err(AnalyzerError::NotEntitled(scan_type)),
            Some(AnalyzerBehavior::NotInstalled) => {
                Err(AnalyzerError::NotInstalled(PathBuf::from("analyzer")))
            }
            Some(AnalyzerBehavior::Crash) => Err(AnalyzerError::Process {
                code: Some(1),
                stderr: "analyzer crashed".to_string(),
            }),
            Some(AnalyzerBehavior::HangUntilCancelled) => {
                cancel.cancelled().await;
                Err(AnalyzerError::Cancelled)
            }
            None => {
                std::fs::write(output_path_of(config_path), empty_response())
                    .expect("write response");
                Ok(ProcessOutput::default())
            }
        }
    }

    fn is_installed(&self) -> bool {
        true
    }
}

/// Entitlement provider double with fixed flags.
pub struct FakeEntitlements {
    pub applicability: bool,
    pub sast: bool,
    pub iac: bool,
    pub secrets: bool,
}

impl FakeEntitlements {
    pub fn all() -> Self {
        Self {
            applicability: true,
            sast: true,
            iac: true,
            secrets: true,
        }
    }

    pub fn none() -> Self {
        Self {
            applicability: false,
            sast: false,
            iac: false,
            secrets: false,
        }
    }
}

#[async_trait]
impl EntitlementProvider for FakeEntitlements {
    async fn is_entitled(
        &self,
        scan_type: ScanType,
    ) -> Result<bool, scanforge::application::supported::EntitlementError> {
        Ok(match scan_type {
            ScanType::Applicability => self.applicability,
            ScanType::Sast => self.sast,
            ScanType::Iac => self.iac,
            ScanType::Secrets => self.secrets,
        })
    }
}

/// Graph client double returning the same response for every descriptor.
pub struct FakeGraphClient {
    pub response: GraphScanResponse,
}

#[async_trait]
impl DependencyGraphClient for FakeGraphClient {
    async fn scan(
        &self,
        _descriptor: &Descriptor,
        progress: &mut GraphScanProgress,
        cancel: &CancellationToken,
    ) -> Result<GraphScanResponse, GraphScanError> {
        if cancel.is_cancelled() {
            return Err(GraphScanError::Cancelled);
        }
        progress
            .set_percentage(50)
            .await
            .map_err(|_| GraphScanError::Cancelled)?;
        Ok(self.response.clone())
    }
}

pub fn empty_response() -> String {
    r#"{"runs": []}"#.to_string()
}

/// A response with one rule and one issue at a fixed region of `file`.
pub fn security_response(rule_id: &str, file: &str) -> String {
    format!(
        r#"{{
            "runs": [
                {{
                    "tool": {{
                        "driver": {{
                            "name": "scanner",
                            "rules": [{{"id": "{rule_id}", "fullDescription": {{"text": "{rule_id} description"}}}}]
                        }}
                    }},
                    "results": [
                        {{
                            "ruleId": "{rule_id}",
                            "message": {{"text": "{rule_id} finding"}},
                            "level": "error",
                            "locations": [
                                {{
                                    "physicalLocation": {{
                                        "artifactLocation": {{"uri": "{file}"}},
                                        "region": {{"startLine": 3, "endLine": 3, "startColumn": 1, "endColumn": 9}}
                                    }}
                                }}
                            ]
                        }}
                    ]
                }}
            ]
        }}"#
    )
}

/// An applicability response marking `cve` applicable with evidence in `file`.
pub fn applicability_response(cve: &str, file: &str) -> String {
    format!(
        r#"{{
            "runs": [
                {{
                    "tool": {{
                        "driver": {{
                            "name": "applicability-scanner",
                            "rules": [{{"id": "applic_{cve}"}}]
                        }}
                    }},
                    "results": [
                        {{
                            "ruleId": "applic_{cve}",
                            "message": {{"text": "vulnerable function invoked"}},
                            "locations": [
                                {{
                                    "physicalLocation": {{
                                        "artifactLocation": {{"uri": "{file}"}},
                                        "region": {{"startLine": 12, "endLine": 12, "startColumn": 4, "endColumn": 30}}
                                    }}
                                }}
                            ]
                        }}
                    ]
                }}
            ]
        }}"#
    )
}

/// A graph response with one vulnerability carrying `cve`.
pub fn graph_response_with_cve(cve: &str) -> GraphScanResponse {
    GraphScanResponse {
        violations: Vec::new(),
        vulnerabilities: vec![GraphIssue {
            issue_id: "XRAY-100".to_string(),
            severity: "High".to_string(),
            summary: "vulnerable transitive dependency".to_string(),
            cves: vec![GraphCve {
                cve: Some(cve.to_string()),
            }],
            components: std::collections::BTreeMap::new(),
        }],
    }
}

pub fn npm_descriptor(workspace: &str) -> Descriptor {
    Descriptor {
        name: "package.json".to_string(),
        full_path: format!("{workspace}/package.json"),
        package_type: scanforge::PackageType::Npm,
        component_id: "npm://root:1.0.0".to_string(),
    }
}
