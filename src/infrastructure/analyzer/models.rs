//! Analyzer response wire types.
//!
//! These types match the SARIF-shaped JSON the analyzer binary writes to the
//! response path named in the request. Every collection defaults to empty on
//! deserialization: a response with missing optional fields normalizes to
//! empty collections instead of failing.

use serde::{Deserialize, Serialize};

use crate::domain::findings::Region;

/// Root analyzer response: one run per executed scanner pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalyzerResponse {
    #[serde(default)]
    pub runs: Vec<AnalyzerRun>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalyzerRun {
    #[serde(default)]
    pub tool: AnalyzerTool,
    #[serde(default)]
    pub results: Vec<RawIssue>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalyzerTool {
    #[serde(default)]
    pub driver: AnalyzerDriver,
}

/// The rule catalog of one run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalyzerDriver {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub rules: Vec<RuleDescriptor>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleDescriptor {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_description: Option<MessageText>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessageText {
    #[serde(default)]
    pub text: String,
}

/// A raw issue as reported by the analyzer, before grouping.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawIssue {
    #[serde(default)]
    pub rule_id: String,
    #[serde(default)]
    pub message: MessageText,
    #[serde(default)]
    pub locations: Vec<RawLocation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suppressions: Vec<Suppression>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub code_flows: Vec<CodeFlow>,
}

impl RawIssue {
    /// True when the issue carries at least one suppression and must be
    /// excluded from the normalized result.
    pub fn is_suppressed(&self) -> bool {
        !self.suppressions.is_empty()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Suppression {
    #[serde(default)]
    pub kind: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeFlow {
    #[serde(default)]
    pub thread_flows: Vec<ThreadFlow>,
}

/// An ordered chain of locations showing how tainted data reaches a sink.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ThreadFlow {
    #[serde(default)]
    pub locations: Vec<ThreadFlowLocation>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ThreadFlowLocation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<RawLocation>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawLocation {
    #[serde(default)]
    pub physical_location: PhysicalLocation,
}

impl RawLocation {
    /// The file URI of this location, or `None` when the analyzer omitted the
    /// artifact location. Locations without a file are skipped tolerantly
    /// rather than treated as malformed input.
    pub fn file_uri(&self) -> Option<&str> {
        self.physical_location
            .artifact_location
            .as_ref()
            .map(|artifact| artifact.uri.as_str())
            .filter(|uri| !uri.is_empty())
    }

    pub fn region(&self) -> &Region {
        &self.physical_location.region
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhysicalLocation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_location: Option<ArtifactLocation>,
    #[serde(default)]
    pub region: WireRegion,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArtifactLocation {
    #[serde(default)]
    pub uri: String,
}

/// Region as serialized by the analyzer. Coordinates are 1-based; the domain
/// model keeps them that way.
pub type WireRegion = Region;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_response() {
        let json = r#"{
            "runs": [
                {
                    "tool": {
                        "driver": {
                            "name": "sast-scanner",
                            "rules": [
                                {"id": "js-insecure-random", "fullDescription": {"text": "Uses Math.random"}}
                            ]
                        }
                    },
                    "results": [
                        {
                            "ruleId": "js-insecure-random",
                            "message": {"text": "Insecure randomness"},
                            "level": "warning",
                            "locations": [
                                {
                                    "physicalLocation": {
                                        "artifactLocation": {"uri": "src/token.js"},
                                        "region": {"startLine": 4, "endLine": 4, "startColumn": 10, "endColumn": 24}
                                    }
                                }
                            ]
                        }
                    ]
                }
            ]
        }"#;

        let response: AnalyzerResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.runs.len(), 1);

        let run = &response.runs[0];
        assert_eq!(run.tool.driver.name, "sast-scanner");
        assert_eq!(
            run.tool.driver.rules[0]
                .full_description
                .as_ref()
                .unwrap()
                .text,
            "Uses Math.random"
        );

        let issue = &run.results[0];
        assert_eq!(issue.rule_id, "js-insecure-random");
        assert_eq!(issue.locations[0].file_uri(), Some("src/token.js"));
        assert_eq!(issue.locations[0].region().start_line, 4);
        assert!(!issue.is_suppressed());
    }

    #[test]
    fn test_missing_optional_fields_default_to_empty() {
        let response: AnalyzerResponse = serde_json::from_str(r#"{"runs": [{}]}"#).unwrap();
        let run = &response.runs[0];
        assert!(run.results.is_empty());
        assert!(run.tool.driver.rules.is_empty());

        let issue: RawIssue = serde_json::from_str(r#"{"ruleId": "r"}"#).unwrap();
        assert!(issue.locations.is_empty());
        assert!(issue.suppressions.is_empty());
        assert!(issue.code_flows.is_empty());
    }

    #[test]
    fn test_location_without_artifact_has_no_file() {
        let location: RawLocation =
            serde_json::from_str(r#"{"physicalLocation": {"region": {"startLine": 1}}}"#).unwrap();
        assert_eq!(location.file_uri(), None);

        let empty_uri: RawLocation = serde_json::from_str(
            r#"{"physicalLocation": {"artifactLocation": {"uri": ""}, "region": {}}}"#,
        )
        .unwrap();
        assert_eq!(empty_uri.file_uri(), None);
    }

    #[test]
    fn test_parse_code_flows() {
        let json = r#"{
            "ruleId": "xss",
            "message": {"text": "XSS"},
            "locations": [],
            "codeFlows": [
                {
                    "threadFlows": [
                        {
                            "locations": [
                                {"location": {"physicalLocation": {"artifactLocation": {"uri": "a.js"}, "region": {"startLine": 1}}}},
                                {"location": {"physicalLocation": {"artifactLocation": {"uri": "b.js"}, "region": {"startLine": 9}}}}
                            ]
                        }
                    ]
                }
            ]
        }"#;

        let issue: RawIssue = serde_json::from_str(json).unwrap();
        let flow = &issue.code_flows[0].thread_flows[0];
        assert_eq!(flow.locations.len(), 2);
        assert_eq!(
            flow.locations[1]
                .location
                .as_ref()
                .unwrap()
                .file_uri(),
            Some("b.js")
        );
    }
}
