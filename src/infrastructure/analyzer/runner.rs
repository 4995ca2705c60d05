//! Shared request/response pipeline for analyzer-backed scanners.
//!
//! Every scanner family runs the same three steps: write the encoded request
//! into a scratch directory, execute the analyzer, read the response back
//! from the output path named inside the request.

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use super::models::AnalyzerResponse;
use super::request::{self, ScanRequest};
use super::{AnalyzerError, AnalyzerExecutor};

/// Execute one scan request to completion and parse the response.
pub async fn run_request(
    executor: &dyn AnalyzerExecutor,
    mut request: ScanRequest,
    cancel: &CancellationToken,
) -> Result<AnalyzerResponse, AnalyzerError> {
    let run_dir = tempfile::tempdir()?;
    let request_path = run_dir.path().join("request.yaml");
    let response_path = run_dir.path().join("response.json");
    request.output = response_path.display().to_string();

    let encoded = request::encode_requests(std::slice::from_ref(&request))?;
    debug!(scan_type = %request.scan_type, request = %encoded, "Encoded analyzer request");
    tokio::fs::write(&request_path, &encoded).await?;

    let output = executor
        .execute(request.scan_type, &request_path, cancel)
        .await?;
    if !output.stdout.is_empty() {
        debug!(scan_type = %request.scan_type, log = %output.stdout, "Analyzer run log");
    }
    if !output.stderr.is_empty() {
        error!(scan_type = %request.scan_type, log = %output.stderr, "Analyzer error log");
    }

    if !tokio::fs::try_exists(&response_path).await? {
        return Err(AnalyzerError::MissingResponse(response_path));
    }
    let raw = tokio::fs::read_to_string(&response_path).await?;
    let response: AnalyzerResponse = serde_json::from_str(&raw)?;
    Ok(response)
}

/// Execute one scan request, containing recoverable failures.
///
/// Returns `Ok(None)` when the run failed in a way that must not abort the
/// workspace scan; the scanner then contributes no findings. Cancellation,
/// entitlement, installation, and credential failures propagate so the
/// orchestrator can classify them.
pub async fn run_contained(
    executor: &dyn AnalyzerExecutor,
    request: ScanRequest,
    cancel: &CancellationToken,
) -> Result<Option<AnalyzerResponse>, AnalyzerError> {
    let scan_type = request.scan_type;
    match run_request(executor, request, cancel).await {
        Ok(response) => Ok(Some(response)),
        Err(err) if err.is_containable() => {
            warn!(scan_type = %scan_type, error = %err, "Analyzer run failed, continuing without findings");
            Ok(None)
        }
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use async_trait::async_trait;

    use super::super::request::ScanType;
    use super::super::ProcessOutput;
    use super::*;

    /// Fake analyzer: reads the request, resolves the output path, and writes
    /// a canned response there.
    struct CannedAnalyzer {
        response: String,
    }

    fn output_path_of(config_path: &Path) -> std::path::PathBuf {
        let raw = std::fs::read_to_string(config_path).unwrap();
        let value: serde_yml::Value = serde_yml::from_str(&raw).unwrap();
        let output = value["scans"][0]["output"].as_str().unwrap();
        std::path::PathBuf::from(output)
    }

    #[async_trait]
    impl AnalyzerExecutor for CannedAnalyzer {
        async fn execute(
            &self,
            _scan_type: ScanType,
            config_path: &Path,
            _cancel: &CancellationToken,
        ) -> Result<ProcessOutput, AnalyzerError> {
            std::fs::write(output_path_of(config_path), &self.response).unwrap();
            Ok(ProcessOutput::default())
        }

        fn is_installed(&self) -> bool {
            true
        }
    }

    /// Fake analyzer that exits without producing a response file.
    struct SilentAnalyzer;

    #[async_trait]
    impl AnalyzerExecutor for SilentAnalyzer {
        async fn execute(
            &self,
            _scan_type: ScanType,
            _config_path: &Path,
            _cancel: &CancellationToken,
        ) -> Result<ProcessOutput, AnalyzerError> {
            Ok(ProcessOutput::default())
        }

        fn is_installed(&self) -> bool {
            true
        }
    }

    #[tokio::test]
    async fn test_run_request_round_trip() {
        let analyzer = CannedAnalyzer {
            response: r#"{"runs": [{"tool": {"driver": {"name": "secrets"}}}]}"#.to_string(),
        };
        let request = ScanRequest::new(ScanType::Secrets, vec!["/ws".to_string()]);

        let response = run_request(&analyzer, request, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(response.runs.len(), 1);
        assert_eq!(response.runs[0].tool.driver.name, "secrets");
    }

    #[tokio::test]
    async fn test_missing_response_file_is_an_error() {
        let request = ScanRequest::new(ScanType::Iac, vec!["/ws".to_string()]);
        let err = run_request(&SilentAnalyzer, request, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AnalyzerError::MissingResponse(_)));
    }

    #[tokio::test]
    async fn test_run_contained_swallows_missing_response() {
        let request = ScanRequest::new(ScanType::Iac, vec!["/ws".to_string()]);
        let response = run_contained(&SilentAnalyzer, request, &CancellationToken::new())
            .await
            .unwrap();
        assert!(response.is_none());
    }

    #[tokio::test]
    async fn test_run_contained_propagates_cancellation() {
        struct CancelledAnalyzer;

        #[async_trait]
        impl AnalyzerExecutor for CancelledAnalyzer {
            async fn execute(
                &self,
                _scan_type: ScanType,
                _config_path: &Path,
                _cancel: &CancellationToken,
            ) -> Result<ProcessOutput, AnalyzerError> {
                Err(AnalyzerError::Cancelled)
            }

            fn is_installed(&self) -> bool {
                true
            }
        }

        let request = ScanRequest::new(ScanType::Sast, vec!["/ws".to_string()]);
        let err = run_contained(&CancelledAnalyzer, request, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AnalyzerError::Cancelled));
    }
}
