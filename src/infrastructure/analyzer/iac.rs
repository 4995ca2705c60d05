//! IaC misconfiguration scanner runner.

use std::sync::Arc;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use crate::config::ScannersConfig;
use crate::domain::results::SecurityScanResult;

use super::normalize;
use super::request::{ScanRequest, ScanType};
use super::runner;
use super::{AnalyzerError, AnalyzerExecutor};

/// Runner for the IaC verb of the analyzer.
pub struct IacRunner {
    executor: Arc<dyn AnalyzerExecutor>,
}

impl IacRunner {
    pub fn new(executor: Arc<dyn AnalyzerExecutor>) -> Self {
        Self { executor }
    }

    /// Scan the given roots for IaC misconfigurations.
    #[instrument(skip(self, config, cancel))]
    pub async fn scan(
        &self,
        roots: Vec<String>,
        config: &ScannersConfig,
        cancel: &CancellationToken,
    ) -> Result<SecurityScanResult, AnalyzerError> {
        let mut request = ScanRequest::new(ScanType::Iac, roots);
        request.skipped_folders = config.exclude_patterns.clone();
        debug!(
            roots = ?request.roots,
            skipped = ?request.skipped_folders,
            "Scanning directories for IaC issues"
        );

        let response = runner::run_contained(&*self.executor, request, cancel).await?;
        let mut result = normalize::normalize_security_response(response.as_ref());
        result.timestamp = Some(Utc::now());
        Ok(result)
    }
}
