//! Workspace scan orchestration.
//!
//! One use case execution scans one workspace: it resolves which scanner
//! families may run, fans the enabled ones out concurrently, folds their
//! normalized results into a fresh [`ScanResults`] aggregate, and persists it
//! through the result cache. Individual scanner failures are contained and
//! recorded; only cancellation aborts the whole scan, in which case partial
//! results are discarded and nothing is cached.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use futures::future::{join_all, BoxFuture};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::config::Config;
use crate::domain::graph::{DependencyGraphClient, GraphScanError};
use crate::domain::results::{
    DependencyScanResults, Descriptor, FailedFileRecord, PackageType, ScanResults,
};
use crate::infrastructure::analyzer::applicability::ApplicabilityRunner;
use crate::infrastructure::analyzer::iac::IacRunner;
use crate::infrastructure::analyzer::sast::SastRunner;
use crate::infrastructure::analyzer::secrets::SecretsRunner;
use crate::infrastructure::analyzer::{AnalyzerError, AnalyzerExecutor};
use crate::infrastructure::cache::{CacheError, ResultCache};

use super::progress::{ScanCancelled, ScanProgress};
use super::supported::{EntitlementProvider, SupportedScans};

/// Errors that abort a workspace scan as a whole.
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("scan was cancelled")]
    Cancelled,

    #[error("a scan is already in progress for workspace '{0}'")]
    ScanInProgress(String),

    #[error(transparent)]
    Cache(#[from] CacheError),
}

impl From<ScanCancelled> for ScanError {
    fn from(_: ScanCancelled) -> Self {
        ScanError::Cancelled
    }
}

/// The workspace to scan, plus the dependency descriptors located in it.
///
/// Descriptor discovery happens outside this crate and is handed in grouped
/// by package type.
#[derive(Debug, Clone, Default)]
pub struct WorkspaceTarget {
    pub workspace: String,
    pub descriptors: BTreeMap<PackageType, Vec<Descriptor>>,
}

impl WorkspaceTarget {
    pub fn new(workspace: impl Into<String>) -> Self {
        Self {
            workspace: workspace.into(),
            descriptors: BTreeMap::new(),
        }
    }

    pub fn with_descriptor(mut self, descriptor: Descriptor) -> Self {
        self.descriptors
            .entry(descriptor.package_type)
            .or_default()
            .push(descriptor);
        self
    }

    pub fn descriptor_count(&self) -> usize {
        self.descriptors.values().map(Vec::len).sum()
    }
}

/// Orchestrates the scan of one workspace at a time per workspace key.
pub struct ScanWorkspaceUseCase {
    entitlements: Arc<dyn EntitlementProvider>,
    graph_client: Arc<dyn DependencyGraphClient>,
    cache: Arc<ResultCache>,
    config: Config,
    applicability: ApplicabilityRunner,
    sast: SastRunner,
    iac: IacRunner,
    secrets: SecretsRunner,
    in_progress: Mutex<HashSet<String>>,
}

impl ScanWorkspaceUseCase {
    pub fn new(
        executor: Arc<dyn AnalyzerExecutor>,
        entitlements: Arc<dyn EntitlementProvider>,
        graph_client: Arc<dyn DependencyGraphClient>,
        cache: Arc<ResultCache>,
        config: Config,
    ) -> Self {
        Self {
            applicability: ApplicabilityRunner::new(Arc::clone(&executor)),
            sast: SastRunner::new(Arc::clone(&executor)),
            iac: IacRunner::new(Arc::clone(&executor)),
            secrets: SecretsRunner::new(executor),
            entitlements,
            graph_client,
            cache,
            config,
            in_progress: Mutex::new(HashSet::new()),
        }
    }

    /// Scan a workspace and persist the aggregate.
    ///
    /// Returns `Ok(None)` when the scan finished successfully with nothing to
    /// report; such a result is discarded, not cached, so an empty scan and a
    /// never-run scan are indistinguishable downstream. A second trigger for
    /// a workspace whose scan is still running is rejected.
    #[instrument(skip(self, target, progress), fields(workspace = %target.workspace))]
    pub async fn execute(
        &self,
        target: &WorkspaceTarget,
        progress: Arc<ScanProgress>,
    ) -> Result<Option<ScanResults>, ScanError> {
        self.claim(&target.workspace).await?;
        let outcome = self.scan_workspace(target, progress).await;
        self.release(&target.workspace).await;
        outcome
    }

    /// Load the cached results of the last scan, if still valid.
    pub async fn load_cached(&self, workspace: &str) -> Result<Option<ScanResults>, ScanError> {
        Ok(self.cache.load(workspace).await?)
    }

    /// Whether this workspace has ever been scanned. Per workspace, not
    /// process-wide.
    pub async fn is_first_scan(&self, workspace: &str) -> Result<bool, ScanError> {
        Ok(self.cache.is_first_scan(workspace).await?)
    }

    async fn claim(&self, workspace: &str) -> Result<(), ScanError> {
        let mut in_progress = self.in_progress.lock().await;
        if !in_progress.insert(workspace.to_string()) {
            return Err(ScanError::ScanInProgress(workspace.to_string()));
        }
        Ok(())
    }

    async fn release(&self, workspace: &str) {
        self.in_progress.lock().await.remove(workspace);
    }

    async fn scan_workspace(
        &self,
        target: &WorkspaceTarget,
        progress: Arc<ScanProgress>,
    ) -> Result<Option<ScanResults>, ScanError> {
        info!("Starting workspace scan");
        progress.preparing("Resolving supported scans").await?;
        let supported = SupportedScans::resolve(&*self.entitlements).await;
        if !supported.has_supported_scan() && target.descriptor_count() == 0 {
            info!("Nothing to scan: no entitled scanner and no descriptors");
            progress.finish().await;
            return Ok(None);
        }

        let substeps = [supported.sast, supported.iac, supported.secrets]
            .iter()
            .filter(|enabled| **enabled)
            .count()
            + target.descriptors.len()
            + target.descriptor_count();
        progress.start_step("Scanning for issues", Some(substeps)).await?;

        let results = Arc::new(Mutex::new(ScanResults::new(target.workspace.as_str())));
        let cancel = progress.cancel_token();

        let mut tasks: Vec<BoxFuture<'_, Result<(), ScanError>>> = Vec::new();
        if supported.sast {
            let results = Arc::clone(&results);
            let progress = Arc::clone(&progress);
            let cancel = cancel.clone();
            tasks.push(Box::pin(async move {
                self.sast_task(target, results, progress, cancel).await
            }));
        }
        if supported.iac {
            let results = Arc::clone(&results);
            let progress = Arc::clone(&progress);
            let cancel = cancel.clone();
            tasks.push(Box::pin(async move {
                self.iac_task(target, results, progress, cancel).await
            }));
        }
        if supported.secrets {
            let results = Arc::clone(&results);
            let progress = Arc::clone(&progress);
            let cancel = cancel.clone();
            tasks.push(Box::pin(async move {
                self.secrets_task(target, results, progress, cancel).await
            }));
        }
        for (package_type, descriptors) in &target.descriptors {
            let results = Arc::clone(&results);
            let progress = Arc::clone(&progress);
            let cancel = cancel.clone();
            tasks.push(Box::pin(async move {
                self.dependency_group_task(
                    &target.workspace,
                    *package_type,
                    descriptors,
                    supported,
                    results,
                    progress,
                    cancel,
                )
                .await
            }));
        }

        let outcomes = join_all(tasks).await;
        if progress.is_cancelled()
            || outcomes
                .iter()
                .any(|outcome| matches!(outcome, Err(ScanError::Cancelled)))
        {
            info!("Workspace scan cancelled, discarding partial results");
            progress.mark_cancelled().await;
            return Err(ScanError::Cancelled);
        }
        for outcome in outcomes {
            outcome?;
        }

        let results = results.lock().await.clone();
        if !results.has_information() {
            info!("Workspace scan finished with nothing to report");
            progress.finish().await;
            return Ok(None);
        }
        self.cache.store(&target.workspace, &results).await?;
        progress.finish().await;
        info!(
            issue_count = results.issue_count(),
            ignored_count = results.ignored_count(),
            failed_files = results.failed_files.len(),
            "Workspace scan finished"
        );
        Ok(Some(results))
    }

    async fn sast_task(
        &self,
        target: &WorkspaceTarget,
        results: Arc<Mutex<ScanResults>>,
        progress: Arc<ScanProgress>,
        cancel: CancellationToken,
    ) -> Result<(), ScanError> {
        match self
            .sast
            .scan(
                vec![target.workspace.clone()],
                &self.config.scanners,
                &cancel,
            )
            .await
        {
            Ok(scan_result) => {
                info!(issue_count = scan_result.issue_count(), "SAST scan finished");
                results.lock().await.sast = Some(scan_result);
            }
            Err(err) => self.on_scanner_error(&results, &target.workspace, err).await?,
        }
        progress.report_progress().await?;
        Ok(())
    }

    async fn iac_task(
        &self,
        target: &WorkspaceTarget,
        results: Arc<Mutex<ScanResults>>,
        progress: Arc<ScanProgress>,
        cancel: CancellationToken,
    ) -> Result<(), ScanError> {
        match self
            .iac
            .scan(
                vec![target.workspace.clone()],
                &self.config.scanners,
                &cancel,
            )
            .await
        {
            Ok(scan_result) => {
                info!(issue_count = scan_result.issue_count(), "IaC scan finished");
                results.lock().await.iac = Some(scan_result);
            }
            Err(err) => self.on_scanner_error(&results, &target.workspace, err).await?,
        }
        progress.report_progress().await?;
        Ok(())
    }

    async fn secrets_task(
        &self,
        target: &WorkspaceTarget,
        results: Arc<Mutex<ScanResults>>,
        progress: Arc<ScanProgress>,
        cancel: CancellationToken,
    ) -> Result<(), ScanError> {
        match self
            .secrets
            .scan(
                vec![target.workspace.clone()],
                &self.config.scanners,
                &cancel,
            )
            .await
        {
            Ok(scan_result) => {
                info!(
                    issue_count = scan_result.issue_count(),
                    "Secrets scan finished"
                );
                results.lock().await.secrets = Some(scan_result);
            }
            Err(err) => self.on_scanner_error(&results, &target.workspace, err).await?,
        }
        progress.report_progress().await?;
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    async fn dependency_group_task(
        &self,
        workspace: &str,
        package_type: PackageType,
        descriptors: &[Descriptor],
        supported: SupportedScans,
        results: Arc<Mutex<ScanResults>>,
        progress: Arc<ScanProgress>,
        cancel: CancellationToken,
    ) -> Result<(), ScanError> {
        debug!(
            package_type = %package_type,
            descriptor_count = descriptors.len(),
            "Scanning descriptor group"
        );
        let scans = descriptors.iter().map(|descriptor| {
            self.descriptor_task(
                workspace,
                descriptor,
                supported,
                Arc::clone(&results),
                Arc::clone(&progress),
                cancel.clone(),
            )
        });
        for outcome in join_all(scans).await {
            outcome?;
        }
        progress.report_progress().await?;
        Ok(())
    }

    async fn descriptor_task(
        &self,
        workspace: &str,
        descriptor: &Descriptor,
        supported: SupportedScans,
        results: Arc<Mutex<ScanResults>>,
        progress: Arc<ScanProgress>,
        cancel: CancellationToken,
    ) -> Result<(), ScanError> {
        debug!(descriptor = %descriptor.full_path, "Scanning descriptor for dependency issues");
        let mut graph_progress = progress.graph_progress(descriptor.component_id.clone());
        let scan = self
            .graph_client
            .scan(descriptor, &mut graph_progress, &cancel)
            .await;
        graph_progress.complete().await?;

        let response = match scan {
            Ok(response) => response,
            Err(GraphScanError::Cancelled) => return Err(ScanError::Cancelled),
            Err(err) => {
                warn!(descriptor = %descriptor.full_path, error = %err, "Descriptor scan failed");
                let reason = match err {
                    GraphScanError::NotInstalled(_) => "[Not installed]",
                    _ => "[Fail to scan]",
                };
                results.lock().await.failed_files.push(FailedFileRecord {
                    full_path: descriptor.full_path.clone(),
                    reason: reason.to_string(),
                });
                return Ok(());
            }
        };
        if response.issue_count() == 0 {
            debug!(descriptor = %descriptor.full_path, "No dependency issues found");
            return Ok(());
        }

        let mut dependency_results = DependencyScanResults {
            name: descriptor.name.clone(),
            full_path: descriptor.full_path.clone(),
            package_type: descriptor.package_type,
            graph_scan_timestamp: Utc::now(),
            graph_scan: response,
            applicability: None,
            applicability_timestamp: None,
        };

        if supported.applicability {
            let cves = dependency_results.graph_scan.cve_ids();
            if !cves.is_empty() {
                match self
                    .applicability
                    .scan(
                        vec![workspace.to_string()],
                        cves,
                        &self.config.scanners.applicability,
                        &cancel,
                    )
                    .await
                {
                    Ok(applicability) => {
                        dependency_results.applicability = Some(applicability);
                        dependency_results.applicability_timestamp = Some(Utc::now());
                    }
                    Err(err) => {
                        self.on_scanner_error(&results, &descriptor.full_path, err)
                            .await?
                    }
                }
            }
        }

        results.lock().await.descriptors_issues.push(dependency_results);
        Ok(())
    }

    /// Classify a scanner failure: cancellation aborts the workspace scan,
    /// entitlement and credential gaps skip silently, anything else produces
    /// a failed-file record and lets sibling scanners continue.
    async fn on_scanner_error(
        &self,
        results: &Mutex<ScanResults>,
        full_path: &str,
        err: AnalyzerError,
    ) -> Result<(), ScanError> {
        match err {
            AnalyzerError::Cancelled => Err(ScanError::Cancelled),
            AnalyzerError::NotEntitled(scan_type) => {
                debug!(scan_type = %scan_type, "Scanner is not entitled, skipping");
                Ok(())
            }
            AnalyzerError::MissingCredentials => {
                info!("Platform credentials are incomplete, skipping analyzer scan");
                Ok(())
            }
            err => {
                warn!(error = %err, "Scanner run failed");
                results.lock().await.failed_files.push(FailedFileRecord {
                    full_path: full_path.to_string(),
                    reason: err.failed_file_reason().to_string(),
                });
                Ok(())
            }
        }
    }
}
