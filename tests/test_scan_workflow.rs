//! End-to-end workspace scan orchestration tests against fake collaborators.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::fixtures::{
    applicability_response, graph_response_with_cve, npm_descriptor, security_response,
    AnalyzerBehavior, FakeAnalyzer, FakeEntitlements, FakeGraphClient,
};
use common::helpers::{silent_progress, use_case_with};
use scanforge::domain::graph::GraphScanResponse;
use scanforge::domain::results::CveApplicability;
use scanforge::{ScanError, ScanType, WorkspaceTarget};

#[tokio::test]
async fn test_full_scan_populates_and_caches_results() {
    let cache_dir = tempfile::tempdir().unwrap();
    let analyzer = FakeAnalyzer::new()
        .with_behavior(
            ScanType::Sast,
            AnalyzerBehavior::Respond(security_response("js-eval", "src/app.js")),
        )
        .with_behavior(
            ScanType::Iac,
            AnalyzerBehavior::Respond(security_response("open-bucket", "infra/main.tf")),
        )
        .with_behavior(
            ScanType::Secrets,
            AnalyzerBehavior::Respond(security_response("aws-key", ".env")),
        )
        .with_behavior(
            ScanType::Applicability,
            AnalyzerBehavior::Respond(applicability_response("CVE-2021-1234", "src/app.js")),
        );
    let (use_case, _cache) = use_case_with(
        Arc::new(analyzer),
        Arc::new(FakeEntitlements::all()),
        Arc::new(FakeGraphClient {
            response: graph_response_with_cve("CVE-2021-1234"),
        }),
        cache_dir.path(),
    );

    let target = WorkspaceTarget::new("/workspace").with_descriptor(npm_descriptor("/workspace"));
    let results = use_case
        .execute(&target, silent_progress(1))
        .await
        .unwrap()
        .expect("scan found issues");

    let sast = results.sast.as_ref().expect("SAST was attempted");
    assert_eq!(sast.files_with_issues.len(), 1);
    assert_eq!(sast.files_with_issues[0].issues[0].rule_id, "js-eval");
    assert!(results.iac.is_some());
    assert!(results.secrets.is_some());

    assert_eq!(results.descriptors_issues.len(), 1);
    let descriptor = &results.descriptors_issues[0];
    assert_eq!(descriptor.issue_count(), 1);
    let applicability = descriptor
        .applicability
        .as_ref()
        .expect("applicability ran");
    assert_eq!(
        applicability.applicability("CVE-2021-1234"),
        CveApplicability::Applicable
    );

    // The aggregate was persisted and survives a reload.
    let cached = use_case.load_cached("/workspace").await.unwrap();
    assert_eq!(cached, Some(results));
    assert!(!use_case.is_first_scan("/workspace").await.unwrap());
}

#[tokio::test]
async fn test_clean_scan_is_discarded_not_cached() {
    let cache_dir = tempfile::tempdir().unwrap();
    let (use_case, _cache) = use_case_with(
        Arc::new(FakeAnalyzer::new()),
        Arc::new(FakeEntitlements::all()),
        Arc::new(FakeGraphClient {
            response: GraphScanResponse::default(),
        }),
        cache_dir.path(),
    );

    let target = WorkspaceTarget::new("/workspace").with_descriptor(npm_descriptor("/workspace"));
    let results = use_case.execute(&target, silent_progress(1)).await.unwrap();

    // Empty-but-successful is indistinguishable from never scanned.
    assert!(results.is_none());
    assert!(use_case.load_cached("/workspace").await.unwrap().is_none());
    assert!(use_case.is_first_scan("/workspace").await.unwrap());
}

#[tokio::test]
async fn test_cancellation_discards_partial_results() {
    let cache_dir = tempfile::tempdir().unwrap();
    let analyzer = FakeAnalyzer::new()
        .with_behavior(
            ScanType::Sast,
            AnalyzerBehavior::Respond(security_response("js-eval", "src/app.js")),
        )
        .with_behavior(ScanType::Secrets, AnalyzerBehavior::HangUntilCancelled);
    let (use_case, _cache) = use_case_with(
        Arc::new(analyzer),
        Arc::new(FakeEntitlements::all()),
        Arc::new(FakeGraphClient {
            response: GraphScanResponse::default(),
        }),
        cache_dir.path(),
    );

    let progress = silent_progress(1);
    let canceller = Arc::clone(&progress);
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        canceller.cancel();
    });

    let target = WorkspaceTarget::new("/workspace");
    let err = use_case.execute(&target, progress).await.unwrap_err();
    assert!(matches!(err, ScanError::Cancelled));

    // Even though SAST completed, nothing was cached.
    assert!(use_case.load_cached("/workspace").await.unwrap().is_none());
}

#[tokio::test]
async fn test_scanner_failure_is_contained_and_recorded() {
    let cache_dir = tempfile::tempdir().unwrap();
    let analyzer = FakeAnalyzer::new()
        .with_behavior(
            ScanType::Sast,
            AnalyzerBehavior::Respond(security_response("js-eval", "src/app.js")),
        )
        .with_behavior(ScanType::Iac, AnalyzerBehavior::NotInstalled)
        .with_behavior(ScanType::Secrets, AnalyzerBehavior::NotEntitled);
    let (use_case, _cache) = use_case_with(
        Arc::new(analyzer),
        Arc::new(FakeEntitlements::all()),
        Arc::new(FakeGraphClient {
            response: GraphScanResponse::default(),
        }),
        cache_dir.path(),
    );

    let target = WorkspaceTarget::new("/workspace");
    let results = use_case
        .execute(&target, silent_progress(1))
        .await
        .unwrap()
        .expect("SAST results survive sibling failures");

    // The broken scanner never hides results from the others.
    assert!(results.sast.is_some());
    assert_eq!(results.failed_files.len(), 1);
    assert_eq!(results.failed_files[0].reason, "[Not installed]");
    // Not entitled is a skip, not a failed attempt.
    assert!(results.secrets.is_none());
    assert!(!results
        .failed_files
        .iter()
        .any(|failed| failed.reason.contains("entitled")));
}

#[tokio::test]
async fn test_crashed_scanner_contributes_empty_result() {
    let cache_dir = tempfile::tempdir().unwrap();
    let analyzer = FakeAnalyzer::new()
        .with_behavior(
            ScanType::Sast,
            AnalyzerBehavior::Respond(security_response("js-eval", "src/app.js")),
        )
        .with_behavior(ScanType::Iac, AnalyzerBehavior::Crash);
    let (use_case, _cache) = use_case_with(
        Arc::new(analyzer),
        Arc::new(FakeEntitlements::all()),
        Arc::new(FakeGraphClient {
            response: GraphScanResponse::default(),
        }),
        cache_dir.path(),
    );

    let target = WorkspaceTarget::new("/workspace");
    let results = use_case
        .execute(&target, silent_progress(1))
        .await
        .unwrap()
        .expect("SAST results survive the crash");

    // The crash was contained inside the runner: IaC was attempted and
    // yielded an explicitly empty result.
    let iac = results.iac.as_ref().expect("IaC was attempted");
    assert!(iac.files_with_issues.is_empty());
    assert!(results.sast.is_some());
}

#[tokio::test]
async fn test_second_concurrent_scan_is_rejected() {
    let cache_dir = tempfile::tempdir().unwrap();
    let analyzer =
        FakeAnalyzer::new().with_behavior(ScanType::Sast, AnalyzerBehavior::HangUntilCancelled);
    let (use_case, _cache) = use_case_with(
        Arc::new(analyzer),
        Arc::new(FakeEntitlements::all()),
        Arc::new(FakeGraphClient {
            response: GraphScanResponse::default(),
        }),
        cache_dir.path(),
    );
    let use_case = Arc::new(use_case);

    let progress = silent_progress(1);
    let first = {
        let use_case = Arc::clone(&use_case);
        let progress = Arc::clone(&progress);
        tokio::spawn(async move {
            let target = WorkspaceTarget::new("/workspace");
            use_case.execute(&target, progress).await
        })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    let target = WorkspaceTarget::new("/workspace");
    let err = use_case
        .execute(&target, silent_progress(1))
        .await
        .unwrap_err();
    assert!(matches!(err, ScanError::ScanInProgress(_)));

    progress.cancel();
    let first_outcome = first.await.unwrap();
    assert!(matches!(first_outcome, Err(ScanError::Cancelled)));
}

#[tokio::test]
async fn test_no_entitlements_and_no_descriptors_scans_nothing() {
    let cache_dir = tempfile::tempdir().unwrap();
    let analyzer = Arc::new(FakeAnalyzer::new());
    let (use_case, _cache) = use_case_with(
        Arc::clone(&analyzer) as Arc<dyn scanforge::AnalyzerExecutor>,
        Arc::new(FakeEntitlements::none()),
        Arc::new(FakeGraphClient {
            response: GraphScanResponse::default(),
        }),
        cache_dir.path(),
    );

    let target = WorkspaceTarget::new("/workspace");
    let results = use_case.execute(&target, silent_progress(1)).await.unwrap();
    assert!(results.is_none());
    assert!(analyzer.executed.lock().unwrap().is_empty());
}
