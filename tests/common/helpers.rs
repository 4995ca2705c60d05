//! Test helper functions.

use std::sync::Arc;

use scanforge::application::progress::{ProgressUpdate, ScanProgress};
use scanforge::application::supported::EntitlementProvider;
use scanforge::domain::graph::DependencyGraphClient;
use scanforge::{AnalyzerExecutor, Config, FileCacheStore, ResultCache, ScanWorkspaceUseCase};

/// Build a use case wired with the given fakes and a file cache under `dir`.
pub fn use_case_with(
    executor: Arc<dyn AnalyzerExecutor>,
    entitlements: Arc<dyn EntitlementProvider>,
    graph_client: Arc<dyn DependencyGraphClient>,
    cache_dir: &std::path::Path,
) -> (ScanWorkspaceUseCase, Arc<ResultCache>) {
    let cache = Arc::new(ResultCache::new(Arc::new(FileCacheStore::new(
        cache_dir.to_path_buf(),
    ))));
    let use_case = ScanWorkspaceUseCase::new(
        executor,
        entitlements,
        graph_client,
        Arc::clone(&cache),
        Config::default(),
    );
    (use_case, cache)
}

/// A progress coordinator whose updates are dropped.
pub fn silent_progress(total_steps: usize) -> Arc<ScanProgress> {
    Arc::new(ScanProgress::new(
        total_steps,
        Arc::new(|_update: ProgressUpdate| {}),
    ))
}
