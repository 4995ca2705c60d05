//! Scanforge: workspace security scan orchestration and issue normalization.
//!
//! The engine delegates the actual analysis to an external analyzer binary
//! (one verb per scanner family: CVE applicability, SAST, IaC, secrets) and a
//! dependency-graph scan service, then folds their heterogeneous outputs into
//! one severity-ranked, per-workspace issue aggregate.
//!
//! The main moving parts:
//!
//! - [`application::use_cases::ScanWorkspaceUseCase`] fans out the enabled
//!   scanners concurrently, contains individual failures, and persists the
//!   aggregate.
//! - [`application::progress::ScanProgress`] splits a percentage budget over
//!   steps and substeps and owns the per-scan cancellation token.
//! - [`infrastructure::analyzer`] holds the process protocol: request
//!   encoding, environment construction, timeout/cancellation enforcement,
//!   and one response normalizer per scanner family.
//! - [`infrastructure::cache::ResultCache`] persists the aggregate behind a
//!   versioned, TTL-bounded record.
//!
//! Editor integration (tree rendering, navigation, credential management,
//! binary distribution) lives outside this crate; so does descriptor
//! discovery and the dependency-graph build itself, which is consumed through
//! the [`domain::graph::DependencyGraphClient`] seam.

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use application::progress::{ProgressCallback, ProgressUpdate, ScanPhase, ScanProgress};
pub use application::supported::{EntitlementProvider, SupportedScans};
pub use application::use_cases::{ScanError, ScanWorkspaceUseCase, WorkspaceTarget};
pub use config::Config;
pub use domain::findings::{FileFindings, Region, SastIssue, SecurityIssue};
pub use domain::graph::{DependencyGraphClient, GraphScanResponse};
pub use domain::results::{Descriptor, PackageType, ScanResults};
pub use domain::severity::Severity;
pub use infrastructure::analyzer::process::AnalyzerProcess;
pub use infrastructure::analyzer::request::ScanType;
pub use infrastructure::analyzer::{AnalyzerError, AnalyzerExecutor};
pub use infrastructure::cache::{CacheRecord, FileCacheStore, ResultCache};
