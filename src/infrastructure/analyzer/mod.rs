//! External analyzer integration: process execution, request encoding, and
//! per-family response normalization.

pub mod applicability;
pub mod iac;
pub mod models;
pub mod normalize;
pub mod process;
pub mod request;
pub mod runner;
pub mod sast;
pub mod secrets;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use request::ScanType;

/// Exit codes the analyzer uses for well-known failure classes.
pub const EXIT_NOT_ENTITLED: i32 = 31;
pub const EXIT_NOT_SUPPORTED: i32 = 13;
pub const EXIT_OS_NOT_SUPPORTED: i32 = 55;

/// Errors from analyzer invocation and response handling.
#[derive(Debug, thiserror::Error)]
pub enum AnalyzerError {
    #[error("analyzer binary not found at {0}")]
    NotInstalled(PathBuf),

    #[error("platform credentials are incomplete")]
    MissingCredentials,

    #[error("not entitled to run {0} scanning")]
    NotEntitled(ScanType),

    #[error("{0} scanning is not supported")]
    NotSupported(ScanType),

    #[error("{0} scanning is not supported on this operating system")]
    OsNotSupported(ScanType),

    #[error("analyzer run timed out after {0} seconds")]
    Timeout(u64),

    #[error("scan was cancelled")]
    Cancelled,

    #[error("analyzer exited with status {code:?}: {stderr}")]
    Process { code: Option<i32>, stderr: String },

    #[error("analyzer produced no response at {0}")]
    MissingResponse(PathBuf),

    #[error("failed to encode analyzer request: {0}")]
    Encode(#[from] serde_yml::Error),

    #[error("failed to parse analyzer response: {0}")]
    MalformedResponse(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl AnalyzerError {
    /// True for failures a scanner run may swallow: the scanner then simply
    /// contributes no findings. Everything else either aborts the workspace
    /// scan (cancellation) or needs classified handling by the orchestrator.
    pub fn is_containable(&self) -> bool {
        matches!(
            self,
            AnalyzerError::Timeout(_)
                | AnalyzerError::Process { .. }
                | AnalyzerError::MissingResponse(_)
                | AnalyzerError::Encode(_)
                | AnalyzerError::MalformedResponse(_)
                | AnalyzerError::Io(_)
        )
    }

    /// The reason surfaced on a failed-file record for this error.
    pub fn failed_file_reason(&self) -> &'static str {
        match self {
            AnalyzerError::NotInstalled(_) => "[Not installed]",
            AnalyzerError::NotSupported(_) | AnalyzerError::OsNotSupported(_) => "[Not supported]",
            _ => "[Fail to scan]",
        }
    }
}

/// Captured output of a finished analyzer process.
#[derive(Debug, Clone, Default)]
pub struct ProcessOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Seam for invoking the analyzer binary.
///
/// The production implementation spawns the external process; tests substitute
/// one that fabricates responses.
#[async_trait]
pub trait AnalyzerExecutor: Send + Sync {
    /// Run `<binary> <verb> <config path>` to completion.
    async fn execute(
        &self,
        scan_type: ScanType,
        config_path: &Path,
        cancel: &CancellationToken,
    ) -> Result<ProcessOutput, AnalyzerError>;

    /// True when the analyzer binary is present on this machine.
    fn is_installed(&self) -> bool;
}
