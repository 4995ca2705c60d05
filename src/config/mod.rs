//! Configuration for the scan engine.
//!
//! Every section deserializes with defaults so a partial configuration file
//! is always usable.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub platform: PlatformConfig,
    pub proxy: ProxyConfig,
    pub analyzer: AnalyzerConfig,
    pub cache: CacheConfig,
    pub scanners: ScannersConfig,
    pub logging: LoggingConfig,
}

/// Connection details of the security platform the analyzer talks to.
///
/// Either an access token or a username/password pair must be present for the
/// credentials to count as complete.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformConfig {
    pub url: String,
    pub access_token: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl PlatformConfig {
    pub fn has_complete_credentials(&self) -> bool {
        if self.url.is_empty() {
            return false;
        }
        let has_token = self
            .access_token
            .as_deref()
            .is_some_and(|token| !token.is_empty());
        let has_basic = self
            .username
            .as_deref()
            .is_some_and(|user| !user.is_empty())
            && self
                .password
                .as_deref()
                .is_some_and(|password| !password.is_empty());
        has_token || has_basic
    }
}

/// Optional HTTP/HTTPS proxy settings forwarded to the analyzer process.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    pub http_proxy: Option<String>,
    pub https_proxy: Option<String>,
    pub auth: Option<ProxyAuth>,
}

/// Proxy authentication: basic credentials embed into the proxy URL, a bearer
/// token is appended as a query parameter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "scheme", rename_all = "lowercase")]
pub enum ProxyAuth {
    Basic { username: String, password: String },
    Bearer { token: String },
}

/// External analyzer binary settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// Path to the analyzer executable.
    pub binary_path: PathBuf,
    /// Wall-clock budget for a single analyzer run, in seconds.
    pub timeout_seconds: u64,
    /// When set, the analyzer writes its execution log here instead of
    /// stdout/stderr.
    pub log_directory: Option<PathBuf>,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            binary_path: PathBuf::from("analyzer"),
            timeout_seconds: 300,
            log_directory: None,
        }
    }
}

impl AnalyzerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// Result cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Directory the file-backed cache store writes into.
    pub directory: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from(".scanforge/cache"),
        }
    }
}

/// Per-scanner options shared across a workspace scan.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannersConfig {
    /// Glob patterns excluded from every scanner run.
    pub exclude_patterns: Vec<String>,
    pub sast: SastScannerConfig,
    pub applicability: ApplicabilityScannerConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SastScannerConfig {
    /// Restrict the SAST scan to a single language when set.
    pub language: Option<String>,
    /// Rule ids the SAST scanner must not report.
    pub excluded_rules: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicabilityScannerConfig {
    /// Disable the analyzer's grep pre-filter pass.
    pub grep_disable: bool,
    /// Folders skipped during evidence collection.
    pub skip_folders: Vec<String>,
}

/// Logging settings forwarded to the analyzer process.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}
