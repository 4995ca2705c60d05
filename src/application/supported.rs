//! Entitlement resolution for the scanner families.
//!
//! Which scanners may run is decided externally (platform entitlements); the
//! orchestrator only consumes the resolved flags. A failed check degrades
//! that single feature to "not entitled" instead of failing the scan.

use async_trait::async_trait;
use tracing::warn;

use crate::infrastructure::analyzer::request::ScanType;

/// Errors from the entitlement backend.
#[derive(Debug, thiserror::Error)]
pub enum EntitlementError {
    #[error("entitlement check failed: {0}")]
    Provider(String),
}

/// Seam for querying whether a scanner family is entitled to run.
#[async_trait]
pub trait EntitlementProvider: Send + Sync {
    async fn is_entitled(&self, scan_type: ScanType) -> Result<bool, EntitlementError>;
}

/// Resolved entitlement flags of one workspace scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SupportedScans {
    pub applicability: bool,
    pub sast: bool,
    pub iac: bool,
    pub secrets: bool,
}

impl SupportedScans {
    /// Resolve every flag concurrently.
    pub async fn resolve(provider: &dyn EntitlementProvider) -> Self {
        let (applicability, sast, iac, secrets) = tokio::join!(
            check(provider, ScanType::Applicability),
            check(provider, ScanType::Sast),
            check(provider, ScanType::Iac),
            check(provider, ScanType::Secrets),
        );
        Self {
            applicability,
            sast,
            iac,
            secrets,
        }
    }

    pub fn is_enabled(&self, scan_type: ScanType) -> bool {
        match scan_type {
            ScanType::Applicability => self.applicability,
            ScanType::Sast => self.sast,
            ScanType::Iac => self.iac,
            ScanType::Secrets => self.secrets,
        }
    }

    pub fn has_supported_scan(&self) -> bool {
        self.applicability || self.sast || self.iac || self.secrets
    }
}

async fn check(provider: &dyn EntitlementProvider, scan_type: ScanType) -> bool {
    match provider.is_entitled(scan_type).await {
        Ok(entitled) => entitled,
        Err(err) => {
            warn!(scan_type = %scan_type, error = %err, "Entitlement check failed, disabling scanner");
            false
        }
    }
}
