//! Severity model shared by every scanner family.
//!
//! Severities are ordered so that a container's displayed severity can be
//! derived as the maximum severity among its contained issues.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Issue severity, ordered from least to most severe.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
)]
pub enum Severity {
    #[default]
    Unknown,
    Information,
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Translate an analyzer result level into a severity.
    ///
    /// The analyzer reports SARIF-style levels; anything unrecognised maps to
    /// [`Severity::Unknown`].
    pub fn from_level(level: Option<&str>) -> Self {
        match level {
            Some("note") => Severity::Low,
            Some("warning") => Severity::Medium,
            Some("error") => Severity::High,
            _ => Severity::Unknown,
        }
    }

    /// Roll up the maximum severity of an issue collection.
    pub fn roll_up<I>(severities: I) -> Severity
    where
        I: IntoIterator<Item = Severity>,
    {
        severities
            .into_iter()
            .max()
            .unwrap_or(Severity::Unknown)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Severity::Unknown => "Unknown",
            Severity::Information => "Information",
            Severity::Low => "Low",
            Severity::Medium => "Medium",
            Severity::High => "High",
            Severity::Critical => "Critical",
        };
        f.write_str(name)
    }
}
