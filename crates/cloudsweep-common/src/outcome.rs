//! Per-region scan outcomes
//!
//! Exactly one [`RegionOutcome`] exists per requested region, whether the
//! region scanned cleanly, partially, or not at all. Failures are carried
//! as data: a region-level [`RegionError`] or a list of non-fatal
//! [`ScanIssue`]s.

use crate::finding::Finding;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Coarse classification of a provider failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCategory {
    /// Rate limited by the provider
    Throttled,
    /// Credentials lack permission or were rejected
    AccessDenied,
    /// Region is not enabled for the account
    OptInRequired,
    /// Anything else (transient network errors, unknown codes)
    Other,
}

impl FailureCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            FailureCategory::Throttled => "throttled",
            FailureCategory::AccessDenied => "access_denied",
            FailureCategory::OptInRequired => "opt_in_required",
            FailureCategory::Other => "other",
        }
    }
}

/// Why a whole region produced no usable result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RegionError {
    /// Provider calls for the region failed
    Unavailable {
        category: FailureCategory,
        code: Option<String>,
        message: String,
    },
    /// The region task panicked or was lost by the runtime
    TaskFailed { message: String },
    /// The scan was interrupted before the region completed
    Interrupted,
}

impl RegionError {
    /// Short label used in summary tables
    pub fn label(&self) -> String {
        match self {
            RegionError::Unavailable { category, code, .. } => match code {
                Some(code) => format!("unavailable ({code})"),
                None => format!("unavailable ({})", category.as_str()),
            },
            RegionError::TaskFailed { .. } => "task failed".to_string(),
            RegionError::Interrupted => "interrupted".to_string(),
        }
    }
}

impl fmt::Display for RegionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegionError::Unavailable { message, .. } => write!(f, "region unavailable: {message}"),
            RegionError::TaskFailed { message } => write!(f, "region task failed: {message}"),
            RegionError::Interrupted => f.write_str("scan interrupted"),
        }
    }
}

/// Kind of non-fatal problem recorded during a region scan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// A sub-scan failed and contributed no findings
    SubScanPartial,
    /// A per-resource metric or status query failed; the resource was kept
    MetricUnavailable,
}

/// Non-fatal problem recorded during a region scan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanIssue {
    pub kind: IssueKind,
    /// Sub-scan that hit the problem (e.g. `storage.snapshots`)
    pub subscan: String,
    /// Resource the problem concerns, for metric failures
    pub resource_id: Option<String>,
    pub category: FailureCategory,
    pub code: Option<String>,
    pub message: String,
}

/// Result of scanning one region
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionOutcome {
    pub region: String,
    /// Findings in sub-scan order, then provider page order
    pub findings: Vec<Finding>,
    /// Counters such as `compute.instances` or `subscans.failed`
    pub stats: BTreeMap<String, u64>,
    pub issues: Vec<ScanIssue>,
    pub error: Option<RegionError>,
    pub duration_ms: u64,
}

impl RegionOutcome {
    /// Outcome for a region that produced no result
    pub fn failed(region: impl Into<String>, error: RegionError) -> Self {
        Self {
            region: region.into(),
            findings: Vec::new(),
            stats: BTreeMap::new(),
            issues: Vec::new(),
            error: Some(error),
            duration_ms: 0,
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    pub fn flagged_count(&self) -> usize {
        self.findings.iter().filter(|f| f.is_flagged()).count()
    }
}
