//! Per-region resource collection
//!
//! One collector per family scans a region by running its sub-scans in a
//! fixed order. Each sub-scan yields a [`SubScan`]: either its result or a
//! recorded [`ScanIssue`]. A failed sub-scan contributes nothing and never
//! stops its siblings. The collector folds every sub-scan into a
//! [`RegionCollection`], which becomes the region's outcome.
//!
//! ## Families
//!
//! - [`compute`]: EC2 instances, elastic IPs
//! - [`storage`]: EBS volumes and snapshots
//! - [`database`]: RDS instances, Aurora clusters, snapshots, reservations, proxies
//! - [`keys`]: KMS keys with rotation status
//! - [`gateway`]: NAT gateways with traffic

pub mod compute;
pub mod database;
pub mod gateway;
pub mod keys;
pub mod storage;

use crate::aws::api::CloudApi;
use crate::aws::error::classify_anyhow_error;
use crate::config::{DatabaseToggles, FamilyToggles};
use anyhow::Result;
use chrono::{DateTime, Utc};
use cloudsweep_common::{
    FailureCategory, Finding, IssueKind, RegionError, RegionOutcome, ScanIssue,
};
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

pub use compute::ComputeCollector;
pub use database::DatabaseCollector;
pub use gateway::NatGatewayCollector;
pub use keys::KeyCollector;
pub use storage::StorageCollector;

/// Stat key counting failed sub-scans
pub const STAT_SUBSCANS_FAILED: &str = "subscans.failed";

/// Result of one sub-scan
#[derive(Debug)]
pub enum SubScan<T> {
    Complete(T),
    Failed(ScanIssue),
}

impl<T> SubScan<T> {
    /// Wrap a sub-scan result, logging and recording a failure
    pub fn from_result(name: &str, region: &str, result: Result<T>) -> Self {
        match result {
            Ok(value) => SubScan::Complete(value),
            Err(e) => {
                let classified = classify_anyhow_error(&e);
                warn!(
                    region = %region,
                    subscan = name,
                    category = classified.category().as_str(),
                    error = %format!("{e:#}"),
                    "Sub-scan failed"
                );
                SubScan::Failed(ScanIssue {
                    kind: IssueKind::SubScanPartial,
                    subscan: name.to_string(),
                    resource_id: None,
                    category: classified.category(),
                    code: classified.code().map(str::to_string),
                    message: format!("{e:#}"),
                })
            }
        }
    }

    pub fn as_complete(&self) -> Option<&T> {
        match self {
            SubScan::Complete(value) => Some(value),
            SubScan::Failed(_) => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> SubScan<U> {
        match self {
            SubScan::Complete(value) => SubScan::Complete(f(value)),
            SubScan::Failed(issue) => SubScan::Failed(issue),
        }
    }
}

/// Run one sub-scan to completion
pub async fn run_subscan<T>(
    name: &str,
    region: &str,
    scan: impl Future<Output = Result<T>>,
) -> SubScan<T> {
    let result = scan.await;
    SubScan::from_result(name, region, result)
}

/// Everything collected for one region so far
#[derive(Debug, Clone, Default)]
pub struct RegionCollection {
    pub region: String,
    pub findings: Vec<Finding>,
    pub stats: BTreeMap<String, u64>,
    pub issues: Vec<ScanIssue>,
    subscans_run: usize,
    subscans_failed: usize,
}

impl RegionCollection {
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            ..Default::default()
        }
    }

    /// Fold a sub-scan's findings into the collection
    pub fn absorb(&mut self, name: &str, subscan: SubScan<Vec<Finding>>) {
        self.subscans_run += 1;
        match subscan {
            SubScan::Complete(findings) => {
                debug!(region = %self.region, subscan = name, count = findings.len(), "Sub-scan complete");
                self.stats.insert(name.to_string(), findings.len() as u64);
                self.findings.extend(findings);
            }
            SubScan::Failed(issue) => {
                self.subscans_failed += 1;
                *self
                    .stats
                    .entry(STAT_SUBSCANS_FAILED.to_string())
                    .or_default() += 1;
                self.issues.push(issue);
            }
        }
    }

    /// Record a sub-scan that only feeds an index or lookup map
    pub fn track<T>(&mut self, name: &str, subscan: &SubScan<T>, count: impl FnOnce(&T) -> usize) {
        self.subscans_run += 1;
        match subscan {
            SubScan::Complete(value) => {
                self.stats.insert(name.to_string(), count(value) as u64);
            }
            SubScan::Failed(issue) => {
                self.subscans_failed += 1;
                *self
                    .stats
                    .entry(STAT_SUBSCANS_FAILED.to_string())
                    .or_default() += 1;
                self.issues.push(issue.clone());
            }
        }
    }

    /// Record a per-resource metric or status failure; the resource is kept
    pub fn metric_unavailable(
        &mut self,
        subscan: &str,
        resource_id: &str,
        error: &anyhow::Error,
    ) {
        let classified = classify_anyhow_error(error);
        debug!(
            region = %self.region,
            subscan,
            resource_id,
            error = %format!("{error:#}"),
            "Metric unavailable"
        );
        self.issues.push(ScanIssue {
            kind: IssueKind::MetricUnavailable,
            subscan: subscan.to_string(),
            resource_id: Some(resource_id.to_string()),
            category: classified.category(),
            code: classified.code().map(str::to_string),
            message: format!("{error:#}"),
        });
    }

    /// Merge another family's collection for the same region
    pub fn merge(&mut self, other: RegionCollection) {
        self.findings.extend(other.findings);
        for (key, value) in other.stats {
            *self.stats.entry(key).or_default() += value;
        }
        self.issues.extend(other.issues);
        self.subscans_run += other.subscans_run;
        self.subscans_failed += other.subscans_failed;
    }

    pub fn subscans_run(&self) -> usize {
        self.subscans_run
    }

    pub fn subscans_failed(&self) -> usize {
        self.subscans_failed
    }

    /// Every sub-scan ran and every one failed
    pub fn all_failed(&self) -> bool {
        self.subscans_run > 0 && self.subscans_failed == self.subscans_run
    }

    /// Convert into the region's outcome.
    ///
    /// A region where every sub-scan failed is unavailable; the error takes
    /// the category and code of the first failure.
    pub fn into_outcome(self, duration_ms: u64) -> RegionOutcome {
        let error = if self.all_failed() {
            let first = self
                .issues
                .iter()
                .find(|i| i.kind == IssueKind::SubScanPartial);
            Some(RegionError::Unavailable {
                category: first.map_or(FailureCategory::Other, |i| i.category),
                code: first.and_then(|i| i.code.clone()),
                message: first.map_or_else(
                    || "every sub-scan failed".to_string(),
                    |i| i.message.clone(),
                ),
            })
        } else {
            None
        };

        RegionOutcome {
            region: self.region,
            findings: self.findings,
            stats: self.stats,
            issues: self.issues,
            error,
            duration_ms,
        }
    }
}

/// Scans one family (or several) in a single region
pub trait ResourceCollector: Send + Sync + 'static {
    /// Run every sub-scan for `region`, in order
    fn collect(&self, region: &str) -> impl Future<Output = RegionCollection> + Send;
}

/// Every enabled family collector, run in family order
pub struct FamilyCollectors<P> {
    compute: Option<ComputeCollector<P>>,
    storage: Option<StorageCollector<P>>,
    database: Option<DatabaseCollector<P>>,
    keys: Option<KeyCollector<P>>,
    gateway: Option<NatGatewayCollector<P>>,
}

impl<P: CloudApi + 'static> FamilyCollectors<P> {
    pub fn new(provider: Arc<P>, families: FamilyToggles, database: DatabaseToggles) -> Self {
        Self {
            compute: families
                .compute
                .then(|| ComputeCollector::new(Arc::clone(&provider))),
            storage: families
                .storage
                .then(|| StorageCollector::new(Arc::clone(&provider))),
            database: families
                .database
                .then(|| DatabaseCollector::new(Arc::clone(&provider), database)),
            keys: families.keys.then(|| KeyCollector::new(Arc::clone(&provider))),
            gateway: families
                .gateway
                .then(|| NatGatewayCollector::new(Arc::clone(&provider))),
        }
    }

    /// Evaluate NAT gateway age against a fixed time instead of the clock
    pub fn with_reference_time(mut self, now: DateTime<Utc>) -> Self {
        self.gateway = self.gateway.map(|g| g.with_reference_time(now));
        self
    }
}

impl<P: CloudApi + 'static> ResourceCollector for FamilyCollectors<P> {
    async fn collect(&self, region: &str) -> RegionCollection {
        let mut collection = RegionCollection::new(region);

        if let Some(compute) = &self.compute {
            collection.merge(compute.collect(region).await);
        }
        if let Some(storage) = &self.storage {
            collection.merge(storage.collect(region).await);
        }
        if let Some(database) = &self.database {
            collection.merge(database.collect(region).await);
        }
        if let Some(keys) = &self.keys {
            collection.merge(keys.collect(region).await);
        }
        if let Some(gateway) = &self.gateway {
            collection.merge(gateway.collect(region).await);
        }

        collection
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aws::error::AwsError;

    fn denied() -> anyhow::Error {
        anyhow::Error::from(AwsError::AccessDenied {
            code: "UnauthorizedOperation".to_string(),
            message: "no".to_string(),
        })
    }

    #[test]
    fn failed_subscan_records_issue() {
        let mut collection = RegionCollection::new("us-east-1");
        collection.absorb(
            "compute.instances",
            SubScan::<Vec<Finding>>::from_result("compute.instances", "us-east-1", Err(denied())),
        );
        collection.absorb("compute.elastic_ips", SubScan::Complete(Vec::new()));

        assert_eq!(collection.issues.len(), 1);
        assert_eq!(collection.issues[0].kind, IssueKind::SubScanPartial);
        assert_eq!(collection.issues[0].category, FailureCategory::AccessDenied);
        assert_eq!(collection.stats[STAT_SUBSCANS_FAILED], 1);
        assert_eq!(collection.stats["compute.elastic_ips"], 0);
        assert!(!collection.all_failed());

        let outcome = collection.into_outcome(3);
        assert!(outcome.error.is_none());
    }

    #[test]
    fn all_failed_becomes_region_error() {
        let mut collection = RegionCollection::new("eu-west-1");
        for name in ["a", "b"] {
            collection.absorb(
                name,
                SubScan::<Vec<Finding>>::from_result(name, "eu-west-1", Err(denied())),
            );
        }

        let outcome = collection.into_outcome(1);
        match outcome.error {
            Some(RegionError::Unavailable { category, code, .. }) => {
                assert_eq!(category, FailureCategory::AccessDenied);
                assert_eq!(code.as_deref(), Some("UnauthorizedOperation"));
            }
            other => panic!("expected unavailable, got {other:?}"),
        }
    }

    #[test]
    fn metric_failures_do_not_fail_region() {
        let mut collection = RegionCollection::new("us-east-1");
        collection.absorb("gateway.nat_gateways", SubScan::Complete(Vec::new()));
        collection.metric_unavailable("gateway.nat_gateways", "nat-1", &denied());

        assert_eq!(collection.issues[0].kind, IssueKind::MetricUnavailable);
        assert_eq!(collection.issues[0].resource_id.as_deref(), Some("nat-1"));
        assert!(collection.into_outcome(0).error.is_none());
    }

    #[test]
    fn merge_sums_stats() {
        let mut a = RegionCollection::new("us-east-1");
        a.absorb("x", SubScan::Complete(Vec::new()));
        let mut b = RegionCollection::new("us-east-1");
        b.absorb(
            "y",
            SubScan::<Vec<Finding>>::from_result("y", "us-east-1", Err(denied())),
        );
        a.merge(b);

        assert_eq!(a.subscans_run(), 2);
        assert_eq!(a.subscans_failed(), 1);
        assert_eq!(a.stats[STAT_SUBSCANS_FAILED], 1);
    }
}
