//! In-memory AWS provider
//!
//! [`FakeProvider`] implements every provider port from per-region
//! [`RegionFixture`]s. Failures can be injected per region or per
//! operation, listings can be split into pages, and every call is recorded
//! so tests can assert on what was (or was not) queried.

use anyhow::Result;
use cloudsweep::aws::api::{AccountApi, Ec2Api, KmsApi, MetricsApi, Page, RdsApi};
use cloudsweep::aws::error::AwsError;
use cloudsweep::aws::records::{
    AddressRecord, AliasRecord, DbClusterRecord, DbClusterSnapshotRecord, DbInstanceRecord,
    DbProxyRecord, DbSnapshotRecord, EbsSnapshotRecord, InstanceRecord, KeyMetadataRecord,
    KeyRecord, MetricQuery, NatGatewayRecord, RegionRecord, ReservedDbInstanceRecord,
    VolumeRecord, VolumeStatus,
};
use cloudsweep::aws::AccountId;
use cloudsweep_common::finding::SnapshotOrigin;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// Account id returned by [`FakeProvider::caller_identity`]
pub const FAKE_ACCOUNT_ID: &str = "123456789012";

/// Get the AWS region for live tests.
///
/// Checks `AWS_REGION`, then `AWS_DEFAULT_REGION`, then falls back to
/// `us-east-1`.
pub fn get_test_region() -> String {
    std::env::var("AWS_REGION")
        .or_else(|_| std::env::var("AWS_DEFAULT_REGION"))
        .unwrap_or_else(|_| "us-east-1".to_string())
}

/// Provider operations, for failure injection and call assertions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    DescribeRegions,
    DescribeInstances,
    DescribeVolumes,
    DescribeSnapshots,
    DescribeAddresses,
    DescribeNatGateways,
    DescribeDbInstances,
    DescribeDbClusters,
    DescribeDbSnapshots,
    DescribeDbClusterSnapshots,
    DescribeReservedDbInstances,
    DescribeDbProxies,
    ListKeys,
    ListAliases,
    DescribeKey,
    GetKeyRotationStatus,
    GetMetricStatistics,
    GetCallerIdentity,
}

/// One recorded provider call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub region: String,
    pub operation: Operation,
    /// Key id or metric dimension, for per-resource calls
    pub resource: Option<String>,
}

/// Everything that exists in one fake region
#[derive(Debug, Clone, Default)]
pub struct RegionFixture {
    pub instances: Vec<InstanceRecord>,
    /// Served to both volume listings, filtered by `state`
    pub volumes: Vec<VolumeRecord>,
    pub snapshots: Vec<EbsSnapshotRecord>,
    pub addresses: Vec<AddressRecord>,
    pub nat_gateways: Vec<NatGatewayRecord>,
    pub db_instances: Vec<DbInstanceRecord>,
    pub db_clusters: Vec<DbClusterRecord>,
    pub db_snapshots: HashMap<SnapshotOrigin, Vec<DbSnapshotRecord>>,
    pub db_cluster_snapshots: HashMap<SnapshotOrigin, Vec<DbClusterSnapshotRecord>>,
    pub reserved_db_instances: Vec<ReservedDbInstanceRecord>,
    pub db_proxies: Vec<DbProxyRecord>,
    pub keys: Vec<KeyRecord>,
    pub aliases: Vec<AliasRecord>,
    /// Metadata by key id; a key without metadata fails to describe
    pub key_metadata: HashMap<String, KeyMetadataRecord>,
    /// Rotation flag by key id; missing keys report disabled
    pub key_rotation: HashMap<String, bool>,
    /// Metric sum by (dimension value, metric name); missing entries sum to 0
    pub metrics: HashMap<(String, String), f64>,
}

/// In-memory implementation of every provider port
#[derive(Debug, Default)]
pub struct FakeProvider {
    regions: Vec<RegionRecord>,
    fixtures: HashMap<String, RegionFixture>,
    empty: RegionFixture,
    region_failures: HashMap<String, AwsError>,
    operation_failures: HashMap<(String, Operation), AwsError>,
    no_credentials: bool,
    page_size: Option<usize>,
    delay: Option<Duration>,
    calls: Mutex<Vec<Call>>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl FakeProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a region to the region listing
    pub fn with_listed_region(mut self, name: &str, opt_in_status: &str) -> Self {
        self.regions.push(RegionRecord {
            name: name.to_string(),
            opt_in_status: opt_in_status.to_string(),
        });
        self
    }

    /// Resources served for `region`; also lists the region as enabled
    pub fn with_region(mut self, region: &str, fixture: RegionFixture) -> Self {
        if !self.regions.iter().any(|r| r.name == region) {
            self = self.with_listed_region(region, "opt-in-not-required");
        }
        self.fixtures.insert(region.to_string(), fixture);
        self
    }

    /// Every call in `region` fails with `error`
    pub fn fail_region(mut self, region: &str, error: AwsError) -> Self {
        self.region_failures.insert(region.to_string(), error);
        self
    }

    /// `operation` fails with `error` in `region`
    pub fn fail_operation(mut self, region: &str, operation: Operation, error: AwsError) -> Self {
        self.operation_failures
            .insert((region.to_string(), operation), error);
        self
    }

    /// Credential validation fails
    pub fn without_credentials(mut self) -> Self {
        self.no_credentials = true;
        self
    }

    /// Split every paginated listing into pages of `size` items
    pub fn with_page_size(mut self, size: usize) -> Self {
        self.page_size = Some(size.max(1));
        self
    }

    /// Sleep this long inside every call
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Every call made so far, in order
    pub fn calls(&self) -> Vec<Call> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Calls of one operation, in order
    pub fn calls_to(&self, operation: Operation) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| c.operation == operation)
            .collect()
    }

    /// Highest number of calls that were in flight at the same time
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    fn fixture(&self, region: &str) -> &RegionFixture {
        self.fixtures.get(region).unwrap_or(&self.empty)
    }

    async fn call(&self, region: &str, operation: Operation, resource: Option<&str>) -> Result<()> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Call {
                region: region.to_string(),
                operation,
                resource: resource.map(str::to_string),
            });

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let failure = self
            .region_failures
            .get(region)
            .or_else(|| self.operation_failures.get(&(region.to_string(), operation)));
        match failure {
            Some(error) => Err(anyhow::Error::from(error.clone())
                .context(format!("{operation:?} failed in {region}"))),
            None => Ok(()),
        }
    }

    fn page<T: Clone>(&self, items: &[T], token: Option<String>) -> Page<T> {
        let Some(size) = self.page_size else {
            return Page::last(items.to_vec());
        };
        let start = token
            .and_then(|t| t.parse::<usize>().ok())
            .unwrap_or(0)
            .min(items.len());
        let end = (start + size).min(items.len());
        Page {
            items: items[start..end].to_vec(),
            next_token: (end < items.len()).then(|| end.to_string()),
        }
    }
}

impl Ec2Api for FakeProvider {
    async fn describe_regions(&self, home_region: &str) -> Result<Vec<RegionRecord>> {
        self.call(home_region, Operation::DescribeRegions, None).await?;
        Ok(self.regions.clone())
    }

    async fn describe_instances(
        &self,
        region: &str,
        token: Option<String>,
    ) -> Result<Page<InstanceRecord>> {
        self.call(region, Operation::DescribeInstances, None).await?;
        Ok(self.page(&self.fixture(region).instances, token))
    }

    async fn describe_volumes(
        &self,
        region: &str,
        status: VolumeStatus,
        token: Option<String>,
    ) -> Result<Page<VolumeRecord>> {
        self.call(region, Operation::DescribeVolumes, Some(status.as_str()))
            .await?;
        let volumes: Vec<VolumeRecord> = self
            .fixture(region)
            .volumes
            .iter()
            .filter(|v| v.state == status.as_str())
            .cloned()
            .collect();
        Ok(self.page(&volumes, token))
    }

    async fn describe_snapshots(
        &self,
        region: &str,
        token: Option<String>,
    ) -> Result<Page<EbsSnapshotRecord>> {
        self.call(region, Operation::DescribeSnapshots, None).await?;
        Ok(self.page(&self.fixture(region).snapshots, token))
    }

    async fn describe_addresses(&self, region: &str) -> Result<Vec<AddressRecord>> {
        self.call(region, Operation::DescribeAddresses, None).await?;
        Ok(self.fixture(region).addresses.clone())
    }

    async fn describe_nat_gateways(
        &self,
        region: &str,
        token: Option<String>,
    ) -> Result<Page<NatGatewayRecord>> {
        self.call(region, Operation::DescribeNatGateways, None).await?;
        Ok(self.page(&self.fixture(region).nat_gateways, token))
    }
}

impl RdsApi for FakeProvider {
    async fn describe_db_instances(
        &self,
        region: &str,
        token: Option<String>,
    ) -> Result<Page<DbInstanceRecord>> {
        self.call(region, Operation::DescribeDbInstances, None).await?;
        Ok(self.page(&self.fixture(region).db_instances, token))
    }

    async fn describe_db_clusters(
        &self,
        region: &str,
        token: Option<String>,
    ) -> Result<Page<DbClusterRecord>> {
        self.call(region, Operation::DescribeDbClusters, None).await?;
        Ok(self.page(&self.fixture(region).db_clusters, token))
    }

    async fn describe_db_snapshots(
        &self,
        region: &str,
        origin: SnapshotOrigin,
        token: Option<String>,
    ) -> Result<Page<DbSnapshotRecord>> {
        self.call(region, Operation::DescribeDbSnapshots, Some(origin.as_str()))
            .await?;
        let snapshots = self
            .fixture(region)
            .db_snapshots
            .get(&origin)
            .map(Vec::as_slice)
            .unwrap_or_default();
        Ok(self.page(snapshots, token))
    }

    async fn describe_db_cluster_snapshots(
        &self,
        region: &str,
        origin: SnapshotOrigin,
        token: Option<String>,
    ) -> Result<Page<DbClusterSnapshotRecord>> {
        self.call(
            region,
            Operation::DescribeDbClusterSnapshots,
            Some(origin.as_str()),
        )
        .await?;
        let snapshots = self
            .fixture(region)
            .db_cluster_snapshots
            .get(&origin)
            .map(Vec::as_slice)
            .unwrap_or_default();
        Ok(self.page(snapshots, token))
    }

    async fn describe_reserved_db_instances(
        &self,
        region: &str,
        token: Option<String>,
    ) -> Result<Page<ReservedDbInstanceRecord>> {
        self.call(region, Operation::DescribeReservedDbInstances, None)
            .await?;
        Ok(self.page(&self.fixture(region).reserved_db_instances, token))
    }

    async fn describe_db_proxies(
        &self,
        region: &str,
        token: Option<String>,
    ) -> Result<Page<DbProxyRecord>> {
        self.call(region, Operation::DescribeDbProxies, None).await?;
        Ok(self.page(&self.fixture(region).db_proxies, token))
    }
}

impl KmsApi for FakeProvider {
    async fn list_keys(&self, region: &str, token: Option<String>) -> Result<Page<KeyRecord>> {
        self.call(region, Operation::ListKeys, None).await?;
        Ok(self.page(&self.fixture(region).keys, token))
    }

    async fn list_aliases(
        &self,
        region: &str,
        token: Option<String>,
    ) -> Result<Page<AliasRecord>> {
        self.call(region, Operation::ListAliases, None).await?;
        Ok(self.page(&self.fixture(region).aliases, token))
    }

    async fn describe_key(&self, region: &str, key_id: &str) -> Result<KeyMetadataRecord> {
        self.call(region, Operation::DescribeKey, Some(key_id)).await?;
        self.fixture(region)
            .key_metadata
            .get(key_id)
            .cloned()
            .ok_or_else(|| {
                anyhow::Error::from(AwsError::NotFound {
                    code: "NotFoundException".to_string(),
                    message: format!("key {key_id} does not exist"),
                })
            })
    }

    async fn key_rotation_enabled(&self, region: &str, key_id: &str) -> Result<bool> {
        self.call(region, Operation::GetKeyRotationStatus, Some(key_id))
            .await?;
        Ok(self
            .fixture(region)
            .key_rotation
            .get(key_id)
            .copied()
            .unwrap_or(false))
    }
}

impl MetricsApi for FakeProvider {
    async fn metric_sum(&self, region: &str, query: &MetricQuery) -> Result<f64> {
        self.call(
            region,
            Operation::GetMetricStatistics,
            Some(&query.dimension_value),
        )
        .await?;
        Ok(self
            .fixture(region)
            .metrics
            .get(&(query.dimension_value.clone(), query.metric_name.clone()))
            .copied()
            .unwrap_or(0.0))
    }
}

impl AccountApi for FakeProvider {
    async fn caller_identity(&self) -> Result<AccountId> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Call {
                region: String::new(),
                operation: Operation::GetCallerIdentity,
                resource: None,
            });
        if self.no_credentials {
            return Err(anyhow::Error::from(AwsError::AccessDenied {
                code: "InvalidClientTokenId".to_string(),
                message: "The security token included in the request is invalid".to_string(),
            })
            .context("Failed to get AWS caller identity - check credentials"));
        }
        Ok(AccountId::new(FAKE_ACCOUNT_ID))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cloudsweep::aws::api::drain_pages;

    fn instance(id: &str) -> InstanceRecord {
        InstanceRecord {
            id: id.to_string(),
            state: "running".to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn pages_through_listing() {
        let fake = FakeProvider::new()
            .with_region(
                "us-east-1",
                RegionFixture {
                    instances: vec![instance("i-1"), instance("i-2"), instance("i-3")],
                    ..Default::default()
                },
            )
            .with_page_size(2);

        let first = fake.describe_instances("us-east-1", None).await.unwrap();
        assert_eq!(first.items.len(), 2);
        assert_eq!(first.next_token.as_deref(), Some("2"));

        let all = drain_pages(|token| fake.describe_instances("us-east-1", token))
            .await
            .unwrap();
        let ids: Vec<_> = all.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, ["i-1", "i-2", "i-3"]);
    }

    #[tokio::test]
    async fn injected_failures_carry_aws_error() {
        let fake = FakeProvider::new()
            .with_region("us-east-1", RegionFixture::default())
            .fail_operation(
                "us-east-1",
                Operation::DescribeSnapshots,
                AwsError::Throttled {
                    code: "RequestLimitExceeded".to_string(),
                },
            );

        assert!(fake.describe_instances("us-east-1", None).await.is_ok());
        let err = fake.describe_snapshots("us-east-1", None).await.unwrap_err();
        assert!(err.downcast_ref::<AwsError>().is_some_and(AwsError::is_throttled));
        assert_eq!(fake.calls().len(), 2);
    }

    #[tokio::test]
    async fn unknown_region_is_empty() {
        let fake = FakeProvider::new();
        let page = fake.describe_instances("ap-south-1", None).await.unwrap();
        assert!(page.items.is_empty());
        assert!(page.next_token.is_none());
    }

    #[tokio::test]
    async fn missing_credentials() {
        let fake = FakeProvider::new().without_credentials();
        assert!(fake.caller_identity().await.is_err());
        let ok = FakeProvider::new().caller_identity().await.unwrap();
        assert_eq!(ok.into_inner(), FAKE_ACCOUNT_ID);
    }
}
