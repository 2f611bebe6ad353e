//! Provider ports
//!
//! Traits for the AWS queries a scan issues, so collectors can be driven
//! by [`super::AwsProvider`] in production and by an in-memory fake in
//! tests. Every method takes the region explicitly; paginated queries take
//! the token of the previous page and return a [`Page`].

use super::account::AccountId;
use super::records::{
    AddressRecord, AliasRecord, DbClusterRecord, DbClusterSnapshotRecord, DbInstanceRecord,
    DbProxyRecord, DbSnapshotRecord, EbsSnapshotRecord, InstanceRecord, KeyMetadataRecord,
    KeyRecord, MetricQuery, NatGatewayRecord, RegionRecord, ReservedDbInstanceRecord,
    VolumeRecord, VolumeStatus,
};
use anyhow::Result;
use cloudsweep_common::finding::SnapshotOrigin;
use std::future::Future;

/// One page of a paginated listing
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Token for the next page, `None` on the last page
    pub next_token: Option<String>,
}

impl<T> Page<T> {
    /// A single, final page
    pub fn last(items: Vec<T>) -> Self {
        Self {
            items,
            next_token: None,
        }
    }
}

/// Fetch every page of a listing, in order.
///
/// `fetch` is called with `None` first, then with each returned token until
/// a page comes back without one. An empty token also ends the listing.
pub async fn drain_pages<T, F, Fut>(mut fetch: F) -> Result<Vec<T>>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<Page<T>>>,
{
    let mut items = Vec::new();
    let mut token: Option<String> = None;

    loop {
        let page = fetch(token.take()).await?;
        items.extend(page.items);

        match page.next_token {
            Some(next) if !next.is_empty() => token = Some(next),
            _ => break,
        }
    }

    Ok(items)
}

/// EC2 queries: regions, instances, volumes, snapshots, addresses, NAT gateways
pub trait Ec2Api: Send + Sync {
    /// List all regions with their opt-in status, queried from `home_region`
    fn describe_regions(
        &self,
        home_region: &str,
    ) -> impl Future<Output = Result<Vec<RegionRecord>>> + Send;

    /// Instances in every state
    fn describe_instances(
        &self,
        region: &str,
        token: Option<String>,
    ) -> impl Future<Output = Result<Page<InstanceRecord>>> + Send;

    fn describe_volumes(
        &self,
        region: &str,
        status: VolumeStatus,
        token: Option<String>,
    ) -> impl Future<Output = Result<Page<VolumeRecord>>> + Send;

    /// Snapshots owned by the calling account
    fn describe_snapshots(
        &self,
        region: &str,
        token: Option<String>,
    ) -> impl Future<Output = Result<Page<EbsSnapshotRecord>>> + Send;

    /// Elastic IPs; the listing is not paginated
    fn describe_addresses(
        &self,
        region: &str,
    ) -> impl Future<Output = Result<Vec<AddressRecord>>> + Send;

    fn describe_nat_gateways(
        &self,
        region: &str,
        token: Option<String>,
    ) -> impl Future<Output = Result<Page<NatGatewayRecord>>> + Send;
}

/// RDS queries
pub trait RdsApi: Send + Sync {
    fn describe_db_instances(
        &self,
        region: &str,
        token: Option<String>,
    ) -> impl Future<Output = Result<Page<DbInstanceRecord>>> + Send;

    fn describe_db_clusters(
        &self,
        region: &str,
        token: Option<String>,
    ) -> impl Future<Output = Result<Page<DbClusterRecord>>> + Send;

    fn describe_db_snapshots(
        &self,
        region: &str,
        origin: SnapshotOrigin,
        token: Option<String>,
    ) -> impl Future<Output = Result<Page<DbSnapshotRecord>>> + Send;

    fn describe_db_cluster_snapshots(
        &self,
        region: &str,
        origin: SnapshotOrigin,
        token: Option<String>,
    ) -> impl Future<Output = Result<Page<DbClusterSnapshotRecord>>> + Send;

    fn describe_reserved_db_instances(
        &self,
        region: &str,
        token: Option<String>,
    ) -> impl Future<Output = Result<Page<ReservedDbInstanceRecord>>> + Send;

    fn describe_db_proxies(
        &self,
        region: &str,
        token: Option<String>,
    ) -> impl Future<Output = Result<Page<DbProxyRecord>>> + Send;
}

/// KMS queries
pub trait KmsApi: Send + Sync {
    fn list_keys(
        &self,
        region: &str,
        token: Option<String>,
    ) -> impl Future<Output = Result<Page<KeyRecord>>> + Send;

    fn list_aliases(
        &self,
        region: &str,
        token: Option<String>,
    ) -> impl Future<Output = Result<Page<AliasRecord>>> + Send;

    fn describe_key(
        &self,
        region: &str,
        key_id: &str,
    ) -> impl Future<Output = Result<KeyMetadataRecord>> + Send;

    fn key_rotation_enabled(
        &self,
        region: &str,
        key_id: &str,
    ) -> impl Future<Output = Result<bool>> + Send;
}

/// CloudWatch metric statistics
pub trait MetricsApi: Send + Sync {
    /// Sum of the `Sum` statistic over every datapoint of the query window
    fn metric_sum(
        &self,
        region: &str,
        query: &MetricQuery,
    ) -> impl Future<Output = Result<f64>> + Send;
}

/// Credential validation
pub trait AccountApi: Send + Sync {
    /// Account the configured credentials belong to
    fn caller_identity(&self) -> impl Future<Output = Result<AccountId>> + Send;
}

/// Everything a full scan needs from the provider
pub trait CloudApi: Ec2Api + RdsApi + KmsApi + MetricsApi + AccountApi {}

impl<T> CloudApi for T where T: Ec2Api + RdsApi + KmsApi + MetricsApi + AccountApi {}
