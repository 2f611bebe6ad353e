//! AWS SDK implementation of the provider ports
//!
//! Each call is single-shot: no retries are layered on top of the SDK
//! defaults. SDK errors are classified into [`AwsError`] and wrapped with
//! the operation and region as context.

use super::account::{AccountId, get_current_account_id};
use super::api::{AccountApi, Ec2Api, KmsApi, MetricsApi, Page, RdsApi};
use super::context::{AwsContext, ClientCache, RegionClients};
use super::error::classify_sdk_error;
use super::records::{
    AddressRecord, AliasRecord, DbClusterRecord, DbClusterSnapshotRecord, DbInstanceRecord,
    DbProxyRecord, DbSnapshotRecord, EbsSnapshotRecord, InstanceRecord, KeyMetadataRecord,
    KeyRecord, MetricQuery, NatGatewayRecord, RegionRecord, ReservedDbInstanceRecord, Tags,
    VolumeRecord, VolumeStatus,
};
use anyhow::{Context, Result};
use aws_sdk_ec2::primitives::DateTime as AwsDateTime;
use chrono::{DateTime, Utc};
use cloudsweep_common::finding::SnapshotOrigin;

/// Provider backed by the AWS SDK, shared by every region task
#[derive(Debug)]
pub struct AwsProvider {
    ctx: AwsContext,
    clients: ClientCache,
}

impl AwsProvider {
    pub fn new(ctx: AwsContext) -> Self {
        let clients = ClientCache::new(&ctx);
        Self { ctx, clients }
    }

    async fn clients(&self, region: &str) -> Result<RegionClients> {
        self.clients
            .get(region)
            .await
            .with_context(|| format!("Failed to create clients for {region}"))
    }
}

impl Ec2Api for AwsProvider {
    async fn describe_regions(&self, home_region: &str) -> Result<Vec<RegionRecord>> {
        let ec2 = self.clients(home_region).await?.ec2;
        let response = ec2
            .describe_regions()
            .all_regions(true)
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))
            .with_context(|| format!("DescribeRegions in {home_region}"))?;

        Ok(response
            .regions()
            .iter()
            .filter_map(|r| {
                Some(RegionRecord {
                    name: r.region_name()?.to_string(),
                    opt_in_status: r.opt_in_status().unwrap_or_default().to_string(),
                })
            })
            .collect())
    }

    async fn describe_instances(
        &self,
        region: &str,
        token: Option<String>,
    ) -> Result<Page<InstanceRecord>> {
        let ec2 = self.clients(region).await?.ec2;
        let response = ec2
            .describe_instances()
            .set_next_token(token)
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))
            .with_context(|| format!("DescribeInstances in {region}"))?;

        let items = response
            .reservations()
            .iter()
            .flat_map(|r| r.instances())
            .filter_map(|i| {
                Some(InstanceRecord {
                    id: i.instance_id()?.to_string(),
                    instance_type: i
                        .instance_type()
                        .map(|t| t.as_str().to_string())
                        .unwrap_or_default(),
                    state: i
                        .state()
                        .and_then(|s| s.name())
                        .map(|n| n.as_str().to_string())
                        .unwrap_or_default(),
                    launch_time: i.launch_time().and_then(to_utc),
                    platform: i.platform_details().map(str::to_string),
                    availability_zone: i
                        .placement()
                        .and_then(|p| p.availability_zone())
                        .map(str::to_string),
                    tags: ec2_tags(i.tags()),
                })
            })
            .collect();

        Ok(Page {
            items,
            next_token: response.next_token().map(str::to_string),
        })
    }

    async fn describe_volumes(
        &self,
        region: &str,
        status: VolumeStatus,
        token: Option<String>,
    ) -> Result<Page<VolumeRecord>> {
        let ec2 = self.clients(region).await?.ec2;
        let response = ec2
            .describe_volumes()
            .filters(
                aws_sdk_ec2::types::Filter::builder()
                    .name("status")
                    .values(status.as_str())
                    .build(),
            )
            .set_next_token(token)
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))
            .with_context(|| format!("DescribeVolumes ({}) in {region}", status.as_str()))?;

        let items = response
            .volumes()
            .iter()
            .filter_map(|v| {
                Some(VolumeRecord {
                    id: v.volume_id()?.to_string(),
                    size_gib: v.size().unwrap_or_default(),
                    volume_type: v
                        .volume_type()
                        .map(|t| t.as_str().to_string())
                        .unwrap_or_default(),
                    state: v
                        .state()
                        .map(|s| s.as_str().to_string())
                        .unwrap_or_default(),
                    attached_instance: v
                        .attachments()
                        .first()
                        .and_then(|a| a.instance_id())
                        .map(str::to_string),
                    create_time: v.create_time().and_then(to_utc),
                    encrypted: v.encrypted().unwrap_or_default(),
                    tags: ec2_tags(v.tags()),
                })
            })
            .collect();

        Ok(Page {
            items,
            next_token: response.next_token().map(str::to_string),
        })
    }

    async fn describe_snapshots(
        &self,
        region: &str,
        token: Option<String>,
    ) -> Result<Page<EbsSnapshotRecord>> {
        let ec2 = self.clients(region).await?.ec2;
        let response = ec2
            .describe_snapshots()
            .owner_ids("self")
            .set_next_token(token)
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))
            .with_context(|| format!("DescribeSnapshots in {region}"))?;

        let items = response
            .snapshots()
            .iter()
            .filter_map(|s| {
                Some(EbsSnapshotRecord {
                    id: s.snapshot_id()?.to_string(),
                    volume_id: s.volume_id().map(str::to_string),
                    volume_size_gib: s.volume_size(),
                    state: s
                        .state()
                        .map(|st| st.as_str().to_string())
                        .unwrap_or_default(),
                    description: s.description().map(str::to_string),
                    start_time: s.start_time().and_then(to_utc),
                    encrypted: s.encrypted().unwrap_or_default(),
                    tags: ec2_tags(s.tags()),
                })
            })
            .collect();

        Ok(Page {
            items,
            next_token: response.next_token().map(str::to_string),
        })
    }

    async fn describe_addresses(&self, region: &str) -> Result<Vec<AddressRecord>> {
        let ec2 = self.clients(region).await?.ec2;
        let response = ec2
            .describe_addresses()
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))
            .with_context(|| format!("DescribeAddresses in {region}"))?;

        Ok(response
            .addresses()
            .iter()
            .filter_map(|a| {
                Some(AddressRecord {
                    public_ip: a.public_ip()?.to_string(),
                    allocation_id: a.allocation_id().map(str::to_string),
                    association_id: a.association_id().map(str::to_string),
                    instance_id: a.instance_id().map(str::to_string),
                    network_interface_id: a.network_interface_id().map(str::to_string),
                    tags: ec2_tags(a.tags()),
                })
            })
            .collect())
    }

    async fn describe_nat_gateways(
        &self,
        region: &str,
        token: Option<String>,
    ) -> Result<Page<NatGatewayRecord>> {
        let ec2 = self.clients(region).await?.ec2;
        let response = ec2
            .describe_nat_gateways()
            .set_next_token(token)
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))
            .with_context(|| format!("DescribeNatGateways in {region}"))?;

        let items = response
            .nat_gateways()
            .iter()
            .filter_map(|n| {
                Some(NatGatewayRecord {
                    id: n.nat_gateway_id()?.to_string(),
                    state: n
                        .state()
                        .map(|s| s.as_str().to_string())
                        .unwrap_or_default(),
                    vpc_id: n.vpc_id().map(str::to_string),
                    subnet_id: n.subnet_id().map(str::to_string),
                    public_ip: n
                        .nat_gateway_addresses()
                        .first()
                        .and_then(|a| a.public_ip())
                        .map(str::to_string),
                    connectivity_type: n.connectivity_type().map(|c| c.as_str().to_string()),
                    create_time: n.create_time().and_then(to_utc),
                    tags: ec2_tags(n.tags()),
                })
            })
            .collect();

        Ok(Page {
            items,
            next_token: response.next_token().map(str::to_string),
        })
    }
}

impl RdsApi for AwsProvider {
    async fn describe_db_instances(
        &self,
        region: &str,
        token: Option<String>,
    ) -> Result<Page<DbInstanceRecord>> {
        let rds = self.clients(region).await?.rds;
        let response = rds
            .describe_db_instances()
            .set_marker(token)
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))
            .with_context(|| format!("DescribeDBInstances in {region}"))?;

        let items = response
            .db_instances()
            .iter()
            .filter_map(|d| {
                Some(DbInstanceRecord {
                    id: d.db_instance_identifier()?.to_string(),
                    instance_class: d.db_instance_class().unwrap_or_default().to_string(),
                    engine: d.engine().unwrap_or_default().to_string(),
                    status: d.db_instance_status().unwrap_or_default().to_string(),
                    allocated_storage_gib: d.allocated_storage(),
                    storage_type: d.storage_type().map(str::to_string),
                    iops: d.iops(),
                    multi_az: d.multi_az().unwrap_or_default(),
                    encrypted: d.storage_encrypted().unwrap_or_default(),
                    availability_zone: d.availability_zone().map(str::to_string),
                    cluster_id: d.db_cluster_identifier().map(str::to_string),
                    publicly_accessible: d.publicly_accessible().unwrap_or_default(),
                    backup_retention_days: d.backup_retention_period().unwrap_or_default(),
                    created_at: d.instance_create_time().and_then(to_utc),
                    tags: rds_tags(d.tag_list()),
                })
            })
            .collect();

        Ok(Page {
            items,
            next_token: response.marker().map(str::to_string),
        })
    }

    async fn describe_db_clusters(
        &self,
        region: &str,
        token: Option<String>,
    ) -> Result<Page<DbClusterRecord>> {
        let rds = self.clients(region).await?.rds;
        let response = rds
            .describe_db_clusters()
            .set_marker(token)
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))
            .with_context(|| format!("DescribeDBClusters in {region}"))?;

        let items = response
            .db_clusters()
            .iter()
            .filter_map(|c| {
                Some(DbClusterRecord {
                    id: c.db_cluster_identifier()?.to_string(),
                    engine: c.engine().unwrap_or_default().to_string(),
                    status: c.status().unwrap_or_default().to_string(),
                    allocated_storage_gib: c.allocated_storage(),
                    member_count: c.db_cluster_members().len(),
                    multi_az: c.multi_az().unwrap_or_default(),
                    encrypted: c.storage_encrypted().unwrap_or_default(),
                    deletion_protection: c.deletion_protection().unwrap_or_default(),
                    backup_retention_days: c.backup_retention_period().unwrap_or_default(),
                    created_at: c.cluster_create_time().and_then(to_utc),
                    tags: rds_tags(c.tag_list()),
                })
            })
            .collect();

        Ok(Page {
            items,
            next_token: response.marker().map(str::to_string),
        })
    }

    async fn describe_db_snapshots(
        &self,
        region: &str,
        origin: SnapshotOrigin,
        token: Option<String>,
    ) -> Result<Page<DbSnapshotRecord>> {
        let rds = self.clients(region).await?.rds;
        let response = rds
            .describe_db_snapshots()
            .snapshot_type(origin.as_str())
            .set_marker(token)
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))
            .with_context(|| format!("DescribeDBSnapshots ({}) in {region}", origin.as_str()))?;

        let items = response
            .db_snapshots()
            .iter()
            .filter_map(|s| {
                Some(DbSnapshotRecord {
                    id: s.db_snapshot_identifier()?.to_string(),
                    source_instance: s.db_instance_identifier().map(str::to_string),
                    status: s.status().unwrap_or_default().to_string(),
                    allocated_storage_gib: s.allocated_storage(),
                    engine: s.engine().unwrap_or_default().to_string(),
                    encrypted: s.encrypted().unwrap_or_default(),
                    created_at: s.snapshot_create_time().and_then(to_utc),
                    tags: rds_tags(s.tag_list()),
                })
            })
            .collect();

        Ok(Page {
            items,
            next_token: response.marker().map(str::to_string),
        })
    }

    async fn describe_db_cluster_snapshots(
        &self,
        region: &str,
        origin: SnapshotOrigin,
        token: Option<String>,
    ) -> Result<Page<DbClusterSnapshotRecord>> {
        let rds = self.clients(region).await?.rds;
        let response = rds
            .describe_db_cluster_snapshots()
            .snapshot_type(origin.as_str())
            .set_marker(token)
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))
            .with_context(|| {
                format!(
                    "DescribeDBClusterSnapshots ({}) in {region}",
                    origin.as_str()
                )
            })?;

        let items = response
            .db_cluster_snapshots()
            .iter()
            .filter_map(|s| {
                Some(DbClusterSnapshotRecord {
                    id: s.db_cluster_snapshot_identifier()?.to_string(),
                    source_cluster: s.db_cluster_identifier().map(str::to_string),
                    status: s.status().unwrap_or_default().to_string(),
                    allocated_storage_gib: s.allocated_storage(),
                    engine: s.engine().unwrap_or_default().to_string(),
                    encrypted: s.storage_encrypted().unwrap_or_default(),
                    created_at: s.snapshot_create_time().and_then(to_utc),
                    tags: rds_tags(s.tag_list()),
                })
            })
            .collect();

        Ok(Page {
            items,
            next_token: response.marker().map(str::to_string),
        })
    }

    async fn describe_reserved_db_instances(
        &self,
        region: &str,
        token: Option<String>,
    ) -> Result<Page<ReservedDbInstanceRecord>> {
        let rds = self.clients(region).await?.rds;
        let response = rds
            .describe_reserved_db_instances()
            .set_marker(token)
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))
            .with_context(|| format!("DescribeReservedDBInstances in {region}"))?;

        let items = response
            .reserved_db_instances()
            .iter()
            .filter_map(|r| {
                Some(ReservedDbInstanceRecord {
                    id: r.reserved_db_instance_id()?.to_string(),
                    instance_class: r.db_instance_class().unwrap_or_default().to_string(),
                    instance_count: r.db_instance_count().unwrap_or_default(),
                    duration_secs: r.duration().unwrap_or_default(),
                    product: r.product_description().unwrap_or_default().to_string(),
                    multi_az: r.multi_az().unwrap_or_default(),
                    state: r.state().unwrap_or_default().to_string(),
                    start_time: r.start_time().and_then(to_utc),
                })
            })
            .collect();

        Ok(Page {
            items,
            next_token: response.marker().map(str::to_string),
        })
    }

    async fn describe_db_proxies(
        &self,
        region: &str,
        token: Option<String>,
    ) -> Result<Page<DbProxyRecord>> {
        let rds = self.clients(region).await?.rds;
        let response = rds
            .describe_db_proxies()
            .set_marker(token)
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))
            .with_context(|| format!("DescribeDBProxies in {region}"))?;

        let items = response
            .db_proxies()
            .iter()
            .filter_map(|p| {
                Some(DbProxyRecord {
                    name: p.db_proxy_name()?.to_string(),
                    engine_family: p.engine_family().unwrap_or_default().to_string(),
                    vpc_id: p.vpc_id().map(str::to_string),
                    status: p
                        .status()
                        .map(|s| s.as_str().to_string())
                        .unwrap_or_default(),
                    created_at: p.created_date().and_then(to_utc),
                })
            })
            .collect();

        Ok(Page {
            items,
            next_token: response.marker().map(str::to_string),
        })
    }
}

impl KmsApi for AwsProvider {
    async fn list_keys(&self, region: &str, token: Option<String>) -> Result<Page<KeyRecord>> {
        let kms = self.clients(region).await?.kms;
        let response = kms
            .list_keys()
            .set_marker(token)
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))
            .with_context(|| format!("ListKeys in {region}"))?;

        let items = response
            .keys()
            .iter()
            .filter_map(|k| {
                Some(KeyRecord {
                    id: k.key_id()?.to_string(),
                    arn: k.key_arn().unwrap_or_default().to_string(),
                })
            })
            .collect();

        Ok(Page {
            items,
            next_token: kms_marker(response.truncated(), response.next_marker()),
        })
    }

    async fn list_aliases(&self, region: &str, token: Option<String>) -> Result<Page<AliasRecord>> {
        let kms = self.clients(region).await?.kms;
        let response = kms
            .list_aliases()
            .set_marker(token)
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))
            .with_context(|| format!("ListAliases in {region}"))?;

        let items = response
            .aliases()
            .iter()
            .filter_map(|a| {
                Some(AliasRecord {
                    name: a.alias_name()?.to_string(),
                    target_key_id: a.target_key_id().map(str::to_string),
                })
            })
            .collect();

        Ok(Page {
            items,
            next_token: kms_marker(response.truncated(), response.next_marker()),
        })
    }

    async fn describe_key(&self, region: &str, key_id: &str) -> Result<KeyMetadataRecord> {
        let kms = self.clients(region).await?.kms;
        let response = kms
            .describe_key()
            .key_id(key_id)
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))
            .with_context(|| format!("DescribeKey {key_id} in {region}"))?;

        let meta = response
            .key_metadata()
            .with_context(|| format!("DescribeKey {key_id} returned no metadata"))?;

        Ok(KeyMetadataRecord {
            id: meta.key_id().to_string(),
            arn: meta.arn().unwrap_or_default().to_string(),
            key_manager: meta
                .key_manager()
                .map(|m| m.as_str().to_string())
                .unwrap_or_default(),
            key_usage: meta
                .key_usage()
                .map(|u| u.as_str().to_string())
                .unwrap_or_default(),
            origin: meta
                .origin()
                .map(|o| o.as_str().to_string())
                .unwrap_or_default(),
            key_spec: meta
                .key_spec()
                .map(|s| s.as_str().to_string())
                .unwrap_or_default(),
            key_state: meta
                .key_state()
                .map(|s| s.as_str().to_string())
                .unwrap_or_default(),
            created_at: meta.creation_date().and_then(to_utc),
        })
    }

    async fn key_rotation_enabled(&self, region: &str, key_id: &str) -> Result<bool> {
        let kms = self.clients(region).await?.kms;
        let response = kms
            .get_key_rotation_status()
            .key_id(key_id)
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))
            .with_context(|| format!("GetKeyRotationStatus {key_id} in {region}"))?;

        Ok(response.key_rotation_enabled())
    }
}

impl MetricsApi for AwsProvider {
    async fn metric_sum(&self, region: &str, query: &MetricQuery) -> Result<f64> {
        use aws_sdk_cloudwatch::primitives::DateTime as CwDateTime;
        use aws_sdk_cloudwatch::types::{Dimension, Statistic};

        let cloudwatch = self.clients(region).await?.cloudwatch;
        let response = cloudwatch
            .get_metric_statistics()
            .namespace(&query.namespace)
            .metric_name(&query.metric_name)
            .dimensions(
                Dimension::builder()
                    .name(&query.dimension_name)
                    .value(&query.dimension_value)
                    .build(),
            )
            .start_time(CwDateTime::from_secs(query.start.timestamp()))
            .end_time(CwDateTime::from_secs(query.end.timestamp()))
            .period(query.period_secs)
            .statistics(Statistic::Sum)
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))
            .with_context(|| {
                format!(
                    "GetMetricStatistics {} for {} in {region}",
                    query.metric_name, query.dimension_value
                )
            })?;

        Ok(response.datapoints().iter().filter_map(|d| d.sum()).sum())
    }
}

impl AccountApi for AwsProvider {
    async fn caller_identity(&self) -> Result<AccountId> {
        get_current_account_id(self.ctx.sdk_config()).await
    }
}

/// KMS listings signal more pages through `truncated` plus `next_marker`
fn kms_marker(truncated: bool, next_marker: Option<&str>) -> Option<String> {
    if truncated {
        next_marker.map(str::to_string)
    } else {
        None
    }
}

fn to_utc(dt: &AwsDateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(dt.secs(), dt.subsec_nanos())
}

/// Extract tags from any AWS tag type into a map.
///
/// EC2 and RDS use different tag types but both have optional key/value
/// string fields.
fn extract_tags<T>(
    tags: &[T],
    key: impl Fn(&T) -> Option<&str>,
    value: impl Fn(&T) -> Option<&str>,
) -> Tags {
    tags.iter()
        .filter_map(|t| match (key(t), value(t)) {
            (Some(k), Some(v)) => Some((k.to_string(), v.to_string())),
            _ => None,
        })
        .collect()
}

fn ec2_tags(tags: &[aws_sdk_ec2::types::Tag]) -> Tags {
    extract_tags(tags, |t| t.key(), |t| t.value())
}

fn rds_tags(tags: &[aws_sdk_rds::types::Tag]) -> Tags {
    extract_tags(tags, |t| t.key(), |t| t.value())
}
