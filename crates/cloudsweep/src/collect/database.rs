//! Managed-database family
//!
//! Sub-scan order: DB instances, Aurora clusters, DB snapshots (manual then
//! automated), DB cluster snapshots (manual then automated), reserved DB
//! instances, DB proxies. Instances and clusters populate the active index
//! that both snapshot kinds are checked against.

use super::{RegionCollection, ResourceCollector, run_subscan};
use crate::aws::api::{RdsApi, drain_pages};
use crate::aws::records::{
    DbClusterRecord, DbClusterSnapshotRecord, DbInstanceRecord, DbProxyRecord, DbSnapshotRecord,
    ReservedDbInstanceRecord,
};
use crate::config::DatabaseToggles;
use crate::scan::analyzer::{ActiveResourceIndex, is_orphan_snapshot};
use cloudsweep_common::finding::{
    AuroraClusterDetails, DbClusterSnapshotDetails, DbInstanceDetails, DbProxyDetails,
    DbSnapshotDetails, ReservedDbInstanceDetails, SnapshotOrigin,
};
use cloudsweep_common::tags::{UNNAMED, name_from_tags, or_not_available};
use cloudsweep_common::{Capacity, Finding, FindingDetails, ResourceType};
use std::sync::Arc;

pub const SUBSCAN_INSTANCES: &str = "database.instances";
pub const SUBSCAN_CLUSTERS: &str = "database.clusters";
pub const SUBSCAN_RESERVED: &str = "database.reserved";
pub const SUBSCAN_PROXIES: &str = "database.proxies";

fn snapshot_subscan(origin: SnapshotOrigin) -> &'static str {
    match origin {
        SnapshotOrigin::Manual => "database.snapshots.manual",
        SnapshotOrigin::Automated => "database.snapshots.automated",
    }
}

fn cluster_snapshot_subscan(origin: SnapshotOrigin) -> &'static str {
    match origin {
        SnapshotOrigin::Manual => "database.cluster_snapshots.manual",
        SnapshotOrigin::Automated => "database.cluster_snapshots.automated",
    }
}

pub struct DatabaseCollector<A> {
    api: Arc<A>,
    toggles: DatabaseToggles,
}

impl<A: RdsApi + 'static> DatabaseCollector<A> {
    pub fn new(api: Arc<A>, toggles: DatabaseToggles) -> Self {
        Self { api, toggles }
    }
}

impl<A: RdsApi + 'static> ResourceCollector for DatabaseCollector<A> {
    async fn collect(&self, region: &str) -> RegionCollection {
        let mut out = RegionCollection::new(region);
        let mut index = ActiveResourceIndex::new();
        let api = self.api.as_ref();

        let instances = run_subscan(
            SUBSCAN_INSTANCES,
            region,
            drain_pages(|token| api.describe_db_instances(region, token)),
        )
        .await;
        if let Some(records) = instances.as_complete() {
            index.extend(records.iter().map(|r| r.id.clone()));
        }
        out.absorb(
            SUBSCAN_INSTANCES,
            instances.map(|records| {
                records
                    .into_iter()
                    .map(|r| db_instance_finding(region, r))
                    .collect()
            }),
        );

        if self.toggles.clusters {
            let clusters = run_subscan(
                SUBSCAN_CLUSTERS,
                region,
                drain_pages(|token| api.describe_db_clusters(region, token)),
            )
            .await;
            if let Some(records) = clusters.as_complete() {
                index.extend(records.iter().map(|r| r.id.clone()));
            }
            out.absorb(
                SUBSCAN_CLUSTERS,
                clusters.map(|records| {
                    records
                        .into_iter()
                        .map(|r| cluster_finding(region, r))
                        .collect()
                }),
            );
        }

        if self.toggles.snapshots {
            for origin in SnapshotOrigin::ALL {
                let name = snapshot_subscan(origin);
                let snapshots = run_subscan(
                    name,
                    region,
                    drain_pages(|token| api.describe_db_snapshots(region, origin, token)),
                )
                .await;
                out.absorb(
                    name,
                    snapshots.map(|records| {
                        records
                            .into_iter()
                            .map(|r| db_snapshot_finding(region, origin, r, &index))
                            .collect()
                    }),
                );
            }

            for origin in SnapshotOrigin::ALL {
                let name = cluster_snapshot_subscan(origin);
                let snapshots = run_subscan(
                    name,
                    region,
                    drain_pages(|token| api.describe_db_cluster_snapshots(region, origin, token)),
                )
                .await;
                out.absorb(
                    name,
                    snapshots.map(|records| {
                        records
                            .into_iter()
                            .map(|r| cluster_snapshot_finding(region, origin, r, &index))
                            .collect()
                    }),
                );
            }
        }

        if self.toggles.reserved {
            let reserved = run_subscan(
                SUBSCAN_RESERVED,
                region,
                drain_pages(|token| api.describe_reserved_db_instances(region, token)),
            )
            .await;
            out.absorb(
                SUBSCAN_RESERVED,
                reserved.map(|records| {
                    records
                        .into_iter()
                        .map(|r| reserved_finding(region, r))
                        .collect()
                }),
            );
        }

        if self.toggles.proxies {
            let proxies = run_subscan(
                SUBSCAN_PROXIES,
                region,
                drain_pages(|token| api.describe_db_proxies(region, token)),
            )
            .await;
            out.absorb(
                SUBSCAN_PROXIES,
                proxies.map(|records| {
                    records
                        .into_iter()
                        .map(|r| proxy_finding(region, r))
                        .collect()
                }),
            );
        }

        out
    }
}

fn gib(value: Option<i32>) -> Option<Capacity> {
    value.map(|v| Capacity::gib(f64::from(v)))
}

fn db_instance_finding(region: &str, record: DbInstanceRecord) -> Finding {
    Finding::new(
        region,
        ResourceType::DbInstance,
        &record.id,
        name_from_tags(&record.tags),
        &record.status,
        FindingDetails::DbInstance(DbInstanceDetails {
            instance_class: or_not_available(Some(record.instance_class.as_str())),
            engine: or_not_available(Some(record.engine.as_str())),
            storage_type: or_not_available(record.storage_type.as_deref()),
            iops: record.iops,
            multi_az: record.multi_az,
            encrypted: record.encrypted,
            availability_zone: or_not_available(record.availability_zone.as_deref()),
            cluster_id: record.cluster_id,
            publicly_accessible: record.publicly_accessible,
            backup_retention_days: record.backup_retention_days,
        }),
    )
    .with_size(gib(record.allocated_storage_gib))
    .with_created_at(record.created_at)
}

fn cluster_finding(region: &str, record: DbClusterRecord) -> Finding {
    Finding::new(
        region,
        ResourceType::AuroraCluster,
        &record.id,
        name_from_tags(&record.tags),
        &record.status,
        FindingDetails::AuroraCluster(AuroraClusterDetails {
            engine: or_not_available(Some(record.engine.as_str())),
            member_count: record.member_count,
            multi_az: record.multi_az,
            encrypted: record.encrypted,
            deletion_protection: record.deletion_protection,
            backup_retention_days: record.backup_retention_days,
        }),
    )
    .with_size(gib(record.allocated_storage_gib))
    .with_created_at(record.created_at)
}

fn db_snapshot_finding(
    region: &str,
    origin: SnapshotOrigin,
    record: DbSnapshotRecord,
    index: &ActiveResourceIndex,
) -> Finding {
    let orphan = is_orphan_snapshot(record.source_instance.as_deref(), index);
    Finding::new(
        region,
        ResourceType::DbSnapshot,
        &record.id,
        name_from_tags(&record.tags),
        &record.status,
        FindingDetails::DbSnapshot(DbSnapshotDetails {
            origin,
            source_instance: record.source_instance,
            engine: or_not_available(Some(record.engine.as_str())),
            encrypted: record.encrypted,
        }),
    )
    .with_size(gib(record.allocated_storage_gib))
    .with_created_at(record.created_at)
    .with_orphan(orphan)
}

fn cluster_snapshot_finding(
    region: &str,
    origin: SnapshotOrigin,
    record: DbClusterSnapshotRecord,
    index: &ActiveResourceIndex,
) -> Finding {
    let orphan = is_orphan_snapshot(record.source_cluster.as_deref(), index);
    Finding::new(
        region,
        ResourceType::DbClusterSnapshot,
        &record.id,
        name_from_tags(&record.tags),
        &record.status,
        FindingDetails::DbClusterSnapshot(DbClusterSnapshotDetails {
            origin,
            source_cluster: record.source_cluster,
            engine: or_not_available(Some(record.engine.as_str())),
            encrypted: record.encrypted,
        }),
    )
    .with_size(gib(record.allocated_storage_gib))
    .with_created_at(record.created_at)
    .with_orphan(orphan)
}

fn reserved_finding(region: &str, record: ReservedDbInstanceRecord) -> Finding {
    Finding::new(
        region,
        ResourceType::ReservedDbInstance,
        &record.id,
        UNNAMED,
        &record.state,
        FindingDetails::ReservedDbInstance(ReservedDbInstanceDetails {
            instance_class: or_not_available(Some(record.instance_class.as_str())),
            instance_count: record.instance_count,
            duration_secs: record.duration_secs,
            product: or_not_available(Some(record.product.as_str())),
            multi_az: record.multi_az,
        }),
    )
    .with_created_at(record.start_time)
}

fn proxy_finding(region: &str, record: DbProxyRecord) -> Finding {
    Finding::new(
        region,
        ResourceType::DbProxy,
        &record.name,
        &record.name,
        &record.status,
        FindingDetails::DbProxy(DbProxyDetails {
            engine_family: or_not_available(Some(record.engine_family.as_str())),
            vpc_id: or_not_available(record.vpc_id.as_deref()),
        }),
    )
    .with_created_at(record.created_at)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn db_snapshot_orphan_against_index() {
        let mut index = ActiveResourceIndex::new();
        index.extend(["db-live"]);
        let record = |source: &str| DbSnapshotRecord {
            id: format!("snap-of-{source}"),
            source_instance: Some(source.to_string()),
            status: "available".to_string(),
            allocated_storage_gib: Some(20),
            ..Default::default()
        };

        let live = db_snapshot_finding("us-east-1", SnapshotOrigin::Manual, record("db-live"), &index);
        let gone = db_snapshot_finding("us-east-1", SnapshotOrigin::Automated, record("db-gone"), &index);
        assert!(!live.is_orphan);
        assert!(gone.is_orphan);
        assert_eq!(gone.size_gib(), 20.0);
        match gone.details {
            FindingDetails::DbSnapshot(d) => assert_eq!(d.origin, SnapshotOrigin::Automated),
            other => panic!("unexpected details {other:?}"),
        }
    }

    #[test]
    fn subscan_names_are_distinct() {
        let mut names: Vec<_> = SnapshotOrigin::ALL
            .into_iter()
            .flat_map(|o| [snapshot_subscan(o), cluster_snapshot_subscan(o)])
            .collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), 4);
    }

    #[test]
    fn proxy_is_named_after_itself() {
        let finding = proxy_finding(
            "us-east-1",
            DbProxyRecord {
                name: "app-proxy".to_string(),
                engine_family: "POSTGRESQL".to_string(),
                status: "available".to_string(),
                ..Default::default()
            },
        );
        assert_eq!(finding.name, "app-proxy");
        assert_eq!(finding.resource_id, "app-proxy");
    }
}
