//! Storage family: EBS volumes and snapshots
//!
//! Volumes are listed twice, attached (`in-use`) then unattached
//! (`available`); both listings feed the volume index that snapshot
//! orphan checks run against.

use super::{RegionCollection, ResourceCollector, run_subscan};
use crate::aws::api::{Ec2Api, drain_pages};
use crate::aws::records::{EbsSnapshotRecord, VolumeRecord, VolumeStatus};
use crate::scan::analyzer::{ActiveResourceIndex, is_orphan_snapshot, is_orphan_volume};
use cloudsweep_common::finding::{EbsSnapshotDetails, VolumeDetails};
use cloudsweep_common::tags::{name_from_tags, or_not_available};
use cloudsweep_common::{Capacity, Finding, FindingDetails, ResourceType};
use std::sync::Arc;

pub const SUBSCAN_VOLUMES_IN_USE: &str = "storage.volumes_in_use";
pub const SUBSCAN_VOLUMES_AVAILABLE: &str = "storage.volumes_available";
pub const SUBSCAN_SNAPSHOTS: &str = "storage.snapshots";

pub struct StorageCollector<A> {
    api: Arc<A>,
}

impl<A: Ec2Api + 'static> StorageCollector<A> {
    pub fn new(api: Arc<A>) -> Self {
        Self { api }
    }
}

impl<A: Ec2Api + 'static> ResourceCollector for StorageCollector<A> {
    async fn collect(&self, region: &str) -> RegionCollection {
        let mut out = RegionCollection::new(region);
        let mut volume_index = ActiveResourceIndex::new();
        let api = self.api.as_ref();

        for (name, status) in [
            (SUBSCAN_VOLUMES_IN_USE, VolumeStatus::InUse),
            (SUBSCAN_VOLUMES_AVAILABLE, VolumeStatus::Available),
        ] {
            let volumes = run_subscan(
                name,
                region,
                drain_pages(|token| api.describe_volumes(region, status, token)),
            )
            .await;

            if let Some(records) = volumes.as_complete() {
                volume_index.extend(records.iter().map(|v| v.id.clone()));
            }
            out.absorb(
                name,
                volumes.map(|records| {
                    records
                        .into_iter()
                        .map(|r| volume_finding(region, r))
                        .collect()
                }),
            );
        }

        let snapshots = run_subscan(
            SUBSCAN_SNAPSHOTS,
            region,
            drain_pages(|token| api.describe_snapshots(region, token)),
        )
        .await;
        out.absorb(
            SUBSCAN_SNAPSHOTS,
            snapshots.map(|records| {
                records
                    .into_iter()
                    .map(|r| snapshot_finding(region, r, &volume_index))
                    .collect()
            }),
        );

        out
    }
}

fn volume_finding(region: &str, record: VolumeRecord) -> Finding {
    let orphan = is_orphan_volume(&record.state);
    Finding::new(
        region,
        ResourceType::EbsVolume,
        &record.id,
        name_from_tags(&record.tags),
        &record.state,
        FindingDetails::Volume(VolumeDetails {
            volume_type: or_not_available(Some(record.volume_type.as_str())),
            attached_to: record.attached_instance,
            encrypted: record.encrypted,
        }),
    )
    .with_size(Some(Capacity::gib(f64::from(record.size_gib))))
    .with_created_at(record.create_time)
    .with_orphan(orphan)
}

fn snapshot_finding(
    region: &str,
    record: EbsSnapshotRecord,
    volumes: &ActiveResourceIndex,
) -> Finding {
    let orphan = is_orphan_snapshot(record.volume_id.as_deref(), volumes);
    Finding::new(
        region,
        ResourceType::EbsSnapshot,
        &record.id,
        name_from_tags(&record.tags),
        &record.state,
        FindingDetails::EbsSnapshot(EbsSnapshotDetails {
            source_volume: record.volume_id,
            description: or_not_available(record.description.as_deref()),
            encrypted: record.encrypted,
        }),
    )
    .with_size(record.volume_size_gib.map(|s| Capacity::gib(f64::from(s))))
    .with_created_at(record.start_time)
    .with_orphan(orphan)
}
