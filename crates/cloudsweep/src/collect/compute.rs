//! Compute family: EC2 instances and elastic IPs

use super::{RegionCollection, ResourceCollector, SubScan, run_subscan};
use crate::aws::api::{Ec2Api, drain_pages};
use crate::aws::records::{AddressRecord, InstanceRecord};
use cloudsweep_common::finding::{ElasticIpDetails, InstanceDetails};
use cloudsweep_common::tags::{NOT_AVAILABLE, name_from_tags, or_not_available};
use cloudsweep_common::{Finding, FindingDetails, ResourceType};
use std::sync::Arc;

pub const SUBSCAN_INSTANCES: &str = "compute.instances";
pub const SUBSCAN_ELASTIC_IPS: &str = "compute.elastic_ips";

/// Collects EC2 instances in every state, then elastic IPs
pub struct ComputeCollector<A> {
    api: Arc<A>,
}

impl<A: Ec2Api + 'static> ComputeCollector<A> {
    pub fn new(api: Arc<A>) -> Self {
        Self { api }
    }
}

impl<A: Ec2Api + 'static> ResourceCollector for ComputeCollector<A> {
    async fn collect(&self, region: &str) -> RegionCollection {
        let mut out = RegionCollection::new(region);
        let api = self.api.as_ref();

        let instances = run_subscan(
            SUBSCAN_INSTANCES,
            region,
            drain_pages(|token| api.describe_instances(region, token)),
        )
        .await;
        out.absorb(
            SUBSCAN_INSTANCES,
            instances.map(|records| {
                records
                    .into_iter()
                    .map(|r| instance_finding(region, r))
                    .collect()
            }),
        );

        let addresses: SubScan<Vec<AddressRecord>> =
            run_subscan(SUBSCAN_ELASTIC_IPS, region, api.describe_addresses(region)).await;
        out.absorb(
            SUBSCAN_ELASTIC_IPS,
            addresses.map(|records| {
                records
                    .into_iter()
                    .map(|r| elastic_ip_finding(region, r))
                    .collect()
            }),
        );

        out
    }
}

fn instance_finding(region: &str, record: InstanceRecord) -> Finding {
    Finding::new(
        region,
        ResourceType::Ec2Instance,
        &record.id,
        name_from_tags(&record.tags),
        &record.state,
        FindingDetails::Instance(InstanceDetails {
            instance_type: or_not_available(Some(record.instance_type.as_str())),
            platform: or_not_available(record.platform.as_deref()),
            availability_zone: or_not_available(record.availability_zone.as_deref()),
        }),
    )
    .with_created_at(record.launch_time)
}

fn elastic_ip_finding(region: &str, record: AddressRecord) -> Finding {
    let attached_to = record
        .instance_id
        .clone()
        .or_else(|| record.network_interface_id.clone());
    let status = if record.association_id.is_some() {
        "attached"
    } else {
        "detached"
    };

    Finding::new(
        region,
        ResourceType::ElasticIp,
        &record.public_ip,
        name_from_tags(&record.tags),
        status,
        FindingDetails::ElasticIp(ElasticIpDetails {
            allocation_id: record
                .allocation_id
                .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
            association_id: record.association_id,
            attached_to,
        }),
    )
}
