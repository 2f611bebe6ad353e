//! Plain records returned by the provider ports
//!
//! These mirror the subset of each AWS response the collectors read. The
//! SDK types stay inside [`super::provider`]; everything past the port
//! boundary works with these structs, which keeps the fake provider in
//! tests free of SDK builders.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Tag key/value pairs of a resource
pub type Tags = BTreeMap<String, String>;

/// One entry of the region listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionRecord {
    pub name: String,
    /// `opt-in-not-required`, `opted-in` or `not-opted-in`
    pub opt_in_status: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct InstanceRecord {
    pub id: String,
    pub instance_type: String,
    pub state: String,
    pub launch_time: Option<DateTime<Utc>>,
    pub platform: Option<String>,
    pub availability_zone: Option<String>,
    pub tags: Tags,
}

/// Volume status filter applied server-side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VolumeStatus {
    InUse,
    Available,
}

impl VolumeStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            VolumeStatus::InUse => "in-use",
            VolumeStatus::Available => "available",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct VolumeRecord {
    pub id: String,
    pub size_gib: i32,
    pub volume_type: String,
    pub state: String,
    /// First attachment's instance
    pub attached_instance: Option<String>,
    pub create_time: Option<DateTime<Utc>>,
    pub encrypted: bool,
    pub tags: Tags,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EbsSnapshotRecord {
    pub id: String,
    pub volume_id: Option<String>,
    pub volume_size_gib: Option<i32>,
    pub state: String,
    pub description: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub encrypted: bool,
    pub tags: Tags,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AddressRecord {
    pub public_ip: String,
    pub allocation_id: Option<String>,
    pub association_id: Option<String>,
    pub instance_id: Option<String>,
    pub network_interface_id: Option<String>,
    pub tags: Tags,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NatGatewayRecord {
    pub id: String,
    pub state: String,
    pub vpc_id: Option<String>,
    pub subnet_id: Option<String>,
    pub public_ip: Option<String>,
    pub connectivity_type: Option<String>,
    pub create_time: Option<DateTime<Utc>>,
    pub tags: Tags,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DbInstanceRecord {
    pub id: String,
    pub instance_class: String,
    pub engine: String,
    pub status: String,
    pub allocated_storage_gib: Option<i32>,
    pub storage_type: Option<String>,
    pub iops: Option<i32>,
    pub multi_az: bool,
    pub encrypted: bool,
    pub availability_zone: Option<String>,
    pub cluster_id: Option<String>,
    pub publicly_accessible: bool,
    pub backup_retention_days: i32,
    pub created_at: Option<DateTime<Utc>>,
    pub tags: Tags,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DbClusterRecord {
    pub id: String,
    pub engine: String,
    pub status: String,
    pub allocated_storage_gib: Option<i32>,
    pub member_count: usize,
    pub multi_az: bool,
    pub encrypted: bool,
    pub deletion_protection: bool,
    pub backup_retention_days: i32,
    pub created_at: Option<DateTime<Utc>>,
    pub tags: Tags,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DbSnapshotRecord {
    pub id: String,
    pub source_instance: Option<String>,
    pub status: String,
    pub allocated_storage_gib: Option<i32>,
    pub engine: String,
    pub encrypted: bool,
    pub created_at: Option<DateTime<Utc>>,
    pub tags: Tags,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DbClusterSnapshotRecord {
    pub id: String,
    pub source_cluster: Option<String>,
    pub status: String,
    pub allocated_storage_gib: Option<i32>,
    pub engine: String,
    pub encrypted: bool,
    pub created_at: Option<DateTime<Utc>>,
    pub tags: Tags,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReservedDbInstanceRecord {
    pub id: String,
    pub instance_class: String,
    pub instance_count: i32,
    pub duration_secs: i32,
    pub product: String,
    pub multi_az: bool,
    pub state: String,
    pub start_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DbProxyRecord {
    pub name: String,
    pub engine_family: String,
    pub vpc_id: Option<String>,
    pub status: String,
    pub created_at: Option<DateTime<Utc>>,
}

/// Entry of the key listing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyRecord {
    pub id: String,
    pub arn: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AliasRecord {
    pub name: String,
    pub target_key_id: Option<String>,
}

/// Result of describing a single key
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeyMetadataRecord {
    pub id: String,
    pub arn: String,
    /// `AWS` or `CUSTOMER`
    pub key_manager: String,
    /// e.g. `ENCRYPT_DECRYPT`, `SIGN_VERIFY`, `GENERATE_VERIFY_MAC`
    pub key_usage: String,
    /// e.g. `AWS_KMS`, `EXTERNAL`, `AWS_CLOUDHSM`
    pub origin: String,
    /// e.g. `SYMMETRIC_DEFAULT`, `RSA_2048`, `HMAC_256`
    pub key_spec: String,
    pub key_state: String,
    pub created_at: Option<DateTime<Utc>>,
}

/// A single metric statistics request summed over its datapoints
#[derive(Debug, Clone, PartialEq)]
pub struct MetricQuery {
    pub namespace: String,
    pub metric_name: String,
    pub dimension_name: String,
    pub dimension_value: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub period_secs: i32,
}
