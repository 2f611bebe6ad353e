//! Findings: one record per discovered resource
//!
//! A [`Finding`] carries the fields every resource shares (region, id,
//! name, size, status, orphan/zombie flags) plus [`FindingDetails`], a
//! tagged enum holding the strongly-typed attributes of each resource
//! kind. Serialized, the details appear under the `metadata` key so a
//! JSON record lines up field-for-field with the report schema.

use crate::resource_kind::ResourceType;
use crate::tags::{NOT_AVAILABLE, format_timestamp};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unit of a [`Capacity`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CapacityUnit {
    #[serde(rename = "GiB")]
    GiB,
}

impl CapacityUnit {
    pub fn as_str(self) -> &'static str {
        match self {
            CapacityUnit::GiB => "GiB",
        }
    }
}

/// Size or capacity of a resource
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Capacity {
    pub value: f64,
    pub unit: CapacityUnit,
}

impl Capacity {
    /// Capacity expressed in GiB
    pub fn gib(value: f64) -> Self {
        Self {
            value,
            unit: CapacityUnit::GiB,
        }
    }
}

impl fmt::Display for Capacity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.value, self.unit.as_str())
    }
}

/// One discovered resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub region: String,
    pub resource_type: ResourceType,
    pub resource_id: String,
    pub name: String,
    pub size: Option<Capacity>,
    pub created_at: Option<DateTime<Utc>>,
    pub status: String,
    /// Derived resource whose owner is gone, or a volume nobody attached
    pub is_orphan: bool,
    /// Live resource with negligible utilization
    pub is_zombie: bool,
    #[serde(rename = "metadata")]
    pub details: FindingDetails,
}

impl Finding {
    /// Create a finding with no size, timestamp or flags set
    pub fn new(
        region: impl Into<String>,
        resource_type: ResourceType,
        resource_id: impl Into<String>,
        name: impl Into<String>,
        status: impl Into<String>,
        details: FindingDetails,
    ) -> Self {
        Self {
            region: region.into(),
            resource_type,
            resource_id: resource_id.into(),
            name: name.into(),
            size: None,
            created_at: None,
            status: status.into(),
            is_orphan: false,
            is_zombie: false,
            details,
        }
    }

    pub fn with_size(mut self, size: Option<Capacity>) -> Self {
        self.size = size;
        self
    }

    pub fn with_created_at(mut self, created_at: Option<DateTime<Utc>>) -> Self {
        self.created_at = created_at;
        self
    }

    pub fn with_orphan(mut self, is_orphan: bool) -> Self {
        self.is_orphan = is_orphan;
        self
    }

    pub fn with_zombie(mut self, is_zombie: bool) -> Self {
        self.is_zombie = is_zombie;
        self
    }

    /// Orphaned or zombie: a cost-waste candidate
    pub fn is_flagged(&self) -> bool {
        self.is_orphan || self.is_zombie
    }

    /// Size in GiB, zero when the resource has no size
    pub fn size_gib(&self) -> f64 {
        match self.size {
            Some(Capacity {
                value,
                unit: CapacityUnit::GiB,
            }) => value,
            None => 0.0,
        }
    }

    /// Creation time for display, `N/A` when unknown
    pub fn created_at_display(&self) -> String {
        format_timestamp(self.created_at)
    }

    /// Size for display, `N/A` when the resource has no size
    pub fn size_display(&self) -> String {
        self.size
            .map(|s| s.to_string())
            .unwrap_or_else(|| NOT_AVAILABLE.to_string())
    }

    /// Short label for the waste classification
    pub fn flag_label(&self) -> &'static str {
        match (self.is_orphan, self.is_zombie) {
            (true, _) => "ORPHAN",
            (false, true) => "ZOMBIE",
            (false, false) => "",
        }
    }
}

/// Per-kind attributes of a finding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FindingDetails {
    Instance(InstanceDetails),
    ElasticIp(ElasticIpDetails),
    Volume(VolumeDetails),
    EbsSnapshot(EbsSnapshotDetails),
    DbInstance(DbInstanceDetails),
    AuroraCluster(AuroraClusterDetails),
    DbSnapshot(DbSnapshotDetails),
    DbClusterSnapshot(DbClusterSnapshotDetails),
    ReservedDbInstance(ReservedDbInstanceDetails),
    DbProxy(DbProxyDetails),
    KmsKey(KmsKeyDetails),
    NatGateway(NatGatewayDetails),
}

impl FindingDetails {
    /// Details as a JSON object, for flat sinks such as CSV
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceDetails {
    pub instance_type: String,
    pub platform: String,
    pub availability_zone: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElasticIpDetails {
    pub allocation_id: String,
    pub association_id: Option<String>,
    pub attached_to: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeDetails {
    pub volume_type: String,
    pub attached_to: Option<String>,
    pub encrypted: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EbsSnapshotDetails {
    pub source_volume: Option<String>,
    pub description: String,
    pub encrypted: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DbInstanceDetails {
    pub instance_class: String,
    pub engine: String,
    pub storage_type: String,
    pub iops: Option<i32>,
    pub multi_az: bool,
    pub encrypted: bool,
    pub availability_zone: String,
    pub cluster_id: Option<String>,
    pub publicly_accessible: bool,
    pub backup_retention_days: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuroraClusterDetails {
    pub engine: String,
    pub member_count: usize,
    pub multi_az: bool,
    pub encrypted: bool,
    pub deletion_protection: bool,
    pub backup_retention_days: i32,
}

/// Manual or automated RDS snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotOrigin {
    Manual,
    Automated,
}

impl SnapshotOrigin {
    /// Both origins in scan order
    pub const ALL: [SnapshotOrigin; 2] = [SnapshotOrigin::Manual, SnapshotOrigin::Automated];

    /// Value of the provider's snapshot type filter
    pub fn as_str(self) -> &'static str {
        match self {
            SnapshotOrigin::Manual => "manual",
            SnapshotOrigin::Automated => "automated",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DbSnapshotDetails {
    pub origin: SnapshotOrigin,
    pub source_instance: Option<String>,
    pub engine: String,
    pub encrypted: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DbClusterSnapshotDetails {
    pub origin: SnapshotOrigin,
    pub source_cluster: Option<String>,
    pub engine: String,
    pub encrypted: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReservedDbInstanceDetails {
    pub instance_class: String,
    pub instance_count: i32,
    pub duration_secs: i32,
    pub product: String,
    pub multi_az: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DbProxyDetails {
    pub engine_family: String,
    pub vpc_id: String,
}

/// Why rotation status was not queried for a key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RotationSkipReason {
    /// Key is managed by the provider
    AwsManaged,
    /// Key usage is not ENCRYPT_DECRYPT
    NotEncryptDecrypt,
    /// Key material was imported
    ExternalKeyMaterial,
    /// Asymmetric or HMAC key spec
    AsymmetricOrHmac,
}

impl RotationSkipReason {
    pub fn as_str(self) -> &'static str {
        match self {
            RotationSkipReason::AwsManaged => "AWS_MANAGED",
            RotationSkipReason::NotEncryptDecrypt => "NOT_ENCRYPT_DECRYPT",
            RotationSkipReason::ExternalKeyMaterial => "EXTERNAL_KEY_MATERIAL",
            RotationSkipReason::AsymmetricOrHmac => "ASYMMETRIC_OR_HMAC",
        }
    }
}

/// Automatic key rotation state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RotationStatus {
    Enabled,
    Disabled,
    /// Rotation status query failed
    Unknown,
    NotApplicable { reason: RotationSkipReason },
}

impl RotationStatus {
    pub fn label(&self) -> &'static str {
        match self {
            RotationStatus::Enabled => "enabled",
            RotationStatus::Disabled => "disabled",
            RotationStatus::Unknown => "unknown",
            RotationStatus::NotApplicable { reason } => reason.as_str(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KmsKeyDetails {
    pub alias: String,
    pub arn: String,
    pub key_manager: String,
    pub key_usage: String,
    pub origin: String,
    pub key_spec: String,
    pub rotation: RotationStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NatGatewayDetails {
    pub vpc_id: String,
    pub subnet_id: String,
    pub public_ip: String,
    pub connectivity_type: String,
    /// Ingress plus egress over the traffic window, GiB rounded to 2 decimals
    pub traffic_gb: f64,
    /// False when at least one traffic metric could not be read
    pub traffic_complete: bool,
}
