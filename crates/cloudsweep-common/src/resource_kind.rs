//! Resource types and the collector family each one belongs to
//!
//! The display label of a [`ResourceType`] is also its grouping key in
//! report summaries, so labels must stay stable across releases.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Collector family. One collector per family scans a region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceFamily {
    /// EC2 instances and elastic IPs
    Compute,
    /// EBS volumes and snapshots
    Storage,
    /// RDS instances, Aurora clusters, their snapshots, reservations and proxies
    Database,
    /// KMS keys
    Keys,
    /// NAT gateways
    Gateway,
}

impl ResourceFamily {
    /// All families in scan order
    pub const ALL: [ResourceFamily; 5] = [
        ResourceFamily::Compute,
        ResourceFamily::Storage,
        ResourceFamily::Database,
        ResourceFamily::Keys,
        ResourceFamily::Gateway,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ResourceFamily::Compute => "compute",
            ResourceFamily::Storage => "storage",
            ResourceFamily::Database => "database",
            ResourceFamily::Keys => "keys",
            ResourceFamily::Gateway => "gateway",
        }
    }

    /// Parse a family name as accepted on the command line
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "compute" | "ec2" => Some(ResourceFamily::Compute),
            "storage" | "ebs" => Some(ResourceFamily::Storage),
            "database" | "rds" => Some(ResourceFamily::Database),
            "keys" | "kms" => Some(ResourceFamily::Keys),
            "gateway" | "nat" => Some(ResourceFamily::Gateway),
            _ => None,
        }
    }
}

impl fmt::Display for ResourceFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of cloud resource a finding describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ResourceType {
    #[serde(rename = "EC2 Instance")]
    Ec2Instance,
    #[serde(rename = "Elastic IP")]
    ElasticIp,
    /// Both attached and unattached volumes; unattached ones carry the orphan flag
    #[serde(rename = "EBS Volume")]
    EbsVolume,
    #[serde(rename = "EBS Snapshot")]
    EbsSnapshot,
    #[serde(rename = "DB Instance")]
    DbInstance,
    #[serde(rename = "Aurora Cluster")]
    AuroraCluster,
    #[serde(rename = "DB Snapshot")]
    DbSnapshot,
    #[serde(rename = "DB Cluster Snapshot")]
    DbClusterSnapshot,
    #[serde(rename = "Reserved DB Instance")]
    ReservedDbInstance,
    #[serde(rename = "DB Proxy")]
    DbProxy,
    #[serde(rename = "KMS Key")]
    KmsKey,
    #[serde(rename = "NAT Gateway")]
    NatGateway,
}

impl ResourceType {
    /// Human-readable label, also used as the summary grouping key
    pub fn as_str(self) -> &'static str {
        match self {
            ResourceType::Ec2Instance => "EC2 Instance",
            ResourceType::ElasticIp => "Elastic IP",
            ResourceType::EbsVolume => "EBS Volume",
            ResourceType::EbsSnapshot => "EBS Snapshot",
            ResourceType::DbInstance => "DB Instance",
            ResourceType::AuroraCluster => "Aurora Cluster",
            ResourceType::DbSnapshot => "DB Snapshot",
            ResourceType::DbClusterSnapshot => "DB Cluster Snapshot",
            ResourceType::ReservedDbInstance => "Reserved DB Instance",
            ResourceType::DbProxy => "DB Proxy",
            ResourceType::KmsKey => "KMS Key",
            ResourceType::NatGateway => "NAT Gateway",
        }
    }

    /// Family whose collector produces this resource type
    pub fn family(self) -> ResourceFamily {
        match self {
            ResourceType::Ec2Instance | ResourceType::ElasticIp => ResourceFamily::Compute,
            ResourceType::EbsVolume | ResourceType::EbsSnapshot => ResourceFamily::Storage,
            ResourceType::DbInstance
            | ResourceType::AuroraCluster
            | ResourceType::DbSnapshot
            | ResourceType::DbClusterSnapshot
            | ResourceType::ReservedDbInstance
            | ResourceType::DbProxy => ResourceFamily::Database,
            ResourceType::KmsKey => ResourceFamily::Keys,
            ResourceType::NatGateway => ResourceFamily::Gateway,
        }
    }

    /// Whether this type is derived from another live resource (orphan candidates)
    pub fn is_derived(self) -> bool {
        matches!(
            self,
            ResourceType::EbsSnapshot | ResourceType::DbSnapshot | ResourceType::DbClusterSnapshot
        )
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
