//! Record builders for test fixtures
//!
//! Each builder fills the fields a collector reads and leaves the rest at
//! their defaults.

use chrono::{DateTime, Duration, TimeZone, Utc};
use cloudsweep::aws::error::AwsError;
use cloudsweep::aws::records::{
    DbClusterRecord, DbClusterSnapshotRecord, DbInstanceRecord, DbProxyRecord, DbSnapshotRecord,
    EbsSnapshotRecord, InstanceRecord, KeyMetadataRecord, KeyRecord, NatGatewayRecord,
    ReservedDbInstanceRecord, Tags, VolumeRecord,
};

/// Fixed "now" for time-based rules
pub fn reference_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0)
        .single()
        .unwrap_or_default()
}

/// Tags holding only a `Name`
pub fn named(name: &str) -> Tags {
    Tags::from([("Name".to_string(), name.to_string())])
}

pub fn instance(id: &str, state: &str) -> InstanceRecord {
    InstanceRecord {
        id: id.to_string(),
        instance_type: "t3.micro".to_string(),
        state: state.to_string(),
        launch_time: Some(reference_time() - Duration::days(10)),
        availability_zone: Some("us-east-1a".to_string()),
        ..Default::default()
    }
}

/// Volume attached to `instance`
pub fn attached_volume(id: &str, size_gib: i32, instance: &str) -> VolumeRecord {
    VolumeRecord {
        id: id.to_string(),
        size_gib,
        volume_type: "gp3".to_string(),
        state: "in-use".to_string(),
        attached_instance: Some(instance.to_string()),
        ..Default::default()
    }
}

/// Volume with no attachment
pub fn unattached_volume(id: &str, size_gib: i32) -> VolumeRecord {
    VolumeRecord {
        id: id.to_string(),
        size_gib,
        volume_type: "gp3".to_string(),
        state: "available".to_string(),
        ..Default::default()
    }
}

pub fn ebs_snapshot(id: &str, volume_id: Option<&str>, size_gib: i32) -> EbsSnapshotRecord {
    EbsSnapshotRecord {
        id: id.to_string(),
        volume_id: volume_id.map(str::to_string),
        volume_size_gib: Some(size_gib),
        state: "completed".to_string(),
        ..Default::default()
    }
}

pub fn db_instance(id: &str, storage_gib: i32) -> DbInstanceRecord {
    DbInstanceRecord {
        id: id.to_string(),
        instance_class: "db.t3.micro".to_string(),
        engine: "postgres".to_string(),
        status: "available".to_string(),
        allocated_storage_gib: Some(storage_gib),
        ..Default::default()
    }
}

pub fn db_snapshot(id: &str, source_instance: &str, storage_gib: i32) -> DbSnapshotRecord {
    DbSnapshotRecord {
        id: id.to_string(),
        source_instance: Some(source_instance.to_string()),
        status: "available".to_string(),
        allocated_storage_gib: Some(storage_gib),
        engine: "postgres".to_string(),
        ..Default::default()
    }
}

pub fn db_cluster(id: &str, members: usize) -> DbClusterRecord {
    DbClusterRecord {
        id: id.to_string(),
        engine: "aurora-postgresql".to_string(),
        status: "available".to_string(),
        allocated_storage_gib: Some(1),
        member_count: members,
        ..Default::default()
    }
}

pub fn db_cluster_snapshot(
    id: &str,
    source_cluster: &str,
    storage_gib: i32,
) -> DbClusterSnapshotRecord {
    DbClusterSnapshotRecord {
        id: id.to_string(),
        source_cluster: Some(source_cluster.to_string()),
        status: "available".to_string(),
        allocated_storage_gib: Some(storage_gib),
        engine: "aurora-postgresql".to_string(),
        ..Default::default()
    }
}

/// Active one-year reservation
pub fn reserved_db_instance(id: &str) -> ReservedDbInstanceRecord {
    ReservedDbInstanceRecord {
        id: id.to_string(),
        instance_class: "db.r6g.large".to_string(),
        instance_count: 1,
        duration_secs: 31_536_000,
        product: "postgresql".to_string(),
        state: "active".to_string(),
        start_time: Some(reference_time() - Duration::days(30)),
        ..Default::default()
    }
}

pub fn db_proxy(name: &str) -> DbProxyRecord {
    DbProxyRecord {
        name: name.to_string(),
        engine_family: "POSTGRESQL".to_string(),
        vpc_id: Some("vpc-0a1b2c".to_string()),
        status: "available".to_string(),
        created_at: Some(reference_time() - Duration::days(5)),
    }
}

/// NAT gateway created `age_hours` before [`reference_time`]
pub fn nat_gateway(id: &str, age_hours: i64) -> NatGatewayRecord {
    NatGatewayRecord {
        id: id.to_string(),
        state: "available".to_string(),
        vpc_id: Some("vpc-0a1b2c".to_string()),
        subnet_id: Some("subnet-0a1b2c".to_string()),
        connectivity_type: Some("public".to_string()),
        create_time: Some(reference_time() - Duration::hours(age_hours)),
        ..Default::default()
    }
}

pub fn key(id: &str) -> KeyRecord {
    KeyRecord {
        id: id.to_string(),
        arn: format!("arn:aws:kms:us-east-1:123456789012:key/{id}"),
    }
}

/// Symmetric encryption key managed by `key_manager` (`AWS` or `CUSTOMER`)
pub fn key_metadata(id: &str, key_manager: &str) -> KeyMetadataRecord {
    KeyMetadataRecord {
        id: id.to_string(),
        arn: key(id).arn,
        key_manager: key_manager.to_string(),
        key_usage: "ENCRYPT_DECRYPT".to_string(),
        origin: "AWS_KMS".to_string(),
        key_spec: "SYMMETRIC_DEFAULT".to_string(),
        key_state: "Enabled".to_string(),
        created_at: Some(reference_time() - Duration::days(100)),
    }
}

/// Bytes in `gb` GiB, for metric fixtures
pub fn gb(gb: f64) -> f64 {
    gb * 1024.0 * 1024.0 * 1024.0
}

pub fn access_denied() -> AwsError {
    AwsError::AccessDenied {
        code: "UnauthorizedOperation".to_string(),
        message: "You are not authorized to perform this operation.".to_string(),
    }
}

pub fn opt_in_required() -> AwsError {
    AwsError::OptInRequired {
        message: "The region is not enabled for this account".to_string(),
    }
}
