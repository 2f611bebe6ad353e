//! End-to-end scans against the in-memory provider
//!
//! Each test builds a [`FakeProvider`], runs a full [`Scanner`] and checks
//! the resulting report.

use cloudsweep::aws::records::AliasRecord;
use cloudsweep::config::{DatabaseToggles, FamilyToggles, RegionSelection, ScanConfig};
use cloudsweep::scan::{ScanError, Scanner};
use cloudsweep_common::finding::{RotationSkipReason, RotationStatus, SnapshotOrigin};
use cloudsweep_common::{
    FailureCategory, FindingDetails, IssueKind, RegionError, ResourceFamily, ResourceType,
    ScanReport,
};
use cloudsweep_test_utils::fixtures::{
    access_denied, attached_volume, db_cluster, db_cluster_snapshot, db_instance, db_proxy,
    db_snapshot, ebs_snapshot, gb, instance, key, key_metadata, nat_gateway, named,
    opt_in_required, reference_time, reserved_db_instance, unattached_volume,
};
use cloudsweep_test_utils::{FAKE_ACCOUNT_ID, FakeProvider, Operation, RegionFixture};
use std::collections::HashMap;
use std::sync::Arc;

fn config(regions: &[&str], families: &[ResourceFamily]) -> ScanConfig {
    ScanConfig {
        regions: RegionSelection {
            regions: Some(regions.iter().map(|r| r.to_string()).collect()),
            ..Default::default()
        },
        families: if families.is_empty() {
            FamilyToggles::all()
        } else {
            FamilyToggles::only(families)
        },
        ..Default::default()
    }
}

async fn scan(provider: FakeProvider, config: ScanConfig) -> (Arc<FakeProvider>, ScanReport) {
    let provider = Arc::new(provider);
    let report = Scanner::new(Arc::clone(&provider), config)
        .with_reference_time(reference_time())
        .run()
        .await
        .expect("scan should complete");
    (provider, report)
}

fn finding<'a>(report: &'a ScanReport, id: &str) -> &'a cloudsweep_common::Finding {
    report
        .findings()
        .find(|f| f.resource_id == id)
        .unwrap_or_else(|| panic!("no finding for {id}"))
}

#[tokio::test]
async fn failed_region_does_not_affect_others() {
    let mut instance_a = instance("i-a", "running");
    instance_a.tags = named("web");
    let provider = FakeProvider::new()
        .with_region(
            "us-east-1",
            RegionFixture {
                instances: vec![instance_a, instance("i-b", "stopped")],
                volumes: vec![unattached_volume("vol-1", 50)],
                ..Default::default()
            },
        )
        .fail_region("eu-west-1", access_denied());

    let (_, report) = scan(provider, config(&["us-east-1", "eu-west-1"], &[])).await;

    assert_eq!(report.regions().len(), 2);
    assert_eq!(report.metadata().account_id.as_deref(), Some(FAKE_ACCOUNT_ID));

    let us = report.region("us-east-1").unwrap();
    assert!(us.is_success());
    assert_eq!(us.findings.len(), 3);
    assert_eq!(us.flagged_count(), 1);
    assert_eq!(finding(&report, "i-a").name, "web");

    let eu = report.region("eu-west-1").unwrap();
    assert!(eu.findings.is_empty());
    assert!(matches!(eu.error, Some(RegionError::Unavailable { .. })));
    assert_eq!(report.failed_regions(), ["eu-west-1"]);

    let volumes = &report.by_type()["EBS Volume"];
    assert_eq!(volumes.count, 1);
    assert_eq!(volumes.orphan_count, 1);
    assert_eq!(volumes.flagged_size_gib, 50.0);
    assert_eq!(report.totals().count, 3);
}

#[tokio::test]
async fn failed_subscan_keeps_the_rest_of_the_region() {
    let provider = FakeProvider::new()
        .with_region(
            "us-east-1",
            RegionFixture {
                instances: vec![instance("i-1", "running")],
                volumes: vec![unattached_volume("vol-1", 8)],
                ..Default::default()
            },
        )
        .fail_operation("us-east-1", Operation::DescribeInstances, access_denied());

    let (_, report) = scan(
        provider,
        config(&["us-east-1"], &[ResourceFamily::Compute, ResourceFamily::Storage]),
    )
    .await;

    let outcome = report.region("us-east-1").unwrap();
    assert!(outcome.is_success());
    assert_eq!(outcome.findings.len(), 1);
    assert_eq!(outcome.findings[0].resource_type, ResourceType::EbsVolume);
    assert!(
        outcome
            .issues
            .iter()
            .any(|i| i.kind == IssueKind::SubScanPartial && i.subscan == "compute.instances")
    );
    assert_eq!(report.by_region()["us-east-1"].issue_count, outcome.issues.len());
}

#[tokio::test]
async fn snapshots_of_deleted_volumes_are_orphans() {
    let provider = FakeProvider::new().with_region(
        "us-east-1",
        RegionFixture {
            instances: vec![instance("i-1", "running")],
            volumes: vec![attached_volume("vol-live", 20, "i-1")],
            snapshots: vec![
                ebs_snapshot("snap-live", Some("vol-live"), 20),
                ebs_snapshot("snap-gone", Some("vol-deleted"), 30),
                ebs_snapshot("snap-none", None, 10),
            ],
            ..Default::default()
        },
    );

    let (_, report) = scan(provider, config(&["us-east-1"], &[ResourceFamily::Storage])).await;

    assert!(!finding(&report, "vol-live").is_orphan);
    assert!(!finding(&report, "snap-live").is_orphan);
    assert!(finding(&report, "snap-gone").is_orphan);
    assert!(finding(&report, "snap-none").is_orphan);

    let snapshots = &report.by_type()["EBS Snapshot"];
    assert_eq!(snapshots.count, 3);
    assert_eq!(snapshots.orphan_count, 2);
    assert_eq!(snapshots.flagged_size_gib, 40.0);
}

#[tokio::test]
async fn failed_volume_listing_still_flags_snapshots() {
    let provider = FakeProvider::new()
        .with_region(
            "us-east-1",
            RegionFixture {
                snapshots: vec![
                    ebs_snapshot("snap-gone", Some("vol-deleted"), 30),
                    ebs_snapshot("snap-none", None, 10),
                ],
                ..Default::default()
            },
        )
        .fail_operation("us-east-1", Operation::DescribeVolumes, access_denied());

    let (_, report) = scan(provider, config(&["us-east-1"], &[ResourceFamily::Storage])).await;

    assert!(finding(&report, "snap-gone").is_orphan);
    assert!(finding(&report, "snap-none").is_orphan);

    let outcome = report.region("us-east-1").unwrap();
    assert!(outcome.is_success());
    let failed: Vec<_> = outcome
        .issues
        .iter()
        .filter(|i| i.kind == IssueKind::SubScanPartial)
        .map(|i| i.subscan.as_str())
        .collect();
    assert_eq!(failed, ["storage.volumes_in_use", "storage.volumes_available"]);
}

fn database_fixture() -> RegionFixture {
    RegionFixture {
        db_instances: vec![db_instance("db-live", 100)],
        db_clusters: vec![db_cluster("aurora-live", 2)],
        db_snapshots: HashMap::from([
            (
                SnapshotOrigin::Manual,
                vec![
                    db_snapshot("snap-live", "db-live", 100),
                    db_snapshot("snap-gone", "db-gone", 50),
                ],
            ),
            (
                SnapshotOrigin::Automated,
                vec![db_snapshot("rds:snap-cluster-member", "aurora-live", 20)],
            ),
        ]),
        db_cluster_snapshots: HashMap::from([
            (
                SnapshotOrigin::Manual,
                vec![db_cluster_snapshot("csnap-live", "aurora-live", 40)],
            ),
            (
                SnapshotOrigin::Automated,
                vec![db_cluster_snapshot("rds:csnap-gone", "aurora-gone", 60)],
            ),
        ]),
        reserved_db_instances: vec![reserved_db_instance("ri-1")],
        db_proxies: vec![db_proxy("proxy-1")],
        ..Default::default()
    }
}

#[tokio::test]
async fn database_snapshots_checked_against_instances_and_clusters() {
    let provider = FakeProvider::new().with_region("us-east-1", database_fixture());

    let (provider, report) =
        scan(provider, config(&["us-east-1"], &[ResourceFamily::Database])).await;

    assert!(!finding(&report, "snap-live").is_orphan);
    assert!(finding(&report, "snap-gone").is_orphan);
    assert!(!finding(&report, "rds:snap-cluster-member").is_orphan);
    assert!(!finding(&report, "csnap-live").is_orphan);
    assert!(finding(&report, "rds:csnap-gone").is_orphan);

    let FindingDetails::DbSnapshot(details) = &finding(&report, "rds:snap-cluster-member").details
    else {
        panic!("expected DB snapshot details");
    };
    assert_eq!(details.origin, SnapshotOrigin::Automated);

    let by_type = report.by_type();
    assert_eq!(by_type["DB Instance"].count, 1);
    assert_eq!(by_type["Aurora Cluster"].count, 1);
    assert_eq!(by_type["DB Snapshot"].count, 3);
    assert_eq!(by_type["DB Snapshot"].orphan_count, 1);
    assert_eq!(by_type["DB Snapshot"].flagged_size_gib, 50.0);
    assert_eq!(by_type["DB Cluster Snapshot"].orphan_count, 1);
    assert_eq!(by_type["Reserved DB Instance"].count, 1);
    assert_eq!(by_type["DB Proxy"].count, 1);

    let origins: Vec<_> = provider
        .calls_to(Operation::DescribeDbSnapshots)
        .into_iter()
        .filter_map(|c| c.resource)
        .collect();
    assert_eq!(origins, ["manual", "automated"]);
}

#[tokio::test]
async fn disabled_database_subscans_are_not_queried() {
    let provider = FakeProvider::new().with_region("us-east-1", database_fixture());
    let config = ScanConfig {
        database: DatabaseToggles {
            clusters: false,
            snapshots: true,
            reserved: false,
            proxies: false,
        },
        ..config(&["us-east-1"], &[ResourceFamily::Database])
    };

    let (provider, report) = scan(provider, config).await;

    assert!(provider.calls_to(Operation::DescribeDbClusters).is_empty());
    assert!(provider.calls_to(Operation::DescribeReservedDbInstances).is_empty());
    assert!(provider.calls_to(Operation::DescribeDbProxies).is_empty());
    assert!(!report.by_type().contains_key("Aurora Cluster"));
    assert!(!report.by_type().contains_key("Reserved DB Instance"));
    assert!(!report.by_type().contains_key("DB Proxy"));

    // Skipping clusters narrows the index without disabling orphan checks
    assert!(!finding(&report, "snap-live").is_orphan);
    assert!(finding(&report, "snap-gone").is_orphan);
    assert!(finding(&report, "csnap-live").is_orphan);
}

#[tokio::test]
async fn snapshot_toggle_skips_both_snapshot_kinds() {
    let provider = FakeProvider::new().with_region("us-east-1", database_fixture());
    let config = ScanConfig {
        database: DatabaseToggles {
            snapshots: false,
            ..Default::default()
        },
        ..config(&["us-east-1"], &[ResourceFamily::Database])
    };

    let (provider, report) = scan(provider, config).await;

    assert!(provider.calls_to(Operation::DescribeDbSnapshots).is_empty());
    assert!(provider.calls_to(Operation::DescribeDbClusterSnapshots).is_empty());
    assert!(!report.by_type().contains_key("DB Snapshot"));
    assert!(!report.by_type().contains_key("DB Cluster Snapshot"));
    assert_eq!(report.by_type()["DB Proxy"].count, 1);
}

#[tokio::test]
async fn failed_instance_listing_still_flags_db_snapshots() {
    let provider = FakeProvider::new()
        .with_region("us-east-1", database_fixture())
        .fail_operation("us-east-1", Operation::DescribeDbInstances, access_denied());

    let (_, report) = scan(provider, config(&["us-east-1"], &[ResourceFamily::Database])).await;

    assert!(finding(&report, "snap-live").is_orphan);
    assert!(!finding(&report, "rds:snap-cluster-member").is_orphan);
    assert!(
        report
            .region("us-east-1")
            .unwrap()
            .issues
            .iter()
            .any(|i| i.subscan == "database.instances")
    );
}

#[tokio::test]
async fn every_region_failing_still_yields_a_report() {
    let provider = FakeProvider::new()
        .with_region("us-east-1", database_fixture())
        .fail_region("us-east-1", access_denied())
        .fail_region("ap-east-1", opt_in_required());

    let (_, report) = scan(provider, config(&["us-east-1", "ap-east-1"], &[])).await;

    assert_eq!(report.regions().len(), 2);
    assert_eq!(report.findings().count(), 0);
    assert!(report.regions().iter().all(|o| o.error.is_some()));
    assert_eq!(report.failed_regions(), ["ap-east-1", "us-east-1"]);
    assert!(report.by_type().is_empty());
    assert_eq!(report.totals().count, 0);
    assert!(
        report
            .by_region()
            .values()
            .all(|r| r.summary.count == 0 && r.error.is_some())
    );
    assert!(matches!(
        report.region("ap-east-1").unwrap().error,
        Some(RegionError::Unavailable {
            category: FailureCategory::OptInRequired,
            ..
        })
    ));
}

#[tokio::test]
async fn nat_gateway_zombie_thresholds() {
    let mut metrics = HashMap::new();
    for (id, bytes_in, bytes_out) in [
        ("nat-idle", gb(0.1), gb(0.2)),
        ("nat-busy", gb(1.5), gb(0.5)),
        ("nat-new", 0.0, 0.0),
    ] {
        metrics.insert((id.to_string(), "BytesInFromSource".to_string()), bytes_in);
        metrics.insert((id.to_string(), "BytesOutToDestination".to_string()), bytes_out);
    }

    let provider = FakeProvider::new().with_region(
        "us-east-1",
        RegionFixture {
            nat_gateways: vec![
                nat_gateway("nat-idle", 48),
                nat_gateway("nat-busy", 48),
                nat_gateway("nat-new", 10),
            ],
            metrics,
            ..Default::default()
        },
    );

    let (_, report) = scan(provider, config(&["us-east-1"], &[ResourceFamily::Gateway])).await;

    let idle = finding(&report, "nat-idle");
    assert!(idle.is_zombie);
    let FindingDetails::NatGateway(details) = &idle.details else {
        panic!("expected NAT gateway details");
    };
    assert_eq!(details.traffic_gb, 0.3);
    assert!(details.traffic_complete);

    assert!(!finding(&report, "nat-busy").is_zombie);
    assert!(!finding(&report, "nat-new").is_zombie);
    assert_eq!(report.by_type()["NAT Gateway"].zombie_count, 1);
}

#[tokio::test]
async fn nat_metric_failure_keeps_the_gateway() {
    let provider = FakeProvider::new()
        .with_region(
            "us-east-1",
            RegionFixture {
                nat_gateways: vec![nat_gateway("nat-1", 72)],
                ..Default::default()
            },
        )
        .fail_operation("us-east-1", Operation::GetMetricStatistics, access_denied());

    let (_, report) = scan(provider, config(&["us-east-1"], &[ResourceFamily::Gateway])).await;

    let nat = finding(&report, "nat-1");
    let FindingDetails::NatGateway(details) = &nat.details else {
        panic!("expected NAT gateway details");
    };
    assert!(!details.traffic_complete);
    let outcome = report.region("us-east-1").unwrap();
    assert!(
        outcome
            .issues
            .iter()
            .any(|i| i.kind == IssueKind::MetricUnavailable
                && i.resource_id.as_deref() == Some("nat-1"))
    );
}

#[tokio::test]
async fn aws_managed_keys_skip_rotation_query() {
    let provider = FakeProvider::new().with_region(
        "us-east-1",
        RegionFixture {
            keys: vec![key("k-aws"), key("k-cust")],
            aliases: vec![AliasRecord {
                name: "alias/aws/ebs".to_string(),
                target_key_id: Some("k-aws".to_string()),
            }],
            key_metadata: [
                ("k-aws".to_string(), key_metadata("k-aws", "AWS")),
                ("k-cust".to_string(), key_metadata("k-cust", "CUSTOMER")),
            ]
            .into(),
            key_rotation: [("k-cust".to_string(), true)].into(),
            ..Default::default()
        },
    );

    let (provider, report) = scan(provider, config(&["us-east-1"], &[ResourceFamily::Keys])).await;

    let rotation_calls = provider.calls_to(Operation::GetKeyRotationStatus);
    assert_eq!(rotation_calls.len(), 1);
    assert_eq!(rotation_calls[0].resource.as_deref(), Some("k-cust"));

    let aws_key = finding(&report, "k-aws");
    assert_eq!(aws_key.name, "alias/aws/ebs");
    let FindingDetails::KmsKey(details) = &aws_key.details else {
        panic!("expected KMS key details");
    };
    assert_eq!(
        details.rotation,
        RotationStatus::NotApplicable {
            reason: RotationSkipReason::AwsManaged
        }
    );

    let FindingDetails::KmsKey(details) = &finding(&report, "k-cust").details else {
        panic!("expected KMS key details");
    };
    assert_eq!(details.rotation, RotationStatus::Enabled);
}

#[tokio::test]
async fn paginated_listings_are_drained() {
    let instances = (0..5)
        .map(|i| instance(&format!("i-{i}"), "running"))
        .collect();
    let provider = FakeProvider::new()
        .with_region(
            "us-east-1",
            RegionFixture {
                instances,
                ..Default::default()
            },
        )
        .with_page_size(2);

    let (provider, report) =
        scan(provider, config(&["us-east-1"], &[ResourceFamily::Compute])).await;

    assert_eq!(report.by_type()["EC2 Instance"].count, 5);
    assert_eq!(provider.calls_to(Operation::DescribeInstances).len(), 3);
    let ids: Vec<_> = report.findings().map(|f| f.resource_id.as_str()).collect();
    assert_eq!(ids, ["i-0", "i-1", "i-2", "i-3", "i-4"]);
}

#[tokio::test]
async fn enabled_regions_are_discovered() {
    let provider = FakeProvider::new()
        .with_region("us-east-1", RegionFixture::default())
        .with_listed_region("ap-east-1", "not-opted-in")
        .with_listed_region("eu-south-1", "opted-in");

    let scanner = Scanner::new(Arc::new(provider), ScanConfig::default());
    let regions = scanner.resolve_regions().await.unwrap();
    assert_eq!(regions, ["us-east-1", "eu-south-1"]);
}

#[tokio::test]
async fn region_listing_failure_falls_back_to_us_east_1() {
    let provider = FakeProvider::new()
        .with_region("eu-west-1", RegionFixture::default())
        .fail_operation("us-east-1", Operation::DescribeRegions, access_denied());

    let scanner = Scanner::new(Arc::new(provider), ScanConfig::default());
    assert_eq!(scanner.resolve_regions().await.unwrap(), ["us-east-1"]);
}

#[tokio::test]
async fn missing_credentials_abort_the_scan() {
    let provider = Arc::new(
        FakeProvider::new()
            .with_region("us-east-1", RegionFixture::default())
            .without_credentials(),
    );

    let err = Scanner::new(Arc::clone(&provider), config(&["us-east-1"], &[]))
        .run()
        .await
        .unwrap_err();
    assert!(matches!(err, ScanError::NoCredentials { .. }));
    assert!(provider.calls_to(Operation::DescribeInstances).is_empty());
}

#[tokio::test]
async fn empty_region_list_aborts_the_scan() {
    let provider = FakeProvider::new().with_listed_region("ap-east-1", "not-opted-in");

    let err = Scanner::new(Arc::new(provider), ScanConfig::default())
        .run()
        .await
        .unwrap_err();
    assert!(matches!(err, ScanError::NoRegions));
}
