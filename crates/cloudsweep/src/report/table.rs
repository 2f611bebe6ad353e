//! Console tables for a scan report

use cloudsweep_common::finding::FindingDetails;
use cloudsweep_common::{Finding, GroupSummary, ResourceType, ScanReport};
use comfy_table::{Cell, ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};
use std::collections::BTreeMap;

fn new_table(header: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header.iter().map(Cell::new).collect::<Vec<_>>());
    table
}

fn gib(value: f64) -> String {
    format!("{value:.2}")
}

/// Short per-kind attribute summary for the findings table
pub fn details_summary(details: &FindingDetails) -> String {
    match details {
        FindingDetails::Instance(d) => format!("{} {}", d.instance_type, d.availability_zone),
        FindingDetails::ElasticIp(d) => match &d.attached_to {
            Some(target) => format!("{} -> {target}", d.allocation_id),
            None => d.allocation_id.clone(),
        },
        FindingDetails::Volume(d) => match &d.attached_to {
            Some(instance) => format!("{} on {instance}", d.volume_type),
            None => d.volume_type.clone(),
        },
        FindingDetails::EbsSnapshot(d) => {
            format!("from {}", d.source_volume.as_deref().unwrap_or("-"))
        }
        FindingDetails::DbInstance(d) => format!("{} {}", d.engine, d.instance_class),
        FindingDetails::AuroraCluster(d) => format!("{} ({} members)", d.engine, d.member_count),
        FindingDetails::DbSnapshot(d) => format!(
            "{} from {}",
            d.origin.as_str(),
            d.source_instance.as_deref().unwrap_or("-")
        ),
        FindingDetails::DbClusterSnapshot(d) => format!(
            "{} from {}",
            d.origin.as_str(),
            d.source_cluster.as_deref().unwrap_or("-")
        ),
        FindingDetails::ReservedDbInstance(d) => {
            format!("{} x{} {}", d.instance_class, d.instance_count, d.product)
        }
        FindingDetails::DbProxy(d) => format!("{} in {}", d.engine_family, d.vpc_id),
        FindingDetails::KmsKey(d) => format!("{} rotation {}", d.key_manager, d.rotation.label()),
        FindingDetails::NatGateway(d) => {
            let partial = if d.traffic_complete { "" } else { " (partial)" };
            format!("{} GB / 30d{partial}", gib(d.traffic_gb))
        }
    }
}

/// One table per resource type, in type order
pub fn findings_tables(report: &ScanReport) -> Vec<(ResourceType, Table)> {
    let mut grouped: BTreeMap<ResourceType, Vec<&Finding>> = BTreeMap::new();
    for finding in report.findings() {
        grouped.entry(finding.resource_type).or_default().push(finding);
    }

    grouped
        .into_iter()
        .map(|(resource_type, findings)| (resource_type, findings_table(&findings)))
        .collect()
}

pub fn findings_table(findings: &[&Finding]) -> Table {
    let mut table = new_table(&[
        "Region", "Resource ID", "Name", "Size", "Status", "Created", "Flag", "Details",
    ]);
    for finding in findings {
        table.add_row(vec![
            Cell::new(&finding.region),
            Cell::new(&finding.resource_id),
            Cell::new(&finding.name),
            Cell::new(finding.size_display()),
            Cell::new(&finding.status),
            Cell::new(finding.created_at_display()),
            Cell::new(finding.flag_label()),
            Cell::new(details_summary(&finding.details)),
        ]);
    }
    table
}

fn summary_cells(label: &str, summary: &GroupSummary) -> Vec<Cell> {
    vec![
        Cell::new(label),
        Cell::new(summary.count),
        Cell::new(gib(summary.total_size_gib)),
        Cell::new(summary.flagged_count),
        Cell::new(gib(summary.flagged_size_gib)),
        Cell::new(summary.orphan_count),
        Cell::new(summary.zombie_count),
    ]
}

const SUMMARY_HEADER: [&str; 6] = [
    "Count", "Total GiB", "Flagged", "Flagged GiB", "Orphans", "Zombies",
];

/// Totals per resource type, with an overall row
pub fn type_summary_table(report: &ScanReport) -> Table {
    let mut header = vec!["Resource Type"];
    header.extend(SUMMARY_HEADER);
    let mut table = new_table(&header);

    for (label, summary) in report.by_type() {
        table.add_row(summary_cells(label, summary));
    }
    table.add_row(summary_cells("TOTAL", report.totals()));
    table
}

/// Totals per region, with each failed region's error label
pub fn region_summary_table(report: &ScanReport) -> Table {
    let mut header = vec!["Region"];
    header.extend(SUMMARY_HEADER);
    header.extend(["Issues", "Error"]);
    let mut table = new_table(&header);

    for (region, summary) in report.by_region() {
        let mut cells = summary_cells(region, &summary.summary);
        cells.push(Cell::new(summary.issue_count));
        cells.push(Cell::new(summary.error.as_deref().unwrap_or("")));
        table.add_row(cells);
    }
    table
}

/// Print every table of the report to stdout
pub fn print_report(report: &ScanReport) {
    for (resource_type, table) in findings_tables(report) {
        println!("\n=== {resource_type} ===\n");
        println!("{table}");
    }

    println!("\n=== Summary by Resource Type ===\n");
    println!("{}", type_summary_table(report));

    println!("\n=== Summary by Region ===\n");
    println!("{}", region_summary_table(report));

    if !report.failed_regions().is_empty() {
        println!(
            "\nRegions with errors: {}",
            report.failed_regions().join(", ")
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use cloudsweep_common::finding::{Capacity, NatGatewayDetails, VolumeDetails};
    use cloudsweep_common::{RegionError, RegionOutcome, ReportAggregator, ScanMetadata};
    use std::collections::BTreeMap as Map;

    fn report() -> ScanReport {
        let t = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let volume = Finding::new(
            "us-east-1",
            ResourceType::EbsVolume,
            "vol-1",
            "scratch",
            "available",
            FindingDetails::Volume(VolumeDetails {
                volume_type: "gp3".to_string(),
                attached_to: None,
                encrypted: true,
            }),
        )
        .with_size(Some(Capacity::gib(50.0)))
        .with_orphan(true);
        let nat = Finding::new(
            "us-east-1",
            ResourceType::NatGateway,
            "nat-1",
            "unnamed",
            "available",
            FindingDetails::NatGateway(NatGatewayDetails {
                vpc_id: "vpc-1".to_string(),
                subnet_id: "subnet-1".to_string(),
                public_ip: "N/A".to_string(),
                connectivity_type: "public".to_string(),
                traffic_gb: 0.25,
                traffic_complete: false,
            }),
        )
        .with_zombie(true);

        ReportAggregator::new(ScanMetadata::finished_now(None, t)).aggregate(vec![
            RegionOutcome {
                region: "us-east-1".to_string(),
                findings: vec![volume, nat],
                stats: Map::new(),
                issues: Vec::new(),
                error: None,
                duration_ms: 10,
            },
            RegionOutcome::failed("eu-west-1", RegionError::Interrupted),
        ])
    }

    #[test]
    fn one_table_per_type() {
        let tables = findings_tables(&report());
        let types: Vec<_> = tables.iter().map(|(t, _)| *t).collect();
        assert_eq!(types, vec![ResourceType::EbsVolume, ResourceType::NatGateway]);

        let volume_table = tables[0].1.to_string();
        assert!(volume_table.contains("vol-1"));
        assert!(volume_table.contains("ORPHAN"));
        assert!(volume_table.contains("50 GiB"));
    }

    #[test]
    fn summaries_include_totals_and_errors() {
        let report = report();
        let by_type = type_summary_table(&report).to_string();
        assert!(by_type.contains("EBS Volume"));
        assert!(by_type.contains("TOTAL"));
        assert!(by_type.contains("50.00"));

        let by_region = region_summary_table(&report).to_string();
        assert!(by_region.contains("eu-west-1"));
        assert!(by_region.contains("interrupted"));
    }

    #[test]
    fn nat_details_mark_partial_traffic() {
        let report = report();
        let nat = report
            .findings()
            .find(|f| f.resource_type == ResourceType::NatGateway)
            .unwrap();
        assert_eq!(details_summary(&nat.details), "0.25 GB / 30d (partial)");
    }
}
