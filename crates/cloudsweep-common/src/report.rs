//! Scan report and the aggregation that builds it
//!
//! [`ReportAggregator::aggregate`] is a pure function of its input: no
//! clock reads and no network calls happen during aggregation. Outcomes
//! are ordered by region before any summation, so the summary tables are
//! identical whatever order the regions completed in.

use crate::finding::Finding;
use crate::outcome::RegionOutcome;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Counts and sizes for one group of findings
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupSummary {
    pub count: usize,
    pub total_size_gib: f64,
    /// Findings that are orphaned or zombie
    pub flagged_count: usize,
    pub flagged_size_gib: f64,
    pub orphan_count: usize,
    pub zombie_count: usize,
}

impl GroupSummary {
    fn add(&mut self, finding: &Finding) {
        let size = finding.size_gib();
        self.count += 1;
        self.total_size_gib += size;
        if finding.is_flagged() {
            self.flagged_count += 1;
            self.flagged_size_gib += size;
        }
        if finding.is_orphan {
            self.orphan_count += 1;
        }
        if finding.is_zombie {
            self.zombie_count += 1;
        }
    }
}

/// Per-region subtotal
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegionSummary {
    #[serde(flatten)]
    pub summary: GroupSummary,
    /// Short error label when the region failed
    pub error: Option<String>,
    /// Number of non-fatal issues recorded for the region
    pub issue_count: usize,
}

/// Identity and timing of one scan invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanMetadata {
    pub scan_id: Uuid,
    pub account_id: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl ScanMetadata {
    /// Metadata for a scan that started at `started_at` and finished now
    pub fn finished_now(account_id: Option<String>, started_at: DateTime<Utc>) -> Self {
        Self {
            scan_id: Uuid::new_v4(),
            account_id,
            started_at,
            finished_at: Utc::now(),
        }
    }
}

/// Complete, immutable result of one scan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanReport {
    metadata: ScanMetadata,
    /// Outcomes ordered by region
    regions: Vec<RegionOutcome>,
    by_type: BTreeMap<String, GroupSummary>,
    by_region: BTreeMap<String, RegionSummary>,
    totals: GroupSummary,
    failed_regions: Vec<String>,
}

impl ScanReport {
    pub fn metadata(&self) -> &ScanMetadata {
        &self.metadata
    }

    pub fn regions(&self) -> &[RegionOutcome] {
        &self.regions
    }

    /// Outcome for a single region
    pub fn region(&self, region: &str) -> Option<&RegionOutcome> {
        self.regions.iter().find(|o| o.region == region)
    }

    /// Summary per resource type label, sorted by label
    pub fn by_type(&self) -> &BTreeMap<String, GroupSummary> {
        &self.by_type
    }

    /// Summary per region, sorted by region
    pub fn by_region(&self) -> &BTreeMap<String, RegionSummary> {
        &self.by_region
    }

    pub fn totals(&self) -> &GroupSummary {
        &self.totals
    }

    /// Regions whose outcome carries an error, sorted
    pub fn failed_regions(&self) -> &[String] {
        &self.failed_regions
    }

    /// All findings, region by region
    pub fn findings(&self) -> impl Iterator<Item = &Finding> {
        self.regions.iter().flat_map(|o| o.findings.iter())
    }

    /// Summary tables as pretty JSON; stable across runs over identical input
    pub fn summary_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&serde_json::json!({
            "by_type": self.by_type,
            "by_region": self.by_region,
            "totals": self.totals,
            "failed_regions": self.failed_regions,
        }))
    }
}

/// Builds a [`ScanReport`] from region outcomes
#[derive(Debug, Clone)]
pub struct ReportAggregator {
    metadata: ScanMetadata,
}

impl ReportAggregator {
    pub fn new(metadata: ScanMetadata) -> Self {
        Self { metadata }
    }

    /// Merge outcomes into a report.
    ///
    /// Input order does not matter: outcomes are sorted by region and
    /// every grouping key is kept in a sorted map.
    pub fn aggregate(self, mut outcomes: Vec<RegionOutcome>) -> ScanReport {
        outcomes.sort_by(|a, b| a.region.cmp(&b.region));

        let mut by_type: BTreeMap<String, GroupSummary> = BTreeMap::new();
        let mut by_region: BTreeMap<String, RegionSummary> = BTreeMap::new();
        let mut totals = GroupSummary::default();
        let mut failed_regions = Vec::new();

        for outcome in &outcomes {
            let region = by_region.entry(outcome.region.clone()).or_default();
            region.issue_count += outcome.issues.len();
            if let Some(error) = &outcome.error {
                region.error = Some(error.label());
                failed_regions.push(outcome.region.clone());
            }

            for finding in &outcome.findings {
                by_type
                    .entry(finding.resource_type.as_str().to_string())
                    .or_default()
                    .add(finding);
                region.summary.add(finding);
                totals.add(finding);
            }
        }

        ScanReport {
            metadata: self.metadata,
            regions: outcomes,
            by_type,
            by_region,
            totals,
            failed_regions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::finding::{Capacity, FindingDetails, VolumeDetails};
    use crate::outcome::RegionError;
    use crate::resource_kind::ResourceType;
    use chrono::TimeZone;

    fn metadata() -> ScanMetadata {
        let t = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        ScanMetadata {
            scan_id: Uuid::nil(),
            account_id: None,
            started_at: t,
            finished_at: t,
        }
    }

    fn volume(region: &str, id: &str, size: f64, orphan: bool) -> Finding {
        Finding::new(
            region,
            ResourceType::EbsVolume,
            id,
            "unnamed",
            if orphan { "available" } else { "in-use" },
            FindingDetails::Volume(VolumeDetails {
                volume_type: "gp3".to_string(),
                attached_to: None,
                encrypted: false,
            }),
        )
        .with_size(Some(Capacity::gib(size)))
        .with_orphan(orphan)
    }

    fn outcome(region: &str, findings: Vec<Finding>) -> RegionOutcome {
        RegionOutcome {
            region: region.to_string(),
            findings,
            stats: BTreeMap::new(),
            issues: Vec::new(),
            error: None,
            duration_ms: 5,
        }
    }

    #[test]
    fn totals_per_type_and_region() {
        let report = ReportAggregator::new(metadata()).aggregate(vec![
            outcome(
                "us-west-2",
                vec![volume("us-west-2", "vol-a", 10.0, false)],
            ),
            outcome(
                "us-east-1",
                vec![
                    volume("us-east-1", "vol-b", 20.0, true),
                    volume("us-east-1", "vol-c", 30.0, false),
                ],
            ),
            RegionOutcome::failed("eu-west-1", RegionError::Interrupted),
        ]);

        let volumes = &report.by_type()["EBS Volume"];
        assert_eq!(volumes.count, 3);
        assert_eq!(volumes.total_size_gib, 60.0);
        assert_eq!(volumes.flagged_count, 1);
        assert_eq!(volumes.flagged_size_gib, 20.0);
        assert_eq!(volumes.orphan_count, 1);

        assert_eq!(report.by_region()["us-east-1"].summary.count, 2);
        assert_eq!(
            report.by_region()["eu-west-1"].error.as_deref(),
            Some("interrupted")
        );
        assert_eq!(report.failed_regions(), ["eu-west-1".to_string()]);
        assert_eq!(report.totals().count, 3);

        let order: Vec<_> = report.regions().iter().map(|o| o.region.as_str()).collect();
        assert_eq!(order, ["eu-west-1", "us-east-1", "us-west-2"]);
    }

    #[test]
    fn summary_is_independent_of_completion_order() {
        let make = || {
            vec![
                outcome("ap-south-1", vec![volume("ap-south-1", "vol-1", 0.1, true)]),
                outcome("us-east-1", vec![volume("us-east-1", "vol-2", 0.2, false)]),
                outcome("eu-north-1", vec![volume("eu-north-1", "vol-3", 0.7, true)]),
            ]
        };
        let forward = ReportAggregator::new(metadata()).aggregate(make());
        let mut reversed_input = make();
        reversed_input.reverse();
        let reversed = ReportAggregator::new(metadata()).aggregate(reversed_input);

        assert_eq!(
            forward.summary_json().unwrap(),
            reversed.summary_json().unwrap()
        );
        assert_eq!(forward, reversed);
    }

    #[test]
    fn empty_report() {
        let report = ReportAggregator::new(metadata()).aggregate(Vec::new());
        assert!(report.by_type().is_empty());
        assert_eq!(report.totals().count, 0);
        assert_eq!(report.findings().count(), 0);
    }
}
