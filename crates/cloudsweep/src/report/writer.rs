//! Report files: the full report as JSON and one CSV row per finding

use anyhow::{Context, Result};
use cloudsweep_common::ScanReport;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Prefix of every report file name
const FILE_PREFIX: &str = "cloudsweep";

/// Timestamp format embedded in report file names
const FILE_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Paths of the files produced by [`write_report_files`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenReport {
    pub json: PathBuf,
    pub csv: PathBuf,
}

/// CSV columns, in [`CsvRow`] field order
const CSV_HEADERS: [&str; 11] = [
    "region",
    "resource_type",
    "resource_id",
    "name",
    "size",
    "size_unit",
    "created_at",
    "status",
    "is_orphan",
    "is_zombie",
    "metadata",
];

#[derive(Debug, Serialize)]
struct CsvRow<'a> {
    region: &'a str,
    resource_type: &'a str,
    resource_id: &'a str,
    name: &'a str,
    size: Option<f64>,
    size_unit: Option<&'a str>,
    created_at: String,
    status: &'a str,
    is_orphan: bool,
    is_zombie: bool,
    metadata: String,
}

/// File stem shared by the JSON and CSV files of one report
pub fn report_file_stem(report: &ScanReport) -> String {
    format!(
        "{FILE_PREFIX}_{}",
        report.metadata().finished_at.format(FILE_TIMESTAMP_FORMAT)
    )
}

/// Full report as pretty-printed JSON
pub fn report_json(report: &ScanReport) -> Result<String> {
    serde_json::to_string_pretty(report).context("Failed to serialize report")
}

/// Write `cloudsweep_<timestamp>.json` and `.csv` into `dir`, creating it if needed
pub fn write_report_files(report: &ScanReport, dir: &Path) -> Result<WrittenReport> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory {}", dir.display()))?;

    let stem = report_file_stem(report);
    let json = dir.join(format!("{stem}.json"));
    let csv = dir.join(format!("{stem}.csv"));

    fs::write(&json, report_json(report)?)
        .with_context(|| format!("Failed to write {}", json.display()))?;
    write_csv(report, &csv)?;

    info!(json = %json.display(), csv = %csv.display(), "Report files written");
    Ok(WrittenReport { json, csv })
}

fn write_csv(report: &ScanReport, path: &Path) -> Result<()> {
    // Empty reports still get a header row
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    writer
        .write_record(CSV_HEADERS)
        .with_context(|| format!("Failed to write CSV header to {}", path.display()))?;

    for finding in report.findings() {
        writer
            .serialize(CsvRow {
                region: &finding.region,
                resource_type: finding.resource_type.as_str(),
                resource_id: &finding.resource_id,
                name: &finding.name,
                size: finding.size.map(|s| s.value),
                size_unit: finding.size.map(|s| s.unit.as_str()),
                created_at: finding.created_at_display(),
                status: &finding.status,
                is_orphan: finding.is_orphan,
                is_zombie: finding.is_zombie,
                metadata: finding.details.to_json().to_string(),
            })
            .with_context(|| format!("Failed to write CSV row for {}", finding.resource_id))?;
    }

    writer
        .flush()
        .with_context(|| format!("Failed to flush {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use cloudsweep_common::finding::{Capacity, VolumeDetails};
    use cloudsweep_common::{
        Finding, FindingDetails, RegionOutcome, ReportAggregator, ResourceType, ScanMetadata,
    };
    use std::collections::BTreeMap;

    fn report() -> ScanReport {
        let volume = Finding::new(
            "us-east-1",
            ResourceType::EbsVolume,
            "vol-1",
            "data, primary",
            "available",
            FindingDetails::Volume(VolumeDetails {
                volume_type: "gp3".to_string(),
                attached_to: None,
                encrypted: false,
            }),
        )
        .with_size(Some(Capacity::gib(8.0)))
        .with_orphan(true);
        report_with(vec![volume])
    }

    fn report_with(findings: Vec<Finding>) -> ScanReport {
        let t = Utc.with_ymd_and_hms(2024, 5, 6, 7, 8, 9).unwrap();
        let mut metadata = ScanMetadata::finished_now(Some("123456789012".to_string()), t);
        metadata.finished_at = t;

        ReportAggregator::new(metadata).aggregate(vec![RegionOutcome {
            region: "us-east-1".to_string(),
            findings,
            stats: BTreeMap::new(),
            issues: Vec::new(),
            error: None,
            duration_ms: 1,
        }])
    }

    #[test]
    fn file_stem_uses_finish_time() {
        assert_eq!(report_file_stem(&report()), "cloudsweep_20240506_070809");
    }

    #[test]
    fn writes_json_and_csv() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("reports");
        let written = write_report_files(&report(), &out).unwrap();

        assert_eq!(written.json, out.join("cloudsweep_20240506_070809.json"));
        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&written.json).unwrap()).unwrap();
        assert_eq!(json["metadata"]["account_id"], "123456789012");
        assert_eq!(json["by_type"]["EBS Volume"]["orphan_count"], 1);

        let mut reader = csv::Reader::from_path(&written.csv).unwrap();
        let headers = reader.headers().unwrap().clone();
        assert_eq!(&headers[0], "region");
        assert_eq!(&headers[10], "metadata");

        let rows: Vec<csv::StringRecord> = reader.records().map(Result::unwrap).collect();
        assert_eq!(rows.len(), 1);
        assert_eq!(&rows[0][3], "data, primary");
        assert_eq!(&rows[0][8], "true");
        assert!(rows[0][10].contains("\"volume_type\":\"gp3\""));
    }

    #[test]
    fn empty_report_csv_keeps_header() {
        let dir = tempfile::tempdir().unwrap();
        let written = write_report_files(&report_with(Vec::new()), dir.path()).unwrap();

        let mut reader = csv::Reader::from_path(&written.csv).unwrap();
        let headers: Vec<String> = reader.headers().unwrap().iter().map(String::from).collect();
        assert_eq!(headers, CSV_HEADERS);
        assert_eq!(reader.records().count(), 0);
    }
}
