//! Configuration types for a scan

use cloudsweep_common::ResourceFamily;
use cloudsweep_common::defaults::{
    DEFAULT_HOME_REGION, DEFAULT_MAX_CONCURRENCY, MAX_CONCURRENCY_LIMIT,
};
use std::path::PathBuf;

/// AWS session configuration
#[derive(Debug, Clone)]
pub struct AwsConfig {
    /// AWS profile name (overrides default credential resolution)
    pub aws_profile: Option<String>,
    /// Region used for the region listing and credential validation
    pub home_region: String,
}

impl Default for AwsConfig {
    fn default() -> Self {
        Self {
            aws_profile: None,
            home_region: DEFAULT_HOME_REGION.to_string(),
        }
    }
}

/// Which regions to scan and how many at once
#[derive(Debug, Clone)]
pub struct RegionSelection {
    /// Explicit region subset; `None` scans every enabled region
    pub regions: Option<Vec<String>>,
    /// Maximum number of regions scanned concurrently
    pub max_concurrency: usize,
}

impl Default for RegionSelection {
    fn default() -> Self {
        Self {
            regions: None,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }
}

impl RegionSelection {
    /// Concurrency clamped to `1..=MAX_CONCURRENCY_LIMIT`
    pub fn effective_concurrency(&self) -> usize {
        self.max_concurrency.clamp(1, MAX_CONCURRENCY_LIMIT)
    }
}

/// Collector families enabled for the scan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FamilyToggles {
    pub compute: bool,
    pub storage: bool,
    pub database: bool,
    pub keys: bool,
    pub gateway: bool,
}

impl Default for FamilyToggles {
    fn default() -> Self {
        Self::all()
    }
}

impl FamilyToggles {
    pub fn all() -> Self {
        Self {
            compute: true,
            storage: true,
            database: true,
            keys: true,
            gateway: true,
        }
    }

    /// Enable exactly the given families
    pub fn only(families: &[ResourceFamily]) -> Self {
        Self {
            compute: families.contains(&ResourceFamily::Compute),
            storage: families.contains(&ResourceFamily::Storage),
            database: families.contains(&ResourceFamily::Database),
            keys: families.contains(&ResourceFamily::Keys),
            gateway: families.contains(&ResourceFamily::Gateway),
        }
    }

    pub fn is_enabled(&self, family: ResourceFamily) -> bool {
        match family {
            ResourceFamily::Compute => self.compute,
            ResourceFamily::Storage => self.storage,
            ResourceFamily::Database => self.database,
            ResourceFamily::Keys => self.keys,
            ResourceFamily::Gateway => self.gateway,
        }
    }

    /// Enabled families in scan order
    pub fn enabled(&self) -> Vec<ResourceFamily> {
        ResourceFamily::ALL
            .into_iter()
            .filter(|f| self.is_enabled(*f))
            .collect()
    }
}

/// Optional managed-database sub-scans
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatabaseToggles {
    /// Aurora clusters
    pub clusters: bool,
    /// DB and DB cluster snapshots
    pub snapshots: bool,
    /// Reserved DB instances
    pub reserved: bool,
    /// DB proxies
    pub proxies: bool,
}

impl Default for DatabaseToggles {
    fn default() -> Self {
        Self {
            clusters: true,
            snapshots: true,
            reserved: true,
            proxies: true,
        }
    }
}

/// Console output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

/// Report sinks
#[derive(Debug, Clone, Default)]
pub struct OutputConfig {
    pub format: OutputFormat,
    /// Directory for JSON and CSV report files, if any
    pub output_dir: Option<PathBuf>,
    /// Exit non-zero when any region failed
    pub fail_on_region_error: bool,
}

/// Configuration for a scan
///
/// Composed of focused sub-configs for organization.
#[derive(Debug, Clone, Default)]
pub struct ScanConfig {
    pub aws: AwsConfig,
    pub regions: RegionSelection,
    pub families: FamilyToggles,
    pub database: DatabaseToggles,
    pub output: OutputConfig,
}

impl ScanConfig {
    pub fn home_region(&self) -> &str {
        &self.aws.home_region
    }
    pub fn aws_profile(&self) -> Option<&str> {
        self.aws.aws_profile.as_deref()
    }
    pub fn max_concurrency(&self) -> usize {
        self.regions.effective_concurrency()
    }
}
