//! Scan orchestration
//!
//! A scan validates credentials, resolves the region list, runs every
//! enabled family collector per region on the [`RegionWorkerPool`] and
//! aggregates the outcomes into a [`ScanReport`]. Only the two fatal
//! conditions in [`ScanError`] abort a scan; any other failure is carried
//! inside the report.

pub mod analyzer;
pub mod pool;

use crate::aws::api::CloudApi;
use crate::aws::regions::{RegionResolver, dedup_regions};
use crate::collect::FamilyCollectors;
use crate::config::ScanConfig;
use chrono::{DateTime, Utc};
use cloudsweep_common::{ReportAggregator, ScanMetadata, ScanReport};
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub use analyzer::ActiveResourceIndex;
pub use pool::RegionWorkerPool;

/// Conditions that abort a scan before any region runs
#[derive(Debug, Error)]
pub enum ScanError {
    /// Credentials are missing or rejected
    #[error("No usable AWS credentials")]
    NoCredentials {
        #[source]
        source: anyhow::Error,
    },

    /// Region resolution produced nothing to scan
    #[error("No regions to scan")]
    NoRegions,
}

/// Runs a full scan against one provider
pub struct Scanner<P> {
    provider: Arc<P>,
    config: ScanConfig,
    cancel: CancellationToken,
    reference_time: Option<DateTime<Utc>>,
}

impl<P: CloudApi + 'static> Scanner<P> {
    pub fn new(provider: Arc<P>, config: ScanConfig) -> Self {
        Self {
            provider,
            config,
            cancel: CancellationToken::new(),
            reference_time: None,
        }
    }

    /// Interrupt the scan when `cancel` fires
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Evaluate time-based rules against a fixed instant
    pub fn with_reference_time(mut self, now: DateTime<Utc>) -> Self {
        self.reference_time = Some(now);
        self
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Explicit regions (deduplicated) or every enabled region
    pub async fn resolve_regions(&self) -> Result<Vec<String>, ScanError> {
        let regions = match &self.config.regions.regions {
            Some(explicit) => dedup_regions(explicit.iter().map(String::as_str)),
            None => {
                RegionResolver::new(Arc::clone(&self.provider), self.config.home_region())
                    .resolve()
                    .await
            }
        };

        if regions.is_empty() {
            return Err(ScanError::NoRegions);
        }
        Ok(regions)
    }

    pub async fn run(&self) -> Result<ScanReport, ScanError> {
        let started_at = Utc::now();

        let account = self
            .provider
            .caller_identity()
            .await
            .map_err(|source| ScanError::NoCredentials { source })?;
        info!(account = %account, "Validated credentials");

        let regions = self.resolve_regions().await?;
        info!(
            regions = regions.len(),
            families = ?self.config.families.enabled(),
            "Starting scan"
        );

        let mut collector = FamilyCollectors::new(
            Arc::clone(&self.provider),
            self.config.families,
            self.config.database,
        );
        if let Some(now) = self.reference_time {
            collector = collector.with_reference_time(now);
        }

        let outcomes = RegionWorkerPool::new(self.config.max_concurrency())
            .with_cancellation(self.cancel.clone())
            .run(regions, Arc::new(collector))
            .await;

        let metadata = ScanMetadata::finished_now(Some(account.into_inner()), started_at);
        let report = ReportAggregator::new(metadata).aggregate(outcomes);
        info!(
            findings = report.totals().count,
            flagged = report.totals().flagged_count,
            failed_regions = report.failed_regions().len(),
            "Scan complete"
        );
        Ok(report)
    }
}
