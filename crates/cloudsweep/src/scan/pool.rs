//! Bounded per-region task pool
//!
//! Every region runs as its own tokio task; a semaphore caps how many
//! collect at once. Each region yields exactly one [`RegionOutcome`]: a
//! panicking task becomes `TaskFailed`, and an interrupt turns every
//! unfinished region into `Interrupted` while keeping completed outcomes.

use crate::aws::regions::dedup_regions;
use crate::collect::ResourceCollector;
use cloudsweep_common::defaults::{DEFAULT_MAX_CONCURRENCY, MAX_CONCURRENCY_LIMIT};
use cloudsweep_common::{RegionError, RegionOutcome};
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::{Id, JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{Span, error, info, instrument, warn};

pub struct RegionWorkerPool {
    max_concurrency: usize,
    cancel: CancellationToken,
}

impl Default for RegionWorkerPool {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CONCURRENCY)
    }
}

impl RegionWorkerPool {
    /// Pool running at most `max_concurrency` regions at once
    pub fn new(max_concurrency: usize) -> Self {
        Self {
            max_concurrency: max_concurrency.clamp(1, MAX_CONCURRENCY_LIMIT),
            cancel: CancellationToken::new(),
        }
    }

    /// Observe an externally owned interrupt token
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    /// Token that interrupts [`run`](Self::run) when cancelled
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Scan every region and return one outcome per distinct region, in
    /// completion order. Interrupted regions come last.
    pub async fn run<C: ResourceCollector>(
        &self,
        regions: Vec<String>,
        collector: Arc<C>,
    ) -> Vec<RegionOutcome> {
        let regions = dedup_regions(regions);
        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let mut tasks = JoinSet::new();
        let mut task_regions: HashMap<Id, String> = HashMap::with_capacity(regions.len());

        info!(
            regions = regions.len(),
            max_concurrency = self.max_concurrency,
            "Starting region scans"
        );

        for region in &regions {
            let collector = Arc::clone(&collector);
            let semaphore = Arc::clone(&semaphore);
            let task_region = region.clone();
            let handle = tasks.spawn(async move {
                // The semaphore is never closed, so acquiring only waits
                let _permit = semaphore.acquire_owned().await.ok();
                scan_region(collector, task_region).await
            });
            task_regions.insert(handle.id(), region.clone());
        }

        let mut outcomes = Vec::with_capacity(regions.len());
        let mut interrupted = false;

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled(), if !interrupted => {
                    warn!(
                        pending = tasks.len(),
                        "Scan interrupted, abandoning unfinished regions"
                    );
                    interrupted = true;
                    tasks.abort_all();
                }
                joined = tasks.join_next_with_id() => match joined {
                    Some(Ok((_, outcome))) => outcomes.push(outcome),
                    Some(Err(e)) => {
                        let region = task_regions
                            .get(&e.id())
                            .cloned()
                            .unwrap_or_default();
                        outcomes.push(RegionOutcome::failed(region, join_error(e)));
                    }
                    None => break,
                },
            }
        }

        // Regions whose task never produced anything still get an outcome
        for region in regions {
            if !outcomes.iter().any(|o| o.region == region) {
                outcomes.push(RegionOutcome::failed(region, RegionError::Interrupted));
            }
        }

        outcomes
    }
}

fn join_error(e: JoinError) -> RegionError {
    if e.is_cancelled() {
        return RegionError::Interrupted;
    }
    let message = match e.try_into_panic() {
        Ok(payload) => panic_message(payload.as_ref()),
        Err(e) => e.to_string(),
    };
    error!(error = %message, "Region task failed");
    RegionError::TaskFailed { message }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "region task panicked".to_string()
    }
}

#[instrument(skip_all, fields(region = %region, duration_ms))]
async fn scan_region<C: ResourceCollector>(collector: Arc<C>, region: String) -> RegionOutcome {
    let started = Instant::now();
    info!("Scanning region");

    let collection = collector.collect(&region).await;
    let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
    Span::current().record("duration_ms", duration_ms);

    let outcome = collection.into_outcome(duration_ms);
    match &outcome.error {
        Some(e) => error!(error = %e, "Region unavailable"),
        None => info!(
            findings = outcome.findings.len(),
            flagged = outcome.flagged_count(),
            issues = outcome.issues.len(),
            "Region scanned"
        ),
    }
    outcome
}
