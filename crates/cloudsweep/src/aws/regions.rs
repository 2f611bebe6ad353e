//! Region discovery

use super::api::Ec2Api;
use cloudsweep_common::defaults::{DEFAULT_HOME_REGION, ENABLED_OPT_IN_STATUSES};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{error, info};

/// Resolves the ordered list of regions to scan
pub struct RegionResolver<A> {
    api: Arc<A>,
    home_region: String,
}

impl<A: Ec2Api> RegionResolver<A> {
    pub fn new(api: Arc<A>, home_region: impl Into<String>) -> Self {
        Self {
            api,
            home_region: home_region.into(),
        }
    }

    /// Enabled regions in listing order.
    ///
    /// Fails open: when the listing fails the scan continues against
    /// `us-east-1` alone.
    pub async fn resolve(&self) -> Vec<String> {
        match self.api.describe_regions(&self.home_region).await {
            Ok(records) => {
                let regions: Vec<String> = records
                    .into_iter()
                    .filter(|r| ENABLED_OPT_IN_STATUSES.contains(&r.opt_in_status.as_str()))
                    .map(|r| r.name)
                    .collect();
                info!(count = regions.len(), home_region = %self.home_region, "Resolved enabled regions");
                regions
            }
            Err(e) => {
                error!(
                    error = %format!("{e:#}"),
                    home_region = %self.home_region,
                    fallback = DEFAULT_HOME_REGION,
                    "Region listing failed, falling back"
                );
                vec![DEFAULT_HOME_REGION.to_string()]
            }
        }
    }
}

/// Remove duplicate regions, keeping the first occurrence of each
pub fn dedup_regions<I, S>(regions: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut seen = HashSet::new();
    regions
        .into_iter()
        .map(Into::into)
        .filter(|r: &String| !r.is_empty() && seen.insert(r.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedup_keeps_first_occurrence() {
        let regions = dedup_regions(["us-west-2", "us-east-1", "us-west-2", "", "eu-west-1"]);
        assert_eq!(regions, vec!["us-west-2", "us-east-1", "eu-west-1"]);
    }
}
