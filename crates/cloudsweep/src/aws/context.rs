//! Shared AWS configuration context
//!
//! Provides `AwsContext` for loading AWS SDK configuration once and
//! `ClientCache` for building one set of service clients per region from
//! that same config.

use super::error::AwsError;
use aws_config::{BehaviorVersion, Region, SdkConfig};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::OnceCell;
use tracing::debug;

/// Shared AWS configuration context for creating service clients.
///
/// This struct holds a loaded AWS SDK config. The configured region is the
/// home region: region listing and credential validation go there, while
/// per-region clients come from [`ClientCache`].
///
/// # Example
/// ```ignore
/// let aws = AwsContext::new(Some("audit"), "us-east-1").await;
/// let cache = ClientCache::new(&aws);
/// let clients = cache.get("eu-west-1").await?;
/// ```
#[derive(Clone)]
pub struct AwsContext {
    config: Arc<SdkConfig>,
    home_region: String,
}

impl AwsContext {
    /// Load AWS configuration with `home_region` as the default region.
    ///
    /// This loads credentials, region configuration, and other AWS SDK
    /// settings from the environment, config files, and IAM roles. A
    /// profile name overrides the default credential resolution.
    pub async fn new(profile: Option<&str>, home_region: &str) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(home_region.to_string()));
        if let Some(profile) = profile {
            loader = loader.profile_name(profile);
        }
        let config = loader.load().await;

        Self {
            config: Arc::new(config),
            home_region: home_region.to_string(),
        }
    }

    /// Get the underlying SDK config for direct client construction.
    pub fn sdk_config(&self) -> &SdkConfig {
        &self.config
    }

    /// Get the home region string.
    pub fn home_region(&self) -> &str {
        &self.home_region
    }
}

impl std::fmt::Debug for AwsContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AwsContext")
            .field("home_region", &self.home_region)
            .finish_non_exhaustive()
    }
}

/// Service clients bound to one region
#[derive(Clone, Debug)]
pub struct RegionClients {
    pub ec2: aws_sdk_ec2::Client,
    pub rds: aws_sdk_rds::Client,
    pub kms: aws_sdk_kms::Client,
    pub cloudwatch: aws_sdk_cloudwatch::Client,
}

impl RegionClients {
    fn build(config: &SdkConfig, region: &str) -> Result<Self, AwsError> {
        if !is_valid_region_name(region) {
            return Err(AwsError::InvalidRegion(region.to_string()));
        }
        let region = Region::new(region.to_string());

        let ec2 = aws_sdk_ec2::config::Builder::from(config)
            .region(region.clone())
            .build();
        let rds = aws_sdk_rds::config::Builder::from(config)
            .region(region.clone())
            .build();
        let kms = aws_sdk_kms::config::Builder::from(config)
            .region(region.clone())
            .build();
        let cloudwatch = aws_sdk_cloudwatch::config::Builder::from(config)
            .region(region)
            .build();

        Ok(Self {
            ec2: aws_sdk_ec2::Client::from_conf(ec2),
            rds: aws_sdk_rds::Client::from_conf(rds),
            kms: aws_sdk_kms::Client::from_conf(kms),
            cloudwatch: aws_sdk_cloudwatch::Client::from_conf(cloudwatch),
        })
    }
}

/// Region names look like `us-east-1` or `ap-southeast-4`
fn is_valid_region_name(region: &str) -> bool {
    !region.is_empty()
        && region.contains('-')
        && region
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

/// Lazily built, per-region client sets.
///
/// Concurrent callers asking for the same region share a single
/// initialization; the map lock is only held to fetch the region's cell.
#[derive(Debug)]
pub struct ClientCache {
    config: Arc<SdkConfig>,
    cells: Mutex<HashMap<String, Arc<OnceCell<RegionClients>>>>,
}

impl ClientCache {
    pub fn new(ctx: &AwsContext) -> Self {
        Self {
            config: Arc::clone(&ctx.config),
            cells: Mutex::new(HashMap::new()),
        }
    }

    /// Clients for `region`, built on first use
    pub async fn get(&self, region: &str) -> Result<RegionClients, AwsError> {
        let cell = {
            let mut cells = self.cells.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(cells.entry(region.to_string()).or_default())
        };

        let clients = cell
            .get_or_try_init(|| async {
                debug!(region = %region, "Building region clients");
                RegionClients::build(&self.config, region)
            })
            .await?;
        Ok(clients.clone())
    }

    /// Number of regions with a cache entry
    pub fn len(&self) -> usize {
        self.cells
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
