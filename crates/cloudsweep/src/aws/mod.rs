//! AWS-facing modules
//!
//! This module provides:
//! - api: Provider ports (traits) and the pagination helper
//! - records: Plain records returned by the ports
//! - provider: AWS SDK implementation of every port
//! - context: Shared SDK config and the per-region client cache
//! - account: STS account lookup
//! - regions: Enabled-region discovery
//! - error: Classification of SDK errors

pub mod account;
pub mod api;
pub mod context;
pub mod error;
pub mod provider;
pub mod records;
pub mod regions;

pub use account::{AccountId, get_current_account_id};
pub use api::{AccountApi, CloudApi, Ec2Api, KmsApi, MetricsApi, Page, RdsApi, drain_pages};
pub use context::{AwsContext, ClientCache, RegionClients};
pub use error::{AwsError, classify_anyhow_error, classify_aws_error, classify_sdk_error};
pub use provider::AwsProvider;
pub use regions::{RegionResolver, dedup_regions};
