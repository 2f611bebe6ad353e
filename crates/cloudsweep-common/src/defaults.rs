//! Default configuration values and policy constants
//!
//! These constants keep the CLI, the scanner and the tests in agreement.

/// Region queried for the region listing and used when the listing fails
pub const DEFAULT_HOME_REGION: &str = "us-east-1";

/// Default number of regions scanned concurrently
pub const DEFAULT_MAX_CONCURRENCY: usize = 10;

/// Upper bound accepted for `--concurrency`
pub const MAX_CONCURRENCY_LIMIT: usize = 64;

/// Opt-in statuses of regions that are enabled for the account
pub const ENABLED_OPT_IN_STATUSES: &[&str] = &["opt-in-not-required", "opted-in"];

/// A NAT gateway must be older than this (hours) to be considered a zombie
pub const NAT_ZOMBIE_MIN_AGE_HOURS: i64 = 24;

/// A NAT gateway moving less than this many GiB in the traffic window is a zombie
pub const NAT_ZOMBIE_MAX_TRAFFIC_GB: f64 = 1.0;

/// Traffic lookback window for NAT gateways (days)
pub const NAT_TRAFFIC_WINDOW_DAYS: i64 = 30;

/// Metric bucket size for NAT gateway traffic (seconds, one day)
pub const NAT_TRAFFIC_PERIOD_SECS: i32 = 86_400;

/// Bytes per GiB used for traffic conversion
pub const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Default directory for file reports
pub const DEFAULT_OUTPUT_DIR: &str = "reports";
