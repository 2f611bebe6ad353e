//! cloudsweep-common - Shared data model
//!
//! This crate holds the plain, serialization-ready types produced by a
//! scan, without any AWS SDK dependencies, so report sinks and tests can
//! consume them directly.
//!
//! ## Modules
//!
//! - [`defaults`]: Default configuration values and policy thresholds
//! - [`finding`]: One record per discovered resource
//! - [`outcome`]: Per-region results and failure classification
//! - [`report`]: The scan report and its aggregator
//! - [`resource_kind`]: Resource types and collector families
//! - [`tags`]: Name tag handling and display sentinels

pub mod defaults;
pub mod finding;
pub mod outcome;
pub mod report;
pub mod resource_kind;
pub mod tags;

// Re-export commonly used types
pub use finding::{Capacity, CapacityUnit, Finding, FindingDetails};
pub use outcome::{FailureCategory, IssueKind, RegionError, RegionOutcome, ScanIssue};
pub use report::{GroupSummary, RegionSummary, ReportAggregator, ScanMetadata, ScanReport};
pub use resource_kind::{ResourceFamily, ResourceType};
