//! Shared test utilities for cloudsweep
//!
//! This crate provides the in-memory provider and fixture builders used by
//! the integration tests, without circular dependencies on test code.
//!
//! ## Modules
//!
//! - [`aws`]: In-memory provider implementing every port, plus live-test helpers
//! - [`fixtures`]: Builders for provider records

pub mod aws;
pub mod fixtures;

// Re-export commonly used items
pub use aws::{Call, FAKE_ACCOUNT_ID, FakeProvider, Operation, RegionFixture, get_test_region};
