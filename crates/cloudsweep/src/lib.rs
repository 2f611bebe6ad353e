//! cloudsweep - multi-region AWS inventory scanner
//!
//! This crate scans every enabled region of an account, inventories
//! compute, storage, database, key and NAT gateway resources, and flags
//! orphaned and idle ones. Each region is scanned in isolation; one
//! region failing never affects another.

pub mod aws;
pub mod collect;
pub mod config;
pub mod report;
pub mod scan;
