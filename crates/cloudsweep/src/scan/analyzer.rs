//! Cross-reference classification rules
//!
//! Every rule here is a pure function. Collectors call them inside the
//! region task, after the live sub-scans have filled an
//! [`ActiveResourceIndex`]; nothing is ever compared across regions.
//!
//! | Rule | Flag | Condition |
//! |------|------|-----------|
//! | volume | orphan | status `available` |
//! | snapshot | orphan | no source id, or source id not in the index |
//! | NAT gateway | zombie | older than 24h and under 1.0 GiB in 30 days |
//! | KMS key | rotation n/a | AWS managed, non-encrypt usage, external, asymmetric/HMAC |

use crate::aws::records::KeyMetadataRecord;
use chrono::{DateTime, Duration, Utc};
use cloudsweep_common::defaults::{BYTES_PER_GB, NAT_ZOMBIE_MAX_TRAFFIC_GB, NAT_ZOMBIE_MIN_AGE_HOURS};
use cloudsweep_common::finding::RotationSkipReason;
use std::collections::HashSet;

/// Live resource ids of one region
///
/// Holds whatever the live sub-scans listed. A failed listing leaves its
/// ids out; the failure itself is recorded as a region issue.
#[derive(Debug, Clone, Default)]
pub struct ActiveResourceIndex {
    ids: HashSet<String>,
}

impl ActiveResourceIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extend<I, S>(&mut self, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ids.extend(ids.into_iter().map(Into::into));
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }
}

/// Volume state reported by EC2 for unattached volumes
pub const VOLUME_AVAILABLE: &str = "available";

/// An unattached volume is orphaned
pub fn is_orphan_volume(state: &str) -> bool {
    state == VOLUME_AVAILABLE
}

/// A snapshot whose declared source is missing from the live index is
/// orphaned, as is a snapshot without a source id.
pub fn is_orphan_snapshot(source_id: Option<&str>, index: &ActiveResourceIndex) -> bool {
    match source_id.filter(|s| !s.is_empty()) {
        None => true,
        Some(source) => !index.contains(source),
    }
}

/// Convert bytes to GiB rounded to two decimals
pub fn bytes_to_gb(bytes: f64) -> f64 {
    (bytes / BYTES_PER_GB * 100.0).round() / 100.0
}

/// A NAT gateway older than a day that moved under 1 GiB is a zombie.
///
/// A gateway without a creation time is never a zombie.
pub fn is_zombie_nat(
    created_at: Option<DateTime<Utc>>,
    traffic_gb: f64,
    now: DateTime<Utc>,
) -> bool {
    let Some(created_at) = created_at else {
        return false;
    };
    let age = now - created_at;
    age > Duration::hours(NAT_ZOMBIE_MIN_AGE_HOURS) && traffic_gb < NAT_ZOMBIE_MAX_TRAFFIC_GB
}

/// Key spec prefixes of asymmetric and HMAC keys
const NON_SYMMETRIC_SPEC_PREFIXES: &[&str] = &["RSA_", "ECC_", "HMAC_", "SM2"];

/// Why automatic rotation does not apply to a key, checked in order.
///
/// `None` means rotation status must be queried.
pub fn rotation_skip_reason(key: &KeyMetadataRecord) -> Option<RotationSkipReason> {
    if key.key_manager == "AWS" {
        return Some(RotationSkipReason::AwsManaged);
    }
    if key.key_usage != "ENCRYPT_DECRYPT" {
        return Some(RotationSkipReason::NotEncryptDecrypt);
    }
    if key.origin == "EXTERNAL" {
        return Some(RotationSkipReason::ExternalKeyMaterial);
    }
    if NON_SYMMETRIC_SPEC_PREFIXES
        .iter()
        .any(|p| key.key_spec.starts_with(p))
    {
        return Some(RotationSkipReason::AsymmetricOrHmac);
    }
    None
}
