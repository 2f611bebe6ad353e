//! Tag and sentinel helpers shared by every collector
//!
//! ## Sentinels
//!
//! | Field | Sentinel | When |
//! |-------|----------|------|
//! | `name` | `unnamed` | no `Name` tag on the resource |
//! | `created_at` (rendered) | `N/A` | provider returned no timestamp |
//! | any optional attribute | `N/A` | provider omitted the attribute |

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Tag key holding the human-readable name of a resource
const TAG_NAME: &str = "Name";

/// Name used when a resource has no `Name` tag
pub const UNNAMED: &str = "unnamed";

/// Placeholder for absent timestamps and attributes
pub const NOT_AVAILABLE: &str = "N/A";

/// Display format for timestamps in tables and CSV
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Resolve the display name from a tag map, falling back to [`UNNAMED`]
pub fn name_from_tags(tags: &BTreeMap<String, String>) -> String {
    tags.get(TAG_NAME)
        .filter(|v| !v.trim().is_empty())
        .cloned()
        .unwrap_or_else(|| UNNAMED.to_string())
}

/// Format an optional timestamp, falling back to [`NOT_AVAILABLE`]
pub fn format_timestamp(time: Option<DateTime<Utc>>) -> String {
    time.map(|t| t.format(TIMESTAMP_FORMAT).to_string())
        .unwrap_or_else(|| NOT_AVAILABLE.to_string())
}

/// Return the value or the [`NOT_AVAILABLE`] sentinel
pub fn or_not_available(value: Option<&str>) -> String {
    value
        .filter(|v| !v.is_empty())
        .unwrap_or(NOT_AVAILABLE)
        .to_string()
}
