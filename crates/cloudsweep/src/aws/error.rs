//! AWS error classification and handling
//!
//! Provides typed errors for AWS SDK operations using the `.code()` method
//! instead of string matching on Debug format.

use aws_sdk_ec2::error::{DisplayErrorContext, ProvideErrorMetadata};
use cloudsweep_common::FailureCategory;
use thiserror::Error;

/// AWS error categories used to classify failed sub-scans and regions
#[derive(Debug, Clone, Error)]
pub enum AwsError {
    /// Resource was not found
    #[error("Resource not found: {message}")]
    NotFound { code: String, message: String },

    /// Rate limit exceeded
    #[error("Rate limit exceeded ({code})")]
    Throttled { code: String },

    /// Credentials were rejected or lack permission for the call
    #[error("Access denied ({code}): {message}")]
    AccessDenied { code: String, message: String },

    /// Region is not enabled for the account
    #[error("Region requires opt-in: {message}")]
    OptInRequired { message: String },

    /// Region name cannot be used to build clients
    #[error("Invalid region '{0}'")]
    InvalidRegion(String),

    /// Generic AWS SDK error with code and message
    #[error("AWS error: {message}")]
    Sdk {
        code: Option<String>,
        message: String,
    },
}

impl AwsError {
    /// Check if this is a throttling error
    pub fn is_throttled(&self) -> bool {
        matches!(self, AwsError::Throttled { .. })
    }

    /// Coarse category recorded in scan outcomes
    pub fn category(&self) -> FailureCategory {
        match self {
            AwsError::Throttled { .. } => FailureCategory::Throttled,
            AwsError::AccessDenied { .. } => FailureCategory::AccessDenied,
            AwsError::OptInRequired { .. } => FailureCategory::OptInRequired,
            AwsError::NotFound { .. } | AwsError::InvalidRegion(_) | AwsError::Sdk { .. } => {
                FailureCategory::Other
            }
        }
    }

    /// Provider error code, when one was returned
    pub fn code(&self) -> Option<&str> {
        match self {
            AwsError::NotFound { code, .. }
            | AwsError::Throttled { code }
            | AwsError::AccessDenied { code, .. } => Some(code),
            AwsError::OptInRequired { .. } => Some("OptInRequired"),
            AwsError::InvalidRegion(_) => None,
            AwsError::Sdk { code, .. } => code.as_deref(),
        }
    }

    /// Get a user-friendly suggestion for resolving this error, if available.
    pub fn suggestion(&self) -> Option<String> {
        self.code().and_then(suggestion_for_code)
    }
}

/// Known AWS error codes for "not found" conditions
const NOT_FOUND_CODES: &[&str] = &[
    "InvalidInstanceID.NotFound",
    "InvalidVolume.NotFound",
    "InvalidSnapshot.NotFound",
    "InvalidNatGatewayID.NotFound",
    "DBInstanceNotFound",
    "DBClusterNotFoundFault",
    "DBSnapshotNotFound",
    "NotFoundException",
];

/// Known AWS error codes for throttling/rate limiting
const THROTTLING_CODES: &[&str] = &[
    "Throttling",
    "ThrottlingException",
    "RequestLimitExceeded",
    "TooManyRequestsException",
    "RequestThrottled",
];

/// Known AWS error codes for rejected or insufficient credentials
const ACCESS_DENIED_CODES: &[&str] = &[
    "AccessDenied",
    "AccessDeniedException",
    "UnauthorizedOperation",
    "AuthFailure",
    "InvalidClientTokenId",
    "UnrecognizedClientException",
    "ExpiredToken",
    "ExpiredTokenException",
];

/// Known AWS error codes for regions that are not enabled
const OPT_IN_CODES: &[&str] = &["OptInRequired"];

/// Classify an AWS SDK error using the error code.
pub fn classify_aws_error(code: Option<&str>, message: Option<&str>) -> AwsError {
    let message = message.unwrap_or("Unknown error").to_string();

    match code {
        Some(c) if NOT_FOUND_CODES.contains(&c) => AwsError::NotFound {
            code: c.to_string(),
            message,
        },
        Some(c) if THROTTLING_CODES.contains(&c) => AwsError::Throttled {
            code: c.to_string(),
        },
        Some(c) if ACCESS_DENIED_CODES.contains(&c) => AwsError::AccessDenied {
            code: c.to_string(),
            message,
        },
        Some(c) if OPT_IN_CODES.contains(&c) => AwsError::OptInRequired { message },
        _ => AwsError::Sdk {
            code: code.map(|s| s.to_string()),
            message,
        },
    }
}

/// Classify an SDK operation error from its error metadata.
///
/// Errors without a code (dispatch failures, timeouts) fall through to
/// [`AwsError::Sdk`] with the full error context as the message.
pub fn classify_sdk_error<E>(error: &E) -> AwsError
where
    E: ProvideErrorMetadata + std::error::Error,
{
    let message = match error.message() {
        Some(m) => m.to_string(),
        None => DisplayErrorContext(error).to_string(),
    };
    classify_aws_error(error.code(), Some(&message))
}

/// Classify an error from an anyhow::Error.
///
/// Walks the error chain looking for an [`AwsError`] produced by the
/// provider. Falls back to extracting a known code from the Debug
/// representation, then to a generic error.
pub fn classify_anyhow_error(error: &anyhow::Error) -> AwsError {
    for cause in error.chain() {
        if let Some(e) = cause.downcast_ref::<AwsError>() {
            return e.clone();
        }
    }

    // Fallback: extract error code from debug string representation
    let debug_str = format!("{:?}", error);
    if let Some(code) = extract_error_code(&debug_str) {
        return classify_aws_error(Some(&code), Some(&format!("{error:#}")));
    }

    AwsError::Sdk {
        code: None,
        message: format!("{error:#}"),
    }
}

/// All known AWS error codes for extraction from debug strings (flat list)
const ALL_KNOWN_CODES: &[&[&str]] = &[
    NOT_FOUND_CODES,
    THROTTLING_CODES,
    ACCESS_DENIED_CODES,
    OPT_IN_CODES,
];

/// Extract an AWS error code from a debug string representation
fn extract_error_code(debug_str: &str) -> Option<String> {
    // Longest match first so `ThrottlingException` wins over `Throttling`
    let mut known: Vec<&str> = ALL_KNOWN_CODES.iter().flat_map(|c| c.iter().copied()).collect();
    known.sort_by_key(|c| std::cmp::Reverse(c.len()));
    if let Some(code) = known.into_iter().find(|c| debug_str.contains(c)) {
        return Some(code.to_string());
    }

    // Try to extract any code from `code: Some("...")` pattern
    if let Some(start) = debug_str.find("code: Some(\"") {
        let rest = &debug_str[start + 12..];
        if let Some(end) = rest.find('"') {
            return Some(rest[..end].to_string());
        }
    }

    None
}

/// Error code to user-friendly suggestion mapping
const SUGGESTIONS: &[(&str, &str)] = &[
    (
        "UnauthorizedOperation",
        "Grant the scanning role read access (ec2:Describe*, rds:Describe*, kms:List*, kms:Describe*, kms:GetKeyRotationStatus, cloudwatch:GetMetricStatistics).",
    ),
    (
        "AccessDenied",
        "Grant the scanning role read access to the failing service.",
    ),
    (
        "AccessDeniedException",
        "Grant the scanning role read access to the failing service.",
    ),
    (
        "AuthFailure",
        "Credentials were rejected; the region may be disabled for this account.",
    ),
    (
        "InvalidClientTokenId",
        "Credentials were rejected; the region may be disabled for this account.",
    ),
    (
        "UnrecognizedClientException",
        "Credentials were rejected; the region may be disabled for this account.",
    ),
    (
        "ExpiredToken",
        "Session credentials expired. Refresh them and rerun the scan.",
    ),
    (
        "ExpiredTokenException",
        "Session credentials expired. Refresh them and rerun the scan.",
    ),
    (
        "OptInRequired",
        "Enable the region for the account or exclude it with --regions.",
    ),
    (
        "Throttling",
        "AWS API rate limit hit. Lower --concurrency and rerun.",
    ),
    (
        "ThrottlingException",
        "AWS API rate limit hit. Lower --concurrency and rerun.",
    ),
    (
        "RequestLimitExceeded",
        "AWS API rate limit hit. Lower --concurrency and rerun.",
    ),
];

/// Get a user-friendly suggestion for a known error code.
fn suggestion_for_code(code: &str) -> Option<String> {
    SUGGESTIONS
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, s)| (*s).to_string())
}
