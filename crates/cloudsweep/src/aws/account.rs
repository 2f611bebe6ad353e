//! Caller identity

use super::error::classify_sdk_error;
use anyhow::{Context, Result};
use tracing::debug;

/// Account that owns the scanned resources
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::Display, derive_more::Deref)]
pub struct AccountId(String);

impl AccountId {
    pub fn new(s: impl Into<String>) -> Self {
        AccountId(s.into())
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

/// Resolve the account behind the loaded credentials.
///
/// GetCallerIdentity needs no IAM permission, so a failure here means the
/// credentials themselves are missing or rejected.
pub async fn get_current_account_id(config: &aws_config::SdkConfig) -> Result<AccountId> {
    let output = aws_sdk_sts::Client::new(config)
        .get_caller_identity()
        .send()
        .await
        .map_err(|e| classify_sdk_error(&e))
        .context("Failed to get AWS caller identity - check credentials")?;

    let account = output
        .account()
        .map(AccountId::new)
        .context("GetCallerIdentity returned no account")?;
    debug!(account = %account, arn = output.arn().unwrap_or_default(), "Resolved caller identity");
    Ok(account)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn account_id_derefs_to_str() {
        let id = AccountId::new("123456789012");
        assert_eq!(id.len(), 12);
        assert_eq!(id.to_string(), "123456789012");
        assert_eq!(id.into_inner(), "123456789012");
    }
}
