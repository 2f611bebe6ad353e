//! Key-management family: KMS keys with their rotation status

use super::{RegionCollection, ResourceCollector, SubScan, run_subscan};
use crate::aws::api::{KmsApi, drain_pages};
use crate::aws::records::{AliasRecord, KeyMetadataRecord, KeyRecord};
use crate::scan::analyzer::rotation_skip_reason;
use cloudsweep_common::finding::{KmsKeyDetails, RotationStatus};
use cloudsweep_common::tags::{NOT_AVAILABLE, UNNAMED, or_not_available};
use cloudsweep_common::{Finding, FindingDetails, ResourceType};
use std::collections::HashMap;
use std::sync::Arc;

pub const SUBSCAN_ALIASES: &str = "keys.aliases";
pub const SUBSCAN_KEYS: &str = "keys.keys";

pub struct KeyCollector<A> {
    api: Arc<A>,
}

impl<A: KmsApi + 'static> KeyCollector<A> {
    pub fn new(api: Arc<A>) -> Self {
        Self { api }
    }

    /// Rotation status of a described key; queried only when rotation applies
    async fn rotation(
        &self,
        region: &str,
        key: &KeyMetadataRecord,
        out: &mut RegionCollection,
    ) -> RotationStatus {
        if let Some(reason) = rotation_skip_reason(key) {
            return RotationStatus::NotApplicable { reason };
        }

        match self.api.key_rotation_enabled(region, &key.id).await {
            Ok(true) => RotationStatus::Enabled,
            Ok(false) => RotationStatus::Disabled,
            Err(e) => {
                out.metric_unavailable(SUBSCAN_KEYS, &key.id, &e);
                RotationStatus::Unknown
            }
        }
    }
}

impl<A: KmsApi + 'static> ResourceCollector for KeyCollector<A> {
    async fn collect(&self, region: &str) -> RegionCollection {
        let mut out = RegionCollection::new(region);
        let api = self.api.as_ref();

        let aliases = run_subscan(
            SUBSCAN_ALIASES,
            region,
            drain_pages(|token| api.list_aliases(region, token)),
        )
        .await;
        out.track(SUBSCAN_ALIASES, &aliases, Vec::len);
        let alias_map = aliases
            .as_complete()
            .map(|records| alias_map(records))
            .unwrap_or_default();

        let keys = run_subscan(
            SUBSCAN_KEYS,
            region,
            drain_pages(|token| api.list_keys(region, token)),
        )
        .await;

        let keys = match keys {
            SubScan::Complete(records) => records,
            failed @ SubScan::Failed(_) => {
                out.absorb(SUBSCAN_KEYS, failed.map(|_| Vec::new()));
                return out;
            }
        };

        let mut findings = Vec::with_capacity(keys.len());
        for key in keys {
            let alias = alias_map.get(&key.id).cloned();
            let finding = match api.describe_key(region, &key.id).await {
                Ok(meta) => {
                    let rotation = self.rotation(region, &meta, &mut out).await;
                    key_finding(region, &key, alias, Some(&meta), rotation)
                }
                Err(e) => {
                    out.metric_unavailable(SUBSCAN_KEYS, &key.id, &e);
                    key_finding(region, &key, alias, None, RotationStatus::Unknown)
                }
            };
            findings.push(finding);
        }
        out.absorb(SUBSCAN_KEYS, SubScan::Complete(findings));

        out
    }
}

/// Key id to alias name; a later alias for the same key replaces an earlier one
fn alias_map(records: &[AliasRecord]) -> HashMap<String, String> {
    records
        .iter()
        .filter_map(|a| Some((a.target_key_id.clone()?, a.name.clone())))
        .collect()
}

fn key_finding(
    region: &str,
    key: &KeyRecord,
    alias: Option<String>,
    meta: Option<&KeyMetadataRecord>,
    rotation: RotationStatus,
) -> Finding {
    let name = alias.clone().unwrap_or_else(|| UNNAMED.to_string());
    Finding::new(
        region,
        ResourceType::KmsKey,
        &key.id,
        name,
        or_not_available(meta.map(|m| m.key_state.as_str())),
        FindingDetails::KmsKey(KmsKeyDetails {
            alias: alias.unwrap_or_else(|| NOT_AVAILABLE.to_string()),
            arn: or_not_available(Some(key.arn.as_str())),
            key_manager: or_not_available(meta.map(|m| m.key_manager.as_str())),
            key_usage: or_not_available(meta.map(|m| m.key_usage.as_str())),
            origin: or_not_available(meta.map(|m| m.origin.as_str())),
            key_spec: or_not_available(meta.map(|m| m.key_spec.as_str())),
            rotation,
        }),
    )
    .with_created_at(meta.and_then(|m| m.created_at))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cloudsweep_common::finding::RotationSkipReason;

    #[test]
    fn later_alias_wins() {
        let records = vec![
            AliasRecord {
                name: "alias/old".to_string(),
                target_key_id: Some("k1".to_string()),
            },
            AliasRecord {
                name: "alias/aws/ebs".to_string(),
                target_key_id: None,
            },
            AliasRecord {
                name: "alias/new".to_string(),
                target_key_id: Some("k1".to_string()),
            },
        ];
        let map = alias_map(&records);
        assert_eq!(map.len(), 1);
        assert_eq!(map["k1"], "alias/new");
    }

    #[test]
    fn undescribed_key_uses_sentinels() {
        let key = KeyRecord {
            id: "k1".to_string(),
            arn: "arn:aws:kms:us-east-1:123456789012:key/k1".to_string(),
        };
        let finding = key_finding("us-east-1", &key, None, None, RotationStatus::Unknown);
        assert_eq!(finding.name, "unnamed");
        assert_eq!(finding.status, "N/A");
        match finding.details {
            FindingDetails::KmsKey(d) => {
                assert_eq!(d.alias, "N/A");
                assert_eq!(d.key_manager, "N/A");
                assert_eq!(d.rotation, RotationStatus::Unknown);
            }
            other => panic!("unexpected details {other:?}"),
        }
    }

    #[test]
    fn described_key_carries_metadata() {
        let key = KeyRecord {
            id: "k2".to_string(),
            arn: "arn:k2".to_string(),
        };
        let meta = KeyMetadataRecord {
            id: "k2".to_string(),
            key_manager: "AWS".to_string(),
            key_usage: "ENCRYPT_DECRYPT".to_string(),
            origin: "AWS_KMS".to_string(),
            key_spec: "SYMMETRIC_DEFAULT".to_string(),
            key_state: "Enabled".to_string(),
            ..Default::default()
        };
        let rotation = RotationStatus::NotApplicable {
            reason: RotationSkipReason::AwsManaged,
        };
        let finding = key_finding(
            "us-east-1",
            &key,
            Some("alias/aws/s3".to_string()),
            Some(&meta),
            rotation,
        );
        assert_eq!(finding.name, "alias/aws/s3");
        assert_eq!(finding.status, "Enabled");
    }
}
