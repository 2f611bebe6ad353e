//! NAT gateway family: gateways with 30-day traffic and zombie detection

use super::{RegionCollection, ResourceCollector, SubScan, run_subscan};
use crate::aws::api::{Ec2Api, MetricsApi, drain_pages};
use crate::aws::records::{MetricQuery, NatGatewayRecord};
use crate::scan::analyzer::{bytes_to_gb, is_zombie_nat};
use chrono::{DateTime, Duration, Utc};
use cloudsweep_common::defaults::{NAT_TRAFFIC_PERIOD_SECS, NAT_TRAFFIC_WINDOW_DAYS};
use cloudsweep_common::finding::NatGatewayDetails;
use cloudsweep_common::tags::{name_from_tags, or_not_available};
use cloudsweep_common::{Finding, FindingDetails, ResourceType};
use std::sync::Arc;

pub const SUBSCAN_NAT_GATEWAYS: &str = "gateway.nat_gateways";

const NAT_NAMESPACE: &str = "AWS/NATGateway";
const NAT_DIMENSION: &str = "NatGatewayId";

/// Ingress and egress byte counters, summed into one traffic figure
const TRAFFIC_METRICS: [&str; 2] = ["BytesInFromSource", "BytesOutToDestination"];

/// Traffic measured for one gateway
#[derive(Debug, Clone, Copy, PartialEq)]
struct Traffic {
    bytes: f64,
    complete: bool,
}

pub struct NatGatewayCollector<A> {
    api: Arc<A>,
    reference_time: Option<DateTime<Utc>>,
}

impl<A: Ec2Api + MetricsApi + 'static> NatGatewayCollector<A> {
    pub fn new(api: Arc<A>) -> Self {
        Self {
            api,
            reference_time: None,
        }
    }

    /// Pin "now" for age and traffic-window calculations
    pub fn with_reference_time(mut self, now: DateTime<Utc>) -> Self {
        self.reference_time = Some(now);
        self
    }

    async fn traffic(
        &self,
        region: &str,
        gateway_id: &str,
        now: DateTime<Utc>,
        out: &mut RegionCollection,
    ) -> Traffic {
        let mut traffic = Traffic {
            bytes: 0.0,
            complete: true,
        };

        for metric in TRAFFIC_METRICS {
            let query = MetricQuery {
                namespace: NAT_NAMESPACE.to_string(),
                metric_name: metric.to_string(),
                dimension_name: NAT_DIMENSION.to_string(),
                dimension_value: gateway_id.to_string(),
                start: now - Duration::days(NAT_TRAFFIC_WINDOW_DAYS),
                end: now,
                period_secs: NAT_TRAFFIC_PERIOD_SECS,
            };
            match self.api.metric_sum(region, &query).await {
                Ok(sum) => traffic.bytes += sum,
                Err(e) => {
                    out.metric_unavailable(SUBSCAN_NAT_GATEWAYS, gateway_id, &e);
                    traffic.complete = false;
                }
            }
        }

        traffic
    }
}

impl<A: Ec2Api + MetricsApi + 'static> ResourceCollector for NatGatewayCollector<A> {
    async fn collect(&self, region: &str) -> RegionCollection {
        let mut out = RegionCollection::new(region);
        let api = self.api.as_ref();
        let now = self.reference_time.unwrap_or_else(Utc::now);

        let gateways = run_subscan(
            SUBSCAN_NAT_GATEWAYS,
            region,
            drain_pages(|token| api.describe_nat_gateways(region, token)),
        )
        .await;

        let gateways = match gateways {
            SubScan::Complete(records) => records,
            failed @ SubScan::Failed(_) => {
                out.absorb(SUBSCAN_NAT_GATEWAYS, failed.map(|_| Vec::new()));
                return out;
            }
        };

        let mut findings = Vec::with_capacity(gateways.len());
        for gateway in gateways {
            let traffic = self.traffic(region, &gateway.id, now, &mut out).await;
            findings.push(nat_finding(region, gateway, traffic, now));
        }
        out.absorb(SUBSCAN_NAT_GATEWAYS, SubScan::Complete(findings));

        out
    }
}

fn nat_finding(
    region: &str,
    record: NatGatewayRecord,
    traffic: Traffic,
    now: DateTime<Utc>,
) -> Finding {
    let traffic_gb = bytes_to_gb(traffic.bytes);
    let zombie = is_zombie_nat(record.create_time, traffic_gb, now);

    Finding::new(
        region,
        ResourceType::NatGateway,
        &record.id,
        name_from_tags(&record.tags),
        &record.state,
        FindingDetails::NatGateway(NatGatewayDetails {
            vpc_id: or_not_available(record.vpc_id.as_deref()),
            subnet_id: or_not_available(record.subnet_id.as_deref()),
            public_ip: or_not_available(record.public_ip.as_deref()),
            connectivity_type: or_not_available(record.connectivity_type.as_deref()),
            traffic_gb,
            traffic_complete: traffic.complete,
        }),
    )
    .with_created_at(record.create_time)
    .with_zombie(zombie)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use cloudsweep_common::defaults::BYTES_PER_GB;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn gateway(age_hours: i64) -> NatGatewayRecord {
        NatGatewayRecord {
            id: "nat-1".to_string(),
            state: "available".to_string(),
            vpc_id: Some("vpc-1".to_string()),
            create_time: Some(now() - Duration::hours(age_hours)),
            ..Default::default()
        }
    }

    fn traffic(gb: f64) -> Traffic {
        Traffic {
            bytes: gb * BYTES_PER_GB,
            complete: true,
        }
    }

    #[test]
    fn idle_old_gateway_is_zombie() {
        let finding = nat_finding("us-east-1", gateway(48), traffic(0.5), now());
        assert!(finding.is_zombie);
        assert!(!finding.is_orphan);
        match finding.details {
            FindingDetails::NatGateway(d) => {
                assert_eq!(d.traffic_gb, 0.5);
                assert_eq!(d.vpc_id, "vpc-1");
                assert_eq!(d.connectivity_type, "N/A");
            }
            other => panic!("unexpected details {other:?}"),
        }
    }

    #[test]
    fn young_or_busy_gateway_is_not_zombie() {
        assert!(!nat_finding("us-east-1", gateway(12), traffic(0.0), now()).is_zombie);
        assert!(!nat_finding("us-east-1", gateway(48), traffic(5.0), now()).is_zombie);
    }

    #[test]
    fn unreadable_traffic_counts_as_zero() {
        let partial = Traffic {
            bytes: 0.0,
            complete: false,
        };
        let finding = nat_finding("us-east-1", gateway(72), partial, now());
        assert!(finding.is_zombie);
        match finding.details {
            FindingDetails::NatGateway(d) => assert!(!d.traffic_complete),
            other => panic!("unexpected details {other:?}"),
        }
    }
}
