//! Wire model for the ViaIpe API payload and the persisted summary row.

use serde::Deserialize;
use serde_json::Value;

/// One polled client as returned by the API. Every part of the payload is
/// optional; eligibility decides what reaches the aggregator.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientReport {
    pub data: Option<ClientData>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClientData {
    pub smoke: Option<SmokeProbe>,
    #[serde(default)]
    pub interfaces: Option<Vec<InterfaceTraffic>>,
}

/// Quality-probe averages. Unknown keys are retained so that a probe object
/// with no fields at all can be told apart from one that merely lacks the
/// averages; only the former disqualifies the client.
#[derive(Debug, Clone, Deserialize)]
pub struct SmokeProbe {
    /// Average round-trip latency in milliseconds
    pub avg_val: Option<f64>,
    /// Average packet loss in percent
    pub avg_loss: Option<f64>,
    #[serde(flatten)]
    extra: serde_json::Map<String, Value>,
}

impl SmokeProbe {
    /// True when the probe object carries no fields at all.
    pub fn is_empty(&self) -> bool {
        self.avg_val.is_none() && self.avg_loss.is_none() && self.extra.is_empty()
    }
}

/// Per-interface traffic counters in bits per second. Absent or null
/// counters count as zero traffic, never as an error.
#[derive(Debug, Clone, Deserialize)]
pub struct InterfaceTraffic {
    #[serde(default)]
    pub traffic_in: Option<f64>,
    #[serde(default)]
    pub traffic_out: Option<f64>,
}

impl InterfaceTraffic {
    /// Combined in+out traffic in bps.
    pub fn total_bps(&self) -> f64 {
        self.traffic_in.unwrap_or(0.0) + self.traffic_out.unwrap_or(0.0)
    }
}

impl ClientReport {
    /// The report's data block, but only when the client is eligible:
    /// a non-empty quality probe and a non-empty interface list.
    pub fn eligible_data(&self) -> Option<&ClientData> {
        self.data.as_ref().filter(|data| {
            data.smoke.as_ref().is_some_and(|smoke| !smoke.is_empty())
                && data.interfaces.as_ref().is_some_and(|ifaces| !ifaces.is_empty())
        })
    }

    pub fn is_eligible(&self) -> bool {
        self.eligible_data().is_some()
    }
}

/// One aggregated row per collection cycle. Written once, never mutated;
/// the insertion timestamp is assigned by the database.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryRecord {
    pub clients_reporting: i64,
    pub avg_bandwidth_mbps: f64,
    pub avg_latency_ms: f64,
    pub avg_packet_loss_percent: f64,
    pub quality_score: f64,
}
