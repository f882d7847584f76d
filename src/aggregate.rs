//! Per-cycle aggregation of raw client reports into one summary record.

use crate::model::{ClientReport, SummaryRecord};

/// Latency charged to an eligible client whose probe reports no average (ms).
/// A silent probe marks the client as severely degraded, not as excluded.
pub const LATENCY_PENALTY_MS: f64 = 500.0;

/// Loss charged to an eligible client whose probe reports no average (%).
pub const LOSS_PENALTY_PERCENT: f64 = 100.0;

/// Collapse one poll's reports into a single summary, or `None` when no
/// client carried usable data. `None` is a valid cycle outcome, not an
/// error; the caller simply skips persistence.
///
/// Scoring: latency decays linearly to 0 at 200 ms, loss decays linearly to
/// 0 at 10 %, and the quality score is the mean of the two. No further
/// normalisation or outlier rejection is applied.
pub fn aggregate(reports: &[ClientReport]) -> Option<SummaryRecord> {
    let eligible: Vec<_> = reports
        .iter()
        .filter_map(ClientReport::eligible_data)
        .collect();

    if eligible.is_empty() {
        return None;
    }
    let count = eligible.len() as f64;

    let mut total_bandwidth_bps = 0.0;
    let mut total_latency_ms = 0.0;
    let mut total_loss_percent = 0.0;

    for data in &eligible {
        let interfaces = data.interfaces.as_deref().unwrap_or_default();
        total_bandwidth_bps += interfaces.iter().map(|i| i.total_bps()).sum::<f64>();

        let smoke = data.smoke.as_ref();
        total_latency_ms += smoke
            .and_then(|s| s.avg_val)
            .unwrap_or(LATENCY_PENALTY_MS);
        total_loss_percent += smoke
            .and_then(|s| s.avg_loss)
            .unwrap_or(LOSS_PENALTY_PERCENT);
    }

    let avg_bandwidth_mbps = total_bandwidth_bps / count / 1_000_000.0;
    let avg_latency_ms = total_latency_ms / count;
    let avg_packet_loss_percent = total_loss_percent / count;

    let score_latency = (100.0 - avg_latency_ms / 2.0).max(0.0);
    let score_loss = (100.0 - avg_packet_loss_percent * 10.0).max(0.0);
    let quality_score = (score_latency + score_loss) / 2.0;

    Some(SummaryRecord {
        clients_reporting: eligible.len() as i64,
        avg_bandwidth_mbps,
        avg_latency_ms,
        avg_packet_loss_percent,
        quality_score,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn reports(values: Vec<serde_json::Value>) -> Vec<ClientReport> {
        values
            .into_iter()
            .map(|v| serde_json::from_value(v).unwrap())
            .collect()
    }

    fn client(avg_val: f64, avg_loss: f64, traffic_bps: f64) -> serde_json::Value {
        json!({
            "data": {
                "smoke": {"avg_val": avg_val, "avg_loss": avg_loss},
                "interfaces": [{"traffic_in": traffic_bps, "traffic_out": 0.0}]
            }
        })
    }

    #[test]
    fn empty_input_yields_none() {
        assert_eq!(aggregate(&[]), None);
    }

    #[test]
    fn all_ineligible_yields_none() {
        let input = reports(vec![
            json!({}),
            json!({"data": null}),
            json!({"data": {"smoke": {}, "interfaces": [{"traffic_in": 1}]}}),
            json!({"data": {"smoke": {"avg_val": 1.0}, "interfaces": []}}),
            json!({"data": {"interfaces": [{"traffic_in": 1}]}}),
        ]);
        assert_eq!(aggregate(&input), None);
    }

    #[test]
    fn clients_reporting_counts_only_eligible() {
        let input = reports(vec![
            client(10.0, 0.5, 1_000_000.0),
            json!({"data": null}),
            client(20.0, 1.5, 3_000_000.0),
            json!({"data": {"smoke": {}, "interfaces": [{"traffic_in": 9}]}}),
        ]);
        let summary = aggregate(&input).unwrap();
        assert_eq!(summary.clients_reporting, 2);
    }

    #[test]
    fn adding_an_eligible_client_increments_the_count() {
        let mut input = reports(vec![client(10.0, 0.5, 0.0)]);
        for expected in 1..=5 {
            let summary = aggregate(&input).unwrap();
            assert_eq!(summary.clients_reporting, expected);
            input.extend(reports(vec![client(10.0, 0.5, 0.0)]));
        }
    }

    #[test]
    fn missing_probe_averages_charge_the_full_penalties() {
        // Probe ran but reported neither average: 500 ms and 100 % apply.
        let input = reports(vec![json!({
            "data": {
                "smoke": {"probe_id": "rnp-01"},
                "interfaces": [{"traffic_in": 0}]
            }
        })]);
        let summary = aggregate(&input).unwrap();
        assert_eq!(summary.avg_latency_ms, LATENCY_PENALTY_MS);
        assert_eq!(summary.avg_packet_loss_percent, LOSS_PENALTY_PERCENT);
        // Both decay curves bottom out well before those values.
        assert_eq!(summary.quality_score, 0.0);
    }

    #[test]
    fn null_averages_charge_the_penalties_too() {
        let input = reports(vec![json!({
            "data": {
                "smoke": {"avg_val": null, "avg_loss": null, "probe_id": "x"},
                "interfaces": [{"traffic_in": 0}]
            }
        })]);
        let summary = aggregate(&input).unwrap();
        assert_eq!(summary.avg_latency_ms, LATENCY_PENALTY_MS);
        assert_eq!(summary.avg_packet_loss_percent, LOSS_PENALTY_PERCENT);
    }

    #[test]
    fn two_client_scenario_matches_expected_aggregates() {
        let input = reports(vec![
            json!({
                "data": {
                    "smoke": {"avg_val": 0.0, "avg_loss": 0.0},
                    "interfaces": [
                        {"traffic_in": 4_000_000.0, "traffic_out": 2_000_000.0},
                        {"traffic_in": 3_000_000.0, "traffic_out": 1_000_000.0}
                    ]
                }
            }),
            json!({
                "data": {
                    "smoke": {"avg_val": 200.0, "avg_loss": 10.0},
                    "interfaces": [{"traffic_in": 0.0, "traffic_out": 0.0}]
                }
            }),
        ]);

        let summary = aggregate(&input).unwrap();
        assert_eq!(summary.clients_reporting, 2);
        assert_eq!(summary.avg_bandwidth_mbps, 5.0);
        assert_eq!(summary.avg_latency_ms, 100.0);
        assert_eq!(summary.avg_packet_loss_percent, 5.0);
        assert_eq!(summary.quality_score, 50.0);
    }

    #[test]
    fn perfect_clients_score_one_hundred() {
        let input = reports(vec![client(0.0, 0.0, 10_000_000.0)]);
        let summary = aggregate(&input).unwrap();
        assert_eq!(summary.quality_score, 100.0);
    }

    #[test]
    fn quality_score_stays_in_range_for_extreme_inputs() {
        let cases = [
            (0.0, 0.0),
            (199.9, 9.9),
            (200.0, 10.0),
            (100_000.0, 100.0),
            (500.0, 0.0),
            (0.0, 55.0),
        ];
        for (latency, loss) in cases {
            let summary = aggregate(&reports(vec![client(latency, loss, 0.0)])).unwrap();
            assert!(
                (0.0..=100.0).contains(&summary.quality_score),
                "score {} out of range for latency={} loss={}",
                summary.quality_score,
                latency,
                loss
            );
        }
    }

    #[test]
    fn missing_interface_counters_count_as_zero_bandwidth() {
        let input = reports(vec![json!({
            "data": {
                "smoke": {"avg_val": 10.0, "avg_loss": 1.0},
                "interfaces": [{}, {"traffic_out": 2_000_000.0}]
            }
        })]);
        let summary = aggregate(&input).unwrap();
        assert_eq!(summary.avg_bandwidth_mbps, 2.0);
    }
}
