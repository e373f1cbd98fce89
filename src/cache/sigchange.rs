//! Significant-change detection over rolling RSSI averages

use std::collections::{HashMap, VecDeque};

use crate::core::types::{
    Bssid, RequestId, ScanResult, SignificantChangeParams, SignificantChangeResult,
};

/// Which side of the thresholds the rolling average currently sits on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Unknown,
    Low,
    Mid,
    High,
}

#[derive(Debug, Clone)]
struct SigWatch {
    low_dbm: i8,
    high_dbm: i8,
    channel_mhz: u32,
    history: VecDeque<i8>,
    side: Side,
    missed: u32,
}

impl SigWatch {
    fn average(&self) -> i32 {
        if self.history.is_empty() {
            return 0;
        }
        let sum: i32 = self.history.iter().map(|r| i32::from(*r)).sum();
        sum / self.history.len() as i32
    }
}

/// Active significant-change configuration and tracking state
#[derive(Debug, Clone)]
pub(crate) struct SignificantChangeState {
    pub request_id: RequestId,
    rssi_sample_size: usize,
    lost_ap_sample_size: u32,
    min_breaching: usize,
    watches: HashMap<Bssid, SigWatch>,
}

impl SignificantChangeState {
    pub fn new(request_id: RequestId, params: &SignificantChangeParams) -> Self {
        let watches = params
            .aps
            .iter()
            .map(|ap| {
                (
                    ap.bssid,
                    SigWatch {
                        low_dbm: ap.low_dbm,
                        high_dbm: ap.high_dbm,
                        channel_mhz: 0,
                        history: VecDeque::new(),
                        side: Side::Unknown,
                        missed: 0,
                    },
                )
            })
            .collect();
        Self {
            request_id,
            rssi_sample_size: params.rssi_sample_size.max(1),
            lost_ap_sample_size: params.lost_ap_sample_size.max(1),
            min_breaching: params.min_breaching.max(1),
            watches,
        }
    }

    /// Evaluate one scan pass; breaches are batched into a single event
    ///
    /// Returns the breaching BSSIDs when at least `min_breaching` of them
    /// crossed a threshold in this pass, otherwise an empty list.
    pub fn evaluate(&mut self, observed: &HashMap<Bssid, ScanResult>) -> Vec<SignificantChangeResult> {
        let mut breaching = Vec::new();

        for (bssid, watch) in self.watches.iter_mut() {
            let Some(result) = observed.get(bssid) else {
                // Absent long enough: drop the history so a reappearance
                // starts a fresh baseline instead of breaching immediately
                watch.missed += 1;
                if watch.missed >= self.lost_ap_sample_size {
                    watch.history.clear();
                    watch.side = Side::Unknown;
                }
                continue;
            };

            watch.missed = 0;
            watch.channel_mhz = result.channel_mhz;
            watch.history.push_back(result.rssi_dbm);
            while watch.history.len() > self.rssi_sample_size {
                watch.history.pop_front();
            }

            let average = watch.average();
            let side = if average <= i32::from(watch.low_dbm) {
                Side::Low
            } else if average >= i32::from(watch.high_dbm) {
                Side::High
            } else {
                Side::Mid
            };

            let crossed =
                side != watch.side && watch.side != Side::Unknown && side != Side::Mid;
            watch.side = side;

            if crossed {
                breaching.push(SignificantChangeResult {
                    bssid: *bssid,
                    channel_mhz: watch.channel_mhz,
                    rssi_history: watch.history.iter().copied().collect(),
                });
            }
        }

        if breaching.len() >= self.min_breaching {
            breaching
        } else {
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::core::types::ApThreshold;

    const AP1: Bssid = Bssid([1, 0, 0, 0, 0, 1]);
    const AP2: Bssid = Bssid([2, 0, 0, 0, 0, 2]);

    fn params(min_breaching: usize) -> SignificantChangeParams {
        SignificantChangeParams {
            rssi_sample_size: 2,
            lost_ap_sample_size: 3,
            min_breaching,
            aps: vec![
                ApThreshold {
                    bssid: AP1,
                    low_dbm: -80,
                    high_dbm: -60,
                },
                ApThreshold {
                    bssid: AP2,
                    low_dbm: -80,
                    high_dbm: -60,
                },
            ],
        }
    }

    fn pass(rssi: &[(Bssid, i8)]) -> HashMap<Bssid, ScanResult> {
        rssi.iter()
            .map(|(bssid, rssi_dbm)| {
                (
                    *bssid,
                    ScanResult {
                        timestamp_us: 0,
                        ssid: "sig".into(),
                        bssid: *bssid,
                        channel_mhz: 5180,
                        rssi_dbm: *rssi_dbm,
                        rtt_ns: 0,
                        rtt_sd_ns: 0,
                        beacon_period_tu: 100,
                        capability: 0,
                        ie_data: vec![],
                    },
                )
            })
            .collect()
    }

    #[test]
    fn test_no_breach_on_first_observation() {
        let mut state = SignificantChangeState::new(1, &params(1));
        let breaches = state.evaluate(&pass(&[(AP1, -50)]));
        assert!(breaches.is_empty());
    }

    #[test]
    fn test_breach_on_crossing_from_high_to_low() {
        let mut state = SignificantChangeState::new(1, &params(1));
        state.evaluate(&pass(&[(AP1, -50)]));
        state.evaluate(&pass(&[(AP1, -50)]));

        // Two weak samples drag the 2-sample average below -80
        state.evaluate(&pass(&[(AP1, -90)]));
        let breaches = state.evaluate(&pass(&[(AP1, -90)]));
        assert_eq!(breaches.len(), 1);
        assert_eq!(breaches[0].bssid, AP1);
        assert_eq!(breaches[0].rssi_history, vec![-90, -90]);
    }

    #[test]
    fn test_min_breaching_batches_events() {
        let mut state = SignificantChangeState::new(1, &params(2));

        // Establish both APs as High
        state.evaluate(&pass(&[(AP1, -50), (AP2, -50)]));
        state.evaluate(&pass(&[(AP1, -50), (AP2, -50)]));

        // Only AP1 collapses: below min_breaching, nothing reported
        state.evaluate(&pass(&[(AP1, -90), (AP2, -50)]));
        let breaches = state.evaluate(&pass(&[(AP1, -90), (AP2, -50)]));
        assert!(breaches.is_empty());

        // Re-establish AP1, then both collapse in the same passes
        state.evaluate(&pass(&[(AP1, -50), (AP2, -50)]));
        state.evaluate(&pass(&[(AP1, -50), (AP2, -50)]));
        state.evaluate(&pass(&[(AP1, -90), (AP2, -90)]));
        let breaches = state.evaluate(&pass(&[(AP1, -90), (AP2, -90)]));
        assert_eq!(breaches.len(), 2);
    }

    #[test]
    fn test_long_absence_resets_baseline() {
        let mut state = SignificantChangeState::new(1, &params(1));
        state.evaluate(&pass(&[(AP1, -50)]));
        state.evaluate(&pass(&[(AP1, -50)]));

        let empty = HashMap::new();
        for _ in 0..3 {
            state.evaluate(&empty);
        }

        // Reappears weak: fresh baseline, no breach
        state.evaluate(&pass(&[(AP1, -90)]));
        let breaches = state.evaluate(&pass(&[(AP1, -90)]));
        assert!(breaches.is_empty());
    }
}
