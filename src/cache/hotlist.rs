//! BSSID hotlist presence/absence detection

use std::collections::HashMap;

use crate::core::types::{Bssid, HotlistParams, RequestId, ScanResult};

/// Per-BSSID watch state
#[derive(Debug, Clone)]
struct Watch {
    low_dbm: i8,
    high_dbm: i8,
    found: bool,
    /// Consecutive scans below the low threshold or absent
    missed: u32,
}

/// Active hotlist configuration and tracking state
#[derive(Debug, Clone)]
pub(crate) struct HotlistState {
    pub request_id: RequestId,
    lost_ap_sample_size: u32,
    watches: HashMap<Bssid, Watch>,
}

impl HotlistState {
    pub fn new(request_id: RequestId, params: &HotlistParams) -> Self {
        let watches = params
            .aps
            .iter()
            .map(|ap| {
                (
                    ap.bssid,
                    Watch {
                        low_dbm: ap.low_dbm,
                        high_dbm: ap.high_dbm,
                        found: false,
                        missed: 0,
                    },
                )
            })
            .collect();
        Self {
            request_id,
            lost_ap_sample_size: params.lost_ap_sample_size.max(1),
            watches,
        }
    }

    /// Evaluate one scan pass
    ///
    /// `observed` holds the strongest result per BSSID from this pass;
    /// `last_known` supplies the most recent cached result for APs absent
    /// from the pass, so a lost notification can still carry a result.
    ///
    /// A found event fires on crossing above the high threshold, once per
    /// episode. A lost event fires after `lost_ap_sample_size` consecutive
    /// misses (below low or absent), also once per episode.
    pub fn evaluate(
        &mut self,
        observed: &HashMap<Bssid, ScanResult>,
        last_known: &dyn Fn(&Bssid) -> Option<ScanResult>,
    ) -> (Vec<ScanResult>, Vec<ScanResult>) {
        let mut found_events = Vec::new();
        let mut lost_events = Vec::new();

        for (bssid, watch) in self.watches.iter_mut() {
            match observed.get(bssid) {
                Some(result) if result.rssi_dbm >= watch.high_dbm => {
                    watch.missed = 0;
                    if !watch.found {
                        watch.found = true;
                        found_events.push(result.clone());
                    }
                }
                Some(result) if result.rssi_dbm <= watch.low_dbm => {
                    if watch.found {
                        watch.missed += 1;
                        if watch.missed >= self.lost_ap_sample_size {
                            watch.found = false;
                            watch.missed = 0;
                            lost_events.push(result.clone());
                        }
                    }
                }
                Some(_) => {
                    // Between thresholds: hysteresis, episode unchanged
                    watch.missed = 0;
                }
                None => {
                    if watch.found {
                        watch.missed += 1;
                        if watch.missed >= self.lost_ap_sample_size {
                            watch.found = false;
                            watch.missed = 0;
                            if let Some(result) = last_known(bssid) {
                                lost_events.push(result);
                            }
                        }
                    }
                }
            }
        }

        (found_events, lost_events)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::core::types::ApThreshold;

    const AP: Bssid = Bssid([0xaa, 0, 0, 0, 0, 1]);

    fn params() -> HotlistParams {
        HotlistParams {
            lost_ap_sample_size: 3,
            aps: vec![ApThreshold {
                bssid: AP,
                low_dbm: -80,
                high_dbm: -60,
            }],
        }
    }

    fn seen(rssi_dbm: i8) -> HashMap<Bssid, ScanResult> {
        let mut map = HashMap::new();
        map.insert(
            AP,
            ScanResult {
                timestamp_us: 0,
                ssid: "hot".into(),
                bssid: AP,
                channel_mhz: 2412,
                rssi_dbm,
                rtt_ns: 0,
                rtt_sd_ns: 0,
                beacon_period_tu: 100,
                capability: 0,
                ie_data: vec![],
            },
        );
        map
    }

    fn no_last_known(_: &Bssid) -> Option<ScanResult> {
        None
    }

    #[test]
    fn test_found_fires_once_per_episode() {
        let mut state = HotlistState::new(1, &params());

        let (found, lost) = state.evaluate(&seen(-50), &no_last_known);
        assert_eq!(found.len(), 1);
        assert_eq!(lost.len(), 0);

        // Still strong: no repeat
        let (found, _) = state.evaluate(&seen(-45), &no_last_known);
        assert_eq!(found.len(), 0);
    }

    #[test]
    fn test_lost_fires_on_third_weak_sample_not_earlier() {
        let mut state = HotlistState::new(1, &params());
        state.evaluate(&seen(-50), &no_last_known);

        // RSSI sequence [-90, -90, -90]: lost exactly on the third sample
        let (_, lost) = state.evaluate(&seen(-90), &no_last_known);
        assert_eq!(lost.len(), 0);
        let (_, lost) = state.evaluate(&seen(-90), &no_last_known);
        assert_eq!(lost.len(), 0);
        let (_, lost) = state.evaluate(&seen(-90), &no_last_known);
        assert_eq!(lost.len(), 1);

        // Still weak: no duplicate while the episode continues
        let (_, lost) = state.evaluate(&seen(-90), &no_last_known);
        assert_eq!(lost.len(), 0);
    }

    #[test]
    fn test_mid_rssi_resets_miss_counter() {
        let mut state = HotlistState::new(1, &params());
        state.evaluate(&seen(-50), &no_last_known);

        state.evaluate(&seen(-90), &no_last_known);
        state.evaluate(&seen(-90), &no_last_known);
        // Recovers into the hysteresis band; episode survives
        state.evaluate(&seen(-70), &no_last_known);

        let (_, lost) = state.evaluate(&seen(-90), &no_last_known);
        assert_eq!(lost.len(), 0);
    }

    #[test]
    fn test_absence_counts_toward_lost() {
        let mut state = HotlistState::new(1, &params());
        state.evaluate(&seen(-50), &no_last_known);

        let empty = HashMap::new();
        let last = |bssid: &Bssid| seen(-50).get(bssid).cloned();
        state.evaluate(&empty, &last);
        state.evaluate(&empty, &last);
        let (_, lost) = state.evaluate(&empty, &last);
        assert_eq!(lost.len(), 1);
        assert_eq!(lost[0].bssid, AP);
    }

    #[test]
    fn test_ap_never_found_never_lost() {
        let mut state = HotlistState::new(1, &params());
        let empty = HashMap::new();
        for _ in 0..5 {
            let (found, lost) = state.evaluate(&empty, &no_last_known);
            assert!(found.is_empty());
            assert!(lost.is_empty());
        }
    }
}
