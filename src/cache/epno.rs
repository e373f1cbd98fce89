//! Enhanced preferred-network-offload matching

use std::collections::HashMap;

use crate::core::types::{Bssid, EpnoNetwork, EpnoResult, RequestId, ScanResult};

/// Active ePNO list with one-shot reporting state
///
/// Each network is reported at most once; the flags are cleared only when a
/// new list is configured.
#[derive(Debug, Clone)]
pub(crate) struct EpnoState {
    pub request_id: RequestId,
    networks: Vec<EpnoNetwork>,
    reported: Vec<bool>,
}

impl EpnoState {
    pub fn new(request_id: RequestId, networks: Vec<EpnoNetwork>) -> Self {
        let reported = vec![false; networks.len()];
        Self {
            request_id,
            networks,
            reported,
        }
    }

    /// Match this pass's observations against networks not yet reported
    pub fn evaluate(&mut self, observed: &HashMap<Bssid, ScanResult>) -> Vec<EpnoResult> {
        let mut matches = Vec::new();

        for result in observed.values() {
            for (index, network) in self.networks.iter().enumerate() {
                if self.reported[index] {
                    continue;
                }
                if result.rssi_dbm < network.rssi_threshold_dbm {
                    continue;
                }
                if !network.ident.matches(&result.ssid) {
                    continue;
                }
                if !network.auth.matches(result.is_protected()) {
                    continue;
                }
                self.reported[index] = true;
                matches.push(EpnoResult {
                    network_index: index,
                    ssid: result.ssid.clone(),
                    channel_mhz: result.channel_mhz,
                    rssi_dbm: result.rssi_dbm,
                });
            }
        }

        matches.sort_by_key(|m| m.network_index);
        matches
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::core::types::{EpnoAuth, EpnoIdent};

    fn network(ssid: &str, rssi_threshold_dbm: i8) -> EpnoNetwork {
        EpnoNetwork {
            ident: EpnoIdent::Ssid(ssid.to_string()),
            rssi_threshold_dbm,
            directed_scan: false,
            auth: EpnoAuth::any(),
        }
    }

    fn beacon(ssid: &str, rssi_dbm: i8, protected: bool) -> (Bssid, ScanResult) {
        let bssid = Bssid([0, 0, 0, 0, 0, ssid.len() as u8]);
        (
            bssid,
            ScanResult {
                timestamp_us: 0,
                ssid: ssid.to_string(),
                bssid,
                channel_mhz: 2437,
                rssi_dbm,
                rtt_ns: 0,
                rtt_sd_ns: 0,
                beacon_period_tu: 100,
                capability: if protected { 0x0010 } else { 0 },
                ie_data: vec![],
            },
        )
    }

    #[test]
    fn test_network_reported_once() {
        let mut state = EpnoState::new(1, vec![network("HomeNet", -75)]);
        let observed: HashMap<_, _> = [beacon("HomeNet", -60, false)].into();

        let matches = state.evaluate(&observed);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].network_index, 0);

        // Suppressed until the list is reconfigured
        assert!(state.evaluate(&observed).is_empty());
    }

    #[test]
    fn test_reconfiguration_resets_reported_flags() {
        let mut state = EpnoState::new(1, vec![network("HomeNet", -75)]);
        let observed: HashMap<_, _> = [beacon("HomeNet", -60, false)].into();
        assert_eq!(state.evaluate(&observed).len(), 1);

        // New list: the same network can be reported again
        state = EpnoState::new(1, vec![network("HomeNet", -75)]);
        assert_eq!(state.evaluate(&observed).len(), 1);
    }

    #[test]
    fn test_rssi_threshold_filters() {
        let mut state = EpnoState::new(1, vec![network("HomeNet", -75)]);
        let weak: HashMap<_, _> = [beacon("HomeNet", -85, false)].into();
        assert!(state.evaluate(&weak).is_empty());

        let strong: HashMap<_, _> = [beacon("HomeNet", -70, false)].into();
        assert_eq!(state.evaluate(&strong).len(), 1);
    }

    #[test]
    fn test_crc32_ident_matches() {
        let mut state = EpnoState::new(
            1,
            vec![EpnoNetwork {
                ident: EpnoIdent::Crc32(crc32fast::hash(b"HiddenNet")),
                rssi_threshold_dbm: -80,
                directed_scan: true,
                auth: EpnoAuth::any(),
            }],
        );
        let observed: HashMap<_, _> = [beacon("HiddenNet", -65, true)].into();
        assert_eq!(state.evaluate(&observed).len(), 1);
    }

    #[test]
    fn test_auth_mismatch_rejected() {
        let mut state = EpnoState::new(
            1,
            vec![EpnoNetwork {
                ident: EpnoIdent::Ssid("OpenOnly".into()),
                rssi_threshold_dbm: -80,
                directed_scan: false,
                auth: EpnoAuth {
                    open: true,
                    ..Default::default()
                },
            }],
        );
        let protected: HashMap<_, _> = [beacon("OpenOnly", -60, true)].into();
        assert!(state.evaluate(&protected).is_empty());
    }
}
