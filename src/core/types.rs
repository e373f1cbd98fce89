//! Domain types for background scanning and offload monitoring

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Identifier supplied by the caller for each configuration session
pub type RequestId = i32;

/// Maximum channels per scan bucket
pub const MAX_CHANNELS: usize = 16;
/// Maximum scan buckets per request
pub const MAX_BUCKETS: usize = 16;
/// Maximum BSSID hotlist entries
pub const MAX_HOTLIST_APS: usize = 128;
/// Maximum significant-change watch entries
pub const MAX_SIGNIFICANT_CHANGE_APS: usize = 64;
/// Maximum ePNO networks per list
pub const MAX_EPNO_NETWORKS: usize = 128;
/// Maximum SSID length in bytes
pub const MAX_SSID_LEN: usize = 32;

/// 6-byte IEEE 802 MAC address identifying an access point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Bssid(pub [u8; 6]);

impl fmt::Display for Bssid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = &self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            b[0], b[1], b[2], b[3], b[4], b[5]
        )
    }
}

impl FromStr for Bssid {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let compact: String = s.chars().filter(|c| *c != ':').collect();
        let bytes = hex::decode(&compact).map_err(|e| format!("invalid BSSID '{s}': {e}"))?;
        let arr: [u8; 6] = bytes
            .try_into()
            .map_err(|_| format!("invalid BSSID '{s}': expected 6 bytes"))?;
        Ok(Bssid(arr))
    }
}

impl Serialize for Bssid {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Bssid {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Radio band selector for a scan bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum Band {
    Unspecified = 0,
    /// 2.4 GHz
    Bg = 1,
    /// 5 GHz without DFS
    A = 2,
    /// 2.4 GHz + 5 GHz without DFS
    Abg = 3,
    /// 5 GHz DFS only
    ADfs = 4,
    /// 5 GHz including DFS
    AWithDfs = 6,
    /// 2.4 GHz + 5 GHz including DFS
    AbgWithDfs = 7,
}

impl TryFrom<u8> for Band {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, ()> {
        match value {
            0 => Ok(Band::Unspecified),
            1 => Ok(Band::Bg),
            2 => Ok(Band::A),
            3 => Ok(Band::Abg),
            4 => Ok(Band::ADfs),
            6 => Ok(Band::AWithDfs),
            7 => Ok(Band::AbgWithDfs),
            _ => Err(()),
        }
    }
}

impl From<Band> for u8 {
    fn from(band: Band) -> Self {
        band as u8
    }
}

/// How aggressively results of a bucket are reported upward
///
/// Each level includes the behavior of the levels below it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum ReportPolicy {
    /// Report only when the scan cache crosses its fill threshold
    BufferOnly = 0,
    /// Also emit a completion event after each firing of the bucket
    CompleteEvent = 1,
    /// Also forward each result in real time
    FullResults = 2,
    /// Also forward each result to the upper stack
    ForwardToSupplicant = 3,
}

impl TryFrom<u8> for ReportPolicy {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, ()> {
        match value {
            0 => Ok(ReportPolicy::BufferOnly),
            1 => Ok(ReportPolicy::CompleteEvent),
            2 => Ok(ReportPolicy::FullResults),
            3 => Ok(ReportPolicy::ForwardToSupplicant),
            _ => Err(()),
        }
    }
}

impl From<ReportPolicy> for u8 {
    fn from(policy: ReportPolicy) -> Self {
        policy as u8
    }
}

/// A single channel to scan, with dwell hints for the driver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelSpec {
    /// Channel frequency in MHz
    pub channel_mhz: u32,
    /// Dwell time hint in milliseconds
    pub dwell_time_ms: u32,
    /// Passive scan (listen only, no probes)
    pub passive: bool,
}

/// Exponential backoff parameters for a scan bucket
///
/// The effective period grows as
/// `period * exponent^(steps / (step_count + 1))`, capped at `max_period_ms`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackoffParams {
    pub max_period_ms: u64,
    pub exponent: u32,
    pub step_count: u32,
}

/// Configuration of one scan bucket
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketSpec {
    /// Bucket index, 0 based
    pub index: u8,
    /// Band to scan; when `Unspecified`, `channels` is used
    pub band: Band,
    /// Explicit channel list; may overlap with other buckets
    pub channels: Vec<ChannelSpec>,
    /// Desired scan period in milliseconds (minimum period under backoff)
    pub period_ms: u64,
    pub report: ReportPolicy,
    pub backoff: Option<BackoffParams>,
}

/// Parameters for a periodic background scan request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanParams {
    /// Base timer period in milliseconds
    pub base_period_ms: u64,
    /// APs to keep per scan in the BSSID history (highest RSSI retained)
    pub max_ap_per_scan: usize,
    /// Wake the host when the scan cache is this percentage full
    pub report_threshold_percent: u8,
    /// Wake the host after this many unreported scans
    pub report_threshold_num_scans: u32,
    pub buckets: Vec<BucketSpec>,
}

/// One observed beacon or probe response
///
/// Immutable once captured; the cache and delta engine only ever read it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanResult {
    /// Time since boot in microseconds when the result was retrieved
    pub timestamp_us: u64,
    pub ssid: String,
    pub bssid: Bssid,
    /// Channel frequency in MHz
    pub channel_mhz: u32,
    /// Signal strength in dBm
    pub rssi_dbm: i8,
    /// Round trip time in nanoseconds
    pub rtt_ns: u64,
    /// Standard deviation of the round trip time
    pub rtt_sd_ns: u64,
    /// Beacon period advertised by the AP, in time units
    pub beacon_period_tu: u16,
    /// Capability bits advertised in the beacon
    pub capability: u16,
    /// Packed information elements from the beacon, length owned here
    pub ie_data: Vec<u8>,
}

impl ScanResult {
    /// Privacy bit of the capability field; set for protected networks
    pub fn is_protected(&self) -> bool {
        self.capability & 0x0010 != 0
    }

    /// Approximate cache footprint of this result in bytes
    pub fn wire_size(&self) -> usize {
        // fixed fields plus the IE blob
        64 + self.ssid.len() + self.ie_data.len()
    }
}

/// RSSI thresholds for one watched BSSID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApThreshold {
    pub bssid: Bssid,
    pub low_dbm: i8,
    pub high_dbm: i8,
}

/// BSSID hotlist configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HotlistParams {
    /// Consecutive scans below `low_dbm` (or absent) before an AP is lost
    pub lost_ap_sample_size: u32,
    pub aps: Vec<ApThreshold>,
}

/// Significant-change monitoring configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignificantChangeParams {
    /// RSSI samples kept per BSSID for averaging
    pub rssi_sample_size: usize,
    /// Consecutive scans without the AP before it counts as lost
    pub lost_ap_sample_size: u32,
    /// Minimum number of BSSIDs breaching in one pass before reporting
    pub min_breaching: usize,
    pub aps: Vec<ApThreshold>,
}

/// One BSSID that breached its significant-change thresholds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignificantChangeResult {
    pub bssid: Bssid,
    pub channel_mhz: u32,
    /// RSSI history in dBm, most recent last
    pub rssi_history: Vec<i8>,
}

/// Authentication kinds an ePNO network matches against a beacon
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpnoAuth {
    pub open: bool,
    pub psk: bool,
    pub eapol: bool,
}

impl EpnoAuth {
    pub fn any() -> Self {
        Self {
            open: true,
            psk: true,
            eapol: true,
        }
    }

    /// Whether an observed beacon satisfies this auth constraint
    pub fn matches(&self, protected: bool) -> bool {
        if protected {
            self.psk || self.eapol
        } else {
            self.open
        }
    }
}

/// Network identity in an ePNO list: full SSID or its CRC32
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EpnoIdent {
    Ssid(String),
    Crc32(u32),
}

impl EpnoIdent {
    pub fn matches(&self, ssid: &str) -> bool {
        match self {
            EpnoIdent::Ssid(s) => s == ssid,
            EpnoIdent::Crc32(hash) => crc32fast::hash(ssid.as_bytes()) == *hash,
        }
    }
}

/// One entry of an enhanced preferred-network-offload list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpnoNetwork {
    pub ident: EpnoIdent,
    /// Minimum RSSI in dBm for the network to count as found
    pub rssi_threshold_dbm: i8,
    /// Probe hidden SSIDs with directed scans
    pub directed_scan: bool,
    pub auth: EpnoAuth,
}

/// A matched ePNO network reported upward
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpnoResult {
    /// Index of the network in the configured list
    pub network_index: usize,
    pub ssid: String,
    pub channel_mhz: u32,
    pub rssi_dbm: i8,
}

/// Progress events of the scanning state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanEvent {
    /// Scan cache crossed its configured threshold
    BufferFull,
    /// A bucket finished one firing
    Complete,
}

/// Additional information about a cached scan snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanFlags {
    /// Probes were not sent on some channels; results may be incomplete
    pub interrupted: bool,
}

/// Snapshot of the scan cache returned by the cached-results query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedScanResults {
    /// Identifier of the most recent scan pass
    pub scan_id: u32,
    pub flags: ScanFlags,
    pub results: Vec<ScanResult>,
}

/// Debug features supported by the driver logger
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggerFeatures {
    pub memory_dump: bool,
    pub per_packet_status: bool,
}

/// Fixed upper bounds negotiated with the platform
///
/// Configuration APIs enforce these at call time and fail fast rather than
/// silently truncating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    /// Total space allocated for the scan cache, in bytes
    pub max_scan_cache_size: usize,
    pub max_scan_buckets: usize,
    pub max_ap_cache_per_scan: usize,
    /// RSSI samples used for averaging
    pub max_rssi_sample_size: usize,
    /// Highest permitted report threshold, in scans
    pub max_scan_reporting_threshold: u32,
    pub max_hotlist_aps: usize,
    pub max_significant_wifi_change_aps: usize,
    /// BSSID/RSSI history entries the device can hold
    pub max_bssid_history_entries: usize,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            max_scan_cache_size: 32 * 1024,
            max_scan_buckets: MAX_BUCKETS,
            max_ap_cache_per_scan: 32,
            max_rssi_sample_size: 8,
            max_scan_reporting_threshold: 100,
            max_hotlist_aps: MAX_HOTLIST_APS,
            max_significant_wifi_change_aps: MAX_SIGNIFICANT_CHANGE_APS,
            max_bssid_history_entries: 256,
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_bssid_display_roundtrip() {
        let bssid = Bssid([0xaa, 0xbb, 0xcc, 0x00, 0x11, 0x22]);
        let text = bssid.to_string();
        assert_eq!(text, "aa:bb:cc:00:11:22");
        assert_eq!(text.parse::<Bssid>().unwrap(), bssid);
    }

    #[test]
    fn test_bssid_parse_rejects_garbage() {
        assert!("not-a-mac".parse::<Bssid>().is_err());
        assert!("aa:bb:cc:dd:ee".parse::<Bssid>().is_err());
        assert!("aa:bb:cc:dd:ee:ff:00".parse::<Bssid>().is_err());
    }

    #[test]
    fn test_bssid_serde_as_string() {
        let bssid = Bssid([1, 2, 3, 4, 5, 6]);
        let json = serde_json::to_string(&bssid).unwrap();
        assert_eq!(json, r#""01:02:03:04:05:06""#);
        let back: Bssid = serde_json::from_str(&json).unwrap();
        assert_eq!(back, bssid);
    }

    #[test]
    fn test_band_numeric_values() {
        assert_eq!(u8::from(Band::Bg), 1);
        assert_eq!(u8::from(Band::AWithDfs), 6);
        assert_eq!(Band::try_from(7).unwrap(), Band::AbgWithDfs);
        assert!(Band::try_from(5).is_err());
    }

    #[test]
    fn test_report_policy_ordering() {
        assert!(ReportPolicy::FullResults >= ReportPolicy::CompleteEvent);
        assert!(ReportPolicy::BufferOnly < ReportPolicy::CompleteEvent);
        assert_eq!(ReportPolicy::try_from(3).unwrap(), ReportPolicy::ForwardToSupplicant);
        assert!(ReportPolicy::try_from(4).is_err());
    }

    #[test]
    fn test_epno_ident_crc32_matches_ssid() {
        let ident = EpnoIdent::Crc32(crc32fast::hash(b"HomeNet"));
        assert!(ident.matches("HomeNet"));
        assert!(!ident.matches("OtherNet"));
    }

    #[test]
    fn test_epno_auth_matching() {
        let open_only = EpnoAuth {
            open: true,
            ..Default::default()
        };
        assert!(open_only.matches(false));
        assert!(!open_only.matches(true));

        let psk = EpnoAuth {
            psk: true,
            ..Default::default()
        };
        assert!(psk.matches(true));
        assert!(!psk.matches(false));
    }
}
