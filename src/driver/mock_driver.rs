//! Mock radio driver for testing

use std::sync::Arc;
use tokio::sync::Mutex;

use crate::core::error::{DriverError, DriverResult};
use crate::core::types::{Band, ChannelSpec, LoggerFeatures, ScanResult};
use crate::driver::WifiDriver;

/// Internal state for the mock driver
#[derive(Debug, Clone)]
struct MockState {
    /// Environment visible to scans; filtered by requested channels
    environment: Vec<ScanResult>,
    should_fail_scan: bool,
    should_fail_channel_query: bool,
    /// Channel sets of every scan request, in order
    scan_requests: Vec<Vec<ChannelSpec>>,
    firmware_version: String,
    driver_version: String,
    memory_dump: Vec<u8>,
    features: LoggerFeatures,
}

/// Mock radio driver
///
/// Simulates the air interface: scans return the configured environment
/// restricted to the requested channel set, and every request is recorded
/// so tests can assert on channel merging.
#[derive(Debug, Clone)]
pub struct MockWifiDriver {
    inner: Arc<Mutex<MockState>>,
}

impl MockWifiDriver {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(MockState {
                environment: vec![],
                should_fail_scan: false,
                should_fail_channel_query: false,
                scan_requests: vec![],
                firmware_version: "fw-1.0.0-mock".to_string(),
                driver_version: "drv-1.0.0-mock".to_string(),
                memory_dump: vec![],
                features: LoggerFeatures {
                    memory_dump: true,
                    per_packet_status: true,
                },
            })),
        }
    }

    /// Replace the set of APs visible over the air
    pub async fn set_environment(&self, results: Vec<ScanResult>) {
        self.inner.lock().await.environment = results;
    }

    /// Configure scan operations to fail
    pub async fn set_scan_failure(&self, should_fail: bool) {
        self.inner.lock().await.should_fail_scan = should_fail;
    }

    /// Configure the valid-channels query to fail
    pub async fn set_channel_query_failure(&self, should_fail: bool) {
        self.inner.lock().await.should_fail_channel_query = should_fail;
    }

    /// Configure the bytes returned by a firmware memory dump
    pub async fn set_memory_dump(&self, dump: Vec<u8>) {
        self.inner.lock().await.memory_dump = dump;
    }

    /// Channel sets of every scan issued so far
    pub async fn scan_requests(&self) -> Vec<Vec<ChannelSpec>> {
        self.inner.lock().await.scan_requests.clone()
    }

    pub async fn scan_count(&self) -> usize {
        self.inner.lock().await.scan_requests.len()
    }
}

impl Default for MockWifiDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl WifiDriver for MockWifiDriver {
    async fn scan(&self, channels: &[ChannelSpec]) -> DriverResult<Vec<ScanResult>> {
        let mut state = self.inner.lock().await;
        state.scan_requests.push(channels.to_vec());
        if state.should_fail_scan {
            return Err(DriverError::ScanFailed("mock scan failure".into()));
        }
        let requested: Vec<u32> = channels.iter().map(|c| c.channel_mhz).collect();
        Ok(state
            .environment
            .iter()
            .filter(|r| requested.contains(&r.channel_mhz))
            .cloned()
            .collect())
    }

    async fn valid_channels(&self, band: Band) -> DriverResult<Vec<u32>> {
        if self.inner.lock().await.should_fail_channel_query {
            return Err(DriverError::Unavailable("mock channel query failure".into()));
        }
        // Static regulatory table; DFS channels only on the DFS bands
        let bg = [2412, 2437, 2462];
        let a = [5180, 5200, 5220, 5240];
        let dfs = [5260, 5280];
        Ok(match band {
            Band::Unspecified => vec![],
            Band::Bg => bg.to_vec(),
            Band::A => a.to_vec(),
            Band::ADfs => dfs.to_vec(),
            Band::AWithDfs => a.iter().chain(dfs.iter()).copied().collect(),
            Band::Abg => bg.iter().chain(a.iter()).copied().collect(),
            Band::AbgWithDfs => bg.iter().chain(a.iter()).chain(dfs.iter()).copied().collect(),
        })
    }

    async fn firmware_memory_dump(&self) -> DriverResult<Vec<u8>> {
        let state = self.inner.lock().await;
        if !state.features.memory_dump {
            return Err(DriverError::NotSupported("memory dump".into()));
        }
        Ok(state.memory_dump.clone())
    }

    async fn firmware_version(&self) -> DriverResult<String> {
        Ok(self.inner.lock().await.firmware_version.clone())
    }

    async fn driver_version(&self) -> DriverResult<String> {
        Ok(self.inner.lock().await.driver_version.clone())
    }

    async fn logger_feature_set(&self) -> DriverResult<LoggerFeatures> {
        Ok(self.inner.lock().await.features)
    }
}
