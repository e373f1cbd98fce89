//! Radio driver trait definition

use trait_variant::make;

use crate::core::error::DriverResult;
use crate::core::types::{Band, ChannelSpec, LoggerFeatures, ScanResult};

/// Abstraction over the radio/firmware driver that performs over-the-air work
///
/// This trait enables testing by allowing mock implementations while keeping
/// the netlink/vendor-command transport out of the core.
#[make(Send)]
pub trait WifiDriver: Sync + 'static {
    /// Perform one physical scan pass over the given channels
    ///
    /// Dwell time and active/passive flags are hints; the driver may clamp
    /// them. Returns every beacon/probe response observed during the pass.
    async fn scan(&self, channels: &[ChannelSpec]) -> DriverResult<Vec<ScanResult>>;

    /// Channels (in MHz) usable on the given band
    async fn valid_channels(&self, band: Band) -> DriverResult<Vec<u32>>;

    /// Collect a firmware memory dump as an opaque byte buffer
    async fn firmware_memory_dump(&self) -> DriverResult<Vec<u8>>;

    /// Firmware version string
    async fn firmware_version(&self) -> DriverResult<String>;

    /// Driver version string
    async fn driver_version(&self) -> DriverResult<String>;

    /// Debug features the driver logger supports
    async fn logger_feature_set(&self) -> DriverResult<LoggerFeatures>;
}
