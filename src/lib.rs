//! GSCAN Offload Core
//!
//! The scheduling and telemetry engine beneath a WiFi HAL gscan/logger
//! interface:
//! - periodic multi-bucket scan scheduling with exponential backoff
//! - a bounded scan cache with hotlist, significant-change and ePNO
//!   delta detection
//! - named ring buffers for connectivity events and per-packet records

pub mod cache;
pub mod config;
pub mod core;
pub mod driver;
pub mod logger;
pub mod scheduler;

pub use core::{
    error::{DriverError, HalError},
    types::{
        Band, BucketSpec, CachedScanResults, Capabilities, ChannelSpec, EpnoNetwork, HotlistParams,
        ReportPolicy, RequestId, ScanParams, ScanResult, SignificantChangeParams,
    },
};
