//! HAL service facade

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::info;

use crate::{
    cache::ScanCache,
    core::{
        error::HalResult,
        events::EventHandler,
        types::{
            Band, CachedScanResults, Capabilities, EpnoNetwork, HotlistParams, LoggerFeatures,
            RequestId, ScanParams, SignificantChangeParams,
        },
    },
    driver::WifiDriver,
    logger::{RingBufferManager, RingBufferStatus},
    scheduler::BucketScheduler,
};

/// Memory dumps routed into a ring are split into entries of this size
const DUMP_CHUNK_BYTES: usize = 1024;

/// Facade over the scheduler, cache and ring buffer manager
///
/// Owns the per-request-id session state; callers address every operation
/// by the request id they supplied, so multiple interfaces can be driven
/// concurrently.
pub struct WifiHalService<D: WifiDriver> {
    driver: Arc<D>,
    handler: Arc<dyn EventHandler>,
    capabilities: Capabilities,
    started: tokio::time::Instant,
    pub scheduler: Arc<BucketScheduler<D>>,
    pub cache: Arc<ScanCache>,
    pub logger: Arc<RingBufferManager>,
}

impl<D: WifiDriver> WifiHalService<D> {
    pub fn new(
        driver: Arc<D>,
        handler: Arc<dyn EventHandler>,
        capabilities: Capabilities,
        ring_capacity: usize,
        ring_wrap: bool,
    ) -> Self {
        let cache = Arc::new(ScanCache::new(capabilities, handler.clone()));
        let scheduler = Arc::new(BucketScheduler::new(
            driver.clone(),
            cache.clone(),
            handler.clone(),
            capabilities,
        ));
        let logger = Arc::new(RingBufferManager::new(ring_capacity, ring_wrap));

        Self {
            driver,
            handler,
            capabilities,
            started: tokio::time::Instant::now(),
            scheduler,
            cache,
            logger,
        }
    }

    /// Negotiated upper bounds enforced by all configuration APIs
    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    /// Run the scheduler dispatch loop in the background
    pub fn spawn_scheduler(&self) -> JoinHandle<()> {
        let scheduler = self.scheduler.clone();
        tokio::spawn(async move { scheduler.run().await })
    }

    pub fn shutdown(&self) {
        info!("shutting down scheduler");
        self.scheduler.shutdown();
    }

    /// Start periodic background scanning
    pub async fn start_gscan(&self, request_id: RequestId, params: &ScanParams) -> HalResult<()> {
        self.scheduler.start_scan(request_id, params).await
    }

    /// Stop periodic background scanning
    pub async fn stop_gscan(&self, request_id: RequestId) -> HalResult<()> {
        self.scheduler.stop_scan(request_id).await
    }

    /// Snapshot of the cached scan results, strongest first
    ///
    /// `NotAvailable` before the first [`start_gscan`](Self::start_gscan).
    pub async fn get_cached_gscan_results(
        &self,
        flush: bool,
        max: usize,
    ) -> HalResult<CachedScanResults> {
        self.cache.cached_results(flush, max).await
    }

    pub async fn set_bssid_hotlist(
        &self,
        request_id: RequestId,
        params: &HotlistParams,
    ) -> HalResult<()> {
        self.cache.set_hotlist(request_id, params).await
    }

    pub async fn reset_bssid_hotlist(&self, request_id: RequestId) -> HalResult<()> {
        self.cache.reset_hotlist(request_id).await
    }

    pub async fn set_significant_change(
        &self,
        request_id: RequestId,
        params: &SignificantChangeParams,
    ) -> HalResult<()> {
        self.cache.set_significant_change(request_id, params).await
    }

    pub async fn reset_significant_change(&self, request_id: RequestId) -> HalResult<()> {
        self.cache.reset_significant_change(request_id).await
    }

    /// Install the ePNO list; clears every network's one-shot reported flag
    pub async fn set_epno_list(
        &self,
        request_id: RequestId,
        networks: Vec<EpnoNetwork>,
    ) -> HalResult<()> {
        self.cache.set_epno_list(request_id, networks).await
    }

    /// Channels usable on the given band, from the driver's regulatory table
    pub async fn get_valid_channels(&self, band: Band) -> HalResult<Vec<u32>> {
        Ok(self.driver.valid_channels(band).await?)
    }

    /// Begin debug collection into the named ring buffer
    pub async fn start_logging(&self, verbose_level: u32, buffer_name: &str) -> HalResult<()> {
        self.logger.start_logging(verbose_level, buffer_name).await
    }

    /// Status snapshot of one ring, also delivered via the status callback
    pub async fn get_ring_buffer_status(
        &self,
        request_id: RequestId,
        buffer_name: &str,
    ) -> HalResult<RingBufferStatus> {
        let status = self.logger.status(buffer_name).await?;
        self.handler
            .on_ring_buffer_status(request_id, std::slice::from_ref(&status));
        Ok(status)
    }

    /// Status of every ring, also delivered via the status callback
    pub async fn get_all_ring_buffer_status(
        &self,
        request_id: RequestId,
    ) -> Vec<RingBufferStatus> {
        let statuses = self.logger.status_all().await;
        self.handler.on_ring_buffer_status(request_id, &statuses);
        statuses
    }

    /// Collect a firmware memory dump, optionally routing it into a ring
    /// as chunked binary entries
    pub async fn get_firmware_memory_dump(&self, route_to: Option<&str>) -> HalResult<Vec<u8>> {
        let dump = self.driver.firmware_memory_dump().await?;
        if let Some(name) = route_to {
            let chunks = self
                .logger
                .append_chunked(name, &dump, DUMP_CHUNK_BYTES, self.timestamp_us())
                .await?;
            info!(ring = name, chunks, bytes = dump.len(), "memory dump routed");
        }
        Ok(dump)
    }

    pub async fn get_firmware_version(&self) -> HalResult<String> {
        Ok(self.driver.firmware_version().await?)
    }

    pub async fn get_driver_version(&self) -> HalResult<String> {
        Ok(self.driver.driver_version().await?)
    }

    pub async fn get_logger_feature_set(&self) -> HalResult<LoggerFeatures> {
        Ok(self.driver.logger_feature_set().await?)
    }

    /// Microseconds since service start, used to stamp locally framed entries
    pub fn timestamp_us(&self) -> u64 {
        self.started.elapsed().as_micros() as u64
    }
}
