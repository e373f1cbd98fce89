//! Timer-driven bucket dispatch

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::cache::ScanCache;
use crate::core::error::{HalError, HalResult};
use crate::core::events::EventHandler;
use crate::core::types::{
    Band, Capabilities, ChannelSpec, RequestId, ScanEvent, ScanParams, ScanResult, ReportPolicy,
    MAX_BUCKETS, MAX_CHANNELS,
};
use crate::driver::WifiDriver;
use crate::scheduler::bucket::BucketState;

/// Dwell hint applied to channels resolved from a band selector
const DEFAULT_DWELL_MS: u32 = 20;

/// Scan-event status for a pass the driver failed to complete
const SCAN_STATUS_DRIVER_ERROR: u32 = 1;

/// One live scan request
#[derive(Debug)]
struct Session {
    report_threshold_percent: u8,
    report_threshold_num_scans: u32,
    /// Scans since the last results-available notification
    unreported_scans: u32,
    /// Fill-percent threshold already reported for the current episode
    fill_reported: bool,
    buckets: Vec<BucketState>,
}

#[derive(Debug, Default)]
struct SchedulerInner {
    sessions: HashMap<RequestId, Session>,
}

impl SchedulerInner {
    fn earliest_due(&self) -> Option<Instant> {
        self.sessions
            .values()
            .flat_map(|s| s.buckets.iter().map(|b| b.next_due))
            .min()
    }
}

/// Periodic multi-bucket scan scheduler
///
/// One dispatch loop per scheduler pops every due bucket each tick, merges
/// their channel sets into a single physical pass, and feeds the results to
/// the cache and the per-bucket report policies. Callbacks are invoked
/// synchronously from the loop task.
pub struct BucketScheduler<D: WifiDriver> {
    driver: Arc<D>,
    cache: Arc<ScanCache>,
    handler: Arc<dyn EventHandler>,
    capabilities: Capabilities,
    inner: Mutex<SchedulerInner>,
    wake: Notify,
    shutdown: AtomicBool,
}

impl<D: WifiDriver> BucketScheduler<D> {
    pub fn new(
        driver: Arc<D>,
        cache: Arc<ScanCache>,
        handler: Arc<dyn EventHandler>,
        capabilities: Capabilities,
    ) -> Self {
        Self {
            driver,
            cache,
            handler,
            capabilities,
            inner: Mutex::new(SchedulerInner::default()),
            wake: Notify::new(),
            shutdown: AtomicBool::new(false),
        }
    }

    /// Register a periodic scan request
    ///
    /// Validates the parameters against the fixed maxima and the negotiated
    /// capabilities, failing fast instead of truncating. All buckets are due
    /// immediately after registration.
    pub async fn start_scan(&self, request_id: RequestId, params: &ScanParams) -> HalResult<()> {
        self.validate(params)?;

        {
            let inner = self.inner.lock().await;
            if inner.sessions.contains_key(&request_id) {
                return Err(HalError::Busy(request_id));
            }
        }

        let now = Instant::now();
        let mut buckets = Vec::with_capacity(params.buckets.len());
        for spec in &params.buckets {
            let channels = self.resolve_channels(spec).await?;
            buckets.push(BucketState::new(spec.clone(), channels, now));
        }

        let mut inner = self.inner.lock().await;
        // Re-check: a concurrent start for the same id may have won
        if inner.sessions.contains_key(&request_id) {
            return Err(HalError::Busy(request_id));
        }
        inner.sessions.insert(
            request_id,
            Session {
                report_threshold_percent: params.report_threshold_percent,
                report_threshold_num_scans: params.report_threshold_num_scans,
                unreported_scans: 0,
                fill_reported: false,
                buckets,
            },
        );
        drop(inner);

        // The shared retention bound changes only once the session is
        // registered; validate() already enforced its limits
        self.cache.configure_retention(params.max_ap_per_scan).await?;

        debug!(request_id, buckets = params.buckets.len(), "scan started");
        self.wake.notify_waiters();
        Ok(())
    }

    /// Deregister a scan request; takes effect before the next tick
    pub async fn stop_scan(&self, request_id: RequestId) -> HalResult<()> {
        let mut inner = self.inner.lock().await;
        if inner.sessions.remove(&request_id).is_none() {
            return Err(HalError::NotAvailable(format!(
                "no scan session for request {request_id}"
            )));
        }
        drop(inner);

        debug!(request_id, "scan stopped");
        self.wake.notify_waiters();
        Ok(())
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    /// Run the dispatch loop until [`shutdown`](Self::shutdown) is called
    pub async fn run(&self) {
        while !self.shutdown.load(Ordering::Acquire) {
            let next_due = self.inner.lock().await.earliest_due();
            match next_due {
                None => self.wake.notified().await,
                Some(due) => {
                    tokio::select! {
                        _ = tokio::time::sleep_until(due) => self.tick().await,
                        _ = self.wake.notified() => {}
                    }
                }
            }
        }
    }

    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
        self.wake.notify_waiters();
    }

    /// Fire every due bucket once: merge channels, scan, dispatch reports
    pub(crate) async fn tick(&self) {
        let now = Instant::now();

        // Pop due buckets and advance their schedules before the scan so a
        // slow driver pass cannot pile up firings
        let due: Vec<(RequestId, Vec<ChannelSpec>, ReportPolicy)> = {
            let mut inner = self.inner.lock().await;
            let mut due = Vec::new();
            for (id, session) in inner.sessions.iter_mut() {
                for bucket in session.buckets.iter_mut() {
                    if bucket.is_due(now) {
                        due.push((*id, bucket.channels.clone(), bucket.spec.report));
                        bucket.fire(now);
                    }
                }
            }
            due
        };
        if due.is_empty() {
            return;
        }

        let channels = merge_channels(due.iter().flat_map(|(_, channels, _)| channels.iter()));
        debug!(channels = channels.len(), buckets = due.len(), "scan pass");

        let results = match self.driver.scan(&channels).await {
            Ok(results) => results,
            Err(e) => {
                warn!(error = %e, "driver scan failed");
                self.cache.mark_interrupted(true).await;
                self.handler
                    .on_scan_event(ScanEvent::Complete, SCAN_STATUS_DRIVER_ERROR);
                return;
            }
        };

        self.cache.mark_interrupted(false).await;
        self.cache.ingest(&results).await;

        let cache_len = self.cache.len().await;
        let fill_percent = self.cache.fill_percent().await;

        // Per-bucket report policies; results on a shared channel are
        // attributed to every due bucket that covers it
        let mut notifications = Vec::new();
        {
            let mut inner = self.inner.lock().await;
            for (id, bucket_channels, policy) in &due {
                let Some(session) = inner.sessions.get_mut(id) else {
                    // Stopped while the pass was in flight
                    continue;
                };

                if *policy >= ReportPolicy::FullResults {
                    for result in results
                        .iter()
                        .filter(|r| bucket_channels.iter().any(|c| c.channel_mhz == r.channel_mhz))
                    {
                        notifications.push(Notification::FullResult(*id, result.clone()));
                    }
                }
                if *policy >= ReportPolicy::CompleteEvent {
                    notifications.push(Notification::Complete);
                }

                session.unreported_scans += 1;
                let scans_crossed = session.report_threshold_num_scans > 0
                    && session.unreported_scans >= session.report_threshold_num_scans;
                let fill_crossed = session.report_threshold_percent > 0
                    && fill_percent >= session.report_threshold_percent;

                // Fill-driven reporting is edge triggered: one event per
                // episode above the threshold, rearmed when the fill drops
                let fill_edge = fill_crossed && !session.fill_reported;
                session.fill_reported = fill_crossed;
                if fill_edge {
                    notifications.push(Notification::BufferThreshold);
                }

                if scans_crossed || fill_edge {
                    notifications.push(Notification::ResultsAvailable(*id, cache_len));
                    session.unreported_scans = 0;
                }
            }
        }

        for notification in notifications {
            match notification {
                Notification::FullResult(id, result) => {
                    self.handler.on_full_scan_result(id, &result)
                }
                Notification::Complete => self.handler.on_scan_event(ScanEvent::Complete, 0),
                Notification::BufferThreshold => {
                    self.handler.on_scan_event(ScanEvent::BufferFull, 0)
                }
                Notification::ResultsAvailable(id, count) => {
                    self.handler.on_scan_results_available(id, count)
                }
            }
        }
    }

    fn validate(&self, params: &ScanParams) -> HalResult<()> {
        if params.buckets.is_empty() {
            return Err(HalError::InvalidParameter("no scan buckets".into()));
        }
        if params.buckets.len() > MAX_BUCKETS {
            return Err(HalError::InvalidParameter(format!(
                "{} buckets exceeds maximum {MAX_BUCKETS}",
                params.buckets.len()
            )));
        }
        if params.buckets.len() > self.capabilities.max_scan_buckets {
            return Err(HalError::NotSupported(format!(
                "{} buckets exceeds capability {}",
                params.buckets.len(),
                self.capabilities.max_scan_buckets
            )));
        }
        if params.max_ap_per_scan == 0 {
            return Err(HalError::InvalidParameter("max_ap_per_scan is zero".into()));
        }
        if params.max_ap_per_scan > self.capabilities.max_ap_cache_per_scan {
            return Err(HalError::NotSupported(format!(
                "max_ap_per_scan {} exceeds capability {}",
                params.max_ap_per_scan, self.capabilities.max_ap_cache_per_scan
            )));
        }
        if params.report_threshold_percent > 100 {
            return Err(HalError::InvalidParameter(format!(
                "report threshold {}% above 100%",
                params.report_threshold_percent
            )));
        }
        if params.report_threshold_num_scans > self.capabilities.max_scan_reporting_threshold {
            return Err(HalError::NotSupported(format!(
                "report threshold of {} scans exceeds capability {}",
                params.report_threshold_num_scans,
                self.capabilities.max_scan_reporting_threshold
            )));
        }

        for bucket in &params.buckets {
            if bucket.channels.len() > MAX_CHANNELS {
                return Err(HalError::InvalidParameter(format!(
                    "bucket {}: {} channels exceeds maximum {MAX_CHANNELS}",
                    bucket.index,
                    bucket.channels.len()
                )));
            }
            if bucket.band == Band::Unspecified && bucket.channels.is_empty() {
                return Err(HalError::InvalidParameter(format!(
                    "bucket {}: no band and no channels",
                    bucket.index
                )));
            }
            if let Some(backoff) = &bucket.backoff {
                if backoff.max_period_ms < bucket.period_ms {
                    return Err(HalError::InvalidParameter(format!(
                        "bucket {}: max period {} below period {}",
                        bucket.index, backoff.max_period_ms, bucket.period_ms
                    )));
                }
                if backoff.exponent < 2 {
                    return Err(HalError::InvalidParameter(format!(
                        "bucket {}: backoff exponent {} below 2",
                        bucket.index, backoff.exponent
                    )));
                }
            }
        }
        Ok(())
    }

    /// Resolve a bucket's channel list from the band table when no explicit
    /// list is given
    async fn resolve_channels(
        &self,
        spec: &crate::core::types::BucketSpec,
    ) -> HalResult<Vec<ChannelSpec>> {
        if !spec.channels.is_empty() {
            return Ok(spec.channels.clone());
        }
        let frequencies = self.driver.valid_channels(spec.band).await?;
        Ok(frequencies
            .into_iter()
            .map(|channel_mhz| ChannelSpec {
                channel_mhz,
                dwell_time_ms: DEFAULT_DWELL_MS,
                passive: false,
            })
            .collect())
    }
}

enum Notification {
    FullResult(RequestId, ScanResult),
    Complete,
    BufferThreshold,
    ResultsAvailable(RequestId, usize),
}

/// Merge channel sets of all due buckets into one physical pass
///
/// A channel shared by several buckets is scanned once; the longest dwell
/// wins and active scanning wins over passive.
fn merge_channels<'a>(channels: impl Iterator<Item = &'a ChannelSpec>) -> Vec<ChannelSpec> {
    let mut merged: HashMap<u32, ChannelSpec> = HashMap::new();
    for channel in channels {
        merged
            .entry(channel.channel_mhz)
            .and_modify(|existing| {
                existing.dwell_time_ms = existing.dwell_time_ms.max(channel.dwell_time_ms);
                existing.passive = existing.passive && channel.passive;
            })
            .or_insert(*channel);
    }
    let mut out: Vec<ChannelSpec> = merged.into_values().collect();
    out.sort_by_key(|c| c.channel_mhz);
    out
}
