//! Scan result cache and delta-engine entry point

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::debug;

use crate::cache::epno::EpnoState;
use crate::cache::hotlist::HotlistState;
use crate::cache::sigchange::SignificantChangeState;
use crate::core::error::{HalError, HalResult};
use crate::core::events::EventHandler;
use crate::core::types::{
    Bssid, CachedScanResults, Capabilities, EpnoNetwork, EpnoResult, HotlistParams, RequestId,
    ScanFlags, ScanResult, SignificantChangeParams, SignificantChangeResult,
    MAX_EPNO_NETWORKS, MAX_HOTLIST_APS, MAX_SIGNIFICANT_CHANGE_APS, MAX_SSID_LEN,
};

/// BSSID-keyed slot holding the most recent RSSI samples for one AP
#[derive(Debug, Clone)]
struct CacheEntry {
    /// Most recent results, oldest first, bounded by the RSSI sample size
    history: VecDeque<ScanResult>,
}

impl CacheEntry {
    fn push(&mut self, result: ScanResult, sample_size: usize) {
        self.history.push_back(result);
        while self.history.len() > sample_size {
            self.history.pop_front();
        }
    }

    fn latest(&self) -> Option<&ScanResult> {
        self.history.back()
    }

    /// Rolling RSSI average over the retained samples
    fn average_rssi(&self) -> i32 {
        if self.history.is_empty() {
            return i32::MIN;
        }
        let sum: i32 = self.history.iter().map(|r| i32::from(r.rssi_dbm)).sum();
        sum / self.history.len() as i32
    }

    fn bytes(&self) -> usize {
        self.history.iter().map(ScanResult::wire_size).sum()
    }
}

#[derive(Debug)]
struct CacheInner {
    entries: HashMap<Bssid, CacheEntry>,
    /// RSSI samples retained per BSSID
    rssi_sample_size: usize,
    /// Entry bound; reconfigured per scan request
    max_entries: usize,
    /// Byte budget over all retained results
    max_bytes: usize,
    /// Identifier of the most recent scan pass
    scan_id: u32,
    last_interrupted: bool,
    /// Set once the first scan request configures the cache
    scan_configured: bool,
    hotlist: Option<HotlistState>,
    sigchange: Option<SignificantChangeState>,
    epno: Option<EpnoState>,
}

/// Events collected under the cache lock, delivered after it is released
#[derive(Debug, Default)]
struct PendingEvents {
    hotlist_found: Option<(RequestId, Vec<ScanResult>)>,
    hotlist_lost: Option<(RequestId, Vec<ScanResult>)>,
    sigchange: Option<(RequestId, Vec<SignificantChangeResult>)>,
    epno: Option<(RequestId, Vec<EpnoResult>)>,
}

/// Scan cache and delta engine
///
/// Stores the most recent results per BSSID, evicts lowest-RSSI entries
/// under capacity pressure, and derives hotlist, significant-change and
/// ePNO notifications from each ingested scan pass. Guarded by its own
/// lock so driver-path ingestion never contends with unrelated resources.
pub struct ScanCache {
    capabilities: Capabilities,
    handler: Arc<dyn EventHandler>,
    inner: Mutex<CacheInner>,
}

impl ScanCache {
    pub fn new(capabilities: Capabilities, handler: Arc<dyn EventHandler>) -> Self {
        Self {
            capabilities,
            handler,
            inner: Mutex::new(CacheInner {
                entries: HashMap::new(),
                rssi_sample_size: capabilities.max_rssi_sample_size,
                max_entries: capabilities.max_ap_cache_per_scan,
                max_bytes: capabilities.max_scan_cache_size,
                scan_id: 0,
                last_interrupted: false,
                scan_configured: false,
                hotlist: None,
                sigchange: None,
                epno: None,
            }),
        }
    }

    /// Set how many APs each scan retains; bounded by the capabilities
    pub async fn configure_retention(&self, max_ap_per_scan: usize) -> HalResult<()> {
        if max_ap_per_scan == 0 {
            return Err(HalError::InvalidParameter("max_ap_per_scan is zero".into()));
        }
        if max_ap_per_scan > self.capabilities.max_ap_cache_per_scan {
            return Err(HalError::NotSupported(format!(
                "max_ap_per_scan {} exceeds capability {}",
                max_ap_per_scan, self.capabilities.max_ap_cache_per_scan
            )));
        }
        let mut inner = self.inner.lock().await;
        inner.max_entries = max_ap_per_scan;
        inner.scan_configured = true;
        Ok(())
    }

    /// Ingest one scan pass and run the delta engines
    ///
    /// Hotlist, significant-change and ePNO callbacks fire synchronously
    /// after the cache update, outside the cache lock.
    pub async fn ingest(&self, results: &[ScanResult]) {
        let pending = {
            let mut inner = self.inner.lock().await;
            inner.scan_id += 1;

            // Strongest observation per BSSID for this pass
            let mut observed: HashMap<Bssid, ScanResult> = HashMap::new();
            for result in results {
                match observed.get(&result.bssid) {
                    Some(existing) if existing.rssi_dbm >= result.rssi_dbm => {}
                    _ => {
                        observed.insert(result.bssid, result.clone());
                    }
                }
            }

            let sample_size = inner.rssi_sample_size;
            for result in results {
                inner
                    .entries
                    .entry(result.bssid)
                    .or_insert_with(|| CacheEntry {
                        history: VecDeque::new(),
                    })
                    .push(result.clone(), sample_size);
            }

            inner.evict();
            inner.evaluate(&observed)
        };

        if let Some((id, found)) = pending.hotlist_found {
            self.handler.on_hotlist_ap_found(id, &found);
        }
        if let Some((id, lost)) = pending.hotlist_lost {
            self.handler.on_hotlist_ap_lost(id, &lost);
        }
        if let Some((id, changes)) = pending.sigchange {
            self.handler.on_significant_change(id, &changes);
        }
        if let Some((id, matches)) = pending.epno {
            self.handler.on_epno_network_found(id, &matches);
        }
    }

    /// Record whether the last pass was cut short at the driver
    pub async fn mark_interrupted(&self, interrupted: bool) {
        self.inner.lock().await.last_interrupted = interrupted;
    }

    /// Number of cached BSSIDs
    pub async fn len(&self) -> usize {
        self.inner.lock().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Cache fill level as a percentage of the byte budget
    pub async fn fill_percent(&self) -> u8 {
        let inner = self.inner.lock().await;
        let bytes: usize = inner.entries.values().map(CacheEntry::bytes).sum();
        ((bytes * 100) / inner.max_bytes.max(1)).min(100) as u8
    }

    /// Snapshot of the cached results, strongest first
    ///
    /// `flush` clears the cache after the snapshot is taken. `NotAvailable`
    /// until the first scan request has configured the cache.
    pub async fn cached_results(&self, flush: bool, max: usize) -> HalResult<CachedScanResults> {
        let mut inner = self.inner.lock().await;
        if !inner.scan_configured {
            return Err(HalError::NotAvailable("no scan has been started".into()));
        }
        let mut latest: Vec<ScanResult> = inner
            .entries
            .values()
            .filter_map(|e| e.latest().cloned())
            .collect();
        latest.sort_by(|a, b| b.rssi_dbm.cmp(&a.rssi_dbm));
        latest.truncate(max);

        let snapshot = CachedScanResults {
            scan_id: inner.scan_id,
            flags: ScanFlags {
                interrupted: inner.last_interrupted,
            },
            results: latest,
        };
        if flush {
            inner.entries.clear();
        }
        Ok(snapshot)
    }

    /// Install the BSSID hotlist, replacing any previous configuration
    pub async fn set_hotlist(&self, request_id: RequestId, params: &HotlistParams) -> HalResult<()> {
        if params.aps.is_empty() || params.aps.len() > MAX_HOTLIST_APS {
            return Err(HalError::InvalidParameter(format!(
                "hotlist size {} out of range",
                params.aps.len()
            )));
        }
        if params.aps.len() > self.capabilities.max_hotlist_aps {
            return Err(HalError::NotSupported(format!(
                "hotlist size {} exceeds capability {}",
                params.aps.len(),
                self.capabilities.max_hotlist_aps
            )));
        }
        validate_thresholds(params.aps.iter().map(|ap| (ap.low_dbm, ap.high_dbm)))?;

        debug!(request_id, aps = params.aps.len(), "hotlist configured");
        self.inner.lock().await.hotlist = Some(HotlistState::new(request_id, params));
        Ok(())
    }

    pub async fn reset_hotlist(&self, request_id: RequestId) -> HalResult<()> {
        let mut inner = self.inner.lock().await;
        match &inner.hotlist {
            Some(state) if state.request_id == request_id => {
                inner.hotlist = None;
                Ok(())
            }
            _ => Err(HalError::NotAvailable(format!(
                "no hotlist for request {request_id}"
            ))),
        }
    }

    /// Install the significant-change watch list
    pub async fn set_significant_change(
        &self,
        request_id: RequestId,
        params: &SignificantChangeParams,
    ) -> HalResult<()> {
        if params.aps.is_empty() || params.aps.len() > MAX_SIGNIFICANT_CHANGE_APS {
            return Err(HalError::InvalidParameter(format!(
                "significant-change list size {} out of range",
                params.aps.len()
            )));
        }
        if params.aps.len() > self.capabilities.max_significant_wifi_change_aps {
            return Err(HalError::NotSupported(format!(
                "significant-change list size {} exceeds capability {}",
                params.aps.len(),
                self.capabilities.max_significant_wifi_change_aps
            )));
        }
        if params.rssi_sample_size > self.capabilities.max_rssi_sample_size {
            return Err(HalError::NotSupported(format!(
                "rssi_sample_size {} exceeds capability {}",
                params.rssi_sample_size, self.capabilities.max_rssi_sample_size
            )));
        }
        validate_thresholds(params.aps.iter().map(|ap| (ap.low_dbm, ap.high_dbm)))?;

        debug!(request_id, aps = params.aps.len(), "significant-change configured");
        self.inner.lock().await.sigchange =
            Some(SignificantChangeState::new(request_id, params));
        Ok(())
    }

    pub async fn reset_significant_change(&self, request_id: RequestId) -> HalResult<()> {
        let mut inner = self.inner.lock().await;
        match &inner.sigchange {
            Some(state) if state.request_id == request_id => {
                inner.sigchange = None;
                Ok(())
            }
            _ => Err(HalError::NotAvailable(format!(
                "no significant-change list for request {request_id}"
            ))),
        }
    }

    /// Install the ePNO list; resets every network's reported flag
    pub async fn set_epno_list(
        &self,
        request_id: RequestId,
        networks: Vec<EpnoNetwork>,
    ) -> HalResult<()> {
        if networks.is_empty() || networks.len() > MAX_EPNO_NETWORKS {
            return Err(HalError::InvalidParameter(format!(
                "ePNO list size {} out of range",
                networks.len()
            )));
        }
        for network in &networks {
            if let crate::core::types::EpnoIdent::Ssid(ssid) = &network.ident {
                if ssid.is_empty() || ssid.len() > MAX_SSID_LEN {
                    return Err(HalError::InvalidParameter(format!(
                        "ePNO SSID length {} out of range",
                        ssid.len()
                    )));
                }
            }
        }

        debug!(request_id, networks = networks.len(), "ePNO list configured");
        self.inner.lock().await.epno = Some(EpnoState::new(request_id, networks));
        Ok(())
    }
}

impl CacheInner {
    /// Evict lowest-average-RSSI entries until both bounds hold
    fn evict(&mut self) {
        loop {
            let over_entries = self.entries.len() > self.max_entries;
            let bytes: usize = self.entries.values().map(CacheEntry::bytes).sum();
            let over_bytes = bytes > self.max_bytes;
            if !over_entries && !over_bytes {
                break;
            }
            let weakest = self
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.average_rssi())
                .map(|(bssid, _)| *bssid);
            match weakest {
                Some(bssid) => {
                    self.entries.remove(&bssid);
                }
                None => break,
            }
        }
    }

    fn evaluate(&mut self, observed: &HashMap<Bssid, ScanResult>) -> PendingEvents {
        let mut pending = PendingEvents::default();

        if let Some(hotlist) = &mut self.hotlist {
            let entries = &self.entries;
            let last_known = |bssid: &Bssid| -> Option<ScanResult> {
                entries.get(bssid).and_then(|e| e.latest().cloned())
            };
            let (found, lost) = hotlist.evaluate(observed, &last_known);
            if !found.is_empty() {
                pending.hotlist_found = Some((hotlist.request_id, found));
            }
            if !lost.is_empty() {
                pending.hotlist_lost = Some((hotlist.request_id, lost));
            }
        }

        if let Some(sigchange) = &mut self.sigchange {
            let changes = sigchange.evaluate(observed);
            if !changes.is_empty() {
                pending.sigchange = Some((sigchange.request_id, changes));
            }
        }

        if let Some(epno) = &mut self.epno {
            let matches = epno.evaluate(observed);
            if !matches.is_empty() {
                pending.epno = Some((epno.request_id, matches));
            }
        }

        pending
    }
}

fn validate_thresholds(thresholds: impl Iterator<Item = (i8, i8)>) -> HalResult<()> {
    for (low, high) in thresholds {
        if low > high {
            return Err(HalError::InvalidParameter(format!(
                "low threshold {low} above high threshold {high}"
            )));
        }
    }
    Ok(())
}
