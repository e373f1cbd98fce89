//! Event delivery interface for scan and monitoring callbacks
//!
//! Callbacks are invoked synchronously from the scheduler's dispatch loop.
//! Implementations must not block; long-running work belongs on a separate
//! worker.

use std::sync::Mutex;

use crate::core::types::{
    EpnoResult, RequestId, ScanEvent, ScanResult, SignificantChangeResult,
};
use crate::logger::RingBufferStatus;

/// Receiver for all upward-facing events, one method per event kind
///
/// All methods default to no-ops so subscribers only implement the events
/// they care about.
pub trait EventHandler: Send + Sync + 'static {
    /// The scan cache crossed its report threshold
    fn on_scan_results_available(&self, _request_id: RequestId, _num_results: usize) {}

    /// A single result forwarded in real time (report policy `FullResults`+)
    fn on_full_scan_result(&self, _request_id: RequestId, _result: &ScanResult) {}

    /// Progress of the scanning state machine; `status` is 0 on success
    fn on_scan_event(&self, _event: ScanEvent, _status: u32) {}

    fn on_hotlist_ap_found(&self, _request_id: RequestId, _results: &[ScanResult]) {}

    fn on_hotlist_ap_lost(&self, _request_id: RequestId, _results: &[ScanResult]) {}

    fn on_significant_change(&self, _request_id: RequestId, _results: &[SignificantChangeResult]) {}

    fn on_epno_network_found(&self, _request_id: RequestId, _results: &[EpnoResult]) {}

    fn on_ring_buffer_status(&self, _request_id: RequestId, _statuses: &[RingBufferStatus]) {}
}

/// Handler that logs every event through `tracing`
///
/// Used by the binary as the default subscriber.
#[derive(Debug, Default)]
pub struct TracingHandler;

impl EventHandler for TracingHandler {
    fn on_scan_results_available(&self, request_id: RequestId, num_results: usize) {
        tracing::info!(request_id, num_results, "scan results available");
    }

    fn on_full_scan_result(&self, request_id: RequestId, result: &ScanResult) {
        tracing::debug!(
            request_id,
            bssid = %result.bssid,
            ssid = %result.ssid,
            rssi = result.rssi_dbm,
            "full scan result"
        );
    }

    fn on_scan_event(&self, event: ScanEvent, status: u32) {
        if status == 0 {
            tracing::debug!(?event, "scan event");
        } else {
            tracing::warn!(?event, status, "scan event with error status");
        }
    }

    fn on_hotlist_ap_found(&self, request_id: RequestId, results: &[ScanResult]) {
        tracing::info!(request_id, count = results.len(), "hotlist AP found");
    }

    fn on_hotlist_ap_lost(&self, request_id: RequestId, results: &[ScanResult]) {
        tracing::info!(request_id, count = results.len(), "hotlist AP lost");
    }

    fn on_significant_change(&self, request_id: RequestId, results: &[SignificantChangeResult]) {
        tracing::info!(request_id, count = results.len(), "significant change");
    }

    fn on_epno_network_found(&self, request_id: RequestId, results: &[EpnoResult]) {
        tracing::info!(request_id, count = results.len(), "ePNO network found");
    }

    fn on_ring_buffer_status(&self, request_id: RequestId, statuses: &[RingBufferStatus]) {
        tracing::debug!(request_id, count = statuses.len(), "ring buffer status");
    }
}

/// An event captured by [`RecordingHandler`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedEvent {
    ResultsAvailable {
        request_id: RequestId,
        num_results: usize,
    },
    FullResult {
        request_id: RequestId,
        result: ScanResult,
    },
    ScanEvent {
        event: ScanEvent,
        status: u32,
    },
    HotlistFound {
        request_id: RequestId,
        results: Vec<ScanResult>,
    },
    HotlistLost {
        request_id: RequestId,
        results: Vec<ScanResult>,
    },
    SignificantChange {
        request_id: RequestId,
        results: Vec<SignificantChangeResult>,
    },
    EpnoFound {
        request_id: RequestId,
        results: Vec<EpnoResult>,
    },
    RingStatus {
        request_id: RequestId,
        statuses: Vec<RingBufferStatus>,
    },
}

/// Handler that records every event for later inspection in tests
#[derive(Debug, Default)]
pub struct RecordingHandler {
    events: Mutex<Vec<RecordedEvent>>,
}

impl RecordingHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<RecordedEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn clear(&self) {
        if let Ok(mut events) = self.events.lock() {
            events.clear();
        }
    }

    fn record(&self, event: RecordedEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

impl EventHandler for RecordingHandler {
    fn on_scan_results_available(&self, request_id: RequestId, num_results: usize) {
        self.record(RecordedEvent::ResultsAvailable {
            request_id,
            num_results,
        });
    }

    fn on_full_scan_result(&self, request_id: RequestId, result: &ScanResult) {
        self.record(RecordedEvent::FullResult {
            request_id,
            result: result.clone(),
        });
    }

    fn on_scan_event(&self, event: ScanEvent, status: u32) {
        self.record(RecordedEvent::ScanEvent { event, status });
    }

    fn on_hotlist_ap_found(&self, request_id: RequestId, results: &[ScanResult]) {
        self.record(RecordedEvent::HotlistFound {
            request_id,
            results: results.to_vec(),
        });
    }

    fn on_hotlist_ap_lost(&self, request_id: RequestId, results: &[ScanResult]) {
        self.record(RecordedEvent::HotlistLost {
            request_id,
            results: results.to_vec(),
        });
    }

    fn on_significant_change(&self, request_id: RequestId, results: &[SignificantChangeResult]) {
        self.record(RecordedEvent::SignificantChange {
            request_id,
            results: results.to_vec(),
        });
    }

    fn on_epno_network_found(&self, request_id: RequestId, results: &[EpnoResult]) {
        self.record(RecordedEvent::EpnoFound {
            request_id,
            results: results.to_vec(),
        });
    }

    fn on_ring_buffer_status(&self, request_id: RequestId, statuses: &[RingBufferStatus]) {
        self.record(RecordedEvent::RingStatus {
            request_id,
            statuses: statuses.to_vec(),
        });
    }
}
