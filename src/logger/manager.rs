//! Named ring buffer registry and logging entry points

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tracing::debug;

use crate::core::error::{HalError, HalResult};
use crate::logger::entry::{
    ConnectivityEvent, PacketStatus, RingEntry, ENTRY_KIND_BINARY_DATA, ENTRY_KIND_PACKET_STATUS,
};
use crate::logger::ring_buffer::{RingBuffer, RingBufferStatus};

/// Registry of named ring buffers
///
/// Each ring has its own lock; appending to one ring never contends with
/// another. No logging happens before `start_logging` creates the ring.
pub struct RingBufferManager {
    default_capacity: usize,
    wrap: bool,
    rings: RwLock<HashMap<String, Arc<Mutex<RingBuffer>>>>,
}

impl RingBufferManager {
    pub fn new(default_capacity: usize, wrap: bool) -> Self {
        Self {
            default_capacity,
            wrap,
            rings: RwLock::new(HashMap::new()),
        }
    }

    /// Begin collection into the named ring at the given verbosity
    ///
    /// Creates the ring on first use; raising or lowering verbosity on an
    /// existing ring keeps its contents.
    pub async fn start_logging(&self, verbose_level: u32, name: &str) -> HalResult<()> {
        if name.is_empty() {
            return Err(HalError::InvalidParameter("empty ring buffer name".into()));
        }
        let mut rings = self.rings.write().await;
        let ring = rings
            .entry(name.to_string())
            .or_insert_with(|| {
                Arc::new(Mutex::new(RingBuffer::new(
                    name,
                    self.default_capacity,
                    self.wrap,
                )))
            })
            .clone();
        drop(rings);

        ring.lock().await.set_verbose_level(verbose_level);
        debug!(name, verbose_level, "logging started");
        Ok(())
    }

    async fn ring(&self, name: &str) -> HalResult<Arc<Mutex<RingBuffer>>> {
        self.rings
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| HalError::NotAvailable(format!("ring buffer '{name}' not started")))
    }

    /// Append a pre-framed entry to the named ring
    pub async fn append(&self, name: &str, entry: &RingEntry) -> HalResult<()> {
        let ring = self.ring(name).await?;
        let mut ring = ring.lock().await;
        ring.append(entry)
    }

    /// Log one connectivity event, honoring the ring's verbosity gate
    ///
    /// Returns `Ok(false)` when the event is below the collection threshold.
    pub async fn log_connectivity_event(
        &self,
        name: &str,
        event: ConnectivityEvent,
        event_data: &[u8],
        timestamp_us: u64,
    ) -> HalResult<bool> {
        let ring = self.ring(name).await?;
        let mut ring = ring.lock().await;
        if ring.verbose_level() < event.min_verbose_level() {
            return Ok(false);
        }
        ring.append(&event.to_entry(timestamp_us, event_data))?;
        Ok(true)
    }

    /// Log one per-packet TX/RX status record
    pub async fn log_packet_status(
        &self,
        name: &str,
        status: &PacketStatus,
        timestamp_us: u64,
    ) -> HalResult<()> {
        let payload = status.encode()?;
        self.append(
            name,
            &RingEntry::binary(ENTRY_KIND_PACKET_STATUS, timestamp_us, payload),
        )
        .await
    }

    /// Route an opaque byte buffer (e.g. a firmware memory dump) into the
    /// ring as chunked binary entries
    pub async fn append_chunked(
        &self,
        name: &str,
        bytes: &[u8],
        chunk_size: usize,
        timestamp_us: u64,
    ) -> HalResult<usize> {
        if chunk_size == 0 {
            return Err(HalError::InvalidParameter("zero chunk size".into()));
        }
        let ring = self.ring(name).await?;
        let mut ring = ring.lock().await;
        let mut chunks = 0;
        for chunk in bytes.chunks(chunk_size) {
            ring.append(&RingEntry::binary(
                ENTRY_KIND_BINARY_DATA,
                timestamp_us,
                chunk.to_vec(),
            ))?;
            chunks += 1;
        }
        Ok(chunks)
    }

    /// Drain up to `max_bytes` of whole entries from the named ring
    pub async fn read(&self, name: &str, max_bytes: usize) -> HalResult<Vec<RingEntry>> {
        let ring = self.ring(name).await?;
        let mut ring = ring.lock().await;
        Ok(ring.read(max_bytes))
    }

    /// Snapshot of one ring's counters
    pub async fn status(&self, name: &str) -> HalResult<RingBufferStatus> {
        let ring = self.ring(name).await?;
        let ring = ring.lock().await;
        Ok(ring.status())
    }

    /// Snapshot of every ring, sorted by name
    pub async fn status_all(&self) -> Vec<RingBufferStatus> {
        let rings: Vec<Arc<Mutex<RingBuffer>>> =
            self.rings.read().await.values().cloned().collect();
        let mut statuses = Vec::with_capacity(rings.len());
        for ring in rings {
            statuses.push(ring.lock().await.status());
        }
        statuses.sort_by(|a, b| a.name.cmp(&b.name));
        statuses
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::logger::entry::Direction;

    #[tokio::test]
    async fn test_query_before_start_logging_not_available() {
        let manager = RingBufferManager::new(1024, true);
        assert!(matches!(
            manager.status("connectivity").await,
            Err(HalError::NotAvailable(_))
        ));
        assert!(manager
            .log_connectivity_event("connectivity", ConnectivityEvent::GscanStarted, &[], 0)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_start_logging_then_status() {
        let manager = RingBufferManager::new(1024, true);
        manager.start_logging(1, "connectivity").await.unwrap();

        let status = manager.status("connectivity").await.unwrap();
        assert_eq!(status.name, "connectivity");
        assert_eq!(status.verbose_level, 1);
        assert_eq!(status.written_bytes, 0);
    }

    #[tokio::test]
    async fn test_verbosity_gates_beacon_events() {
        let manager = RingBufferManager::new(1024, true);
        manager.start_logging(1, "connectivity").await.unwrap();

        let logged = manager
            .log_connectivity_event("connectivity", ConnectivityEvent::BeaconReceived, &[], 1)
            .await
            .unwrap();
        assert!(!logged);

        manager.start_logging(2, "connectivity").await.unwrap();
        let logged = manager
            .log_connectivity_event("connectivity", ConnectivityEvent::BeaconReceived, &[], 2)
            .await
            .unwrap();
        assert!(logged);
    }

    #[tokio::test]
    async fn test_packet_status_roundtrip_through_ring() {
        let manager = RingBufferManager::new(1024, true);
        manager.start_logging(1, "pkt").await.unwrap();

        let status = PacketStatus {
            direction: Direction::Tx,
            success: true,
            has_80211_header: true,
            protected: false,
            tid: 3,
            mcs: 9,
            rssi: 180,
            num_retries: 1,
            last_transmit_rate: 260,
            link_layer_sequence: 77,
            firmware_entry_timestamp_us: 10,
            start_contention_timestamp_us: 20,
            transmit_success_timestamp_us: 30,
            data: vec![0x88, 0x8e],
        };
        manager.log_packet_status("pkt", &status, 99).await.unwrap();

        let entries = manager.read("pkt", 4096).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].kind, ENTRY_KIND_PACKET_STATUS);
        assert_eq!(entries[0].timestamp_us, Some(99));
        assert_eq!(PacketStatus::decode(&entries[0].payload).unwrap(), status);
    }

    #[tokio::test]
    async fn test_memory_dump_chunked_into_entries() {
        let manager = RingBufferManager::new(4096, true);
        manager.start_logging(1, "dump").await.unwrap();

        let dump = vec![0x5a; 100];
        let chunks = manager.append_chunked("dump", &dump, 32, 0).await.unwrap();
        assert_eq!(chunks, 4);

        let entries = manager.read("dump", 8192).await.unwrap();
        assert_eq!(entries.len(), 4);
        let total: usize = entries.iter().map(|e| e.payload.len()).sum();
        assert_eq!(total, 100);
    }

    #[tokio::test]
    async fn test_rings_are_independent() {
        let manager = RingBufferManager::new(1024, true);
        manager.start_logging(1, "a").await.unwrap();
        manager.start_logging(2, "b").await.unwrap();

        manager
            .log_connectivity_event("a", ConnectivityEvent::GscanStarted, &[], 0)
            .await
            .unwrap();

        let statuses = manager.status_all().await;
        assert_eq!(statuses.len(), 2);
        assert!(statuses[0].written_bytes > 0);
        assert_eq!(statuses[1].written_bytes, 0);
    }
}
