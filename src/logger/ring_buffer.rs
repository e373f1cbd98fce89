//! A single fixed-capacity circular log with monotonic counters

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::core::error::{HalError, HalResult};
use crate::logger::entry::RingEntry;

/// Binary entries present in the buffer
pub const FLAG_HAS_BINARY_ENTRIES: u32 = 0x0000_0001;
/// Ascii entries present in the buffer
pub const FLAG_HAS_ASCII_ENTRIES: u32 = 0x0000_0002;

/// Read-only snapshot of one ring buffer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RingBufferStatus {
    pub name: String,
    pub flags: u32,
    pub ring_buffer_byte_size: usize,
    pub verbose_level: u32,
    /// Bytes written by the producer, monotonically increasing
    pub written_bytes: u64,
    /// Bytes consumed by readers (including wrap drops), monotonically
    /// increasing; never exceeds `written_bytes`
    pub read_bytes: u64,
    /// Entries overwritten by wrap since creation
    pub dropped_entries: u64,
}

/// Named circular byte log holding framed entries
///
/// `written_bytes` and `read_bytes` form a producer/consumer pair; the
/// physical offset is the counter modulo the capacity. Entries are framed
/// and never split across logical reads.
#[derive(Debug)]
pub struct RingBuffer {
    name: String,
    capacity: usize,
    wrap: bool,
    flags: u32,
    verbose_level: u32,
    written_bytes: u64,
    read_bytes: u64,
    data: Vec<u8>,
    /// Framed length of each unread entry, oldest first
    entry_lens: VecDeque<usize>,
    dropped_entries: u64,
}

impl RingBuffer {
    pub fn new(name: &str, capacity: usize, wrap: bool) -> Self {
        Self {
            name: name.to_string(),
            capacity,
            wrap,
            flags: 0,
            verbose_level: 0,
            written_bytes: 0,
            read_bytes: 0,
            data: vec![0; capacity],
            entry_lens: VecDeque::new(),
            dropped_entries: 0,
        }
    }

    pub fn verbose_level(&self) -> u32 {
        self.verbose_level
    }

    pub fn set_verbose_level(&mut self, level: u32) {
        self.verbose_level = level;
    }

    fn used(&self) -> usize {
        (self.written_bytes - self.read_bytes) as usize
    }

    /// Append one framed entry
    ///
    /// With wrap enabled, whole oldest entries are dropped (advancing the
    /// read counter) until the new entry fits. Without wrap, an entry that
    /// does not fit fails with `BufferFull`.
    pub fn append(&mut self, entry: &RingEntry) -> HalResult<()> {
        let encoded = entry.encode()?;
        if encoded.len() > self.capacity {
            return Err(HalError::InvalidParameter(format!(
                "entry of {} bytes exceeds ring capacity {}",
                encoded.len(),
                self.capacity
            )));
        }

        while self.capacity - self.used() < encoded.len() {
            if !self.wrap {
                return Err(HalError::BufferFull(self.name.clone()));
            }
            self.drop_oldest();
        }

        self.write_at(self.written_bytes, &encoded);
        self.written_bytes += encoded.len() as u64;
        self.entry_lens.push_back(encoded.len());
        self.flags |= if entry.binary {
            FLAG_HAS_BINARY_ENTRIES
        } else {
            FLAG_HAS_ASCII_ENTRIES
        };
        Ok(())
    }

    /// Drain whole entries from the front, up to `max_bytes` of framed data
    ///
    /// A partially written entry can never be observed: only fully framed
    /// entries are indexed and returned.
    pub fn read(&mut self, max_bytes: usize) -> Vec<RingEntry> {
        let mut out = Vec::new();
        let mut drained = 0;
        while let Some(len) = self.entry_lens.front().copied() {
            if drained + len > max_bytes {
                break;
            }
            let bytes = self.read_at(self.read_bytes, len);
            self.read_bytes += len as u64;
            self.entry_lens.pop_front();
            drained += len;
            match RingEntry::decode(&bytes) {
                Ok((entry, _)) => out.push(entry),
                // Only framed entries are indexed, so this cannot happen
                // unless the backing store was corrupted
                Err(e) => {
                    warn!(name = %self.name, error = %e, "undecodable ring entry dropped");
                }
            }
        }
        out
    }

    /// Non-blocking snapshot of the counters and flags
    pub fn status(&self) -> RingBufferStatus {
        RingBufferStatus {
            name: self.name.clone(),
            flags: self.flags,
            ring_buffer_byte_size: self.capacity,
            verbose_level: self.verbose_level,
            written_bytes: self.written_bytes,
            read_bytes: self.read_bytes,
            dropped_entries: self.dropped_entries,
        }
    }

    fn drop_oldest(&mut self) {
        if let Some(len) = self.entry_lens.pop_front() {
            self.read_bytes += len as u64;
            self.dropped_entries += 1;
        }
    }

    fn write_at(&mut self, counter: u64, bytes: &[u8]) {
        let offset = (counter % self.capacity as u64) as usize;
        let first = bytes.len().min(self.capacity - offset);
        self.data[offset..offset + first].copy_from_slice(&bytes[..first]);
        if first < bytes.len() {
            self.data[..bytes.len() - first].copy_from_slice(&bytes[first..]);
        }
    }

    fn read_at(&self, counter: u64, len: usize) -> Vec<u8> {
        let offset = (counter % self.capacity as u64) as usize;
        let first = len.min(self.capacity - offset);
        let mut out = Vec::with_capacity(len);
        out.extend_from_slice(&self.data[offset..offset + first]);
        if first < len {
            out.extend_from_slice(&self.data[..len - first]);
        }
        out
    }

    #[cfg(test)]
    fn invariant_holds(&self) -> bool {
        self.read_bytes <= self.written_bytes
            && self.written_bytes - self.read_bytes <= self.capacity as u64
    }
}
