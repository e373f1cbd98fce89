//! Framed log entry records and their exact wire layout
//!
//! Entries carry named fields internally; the packed bit layout exists only
//! at the encode/decode boundary.

use serde::{Deserialize, Serialize};

use crate::core::error::{HalError, HalResult};

/// Payload limit imposed by the 13-bit entry size field
pub const MAX_ENTRY_PAYLOAD: usize = (1 << 13) - 1;

/// Entry type codes, per-ring specific
pub const ENTRY_KIND_CONNECTIVITY_EVENT: u8 = 1;
pub const ENTRY_KIND_PACKET_STATUS: u8 = 2;
pub const ENTRY_KIND_BINARY_DATA: u8 = 3;

const HEADER_LEN: usize = 4;
const BINARY_BIT: u16 = 1 << 13;
const TIMESTAMP_BIT: u16 = 1 << 14;
const SIZE_MASK: u16 = (1 << 13) - 1;

/// One variable-length framed record in a ring buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RingEntry {
    /// Per-ring entry type code
    pub kind: u8,
    /// Binary payload (as opposed to ascii text)
    pub binary: bool,
    /// Microsecond timestamp, when present
    pub timestamp_us: Option<u64>,
    pub payload: Vec<u8>,
}

impl RingEntry {
    pub fn binary(kind: u8, timestamp_us: u64, payload: Vec<u8>) -> Self {
        Self {
            kind,
            binary: true,
            timestamp_us: Some(timestamp_us),
            payload,
        }
    }

    pub fn ascii(kind: u8, text: &str) -> Self {
        Self {
            kind,
            binary: false,
            timestamp_us: None,
            payload: text.as_bytes().to_vec(),
        }
    }

    /// Bytes this entry occupies once framed
    pub fn encoded_len(&self) -> usize {
        HEADER_LEN + if self.timestamp_us.is_some() { 8 } else { 0 } + self.payload.len()
    }

    /// Frame the entry: u16 size/flag word, type, reserved byte, optional
    /// timestamp, payload
    pub fn encode(&self) -> HalResult<Vec<u8>> {
        if self.payload.len() > MAX_ENTRY_PAYLOAD {
            return Err(HalError::InvalidParameter(format!(
                "entry payload {} exceeds {} bytes",
                self.payload.len(),
                MAX_ENTRY_PAYLOAD
            )));
        }
        let mut word = self.payload.len() as u16 & SIZE_MASK;
        if self.binary {
            word |= BINARY_BIT;
        }
        if self.timestamp_us.is_some() {
            word |= TIMESTAMP_BIT;
        }

        let mut out = Vec::with_capacity(self.encoded_len());
        out.extend_from_slice(&word.to_le_bytes());
        out.push(self.kind);
        out.push(0);
        if let Some(ts) = self.timestamp_us {
            out.extend_from_slice(&ts.to_le_bytes());
        }
        out.extend_from_slice(&self.payload);
        Ok(out)
    }

    /// Parse one framed entry from the front of `bytes`
    ///
    /// Returns the entry and the number of bytes consumed.
    pub fn decode(bytes: &[u8]) -> HalResult<(Self, usize)> {
        if bytes.len() < HEADER_LEN {
            return Err(HalError::InvalidParameter("truncated entry header".into()));
        }
        let word = u16::from_le_bytes([bytes[0], bytes[1]]);
        let payload_len = usize::from(word & SIZE_MASK);
        let binary = word & BINARY_BIT != 0;
        let has_timestamp = word & TIMESTAMP_BIT != 0;
        let kind = bytes[2];

        let mut offset = HEADER_LEN;
        let timestamp_us = if has_timestamp {
            if bytes.len() < offset + 8 {
                return Err(HalError::InvalidParameter("truncated entry timestamp".into()));
            }
            let ts = u64::from_le_bytes(
                bytes[offset..offset + 8]
                    .try_into()
                    .map_err(|_| HalError::InvalidParameter("truncated entry timestamp".into()))?,
            );
            offset += 8;
            Some(ts)
        } else {
            None
        };

        if bytes.len() < offset + payload_len {
            return Err(HalError::InvalidParameter("truncated entry payload".into()));
        }
        let payload = bytes[offset..offset + payload_len].to_vec();
        offset += payload_len;

        Ok((
            Self {
                kind,
                binary,
                timestamp_us,
                payload,
            },
            offset,
        ))
    }
}

/// Firmware/driver connectivity event codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u16)]
pub enum ConnectivityEvent {
    AssociationRequested = 0,
    AuthComplete = 1,
    AssocComplete = 2,
    FwAuthStarted = 3,
    FwAssocStarted = 4,
    FwReAssocStarted = 5,
    DriverScanRequested = 6,
    DriverScanResultFound = 7,
    DriverScanComplete = 8,
    GscanStarted = 9,
    GscanComplete = 10,
    DisassociationRequested = 11,
    ReAssociationRequested = 12,
    RoamRequested = 13,
    /// Only logged at verbose level 2 and above
    BeaconReceived = 14,
    RoamScanStarted = 15,
    RoamScanComplete = 16,
    RoamSearchStarted = 17,
    RoamSearchStopped = 18,
    ChannelSwitchAnnouncement = 20,
    FwEapolFrameTransmitStart = 21,
    FwEapolFrameTransmitStop = 22,
    DriverEapolFrameTransmitRequested = 23,
    FwEapolFrameReceived = 24,
    DriverEapolFrameReceived = 26,
    BlockAckNegotiationComplete = 27,
    BtCoexBtScoStart = 28,
    BtCoexBtScoStop = 29,
    BtCoexBtScanStart = 30,
    BtCoexBtScanStop = 31,
    BtCoexBtHidStart = 32,
    BtCoexBtHidStop = 33,
    RoamAuthStarted = 34,
    RoamAuthComplete = 35,
    RoamAssocStarted = 36,
    RoamAssocComplete = 37,
}

impl ConnectivityEvent {
    pub fn code(self) -> u16 {
        self as u16
    }

    /// Minimum verbose level at which this event is collected
    pub fn min_verbose_level(self) -> u32 {
        match self {
            ConnectivityEvent::BeaconReceived => 2,
            _ => 1,
        }
    }

    /// Frame the event for a ring: u16 code followed by optional event data
    pub fn to_entry(self, timestamp_us: u64, event_data: &[u8]) -> RingEntry {
        let mut payload = Vec::with_capacity(2 + event_data.len());
        payload.extend_from_slice(&self.code().to_le_bytes());
        payload.extend_from_slice(event_data);
        RingEntry::binary(ENTRY_KIND_CONNECTIVITY_EVENT, timestamp_us, payload)
    }
}

/// Packet direction for per-packet status records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Tx,
    Rx,
}

/// TX/RX fate of one MPDU, with firmware timing
///
/// Fields are named here; the direction/success/header/protected bits and
/// the 4-bit TID are packed into a single byte only when framed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketStatus {
    pub direction: Direction,
    pub success: bool,
    /// Full 802.11 header present (otherwise 802.3)
    pub has_80211_header: bool,
    pub protected: bool,
    /// Traffic identifier, 0..=15
    pub tid: u8,
    /// Modulation and bandwidth
    pub mcs: u8,
    /// TX: RSSI of the ACK; RX: RSSI of the packet
    pub rssi: u8,
    pub num_retries: u8,
    /// Last transmit rate in 0.5 Mbps units
    pub last_transmit_rate: u16,
    pub link_layer_sequence: u16,
    /// Firmware timestamp when the packet entered the firmware buffer
    pub firmware_entry_timestamp_us: u64,
    /// Firmware timestamp of the first contention for the medium
    pub start_contention_timestamp_us: u64,
    /// Firmware timestamp of successful transmit or final abandonment
    pub transmit_success_timestamp_us: u64,
    /// Leading bytes of the packet, headers only
    pub data: Vec<u8>,
}

impl PacketStatus {
    const FIXED_LEN: usize = 32;

    /// Pack into the per-packet wire layout
    pub fn encode(&self) -> HalResult<Vec<u8>> {
        if self.tid > 0x0f {
            return Err(HalError::InvalidParameter(format!(
                "tid {} exceeds 4 bits",
                self.tid
            )));
        }
        let mut flags: u8 = match self.direction {
            Direction::Tx => 0,
            Direction::Rx => 1,
        };
        if self.success {
            flags |= 1 << 1;
        }
        if self.has_80211_header {
            flags |= 1 << 2;
        }
        if self.protected {
            flags |= 1 << 3;
        }
        flags |= self.tid << 4;

        let mut out = Vec::with_capacity(Self::FIXED_LEN + self.data.len());
        out.push(flags);
        out.push(self.mcs);
        out.push(self.rssi);
        out.push(self.num_retries);
        out.extend_from_slice(&self.last_transmit_rate.to_le_bytes());
        out.extend_from_slice(&self.link_layer_sequence.to_le_bytes());
        out.extend_from_slice(&self.firmware_entry_timestamp_us.to_le_bytes());
        out.extend_from_slice(&self.start_contention_timestamp_us.to_le_bytes());
        out.extend_from_slice(&self.transmit_success_timestamp_us.to_le_bytes());
        out.extend_from_slice(&self.data);
        Ok(out)
    }

    pub fn decode(bytes: &[u8]) -> HalResult<Self> {
        if bytes.len() < Self::FIXED_LEN {
            return Err(HalError::InvalidParameter(
                "truncated packet status record".into(),
            ));
        }
        let flags = bytes[0];
        let u16_at = |i: usize| u16::from_le_bytes([bytes[i], bytes[i + 1]]);
        let u64_at = |i: usize| -> HalResult<u64> {
            Ok(u64::from_le_bytes(bytes[i..i + 8].try_into().map_err(
                |_| HalError::InvalidParameter("truncated packet status record".into()),
            )?))
        };
        Ok(Self {
            direction: if flags & 1 == 0 {
                Direction::Tx
            } else {
                Direction::Rx
            },
            success: flags & (1 << 1) != 0,
            has_80211_header: flags & (1 << 2) != 0,
            protected: flags & (1 << 3) != 0,
            tid: flags >> 4,
            mcs: bytes[1],
            rssi: bytes[2],
            num_retries: bytes[3],
            last_transmit_rate: u16_at(4),
            link_layer_sequence: u16_at(6),
            firmware_entry_timestamp_us: u64_at(8)?,
            start_contention_timestamp_us: u64_at(16)?,
            transmit_success_timestamp_us: u64_at(24)?,
            data: bytes[Self::FIXED_LEN..].to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_entry_encode_layout() {
        let entry = RingEntry::binary(ENTRY_KIND_BINARY_DATA, 0x1122334455667788, vec![0xab; 5]);
        let bytes = entry.encode().unwrap();

        // size=5, binary bit, timestamp bit
        let word = u16::from_le_bytes([bytes[0], bytes[1]]);
        assert_eq!(word & 0x1fff, 5);
        assert_ne!(word & (1 << 13), 0);
        assert_ne!(word & (1 << 14), 0);
        assert_eq!(bytes[2], ENTRY_KIND_BINARY_DATA);
        assert_eq!(bytes.len(), 4 + 8 + 5);
    }

    #[test]
    fn test_entry_decode_matches_encode() {
        let entry = RingEntry::binary(ENTRY_KIND_CONNECTIVITY_EVENT, 42, vec![1, 2, 3]);
        let bytes = entry.encode().unwrap();
        let (decoded, consumed) = RingEntry::decode(&bytes).unwrap();
        assert_eq!(decoded, entry);
        assert_eq!(consumed, bytes.len());
    }

    #[test]
    fn test_ascii_entry_has_no_timestamp() {
        let entry = RingEntry::ascii(ENTRY_KIND_BINARY_DATA, "fw state: idle");
        let bytes = entry.encode().unwrap();
        let word = u16::from_le_bytes([bytes[0], bytes[1]]);
        assert_eq!(word & (1 << 13), 0);
        assert_eq!(word & (1 << 14), 0);
        assert_eq!(bytes.len(), 4 + 14);
    }

    #[test]
    fn test_oversized_payload_rejected() {
        let entry = RingEntry::binary(0, 0, vec![0; MAX_ENTRY_PAYLOAD + 1]);
        assert!(entry.encode().is_err());
    }

    #[test]
    fn test_connectivity_event_framing() {
        let entry = ConnectivityEvent::RoamScanStarted.to_entry(1_000_000, &[0x05]);
        assert_eq!(entry.kind, ENTRY_KIND_CONNECTIVITY_EVENT);
        assert_eq!(&entry.payload[..2], &15u16.to_le_bytes());
        assert_eq!(entry.payload[2], 0x05);
    }

    #[test]
    fn test_beacon_event_needs_verbose_two() {
        assert_eq!(ConnectivityEvent::BeaconReceived.min_verbose_level(), 2);
        assert_eq!(ConnectivityEvent::GscanStarted.min_verbose_level(), 1);
    }

    #[test]
    fn test_packet_status_flag_packing() {
        let status = PacketStatus {
            direction: Direction::Rx,
            success: true,
            has_80211_header: false,
            protected: true,
            tid: 5,
            mcs: 7,
            rssi: 200,
            num_retries: 2,
            last_transmit_rate: 130,
            link_layer_sequence: 4242,
            firmware_entry_timestamp_us: 111,
            start_contention_timestamp_us: 222,
            transmit_success_timestamp_us: 333,
            data: vec![0xde, 0xad],
        };
        let bytes = status.encode().unwrap();
        // direction=1, success=1, header=0, protected=1, tid=5
        assert_eq!(bytes[0], 0b0101_1011);

        let decoded = PacketStatus::decode(&bytes).unwrap();
        assert_eq!(decoded, status);
    }

    #[test]
    fn test_packet_status_tid_out_of_range() {
        let status = PacketStatus {
            direction: Direction::Tx,
            success: false,
            has_80211_header: false,
            protected: false,
            tid: 16,
            mcs: 0,
            rssi: 0,
            num_retries: 0,
            last_transmit_rate: 0,
            link_layer_sequence: 0,
            firmware_entry_timestamp_us: 0,
            start_contention_timestamp_us: 0,
            transmit_success_timestamp_us: 0,
            data: vec![],
        };
        assert!(status.encode().is_err());
    }
}
