//! Ring buffer telemetry: framed entries, circular logs, named registry

pub mod entry;
pub mod manager;
pub mod ring_buffer;

pub use entry::{ConnectivityEvent, Direction, PacketStatus, RingEntry};
pub use manager::RingBufferManager;
pub use ring_buffer::{RingBuffer, RingBufferStatus};
