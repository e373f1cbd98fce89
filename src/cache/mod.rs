//! Scan cache and delta detection (hotlist, significant change, ePNO)

mod epno;
mod hotlist;
mod sigchange;
mod store;

pub use store::ScanCache;
