//! Runtime settings

use crate::config::CliArgs;

/// Runtime configuration settings
#[derive(Debug, Clone)]
pub struct Settings {
    pub interface: String,
    pub ring_capacity: usize,
    pub ring_wrap: bool,
    pub verbose_level: u32,
    pub scan_period_ms: u64,
}

impl From<CliArgs> for Settings {
    fn from(args: CliArgs) -> Self {
        Settings {
            interface: args.interface,
            ring_capacity: args.ring_capacity,
            ring_wrap: !args.no_ring_wrap,
            verbose_level: args.verbose_level,
            scan_period_ms: args.scan_period_ms.max(1),
        }
    }
}
