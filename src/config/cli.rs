//! Command-line argument parsing

use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[clap(name = "wifi-gscan-offload", version)]
#[clap(about = "GSCAN offload core with scan scheduling and ring-buffer telemetry")]
pub struct CliArgs {
    /// Wireless network interface name
    #[clap(short, long, default_value = "wlan0")]
    pub interface: String,

    /// Byte capacity of each ring buffer
    #[clap(long, default_value = "65536")]
    pub ring_capacity: usize,

    /// Fail appends with BufferFull instead of overwriting oldest entries
    #[clap(long)]
    pub no_ring_wrap: bool,

    /// Verbose level passed to start_logging for the default rings
    #[clap(long, default_value = "1")]
    pub verbose_level: u32,

    /// Base scan period in milliseconds for the demo schedule
    #[clap(long, default_value = "5000")]
    pub scan_period_ms: u64,
}
