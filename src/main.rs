//! GSCAN Offload Core - Main Entry Point

use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use wifi_gscan_offload::{
    config::{CliArgs, Settings},
    core::{events::TracingHandler, service::WifiHalService, types::Capabilities},
    driver::MockWifiDriver,
    logger::ConnectivityEvent,
    Band, BucketSpec, ChannelSpec, ReportPolicy, ScanParams,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,wifi_gscan_offload=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Parse CLI arguments
    let args = CliArgs::parse();
    info!(?args, "Starting GSCAN offload core");
    let settings = Settings::from(args);

    // Simulated radio until a netlink-backed driver is wired in
    let driver = Arc::new(MockWifiDriver::new());
    info!("Driver initialized for interface: {}", settings.interface);

    let handler = Arc::new(TracingHandler);
    let service = Arc::new(WifiHalService::new(
        driver,
        handler,
        Capabilities::default(),
        settings.ring_capacity,
        settings.ring_wrap,
    ));

    // Debug collection rings
    for ring in ["connectivity", "pkt-status"] {
        service.start_logging(settings.verbose_level, ring).await?;
    }
    let timestamp = service.timestamp_us();
    service
        .logger
        .log_connectivity_event("connectivity", ConnectivityEvent::GscanStarted, &[], timestamp)
        .await?;

    // Demo schedule: one 2.4 GHz band bucket plus a backed-off channel bucket
    let params = ScanParams {
        base_period_ms: settings.scan_period_ms,
        max_ap_per_scan: 16,
        report_threshold_percent: 75,
        report_threshold_num_scans: 4,
        buckets: vec![
            BucketSpec {
                index: 0,
                band: Band::Bg,
                channels: vec![],
                period_ms: settings.scan_period_ms,
                report: ReportPolicy::CompleteEvent,
                backoff: None,
            },
            BucketSpec {
                index: 1,
                band: Band::Unspecified,
                channels: vec![ChannelSpec {
                    channel_mhz: 5180,
                    dwell_time_ms: 20,
                    passive: false,
                }],
                period_ms: settings.scan_period_ms,
                report: ReportPolicy::BufferOnly,
                backoff: Some(wifi_gscan_offload::core::types::BackoffParams {
                    max_period_ms: settings.scan_period_ms * 8,
                    exponent: 2,
                    step_count: 1,
                }),
            },
        ],
    };
    service.start_gscan(1, &params).await?;
    info!("Background scan schedule installed");

    let scheduler_task = service.spawn_scheduler();
    info!("Service started successfully");

    // Wait for shutdown signal
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received SIGINT (Ctrl+C), shutting down gracefully");
        }
        _ = shutdown_signal() => {
            info!("Received SIGTERM, shutting down gracefully");
        }
    }

    service.shutdown();
    if let Err(e) = scheduler_task.await {
        error!("Scheduler task error: {e}");
    }

    for status in service.get_all_ring_buffer_status(0).await {
        info!(
            name = %status.name,
            written = status.written_bytes,
            read = status.read_bytes,
            dropped = status.dropped_entries,
            "ring buffer at shutdown"
        );
    }

    info!("Shutting down...");
    Ok(())
}

#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            sigterm.recv().await;
        }
        Err(e) => {
            error!("Failed to register SIGTERM handler: {e}");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    // On non-Unix platforms, just wait forever
    std::future::pending::<()>().await
}
